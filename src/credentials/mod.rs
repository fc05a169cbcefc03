//! Service-account credentials and OAuth2 access tokens.
//!
//! A service-account key is turned into an access token by signing a
//! short-lived RS256 JWT assertion and exchanging it at the key's token
//! endpoint (the JWT-bearer grant). Tokens are cached and reused until they
//! are about to expire. A pre-issued bearer token can be used instead, which
//! is handy with `gcloud auth print-access-token`.

mod error;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

pub use error::CredentialsError;

/// OAuth scope granting read/write access to Compute Engine.
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Fields of a service-account JSON key file used for token exchange.
#[derive(Clone, Deserialize, Eq, PartialEq)]
pub struct ServiceAccountKey {
    /// Service account e-mail, used as the assertion issuer.
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Key identifier, forwarded as the JWT `kid` header.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Project owning the service account.
    #[serde(default)]
    pub project_id: Option<String>,
    /// OAuth2 token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl ServiceAccountKey {
    /// Parses a key from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::InvalidKey`] when the JSON is malformed or
    /// lacks the client e-mail or private key.
    pub fn from_json(json: &str, origin: &str) -> Result<Self, CredentialsError> {
        serde_json::from_str(json).map_err(|err| CredentialsError::InvalidKey {
            origin: origin.to_owned(),
            message: err.to_string(),
        })
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

const fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Clone, Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now.checked_add(EXPIRY_MARGIN)
            .is_some_and(|horizon| horizon < self.expires_at)
    }
}

struct ServiceAccount {
    key: ServiceAccountKey,
    scope: String,
    encoding_key: EncodingKey,
}

enum TokenSource {
    ServiceAccount(Box<ServiceAccount>),
    Static(String),
}

struct Inner {
    source: TokenSource,
    cache: Mutex<Option<CachedToken>>,
}

/// Credentials shared by every client built from them.
///
/// Cloning is cheap; clones share the token cache.
#[derive(Clone)]
pub struct Credentials {
    inner: Arc<Inner>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.source {
            TokenSource::ServiceAccount(account) => f
                .debug_struct("Credentials")
                .field("client_email", &account.key.client_email)
                .field("scope", &account.scope)
                .finish_non_exhaustive(),
            TokenSource::Static(_) => f
                .debug_struct("Credentials")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

impl Credentials {
    /// Loads a service-account key file and scopes it.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Read`] when the file cannot be read and
    /// [`CredentialsError::InvalidKey`] when it is not a usable RSA key.
    pub fn from_service_account_file(
        path: &Utf8Path,
        scopes: &[&str],
    ) -> Result<Self, CredentialsError> {
        let json = crate::fs::read_to_string(path).map_err(|err| CredentialsError::Read {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        let key = ServiceAccountKey::from_json(&json, path.as_str())?;
        Self::from_service_account_key(key, scopes, path.as_str())
    }

    /// Builds credentials from an already parsed key.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::InvalidKey`] when the private key is not a
    /// PEM-encoded RSA key.
    pub fn from_service_account_key(
        key: ServiceAccountKey,
        scopes: &[&str],
        origin: &str,
    ) -> Result<Self, CredentialsError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|err| {
            CredentialsError::InvalidKey {
                origin: origin.to_owned(),
                message: err.to_string(),
            }
        })?;
        let account = ServiceAccount {
            key,
            scope: scopes.join(" "),
            encoding_key,
        };
        Ok(Self::with_source(TokenSource::ServiceAccount(Box::new(account))))
    }

    /// Wraps a pre-issued bearer token. The token is used as-is and never
    /// refreshed.
    #[must_use]
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self::with_source(TokenSource::Static(token.into()))
    }

    fn with_source(source: TokenSource) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                cache: Mutex::new(None),
            }),
        }
    }

    /// Returns the service-account e-mail, if these are key-based credentials.
    #[must_use]
    pub fn client_email(&self) -> Option<&str> {
        match &self.inner.source {
            TokenSource::ServiceAccount(account) => Some(account.key.client_email.as_str()),
            TokenSource::Static(_) => None,
        }
    }

    /// Returns the scopes requested for key-based credentials, space separated.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        match &self.inner.source {
            TokenSource::ServiceAccount(account) => Some(account.scope.as_str()),
            TokenSource::Static(_) => None,
        }
    }

    /// Signs the JWT assertion that is exchanged for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Signing`] when signing fails and
    /// [`CredentialsError::InvalidKey`] for token-based credentials, which have
    /// no key to sign with.
    pub fn assertion(&self, issued_at: u64) -> Result<String, CredentialsError> {
        match &self.inner.source {
            TokenSource::ServiceAccount(account) => account.assertion(issued_at),
            TokenSource::Static(_) => Err(CredentialsError::InvalidKey {
                origin: String::from("<access token>"),
                message: String::from("bearer-token credentials cannot sign assertions"),
            }),
        }
    }

    /// Returns a valid access token, fetching a new one when the cached token
    /// is missing or about to expire.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError`] when signing or the token exchange fails.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, CredentialsError> {
        let account = match &self.inner.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(account) => account,
        };

        let mut cache = self.inner.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|token| token.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let fetched = account.fetch_token(http).await?;
        let value = fetched.value.clone();
        *cache = Some(fetched);
        Ok(value)
    }
}

impl ServiceAccount {
    fn assertion(&self, issued_at: u64) -> Result<String, CredentialsError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: issued_at,
            exp: issued_at.saturating_add(ASSERTION_LIFETIME_SECS),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.key.private_key_id);
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|err| CredentialsError::Signing(err.to_string()))
    }

    async fn fetch_token(&self, http: &reqwest::Client) -> Result<CachedToken, CredentialsError> {
        let url = self.key.token_uri.as_str();
        let assertion = self.assertion(jsonwebtoken::get_current_timestamp())?;
        debug!(client_email = %self.key.client_email, %url, "exchanging service account assertion");

        let transport = |err: reqwest::Error| CredentialsError::Transport {
            url: url.to_owned(),
            message: err.to_string(),
        };
        let response = http
            .post(url)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            let message = serde_json::from_slice::<TokenErrorResponse>(&body)
                .map(|parsed| parsed.error_description.unwrap_or(parsed.error))
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(CredentialsError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse =
            serde_json::from_slice(&body).map_err(|err| CredentialsError::Rejected {
                status: status.as_u16(),
                message: format!("unexpected token response: {err}"),
            })?;
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(token.expires_in))
            .ok_or_else(|| CredentialsError::Rejected {
                status: status.as_u16(),
                message: format!("token lifetime out of range: {}s", token.expires_in),
            })?;
        Ok(CachedToken {
            value: token.access_token,
            expires_at,
        })
    }
}
