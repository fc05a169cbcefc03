//! HTTPS client for the Compute Engine REST API.

mod error;
pub mod model;

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::{BackendFuture, ComputeBackend, InstanceAction};
use crate::credentials::Credentials;
use crate::instance_config::InstanceConfig;
use model::{Image, Instance, ListPage, Operation, Zone};

pub use error::ComputeError;

const COMPUTE_API_ROOT: &str = "https://compute.googleapis.com/compute";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// API line a client talks to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ApiVersion {
    /// Stable `v1` line.
    #[default]
    V1,
    /// Prerelease `beta` line.
    Beta,
}

impl ApiVersion {
    /// Returns the path segment of the version.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::Beta => "beta",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Versioned Compute Engine client bound to a set of credentials.
#[derive(Clone, Debug)]
pub struct ComputeClient {
    http: reqwest::Client,
    base_url: String,
    version: ApiVersion,
    credentials: Credentials,
}

impl ComputeClient {
    /// Builds a client for the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Transport`] when the HTTP client cannot be
    /// initialised.
    pub fn new(version: ApiVersion, credentials: Credentials) -> Result<Self, ComputeError> {
        Self::with_endpoint(COMPUTE_API_ROOT, version, credentials)
    }

    /// Builds a client for a custom endpoint root (everything before the
    /// version segment), for example a local mock server.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Transport`] when the HTTP client cannot be
    /// initialised.
    pub fn with_endpoint(
        root: impl AsRef<str>,
        version: ApiVersion,
        credentials: Credentials,
    ) -> Result<Self, ComputeError> {
        let base_url = format!("{}/{}", root.as_ref().trim_end_matches('/'), version);
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| ComputeError::Transport {
                url: base_url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self {
            http,
            base_url,
            version,
            credentials,
        })
    }

    /// Returns the API line this client talks to.
    #[must_use]
    pub const fn version(&self) -> ApiVersion {
        self.version
    }

    fn project_url(&self, project: &str, path: &str) -> String {
        format!("{}/projects/{project}/{path}", self.base_url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        resource: &str,
    ) -> Result<T, ComputeError> {
        let token = self.credentials.access_token(&self.http).await?;
        debug!(%url, resource, version = %self.version, "compute request");

        let transport = |err: reqwest::Error| ComputeError::Transport {
            url: url.to_owned(),
            message: err.to_string(),
        };
        let response = request.bearer_auth(token).send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ComputeError::from_response(status.as_u16(), &body));
        }

        serde_json::from_slice(&body).map_err(|err| ComputeError::Decode {
            resource: resource.to_owned(),
            message: err.to_string(),
        })
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
    ) -> Result<Vec<T>, ComputeError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ListPage<T> = self.execute(request, url, resource).await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }
}

impl ComputeBackend for ComputeClient {
    fn list_zones<'a>(&'a self, project: &'a str) -> BackendFuture<'a, Vec<String>> {
        Box::pin(async move {
            let url = self.project_url(project, "zones");
            let zones: Vec<Zone> = self.list_all(&url, "zone list").await?;
            Ok(zones.into_iter().map(|zone| zone.name).collect())
        })
    }

    fn list_instances<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
    ) -> BackendFuture<'a, Vec<Instance>> {
        Box::pin(async move {
            let url = self.project_url(project, &format!("zones/{zone}/instances"));
            self.list_all(&url, "instance list").await
        })
    }

    fn get_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Instance> {
        Box::pin(async move {
            let url = self.project_url(project, &format!("zones/{zone}/instances/{name}"));
            self.execute(self.http.get(&url), &url, "instance").await
        })
    }

    fn insert_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        config: &'a InstanceConfig,
    ) -> BackendFuture<'a, Operation> {
        Box::pin(async move {
            let url = self.project_url(project, &format!("zones/{zone}/instances"));
            self.execute(self.http.post(&url).json(config), &url, "operation")
                .await
        })
    }

    fn delete_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Operation> {
        Box::pin(async move {
            let url = self.project_url(project, &format!("zones/{zone}/instances/{name}"));
            self.execute(self.http.delete(&url), &url, "operation").await
        })
    }

    fn perform_action<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
        action: InstanceAction,
    ) -> BackendFuture<'a, Operation> {
        Box::pin(async move {
            let url = self.project_url(
                project,
                &format!("zones/{zone}/instances/{name}/{}", action.verb()),
            );
            let mut request = self.http.post(&url);
            if let InstanceAction::Suspend { discard_local_ssd } = action {
                request = request.query(&[("discardLocalSsd", discard_local_ssd)]);
            }
            self.execute(request, &url, "operation").await
        })
    }

    fn get_zone_operation<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        operation: &'a str,
    ) -> BackendFuture<'a, Operation> {
        Box::pin(async move {
            let url = self.project_url(project, &format!("zones/{zone}/operations/{operation}"));
            self.execute(self.http.get(&url), &url, "operation").await
        })
    }

    fn get_image_from_family<'a>(
        &'a self,
        project: &'a str,
        family: &'a str,
    ) -> BackendFuture<'a, Image> {
        Box::pin(async move {
            let url = self.project_url(project, &format!("global/images/family/{family}"));
            self.execute(self.http.get(&url), &url, "image").await
        })
    }
}

#[cfg(test)]
mod tests;
