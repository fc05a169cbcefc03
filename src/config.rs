//! Configuration loading via `ortho-config`.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::credentials::{COMPUTE_SCOPE, Credentials, CredentialsError};
use crate::instance_config::{InstanceTemplate, StartupScript};
use crate::wait::WaitPolicy;

const APP_NAME: &str = "gce-lifecycle";

/// Compute Engine settings derived from defaults, configuration files and
/// `GCE_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "GCE")]
pub struct ComputeConfig {
    /// Project that owns the instances. Required.
    #[ortho_config(default = String::new())]
    pub project: String,
    /// Path of the service-account JSON key.
    #[ortho_config(default = "client_secrets.json".to_owned())]
    pub credentials_file: String,
    /// Pre-issued OAuth access token. Takes precedence over the key file.
    pub access_token: Option<String>,
    /// Zone used when a command does not name one.
    #[ortho_config(default = "us-central1-a".to_owned())]
    pub zone: String,
    /// Machine type of created instances.
    #[ortho_config(default = "n2-highmem-4".to_owned())]
    pub machine_type: String,
    /// Project publishing the boot image family.
    #[ortho_config(default = "debian-cloud".to_owned())]
    pub image_project: String,
    /// Boot image family.
    #[ortho_config(default = "debian-11".to_owned())]
    pub image_family: String,
    /// Boot disk size in GB.
    #[ortho_config(default = 50)]
    pub boot_disk_size_gb: u64,
    /// Local SSD size in GB.
    #[ortho_config(default = 375)]
    pub local_disk_size_gb: u64,
    /// Startup script to use instead of the bundled one.
    pub startup_script_file: Option<String>,
    /// Delay between operation polls, in milliseconds.
    #[ortho_config(default = 1000)]
    pub poll_interval_ms: u64,
    /// Give up waiting on an operation after this many seconds. Unset waits
    /// indefinitely.
    pub wait_timeout_secs: Option<u64>,
    /// Directory receiving the `demo` snapshots.
    #[ortho_config(default = ".".to_owned())]
    pub output_dir: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, key: &'static str) -> Self {
        Self {
            description,
            env_var,
            key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add `{}` to the configuration file",
            self.description, self.env_var, self.key
        ))
    }
}

impl ComputeConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(metadata.missing());
        }
        Ok(())
    }

    /// Loads configuration from defaults, configuration files and environment
    /// variables. Command-line arguments are left to the binary's own parser.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply the value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the project, zone or every
    /// credential source is empty, and [`ConfigError::Invalid`] for a zero poll
    /// interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.project,
            &FieldMetadata::new("Compute Engine project", "GCE_PROJECT", "project"),
        )?;
        Self::require_field(&self.zone, &FieldMetadata::new("zone", "GCE_ZONE", "zone"))?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "poll interval must be greater than zero: fix GCE_POLL_INTERVAL_MS or `poll_interval_ms`",
            )));
        }
        if self.token().is_none() {
            Self::require_field(
                &self.credentials_file,
                &FieldMetadata::new(
                    "credentials (service-account key file or GCE_ACCESS_TOKEN)",
                    "GCE_CREDENTIALS_FILE",
                    "credentials_file",
                ),
            )?;
        }
        Ok(())
    }

    fn token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Builds credentials scoped for Compute Engine, preferring the access
    /// token when one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError`] when the key file cannot be loaded.
    pub fn credentials(&self) -> Result<Credentials, CredentialsError> {
        self.token().map_or_else(
            || {
                Credentials::from_service_account_file(
                    &Utf8PathBuf::from(self.credentials_file.trim()),
                    &[COMPUTE_SCOPE],
                )
            },
            |token| Ok(Credentials::from_access_token(token)),
        )
    }

    /// Returns the operation wait policy.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        let policy = WaitPolicy::default()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms));
        self.wait_timeout_secs
            .map_or(policy, |secs| policy.with_deadline(Duration::from_secs(secs)))
    }

    /// Returns the instance-creation template.
    #[must_use]
    pub fn instance_template(&self) -> InstanceTemplate {
        let startup_script = self
            .startup_script_file
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map_or(StartupScript::Bundled, |path| {
                StartupScript::File(Utf8PathBuf::from(path))
            });
        InstanceTemplate {
            machine_type: self.machine_type.clone(),
            image_project: self.image_project.clone(),
            image_family: self.image_family.clone(),
            boot_disk_size_gb: self.boot_disk_size_gb,
            local_disk_size_gb: self.local_disk_size_gb,
            startup_script,
        }
    }

    /// Returns the snapshot output directory.
    #[must_use]
    pub fn output_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.output_dir)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
