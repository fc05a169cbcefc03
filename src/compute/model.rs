//! Wire types for the Compute Engine REST API.
//!
//! Only the fields this crate reads are modelled. Everything is optional at
//! the serde level so that shape problems are reported by the parser with the
//! name of the missing field instead of an opaque JSON error.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Instance resource returned by `instances.get` and `instances.list`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Numeric identifier assigned by the service.
    #[serde(default, deserialize_with = "int64")]
    pub id: Option<String>,
    /// Instance name.
    pub name: Option<String>,
    /// Lifecycle status (`PROVISIONING`, `RUNNING`, `SUSPENDED`, ...).
    pub status: Option<String>,
    /// Zone URL.
    pub zone: Option<String>,
    /// RFC 3339 creation timestamp.
    pub creation_timestamp: Option<String>,
    /// Machine type URL.
    pub machine_type: Option<String>,
    /// Attached network interfaces, first one is the primary.
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    /// Attached disks, first one is the boot disk.
    #[serde(default)]
    pub disks: Vec<AttachedDisk>,
}

/// Network interface of an instance.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    /// Internal IPv4 address.
    #[serde(rename = "networkIP")]
    pub network_ip: Option<String>,
    /// External access configurations.
    #[serde(default)]
    pub access_configs: Vec<AccessConfig>,
}

/// External access configuration of a network interface.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct AccessConfig {
    /// External IPv4 address, absent while unassigned.
    #[serde(rename = "natIP")]
    pub nat_ip: Option<String>,
}

/// Disk attached to an instance.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    /// Size in GB, encoded by the API as a decimal string.
    #[serde(default, deserialize_with = "int64")]
    pub disk_size_gb: Option<String>,
    /// `PERSISTENT` or `SCRATCH`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Whether this is the boot disk.
    #[serde(default)]
    pub boot: bool,
    /// `SCSI` or `NVME`.
    pub interface: Option<String>,
}

/// Zone resource; only the name is used.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Zone {
    /// Zone name, for example `us-central1-a`.
    pub name: String,
}

/// Image resource returned by `images.getFromFamily`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Image name.
    pub name: Option<String>,
    /// Fully qualified URL used as a disk source.
    pub self_link: Option<String>,
}

/// One page of a list response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub(crate) items: Vec<T>,
    pub(crate) next_page_token: Option<String>,
}

/// Long-running zone operation returned by every mutating call.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Server-assigned operation name, used to poll.
    pub name: String,
    /// Current status.
    #[serde(default)]
    pub status: OperationStatus,
    /// Errors reported by a finished operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    /// Kind of operation, for example `insert` or `suspend`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    /// URL of the resource the operation acts on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    /// Zone URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// URL of the operation itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

impl Operation {
    /// Creates an operation with the given name and status.
    #[must_use]
    pub fn new(name: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            name: name.into(),
            status,
            ..Self::default()
        }
    }
}

/// Status of a zone operation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Accepted but not started.
    #[default]
    Pending,
    /// In progress.
    Running,
    /// Finished, successfully or not.
    Done,
    /// Any status this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    /// Returns `true` for the terminal status.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload carried by a finished operation.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct OperationError {
    /// Individual errors.
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

/// One entry of [`OperationError`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct OperationErrorItem {
    /// Machine-readable error code, for example `ZONE_RESOURCE_POOL_EXHAUSTED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Field or resource the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("unspecified error");
        }
        for (index, item) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            match (&item.code, &item.message) {
                (Some(code), Some(message)) => write!(f, "{code}: {message}")?,
                (Some(text), None) | (None, Some(text)) => f.write_str(text)?,
                (None, None) => f.write_str("unspecified error")?,
            }
        }
        Ok(())
    }
}

/// Error envelope of a non-success API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub(crate) error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub(crate) message: Option<String>,
}

/// Accepts `int64` values encoded either as JSON strings (what the API sends)
/// or as numbers.
fn int64<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Text(String),
        Number(u64),
    }

    Ok(
        Option::<Int64>::deserialize(deserializer)?.map(|value| match value {
            Int64::Text(text) => text,
            Int64::Number(number) => number.to_string(),
        }),
    )
}
