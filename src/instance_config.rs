//! Instance-creation payloads.
//!
//! [`InstanceTemplate`] carries the tunable values (machine type, image
//! family, disk sizes). [`InstanceTemplate::build`] turns a template, an
//! [`InstanceRequest`], a resolved image and the startup script into the
//! [`InstanceConfig`] body sent to `instances.insert`. Building is pure; the
//! image lookup and script loading happen in [`crate::InstanceOperations`].

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::compute::ComputeError;

/// Startup script bundled into the binary.
pub const DEFAULT_STARTUP_SCRIPT: &str = include_str!("../scripts/setup_cloud_vm.sh");

/// Scopes granted to the default service account of created instances.
pub const SERVICE_ACCOUNT_SCOPES: [&str; 6] = [
    "https://www.googleapis.com/auth/servicecontrol",
    "https://www.googleapis.com/auth/service.management.readonly",
    "https://www.googleapis.com/auth/logging.write",
    "https://www.googleapis.com/auth/monitoring.write",
    "https://www.googleapis.com/auth/trace.append",
    "https://www.googleapis.com/auth/devstorage.read_write",
];

/// Network tags applied to every created instance.
pub const NETWORK_TAGS: [&str; 2] = ["sap", "http"];

const DEFAULT_NETWORK: &str = "global/networks/default";
const NAT_NAME: &str = "External NAT";
const NAT_TYPE: &str = "ONE_TO_ONE_NAT";
const STARTUP_SCRIPT_KEY: &str = "startup-script";

/// What to create: the instance name, its zone and whether it gets a local SSD.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceRequest {
    /// Zone to create the instance in.
    pub zone: String,
    /// Instance name.
    pub name: String,
    /// Whether to attach one scratch NVMe disk.
    pub has_local_disk: bool,
}

impl InstanceRequest {
    /// Creates a request without a local disk.
    #[must_use]
    pub fn new(zone: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            name: name.into(),
            has_local_disk: false,
        }
    }

    /// Sets whether a local scratch disk is attached.
    #[must_use]
    pub const fn with_local_disk(mut self, has_local_disk: bool) -> Self {
        self.has_local_disk = has_local_disk;
        self
    }
}

/// Where the startup script comes from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum StartupScript {
    /// The script compiled into the crate.
    #[default]
    Bundled,
    /// A local file read at create time.
    File(Utf8PathBuf),
}

impl StartupScript {
    /// Returns the script text.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::StartupScript`] when the file cannot be read or
    /// contains only whitespace.
    pub fn load(&self) -> Result<String, ComputeError> {
        match self {
            Self::Bundled => Ok(DEFAULT_STARTUP_SCRIPT.to_owned()),
            Self::File(path) => load_script_file(path),
        }
    }
}

fn load_script_file(path: &Utf8Path) -> Result<String, ComputeError> {
    let script_error = |message: String| ComputeError::StartupScript {
        path: path.to_string(),
        message,
    };
    let content = crate::fs::read_to_string(path).map_err(|err| script_error(err.to_string()))?;
    if content.trim().is_empty() {
        return Err(script_error(String::from("file is empty")));
    }
    Ok(content)
}

/// Tunable values of the creation payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceTemplate {
    /// Machine type name, for example `n2-highmem-4`.
    pub machine_type: String,
    /// Project publishing the boot image family.
    pub image_project: String,
    /// Boot image family.
    pub image_family: String,
    /// Boot disk size in GB.
    pub boot_disk_size_gb: u64,
    /// Local scratch disk size in GB.
    pub local_disk_size_gb: u64,
    /// Startup script source.
    pub startup_script: StartupScript,
}

impl Default for InstanceTemplate {
    fn default() -> Self {
        Self {
            machine_type: String::from("n2-highmem-4"),
            image_project: String::from("debian-cloud"),
            image_family: String::from("debian-11"),
            boot_disk_size_gb: 50,
            local_disk_size_gb: 375,
            startup_script: StartupScript::Bundled,
        }
    }
}

impl InstanceTemplate {
    /// Assembles the creation payload.
    ///
    /// The boot disk is always first. A scratch NVMe disk follows when the
    /// request asks for one. Zone and name are passed through unchecked.
    #[must_use]
    pub fn build(
        &self,
        request: &InstanceRequest,
        source_image: &str,
        startup_script: String,
    ) -> InstanceConfig {
        let zone = request.zone.as_str();
        let mut disks = vec![DiskConfig {
            kind: None,
            boot: true,
            auto_delete: true,
            interface: None,
            initialize_params: InitializeParams {
                source_image: Some(source_image.to_owned()),
                disk_size_gb: self.boot_disk_size_gb.to_string(),
                disk_type: None,
            },
        }];
        if request.has_local_disk {
            disks.push(DiskConfig {
                kind: Some(String::from("SCRATCH")),
                boot: false,
                auto_delete: true,
                interface: Some(String::from("NVME")),
                initialize_params: InitializeParams {
                    source_image: None,
                    disk_size_gb: self.local_disk_size_gb.to_string(),
                    disk_type: Some(format!("zones/{zone}/diskTypes/local-ssd")),
                },
            });
        }

        InstanceConfig {
            name: request.name.clone(),
            machine_type: format!("zones/{zone}/machineTypes/{}", self.machine_type),
            zone: zone.to_owned(),
            tags: Tags {
                items: NETWORK_TAGS.iter().map(|tag| (*tag).to_owned()).collect(),
            },
            disks,
            network_interfaces: vec![NetworkInterfaceConfig {
                network: DEFAULT_NETWORK.to_owned(),
                access_configs: vec![AccessConfigSpec {
                    name: NAT_NAME.to_owned(),
                    kind: NAT_TYPE.to_owned(),
                }],
            }],
            service_accounts: vec![ServiceAccountConfig {
                scopes: SERVICE_ACCOUNT_SCOPES
                    .iter()
                    .map(|scope| (*scope).to_owned())
                    .collect(),
            }],
            metadata: Metadata {
                items: vec![MetadataItem {
                    key: STARTUP_SCRIPT_KEY.to_owned(),
                    value: startup_script,
                }],
            },
        }
    }
}

/// Body of an `instances.insert` request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    /// Instance name.
    pub name: String,
    /// Partial machine type URL.
    pub machine_type: String,
    /// Zone the instance is created in.
    pub zone: String,
    /// Network tags.
    pub tags: Tags,
    /// Disks, boot disk first.
    pub disks: Vec<DiskConfig>,
    /// Network interfaces.
    pub network_interfaces: Vec<NetworkInterfaceConfig>,
    /// Service accounts and their scopes.
    pub service_accounts: Vec<ServiceAccountConfig>,
    /// Instance metadata.
    pub metadata: Metadata,
}

/// Network tag list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Tags {
    /// Tag values.
    pub items: Vec<String>,
}

/// Disk entry of the creation payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskConfig {
    /// `SCRATCH` for local disks; omitted for the persistent boot disk.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Whether this is the boot disk.
    pub boot: bool,
    /// Whether the disk is deleted with the instance.
    pub auto_delete: bool,
    /// Disk interface, `NVME` for local disks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Parameters for the new disk.
    pub initialize_params: InitializeParams,
}

/// Parameters used to create a disk alongside the instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Image URL for the boot disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
    /// Size in GB as an `int64` string.
    pub disk_size_gb: String,
    /// Partial disk type URL for local disks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
}

/// Network interface entry of the creation payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceConfig {
    /// Partial network URL.
    pub network: String,
    /// External access configurations.
    pub access_configs: Vec<AccessConfigSpec>,
}

/// External NAT mapping.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AccessConfigSpec {
    /// Display name.
    pub name: String,
    /// Mapping type.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Service account attached to the instance. The account itself is left to
/// the API, which picks the project's default compute account.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ServiceAccountConfig {
    /// OAuth scopes.
    pub scopes: Vec<String>,
}

/// Metadata block.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Metadata {
    /// Key/value entries.
    pub items: Vec<MetadataItem>,
}

/// One metadata entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MetadataItem {
    /// Entry key.
    pub key: String,
    /// Entry value.
    pub value: String,
}
