//! Flattening of raw instance records.

use serde::{Deserialize, Serialize};

use crate::compute::ComputeError;
use crate::compute::model::Instance;

/// Flat view of an instance, suitable for JSON output.
///
/// The owner, tailscale and notification fields are placeholders for callers
/// that enrich the record; parsing leaves them at their defaults.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ParsedInstance {
    /// Instance name.
    pub name: String,
    /// Project the instance belongs to.
    pub project: String,
    /// Owner identifier.
    pub user_id: String,
    /// Numeric instance identifier.
    pub gcp_id: String,
    /// Lifecycle status.
    pub status: String,
    /// Zone name.
    pub zone: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Machine type name.
    pub machine_type: String,
    /// Internal IPv4 address.
    pub internal_ip: String,
    /// External IPv4 address, empty when none is mapped.
    pub external_ip: String,
    /// Boot disk size in GB.
    pub boot_disk_size: String,
    /// Size of the second disk in GB, empty when there is none.
    pub local_disk_size: String,
    /// Tailscale login.
    pub tailscale_user: String,
    /// Tailscale connection status.
    pub tailscale_status: String,
    /// Tailscale address.
    pub tailscale_ip: String,
    /// Whether to notify about issues.
    pub notify_issues: bool,
    /// Whether to notify about cost.
    pub notify_cost: bool,
    /// Whether to notify about inactivity.
    pub notify_inactive: bool,
}

/// Flattens a raw instance.
///
/// # Errors
///
/// Returns [`ComputeError::MalformedResponse`] naming the first missing field
/// when the record lacks a network interface, a disk or one of the scalars
/// the flat view is built from.
pub fn parse_instance(instance: &Instance, project: &str) -> Result<ParsedInstance, ComputeError> {
    let interface = instance
        .network_interfaces
        .first()
        .ok_or_else(|| ComputeError::malformed("networkInterfaces[0]"))?;
    let boot_disk = instance
        .disks
        .first()
        .ok_or_else(|| ComputeError::malformed("disks[0]"))?;

    let external_ip = interface
        .access_configs
        .first()
        .and_then(|config| config.nat_ip.clone())
        .unwrap_or_default();
    let local_disk_size = instance
        .disks
        .get(1)
        .and_then(|disk| disk.disk_size_gb.clone())
        .unwrap_or_default();

    Ok(ParsedInstance {
        name: required(instance.name.as_deref(), "name")?,
        project: project.to_owned(),
        gcp_id: required(instance.id.as_deref(), "id")?,
        status: required(instance.status.as_deref(), "status")?,
        zone: last_segment(&required(instance.zone.as_deref(), "zone")?),
        created_at: required(instance.creation_timestamp.as_deref(), "creationTimestamp")?,
        machine_type: last_segment(&required(instance.machine_type.as_deref(), "machineType")?),
        internal_ip: required(
            interface.network_ip.as_deref(),
            "networkInterfaces[0].networkIP",
        )?,
        external_ip,
        boot_disk_size: required(boot_disk.disk_size_gb.as_deref(), "disks[0].diskSizeGb")?,
        local_disk_size,
        ..ParsedInstance::default()
    })
}

/// Flattens every instance of a listing, failing on the first malformed one.
///
/// # Errors
///
/// Returns the error of the first instance [`parse_instance`] rejects.
pub fn parse_instances(
    instances: &[Instance],
    project: &str,
) -> Result<Vec<ParsedInstance>, ComputeError> {
    instances
        .iter()
        .map(|instance| parse_instance(instance, project))
        .collect()
}

fn required(value: Option<&str>, field: &str) -> Result<String, ComputeError> {
    value
        .map(str::to_owned)
        .ok_or_else(|| ComputeError::malformed(field))
}

fn last_segment(url: &str) -> String {
    url.rsplit_once('/').map_or(url, |(_, tail)| tail).to_owned()
}
