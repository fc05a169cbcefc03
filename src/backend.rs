//! Backend abstraction over the Compute Engine calls this crate makes.
//!
//! [`crate::ComputeClient`] implements it over HTTPS; tests use the scripted
//! double in [`crate::test_support`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::compute::model::{Image, Instance, Operation};
use crate::compute::ComputeError;
use crate::instance_config::InstanceConfig;

/// Future returned by backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ComputeError>> + Send + 'a>>;

/// State-changing actions on an existing instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstanceAction {
    /// Boot a stopped (`TERMINATED`) instance.
    Start,
    /// Shut an instance down.
    Stop,
    /// Suspend an instance, optionally discarding local SSD contents.
    Suspend {
        /// Whether local SSD data may be dropped.
        discard_local_ssd: bool,
    },
    /// Resume a suspended instance.
    Resume,
}

impl InstanceAction {
    /// Returns the REST custom verb for the action.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Suspend { .. } => "suspend",
            Self::Resume => "resume",
        }
    }
}

impl fmt::Display for InstanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Minimal interface over the Compute Engine API.
///
/// Every method is a single remote call apart from the list methods, which
/// follow page tokens until the listing is complete.
pub trait ComputeBackend: Send + Sync {
    /// Lists the names of the zones visible to the project.
    fn list_zones<'a>(&'a self, project: &'a str) -> BackendFuture<'a, Vec<String>>;

    /// Lists the raw instances of one zone.
    fn list_instances<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
    ) -> BackendFuture<'a, Vec<Instance>>;

    /// Fetches one raw instance.
    fn get_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Instance>;

    /// Submits an instance creation request.
    fn insert_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        config: &'a InstanceConfig,
    ) -> BackendFuture<'a, Operation>;

    /// Submits an instance deletion request.
    fn delete_instance<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Operation>;

    /// Submits a state change for an instance.
    fn perform_action<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
        action: InstanceAction,
    ) -> BackendFuture<'a, Operation>;

    /// Fetches the current state of a zone operation.
    fn get_zone_operation<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        operation: &'a str,
    ) -> BackendFuture<'a, Operation>;

    /// Resolves the newest image of a public image family.
    fn get_image_from_family<'a>(
        &'a self,
        project: &'a str,
        family: &'a str,
    ) -> BackendFuture<'a, Image>;
}
