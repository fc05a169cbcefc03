//! Lifecycle management for Google Compute Engine virtual machines.
//!
//! The crate wraps the Compute Engine REST API behind the [`ComputeBackend`]
//! trait and layers instance operations (list, get, create, delete, stop,
//! start, suspend, resume), an operation waiter and a response parser on top.
//! [`LifecycleOrchestrator`] strings them together into an end-to-end
//! scenario that cycles two instances through every state change.

pub mod backend;
pub mod compute;
pub mod config;
pub mod credentials;
mod fs;
pub mod instance_config;
pub mod instances;
pub mod lifecycle;
pub mod logging;
pub mod parser;
pub mod test_support;
pub mod wait;

pub use backend::{BackendFuture, ComputeBackend, InstanceAction};
pub use compute::model::{Instance, Operation, OperationStatus};
pub use compute::{ApiVersion, ComputeClient, ComputeError};
pub use config::{ComputeConfig, ConfigError};
pub use credentials::{COMPUTE_SCOPE, Credentials, CredentialsError, ServiceAccountKey};
pub use instance_config::{InstanceConfig, InstanceRequest, InstanceTemplate, StartupScript};
pub use instances::InstanceOperations;
pub use lifecycle::{
    DirectorySnapshotWriter, LifecycleError, LifecycleOrchestrator, LifecycleOutcome,
    LifecycleRequest, LifecycleStep, SnapshotError, SnapshotWriter,
};
pub use logging::{Logging, LoggingError};
pub use parser::{ParsedInstance, parse_instance, parse_instances};
pub use wait::{OperationWaiter, WaitPolicy};
