//! End-to-end instance lifecycle scenario.
//!
//! The orchestrator exercises every operation against a live project: it
//! creates an instance with a local SSD and cycles it through suspend and
//! resume, creates a second instance without one and cycles it through stop
//! and start, snapshots both plus a listing of every zone, then deletes both.
//! Suspend and resume go through the prerelease backend; everything else uses
//! the stable one.

mod snapshot;

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::backend::ComputeBackend;
use crate::compute::ComputeError;
use crate::compute::model::Operation;
use crate::instance_config::InstanceRequest;
use crate::instances::InstanceOperations;
use crate::parser::ParsedInstance;

pub use snapshot::{
    DirectorySnapshotWriter, LISTING_SNAPSHOT, LOCAL_SSD_SNAPSHOT, NO_LOCAL_SSD_SNAPSHOT,
    SnapshotError, SnapshotWriter,
};

/// Steps of the scenario, used to label failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleStep {
    /// Create and wait.
    Create,
    /// Suspend and wait.
    Suspend,
    /// Resume and wait.
    Resume,
    /// Stop and wait.
    Stop,
    /// Start and wait.
    Start,
    /// Fetch one instance.
    Inspect,
    /// List the project's zones.
    ListZones,
    /// List the instances of one zone.
    ListInstances,
    /// Delete and wait.
    Delete,
}

impl LifecycleStep {
    /// Returns a short lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Inspect => "inspect",
            Self::ListZones => "list zones",
            Self::ListInstances => "list instances",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort the scenario.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LifecycleError {
    /// Raised when a remote call or wait fails.
    #[error("{step} step failed for `{instance}`: {source}")]
    Step {
        /// Step that failed.
        step: LifecycleStep,
        /// Instance name, or the zone or project for listing steps.
        instance: String,
        /// Underlying failure.
        #[source]
        source: ComputeError,
    },
    /// Raised when a snapshot cannot be written.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Inputs of one scenario run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LifecycleRequest {
    /// Zone both instances live in.
    pub zone: String,
    /// Name of the instance created with a local SSD.
    pub local_ssd_name: String,
    /// Name of the instance created without one.
    pub plain_name: String,
}

impl LifecycleRequest {
    /// Creates a request with fresh, collision-free instance names.
    #[must_use]
    pub fn new(zone: impl Into<String>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            zone: zone.into(),
            local_ssd_name: format!("instance-with-local-{suffix}"),
            plain_name: format!("instance-no-local-{suffix}"),
        }
    }

    /// Overrides the local-SSD instance name.
    #[must_use]
    pub fn with_local_ssd_name(mut self, name: impl Into<String>) -> Self {
        self.local_ssd_name = name.into();
        self
    }

    /// Overrides the plain instance name.
    #[must_use]
    pub fn with_plain_name(mut self, name: impl Into<String>) -> Self {
        self.plain_name = name.into();
        self
    }
}

/// What a completed run observed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LifecycleOutcome {
    /// Local-SSD instance after resume.
    pub local_ssd_instance: ParsedInstance,
    /// Plain instance after restart.
    pub no_local_ssd_instance: ParsedInstance,
    /// Zones visible to the project.
    pub zones: Vec<String>,
    /// Instances across all zones, taken before deletion.
    pub instances: Vec<ParsedInstance>,
}

/// Runs the scenario against a stable and a prerelease backend.
#[derive(Debug)]
pub struct LifecycleOrchestrator<S, P, W> {
    stable: InstanceOperations<S>,
    prerelease: InstanceOperations<P>,
    snapshots: W,
}

impl<S, P, W> LifecycleOrchestrator<S, P, W>
where
    S: ComputeBackend,
    P: ComputeBackend,
    W: SnapshotWriter,
{
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(
        stable: InstanceOperations<S>,
        prerelease: InstanceOperations<P>,
        snapshots: W,
    ) -> Self {
        Self {
            stable,
            prerelease,
            snapshots,
        }
    }

    /// Runs every step in order, stopping at the first failure.
    ///
    /// Instances created before a failure are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Step`] naming the failed step and instance,
    /// or [`LifecycleError::Snapshot`] when a snapshot cannot be written.
    pub async fn execute(
        &self,
        request: &LifecycleRequest,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        let zone = request.zone.as_str();

        let local = request.local_ssd_name.as_str();
        self.create(zone, local, true).await?;
        self.step(LifecycleStep::Suspend, local, async {
            let operation = self.prerelease.suspend_instance(zone, local).await?;
            self.prerelease.wait(zone, &operation).await
        })
        .await?;
        self.step(LifecycleStep::Resume, local, async {
            let operation = self.prerelease.resume_instance(zone, local).await?;
            self.prerelease.wait(zone, &operation).await
        })
        .await?;
        let local_ssd_instance = self.inspect(zone, local, LOCAL_SSD_SNAPSHOT).await?;

        let plain = request.plain_name.as_str();
        self.create(zone, plain, false).await?;
        self.step(LifecycleStep::Stop, plain, async {
            let operation = self.stable.stop_instance(zone, plain).await?;
            self.stable.wait(zone, &operation).await
        })
        .await?;
        self.step(LifecycleStep::Start, plain, async {
            let operation = self.stable.start_instance(zone, plain).await?;
            self.stable.wait(zone, &operation).await
        })
        .await?;
        let no_local_ssd_instance = self.inspect(zone, plain, NO_LOCAL_SSD_SNAPSHOT).await?;

        let project = self.stable.project().to_owned();
        let zones = self
            .step(LifecycleStep::ListZones, &project, self.stable.list_zones())
            .await?;
        let mut instances = Vec::new();
        for listed_zone in &zones {
            let found = self
                .step(
                    LifecycleStep::ListInstances,
                    listed_zone,
                    self.stable.list_instances(listed_zone),
                )
                .await?;
            instances.extend(found);
        }
        self.save(LISTING_SNAPSHOT, &instances)?;

        for name in [local, plain] {
            self.step(LifecycleStep::Delete, name, async {
                let operation = self.stable.delete_instance(zone, name).await?;
                self.stable.wait(zone, &operation).await
            })
            .await?;
        }

        Ok(LifecycleOutcome {
            local_ssd_instance,
            no_local_ssd_instance,
            zones,
            instances,
        })
    }

    async fn create(&self, zone: &str, name: &str, local_ssd: bool) -> Result<Operation, LifecycleError> {
        let request = InstanceRequest::new(zone, name).with_local_disk(local_ssd);
        self.step(LifecycleStep::Create, name, async {
            let operation = self.stable.create_instance(&request).await?;
            self.stable.wait(zone, &operation).await
        })
        .await
    }

    async fn inspect(
        &self,
        zone: &str,
        name: &str,
        snapshot: &str,
    ) -> Result<ParsedInstance, LifecycleError> {
        let instance = self
            .step(LifecycleStep::Inspect, name, self.stable.get_instance(zone, name))
            .await?;
        self.save(snapshot, &instance)?;
        Ok(instance)
    }

    async fn step<T, F>(
        &self,
        step: LifecycleStep,
        instance: &str,
        action: F,
    ) -> Result<T, LifecycleError>
    where
        F: Future<Output = Result<T, ComputeError>>,
    {
        info!(%step, instance, "lifecycle step started");
        let value = action.await.map_err(|source| LifecycleError::Step {
            step,
            instance: instance.to_owned(),
            source,
        })?;
        info!(%step, instance, "lifecycle step finished");
        Ok(value)
    }

    fn save<T: Serialize>(&self, file_name: &str, value: &T) -> Result<(), LifecycleError> {
        let contents =
            serde_json::to_string_pretty(value).map_err(|err| SnapshotError::Serialize {
                file: file_name.to_owned(),
                message: err.to_string(),
            })?;
        self.snapshots.write(file_name, &contents)?;
        info!(file = file_name, "snapshot saved");
        Ok(())
    }
}
