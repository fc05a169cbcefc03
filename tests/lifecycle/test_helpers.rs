//! Shared fixtures and helpers for lifecycle BDD scenarios.

use std::time::Duration;

use gce_lifecycle::test_support::{MemorySnapshotWriter, ScriptedBackend};
use gce_lifecycle::{
    InstanceOperations, LifecycleError, LifecycleOrchestrator, LifecycleOutcome, LifecycleRequest,
    WaitPolicy,
};
use rstest::fixture;

use crate::test_constants::{LOCAL_SSD_INSTANCE, PLAIN_INSTANCE, PROJECT, ZONE};

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub backend: ScriptedBackend,
    pub snapshots: MemorySnapshotWriter,
    pub policy: WaitPolicy,
    pub outcome: Option<Result<LifecycleOutcome, LifecycleError>>,
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    LifecycleContext {
        backend: ScriptedBackend::new(),
        snapshots: MemorySnapshotWriter::new(),
        policy: WaitPolicy::default().with_poll_interval(Duration::from_millis(1)),
        outcome: None,
    }
}

impl LifecycleContext {
    pub fn orchestrator(
        &self,
    ) -> LifecycleOrchestrator<ScriptedBackend, ScriptedBackend, MemorySnapshotWriter> {
        LifecycleOrchestrator::new(
            InstanceOperations::new(self.backend.clone(), PROJECT).with_wait_policy(self.policy),
            InstanceOperations::new(self.backend.labelled("beta"), PROJECT)
                .with_wait_policy(self.policy),
            self.snapshots.clone(),
        )
    }
}

pub fn request() -> LifecycleRequest {
    LifecycleRequest::new(ZONE)
        .with_local_ssd_name(LOCAL_SSD_INSTANCE)
        .with_plain_name(PLAIN_INSTANCE)
}
