//! BDD step definitions for lifecycle behaviour.

use std::time::Duration;

use gce_lifecycle::{ComputeError, LifecycleError, LifecycleOutcome, ParsedInstance};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{LifecycleContext, request};
use crate::test_constants::{LOCAL_SSD_INSTANCE, PLAIN_INSTANCE, ZONE};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn outcome(lifecycle_context: &LifecycleContext) -> Result<&LifecycleOutcome, StepError> {
    match lifecycle_context.outcome.as_ref() {
        Some(Ok(outcome)) => Ok(outcome),
        Some(Err(err)) => Err(StepError::Assertion(format!("run failed: {err}"))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

fn failure(lifecycle_context: &LifecycleContext) -> Result<&LifecycleError, StepError> {
    match lifecycle_context.outcome.as_ref() {
        Some(Err(err)) => Ok(err),
        Some(Ok(_)) => Err(StepError::Assertion(String::from(
            "expected the run to fail, got success",
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[given("a scripted project with zones \"{zones}\"")]
fn scripted_project(lifecycle_context: LifecycleContext, zones: String) -> LifecycleContext {
    lifecycle_context.backend.set_zones(
        zones
            .split(',')
            .map(str::trim)
            .filter(|zone| !zone.is_empty()),
    );
    lifecycle_context
}

#[given("the next operation fails with \"{code}\"")]
fn next_operation_fails(lifecycle_context: LifecycleContext, code: String) -> LifecycleContext {
    lifecycle_context
        .backend
        .fail_next_operation(code.trim(), "no capacity left in the zone");
    lifecycle_context
}

#[given("operations need {polls:u32} polls to finish")]
fn operations_are_slow(lifecycle_context: LifecycleContext, polls: u32) -> LifecycleContext {
    lifecycle_context
        .backend
        .set_polls_before_done(polls as usize);
    lifecycle_context
}

#[given("waits give up after {millis:u32} milliseconds")]
fn waits_are_bounded(mut lifecycle_context: LifecycleContext, millis: u32) -> LifecycleContext {
    lifecycle_context.policy = lifecycle_context
        .policy
        .with_deadline(Duration::from_millis(u64::from(millis)));
    lifecycle_context
}

#[when("I run the lifecycle scenario")]
fn run_scenario(mut lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let orchestrator = lifecycle_context.orchestrator();
    let result = runtime.block_on(async move { orchestrator.execute(&request()).await });
    lifecycle_context.outcome = Some(result);
    Ok(lifecycle_context)
}

#[then("the run succeeds")]
fn run_succeeds(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    outcome(lifecycle_context).map(|_| ())
}

fn pick<'a>(outcome: &'a LifecycleOutcome, which: &str) -> Result<&'a ParsedInstance, StepError> {
    match which {
        "local" => Ok(&outcome.local_ssd_instance),
        "plain" => Ok(&outcome.no_local_ssd_instance),
        other => Err(StepError::Assertion(format!("unknown instance kind {other}"))),
    }
}

#[then("the \"{which}\" instance is \"{status}\" with local disk \"{size}\"")]
fn instance_with_disk(
    lifecycle_context: &LifecycleContext,
    which: String,
    status: String,
    size: String,
) -> Result<(), StepError> {
    let instance = pick(outcome(lifecycle_context)?, &which)?;
    if instance.status == status && instance.local_disk_size == size {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {status} with disk {size}, got {} with disk {:?}",
            instance.status, instance.local_disk_size
        )))
    }
}

#[then("the \"{which}\" instance is \"{status}\" without a local disk")]
fn instance_without_disk(
    lifecycle_context: &LifecycleContext,
    which: String,
    status: String,
) -> Result<(), StepError> {
    let instance = pick(outcome(lifecycle_context)?, &which)?;
    if instance.status == status && instance.local_disk_size.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {status} without a local disk, got {} with disk {:?}",
            instance.status, instance.local_disk_size
        )))
    }
}

#[then("the listing holds {count:u32} instances")]
fn listing_holds(lifecycle_context: &LifecycleContext, count: u32) -> Result<(), StepError> {
    let listed = outcome(lifecycle_context)?.instances.len();
    if listed == count as usize {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} listed instances, got {listed}"
        )))
    }
}

#[then("the snapshot \"{file}\" is written")]
fn snapshot_written(lifecycle_context: &LifecycleContext, file: String) -> Result<(), StepError> {
    match lifecycle_context.snapshots.json(&file) {
        Some(_) => Ok(()),
        None => Err(StepError::Assertion(format!(
            "missing snapshot {file}; written: {:?}",
            lifecycle_context.snapshots.file_names()
        ))),
    }
}

#[then("the snapshot \"{file}\" is not written")]
fn snapshot_not_written(
    lifecycle_context: &LifecycleContext,
    file: String,
) -> Result<(), StepError> {
    match lifecycle_context.snapshots.json(&file) {
        Some(_) => Err(StepError::Assertion(format!("unexpected snapshot {file}"))),
        None => Ok(()),
    }
}

#[then("no instances remain")]
fn no_instances_remain(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    for name in [LOCAL_SSD_INSTANCE, PLAIN_INSTANCE] {
        if let Some(status) = lifecycle_context.backend.instance_status(ZONE, name) {
            return Err(StepError::Assertion(format!(
                "{name} still exists with status {status}"
            )));
        }
    }
    Ok(())
}

#[then("every \"{method}\" call uses the \"{label}\" backend")]
fn calls_use_backend(
    lifecycle_context: &LifecycleContext,
    method: String,
    label: String,
) -> Result<(), StepError> {
    let calls = lifecycle_context.backend.calls_to(&method);
    if calls.is_empty() {
        return Err(StepError::Assertion(format!("no {method} calls recorded")));
    }
    match calls.iter().find(|call| call.backend != label) {
        Some(call) => Err(StepError::Assertion(format!(
            "expected {method} on {label}, got {call}"
        ))),
        None => Ok(()),
    }
}

#[then("suspend discards local SSD data")]
fn suspend_discards(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let calls = lifecycle_context.backend.calls_to("suspend");
    if !calls.is_empty()
        && calls
            .iter()
            .all(|call| call.target.ends_with("discardLocalSsd=true"))
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected discardLocalSsd=true on every suspend, got {calls:?}"
        )))
    }
}

#[then("the run fails at the \"{step}\" step for \"{instance}\"")]
fn run_fails_at(
    lifecycle_context: &LifecycleContext,
    step: String,
    instance: String,
) -> Result<(), StepError> {
    match failure(lifecycle_context)? {
        LifecycleError::Step {
            step: failed,
            instance: name,
            ..
        } if failed.as_str() == step && *name == instance => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure at {step} for {instance}, got {other}"
        ))),
    }
}

#[then("the failure is a wait timeout")]
fn failure_is_timeout(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match failure(lifecycle_context)? {
        LifecycleError::Step {
            source: ComputeError::OperationTimeout { .. },
            ..
        } => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a wait timeout, got {other}"
        ))),
    }
}
