//! BDD scenarios for the lifecycle orchestrator.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Cycle both instances and clean up"
)]
fn scenario_full_cycle(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Suspend and resume go through the beta API"
)]
fn scenario_beta_routing(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A failed operation aborts the run"
)]
fn scenario_failed_operation(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A slow operation exceeds the wait deadline"
)]
fn scenario_wait_deadline(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}
