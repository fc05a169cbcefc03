//! Behavioural scenarios for the instance lifecycle orchestrator.

#[path = "common/test_constants.rs"]
mod test_constants;

mod lifecycle;
