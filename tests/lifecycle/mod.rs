//! Lifecycle scenario steps, fixtures and scenario bindings.

mod bdd_steps;
mod scenarios;
mod test_helpers;
