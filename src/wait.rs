//! Polling of zone operations until they finish.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::backend::ComputeBackend;
use crate::compute::ComputeError;
use crate::compute::model::Operation;

/// Default spacing between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How often to poll and for how long.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    /// Spacing between two polls.
    pub poll_interval: Duration,
    /// Upper bound on the total wait; `None` waits indefinitely.
    pub deadline: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }
}

impl WaitPolicy {
    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Bounds the total wait.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Blocks the calling task until a zone operation reports `DONE`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OperationWaiter {
    policy: WaitPolicy,
}

impl OperationWaiter {
    /// Creates a waiter with the given policy.
    #[must_use]
    pub const fn new(policy: WaitPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy in use.
    #[must_use]
    pub const fn policy(&self) -> WaitPolicy {
        self.policy
    }

    /// Polls `operation` until it is done and returns the final record.
    ///
    /// The first poll happens immediately; later polls are spaced by the
    /// policy interval. Polling errors are returned as they are.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::OperationFailed`] when the finished operation
    /// carries an error payload, [`ComputeError::OperationTimeout`] when the
    /// deadline passes first, and any error raised by the poll itself.
    pub async fn wait<B>(
        &self,
        backend: &B,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ComputeError>
    where
        B: ComputeBackend + ?Sized,
    {
        let started = Instant::now();
        let mut polls: u32 = 0;
        loop {
            let mut current = backend.get_zone_operation(project, zone, operation).await?;
            polls = polls.saturating_add(1);
            debug!(
                operation,
                zone,
                status = %current.status,
                polls,
                "polled zone operation"
            );

            if current.status.is_done() {
                let Some(errors) = current.error.take() else {
                    return Ok(current);
                };
                return Err(ComputeError::OperationFailed {
                    operation: operation.to_owned(),
                    errors,
                });
            }

            let mut pause = self.policy.poll_interval;
            if let Some(deadline) = self.policy.deadline {
                let waited = started.elapsed();
                if waited >= deadline {
                    return Err(ComputeError::OperationTimeout {
                        operation: operation.to_owned(),
                        waited,
                    });
                }
                pause = pause.min(deadline - waited);
            }
            sleep(pause).await;
        }
    }
}
