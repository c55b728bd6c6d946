use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

use homeflow_core::OperationError;

/// Scripted failures and latency for an in-memory collaborator.
///
/// Failures are consumed one per call, in the order they were queued.
#[derive(Debug, Default)]
pub struct Faults {
    failures: Mutex<VecDeque<OperationError>>,
    latency: Mutex<Option<Duration>>,
}

impl Faults {
    /// No failures, no latency
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call with `error`
    pub async fn fail_next(&self, error: OperationError) {
        self.failures.lock().await.push_back(error);
    }

    /// Delay every call by `latency`; `None` removes the delay
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    /// Number of queued failures
    pub async fn pending_failures(&self) -> usize {
        self.failures.lock().await.len()
    }

    /// Apply the latency, then the next queued failure if any
    pub(crate) async fn check(&self) -> Result<(), OperationError> {
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.failures.lock().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failures_are_consumed_in_order() {
        let faults = Faults::new();
        faults.fail_next(OperationError::Network("first".into())).await;
        faults.fail_next(OperationError::Timeout(5)).await;
        assert_eq!(faults.pending_failures().await, 2);

        assert_eq!(faults.check().await, Err(OperationError::Network("first".into())));
        assert_eq!(faults.check().await, Err(OperationError::Timeout(5)));
        assert_eq!(faults.check().await, Ok(()));
    }

    #[test]
    fn test_no_faults_by_default() {
        let faults = Faults::default();
        assert_eq!(tokio_test::block_on(faults.pending_failures()), 0);
        assert_eq!(tokio_test::block_on(faults.check()), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let faults = Faults::new();
        faults.set_latency(Some(Duration::from_secs(3))).await;

        let started = tokio::time::Instant::now();
        faults.check().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
