//! Compensating saga runner.
//!
//! A saga records, for each completed step, a future that undoes it. When a
//! later step fails the recorded compensations run newest first. They run on
//! a spawned task, so a cancelled request still gets its rollback; a saga
//! dropped without [`Saga::commit`] compensates the same way.

use filegate_core::AppError;
use futures::future::BoxFuture;
use std::future::Future;
use tracing::{error, info, warn};

struct Compensation {
    step: &'static str,
    action: BoxFuture<'static, Result<(), AppError>>,
}

pub struct Saga {
    name: &'static str,
    compensations: Vec<Compensation>,
}

impl Saga {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            compensations: Vec::new(),
        }
    }

    /// Register how to undo `step`, which has already succeeded.
    pub fn compensate_with<F>(&mut self, step: &'static str, action: F)
    where
        F: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        self.compensations.push(Compensation {
            step,
            action: Box::pin(action),
        });
    }

    /// Run `action`; if it fails, roll back everything registered so far and
    /// return the original error.
    pub async fn step<T, F>(&mut self, step: &'static str, action: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match action.await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(saga = self.name, step, error = %e, "Saga step failed, compensating");
                self.rollback().await;
                Err(e)
            }
        }
    }

    /// Run all registered compensations in reverse order and wait for them.
    /// Failures are logged and swallowed.
    pub async fn rollback(&mut self) {
        let compensations = std::mem::take(&mut self.compensations);
        if compensations.is_empty() {
            return;
        }
        let handle = tokio::spawn(run_compensations(self.name, compensations));
        if let Err(e) = handle.await {
            error!(saga = self.name, error = %e, "Compensation task panicked");
        }
    }

    /// Keep every completed step.
    pub fn commit(mut self) {
        self.compensations.clear();
    }
}

impl Drop for Saga {
    fn drop(&mut self) {
        if self.compensations.is_empty() {
            return;
        }
        let compensations = std::mem::take(&mut self.compensations);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(saga = self.name, "Saga dropped before commit, compensating");
                handle.spawn(run_compensations(self.name, compensations));
            }
            Err(_) => {
                error!(
                    saga = self.name,
                    pending = compensations.len(),
                    "Saga dropped outside a runtime, compensations skipped"
                );
            }
        }
    }
}

async fn run_compensations(saga: &'static str, compensations: Vec<Compensation>) {
    info!(saga, count = compensations.len(), "Running compensation action(s)");
    for compensation in compensations.into_iter().rev() {
        match compensation.action.await {
            Ok(()) => info!(saga, step = compensation.step, "Compensated"),
            Err(e) => error!(
                saga,
                step = compensation.step,
                error = %e,
                "Compensation failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        result: Result<(), AppError>,
    ) -> impl Future<Output = Result<(), AppError>> + Send + 'static {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(name);
            result
        }
    }

    #[tokio::test]
    async fn test_failed_step_compensates_in_reverse() {
        let log = recorder();
        let mut saga = Saga::new("test");
        saga.compensate_with("first", record(&log, "undo first", Ok(())));
        saga.compensate_with("second", record(&log, "undo second", Ok(())));

        let result: Result<(), AppError> = saga
            .step("third", async { Err(AppError::Storage("boom".to_string())) })
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(*log.lock().unwrap(), vec!["undo second", "undo first"]);

        drop(saga);
        tokio::task::yield_now().await;
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_compensation_failure_is_swallowed() {
        let log = recorder();
        let mut saga = Saga::new("test");
        saga.compensate_with("first", record(&log, "undo first", Ok(())));
        saga.compensate_with(
            "second",
            record(&log, "undo second", Err(AppError::Metadata("down".to_string()))),
        );

        let result: Result<(), AppError> = saga
            .step("third", async { Err(AppError::Storage("boom".to_string())) })
            .await;

        assert!(matches!(result, Err(AppError::Storage(ref m)) if m == "boom"));
        assert_eq!(*log.lock().unwrap(), vec!["undo second", "undo first"]);
    }

    #[tokio::test]
    async fn test_commit_discards_compensations() {
        let log = recorder();
        let mut saga = Saga::new("test");
        saga.compensate_with("first", record(&log, "undo first", Ok(())));
        let value = saga.step("second", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        saga.commit();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_without_commit_compensates() {
        let log = recorder();
        {
            let mut saga = Saga::new("test");
            saga.compensate_with("first", record(&log, "undo first", Ok(())));
        }

        for _ in 0..50 {
            if !log.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*log.lock().unwrap(), vec!["undo first"]);
    }
}
