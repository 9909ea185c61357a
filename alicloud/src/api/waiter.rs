//! State poller: re-describes a resource until it reaches a target status

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::error::ApiError;

/// Outcome of one describe call
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh<T> {
    Found { object: T, status: String },
    NotFound,
}

impl<T> Refresh<T> {
    pub fn found(object: T, status: impl Into<String>) -> Self {
        Refresh::Found {
            object,
            status: status.into(),
        }
    }

    /// Maps a describe result, turning not-found errors into `NotFound`
    pub fn from_result(
        result: Result<T, ApiError>,
        status: impl FnOnce(&T) -> String,
    ) -> Result<Self, ApiError> {
        match result {
            Ok(object) => {
                let status = status(&object);
                Ok(Refresh::Found { object, status })
            }
            Err(err) if err.is_not_found() => Ok(Refresh::NotFound),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateConf {
    target: Vec<String>,
    pending: Vec<String>,
    failed: Vec<String>,
    timeout: Duration,
    delay: Duration,
    poll_interval: Duration,
    not_found_checks: u32,
}

impl StateConf {
    /// Waits for one of `target`. An empty target waits for the resource to disappear.
    pub fn new(target: &[&str], timeout: Duration) -> Self {
        Self {
            target: to_owned(target),
            pending: Vec::new(),
            failed: Vec::new(),
            timeout,
            delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
            not_found_checks: 20,
        }
    }

    pub fn for_deletion(timeout: Duration) -> Self {
        Self::new(&[], timeout)
    }

    pub fn pending(mut self, pending: &[&str]) -> Self {
        self.pending = to_owned(pending);
        self
    }

    pub fn failed(mut self, failed: &[&str]) -> Self {
        self.failed = to_owned(failed);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    fn waits_for_deletion(&self) -> bool {
        self.target.is_empty()
    }

    /// Polls `refresh` until a target status is observed.
    ///
    /// Returns `Some(object)` on the first target status, `None` once a
    /// deletion wait sees the resource gone. A failed status aborts right away,
    /// as does a status outside pending and target when pending is given.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refresh<T>, ApiError>>,
    {
        let deadline = Instant::now() + self.timeout;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay.min(self.timeout)).await;
        }

        let mut not_found: u32 = 0;
        let mut last_state: Option<String> = None;

        loop {
            match refresh().await? {
                Refresh::NotFound => {
                    if self.waits_for_deletion() {
                        tracing::info!("resource is gone");
                        return Ok(None);
                    }
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(ApiError::Vanished { checks: not_found });
                    }
                    tracing::debug!(checks = not_found, "resource not found yet");
                }
                Refresh::Found { object, status } => {
                    not_found = 0;
                    if self.failed.contains(&status) {
                        return Err(ApiError::FailedState(status));
                    }
                    if self.target.contains(&status) {
                        tracing::info!(state = %status, "resource reached target state");
                        return Ok(Some(object));
                    }
                    if !self.pending.is_empty() && !self.pending.contains(&status) {
                        return Err(ApiError::UnexpectedState {
                            state: status,
                            targets: self.target.clone(),
                        });
                    }
                    if last_state.as_deref() != Some(status.as_str()) {
                        tracing::info!(state = %status, targets = ?self.target, "waiting for state");
                    }
                    last_state = Some(status);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ApiError::WaitTimeout {
                    last_state,
                    targets: self.target.clone(),
                    timeout: self.timeout,
                });
            }
            let remaining = deadline - now;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

fn to_owned(states: &[&str]) -> Vec<String> {
    states.iter().map(|s| s.to_string()).collect()
}
