//! Bounded retry around one read-modify-write use case.
//!
//! # Responsibility
//! - Run a use case body inside a fresh transaction per attempt.
//! - Retry the whole body on retryable storage failures, surface
//!   everything else after aborting the in-flight transaction.
//!
//! # Invariants
//! - Attempt counter and transaction handle are local to one invocation.
//! - A retry never reuses reads from a failed attempt.
//! - Aborts are best-effort: an abort failure is logged and never changes
//!   the outcome already decided.

use super::error::{ServiceError, ServiceResult};
use crate::store::{FailureClass, StoreError, Transaction, TransactionManager};
use log::{debug, error, warn};
use std::fmt::{Display, Formatter};
use std::thread;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Retry configuration for service use cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Fixed delay before each retry.
    pub backoff: Duration,
    /// Whether a commit with unknown outcome may be retried. Retrying can
    /// apply the same writes twice, so this stays off unless the caller
    /// accepts at-least-once writes.
    pub retry_unknown_outcome: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            retry_unknown_outcome: false,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retry_unknown_outcome(mut self, enabled: bool) -> Self {
        self.retry_unknown_outcome = enabled;
        self
    }

    fn should_retry(&self, err: &ServiceError) -> bool {
        match err.failure_class() {
            FailureClass::Retryable => true,
            FailureClass::Ambiguous => self.retry_unknown_outcome,
            FailureClass::Fatal => false,
        }
    }
}

/// Lifecycle of one supervised invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Attempting,
    Retrying,
    Succeeded,
    FailedFatal,
    FailedExhausted,
}

impl AttemptState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attempting => "attempting",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::FailedFatal => "failed_fatal",
            Self::FailedExhausted => "failed_exhausted",
        }
    }
}

impl Display for AttemptState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs `body` in a transaction from `manager`, retrying per `policy`.
///
/// `body` must be a complete read-modify-write sequence: it is re-run from
/// scratch against a new transaction on every retry.
///
/// # Errors
/// - The body's own error, unchanged, when it is not retryable.
/// - `ServiceError::Store` for fatal start/commit failures.
/// - `ServiceError::Exhausted` once `policy.max_attempts` attempts failed
///   with retryable errors.
pub fn run_in_transaction<M, T, F>(
    manager: &M,
    policy: &RetryPolicy,
    operation: &'static str,
    mut body: F,
) -> ServiceResult<T>
where
    M: TransactionManager + ?Sized,
    F: FnMut(&mut dyn Transaction) -> ServiceResult<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    let mut state = AttemptState::Attempting;

    loop {
        if state == AttemptState::Retrying {
            thread::sleep(policy.backoff);
            state = AttemptState::Attempting;
            debug!(
                "event=tx_operation module=service operation={operation} state={state} attempts={attempt}"
            );
        }
        attempt += 1;

        let err = match run_attempt(manager, operation, &mut body) {
            Ok(value) => {
                state = AttemptState::Succeeded;
                debug!(
                    "event=tx_operation module=service operation={operation} state={state} attempts={attempt}"
                );
                return Ok(value);
            }
            Err(err) => err,
        };

        if !policy.should_retry(&err) {
            state = AttemptState::FailedFatal;
            warn!(
                "event=tx_operation module=service operation={operation} state={state} attempts={attempt} error={err}"
            );
            return Err(err);
        }

        if attempt >= max_attempts {
            state = AttemptState::FailedExhausted;
            error!(
                "event=tx_operation module=service operation={operation} state={state} attempts={attempt} error={err}"
            );
            return Err(ServiceError::Exhausted {
                operation,
                attempts: attempt,
                last_error: Box::new(err),
            });
        }

        state = AttemptState::Retrying;
        warn!(
            "event=tx_operation module=service operation={operation} state={state} attempts={attempt} backoff_ms={} error={err}",
            policy.backoff.as_millis()
        );
    }
}

fn run_attempt<M, T, F>(manager: &M, operation: &'static str, body: &mut F) -> ServiceResult<T>
where
    M: TransactionManager + ?Sized,
    F: FnMut(&mut dyn Transaction) -> ServiceResult<T>,
{
    let mut tx = manager.start().map_err(|err| match err {
        StoreError::StartFailed(_) => err,
        other => StoreError::StartFailed(other.to_string()),
    })?;

    let outcome = match body(tx.as_mut()) {
        Ok(value) => tx.commit().map(|()| value).map_err(ServiceError::from),
        Err(err) => Err(err),
    };

    if let Err(err) = &outcome {
        abort_quietly(tx.as_mut(), operation, err);
    }
    outcome
}

fn abort_quietly(tx: &mut dyn Transaction, operation: &'static str, cause: &ServiceError) {
    if let Err(abort_err) = tx.abort() {
        error!(
            "event=tx_abort module=service status=error operation={operation} tx_id={} cause={cause} error={abort_err}",
            tx.id()
        );
    }
}
