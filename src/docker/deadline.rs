// ABOUTME: Deadline guard applied to every daemon call.
// ABOUTME: Bounds one call by the query timeout and the caller's cancellation token.

use super::error::{ClientError, TransportError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a guarded call did not produce a daemon answer.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("cancelled by caller")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CallError {
    /// Attach the operation name and target so the error can be logged on its own.
    pub fn into_client_error(self, operation: &'static str, target: impl Into<String>) -> ClientError {
        let target = target.into();
        match self {
            CallError::Timeout(timeout) => ClientError::Timeout {
                operation,
                target,
                timeout,
            },
            CallError::Cancelled => ClientError::Cancelled { operation, target },
            CallError::Transport(source) => ClientError::Daemon {
                operation,
                target,
                source,
            },
        }
    }
}

/// Wraps a single daemon call with a fixed timeout.
///
/// Each `run` gets its own full budget: a call composed of several requests
/// shares one budget only when they are awaited inside the same `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineGuard {
    timeout: Duration,
}

impl DeadlineGuard {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` until it completes, the timeout elapses or `ctx` is cancelled.
    ///
    /// The call future is dropped on every early exit, which aborts the
    /// in-flight request. A token that is already cancelled short-circuits
    /// before the call is polled.
    pub async fn run<T, F>(&self, ctx: &CancellationToken, call: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(CallError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, call) => match outcome {
                Ok(result) => result.map_err(CallError::from),
                Err(_) => Err(CallError::Timeout(self.timeout)),
            },
        }
    }
}
