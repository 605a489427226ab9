// ABOUTME: Retry-gated, run-once bootstrap for the daemon connection.
// ABOUTME: Explicit Uninitialized/Bootstrapping/Ready/Failed state machine with backoff.

use super::error::InitError;
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Backoff policy between bootstrap attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for the doubling wait.
    pub max_delay: Duration,
    /// Give up for good after this many failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Wait imposed after `failures` consecutive failures (`failures >= 1`).
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 1u32
            .checked_shl(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn next_attempt_at(&self, failures: u32, now: Instant) -> Option<Instant> {
        if self.max_attempts.is_some_and(|max| failures >= max) {
            return None;
        }
        Some(now + self.backoff(failures))
    }
}

/// Observable gate state, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Uninitialized,
    Bootstrapping,
    Ready,
    Failed { attempts: u32 },
}

#[derive(Debug, Clone)]
struct Failure {
    attempts: u32,
    /// `None` once the policy is exhausted.
    retry_at: Option<Instant>,
    last_error: String,
}

impl Failure {
    fn window_open(&self, now: Instant) -> bool {
        self.retry_at.is_some_and(|at| now >= at)
    }

    fn error(&self, now: Instant) -> InitError {
        match self.retry_at {
            Some(at) => InitError::RetryLater {
                remaining: at.saturating_duration_since(now),
                last_error: self.last_error.clone(),
            },
            None => InitError::Exhausted {
                attempts: self.attempts,
                last_error: self.last_error.clone(),
            },
        }
    }
}

enum GateState<T> {
    Uninitialized,
    /// Carries the failure count the in-flight attempt started from.
    Bootstrapping { attempts: u32 },
    Ready(T),
    Failed(Failure),
}

impl<T> GateState<T> {
    fn attempts(&self) -> u32 {
        match self {
            GateState::Bootstrapping { attempts } => *attempts,
            GateState::Failed(failure) => failure.attempts,
            GateState::Uninitialized | GateState::Ready(_) => 0,
        }
    }
}

/// Runs a bootstrap at most once at a time and caches its success forever.
///
/// The first caller to find the gate closed runs one attempt; callers that
/// arrive while it is in flight wait for its outcome instead of starting
/// their own. If that attempt is abandoned, a waiter takes it over. After a
/// failure every caller fails fast until the retry policy reopens the window,
/// at which point the next caller runs a fresh attempt.
pub struct InitGate<T> {
    policy: RetryPolicy,
    state: Mutex<GateState<T>>,
    changed: Notify,
}

impl<T: Clone> InitGate<T> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(GateState::Uninitialized),
            changed: Notify::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn status(&self) -> GateStatus {
        match &*self.state.lock() {
            GateState::Uninitialized => GateStatus::Uninitialized,
            GateState::Bootstrapping { .. } => GateStatus::Bootstrapping,
            GateState::Ready(_) => GateStatus::Ready,
            GateState::Failed(failure) => GateStatus::Failed {
                attempts: failure.attempts,
            },
        }
    }

    /// The bootstrapped value, if the gate is open.
    pub fn get(&self) -> Option<T> {
        match &*self.state.lock() {
            GateState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Return the ready value, running `bootstrap` if this caller is the one
    /// allowed to attempt it.
    pub async fn get_or_init<F, Fut, E>(&self, bootstrap: F) -> Result<T, InitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        // failure count of the attempt this caller parked on, if any
        let mut waited_on = None;
        let prior = loop {
            let notified = {
                let mut state = self.state.lock();
                let now = Instant::now();
                match &*state {
                    GateState::Ready(value) => return Ok(value.clone()),
                    // a waiter reports the attempt it waited on rather than starting another
                    GateState::Failed(failure)
                        if !failure.window_open(now)
                            || waited_on.is_some_and(|seen| failure.attempts > seen) =>
                    {
                        return Err(failure.error(now));
                    }
                    GateState::Bootstrapping { attempts } => waited_on = Some(*attempts),
                    GateState::Failed(_) | GateState::Uninitialized => {
                        let attempts = state.attempts();
                        break std::mem::replace(
                            &mut *state,
                            GateState::Bootstrapping { attempts },
                        );
                    }
                }
                self.changed.notified()
            };
            notified.await;
        };

        let attempts = prior.attempts();
        let reset = RestoreOnDrop {
            gate: self,
            prior: Some(prior),
        };

        let outcome = bootstrap().await;
        reset.disarm();

        let attempt = attempts + 1;
        let result = {
            let mut state = self.state.lock();
            match outcome {
                Ok(value) => {
                    *state = GateState::Ready(value.clone());
                    Ok(value)
                }
                Err(e) => {
                    let reason = e.to_string();
                    let retry_at = self.policy.next_attempt_at(attempt, Instant::now());
                    *state = GateState::Failed(Failure {
                        attempts: attempt,
                        retry_at,
                        last_error: reason.clone(),
                    });
                    Err(InitError::Failed { attempt, reason })
                }
            }
        };
        self.changed.notify_waiters();
        result
    }
}

/// Puts the gate back to its pre-attempt state if the bootstrapping caller is
/// dropped mid-attempt, so waiters are not stranded in `Bootstrapping`.
struct RestoreOnDrop<'a, T> {
    gate: &'a InitGate<T>,
    prior: Option<GateState<T>>,
}

impl<T> RestoreOnDrop<'_, T> {
    fn disarm(mut self) {
        self.prior = None;
    }
}

impl<T> Drop for RestoreOnDrop<'_, T> {
    fn drop(&mut self) {
        if let Some(prior) = self.prior.take() {
            *self.gate.state.lock() = prior;
            self.gate.changed.notify_waiters();
        }
    }
}
