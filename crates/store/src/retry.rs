// Error registry and the retrying wrapper around fallible operations.
//
// Failures are registered under a stable key with a user-visible message
// and published as a whole map. Subscribers are only notified when the set
// of keys or any message actually changed. Nothing here re-invokes a failed
// call on its own; retrying is the caller's decision.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Current user-visible errors, keyed by operation.
pub type ErrorState = BTreeMap<String, String>;

pub trait ErrorSink: Send + Sync {
    fn register(&self, key: &str, message: &str);
    fn clear(&self, key: &str);
    /// Publish accumulated changes.
    fn flush(&self);
}

// ── Registry ────────────────────────────────────────────────────────

pub struct ErrorRegistry {
    pending: Mutex<ErrorState>,
    published: watch::Sender<ErrorState>,
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorRegistry {
    pub fn new() -> Self {
        let (published, _) = watch::channel(ErrorState::new());
        Self {
            pending: Mutex::new(ErrorState::new()),
            published,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ErrorState> {
        self.published.subscribe()
    }

    /// Last published state.
    pub fn current(&self) -> ErrorState {
        self.published.borrow().clone()
    }

    /// Drop every error and publish the empty state.
    pub fn reset(&self) {
        self.lock_pending().clear();
        self.flush();
    }

    fn lock_pending(&self) -> MutexGuard<'_, ErrorState> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ErrorSink for ErrorRegistry {
    fn register(&self, key: &str, message: &str) {
        let (key, message) = (key.to_string(), message.to_string());
        self.lock_pending().insert(key, message);
    }

    fn clear(&self, key: &str) {
        self.lock_pending().remove(key);
    }

    fn flush(&self) {
        let snapshot = self.lock_pending().clone();
        let changed = self.published.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        if changed {
            let count = self.published.borrow().len();
            debug!(errors = count, "error state changed");
        }
    }
}

// ── Retrying operations ─────────────────────────────────────────────

/// Identity of a retryable operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub key: String,
    /// Message registered on failure. `None` keeps a failure quiet, which
    /// explicit user retries use so the same error is not announced twice.
    pub message: Option<String>,
}

impl Operation {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: Some(message.into()),
        }
    }

    pub fn quiet(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: None,
        }
    }
}

/// Runs operations and mirrors their outcome into an error sink.
pub struct Retrying<S> {
    sink: Arc<S>,
}

impl<S> Clone for Retrying<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<S: ErrorSink> Retrying<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { sink }
    }

    /// Await `call` once. On success the operation's key is cleared; on
    /// failure its message (if any) is registered. Both paths flush.
    pub async fn run<T, E, F, Fut>(&self, operation: Operation, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match call().await {
            Ok(value) => {
                self.sink.clear(&operation.key);
                self.sink.flush();
                Ok(value)
            }
            Err(error) => {
                warn!(key = %operation.key, %error, "operation failed");
                if let Some(message) = &operation.message {
                    self.sink.register(&operation.key, message);
                }
                self.sink.flush();
                Err(error)
            }
        }
    }
}

// ── Backoff ─────────────────────────────────────────────────────────

/// Exponential backoff for fetch flows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Total calls, including the first one.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 200,
            multiplier: 1.5,
            max_delay_ms: 10_000,
            max_attempts: 5,
        }
    }
}

/// Delay before retry number `attempt` (0-based).
pub fn backoff_delay(policy: &BackoffPolicy, attempt: u32) -> Duration {
    let exp = attempt.min(64) as i32;
    let scaled = policy.base_delay_ms as f64 * policy.multiplier.powi(exp);
    let delay_ms = scaled.min(policy.max_delay_ms as f64);
    Duration::from_millis(delay_ms.max(0.0) as u64)
}

/// Call `call` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are used up.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    is_transient: impl Fn(&E) -> bool,
    mut call: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt + 1 >= policy.max_attempts.max(1) || !is_transient(&error) => {
                return Err(error);
            }
            Err(error) => {
                let delay = backoff_delay(policy, attempt);
                let delay_ms = delay.as_millis() as u64;
                debug!(attempt, delay_ms, %error, "retrying after backoff");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
