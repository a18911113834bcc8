//! Retry and proxy-rotation policy shared by all providers.
//!
//! [`FetchOrchestrator`] owns the [`ProxyRotator`] for one fetch leg and the
//! list of human-readable errors met along the way. Providers report each
//! failed step through [`FetchOrchestrator::on_failure`] and either get a new
//! proxy to rebuild their session on, or are told to stop and keep what they
//! already collected.
//!
//! [`CancelSignal`] lets the embedding process abandon in-flight work.

use std::future::Future;

use tokio::sync::watch;
use tracing::{error, warn};

use crate::sources::SourceError;
use crate::utils::ProxyRotator;

/// What a provider should do after a failed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Tear down the session, rebind it to this proxy and retry the same step
    Rotate(Option<String>),
    /// Stop the leg; partial results stay valid
    Abort,
}

/// Errors collected during a fetch; every push is logged
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    module: String,
    entries: Vec<String>,
}

impl ErrorLog {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(module = %self.module, "{}", message);
        self.entries.push(message);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}

/// Rotation state machine for one fetch leg
///
/// A step may be retried once per configured proxy. Any success resets the
/// count, so a long fetch can survive many isolated challenges as long as
/// some proxy keeps working.
#[derive(Debug)]
pub struct FetchOrchestrator {
    rotator: ProxyRotator,
    current: Option<String>,
    consecutive_failures: usize,
    rotations: usize,
    errors: ErrorLog,
}

impl FetchOrchestrator {
    /// Start a leg on the first configured proxy (or a direct connection)
    pub fn new(module: impl Into<String>, proxies: Vec<String>) -> Self {
        let mut rotator = ProxyRotator::new(proxies);
        let current = rotator.next_proxy();
        Self {
            rotator,
            current,
            consecutive_failures: 0,
            rotations: 0,
            errors: ErrorLog::new(module),
        }
    }

    /// Proxy the session should currently be bound to
    pub fn current_proxy(&self) -> Option<String> {
        self.current.clone()
    }

    /// Report a successful step
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Decide whether a failed step is retried on another proxy.
    ///
    /// Non-rotatable errors are recorded and abort immediately. Transport
    /// failures and challenges rotate while the pool has an untried proxy
    /// left for this step; otherwise a pool-exhausted error is recorded.
    pub fn on_failure(&mut self, step: &str, err: &SourceError) -> RetryDecision {
        if !err.is_rotatable() {
            self.errors.push(format!("{}: {}", step, err));
            return RetryDecision::Abort;
        }

        self.consecutive_failures += 1;

        if !self.rotator.can_rotate() {
            let exhausted = SourceError::PoolExhausted(format!(
                "{} failed with {} configured prox{}: {}",
                step,
                self.rotator.len(),
                if self.rotator.len() == 1 { "y" } else { "ies" },
                err
            ));
            self.errors.push(exhausted.to_string());
            return RetryDecision::Abort;
        }

        if self.consecutive_failures >= self.rotator.len() {
            let exhausted = SourceError::PoolExhausted(format!(
                "{} failed on all {} proxies, last error: {}",
                step,
                self.rotator.len(),
                err
            ));
            self.errors.push(exhausted.to_string());
            return RetryDecision::Abort;
        }

        let next = self.rotator.next_proxy();
        warn!(
            step,
            from = ?self.current,
            to = ?next,
            "rotating proxy after failure: {}",
            err
        );
        self.current = next.clone();
        self.rotations += 1;
        RetryDecision::Rotate(next)
    }

    /// Record a non-fatal error without affecting rotation
    pub fn record(&mut self, message: impl Into<String>) {
        self.errors.push(message);
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<String> {
        self.errors.into_entries()
    }

    /// Number of rotations performed so far
    pub fn rotations(&self) -> usize {
        self.rotations
    }
}

/// Caller-driven cancellation
///
/// Wraps a `watch` receiver; the fetch is cancelled once the sender publishes
/// `true`. A dropped sender never cancels.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Create a sender and the matching signal
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            let fired = *rx.borrow_and_update();
            if fired {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Run a step, abandoning it as soon as cancellation is requested
    pub async fn run<T, F>(&self, step: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        if self.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(SourceError::Cancelled),
            result = step => result,
        }
    }
}
