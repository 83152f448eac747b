//! Poll loops with cancellation and optional deadline.
//!
//! Every wait in the orchestrator (launch block, genesis row, missing
//! replay blocks, authority disablement, operator input) goes through a
//! [`Poller`]. Sleeping uses the tokio clock, so tests drive elapsed time
//! with a paused runtime instead of waiting for real.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Receiving side of a shutdown signal.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// New signal and the sender that fires it with `send(true)`.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx: Some(rx) })
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once shutdown is signalled. Pends forever if the sender
    /// goes away without signalling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

/// Fixed-interval poller.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    timeout: Option<Duration>,
    shutdown: Shutdown,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
            shutdown: Shutdown::never(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Call `check` until it yields a value.
    ///
    /// `Ok(None)` means not ready yet. Errors are transient: logged and
    /// retried on the next tick, never returned. The loop ends early only
    /// on shutdown or when the deadline passes.
    pub async fn until<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        loop {
            if self.shutdown.is_cancelled() {
                return Err(Error::Cancelled(what.to_string()));
            }

            match check().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => debug!("Waiting for {}", what),
                Err(e) => warn!("Waiting for {}: {}", what, e),
            }

            if deadline.is_some_and(|d| Instant::now() + self.interval > d) {
                return Err(Error::TimedOut(what.to_string()));
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => {
                    return Err(Error::Cancelled(what.to_string()));
                }
            }
        }
    }
}
