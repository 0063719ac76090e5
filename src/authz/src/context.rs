//! Request context carried through a resolution pass
//!
//! Wraps a cancellation token and an optional deadline so that resolvers
//! blocked on a datastore stop as soon as the request is abandoned.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthzError, Result};

/// Cancellation and deadline for one request
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never canceled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// A context canceled together with `token`
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Derive a context that also expires after `timeout`
    ///
    /// An earlier existing deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(match self.deadline {
                Some(existing) if existing < deadline => existing,
                _ => deadline,
            }),
        }
    }

    /// Cancel the request
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the request was canceled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The request deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the request was canceled or its deadline has passed
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AuthzError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AuthzError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes, the request is canceled, or the
    /// deadline passes, whichever happens first
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(AuthzError::Canceled),
                    _ = tokio::time::sleep_until(deadline) => Err(AuthzError::DeadlineExceeded),
                    result = fut => result,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(AuthzError::Canceled),
                    result = fut => result,
                }
            }
        }
    }
}
