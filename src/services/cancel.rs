//! Run cancellation.
//!
//! A [`CancelHandle`] is held by whoever may abort the run (the CLI wires
//! Ctrl-C to it). Every job holds a clone of the matching [`Cancellation`]
//! and races its network attempts against [`Cancellation::cancelled`].

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Trigger side of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side of a cancellation pair, optionally with a deadline.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Create a linked handle and observer.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx, deadline: None })
}

impl Cancellation {
    /// An observer that only ever fires through a deadline.
    pub fn never() -> Self {
        let (_, cancellation) = cancellation();
        cancellation
    }

    /// Also fire once `after` has elapsed from now. Keeps the earlier deadline if one is set.
    ///
    /// A deadline too far out to represent is treated as no deadline.
    pub fn with_deadline(mut self, after: Duration) -> Self {
        let Some(at) = Instant::now().checked_add(after) else {
            tracing::debug!(?after, "Deadline out of range, ignoring");
            return self;
        };
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(at),
            None => at,
        });
        self
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the handle fires or the deadline passes.
    ///
    /// Never resolves if the handle was dropped without firing and there is no deadline.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let signalled = async move {
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = signalled => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signalled.await,
        }
    }
}
