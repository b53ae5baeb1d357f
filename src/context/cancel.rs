//! Per-request cancellation signal.
//!
//! Kept separate from the request data in `Store`: a request is cancelled
//! either when its watch signal flips to `true` (server shutdown, explicit
//! cancel) or when its deadline passes.

use std::time::Instant;

use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A request that can never be cancelled.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, signal: watch::Receiver<bool>) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        if let Some(signal) = &self.signal {
            if *signal.borrow() {
                return true;
            }
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }
}

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}
