//! Cancellation and deadlines for program runs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared flag to cancel in-flight operations from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why a run was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

/// Cancellation context an operation passes down to its program run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancelToken,
    deadline: Option<(Instant, Duration)>,
}

impl RunContext {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    /// Set a deadline `timeout` from now, keeping an earlier one
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        match self.deadline {
            Some((existing, _)) if existing <= deadline => {}
            _ => self.deadline = Some((deadline, timeout)),
        }
        self
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Returns the interrupt if the context is cancelled or past its deadline
    pub fn interrupted(&self) -> Option<Interrupt> {
        if self.token.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some((deadline, timeout)) if Instant::now() >= deadline => {
                Some(Interrupt::TimedOut(timeout))
            }
            _ => None,
        }
    }
}
