//! A lightweight, cloneable cancellation signal threaded through every persistence port
//! operation and checked between dates and between bulk-write batches (spec §5).
//!
//! Cancellation is cooperative: nothing here interrupts an in-flight blocking call, it is
//! only ever observed at the boundaries the Run Coordinator already checks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns `Err` if the token is cancelled or past its deadline; the specific
    /// `EngineErrorKind` distinguishes the two for the Run Coordinator's failure reason.
    pub fn check(&self) -> Result<(), crate::error::EngineErrorKind> {
        if self.is_cancelled() {
            Err(crate::error::EngineErrorKind::Cancelled)
        } else if self.is_deadline_exceeded() {
            Err(crate::error::EngineErrorKind::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_is_observed_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn past_deadline_is_reported_as_deadline_exceeded() {
        let token = CancellationToken::with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(matches!(
            token.check(),
            Err(crate::error::EngineErrorKind::DeadlineExceeded)
        ));
    }
}
