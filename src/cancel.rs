//! Cooperative cancellation and deadlines.
//!
//! A [`CancelToken`] is threaded from the document extractor down into the
//! lexer. Cancellation is cooperative: raising the flag never interrupts an
//! in-flight parse, it only makes the next periodic check fail. Page-scoped
//! deadlines are derived from the parent token so that an outer `cancel()`
//! always wins over a per-page timeout in the returned error.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How many lexer tokens pass between cancellation checks.
pub const TOKEN_CHECK_INTERVAL: u32 = 1000;

/// How many decoded hex-string bytes pass between cancellation checks.
pub const HEX_CHECK_INTERVAL: u32 = 256;

/// Shared cancellation flag plus an optional deadline.
///
/// Cloning is cheap; clones observe the same flag. Deriving a child with
/// [`CancelToken::child_with_timeout`] tightens the deadline but keeps the
/// shared flag, so cancelling the parent cancels every child.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
    /// Page number tagged onto deadline errors, if any.
    page: Option<usize>,
}

impl CancelToken {
    /// Create a token that never expires and is not cancelled.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: None,
            page: None,
        }
    }

    /// Create a token with an overall deadline of `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
            page: None,
        }
    }

    /// Derive a page-scoped token: same flag, deadline tightened to
    /// `min(parent deadline, now + timeout)`, errors tagged with `page`.
    pub fn child_with_timeout(&self, timeout: Duration, page: usize) -> Self {
        let child_deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(d) => Some(d.min(child_deadline)),
            None => Some(child_deadline),
        };
        Self {
            flag: Arc::clone(&self.flag),
            deadline,
            page: Some(page),
        }
    }

    /// Raise the cancellation flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True if `cancel()` has been called on this token or an ancestor.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Check the flag, then the deadline. Cancellation beats timeout.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::PageTimeout(self.page.unwrap_or(0)));
            }
        }
        Ok(())
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic check wrapper: calls through to [`CancelToken::check`] once
/// every `interval` ticks so hot loops pay one counter increment per unit
/// of work instead of an atomic load.
#[derive(Debug)]
pub struct CancelChecker {
    token: CancelToken,
    interval: u32,
    counter: u32,
}

impl CancelChecker {
    /// Wrap `token`, checking every `interval` ticks.
    pub fn new(token: CancelToken, interval: u32) -> Self {
        Self {
            token,
            interval: interval.max(1),
            counter: 0,
        }
    }

    /// Count one unit of work; check the token when the interval elapses.
    pub fn tick(&mut self) -> Result<()> {
        self.counter += 1;
        if self.counter >= self.interval {
            self.counter = 0;
            self.token.check()?;
        }
        Ok(())
    }

    /// Count `n` units at once.
    pub fn tick_n(&mut self, n: u32) -> Result<()> {
        self.counter = self.counter.saturating_add(n);
        if self.counter >= self.interval {
            self.counter = 0;
            self.token.check()?;
        }
        Ok(())
    }

    /// The wrapped token.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_passes() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_fails_check() {
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_child_shares_flag() {
        let parent = CancelToken::new();
        let child = parent.child_with_timeout(Duration::from_secs(60), 3);
        parent.cancel();
        assert!(matches!(child.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_expired_deadline_reports_page() {
        let parent = CancelToken::new();
        let child = parent.child_with_timeout(Duration::from_secs(0), 5);
        // Deadline of zero has already passed.
        match child.check() {
            Err(Error::PageTimeout(page)) => assert_eq!(page, 5),
            other => panic!("expected PageTimeout, got {:?}", other),
        }
    }

    #[test]
    fn test_cancellation_beats_timeout() {
        let parent = CancelToken::new();
        let child = parent.child_with_timeout(Duration::from_secs(0), 5);
        parent.cancel();
        assert!(matches!(child.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_child_deadline_never_loosens_parent() {
        let parent = CancelToken::with_timeout(Duration::from_secs(0));
        let child = parent.child_with_timeout(Duration::from_secs(3600), 1);
        assert!(child.check().is_err());
    }

    #[test]
    fn test_checker_interval() {
        let token = CancelToken::new();
        let mut checker = CancelChecker::new(token.clone(), 10);
        token.cancel();
        // First nine ticks do not consult the token.
        for _ in 0..9 {
            assert!(checker.tick().is_ok());
        }
        assert!(checker.tick().is_err());
    }

    #[test]
    fn test_checker_tick_n() {
        let token = CancelToken::new();
        let mut checker = CancelChecker::new(token.clone(), 256);
        token.cancel();
        assert!(checker.tick_n(255).is_ok());
        assert!(checker.tick_n(1).is_err());
    }
}
