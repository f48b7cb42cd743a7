//! Cooperative cancellation for long-running grid and O(n²) algorithms.

use crate::error::{GeoscopeError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable flag checked once per outer-loop iteration.
///
/// # Examples
///
/// ```
/// use geoscope::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// assert!(token.check().is_ok());
/// handle.cancel();
/// assert!(token.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once the token has been triggered.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GeoscopeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Check an optional token.
pub(crate) fn check(token: Option<&CancelToken>) -> Result<()> {
    match token {
        Some(token) => token.check(),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        assert_eq!(other.check(), Err(GeoscopeError::Cancelled));
    }

    #[test]
    fn test_optional_check() {
        assert!(check(None).is_ok());
        let token = CancelToken::new();
        token.cancel();
        assert!(check(Some(&token)).is_err());
    }
}
