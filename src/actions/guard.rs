//! Per-button click guard
//!
//! A click holds the guard for its whole protocol and for a settle delay
//! after it finishes, success or failure. Duplicate hardware clicks that
//! arrive right after release are dropped.
//!
//! A click that panics also releases the guard, but only in unwinding
//! builds. The release profile sets `panic = "abort"`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Debug, Clone)]
pub struct ClickGuard {
    busy: Arc<AtomicBool>,
    settle: Duration,
}

impl ClickGuard {
    pub fn new(settle: Duration) -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            settle,
        }
    }

    /// Claim the guard; `None` while a click is running or settling
    pub fn try_acquire(&self) -> Option<ClickPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ClickPermit {
                busy: Arc::clone(&self.busy),
                settle: self.settle,
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one click; releases after the settle delay on drop
#[derive(Debug)]
pub struct ClickPermit {
    busy: Arc<AtomicBool>,
    settle: Duration,
}

impl Drop for ClickPermit {
    fn drop(&mut self) {
        let busy = Arc::clone(&self.busy);
        match Handle::try_current() {
            Ok(handle) => {
                let settle = self.settle;
                handle.spawn(async move {
                    tokio::time::sleep(settle).await;
                    busy.store(false, Ordering::Release);
                });
            }
            // No runtime left to time the settle delay
            Err(_) => busy.store(false, Ordering::Release),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_settle_window() {
        let guard = ClickGuard::new(Duration::from_millis(300));

        let permit = guard.try_acquire().unwrap();
        assert!(guard.try_acquire().is_none());
        drop(permit);

        // Still settling
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(guard.try_acquire().is_none());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_release_without_runtime() {
        let guard = ClickGuard::new(Duration::from_millis(300));
        drop(guard.try_acquire().unwrap());
        assert!(!guard.is_busy());
    }

    #[tokio::test]
    async fn test_released_after_panic() {
        let guard = ClickGuard::new(Duration::from_millis(1));
        let task_guard = guard.clone();

        let result = tokio::spawn(async move {
            let _permit = task_guard.try_acquire().unwrap();
            panic!("click failed");
        })
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!guard.is_busy());
    }
}
