//! Virtual clock decoupled from wall-clock time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Deterministic, advanceable time source.
///
/// Logical elapsed time only moves through [`VirtualClock::advance`], so
/// capture speed is fully reproducible regardless of how long real
/// execution takes. Handles are cheap to clone and share one timeline.
#[derive(Clone)]
pub struct VirtualClock {
    inner: Arc<ClockInner>,
}

struct ClockInner {
    elapsed_micros: AtomicU64,
    sleepers: Mutex<Vec<Sleeper>>,
}

struct Sleeper {
    deadline_micros: u64,
    release: oneshot::Sender<()>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ClockInner {
                elapsed_micros: AtomicU64::new(0),
                sleepers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Logical time elapsed since creation or the last reset.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.inner.elapsed_micros.load(Ordering::SeqCst))
    }

    /// Move logical time forward by exactly `by`.
    ///
    /// Every sleep whose deadline falls within the advanced window is
    /// released before this returns.
    pub async fn advance(&self, by: Duration) {
        let released = {
            let mut sleepers = self.inner.sleepers.lock().expect("clock lock poisoned");
            let now = self.inner.elapsed_micros.load(Ordering::SeqCst) + by.as_micros() as u64;
            self.inner.elapsed_micros.store(now, Ordering::SeqCst);

            let mut due = Vec::new();
            let mut i = 0;
            while i < sleepers.len() {
                if sleepers[i].deadline_micros <= now {
                    due.push(sleepers.swap_remove(i));
                } else {
                    i += 1;
                }
            }
            due
        };

        for sleeper in released {
            let _ = sleeper.release.send(());
        }
        // let released sleepers resume before the caller continues
        tokio::task::yield_now().await;
    }

    /// Reset elapsed time to zero and drop every pending sleep.
    ///
    /// Pending sleepers are released immediately rather than left
    /// stranded on the abandoned timeline.
    pub fn reset(&self) {
        let dropped = {
            let mut sleepers = self.inner.sleepers.lock().expect("clock lock poisoned");
            self.inner.elapsed_micros.store(0, Ordering::SeqCst);
            std::mem::take(&mut *sleepers)
        };
        drop(dropped);
    }

    /// Suspend until the clock has been advanced by at least `duration`.
    pub async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let rx = {
            let mut sleepers = self.inner.sleepers.lock().expect("clock lock poisoned");
            let now = self.inner.elapsed_micros.load(Ordering::SeqCst);
            let (tx, rx) = oneshot::channel();
            sleepers.push(Sleeper {
                deadline_micros: now + duration.as_micros() as u64,
                release: tx,
            });
            rx
        };
        // Err means the clock was reset while sleeping; either way the
        // sleeper is released.
        let _ = rx.await;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualClock")
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_elapsed_moves_only_via_advance() {
        let clock = VirtualClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(clock.elapsed(), Duration::ZERO);

        clock.advance(Duration::from_millis(100)).await;
        assert_eq!(clock.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_advance_releases_due_sleep() {
        let clock = VirtualClock::new();
        let sleeper = clock.clone();
        let handle = tokio::spawn(async move {
            sleeper.sleep(Duration::from_millis(50)).await;
        });

        // give the sleeper a chance to register
        tokio::task::yield_now().await;

        clock.advance(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("sleep should have been released")
            .expect("sleeper task should not panic");
    }

    #[tokio::test]
    async fn test_sleep_not_released_early() {
        let clock = VirtualClock::new();
        let sleeper = clock.clone();
        let handle = tokio::spawn(async move {
            sleeper.sleep(Duration::from_millis(100)).await;
        });

        tokio::task::yield_now().await;
        clock.advance(Duration::from_millis(50)).await;

        let still_sleeping =
            tokio::time::timeout(Duration::from_millis(50), handle).await.is_err();
        assert!(still_sleeping, "sleep released before its deadline");
    }

    #[tokio::test]
    async fn test_reset_drops_pending_sleeps() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_millis(30)).await;

        let sleeper = clock.clone();
        let handle = tokio::spawn(async move {
            sleeper.sleep(Duration::from_secs(3600)).await;
        });
        tokio::task::yield_now().await;

        clock.reset();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("reset should release pending sleeps")
            .expect("sleeper task should not panic");
    }
}
