//! Periodic silent saving of editor state
//!
//! Runs independently of the capture pipeline: every tick calls the save
//! task, failures are logged and the loop carries on.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::Result;

/// Handle to a running autosave loop; the loop stops when this is dropped
pub struct AutosaveHandle {
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    pub fn stop(self) {
        // Drop aborts the task
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Shortest period an autosave loop will run at
pub const MIN_AUTOSAVE_PERIOD: Duration = Duration::from_secs(1);

/// Call `save` every `period`, starting one period from now.
///
/// Periods below [`MIN_AUTOSAVE_PERIOD`] (including zero) are raised to it.
/// Must be called from within a tokio runtime.
pub fn spawn_autosave<F, Fut>(period: Duration, mut save: F) -> AutosaveHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let period = period.max(MIN_AUTOSAVE_PERIOD);
    let task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        // a slow save should not trigger a burst of catch-up saves
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match save().await {
                Ok(()) => debug!("Autosave completed"),
                Err(e) => warn!("Autosave failed: {}", e),
            }
        }
    });
    AutosaveHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = spawn_autosave(Duration::from_secs(30), move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 0 {
                    Err(Error::StorageError("database unavailable".into()))
                } else {
                    Ok(())
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(handle.is_running());

        handle.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_runs_at_minimum_period() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _handle = spawn_autosave(Duration::ZERO, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
