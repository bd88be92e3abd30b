//! Periodic background jobs.
//!
//! A [`JobRunner`] lets at most one run of a job be in flight: a tick that
//! finds the previous run still going is skipped, never queued.

pub mod email;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Overlap guard for a single named job.
#[derive(Debug, Clone)]
pub struct JobRunner {
    name: &'static str,
    running: Arc<AtomicBool>,
}

/// Held for the duration of one run; dropping it frees the job.
#[derive(Debug)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl JobRunner {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the job. `None` when a run is already in flight.
    pub fn try_start(&self) -> Option<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                running: Arc::clone(&self.running),
            })
    }

    /// Run `job` every `period` on a background task.
    ///
    /// Each tick spawns the run so a slow run never delays the ticker; ticks
    /// that land while a run is in flight are logged and dropped.
    pub fn spawn_every<F, Fut>(self, period: Duration, job: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job = Arc::new(job);
        info!("Scheduling job '{}' every {:?}", self.name, period);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(guard) = self.try_start() else {
                    warn!("Job '{}' still running; skipping this tick", self.name);
                    continue;
                };

                let job = Arc::clone(&job);
                let name = self.name;
                tokio::spawn(async move {
                    let _guard = guard;
                    debug!("Job '{}' started", name);
                    job().await;
                    debug!("Job '{}' finished", name);
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_guard_dropped() {
        let runner = JobRunner::new("test");
        let guard = runner.try_start().expect("first claim");
        assert!(runner.is_running());
        assert!(runner.try_start().is_none());

        drop(guard);
        assert!(!runner.is_running());
        assert!(runner.try_start().is_some());
    }

    #[test]
    fn clones_share_the_guard() {
        let runner = JobRunner::new("test");
        let other = runner.clone();
        let _guard = runner.try_start().unwrap();
        assert!(other.try_start().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_skipped() {
        use std::sync::atomic::AtomicUsize;

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let handle = JobRunner::new("slow").spawn_every(Duration::from_secs(1), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        });

        // Ticks at 0s..5s; only the first one gets to run.
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        handle.abort();
    }
}
