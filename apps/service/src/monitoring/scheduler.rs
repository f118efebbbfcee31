use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use super::executor::MonitoringExecutor;
use super::types::CheckOutcome;
use crate::config::CheckConfig;
use crate::pipeline::BoundedSender;

/// Monitoring scheduler - runs every check on its own interval.
///
/// At most `workers` checks execute at once across all checks. A check whose
/// previous run is still in flight (running or waiting for a worker) when its
/// timer fires skips that tick.
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
    outcomes: BoundedSender<CheckOutcome>,
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        executor: Arc<MonitoringExecutor>,
        outcomes: BoundedSender<CheckOutcome>,
        workers: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            executor,
            outcomes,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            shutdown,
            tasks: TaskTracker::new(),
        }
    }

    /// Schedule a single check for periodic execution
    pub fn schedule_check(&self, check: Arc<CheckConfig>) {
        let executor = self.executor.clone();
        let outcomes = self.outcomes.clone();
        let workers = self.workers.clone();
        let shutdown = self.shutdown.clone();
        let tasks = self.tasks.clone();

        self.tasks.spawn(async move {
            let mut timer = interval(check.repeat);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let in_flight = Arc::new(AtomicBool::new(false));

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = timer.tick() => {}
                }

                if in_flight.swap(true, Ordering::AcqRel) {
                    debug!(check = %check.id, "previous run still in flight, skipping tick");
                    continue;
                }

                let executor = executor.clone();
                let outcomes = outcomes.clone();
                let workers = workers.clone();
                let in_flight = in_flight.clone();
                let check = check.clone();

                tasks.spawn(async move {
                    let Ok(permit) = workers.acquire_owned().await else {
                        in_flight.store(false, Ordering::Release);
                        return;
                    };

                    let outcome = executor.execute_check(&check).await;
                    drop(permit);

                    debug!(
                        check = %check.id,
                        latency_ms = outcome.latency_ms(),
                        status_code = ?outcome.status_code,
                        error = ?outcome.error,
                        "check finished"
                    );
                    outcomes.publish(outcome).await;
                    in_flight.store(false, Ordering::Release);
                });
            }

            debug!(check = %check.id, "timer stopped");
        });
    }

    /// Schedule multiple checks
    pub fn schedule_checks(&self, checks: impl IntoIterator<Item = Arc<CheckConfig>>) {
        for check in checks {
            self.schedule_check(check);
        }
    }

    /// Stop all timers and wait for in-flight runs to finish or time out.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        info!(in_flight = self.tasks.len(), "waiting for running checks");
        self.tasks.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::config::CheckConfig;
    use crate::monitoring::checker::{CheckError, CheckKind, Checker, Probe};
    use crate::monitoring::executor::Timeouts;

    /// Takes `delay` per run and counts how often it was started
    struct SlowChecker {
        delay: Duration,
        started: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Checker for SlowChecker {
        async fn check(&self, _check: &CheckConfig) -> Result<Probe, CheckError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Probe { status_code: Some(200), ..Default::default() })
        }
    }

    fn scheduler_with(
        checker: Arc<SlowChecker>,
        workers: usize,
    ) -> (MonitoringScheduler, mpsc::Receiver<CheckOutcome>) {
        let timeouts = Timeouts {
            web: Duration::from_secs(60),
            ping: Duration::from_secs(60),
            port: Duration::from_secs(60),
        };
        let executor = Arc::new(MonitoringExecutor::with_checkers(
            checker.clone(),
            checker.clone(),
            checker,
            timeouts,
        ));

        let (tx, rx) = mpsc::channel(100);
        let (fatal_tx, _fatal_rx) = mpsc::channel(1);
        let outcomes = BoundedSender::new("outcome", tx, Duration::from_secs(1), fatal_tx);
        let scheduler =
            MonitoringScheduler::new(executor, outcomes, workers, CancellationToken::new());
        (scheduler, rx)
    }

    fn web_check(id: &str, repeat: Duration) -> Arc<CheckConfig> {
        let mut check = CheckConfig::new(id, "https://example.com", CheckKind::Web);
        check.repeat = repeat;
        Arc::new(check)
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_publishes_outcomes() {
        let checker =
            Arc::new(SlowChecker { delay: Duration::from_millis(10), started: AtomicUsize::new(0) });
        let (scheduler, mut rx) = scheduler_with(checker, 4);

        scheduler.schedule_check(web_check("web1", Duration::from_secs(1)));

        let outcome = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("Timeout waiting for outcome")
            .expect("Channel closed");

        assert_eq!(outcome.check_id, "web1");
        assert_eq!(outcome.status_code, Some(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_checks_skip_ticks_instead_of_queueing() {
        let checker =
            Arc::new(SlowChecker { delay: Duration::from_secs(3), started: AtomicUsize::new(0) });
        let (scheduler, mut rx) = scheduler_with(checker.clone(), 1);

        scheduler.schedule_checks([
            web_check("a", Duration::from_secs(1)),
            web_check("b", Duration::from_secs(1)),
        ]);

        tokio::time::sleep(Duration::from_secs(10)).await;

        let mut finished = 0;
        while rx.try_recv().is_ok() {
            finished += 1;
        }
        let started = checker.started.load(Ordering::SeqCst);

        // one worker, 3s per run: about 10/3 runs, never one per tick
        assert!(finished >= 2, "finished {finished}");
        assert!(finished <= 4, "finished {finished}");
        assert!(started <= 4, "started {started}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_timers_and_drains() {
        let checker =
            Arc::new(SlowChecker { delay: Duration::from_secs(2), started: AtomicUsize::new(0) });
        let (scheduler, mut rx) = scheduler_with(checker.clone(), 2);

        scheduler.schedule_check(web_check("web1", Duration::from_secs(5)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // the first run is in flight; shutdown lets it finish
        scheduler.shutdown().await;
        assert!(rx.recv().await.is_some());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(checker.started.load(Ordering::SeqCst), 1);
    }
}
