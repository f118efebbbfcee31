/// Pipeline module - wires scheduler, processor and dispatcher together
///
/// Scheduler → outcome stream → processor → event stream → dispatcher.
/// Both streams are bounded; see [`BoundedSender`] for what happens when
/// one stays full.
pub mod channel;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use channel::BoundedSender;

use crate::config::{CheckConfig, Config};
use crate::error::PipelineError;
use crate::monitoring::{MonitoringExecutor, MonitoringScheduler, Timeouts};
use crate::notify::Dispatcher;
use crate::processor::ResultProcessor;

/// Stream buffers hold this many items per configured check
pub const STREAM_BUFFER_FACTOR: usize = 10;

/// How long a producer waits on a full stream before giving up
pub const CAPACITY_GRACE: Duration = Duration::from_secs(30);

pub struct Pipeline {
    config: Config,
    executor: Arc<MonitoringExecutor>,
    dispatcher: Dispatcher,
    grace: Duration,
}

impl Pipeline {
    /// Build the pipeline with the real checkers and notifier backends
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let executor = Arc::new(MonitoringExecutor::new(Timeouts::from(&config.global))?);
        let dispatcher = Dispatcher::from_config(&config)?;
        Ok(Self::with_parts(config, executor, dispatcher))
    }

    pub fn with_parts(config: Config, executor: Arc<MonitoringExecutor>, dispatcher: Dispatcher) -> Self {
        Self { config, executor, dispatcher, grace: CAPACITY_GRACE }
    }

    pub fn with_capacity_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run until `shutdown` is cancelled or a stream overflows.
    ///
    /// On shutdown the timers stop, in-flight checks finish and both streams
    /// are drained before this returns. A capacity error stops everything
    /// immediately and is returned.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        let Self { config, executor, dispatcher, grace } = self;

        let capacity = (config.checks.len() * STREAM_BUFFER_FACTOR).max(1);
        let (fatal_tx, mut fatal_rx) = mpsc::channel(1);
        let (outcome_tx, outcome_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);

        let checks: Vec<Arc<CheckConfig>> = config.checks.into_iter().map(Arc::new).collect();
        let processor = ResultProcessor::new(
            checks.iter().cloned(),
            BoundedSender::new("event", event_tx, grace, fatal_tx.clone()),
        );
        let scheduler = MonitoringScheduler::new(
            executor,
            BoundedSender::new("outcome", outcome_tx, grace, fatal_tx),
            config.global.workers,
            shutdown.child_token(),
        );

        let processor_task = tokio::spawn(processor.run(outcome_rx));
        let dispatcher_task = tokio::spawn(dispatcher.run(event_rx));

        info!(checks = checks.len(), workers = config.global.workers, capacity, "pipeline started");
        scheduler.schedule_checks(checks);

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested, draining pipeline");
                scheduler.shutdown().await;
                // last outcome sender goes away here, the rest follows in order
                drop(scheduler);
                if let Err(e) = processor_task.await {
                    error!(error = %e, "result processor task failed");
                }
                if let Err(e) = dispatcher_task.await {
                    error!(error = %e, "dispatcher task failed");
                }
                info!("pipeline stopped");
                Ok(())
            }
            Some(err) = fatal_rx.recv() => {
                error!(error = %err, "fatal pipeline error, stopping");
                processor_task.abort();
                dispatcher_task.abort();
                scheduler.shutdown().await;
                Err(err)
            }
        }
    }
}
