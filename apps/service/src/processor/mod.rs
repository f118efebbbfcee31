/// Result processor - turns raw outcomes into notification events
///
/// Owns one `CheckHealthState` per configured check and is the only place
/// that state is touched.
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::CheckConfig;
use crate::monitoring::CheckOutcome;
use crate::notify::{EventKind, NotificationEvent, Snapshot};
use crate::pipeline::BoundedSender;
pub use state::{CheckHealthState, Transitions, classify};

pub struct ResultProcessor {
    checks: HashMap<String, Arc<CheckConfig>>,
    states: HashMap<String, CheckHealthState>,
    events: BoundedSender<NotificationEvent>,
}

impl ResultProcessor {
    pub fn new(
        checks: impl IntoIterator<Item = Arc<CheckConfig>>,
        events: BoundedSender<NotificationEvent>,
    ) -> Self {
        let checks = checks.into_iter().map(|check| (check.id.clone(), check)).collect();
        Self { checks, states: HashMap::new(), events }
    }

    pub fn state(&self, check_id: &str) -> Option<&CheckHealthState> {
        self.states.get(check_id)
    }

    /// Consume outcomes until the scheduler is gone, then drop the event
    /// sender so the dispatcher can drain and stop.
    pub async fn run(mut self, mut outcomes: mpsc::Receiver<CheckOutcome>) {
        while let Some(outcome) = outcomes.recv().await {
            for event in self.process(outcome) {
                self.events.publish(event).await;
            }
        }
        debug!("outcome stream closed, processor stopped");
    }

    /// Update the check's state and return the events to publish, one per
    /// notifier subscribed to the affected axis.
    pub fn process(&mut self, outcome: CheckOutcome) -> Vec<NotificationEvent> {
        let Some(check) = self.checks.get(&outcome.check_id) else {
            warn!(check = %outcome.check_id, "outcome for unknown check, dropping");
            return Vec::new();
        };

        let status = classify(check, &outcome);
        let state = self.states.entry(check.id.clone()).or_default();
        let transitions = state.observe(status, check.allowed_fails, check.allowed_slows);
        trace!(
            check = %check.id,
            %status,
            fails = state.fails,
            slows = state.slows,
            latency_ms = outcome.latency_ms(),
            "outcome classified"
        );

        if transitions == Transitions::default() {
            return Vec::new();
        }

        let snapshot = Arc::new(Snapshot::capture(check, &outcome));
        let mut events = Vec::new();
        for kind in transitions.iter() {
            if !matches!(kind, EventKind::FailOngoing | EventKind::SlowOngoing) {
                info!(check = %check.id, %kind, "check state changed");
            }
            let notifiers = if kind.is_fail() { check.notify_fail() } else { check.notify_slow() };
            events.extend(
                notifiers.iter().map(|id| NotificationEvent::new(id.clone(), kind, snapshot.clone())),
            );
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::monitoring::CheckKind;

    fn processor(checks: Vec<CheckConfig>) -> (ResultProcessor, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let (fatal_tx, _fatal_rx) = mpsc::channel(1);
        let events = BoundedSender::new("event", tx, Duration::from_secs(1), fatal_tx);
        (ResultProcessor::new(checks.into_iter().map(Arc::new), events), rx)
    }

    fn web1() -> CheckConfig {
        let mut check = CheckConfig::new("web1", "https://example.com", CheckKind::Web);
        check.allowed_fails = 2;
        check.allowed_slows = 1;
        check.expected_code = 200;
        check.expected_time = 1000;
        check.notify_fail = Some(vec!["mail".to_string(), "chat".to_string()]);
        check.notify_slow = Some(vec!["chat".to_string()]);
        check
    }

    fn ok() -> CheckOutcome {
        CheckOutcome::new("web1").success(Duration::from_millis(20), Some(200), String::new())
    }

    fn fail() -> CheckOutcome {
        CheckOutcome::new("web1").failure(Duration::from_millis(20), "connection refused")
    }

    fn slow() -> CheckOutcome {
        CheckOutcome::new("web1").success(Duration::from_secs(3), Some(200), String::new())
    }

    #[test]
    fn test_web1_scenario() {
        let (mut processor, _rx) = processor(vec![web1()]);

        let kinds: Vec<Option<EventKind>> = [ok(), fail(), fail(), fail(), ok()]
            .into_iter()
            .map(|outcome| processor.process(outcome).first().map(|e| e.kind))
            .collect();

        assert_eq!(
            kinds,
            [
                None,
                None,
                Some(EventKind::FailStart),
                Some(EventKind::FailOngoing),
                Some(EventKind::FailRecovered),
            ]
        );
        assert_eq!(processor.state("web1"), Some(&CheckHealthState::default()));
    }

    #[test]
    fn test_events_fan_out_per_notifier() {
        let (mut processor, _rx) = processor(vec![web1()]);
        processor.process(fail());

        let events = processor.process(fail());
        let targets: Vec<&str> = events.iter().map(|e| e.notifier_id.as_str()).collect();
        assert_eq!(targets, ["mail", "chat"]);
        assert!(events.iter().all(|e| e.kind == EventKind::FailStart && e.check_id == "web1"));
        assert_eq!(events[0].snapshot.error.as_deref(), Some("connection refused"));

        let events = processor.process(slow());
        let pairs: Vec<(&str, EventKind)> =
            events.iter().map(|e| (e.notifier_id.as_str(), e.kind)).collect();
        assert_eq!(
            pairs,
            [
                ("mail", EventKind::FailRecovered),
                ("chat", EventKind::FailRecovered),
                ("chat", EventKind::SlowStart),
            ]
        );
    }

    #[test]
    fn test_empty_notifier_list_emits_nothing() {
        let mut check = web1();
        check.notify_fail = Some(Vec::new());
        let (mut processor, _rx) = processor(vec![check]);

        processor.process(fail());
        assert!(processor.process(fail()).is_empty());
        assert!(processor.state("web1").is_some_and(|s| s.failing));
    }

    #[test]
    fn test_unknown_check_is_dropped() {
        let (mut processor, _rx) = processor(vec![web1()]);
        let stray = CheckOutcome::new("gone").failure(Duration::ZERO, "boom");

        assert!(processor.process(stray).is_empty());
        assert!(processor.state("gone").is_none());
    }

    #[tokio::test]
    async fn test_run_publishes_and_stops_when_outcomes_close() {
        let (processor, mut events) = processor(vec![web1()]);
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(processor.run(rx));

        for outcome in [fail(), fail(), ok()] {
            tx.send(outcome).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        let mut kinds = Vec::new();
        while let Some(event) = events.recv().await {
            kinds.push((event.notifier_id, event.kind));
        }
        assert_eq!(
            kinds,
            [
                ("mail".to_string(), EventKind::FailStart),
                ("chat".to_string(), EventKind::FailStart),
                ("mail".to_string(), EventKind::FailRecovered),
                ("chat".to_string(), EventKind::FailRecovered),
            ]
        );
    }
}
