use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use super::event::{EventKind, NotificationEvent, Phase, Snapshot};
use super::notifier::{Message, Notifier, NotifyError, build_notifier};
use super::schedule::RepeatState;
use crate::config::{Config, NotifierConfig};
use crate::monitoring::CheckKind;
use crate::template;

/// What happened to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Rendered and handed to the backend, which failed
    Failed,
    /// Not due yet according to the repeat schedule
    Suppressed,
    /// Addressed to an unknown notifier
    Dropped,
}

struct Target {
    config: Arc<NotifierConfig>,
    backend: Arc<dyn Notifier>,
}

/// (check, notifier, fail axis?)
type RepeatKey = (String, String, bool);

/// Notification dispatcher - single consumer of the event stream.
///
/// Start and recovery events are always delivered. Ongoing events are
/// delivered when the notifier's repeat schedule says so.
pub struct Dispatcher {
    targets: HashMap<String, Target>,
    repeats: HashMap<RepeatKey, RepeatState>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(send_timeout: Duration) -> Self {
        Self { targets: HashMap::new(), repeats: HashMap::new(), send_timeout }
    }

    /// Build one backend per configured notifier
    pub fn from_config(config: &Config) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::new(config.global.notify_timeout);
        for notifier in &config.notifiers {
            let backend = build_notifier(notifier, config.global.notify_timeout)?;
            dispatcher.register(Arc::new(notifier.clone()), backend);
        }
        Ok(dispatcher)
    }

    /// Register (or replace) the backend for a notifier
    pub fn register(&mut self, config: Arc<NotifierConfig>, backend: Arc<dyn Notifier>) {
        info!(notifier = %config.id, backend = backend.name(), "registered notifier");
        self.targets.insert(config.id.clone(), Target { config, backend });
    }

    /// Number of unresolved (check, notifier, axis) conditions
    pub fn active_conditions(&self) -> usize {
        self.repeats.len()
    }

    /// Consume events until every sender is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<NotificationEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        debug!("event stream closed, dispatcher stopped");
    }

    pub async fn dispatch(&mut self, event: NotificationEvent) -> Delivery {
        let Some(target) = self.targets.get(&event.notifier_id) else {
            warn!(
                check = %event.check_id,
                notifier = %event.notifier_id,
                kind = %event.kind,
                "event for unknown notifier, dropping"
            );
            return Delivery::Dropped;
        };

        let key = (event.check_id.clone(), event.notifier_id.clone(), event.kind.is_fail());
        let now = event.snapshot.timestamp;

        match event.kind.phase() {
            Phase::Start => {
                self.repeats.insert(key, RepeatState::started(now));
            }
            Phase::Ongoing => match self.repeats.get_mut(&key) {
                Some(state) => {
                    if !state.poll(target.config.repeat_schedule(event.kind), now) {
                        trace!(
                            check = %event.check_id,
                            notifier = %event.notifier_id,
                            kind = %event.kind,
                            "repeat not due"
                        );
                        return Delivery::Suppressed;
                    }
                }
                None => {
                    // start was never seen by this dispatcher, announce now
                    debug!(check = %event.check_id, notifier = %event.notifier_id, "ongoing event without start");
                    self.repeats.insert(key, RepeatState::started(now));
                }
            },
            Phase::Recovered => {
                self.repeats.remove(&key);
            }
        }

        deliver(target, &event, self.send_timeout).await
    }

    /// Send one synthetic failure message through every notifier.
    ///
    /// Returns the number of notifiers that failed.
    pub async fn test_all(&self) -> usize {
        let snapshot = Arc::new(test_snapshot());
        let mut failed = 0;

        for (id, target) in &self.targets {
            let event = NotificationEvent::new(id.clone(), EventKind::FailStart, snapshot.clone());
            if deliver(target, &event, self.send_timeout).await == Delivery::Failed {
                failed += 1;
            }
        }
        failed
    }
}

/// Render the subject and body templates for an event
pub fn render(config: &NotifierConfig, event: &NotificationEvent) -> Message {
    let (subject, body) = config.templates.for_event(event.kind);
    Message {
        subject: template::render(subject, &event.snapshot),
        body: template::render(body, &event.snapshot),
        kind: event.kind,
        snapshot: event.snapshot.clone(),
    }
}

async fn deliver(target: &Target, event: &NotificationEvent, send_timeout: Duration) -> Delivery {
    let message = render(&target.config, event);

    let result = match timeout(send_timeout, target.backend.send(&message)).await {
        Ok(result) => result,
        Err(_) => Err(NotifyError::Timeout(send_timeout)),
    };

    match result {
        Ok(()) => {
            info!(
                check = %event.check_id,
                notifier = %event.notifier_id,
                kind = %event.kind,
                subject = %message.subject,
                "notification sent"
            );
            Delivery::Sent
        }
        Err(e) => {
            error!(
                check = %event.check_id,
                notifier = %event.notifier_id,
                backend = target.backend.name(),
                target = %target.config.target(),
                kind = %event.kind,
                error = %e,
                "notification failed"
            );
            Delivery::Failed
        }
    }
}

fn test_snapshot() -> Snapshot {
    Snapshot {
        check_id: "test".to_string(),
        target: "uppe-monitor test notification".to_string(),
        kind: CheckKind::Web,
        params: String::new(),
        headers: String::new(),
        look_for: String::new(),
        expected_code: 200,
        expected_time: Duration::from_secs(1),
        timestamp: Local::now(),
        status_code: Some(200),
        latency: Duration::ZERO,
        error: Some("none, this is a test".to_string()),
        body: String::new(),
    }
}
