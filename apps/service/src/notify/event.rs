use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::config::CheckConfig;
use crate::monitoring::{CheckKind, CheckOutcome};

/// Threshold crossing observed by the result processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FailStart,
    FailOngoing,
    FailRecovered,
    SlowStart,
    SlowOngoing,
    SlowRecovered,
}

/// Position of an event in the life of one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Ongoing,
    Recovered,
}

impl EventKind {
    pub fn is_fail(self) -> bool {
        matches!(self, EventKind::FailStart | EventKind::FailOngoing | EventKind::FailRecovered)
    }

    pub fn phase(self) -> Phase {
        match self {
            EventKind::FailStart | EventKind::SlowStart => Phase::Start,
            EventKind::FailOngoing | EventKind::SlowOngoing => Phase::Ongoing,
            EventKind::FailRecovered | EventKind::SlowRecovered => Phase::Recovered,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::FailStart => "fail-start",
            EventKind::FailOngoing => "fail-ongoing",
            EventKind::FailRecovered => "fail-recovered",
            EventKind::SlowStart => "slow-start",
            EventKind::SlowOngoing => "slow-ongoing",
            EventKind::SlowRecovered => "slow-recovered",
        };
        f.write_str(name)
    }
}

/// Check parameters and outcome fields captured at the time of an event,
/// everything message templates can refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub check_id: String,
    pub target: String,
    pub kind: CheckKind,
    pub params: String,
    pub headers: String,
    pub look_for: String,
    pub expected_code: u16,
    pub expected_time: Duration,
    pub timestamp: DateTime<Local>,
    pub status_code: Option<u16>,
    pub latency: Duration,
    pub error: Option<String>,
    pub body: String,
}

impl Snapshot {
    pub fn capture(check: &CheckConfig, outcome: &CheckOutcome) -> Self {
        Self {
            check_id: check.id.clone(),
            target: check.check.clone(),
            kind: check.kind,
            params: check.params.clone(),
            headers: check.headers_line(),
            look_for: check.look_for.clone(),
            expected_code: check.expected_code,
            expected_time: check.expected_time(),
            timestamp: outcome.timestamp,
            status_code: outcome.status_code,
            latency: outcome.latency,
            error: outcome.error.clone(),
            body: outcome.body.clone(),
        }
    }
}

/// One event addressed to one notifier
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub check_id: String,
    pub notifier_id: String,
    pub kind: EventKind,
    pub snapshot: Arc<Snapshot>,
}

impl NotificationEvent {
    pub fn new(notifier_id: impl Into<String>, kind: EventKind, snapshot: Arc<Snapshot>) -> Self {
        Self { check_id: snapshot.check_id.clone(), notifier_id: notifier_id.into(), kind, snapshot }
    }
}
