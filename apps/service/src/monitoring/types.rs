use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Classification of a single check outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
    Degraded,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
            MonitorStatus::Degraded => write!(f, "degraded"),
        }
    }
}

/// Raw result of one poll of a check
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// ID of the check that was run
    pub check_id: String,

    /// When the check was started
    pub timestamp: DateTime<Local>,

    /// Response time
    pub latency: Duration,

    /// HTTP status code (web checks only)
    pub status_code: Option<u16>,

    /// Error message (if the check could not be completed)
    pub error: Option<String>,

    /// Response body (web checks only)
    pub body: String,
}

impl CheckOutcome {
    /// Create a new outcome stamped with the current time
    pub fn new(check_id: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            timestamp: Local::now(),
            latency: Duration::ZERO,
            status_code: None,
            error: None,
            body: String::new(),
        }
    }

    /// Record a completed check
    pub fn success(mut self, latency: Duration, status_code: Option<u16>, body: String) -> Self {
        self.latency = latency;
        self.status_code = status_code;
        self.body = body;
        self
    }

    /// Record a check that could not be completed
    pub fn failure(mut self, latency: Duration, error: impl Into<String>) -> Self {
        self.latency = latency;
        self.error = Some(error.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn latency_ms(&self) -> u128 {
        self.latency.as_millis()
    }
}
