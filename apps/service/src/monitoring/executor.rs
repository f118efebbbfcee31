use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout};

use super::checker::{CheckError, CheckKind, Checker, HttpChecker, PingChecker, TcpChecker};
use super::types::CheckOutcome;
use crate::config::{CheckConfig, Global};

/// Per-kind execution time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub web: Duration,
    pub ping: Duration,
    pub port: Duration,
}

impl Timeouts {
    pub fn for_kind(&self, kind: CheckKind) -> Duration {
        match kind {
            CheckKind::Web => self.web,
            CheckKind::Ping => self.ping,
            CheckKind::Port => self.port,
        }
    }
}

impl From<&Global> for Timeouts {
    fn from(global: &Global) -> Self {
        Self { web: global.http_timeout, ping: global.ping_timeout, port: global.port_timeout }
    }
}

/// Monitoring executor - executes individual monitoring checks
pub struct MonitoringExecutor {
    web_checker: Arc<dyn Checker>,
    ping_checker: Arc<dyn Checker>,
    port_checker: Arc<dyn Checker>,
    timeouts: Timeouts,
}

impl MonitoringExecutor {
    /// Create an executor backed by the real HTTP, ping and TCP checkers
    pub fn new(timeouts: Timeouts) -> Result<Self, CheckError> {
        Ok(Self::with_checkers(
            Arc::new(HttpChecker::new(timeouts.web)?),
            Arc::new(PingChecker::new(timeouts.ping)),
            Arc::new(TcpChecker),
            timeouts,
        ))
    }

    pub fn with_checkers(
        web_checker: Arc<dyn Checker>,
        ping_checker: Arc<dyn Checker>,
        port_checker: Arc<dyn Checker>,
        timeouts: Timeouts,
    ) -> Self {
        Self { web_checker, ping_checker, port_checker, timeouts }
    }

    /// Execute a monitoring check.
    ///
    /// Never fails: errors and timeouts are recorded on the outcome.
    pub async fn execute_check(&self, check: &CheckConfig) -> CheckOutcome {
        let outcome = CheckOutcome::new(check.id.clone());

        let checker: &dyn Checker = match check.kind {
            CheckKind::Web => self.web_checker.as_ref(),
            CheckKind::Ping => self.ping_checker.as_ref(),
            CheckKind::Port => self.port_checker.as_ref(),
        };
        let limit = self.timeouts.for_kind(check.kind);

        let start = Instant::now();
        match timeout(limit, checker.check(check)).await {
            Ok(Ok(probe)) => {
                let latency = probe.latency.unwrap_or_else(|| start.elapsed());
                outcome.success(latency, probe.status_code, probe.body)
            }
            Ok(Err(e)) => outcome.failure(start.elapsed(), e.to_string()),
            Err(_) => outcome.failure(start.elapsed(), CheckError::Timeout(limit).to_string()),
        }
    }
}
