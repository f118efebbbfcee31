use crate::config::CheckConfig;
use crate::monitoring::{CheckKind, CheckOutcome, MonitorStatus};
use crate::notify::EventKind;

/// Classify one outcome against the check's expectations.
///
/// `Down` wins over `Degraded`: a failed run is never also reported slow.
pub fn classify(check: &CheckConfig, outcome: &CheckOutcome) -> MonitorStatus {
    if outcome.error.is_some() {
        return MonitorStatus::Down;
    }
    if check.kind == CheckKind::Web && outcome.status_code != Some(check.expected_code) {
        return MonitorStatus::Down;
    }
    if !check.look_for.is_empty() && !outcome.body.contains(&check.look_for) {
        return MonitorStatus::Down;
    }
    if outcome.latency > check.expected_time() {
        return MonitorStatus::Degraded;
    }
    MonitorStatus::Up
}

/// Events produced by one observation, at most one per axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transitions {
    pub fail: Option<EventKind>,
    pub slow: Option<EventKind>,
}

impl Transitions {
    pub fn iter(&self) -> impl Iterator<Item = EventKind> {
        self.fail.into_iter().chain(self.slow)
    }
}

/// Hysteresis state of one check.
///
/// The fail and slow axes are tracked independently. A `Down` outcome ends a
/// slow streak without announcing anything on the slow axis, and any
/// non-`Down` outcome ends the fail streak.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckHealthState {
    pub fails: u32,
    pub slows: u32,
    pub failing: bool,
    pub slow: bool,
}

impl CheckHealthState {
    pub fn observe(
        &mut self,
        status: MonitorStatus,
        allowed_fails: u32,
        allowed_slows: u32,
    ) -> Transitions {
        match status {
            MonitorStatus::Down => {
                self.fails = self.fails.saturating_add(1);
                self.slows = 0;
                let fail = if self.failing {
                    Some(EventKind::FailOngoing)
                } else if self.fails >= allowed_fails {
                    self.failing = true;
                    Some(EventKind::FailStart)
                } else {
                    None
                };
                Transitions { fail, slow: None }
            }
            MonitorStatus::Degraded => {
                let fail = self.recover_fail();
                self.slows = self.slows.saturating_add(1);
                let slow = if self.slow {
                    Some(EventKind::SlowOngoing)
                } else if self.slows >= allowed_slows {
                    self.slow = true;
                    Some(EventKind::SlowStart)
                } else {
                    None
                };
                Transitions { fail, slow }
            }
            MonitorStatus::Up => {
                Transitions { fail: self.recover_fail(), slow: self.recover_slow() }
            }
        }
    }

    fn recover_fail(&mut self) -> Option<EventKind> {
        self.fails = 0;
        std::mem::take(&mut self.failing).then_some(EventKind::FailRecovered)
    }

    fn recover_slow(&mut self) -> Option<EventKind> {
        self.slows = 0;
        std::mem::take(&mut self.slow).then_some(EventKind::SlowRecovered)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::monitoring::MonitorStatus::{Degraded, Down, Up};

    fn run(statuses: &[MonitorStatus], allowed_fails: u32, allowed_slows: u32) -> Vec<Vec<EventKind>> {
        let mut state = CheckHealthState::default();
        statuses
            .iter()
            .map(|status| state.observe(*status, allowed_fails, allowed_slows).iter().collect())
            .collect()
    }

    #[test]
    fn test_fail_rising_and_falling_edge() {
        let events = run(&[Up, Down, Down, Down, Up], 2, 3);
        assert_eq!(
            events,
            [
                vec![],
                vec![],
                vec![EventKind::FailStart],
                vec![EventKind::FailOngoing],
                vec![EventKind::FailRecovered],
            ]
        );
    }

    #[test]
    fn test_recovery_resets_counters() {
        let mut state = CheckHealthState::default();
        state.observe(Down, 1, 1);
        state.observe(Up, 1, 1);
        assert_eq!(state, CheckHealthState::default());

        // a fresh rising edge starts again
        assert_eq!(state.observe(Down, 1, 1).fail, Some(EventKind::FailStart));
    }

    #[test]
    fn test_below_threshold_never_notifies() {
        let events = run(&[Down, Up, Down, Degraded, Degraded, Up, Down, Up], 2, 3);
        assert!(events.iter().all(Vec::is_empty), "{events:?}");
    }

    #[test]
    fn test_alternating_fail_and_slow_do_not_mix() {
        // each axis keeps getting interrupted by the other
        let events = run(&[Down, Degraded, Down, Degraded, Down, Degraded], 2, 2);
        assert!(events.iter().all(Vec::is_empty), "{events:?}");
    }

    #[test]
    fn test_slow_edges() {
        let events = run(&[Degraded, Degraded, Degraded, Up], 1, 2);
        assert_eq!(
            events,
            [
                vec![],
                vec![EventKind::SlowStart],
                vec![EventKind::SlowOngoing],
                vec![EventKind::SlowRecovered],
            ]
        );
    }

    #[test]
    fn test_slow_run_recovers_fail_axis() {
        let events = run(&[Down, Degraded], 1, 1);
        assert_eq!(
            events,
            [vec![EventKind::FailStart], vec![EventKind::FailRecovered, EventKind::SlowStart]]
        );
    }

    #[test]
    fn test_fail_while_slow_keeps_slow_condition_open() {
        let events = run(&[Degraded, Down, Degraded, Up], 2, 1);
        assert_eq!(
            events,
            [
                vec![EventKind::SlowStart],
                vec![],
                vec![EventKind::SlowOngoing],
                vec![EventKind::SlowRecovered],
            ]
        );
    }

    fn web_check() -> CheckConfig {
        let mut check = CheckConfig::new("web1", "https://example.com", CheckKind::Web);
        check.expected_code = 200;
        check.expected_time = 500;
        check
    }

    #[test]
    fn test_classify() {
        let check = web_check();
        let ok = |ms| CheckOutcome::new("web1").success(Duration::from_millis(ms), Some(200), "hello".into());

        assert_eq!(classify(&check, &ok(100)), Up);
        assert_eq!(classify(&check, &ok(500)), Up);
        assert_eq!(classify(&check, &ok(501)), Degraded);

        let wrong_code = CheckOutcome::new("web1").success(Duration::ZERO, Some(503), String::new());
        assert_eq!(classify(&check, &wrong_code), Down);

        let error = CheckOutcome::new("web1").failure(Duration::from_secs(2), "connection refused");
        assert_eq!(classify(&check, &error), Down);
    }

    #[test]
    fn test_classify_look_for() {
        let mut check = web_check();
        check.look_for = "healthy".to_string();

        let body = |text: &str| CheckOutcome::new("web1").success(Duration::ZERO, Some(200), text.into());
        assert_eq!(classify(&check, &body("status: healthy")), Up);
        assert_eq!(classify(&check, &body("status: degraded")), Down);
    }

    #[test]
    fn test_classify_ignores_status_for_port_checks() {
        let mut check = CheckConfig::new("db", "db.example.com", CheckKind::Port);
        check.port = Some(5432);
        check.expected_code = 200;
        check.expected_time = 1000;

        let outcome = CheckOutcome::new("db").success(Duration::from_millis(3), None, String::new());
        assert_eq!(classify(&check, &outcome), Up);
    }
}
