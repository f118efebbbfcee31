use std::time::Duration;

use chrono::{DateTime, Local};

/// Escalation bookkeeping for one (check, notifier, axis) while the condition
/// is unresolved.
///
/// `index` points into the notifier's repeat schedule and only moves forward,
/// stopping at the last entry. A zero entry means no more repeats; a non-zero
/// last entry repeats at that interval until recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatState {
    last_sent: DateTime<Local>,
    index: usize,
}

impl RepeatState {
    /// State right after the start notification went out at `at`.
    pub fn started(at: DateTime<Local>) -> Self {
        Self { last_sent: at, index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn last_sent(&self) -> DateTime<Local> {
        self.last_sent
    }

    /// Whether an ongoing event at `now` should be announced again.
    pub fn is_due(&self, schedule: &[Duration], now: DateTime<Local>) -> bool {
        let Some(delay) = schedule.get(self.index) else {
            return false;
        };
        if delay.is_zero() {
            return false;
        }
        let elapsed = (now - self.last_sent).to_std().unwrap_or(Duration::ZERO);
        elapsed >= *delay
    }

    /// Record a repeat sent at `now`.
    pub fn advance(&mut self, schedule: &[Duration], now: DateTime<Local>) {
        self.index = (self.index + 1).min(schedule.len().saturating_sub(1));
        self.last_sent = now;
    }

    /// Check and advance in one step; returns whether to send.
    pub fn poll(&mut self, schedule: &[Duration], now: DateTime<Local>) -> bool {
        if !self.is_due(schedule, now) {
            return false;
        }
        self.advance(schedule, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn at(start: DateTime<Local>, m: i64) -> DateTime<Local> {
        start + TimeDelta::minutes(m)
    }

    #[test]
    fn test_escalating_schedule_clamps_at_last_entry() {
        let schedule = [minutes(1), minutes(5), minutes(10)];
        let start = Local::now();
        let mut state = RepeatState::started(start);

        let mut sent = vec![0];
        let mut indices = vec![state.index()];
        for m in [1, 3, 6, 11, 16, 20] {
            let before = state.clone();
            if state.poll(&schedule, at(start, m)) {
                sent.push(m);
                indices.push(state.index());
            } else {
                // suppressed polls leave the state untouched
                assert_eq!(state, before);
            }
        }

        assert_eq!(sent, [0, 1, 6, 16]);
        assert_eq!(indices, [0, 1, 2, 2]);
    }

    #[test]
    fn test_trailing_zero_stops_repeats() {
        let schedule = [minutes(5), Duration::ZERO];
        let start = Local::now();
        let mut state = RepeatState::started(start);

        let sent: Vec<i64> =
            (1..=180).filter(|m| state.poll(&schedule, at(start, *m))).collect();

        assert_eq!(sent, [5]);
    }

    #[test]
    fn test_empty_schedule_never_repeats() {
        let start = Local::now();
        let mut state = RepeatState::started(start);
        assert!(!state.poll(&[], at(start, 60)));
    }

    #[test]
    fn test_clock_going_backwards_is_not_due() {
        let start = Local::now();
        let state = RepeatState::started(start);
        assert!(!state.is_due(&[minutes(1)], at(start, -5)));
    }
}
