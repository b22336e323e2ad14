//! Discrete simulation time.

use chrono::{NaiveDateTime, TimeDelta};

/// Step counter with an optional calendar anchor and horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    step: usize,
    horizon: Option<usize>,
    start: Option<NaiveDateTime>,
    step_duration: TimeDelta,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            step: 0,
            horizon: None,
            start: None,
            step_duration: TimeDelta::hours(1),
        }
    }
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to run past `steps` steps.
    pub fn with_horizon(mut self, steps: usize) -> Self {
        self.horizon = Some(steps);
        self
    }

    /// Anchor step 0 at `start`, so every step gets a timestamp.
    pub fn starting_at(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_step_duration(mut self, duration: TimeDelta) -> Self {
        self.step_duration = duration;
        self
    }

    /// Next step to be simulated.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn horizon(&self) -> Option<usize> {
        self.horizon
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    pub fn step_duration(&self) -> TimeDelta {
        self.step_duration
    }

    /// Steps left before the horizon, if there is one.
    pub fn remaining(&self) -> Option<usize> {
        self.horizon.map(|h| h.saturating_sub(self.step))
    }

    /// Whether `step` lies inside the horizon.
    pub fn allows(&self, step: usize) -> bool {
        self.horizon.is_none_or(|h| step < h)
    }

    /// Wall-clock time of `step`. `None` without a start or on overflow.
    pub fn timestamp(&self, step: usize) -> Option<NaiveDateTime> {
        let start = self.start?;
        let factor = i32::try_from(step).ok()?;
        let offset = self.step_duration.checked_mul(factor)?;
        start.checked_add_signed(offset)
    }

    pub(crate) fn advance(&mut self) {
        self.step += 1;
    }

    pub(crate) fn rewind(&mut self) {
        self.step = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn midnight() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn timestamps_follow_step_duration() {
        let clock = SimulationClock::new()
            .starting_at(midnight())
            .with_step_duration(TimeDelta::minutes(15));
        assert_eq!(clock.timestamp(0), Some(midnight()));
        assert_eq!(clock.timestamp(5), Some(midnight() + TimeDelta::minutes(75)));
    }

    #[test]
    fn no_start_means_no_timestamp() {
        assert_eq!(SimulationClock::new().timestamp(3), None);
    }

    #[test]
    fn horizon_bounds_steps() {
        let mut clock = SimulationClock::new().with_horizon(2);
        assert!(clock.allows(1));
        assert!(!clock.allows(2));
        clock.advance();
        assert_eq!(clock.remaining(), Some(1));
        clock.rewind();
        assert_eq!(clock.step(), 0);
    }
}
