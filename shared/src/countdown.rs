use serde::{Deserialize, Serialize};

use crate::settings::DelayMinutes;

/// What a single one-second tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown moved (or stayed at zero).
    Counted,
    /// Armed and this tick reached zero: an automatic report is due. The
    /// countdown has been reset to the full delay.
    Fire,
}

/// Countdown to the next automatic report.
///
/// Two states: idle (`armed == false`) and armed. Only an armed countdown
/// fires. `generation` identifies the current chain of timer notifications;
/// it changes on every arm and disarm so that a notification scheduled by an
/// earlier chain can be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    delay: DelayMinutes,
    remaining_secs: u32,
    armed: bool,
    generation: u64,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(DelayMinutes::default())
    }
}

impl Countdown {
    #[must_use]
    pub fn new(delay: DelayMinutes) -> Self {
        Self {
            delay,
            remaining_secs: delay.as_secs(),
            armed: false,
            generation: 0,
        }
    }

    #[must_use]
    pub const fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub const fn delay(&self) -> DelayMinutes {
        self.delay
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a fresh countdown from the full delay. Returns the new
    /// generation the caller should schedule ticks for.
    pub fn arm(&mut self) -> u64 {
        self.armed = true;
        self.reset();
        self.next_generation()
    }

    /// Stops firing. The remaining time is kept as it is.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.next_generation();
    }

    /// New delay; the countdown restarts from it whether armed or not.
    pub fn set_delay(&mut self, delay: DelayMinutes) {
        self.delay = delay;
        self.reset();
    }

    /// Advances one second. An armed countdown fires on the tick that
    /// brings it to zero, so a full period is exactly `delay × 60` ticks.
    pub fn tick(&mut self) -> TickOutcome {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.armed && self.remaining_secs == 0 {
            self.reset();
            return TickOutcome::Fire;
        }
        TickOutcome::Counted
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("Countdown: {} secs", self.remaining_secs)
    }

    fn reset(&mut self) {
        self.remaining_secs = self.delay.as_secs();
    }

    fn next_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn minutes(n: u32) -> DelayMinutes {
        DelayMinutes::from_text(&n.to_string())
    }

    #[test]
    fn test_new_countdown_is_idle_and_full() {
        let countdown = Countdown::new(minutes(10));
        assert!(!countdown.is_armed());
        assert_eq!(countdown.remaining_secs(), 600);
        assert_eq!(countdown.label(), "Countdown: 600 secs");
    }

    #[test]
    fn test_idle_countdown_never_fires() {
        let mut countdown = Countdown::new(minutes(1));
        for _ in 0..200 {
            assert_eq!(countdown.tick(), TickOutcome::Counted);
        }
        assert_eq!(countdown.remaining_secs(), 0);
    }

    #[test]
    fn test_armed_countdown_fires_once_at_zero() {
        let mut countdown = Countdown::new(minutes(1));
        countdown.arm();

        let mut fired = 0;
        for _ in 0..59 {
            if countdown.tick() == TickOutcome::Fire {
                fired += 1;
            }
        }
        assert_eq!(fired, 0);
        assert_eq!(countdown.remaining_secs(), 1);

        assert_eq!(countdown.tick(), TickOutcome::Fire);
        assert_eq!(countdown.remaining_secs(), 60);

        assert_eq!(countdown.tick(), TickOutcome::Counted);
        assert_eq!(countdown.remaining_secs(), 59);
    }

    #[test]
    fn test_arm_resets_and_bumps_generation() {
        let mut countdown = Countdown::new(minutes(10));
        for _ in 0..30 {
            countdown.tick();
        }
        let before = countdown.generation();
        let generation = countdown.arm();
        assert!(countdown.is_armed());
        assert_eq!(countdown.remaining_secs(), 600);
        assert_ne!(generation, before);
        assert_eq!(generation, countdown.generation());
    }

    #[test]
    fn test_disarm_freezes_remaining() {
        let mut countdown = Countdown::new(minutes(10));
        let armed_generation = countdown.arm();
        for _ in 0..5 {
            countdown.tick();
        }
        countdown.disarm();
        assert!(!countdown.is_armed());
        assert_eq!(countdown.remaining_secs(), 595);
        assert_ne!(countdown.generation(), armed_generation);
    }

    #[test]
    fn test_set_delay_resets() {
        let mut countdown = Countdown::new(minutes(10));
        countdown.tick();
        countdown.set_delay(minutes(60));
        assert_eq!(countdown.remaining_secs(), 3600);
        assert_eq!(countdown.delay().get(), 60);
    }

    proptest! {
        #[test]
        fn prop_idle_ticks_saturate(delay in 1u32..=60, ticks in 0u32..5000) {
            let mut countdown = Countdown::new(minutes(delay));
            let initial = countdown.remaining_secs();
            for _ in 0..ticks {
                prop_assert_eq!(countdown.tick(), TickOutcome::Counted);
            }
            prop_assert_eq!(countdown.remaining_secs(), initial.saturating_sub(ticks));
        }

        #[test]
        fn prop_armed_fires_every_period(delay in 1u32..=3, periods in 1u32..4) {
            let mut countdown = Countdown::new(minutes(delay));
            countdown.arm();
            let period = delay * 60;
            let fire_ticks: Vec<u32> = (1..=period * periods)
                .filter(|_| countdown.tick() == TickOutcome::Fire)
                .collect();
            let expected: Vec<u32> = (1..=periods).map(|n| n * period).collect();
            prop_assert_eq!(fire_ticks, expected);
        }
    }
}
