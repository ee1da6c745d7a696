use std::time::{Duration, Instant};

/// Pause-aware animation clock.
///
/// `elapsed = now - start - paused_accum`. While paused every tick adds its
/// delta to `paused_accum`, which holds `elapsed` constant; outside a pause the
/// accumulator is frozen. Pause transitions settle the accumulator up to the
/// transition instant first, so toggling never moves `elapsed`.
#[derive(Debug, Clone)]
pub struct ClockState {
    start: Instant,
    paused_accum: Duration,
    last_tick: Instant,
    paused: bool,
}

impl ClockState {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            paused_accum: Duration::ZERO,
            last_tick: start,
            paused: false,
        }
    }

    /// Advances the clock to `now` and returns the elapsed animation time.
    ///
    /// Instants earlier than the previous tick are treated as the previous
    /// tick.
    pub fn tick(&mut self, now: Instant) -> Duration {
        let now = now.max(self.last_tick);
        if self.paused {
            self.paused_accum += now - self.last_tick;
        }
        self.last_tick = now;
        self.elapsed()
    }

    /// Elapsed animation time as of the last tick.
    pub fn elapsed(&self) -> Duration {
        self.last_tick
            .saturating_duration_since(self.start)
            .saturating_sub(self.paused_accum)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn paused_accum(&self) -> Duration {
        self.paused_accum
    }

    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        self.tick(now);
        self.paused = paused;
    }

    /// Flips the paused flag at `now` and returns the new value.
    pub fn toggle_pause(&mut self, now: Instant) -> bool {
        let paused = !self.paused;
        self.set_paused(paused, now);
        paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn runs_with_wall_time_when_not_paused() {
        let start = Instant::now();
        let mut clock = ClockState::new(start);
        assert_eq!(clock.tick(start + 250 * MS), 250 * MS);
        assert_eq!(clock.tick(start + 1000 * MS), 1000 * MS);
    }

    #[test]
    fn elapsed_is_constant_while_paused() {
        let start = Instant::now();
        let mut clock = ClockState::new(start);
        clock.tick(start + 400 * MS);
        clock.set_paused(true, start + 500 * MS);
        let t1 = clock.tick(start + 600 * MS);
        let t2 = clock.tick(start + 5_000 * MS);
        assert_eq!(t1, 500 * MS);
        assert_eq!(t1, t2);
        assert_eq!(clock.paused_accum(), 4_500 * MS);
    }

    #[test]
    fn pause_and_resume_at_one_instant_changes_nothing() {
        let start = Instant::now();
        let mut clock = ClockState::new(start);
        let before = clock.tick(start + 700 * MS);
        assert!(clock.toggle_pause(start + 700 * MS));
        assert!(!clock.toggle_pause(start + 700 * MS));
        assert_eq!(clock.elapsed(), before);
        assert_eq!(clock.paused_accum(), Duration::ZERO);
    }

    #[test]
    fn resumes_from_where_it_paused() {
        let start = Instant::now();
        let mut clock = ClockState::new(start);
        clock.toggle_pause(start + 100 * MS);
        clock.tick(start + 300 * MS);
        clock.toggle_pause(start + 1_100 * MS);
        assert_eq!(clock.elapsed(), 100 * MS);
        assert_eq!(clock.tick(start + 1_150 * MS), 150 * MS);
    }

    #[test]
    fn accumulator_is_frozen_while_running() {
        let start = Instant::now();
        let mut clock = ClockState::new(start);
        clock.toggle_pause(start);
        clock.tick(start + 50 * MS);
        clock.toggle_pause(start + 50 * MS);
        let accum = clock.paused_accum();
        clock.tick(start + 900 * MS);
        assert_eq!(clock.paused_accum(), accum);
    }

    #[test]
    fn backwards_instants_do_not_rewind() {
        let start = Instant::now();
        let mut clock = ClockState::new(start);
        clock.tick(start + 200 * MS);
        assert_eq!(clock.tick(start + 100 * MS), 200 * MS);
    }
}
