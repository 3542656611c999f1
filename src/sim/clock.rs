use std::time::Duration;

/// Accelerated simulation clock driven by a monotonic tick counter.
///
/// Each tick stands for one real `period`, which maps onto
/// `period × acceleration` simulated seconds. The clock never reads the wall
/// clock; callers advance it explicitly.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hvac_sched::sim::clock::SimClock;
///
/// let mut clock = SimClock::new(6.0, Duration::from_secs(1));
/// assert_eq!(clock.step_secs(), 6.0);
///
/// clock.advance();
/// clock.advance();
/// assert_eq!(clock.tick(), 2);
/// assert_eq!(clock.now_secs(), 12.0);
/// ```
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Simulated seconds per real second.
    acceleration: f64,
    /// Real time represented by one tick.
    period: Duration,
    /// Ticks taken so far.
    ticks: u64,
}

impl SimClock {
    /// Creates a clock at tick zero.
    ///
    /// # Panics
    ///
    /// Panics if `acceleration` is not positive or `period` is zero.
    pub fn new(acceleration: f64, period: Duration) -> Self {
        assert!(acceleration > 0.0, "acceleration must be > 0");
        assert!(!period.is_zero(), "period must be > 0");
        Self {
            acceleration,
            period,
            ticks: 0,
        }
    }

    /// Converts a real elapsed interval to simulated seconds.
    pub fn simulated_secs(&self, real: Duration) -> f64 {
        real.as_secs_f64() * self.acceleration
    }

    /// Simulated seconds covered by one tick.
    pub fn step_secs(&self) -> f64 {
        self.simulated_secs(self.period)
    }

    /// Real time represented by one tick.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Takes one tick and returns the simulated step size.
    pub fn advance(&mut self) -> f64 {
        self.ticks += 1;
        self.step_secs()
    }

    /// Current simulated time in seconds.
    pub fn now_secs(&self) -> f64 {
        self.ticks as f64 * self.step_secs()
    }

    /// Number of ticks taken so far.
    pub fn tick(&self) -> u64 {
        self.ticks
    }
}

impl Default for SimClock {
    /// Six simulated seconds per one-second tick.
    fn default() -> Self {
        Self::new(6.0, Duration::from_secs(1))
    }
}
