//! Outbound flood control.
//!
//! The writer asks its [`FloodPreventer`] how long to wait before each line
//! and reports every line it actually wrote. Callers must call
//! [`FloodPreventer::message_sent`] exactly once per write, right after it;
//! the policies cannot detect misuse.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// "May I send now / I just sent" policy.
pub trait FloodPreventer: Send {
    /// Time to wait before the next send is permitted.
    fn send_delay(&mut self) -> Duration;

    /// Record that one message was just written.
    fn message_sent(&mut self);
}

/// Token-bucket limiter.
///
/// `counter` rises by one per send and falls by one per elapsed
/// `counter_period`, computed lazily on each query. The reference point for
/// decrements advances in whole periods so the remainder carries over.
#[derive(Debug, Clone)]
pub struct StandardFloodPreventer {
    max_burst: u32,
    counter_period: Duration,
    counter: u32,
    last_decrement: Instant,
}

impl StandardFloodPreventer {
    pub fn new(max_burst: u32, counter_period: Duration) -> Self {
        Self::starting_at(max_burst, counter_period, Instant::now())
    }

    /// Construct with an explicit clock origin.
    pub fn starting_at(max_burst: u32, counter_period: Duration, now: Instant) -> Self {
        Self {
            max_burst,
            counter_period,
            counter: 0,
            last_decrement: now,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// [`FloodPreventer::send_delay`] evaluated at `now`.
    pub fn send_delay_at(&mut self, now: Instant) -> Duration {
        self.decay(now);
        let over = self.counter.saturating_sub(self.max_burst);
        let elapsed = now.saturating_duration_since(self.last_decrement);
        (self.counter_period * over).saturating_sub(elapsed)
    }

    /// [`FloodPreventer::message_sent`] evaluated at `now`.
    pub fn message_sent_at(&mut self, now: Instant) {
        self.decay(now);
        self.counter = self.counter.saturating_add(1);
    }

    fn decay(&mut self, now: Instant) {
        if self.counter_period.is_zero() {
            self.counter = 0;
            self.last_decrement = now;
            return;
        }
        let elapsed = now.saturating_duration_since(self.last_decrement);
        let periods = elapsed.as_nanos() / self.counter_period.as_nanos();
        if periods == 0 {
            return;
        }
        let periods = u32::try_from(periods).unwrap_or(u32::MAX);
        self.counter = self.counter.saturating_sub(periods);
        self.last_decrement += self.counter_period * periods;
    }
}

impl FloodPreventer for StandardFloodPreventer {
    fn send_delay(&mut self) -> Duration {
        self.send_delay_at(Instant::now())
    }

    fn message_sent(&mut self) {
        self.message_sent_at(Instant::now())
    }
}

/// No limiting at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFloodPrevention;

impl FloodPreventer for NoFloodPrevention {
    fn send_delay(&mut self) -> Duration {
        Duration::ZERO
    }

    fn message_sent(&mut self) {}
}

/// At least `interval` between consecutive sends.
#[derive(Debug, Clone)]
pub struct FixedIntervalFloodPreventer {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl FixedIntervalFloodPreventer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn send_delay_at(&self, now: Instant) -> Duration {
        match self.last_sent {
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub fn message_sent_at(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

impl FloodPreventer for FixedIntervalFloodPreventer {
    fn send_delay(&mut self) -> Duration {
        self.send_delay_at(Instant::now())
    }

    fn message_sent(&mut self) {
        self.message_sent_at(Instant::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloodPolicy {
    #[default]
    Standard,
    None,
    Fixed,
}

/// Flood settings as they appear in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodConfig {
    #[serde(default)]
    pub policy: FloodPolicy,
    #[serde(default = "default_max_burst")]
    pub max_burst: u32,
    #[serde(default = "default_counter_period_ms")]
    pub counter_period_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            policy: FloodPolicy::default(),
            max_burst: default_max_burst(),
            counter_period_ms: default_counter_period_ms(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl FloodConfig {
    pub fn build(&self) -> Box<dyn FloodPreventer> {
        match self.policy {
            FloodPolicy::Standard => Box::new(StandardFloodPreventer::new(
                self.max_burst,
                Duration::from_millis(self.counter_period_ms),
            )),
            FloodPolicy::None => Box::new(NoFloodPrevention),
            FloodPolicy::Fixed => Box::new(FixedIntervalFloodPreventer::new(Duration::from_millis(
                self.interval_ms,
            ))),
        }
    }
}

fn default_max_burst() -> u32 {
    4
}

fn default_counter_period_ms() -> u64 {
    2000
}

fn default_interval_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(2000);

    #[test]
    fn test_burst_then_delay() {
        let t0 = Instant::now();
        let mut fp = StandardFloodPreventer::starting_at(5, PERIOD, t0);
        for _ in 0..5 {
            fp.message_sent_at(t0);
            assert_eq!(fp.send_delay_at(t0), Duration::ZERO);
        }
        fp.message_sent_at(t0);
        assert_eq!(fp.send_delay_at(t0), PERIOD);
    }

    #[test]
    fn test_delay_decreases_with_time() {
        let t0 = Instant::now();
        let mut fp = StandardFloodPreventer::starting_at(5, PERIOD, t0);
        for _ in 0..7 {
            fp.message_sent_at(t0);
        }
        assert_eq!(fp.send_delay_at(t0), Duration::from_millis(4000));
        assert_eq!(
            fp.send_delay_at(t0 + Duration::from_millis(1500)),
            Duration::from_millis(2500)
        );
        assert_eq!(fp.send_delay_at(t0 + PERIOD), PERIOD);
        assert_eq!(fp.counter(), 6);
        assert_eq!(fp.send_delay_at(t0 + PERIOD * 2), Duration::ZERO);
        assert_eq!(fp.counter(), 5);
    }

    #[test]
    fn test_remainder_carries_across_queries() {
        let t0 = Instant::now();
        let mut fp = StandardFloodPreventer::starting_at(0, PERIOD, t0);
        for _ in 0..3 {
            fp.message_sent_at(t0);
        }
        // Many rapid queries inside one period lose nothing.
        for ms in [100u64, 900, 1300, 1999] {
            fp.send_delay_at(t0 + Duration::from_millis(ms));
            assert_eq!(fp.counter(), 3);
        }
        // 2.5 periods: two decrements, 500ms carried.
        fp.send_delay_at(t0 + Duration::from_millis(5000));
        assert_eq!(fp.counter(), 1);
        fp.send_delay_at(t0 + Duration::from_millis(6000));
        assert_eq!(fp.counter(), 0);
    }

    #[test]
    fn test_counter_never_negative() {
        let t0 = Instant::now();
        let mut fp = StandardFloodPreventer::starting_at(5, PERIOD, t0);
        fp.message_sent_at(t0);
        assert_eq!(fp.send_delay_at(t0 + PERIOD * 10), Duration::ZERO);
        assert_eq!(fp.counter(), 0);
    }

    #[test]
    fn test_fixed_interval() {
        let t0 = Instant::now();
        let mut fp = FixedIntervalFloodPreventer::new(Duration::from_millis(500));
        assert_eq!(fp.send_delay_at(t0), Duration::ZERO);
        fp.message_sent_at(t0);
        assert_eq!(
            fp.send_delay_at(t0 + Duration::from_millis(200)),
            Duration::from_millis(300)
        );
        assert_eq!(fp.send_delay_at(t0 + Duration::from_millis(600)), Duration::ZERO);
    }

    #[test]
    fn test_policies_are_substitutable() {
        let mut policies: Vec<Box<dyn FloodPreventer>> = vec![
            FloodConfig::default().build(),
            Box::new(NoFloodPrevention),
            FloodConfig {
                policy: FloodPolicy::Fixed,
                ..FloodConfig::default()
            }
            .build(),
        ];
        for p in policies.iter_mut() {
            assert_eq!(p.send_delay(), Duration::ZERO);
            p.message_sent();
        }
    }
}
