//! Polling cadence.
//!
//! The cadence itself is pure; the driver only asks when the next run is due
//! and sleeps on a [`Clock`], so tests can run many cycles without waiting.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Start of the run after one that started at `last_run`.
pub fn next_run_at(last_run: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let interval = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX);
    last_run.checked_add_signed(interval).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// How long to sleep from `now` until `next`; zero if already due.
pub fn delay_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Source of time for the polling loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-interval schedule anchored at the start of the previous run.
///
/// A run that overruns the interval makes the next one due immediately;
/// runs never overlap because the driver is sequential.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// When the next run is due. The first run is due immediately.
    pub fn due_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.last_run
            .map(|last| next_run_at(last, self.interval))
            .unwrap_or(now)
    }

    pub fn delay(&self, now: DateTime<Utc>) -> Duration {
        delay_until(self.due_at(now), now)
    }

    pub fn record_run(&mut self, started_at: DateTime<Utc>) {
        self.last_run = Some(started_at);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Clock that only moves when slept on or advanced by hand.
    #[derive(Debug)]
    pub(crate) struct ManualClock {
        now: Mutex<DateTime<Utc>>,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl ManualClock {
        pub(crate) fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(start),
                sleeps: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(by).unwrap();
        }

        pub(crate) fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
            self.advance(duration);
        }
    }

    fn t(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_next_run_at_adds_interval() {
        assert_eq!(next_run_at(t(10, 0, 0), Duration::from_secs(720)), t(10, 12, 0));
    }

    #[test]
    fn test_delay_until_is_zero_when_overdue() {
        assert_eq!(delay_until(t(10, 12, 0), t(10, 5, 0)), Duration::from_secs(420));
        assert_eq!(delay_until(t(10, 12, 0), t(10, 12, 0)), Duration::ZERO);
        assert_eq!(delay_until(t(10, 12, 0), t(10, 30, 0)), Duration::ZERO);
    }

    #[test]
    fn test_scheduler_anchors_on_run_start() {
        let mut scheduler = Scheduler::new(Duration::from_secs(720));
        assert_eq!(scheduler.delay(t(9, 0, 0)), Duration::ZERO);

        scheduler.record_run(t(10, 0, 0));
        // a 3 minute cycle leaves 9 minutes to wait
        assert_eq!(scheduler.delay(t(10, 3, 0)), Duration::from_secs(540));
        // an overrunning cycle starts the next one at once
        assert_eq!(scheduler.delay(t(10, 20, 0)), Duration::ZERO);
    }

    #[test]
    fn test_huge_interval_saturates() {
        let next = next_run_at(t(10, 0, 0), Duration::from_secs(u64::MAX));
        assert_eq!(next, DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_time() {
        let clock = ManualClock::new(t(10, 0, 0));
        clock.sleep(Duration::from_secs(60)).await;
        assert_eq!(clock.now(), t(10, 1, 0));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }
}
