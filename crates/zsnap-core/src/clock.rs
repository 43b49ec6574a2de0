//! Source of "now" for snapshot creation and retention cutoffs.

use chrono::{DateTime, FixedOffset, Local, Offset, TimeDelta, TimeZone, Timelike};

/// Wall clock used by a run.
pub trait Clock {
    /// Current instant in the local UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The system clock in the machine's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let now = Local::now();
        now.with_timezone(&now.offset().fix())
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    #[must_use]
    pub const fn new(at: DateTime<FixedOffset>) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Drop seconds and sub-second precision, keeping the time zone.
#[must_use]
pub fn truncate_to_minute<Tz: TimeZone>(time: DateTime<Tz>) -> DateTime<Tz> {
    let excess = TimeDelta::seconds(i64::from(time.second()))
        + TimeDelta::nanoseconds(i64::from(time.nanosecond()));
    time - excess
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_keeps_offset_and_minute() {
        let offset = FixedOffset::east_opt(3600).expect("valid offset");
        let time = offset
            .with_ymd_and_hms(2010, 6, 15, 12, 30, 10)
            .single()
            .expect("valid time")
            + TimeDelta::milliseconds(250);
        let truncated = truncate_to_minute(time);
        assert_eq!(
            truncated,
            offset
                .with_ymd_and_hms(2010, 6, 15, 12, 30, 0)
                .single()
                .expect("valid time")
        );
        assert_eq!(truncated.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn fixed_clock_is_frozen() {
        let at = FixedOffset::west_opt(5 * 3600)
            .expect("valid offset")
            .with_ymd_and_hms(2000, 10, 30, 1, 2, 0)
            .single()
            .expect("valid time");
        let clock = FixedClock::new(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn system_clock_reports_local_offset() {
        let now = SystemClock.now();
        let local = Local::now();
        assert_eq!(
            now.offset().local_minus_utc(),
            local.offset().fix().local_minus_utc()
        );
    }
}
