//! Retention policies: which snapshots of a group are due for destruction.
//!
//! Two mutually exclusive modes exist:
//!
//! - **Age**: a cutoff instant is derived from "now" by subtracting calendar
//!   months, then weeks, days, hours and minutes. Snapshots strictly older than
//!   the cutoff expire.
//! - **Count**: the `keep` newest snapshots survive, the rest expire.

use chrono::{DateTime, FixedOffset, Months, TimeDelta, TimeZone};

use crate::clock::truncate_to_minute;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Errors raised while validating retention arguments or computing a cutoff.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetentionError {
    #[error("retention argument '{name}' must not be negative (got {value})")]
    Negative { name: &'static str, value: i64 },

    #[error("retention argument '{name}' is too large (got {value})")]
    TooLarge { name: &'static str, value: i64 },

    #[error("retention cutoff falls outside the supported calendar range")]
    OutOfCalendar,
}

/// Calendar offsets for age based retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionOffsets {
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl RetentionOffsets {
    #[must_use]
    pub const fn new(months: i64, weeks: i64, days: i64, hours: i64, minutes: i64) -> Self {
        Self {
            months,
            weeks,
            days,
            hours,
            minutes,
        }
    }

    const fn fields(&self) -> [(&'static str, i64); 5] {
        [
            ("months", self.months),
            ("weeks", self.weeks),
            ("days", self.days),
            ("hours", self.hours),
            ("minutes", self.minutes),
        ]
    }

    /// Check every field independently so the error names the offending one.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::Negative`] for the first negative field.
    pub fn validate(&self) -> Result<(), RetentionError> {
        for (name, value) in self.fields() {
            if value < 0 {
                return Err(RetentionError::Negative { name, value });
            }
        }
        Ok(())
    }

    /// True when every offset is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.months == 0 && self.weeks == 0 && self.days == 0 && self.hours == 0 && self.minutes == 0
    }

    /// Weeks, days, hours and minutes as one elapsed span.
    fn elapsed(&self) -> Result<TimeDelta, RetentionError> {
        let mut total: i64 = 0;
        for (name, value, unit) in [
            ("weeks", self.weeks, WEEK),
            ("days", self.days, DAY),
            ("hours", self.hours, HOUR),
            ("minutes", self.minutes, MINUTE),
        ] {
            total = value
                .checked_mul(unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or(RetentionError::TooLarge { name, value })?;
        }
        TimeDelta::try_seconds(total).ok_or(RetentionError::OutOfCalendar)
    }
}

/// Compute the instant before which snapshots expire.
///
/// `now` is truncated to the minute. Months are subtracted first on the
/// calendar, clamping to the last day of a shorter target month (March 31
/// minus one month is February 28 or 29). The remaining offsets are
/// subtracted as elapsed time in the time zone of `now`.
///
/// # Errors
///
/// Returns [`RetentionError::Negative`] naming the first negative offset,
/// [`RetentionError::TooLarge`] when an offset overflows, and
/// [`RetentionError::OutOfCalendar`] when the result is not representable.
pub fn cutoff<Tz: TimeZone>(
    now: DateTime<Tz>,
    offsets: &RetentionOffsets,
) -> Result<DateTime<Tz>, RetentionError> {
    offsets.validate()?;
    let months = u32::try_from(offsets.months).map_err(|_| RetentionError::TooLarge {
        name: "months",
        value: offsets.months,
    })?;
    let elapsed = offsets.elapsed()?;

    truncate_to_minute(now)
        .checked_sub_months(Months::new(months))
        .and_then(|shifted| shifted.checked_sub_signed(elapsed))
        .ok_or(RetentionError::OutOfCalendar)
}

/// Retention mode for the destroy phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Destroy snapshots older than the cutoff derived from these offsets.
    Age(RetentionOffsets),
    /// Keep this many newest snapshots per group, destroy the rest.
    Count(usize),
}

impl Retention {
    /// Fix the policy against `now`, computing the age cutoff if any.
    ///
    /// Runs before any backend work so that every bad argument, including
    /// offsets too large for the calendar, fails the run up front.
    ///
    /// # Errors
    ///
    /// Propagates [`cutoff`] failures for age retention.
    pub fn resolve(&self, now: DateTime<FixedOffset>) -> Result<Expiry, RetentionError> {
        match self {
            Self::Age(offsets) => cutoff(now, offsets).map(Expiry::Before),
            Self::Count(keep) => Ok(Expiry::KeepNewest(*keep)),
        }
    }
}

/// A [`Retention`] resolved against one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Items strictly older than this instant expire.
    Before(DateTime<FixedOffset>),
    /// All but this many newest items expire.
    KeepNewest(usize),
}

impl Expiry {
    /// The expired subset of `items`.
    #[must_use]
    pub fn select<T: Dated>(self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        match self {
            Self::Before(cutoff) => expired_by_age(items, cutoff),
            Self::KeepNewest(keep) => expired_by_count(items, keep),
        }
    }
}

/// Anything carrying a creation instant.
pub trait Dated {
    fn created_at(&self) -> DateTime<FixedOffset>;
}

impl<T: Dated + ?Sized> Dated for &T {
    fn created_at(&self) -> DateTime<FixedOffset> {
        (**self).created_at()
    }
}

/// Items strictly older than `cutoff`, in input order.
#[must_use]
pub fn expired_by_age<T: Dated>(
    items: impl IntoIterator<Item = T>,
    cutoff: DateTime<FixedOffset>,
) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| item.created_at() < cutoff)
        .collect()
}

/// Everything but the `keep` newest items, newest first.
///
/// Items with equal timestamps keep their input order.
#[must_use]
pub fn expired_by_count<T: Dated>(items: impl IntoIterator<Item = T>, keep: usize) -> Vec<T> {
    let mut items: Vec<T> = items.into_iter().collect();
    items.sort_by_key(|item| std::cmp::Reverse(item.created_at()));
    let keep = keep.min(items.len());
    items.split_off(keep)
}
