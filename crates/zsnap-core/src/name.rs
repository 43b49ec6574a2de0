//! Snapshot name codec.
//!
//! Every snapshot created by zsnap carries its identity in its backend name:
//!
//! ```text
//! VOLUME@zsnap_YYYY-MM-DD_HH:MM:SS              legacy, UTC, no group
//! VOLUME@zsnap_YYYY-MM-DD_HH:MM_TZOFF           local time, no group
//! VOLUME@zsnap_GROUP_YYYY-MM-DD_HH:MM_TZOFF     local time, grouped
//! ```
//!
//! `TZOFF` is the `%z` offset without its `+` sign (`0100`, `0000`, `-0500`).
//! Only the two current layouts are ever written; the legacy layout is still
//! decoded so that snapshots taken by old releases keep aging out.
//!
//! Decoding splits the part after `@` on `_` and tries each mask in order.
//! A mask matches when the segment count is exact and every segment passes its
//! field check. Names that match no mask belong to someone else and must be
//! left alone.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::clock::truncate_to_minute;
use crate::error::ErrorCode;

/// Literal first segment of every zsnap snapshot name.
pub const PREFIX: &str = "zsnap";

const CURRENT_STAMP_FORMAT: &str = "%Y-%m-%d_%H:%M_%z";
const LEGACY_STAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while encoding or decoding snapshot names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The name matches none of the known layouts.
    #[error("snapshot name '{0}' does not match any zsnap name format")]
    InvalidFormat(String),

    /// The group name contains characters outside `[-A-Za-z0-9]`.
    #[error("invalid group name '{0}': only A-Z, a-z, 0-9 and '-' are allowed")]
    InvalidGroup(String),

    /// The volume name is empty or contains `@`.
    #[error("invalid volume name '{0}'")]
    InvalidVolume(String),
}

impl NameError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidFormat(_) => ErrorCode::InvalidSnapshotName,
            Self::InvalidGroup(_) => ErrorCode::InvalidGroupName,
            Self::InvalidVolume(_) => ErrorCode::InvalidVolumeName,
        }
    }
}

// ---------------------------------------------------------------------------
// Group names
// ---------------------------------------------------------------------------

/// Validated group name, embeddable in a snapshot name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupName(String);

impl GroupName {
    /// Validate `raw` against `[-A-Za-z0-9]+`.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidGroup`] for empty names or names with any
    /// other character (notably `_`, `:` and `@`).
    pub fn new(raw: impl Into<String>) -> Result<Self, NameError> {
        let raw = raw.into();
        if is_group_name(&raw) {
            Ok(Self(raw))
        } else {
            Err(NameError::InvalidGroup(raw))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GroupName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GroupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_group_name(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Check that `name` can stand left of the `@` in a snapshot name.
///
/// # Errors
///
/// Returns [`NameError::InvalidVolume`] when the name is empty or contains `@`.
pub fn validate_volume_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() || name.contains('@') || name.chars().any(char::is_control) {
        return Err(NameError::InvalidVolume(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Snapshot names
// ---------------------------------------------------------------------------

/// Name layout revision a snapshot name was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameFormat {
    /// `zsnap_<date>_<HH:MM:SS>` in UTC, no group.
    Legacy,
    /// `zsnap_[<group>_]<date>_<HH:MM>_<tz>` in local time.
    Current,
}

/// Structured form of a zsnap snapshot name.
///
/// [`SnapshotName::encode`] and [`SnapshotName::decode`] are inverse: a decoded
/// name encodes back to the exact input string, and an encoded name decodes to
/// the same volume, group and instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    volume: String,
    group: Option<GroupName>,
    time: DateTime<FixedOffset>,
    format: NameFormat,
}

impl SnapshotName {
    /// Build a current-format name. `time` keeps its own UTC offset and is
    /// truncated to the minute.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidVolume`] for an unusable volume name.
    pub fn new<Tz: TimeZone>(
        volume: impl Into<String>,
        group: Option<GroupName>,
        time: &DateTime<Tz>,
    ) -> Result<Self, NameError> {
        let volume = volume.into();
        validate_volume_name(&volume)?;
        let time = time.with_timezone(&time.offset().fix());
        Ok(Self {
            volume,
            group,
            time: truncate_to_minute(time),
            format: NameFormat::Current,
        })
    }

    /// Parse a backend snapshot name.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidFormat`] when no known layout matches.
    pub fn decode(name: &str) -> Result<Self, NameError> {
        let invalid = || NameError::InvalidFormat(name.to_string());

        let (volume, rest) = name.split_once('@').ok_or_else(invalid)?;
        if validate_volume_name(volume).is_err() {
            return Err(invalid());
        }

        let segments: Vec<&str> = rest.split('_').collect();
        let (format, captures) = MASKS
            .iter()
            .find_map(|mask| mask.apply(&segments).map(|caps| (mask.format, caps)))
            .ok_or_else(invalid)?;

        let time = captures.instant().ok_or_else(invalid)?;
        let group = captures.group.map(|g| GroupName(g.to_string()));

        Ok(Self {
            volume: volume.to_string(),
            group,
            time,
            format,
        })
    }

    /// Render the backend name for this snapshot.
    #[must_use]
    pub fn encode(&self) -> String {
        match self.format {
            NameFormat::Legacy => format!(
                "{}@{PREFIX}_{}",
                self.volume,
                self.time.with_timezone(&Utc).format(LEGACY_STAMP_FORMAT)
            ),
            NameFormat::Current => {
                // The offset is the only place a '+' can appear.
                let stamp = self
                    .time
                    .format(CURRENT_STAMP_FORMAT)
                    .to_string()
                    .replace('+', "");
                match &self.group {
                    Some(group) => format!("{}@{PREFIX}_{group}_{stamp}", self.volume),
                    None => format!("{}@{PREFIX}_{stamp}", self.volume),
                }
            }
        }
    }

    #[must_use]
    pub fn volume(&self) -> &str {
        &self.volume
    }

    #[must_use]
    pub const fn group(&self) -> Option<&GroupName> {
        self.group.as_ref()
    }

    #[must_use]
    pub const fn time(&self) -> DateTime<FixedOffset> {
        self.time
    }

    #[must_use]
    pub const fn format(&self) -> NameFormat {
        self.format
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for SnapshotName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Encode `(volume, group, time)` as a current-format snapshot name.
///
/// # Errors
///
/// Returns [`NameError::InvalidVolume`] for an unusable volume name.
pub fn encode<Tz: TimeZone>(
    volume: &str,
    group: Option<&GroupName>,
    time: &DateTime<Tz>,
) -> Result<String, NameError> {
    SnapshotName::new(volume, group.cloned(), time).map(|name| name.encode())
}

/// Decode a backend snapshot name. See [`SnapshotName::decode`].
///
/// # Errors
///
/// Returns [`NameError::InvalidFormat`] when no known layout matches.
pub fn decode(name: &str) -> Result<SnapshotName, NameError> {
    SnapshotName::decode(name)
}

// ---------------------------------------------------------------------------
// Masks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Field {
    Literal(&'static str),
    Group,
    Date,
    Minute,
    Second,
    Offset,
}

#[derive(Debug)]
struct Mask {
    format: NameFormat,
    fields: &'static [Field],
}

const MASKS: [Mask; 3] = [
    Mask {
        format: NameFormat::Legacy,
        fields: &[Field::Literal(PREFIX), Field::Date, Field::Second],
    },
    Mask {
        format: NameFormat::Current,
        fields: &[Field::Literal(PREFIX), Field::Date, Field::Minute, Field::Offset],
    },
    Mask {
        format: NameFormat::Current,
        fields: &[
            Field::Literal(PREFIX),
            Field::Group,
            Field::Date,
            Field::Minute,
            Field::Offset,
        ],
    },
];

#[derive(Debug, Default)]
struct Captures<'a> {
    group: Option<&'a str>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    offset: Option<FixedOffset>,
}

impl<'a> Captures<'a> {
    /// Legacy names carry no offset and are UTC.
    fn instant(&self) -> Option<DateTime<FixedOffset>> {
        let local = self.date?.and_time(self.time?);
        let offset = self.offset.unwrap_or_else(|| Utc.fix());
        offset.from_local_datetime(&local).single()
    }
}

impl Mask {
    fn apply<'a>(&self, segments: &[&'a str]) -> Option<Captures<'a>> {
        if segments.len() != self.fields.len() {
            return None;
        }

        let mut captures = Captures::default();
        for (field, &segment) in self.fields.iter().zip(segments) {
            match *field {
                Field::Literal(literal) => {
                    if segment != literal {
                        return None;
                    }
                }
                Field::Group => {
                    if !is_group_name(segment) {
                        return None;
                    }
                    captures.group = Some(segment);
                }
                Field::Date => captures.date = Some(parse_date(segment)?),
                Field::Minute => captures.time = Some(parse_time(segment, false)?),
                Field::Second => captures.time = Some(parse_time(segment, true)?),
                Field::Offset => captures.offset = Some(parse_offset(segment)?),
            }
        }
        Some(captures)
    }
}

/// `pattern` uses `9` for "any ASCII digit"; every other byte is literal.
fn has_shape(s: &str, pattern: &str) -> bool {
    s.len() == pattern.len()
        && s.bytes()
            .zip(pattern.bytes())
            .all(|(c, p)| if p == b'9' { c.is_ascii_digit() } else { c == p })
}

fn number(s: &str, range: std::ops::Range<usize>) -> Option<u32> {
    s.get(range)?.parse().ok()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if !has_shape(s, "9999-99-99") {
        return None;
    }
    let year = i32::try_from(number(s, 0..4)?).ok()?;
    NaiveDate::from_ymd_opt(year, number(s, 5..7)?, number(s, 8..10)?)
}

fn parse_time(s: &str, with_seconds: bool) -> Option<NaiveTime> {
    if with_seconds {
        if !has_shape(s, "99:99:99") {
            return None;
        }
        NaiveTime::from_hms_opt(number(s, 0..2)?, number(s, 3..5)?, number(s, 6..8)?)
    } else {
        if !has_shape(s, "99:99") {
            return None;
        }
        NaiveTime::from_hms_opt(number(s, 0..2)?, number(s, 3..5)?, 0)
    }
}

/// `HHMM` is a positive offset whose `+` was stripped on encode; `-HHMM` is
/// negative. An explicit `+` never appears in a valid name, and neither does
/// `-0000`, which would not encode back to itself.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, digits) = match s.strip_prefix('-') {
        Some(digits) => (-1, digits),
        None => (1, s),
    };
    if !has_shape(digits, "9999") {
        return None;
    }
    let hours = number(digits, 0..2)?;
    let minutes = number(digits, 2..4)?;
    if minutes >= 60 {
        return None;
    }
    let seconds = i32::try_from(hours * 3600 + minutes * 60).ok()?;
    if sign < 0 && seconds == 0 {
        return None;
    }
    FixedOffset::east_opt(sign * seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(offset_hours: i32, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .expect("valid offset")
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid time")
    }

    fn group(name: &str) -> GroupName {
        GroupName::new(name).expect("valid group")
    }

    #[test]
    fn encodes_default_group_with_positive_offset() {
        let time = at(1, 2010, 6, 15, 12, 30, 0);
        let name = encode("tank", None, &time).expect("encode");
        assert_eq!(name, "tank@zsnap_2010-06-15_12:30_0100");
    }

    #[test]
    fn encoding_zeroes_seconds() {
        let time = at(5, 2003, 2, 1, 4, 5, 6);
        assert_eq!(
            encode("tank", None, &time).expect("encode"),
            "tank@zsnap_2003-02-01_04:05_0500"
        );
        assert_eq!(
            encode("tank", Some(&group("foo")), &time).expect("encode"),
            "tank@zsnap_foo_2003-02-01_04:05_0500"
        );

        let name = SnapshotName::new("tank", None, &time).expect("name");
        assert_eq!(name.time(), at(5, 2003, 2, 1, 4, 5, 0));
    }

    #[test]
    fn encodes_negative_offset_with_sign() {
        let time = at(-5, 2004, 3, 2, 5, 6, 7);
        assert_eq!(
            encode("tank", None, &time).expect("encode"),
            "tank@zsnap_2004-03-02_05:06_-0500"
        );
        assert_eq!(
            encode("tank", Some(&group("foo")), &time).expect("encode"),
            "tank@zsnap_foo_2004-03-02_05:06_-0500"
        );
    }

    #[test]
    fn encodes_utc_as_zero_offset() {
        let time = Utc
            .with_ymd_and_hms(2005, 4, 3, 6, 7, 8)
            .single()
            .expect("valid time");
        assert_eq!(
            encode("tank", None, &time).expect("encode"),
            "tank@zsnap_2005-04-03_06:07_0000"
        );
        assert_eq!(
            encode("tank", Some(&group("foo")), &time).expect("encode"),
            "tank@zsnap_foo_2005-04-03_06:07_0000"
        );
    }

    #[test]
    fn encoding_is_idempotent() {
        let time = at(2, 2012, 12, 24, 18, 0, 59);
        let first = encode("pool/data", Some(&group("hourly")), &time).expect("encode");
        let second = encode("pool/data", Some(&group("hourly")), &time).expect("encode");
        assert_eq!(first, second);
    }

    #[test]
    fn decodes_current_format_without_group() {
        let name = decode("tank@zsnap_2010-06-15_12:30_0100").expect("decode");
        assert_eq!(name.volume(), "tank");
        assert_eq!(name.group(), None);
        assert_eq!(name.format(), NameFormat::Current);
        assert_eq!(name.time(), at(1, 2010, 6, 15, 12, 30, 0));
        assert_eq!(name.time().offset().local_minus_utc(), 3600);
    }

    #[test]
    fn decodes_current_format_with_group() {
        let name = decode("pool/home@zsnap_daily-2_2004-03-02_05:06_-0500").expect("decode");
        assert_eq!(name.volume(), "pool/home");
        assert_eq!(name.group().map(GroupName::as_str), Some("daily-2"));
        assert_eq!(name.time(), at(-5, 2004, 3, 2, 5, 6, 0));
        assert_eq!(name.time().offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn decodes_legacy_format_as_utc() {
        let name = decode("tank@zsnap_2009-11-30_23:59:58").expect("decode");
        assert_eq!(name.format(), NameFormat::Legacy);
        assert_eq!(name.group(), None);
        assert_eq!(name.time(), at(0, 2009, 11, 30, 23, 59, 58));
    }

    #[test]
    fn legacy_names_encode_back_to_themselves() {
        let raw = "tank@zsnap_2009-11-30_23:59:58";
        assert_eq!(decode(raw).expect("decode").encode(), raw);
    }

    #[test]
    fn decoded_names_encode_back_to_themselves() {
        for raw in [
            "tank@zsnap_2010-06-15_12:30_0100",
            "tank@zsnap_2010-06-15_12:30_0000",
            "tank@zsnap_2010-06-15_12:30_-0330",
            "tank/sub_vol@zsnap_weekly_2010-06-15_12:30_0545",
        ] {
            assert_eq!(decode(raw).expect("decode").encode(), raw);
        }
    }

    #[test]
    fn rejects_names_from_other_tools() {
        for raw in [
            "tank@superman",
            "tank@zsnap",
            "tank@zsnap_",
            "tank@manual_2010-06-15_12:30_0100",
            "tank@zsnap_2010-06-15",
            "tank@zsnap_2010-06-15_12:30",
            "tank@zsnap_a_b_2010-06-15_12:30_0100",
            "tank",
            "@zsnap_2010-06-15_12:30_0100",
        ] {
            assert_eq!(
                decode(raw),
                Err(NameError::InvalidFormat(raw.to_string())),
                "{raw} must not decode"
            );
        }
    }

    #[test]
    fn rejects_malformed_fields() {
        for raw in [
            "tank@zsnap_2010-02-30_12:30_0100",
            "tank@zsnap_2010-6-15_12:30_0100",
            "tank@zsnap_2010-06-15_24:00_0100",
            "tank@zsnap_2010-06-15_12:3_0100",
            "tank@zsnap_2010-06-15_12:30_+0100",
            "tank@zsnap_2010-06-15_12:30_100",
            "tank@zsnap_2010-06-15_12:30_0175",
            "tank@zsnap_2010-06-15_12:30_-0000",
            "tank@zsnap_hourly_2010-06-15_12:30_-0000",
            "tank@zsnap_2010-06-15_12:30:00_0100",
            "tank@zsnap_2010-06-15_12:30:61",
        ] {
            assert!(decode(raw).is_err(), "{raw} must not decode");
        }
    }

    #[test]
    fn rejects_reserved_characters_in_group_segment() {
        assert!(decode("tank@zsnap_foo:bar_2010-06-15_12:30_0100").is_err());
        assert!(decode("tank@zsnap_fo@o_2010-06-15_12:30_0100").is_err());
        assert!(decode("tank@zsnap_fo.o_2010-06-15_12:30_0100").is_err());
    }

    #[test]
    fn group_names_are_validated() {
        assert!(GroupName::new("foo").is_ok());
        assert!(GroupName::new("Daily-01").is_ok());
        for bad in ["", "foo_bar", "foo:bar", "foo@bar", "foo bar", "føø"] {
            assert_eq!(
                GroupName::new(bad),
                Err(NameError::InvalidGroup(bad.to_string()))
            );
        }
        assert_eq!("x-1".parse::<GroupName>().map(|g| g.to_string()), Ok("x-1".into()));
    }

    #[test]
    fn volume_names_are_validated() {
        let time = at(0, 2010, 1, 1, 0, 0, 0);
        assert!(matches!(
            SnapshotName::new("", None, &time),
            Err(NameError::InvalidVolume(_))
        ));
        assert!(matches!(
            SnapshotName::new("tank@x", None, &time),
            Err(NameError::InvalidVolume(_))
        ));
    }

    #[test]
    fn error_codes_follow_variant() {
        assert_eq!(
            NameError::InvalidFormat(String::new()).code(),
            ErrorCode::InvalidSnapshotName
        );
        assert_eq!(
            NameError::InvalidGroup(String::new()).code(),
            ErrorCode::InvalidGroupName
        );
    }

    #[test]
    fn shape_matching_is_exact() {
        assert!(has_shape("2010-06-15", "9999-99-99"));
        assert!(!has_shape("2010-06-1", "9999-99-99"));
        assert!(!has_shape("2010/06/15", "9999-99-99"));
        assert!(!has_shape("２010-06-15", "9999-99-99"));
    }
}
