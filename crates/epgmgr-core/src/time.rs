//! Wall-clock parsing, site clock conversion and cutoff arithmetic.

use std::fmt;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use regex::Regex;

use crate::diagnostics::EntryError;

/// Regex for site wall-clock times (`20:30`, `8:05`, `20h30`, `20.30`).
#[allow(clippy::expect_used)]
static WALL_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\s*[:hH.]\s*(\d{2})$").expect("failed to compile wall time regex")
});

/// Regex for UTC offsets (`+0000`, `-03:00`).
#[allow(clippy::expect_used)]
static OFFSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])(\d{2}):?(\d{2})$").expect("failed to compile offset regex")
});

/// A wall-clock time of day as published by the listing site (minute precision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTime {
    hour: u32,
    minute: u32,
}

impl WallTime {
    /// Creates a wall time, or `None` when out of range.
    #[must_use]
    pub const fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parses a scraped time string.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::UnparseableTime`] when the text is not a time and
    /// [`EntryError::TimeOutOfRange`] when hour or minute are out of range.
    pub fn parse(raw: &str) -> Result<Self, EntryError> {
        let trimmed = raw.trim();
        let unparseable = || EntryError::UnparseableTime(String::from(trimmed));

        let caps = WALL_TIME_RE.captures(trimmed).ok_or_else(unparseable)?;
        let hour: u32 = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(unparseable)?;
        let minute: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(unparseable)?;

        Self::new(hour, minute).ok_or_else(|| EntryError::TimeOutOfRange(String::from(trimmed)))
    }

    /// Converts to a `NaiveTime` with zero seconds.
    #[must_use]
    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The site's fixed UTC offset, used to turn `(date, wall time)` into instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteClock {
    offset: FixedOffset,
}

impl Default for SiteClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl SiteClock {
    /// Creates a clock for the given offset.
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Site time rendered as UTC (`+0000`).
    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Parses an offset such as `+0000`, `-0300` or `+09:00`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid offset.
    pub fn parse_offset(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let caps = OFFSET_RE
            .captures(trimmed)
            .with_context(|| format!("invalid UTC offset: {trimmed:?}"))?;
        let hours: i32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .with_context(|| format!("invalid offset hours: {trimmed:?}"))?;
        let minutes: i32 = caps
            .get(3)
            .and_then(|m| m.as_str().parse().ok())
            .with_context(|| format!("invalid offset minutes: {trimmed:?}"))?;
        if hours > 23 || minutes > 59 {
            bail!("UTC offset out of range: {trimmed:?}");
        }

        let seconds = hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes.checked_mul(60)?))
            .context("offset overflow")?;
        let signed = if caps.get(1).is_some_and(|m| m.as_str() == "-") {
            seconds.checked_neg().context("offset overflow")?
        } else {
            seconds
        };

        let offset = FixedOffset::east_opt(signed)
            .with_context(|| format!("UTC offset out of range: {trimmed:?}"))?;
        Ok(Self { offset })
    }

    /// The underlying offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Absolute instant of `time` on `date` in site time.
    #[must_use]
    pub fn at(&self, date: NaiveDate, time: WallTime) -> DateTime<FixedOffset> {
        let naive = date.and_time(time.to_naive());
        self.offset
            .from_local_datetime(&naive)
            .single()
            .unwrap_or_else(|| self.offset.from_utc_datetime(&naive))
    }

    /// Today's calendar date in site time.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Wall-clock hour before which a listing belongs to the previous broadcast day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffPolicy {
    cutoff_hour: u32,
}

impl Default for CutoffPolicy {
    fn default() -> Self {
        Self { cutoff_hour: 3 }
    }
}

impl CutoffPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `cutoff_hour` is outside `0..=23`.
    pub fn new(cutoff_hour: u32) -> Result<Self> {
        if cutoff_hour > 23 {
            bail!("cutoff_hour must be within 0..=23, got {cutoff_hour}");
        }
        Ok(Self { cutoff_hour })
    }

    /// The configured hour.
    #[must_use]
    pub const fn cutoff_hour(self) -> u32 {
        self.cutoff_hour
    }

    /// The cutoff as a wall time (`HH:00`).
    #[must_use]
    pub fn wall_time(self) -> WallTime {
        WallTime {
            hour: self.cutoff_hour,
            minute: 0,
        }
    }

    /// `cutoff(date)`: `date` at `cutoff_hour:00:00` in site time.
    #[must_use]
    pub fn cutoff(self, date: NaiveDate, clock: &SiteClock) -> DateTime<FixedOffset> {
        clock.at(date, self.wall_time())
    }

    /// Whether a wall time falls in the overnight block before the cutoff.
    #[must_use]
    pub const fn is_overnight(self, time: WallTime) -> bool {
        time.hour < self.cutoff_hour
    }
}

/// Requested listing dates, as day offsets relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start_offset_days: i64,
    end_offset_days: i64,
}

impl Default for DateWindow {
    /// Yesterday through the day after tomorrow.
    fn default() -> Self {
        Self {
            start_offset_days: -1,
            end_offset_days: 2,
        }
    }
}

impl DateWindow {
    /// Creates a window; both bounds are inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if `start_offset_days > end_offset_days`.
    pub fn new(start_offset_days: i64, end_offset_days: i64) -> Result<Self> {
        if start_offset_days > end_offset_days {
            bail!(
                "date window start ({start_offset_days}) must not be after end ({end_offset_days})"
            );
        }
        Ok(Self {
            start_offset_days,
            end_offset_days,
        })
    }

    /// Resolves the window to calendar dates in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if a date falls outside the supported calendar range.
    pub fn dates(&self, today: NaiveDate) -> Result<Vec<NaiveDate>> {
        (self.start_offset_days..=self.end_offset_days)
            .map(|offset| {
                let shifted = if offset < 0 {
                    today.checked_sub_days(Days::new(offset.unsigned_abs()))
                } else {
                    today.checked_add_days(Days::new(offset.unsigned_abs()))
                };
                shifted.with_context(|| format!("date offset {offset} out of range from {today}"))
            })
            .collect()
    }
}

/// Formats an instant as an XMLTV timestamp (`YYYYMMDDHHMMSS ±ZZZZ`).
#[must_use]
pub fn format_xmltv(at: DateTime<FixedOffset>) -> String {
    at.format("%Y%m%d%H%M%S %z").to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_wall_time_parse_variants() {
        // Arrange & Act & Assert
        assert_eq!(WallTime::parse("20:30").unwrap(), WallTime::new(20, 30).unwrap());
        assert_eq!(WallTime::parse(" 8:05 ").unwrap(), WallTime::new(8, 5).unwrap());
        assert_eq!(WallTime::parse("20h30").unwrap(), WallTime::new(20, 30).unwrap());
        assert_eq!(WallTime::parse("00.00").unwrap(), WallTime::new(0, 0).unwrap());
    }

    #[test]
    fn test_wall_time_parse_rejects_garbage() {
        assert_eq!(
            WallTime::parse("Ao vivo"),
            Err(EntryError::UnparseableTime(String::from("Ao vivo")))
        );
        assert_eq!(
            WallTime::parse(""),
            Err(EntryError::UnparseableTime(String::new()))
        );
    }

    #[test]
    fn test_wall_time_parse_rejects_out_of_range() {
        assert_eq!(
            WallTime::parse("24:10"),
            Err(EntryError::TimeOutOfRange(String::from("24:10")))
        );
        assert_eq!(
            WallTime::parse("12:75"),
            Err(EntryError::TimeOutOfRange(String::from("12:75")))
        );
    }

    #[test]
    fn test_wall_time_display() {
        assert_eq!(WallTime::new(5, 7).unwrap().to_string(), "05:07");
    }

    #[test]
    fn test_site_clock_parse_offset() {
        // Arrange & Act
        let utc = SiteClock::parse_offset("+0000").unwrap();
        let brt = SiteClock::parse_offset("-0300").unwrap();
        let jst = SiteClock::parse_offset("+09:00").unwrap();

        // Assert
        assert_eq!(utc.offset().local_minus_utc(), 0);
        assert_eq!(brt.offset().local_minus_utc(), -3 * 3600);
        assert_eq!(jst.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_site_clock_parse_offset_invalid() {
        assert!(SiteClock::parse_offset("UTC").is_err());
        assert!(SiteClock::parse_offset("+2500").is_err());
    }

    #[test]
    fn test_site_clock_at_keeps_wall_time() {
        // Arrange
        let clock = SiteClock::parse_offset("-0300").unwrap();

        // Act
        let instant = clock.at(date(2024, 3, 10), WallTime::new(23, 30).unwrap());

        // Assert
        assert_eq!(instant.to_rfc3339(), "2024-03-10T23:30:00-03:00");
    }

    #[test]
    fn test_cutoff_policy_bounds() {
        assert!(CutoffPolicy::new(0).is_ok());
        assert!(CutoffPolicy::new(23).is_ok());
        assert!(CutoffPolicy::new(24).is_err());
    }

    #[test]
    fn test_cutoff_is_date_at_hour() {
        // Arrange
        let policy = CutoffPolicy::new(3).unwrap();

        // Act
        let cutoff = policy.cutoff(date(2024, 3, 10), &SiteClock::utc());

        // Assert
        assert_eq!(cutoff.to_rfc3339(), "2024-03-10T03:00:00+00:00");
    }

    #[test]
    fn test_is_overnight() {
        let policy = CutoffPolicy::new(3).unwrap();
        assert!(policy.is_overnight(WallTime::new(2, 59).unwrap()));
        assert!(!policy.is_overnight(WallTime::new(3, 0).unwrap()));
    }

    #[test]
    fn test_date_window_default_spans_four_days() {
        // Arrange
        let window = DateWindow::default();

        // Act
        let dates = window.dates(date(2024, 3, 1)).unwrap();

        // Assert
        assert_eq!(
            dates,
            vec![date(2024, 2, 29), date(2024, 3, 1), date(2024, 3, 2), date(2024, 3, 3)]
        );
    }

    #[test]
    fn test_date_window_rejects_inverted_bounds() {
        assert!(DateWindow::new(2, -1).is_err());
    }

    #[test]
    fn test_format_xmltv_keeps_offset() {
        // Arrange
        let clock = SiteClock::parse_offset("-0300").unwrap();
        let at = clock.at(date(2024, 3, 10), WallTime::new(23, 30).unwrap());

        // Act
        let text = format_xmltv(at);

        // Assert
        assert_eq!(text, "20240310233000 -0300");
    }
}
