//! Listing and timeline data types.

use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::diagnostics::Diagnostic;

/// One on-air change as published by the listing site for a calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Wall-clock time as scraped (`HH:MM`).
    pub local_time: String,
    /// Program title.
    pub title: String,
    /// Optional synopsis.
    pub description: Option<String>,
    /// Calendar date the listing was published under.
    pub source_date: NaiveDate,
}

impl RawEntry {
    /// Creates an entry without description.
    #[must_use]
    pub fn new(
        source_date: NaiveDate,
        local_time: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            local_time: local_time.into(),
            title: title.into(),
            description: None,
            source_date,
        }
    }

    /// Attaches a description; blank text is treated as absent.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.trim().is_empty()).then_some(description);
        self
    }
}

/// Builder output for one listing date: absolute start, end known except for
/// the last entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftProgram {
    /// Absolute start.
    pub start: DateTime<FixedOffset>,
    /// Absolute end; `None` while open-ended.
    pub end: Option<DateTime<FixedOffset>>,
    /// Program title.
    pub title: String,
    /// Optional synopsis.
    pub description: Option<String>,
}

/// A program with a closed, non-empty time range.
///
/// Fields are private so that `start < end` always holds; corrections return
/// new values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    title: String,
    description: Option<String>,
    channel_id: String,
}

impl Program {
    /// Creates a program, or `None` when `start >= end`.
    #[must_use]
    pub fn new(
        channel_id: impl Into<String>,
        title: impl Into<String>,
        description: Option<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Option<Self> {
        (start < end).then(|| Self {
            start,
            end,
            title: title.into(),
            description,
            channel_id: channel_id.into(),
        })
    }

    /// Closes a draft with the given end.
    #[must_use]
    pub fn from_draft(
        channel_id: &str,
        draft: &DraftProgram,
        end: DateTime<FixedOffset>,
    ) -> Option<Self> {
        Self::new(
            channel_id,
            draft.title.clone(),
            draft.description.clone(),
            draft.start,
            end,
        )
    }

    /// Absolute start.
    #[must_use]
    pub const fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    /// Absolute end (exclusive).
    #[must_use]
    pub const fn end(&self) -> DateTime<FixedOffset> {
        self.end
    }

    /// Program title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Optional synopsis.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Owning channel.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Copy with a different start, or `None` if the range would be empty.
    #[must_use]
    pub fn with_start(&self, start: DateTime<FixedOffset>) -> Option<Self> {
        Self::new(
            self.channel_id.clone(),
            self.title.clone(),
            self.description.clone(),
            start,
            self.end,
        )
    }

    /// Copy with a different end, or `None` if the range would be empty.
    #[must_use]
    pub fn with_end(&self, end: DateTime<FixedOffset>) -> Option<Self> {
        Self::new(
            self.channel_id.clone(),
            self.title.clone(),
            self.description.clone(),
            self.start,
            end,
        )
    }

    /// Splits into the continuation pair `[start, at)` and `[at, end)`.
    ///
    /// Returns `None` unless `start < at < end`.
    #[must_use]
    pub fn split_at(&self, at: DateTime<FixedOffset>) -> Option<(Self, Self)> {
        Some((self.with_end(at)?, self.with_start(at)?))
    }
}

/// One row of the channel registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Identifier used in the output (`xmltv_id`).
    pub channel_id: String,
    /// Opaque lookup key for the listing source (`site_id`).
    pub channel_ref: String,
    /// Human-readable name.
    pub display_name: String,
}

impl ChannelInfo {
    /// Creates a registry row.
    #[must_use]
    pub fn new(
        channel_id: impl Into<String>,
        channel_ref: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_ref: channel_ref.into(),
            display_name: display_name.into(),
        }
    }

    /// Checks that the row can be processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel id or reference is blank.
    pub fn validate(&self) -> Result<()> {
        if self.channel_id.trim().is_empty() {
            bail!("channel id is empty (ref {:?})", self.channel_ref);
        }
        if self.channel_ref.trim().is_empty() {
            bail!("channel reference is empty");
        }
        Ok(())
    }
}

/// Builder output for one channel and listing date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltDay {
    /// Listing date.
    pub date: NaiveDate,
    /// Owning channel.
    pub channel_id: String,
    /// Drafts in ascending start order; only the last may be open-ended.
    pub programs: Vec<DraftProgram>,
    /// Dropped entries.
    pub diagnostics: Vec<Diagnostic>,
}

impl BuiltDay {
    /// An empty day.
    #[must_use]
    pub fn empty(channel_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            date,
            channel_id: channel_id.into(),
            programs: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// A listing date as seen by the resolver: built, or missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayListing {
    /// The listing was fetched and built.
    Present(BuiltDay),
    /// The listing could not be fetched or parsed.
    Absent {
        /// Listing date.
        date: NaiveDate,
        /// Why it is missing.
        reason: String,
    },
}

/// Finalized, validated timeline for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTimeline {
    /// Channel identifier.
    pub channel_id: String,
    /// Ordered, non-overlapping programs.
    pub programs: Vec<Program>,
    /// Everything recorded while building this timeline.
    pub diagnostics: Vec<Diagnostic>,
    /// At least one requested date was missing.
    pub incomplete: bool,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 10, h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_program_rejects_empty_range() {
        assert!(Program::new("x", "A", None, at(3, 0), at(3, 0)).is_none());
        assert!(Program::new("x", "A", None, at(4, 0), at(3, 0)).is_none());
        assert!(Program::new("x", "A", None, at(3, 0), at(4, 0)).is_some());
    }

    #[test]
    fn test_split_at_produces_continuation_pair() {
        // Arrange
        let program = Program::new("x", "Movie", Some(String::from("syn")), at(2, 0), at(4, 0))
            .unwrap();

        // Act
        let (head, tail) = program.split_at(at(3, 0)).unwrap();

        // Assert
        assert_eq!((head.start(), head.end()), (at(2, 0), at(3, 0)));
        assert_eq!((tail.start(), tail.end()), (at(3, 0), at(4, 0)));
        assert_eq!(head.title(), tail.title());
        assert_eq!(head.description(), Some("syn"));
        assert_eq!(tail.channel_id(), "x");
    }

    #[test]
    fn test_split_at_outside_range_is_none() {
        let program = Program::new("x", "Movie", None, at(2, 0), at(4, 0)).unwrap();
        assert!(program.split_at(at(2, 0)).is_none());
        assert!(program.split_at(at(5, 0)).is_none());
    }

    #[test]
    fn test_with_description_ignores_blank() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let entry = RawEntry::new(date, "10:00", "News").with_description("  ");
        assert_eq!(entry.description, None);
    }

    #[test]
    fn test_channel_info_validate() {
        assert!(ChannelInfo::new("globo.br", "globo", "Globo").validate().is_ok());
        assert!(ChannelInfo::new("", "globo", "Globo").validate().is_err());
        assert!(ChannelInfo::new("globo.br", " ", "Globo").validate().is_err());
    }
}
