//! Channel-scoped diagnostics recorded while normalizing a timeline.
//!
//! Nothing in here is fatal to a run: every variant is attached to the
//! channel that produced it and the channel is still emitted.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};

/// Reason a raw listing entry could not be turned into a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// The wall-clock time does not look like `HH:MM`.
    UnparseableTime(String),
    /// The wall-clock time parsed but hour or minute is out of range.
    TimeOutOfRange(String),
    /// The entry has no title.
    EmptyTitle,
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableTime(raw) => write!(f, "unparseable time {raw:?}"),
            Self::TimeOutOfRange(raw) => write!(f, "time out of range {raw:?}"),
            Self::EmptyTitle => write!(f, "empty title"),
        }
    }
}

impl std::error::Error for EntryError {}

/// Hard timeline invariant that the validator had to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Program started before its predecessor.
    Ordering,
    /// Program started before its predecessor ended.
    Overlap,
    /// Program had (or was left with) `start >= end`.
    Degenerate,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordering => write!(f, "ordering"),
            Self::Overlap => write!(f, "overlap"),
            Self::Degenerate => write!(f, "degenerate"),
        }
    }
}

/// What the validator did about a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// Programs were re-sorted by start.
    Reordered,
    /// Start was moved forward to the previous program's end.
    Truncated,
    /// Nothing was left after truncation; the program was removed.
    Dropped,
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reordered => write!(f, "reordered"),
            Self::Truncated => write!(f, "truncated"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}

/// A non-fatal finding attached to a channel timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A raw entry was dropped.
    MalformedEntry {
        /// Listing date the entry was published under.
        date: NaiveDate,
        /// Zero-based position in the published listing.
        position: usize,
        /// The raw time text as scraped.
        raw_time: String,
        /// Why it was rejected.
        error: EntryError,
    },
    /// A date's listing was missing, so part of the timeline relies on the
    /// fallback duration.
    PartialTimeline {
        /// The date whose timeline is incomplete.
        date: NaiveDate,
        /// Human-readable cause (fetch error, timeout, ...).
        reason: String,
    },
    /// The validator fixed an ordering, overlap or degenerate program.
    TimelineRepaired {
        /// Which invariant was violated.
        violation: Violation,
        /// What was done about it.
        repair: Repair,
        /// Title of the affected program.
        title: String,
        /// Start of the affected program before repair.
        start: DateTime<FixedOffset>,
    },
    /// Soft coverage warning: a hole in the timeline longer than the threshold.
    CoverageGap {
        /// End of the program before the gap.
        from: DateTime<FixedOffset>,
        /// Start of the program after the gap.
        to: DateTime<FixedOffset>,
    },
}

impl Diagnostic {
    /// Short machine-friendly kind name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedEntry { .. } => "malformed_entry",
            Self::PartialTimeline { .. } => "partial_timeline",
            Self::TimelineRepaired { .. } => "timeline_repaired",
            Self::CoverageGap { .. } => "coverage_gap",
        }
    }

    /// Whether this diagnostic marks the channel output as incomplete.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::PartialTimeline { .. })
    }

    /// Logs the diagnostic as a structured warning.
    pub fn log(&self, channel_id: &str) {
        tracing::warn!(channel = channel_id, kind = self.kind(), "{self}");
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEntry {
                date,
                position,
                raw_time,
                error,
            } => write!(
                f,
                "dropped entry #{position} of {date} (time {raw_time:?}): {error}"
            ),
            Self::PartialTimeline { date, reason } => {
                write!(f, "partial timeline for {date}: {reason}")
            }
            Self::TimelineRepaired {
                violation,
                repair,
                title,
                start,
            } => write!(
                f,
                "{violation} violation at {start} ({title:?}), {repair}"
            ),
            Self::CoverageGap { from, to } => {
                let minutes = to.signed_duration_since(*from).num_minutes();
                write!(f, "coverage gap of {minutes} min between {from} and {to}")
            }
        }
    }
}

/// Unrecoverable error for a single channel; the rest of the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFailed {
    /// Channel that was skipped.
    pub channel_id: String,
    /// Why it was skipped.
    pub reason: String,
}

impl ChannelFailed {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(channel_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ChannelFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {:?} failed: {}", self.channel_id, self.reason)
    }
}

impl std::error::Error for ChannelFailed {}
