//! Incremental assembly of one channel's timeline across the date window.

use chrono::{DateTime, FixedOffset};

use crate::diagnostics::Diagnostic;
use crate::resolver::{DayWindow, resolve};
use crate::settings::ScheduleSettings;
use crate::types::{ChannelTimeline, DayListing, Program};
use crate::validator::validate;

/// Collects day listings in date order and resolves each against its
/// successor.
///
/// The day pushed last stays pending until the next push (or [`finish`]),
/// since resolving it needs the following date.
///
/// [`finish`]: TimelineAssembler::finish
#[derive(Debug)]
pub struct TimelineAssembler {
    channel_id: String,
    settings: ScheduleSettings,
    pending: Option<DayListing>,
    consumed_until: Option<DateTime<FixedOffset>>,
    programs: Vec<Program>,
    diagnostics: Vec<Diagnostic>,
    incomplete: bool,
}

impl TimelineAssembler {
    /// Creates an empty assembler for one channel.
    #[must_use]
    pub fn new(channel_id: impl Into<String>, settings: ScheduleSettings) -> Self {
        Self {
            channel_id: channel_id.into(),
            settings,
            pending: None,
            consumed_until: None,
            programs: Vec::new(),
            diagnostics: Vec::new(),
            incomplete: false,
        }
    }

    /// Adds the next date's listing, resolving the pending one against it.
    pub fn push(&mut self, listing: DayListing) {
        if let Some(current) = self.pending.take() {
            self.resolve_pending(current, &listing);
        }
        self.pending = Some(listing);
    }

    /// Resolves the last requested date against `lookahead` and validates.
    ///
    /// `lookahead` is the date after the window. It only closes the last
    /// day's tail; apart from the overnight block that precedes the cutoff,
    /// its programs are not emitted.
    #[must_use]
    pub fn finish(mut self, lookahead: DayListing) -> ChannelTimeline {
        if let Some(current) = self.pending.take() {
            self.resolve_pending(current, &lookahead);
        }

        let validated = validate(self.programs, self.settings.coverage_gap);
        for diagnostic in &validated.diagnostics {
            diagnostic.log(&self.channel_id);
        }
        self.diagnostics.extend(validated.diagnostics);

        tracing::debug!(
            channel = %self.channel_id,
            programs = validated.programs.len(),
            diagnostics = self.diagnostics.len(),
            incomplete = self.incomplete,
            "Channel timeline assembled"
        );

        ChannelTimeline {
            channel_id: self.channel_id,
            programs: validated.programs,
            diagnostics: self.diagnostics,
            incomplete: self.incomplete,
        }
    }

    fn resolve_pending(&mut self, current: DayListing, next: &DayListing) {
        match current {
            DayListing::Present(day) => {
                let window = DayWindow::new(&day, next).consumed_until(self.consumed_until);
                let resolution = resolve(&window, &self.settings);

                self.consumed_until = resolution.resume_at;
                self.incomplete |= resolution.diagnostics.iter().any(Diagnostic::is_partial);
                self.programs.extend(resolution.settled);
                self.programs.extend(resolution.carried);
                self.diagnostics.extend(day.diagnostics);
                self.diagnostics.extend(resolution.diagnostics);
            }
            DayListing::Absent { date, reason } => {
                let diagnostic = Diagnostic::PartialTimeline { date, reason };
                diagnostic.log(&self.channel_id);
                self.diagnostics.push(diagnostic);
                self.incomplete = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::builder::build_day;
    use crate::time::CutoffPolicy;
    use crate::types::{BuiltDay, RawEntry};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, d, h, m, 0)
            .unwrap()
    }

    fn settings() -> ScheduleSettings {
        ScheduleSettings {
            policy: CutoffPolicy::new(3).unwrap(),
            ..ScheduleSettings::default()
        }
    }

    fn present(d: u32, rows: &[(&str, &str)]) -> DayListing {
        let settings = settings();
        let entries: Vec<RawEntry> = rows
            .iter()
            .map(|(time, title)| RawEntry::new(date(d), *time, *title))
            .collect();
        DayListing::Present(build_day("X", date(d), &entries, settings.policy, &settings.clock))
    }

    fn absent(d: u32) -> DayListing {
        DayListing::Absent {
            date: date(d),
            reason: String::from("HTTP 500"),
        }
    }

    fn spans(timeline: &ChannelTimeline) -> Vec<(&str, DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        timeline
            .programs
            .iter()
            .map(|p| (p.title(), p.start(), p.end()))
            .collect()
    }

    #[test]
    fn test_end_to_end_worked_trace() {
        // Arrange
        let mut assembler = TimelineAssembler::new("X", settings());

        // Act
        assembler.push(present(10, &[("23:30", "A"), ("01:00", "B"), ("02:30", "C")]));
        assembler.push(present(11, &[("03:00", "D"), ("05:00", "E")]));
        let timeline = assembler.finish(present(12, &[("06:00", "F")]));

        // Assert
        let spans = spans(&timeline);
        assert_eq!(
            spans[..4],
            [
                ("A", at(10, 23, 30), at(11, 1, 0)),
                ("B", at(11, 1, 0), at(11, 2, 30)),
                ("C", at(11, 2, 30), at(11, 3, 0)),
                ("D", at(11, 3, 0), at(11, 5, 0)),
            ]
        );
        assert_eq!(spans[4].1, at(11, 5, 0));
        assert_eq!(spans.last().unwrap().2, at(12, 6, 0));
        assert!(!timeline.incomplete);
        assert!(timeline.diagnostics.iter().all(|d| !d.is_partial()));
    }

    #[test]
    fn test_missing_lookahead_falls_back_and_marks_incomplete() {
        // Arrange
        let mut assembler = TimelineAssembler::new("X", settings());

        // Act
        assembler.push(present(10, &[("23:30", "A"), ("01:00", "B"), ("02:30", "C")]));
        assembler.push(present(11, &[("03:00", "D"), ("05:00", "E")]));
        let timeline = assembler.finish(absent(12));

        // Assert
        let last = timeline.programs.last().unwrap();
        assert_eq!((last.title(), last.start(), last.end()), ("E", at(11, 5, 0), at(11, 6, 0)));
        assert!(timeline.incomplete);
        assert_eq!(timeline.diagnostics.iter().filter(|d| d.is_partial()).count(), 1);
    }

    #[test]
    fn test_straddle_across_days_has_no_duplicates() {
        // Arrange
        let mut assembler = TimelineAssembler::new("X", settings());

        // Act
        assembler.push(present(10, &[("22:00", "X"), ("02:00", "Late Movie")]));
        assembler.push(present(11, &[("02:00", "Late Movie"), ("04:00", "Y"), ("08:00", "Z")]));
        let timeline = assembler.finish(present(12, &[("06:00", "W")]));

        // Assert
        assert_eq!(
            spans(&timeline),
            vec![
                ("X", at(10, 22, 0), at(11, 2, 0)),
                ("Late Movie", at(11, 2, 0), at(11, 3, 0)),
                ("Late Movie", at(11, 3, 0), at(11, 4, 0)),
                ("Y", at(11, 4, 0), at(11, 8, 0)),
                ("Z", at(11, 8, 0), at(12, 3, 0)),
                ("Z", at(12, 3, 0), at(12, 6, 0)),
            ]
        );
        assert!(timeline.diagnostics.is_empty());
    }

    #[test]
    fn test_first_day_program_crossing_own_cutoff_is_split() {
        // Arrange
        let mut assembler = TimelineAssembler::new("X", settings());

        // Act
        assembler.push(present(10, &[("02:00", "P"), ("04:00", "Q")]));
        let timeline = assembler.finish(present(11, &[("06:00", "R")]));

        // Assert
        assert_eq!(
            spans(&timeline),
            vec![
                ("P", at(10, 2, 0), at(10, 3, 0)),
                ("P", at(10, 3, 0), at(10, 4, 0)),
                ("Q", at(10, 4, 0), at(11, 3, 0)),
                ("Q", at(11, 3, 0), at(11, 6, 0)),
            ]
        );
        assert!(timeline.diagnostics.is_empty());
    }

    #[test]
    fn test_cutoff_start_appears_once() {
        // Arrange
        let mut assembler = TimelineAssembler::new("X", settings());

        // Act
        assembler.push(present(10, &[("22:00", "X"), ("03:00", "Y")]));
        assembler.push(present(11, &[("03:00", "Y"), ("05:00", "Z")]));
        let timeline = assembler.finish(present(12, &[("07:00", "W")]));

        // Assert
        let ys: Vec<_> = timeline.programs.iter().filter(|p| p.title() == "Y").collect();
        assert_eq!(ys.len(), 1);
        assert_eq!((ys[0].start(), ys[0].end()), (at(11, 3, 0), at(11, 5, 0)));
    }

    #[test]
    fn test_absent_middle_day_keeps_carried_programs() {
        // Arrange
        let mut assembler = TimelineAssembler::new("X", settings());

        // Act
        assembler.push(present(10, &[("20:00", "News"), ("23:00", "Talk")]));
        assembler.push(absent(11));
        assembler.push(present(12, &[("06:00", "Morning"), ("12:00", "Noon")]));
        let timeline = assembler.finish(present(13, &[("06:00", "Next")]));

        // Assert
        let titles: Vec<_> = timeline.programs.iter().map(Program::title).collect();
        assert_eq!(titles, vec!["News", "Talk", "Morning", "Noon", "Noon"]);
        assert!(timeline.incomplete);
        assert_eq!(timeline.programs[1].end(), at(11, 0, 0));
        assert!(
            timeline
                .diagnostics
                .iter()
                .any(|d| matches!(d, Diagnostic::PartialTimeline { date: day, .. } if *day == date(11)))
        );
    }

    #[test]
    fn test_timeline_never_overlaps() {
        // Arrange
        let mut assembler = TimelineAssembler::new("X", settings());

        // Act
        assembler.push(present(10, &[("06:00", "A"), ("23:00", "B"), ("01:30", "C")]));
        assembler.push(present(11, &[("00:00", "B"), ("01:00", "Q"), ("02:00", "R"), ("06:00", "S")]));
        assembler.push(present(12, &[("05:00", "T"), ("23:50", "U")]));
        let timeline = assembler.finish(absent(13));

        // Assert
        for pair in timeline.programs.windows(2) {
            assert!(pair[0].end() <= pair[1].start());
        }
        for program in &timeline.programs {
            assert!(program.start() < program.end());
        }
    }

    #[test]
    fn test_malformed_entries_surface_in_timeline() {
        // Arrange
        let mut assembler = TimelineAssembler::new("X", settings());

        // Act
        assembler.push(present(10, &[("06:00", "A"), ("??", "broken")]));
        let timeline = assembler.finish(present(11, &[("00:00", "B")]));

        // Assert
        assert_eq!(timeline.programs.len(), 1);
        assert!(matches!(timeline.diagnostics[0], Diagnostic::MalformedEntry { .. }));
        assert!(!timeline.incomplete);
    }

    #[test]
    fn test_empty_channel_yields_empty_timeline() {
        let mut assembler = TimelineAssembler::new("X", settings());
        assembler.push(DayListing::Present(BuiltDay::empty("X", date(10))));
        let timeline = assembler.finish(DayListing::Present(BuiltDay::empty("X", date(11))));
        assert!(timeline.programs.is_empty());
    }
}
