//! Broadcast day boundary resolution over a two-date window.
//!
//! A listing published under date D runs past midnight into the early hours
//! of D+1. The window pairs D's drafts with D+1's listing so that D's
//! open-ended last program can be closed, and places every program on one
//! side of the handover instant between the two broadcast days.
//!
//! D's own listing starts before its cutoff too: programs of D that the
//! previous window did not consume and that cross `cutoff(D)` are split there
//! first, and both parts stay attributed to D.
//!
//! The handover is `cutoff(D+1)`, i.e. D+1 at the cutoff hour. Placement is
//! total and mutually exclusive:
//!
//! - `end <= handover`: settled in D.
//! - `start >= handover`: carried into D+1. A start exactly at the handover is
//!   carried, so a program never appears twice at that instant.
//! - `start < handover < end`: split into a continuation pair.
//!
//! Instants are never shifted: carrying a program only re-attributes it.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::diagnostics::Diagnostic;
use crate::settings::ScheduleSettings;
use crate::types::{BuiltDay, DayListing, DraftProgram, Program};

/// Listing date D together with the listing of D+1.
#[derive(Debug, Clone, Copy)]
pub struct DayWindow<'a> {
    /// Date D.
    pub current: &'a BuiltDay,
    /// Date D+1, present or absent.
    pub next: &'a DayListing,
    /// Instant up to which D's listing was already consumed by the previous
    /// window; drafts of D starting earlier are superseded.
    pub consumed_until: Option<DateTime<FixedOffset>>,
}

impl<'a> DayWindow<'a> {
    /// Creates a window with nothing consumed yet.
    #[must_use]
    pub const fn new(current: &'a BuiltDay, next: &'a DayListing) -> Self {
        Self {
            current,
            next,
            consumed_until: None,
        }
    }

    /// Sets the instant already consumed by the previous window.
    #[must_use]
    pub const fn consumed_until(mut self, instant: Option<DateTime<FixedOffset>>) -> Self {
        self.consumed_until = instant;
        self
    }

    /// The day after the current listing date.
    #[must_use]
    pub fn next_date(&self) -> NaiveDate {
        self.current.date.succ_opt().unwrap_or(self.current.date)
    }

    /// Cutoff instant of D itself, where D's leading block is split.
    #[must_use]
    pub fn lead_cutoff(&self, settings: &ScheduleSettings) -> DateTime<FixedOffset> {
        settings.policy.cutoff(self.current.date, &settings.clock)
    }

    /// Handover instant between broadcast days D and D+1.
    #[must_use]
    pub fn handover(&self, settings: &ScheduleSettings) -> DateTime<FixedOffset> {
        settings.policy.cutoff(self.next_date(), &settings.clock)
    }

    fn pending_drafts(&self) -> impl Iterator<Item = &'a DraftProgram> + use<'a> {
        let consumed_until = self.consumed_until;
        self.current
            .programs
            .iter()
            .filter(move |draft| consumed_until.is_none_or(|instant| draft.start >= instant))
    }
}

/// Where a single program lands relative to the handover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Ends at or before the handover.
    Settled(Program),
    /// Starts at or after the handover.
    Carried(Program),
    /// Crosses the handover.
    Split {
        /// `[start, handover)`.
        settled: Program,
        /// `[handover, end)`.
        carried: Program,
    },
}

/// Classifies one program against the handover instant.
#[must_use]
pub fn classify(program: Program, handover: DateTime<FixedOffset>) -> Placement {
    if program.end() <= handover {
        return Placement::Settled(program);
    }
    if program.start() >= handover {
        return Placement::Carried(program);
    }
    match program.split_at(handover) {
        Some((settled, carried)) => Placement::Split { settled, carried },
        None => Placement::Settled(program),
    }
}

/// Classifies an ordered run of programs into `(settled, carried)`.
#[must_use]
pub fn partition(
    programs: impl IntoIterator<Item = Program>,
    handover: DateTime<FixedOffset>,
) -> (Vec<Program>, Vec<Program>) {
    let mut settled = Vec::new();
    let mut carried = Vec::new();
    for program in programs {
        match classify(program, handover) {
            Placement::Settled(program) => settled.push(program),
            Placement::Carried(program) => carried.push(program),
            Placement::Split {
                settled: head,
                carried: tail,
            } => {
                settled.push(head);
                carried.push(tail);
            }
        }
    }
    (settled, carried)
}

/// Splits the programs crossing `cutoff` and keeps every part, in order.
fn split_across(programs: Vec<Program>, cutoff: DateTime<FixedOffset>) -> Vec<Program> {
    let (mut before, after) = partition(programs, cutoff);
    before.extend(after);
    before
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Programs attributed to D.
    pub settled: Vec<Program>,
    /// Programs attributed to D+1.
    pub carried: Vec<Program>,
    /// Instant up to which D+1's listing has been consumed.
    pub resume_at: Option<DateTime<FixedOffset>>,
    /// Partial-timeline findings.
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Settled followed by carried programs, in time order.
    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.settled.iter().chain(self.carried.iter())
    }
}

/// How the open-ended last program of D was closed.
enum TailEnd {
    /// Closed by D+1's listing, with the overnight programs D+1 lists after it.
    Listed {
        end: DateTime<FixedOffset>,
        overnight: Vec<Program>,
    },
    /// D+1 could not close it; the fallback duration applies.
    Estimated { reason: String },
}

/// Resolves one window.
///
/// D's open-ended last program is closed by the first program of D+1 that
/// starts strictly after it. Programs D+1 lists before that instant are
/// superseded by D's own listing, and D+1's programs up to the handover are
/// taken into this window. Programs crossing D's own cutoff are split there
/// before the handover applies. When D+1 cannot close the tail, it gets the
/// fallback duration, is placed by its start alone and a
/// [`Diagnostic::PartialTimeline`] is recorded.
#[must_use]
pub fn resolve(window: &DayWindow<'_>, settings: &ScheduleSettings) -> Resolution {
    let channel_id = window.current.channel_id.as_str();
    let lead_cutoff = window.lead_cutoff(settings);
    let handover = window.handover(settings);
    let drafts: Vec<&DraftProgram> = window.pending_drafts().collect();

    let Some((tail, body)) = drafts.split_last() else {
        return Resolution {
            resume_at: window.consumed_until,
            ..Resolution::default()
        };
    };

    let mut programs: Vec<Program> = body
        .iter()
        .filter_map(|draft| {
            draft
                .end
                .and_then(|end| Program::from_draft(channel_id, draft, end))
        })
        .collect();

    match close_tail(channel_id, tail, window.next, handover) {
        TailEnd::Listed { end, overnight } => {
            programs.extend(Program::from_draft(channel_id, tail, end));
            programs.extend(overnight);
            let resume_at = programs.last().map(Program::end);
            let programs = split_across(programs, lead_cutoff);
            let (settled, carried) = partition(programs, handover);
            Resolution {
                settled,
                carried,
                resume_at,
                diagnostics: Vec::new(),
            }
        }
        TailEnd::Estimated { reason } => {
            let programs = split_across(programs, lead_cutoff);
            let (mut settled, mut carried) = partition(programs, handover);
            let estimate = tail
                .start
                .checked_add_signed(settings.fallback_duration)
                .and_then(|end| Program::from_draft(channel_id, tail, end));
            let resume_at = estimate.as_ref().map(Program::end);
            if let Some(program) = estimate {
                if program.start() >= handover {
                    carried.push(program);
                } else {
                    settled.push(program);
                }
            }

            let diagnostic = Diagnostic::PartialTimeline {
                date: window.current.date,
                reason: format!(
                    "{reason}; last program closed after {} min",
                    settings.fallback_duration.num_minutes()
                ),
            };
            diagnostic.log(channel_id);

            Resolution {
                settled,
                carried,
                resume_at: resume_at.or(window.consumed_until),
                diagnostics: vec![diagnostic],
            }
        }
    }
}

fn close_tail(
    channel_id: &str,
    tail: &DraftProgram,
    next: &DayListing,
    handover: DateTime<FixedOffset>,
) -> TailEnd {
    let day = match next {
        DayListing::Present(day) => day,
        DayListing::Absent { date, reason } => {
            return TailEnd::Estimated {
                reason: format!("listing for {date} absent ({reason})"),
            };
        }
    };

    let Some(first) = day.programs.iter().position(|draft| draft.start > tail.start) else {
        return TailEnd::Estimated {
            reason: format!(
                "listing for {} has nothing after {}",
                day.date, tail.start
            ),
        };
    };

    let mut following = day.programs.iter().skip(first);
    let Some(closer) = following.next() else {
        return TailEnd::Estimated {
            reason: format!("listing for {} is empty", day.date),
        };
    };

    let overnight = std::iter::once(closer)
        .chain(following)
        .take_while(|draft| draft.start < handover)
        .map_while(|draft| {
            draft
                .end
                .and_then(|end| Program::from_draft(channel_id, draft, end))
        })
        .collect();

    TailEnd::Listed {
        end: closer.start,
        overnight,
    }
}
