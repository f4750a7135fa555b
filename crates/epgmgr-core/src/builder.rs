//! Turns one date's raw listing into absolute-time draft programs.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::diagnostics::{Diagnostic, EntryError};
use crate::time::{CutoffPolicy, SiteClock, WallTime};
use crate::types::{BuiltDay, DraftProgram, RawEntry};

/// Builds the drafts for one channel and listing date.
///
/// Entries are taken in publication order. A wall time earlier than its
/// predecessor is a midnight rollover onto `date + 1` when it falls before the
/// cutoff hour or drops by at least twelve hours. When the listing steps
/// backwards any other way, or more than once, it is not chronological, and
/// entries are ordered by broadcast day instead: times before the cutoff hour
/// go on `date + 1`.
///
/// Each draft ends where the next one starts; the last draft is open-ended.
/// Entries with an unparseable time or an empty title are dropped and
/// reported as [`Diagnostic::MalformedEntry`]. Entries landing on the same
/// start as their predecessor are duplicates and only the first is kept.
#[must_use]
pub fn build_day(
    channel_id: &str,
    date: NaiveDate,
    entries: &[RawEntry],
    policy: CutoffPolicy,
    clock: &SiteClock,
) -> BuiltDay {
    let mut diagnostics = Vec::new();
    let mut parsed: Vec<(WallTime, &RawEntry)> = Vec::with_capacity(entries.len());

    for (position, entry) in entries.iter().enumerate() {
        match parse_entry(entry) {
            Ok(time) => parsed.push((time, entry)),
            Err(error) => {
                let diagnostic = Diagnostic::MalformedEntry {
                    date,
                    position,
                    raw_time: entry.local_time.clone(),
                    error,
                };
                diagnostic.log(channel_id);
                diagnostics.push(diagnostic);
            }
        }
    }

    let mut timed = if is_chronological(&parsed, policy) {
        anchor_in_order(&parsed, date, clock)
    } else {
        tracing::debug!(
            channel = channel_id,
            %date,
            "Listing is not in publication order, ordering by broadcast day"
        );
        anchor_by_broadcast_day(&parsed, date, policy, clock)
    };
    timed.dedup_by_key(|(start, _)| *start);

    let successors = timed
        .iter()
        .skip(1)
        .map(|(start, _)| Some(*start))
        .chain(std::iter::once(None));
    let programs: Vec<DraftProgram> = timed
        .iter()
        .zip(successors)
        .map(|((start, entry), end)| DraftProgram {
            start: *start,
            end,
            title: String::from(entry.title.trim()),
            description: entry.description.clone(),
        })
        .collect();

    tracing::debug!(
        channel = channel_id,
        %date,
        entries = entries.len(),
        programs = programs.len(),
        dropped = diagnostics.len(),
        "Built listing day"
    );

    BuiltDay {
        date,
        channel_id: String::from(channel_id),
        programs,
        diagnostics,
    }
}

fn parse_entry(entry: &RawEntry) -> Result<WallTime, EntryError> {
    let time = WallTime::parse(&entry.local_time)?;
    if entry.title.trim().is_empty() {
        return Err(EntryError::EmptyTitle);
    }
    Ok(time)
}

/// Smallest backward step, in minutes, read as a rollover outside the
/// overnight block.
const MIN_ROLLOVER_DROP_MINUTES: i64 = 720;

/// Whether stepping back from `prev` to `next` crosses midnight.
fn is_rollover(prev: WallTime, next: WallTime, policy: CutoffPolicy) -> bool {
    policy.is_overnight(next)
        || prev
            .to_naive()
            .signed_duration_since(next.to_naive())
            .num_minutes()
            >= MIN_ROLLOVER_DROP_MINUTES
}

/// At most one backward step, and that one a midnight rollover.
fn is_chronological(parsed: &[(WallTime, &RawEntry)], policy: CutoffPolicy) -> bool {
    let mut backward_steps = parsed.windows(2).filter_map(|pair| match pair {
        [(prev, _), (next, _)] if next < prev => Some((*prev, *next)),
        _ => None,
    });
    match (backward_steps.next(), backward_steps.next()) {
        (None, _) => true,
        (Some((prev, next)), None) => is_rollover(prev, next, policy),
        (Some(_), Some(_)) => false,
    }
}

fn anchor_in_order<'a>(
    parsed: &[(WallTime, &'a RawEntry)],
    date: NaiveDate,
    clock: &SiteClock,
) -> Vec<(DateTime<FixedOffset>, &'a RawEntry)> {
    let next_date = date.succ_opt().unwrap_or(date);
    let mut day = date;
    let mut previous: Option<WallTime> = None;

    parsed
        .iter()
        .map(|&(time, entry)| {
            if previous.is_some_and(|prev| time < prev) {
                day = next_date;
            }
            previous = Some(time);
            (clock.at(day, time), entry)
        })
        .collect()
}

fn anchor_by_broadcast_day<'a>(
    parsed: &[(WallTime, &'a RawEntry)],
    date: NaiveDate,
    policy: CutoffPolicy,
    clock: &SiteClock,
) -> Vec<(DateTime<FixedOffset>, &'a RawEntry)> {
    let next_date = date.succ_opt().unwrap_or(date);
    let mut sorted = parsed.to_vec();
    sorted.sort_by_key(|(time, _)| (policy.is_overnight(*time), *time));

    sorted
        .into_iter()
        .map(|(time, entry)| {
            let day = if policy.is_overnight(time) {
                next_date
            } else {
                date
            };
            (clock.at(day, time), entry)
        })
        .collect()
}
