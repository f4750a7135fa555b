//! Final checks on a channel timeline before it is handed to the formatter.

use chrono::TimeDelta;

use crate::diagnostics::{Diagnostic, Repair, Violation};
use crate::types::Program;

/// Output of [`validate`]: a well-formed timeline and what was repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    /// Ordered, non-overlapping, non-degenerate programs.
    pub programs: Vec<Program>,
    /// Repairs and coverage warnings.
    pub diagnostics: Vec<Diagnostic>,
}

/// Checks and repairs ordering and overlap, then flags coverage gaps.
///
/// Out-of-order programs are stable-sorted by start. A program starting
/// before its predecessor ends has its start truncated to that end; if
/// nothing is left it is dropped. Gaps longer than `coverage_gap` only raise a
/// warning.
#[must_use]
pub fn validate(mut programs: Vec<Program>, coverage_gap: Option<TimeDelta>) -> Validated {
    let mut diagnostics = Vec::new();

    for pair in programs.windows(2) {
        if let [prev, next] = pair
            && next.start() < prev.start()
        {
            diagnostics.push(repaired(Violation::Ordering, Repair::Reordered, next));
        }
    }
    if !diagnostics.is_empty() {
        programs.sort_by_key(Program::start);
    }

    let mut kept: Vec<Program> = Vec::with_capacity(programs.len());
    for program in programs {
        let Some(prev_end) = kept.last().map(Program::end) else {
            kept.push(program);
            continue;
        };
        if program.start() >= prev_end {
            kept.push(program);
            continue;
        }
        match program.with_start(prev_end) {
            Some(truncated) => {
                diagnostics.push(repaired(Violation::Overlap, Repair::Truncated, &program));
                kept.push(truncated);
            }
            None => {
                diagnostics.push(repaired(Violation::Degenerate, Repair::Dropped, &program));
            }
        }
    }

    if let Some(threshold) = coverage_gap {
        for pair in kept.windows(2) {
            if let [prev, next] = pair
                && next.start().signed_duration_since(prev.end()) > threshold
            {
                diagnostics.push(Diagnostic::CoverageGap {
                    from: prev.end(),
                    to: next.start(),
                });
            }
        }
    }

    Validated {
        programs: kept,
        diagnostics,
    }
}

fn repaired(violation: Violation, repair: Repair, program: &Program) -> Diagnostic {
    Diagnostic::TimelineRepaired {
        violation,
        repair,
        title: String::from(program.title()),
        start: program.start(),
    }
}
