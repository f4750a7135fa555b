//! Run-wide schedule settings consumed by the normalization pipeline.

use anyhow::{Result, bail};
use chrono::TimeDelta;

use crate::time::{CutoffPolicy, SiteClock};

/// Default duration assigned to a tail program whose next day is missing.
pub const DEFAULT_FALLBACK_MINUTES: u32 = 60;

/// Default coverage gap threshold.
pub const DEFAULT_COVERAGE_GAP_MINUTES: u32 = 180;

/// Schedule parameters shared by every channel of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Broadcast day boundary.
    pub policy: CutoffPolicy,
    /// Site clock.
    pub clock: SiteClock,
    /// Duration used to close a tail when the next listing is absent.
    pub fallback_duration: TimeDelta,
    /// Gaps longer than this raise a coverage warning; `None` disables it.
    pub coverage_gap: Option<TimeDelta>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            policy: CutoffPolicy::default(),
            clock: SiteClock::default(),
            fallback_duration: TimeDelta::minutes(i64::from(DEFAULT_FALLBACK_MINUTES)),
            coverage_gap: Some(TimeDelta::minutes(i64::from(DEFAULT_COVERAGE_GAP_MINUTES))),
        }
    }
}

impl ScheduleSettings {
    /// Creates settings from configuration values.
    ///
    /// A `coverage_gap_minutes` of zero disables the coverage warning.
    ///
    /// # Errors
    ///
    /// Returns an error if `fallback_minutes` is zero.
    pub fn new(
        policy: CutoffPolicy,
        clock: SiteClock,
        fallback_minutes: u32,
        coverage_gap_minutes: u32,
    ) -> Result<Self> {
        if fallback_minutes == 0 {
            bail!("fallback duration must be at least one minute");
        }
        Ok(Self {
            policy,
            clock,
            fallback_duration: TimeDelta::minutes(i64::from(fallback_minutes)),
            coverage_gap: (coverage_gap_minutes > 0)
                .then(|| TimeDelta::minutes(i64::from(coverage_gap_minutes))),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ScheduleSettings::default();
        assert_eq!(settings.policy.cutoff_hour(), 3);
        assert_eq!(settings.fallback_duration, TimeDelta::minutes(60));
        assert_eq!(settings.coverage_gap, Some(TimeDelta::minutes(180)));
    }

    #[test]
    fn test_zero_gap_disables_coverage_warning() {
        let settings =
            ScheduleSettings::new(CutoffPolicy::default(), SiteClock::utc(), 30, 0).unwrap();
        assert_eq!(settings.coverage_gap, None);
        assert_eq!(settings.fallback_duration, TimeDelta::minutes(30));
    }

    #[test]
    fn test_zero_fallback_rejected() {
        assert!(ScheduleSettings::new(CutoffPolicy::default(), SiteClock::utc(), 0, 60).is_err());
    }
}
