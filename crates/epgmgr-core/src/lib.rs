//! Schedule normalization engine for epgmgr.
//!
//! Turns per-day listings scraped in site wall-clock time into one ordered,
//! non-overlapping timeline per channel with absolute start and end
//! instants. The pipeline is:
//!
//! 1. [`build_day`] anchors one date's entries and infers end times.
//! 2. [`resolve`] closes each day against the next and places programs on
//!    either side of the broadcast day cutoff.
//! 3. [`validate`] repairs ordering and overlap and flags coverage gaps.
//!
//! [`TimelineAssembler`] drives 2 and 3 for one channel, and [`run_all`]
//! fetches, assembles and emits every channel of a run.

/// Incremental channel timeline assembly.
pub mod assembler;
/// Timeline Builder.
pub mod builder;
/// Diagnostics and channel-scoped errors.
pub mod diagnostics;
/// Boundary Resolver.
pub mod resolver;
/// Run orchestration.
pub mod runner;
/// Run-wide schedule settings.
pub mod settings;
/// Collaborator contracts.
pub mod source;
/// Wall-clock and cutoff utilities.
pub mod time;
/// Listing and timeline data types.
pub mod types;
/// Timeline Validator.
pub mod validator;

pub use assembler::TimelineAssembler;
pub use builder::build_day;
pub use diagnostics::{ChannelFailed, Diagnostic, EntryError, Repair, Violation};
pub use resolver::{DayWindow, Placement, Resolution, classify, partition, resolve};
pub use runner::{RunOptions, RunSummary, run_all, run_channel};
pub use settings::ScheduleSettings;
pub use source::{ChannelRegistry, ListingSource, LocalListingSource, TimelineSink};
pub use time::{CutoffPolicy, DateWindow, SiteClock, WallTime, format_xmltv};
pub use types::{BuiltDay, ChannelInfo, ChannelTimeline, DayListing, DraftProgram, Program, RawEntry};
pub use validator::{Validated, validate};
