//! Run orchestration: fetch, assemble and emit every channel.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::StreamExt;
use tracing::instrument;

use crate::assembler::TimelineAssembler;
use crate::builder::build_day;
use crate::diagnostics::ChannelFailed;
use crate::settings::ScheduleSettings;
use crate::source::{ChannelRegistry, LocalListingSource, TimelineSink};
use crate::types::{ChannelInfo, ChannelTimeline, DayListing};

/// Default per-fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of channels processed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-run options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Requested listing dates, ascending.
    pub dates: Vec<NaiveDate>,
    /// Upper bound for a single listing fetch.
    pub fetch_timeout: Duration,
    /// Channels processed concurrently (at least one).
    pub concurrency: usize,
    /// Overall deadline; channels unfinished by then are discarded.
    pub run_timeout: Option<Duration>,
}

impl RunOptions {
    /// Options with default timeouts and concurrency.
    #[must_use]
    pub const fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            run_timeout: None,
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Channels emitted with a complete timeline.
    pub channels_ok: usize,
    /// Channels emitted with at least one missing date.
    pub channels_incomplete: usize,
    /// Channels skipped.
    pub failed: Vec<ChannelFailed>,
    /// Programs emitted across all channels.
    pub programs: usize,
    /// Diagnostics recorded across all channels.
    pub diagnostics: usize,
}

impl RunSummary {
    /// Channels handed to the sink.
    #[must_use]
    pub const fn channels_emitted(&self) -> usize {
        self.channels_ok.saturating_add(self.channels_incomplete)
    }

    /// Logs the summary at `info`.
    pub fn log(&self) {
        tracing::info!(
            channels_ok = self.channels_ok,
            channels_incomplete = self.channels_incomplete,
            channels_failed = self.failed.len(),
            programs = self.programs,
            diagnostics = self.diagnostics,
            "Run finished"
        );
    }
}

/// Fetches and builds one date, mapping every failure to an absent listing.
async fn fetch_day(
    source: &(impl LocalListingSource + Sync),
    channel: &ChannelInfo,
    date: NaiveDate,
    settings: &ScheduleSettings,
    fetch_timeout: Duration,
) -> DayListing {
    let fetch = source.fetch_listing(&channel.channel_ref, date);
    let reason = match tokio::time::timeout(fetch_timeout, fetch).await {
        Ok(Ok(Some(entries))) => {
            return DayListing::Present(build_day(
                &channel.channel_id,
                date,
                &entries,
                settings.policy,
                &settings.clock,
            ));
        }
        Ok(Ok(None)) => String::from("no listing published"),
        Ok(Err(e)) => format!("{e:#}"),
        Err(_) => format!("fetch timed out after {}s", fetch_timeout.as_secs_f32()),
    };

    tracing::warn!(
        channel = %channel.channel_id,
        %date,
        %reason,
        "Listing unavailable"
    );
    DayListing::Absent { date, reason }
}

/// Builds the timeline of one channel.
///
/// Every requested date and the lookahead date are fetched concurrently;
/// results are resolved strictly in date order.
#[instrument(skip_all, fields(channel = %channel.channel_id))]
pub async fn run_channel(
    source: &(impl LocalListingSource + Sync),
    channel: &ChannelInfo,
    dates: &[NaiveDate],
    settings: &ScheduleSettings,
    fetch_timeout: Duration,
) -> ChannelTimeline {
    let mut assembler = TimelineAssembler::new(channel.channel_id.clone(), *settings);
    let Some(last) = dates.last() else {
        return assembler.finish(DayListing::Absent {
            date: NaiveDate::MIN,
            reason: String::from("no dates requested"),
        });
    };
    let lookahead = last.succ_opt().unwrap_or(*last);

    let fetches = dates
        .iter()
        .chain(std::iter::once(&lookahead))
        .map(|date| fetch_day(source, channel, *date, settings, fetch_timeout));
    let mut listings = futures::future::join_all(fetches).await;

    let lookahead_listing = listings.pop().unwrap_or(DayListing::Absent {
        date: lookahead,
        reason: String::from("lookahead not fetched"),
    });
    for listing in listings {
        assembler.push(listing);
    }
    assembler.finish(lookahead_listing)
}

/// Runs every channel of the registry and emits the finished timelines.
///
/// Channels are processed on a bounded pool and emitted in registry order.
/// A channel with an invalid registry row, or still running when the run
/// deadline passes, is skipped whole and reported in the summary.
///
/// # Errors
///
/// Returns an error if the registry cannot be loaded or the sink fails.
#[instrument(skip_all)]
pub async fn run_all(
    source: &(impl LocalListingSource + Sync),
    registry: &impl ChannelRegistry,
    sink: &mut impl TimelineSink,
    settings: &ScheduleSettings,
    options: &RunOptions,
) -> Result<RunSummary> {
    let channels = registry
        .list_channels()
        .context("failed to load channel registry")?;
    tracing::info!(
        channels = channels.len(),
        dates = options.dates.len(),
        "Starting run"
    );

    let deadline = options
        .run_timeout
        .and_then(|limit| tokio::time::Instant::now().checked_add(limit));

    let mut outcomes = futures::stream::iter(channels.into_iter().map(|channel| async move {
        let outcome = process_channel(source, &channel, settings, options, deadline).await;
        (channel, outcome)
    }))
    .buffered(options.concurrency.max(1));

    let mut summary = RunSummary::default();
    while let Some((channel, outcome)) = outcomes.next().await {
        match outcome {
            Ok(timeline) => {
                sink.emit(
                    &timeline.channel_id,
                    &channel.display_name,
                    &timeline.programs,
                )
                .with_context(|| format!("failed to emit channel {}", timeline.channel_id))?;

                if timeline.incomplete {
                    summary.channels_incomplete = summary.channels_incomplete.saturating_add(1);
                } else {
                    summary.channels_ok = summary.channels_ok.saturating_add(1);
                }
                summary.programs = summary.programs.saturating_add(timeline.programs.len());
                summary.diagnostics = summary
                    .diagnostics
                    .saturating_add(timeline.diagnostics.len());
            }
            Err(failed) => {
                tracing::warn!(channel = %failed.channel_id, reason = %failed.reason, "Channel skipped");
                summary.failed.push(failed);
            }
        }
    }

    summary.log();
    Ok(summary)
}

async fn process_channel(
    source: &(impl LocalListingSource + Sync),
    channel: &ChannelInfo,
    settings: &ScheduleSettings,
    options: &RunOptions,
    deadline: Option<tokio::time::Instant>,
) -> Result<ChannelTimeline, ChannelFailed> {
    channel
        .validate()
        .map_err(|e| ChannelFailed::new(channel.channel_id.clone(), format!("{e:#}")))?;

    let work = run_channel(
        source,
        channel,
        &options.dates,
        settings,
        options.fetch_timeout,
    );
    match deadline {
        Some(at) => tokio::time::timeout_at(at, work).await.map_err(|_| {
            ChannelFailed::new(
                channel.channel_id.clone(),
                "cancelled: run deadline exceeded",
            )
        }),
        None => Ok(work.await),
    }
}
