//! Collaborator contracts: listing source, channel registry and formatter.
#![allow(clippy::future_not_send)]

use anyhow::Result;
use chrono::NaiveDate;

use crate::types::{ChannelInfo, Program, RawEntry};

/// Raw listing source.
///
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(ListingSource: Send)]
pub trait LocalListingSource {
    /// Fetches the published listing of one channel for one calendar date.
    ///
    /// `Ok(None)` means the site has no listing for that date.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing could not be fetched or parsed; the
    /// caller treats the date as absent.
    async fn fetch_listing(&self, channel_ref: &str, date: NaiveDate)
    -> Result<Option<Vec<RawEntry>>>;
}

/// Channel registry, read once at the start of a run.
pub trait ChannelRegistry {
    /// Lists every configured channel in output order.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be loaded.
    fn list_channels(&self) -> Result<Vec<ChannelInfo>>;
}

/// Formatter receiving finalized channel timelines.
pub trait TimelineSink {
    /// Emits one channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn emit(&mut self, channel_id: &str, display_name: &str, programs: &[Program]) -> Result<()>;
}

impl ChannelRegistry for Vec<ChannelInfo> {
    fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self.clone())
    }
}
