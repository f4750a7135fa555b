//! `channels.xml` registry loader.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use epgmgr_core::{ChannelInfo, ChannelRegistry};
use serde::Deserialize;

/// Root `<channels>` element.
#[derive(Debug, Deserialize)]
struct ChannelsDocument {
    /// Rows in file order.
    #[serde(rename = "channel", default)]
    channels: Vec<ChannelRow>,
}

/// One `<channel site_id=".." xmltv_id="..">Name</channel>` row.
#[derive(Debug, Deserialize)]
struct ChannelRow {
    #[serde(rename = "@site_id", default)]
    site_id: String,
    #[serde(rename = "@xmltv_id", default)]
    xmltv_id: String,
    #[serde(rename = "$text", default)]
    name: String,
}

impl From<ChannelRow> for ChannelInfo {
    fn from(row: ChannelRow) -> Self {
        let xmltv_id = row.xmltv_id.trim();
        let name = row.name.trim();
        // Unnamed channels are displayed under their id.
        let display_name = if name.is_empty() { xmltv_id } else { name };
        Self::new(xmltv_id, row.site_id.trim(), display_name)
    }
}

/// Channel registry backed by a `channels.xml` file.
///
/// The file is read on every [`ChannelRegistry::list_channels`] call, which
/// happens once per run. Rows with a blank `site_id` or `xmltv_id` are
/// returned as-is; the run reports them as failed channels.
#[derive(Debug, Clone)]
pub struct ChannelsFile {
    path: PathBuf,
}

impl ChannelsFile {
    /// Creates a registry reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the registry file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses a `channels.xml` document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not well-formed.
    pub fn parse(xml: &str) -> Result<Vec<ChannelInfo>> {
        let document: ChannelsDocument =
            quick_xml::de::from_str(xml).context("failed to parse channels document")?;
        Ok(document
            .channels
            .into_iter()
            .map(ChannelInfo::from)
            .collect())
    }
}

impl ChannelRegistry for ChannelsFile {
    fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let channels = Self::parse(&content)
            .with_context(|| format!("failed to load {}", self.path.display()))?;
        tracing::debug!(
            path = %self.path.display(),
            channels = channels.len(),
            "Loaded channel registry"
        );
        Ok(channels)
    }
}
