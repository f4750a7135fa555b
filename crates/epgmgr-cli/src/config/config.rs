//! `AppConfig` struct and TOML read/write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use epgmgr_core::{CutoffPolicy, DateWindow, ScheduleSettings, SiteClock};
use epgmgr_xmltv::{Rating, XmltvOptions};
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Broadcast day and timeline settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Listing source settings.
    #[serde(default)]
    pub source: SourceConfig,
    /// Registry and output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[schedule]` section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Hour (0-23) at which the broadcast day rolls over.
    pub cutoff_hour: u32,
    /// Requested dates as `[start, end]` day offsets from today.
    pub date_window: [i64; 2],
    /// Duration given to a last program whose next day is missing.
    pub fallback_duration_minutes: u32,
    /// Gaps longer than this are reported; 0 disables the check.
    pub coverage_gap_warning_minutes: u32,
    /// UTC offset of the site wall clock (`+0000`, `-03:00`).
    pub utc_offset: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cutoff_hour: 3,
            date_window: [-1, 2],
            fallback_duration_minutes: 60,
            coverage_gap_warning_minutes: 180,
            utc_offset: String::from("+0000"),
        }
    }
}

/// `[source]` section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    /// Listing endpoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// User-Agent override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Minimum interval between requests, in milliseconds.
    pub min_interval_ms: u64,
    /// Upper bound for one listing fetch (retries included), in seconds.
    pub fetch_timeout_secs: u64,
    /// Channels processed concurrently.
    pub concurrency: usize,
    /// Overall run deadline in seconds; unset means none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            min_interval_ms: 1000,
            fetch_timeout_secs: 30,
            concurrency: 4,
            run_timeout_secs: None,
        }
    }
}

impl SourceConfig {
    /// Minimum interval between requests.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Per-fetch timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Run deadline, if any.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// `[output]` section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Channel registry file.
    pub channels_file: PathBuf,
    /// XMLTV output file.
    pub path: PathBuf,
    /// Language of titles and descriptions.
    pub lang: String,
    /// `generator-info-name` of the document.
    pub generator_name: String,
    /// Rating system; set together with `rating_value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_system: Option<String>,
    /// Rating value; set together with `rating_system`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_value: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let defaults = XmltvOptions::default();
        Self {
            channels_file: PathBuf::from("channels.xml"),
            path: PathBuf::from("epg.xml"),
            lang: defaults.lang,
            generator_name: defaults.generator_name,
            rating_system: None,
            rating_value: None,
        }
    }
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Serializes the config as pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config to TOML")
    }

    /// Checks every value and converts it into its typed form once.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.schedule_settings()?;
        self.date_window()?;
        self.xmltv_options()?;
        if self.source.concurrency == 0 {
            bail!("source.concurrency must be at least 1");
        }
        if self.source.fetch_timeout_secs == 0 {
            bail!("source.fetch_timeout_secs must be at least 1");
        }
        if self.source.run_timeout_secs == Some(0) {
            bail!("source.run_timeout_secs must be at least 1 when set");
        }
        Ok(())
    }

    /// Schedule settings for the normalization pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the cutoff hour, offset or fallback is invalid.
    pub fn schedule_settings(&self) -> Result<ScheduleSettings> {
        let schedule = &self.schedule;
        let policy =
            CutoffPolicy::new(schedule.cutoff_hour).context("invalid schedule.cutoff_hour")?;
        let clock = SiteClock::parse_offset(&schedule.utc_offset)
            .context("invalid schedule.utc_offset")?;
        ScheduleSettings::new(
            policy,
            clock,
            schedule.fallback_duration_minutes,
            schedule.coverage_gap_warning_minutes,
        )
        .context("invalid schedule.fallback_duration_minutes")
    }

    /// Requested date window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window start is after its end.
    pub fn date_window(&self) -> Result<DateWindow> {
        let [start, end] = self.schedule.date_window;
        DateWindow::new(start, end).context("invalid schedule.date_window")
    }

    /// XMLTV writer options.
    ///
    /// # Errors
    ///
    /// Returns an error if only one of the rating fields is set.
    pub fn xmltv_options(&self) -> Result<XmltvOptions> {
        let output = &self.output;
        let rating = match (&output.rating_system, &output.rating_value) {
            (Some(system), Some(value)) => Some(Rating {
                system: system.clone(),
                value: value.clone(),
            }),
            (None, None) => None,
            _ => bail!("output.rating_system and output.rating_value must be set together"),
        };
        Ok(XmltvOptions {
            generator_name: output.generator_name.clone(),
            lang: output.lang.clone(),
            rating,
        })
    }
}
