//! `MiTvClient` - mi.tv channel page client implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use epgmgr_core::{LocalListingSource, RawEntry};
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use super::html::parse_listing;
use super::rate_limiter::RequestPacer;

/// Default base URL of the per-channel listing endpoint.
pub const DEFAULT_BASE_URL: &str = "https://mi.tv/br/async/channel";

/// Maximum number of retries per page.
const MAX_RETRIES: u32 = 3;

/// Delay between retries.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// mi.tv listing client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct MiTvClient {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// Base URL; pages live at `{base}/{channel_ref}/{date}/0`.
    base_url: Url,
    /// Request pacer shared by all workers.
    pacer: Arc<Mutex<RequestPacer>>,
    /// Delay between retries.
    retry_delay: Duration,
}

/// Builder for `MiTvClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct MiTvClientBuilder {
    base_url: Option<Url>,
    user_agent: Option<String>,
    min_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    retry_delay: Option<Duration>,
}

impl MiTvClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            min_interval: None,
            request_timeout: None,
            retry_delay: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the minimum request interval (default: 1s).
    #[must_use]
    pub const fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    /// Sets the per-request timeout (default: 20s).
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the delay between retries (default: 2s).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - The base URL cannot carry path segments.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<MiTvClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            Url::parse(DEFAULT_BASE_URL).context("invalid default base URL")?
        };
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("base URL cannot carry a path: {base_url}"));
        }

        let min_interval = self.min_interval.unwrap_or(Duration::from_secs(1));
        let request_timeout = self.request_timeout.unwrap_or(Duration::from_secs(20));

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(MiTvClient {
            http_client,
            base_url,
            pacer: Arc::new(Mutex::new(RequestPacer::new(min_interval))),
            retry_delay: self.retry_delay.unwrap_or(RETRY_DELAY),
        })
    }
}

impl MiTvClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> MiTvClientBuilder {
        MiTvClientBuilder::new()
    }

    /// URL of one channel page.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry path segments.
    pub fn page_url(&self, channel_ref: &str, date: NaiveDate) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("base URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .push(channel_ref)
            .push(&date.format("%Y-%m-%d").to_string())
            .push("0");
        Ok(url)
    }

    /// Waits before the next attempt; the last attempt returns at once.
    async fn back_off(attempt: u32, delay: Duration) {
        if attempt < MAX_RETRIES {
            tokio::time::sleep(delay).await;
        }
    }

    /// Fetches a page body with retry logic.
    ///
    /// Retries up to `MAX_RETRIES` times on transport errors, server errors
    /// and rate limiting, pacing every attempt. `404 Not Found` is returned
    /// as `None` without retrying; other client errors fail immediately.
    async fn fetch_with_retry(&self, url: &Url) -> Result<Option<String>> {
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            let request_no = {
                let mut pacer = self.pacer.lock().await;
                pacer.wait().await;
                pacer.issued()
            };
            tracing::trace!(%url, attempt, request_no, "Sending request");

            let response = match self.http_client.get(url.clone()).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(
                        %url,
                        attempt,
                        error = %e,
                        "Request failed, will retry"
                    );
                    last_err = Some(anyhow::Error::new(e).context(format!("GET {url} failed")));
                    Self::back_off(attempt, self.retry_delay).await;
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                tracing::debug!(%url, "No listing published");
                return Ok(None);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map_or(self.retry_delay, |secs| {
                        Duration::from_secs(secs.saturating_add(1))
                    });

                tracing::warn!(
                    %url,
                    attempt,
                    code = status.as_u16(),
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limited, waiting before retry"
                );
                last_err = Some(anyhow!("GET {url} rate limited (HTTP {status})"));
                Self::back_off(attempt, retry_after).await;
                continue;
            }

            if status.is_server_error() {
                tracing::warn!(
                    %url,
                    attempt,
                    code = status.as_u16(),
                    "Server error, will retry"
                );
                last_err = Some(anyhow!("GET {url} failed (HTTP {status})"));
                Self::back_off(attempt, self.retry_delay).await;
                continue;
            }

            if !status.is_success() {
                return Err(anyhow!("GET {url} failed (HTTP {status})"));
            }

            match response.text().await {
                Ok(body) => {
                    tracing::debug!(%url, body_len = body.len(), "Response body received");
                    return Ok(Some(body));
                }
                Err(e) => {
                    tracing::warn!(
                        %url,
                        attempt,
                        error = %e,
                        "Failed to read response body, will retry"
                    );
                    last_err = Some(
                        anyhow::Error::new(e).context(format!("failed to read body of {url}")),
                    );
                    Self::back_off(attempt, self.retry_delay).await;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("GET {url} failed after retries")))
    }
}

impl LocalListingSource for MiTvClient {
    #[instrument(skip_all, fields(channel_ref = channel_ref, %date))]
    async fn fetch_listing(
        &self,
        channel_ref: &str,
        date: NaiveDate,
    ) -> Result<Option<Vec<RawEntry>>> {
        let url = self.page_url(channel_ref, date)?;
        let Some(body) = self.fetch_with_retry(&url).await? else {
            return Ok(None);
        };

        let entries = parse_listing(&body, date);
        tracing::debug!(channel_ref, %date, entries = entries.len(), "Parsed listing page");
        Ok(Some(entries))
    }
}
