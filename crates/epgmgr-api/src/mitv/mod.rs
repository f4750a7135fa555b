//! mi.tv listing source module.
//!
//! Fetches one HTML page per channel and date from the mi.tv async channel
//! endpoint and extracts the raw listing entries from it.

mod client;
mod html;
mod rate_limiter;

#[allow(clippy::module_name_repetitions)]
pub use client::{DEFAULT_BASE_URL, MiTvClient, MiTvClientBuilder};
pub use html::parse_listing;
