//! Listing source clients for epgmgr.
//!
//! Provides the mi.tv channel page client, which implements
//! `epgmgr_core::ListingSource`.

/// mi.tv channel page client.
pub mod mitv;
