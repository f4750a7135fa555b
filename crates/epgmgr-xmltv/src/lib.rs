//! Channel registry and XMLTV output for epgmgr.
//!
//! Loads the `channels.xml` registry and renders finalized channel
//! timelines as an XMLTV document.

/// `channels.xml` registry loader.
pub mod channels;

/// XMLTV document writer.
pub mod writer;

pub use channels::ChannelsFile;
pub use writer::{Rating, XmltvOptions, XmltvWriter};
