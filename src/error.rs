//! Public error type returned from [`crate::flv::demux::FlvDemuxer::parse_chunks`].
//!
//! `EndOfData` (bitreader/h264) and `Warning` conditions (tracing events)
//! never surface here -- see SPEC_FULL.md §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemuxError {
    #[error("FLV format error: {reason}")]
    FormatError { reason: String },
}
