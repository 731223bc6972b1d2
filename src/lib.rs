//! Byte-accurate FLV demultiplexer and H.264 SPS/VUI parser.
//!
//! The crate root wires the bit-level H.264 parsing (`h264`), the AMF0
//! script-data decoder (`amf0`), and the incremental FLV tag loop
//! (`flv::demux`) behind a single consolidated [`media_info::MediaInfo`]
//! record, delivered to the caller's [`callbacks::Callbacks`].

pub mod amf0;
pub mod bitreader;
pub mod callbacks;
pub mod codec_strings;
pub mod error;
pub mod flv;
pub mod h264;
pub mod media_info;
pub mod track;

pub use callbacks::Callbacks;
pub use error::DemuxError;
pub use flv::demux::{Clock, FlvDemuxer, SystemClock};
pub use media_info::MediaInfo;
pub use track::{Track, TrackKind};
