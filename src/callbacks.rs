//! SPEC_FULL.md §9: "Callbacks are modeled as a small capability record the
//! caller passes at construction (four optional function slots)."

use bytes::Bytes;

use crate::amf0::Amf0Value;
use crate::media_info::MediaInfo;
use crate::track::Track;

/// Four optional callback slots. Each is invoked synchronously on the
/// thread that called [`crate::flv::demux::FlvDemuxer::parse_chunks`]; none
/// may re-enter the demuxer.
#[derive(Default)]
pub struct Callbacks {
    pub on_data: Option<Box<dyn FnMut(Track, Bytes, i32, i32)>>,
    pub on_media_info: Option<Box<dyn FnMut(&MediaInfo)>>,
    pub on_script_data: Option<Box<dyn FnMut(&Amf0Value)>>,
    pub on_timestamp: Option<Box<dyn FnMut(i32, i32)>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_data(mut self, f: impl FnMut(Track, Bytes, i32, i32) + 'static) -> Self {
        self.on_data = Some(Box::new(f));
        self
    }

    pub fn with_on_media_info(mut self, f: impl FnMut(&MediaInfo) + 'static) -> Self {
        self.on_media_info = Some(Box::new(f));
        self
    }

    pub fn with_on_script_data(mut self, f: impl FnMut(&Amf0Value) + 'static) -> Self {
        self.on_script_data = Some(Box::new(f));
        self
    }

    pub fn with_on_timestamp(mut self, f: impl FnMut(i32, i32) + 'static) -> Self {
        self.on_timestamp = Some(Box::new(f));
        self
    }

    pub(crate) fn fire_data(&mut self, track: Track, bytes: Bytes, pts: i32, dts: i32) {
        if let Some(f) = &mut self.on_data {
            f(track, bytes, pts, dts);
        }
    }

    pub(crate) fn fire_media_info(&mut self, info: &MediaInfo) {
        if let Some(f) = &mut self.on_media_info {
            f(info);
        }
    }

    pub(crate) fn fire_script_data(&mut self, value: &Amf0Value) {
        if let Some(f) = &mut self.on_script_data {
            f(value);
        }
    }

    pub(crate) fn fire_timestamp(&mut self, pts: i32, dts: i32) {
        if let Some(f) = &mut self.on_timestamp {
            f(pts, dts);
        }
    }
}
