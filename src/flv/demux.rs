//! The incremental FLV demuxer (SPEC_FULL.md §4.6): header validation, the
//! tag loop with rewind-on-short-tag framing recovery, audio/video/script
//! dispatch, rolling bitrate, and the frame-rate sampler.

use std::collections::VecDeque;
use std::time::Instant;

use bytes::Bytes;

use crate::amf0::Amf0Decoder;
use crate::callbacks::Callbacks;
use crate::error::DemuxError;
use crate::flv::tag::{parse_tag_header, sign_extend_24, u24_be, TagKind, MIN_TAG_FRAME_LEN};
use crate::h264::avcc::parse_avc_decoder_configuration_record;
use crate::media_info::{AudioCodec, MediaInfoAggregator};
use crate::track::Track;

const FLV_HEADER_LEN: usize = 13; // 9-byte header + 4-byte previousTagSize0
const AUDIO_SAMPLE_RATES: [u32; 4] = [5500, 11025, 22050, 44100];
const FPS_WINDOW: usize = 30;
const FPS_MIN_SAMPLES: usize = 5;

/// Wall-clock source for the frame-rate sampler (§4.6.4). Abstracted so
/// tests can drive deterministic deltas instead of real elapsed time.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        self.start.elapsed().as_millis() as i64
    }
}

pub struct FlvDemuxer {
    callbacks: Callbacks,
    clock: Box<dyn Clock>,

    first_parse: bool,
    has_audio: bool,
    has_video: bool,
    audio_metadata_dispatched: bool,
    video_metadata_dispatched: bool,

    audio_track: Track,
    video_track: Track,
    audio_bytes: u64,
    video_bytes: u64,
    begin_time: Option<i32>,
    end_time: i32,

    aggregator: MediaInfoAggregator,
    media_info_dispatched: bool,
    last_reported_fps: Option<f64>,

    last_pts: Option<i32>,
    last_frame_time: Option<i64>,
    fps_samples: VecDeque<f64>,
}

impl FlvDemuxer {
    pub fn new(callbacks: Callbacks) -> Self {
        Self::with_clock(callbacks, Box::new(SystemClock::new()))
    }

    pub fn with_clock(callbacks: Callbacks, clock: Box<dyn Clock>) -> Self {
        Self {
            callbacks,
            clock,
            first_parse: true,
            has_audio: false,
            has_video: false,
            audio_metadata_dispatched: false,
            video_metadata_dispatched: false,
            audio_track: Track::audio(),
            video_track: Track::video(),
            audio_bytes: 0,
            video_bytes: 0,
            begin_time: None,
            end_time: 0,
            aggregator: MediaInfoAggregator::default(),
            media_info_dispatched: false,
            last_reported_fps: None,
            last_pts: None,
            last_frame_time: None,
            fps_samples: VecDeque::with_capacity(FPS_WINDOW),
        }
    }

    /// Parse as much of `buf[byte_start..byte_end]` as framing allows,
    /// returning the number of bytes of that window actually consumed. The
    /// caller resubmits `window[consumed..]` prepended to whatever new bytes
    /// arrive next.
    pub fn parse_chunks(
        &mut self,
        buf: &[u8],
        byte_start: usize,
        byte_end: usize,
    ) -> Result<usize, DemuxError> {
        let window = &buf[byte_start..byte_end];
        let mut offset = 0usize;

        if self.first_parse {
            if window.len() < FLV_HEADER_LEN {
                return Ok(0);
            }
            if &window[0..3] != b"FLV" {
                return Err(DemuxError::FormatError {
                    reason: "missing FLV signature".into(),
                });
            }
            let flags = window[4];
            self.has_audio = flags & 0x04 != 0;
            self.has_video = flags & 0x01 != 0;
            self.aggregator
                .set_header_flags(self.has_audio, self.has_video);
            offset = FLV_HEADER_LEN;
            self.first_parse = false;
        }

        loop {
            let remaining = window.len() - offset;
            if remaining < MIN_TAG_FRAME_LEN {
                break;
            }
            let tag_start = offset;
            offset += 4; // previousTagSize, discarded
            let header = parse_tag_header(&window[offset..offset + 11]);
            offset += 11;

            let data_size = header.data_size as usize;
            if offset + data_size > window.len() {
                return Ok(tag_start);
            }
            let payload = &window[offset..offset + data_size];
            offset += data_size;

            if header.stream_id != 0 {
                continue;
            }

            if self.begin_time.is_none() {
                self.begin_time = Some(header.timestamp);
            }
            self.end_time = header.timestamp;

            match header.kind {
                Some(TagKind::Audio) => self.handle_audio(payload, header.timestamp),
                Some(TagKind::Video) => self.handle_video(payload, header.timestamp),
                Some(TagKind::Script) => self.handle_script(payload),
                None => tracing::warn!(data_size, "unknown FLV tag type, skipping"),
            }
        }

        if let Some(begin) = self.begin_time {
            let duration_s = (self.end_time - begin) as f64 / 1000.0;
            if duration_s > 0.0 {
                if self.audio_bytes > 0 {
                    let rate = (self.audio_bytes as f64 * 8.0 / duration_s / 1000.0).round();
                    self.aggregator.set_audio_data_rate(rate);
                }
                if self.video_bytes > 0 {
                    let rate = (self.video_bytes as f64 * 8.0 / duration_s / 1000.0).round();
                    self.aggregator.set_video_data_rate(rate);
                }
                self.dispatch_media_info_if_needed();
            }
        }

        Ok(offset)
    }

    fn handle_audio(&mut self, payload: &[u8], timestamp: i32) {
        self.audio_bytes += payload.len() as u64;
        if payload.is_empty() {
            return;
        }
        let header_byte = payload[0];
        let sound_format = header_byte >> 4;
        let sound_rate_idx = ((header_byte >> 2) & 0x03) as usize;
        let sound_type = header_byte & 0x01;
        let rest = &payload[1..];

        let codec = match sound_format {
            10 => Some(AudioCodec::Aac),
            2 => Some(AudioCodec::Mp3),
            _ => None,
        };

        if let Some(codec) = codec {
            if !self.audio_metadata_dispatched {
                let sample_rate = AUDIO_SAMPLE_RATES[sound_rate_idx];
                let channels = if sound_type == 0 { 1 } else { 2 };
                self.aggregator.apply_audio_header(codec, sample_rate, channels);
                self.audio_metadata_dispatched = true;
                self.dispatch_media_info_if_needed();
            }
            if matches!(codec, AudioCodec::Aac) && !rest.is_empty() && rest[0] == 0 {
                tracing::debug!("AAC AudioSpecificConfig received");
            }
        }

        self.audio_track.next_sequence();
        self.callbacks
            .fire_data(self.audio_track, Bytes::copy_from_slice(rest), timestamp, timestamp);
    }

    fn handle_video(&mut self, payload: &[u8], timestamp: i32) {
        self.video_bytes += payload.len() as u64;
        if payload.len() < 5 {
            return;
        }
        let header_byte = payload[0];
        let frame_type = header_byte >> 4;
        let codec_id = header_byte & 0x0F;
        if codec_id != 7 {
            return;
        }
        if frame_type == 5 {
            return;
        }
        let avc_packet_type = payload[1];
        let composition_time = sign_extend_24(u24_be(&payload[2..5]));
        let nal_payload = &payload[5..];

        match avc_packet_type {
            0 => {
                if !self.video_metadata_dispatched {
                    if let Some(cfg) = parse_avc_decoder_configuration_record(nal_payload) {
                        self.aggregator.apply_avcc(&cfg);
                        self.video_metadata_dispatched = true;
                        self.dispatch_media_info_if_needed();
                    }
                }
            }
            1 => {
                let dts = timestamp;
                let pts = dts + composition_time;
                self.sample_frame_rate(pts);
                self.video_track.next_sequence();
                self.callbacks.fire_data(
                    self.video_track,
                    Bytes::copy_from_slice(nal_payload),
                    pts,
                    dts,
                );
                self.callbacks.fire_timestamp(pts, dts);
            }
            _ => {}
        }
    }

    fn handle_script(&mut self, payload: &[u8]) {
        let mut decoder = Amf0Decoder::new(payload);
        let _name = decoder.decode();
        let Some(value) = decoder.decode() else {
            tracing::warn!("script tag missing metadata value");
            return;
        };
        self.aggregator.apply_script_metadata(&value);
        self.callbacks.fire_script_data(&value);
        self.dispatch_media_info_if_needed();
    }

    fn sample_frame_rate(&mut self, pts: i32) {
        let now = self.clock.now_ms();
        if let (Some(last_pts), Some(last_time)) = (self.last_pts, self.last_frame_time) {
            let pts_delta = pts - last_pts;
            let time_delta = now - last_time;
            if pts_delta > 0 && time_delta > 0 {
                let r_pts = 90000.0 / pts_delta as f64;
                let r_time = 1000.0 / time_delta as f64;
                let sample = 0.7 * r_pts + 0.3 * r_time;
                if self.fps_samples.len() == FPS_WINDOW {
                    self.fps_samples.pop_front();
                }
                self.fps_samples.push_back(sample);
                if self.fps_samples.len() >= FPS_MIN_SAMPLES {
                    let mean = self.fps_samples.iter().sum::<f64>() / self.fps_samples.len() as f64;
                    self.aggregator.set_sampled_frame_rate(mean);
                    self.dispatch_media_info_if_needed();
                }
            }
        }
        self.last_pts = Some(pts);
        self.last_frame_time = Some(now);
    }

    fn dispatch_media_info_if_needed(&mut self) {
        if !self.media_info_dispatched {
            self.media_info_dispatched = true;
            self.last_reported_fps = self.aggregator.current_fps();
            let snapshot = self.aggregator.snapshot();
            self.callbacks.fire_media_info(&snapshot);
            return;
        }
        if let Some(fps) = self.aggregator.current_fps() {
            let changed = match self.last_reported_fps {
                Some(last) => (fps - last).abs() > 0.5,
                None => true,
            };
            if changed {
                self.last_reported_fps = Some(fps);
                let snapshot = self.aggregator.snapshot();
                self.callbacks.fire_media_info(&snapshot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h264::test_support::{build_high_profile_sps_rbsp, build_sps_rbsp, VuiParams};
    use crate::media_info::MediaInfo;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct ManualClock {
        current: Cell<i64>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self { current: Cell::new(0) }
        }
        fn advance(&self, ms: i64) {
            self.current.set(self.current.get() + ms);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.current.get()
        }
    }

    fn flv_header(has_audio: bool, has_video: bool) -> Vec<u8> {
        let mut flags = 0u8;
        if has_audio {
            flags |= 0x04;
        }
        if has_video {
            flags |= 0x01;
        }
        let mut out = vec![b'F', b'L', b'V', 1, flags];
        out.extend(9u32.to_be_bytes());
        out.extend(0u32.to_be_bytes()); // previousTagSize0
        out
    }

    fn tag_bytes(tag_type: u8, timestamp: i32, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; 4]; // previousTagSize of the prior tag, unchecked
        out.push(tag_type);
        let data_size = payload.len() as u32;
        out.extend(&data_size.to_be_bytes()[1..4]);
        let ts = timestamp as u32;
        out.extend(&ts.to_be_bytes()[1..4]);
        out.push((ts >> 24) as u8);
        out.extend([0u8, 0, 0]); // streamId
        out.extend_from_slice(payload);
        out
    }

    fn avcc_record(profile: u8, level: u8, sps: &[u8], pps: &[u8]) -> Vec<u8> {
        let mut record = vec![1, profile, 0, level, 0xFF, 0xE1];
        record.extend((sps.len() as u16).to_be_bytes());
        record.extend_from_slice(sps);
        record.push(1);
        record.extend((pps.len() as u16).to_be_bytes());
        record.extend_from_slice(pps);
        record
    }

    fn avc_config_tag(timestamp: i32, profile: u8, level: u8, sps: &[u8]) -> Vec<u8> {
        let record = avcc_record(profile, level, sps, &[0x68, 0xCE, 0x3C, 0x80]);
        let mut payload = vec![(1u8 << 4) | 7, 0, 0, 0, 0];
        payload.extend(record);
        tag_bytes(9, timestamp, &payload)
    }

    fn nal_tag(timestamp: i32, composition_time: i32, nal: &[u8]) -> Vec<u8> {
        let mut payload = vec![(1u8 << 4) | 7, 1];
        let ct = composition_time as u32 & 0x00FF_FFFF;
        payload.extend(&ct.to_be_bytes()[1..4]);
        payload.extend_from_slice(nal);
        tag_bytes(9, timestamp, &payload)
    }

    fn script_tag(width: f64, height: f64, framerate: f64) -> Vec<u8> {
        fn encode_str(s: &str) -> Vec<u8> {
            let mut out = vec![0x02];
            out.extend((s.len() as u16).to_be_bytes());
            out.extend_from_slice(s.as_bytes());
            out
        }
        fn encode_num(n: f64) -> Vec<u8> {
            let mut out = vec![0x00];
            out.extend(n.to_be_bytes());
            out
        }
        let mut payload = encode_str("onMetaData");
        payload.push(0x03);
        for (key, val) in [("width", width), ("height", height), ("framerate", framerate)] {
            payload.extend((key.len() as u16).to_be_bytes());
            payload.extend_from_slice(key.as_bytes());
            payload.extend(encode_num(val));
        }
        payload.extend([0x00, 0x00, 0x09]);
        tag_bytes(18, 0, &payload)
    }

    #[test]
    fn header_only_reports_flags_and_no_callbacks() {
        let data = flv_header(true, true);
        assert_eq!(data.len(), 13);
        let fired = Rc::new(Cell::new(false));
        let fired2 = fired.clone();
        let callbacks = Callbacks::new().with_on_media_info(move |_| fired2.set(true));
        let mut demux = FlvDemuxer::new(callbacks);
        let consumed = demux.parse_chunks(&data, 0, data.len()).unwrap();
        assert_eq!(consumed, 13);
        assert!(!fired.get());
        assert!(demux.has_audio);
        assert!(demux.has_video);
    }

    #[test]
    fn script_metadata_fires_once() {
        let mut stream = flv_header(false, false);
        stream.extend(script_tag(1280.0, 720.0, 30.0));

        let script_calls = Rc::new(RefCell::new(Vec::new()));
        let script_calls2 = script_calls.clone();
        let info_calls = Rc::new(RefCell::new(Vec::new()));
        let info_calls2 = info_calls.clone();
        let callbacks = Callbacks::new()
            .with_on_script_data(move |v| script_calls2.borrow_mut().push(v.clone()))
            .with_on_media_info(move |info: &MediaInfo| info_calls2.borrow_mut().push(info.clone()));
        let mut demux = FlvDemuxer::new(callbacks);
        demux.parse_chunks(&stream, 0, stream.len()).unwrap();

        assert_eq!(script_calls.borrow().len(), 1);
        assert_eq!(info_calls.borrow().len(), 1);
        let info = &info_calls.borrow()[0];
        assert_eq!(info.width, Some(1280));
        assert_eq!(info.height, Some(720));
        assert_eq!(info.fps, Some(30.0));
    }

    #[test]
    fn avc_config_record_populates_media_info() {
        let sps = build_sps_rbsp(66, 30, 19, 14, true, None); // 320x240
        let mut stream = flv_header(false, true);
        stream.extend(avc_config_tag(0, 66, 30, &sps));

        let info_calls = Rc::new(RefCell::new(Vec::new()));
        let info_calls2 = info_calls.clone();
        let callbacks =
            Callbacks::new().with_on_media_info(move |info: &MediaInfo| info_calls2.borrow_mut().push(info.clone()));
        let mut demux = FlvDemuxer::new(callbacks);
        demux.parse_chunks(&stream, 0, stream.len()).unwrap();

        let info = &info_calls.borrow()[0];
        assert_eq!(info.video_codec.map(|c| c.as_str()), Some("avc"));
        assert_eq!(info.profile, Some(66));
        assert_eq!(info.level, Some(30));
        assert_eq!(info.width, Some(320));
        assert_eq!(info.height, Some(240));
        assert_eq!(info.chroma_format.map(|c| c.as_str()), Some("4:2:0"));
        assert_eq!(info.bit_depth, Some(8));
        assert_eq!(info.pix_fmt.map(|p| p.as_str()), Some("yuv420p"));
    }

    #[test]
    fn high_profile_vui_colorimetry_is_reported() {
        let sps = build_high_profile_sps_rbsp(
            100,
            31,
            1,
            2,
            2,
            19,
            14,
            Some(VuiParams {
                color_primaries: 9,
                transfer_characteristics: 16,
                matrix_coefficients: 9,
                full_range: true,
                timing: Some((1, 60)),
            }),
        );
        let mut stream = flv_header(false, true);
        stream.extend(avc_config_tag(0, 100, 31, &sps));

        let info_calls = Rc::new(RefCell::new(Vec::new()));
        let info_calls2 = info_calls.clone();
        let callbacks =
            Callbacks::new().with_on_media_info(move |info: &MediaInfo| info_calls2.borrow_mut().push(info.clone()));
        let mut demux = FlvDemuxer::new(callbacks);
        demux.parse_chunks(&stream, 0, stream.len()).unwrap();

        let info = &info_calls.borrow()[0];
        assert_eq!(info.pix_fmt.map(|p| p.as_str()), Some("yuv420p10le"));
        assert_eq!(info.bit_depth, Some(10));
        assert_eq!(info.color_primaries, Some("bt2020"));
        assert_eq!(info.color_transfer, Some("smpte2084"));
        assert_eq!(info.color_space, Some("bt2020nc"));
        assert_eq!(info.color_range.map(|c| c.as_str()), Some("full"));
        assert_eq!(info.fps, Some(30.0));
    }

    #[test]
    fn frame_rate_sampler_converges_near_expected_value() {
        let clock = Rc::new(ManualClock::new());
        let clock_dyn: Box<dyn Clock> = {
            struct Wrapper(Rc<ManualClock>);
            impl Clock for Wrapper {
                fn now_ms(&self) -> i64 {
                    self.0.now_ms()
                }
            }
            Box::new(Wrapper(clock.clone()))
        };

        let mut stream = flv_header(false, true);
        let mut pts = 0i32;
        for _ in 0..6 {
            stream.extend(nal_tag(pts, 0, b"nal"));
            pts += 3600;
        }

        let mut demux = FlvDemuxer::with_clock(Callbacks::new(), clock_dyn);
        let mut offset = 0;
        let tags = 6;
        let per_tag_len = (stream.len() - 13) / tags;
        // Feed the header, then advance the clock by 40ms before each tag.
        let consumed = demux.parse_chunks(&stream, 0, 13).unwrap();
        offset += consumed;
        for _ in 0..tags {
            clock.advance(40);
            let consumed = demux
                .parse_chunks(&stream, offset, offset + per_tag_len)
                .unwrap();
            offset += consumed;
        }

        let fps = demux.aggregator.current_fps().unwrap();
        assert!((fps - 25.0).abs() < 0.5, "fps was {fps}");
    }

    #[test]
    fn truncated_tag_rewinds_and_resubmission_matches_single_call() {
        let sps = build_sps_rbsp(66, 30, 19, 14, true, None);
        let mut stream = flv_header(false, true);
        stream.extend(avc_config_tag(0, 66, 30, &sps));
        stream.extend(nal_tag(40, 0, b"nal-payload"));

        let single_calls = Rc::new(RefCell::new(0usize));
        let single_calls2 = single_calls.clone();
        let callbacks = Callbacks::new().with_on_data(move |_, _, _, _| *single_calls2.borrow_mut() += 1);
        let mut whole = FlvDemuxer::new(callbacks);
        whole.parse_chunks(&stream, 0, stream.len()).unwrap();

        let split_calls = Rc::new(RefCell::new(0usize));
        let split_calls2 = split_calls.clone();
        let callbacks = Callbacks::new().with_on_data(move |_, _, _, _| *split_calls2.borrow_mut() += 1);
        let mut split = FlvDemuxer::new(callbacks);

        let cut = stream.len() - 4; // ends mid-payload of the last tag
        let consumed_first = split.parse_chunks(&stream, 0, cut).unwrap();
        assert!(consumed_first < cut);

        let mut combined = stream[consumed_first..cut].to_vec();
        combined.extend_from_slice(&stream[cut..]);
        split.parse_chunks(&combined, 0, combined.len()).unwrap();

        assert_eq!(*single_calls.borrow(), *split_calls.borrow());
    }
}
