//! The consolidated, evolving description of the demuxed stream.
//!
//! SPEC_FULL.md §4.7 / §9: defaults are applied once at emission time, not
//! stored in the aggregator, so that a later precise value (an SPS arriving
//! after script-data, say) can still win.

use bytes::Bytes;

use crate::amf0::Amf0Value;
use crate::h264::avcc::AvcDecoderConfig;
use crate::h264::sps::{
    color_primaries_name, matrix_coefficients_name, transfer_characteristics_name, ChromaFormat,
    PixelFormat, SpsInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Mp3,
}

impl AudioCodec {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Avc,
}

impl VideoCodec {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoCodec::Avc => "avc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    Full,
    Limited,
}

impl ColorRange {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorRange::Full => "full",
            ColorRange::Limited => "limited",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub has_audio: bool,
    pub has_video: bool,
    pub audio_codec: Option<AudioCodec>,
    pub video_codec: Option<VideoCodec>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channel_count: Option<u8>,
    pub audio_data_rate: Option<f64>,
    pub video_data_rate: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub profile: Option<u8>,
    pub level: Option<u8>,
    pub sps: Option<Bytes>,
    pub pps: Option<Bytes>,
    pub chroma_format: Option<ChromaFormat>,
    pub bit_depth: Option<u8>,
    pub pix_fmt: Option<PixelFormat>,
    pub color_range: Option<ColorRange>,
    pub color_primaries: Option<&'static str>,
    pub color_transfer: Option<&'static str>,
    pub color_space: Option<&'static str>,
    pub color_primaries_raw: Option<u8>,
    pub transfer_characteristics: Option<u8>,
    pub matrix_coefficients: Option<u8>,
    pub frame_rate: Option<f64>,
    pub fps: Option<f64>,
    pub metadata: Option<Amf0Value>,
}

/// Owns the single evolving [`MediaInfo`] record for a demuxer instance.
#[derive(Debug, Default)]
pub struct MediaInfoAggregator {
    info: MediaInfo,
    width_from_sps: bool,
}

impl MediaInfoAggregator {
    pub fn set_header_flags(&mut self, has_audio: bool, has_video: bool) {
        self.info.has_audio = has_audio;
        self.info.has_video = has_video;
    }

    pub fn apply_avcc(&mut self, cfg: &AvcDecoderConfig) {
        self.info.video_codec = Some(VideoCodec::Avc);
        self.info.profile = Some(cfg.profile);
        self.info.level = Some(cfg.level);
        self.info.sps = Some(cfg.sps.clone());
        self.info.pps = Some(cfg.pps.clone());
        self.apply_sps_info(&cfg.sps_info);
    }

    fn apply_sps_info(&mut self, sps: &SpsInfo) {
        if sps.width > 0 && sps.height > 0 {
            self.info.width = Some(sps.width);
            self.info.height = Some(sps.height);
            self.width_from_sps = true;
        }
        self.info.chroma_format = Some(sps.chroma_format());
        self.info.bit_depth = Some(sps.luma_bit_depth());
        self.info.pix_fmt = Some(sps.pixel_format());

        if let Some(vui) = &sps.vui {
            self.info.color_range = Some(if vui.full_range {
                ColorRange::Full
            } else {
                ColorRange::Limited
            });
            self.info.color_primaries_raw = Some(vui.color_primaries);
            self.info.transfer_characteristics = Some(vui.transfer_characteristics);
            self.info.matrix_coefficients = Some(vui.matrix_coefficients);
            self.info.color_primaries = Some(color_primaries_name(vui.color_primaries));
            self.info.color_transfer = Some(transfer_characteristics_name(
                vui.transfer_characteristics,
            ));
            self.info.color_space = Some(matrix_coefficients_name(vui.matrix_coefficients));
            if let Some(fps) = vui.fps() {
                self.info.fps = Some(fps);
                self.info.frame_rate = Some(fps);
            }
        }
    }

    pub fn apply_audio_header(&mut self, codec: AudioCodec, sample_rate: u32, channels: u8) {
        self.info.audio_codec = Some(codec);
        self.info.audio_sample_rate = Some(sample_rate);
        self.info.audio_channel_count = Some(channels);
    }

    pub fn apply_script_metadata(&mut self, value: &Amf0Value) {
        if let (Some(w), Some(h)) = (
            value.get_property("width").and_then(Amf0Value::as_f64),
            value.get_property("height").and_then(Amf0Value::as_f64),
        ) {
            if !self.width_from_sps {
                self.info.width = Some(w as u32);
                self.info.height = Some(h as u32);
            }
        }
        if let Some(fps) = value
            .get_property("framerate")
            .or_else(|| value.get_property("fps"))
            .and_then(Amf0Value::as_f64)
        {
            self.info.fps = Some(fps);
            self.info.frame_rate = Some(fps);
        }
        self.info.metadata = Some(value.clone());
    }

    pub fn set_sampled_frame_rate(&mut self, fps: f64) {
        self.info.fps = Some(fps);
        self.info.frame_rate = Some(fps);
    }

    pub fn set_audio_data_rate(&mut self, kbps: f64) {
        self.info.audio_data_rate = Some(kbps);
    }

    pub fn set_video_data_rate(&mut self, kbps: f64) {
        self.info.video_data_rate = Some(kbps);
    }

    pub fn current_fps(&self) -> Option<f64> {
        self.info.fps
    }

    /// A consolidated snapshot with the §4.7 defaults filled in for fields
    /// still unset. The aggregator's own stored state is untouched.
    pub fn snapshot(&self) -> MediaInfo {
        let mut info = self.info.clone();
        if info.video_codec.is_some() || info.sps.is_some() {
            info.pix_fmt.get_or_insert(PixelFormat::Yuv420p);
            info.color_range.get_or_insert(ColorRange::Limited);
            info.color_space.get_or_insert("bt709");
            info.color_transfer.get_or_insert("bt709");
            info.color_primaries.get_or_insert("bt709");
            info.chroma_format.get_or_insert(ChromaFormat::Yuv420);
            info.bit_depth.get_or_insert(8);
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h264::avcc::parse_avc_decoder_configuration_record;
    use crate::h264::test_support::build_sps_rbsp;

    fn avcc_record(sps: &[u8]) -> Vec<u8> {
        let mut record = vec![1, 66, 0, 30, 0xFF, 0xE1];
        record.extend((sps.len() as u16).to_be_bytes());
        record.extend_from_slice(sps);
        record.push(0);
        record
    }

    #[test]
    fn script_data_does_not_override_sps_dimensions() {
        let sps_bytes = build_sps_rbsp(66, 30, 19, 14, true, None); // 320x240
        let record = avcc_record(&sps_bytes);
        let cfg = parse_avc_decoder_configuration_record(&record).unwrap();

        let mut agg = MediaInfoAggregator::default();
        agg.apply_avcc(&cfg);

        let meta = Amf0Value::Object(vec![
            ("width".into(), Amf0Value::Number(1920.0)),
            ("height".into(), Amf0Value::Number(1080.0)),
        ]);
        agg.apply_script_metadata(&meta);

        let snap = agg.snapshot();
        assert_eq!(snap.width, Some(320));
        assert_eq!(snap.height, Some(240));
    }

    #[test]
    fn script_data_sets_dimensions_before_sps_arrives() {
        let mut agg = MediaInfoAggregator::default();
        let meta = Amf0Value::Object(vec![
            ("width".into(), Amf0Value::Number(1280.0)),
            ("height".into(), Amf0Value::Number(720.0)),
            ("framerate".into(), Amf0Value::Number(30.0)),
        ]);
        agg.apply_script_metadata(&meta);
        let snap = agg.snapshot();
        assert_eq!(snap.width, Some(1280));
        assert_eq!(snap.height, Some(720));
        assert_eq!(snap.fps, Some(30.0));
    }

    #[test]
    fn snapshot_fills_defaults_only_when_video_present() {
        let agg = MediaInfoAggregator::default();
        let snap = agg.snapshot();
        assert!(snap.pix_fmt.is_none());
        assert!(snap.color_range.is_none());
    }

    #[test]
    fn baseline_record_fills_expected_defaults() {
        let sps_bytes = build_sps_rbsp(66, 30, 19, 14, true, None);
        let record = avcc_record(&sps_bytes);
        let cfg = parse_avc_decoder_configuration_record(&record).unwrap();
        let mut agg = MediaInfoAggregator::default();
        agg.apply_avcc(&cfg);
        let snap = agg.snapshot();
        assert_eq!(snap.video_codec, Some(VideoCodec::Avc));
        assert_eq!(snap.profile, Some(66));
        assert_eq!(snap.level, Some(30));
        assert_eq!(snap.chroma_format, Some(ChromaFormat::Yuv420));
        assert_eq!(snap.bit_depth, Some(8));
        assert_eq!(snap.pix_fmt, Some(PixelFormat::Yuv420p));
        assert_eq!(snap.color_range, Some(ColorRange::Limited));
    }
}
