//! `AVCDecoderConfigurationRecord` parsing (ISO/IEC 14496-15 §5.2.4.1),
//! carried in an FLV video tag with `AVCPacketType = 0`.

use bytes::Bytes;

use crate::h264::rbsp::ebsp_to_rbsp;
use crate::h264::sps::{parse_sps, SpsInfo};

#[derive(Debug, Clone)]
pub struct AvcDecoderConfig {
    pub profile: u8,
    pub level: u8,
    pub sps: Bytes,
    pub pps: Bytes,
    pub sps_info: SpsInfo,
}

/// Parse the record layout from SPEC_FULL.md §4.5. Returns `None` (with a
/// `tracing::warn!`) on a record too short to contain its own header --
/// this is a §7 `Warning` condition, not a `FormatError`.
pub fn parse_avc_decoder_configuration_record(data: &[u8]) -> Option<AvcDecoderConfig> {
    if data.len() < 6 {
        tracing::warn!(len = data.len(), "AVCDecoderConfigurationRecord too short");
        return None;
    }
    let _configuration_version = data[0];
    let profile = data[1];
    let _profile_compatibility = data[2];
    let level = data[3];
    let _length_size_minus_one = data[4] & 0x03;
    let num_sps = (data[5] & 0x1F) as usize;

    let mut offset = 6;
    let mut first_sps: Option<Bytes> = None;
    for _ in 0..num_sps {
        let Some((nalu, next)) = read_length_prefixed(data, offset) else {
            tracing::warn!("AVCDecoderConfigurationRecord SPS list truncated");
            break;
        };
        if first_sps.is_none() {
            first_sps = Some(Bytes::copy_from_slice(nalu));
        }
        offset = next;
    }

    let mut first_pps: Option<Bytes> = None;
    if offset < data.len() {
        let num_pps = data[offset] as usize;
        offset += 1;
        for _ in 0..num_pps {
            let Some((nalu, next)) = read_length_prefixed(data, offset) else {
                tracing::warn!("AVCDecoderConfigurationRecord PPS list truncated");
                break;
            };
            if first_pps.is_none() {
                first_pps = Some(Bytes::copy_from_slice(nalu));
            }
            offset = next;
        }
    }

    let sps = first_sps.unwrap_or_default();
    let sps_info = if sps.is_empty() {
        SpsInfo::default()
    } else {
        parse_sps(&ebsp_to_rbsp(&sps))
    };

    Some(AvcDecoderConfig {
        profile,
        level,
        sps,
        pps: first_pps.unwrap_or_default(),
        sps_info,
    })
}

fn read_length_prefixed(data: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    if offset + 2 > data.len() {
        return None;
    }
    let len = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
    let start = offset + 2;
    if start + len > data.len() {
        return None;
    }
    Some((&data[start..start + len], start + len))
}
