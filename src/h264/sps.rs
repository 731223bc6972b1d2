//! H.264 Sequence Parameter Set (SPS) and VUI parsing.
//!
//! Follows ITU-T H.264 §7.3.2.1.1 / Annex E exactly as walked in
//! SPEC_FULL.md §4.3-4.4. A read past the end of the RBSP is not fatal:
//! [`parse_sps`] returns whatever fields were decoded before the failure,
//! with everything after left at its default.

use crate::bitreader::BitReader;

/// Profiles that carry the "high profile" extension fields (chroma format,
/// bit depth, scaling matrices) ahead of `log2_max_frame_num_minus4`.
const HIGH_PROFILE_FAMILY: &[u8] = &[44, 83, 86, 100, 110, 118, 122, 128, 244];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaFormat {
    Yuv420,
    Yuv422,
    Yuv444,
}

impl ChromaFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ChromaFormat::Yuv420 => "4:2:0",
            ChromaFormat::Yuv422 => "4:2:2",
            ChromaFormat::Yuv444 => "4:4:4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv420p,
    Yuv420p10le,
    Yuv422p,
    Yuv422p10le,
    Yuv444p,
    Yuv444p10le,
}

impl PixelFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuv420p10le => "yuv420p10le",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuv422p10le => "yuv422p10le",
            PixelFormat::Yuv444p => "yuv444p",
            PixelFormat::Yuv444p10le => "yuv444p10le",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VuiInfo {
    pub video_format: u8,
    pub full_range: bool,
    pub color_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub fps: Option<u32>, // stored as fixed-point millihertz to stay Eq; see fps()
}

impl Default for VuiInfo {
    fn default() -> Self {
        Self {
            video_format: 5, // "unspecified" per Table E-2
            full_range: false,
            color_primaries: 2,
            transfer_characteristics: 2,
            matrix_coefficients: 2,
            fps: None,
        }
    }
}

impl VuiInfo {
    pub fn fps(&self) -> Option<f64> {
        self.fps.map(|m| m as f64 / 1000.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpsInfo {
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub chroma_format_idc: u8,
    pub separate_colour_plane_flag: bool,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub width: u32,
    pub height: u32,
    pub vui: Option<VuiInfo>,
}

impl SpsInfo {
    pub fn luma_bit_depth(&self) -> u8 {
        8 + self.bit_depth_luma_minus8
    }

    /// §4.3: chroma_format_idc == 0 (monochrome) is still reported as 4:2:0.
    pub fn chroma_format(&self) -> ChromaFormat {
        match self.chroma_format_idc {
            0 | 1 => ChromaFormat::Yuv420,
            2 => ChromaFormat::Yuv422,
            _ => ChromaFormat::Yuv444,
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        let high_bit_depth = self.luma_bit_depth() > 8;
        match (self.chroma_format(), high_bit_depth) {
            (ChromaFormat::Yuv420, false) => PixelFormat::Yuv420p,
            (ChromaFormat::Yuv420, true) => PixelFormat::Yuv420p10le,
            (ChromaFormat::Yuv422, false) => PixelFormat::Yuv422p,
            (ChromaFormat::Yuv422, true) => PixelFormat::Yuv422p10le,
            (ChromaFormat::Yuv444, false) => PixelFormat::Yuv444p,
            (ChromaFormat::Yuv444, true) => PixelFormat::Yuv444p10le,
        }
    }
}

pub fn color_primaries_name(code: u8) -> &'static str {
    match code {
        1 => "bt709",
        2 => "unspecified",
        4 => "bt470m",
        5 => "bt470bg",
        6 => "smpte170m",
        7 => "smpte240m",
        8 => "film",
        9 => "bt2020",
        10 => "smpte428",
        11 => "smpte431",
        12 => "smpte432",
        22 => "jedec-p22",
        _ => "unknown",
    }
}

pub fn transfer_characteristics_name(code: u8) -> &'static str {
    match code {
        1 => "bt709",
        2 => "unspecified",
        4 => "gamma22",
        5 => "gamma28",
        6 => "smpte170m",
        7 => "smpte240m",
        8 => "linear",
        9 => "log100",
        10 => "log316",
        11 => "iec61966-2-4",
        12 => "bt1361e",
        13 => "srgb",
        14 => "bt2020-10",
        15 => "bt2020-12",
        16 => "smpte2084",
        17 => "smpte428",
        18 => "hlg",
        _ => "unknown",
    }
}

pub fn matrix_coefficients_name(code: u8) -> &'static str {
    match code {
        0 => "gbrap",
        1 => "bt709",
        2 => "unspecified",
        4 => "fcc",
        5 => "bt470bg",
        6 => "smpte170m",
        7 => "smpte240m",
        8 => "ycgco",
        9 => "bt2020nc",
        10 => "bt2020c",
        12 => "smpte2085",
        13 => "chroma-derived-nc",
        14 => "chroma-derived-c",
        15 => "ictcp",
        _ => "unknown",
    }
}

/// Parse an RBSP (already run through [`crate::h264::rbsp::ebsp_to_rbsp`])
/// into a best-effort [`SpsInfo`]. Never fails: a truncated bitstream yields
/// whatever prefix was successfully decoded.
pub fn parse_sps(rbsp: &[u8]) -> SpsInfo {
    let mut sps = SpsInfo::default();
    if rbsp.is_empty() {
        return sps;
    }
    let mut r = BitReader::new(&rbsp[1..]); // skip the 1-byte NAL header
    let _ = parse_sps_body(&mut r, &mut sps);
    sps
}

fn parse_sps_body(
    r: &mut BitReader,
    sps: &mut SpsInfo,
) -> Result<(), crate::bitreader::EndOfData> {
    sps.profile_idc = r.read_u(8)? as u8;
    sps.constraint_flags = r.read_u(8)? as u8;
    sps.level_idc = r.read_u(8)? as u8;
    let _seq_parameter_set_id = r.read_ue()?;

    sps.chroma_format_idc = 1; // implicit default when not coded below
    if HIGH_PROFILE_FAMILY.contains(&sps.profile_idc) {
        sps.chroma_format_idc = r.read_ue()? as u8;
        if sps.chroma_format_idc == 3 {
            sps.separate_colour_plane_flag = r.read_u(1)? != 0;
        }
        sps.bit_depth_luma_minus8 = r.read_ue()? as u8;
        sps.bit_depth_chroma_minus8 = r.read_ue()? as u8;
        let _qpprime_y_zero_transform_bypass_flag = r.read_u(1)?;
        let seq_scaling_matrix_present_flag = r.read_u(1)? != 0;
        if seq_scaling_matrix_present_flag {
            let count = if sps.chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..count {
                let scaling_list_present = r.read_u(1)? != 0;
                if scaling_list_present {
                    let size = if i < 6 { 16 } else { 64 };
                    skip_scaling_list(r, size)?;
                }
            }
        }
    }

    let _log2_max_frame_num_minus4 = r.read_ue()?;
    let pic_order_cnt_type = r.read_ue()?;
    match pic_order_cnt_type {
        0 => {
            let _log2_max_pic_order_cnt_lsb_minus4 = r.read_ue()?;
        }
        1 => {
            let _delta_pic_order_always_zero_flag = r.read_u(1)?;
            let _offset_for_non_ref_pic = r.read_se()?;
            let _offset_for_top_to_bottom_field = r.read_se()?;
            let num_ref_frames_in_pic_order_cnt_cycle = r.read_ue()?;
            for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
                let _offset_for_ref_frame = r.read_se()?;
            }
        }
        _ => {}
    }

    let _max_num_ref_frames = r.read_ue()?;
    let _gaps_in_frame_num_value_allowed_flag = r.read_u(1)?;

    let pic_width_in_mbs_minus1 = r.read_ue()?;
    let pic_height_in_map_units_minus1 = r.read_ue()?;
    let frame_mbs_only_flag = r.read_u(1)?;
    if frame_mbs_only_flag == 0 {
        let _mb_adaptive_frame_field_flag = r.read_u(1)?;
    }
    let _direct_8x8_inference_flag = r.read_u(1)?;

    let width = (pic_width_in_mbs_minus1 + 1) * 16;
    let height = (2 - frame_mbs_only_flag) * (pic_height_in_map_units_minus1 + 1) * 16;
    sps.width = width;
    sps.height = height;

    let frame_cropping_flag = r.read_u(1)? != 0;
    if frame_cropping_flag {
        let crop_left = r.read_ue()?;
        let crop_right = r.read_ue()?;
        let crop_top = r.read_ue()?;
        let crop_bottom = r.read_ue()?;
        sps.width = width.saturating_sub((crop_left + crop_right) * 2);
        sps.height = height.saturating_sub((crop_top + crop_bottom) * 2);
    }

    let vui_parameters_present_flag = r.read_u(1)? != 0;
    if vui_parameters_present_flag {
        let mut vui = VuiInfo::default();
        parse_vui(r, &mut vui)?;
        sps.vui = Some(vui);
    }

    Ok(())
}

fn skip_scaling_list(
    r: &mut BitReader,
    size: usize,
) -> Result<(), crate::bitreader::EndOfData> {
    // i64: delta_scale is attacker-controlled (read_se on corrupt input can
    // approach i32::MIN/MAX), and last_scale + delta_scale + 256 would
    // overflow i32 before the modulo brought it back into range.
    let mut last_scale: i64 = 8;
    let mut next_scale: i64 = 8;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = r.read_se()? as i64;
            next_scale = (last_scale + delta_scale + 256).rem_euclid(256);
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }
    Ok(())
}

fn parse_vui(r: &mut BitReader, vui: &mut VuiInfo) -> Result<(), crate::bitreader::EndOfData> {
    let aspect_ratio_info_present_flag = r.read_u(1)? != 0;
    if aspect_ratio_info_present_flag {
        let aspect_ratio_idc = r.read_u(8)?;
        if aspect_ratio_idc == 255 {
            // Extended_SAR
            let _sar_width = r.read_u(16)?;
            let _sar_height = r.read_u(16)?;
        }
    }

    let overscan_info_present_flag = r.read_u(1)? != 0;
    if overscan_info_present_flag {
        let _overscan_appropriate_flag = r.read_u(1)?;
    }

    let video_signal_type_present_flag = r.read_u(1)? != 0;
    if video_signal_type_present_flag {
        vui.video_format = r.read_u(3)? as u8;
        vui.full_range = r.read_u(1)? != 0;
        let colour_description_present_flag = r.read_u(1)? != 0;
        if colour_description_present_flag {
            vui.color_primaries = r.read_u(8)? as u8;
            vui.transfer_characteristics = r.read_u(8)? as u8;
            vui.matrix_coefficients = r.read_u(8)? as u8;
        }
    }

    let chroma_loc_info_present_flag = r.read_u(1)? != 0;
    if chroma_loc_info_present_flag {
        let _chroma_sample_loc_type_top_field = r.read_ue()?;
        let _chroma_sample_loc_type_bottom_field = r.read_ue()?;
    }

    let timing_info_present_flag = r.read_u(1)? != 0;
    if timing_info_present_flag {
        let num_units_in_tick = r.read_u(32)?;
        let time_scale = r.read_u(32)?;
        let _fixed_frame_rate_flag = r.read_u(1)?;
        if num_units_in_tick > 0 && time_scale > 0 {
            let fps = time_scale as f64 / (2.0 * num_units_in_tick as f64);
            vui.fps = Some((fps * 1000.0).round() as u32);
        }
    }

    let nal_hrd_parameters_present_flag = r.read_u(1)? != 0;
    if nal_hrd_parameters_present_flag {
        skip_hrd_parameters(r)?;
    }
    let vcl_hrd_parameters_present_flag = r.read_u(1)? != 0;
    if vcl_hrd_parameters_present_flag {
        skip_hrd_parameters(r)?;
    }
    if nal_hrd_parameters_present_flag || vcl_hrd_parameters_present_flag {
        let _low_delay_hrd_flag = r.read_u(1)?;
    }

    let _pic_struct_present_flag = r.read_u(1)?;

    let bitstream_restriction_flag = r.read_u(1)? != 0;
    if bitstream_restriction_flag {
        let _motion_vectors_over_pic_boundaries_flag = r.read_u(1)?;
        let _max_bytes_per_pic_denom = r.read_ue()?;
        let _max_bits_per_mb_denom = r.read_ue()?;
        let _log2_max_mv_length_horizontal = r.read_ue()?;
        let _log2_max_mv_length_vertical = r.read_ue()?;
        let _max_num_reorder_frames = r.read_ue()?;
        let _max_dec_frame_buffering = r.read_ue()?;
    }

    Ok(())
}

fn skip_hrd_parameters(r: &mut BitReader) -> Result<(), crate::bitreader::EndOfData> {
    let cpb_cnt_minus1 = r.read_ue()?;
    let _bit_rate_scale = r.read_u(4)?;
    let _cpb_size_scale = r.read_u(4)?;
    for _ in 0..=cpb_cnt_minus1 {
        let _bit_rate_value_minus1 = r.read_ue()?;
        let _cpb_size_value_minus1 = r.read_ue()?;
        let _cbr_flag = r.read_u(1)?;
    }
    let _initial_cpb_removal_delay_length_minus1 = r.read_u(5)?;
    let _cpb_removal_delay_length_minus1 = r.read_u(5)?;
    let _dpb_output_delay_length_minus1 = r.read_u(5)?;
    let _time_offset_length = r.read_u(5)?;
    Ok(())
}
