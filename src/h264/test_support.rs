//! Bitstream builders shared by the h264/avcc/flv test suites. Not part of
//! the public API; only compiled under `cfg(test)`.
#![cfg(test)]

pub struct BitWriter {
    bytes: Vec<u8>,
    cur: u8,
    nbits: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            cur: 0,
            nbits: 0,
        }
    }

    pub fn write_bit(&mut self, bit: u32) {
        self.cur = (self.cur << 1) | (bit as u8 & 1);
        self.nbits += 1;
        if self.nbits == 8 {
            self.bytes.push(self.cur);
            self.cur = 0;
            self.nbits = 0;
        }
    }

    pub fn write_u(&mut self, value: u32, n: u32) {
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1);
        }
    }

    pub fn write_ue(&mut self, value: u32) {
        let v = value + 1;
        let nbits = 32 - v.leading_zeros();
        for _ in 0..nbits - 1 {
            self.write_bit(0);
        }
        self.write_u(v, nbits);
    }

    pub fn write_se(&mut self, value: i32) {
        let code = if value <= 0 {
            (-value as u32) * 2
        } else {
            (value as u32) * 2 - 1
        };
        self.write_ue(code);
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.cur <<= 8 - self.nbits;
            self.bytes.push(self.cur);
        }
        self.bytes
    }
}

/// Build a non-high-profile SPS RBSP (NAL header included).
pub fn build_sps_rbsp(
    profile_idc: u8,
    level_idc: u8,
    pic_width_in_mbs_minus1: u32,
    pic_height_in_map_units_minus1: u32,
    frame_mbs_only: bool,
    crop: Option<(u32, u32, u32, u32)>,
) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_u(profile_idc as u32, 8);
    w.write_u(0, 8);
    w.write_u(level_idc as u32, 8);
    w.write_ue(0); // seq_parameter_set_id
    w.write_ue(0); // log2_max_frame_num_minus4
    w.write_ue(0); // pic_order_cnt_type
    w.write_ue(0); // log2_max_pic_order_cnt_lsb_minus4
    w.write_ue(1); // max_num_ref_frames
    w.write_bit(0); // gaps_in_frame_num_value_allowed_flag
    w.write_ue(pic_width_in_mbs_minus1);
    w.write_ue(pic_height_in_map_units_minus1);
    w.write_bit(u32::from(frame_mbs_only));
    if !frame_mbs_only {
        w.write_bit(0); // mb_adaptive_frame_field_flag
    }
    w.write_bit(1); // direct_8x8_inference_flag
    match crop {
        Some((l, r, t, b)) => {
            w.write_bit(1);
            w.write_ue(l);
            w.write_ue(r);
            w.write_ue(t);
            w.write_ue(b);
        }
        None => w.write_bit(0),
    }
    w.write_bit(0); // vui_parameters_present_flag
    let mut out = vec![0x67u8];
    out.extend(w.finish());
    out
}

pub struct VuiParams {
    pub color_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub full_range: bool,
    pub timing: Option<(u32, u32)>, // (num_units_in_tick, time_scale)
}

/// Build a high-profile SPS RBSP with explicit chroma/bit-depth and an
/// optional VUI block (colour description + timing only).
#[allow(clippy::too_many_arguments)]
pub fn build_high_profile_sps_rbsp(
    profile_idc: u8,
    level_idc: u8,
    chroma_format_idc: u32,
    bit_depth_luma_minus8: u32,
    bit_depth_chroma_minus8: u32,
    pic_width_in_mbs_minus1: u32,
    pic_height_in_map_units_minus1: u32,
    vui: Option<VuiParams>,
) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_u(profile_idc as u32, 8);
    w.write_u(0, 8);
    w.write_u(level_idc as u32, 8);
    w.write_ue(0); // seq_parameter_set_id

    w.write_ue(chroma_format_idc);
    if chroma_format_idc == 3 {
        w.write_bit(0); // separate_colour_plane_flag
    }
    w.write_ue(bit_depth_luma_minus8);
    w.write_ue(bit_depth_chroma_minus8);
    w.write_bit(0); // qpprime_y_zero_transform_bypass_flag
    w.write_bit(0); // seq_scaling_matrix_present_flag

    w.write_ue(0); // log2_max_frame_num_minus4
    w.write_ue(0); // pic_order_cnt_type
    w.write_ue(0); // log2_max_pic_order_cnt_lsb_minus4
    w.write_ue(1); // max_num_ref_frames
    w.write_bit(0); // gaps_in_frame_num_value_allowed_flag
    w.write_ue(pic_width_in_mbs_minus1);
    w.write_ue(pic_height_in_map_units_minus1);
    w.write_bit(1); // frame_mbs_only_flag
    w.write_bit(1); // direct_8x8_inference_flag
    w.write_bit(0); // frame_cropping_flag

    let vui_present = vui.is_some();
    w.write_bit(u32::from(vui_present));
    if let Some(v) = vui {
        w.write_bit(0); // aspect_ratio_info_present_flag
        w.write_bit(0); // overscan_info_present_flag
        w.write_bit(1); // video_signal_type_present_flag
        w.write_u(5, 3); // video_format
        w.write_bit(u32::from(v.full_range));
        w.write_bit(1); // colour_description_present_flag
        w.write_u(v.color_primaries as u32, 8);
        w.write_u(v.transfer_characteristics as u32, 8);
        w.write_u(v.matrix_coefficients as u32, 8);
        w.write_bit(0); // chroma_loc_info_present_flag
        let timing_present = v.timing.is_some();
        w.write_bit(u32::from(timing_present));
        if let Some((num_units, scale)) = v.timing {
            w.write_u(num_units, 32);
            w.write_u(scale, 32);
            w.write_bit(1); // fixed_frame_rate_flag
        }
        w.write_bit(0); // nal_hrd_parameters_present_flag
        w.write_bit(0); // vcl_hrd_parameters_present_flag
        w.write_bit(0); // pic_struct_present_flag
        w.write_bit(0); // bitstream_restriction_flag
    }

    let mut out = vec![0x67u8];
    out.extend(w.finish());
    out
}
