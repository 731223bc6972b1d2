//! Positional bit cursor over an immutable byte slice.
//!
//! Used by the H.264 SPS/VUI parser to walk exp-Golomb coded fields. Reads
//! past the end of the slice fail with [`EndOfData`] rather than panicking,
//! so callers (the SPS parser) can recover a best-effort partial result.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfData;

pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8, // 0..=7, bits already consumed in the current byte
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Read `n` bits (0..=32), MSB-first, across byte boundaries.
    pub fn read_u(&mut self, n: u32) -> Result<u32, EndOfData> {
        debug_assert!(n <= 32);
        let mut value: u32 = 0;
        for _ in 0..n {
            let bit = self.read_bit()?;
            value = (value << 1) | bit as u32;
        }
        Ok(value)
    }

    fn read_bit(&mut self) -> Result<u8, EndOfData> {
        if self.byte_pos >= self.data.len() {
            return Err(EndOfData);
        }
        let byte = self.data[self.byte_pos];
        let bit = (byte >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(bit)
    }

    /// Unsigned exp-Golomb: count leading zero bits `k`, consume the
    /// terminating `1`, then `k` suffix bits; value = 2^k - 1 + suffix.
    ///
    /// Computed in `u64` throughout: `k` up to 32 legitimately occurs on
    /// corrupt input, and `2^32 - 1 + suffix` does not fit `u32` -- doing
    /// the arithmetic in `u32` would shift-overflow (`1u32 << 32`) or
    /// wrap. A result that doesn't fit `u32` is reported as `EndOfData`
    /// rather than silently truncated.
    pub fn read_ue(&mut self) -> Result<u32, EndOfData> {
        let mut leading_zeros: u32 = 0;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 32 {
                return Err(EndOfData);
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = self.read_u(leading_zeros)? as u64;
        let value = (1u64 << leading_zeros) - 1 + suffix;
        value.try_into().map_err(|_| EndOfData)
    }

    /// Signed exp-Golomb: v = read_ue(); -v/2 if v even, (v+1)/2 if odd.
    /// The intermediate stays `i64` so `v == u32::MAX` can't overflow the
    /// `v + 1` step before the final narrowing to `i32`.
    pub fn read_se(&mut self) -> Result<i32, EndOfData> {
        let v = self.read_ue()? as i64;
        let se = if v % 2 == 0 { -(v / 2) } else { (v + 1) / 2 };
        se.try_into().map_err(|_| EndOfData)
    }

    pub fn skip_bits(&mut self, n: u32) -> Result<(), EndOfData> {
        for _ in 0..n {
            self.read_bit()?;
        }
        Ok(())
    }

    pub fn align_to_byte(&mut self) {
        if self.bit_pos != 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }
}
