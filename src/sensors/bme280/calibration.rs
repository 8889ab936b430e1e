/// Factory calibration coefficients of the BME280
use crate::utils::{i16_le, i8_at, u16_le};

pub const BLOCK_1_LEN: usize = 24;
pub const BLOCK_2_LEN: usize = 1;
pub const BLOCK_3_LEN: usize = 7;

/// Compensation coefficients read from the three calibration blocks
/// (`0x88..0xA0`, `0xA1`, `0xE1..0xE7`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i32,
    pub h5: i32,
    pub h6: i8,
}

impl Calibration {
    /// Decode the three raw blocks. Callers guarantee the block lengths.
    pub fn extract(block1: &[u8], block2: &[u8], block3: &[u8]) -> Self {
        Calibration {
            t1: u16_le(block1, 0),
            t2: i16_le(block1, 2),
            t3: i16_le(block1, 4),
            p1: u16_le(block1, 6),
            p2: i16_le(block1, 8),
            p3: i16_le(block1, 10),
            p4: i16_le(block1, 12),
            p5: i16_le(block1, 14),
            p6: i16_le(block1, 16),
            p7: i16_le(block1, 18),
            p8: i16_le(block1, 20),
            p9: i16_le(block1, 22),
            h1: block2[0],
            h2: i16_le(block3, 0),
            h3: block3[2],
            h4: h4_from(block3[3], block3[4]),
            h5: h5_from(block3[4], block3[5]),
            h6: i8_at(block3, 6),
        }
    }
}

/// 12-bit signed H4: `msb` is sign extended into bits 4..12 and `lsb` is
/// OR-ed in unmodified.
///
/// `lsb` is zero extended: neither masked to its low nibble nor sign extended,
/// so a byte of 0x80 or more never turns H4 negative.
pub fn h4_from(msb: u8, lsb: u8) -> i32 {
    (((msb as i8 as i32) << 24) >> 20) | lsb as i32
}

/// 12-bit signed H5: `msb` is sign extended into bits 4..12, the high nibble
/// of `lsb` fills bits 0..4.
pub fn h5_from(lsb: u8, msb: u8) -> i32 {
    (((msb as i8 as i32) << 24) >> 20) | ((lsb as i32 >> 4) & 0x0F)
}
