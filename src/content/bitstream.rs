//! MSB-first bit reader for sampled functions, images and mesh shadings.

use byteorder::{BigEndian, ByteOrder};

/// Reads unsigned values of 1 to 32 bits from a byte slice.
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader at the first bit.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Bits left in the input.
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_pos)
    }

    /// True when no full value of `bits` bits remains.
    pub fn is_eof(&self, bits: u32) -> bool {
        self.bits_left() < bits as usize
    }

    /// Read `bits` bits; missing bits read as zero.
    pub fn read(&mut self, bits: u32) -> u32 {
        if bits == 0 || bits > 32 {
            return 0;
        }
        if bits == 8 && self.bit_pos % 8 == 0 {
            let byte = self.data.get(self.bit_pos / 8).copied().unwrap_or(0);
            self.bit_pos += 8;
            return byte as u32;
        }
        if self.bit_pos % 8 == 0 && (bits == 16 || bits == 32) {
            let start = self.bit_pos / 8;
            if let Some(bytes) = self.data.get(start..start + bits as usize / 8) {
                self.bit_pos += bits as usize;
                return if bits == 16 {
                    BigEndian::read_u16(bytes) as u32
                } else {
                    BigEndian::read_u32(bytes)
                };
            }
        }
        let mut value: u64 = 0;
        for _ in 0..bits {
            let byte = self.data.get(self.bit_pos / 8).copied().unwrap_or(0);
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            value = (value << 1) | bit as u64;
            self.bit_pos += 1;
        }
        value as u32
    }

    /// Skip to the next byte boundary.
    pub fn align(&mut self) {
        self.bit_pos = self.bit_pos.div_ceil(8) * 8;
    }

    /// Move to an absolute bit position.
    pub fn seek_bits(&mut self, bit_pos: usize) {
        self.bit_pos = bit_pos;
    }
}

/// Largest value representable with `bits` bits, as a float.
pub fn max_value(bits: u32) -> f32 {
    if bits >= 32 {
        u32::MAX as f32
    } else {
        ((1u64 << bits) - 1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_mixed_widths() {
        let data = [0b1011_0011, 0b1111_0000];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read(1), 1);
        assert_eq!(r.read(3), 0b011);
        assert_eq!(r.read(8), 0b0011_1111);
        assert_eq!(r.bits_left(), 4);
        assert!(r.is_eof(8));
    }

    #[test]
    fn test_align_and_byte_fast_path() {
        let data = [0xFF, 0x12];
        let mut r = BitReader::new(&data);
        r.read(2);
        r.align();
        assert_eq!(r.read(8), 0x12);
        assert_eq!(r.read(8), 0);
    }

    #[test]
    fn test_max_value() {
        assert_eq!(max_value(8), 255.0);
        assert_eq!(max_value(1), 1.0);
    }

    #[test]
    fn test_aligned_wide_reads() {
        let data = [0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0x80];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read(16), 0x1234);
        assert_eq!(r.read(32), 0xDEAD_BEEF);
        // Short input: zero-padded bit reads.
        assert_eq!(r.read(16), 0x8000);
    }
}
