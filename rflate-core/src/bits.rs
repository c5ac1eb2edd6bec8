//! Absolute-position bit cursor over byte buffers.
//!
//! DEFLATE packs data LSB-first: the first bit of the stream is the least
//! significant bit of the first byte (RFC 1951 Section 3.1.1). Every function
//! here takes the buffer and an absolute bit position; nothing owns a
//! position, so callers can save one, hand it to another call, or roll it
//! back after a failed decode attempt.
//!
//! Reads past the end of the buffer see zero bytes. The decoder relies on
//! this: it reads optimistically and checks the advanced position against
//! the available bit count before committing a symbol. Writes OR the shifted
//! value into place and therefore require the destination bytes to still be
//! zero, which holds because encode buffers are zero-filled on allocation.

#[inline]
fn byte_at(data: &[u8], index: usize) -> u32 {
    if index < data.len() {
        u32::from(data[index])
    } else {
        0
    }
}

/// Read up to 8 bits at `bit_pos`, masked by `mask`.
///
/// The mask selects how many bits the caller wants, e.g. `7` for a 3-bit
/// field. Uses a two-byte window, so `mask` must not exceed 9 significant
/// bits.
#[inline]
pub fn read_bits(data: &[u8], bit_pos: usize, mask: u32) -> u32 {
    let byte = bit_pos / 8;
    ((byte_at(data, byte) | (byte_at(data, byte + 1) << 8)) >> (bit_pos & 7)) & mask
}

/// Read a 16-bit window at `bit_pos` without masking.
///
/// Spans three bytes so a full 16 bits are valid at any bit offset. Callers
/// mask the result themselves; Huffman decode tables are indexed this way.
#[inline]
pub fn read_bits16(data: &[u8], bit_pos: usize) -> u32 {
    let byte = bit_pos / 8;
    (byte_at(data, byte) | (byte_at(data, byte + 1) << 8) | (byte_at(data, byte + 2) << 16))
        >> (bit_pos & 7)
}

/// Index of the first whole byte at or after `bit_pos`.
#[inline]
pub fn next_byte(bit_pos: usize) -> usize {
    (bit_pos + 7) / 8
}

/// OR `value` into the buffer at `bit_pos`, touching two bytes.
///
/// `value` shifted by the bit offset must fit in 16 bits.
#[inline]
pub fn write_bits(out: &mut [u8], bit_pos: usize, value: u32) {
    let shifted = value << (bit_pos & 7);
    let byte = bit_pos / 8;
    out[byte] |= shifted as u8;
    out[byte + 1] |= (shifted >> 8) as u8;
}

/// OR `value` into the buffer at `bit_pos`, touching three bytes.
///
/// `value` shifted by the bit offset must fit in 24 bits; used for Huffman
/// codes up to 15 bits and distance extra fields up to 13 bits.
#[inline]
pub fn write_bits16(out: &mut [u8], bit_pos: usize, value: u32) {
    let shifted = value << (bit_pos & 7);
    let byte = bit_pos / 8;
    out[byte] |= shifted as u8;
    out[byte + 1] |= (shifted >> 8) as u8;
    out[byte + 2] |= (shifted >> 16) as u8;
}

/// Read a little-endian u16 at a byte offset.
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> u32 {
    u32::from(data[offset]) | (u32::from(data[offset + 1]) << 8)
}

/// Read a little-endian u32 at a byte offset.
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from(data[offset])
        | (u32::from(data[offset + 1]) << 8)
        | (u32::from(data[offset + 2]) << 16)
        | (u32::from(data[offset + 3]) << 24)
}

/// Read a big-endian u32 at a byte offset.
#[inline]
pub fn read_u32_be(data: &[u8], offset: usize) -> u32 {
    (u32::from(data[offset]) << 24)
        | (u32::from(data[offset + 1]) << 16)
        | (u32::from(data[offset + 2]) << 8)
        | u32::from(data[offset + 3])
}

/// Write a little-endian u32 at a byte offset.
#[inline]
pub fn write_u32_le(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Write a big-endian u32 at a byte offset.
#[inline]
pub fn write_u32_be(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_lsb_first() {
        // 0b1011_0100, 0b0000_0110
        let data = [0xB4, 0x06];
        assert_eq!(read_bits(&data, 0, 1), 0);
        assert_eq!(read_bits(&data, 2, 1), 1);
        assert_eq!(read_bits(&data, 0, 0xFF), 0xB4);
        // Crossing the byte boundary: bits 4..=10
        assert_eq!(read_bits(&data, 4, 0x7F), 0x6B);
    }

    #[test]
    fn test_read_past_end_is_zero() {
        let data = [0xFF];
        assert_eq!(read_bits(&data, 8, 0xFF), 0);
        assert_eq!(read_bits(&data, 4, 0xFF), 0x0F);
        assert_eq!(read_bits16(&data, 12), 0);
        assert_eq!(read_bits(&[], 0, 0xFF), 0);
    }

    #[test]
    fn test_read_bits16_three_bytes() {
        let data = [0x00, 0xFF, 0x0F];
        // Bits 4..=19 -> low nibble of 0xFF00F shifted down by 4
        assert_eq!(read_bits16(&data, 4) & 0xFFFF, 0xFFF0);
    }

    #[test]
    fn test_write_then_read() {
        let mut out = [0u8; 4];
        write_bits(&mut out, 0, 0b101);
        write_bits(&mut out, 3, 0b11);
        write_bits16(&mut out, 5, 0x5AB);
        assert_eq!(read_bits(&out, 0, 0b111), 0b101);
        assert_eq!(read_bits(&out, 3, 0b11), 0b11);
        assert_eq!(read_bits16(&out, 5) & 0x7FF, 0x5AB);
    }

    #[test]
    fn test_next_byte() {
        assert_eq!(next_byte(0), 0);
        assert_eq!(next_byte(1), 1);
        assert_eq!(next_byte(8), 1);
        assert_eq!(next_byte(9), 2);
        assert_eq!(next_byte(16), 2);
    }

    #[test]
    fn test_byte_helpers() {
        let mut buf = [0u8; 8];
        write_u32_le(&mut buf, 0, 0x12345678);
        write_u32_be(&mut buf, 4, 0x12345678);
        assert_eq!(read_u32_le(&buf, 0), 0x12345678);
        assert_eq!(read_u32_be(&buf, 4), 0x12345678);
        assert_eq!(read_u16_le(&buf, 0), 0x5678);
    }
}
