//! DEFLATE decompression (RFC 1951).
//!
//! The decoder walks blocks: stored blocks are byte copies, fixed and
//! dynamic blocks run a symbol loop over flat Huffman decode tables. All
//! reads go through the absolute-position bit cursor, which zero-fills past
//! the end of the input; the decoder reads optimistically and compares the
//! advanced position against the available bit count before committing.
//!
//! Decompression is resumable: an [`InflateState`] records the last
//! whole-symbol bit position, the produced byte count, and (when a block was
//! interrupted) the live decode tables. In [`Validation::Lenient`] mode
//! running out of input is a clean pause at the last committed symbol; in
//! [`Validation::Strict`] mode it is an `UnexpectedEof` error.

use crate::huffman::{DecodeTable, max_code_length, validate_lengths};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_BASE, DISTANCE_EXTRA_BITS, LENGTH_BASE, LENGTH_EXTRA_BITS,
    fixed_distance_decode, fixed_litlen_decode,
};
use rflate_core::bits::{next_byte, read_bits, read_bits16, read_u16_le};
use rflate_core::{FlateError, Result};

/// Output headroom reserved ahead of the write position; covers the longest
/// match plus a stretch of literals between capacity checks.
const OUTPUT_HEADROOM: usize = 131072;

/// How running out of input mid-stream is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Validation {
    /// EOF pauses the decoder at the last whole symbol; more input may
    /// follow.
    Lenient,
    /// EOF is an error; the input must hold a complete stream.
    Strict,
}

/// Resumable decompressor state.
///
/// `bit_pos` always points at a whole-symbol boundary. The decode tables
/// are `Some` only while a fixed or dynamic block is interrupted; a `None`
/// literal table together with `is_final_block` marks a finished stream.
#[derive(Debug, Clone)]
pub(crate) struct InflateState {
    pub(crate) lit_table: Option<DecodeTable>,
    pub(crate) dist_table: Option<DecodeTable>,
    pub(crate) bit_pos: usize,
    pub(crate) output_offset: usize,
    pub(crate) is_final_block: bool,
    pub(crate) validation: Validation,
}

impl InflateState {
    pub(crate) fn new(validation: Validation) -> Self {
        Self {
            lit_table: None,
            dist_table: None,
            bit_pos: 0,
            output_offset: 0,
            is_final_block: false,
            validation,
        }
    }

    /// A finished stream: the final block's EOB was consumed.
    pub(crate) fn is_finished(&self) -> bool {
        self.is_final_block && self.lit_table.is_none()
    }
}

/// Decompress a complete raw DEFLATE stream.
///
/// Bytes after the final block's end-of-block code are ignored.
///
/// # Examples
///
/// ```
/// let data = rflate::inflate(&[0x01, 0x05, 0x00, 0xFA, 0xFF, b'h', b'e', b'l', b'l', b'o'])?;
/// assert_eq!(data, b"hello");
/// # Ok::<(), rflate_core::FlateError>(())
/// ```
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut state = InflateState::new(Validation::Strict);
    inflate_core(data, &mut state, None)
}

/// Decompress a raw DEFLATE stream whose back-references may reach into a
/// preset dictionary.
pub fn inflate_with_dictionary(data: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
    let mut state = InflateState::new(Validation::Strict);
    inflate_core(data, &mut state, Some(dictionary))
}

fn ensure_capacity(buffer: &mut Vec<u8>, required: usize) {
    if required > buffer.len() {
        let new_len = required.max(buffer.len() * 2);
        buffer.resize(new_len, 0);
    }
}

/// Decode as much of `input` as `state` and the validation mode allow.
///
/// Returns the bytes produced by this call (the caller zeroes
/// `state.output_offset` between streaming calls). Back-references beyond
/// the produced output resolve into the tail of `dictionary`.
pub(crate) fn inflate_core(
    input: &[u8],
    state: &mut InflateState,
    dictionary: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let source_length = input.len();
    let dictionary = dictionary.unwrap_or(&[]);

    if source_length == 0 || state.is_finished() {
        return Ok(Vec::new());
    }

    let strict = state.validation == Validation::Strict;
    let total_bits = source_length * 8;

    let mut buffer = vec![0u8; source_length * 3];
    let mut is_final = state.is_final_block;
    let mut pos = state.bit_pos;
    let mut written = state.output_offset;
    let mut lit_table = state.lit_table.take();
    let mut dist_table = state.dist_table.take();

    'blocks: loop {
        if lit_table.is_none() {
            if pos + 3 > total_bits {
                if strict {
                    return Err(FlateError::UnexpectedEof);
                }
                break 'blocks;
            }

            is_final = read_bits(input, pos, 1) != 0;
            let block_type = read_bits(input, pos + 1, 3);
            pos += 3;

            match block_type {
                0 => {
                    let block_start = next_byte(pos);
                    if block_start + 4 > source_length {
                        if strict {
                            return Err(FlateError::UnexpectedEof);
                        }
                        break 'blocks;
                    }

                    let length = read_u16_le(input, block_start) as usize;
                    let nlen = read_u16_le(input, block_start + 2) as usize;
                    if length ^ 0xFFFF != nlen {
                        return Err(FlateError::invalid_block_type(pos));
                    }

                    let data_start = block_start + 4;
                    let block_end = data_start + length;
                    if block_end > source_length {
                        if strict {
                            return Err(FlateError::UnexpectedEof);
                        }
                        break 'blocks;
                    }

                    ensure_capacity(&mut buffer, written + length);
                    buffer[written..written + length]
                        .copy_from_slice(&input[data_start..block_end]);
                    written += length;
                    pos = block_end * 8;

                    state.output_offset = written;
                    state.bit_pos = pos;
                    state.is_final_block = is_final;
                    if is_final {
                        break 'blocks;
                    }
                    continue 'blocks;
                }

                1 => {
                    lit_table = Some(fixed_litlen_decode().clone());
                    dist_table = Some(fixed_distance_decode().clone());
                }

                2 => {
                    if pos + 14 > total_bits {
                        if strict {
                            return Err(FlateError::UnexpectedEof);
                        }
                        break 'blocks;
                    }

                    let hlit = read_bits(input, pos, 31) as usize + 257;
                    let hdist = read_bits(input, pos + 5, 31) as usize + 1;
                    let hclen = read_bits(input, pos + 10, 15) as usize + 4;
                    // Distance codes 30-31 may appear in the tree but never
                    // in valid data.
                    if hlit > 286 || hdist > 32 {
                        return Err(FlateError::invalid_block_type(pos));
                    }
                    let total_codes = hlit + hdist;
                    pos += 14;

                    if pos + hclen * 3 > total_bits {
                        if strict {
                            return Err(FlateError::UnexpectedEof);
                        }
                        break 'blocks;
                    }

                    let mut clc_lengths = [0u8; 19];
                    for i in 0..hclen {
                        clc_lengths[CODE_LENGTH_ORDER[i]] =
                            read_bits(input, pos + i * 3, 7) as u8;
                    }
                    pos += hclen * 3;

                    let clc_max = max_code_length(&clc_lengths);
                    if !validate_lengths(&clc_lengths, clc_max) {
                        return Err(FlateError::InvalidHuffmanTree);
                    }
                    let clc_table = DecodeTable::from_lengths(&clc_lengths, clc_max);

                    let mut all_lengths = vec![0u8; total_codes];
                    let mut code_index = 0usize;

                    while code_index < total_codes {
                        let entry =
                            clc_table.entries[(read_bits(input, pos, clc_table.mask())) as usize];
                        let symbol = entry >> 4;
                        let extra_bits: usize = match symbol {
                            16 => 2,
                            17 => 3,
                            18 => 7,
                            _ => 0,
                        };
                        // Validity checks below must only see bits that
                        // exist; a partial op is end of input, not an error.
                        if pos + usize::from(entry & 15) + extra_bits > total_bits {
                            pos = total_bits + 1;
                            break;
                        }
                        pos += usize::from(entry & 15);

                        match symbol {
                            0..=15 => {
                                all_lengths[code_index] = symbol as u8;
                                code_index += 1;
                            }
                            16 => {
                                if code_index == 0 {
                                    return Err(FlateError::invalid_block_type(pos));
                                }
                                let repeat = 3 + read_bits(input, pos, 3) as usize;
                                pos += 2;
                                if repeat > total_codes - code_index {
                                    return Err(FlateError::invalid_block_type(pos));
                                }
                                let value = all_lengths[code_index - 1];
                                for _ in 0..repeat {
                                    all_lengths[code_index] = value;
                                    code_index += 1;
                                }
                            }
                            17 => {
                                let repeat = 3 + read_bits(input, pos, 7) as usize;
                                pos += 3;
                                if repeat > total_codes - code_index {
                                    return Err(FlateError::invalid_block_type(pos));
                                }
                                code_index += repeat;
                            }
                            18 => {
                                let repeat = 11 + read_bits(input, pos, 127) as usize;
                                pos += 7;
                                if repeat > total_codes - code_index {
                                    return Err(FlateError::invalid_block_type(pos));
                                }
                                code_index += repeat;
                            }
                            _ => unreachable!(),
                        }
                    }

                    if pos > total_bits || code_index < total_codes {
                        if strict {
                            return Err(FlateError::UnexpectedEof);
                        }
                        break 'blocks;
                    }

                    let lit_lengths = &all_lengths[..hlit];
                    let dist_lengths = &all_lengths[hlit..];

                    // A block without a decodable end-of-block never
                    // terminates.
                    if lit_lengths[256] == 0 {
                        return Err(FlateError::InvalidHuffmanTree);
                    }

                    let lit_max = max_code_length(lit_lengths);
                    if !validate_lengths(lit_lengths, lit_max) {
                        return Err(FlateError::InvalidHuffmanTree);
                    }
                    lit_table = Some(DecodeTable::from_lengths(lit_lengths, lit_max));

                    let dist_max = max_code_length(dist_lengths);
                    if !validate_lengths(dist_lengths, dist_max) {
                        return Err(FlateError::InvalidHuffmanTree);
                    }
                    dist_table = Some(DecodeTable::from_lengths(dist_lengths, dist_max));
                }

                _ => return Err(FlateError::invalid_block_type(pos)),
            }

            if pos > total_bits {
                if strict {
                    return Err(FlateError::UnexpectedEof);
                }
                break 'blocks;
            }
        }

        let (lit, dist) = match (lit_table.take(), dist_table.take()) {
            (Some(lit), Some(dist)) => (lit, dist),
            _ => unreachable!(),
        };

        ensure_capacity(&mut buffer, written + OUTPUT_HEADROOM);

        // Committed position: only advanced after a symbol is fully applied.
        let mut last_pos = pos;
        let mut paused = false;
        let mut block_done = false;

        while !block_done {
            let entry = lit.entries[(read_bits16(input, pos) & lit.mask()) as usize];
            let symbol = usize::from(entry >> 4);
            pos += usize::from(entry & 15);

            if pos > total_bits {
                if strict {
                    return Err(FlateError::UnexpectedEof);
                }
                paused = true;
                break;
            }
            if entry == 0 {
                return Err(FlateError::invalid_length_literal(pos));
            }

            if symbol < 256 {
                if written == buffer.len() {
                    ensure_capacity(&mut buffer, written + OUTPUT_HEADROOM);
                }
                buffer[written] = symbol as u8;
                written += 1;
                last_pos = pos;
            } else if symbol == 256 {
                last_pos = pos;
                block_done = true;
            } else {
                if symbol > 285 {
                    return Err(FlateError::invalid_length_literal(pos));
                }

                let mut match_length = symbol - 254;
                if symbol > 264 {
                    let length_index = symbol - 257;
                    let extra = u32::from(LENGTH_EXTRA_BITS[length_index]);
                    match_length = read_bits(input, pos, (1 << extra) - 1) as usize
                        + usize::from(LENGTH_BASE[length_index]);
                    pos += extra as usize;
                }

                let dist_entry = dist.entries[(read_bits16(input, pos) & dist.mask()) as usize];
                let distance_symbol = usize::from(dist_entry >> 4);
                pos += usize::from(dist_entry & 15);
                if pos > total_bits {
                    if strict {
                        return Err(FlateError::UnexpectedEof);
                    }
                    paused = true;
                    break;
                }
                if dist_entry == 0 || distance_symbol >= 30 {
                    return Err(FlateError::invalid_distance(pos));
                }

                let mut distance = usize::from(DISTANCE_BASE[distance_symbol]);
                if distance_symbol > 3 {
                    let extra = u32::from(DISTANCE_EXTRA_BITS[distance_symbol]);
                    distance += (read_bits16(input, pos) & ((1 << extra) - 1)) as usize;
                    pos += extra as usize;
                }

                if pos > total_bits {
                    if strict {
                        return Err(FlateError::UnexpectedEof);
                    }
                    paused = true;
                    break;
                }

                ensure_capacity(&mut buffer, written + OUTPUT_HEADROOM);
                let copy_end = written + match_length;

                if written < distance {
                    // The reference starts before this call's output; the
                    // head of the copy comes from the dictionary tail.
                    if distance > dictionary.len() + written {
                        return Err(FlateError::invalid_distance(pos));
                    }
                    let dict_end = distance.min(copy_end);
                    while written < dict_end {
                        buffer[written] = dictionary[dictionary.len() + written - distance];
                        written += 1;
                    }
                }

                while written < copy_end {
                    buffer[written] = buffer[written - distance];
                    written += 1;
                }
                last_pos = pos;
            }
        }

        state.bit_pos = last_pos;
        state.output_offset = written;
        state.is_final_block = is_final;

        if paused {
            state.lit_table = Some(lit);
            state.dist_table = Some(dist);
            break 'blocks;
        }
        if is_final {
            break 'blocks;
        }
    }

    buffer.truncate(written);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::{DeflateOptions, deflate, deflate_with_options};

    #[test]
    fn test_stored_block() {
        let data = inflate(&[0x01, 0x05, 0x00, 0xFA, 0xFF, b'h', b'e', b'l', b'l', b'o']).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_stored_block_bad_nlen() {
        // NLEN not the complement of LEN.
        let result = inflate(&[0x01, 0x05, 0x00, 0xFB, 0xFF, b'h', b'e', b'l', b'l', b'o']);
        assert!(matches!(result, Err(FlateError::InvalidBlockType { .. })));
    }

    #[test]
    fn test_stored_block_truncated() {
        let result = inflate(&[0x01, 0x05, 0x00, 0xFA, 0xFF, b'h', b'e']);
        assert!(matches!(result, Err(FlateError::UnexpectedEof)));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(inflate(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_empty_fixed_block() {
        // BFINAL=1 BTYPE=01, then the 7-bit end-of-block code.
        assert_eq!(inflate(&[0x03, 0x00]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_fixed_block_single_literal() {
        // 'A' in the fixed code (0x71 on the wire MSB-first), then EOB.
        assert_eq!(inflate(&[0x73, 0x04, 0x00]).unwrap(), b"A");
    }

    #[test]
    fn test_invalid_block_type() {
        // BFINAL=1 BTYPE=11.
        let result = inflate(&[0x07, 0x00]);
        assert!(matches!(result, Err(FlateError::InvalidBlockType { .. })));
    }

    #[test]
    fn test_truncated_fixed_block() {
        let result = inflate(&[0x63]);
        assert!(matches!(result, Err(FlateError::UnexpectedEof)));
    }

    #[test]
    fn test_truncated_dynamic_block_reports_eof() {
        // Every proper prefix of a valid stream ends mid-symbol somewhere;
        // the cut must surface as end of input, not as corruption.
        let data: Vec<u8> = b"a stream large enough for a dynamic block. "
            .repeat(60)
            .to_vec();
        let compressed = deflate(&data, 6).unwrap();
        for cut in 1..compressed.len() {
            let result = inflate(&compressed[..cut]);
            assert!(
                matches!(result, Err(FlateError::UnexpectedEof)),
                "cut {cut}: {result:?}"
            );
        }
    }

    #[test]
    fn test_roundtrip_fixed_and_dynamic() {
        let small = b"hello world";
        assert_eq!(inflate(&deflate(small, 6).unwrap()).unwrap(), small);

        let large: Vec<u8> = b"the quick brown fox jumps over the lazy dog. "
            .repeat(200)
            .to_vec();
        assert_eq!(inflate(&deflate(&large, 9).unwrap()).unwrap(), large);
    }

    #[test]
    fn test_roundtrip_stored() {
        let data: Vec<u8> = (0..=255u8).cycle().take(70000).collect();
        assert_eq!(inflate(&deflate(&data, 0).unwrap()).unwrap(), data);
    }

    #[test]
    fn test_dictionary_roundtrip() {
        let dictionary = b"a common prefix shared by compressor and decompressor".to_vec();
        let data = b"a common prefix shared by nobody else";

        let options = DeflateOptions {
            dictionary: Some(dictionary.clone()),
            ..DeflateOptions::new(6)
        };
        let compressed = deflate_with_options(data, &options).unwrap();
        assert_eq!(
            inflate_with_dictionary(&compressed, &dictionary).unwrap(),
            data
        );
    }

    #[test]
    fn test_distance_without_dictionary_rejected() {
        let dictionary = b"0123456789abcdef0123456789abcdef".to_vec();
        let options = DeflateOptions {
            dictionary: Some(dictionary),
            ..DeflateOptions::new(6)
        };
        let compressed = deflate_with_options(b"0123456789abcdef", &options).unwrap();
        let result = inflate(&compressed);
        assert!(matches!(result, Err(FlateError::InvalidDistance { .. })));
    }
}
