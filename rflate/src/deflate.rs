//! DEFLATE compression (RFC 1951).
//!
//! The compressor scans the input with the hash-chain matcher, buffers the
//! resulting literals and matches as packed symbol words, and flushes them
//! as blocks. Every block is written in whichever of the three encodings is
//! cheapest by exact bit count: stored, fixed Huffman, or dynamic Huffman
//! with per-block trees built from the symbol frequencies.
//!
//! Compression is resumable: a [`DeflateState`] carries the hash chains, the
//! scan position, and the final partial byte between calls, so the streaming
//! layer can feed input in arbitrary chunks and concatenate the outputs into
//! one valid stream.

use crate::huffman::{MAX_CODE_LENGTH, assign_codes, build_code_lengths, encode_code_lengths};
use crate::lz77::{HashChains, WINDOW_SIZE};
use crate::tables::{
    CODE_LENGTH_ORDER, CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, DISTANCE_EXTRA_BITS,
    END_OF_BLOCK, LENGTH_EXTRA_BITS, LEVEL_PARAMS, LITLEN_ALPHABET_SIZE, distance_to_code,
    fixed_distance_codes, fixed_distance_lengths, fixed_litlen_codes, fixed_litlen_lengths,
    length_to_code,
};
use rflate_core::bits::{next_byte, write_bits, write_bits16};
use rflate_core::{FlateError, Result};

/// Flush the current block once it holds this many matches.
const FLUSH_MATCH_LIMIT: usize = 7000;

/// Flush the current block once it holds this many symbols.
const FLUSH_SYMBOL_LIMIT: usize = 24576;

/// Skip a flush this close to the end of a final chunk; the tail rides
/// along in the last block instead of paying another tree header.
const FLUSH_TAIL_BYTES: usize = 423;

/// Symbol buffer capacity; the flush limits keep usage far below it.
const SYMBOL_BUFFER_CAPACITY: usize = 65536;

/// Largest payload a stored block's 16-bit LEN field can carry.
const MAX_STORED_BLOCK: usize = 65535;

/// Tag bit marking a packed symbol word as a match.
const MATCH_FLAG: u32 = 1 << 28;

/// Compression settings.
///
/// `level` 0 stores the input without compression; 1-9 trade speed for
/// ratio by searching longer hash chains (see
/// [`LEVEL_PARAMS`](crate::tables::LEVEL_PARAMS)).
#[derive(Debug, Clone)]
pub struct DeflateOptions {
    /// Compression level, 0..=9.
    pub level: u8,
    /// Hash table sizing, 0..=12 for `2^(mem_level + 11)` buckets.
    /// `None` sizes the table from the input length.
    pub mem_level: Option<u8>,
    /// Preset dictionary, at most 32768 bytes. Matches may reach into it.
    pub dictionary: Option<Vec<u8>>,
}

impl DeflateOptions {
    /// Options for the given compression level with defaults elsewhere.
    pub fn new(level: u8) -> Self {
        Self {
            level,
            mem_level: None,
            dictionary: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.level > 9 {
            return Err(FlateError::invalid_options(format!(
                "compression level must be 0..=9, got {}",
                self.level
            )));
        }
        if let Some(mem_level) = self.mem_level {
            if mem_level > 12 {
                return Err(FlateError::invalid_options(format!(
                    "memory level must be 0..=12, got {mem_level}"
                )));
            }
        }
        if let Some(dictionary) = &self.dictionary {
            if dictionary.len() > WINDOW_SIZE {
                return Err(FlateError::invalid_options(format!(
                    "dictionary must be at most {WINDOW_SIZE} bytes, got {}",
                    dictionary.len()
                )));
            }
        }
        Ok(())
    }
}

impl Default for DeflateOptions {
    fn default() -> Self {
        Self::new(6)
    }
}

/// Resumable compressor state.
///
/// `bit_buffer` carries the unfinished final byte of the previous chunk:
/// the low 3 bits are the bit offset within it, the rest the byte value
/// shifted up by 3. The byte is withheld from that chunk's output and
/// re-emitted at the start of the next call.
#[derive(Debug, Clone)]
pub(crate) struct DeflateState {
    pub(crate) chains: Option<HashChains>,
    pub(crate) input_offset: usize,
    pub(crate) wait_index: usize,
    /// Valid input length when the buffer is larger; 0 means the whole
    /// buffer.
    pub(crate) input_end: usize,
    pub(crate) bit_buffer: u32,
    pub(crate) is_last_chunk: bool,
}

impl DeflateState {
    pub(crate) fn new(is_last_chunk: bool) -> Self {
        Self {
            chains: None,
            input_offset: 0,
            wait_index: 0,
            input_end: 0,
            bit_buffer: 0,
            is_last_chunk,
        }
    }
}

/// Compress `data` into a raw DEFLATE stream.
///
/// `level` 0 stores, 1 is fastest, 9 compresses hardest.
///
/// # Examples
///
/// ```
/// let compressed = rflate::deflate(b"hello hello hello", 6)?;
/// assert_eq!(rflate::inflate(&compressed)?, b"hello hello hello");
/// # Ok::<(), rflate_core::FlateError>(())
/// ```
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    deflate_with_options(data, &DeflateOptions::new(level))
}

/// Compress `data` with explicit [`DeflateOptions`].
pub fn deflate_with_options(data: &[u8], options: &DeflateOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let mut state = DeflateState::new(true);

    let combined;
    let input: &[u8] = match &options.dictionary {
        Some(dictionary) if !dictionary.is_empty() => {
            let mut working = Vec::with_capacity(dictionary.len() + data.len());
            working.extend_from_slice(dictionary);
            working.extend_from_slice(data);
            // Hashes are inserted over the dictionary, symbols only after it.
            state.wait_index = dictionary.len();
            combined = working;
            &combined
        }
        _ => data,
    };

    let hash_bits = match options.mem_level {
        Some(mem_level) => u32::from(mem_level) + 11,
        None => auto_hash_bits(input.len()),
    };

    Ok(deflate_into(input, options.level, hash_bits, &mut state))
}

/// Hash table bits derived from the input length for one-shot calls.
pub(crate) fn auto_hash_bits(input_len: usize) -> u32 {
    ((input_len as f64).ln().clamp(8.0, 13.0) * 1.5).ceil() as u32
}

/// Compress one chunk, continuing from `state`.
///
/// Returns the bytes produced for this chunk. For a non-final chunk the
/// trailing partial byte is withheld into `state.bit_buffer`; for the final
/// chunk the stream is closed with a block marked BFINAL.
pub(crate) fn deflate_into(
    data: &[u8],
    level: u8,
    hash_bits: u32,
    state: &mut DeflateState,
) -> Vec<u8> {
    let data_size = if state.input_end != 0 {
        state.input_end
    } else {
        data.len()
    };

    // Compressed output can exceed the input on incompressible data: allow
    // an eighth of slack plus per-block headers.
    let margin = (data_size >> 3) + 256 + 5 * (1 + data_size / FLUSH_MATCH_LIMIT);
    let mut output = vec![0u8; data_size + margin];
    let is_last = state.is_last_chunk;
    let mut bit_pos = (state.bit_buffer & 7) as usize;

    if level > 0 {
        if bit_pos != 0 {
            // Restore the partial byte withheld by the previous chunk.
            output[0] = (state.bit_buffer >> 3) as u8;
        }

        let (nice_length, chain_length) = LEVEL_PARAMS[usize::from(level) - 1];
        let mut chains = state
            .chains
            .take()
            .unwrap_or_else(|| HashChains::new(hash_bits));

        let mut symbols: Vec<u32> = Vec::with_capacity(SYMBOL_BUFFER_CAPACITY);
        let mut lit_freq = [0u32; LITLEN_ALPHABET_SIZE];
        let mut dist_freq = [0u32; DISTANCE_ALPHABET_SIZE];
        let mut match_count = 0usize;
        let mut extra_bits = 0usize;
        let mut wait_index = state.wait_index;
        let mut i = state.input_offset;
        let mut block_start = i.max(wait_index);

        while i + 2 < data_size {
            let hash = chains.hash(data, i);
            let prev_head = chains.insert(hash, i);

            if wait_index <= i {
                let remaining = data_size - i;
                if (match_count > FLUSH_MATCH_LIMIT || symbols.len() > FLUSH_SYMBOL_LIMIT)
                    && (remaining > FLUSH_TAIL_BYTES || !is_last)
                {
                    bit_pos = write_block(
                        data,
                        &mut output,
                        false,
                        &symbols,
                        &mut lit_freq,
                        &mut dist_freq,
                        extra_bits,
                        block_start,
                        i - block_start,
                        bit_pos,
                    );
                    symbols.clear();
                    match_count = 0;
                    extra_bits = 0;
                    block_start = i;
                    lit_freq.fill(0);
                    dist_freq.fill(0);
                }

                let (length, distance) = chains.find_match(
                    data,
                    i,
                    prev_head,
                    data_size,
                    usize::from(nice_length),
                    u32::from(chain_length),
                );

                if distance != 0 {
                    let (length_code, length_extra_bits, length_extra) =
                        length_to_code(length as u16);
                    let (distance_code, distance_extra_bits, distance_extra) =
                        distance_to_code(distance as u16);
                    let length_index = u32::from(length_code) - 257;

                    symbols.push(
                        MATCH_FLAG
                            | (((u32::from(length_extra) << 5) | length_index) << 18)
                            | ((u32::from(distance_extra) << 5) | u32::from(distance_code)),
                    );
                    extra_bits +=
                        usize::from(length_extra_bits) + usize::from(distance_extra_bits);
                    lit_freq[257 + length_index as usize] += 1;
                    dist_freq[usize::from(distance_code)] += 1;
                    wait_index = i + length;
                    match_count += 1;
                } else {
                    symbols.push(u32::from(data[i]));
                    lit_freq[usize::from(data[i])] += 1;
                }
            }
            i += 1;
        }

        // Positions too close to the end for a 3-byte hash go out as
        // literals.
        i = i.max(wait_index);
        while i < data_size {
            symbols.push(u32::from(data[i]));
            lit_freq[usize::from(data[i])] += 1;
            i += 1;
        }

        bit_pos = write_block(
            data,
            &mut output,
            is_last,
            &symbols,
            &mut lit_freq,
            &mut dist_freq,
            extra_bits,
            block_start,
            i - block_start,
            bit_pos,
        );

        if !is_last {
            state.bit_buffer =
                ((bit_pos & 7) as u32) | (u32::from(output[bit_pos / 8]) << 3);
            bit_pos -= 7;
            state.chains = Some(chains);
            state.input_offset = i;
            state.wait_index = wait_index;
        }
    } else {
        let mut i = state.wait_index.max(state.input_offset);
        let last_flag = usize::from(is_last);
        // The `+ last_flag` bound forces one final (possibly empty) stored
        // block when the input ends exactly on a block boundary, which is
        // also what makes empty input a valid stream.
        while i < data_size + last_flag {
            let mut end = i + MAX_STORED_BLOCK;
            if end >= data_size {
                output[bit_pos / 8] = last_flag as u8;
                end = data_size;
            }
            bit_pos = write_stored_block(&mut output, bit_pos + 1, &data[i..end]);
            i += MAX_STORED_BLOCK;
        }
        state.input_offset = data_size;
    }

    output.truncate(next_byte(bit_pos));
    output
}

/// Sum of `frequency * code_length` over the symbols both slices cover.
fn code_cost(frequencies: &[u32], lengths: &[u8]) -> usize {
    frequencies
        .iter()
        .zip(lengths.iter())
        .map(|(&frequency, &length)| frequency as usize * usize::from(length))
        .sum()
}

/// Encode one block, choosing stored, fixed, or dynamic by exact bit cost.
///
/// `bit_pos` is where the block's BFINAL bit goes; returns the bit position
/// after the block. Mutates the frequency arrays (EOB count, forced
/// distance frequency); the caller resets them per block anyway.
#[allow(clippy::too_many_arguments)]
fn write_block(
    data: &[u8],
    output: &mut [u8],
    is_final: bool,
    symbols: &[u32],
    lit_freq: &mut [u32; LITLEN_ALPHABET_SIZE],
    dist_freq: &mut [u32; DISTANCE_ALPHABET_SIZE],
    extra_bits: usize,
    block_start: usize,
    block_length: usize,
    bit_pos: usize,
) -> usize {
    let mut pos = bit_pos;
    write_bits(output, pos, u32::from(is_final));
    pos += 1;

    lit_freq[END_OF_BLOCK] += 1;
    // A dynamic block needs at least one distance code even if no matches
    // occurred.
    if dist_freq.iter().all(|&frequency| frequency == 0) {
        dist_freq[0] = 1;
    }

    let (lit_lengths, _) = build_code_lengths(lit_freq, MAX_CODE_LENGTH);
    let (dist_lengths, _) = build_code_lengths(dist_freq, MAX_CODE_LENGTH);
    let (lit_rle, hlit) = encode_code_lengths(&lit_lengths);
    let (dist_rle, hdist) = encode_code_lengths(&dist_lengths);

    let mut clc_freq = [0u32; CODELEN_ALPHABET_SIZE];
    for &entry in lit_rle.iter().chain(dist_rle.iter()) {
        clc_freq[usize::from(entry & 31)] += 1;
    }
    let (clc_lengths, _) = build_code_lengths(&clc_freq, 7);
    let clc_length = |symbol: usize| clc_lengths.get(symbol).copied().unwrap_or(0);

    let mut hclen = CODELEN_ALPHABET_SIZE;
    while hclen > 4 && clc_length(CODE_LENGTH_ORDER[hclen - 1]) == 0 {
        hclen -= 1;
    }

    let fixed_lit_lengths = fixed_litlen_lengths();
    let fixed_dist_lengths = fixed_distance_lengths();

    let stored_cost = (block_length + 5) * 8;
    let fixed_cost = code_cost(lit_freq, &fixed_lit_lengths)
        + code_cost(dist_freq, &fixed_dist_lengths)
        + extra_bits;
    let dynamic_cost = code_cost(lit_freq, &lit_lengths)
        + code_cost(dist_freq, &dist_lengths)
        + extra_bits
        + 14
        + 3 * hclen
        + code_cost(&clc_freq, &clc_lengths)
        + 2 * clc_freq[16] as usize
        + 3 * clc_freq[17] as usize
        + 7 * clc_freq[18] as usize;

    if block_length <= MAX_STORED_BLOCK
        && stored_cost <= fixed_cost
        && stored_cost <= dynamic_cost
    {
        return write_stored_block(output, pos, &data[block_start..block_start + block_length]);
    }

    let use_dynamic = dynamic_cost < fixed_cost;
    write_bits(output, pos, 1 + u32::from(use_dynamic));
    pos += 2;

    let dynamic_lit_codes;
    let dynamic_dist_codes;
    let lit_codes: &[u16];
    let lit_lens: &[u8];
    let dist_codes: &[u16];
    let dist_lens: &[u8];

    if use_dynamic {
        dynamic_lit_codes = assign_codes(&lit_lengths);
        dynamic_dist_codes = assign_codes(&dist_lengths);
        lit_codes = &dynamic_lit_codes;
        lit_lens = &lit_lengths;
        dist_codes = &dynamic_dist_codes;
        dist_lens = &dist_lengths;

        let clc_codes = assign_codes(&clc_lengths);
        write_bits(output, pos, (hlit - 257) as u32);
        write_bits(output, pos + 5, (hdist - 1) as u32);
        write_bits(output, pos + 10, (hclen - 4) as u32);
        pos += 14;

        for (i, &symbol) in CODE_LENGTH_ORDER.iter().enumerate().take(hclen) {
            write_bits(output, pos + 3 * i, u32::from(clc_length(symbol)));
        }
        pos += 3 * hclen;

        for &entry in lit_rle.iter().chain(dist_rle.iter()) {
            let symbol = usize::from(entry & 31);
            write_bits(output, pos, u32::from(clc_codes[symbol]));
            pos += usize::from(clc_lengths[symbol]);
            if symbol > 15 {
                write_bits(output, pos, u32::from((entry >> 5) & 127));
                pos += usize::from(entry >> 12);
            }
        }
    } else {
        lit_codes = fixed_litlen_codes();
        lit_lens = &fixed_lit_lengths;
        dist_codes = fixed_distance_codes();
        dist_lens = &fixed_dist_lengths;
    }

    for &symbol in symbols {
        if symbol > 255 {
            let length_symbol = ((symbol >> 18) & 31) as usize;
            write_bits16(output, pos, u32::from(lit_codes[257 + length_symbol]));
            pos += usize::from(lit_lens[257 + length_symbol]);
            if length_symbol > 7 {
                write_bits(output, pos, (symbol >> 23) & 31);
                pos += usize::from(LENGTH_EXTRA_BITS[length_symbol]);
            }

            let distance_symbol = (symbol & 31) as usize;
            write_bits16(output, pos, u32::from(dist_codes[distance_symbol]));
            pos += usize::from(dist_lens[distance_symbol]);
            if distance_symbol > 3 {
                write_bits16(output, pos, (symbol >> 5) & 8191);
                pos += usize::from(DISTANCE_EXTRA_BITS[distance_symbol]);
            }
        } else {
            write_bits16(output, pos, u32::from(lit_codes[symbol as usize]));
            pos += usize::from(lit_lens[symbol as usize]);
        }
    }

    write_bits16(output, pos, u32::from(lit_codes[END_OF_BLOCK]));
    pos + usize::from(lit_lens[END_OF_BLOCK])
}

/// Write a stored block at `bit_pos` (which already sits past the BFINAL
/// bit): two zero BTYPE bits, byte alignment, LEN, NLEN, raw data.
///
/// Returns the bit position after the block, always byte-aligned.
fn write_stored_block(output: &mut [u8], bit_pos: usize, data: &[u8]) -> usize {
    let length = data.len();
    let byte_pos = next_byte(bit_pos + 2);
    output[byte_pos] = (length & 0xFF) as u8;
    output[byte_pos + 1] = (length >> 8) as u8;
    output[byte_pos + 2] = !output[byte_pos];
    output[byte_pos + 3] = !output[byte_pos + 1];
    output[byte_pos + 4..byte_pos + 4 + length].copy_from_slice(data);
    (byte_pos + 4 + length) * 8
}
