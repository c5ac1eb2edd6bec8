//! Canonical Huffman coding for DEFLATE.
//!
//! DEFLATE transmits only code lengths; codes of the same length take
//! consecutive values in symbol order (RFC 1951 Section 3.2.2). This module
//! covers all four jobs built on that rule:
//!
//! - [`DecodeTable`]: a flat lookup table for the decoder
//! - [`assign_codes`]: write-ready code patterns for the encoder
//! - [`validate_lengths`]: completeness check on received code lengths
//! - [`build_code_lengths`]: length-limited Huffman construction from
//!   symbol frequencies, plus the code-length RLE for dynamic headers
//!
//! # Alphabets
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29
//! - **Code Length**: 0-18 (encodes the other two alphabets)

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: u32 = 15;

/// A flat Huffman decode table.
///
/// One entry per possible `max_bits`-wide bit window. Each entry packs
/// `(symbol << 4) | code_length`; an entry of 0 marks a bit pattern no code
/// produces. Codes shorter than `max_bits` own every window that starts with
/// them, so a single unmasked lookup of the next `max_bits` input bits finds
/// both the symbol and how many bits to consume.
///
/// Indices are the input bits as read LSB-first, which is the bit-reversed
/// canonical code; the table is built reversed so the decoder does no
/// per-symbol reversal.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    /// Lookup entries, `1 << max_bits` of them.
    pub entries: Vec<u16>,
    /// Window width of the table.
    pub max_bits: u32,
}

impl DecodeTable {
    /// Build a decode table from code lengths.
    ///
    /// `max_bits` must be the largest length present. Callers validate the
    /// lengths first; this constructor assumes they form a usable code.
    pub fn from_lengths(lengths: &[u8], max_bits: u32) -> Self {
        let mut next_code = first_codes(lengths, max_bits);
        let mut entries = vec![0u16; 1usize << max_bits];

        for (symbol, &len) in lengths.iter().enumerate() {
            let len = u32::from(len);
            if len == 0 {
                continue;
            }
            let entry = ((symbol as u16) << 4) | len as u16;
            let free_bits = max_bits - len;

            let code = next_code[(len - 1) as usize];
            next_code[(len - 1) as usize] += 1;

            // Fill every window that starts with this code.
            let start = code << free_bits;
            for value in start..=(start | ((1 << free_bits) - 1)) {
                entries[reverse_bits(value, max_bits) as usize] = entry;
            }
        }

        Self { entries, max_bits }
    }

    /// Bit mask selecting a table index from an input window.
    #[inline]
    pub fn mask(&self) -> u32 {
        (1 << self.max_bits) - 1
    }
}

/// Assign write-ready canonical code patterns to code lengths.
///
/// Returns one pattern per symbol (0 for unused symbols). The patterns are
/// already bit-reversed: writing the low `length` bits LSB-first puts the
/// canonical code on the wire in the order RFC 1951 expects.
pub fn assign_codes(lengths: &[u8]) -> Vec<u16> {
    let max_bits = max_code_length(lengths);
    let mut next_code = first_codes(lengths, max_bits);
    let mut codes = vec![0u16; lengths.len()];

    for (symbol, &len) in lengths.iter().enumerate() {
        let len = u32::from(len);
        if len != 0 {
            let code = next_code[(len - 1) as usize];
            next_code[(len - 1) as usize] += 1;
            codes[symbol] = reverse_bits(code, len);
        }
    }

    codes
}

/// First canonical code value for each length (indexed by `length - 1`).
fn first_codes(lengths: &[u8], max_bits: u32) -> Vec<u16> {
    let mut counts = vec![0u16; max_bits.max(1) as usize];
    for &len in lengths {
        if len != 0 {
            counts[(len - 1) as usize] += 1;
        }
    }

    let mut next_code = vec![0u16; max_bits.max(1) as usize];
    for i in 1..max_bits as usize {
        next_code[i] = (next_code[i - 1] + counts[i - 1]) << 1;
    }
    next_code
}

/// Largest code length present, 0 for an empty set.
pub fn max_code_length(lengths: &[u8]) -> u32 {
    lengths.iter().copied().max().unwrap_or(0).into()
}

/// Validate that code lengths form a complete, non-oversubscribed code.
///
/// Code-space accounting in units of `2^max_bits`: a length-L code occupies
/// `2^(max_bits - L)` units and a usable code occupies exactly the whole
/// space. RFC 1951 names two exceptions, both accepted here: no codes at
/// all, and a single one-bit code for a one-symbol alphabet.
pub fn validate_lengths(lengths: &[u8], max_bits: u32) -> bool {
    if max_bits == 0 {
        return true;
    }

    let mut length_counts = vec![0u32; max_bits as usize + 1];
    let mut total_symbols = 0u32;

    for &len in lengths {
        let len = u32::from(len);
        if len > 0 {
            if len > max_bits {
                return false;
            }
            length_counts[len as usize] += 1;
            total_symbols += 1;
        }
    }

    if total_symbols <= 1 {
        return true;
    }

    let mut code_space = 1i64 << max_bits;
    for bit_length in 1..=max_bits {
        let count = i64::from(length_counts[bit_length as usize]);
        code_space -= count * (1i64 << (max_bits - bit_length));
        if code_space < 0 {
            return false; // Oversubscribed
        }
    }

    code_space == 0
}

/// Build length-limited canonical code lengths from symbol frequencies.
///
/// Returns the lengths (trimmed to the last used symbol plus one) and the
/// largest length. Symbols with zero frequency get length 0; a one-symbol
/// alphabet gets length 1.
///
/// Construction is a two-queue merge over an index arena: leaves sorted by
/// frequency come first, merged nodes are appended after, and since every
/// child index precedes its parent's, depths are assigned by one backward
/// sweep instead of recursion. Lengths beyond `max_bits` are then clamped
/// and the freed code space is repaid by lengthening the cheapest short
/// codes (debt accounting in units of `2^-max_bits` code space).
pub fn build_code_lengths(frequencies: &[u32], max_bits: u32) -> (Vec<u8>, u32) {
    let mut leaves: Vec<(u32, usize)> = frequencies
        .iter()
        .enumerate()
        .filter(|&(_, &freq)| freq > 0)
        .map(|(symbol, &freq)| (freq, symbol))
        .collect();

    let leaf_count = leaves.len();
    if leaf_count == 0 {
        return (Vec::new(), 0);
    }
    if leaf_count == 1 {
        let symbol = leaves[0].1;
        let mut lengths = vec![0u8; symbol + 1];
        lengths[symbol] = 1;
        return (lengths, 1);
    }

    leaves.sort_unstable();

    // Arena: leaves at 0..leaf_count, merged nodes after, root last.
    let mut freqs: Vec<u64> = leaves.iter().map(|&(freq, _)| u64::from(freq)).collect();
    let mut children: Vec<(usize, usize)> = Vec::with_capacity(leaf_count - 1);

    let mut next_leaf = 0usize;
    let mut next_merged = leaf_count;
    for _ in 0..leaf_count - 1 {
        let mut pick = |freqs: &Vec<u64>| {
            // Merged nodes win frequency ties, matching the classic
            // two-queue construction.
            if next_leaf < leaf_count
                && (next_merged == freqs.len() || freqs[next_leaf] < freqs[next_merged])
            {
                next_leaf += 1;
                next_leaf - 1
            } else {
                next_merged += 1;
                next_merged - 1
            }
        };
        let first = pick(&freqs);
        let second = pick(&freqs);
        freqs.push(freqs[first] + freqs[second]);
        children.push((first, second));
    }

    // Parent indices exceed child indices: a backward sweep sees every
    // parent's depth before its children need it.
    let node_count = freqs.len();
    let mut depths = vec![0u32; node_count];
    for index in (leaf_count..node_count).rev() {
        let (left, right) = children[index - leaf_count];
        depths[left] = depths[index] + 1;
        depths[right] = depths[index] + 1;
    }

    let max_symbol = leaves.iter().map(|&(_, symbol)| symbol).max().unwrap_or(0);
    let mut lengths_by_symbol = vec![0u32; max_symbol + 1];
    let mut current_max = 0u32;
    for (leaf, &(_, symbol)) in leaves.iter().enumerate() {
        lengths_by_symbol[symbol] = depths[leaf];
        current_max = current_max.max(depths[leaf]);
    }

    if current_max > max_bits {
        limit_lengths(&mut lengths_by_symbol, &leaves, current_max, max_bits);
        current_max = max_bits;
    }

    let lengths = lengths_by_symbol.iter().map(|&len| len as u8).collect();
    (lengths, current_max)
}

/// Clamp over-long codes to `max_bits` and rebalance the code space.
fn limit_lengths(
    lengths: &mut [u32],
    leaves: &[(u32, usize)],
    current_max: u32,
    max_bits: u32,
) {
    let cost_shift = current_max - max_bits;
    let clamped_cost = 1i64 << cost_shift;

    // Longest codes first; among equals, lowest frequency first.
    let mut order: Vec<(u32, usize)> = leaves.to_vec();
    order.sort_by(|a, b| lengths[b.1].cmp(&lengths[a.1]).then(a.0.cmp(&b.0)));

    let mut debt = 0i64;
    let mut repay_from = 0usize;
    for (index, &(_, symbol)) in order.iter().enumerate() {
        if lengths[symbol] > max_bits {
            debt += clamped_cost - (1i64 << (current_max - lengths[symbol]));
            lengths[symbol] = max_bits;
        } else {
            repay_from = index;
            break;
        }
    }

    // Convert to units where a max_bits-length code occupies one unit.
    debt >>= cost_shift;

    while debt > 0 {
        let symbol = order[repay_from].1;
        if lengths[symbol] < max_bits {
            debt -= 1i64 << (max_bits - lengths[symbol] - 1);
            lengths[symbol] += 1;
        } else {
            repay_from += 1;
        }
    }

    // Repaying can overshoot; give the spare space back by shortening
    // limit-length codes, highest frequency first.
    let mut index = order.len();
    while index > 0 && debt != 0 {
        index -= 1;
        let symbol = order[index].1;
        if lengths[symbol] == max_bits {
            lengths[symbol] -= 1;
            debt += 1;
        }
    }
}

/// Pack a code-length RLE entry: symbol in the low 5 bits, the extra-bit
/// value above it, and the extra-bit count in the top bits.
const fn rle_entry(symbol: u16, value: u16, extra_bits: u16) -> u16 {
    symbol | (value << 5) | (extra_bits << 12)
}

/// Run-length encode code lengths for a dynamic block header.
///
/// Returns the packed entries and the trimmed symbol count (trailing zero
/// lengths are not transmitted; the count becomes HLIT or HDIST). Entry
/// layout matches [`rle_entry`]; the writer emits the symbol's Huffman code
/// followed by the extra-bit value.
///
/// Ops per RFC 1951 Section 3.2.7: 16 repeats the previous length 3-6
/// times, 17 emits 3-10 zeros, 18 emits 11-138 zeros.
pub(crate) fn encode_code_lengths(lengths: &[u8]) -> (Vec<u16>, usize) {
    let mut trimmed = lengths.len();
    while trimmed > 0 && lengths[trimmed - 1] == 0 {
        trimmed -= 1;
    }
    if trimmed == 0 {
        return (Vec::new(), 0);
    }

    let mut entries = Vec::with_capacity(trimmed);
    let mut current = u16::from(lengths[0]);
    let mut run = 1u16;

    for i in 1..=trimmed {
        let next = if i < trimmed {
            Some(u16::from(lengths[i]))
        } else {
            None
        };

        if next == Some(current) {
            run += 1;
            continue;
        }

        if current == 0 && run > 2 {
            while run > 138 {
                entries.push(rle_entry(18, 127, 7));
                run -= 138;
            }
            if run > 2 {
                if run > 10 {
                    entries.push(rle_entry(18, run - 11, 7));
                } else {
                    entries.push(rle_entry(17, run - 3, 3));
                }
                run = 0;
            }
        } else if run > 3 {
            entries.push(current);
            run -= 1;
            while run > 6 {
                entries.push(rle_entry(16, 3, 2));
                run -= 6;
            }
            if run > 2 {
                entries.push(rle_entry(16, run - 3, 2));
                run = 0;
            }
        }

        for _ in 0..run {
            entries.push(current);
        }
        run = 1;
        if let Some(next) = next {
            current = next;
        }
    }

    (entries, trimmed)
}

/// Reverse the low `bits` bits of `value`.
pub fn reverse_bits(value: u16, bits: u32) -> u16 {
    let mut result = 0u16;
    let mut value = value;
    for _ in 0..bits {
        result = (result << 1) | (value & 1);
        value >>= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Expand RLE entries back into plain code lengths.
    fn expand_rle(entries: &[u16]) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        for &entry in entries {
            let symbol = entry & 31;
            let value = (entry >> 5) & 127;
            match symbol {
                0..=15 => out.push(symbol as u8),
                16 => {
                    let last = *out.last().unwrap();
                    for _ in 0..3 + value {
                        out.push(last);
                    }
                }
                17 => out.extend(std::iter::repeat_n(0u8, (3 + value) as usize)),
                18 => out.extend(std::iter::repeat_n(0u8, (11 + value) as usize)),
                _ => unreachable!(),
            }
        }
        out
    }

    #[test]
    fn test_validate_oversubscribed() {
        assert!(!validate_lengths(&[2, 2, 2, 3, 3, 3, 3, 3], 3));
    }

    #[test]
    fn test_validate_incomplete() {
        assert!(!validate_lengths(&[3, 3], 3));
    }

    #[test]
    fn test_validate_complete() {
        assert!(validate_lengths(&[2, 2, 3, 3, 3, 3], 3));
    }

    #[test]
    fn test_validate_rfc_exceptions() {
        // Single symbol and empty alphabets are explicitly allowed.
        assert!(validate_lengths(&[1], 1));
        assert!(validate_lengths(&[], 5));
        assert!(validate_lengths(&[0, 0, 0], 3));
    }

    #[test]
    fn test_reverse_bits() {
        assert_eq!(reverse_bits(0b1, 1), 0b1);
        assert_eq!(reverse_bits(0b100, 3), 0b001);
        assert_eq!(reverse_bits(0b1011, 4), 0b1101);
        assert_eq!(reverse_bits(0x5555, 16), 0xAAAA);
    }

    #[test]
    fn test_decode_table_finds_all_symbols() {
        // sym0: 10, sym1: 0, sym2: 110, sym3: 111
        let lengths = [2u8, 1, 3, 3];
        let table = DecodeTable::from_lengths(&lengths, 3);
        let codes = assign_codes(&lengths);

        for (symbol, &len) in lengths.iter().enumerate() {
            let entry = table.entries[codes[symbol] as usize];
            assert_eq!(entry >> 4, symbol as u16);
            assert_eq!(entry & 15, u16::from(len));
        }
    }

    #[test]
    fn test_decode_table_short_code_fills_suffixes() {
        let lengths = [2u8, 1, 3, 3];
        let table = DecodeTable::from_lengths(&lengths, 3);
        let codes = assign_codes(&lengths);

        // A 1-bit code owns every window beginning with it.
        let pattern = codes[1] as usize;
        for suffix in 0..4usize {
            let entry = table.entries[pattern | (suffix << 1)];
            assert_eq!(entry >> 4, 1);
        }
    }

    #[test]
    fn test_build_known_tree() {
        let frequencies = [5u32, 9, 12, 13, 16, 45];
        let (lengths, max_bits) = build_code_lengths(&frequencies, 15);
        assert_eq!(lengths, vec![4, 4, 3, 3, 3, 1]);
        assert_eq!(max_bits, 4);
        assert!(validate_lengths(&lengths, max_bits));
    }

    #[test]
    fn test_build_single_and_empty() {
        let (lengths, max_bits) = build_code_lengths(&[0, 0, 7, 0], 15);
        assert_eq!(lengths, vec![0, 0, 1]);
        assert_eq!(max_bits, 1);

        let (lengths, max_bits) = build_code_lengths(&[0, 0, 0], 15);
        assert!(lengths.is_empty());
        assert_eq!(max_bits, 0);
    }

    #[test]
    fn test_build_respects_length_limit() {
        // Exponential frequencies force long codes without a limit.
        let frequencies: Vec<u32> = (0..20).map(|i| 1u32 << i.min(16)).collect();
        let (lengths, max_bits) = build_code_lengths(&frequencies, 7);
        assert!(max_bits <= 7);
        assert!(lengths.iter().all(|&len| len <= 7));
        assert!(validate_lengths(&lengths, max_bits));
    }

    #[test]
    fn test_build_many_shapes_stay_complete() {
        // The limiter must always hand back a complete code.
        let mut seed = 0x2545F491u32;
        for trial in 0..200 {
            let count = 2 + (trial % 30);
            let mut frequencies = vec![0u32; count];
            for freq in frequencies.iter_mut() {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                *freq = (seed >> 16) % 25000;
            }
            frequencies[0] = frequencies[0].max(1);
            frequencies[1] = frequencies[1].max(1);

            for limit in [7u32, 15] {
                let (lengths, max_bits) = build_code_lengths(&frequencies, limit);
                assert!(max_bits <= limit);
                assert!(
                    validate_lengths(&lengths, max_bits),
                    "incomplete code for freqs {:?} limit {}",
                    frequencies,
                    limit
                );
            }
        }
    }

    #[test]
    fn test_rle_roundtrip() {
        let cases: Vec<Vec<u8>> = vec![
            vec![8; 144]
                .into_iter()
                .chain(vec![9; 112])
                .chain(vec![7; 24])
                .chain(vec![8; 8])
                .collect(),
            vec![2, 1, 3, 3],
            vec![5, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 5],
            vec![4, 4, 4, 4, 4, 4, 4, 4, 4, 3],
            vec![1, 0, 0],
        ];

        for lengths in cases {
            let (entries, trimmed) = encode_code_lengths(&lengths);
            let mut expected = lengths.clone();
            expected.truncate(trimmed);
            assert_eq!(expand_rle(&entries), expected, "case {:?}", lengths);
        }
    }

    #[test]
    fn test_rle_long_zero_run() {
        let mut lengths = vec![0u8; 300];
        lengths[0] = 1;
        lengths[299] = 1;
        let (entries, trimmed) = encode_code_lengths(&lengths);
        assert_eq!(trimmed, 300);
        assert_eq!(expand_rle(&entries), lengths);
        // 298 zeros need three op-18 runs.
        assert!(entries.len() <= 5);
    }
}
