//! Hash-chain match finder for LZ77 compression.
//!
//! Positions are chained by a hash of their first three bytes: `head` maps a
//! hash to the most recent position with that prefix, `prev` links each
//! position to the previous one sharing its hash. Both tables store positions
//! modulo the window size, so they survive input trimming in the streaming
//! compressor as long as trims are whole windows.

/// LZ77 window size (RFC 1951 limits back-references to 32 KiB).
pub(crate) const WINDOW_SIZE: usize = 32768;

/// Mask reducing a position to its window slot.
pub(crate) const WINDOW_MASK: usize = 32767;

/// Shortest match worth encoding.
pub(crate) const MIN_MATCH: usize = 3;

/// Longest match a single length code can express.
pub(crate) const MAX_MATCH: usize = 258;

/// Hash-chained dictionary over the input window.
#[derive(Debug, Clone)]
pub(crate) struct HashChains {
    head: Vec<u16>,
    prev: Vec<u16>,
    mask: usize,
    shift1: u32,
    shift2: u32,
}

impl HashChains {
    /// Create empty chains with `1 << hash_bits` buckets.
    pub(crate) fn new(hash_bits: u32) -> Self {
        let shift1 = hash_bits.div_ceil(3);
        Self {
            head: vec![0u16; 1 << hash_bits],
            prev: vec![0u16; WINDOW_SIZE],
            mask: (1usize << hash_bits) - 1,
            shift1,
            shift2: 2 * shift1,
        }
    }

    /// Hash the three bytes at `pos`. Requires `pos + 2 < data.len()`.
    #[inline]
    pub(crate) fn hash(&self, data: &[u8], pos: usize) -> usize {
        (usize::from(data[pos])
            ^ (usize::from(data[pos + 1]) << self.shift1)
            ^ (usize::from(data[pos + 2]) << self.shift2))
            & self.mask
    }

    /// Record `pos` as the newest position for `hash`.
    ///
    /// Returns the window slot of the previous newest position, the entry
    /// point for [`HashChains::find_match`].
    #[inline]
    pub(crate) fn insert(&mut self, hash: usize, pos: usize) -> usize {
        let slot = pos & WINDOW_MASK;
        let prev_head = usize::from(self.head[hash]);
        self.prev[slot] = prev_head as u16;
        self.head[hash] = slot as u16;
        prev_head
    }

    /// Search the chain starting at `prev_head` for the longest match
    /// against the bytes at `pos`.
    ///
    /// Returns `(length, distance)`; a distance of 0 means no match of at
    /// least [`MIN_MATCH`] bytes was found. The walk stops after
    /// `chain_length` links, past the window edge, or once a match of
    /// `nice_length` bytes is in hand.
    ///
    /// Chain slots only identify positions modulo the window, so a stale
    /// slot can alias an unrelated position. Two guards reject aliases: the
    /// candidate's hash must match before the walk starts, and each
    /// comparison begins at the byte that would extend the best match, which
    /// a shorter alias cannot satisfy by accident without also matching the
    /// scan.
    pub(crate) fn find_match(
        &self,
        data: &[u8],
        pos: usize,
        prev_head: usize,
        data_size: usize,
        nice_length: usize,
        chain_length: u32,
    ) -> (usize, usize) {
        let mut length = MIN_MATCH - 1;
        let mut distance = 0usize;
        let mut slot = pos & WINDOW_MASK;
        let mut candidate = prev_head;
        let mut remaining_chain = chain_length;
        let mut diff = slot.wrapping_sub(candidate) & WINDOW_MASK;
        let remaining = data_size - pos;

        if remaining > 2 && diff <= pos && self.hash(data, pos) == self.hash(data, pos - diff) {
            let nice_cap = nice_length.min(remaining) - 1;
            let max_distance = WINDOW_MASK.min(pos);
            let max_length = MAX_MATCH.min(remaining);

            loop {
                if diff > max_distance {
                    break;
                }
                remaining_chain -= 1;
                if remaining_chain == 0 || slot == candidate {
                    break;
                }

                // A candidate is only worth scanning if it can beat the
                // current best, so probe the byte just past it first.
                if data[pos + length] == data[pos + length - diff] {
                    let mut new_length = 0;
                    while new_length < max_length
                        && data[pos + new_length] == data[pos + new_length - diff]
                    {
                        new_length += 1;
                    }

                    if new_length > length {
                        length = new_length;
                        distance = diff;
                        if new_length > nice_cap {
                            break;
                        }

                        // Resume from whichever position inside the matched
                        // prefix has the longest chain reach; its chain
                        // skips the most already-covered candidates.
                        let span = diff.min(new_length - 2);
                        let mut best_reach = 0;
                        for offset in 0..span {
                            let inner = (pos - diff + offset) & WINDOW_MASK;
                            let reach =
                                inner.wrapping_sub(usize::from(self.prev[inner])) & WINDOW_MASK;
                            if reach > best_reach {
                                best_reach = reach;
                                candidate = inner;
                            }
                        }
                    }
                }

                slot = candidate;
                candidate = usize::from(self.prev[slot]);
                diff += slot.wrapping_sub(candidate) & WINDOW_MASK;
            }
        }

        if distance == 0 { (0, 0) } else { (length, distance) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Insert every position up to `limit` and return the head slot seen
    /// when `limit` itself was inserted.
    fn fill(chains: &mut HashChains, data: &[u8], limit: usize) -> usize {
        let mut prev_head = 0;
        for pos in 0..=limit {
            let hash = chains.hash(data, pos);
            prev_head = chains.insert(hash, pos);
        }
        prev_head
    }

    #[test]
    fn test_hash_depends_on_three_bytes() {
        let chains = HashChains::new(15);
        let data = b"abcdabce";
        assert_eq!(chains.hash(data, 0), chains.hash(data, 4));
        assert_ne!(chains.hash(data, 1), chains.hash(data, 5));
    }

    #[test]
    fn test_finds_repeated_pattern() {
        let data = b"abcdefabcdefabcdef";
        let mut chains = HashChains::new(15);
        let prev_head = fill(&mut chains, data, 6);

        let (length, distance) = chains.find_match(data, 6, prev_head, data.len(), 258, 32);
        assert_eq!(distance, 6);
        assert_eq!(length, 12);
    }

    #[test]
    fn test_no_match_in_unique_data() {
        let data: Vec<u8> = (0..64u8).collect();
        let mut chains = HashChains::new(15);
        let prev_head = fill(&mut chains, &data, 40);

        let (length, distance) = chains.find_match(&data, 40, prev_head, data.len(), 258, 32);
        assert_eq!((length, distance), (0, 0));
    }

    #[test]
    fn test_prefers_longer_match() {
        // "abcd" at 0, "abcde" at 8, target at 16 matches 8 best.
        let data = b"abcdxxxxabcdeyyyabcdez";
        let mut chains = HashChains::new(15);
        let prev_head = fill(&mut chains, data, 16);

        let (length, distance) = chains.find_match(data, 16, prev_head, data.len(), 258, 64);
        assert_eq!(distance, 8);
        assert_eq!(length, 5);
    }

    #[test]
    fn test_nice_length_stops_search() {
        let data = vec![7u8; 600];
        let mut chains = HashChains::new(15);
        let prev_head = fill(&mut chains, &data, 300);

        let (length, distance) = chains.find_match(&data, 300, prev_head, data.len(), 8, 4096);
        assert!(distance > 0);
        assert!(length >= MIN_MATCH);
    }

    #[test]
    fn test_match_capped_at_max_match() {
        let data = vec![b'a'; 1024];
        let mut chains = HashChains::new(15);
        let prev_head = fill(&mut chains, &data, 400);

        let (length, _) = chains.find_match(&data, 400, prev_head, data.len(), 258, 4096);
        assert!(length <= MAX_MATCH);
    }
}
