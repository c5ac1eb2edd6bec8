//! Checksums used by the DEFLATE container formats.
//!
//! - **CRC-32 (ISO 3309)**: gzip trailers, and (truncated to 16 bits) the
//!   optional gzip header CRC (RFC 1952)
//! - **Adler-32**: zlib trailers and dictionary identifiers (RFC 1950)
//!
//! Both are incremental: feed data in any number of `update` calls and read
//! the value at the end, which is what the streaming codec needs.

/// CRC-32 lookup table (polynomial 0xEDB88320, reflected).
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Largest number of bytes Adler-32 can sum before the deferred modulo
/// overflows a u32.
const ADLER_NMAX: usize = 5552;

/// Adler-32 modulus (largest prime below 65536).
const ADLER_MOD: u32 = 65521;

/// Incremental CRC-32 calculator (ISO 3309).
///
/// - Polynomial: 0x04C11DB7 (reflected: 0xEDB88320)
/// - Initial value: 0xFFFFFFFF, final XOR: 0xFFFFFFFF
/// - Reflected input and output
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self { state: 0xFFFFFFFF }
    }

    /// Feed data into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.state;
        for &byte in data {
            crc = CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.state = crc;
    }

    /// Current checksum value.
    pub fn value(&self) -> u32 {
        !self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the CRC-32 of a byte slice in one call.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(data);
    crc.value()
}

/// Incremental Adler-32 calculator (RFC 1950 Section 8.2).
#[derive(Debug, Clone)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new Adler-32 calculator.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Feed data into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        // Defer the modulo: NMAX is the longest run that cannot overflow.
        for chunk in data.chunks(ADLER_NMAX) {
            for &byte in chunk {
                a += u32::from(byte);
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }

        self.a = a;
        self.b = b;
    }

    /// Current checksum value.
    pub fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the Adler-32 of a byte slice in one call.
pub fn adler32(data: &[u8]) -> u32 {
    let mut adler = Adler32::new();
    adler.update(data);
    adler.value()
}

/// gzip header CRC-16: the low 16 bits of the CRC-32 over the header bytes
/// (RFC 1952 Section 2.3.1).
pub fn header_crc16(header: &[u8]) -> u16 {
    (crc32(header) & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_values() {
        // Standard check value
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
        assert_eq!(crc32(b""), 0);
        assert_eq!(crc32(b"The quick brown fox jumps over the lazy dog"), 0x414FA339);
    }

    #[test]
    fn test_crc32_incremental_matches_single_shot() {
        let data = b"hello, incremental checksum world";
        let mut crc = Crc32::new();
        crc.update(&data[..10]);
        crc.update(&data[10..]);
        assert_eq!(crc.value(), crc32(data));
    }

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"Wikipedia"), 0x11E60398);
    }

    #[test]
    fn test_adler32_long_input() {
        // Exercise the deferred modulo across NMAX boundaries.
        let data = vec![0xFFu8; ADLER_NMAX * 3 + 17];
        let mut adler = Adler32::new();
        adler.update(&data);
        let mut split = Adler32::new();
        split.update(&data[..ADLER_NMAX + 1]);
        split.update(&data[ADLER_NMAX + 1..]);
        assert_eq!(adler.value(), split.value());
    }

    #[test]
    fn test_header_crc16_is_low_half() {
        let header = [0x1F, 0x8B, 0x08, 0x02, 0, 0, 0, 0, 0, 3];
        assert_eq!(header_crc16(&header), (crc32(&header) & 0xFFFF) as u16);
    }
}
