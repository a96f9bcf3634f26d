/*
 * Streaming checksum accumulators for the envelope trailers: CRC-32 for
 * gzip, Adler-32 for zlib.
 */

use crc32fast::Hasher as Crc32Hasher;
use simd_adler32::Adler32 as SimdAdler32;

#[derive(Clone)]
pub struct Adler32 {
    inner: SimdAdler32,
}

impl Adler32 {
    pub fn new() -> Self {
        Self {
            inner: SimdAdler32::new(),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.inner.write(bytes);
    }

    pub fn finish(&self) -> u32 {
        self.inner.finish()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct Crc32 {
    inner: Crc32Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self {
            inner: Crc32Hasher::new(),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finish(&self) -> u32 {
        self.inner.clone().finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adler32_of_empty_input_is_one() {
        let a = Adler32::new();
        assert_eq!(a.finish(), 1);
    }

    #[test]
    fn adler32_matches_known_vector() {
        // Adler-32("Wikipedia") = 0x11E60398, a commonly cited test vector.
        let mut a = Adler32::new();
        a.write(b"Wikipedia");
        assert_eq!(a.finish(), 0x11E6_0398);
    }

    #[test]
    fn crc32_of_empty_input_is_zero() {
        let c = Crc32::new();
        assert_eq!(c.finish(), 0);
    }

    #[test]
    fn crc32_matches_known_vector() {
        // CRC-32("123456789") = 0xCBF43926, the standard check value.
        let mut c = Crc32::new();
        c.write(b"123456789");
        assert_eq!(c.finish(), 0xCBF4_3926);
    }
}
