//! Bloom Filter implementation.
//!
//! A space-efficient probabilistic data structure used to test whether an element
//! is a member of a set. False positive matches are possible, but false negatives are not.

use crate::error::{Error, Result};
use crate::filter::Filter;
use std::hash::Hasher;

/// Default bits per key for bloom filter
pub const DEFAULT_BITS_PER_KEY: usize = 10;

/// Upper bound on bits per key; denser filters gain nothing measurable.
pub const MAX_BITS_PER_KEY: usize = 100;

/// Name reported by the built-in policy.
pub const BLOOM_POLICY_NAME: &str = "filterbridge.BuiltinBloomFilter";

/// Header: num_hashes (4 bytes) + num_bits (8 bytes)
const HEADER_SIZE: usize = 12;

/// Trailing crc32 of header and bits
const CHECKSUM_SIZE: usize = 4;

/// BloomFilter provides probabilistic set membership testing.
///
/// # Example
/// ```
/// use filterbridge::filter::{BloomFilter, Filter};
///
/// let mut filter = BloomFilter::with_bits_per_key(100, 10);
/// filter.add(b"key1");
/// filter.add(b"key2");
///
/// assert!(filter.may_contain(b"key1"));
/// assert!(filter.may_contain(b"key2"));
/// // key3 might return true (false positive) or false
/// ```
#[derive(Debug, Clone)]
pub struct BloomFilter {
    /// Bit array for the bloom filter
    bits: Vec<u8>,
    /// Number of hash functions to use
    num_hashes: u32,
    /// Number of bits in the filter
    num_bits: usize,
}

impl BloomFilter {
    /// Create a BloomFilter with a specific number of bits per key.
    ///
    /// # Arguments
    /// * `num_keys` - Expected number of keys
    /// * `bits_per_key` - Number of bits to allocate per key (default: 10)
    pub fn with_bits_per_key(num_keys: usize, bits_per_key: usize) -> Self {
        let num_bits = num_keys.saturating_mul(bits_per_key).max(64);
        let num_hashes = Self::num_hashes_for(bits_per_key);

        Self::with_bits_and_hashes(num_bits, num_hashes)
    }

    /// Number of probes for a given density: k = bits_per_key * ln(2), in 1..=30.
    fn num_hashes_for(bits_per_key: usize) -> u32 {
        let k = ((bits_per_key as f64) * 0.69).round() as u32; // 0.69 ~= ln(2)
        k.clamp(1, 30)
    }

    /// Create a BloomFilter with specific bits and hash count.
    fn with_bits_and_hashes(num_bits: usize, num_hashes: u32) -> Self {
        let num_bytes = (num_bits + 7) / 8;

        Self {
            bits: vec![0u8; num_bytes],
            num_hashes,
            num_bits,
        }
    }

    /// Generate multiple hash values for a key using double hashing technique.
    ///
    /// hash_i = hash1 + i * hash2 (mod m)
    fn hash_values(&self, key: &[u8]) -> impl Iterator<Item = usize> + '_ {
        let hash1 = hash_with_seed(key, 0xbc9f1d34);
        let hash2 = hash_with_seed(key, 0xd0e89c7b);

        (0..self.num_hashes).map(move |i| {
            let hash = hash1.wrapping_add(i.wrapping_mul(hash2));
            (hash as usize) % self.num_bits
        })
    }

    /// Set a bit at the given position.
    fn set_bit(&mut self, pos: usize) {
        if pos < self.num_bits {
            self.bits[pos / 8] |= 1 << (pos % 8);
        }
    }

    /// Check if a bit is set at the given position.
    fn is_bit_set(&self, pos: usize) -> bool {
        if pos < self.num_bits {
            (self.bits[pos / 8] & (1 << (pos % 8))) != 0
        } else {
            false
        }
    }

    /// Get the size of the filter in bytes.
    pub fn size(&self) -> usize {
        self.bits.len()
    }

    /// Get the number of hash functions used.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Get the number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }
}

impl Filter for BloomFilter {
    fn may_contain(&self, key: &[u8]) -> bool {
        let mut hashes = self.hash_values(key);
        hashes.all(|hash| self.is_bit_set(hash))
    }

    fn add(&mut self, key: &[u8]) {
        let hashes: Vec<usize> = self.hash_values(key).collect();
        for hash in hashes {
            self.set_bit(hash);
        }
    }

    /// Encode the filter to bytes for storage.
    ///
    /// Format:
    /// [num_hashes: 4 bytes][num_bits: 8 bytes][bits: variable][crc32: 4 bytes]
    fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(HEADER_SIZE + self.bits.len() + CHECKSUM_SIZE);

        encoded.extend_from_slice(&self.num_hashes.to_le_bytes());
        encoded.extend_from_slice(&(self.num_bits as u64).to_le_bytes());
        encoded.extend_from_slice(&self.bits);

        let checksum = crc32fast::hash(&encoded);
        encoded.extend_from_slice(&checksum.to_le_bytes());

        encoded
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE + CHECKSUM_SIZE {
            return Err(Error::corruption("Bloom filter data too short"));
        }

        let (body, trailer) = data.split_at(data.len() - CHECKSUM_SIZE);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(Error::corruption(format!(
                "Bloom filter checksum mismatch: expected {:#x}, got {:#x}",
                expected, actual
            )));
        }

        let num_hashes = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let num_bits = u64::from_le_bytes([
            body[4], body[5], body[6], body[7],
            body[8], body[9], body[10], body[11],
        ]);

        if num_bits == 0 || num_hashes == 0 || num_hashes > 30 {
            return Err(Error::corruption("Bloom filter parameters out of range"));
        }

        // The bit array must hold exactly num_bits, rounded up to whole bytes.
        let bit_bytes = body.len() - HEADER_SIZE;
        let capacity = (bit_bytes as u64).checked_mul(8);
        match capacity {
            Some(cap) if num_bits <= cap && num_bits.div_ceil(8) == bit_bytes as u64 => {}
            _ => {
                return Err(Error::corruption(format!(
                    "Bloom filter size mismatch: {} bits in {} bytes",
                    num_bits, bit_bytes
                )))
            }
        }
        let num_bits = usize::try_from(num_bits)
            .map_err(|_| Error::corruption("Bloom filter too large for this platform"))?;

        Ok(Self {
            bits: body[HEADER_SIZE..].to_vec(),
            num_hashes,
            num_bits,
        })
    }
}

/// Whole-key-set Bloom policy: one filter per batch of keys.
///
/// This is the shape the engine needs from a filter policy, built on top of
/// [`BloomFilter`].
#[derive(Debug, Clone, Copy)]
pub struct BloomFilterPolicy {
    bits_per_key: usize,
}

impl BloomFilterPolicy {
    /// Create a policy; `bits_per_key` of 10 gives roughly a 1% false positive rate.
    ///
    /// Values are clamped to `1..=MAX_BITS_PER_KEY`.
    pub fn new(bits_per_key: usize) -> Self {
        Self {
            bits_per_key: bits_per_key.clamp(1, MAX_BITS_PER_KEY),
        }
    }

    /// Bits per key this policy was built with.
    pub fn bits_per_key(&self) -> usize {
        self.bits_per_key
    }

    /// Policy name.
    pub fn name(&self) -> &'static str {
        BLOOM_POLICY_NAME
    }

    /// Builds an encoded filter over `keys`.
    pub fn create_filter<K: AsRef<[u8]>>(&self, keys: &[K]) -> Vec<u8> {
        let mut filter = BloomFilter::with_bits_per_key(keys.len(), self.bits_per_key);
        for key in keys {
            filter.add(key.as_ref());
        }
        filter.encode()
    }

    /// Tests `key` against an encoded filter.
    ///
    /// A filter that fails to decode answers true: treating it as a miss
    /// could hide keys that are present.
    pub fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        match BloomFilter::decode(filter) {
            Ok(filter) => filter.may_contain(key),
            Err(e) => {
                log::warn!("Ignoring unreadable bloom filter: {}", e);
                true
            }
        }
    }
}

impl Default for BloomFilterPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BITS_PER_KEY)
    }
}

/// Hash with a specific seed (FNV-1a) over the raw key bytes, so encoded
/// filters are the same on every platform.
fn hash_with_seed(key: &[u8], seed: u32) -> u32 {
    let mut hasher = FnvHasher::new_with_seed(seed);
    hasher.write(key);
    hasher.finish() as u32
}

/// Simple FNV-1a hasher for Bloom Filter
struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    fn new_with_seed(seed: u32) -> Self {
        Self {
            state: Self::FNV_OFFSET_BASIS ^ (seed as u64),
        }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::FNV_PRIME);
        }
    }
}
