//! The engine's built-in filter.
//!
//! This is the Bloom filter the native layer uses when a policy is created
//! with [`filterpolicy_create_bloom`](crate::native::filterpolicy_create_bloom).
//! It never goes through the handler registry or the callback bridge.

pub mod bloom;

pub use bloom::{BloomFilter, BloomFilterPolicy};

/// Filter trait for key existence checking
pub trait Filter {
    /// Check if a key may exist (can have false positives)
    fn may_contain(&self, key: &[u8]) -> bool;

    /// Add a key to the filter
    fn add(&mut self, key: &[u8]);

    /// Get the serialized representation of the filter
    fn encode(&self) -> Vec<u8>;

    /// Create a filter from serialized data
    fn decode(data: &[u8]) -> crate::Result<Self>
    where
        Self: Sized;
}
