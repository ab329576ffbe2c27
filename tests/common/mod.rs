// Handlers shared by the integration tests

#![allow(dead_code)]

use filterbridge::filter::BloomFilterPolicy;
use filterbridge::FilterPolicyHandler;

/// Bloom-style reference handler implemented on the Rust side.
pub struct RustBloom {
    inner: BloomFilterPolicy,
    name: String,
}

impl RustBloom {
    pub fn new(bits_per_key: usize) -> Self {
        Self {
            inner: BloomFilterPolicy::new(bits_per_key),
            name: "test_policy".to_string(),
        }
    }

    pub fn named(name: &str) -> Self {
        Self {
            inner: BloomFilterPolicy::new(10),
            name: name.to_string(),
        }
    }
}

impl FilterPolicyHandler for RustBloom {
    fn create_filter(&self, keys: &[Vec<u8>]) -> Vec<u8> {
        self.inner.create_filter(keys)
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        self.inner.key_may_match(key, filter)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Panics in every callback.
pub struct Exploding;

impl FilterPolicyHandler for Exploding {
    fn create_filter(&self, _keys: &[Vec<u8>]) -> Vec<u8> {
        panic!("create_filter failed")
    }

    fn key_may_match(&self, _key: &[u8], _filter: &[u8]) -> bool {
        panic!("key_may_match failed")
    }

    fn name(&self) -> &str {
        "exploding"
    }
}

pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}
