//! Filter configuration handed to the storage engine.

use crate::filter::bloom::DEFAULT_BITS_PER_KEY;
use crate::policy::FilterPolicy;
use serde::{Deserialize, Serialize};

/// Filter options for a column family or table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Build filters with the built-in Bloom policy.
    /// Default: true
    pub use_bloom_filter: bool,

    /// Bits per key for the built-in Bloom policy.
    /// Default: 10 (~1% false positive rate)
    pub bits_per_key: i32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            use_bloom_filter: true,
            bits_per_key: DEFAULT_BITS_PER_KEY as i32,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let opts: Options = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Sets whether to use the built-in Bloom policy.
    pub fn use_bloom_filter(mut self, value: bool) -> Self {
        self.use_bloom_filter = value;
        self
    }

    /// Sets the Bloom bits per key.
    pub fn bits_per_key(mut self, bits: i32) -> Self {
        self.bits_per_key = bits;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.use_bloom_filter && self.bits_per_key <= 0 {
            return Err(crate::Error::invalid_argument("bits_per_key must be > 0"));
        }
        Ok(())
    }

    /// Builds the configured Bloom policy, or `None` if Bloom filtering is
    /// turned off.
    pub fn bloom_policy(&self) -> crate::Result<Option<FilterPolicy>> {
        self.validate()?;
        if !self.use_bloom_filter {
            return Ok(None);
        }
        FilterPolicy::new_bloom(self.bits_per_key).map(Some)
    }
}
