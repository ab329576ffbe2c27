//! # filterbridge - custom filter policies for a native storage engine
//!
//! A storage engine builds a small filter per block of keys during flushes
//! and compactions, and consults it on reads to skip blocks that cannot hold
//! the key. This crate lets that filter logic be written in Rust and called
//! by an engine on the other side of a C ABI.
//!
//! ## Architecture
//!
//! - **Buffer adapter** ([`buffer`]): copies engine buffers in, `malloc`s
//!   results out
//! - **Handler registry** ([`registry`]): maps integer ids to handlers, since
//!   a C callback can only carry an integer
//! - **Native policies** ([`native`]): the engine-side policy objects and
//!   their C constructors
//! - **Callback bridge** ([`bridge`]): the `extern "C"` entry points the
//!   engine calls, guarded against panics
//! - **Filter policy handle** ([`FilterPolicy`]): owns a native policy
//! - **Built-in Bloom filter** ([`filter`]): used directly by the engine,
//!   without the bridge
//!
//! ## Example Usage
//!
//! ```rust
//! use filterbridge::{FilterPolicy, FilterPolicyHandler};
//!
//! struct ExactMatch;
//!
//! impl FilterPolicyHandler for ExactMatch {
//!     fn create_filter(&self, keys: &[Vec<u8>]) -> Vec<u8> {
//!         keys.join(&0u8)
//!     }
//!
//!     fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
//!         filter.split(|b| *b == 0).any(|k| k == key)
//!     }
//!
//!     fn name(&self) -> &str {
//!         "example.ExactMatch"
//!     }
//! }
//!
//! # fn main() -> Result<(), filterbridge::Error> {
//! let policy = FilterPolicy::new_custom(ExactMatch);
//!
//! // The engine calls through the native policy at flush time...
//! let filter = policy.create_filter(&[b"k1".as_slice(), b"k2".as_slice()])?;
//! // ...and again on the read path.
//! assert!(policy.key_may_match(b"k1", &filter)?);
//! assert_eq!(policy.name()?, "example.ExactMatch");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod bridge;
pub mod buffer;
pub mod config;
pub mod error;
pub mod filter;
pub mod native;
pub mod policy;
pub mod registry;

// Re-exports
pub use config::Options;
pub use error::{Error, Result};
pub use policy::FilterPolicy;
pub use registry::{FilterPolicyHandler, HandlerRegistry};
