//! Engine-consumable filter policy handles.

use crate::error::{Error, Result};
use crate::native::{self, NativeFilterPolicy};
use crate::registry::{FilterPolicyHandler, HandlerRegistry};
use libc::c_int;
use std::ptr;
use std::sync::Arc;

/// A filter policy the storage engine can be configured with.
///
/// The handle exclusively owns its native policy object. The engine only
/// borrows the raw pointer (see [`FilterPolicy::as_raw`]), so a policy must
/// outlive every engine it was given to: destroy it only after the engine
/// is closed.
///
/// # Example
///
/// ```
/// use filterbridge::FilterPolicy;
///
/// # fn main() -> Result<(), filterbridge::Error> {
/// let mut policy = FilterPolicy::new_bloom(10)?;
/// let filter = policy.create_filter(&[b"apple".as_slice(), b"pear".as_slice()])?;
/// assert!(policy.key_may_match(b"apple", &filter)?);
/// policy.destroy();
/// # Ok(())
/// # }
/// ```
pub struct FilterPolicy {
    native: *mut NativeFilterPolicy,
    id: Option<usize>,
}

// Safety: the native object is immutable after construction, and custom
// policies only reach the thread-safe global registry.
unsafe impl Send for FilterPolicy {}
unsafe impl Sync for FilterPolicy {}

impl FilterPolicy {
    /// Wraps a user handler.
    ///
    /// The handler is registered in the process-wide registry for good;
    /// destroying the policy later releases only the native object.
    pub fn new_custom<H>(handler: H) -> FilterPolicy
    where
        H: FilterPolicyHandler + 'static,
    {
        Self::from_handler(Arc::new(handler))
    }

    /// Same as [`FilterPolicy::new_custom`] for an already shared handler.
    pub fn from_handler(handler: Arc<dyn FilterPolicyHandler>) -> FilterPolicy {
        let id = HandlerRegistry::global().register(handler);
        FilterPolicy {
            native: native::filterpolicy_create_custom(id),
            id: Some(id),
        }
    }

    /// Returns the engine's built-in Bloom policy with roughly `bits_per_key`
    /// bits per key.
    ///
    /// A good value for `bits_per_key` is 10, which yields a filter with ~1%
    /// false positive rate.
    ///
    /// Note: if you are using a custom comparator that ignores some parts of
    /// the keys being compared, you must not use a Bloom policy and must
    /// provide your own handler that also ignores the corresponding parts of
    /// the keys. Otherwise lookups can produce false negatives.
    pub fn new_bloom(bits_per_key: i32) -> Result<FilterPolicy> {
        if bits_per_key <= 0 {
            return Err(Error::invalid_argument(format!(
                "bits_per_key must be > 0, got {}",
                bits_per_key
            )));
        }
        let native = native::filterpolicy_create_bloom(bits_per_key as c_int);
        if native.is_null() {
            return Err(Error::invalid_argument("native bloom filter policy was not created"));
        }
        Ok(FilterPolicy { native, id: None })
    }

    /// Takes ownership of an existing native policy.
    ///
    /// # Safety
    ///
    /// `native` must come from one of the `filterpolicy_create*` functions
    /// and must not be owned by anything else.
    pub unsafe fn from_raw(native: *mut NativeFilterPolicy) -> FilterPolicy {
        FilterPolicy { native, id: None }
    }

    /// The native pointer to hand to the engine. Null once destroyed.
    pub fn as_raw(&self) -> *mut NativeFilterPolicy {
        self.native
    }

    /// Registry id of a custom policy.
    pub fn registry_id(&self) -> Option<usize> {
        self.id
    }

    /// Returns true after [`FilterPolicy::destroy`].
    pub fn is_destroyed(&self) -> bool {
        self.native.is_null()
    }

    /// Releases the native policy. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.native.is_null() {
            return;
        }
        unsafe { native::filterpolicy_destroy(self.native) };
        self.native = ptr::null_mut();
        log::debug!("Destroyed filter policy (handler {:?})", self.id);
    }

    fn native_ref(&self) -> Result<&NativeFilterPolicy> {
        // Safety: non-null pointers are owned by this handle and alive.
        unsafe { self.native.as_ref() }.ok_or(Error::PolicyDestroyed)
    }

    /// Builds a filter through the native policy, as the engine does.
    pub fn create_filter(&self, keys: &[&[u8]]) -> Result<Vec<u8>> {
        Ok(self.native_ref()?.dispatch_create_filter(keys))
    }

    /// Tests `key` against `filter` through the native policy.
    pub fn key_may_match(&self, key: &[u8], filter: &[u8]) -> Result<bool> {
        Ok(self.native_ref()?.dispatch_key_may_match(key, filter))
    }

    /// Reads the policy name through the native policy.
    pub fn name(&self) -> Result<String> {
        Ok(self.native_ref()?.dispatch_name())
    }
}

impl Drop for FilterPolicy {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for FilterPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPolicy")
            .field("native", &self.native)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PrefixHandler;

    impl FilterPolicyHandler for PrefixHandler {
        // Filter is the set of first bytes of the keys.
        fn create_filter(&self, keys: &[Vec<u8>]) -> Vec<u8> {
            let mut firsts: Vec<u8> = keys.iter().filter_map(|k| k.first().copied()).collect();
            firsts.sort_unstable();
            firsts.dedup();
            firsts
        }

        fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
            match key.first() {
                Some(b) => filter.binary_search(b).is_ok(),
                None => true,
            }
        }

        fn name(&self) -> &str {
            "prefix"
        }
    }

    #[test]
    fn test_custom_policy_round_trip() {
        let policy = FilterPolicy::new_custom(PrefixHandler);
        assert!(policy.registry_id().is_some());

        let filter = policy.create_filter(&[b"apple".as_slice(), b"banana".as_slice()]).unwrap();
        assert_eq!(filter, b"ab");
        assert!(policy.key_may_match(b"avocado", &filter).unwrap());
        assert!(!policy.key_may_match(b"cherry", &filter).unwrap());
        assert_eq!(policy.name().unwrap(), "prefix");
    }

    #[test]
    fn test_bloom_policy_has_no_registry_id() {
        let policy = FilterPolicy::new_bloom(10).unwrap();
        assert!(policy.registry_id().is_none());
        assert!(!policy.as_raw().is_null());
    }

    #[test]
    fn test_bloom_policy_rejects_bad_bits() {
        assert!(matches!(FilterPolicy::new_bloom(0), Err(Error::InvalidArgument(_))));
        assert!(matches!(FilterPolicy::new_bloom(-1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_destroy_rejects_further_calls() {
        let mut policy = FilterPolicy::new_bloom(10).unwrap();
        policy.destroy();

        assert!(policy.is_destroyed());
        assert!(policy.as_raw().is_null());
        assert!(matches!(policy.name(), Err(Error::PolicyDestroyed)));
        assert!(matches!(policy.create_filter(&[]), Err(Error::PolicyDestroyed)));
        assert!(matches!(policy.key_may_match(b"k", b""), Err(Error::PolicyDestroyed)));

        // second destroy is a no-op
        policy.destroy();
    }

    #[test]
    fn test_from_raw_takes_ownership() {
        let raw = native::filterpolicy_create_bloom(8);
        let policy = unsafe { FilterPolicy::from_raw(raw) };
        assert_eq!(policy.as_raw(), raw);
        assert_eq!(policy.name().unwrap(), crate::filter::bloom::BLOOM_POLICY_NAME);
    }
}
