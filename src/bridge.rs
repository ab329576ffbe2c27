//! Entry points the native engine calls for custom filter policies.
//!
//! Each entry point receives the registry id the adapter policy was created
//! with, copies the engine's buffers, runs the registered handler and hands
//! back freshly `malloc`ed memory that the engine owns.
//!
//! A panic must never unwind into the engine. Handler code therefore runs
//! under [`catch_unwind`]:
//!
//! - a failed `key_may_match` answers "may match", which keeps the
//!   no-false-negative guarantee;
//! - a failed `create_filter` or `name` aborts the process. There is no
//!   encoding the engine would accept as a harmless stand-in.
//!
//! An id with no registry entry is always fatal.

use crate::buffer;
use crate::error::{Error, Result};
use crate::registry::{FilterPolicyHandler, HandlerRegistry};
use libc::{c_char, c_int, c_uchar};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::abort;
use std::sync::Arc;

/// Runs a handler's `create_filter` under the boundary guard.
pub fn guarded_create_filter(
    registry: &HandlerRegistry,
    id: usize,
    keys: &[Vec<u8>],
) -> Result<Vec<u8>> {
    let handler = resolve(registry, id)?;
    catch_unwind(AssertUnwindSafe(|| handler.create_filter(keys)))
        .map_err(|payload| panicked(id, "create_filter", payload))
}

/// Runs a handler's `key_may_match` under the boundary guard.
pub fn guarded_key_may_match(
    registry: &HandlerRegistry,
    id: usize,
    key: &[u8],
    filter: &[u8],
) -> Result<bool> {
    let handler = resolve(registry, id)?;
    catch_unwind(AssertUnwindSafe(|| handler.key_may_match(key, filter)))
        .map_err(|payload| panicked(id, "key_may_match", payload))
}

/// Runs a handler's `name` under the boundary guard.
pub fn guarded_name(registry: &HandlerRegistry, id: usize) -> Result<String> {
    let handler = resolve(registry, id)?;
    catch_unwind(AssertUnwindSafe(|| handler.name().to_string()))
        .map_err(|payload| panicked(id, "name", payload))
}

fn resolve(registry: &HandlerRegistry, id: usize) -> Result<Arc<dyn FilterPolicyHandler>> {
    registry.lookup(id).ok_or(Error::UnknownHandler(id))
}

fn panicked(id: usize, operation: &'static str, payload: Box<dyn Any + Send>) -> Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };
    Error::HandlerPanicked {
        id,
        operation,
        message,
    }
}

fn fatal(err: Error) -> ! {
    log::error!("Unrecoverable filter policy failure: {}", err);
    abort()
}

/// Engine callback: build a filter for `num_keys` keys.
///
/// # Safety
///
/// `keys` and `key_lens` must point to `num_keys` valid entries and
/// `out_len` must be writable. The returned buffer belongs to the caller and
/// must be released with `free`.
#[no_mangle]
pub unsafe extern "C" fn filterpolicy_bridge_create_filter(
    id: usize,
    keys: *const *const c_char,
    key_lens: *const usize,
    num_keys: c_int,
    out_len: *mut usize,
) -> *mut c_char {
    let keys = buffer::copy_key_array(keys, key_lens, num_keys);

    match guarded_create_filter(HandlerRegistry::global(), id, &keys) {
        Ok(filter) => {
            let (ptr, len) = buffer::bytes_to_native(&filter);
            if !out_len.is_null() {
                *out_len = len;
            }
            ptr
        }
        Err(e) => fatal(e),
    }
}

/// Engine callback: test `key` against `filter`. Returns 1 for "may match".
///
/// # Safety
///
/// `key` and `filter` must be valid for reads of `key_len` and `filter_len`
/// bytes for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn filterpolicy_bridge_key_may_match(
    id: usize,
    key: *const c_char,
    key_len: usize,
    filter: *const c_char,
    filter_len: usize,
) -> c_uchar {
    let key = buffer::copy_bytes(key, key_len);
    let filter = buffer::copy_bytes(filter, filter_len);

    match guarded_key_may_match(HandlerRegistry::global(), id, &key, &filter) {
        Ok(matched) => buffer::bool_to_native(matched),
        Err(e @ Error::HandlerPanicked { .. }) => {
            log::warn!("{}; treating key as a possible match", e);
            buffer::NATIVE_TRUE
        }
        Err(e) => fatal(e),
    }
}

/// Engine callback: the policy name as a null-terminated string.
///
/// # Safety
///
/// The returned string belongs to the caller and must be released with
/// `free`.
#[no_mangle]
pub unsafe extern "C" fn filterpolicy_bridge_name(id: usize) -> *mut c_char {
    let name = match guarded_name(HandlerRegistry::global(), id) {
        Ok(name) => name,
        Err(e) => fatal(e),
    };
    match buffer::str_to_native(&name) {
        Ok(ptr) => ptr,
        Err(e) => fatal(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    /// Stores keys verbatim, separated by a length byte.
    struct ExactSet;

    impl FilterPolicyHandler for ExactSet {
        fn create_filter(&self, keys: &[Vec<u8>]) -> Vec<u8> {
            let mut out = Vec::new();
            for key in keys {
                out.push(key.len() as u8);
                out.extend_from_slice(key);
            }
            out
        }

        fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
            let mut rest = filter;
            while let Some((&len, tail)) = rest.split_first() {
                let (candidate, tail) = tail.split_at((len as usize).min(tail.len()));
                if candidate == key {
                    return true;
                }
                rest = tail;
            }
            false
        }

        fn name(&self) -> &str {
            "test_policy"
        }
    }

    struct Panicky;

    impl FilterPolicyHandler for Panicky {
        fn create_filter(&self, _keys: &[Vec<u8>]) -> Vec<u8> {
            panic!("create_filter exploded")
        }

        fn key_may_match(&self, _key: &[u8], _filter: &[u8]) -> bool {
            panic!("key_may_match exploded")
        }

        fn name(&self) -> &str {
            panic!("{} exploded", "name")
        }
    }

    #[test]
    fn test_guarded_calls() {
        let registry = HandlerRegistry::new();
        let id = registry.register(Arc::new(ExactSet));

        let keys = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let filter = guarded_create_filter(&registry, id, &keys).unwrap();

        assert!(guarded_key_may_match(&registry, id, b"a", &filter).unwrap());
        assert!(!guarded_key_may_match(&registry, id, b"z", &filter).unwrap());
        assert_eq!(guarded_name(&registry, id).unwrap(), "test_policy");
    }

    #[test]
    fn test_unknown_id() {
        let registry = HandlerRegistry::new();
        assert!(matches!(
            guarded_name(&registry, 99),
            Err(Error::UnknownHandler(99))
        ));
        assert!(matches!(
            guarded_key_may_match(&registry, 99, b"k", b"f"),
            Err(Error::UnknownHandler(99))
        ));
    }

    #[test]
    fn test_panics_are_caught() {
        let registry = HandlerRegistry::new();
        let id = registry.register(Arc::new(Panicky));

        match guarded_create_filter(&registry, id, &[]) {
            Err(Error::HandlerPanicked { operation, message, .. }) => {
                assert_eq!(operation, "create_filter");
                assert_eq!(message, "create_filter exploded");
            }
            other => panic!("expected HandlerPanicked, got {:?}", other),
        }

        match guarded_name(&registry, id) {
            Err(Error::HandlerPanicked { message, .. }) => assert_eq!(message, "name exploded"),
            other => panic!("expected HandlerPanicked, got {:?}", other),
        }

        assert!(matches!(
            guarded_key_may_match(&registry, id, b"k", b"f"),
            Err(Error::HandlerPanicked { .. })
        ));
    }

    #[test]
    fn test_key_may_match_panic_degrades_to_match() {
        let id = HandlerRegistry::global().register(Arc::new(Panicky));
        let matched = unsafe {
            filterpolicy_bridge_key_may_match(id, b"k".as_ptr() as *const c_char, 1, ptr::null(), 0)
        };
        assert_eq!(matched, buffer::NATIVE_TRUE);
    }

    #[test]
    fn test_extern_entry_points() {
        let id = HandlerRegistry::global().register(Arc::new(ExactSet));

        let keys: [&[u8]; 2] = [b"k1", b"k\0"];
        let ptrs: Vec<*const c_char> = keys.iter().map(|k| k.as_ptr() as *const c_char).collect();
        let lens: Vec<usize> = keys.iter().map(|k| k.len()).collect();
        let mut out_len = 0usize;

        unsafe {
            let raw = filterpolicy_bridge_create_filter(id, ptrs.as_ptr(), lens.as_ptr(), 2, &mut out_len);
            let filter = buffer::NativeBuffer::from_raw(raw, out_len);
            assert_eq!(filter.as_slice(), b"\x02k1\x02k\0");

            let hit = filterpolicy_bridge_key_may_match(
                id,
                keys[1].as_ptr() as *const c_char,
                keys[1].len(),
                filter.as_slice().as_ptr() as *const c_char,
                filter.len(),
            );
            assert_eq!(hit, buffer::NATIVE_TRUE);

            let name = filterpolicy_bridge_name(id);
            assert_eq!(buffer::native_to_string(name), "test_policy");
            buffer::free_native(name);
        }
    }
}
