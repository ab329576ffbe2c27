//! Native filter policy objects, as seen from the engine's C API.
//!
//! A [`NativeFilterPolicy`] is either a callback table plus an opaque state
//! word, or the built-in Bloom policy. The engine holds it by raw pointer and
//! calls through it during flushes, compactions and reads. The `dispatch`
//! methods here are what the engine does internally when it needs a filter
//! built or probed.

use crate::bridge;
use crate::buffer::{self, NativeBuffer};
use crate::filter::BloomFilterPolicy;
use libc::{c_char, c_int, c_uchar};
use std::ptr;

/// Builds a filter over `num_keys` keys; writes the result length to
/// `out_len` and returns a `malloc`ed buffer the engine frees.
pub type CreateFilterFn = unsafe extern "C" fn(
    state: usize,
    keys: *const *const c_char,
    key_lens: *const usize,
    num_keys: c_int,
    out_len: *mut usize,
) -> *mut c_char;

/// Tests a key against a filter; nonzero means "may match".
pub type KeyMayMatchFn = unsafe extern "C" fn(
    state: usize,
    key: *const c_char,
    key_len: usize,
    filter: *const c_char,
    filter_len: usize,
) -> c_uchar;

/// Returns a `malloc`ed, null-terminated policy name the engine frees.
pub type NameFn = unsafe extern "C" fn(state: usize) -> *mut c_char;

/// Releases `state` when the policy is destroyed.
pub type DestructorFn = unsafe extern "C" fn(state: usize);

/// Callback table of a user-defined native policy.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FilterCallbacks {
    /// Filter construction.
    pub create_filter: CreateFilterFn,
    /// Membership test.
    pub key_may_match: KeyMayMatchFn,
    /// Policy name.
    pub name: NameFn,
    /// Optional state destructor.
    pub destructor: Option<DestructorFn>,
}

enum PolicyKind {
    Callback {
        state: usize,
        callbacks: FilterCallbacks,
    },
    Bloom(BloomFilterPolicy),
}

/// Opaque engine-side filter policy.
pub struct NativeFilterPolicy {
    kind: PolicyKind,
}

impl NativeFilterPolicy {
    /// Builds a filter over `keys`, the way the engine does when writing a
    /// filter block.
    pub fn dispatch_create_filter(&self, keys: &[&[u8]]) -> Vec<u8> {
        match &self.kind {
            PolicyKind::Bloom(bloom) => bloom.create_filter(keys),
            PolicyKind::Callback { state, callbacks } => {
                let ptrs: Vec<*const c_char> =
                    keys.iter().map(|k| k.as_ptr() as *const c_char).collect();
                let lens: Vec<usize> = keys.iter().map(|k| k.len()).collect();
                let mut out_len = 0usize;

                let raw = unsafe {
                    (callbacks.create_filter)(
                        *state,
                        ptrs.as_ptr(),
                        lens.as_ptr(),
                        keys.len() as c_int,
                        &mut out_len,
                    )
                };
                if raw.is_null() {
                    log::warn!("Filter callback returned no buffer, storing empty filter");
                    return Vec::new();
                }
                unsafe { NativeBuffer::from_raw(raw, out_len) }.to_vec()
            }
        }
    }

    /// Tests `key` against a stored filter, the way the engine does on the
    /// read path.
    pub fn dispatch_key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        match &self.kind {
            PolicyKind::Bloom(bloom) => bloom.key_may_match(key, filter),
            PolicyKind::Callback { state, callbacks } => {
                let matched = unsafe {
                    (callbacks.key_may_match)(
                        *state,
                        key.as_ptr() as *const c_char,
                        key.len(),
                        filter.as_ptr() as *const c_char,
                        filter.len(),
                    )
                };
                buffer::native_to_bool(matched)
            }
        }
    }

    /// Reads the policy name.
    pub fn dispatch_name(&self) -> String {
        match &self.kind {
            PolicyKind::Bloom(bloom) => bloom.name().to_string(),
            PolicyKind::Callback { state, callbacks } => unsafe {
                let raw = (callbacks.name)(*state);
                let name = buffer::native_to_string(raw);
                buffer::free_native(raw);
                name
            },
        }
    }

    /// Returns true for the built-in Bloom policy.
    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, PolicyKind::Bloom(_))
    }
}

impl Drop for NativeFilterPolicy {
    fn drop(&mut self) {
        if let PolicyKind::Callback { state, callbacks } = &self.kind {
            if let Some(destructor) = callbacks.destructor {
                unsafe { destructor(*state) };
            }
        }
    }
}

/// Creates a policy that calls back through `callbacks`, passing `state` as
/// the first argument of every call.
///
/// # Safety
///
/// Every callback must honor the contract documented on its type for as
/// long as the returned policy lives, from any thread.
pub unsafe extern "C" fn filterpolicy_create(
    state: usize,
    destructor: Option<DestructorFn>,
    create_filter: CreateFilterFn,
    key_may_match: KeyMayMatchFn,
    name: NameFn,
) -> *mut NativeFilterPolicy {
    let callbacks = FilterCallbacks {
        create_filter,
        key_may_match,
        name,
        destructor,
    };
    Box::into_raw(Box::new(NativeFilterPolicy {
        kind: PolicyKind::Callback { state, callbacks },
    }))
}

/// Creates an adapter policy whose callbacks go through the bridge with
/// `id` as the registry id.
pub extern "C" fn filterpolicy_create_custom(id: usize) -> *mut NativeFilterPolicy {
    log::debug!("Creating custom filter policy for handler {}", id);
    // Safety: the bridge entry points are valid for the whole process.
    unsafe {
        filterpolicy_create(
            id,
            None,
            bridge::filterpolicy_bridge_create_filter,
            bridge::filterpolicy_bridge_key_may_match,
            bridge::filterpolicy_bridge_name,
        )
    }
}

/// Creates the built-in Bloom policy. Returns null if `bits_per_key` is not
/// positive.
pub extern "C" fn filterpolicy_create_bloom(bits_per_key: c_int) -> *mut NativeFilterPolicy {
    if bits_per_key <= 0 {
        log::warn!("Rejecting bloom filter policy with {} bits per key", bits_per_key);
        return ptr::null_mut();
    }
    log::debug!("Creating bloom filter policy with {} bits per key", bits_per_key);
    Box::into_raw(Box::new(NativeFilterPolicy {
        kind: PolicyKind::Bloom(BloomFilterPolicy::new(bits_per_key as usize)),
    }))
}

/// Releases a policy. Null is ignored.
///
/// # Safety
///
/// `policy` must come from one of the `filterpolicy_create*` functions and
/// must not be used afterwards.
pub unsafe extern "C" fn filterpolicy_destroy(policy: *mut NativeFilterPolicy) {
    if !policy.is_null() {
        drop(Box::from_raw(policy));
    }
}
