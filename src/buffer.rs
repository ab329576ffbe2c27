//! Conversions between raw native buffers and owned Rust values.
//!
//! Everything coming *in* from the engine is copied, since engine memory is
//! only valid for the duration of a callback. Everything going *out* is
//! allocated with the C allocator so the engine can release it with `free`.

use crate::error::{Error, Result};
use libc::{c_char, c_int, c_uchar, c_void};
use std::alloc::{handle_alloc_error, Layout};
use std::ffi::CStr;
use std::ptr;
use std::slice;

/// Native truth value for `true`.
pub const NATIVE_TRUE: c_uchar = 1;

/// Native truth value for `false`.
pub const NATIVE_FALSE: c_uchar = 0;

/// A byte buffer allocated with `malloc`.
///
/// Dropping the buffer frees it. Use [`NativeBuffer::into_raw`] to hand
/// ownership to native code instead.
#[derive(Debug)]
pub struct NativeBuffer {
    ptr: *mut u8,
    len: usize,
}

impl NativeBuffer {
    /// Allocates a native buffer holding a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        // malloc(0) may return null; always ask for at least one byte so the
        // engine never sees null for an empty filter.
        let ptr = unsafe { libc::malloc(data.len().max(1)) as *mut u8 };
        if ptr.is_null() {
            handle_alloc_error(Layout::array::<u8>(data.len().max(1)).unwrap_or(Layout::new::<u8>()));
        }
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len()) };
        NativeBuffer { ptr, len: data.len() }
    }

    /// Takes ownership of a `malloc`ed buffer of `len` bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must come from the C allocator and hold at least `len`
    /// initialized bytes. Nobody else may free it.
    pub unsafe fn from_raw(ptr: *mut c_char, len: usize) -> Self {
        NativeBuffer { ptr: ptr as *mut u8, len }
    }

    /// Releases ownership, returning the raw pointer.
    pub fn into_raw(self) -> *mut c_char {
        let ptr = self.ptr as *mut c_char;
        std::mem::forget(self);
        ptr
    }

    /// Returns the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        if self.ptr.is_null() || self.len == 0 {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Copies the buffer contents into a `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { libc::free(self.ptr as *mut c_void) };
        }
    }
}

/// Copies `len` bytes at `ptr` into an owned vector.
///
/// A null pointer is read as an empty buffer.
///
/// # Safety
///
/// When non-null, `ptr` must be valid for reads of `len` bytes.
pub unsafe fn copy_bytes(ptr: *const c_char, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    slice::from_raw_parts(ptr as *const u8, len).to_vec()
}

/// Copies a native array of `(pointer, length)` pairs into owned keys,
/// preserving order and duplicates.
///
/// # Safety
///
/// `keys` and `key_lens` must each point to `num_keys` elements, and every
/// key pointer must satisfy the contract of [`copy_bytes`].
pub unsafe fn copy_key_array(
    keys: *const *const c_char,
    key_lens: *const usize,
    num_keys: c_int,
) -> Vec<Vec<u8>> {
    if keys.is_null() || key_lens.is_null() || num_keys <= 0 {
        return Vec::new();
    }
    let n = num_keys as usize;
    let keys = slice::from_raw_parts(keys, n);
    let lens = slice::from_raw_parts(key_lens, n);
    keys.iter()
        .zip(lens)
        .map(|(&key, &len)| copy_bytes(key, len))
        .collect()
}

/// Allocates a native copy of `data` and returns it with its length.
/// The caller (the engine) owns the returned pointer.
pub fn bytes_to_native(data: &[u8]) -> (*mut c_char, usize) {
    let buf = NativeBuffer::from_slice(data);
    let len = buf.len();
    (buf.into_raw(), len)
}

/// Allocates a null-terminated native copy of `s`.
///
/// Fails if `s` contains an interior NUL, which would silently truncate
/// the string on the native side.
pub fn str_to_native(s: &str) -> Result<*mut c_char> {
    if s.as_bytes().contains(&0) {
        return Err(Error::InvalidName(s.escape_default().to_string()));
    }
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    Ok(NativeBuffer::from_slice(&bytes).into_raw())
}

/// Reads a null-terminated native string. Invalid UTF-8 is replaced.
///
/// # Safety
///
/// `ptr` must be null or point to a valid null-terminated string.
pub unsafe fn native_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Encodes a boolean in the engine's truth representation.
pub fn bool_to_native(value: bool) -> c_uchar {
    if value {
        NATIVE_TRUE
    } else {
        NATIVE_FALSE
    }
}

/// Decodes the engine's truth representation (nonzero is true).
pub fn native_to_bool(value: c_uchar) -> bool {
    value != NATIVE_FALSE
}

/// Frees memory previously handed out by this module.
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by [`bytes_to_native`],
/// [`str_to_native`] or [`NativeBuffer::into_raw`], not yet freed.
pub unsafe fn free_native(ptr: *mut c_char) {
    if !ptr.is_null() {
        libc::free(ptr as *mut c_void);
    }
}
