//! C FFI bridge for the native hook → Rust resolver pipeline.
//!
//! The native side installs a metadata callback with [`rust_spoof_init`]
//! (typically a thin JNI shim over `PackageManager.getApplicationInfo`), then
//! routes every identity check through the `rust_spoof_*` functions.
//!
//! Unlike the Rust API, these functions never report an error: whenever no
//! spoof applies, or anything fails, the caller gets its own input back.
//!
//! # Safety
//!
//! All functions in this module use `unsafe` only at the FFI boundary to convert
//! between C pointers and Rust slices. The inner logic is entirely safe Rust.

use std::panic;
use std::ptr;
use std::sync::{Arc, PoisonError, RwLock};

use log::warn;

use crate::error::{RegistryError, SpoofError};
use crate::keys::SpoofKeys;
use crate::registry::{Metadata, PackageRegistry};
use crate::resolver::SpoofResolver;

/// Callback wrote the value into `out`.
pub const STATUS_OK: i32 = 0;
/// Package exists but does not declare the key.
pub const STATUS_ABSENT: i32 = 1;
/// Package is not installed.
pub const STATUS_NOT_FOUND: i32 = 2;

/// `rust_spoof_init` results.
pub const INIT_OK: i32 = 0;
pub const INIT_INVALID_NAMESPACE: i32 = -1;
pub const INIT_NO_CALLBACK: i32 = -2;
pub const INIT_PANIC: i32 = -3;

/// Reads one metadata value of one package.
///
/// On [`STATUS_OK`] the callee stores a buffer obtained from
/// [`rust_alloc_buffer`] in `out`; ownership passes back to Rust. Any status
/// other than the `STATUS_*` constants means the registry is unavailable.
pub type MetadataCallback = unsafe extern "C" fn(
    pkg_ptr: *const u8,
    pkg_len: usize,
    key_ptr: *const u8,
    key_len: usize,
    out: *mut RustBuffer,
) -> i32;

/// Process-wide resolver; a C caller has nowhere else to keep one.
///
/// Lookups clone the `Arc` out and release the lock before the callback runs,
/// so a callback may re-enter `rust_spoof_*` (including init/reset).
static RESOLVER: RwLock<Option<Arc<SpoofResolver<CallbackRegistry>>>> = RwLock::new(None);

/// Validate pointer and length for slice creation.
///
/// Ensures that:
/// 1. `ptr` is not null (unless `len` is 0).
/// 2. `ptr` is properly aligned for `T`.
/// 3. `len` * `size_of::<T>()` does not overflow `isize::MAX`.
///
/// Returns `None` if validation fails, or `Some(slice)` if successful.
unsafe fn validate_slice_args<'a, T>(ptr: *const T, len: usize) -> Option<&'a [T]> {
    if len == 0 {
        return Some(&[]);
    }
    if ptr.is_null() {
        return None;
    }
    #[allow(clippy::manual_is_multiple_of)]
    if (ptr as usize) % std::mem::align_of::<T>() != 0 {
        return None;
    }
    let size_of_t = std::mem::size_of::<T>();
    if size_of_t > 0 {
        let size = len.checked_mul(size_of_t)?;
        if size > isize::MAX as usize {
            return None;
        }
    }
    Some(std::slice::from_raw_parts(ptr, len))
}

/// Validate a pointer/length pair as UTF-8 text.
unsafe fn validate_str_args<'a>(ptr: *const u8, len: usize) -> Option<&'a str> {
    let bytes = unsafe { validate_slice_args(ptr, len) }?;
    std::str::from_utf8(bytes).ok()
}

/// Buffer exchanged with C/C++ callers.
/// Buffers returned by Rust must be freed with `rust_free_buffer`.
#[repr(C)]
pub struct RustBuffer {
    pub data: *mut u8,
    pub len: usize,
}

impl RustBuffer {
    fn from_vec(v: Vec<u8>) -> Self {
        let mut boxed = v.into_boxed_slice();
        let data = boxed.as_mut_ptr();
        let len = boxed.len();
        std::mem::forget(boxed);
        RustBuffer { data, len }
    }

    fn empty() -> Self {
        RustBuffer {
            data: ptr::null_mut(),
            len: 0,
        }
    }

    /// Take back ownership of a buffer handed out by `from_vec`.
    ///
    /// # Safety
    /// The buffer must come from `from_vec` and not have been reclaimed before.
    unsafe fn into_vec(self) -> Vec<u8> {
        if self.data.is_null() || self.len == 0 {
            return Vec::new();
        }
        let boxed = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(self.data, self.len)) };
        boxed.into_vec()
    }
}

/// Registry that asks the native side for each configured key.
struct CallbackRegistry {
    callback: MetadataCallback,
    keys: [String; 2],
}

impl PackageRegistry for CallbackRegistry {
    fn metadata(&self, package: &str) -> Result<Option<Metadata>, RegistryError> {
        let mut bundle = Metadata::new();
        for key in &self.keys {
            let mut out = RustBuffer::empty();
            let status = unsafe {
                (self.callback)(package.as_ptr(), package.len(), key.as_ptr(), key.len(), &mut out)
            };
            // Reclaim whatever the callback stored, whatever it returned.
            let bytes = unsafe { out.into_vec() };
            match status {
                STATUS_OK => match String::from_utf8(bytes) {
                    Ok(value) => {
                        bundle.insert(key.clone(), value);
                    }
                    Err(_) => {
                        warn!("Ignoring non UTF-8 value of {} declared by {}", key, package)
                    }
                },
                STATUS_ABSENT => {}
                STATUS_NOT_FOUND => return Err(RegistryError::NotFound(package.to_string())),
                other => {
                    return Err(RegistryError::Unavailable(format!(
                        "metadata callback returned {}",
                        other
                    )))
                }
            }
        }
        Ok(if bundle.is_empty() { None } else { Some(bundle) })
    }
}

/// Run `f` against the installed resolver.
///
/// Returns `None` when no resolver is installed or `f` fails; failures are
/// logged here since the C caller only ever sees a value.
fn with_resolver<T>(
    f: impl FnOnce(&SpoofResolver<CallbackRegistry>) -> Result<Option<T>, SpoofError>,
) -> Option<T> {
    let resolver = RESOLVER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(Arc::clone)?;
    match f(&resolver) {
        Ok(value) => value,
        Err(e) => {
            warn!("Spoof lookup failed, keeping real identity: {}", e);
            None
        }
    }
}

/// Allocate a zeroed buffer of `len` bytes for a callback to fill.
#[no_mangle]
pub extern "C" fn rust_alloc_buffer(len: usize) -> RustBuffer {
    panic::catch_unwind(|| RustBuffer::from_vec(vec![0u8; len]))
        .unwrap_or_else(|_| RustBuffer::empty())
}

/// Free a buffer previously returned by a Rust FFI function.
///
/// # Safety
/// `buf.data` must have been allocated by Rust (returned from a `rust_*` function)
/// and must not have been freed already.
#[no_mangle]
pub unsafe extern "C" fn rust_free_buffer(buf: RustBuffer) {
    if !buf.data.is_null() && buf.len > 0 {
        let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| unsafe {
            let _ = Box::from_raw(ptr::slice_from_raw_parts_mut(buf.data, buf.len));
        }));
    }
}

/// Install the process-wide resolver.
///
/// `ns_ptr`/`ns_len` name the metadata key namespace; pass null/0 for the
/// default. Re-initializing replaces the resolver and drops its cache.
///
/// # Safety
/// `ns_ptr` must point to `ns_len` valid bytes, or be null if `ns_len` is 0.
#[no_mangle]
pub unsafe extern "C" fn rust_spoof_init(
    ns_ptr: *const u8,
    ns_len: usize,
    callback: Option<MetadataCallback>,
) -> i32 {
    panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let callback = match callback {
            Some(cb) => cb,
            None => return INIT_NO_CALLBACK,
        };
        let keys = if ns_len == 0 {
            SpoofKeys::default()
        } else {
            let parsed = unsafe { validate_str_args(ns_ptr, ns_len) }
                .ok_or_else(|| SpoofError::InvalidNamespace(String::new()))
                .and_then(SpoofKeys::for_namespace);
            match parsed {
                Ok(keys) => keys,
                Err(e) => {
                    warn!("Refusing to install spoof resolver: {}", e);
                    return INIT_INVALID_NAMESPACE;
                }
            }
        };
        let registry = CallbackRegistry {
            callback,
            keys: [keys.package_name.clone(), keys.signature.clone()],
        };
        let mut guard = RESOLVER.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::new(SpoofResolver::with_keys(registry, keys)));
        INIT_OK
    }))
    .unwrap_or(INIT_PANIC)
}

/// Drop the process-wide resolver and its cache.
#[no_mangle]
pub extern "C" fn rust_spoof_reset() {
    let _ = panic::catch_unwind(|| {
        let mut guard = RESOLVER.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    });
}

/// Spoof a package name.
///
/// Returns the spoofed name, or a copy of the input. A null/empty input
/// yields an empty buffer.
///
/// # Safety
/// `name_ptr` must point to `name_len` valid bytes, or be null if `name_len` is 0.
#[no_mangle]
pub unsafe extern "C" fn rust_spoof_package_name(
    name_ptr: *const u8,
    name_len: usize,
) -> RustBuffer {
    panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let raw = match unsafe { validate_slice_args(name_ptr, name_len) } {
            Some(b) if !b.is_empty() => b,
            _ => return RustBuffer::empty(),
        };
        let spoofed = std::str::from_utf8(raw)
            .ok()
            .and_then(|name| with_resolver(|r| r.spoof_package_name(Some(name))));
        match spoofed {
            Some(name) => RustBuffer::from_vec(name.into_bytes()),
            None => RustBuffer::from_vec(raw.to_vec()),
        }
    }))
    .unwrap_or_else(|_| RustBuffer::empty())
}

/// Spoof the hex-encoded signature of a package.
///
/// # Safety
/// Both pointers must be valid for their stated lengths, or null if the length is 0.
#[no_mangle]
pub unsafe extern "C" fn rust_spoof_signature_hex(
    pkg_ptr: *const u8,
    pkg_len: usize,
    sig_ptr: *const u8,
    sig_len: usize,
) -> RustBuffer {
    panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let real = unsafe { validate_slice_args(sig_ptr, sig_len) }.unwrap_or(&[]);
        let spoofed = unsafe { validate_str_args(pkg_ptr, pkg_len) }
            .and_then(|pkg| with_resolver(|r| r.spoof_signature_hex(pkg, None)));
        match spoofed {
            Some(sig) => RustBuffer::from_vec(sig.into_bytes()),
            None if real.is_empty() => RustBuffer::empty(),
            None => RustBuffer::from_vec(real.to_vec()),
        }
    }))
    .unwrap_or_else(|_| RustBuffer::empty())
}

/// Spoof the raw signature bytes of a package.
///
/// A malformed spoofed signature is logged and the real bytes are returned.
///
/// # Safety
/// Both pointers must be valid for their stated lengths, or null if the length is 0.
#[no_mangle]
pub unsafe extern "C" fn rust_spoof_signature_bytes(
    pkg_ptr: *const u8,
    pkg_len: usize,
    sig_ptr: *const u8,
    sig_len: usize,
) -> RustBuffer {
    panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let real = unsafe { validate_slice_args(sig_ptr, sig_len) }.unwrap_or(&[]);
        let spoofed = unsafe { validate_str_args(pkg_ptr, pkg_len) }
            .and_then(|pkg| with_resolver(|r| r.spoof_signature_bytes(pkg, None)));
        match spoofed {
            Some(sig) => RustBuffer::from_vec(sig),
            None if real.is_empty() => RustBuffer::empty(),
            None => RustBuffer::from_vec(real.to_vec()),
        }
    }))
    .unwrap_or_else(|_| RustBuffer::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const APP: &[u8] = b"com.example.client";
    const GMS: &[u8] = b"com.google.android.gms";

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn fake_package_manager(
        pkg_ptr: *const u8,
        pkg_len: usize,
        key_ptr: *const u8,
        key_len: usize,
        out: *mut RustBuffer,
    ) -> i32 {
        CALLS.fetch_add(1, Ordering::SeqCst);
        let pkg = unsafe { std::slice::from_raw_parts(pkg_ptr, pkg_len) };
        let key = unsafe { std::slice::from_raw_parts(key_ptr, key_len) };
        let value: &[u8] = match (pkg, key) {
            (b"com.missing", _) => return STATUS_NOT_FOUND,
            (b"com.broken", _) => return 7,
            (b"com.example.client", b"org.microg.gms.SPOOFED_PACKAGE_NAME") => GMS,
            (b"com.example.client", b"org.microg.gms.SPOOFED_PACKAGE_SIGNATURE") => b"1a2b",
            (b"com.bad.sig", b"org.microg.gms.SPOOFED_PACKAGE_SIGNATURE") => b"xyz",
            (b"com.custom", b"app.custom.SPOOFED_PACKAGE_NAME") => b"com.custom.spoofed",
            (b"com.bad.utf8", b"org.microg.gms.SPOOFED_PACKAGE_NAME") => b"com.\xff\xfe",
            (b"com.stray.buffer", _) => {
                // Fills `out` but reports the key as absent.
                unsafe { *out = RustBuffer::from_vec(b"stray".to_vec()) };
                return STATUS_ABSENT;
            }
            _ => return STATUS_ABSENT,
        };
        let buf = rust_alloc_buffer(value.len());
        unsafe {
            ptr::copy_nonoverlapping(value.as_ptr(), buf.data, value.len());
            *out = buf;
        }
        STATUS_OK
    }

    fn take(buf: RustBuffer) -> Vec<u8> {
        unsafe { buf.into_vec() }
    }

    /// Package manager shim that tears the resolver down from inside a lookup.
    unsafe extern "C" fn resetting_package_manager(
        _pkg_ptr: *const u8,
        _pkg_len: usize,
        _key_ptr: *const u8,
        _key_len: usize,
        _out: *mut RustBuffer,
    ) -> i32 {
        CALLS.fetch_add(1, Ordering::SeqCst);
        rust_spoof_reset();
        STATUS_ABSENT
    }

    /// Package manager shim that asks for a spoofed name while a lookup is in flight.
    unsafe extern "C" fn nested_package_manager(
        _pkg_ptr: *const u8,
        _pkg_len: usize,
        _key_ptr: *const u8,
        _key_len: usize,
        _out: *mut RustBuffer,
    ) -> i32 {
        if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
            let other = b"com.nested";
            unsafe {
                let buf = rust_spoof_package_name(other.as_ptr(), other.len());
                rust_free_buffer(buf);
            }
        }
        STATUS_ABSENT
    }

    /// Run `f` on a worker thread, failing instead of hanging if it never returns.
    fn within_timeout<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(f());
        });
        rx.recv_timeout(std::time::Duration::from_secs(5))
            .expect("FFI call did not return")
    }

    fn init_default() {
        rust_spoof_reset();
        CALLS.store(0, Ordering::SeqCst);
        let rc = unsafe { rust_spoof_init(ptr::null(), 0, Some(fake_package_manager)) };
        assert_eq!(rc, INIT_OK);
    }

    #[test]
    #[serial]
    fn test_ffi_package_name_spoofed_and_cached() {
        init_default();
        let buf = unsafe { rust_spoof_package_name(APP.as_ptr(), APP.len()) };
        assert_eq!(take(buf), GMS);
        let after_first = CALLS.load(Ordering::SeqCst);
        assert!(after_first > 0);

        let buf = unsafe { rust_spoof_package_name(APP.as_ptr(), APP.len()) };
        assert_eq!(take(buf), GMS);
        assert_eq!(CALLS.load(Ordering::SeqCst), after_first);
    }

    #[test]
    #[serial]
    fn test_ffi_package_name_passthrough() {
        init_default();
        let other = b"com.unrelated";
        let buf = unsafe { rust_spoof_package_name(other.as_ptr(), other.len()) };
        assert_eq!(take(buf), other);

        let missing = b"com.missing";
        let buf = unsafe { rust_spoof_package_name(missing.as_ptr(), missing.len()) };
        assert_eq!(take(buf), missing);

        let broken = b"com.broken";
        let buf = unsafe { rust_spoof_package_name(broken.as_ptr(), broken.len()) };
        assert_eq!(take(buf), broken);
    }

    #[test]
    #[serial]
    fn test_ffi_package_name_null() {
        init_default();
        let buf = unsafe { rust_spoof_package_name(ptr::null(), 0) };
        assert!(buf.data.is_null());
        assert_eq!(buf.len, 0);
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[serial]
    fn test_ffi_without_resolver_returns_input() {
        rust_spoof_reset();
        let buf = unsafe { rust_spoof_package_name(APP.as_ptr(), APP.len()) };
        assert_eq!(take(buf), APP);
    }

    #[test]
    #[serial]
    fn test_ffi_signature_hex() {
        init_default();
        let real = b"deadbeef";
        let buf = unsafe {
            rust_spoof_signature_hex(APP.as_ptr(), APP.len(), real.as_ptr(), real.len())
        };
        assert_eq!(take(buf), b"1a2b");

        let other = b"com.unrelated";
        let buf = unsafe {
            rust_spoof_signature_hex(other.as_ptr(), other.len(), real.as_ptr(), real.len())
        };
        assert_eq!(take(buf), real);
    }

    #[test]
    #[serial]
    fn test_ffi_signature_bytes() {
        init_default();
        let real = [0xFFu8, 0xEE];
        let buf = unsafe {
            rust_spoof_signature_bytes(APP.as_ptr(), APP.len(), real.as_ptr(), real.len())
        };
        assert_eq!(take(buf), vec![0x1A, 0x2B]);
    }

    #[test]
    #[serial]
    fn test_ffi_malformed_signature_falls_back() {
        init_default();
        let pkg = b"com.bad.sig";
        let real = [0x01u8, 0x02, 0x03];
        let buf = unsafe {
            rust_spoof_signature_bytes(pkg.as_ptr(), pkg.len(), real.as_ptr(), real.len())
        };
        assert_eq!(take(buf), real);
    }

    #[test]
    #[serial]
    fn test_ffi_custom_namespace() {
        rust_spoof_reset();
        let ns = b"app.custom";
        let rc = unsafe { rust_spoof_init(ns.as_ptr(), ns.len(), Some(fake_package_manager)) };
        assert_eq!(rc, INIT_OK);
        let pkg = b"com.custom";
        let buf = unsafe { rust_spoof_package_name(pkg.as_ptr(), pkg.len()) };
        assert_eq!(take(buf), b"com.custom.spoofed");
    }

    #[test]
    #[serial]
    fn test_ffi_init_rejects_bad_input() {
        let blank = b"  ";
        let rc =
            unsafe { rust_spoof_init(blank.as_ptr(), blank.len(), Some(fake_package_manager)) };
        assert_eq!(rc, INIT_INVALID_NAMESPACE);

        let invalid_utf8 = [0xFFu8, 0xFE];
        let rc = unsafe {
            rust_spoof_init(invalid_utf8.as_ptr(), invalid_utf8.len(), Some(fake_package_manager))
        };
        assert_eq!(rc, INIT_INVALID_NAMESPACE);

        let rc = unsafe { rust_spoof_init(ptr::null(), 0, None) };
        assert_eq!(rc, INIT_NO_CALLBACK);
    }

    #[test]
    #[serial]
    fn test_ffi_callback_may_reset_resolver() {
        rust_spoof_reset();
        CALLS.store(0, Ordering::SeqCst);
        let rc = unsafe { rust_spoof_init(ptr::null(), 0, Some(resetting_package_manager)) };
        assert_eq!(rc, INIT_OK);

        let name = within_timeout(|| {
            let buf = unsafe { rust_spoof_package_name(APP.as_ptr(), APP.len()) };
            take(buf)
        });
        assert_eq!(name, APP);
        assert!(CALLS.load(Ordering::SeqCst) > 0);

        // The resolver is gone; later calls pass through without a callback.
        let calls = CALLS.load(Ordering::SeqCst);
        let buf = unsafe { rust_spoof_package_name(APP.as_ptr(), APP.len()) };
        assert_eq!(take(buf), APP);
        assert_eq!(CALLS.load(Ordering::SeqCst), calls);
    }

    #[test]
    #[serial]
    fn test_ffi_callback_may_reenter_lookup() {
        rust_spoof_reset();
        CALLS.store(0, Ordering::SeqCst);
        let rc = unsafe { rust_spoof_init(ptr::null(), 0, Some(nested_package_manager)) };
        assert_eq!(rc, INIT_OK);

        let name = within_timeout(|| {
            let buf = unsafe { rust_spoof_package_name(APP.as_ptr(), APP.len()) };
            take(buf)
        });
        assert_eq!(name, APP);
        rust_spoof_reset();
    }

    #[test]
    #[serial]
    fn test_ffi_non_utf8_value_is_ignored() {
        init_default();
        let pkg = b"com.bad.utf8";
        let buf = unsafe { rust_spoof_package_name(pkg.as_ptr(), pkg.len()) };
        assert_eq!(take(buf), pkg);

        // Nothing was cached, so the package is asked again.
        let calls = CALLS.load(Ordering::SeqCst);
        let buf = unsafe { rust_spoof_package_name(pkg.as_ptr(), pkg.len()) };
        assert_eq!(take(buf), pkg);
        assert!(CALLS.load(Ordering::SeqCst) > calls);
    }

    #[test]
    #[serial]
    fn test_ffi_buffer_filled_on_absent_is_discarded() {
        init_default();
        let pkg = b"com.stray.buffer";
        let buf = unsafe { rust_spoof_package_name(pkg.as_ptr(), pkg.len()) };
        assert_eq!(take(buf), pkg);

        let real = [0x0Au8];
        let buf = unsafe {
            rust_spoof_signature_bytes(pkg.as_ptr(), pkg.len(), real.as_ptr(), real.len())
        };
        assert_eq!(take(buf), real);
    }

    #[test]
    fn test_ffi_init_statuses_are_distinct() {
        let statuses = [INIT_OK, INIT_INVALID_NAMESPACE, INIT_NO_CALLBACK, INIT_PANIC];
        for (i, a) in statuses.iter().enumerate() {
            for b in &statuses[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_ffi_alloc_and_free() {
        let buf = rust_alloc_buffer(16);
        assert!(!buf.data.is_null());
        assert_eq!(buf.len, 16);
        unsafe { rust_free_buffer(buf) };
        // Should not crash
        unsafe { rust_free_buffer(RustBuffer::empty()) };
    }

    #[test]
    fn test_validate_slice_args() {
        unsafe {
            assert!(validate_slice_args::<u8>(ptr::null(), 1).is_none());
            assert_eq!(validate_slice_args::<u8>(ptr::null(), 0).unwrap().len(), 0);
            let p = &0u8 as *const u8;
            assert!(validate_slice_args::<u8>(p, isize::MAX as usize + 1).is_none());
        }
    }
}
