use std::os::raw::{c_char, c_void};

/// Current ABI version - increment when making breaking changes
pub const ABI_VERSION: u32 = 1;

/// Provider manifest - identifies the chart library behind the ABI
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProviderManifest {
    pub abi_version: u32,
    pub name: *const c_char,
    pub version: *const c_char,
}

/// VTable for chart construction and horoscope snapshots.
///
/// Every `*const c_char` argument is a NUL-terminated UTF-8 JSON document.
/// Every returned `*mut c_char` is owned by the provider and must be handed
/// back through `string_free`.
#[repr(C)]
pub struct ProviderVTable {
    /// Build a natal chart from a solar date request.
    /// Returns null on failure; `last_error` then describes why.
    pub chart_by_solar: unsafe extern "C" fn(*const c_char) -> *mut c_void,

    /// Build a natal chart from a lunar date request.
    pub chart_by_lunar: unsafe extern "C" fn(*const c_char) -> *mut c_void,

    /// Serialize the natal chart (metadata and 12 palaces).
    pub chart_json: unsafe extern "C" fn(*const c_void) -> *mut c_char,

    /// Horoscope snapshot for an RFC 3339 instant.
    /// Older libraries leave this null.
    pub horoscope_json: Option<unsafe extern "C" fn(*const c_void, *const c_char) -> *mut c_char>,

    /// Most recent error message, or null. Borrowed, do not free.
    pub last_error: unsafe extern "C" fn() -> *const c_char,

    /// Destroy a chart handle
    pub chart_free: unsafe extern "C" fn(*mut c_void),

    /// Release a string returned by the provider
    pub string_free: unsafe extern "C" fn(*mut c_char),
}

/// Provider entry points - these must be exported by the library .so/.dll

/// Get provider manifest
pub type ProviderManifestFn = unsafe extern "C" fn() -> ProviderManifest;

/// Get the vtable for the provider
pub type ProviderGetVTableFn = unsafe extern "C" fn() -> *const ProviderVTable;

/// Symbol names that providers must export
pub const PROVIDER_MANIFEST_SYMBOL: &[u8] = b"ziwei_provider_manifest\0";
pub const PROVIDER_VTABLE_SYMBOL: &[u8] = b"ziwei_provider_get_vtable\0";

/// Platform file name of the default provider library
#[cfg(target_os = "linux")]
pub const PROVIDER_FILE_NAME: &str = "libziwei_provider.so";
#[cfg(target_os = "macos")]
pub const PROVIDER_FILE_NAME: &str = "libziwei_provider.dylib";
#[cfg(target_os = "windows")]
pub const PROVIDER_FILE_NAME: &str = "ziwei_provider.dll";
#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
pub const PROVIDER_FILE_NAME: &str = "libziwei_provider.so";
