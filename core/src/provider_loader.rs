use chrono::{DateTime, FixedOffset};
use libloading::{Library, Symbol};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::path::{Path, PathBuf};
use ziwei_provider_abi::*;

use crate::chart::{Astrolabe, Horoscope};
use crate::provider::{ChartProvider, ChartRequest, NatalChart, ProviderError};

/// Chart library loaded from a shared object
pub struct DynamicProvider {
    _lib: Library,
    name: String,
    version: String,
    vtable: &'static ProviderVTable,
}

impl DynamicProvider {
    /// Load the chart library at `path`.
    ///
    /// A path that does not exist is reported as missing; a file that cannot
    /// be opened, lacks the entry symbols, or speaks another ABI version is
    /// reported as incompatible.
    ///
    /// # Safety
    ///
    /// This loads arbitrary code from a .so/.dll file. Only load trusted libraries.
    pub unsafe fn load(path: &Path) -> Result<Self, ProviderError> {
        log::info!("Loading chart library from: {}", path.display());

        if !path.is_file() {
            return Err(ProviderError::Missing(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let lib = Library::new(path).map_err(|e| {
            ProviderError::Incompatible(format!("cannot load {}: {}", path.display(), e))
        })?;

        let manifest_fn: Symbol<ProviderManifestFn> =
            lib.get(PROVIDER_MANIFEST_SYMBOL).map_err(|_| {
                ProviderError::Incompatible(format!(
                    "{} does not export ziwei_provider_manifest",
                    path.display()
                ))
            })?;
        let manifest = manifest_fn();

        if manifest.abi_version != ABI_VERSION {
            return Err(ProviderError::Incompatible(format!(
                "ABI version mismatch: library has {}, expected {}",
                manifest.abi_version, ABI_VERSION
            )));
        }

        let vtable_fn: Symbol<ProviderGetVTableFn> =
            lib.get(PROVIDER_VTABLE_SYMBOL).map_err(|_| {
                ProviderError::Incompatible(format!(
                    "{} does not export ziwei_provider_get_vtable",
                    path.display()
                ))
            })?;
        let vtable_ptr = vtable_fn();
        if vtable_ptr.is_null() {
            return Err(ProviderError::Incompatible(
                "provider vtable function returned null".to_string(),
            ));
        }
        let vtable = &*vtable_ptr;

        let name = borrowed_string(manifest.name).unwrap_or_else(|| "unknown".to_string());
        let version = borrowed_string(manifest.version).unwrap_or_else(|| "?".to_string());
        log::info!("Loaded chart library: {} v{}", name, version);

        Ok(Self {
            _lib: lib,
            name,
            version,
            vtable,
        })
    }

    fn last_error(&self) -> String {
        unsafe { borrowed_string((self.vtable.last_error)()) }
            .unwrap_or_else(|| "no error message".to_string())
    }

    /// Take ownership of a provider string, releasing the original.
    unsafe fn take_string(&self, ptr: *mut c_char, what: &'static str) -> Result<String, ProviderError> {
        if ptr.is_null() {
            return Err(ProviderError::Chart(format!("{}: {}", what, self.last_error())));
        }
        let text = CStr::from_ptr(ptr).to_str().map(str::to_owned);
        (self.vtable.string_free)(ptr);
        text.map_err(|e| ProviderError::Malformed {
            what,
            message: format!("not UTF-8: {}", e),
        })
    }

    fn cast(
        &self,
        entry: unsafe extern "C" fn(*const c_char) -> *mut c_void,
        request: &ChartRequest,
    ) -> Result<Box<dyn NatalChart + '_>, ProviderError> {
        let json = serde_json::to_string(request).map_err(|e| ProviderError::Malformed {
            what: "chart request",
            message: e.to_string(),
        })?;
        let json = CString::new(json).map_err(|e| ProviderError::Malformed {
            what: "chart request",
            message: e.to_string(),
        })?;

        let handle = unsafe { entry(json.as_ptr()) };
        if handle.is_null() {
            return Err(ProviderError::Chart(self.last_error()));
        }
        let decoded = unsafe { self.take_string((self.vtable.chart_json)(handle), "chart") }
            .and_then(|text| Astrolabe::from_json(&text));
        let astrolabe = match decoded {
            Ok(astrolabe) => astrolabe,
            Err(e) => {
                unsafe { (self.vtable.chart_free)(handle) };
                return Err(e);
            }
        };
        Ok(Box::new(DynamicChart {
            provider: self,
            handle,
            astrolabe,
        }))
    }
}

impl ChartProvider for DynamicProvider {
    fn describe(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    fn by_solar(&self, request: &ChartRequest) -> Result<Box<dyn NatalChart + '_>, ProviderError> {
        self.cast(self.vtable.chart_by_solar, request)
    }

    fn by_lunar(&self, request: &ChartRequest) -> Result<Box<dyn NatalChart + '_>, ProviderError> {
        self.cast(self.vtable.chart_by_lunar, request)
    }
}

/// Chart handle owned by the library
struct DynamicChart<'p> {
    provider: &'p DynamicProvider,
    handle: *mut c_void,
    astrolabe: Astrolabe,
}

impl NatalChart for DynamicChart<'_> {
    fn astrolabe(&self) -> &Astrolabe {
        &self.astrolabe
    }

    fn horoscope(&self, instant: &DateTime<FixedOffset>) -> Result<Horoscope, ProviderError> {
        let horoscope_fn = self
            .provider
            .vtable
            .horoscope_json
            .ok_or(ProviderError::NoHoroscope)?;
        let stamp = CString::new(instant.to_rfc3339()).map_err(|e| ProviderError::Malformed {
            what: "instant",
            message: e.to_string(),
        })?;
        let text = unsafe {
            self.provider
                .take_string(horoscope_fn(self.handle, stamp.as_ptr()), "horoscope")?
        };
        Horoscope::from_json(&text)
    }
}

impl Drop for DynamicChart<'_> {
    fn drop(&mut self) {
        unsafe {
            (self.provider.vtable.chart_free)(self.handle);
        }
    }
}

unsafe fn borrowed_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// Find the chart library file.
///
/// An explicit path is used as given. Otherwise each search directory is
/// checked for the platform library name.
pub fn locate_provider(explicit: Option<&Path>, search_dirs: &[PathBuf]) -> Result<PathBuf, ProviderError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    for dir in search_dirs {
        let candidate = dir.join(PROVIDER_FILE_NAME);
        if candidate.is_file() {
            log::debug!("Found chart library: {}", candidate.display());
            return Ok(candidate);
        }
        log::debug!("No chart library in: {}", dir.display());
    }
    Err(ProviderError::Missing(format!(
        "no {} in {}",
        PROVIDER_FILE_NAME,
        search_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let p = PathBuf::from("/opt/custom/lib.so");
        assert_eq!(locate_provider(Some(&p), &[]).unwrap(), p);
    }

    #[test]
    fn test_search_finds_library() -> Result<(), Box<dyn std::error::Error>> {
        let empty = tempfile::tempdir()?;
        let full = tempfile::tempdir()?;
        std::fs::write(full.path().join(PROVIDER_FILE_NAME), b"")?;
        let found = locate_provider(None, &[empty.path().to_path_buf(), full.path().to_path_buf()])?;
        assert_eq!(found, full.path().join(PROVIDER_FILE_NAME));
        Ok(())
    }

    #[test]
    fn test_nothing_found_is_missing() {
        let empty = tempfile::tempdir().unwrap();
        let err = locate_provider(None, &[empty.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, ProviderError::Missing(_)));
        assert!(err.is_dependency());
    }

    #[test]
    fn test_load_absent_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = unsafe { DynamicProvider::load(&dir.path().join(PROVIDER_FILE_NAME)) }
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Missing(_)));
    }

    #[test]
    fn test_load_garbage_file_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROVIDER_FILE_NAME);
        std::fs::write(&path, b"definitely not a shared object").unwrap();
        let err = unsafe { DynamicProvider::load(&path) }.err().unwrap();
        assert!(matches!(err, ProviderError::Incompatible(_)));
    }
}
