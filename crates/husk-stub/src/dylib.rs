//! Dynamic-linker loader backend.
//!
//! The production [`LoaderBackend`]: treats the module's code image as a
//! platform shared library, unpacks it next to the container file, opens it
//! with the platform dynamic linker, and calls the payload init symbol to
//! obtain the registry.
//!
//! The library is never unloaded. Every constructor in the returned
//! registry points into the mapped image, so it must stay resident for the
//! remaining process lifetime.

use std::fs;
use std::path::{Path, PathBuf};

use husk_sdk::{PayloadInitFn, PayloadRegistry, PAYLOAD_INIT_SYMBOL};

use crate::format::ModuleFile;
use crate::loader::{LoadError, LoaderBackend};

#[cfg(target_os = "macos")]
const NATIVE_EXT: &str = "dylib";
#[cfg(all(unix, not(target_os = "macos")))]
const NATIVE_EXT: &str = "so";
#[cfg(windows)]
const NATIVE_EXT: &str = "dll";

/// Loader backend backed by the platform dynamic linker.
#[derive(Debug, Default)]
pub struct DylibBackend;

impl DylibBackend {
    /// Create the backend.
    pub fn new() -> Self {
        DylibBackend
    }

    /// Where the code image is unpacked for the linker, next to `module`.
    fn image_path(module: &ModuleFile) -> PathBuf {
        module.path().with_extension(NATIVE_EXT)
    }
}

impl LoaderBackend for DylibBackend {
    fn load(&self, module: &ModuleFile) -> Result<PayloadRegistry, LoadError> {
        let lib_path = Self::image_path(module);
        fs::write(&lib_path, module.code())?;

        let library = RawLibrary::open(&lib_path)?;
        let init: PayloadInitFn = unsafe { library.symbol(PAYLOAD_INIT_SYMBOL)? };

        let ptr = init();
        if ptr.is_null() {
            return Err(LoadError::NullRegistry);
        }
        // Ownership of the registry transfers from the payload to the stub.
        let registry = *unsafe { Box::from_raw(ptr) };

        // Registry constructors point into the mapped image; keep it
        // resident until process exit.
        std::mem::forget(library);

        Ok(registry)
    }
}

// ============================================================================
// Unix (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct RawLibrary {
    handle: *mut libc::c_void,
}

#[cfg(unix)]
impl RawLibrary {
    fn open(path: &Path) -> Result<Self, LoadError> {
        use std::ffi::CString;

        let path_str = path.to_str().ok_or_else(|| {
            LoadError::Library(format!("non-UTF-8 library path: {}", path.display()))
        })?;
        let c_path = CString::new(path_str)
            .map_err(|e| LoadError::Library(format!("invalid library path: {}", e)))?;

        // RTLD_NOW: fail here, not at first call into the payload.
        // RTLD_LOCAL: payload symbols stay out of the global namespace.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(LoadError::Library(format!(
                "{}: {}",
                path.display(),
                last_dl_error()
            )));
        }

        Ok(RawLibrary { handle })
    }

    unsafe fn symbol<T>(&self, name: &str) -> Result<T, LoadError> {
        use std::ffi::CString;

        let c_name = CString::new(name)
            .map_err(|e| LoadError::Library(format!("invalid symbol name: {}", e)))?;

        // Clear any stale error before resolving.
        libc::dlerror();
        let symbol = libc::dlsym(self.handle, c_name.as_ptr());
        let error = libc::dlerror();
        if !error.is_null() || symbol.is_null() {
            return Err(LoadError::Library(format!(
                "symbol {} not found: {}",
                name,
                last_dl_error()
            )));
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(unix)]
impl Drop for RawLibrary {
    fn drop(&mut self) {
        // Reached only on load-failure paths; a successfully loaded
        // library is leaked deliberately.
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    use std::ffi::CStr;

    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

// ============================================================================
// Windows
// ============================================================================

#[cfg(windows)]
struct RawLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(windows)]
impl RawLibrary {
    fn open(path: &Path) -> Result<Self, LoadError> {
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            return Err(LoadError::Library(format!(
                "{}: error code {}",
                path.display(),
                unsafe { GetLastError() }
            )));
        }

        Ok(RawLibrary { handle })
    }

    unsafe fn symbol<T>(&self, name: &str) -> Result<T, LoadError> {
        use std::ffi::CString;

        let c_name = CString::new(name)
            .map_err(|e| LoadError::Library(format!("invalid symbol name: {}", e)))?;

        let symbol = GetProcAddress(self.handle, c_name.as_ptr());
        if symbol.is_null() {
            return Err(LoadError::Library(format!(
                "symbol {} not found: error code {}",
                name,
                GetLastError()
            )));
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(windows)]
impl Drop for RawLibrary {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut std::ffi::c_void;
    fn GetProcAddress(
        module: *mut std::ffi::c_void,
        procname: *const i8,
    ) -> *mut std::ffi::c_void;
    fn FreeLibrary(module: *mut std::ffi::c_void) -> i32;
    fn GetLastError() -> u32;
}
