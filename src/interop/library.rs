//! Dynamic library loading and symbol resolution
//!
//! Platform-agnostic wrapper around dlopen/LoadLibrary. The system platform
//! resolves every foreign entry point through this at load time.

use crate::errors::{OleError, Result};
use core::ffi::c_void;
use core::ptr::NonNull;
use std::ffi::CString;

/// Handle to dynamically loaded library
pub struct Library {
    handle: NonNull<c_void>,
    name: String,
}

impl Library {
    /// Load library by name. Searches the standard library paths.
    pub fn load(name: &str) -> Result<Self> {
        let handle = Self::load_impl(name)?;
        Ok(Self {
            handle,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(unix)]
    fn load_impl(name: &str) -> Result<NonNull<c_void>> {
        use std::os::raw::c_char;

        extern "C" {
            fn dlopen(filename: *const c_char, flag: i32) -> *mut c_void;
            fn dlerror() -> *const c_char;
        }

        const RTLD_NOW: i32 = 2;

        let cname = CString::new(name).map_err(|_| OleError::LibraryLoad {
            name: name.to_string(),
            reason: "name contains a NUL byte".to_string(),
        })?;

        unsafe {
            let handle = dlopen(cname.as_ptr(), RTLD_NOW);
            NonNull::new(handle).ok_or_else(|| {
                let err = dlerror();
                let reason = if !err.is_null() {
                    std::ffi::CStr::from_ptr(err).to_string_lossy().into_owned()
                } else {
                    "unknown error".into()
                };
                OleError::LibraryLoad {
                    name: name.to_string(),
                    reason,
                }
            })
        }
    }

    #[cfg(windows)]
    fn load_impl(name: &str) -> Result<NonNull<c_void>> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;

        extern "system" {
            fn LoadLibraryW(filename: *const u16) -> *mut c_void;
            fn GetLastError() -> u32;
        }

        let wide: Vec<u16> = OsStr::new(name).encode_wide().chain(Some(0)).collect();

        unsafe {
            let handle = LoadLibraryW(wide.as_ptr());
            NonNull::new(handle).ok_or_else(|| OleError::LibraryLoad {
                name: name.to_string(),
                reason: format!("error code {}", GetLastError()),
            })
        }
    }

    /// Get function pointer by symbol name
    pub fn symbol(&self, name: &str) -> Result<*const ()> {
        let cname = CString::new(name).map_err(|_| OleError::SymbolNotFound(name.to_string()))?;
        let ptr = self.symbol_impl(&cname);
        if ptr.is_null() {
            Err(OleError::SymbolNotFound(format!("{}!{}", self.name, name)))
        } else {
            Ok(ptr as *const ())
        }
    }

    #[cfg(unix)]
    fn symbol_impl(&self, name: &CString) -> *mut c_void {
        use std::os::raw::c_char;

        extern "C" {
            fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
        }

        unsafe { dlsym(self.handle.as_ptr(), name.as_ptr()) }
    }

    #[cfg(windows)]
    fn symbol_impl(&self, name: &CString) -> *mut c_void {
        extern "system" {
            fn GetProcAddress(module: *mut c_void, name: *const u8) -> *mut c_void;
        }

        unsafe { GetProcAddress(self.handle.as_ptr(), name.as_ptr() as *const u8) }
    }
}

impl Drop for Library {
    #[cfg(unix)]
    fn drop(&mut self) {
        extern "C" {
            fn dlclose(handle: *mut c_void) -> i32;
        }
        unsafe {
            dlclose(self.handle.as_ptr());
        }
    }

    #[cfg(windows)]
    fn drop(&mut self) {
        extern "system" {
            fn FreeLibrary(module: *mut c_void) -> i32;
        }
        unsafe {
            FreeLibrary(self.handle.as_ptr());
        }
    }
}

unsafe impl Send for Library {}
unsafe impl Sync for Library {}
