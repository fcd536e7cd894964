//! The real platform layer: entry points resolved from the OLE runtime modules
//!
//! Symbols are looked up once when the platform is loaded. On targets
//! without the runtime, loading fails with `Unsupported` and nothing else is
//! reachable.

use super::library::Library;
use super::platform::{ArrayBounds, ArrayHandle, Bstr, Platform};
use super::raw::{CoServerInfo, IUnknown, MultiQi, RawVariant};
use crate::config::LibraryConfig;
use crate::core::{ClsCtx, ForeignGuid, HResult, VarType};
use crate::errors::Result;
use crate::logging::debug;
use core::ffi::c_void;
use core::ptr;

type CoCreateInstanceExFn = unsafe extern "system" fn(
    clsid: *const ForeignGuid,
    outer: *mut IUnknown,
    context: u32,
    server: *const CoServerInfo,
    count: u32,
    results: *mut MultiQi,
) -> HResult;
type IidFromStringFn = unsafe extern "system" fn(text: *const u16, iid: *mut ForeignGuid) -> HResult;
type SysAllocStringLenFn = unsafe extern "system" fn(text: *const u16, len: u32) -> *mut u16;
type SysFreeStringFn = unsafe extern "system" fn(text: *mut u16);
type SafeArrayCreateVectorFn = unsafe extern "system" fn(vt: VarType, lower: i32, count: u32) -> *mut c_void;
type SafeArrayCopyFn = unsafe extern "system" fn(array: *mut c_void, out: *mut *mut c_void) -> HResult;
type SafeArrayDestroyFn = unsafe extern "system" fn(array: *mut c_void) -> HResult;
type SafeArrayGetDimFn = unsafe extern "system" fn(array: *mut c_void) -> u32;
type SafeArrayGetVartypeFn = unsafe extern "system" fn(array: *mut c_void, vt: *mut VarType) -> HResult;
type SafeArrayGetBoundFn = unsafe extern "system" fn(array: *mut c_void, dim: u32, bound: *mut i32) -> HResult;
type SafeArrayGetElementFn =
    unsafe extern "system" fn(array: *mut c_void, indices: *const i32, out: *mut c_void) -> HResult;
type SafeArrayPutElementFn =
    unsafe extern "system" fn(array: *mut c_void, indices: *const i32, value: *const c_void) -> HResult;
type VariantClearFn = unsafe extern "system" fn(value: *mut RawVariant) -> HResult;

#[cfg_attr(not(windows), allow(dead_code))]
struct EntryPoints {
    co_create_instance_ex: CoCreateInstanceExFn,
    iid_from_string: IidFromStringFn,
    sys_alloc_string_len: SysAllocStringLenFn,
    sys_free_string: SysFreeStringFn,
    safe_array_create_vector: SafeArrayCreateVectorFn,
    safe_array_copy: SafeArrayCopyFn,
    safe_array_destroy: SafeArrayDestroyFn,
    safe_array_get_dim: SafeArrayGetDimFn,
    safe_array_get_vartype: SafeArrayGetVartypeFn,
    safe_array_get_lbound: SafeArrayGetBoundFn,
    safe_array_get_ubound: SafeArrayGetBoundFn,
    safe_array_get_element: SafeArrayGetElementFn,
    safe_array_put_element: SafeArrayPutElementFn,
    variant_clear: VariantClearFn,
}

#[cfg_attr(not(windows), allow(unused_macros))]
macro_rules! resolve {
    ($lib:expr, $name:literal) => {
        // SAFETY: the field type this lands in is the documented signature of `$name`
        unsafe { core::mem::transmute::<*const (), _>($lib.symbol($name)?) }
    };
}

/// Platform layer backed by the OLE runtime modules
pub struct SystemPlatform {
    api: EntryPoints,
    // Keep the modules mapped for as long as `api` is reachable
    _ole32: Library,
    _oleaut32: Library,
}

impl SystemPlatform {
    /// Load with the default module names
    pub fn load() -> Result<Self> {
        Self::from_config(&LibraryConfig::default())
    }

    #[cfg(windows)]
    pub fn from_config(config: &LibraryConfig) -> Result<Self> {
        let ole32 = Library::load(&config.ole32)?;
        let oleaut32 = Library::load(&config.oleaut32)?;

        let api = EntryPoints {
            co_create_instance_ex: resolve!(ole32, "CoCreateInstanceEx"),
            iid_from_string: resolve!(ole32, "IIDFromString"),
            sys_alloc_string_len: resolve!(oleaut32, "SysAllocStringLen"),
            sys_free_string: resolve!(oleaut32, "SysFreeString"),
            safe_array_create_vector: resolve!(oleaut32, "SafeArrayCreateVector"),
            safe_array_copy: resolve!(oleaut32, "SafeArrayCopy"),
            safe_array_destroy: resolve!(oleaut32, "SafeArrayDestroy"),
            safe_array_get_dim: resolve!(oleaut32, "SafeArrayGetDim"),
            safe_array_get_vartype: resolve!(oleaut32, "SafeArrayGetVartype"),
            safe_array_get_lbound: resolve!(oleaut32, "SafeArrayGetLBound"),
            safe_array_get_ubound: resolve!(oleaut32, "SafeArrayGetUBound"),
            safe_array_get_element: resolve!(oleaut32, "SafeArrayGetElement"),
            safe_array_put_element: resolve!(oleaut32, "SafeArrayPutElement"),
            variant_clear: resolve!(oleaut32, "VariantClear"),
        };

        debug!(ole32 = %config.ole32, oleaut32 = %config.oleaut32, "Resolved OLE entry points");

        Ok(Self {
            api,
            _ole32: ole32,
            _oleaut32: oleaut32,
        })
    }

    #[cfg(not(windows))]
    pub fn from_config(config: &LibraryConfig) -> Result<Self> {
        debug!(ole32 = %config.ole32, "No OLE runtime on this platform");
        Err(crate::errors::OleError::Unsupported)
    }
}

impl Platform for SystemPlatform {
    unsafe fn activate_instance(
        &self,
        class: &ForeignGuid,
        context: ClsCtx,
        server: &CoServerInfo,
        results: &mut [MultiQi],
    ) -> HResult {
        let count = match u32::try_from(results.len()) {
            Ok(count) => count,
            Err(_) => return HResult::E_INVALIDARG,
        };
        let records = if results.is_empty() {
            ptr::null_mut()
        } else {
            results.as_mut_ptr()
        };
        (self.api.co_create_instance_ex)(class, ptr::null_mut(), context.0, server, count, records)
    }

    fn iid_from_string(&self, text: Bstr) -> core::result::Result<ForeignGuid, HResult> {
        let mut iid = ForeignGuid::default();
        // SAFETY: `text` is a live BSTR and `iid` is a valid out-pointer
        unsafe { (self.api.iid_from_string)(text.as_ptr(), &mut iid) }.ok()?;
        Ok(iid)
    }

    fn alloc_string(&self, text: &str) -> Option<Bstr> {
        let wide: Vec<u16> = text.encode_utf16().collect();
        let len = u32::try_from(wide.len()).ok()?;
        // SAFETY: `wide` holds `len` code units
        unsafe { Bstr::from_raw((self.api.sys_alloc_string_len)(wide.as_ptr(), len)) }
    }

    fn free_string(&self, text: Bstr) {
        // SAFETY: `text` came from SysAllocStringLen
        unsafe { (self.api.sys_free_string)(text.as_ptr()) }
    }

    fn array_create_vector(&self, kind: VarType, lower_bound: i32, length: u32) -> Option<ArrayHandle> {
        // SAFETY: plain allocation; null on failure
        unsafe { ArrayHandle::from_raw((self.api.safe_array_create_vector)(kind, lower_bound, length)) }
    }

    fn array_copy(&self, array: ArrayHandle) -> core::result::Result<ArrayHandle, HResult> {
        let mut out: *mut c_void = ptr::null_mut();
        // SAFETY: `array` is live by construction of the handle
        unsafe {
            (self.api.safe_array_copy)(array.as_raw(), &mut out).ok()?;
            ArrayHandle::from_raw(out).ok_or(HResult::E_OUTOFMEMORY)
        }
    }

    fn array_destroy(&self, array: ArrayHandle) -> core::result::Result<(), HResult> {
        unsafe { (self.api.safe_array_destroy)(array.as_raw()) }.ok()
    }

    fn array_dimensions(&self, array: ArrayHandle) -> u32 {
        unsafe { (self.api.safe_array_get_dim)(array.as_raw()) }
    }

    fn array_element_kind(&self, array: ArrayHandle) -> core::result::Result<VarType, HResult> {
        let mut vt = VarType::EMPTY;
        unsafe { (self.api.safe_array_get_vartype)(array.as_raw(), &mut vt) }.ok()?;
        Ok(vt)
    }

    fn array_bounds(&self, array: ArrayHandle, dimension: u32) -> core::result::Result<ArrayBounds, HResult> {
        // The runtime numbers dimensions from one
        let dim = dimension + 1;
        let (mut lower, mut upper) = (0i32, 0i32);
        unsafe {
            (self.api.safe_array_get_lbound)(array.as_raw(), dim, &mut lower).ok()?;
            (self.api.safe_array_get_ubound)(array.as_raw(), dim, &mut upper).ok()?;
        }
        Ok(ArrayBounds::from_inclusive(lower, upper))
    }

    unsafe fn array_get_element(&self, array: ArrayHandle, index: i32, out: *mut c_void) -> core::result::Result<(), HResult> {
        (self.api.safe_array_get_element)(array.as_raw(), &index, out).ok()
    }

    unsafe fn array_put_element(&self, array: ArrayHandle, index: i32, value: *const c_void) -> core::result::Result<(), HResult> {
        (self.api.safe_array_put_element)(array.as_raw(), &index, value).ok()
    }

    unsafe fn variant_clear(&self, value: &mut RawVariant) -> core::result::Result<(), HResult> {
        (self.api.variant_clear)(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn test_unsupported_off_windows() {
        assert!(matches!(SystemPlatform::load(), Err(crate::errors::OleError::Unsupported)));
    }

    #[cfg(windows)]
    #[test]
    fn test_bad_module_name() {
        let config = LibraryConfig {
            ole32: "olebridge-missing-ole32.dll".to_string(),
            ..LibraryConfig::default()
        };
        assert!(matches!(
            SystemPlatform::from_config(&config),
            Err(crate::errors::OleError::LibraryLoad { .. })
        ));
    }
}
