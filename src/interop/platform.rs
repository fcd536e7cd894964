//! The platform call layer
//!
//! One method per foreign entry point. Each reports the foreign status code
//! (as `Err(HResult)`) next to its outputs and never interprets it; policy
//! lives in `activation` and `conversion`. Implementations:
//! [`SystemPlatform`](super::SystemPlatform) for the real runtime and
//! `SimulatedPlatform` (behind the `simulated` feature) for tests.

use super::raw::{CoServerInfo, MultiQi, RawVariant};
use crate::core::{ClsCtx, ForeignGuid, HResult, VarType};
use core::ffi::c_void;
use core::ptr::NonNull;

/// Handle to a foreign SAFEARRAY
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct ArrayHandle(NonNull<c_void>);

impl ArrayHandle {
    /// # Safety
    /// `ptr` must be null or point at a SAFEARRAY that stays alive for as
    /// long as the handle (or any copy of it) is used.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    #[inline]
    pub fn as_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Foreign length-prefixed UTF-16 string (BSTR)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct Bstr(NonNull<u16>);

impl Bstr {
    /// # Safety
    /// `ptr` must be null or a BSTR allocated by the foreign string allocator.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut u16) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut u16 {
        self.0.as_ptr()
    }
}

/// Bounds of one array dimension
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ArrayBounds {
    pub lower: i32,
    pub count: u32,
}

impl ArrayBounds {
    /// Builds from inclusive bounds the way the runtime reports them
    pub fn from_inclusive(lower: i32, upper: i32) -> Self {
        let count = (i64::from(upper) - i64::from(lower) + 1).max(0);
        Self {
            lower,
            count: u32::try_from(count).unwrap_or(u32::MAX),
        }
    }

    /// Foreign index of the `position`-th element
    #[inline]
    pub fn index(&self, position: usize) -> i32 {
        self.lower.wrapping_add(position as i32)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Raw entry points into the foreign object runtime
///
/// All calls are blocking. Element indices are `i32` and element counts
/// `u32`, the widths of the runtime's LONG index and SAFEARRAYBOUND count.
pub trait Platform {
    /// CoCreateInstanceEx: fill `results` in place, one record per requested interface
    ///
    /// # Safety
    /// Every `results[i].iid` must point at a live identifier, and
    /// `server.name` must be null or a live BSTR, for the duration of the call.
    unsafe fn activate_instance(
        &self,
        class: &ForeignGuid,
        context: ClsCtx,
        server: &CoServerInfo,
        results: &mut [MultiQi],
    ) -> HResult;

    /// IIDFromString
    fn iid_from_string(&self, text: Bstr) -> Result<ForeignGuid, HResult>;

    /// SysAllocStringLen. `None` on allocation failure.
    fn alloc_string(&self, text: &str) -> Option<Bstr>;

    /// SysFreeString
    fn free_string(&self, text: Bstr);

    /// SafeArrayCreateVector. `None` on allocation failure.
    fn array_create_vector(&self, kind: VarType, lower_bound: i32, length: u32) -> Option<ArrayHandle>;

    /// SafeArrayCopy
    fn array_copy(&self, array: ArrayHandle) -> Result<ArrayHandle, HResult>;

    /// SafeArrayDestroy; releases every element
    fn array_destroy(&self, array: ArrayHandle) -> Result<(), HResult>;

    /// SafeArrayGetDim
    fn array_dimensions(&self, array: ArrayHandle) -> u32;

    /// SafeArrayGetVartype
    fn array_element_kind(&self, array: ArrayHandle) -> Result<VarType, HResult>;

    /// SafeArrayGetLBound / SafeArrayGetUBound for the zero-based `dimension`
    fn array_bounds(&self, array: ArrayHandle, dimension: u32) -> Result<ArrayBounds, HResult>;

    /// SafeArrayGetElement: copy one element into `out`
    ///
    /// Strings, objects and variants are copied the way the runtime copies
    /// them: the caller owns what lands in `out`.
    ///
    /// # Safety
    /// `out` must be valid for writes of one element of the array's kind.
    unsafe fn array_get_element(&self, array: ArrayHandle, index: i32, out: *mut c_void) -> Result<(), HResult>;

    /// SafeArrayPutElement: store a copy of the element
    ///
    /// For string and object arrays `value` is the BSTR or interface pointer
    /// itself; for every other kind it points at the element.
    ///
    /// # Safety
    /// `value` must be valid for the array's kind as described above.
    unsafe fn array_put_element(&self, array: ArrayHandle, index: i32, value: *const c_void) -> Result<(), HResult>;

    /// VariantClear: release what the variant owns and reset it to VT_EMPTY
    ///
    /// # Safety
    /// `value` must be a well-formed variant that owns its payload.
    unsafe fn variant_clear(&self, value: &mut RawVariant) -> Result<(), HResult>;
}

impl<P: Platform + ?Sized> Platform for &P {
    unsafe fn activate_instance(
        &self,
        class: &ForeignGuid,
        context: ClsCtx,
        server: &CoServerInfo,
        results: &mut [MultiQi],
    ) -> HResult {
        (**self).activate_instance(class, context, server, results)
    }

    fn iid_from_string(&self, text: Bstr) -> Result<ForeignGuid, HResult> {
        (**self).iid_from_string(text)
    }

    fn alloc_string(&self, text: &str) -> Option<Bstr> {
        (**self).alloc_string(text)
    }

    fn free_string(&self, text: Bstr) {
        (**self).free_string(text)
    }

    fn array_create_vector(&self, kind: VarType, lower_bound: i32, length: u32) -> Option<ArrayHandle> {
        (**self).array_create_vector(kind, lower_bound, length)
    }

    fn array_copy(&self, array: ArrayHandle) -> Result<ArrayHandle, HResult> {
        (**self).array_copy(array)
    }

    fn array_destroy(&self, array: ArrayHandle) -> Result<(), HResult> {
        (**self).array_destroy(array)
    }

    fn array_dimensions(&self, array: ArrayHandle) -> u32 {
        (**self).array_dimensions(array)
    }

    fn array_element_kind(&self, array: ArrayHandle) -> Result<VarType, HResult> {
        (**self).array_element_kind(array)
    }

    fn array_bounds(&self, array: ArrayHandle, dimension: u32) -> Result<ArrayBounds, HResult> {
        (**self).array_bounds(array, dimension)
    }

    unsafe fn array_get_element(&self, array: ArrayHandle, index: i32, out: *mut c_void) -> Result<(), HResult> {
        (**self).array_get_element(array, index, out)
    }

    unsafe fn array_put_element(&self, array: ArrayHandle, index: i32, value: *const c_void) -> Result<(), HResult> {
        (**self).array_put_element(array, index, value)
    }

    unsafe fn variant_clear(&self, value: &mut RawVariant) -> Result<(), HResult> {
        (**self).variant_clear(value)
    }
}
