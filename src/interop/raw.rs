//! ABI structures shared with the foreign runtime
//!
//! Layouts are `#[repr(C)]` and must match the platform headers field for
//! field. Nothing here owns memory; ownership lives in the wrappers built on
//! top (`ForeignString`, `ObjectRef`, `OwnedArray`).

use crate::core::{ForeignGuid, HResult, VarType};
use core::ffi::c_void;
use core::ptr;

/// COAUTHIDENTITY
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CoAuthIdentity {
    pub user: *mut u16,
    pub user_length: u32,
    pub domain: *mut u16,
    pub domain_length: u32,
    pub password: *mut u16,
    pub password_length: u32,
    pub flags: u32,
}

/// COAUTHINFO
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CoAuthInfo {
    pub authentication_service: u32,
    pub authorization_service: u32,
    pub server_principal_name: *mut u16,
    pub authentication_level: u32,
    pub impersonation_level: u32,
    pub auth_identity_data: *mut CoAuthIdentity,
    pub capabilities: u32,
}

/// COSERVERINFO: where to activate
///
/// A null `name` means the local machine.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CoServerInfo {
    pub reserved1: u32,
    pub name: *mut u16,
    pub auth_info: *mut CoAuthInfo,
    pub reserved2: u32,
}

impl CoServerInfo {
    pub const fn local() -> Self {
        Self {
            reserved1: 0,
            name: ptr::null_mut(),
            auth_info: ptr::null_mut(),
            reserved2: 0,
        }
    }
}

impl Default for CoServerInfo {
    fn default() -> Self {
        Self::local()
    }
}

/// MULTI_QI: one interface request, filled in place by the activation call
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct MultiQi {
    pub iid: *const ForeignGuid,
    pub interface: *mut IUnknown,
    pub hr: HResult,
}

impl MultiQi {
    pub const fn request(iid: *const ForeignGuid) -> Self {
        Self {
            iid,
            interface: ptr::null_mut(),
            hr: HResult::S_OK,
        }
    }
}

/// IUnknown method table
#[repr(C)]
pub struct IUnknownVtbl {
    pub query_interface: unsafe extern "system" fn(
        this: *mut IUnknown,
        riid: *const ForeignGuid,
        out: *mut *mut c_void,
    ) -> HResult,
    pub add_ref: unsafe extern "system" fn(this: *mut IUnknown) -> u32,
    pub release: unsafe extern "system" fn(this: *mut IUnknown) -> u32,
}

/// Any interface pointer: the first word is the method table
#[repr(C)]
pub struct IUnknown {
    pub vtbl: *const IUnknownVtbl,
}

/// VARIANT payload
#[derive(Clone, Copy)]
#[repr(C)]
pub union VariantPayload {
    pub i8: i8,
    pub u8: u8,
    pub i16: i16,
    pub u16: u16,
    pub i32: i32,
    pub u32: u32,
    pub i64: i64,
    pub u64: u64,
    pub f32: f32,
    pub f64: f64,
    /// VARIANT_BOOL: -1 true, 0 false
    pub boolean: i16,
    pub scode: i32,
    pub bstr: *mut u16,
    pub unknown: *mut IUnknown,
    pub array: *mut c_void,
    pub byref: *mut c_void,
    /// BRECORD; sizes the union to two pointers
    pub record: [usize; 2],
}

/// VARIANT
#[derive(Clone, Copy)]
#[repr(C)]
pub struct RawVariant {
    pub vt: VarType,
    pub reserved1: u16,
    pub reserved2: u16,
    pub reserved3: u16,
    pub payload: VariantPayload,
}

impl RawVariant {
    /// Zero-initialised VT_EMPTY, the state VariantInit leaves behind
    pub const fn empty() -> Self {
        Self {
            vt: VarType::EMPTY,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            payload: VariantPayload { record: [0; 2] },
        }
    }

    pub const fn with(vt: VarType, payload: VariantPayload) -> Self {
        Self {
            vt,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            payload,
        }
    }

    pub const fn from_i32(value: i32) -> Self {
        Self::with(VarType::I4, VariantPayload { i32: value })
    }

    pub const fn from_i64(value: i64) -> Self {
        Self::with(VarType::I8, VariantPayload { i64: value })
    }

    pub const fn from_f64(value: f64) -> Self {
        Self::with(VarType::R8, VariantPayload { f64: value })
    }

    pub const fn from_bool(value: bool) -> Self {
        Self::with(VarType::BOOL, VariantPayload { boolean: if value { -1 } else { 0 } })
    }

    /// Does not take a reference; the variant borrows whatever `bstr` points at
    pub const fn from_bstr(bstr: *mut u16) -> Self {
        Self::with(VarType::BSTR, VariantPayload { bstr })
    }

    pub const fn from_unknown(unknown: *mut IUnknown) -> Self {
        Self::with(VarType::UNKNOWN, VariantPayload { unknown })
    }

    pub const fn from_dispatch(dispatch: *mut IUnknown) -> Self {
        Self::with(VarType::DISPATCH, VariantPayload { unknown: dispatch })
    }

    /// `VT_ARRAY | element` holding `array`
    pub const fn from_array(element: VarType, array: *mut c_void) -> Self {
        Self::with(element.array_of(), VariantPayload { array })
    }

    #[inline]
    pub const fn is_array(&self) -> bool {
        self.vt.is_array()
    }
}

impl Default for RawVariant {
    fn default() -> Self {
        Self::empty()
    }
}

impl core::fmt::Debug for RawVariant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RawVariant {{ vt: {}, .. }}", self.vt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{align_of, size_of};

    #[test]
    fn test_variant_layout() {
        // 16 bytes on 32-bit targets, 24 on 64-bit
        assert_eq!(size_of::<RawVariant>(), 8 + 2 * size_of::<usize>());
        assert!(align_of::<RawVariant>() >= align_of::<usize>());
    }

    #[test]
    fn test_multi_qi_layout() {
        let ptr = size_of::<usize>();
        assert_eq!(size_of::<MultiQi>(), 3 * ptr);
    }

    #[test]
    fn test_server_info_layout() {
        let ptr = size_of::<usize>();
        assert_eq!(size_of::<CoServerInfo>(), 4 * ptr);
    }

    #[test]
    fn test_empty_variant_is_zeroed() {
        let v = RawVariant::empty();
        assert_eq!(v.vt, VarType::EMPTY);
        unsafe {
            assert_eq!(v.payload.record, [0, 0]);
        }
    }

    #[test]
    fn test_bool_encoding() {
        unsafe {
            assert_eq!(RawVariant::from_bool(true).payload.boolean, -1);
            assert_eq!(RawVariant::from_bool(false).payload.boolean, 0);
        }
    }
}
