//! Ownership tokens for foreign interface pointers
//!
//! An [`ObjectRef`] stands for exactly one reference on the foreign object.
//! It has no `Drop`: the reference is given back only through
//! [`ObjectRef::release`] (or handed on with [`ObjectRef::into_raw`]), so the
//! count moves only where the code says so.

use super::raw::IUnknown;
use crate::core::{Guid, IID_IDISPATCH};
use crate::errors::{OleError, Result};
use crate::logging::trace;
use core::ffi::c_void;
use core::fmt;
use core::ptr::{self, NonNull};

/// Which of the two reference-counted object kinds a pointer came in as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Unknown,
    Dispatch,
}

impl ObjectKind {
    /// Kind of the pointer a request for `iid` hands back
    pub fn for_interface(iid: &Guid) -> Self {
        if *iid == IID_IDISPATCH {
            Self::Dispatch
        } else {
            Self::Unknown
        }
    }
}

/// One owned reference on a foreign object
#[must_use = "an ObjectRef owns a foreign reference; call release() or into_raw()"]
pub struct ObjectRef {
    ptr: NonNull<IUnknown>,
    kind: ObjectKind,
}

impl ObjectRef {
    /// Adopt a reference the caller already owns
    ///
    /// # Safety
    /// `ptr` must be null or a live interface pointer carrying a reference
    /// that is now transferred to the returned token.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut IUnknown, kind: ObjectKind) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, kind })
    }

    /// Take an additional reference on a borrowed pointer
    ///
    /// # Safety
    /// `ptr` must be null or a live interface pointer.
    pub unsafe fn acquire_raw(ptr: *mut IUnknown, kind: ObjectKind) -> Option<Self> {
        let token = Self::from_raw(ptr, kind)?;
        let count = token.add_ref();
        trace!(event = "reference_acquired", address = ?ptr, count);
        Some(token)
    }

    #[inline]
    pub fn as_raw(&self) -> *mut IUnknown {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Second token for the same object, backed by a new reference
    pub fn acquire(&self) -> ObjectRef {
        let count = self.add_ref();
        trace!(event = "reference_acquired", address = ?self.ptr, count);
        Self {
            ptr: self.ptr,
            kind: self.kind,
        }
    }

    /// Give the reference back. Returns the count the object reports.
    pub fn release(self) -> u32 {
        // SAFETY: the token owns one reference on a live object
        let count = unsafe { ((*(*self.ptr.as_ptr()).vtbl).release)(self.ptr.as_ptr()) };
        trace!(event = "reference_released", address = ?self.ptr, count);
        count
    }

    /// Hand the reference to foreign code without releasing it
    #[inline]
    pub fn into_raw(self) -> *mut IUnknown {
        self.ptr.as_ptr()
    }

    /// QueryInterface; the new token owns the reference the call returned
    pub fn query_interface(&self, iid: &Guid) -> Result<ObjectRef> {
        let foreign = iid.to_foreign();
        let mut out: *mut c_void = ptr::null_mut();
        // SAFETY: the token keeps the object alive; `foreign` and `out` outlive the call
        let hr = unsafe {
            ((*(*self.ptr.as_ptr()).vtbl).query_interface)(self.ptr.as_ptr(), &foreign, &mut out)
        };
        if !hr.is_ok() {
            return Err(OleError::InterfaceRequestFailed { iid: *iid, hr });
        }
        // SAFETY: S_OK hands us one reference on `out`
        unsafe { Self::from_raw(out as *mut IUnknown, ObjectKind::for_interface(iid)) }.ok_or(OleError::CreationFailed)
    }

    #[inline]
    fn add_ref(&self) -> u32 {
        // SAFETY: the token keeps the object alive
        unsafe { ((*(*self.ptr.as_ptr()).vtbl).add_ref)(self.ptr.as_ptr()) }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:?} @ {:p})", self.kind, self.ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HResult, IID_IUNKNOWN};
    use crate::interop::SimulatedObject;

    #[test]
    fn test_acquire_and_release_balance() {
        let object = SimulatedObject::new();
        assert_eq!(object.ref_count(), 1);

        let token = unsafe { ObjectRef::acquire_raw(object.as_raw(), ObjectKind::Unknown) }.unwrap();
        assert_eq!(object.ref_count(), 2);

        let second = token.acquire();
        assert_eq!(object.ref_count(), 3);
        assert_eq!(token, second);

        assert_eq!(second.release(), 2);
        assert_eq!(token.release(), 1);
    }

    #[test]
    fn test_query_interface() {
        let object = SimulatedObject::new();
        let token = unsafe { ObjectRef::acquire_raw(object.as_raw(), ObjectKind::Unknown) }.unwrap();

        let unknown = token.query_interface(&IID_IUNKNOWN).unwrap();
        assert_eq!(object.ref_count(), 3);
        unknown.release();

        let missing: Guid = "11111111-2222-3333-4444-555555555555".parse().unwrap();
        match token.query_interface(&missing) {
            Err(OleError::InterfaceRequestFailed { hr, .. }) => assert_eq!(hr, HResult::E_NOINTERFACE),
            other => panic!("unexpected {:?}", other),
        }
        token.release();
        assert_eq!(object.ref_count(), 1);
    }
}
