//! Arrays owned by the caller

use crate::core::HResult;
use crate::errors::{OleError, Result};
use crate::interop::{ArrayHandle, Platform};
use crate::logging::debug;
use std::mem::ManuallyDrop;

/// An array handle destroyed on drop
pub struct OwnedArray<'p, P: Platform + ?Sized> {
    platform: &'p P,
    handle: ArrayHandle,
}

impl<'p, P: Platform + ?Sized> OwnedArray<'p, P> {
    /// # Safety
    /// `handle` must be a live array that nothing else will destroy.
    pub unsafe fn from_raw(platform: &'p P, handle: ArrayHandle) -> Self {
        Self { platform, handle }
    }

    #[inline]
    pub fn handle(&self) -> ArrayHandle {
        self.handle
    }

    /// Deep copy through the runtime
    pub fn try_clone(&self) -> Result<Self> {
        let copy = self.platform.array_copy(self.handle).map_err(|hr| {
            if hr == HResult::E_OUTOFMEMORY {
                OleError::ForeignAllocationFailed
            } else {
                OleError::ArrayQueryFailed { hr }
            }
        })?;
        Ok(Self {
            platform: self.platform,
            handle: copy,
        })
    }

    /// Give up ownership without destroying
    pub fn into_raw(self) -> ArrayHandle {
        ManuallyDrop::new(self).handle
    }
}

impl<P: Platform + ?Sized> Drop for OwnedArray<'_, P> {
    fn drop(&mut self) {
        if let Err(hr) = self.platform.array_destroy(self.handle) {
            debug!(hr = %hr, "Array destroy failed");
        }
    }
}

impl<P: Platform + ?Sized> std::fmt::Debug for OwnedArray<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OwnedArray({:p})", self.handle.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VarType;
    use crate::interop::SimulatedPlatform;

    #[test]
    fn test_destroyed_on_drop() {
        let platform = SimulatedPlatform::new();
        let handle = platform.array_create_vector(VarType::I4, 0, 3).unwrap();
        {
            let _owned = unsafe { OwnedArray::from_raw(&platform, handle) };
            assert!(platform.is_live(handle));
        }
        assert!(!platform.is_live(handle));
    }

    #[test]
    fn test_clone_is_independent() {
        let platform = SimulatedPlatform::new();
        let handle = platform.array_from_values(VarType::UI1, 0, &[1u8, 2]).unwrap();
        let owned = unsafe { OwnedArray::from_raw(&platform, handle) };
        let copy = owned.try_clone().unwrap();
        assert_ne!(copy.handle(), owned.handle());
        drop(owned);
        assert!(platform.is_live(copy.handle()));
        assert_eq!(platform.live_arrays(), 1);
    }

    #[test]
    fn test_clone_failure() {
        let platform = SimulatedPlatform::new();
        let handle = platform.array_create_vector(VarType::I2, 0, 1).unwrap();
        let owned = unsafe { OwnedArray::from_raw(&platform, handle) };
        platform.fail_array_allocation(true);
        assert!(matches!(owned.try_clone(), Err(OleError::ForeignAllocationFailed)));
    }

    #[test]
    fn test_into_raw_keeps_array() {
        let platform = SimulatedPlatform::new();
        let handle = platform.array_create_vector(VarType::I2, 0, 1).unwrap();
        let raw = unsafe { OwnedArray::from_raw(&platform, handle) }.into_raw();
        assert!(platform.is_live(raw));
        platform.array_destroy(raw).unwrap();
    }
}
