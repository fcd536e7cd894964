//! Foreign strings scoped to a single call

use super::platform::{Bstr, Platform};
use crate::errors::{OleError, Result};
use crate::logging;

/// A BSTR allocated for the duration of one call
///
/// Freed on drop, so every exit path (including `?`) releases it.
pub struct ForeignString<'p, P: Platform + ?Sized> {
    platform: &'p P,
    bstr: Bstr,
}

impl<'p, P: Platform + ?Sized> ForeignString<'p, P> {
    pub fn new(platform: &'p P, text: &str) -> Result<Self> {
        let bstr = platform
            .alloc_string(text)
            .ok_or(OleError::ForeignAllocationFailed)?;
        logging::log_string_allocated(text.encode_utf16().count());
        Ok(Self { platform, bstr })
    }

    #[inline]
    pub fn as_bstr(&self) -> Bstr {
        self.bstr
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u16 {
        self.bstr.as_ptr()
    }
}

impl<P: Platform + ?Sized> Drop for ForeignString<'_, P> {
    fn drop(&mut self) {
        self.platform.free_string(self.bstr);
        logging::log_string_freed();
    }
}

/// Copies a BSTR into a native string
///
/// Reads the byte-length prefix stored in the four bytes before the first
/// character. Unpaired surrogates become U+FFFD. Null reads as "".
///
/// # Safety
/// `ptr` must be null or a live BSTR.
pub unsafe fn read_bstr(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let prefix = (ptr as *const u8).sub(4) as *const u32;
    let bytes = prefix.read_unaligned() as usize;
    let units = core::slice::from_raw_parts(ptr, bytes / 2);
    String::from_utf16_lossy(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interop::SimulatedPlatform;

    #[test]
    fn test_string_freed_on_drop() {
        let platform = SimulatedPlatform::new();
        {
            let s = ForeignString::new(&platform, "remote-host").unwrap();
            assert_eq!(unsafe { read_bstr(s.as_ptr()) }, "remote-host");
            assert_eq!(platform.live_strings(), 1);
        }
        assert_eq!(platform.live_strings(), 0);
    }

    #[test]
    fn test_allocation_failure() {
        let platform = SimulatedPlatform::new();
        platform.fail_string_allocation(true);
        assert!(matches!(
            ForeignString::new(&platform, "x"),
            Err(OleError::ForeignAllocationFailed)
        ));
    }

    #[test]
    fn test_read_null_and_empty() {
        let platform = SimulatedPlatform::new();
        let empty = ForeignString::new(&platform, "").unwrap();
        unsafe {
            assert_eq!(read_bstr(core::ptr::null()), "");
            assert_eq!(read_bstr(empty.as_ptr()), "");
        }
    }

    #[test]
    fn test_read_non_ascii() {
        let platform = SimulatedPlatform::new();
        let s = ForeignString::new(&platform, "Überwachung ✓").unwrap();
        assert_eq!(unsafe { read_bstr(s.as_ptr()) }, "Überwachung ✓");
    }
}
