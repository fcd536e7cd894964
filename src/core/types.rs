//! Foreign status codes, element-kind tags and activation context flags
//!
//! All three are transparent newtypes over the integer the foreign ABI uses,
//! so values outside the named set survive a round trip untouched.

use std::fmt;

/// Foreign status code (HRESULT)
///
/// Zero is success. Negative values are failures. Positive values other than
/// zero are informational successes, which the activation protocol still
/// treats as "not S_OK".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct HResult(pub i32);

impl HResult {
    pub const S_OK: Self = Self(0);
    pub const S_FALSE: Self = Self(1);
    pub const CO_S_NOTALLINTERFACES: Self = Self(0x0008_0012);
    pub const E_NOTIMPL: Self = Self(0x8000_4001_u32 as i32);
    pub const E_NOINTERFACE: Self = Self(0x8000_4002_u32 as i32);
    pub const E_POINTER: Self = Self(0x8000_4003_u32 as i32);
    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    pub const E_UNEXPECTED: Self = Self(0x8000_FFFF_u32 as i32);
    pub const E_ACCESSDENIED: Self = Self(0x8007_0005_u32 as i32);
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    pub const DISP_E_BADVARTYPE: Self = Self(0x8002_0008_u32 as i32);
    pub const DISP_E_BADINDEX: Self = Self(0x8002_000B_u32 as i32);
    pub const DISP_E_ARRAYISLOCKED: Self = Self(0x8002_000D_u32 as i32);
    pub const REGDB_E_CLASSNOTREG: Self = Self(0x8004_0154_u32 as i32);
    pub const CO_E_CLASSSTRING: Self = Self(0x8004_01F3_u32 as i32);
    pub const CO_E_SERVER_EXEC_FAILURE: Self = Self(0x8008_0005_u32 as i32);
    pub const RPC_S_SERVER_UNAVAILABLE: Self = Self(0x8007_06BA_u32 as i32);

    /// Exactly `S_OK`
    #[inline]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Severity bit clear
    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// `Ok(())` for `S_OK`, the code itself otherwise
    #[inline]
    pub fn ok(self) -> Result<(), HResult> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub const fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::S_OK => "S_OK",
            Self::S_FALSE => "S_FALSE",
            Self::CO_S_NOTALLINTERFACES => "CO_S_NOTALLINTERFACES",
            Self::E_NOTIMPL => "E_NOTIMPL",
            Self::E_NOINTERFACE => "E_NOINTERFACE",
            Self::E_POINTER => "E_POINTER",
            Self::E_FAIL => "E_FAIL",
            Self::E_UNEXPECTED => "E_UNEXPECTED",
            Self::E_ACCESSDENIED => "E_ACCESSDENIED",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::DISP_E_BADVARTYPE => "DISP_E_BADVARTYPE",
            Self::DISP_E_BADINDEX => "DISP_E_BADINDEX",
            Self::DISP_E_ARRAYISLOCKED => "DISP_E_ARRAYISLOCKED",
            Self::REGDB_E_CLASSNOTREG => "REGDB_E_CLASSNOTREG",
            Self::CO_E_CLASSSTRING => "CO_E_CLASSSTRING",
            Self::CO_E_SERVER_EXEC_FAILURE => "CO_E_SERVER_EXEC_FAILURE",
            Self::RPC_S_SERVER_UNAVAILABLE => "RPC_S_SERVER_UNAVAILABLE",
            _ => return None,
        })
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:08X} ({})", self.0 as u32, name),
            None => write!(f, "0x{:08X}", self.0 as u32),
        }
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult({})", self)
    }
}

impl From<i32> for HResult {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

/// Variant / array element kind tag (VARTYPE)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct VarType(pub u16);

impl VarType {
    pub const EMPTY: Self = Self(0);
    pub const NULL: Self = Self(1);
    pub const I2: Self = Self(2);
    pub const I4: Self = Self(3);
    pub const R4: Self = Self(4);
    pub const R8: Self = Self(5);
    pub const CY: Self = Self(6);
    pub const DATE: Self = Self(7);
    pub const BSTR: Self = Self(8);
    pub const DISPATCH: Self = Self(9);
    pub const ERROR: Self = Self(10);
    pub const BOOL: Self = Self(11);
    pub const VARIANT: Self = Self(12);
    pub const UNKNOWN: Self = Self(13);
    pub const DECIMAL: Self = Self(14);
    pub const I1: Self = Self(16);
    pub const UI1: Self = Self(17);
    pub const UI2: Self = Self(18);
    pub const UI4: Self = Self(19);
    pub const I8: Self = Self(20);
    pub const UI8: Self = Self(21);
    pub const INT: Self = Self(22);
    pub const UINT: Self = Self(23);
    pub const RECORD: Self = Self(36);

    /// Modifier bits
    pub const VECTOR: u16 = 0x1000;
    pub const ARRAY: u16 = 0x2000;
    pub const BYREF: u16 = 0x4000;
    const TYPEMASK: u16 = 0x0FFF;

    /// Kind with the modifier bits stripped
    #[inline]
    pub const fn base(self) -> Self {
        Self(self.0 & Self::TYPEMASK)
    }

    /// `VT_ARRAY` set
    #[inline]
    pub const fn is_array(self) -> bool {
        self.0 & Self::ARRAY != 0
    }

    #[inline]
    pub const fn is_byref(self) -> bool {
        self.0 & Self::BYREF != 0
    }

    /// `VT_ARRAY | self`
    #[inline]
    pub const fn array_of(self) -> Self {
        Self(self.0 | Self::ARRAY)
    }

    /// One of the eight fixed-width integer kinds a concrete array may hold
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I1 | Self::UI1 | Self::I2 | Self::UI2 | Self::I4 | Self::UI4 | Self::I8 | Self::UI8
        )
    }

    /// Reference-counted object kinds
    #[inline]
    pub const fn is_object(self) -> bool {
        matches!(self, Self::UNKNOWN | Self::DISPATCH)
    }

    /// Storage width of one element, for the kinds this crate can store
    pub const fn element_size(self) -> Option<usize> {
        Some(match self {
            Self::I1 | Self::UI1 => 1,
            Self::I2 | Self::UI2 | Self::BOOL => 2,
            Self::I4 | Self::UI4 | Self::INT | Self::UINT | Self::R4 | Self::ERROR => 4,
            Self::I8 | Self::UI8 | Self::R8 | Self::CY | Self::DATE => 8,
            Self::BSTR | Self::UNKNOWN | Self::DISPATCH => core::mem::size_of::<usize>(),
            Self::VARIANT => core::mem::size_of::<crate::interop::RawVariant>(),
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self.base() {
            Self::EMPTY => "VT_EMPTY",
            Self::NULL => "VT_NULL",
            Self::I2 => "VT_I2",
            Self::I4 => "VT_I4",
            Self::R4 => "VT_R4",
            Self::R8 => "VT_R8",
            Self::CY => "VT_CY",
            Self::DATE => "VT_DATE",
            Self::BSTR => "VT_BSTR",
            Self::DISPATCH => "VT_DISPATCH",
            Self::ERROR => "VT_ERROR",
            Self::BOOL => "VT_BOOL",
            Self::VARIANT => "VT_VARIANT",
            Self::UNKNOWN => "VT_UNKNOWN",
            Self::DECIMAL => "VT_DECIMAL",
            Self::I1 => "VT_I1",
            Self::UI1 => "VT_UI1",
            Self::UI2 => "VT_UI2",
            Self::UI4 => "VT_UI4",
            Self::I8 => "VT_I8",
            Self::UI8 => "VT_UI8",
            Self::INT => "VT_INT",
            Self::UINT => "VT_UINT",
            Self::RECORD => "VT_RECORD",
            _ => "VT_?",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if self.is_array() {
            f.write_str("|VT_ARRAY")?;
        }
        if self.is_byref() {
            f.write_str("|VT_BYREF")?;
        }
        if self.name() == "VT_?" {
            write!(f, "({})", self.base().0)?;
        }
        Ok(())
    }
}

impl fmt::Debug for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarType({})", self)
    }
}

/// Activation context flags (CLSCTX)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(transparent)]
pub struct ClsCtx(pub u32);

impl ClsCtx {
    pub const INPROC_SERVER: Self = Self(0x1);
    pub const INPROC_HANDLER: Self = Self(0x2);
    pub const LOCAL_SERVER: Self = Self(0x4);
    pub const REMOTE_SERVER: Self = Self(0x10);
    /// In-process, local or remote server: the context used for local activation
    pub const SERVER: Self = Self(0x1 | 0x4 | 0x10);
    pub const ALL: Self = Self(0x1 | 0x2 | 0x4 | 0x10);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for ClsCtx {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hresult_display() {
        assert_eq!(HResult::E_NOINTERFACE.to_string(), "0x80004002 (E_NOINTERFACE)");
        assert_eq!(HResult(0x8001_2345_u32 as i32).to_string(), "0x80012345");
    }

    #[test]
    fn test_hresult_ok() {
        assert!(HResult::S_OK.ok().is_ok());
        assert_eq!(HResult::S_FALSE.ok(), Err(HResult::S_FALSE));
        assert!(HResult::S_FALSE.is_success());
        assert!(!HResult::E_FAIL.is_success());
    }

    #[test]
    fn test_vartype_modifiers() {
        let vt = VarType::VARIANT.array_of();
        assert!(vt.is_array());
        assert_eq!(vt.base(), VarType::VARIANT);
        assert_eq!(vt.to_string(), "VT_VARIANT|VT_ARRAY");
    }

    #[test]
    fn test_integer_kinds() {
        let ints = [
            VarType::I1, VarType::UI1, VarType::I2, VarType::UI2,
            VarType::I4, VarType::UI4, VarType::I8, VarType::UI8,
        ];
        assert!(ints.iter().all(|vt| vt.is_integer()));
        assert!(!VarType::INT.is_integer());
        assert!(!VarType::R8.is_integer());
        assert!(!VarType::VARIANT.is_integer());
    }

    #[test]
    fn test_server_context() {
        assert!(ClsCtx::SERVER.contains(ClsCtx::REMOTE_SERVER));
        assert!(!ClsCtx::SERVER.contains(ClsCtx::INPROC_HANDLER));
        assert_eq!(ClsCtx::INPROC_SERVER | ClsCtx::LOCAL_SERVER, ClsCtx(0x5));
    }
}
