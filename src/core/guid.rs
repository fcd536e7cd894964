//! 128-bit identifiers in canonical and foreign ABI form
//!
//! The canonical form is the 16 bytes in textual order
//! (`00020400-0000-0000-C000-000000000046` → `00 02 04 00 00 00 ...`).
//! The foreign form splits the same value into one 32-bit field, two 16-bit
//! fields and an 8-byte tail, and the three leading fields are native
//! integers, so their byte order in memory depends on the host.

use crate::errors::OleError;
use std::fmt;
use std::str::FromStr;

/// Canonical byte-ordered identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid(pub [u8; 16]);

/// Foreign ABI layout of an identifier (GUID / IID / CLSID)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(C)]
pub struct ForeignGuid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

/// IUnknown
pub const IID_IUNKNOWN: Guid = Guid::from_u128(0x00000000_0000_0000_C000_000000000046);

/// IDispatch
pub const IID_IDISPATCH: Guid = Guid::from_u128(0x00020400_0000_0000_C000_000000000046);

impl Guid {
    pub const NIL: Self = Self([0; 16]);

    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Big-endian: the most significant byte is the first byte of the text form
    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    #[inline]
    pub const fn as_u128(&self) -> u128 {
        u128::from_be_bytes(self.0)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    #[inline]
    pub const fn is_nil(&self) -> bool {
        self.as_u128() == 0
    }

    /// Canonical → foreign layout. Pure, never fails.
    pub const fn to_foreign(&self) -> ForeignGuid {
        let b = &self.0;
        ForeignGuid {
            data1: (b[0] as u32) << 24 | (b[1] as u32) << 16 | (b[2] as u32) << 8 | b[3] as u32,
            data2: (b[4] as u16) << 8 | b[5] as u16,
            data3: (b[6] as u16) << 8 | b[7] as u16,
            data4: [b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]],
        }
    }

    /// Foreign layout → canonical. Pure, never fails.
    pub const fn from_foreign(id: &ForeignGuid) -> Self {
        let d1 = id.data1.to_be_bytes();
        let d2 = id.data2.to_be_bytes();
        let d3 = id.data3.to_be_bytes();
        let t = id.data4;
        Self([
            d1[0], d1[1], d1[2], d1[3], d2[0], d2[1], d3[0], d3[1],
            t[0], t[1], t[2], t[3], t[4], t[5], t[6], t[7],
        ])
    }
}

impl From<ForeignGuid> for Guid {
    fn from(id: ForeignGuid) -> Self {
        Guid::from_foreign(&id)
    }
}

impl From<Guid> for ForeignGuid {
    fn from(id: Guid) -> Self {
        id.to_foreign()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl FromStr for Guid {
    type Err = OleError;

    /// Registry form, braces optional, case-insensitive
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || OleError::InvalidIdentifier(text.to_string());

        let inner = match (text.starts_with('{'), text.ends_with('}')) {
            (true, true) if text.len() >= 2 => &text[1..text.len() - 1],
            (false, false) => text,
            _ => return Err(invalid()),
        };

        let raw = inner.as_bytes();
        if raw.len() != 36 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 16];
        let mut out = 0;
        let mut i = 0;
        while i < raw.len() {
            if matches!(i, 8 | 13 | 18 | 23) {
                if raw[i] != b'-' {
                    return Err(invalid());
                }
                i += 1;
                continue;
            }
            let hi = hex_digit(raw[i]).ok_or_else(invalid)?;
            let lo = hex_digit(raw[i + 1]).ok_or_else(invalid)?;
            bytes[out] = hi << 4 | lo;
            out += 1;
            i += 2;
        }

        Ok(Self(bytes))
    }
}

#[inline]
fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_field_order() {
        let id: Guid = "00112233-4455-6677-8899-AABBCCDDEEFF".parse().unwrap();
        let foreign = id.to_foreign();
        assert_eq!(foreign.data1, 0x0011_2233);
        assert_eq!(foreign.data2, 0x4455);
        assert_eq!(foreign.data3, 0x6677);
        assert_eq!(foreign.data4, [0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(Guid::from_foreign(&foreign), id);
    }

    #[test]
    fn test_foreign_layout_size() {
        assert_eq!(core::mem::size_of::<ForeignGuid>(), 16);
        assert_eq!(core::mem::align_of::<ForeignGuid>(), 4);
    }

    #[test]
    fn test_well_known_ids() {
        assert_eq!(IID_IUNKNOWN.to_string(), "00000000-0000-0000-C000-000000000046");
        let dispatch = IID_IDISPATCH.to_foreign();
        assert_eq!(dispatch.data1, 0x0002_0400);
        assert_eq!(dispatch.data4[0], 0xC0);
        assert_eq!(dispatch.data4[7], 0x46);
    }

    #[test]
    fn test_parse_braces_and_case() {
        let a: Guid = "{00020400-0000-0000-c000-000000000046}".parse().unwrap();
        assert_eq!(a, IID_IDISPATCH);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "{}",
            "{00020400-0000-0000-C000-000000000046",
            "00020400_0000-0000-C000-000000000046",
            "00020400-0000-0000-C000-00000000004G",
            "00020400-0000-0000-C000-0000000000460",
        ] {
            assert!(bad.parse::<Guid>().is_err(), "accepted {:?}", bad);
        }
    }
}
