//! Native values produced by conversion

use crate::core::{HResult, VarType};
use crate::interop::ObjectRef;

/// A converted VARIANT
///
/// `Object` tokens own a reference each. Dropping a value does not give
/// them back; use [`NativeValue::release_objects`].
#[derive(Debug, PartialEq)]
pub enum NativeValue {
    Empty,
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// VT_ERROR
    Error(HResult),
    String(String),
    Object(ObjectRef),
    Array(NativeArray),
}

/// A converted one-dimensional array
#[derive(Debug, PartialEq)]
pub enum NativeArray {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    Variant(Vec<NativeValue>),
}

impl NativeValue {
    /// The variant kind this value came from
    pub fn kind(&self) -> VarType {
        match self {
            Self::Empty => VarType::EMPTY,
            Self::Null => VarType::NULL,
            Self::Bool(_) => VarType::BOOL,
            Self::I8(_) => VarType::I1,
            Self::U8(_) => VarType::UI1,
            Self::I16(_) => VarType::I2,
            Self::U16(_) => VarType::UI2,
            Self::I32(_) => VarType::I4,
            Self::U32(_) => VarType::UI4,
            Self::I64(_) => VarType::I8,
            Self::U64(_) => VarType::UI8,
            Self::F32(_) => VarType::R4,
            Self::F64(_) => VarType::R8,
            Self::Error(_) => VarType::ERROR,
            Self::String(_) => VarType::BSTR,
            Self::Object(object) => match object.kind() {
                crate::interop::ObjectKind::Unknown => VarType::UNKNOWN,
                crate::interop::ObjectKind::Dispatch => VarType::DISPATCH,
            },
            Self::Array(array) => array.element_kind().array_of(),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Release every object token in this value, nested arrays included.
    /// Returns how many were released.
    pub fn release_objects(self) -> usize {
        match self {
            Self::Object(object) => {
                object.release();
                1
            }
            Self::Array(array) => array.release_objects(),
            _ => 0,
        }
    }
}

impl NativeArray {
    pub fn element_kind(&self) -> VarType {
        match self {
            Self::U8(_) => VarType::UI1,
            Self::I8(_) => VarType::I1,
            Self::U16(_) => VarType::UI2,
            Self::I16(_) => VarType::I2,
            Self::U32(_) => VarType::UI4,
            Self::I32(_) => VarType::I4,
            Self::U64(_) => VarType::UI8,
            Self::I64(_) => VarType::I8,
            Self::Variant(_) => VarType::VARIANT,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::Variant(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn release_objects(self) -> usize {
        match self {
            Self::Variant(values) => values.into_iter().map(NativeValue::release_objects).sum(),
            _ => 0,
        }
    }
}

impl From<NativeArray> for NativeValue {
    fn from(array: NativeArray) -> Self {
        Self::Array(array)
    }
}
