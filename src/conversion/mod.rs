//! SAFEARRAY / VARIANT conversion engine
//!
//! Arrays are checked in a fixed order: dimension count, element kind,
//! bounds. Only then is any element read. Fixed-width integer arrays are
//! copied element by element into a native vector; variant arrays are read
//! one VARIANT at a time, converted recursively and cleared.
//!
//! Reference counts: every object handed out by this module carries one
//! reference the caller owns. The source VARIANT or array is never consumed.

mod owned;
mod value;

pub use owned::OwnedArray;
pub use value::{NativeArray, NativeValue};

use crate::core::{HResult, VarType};
use crate::errors::{Converted, FirstError, OleError, Result};
use crate::interop::{read_bstr, ArrayBounds, ArrayHandle, ForeignString, ObjectKind, ObjectRef, Platform, RawVariant};
use crate::logging::{self, debug, perf};
use core::ffi::c_void;

/// Converts foreign arrays and variants through a platform layer
pub struct Converter<P: Platform> {
    platform: P,
}

impl<P: Platform> Converter<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Convert one VARIANT
    ///
    /// Array variants are converted through [`Converter::array_to_native`];
    /// an object payload comes back with a new reference. By-reference
    /// variants of any kind are rejected. `variant` is left
    /// as it was and still has to be cleared by the caller.
    ///
    /// # Safety
    /// `variant` must be well formed: its payload must match its tag, and any
    /// pointer in it must be null or live.
    pub unsafe fn variant_to_native(&self, variant: &RawVariant) -> Result<Converted<NativeValue>> {
        if variant.vt.is_byref() {
            return Err(OleError::UnsupportedVariantKind { kind: variant.vt });
        }
        if variant.is_array() {
            let array = ArrayHandle::from_raw(variant.payload.array).ok_or(OleError::ArrayQueryFailed {
                hr: HResult::E_POINTER,
            })?;
            return Ok(self.array_to_native(array)?.map(NativeValue::Array));
        }
        self.scalar_to_native(variant).map(Converted::complete)
    }

    /// Convert a one-dimensional array of either family
    pub fn array_to_native(&self, array: ArrayHandle) -> Result<Converted<NativeArray>> {
        let (kind, bounds) = self.describe(array)?;
        if kind == VarType::VARIANT {
            Ok(self.convert_variants(array, bounds)?.map(NativeArray::Variant))
        } else {
            self.convert_concrete(array, kind, bounds)
        }
    }

    /// Convert a fixed-width integer array; variant arrays are rejected
    pub fn array_to_concrete(&self, array: ArrayHandle) -> Result<Converted<NativeArray>> {
        let (kind, bounds) = self.describe(array)?;
        if kind == VarType::VARIANT {
            return Err(OleError::VariantArrayUnexpected);
        }
        self.convert_concrete(array, kind, bounds)
    }

    /// Convert a variant array; any other element kind is rejected
    pub fn array_to_variants(&self, array: ArrayHandle) -> Result<Converted<Vec<NativeValue>>> {
        let (kind, bounds) = self.describe(array)?;
        if kind != VarType::VARIANT {
            return Err(OleError::NonVariantArrayUnexpected);
        }
        self.convert_variants(array, bounds)
    }

    /// Build a one-dimensional BSTR array holding `strings`
    ///
    /// The array starts at index 0. On any failure the partial array is
    /// destroyed before returning.
    pub fn strings_to_array<S: AsRef<str>>(&self, strings: &[S]) -> Result<OwnedArray<'_, P>> {
        let count = u32::try_from(strings.len()).map_err(|_| OleError::ForeignAllocationFailed)?;
        let handle = self
            .platform
            .array_create_vector(VarType::BSTR, 0, count)
            .ok_or(OleError::ForeignAllocationFailed)?;
        // SAFETY: freshly created, owned by nothing else
        let array = unsafe { OwnedArray::from_raw(&self.platform, handle) };

        for (position, text) in strings.iter().enumerate() {
            let element = ForeignString::new(&self.platform, text.as_ref())?;
            // SAFETY: BSTR arrays take the string pointer itself and store a copy
            unsafe {
                self.platform
                    .array_put_element(handle, position as i32, element.as_ptr() as *const c_void)
            }
            .map_err(|hr| OleError::ElementWriteFailed { index: position, hr })?;
        }
        Ok(array)
    }

    fn describe(&self, array: ArrayHandle) -> Result<(VarType, ArrayBounds)> {
        let dimensions = self.platform.array_dimensions(array);
        if dimensions != 1 {
            return Err(OleError::MultiDimensionalArray { dimensions });
        }
        let kind = self
            .platform
            .array_element_kind(array)
            .map_err(|hr| OleError::ArrayQueryFailed { hr })?;
        let bounds = self
            .platform
            .array_bounds(array, 0)
            .map_err(|hr| OleError::ArrayQueryFailed { hr })?;
        Ok((kind, bounds))
    }

    fn convert_concrete(&self, array: ArrayHandle, kind: VarType, bounds: ArrayBounds) -> Result<Converted<NativeArray>> {
        let _perf = perf::track("array_to_concrete");
        logging::log_array_conversion(kind, bounds.count);
        // SAFETY: each arm copies into elements of the kind's exact width
        let converted = unsafe {
            match kind {
                VarType::UI1 => self.copy_elements::<u8>(array, bounds).map(NativeArray::U8),
                VarType::I1 => self.copy_elements::<i8>(array, bounds).map(NativeArray::I8),
                VarType::UI2 => self.copy_elements::<u16>(array, bounds).map(NativeArray::U16),
                VarType::I2 => self.copy_elements::<i16>(array, bounds).map(NativeArray::I16),
                VarType::UI4 => self.copy_elements::<u32>(array, bounds).map(NativeArray::U32),
                VarType::I4 => self.copy_elements::<i32>(array, bounds).map(NativeArray::I32),
                VarType::UI8 => self.copy_elements::<u64>(array, bounds).map(NativeArray::U64),
                VarType::I8 => self.copy_elements::<i64>(array, bounds).map(NativeArray::I64),
                _ => return Err(OleError::UnsupportedArrayElementKind { kind }),
            }
        };
        Ok(converted)
    }

    /// Every element is attempted; the first read failure is kept
    unsafe fn copy_elements<T: Copy + Default>(&self, array: ArrayHandle, bounds: ArrayBounds) -> Converted<Vec<T>> {
        let mut out = vec![T::default(); bounds.len()];
        let mut first = FirstError::default();
        for (position, slot) in out.iter_mut().enumerate() {
            if let Err(hr) = self
                .platform
                .array_get_element(array, bounds.index(position), slot as *mut T as *mut c_void)
            {
                let err = OleError::ElementReadFailed { index: position, hr };
                logging::log_element_error(position, &err);
                first.record(err);
            }
        }
        Converted::partial(out, first.into_inner())
    }

    fn convert_variants(&self, array: ArrayHandle, bounds: ArrayBounds) -> Result<Converted<Vec<NativeValue>>> {
        let _perf = perf::track("array_to_variants");
        logging::log_array_conversion(VarType::VARIANT, bounds.count);

        let mut values = Vec::with_capacity(bounds.len());
        let mut first = FirstError::default();
        for position in 0..bounds.len() {
            let mut element = RawVariant::empty();
            // SAFETY: `element` is a zeroed VARIANT the runtime can write into
            let read = unsafe {
                self.platform
                    .array_get_element(array, bounds.index(position), &mut element as *mut RawVariant as *mut c_void)
            };
            if let Err(hr) = read {
                self.clear(&mut element);
                release_all(values);
                let err = OleError::ElementReadFailed { index: position, hr };
                logging::log_element_error(position, &err);
                return Err(err);
            }

            // Objects pick up their own reference here, before the clear below
            match unsafe { self.element_to_native(&element) } {
                Ok(value) => values.push(value),
                Err(source) => {
                    let err = OleError::ElementConversionFailed {
                        index: position,
                        source: Box::new(source),
                    };
                    logging::log_element_error(position, &err);
                    first.record(err);
                }
            }
            self.clear(&mut element);
        }
        Ok(Converted::partial(values, first.into_inner()))
    }

    /// A nested array that converts only partly counts as a failed element
    unsafe fn element_to_native(&self, element: &RawVariant) -> Result<NativeValue> {
        match self.variant_to_native(element)?.into_parts() {
            (value, None) => Ok(value),
            (partial, Some(err)) => {
                partial.release_objects();
                Err(err)
            }
        }
    }

    unsafe fn scalar_to_native(&self, variant: &RawVariant) -> Result<NativeValue> {
        let payload = &variant.payload;
        Ok(match variant.vt {
            VarType::EMPTY => NativeValue::Empty,
            VarType::NULL => NativeValue::Null,
            VarType::BOOL => NativeValue::Bool(payload.boolean != 0),
            VarType::I1 => NativeValue::I8(payload.i8),
            VarType::UI1 => NativeValue::U8(payload.u8),
            VarType::I2 => NativeValue::I16(payload.i16),
            VarType::UI2 => NativeValue::U16(payload.u16),
            VarType::I4 | VarType::INT => NativeValue::I32(payload.i32),
            VarType::UI4 | VarType::UINT => NativeValue::U32(payload.u32),
            VarType::I8 => NativeValue::I64(payload.i64),
            VarType::UI8 => NativeValue::U64(payload.u64),
            VarType::R4 => NativeValue::F32(payload.f32),
            VarType::R8 => NativeValue::F64(payload.f64),
            VarType::ERROR => NativeValue::Error(HResult(payload.scode)),
            VarType::BSTR => NativeValue::String(read_bstr(payload.bstr)),
            VarType::UNKNOWN => object_value(payload.unknown, ObjectKind::Unknown),
            VarType::DISPATCH => object_value(payload.unknown, ObjectKind::Dispatch),
            kind => return Err(OleError::UnsupportedVariantKind { kind }),
        })
    }

    fn clear(&self, element: &mut RawVariant) {
        // SAFETY: `element` was filled by the runtime and owns its payload
        if let Err(hr) = unsafe { self.platform.variant_clear(element) } {
            debug!(hr = %hr, "Variant clear failed");
        }
    }
}

unsafe fn object_value(ptr: *mut crate::interop::IUnknown, kind: ObjectKind) -> NativeValue {
    match ObjectRef::acquire_raw(ptr, kind) {
        Some(object) => NativeValue::Object(object),
        None => NativeValue::Null,
    }
}

fn release_all(values: Vec<NativeValue>) {
    for value in values {
        value.release_objects();
    }
}
