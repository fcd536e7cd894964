//! Error taxonomy for activation and marshalling
//!
//! Call-level failures abort with no partial result. Per-element failures
//! inside an array loop are collected as the first error only and reported
//! next to whatever was converted, through [`Converted`].

use crate::core::{Guid, HResult, VarType};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OleError>;

#[derive(Error, Debug)]
pub enum OleError {
    /// The batched activation call itself failed
    #[error("instance activation failed: {hr}")]
    ActivationFailed { hr: HResult },

    /// The runtime reported S_OK but handed back no interface
    #[error("unable to create interface instance")]
    CreationFailed,

    /// A requested interface came back with its own failure status
    #[error("interface {iid} unavailable: {hr}")]
    InterfaceRequestFailed { iid: Guid, hr: HResult },

    #[error("no interfaces requested")]
    NoInterfacesRequested,

    /// A foreign string or array allocation returned null
    #[error("foreign allocation failed")]
    ForeignAllocationFailed,

    #[error("array has {dimensions} dimensions; only one-dimensional arrays are supported")]
    MultiDimensionalArray { dimensions: u32 },

    #[error("unsupported array element kind {kind}")]
    UnsupportedArrayElementKind { kind: VarType },

    #[error("unsupported variant kind {kind}")]
    UnsupportedVariantKind { kind: VarType },

    #[error("array contains variant members")]
    VariantArrayUnexpected,

    #[error("array contains non-variant members")]
    NonVariantArrayUnexpected,

    /// Element kind or bounds could not be queried
    #[error("unable to query array: {hr}")]
    ArrayQueryFailed { hr: HResult },

    #[error("unable to retrieve array element {index}: {hr}")]
    ElementReadFailed { index: usize, hr: HResult },

    #[error("unable to store array element {index}: {hr}")]
    ElementWriteFailed { index: usize, hr: HResult },

    #[error("unable to interpret array element {index}: {source}")]
    ElementConversionFailed {
        index: usize,
        #[source]
        source: Box<OleError>,
    },

    /// The foreign identifier parser rejected the text
    #[error("unable to parse identifier: {hr}")]
    IdentifierParse { hr: HResult },

    #[error("invalid identifier text {0:?}")]
    InvalidIdentifier(String),

    #[error("failed to load library {name}: {reason}")]
    LibraryLoad { name: String, reason: String },

    #[error("symbol {0} not found")]
    SymbolNotFound(String),

    /// No foreign runtime on this platform
    #[error("call is unsupported on this platform")]
    Unsupported,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OleError {
    /// Foreign status carried by this error, if any
    pub fn hresult(&self) -> Option<HResult> {
        match self {
            Self::ActivationFailed { hr }
            | Self::InterfaceRequestFailed { hr, .. }
            | Self::ArrayQueryFailed { hr }
            | Self::ElementReadFailed { hr, .. }
            | Self::ElementWriteFailed { hr, .. }
            | Self::IdentifierParse { hr } => Some(*hr),
            Self::ForeignAllocationFailed => Some(HResult::E_OUTOFMEMORY),
            Self::ElementConversionFailed { source, .. } => source.hresult(),
            _ => None,
        }
    }

    /// Element index for per-element errors
    pub fn element_index(&self) -> Option<usize> {
        match self {
            Self::ElementReadFailed { index, .. }
            | Self::ElementWriteFailed { index, .. }
            | Self::ElementConversionFailed { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// A conversion result that may be partial
///
/// `value` holds everything that converted; `error` holds the first
/// per-element error, if one was recorded.
#[derive(Debug)]
#[must_use]
pub struct Converted<T> {
    pub value: T,
    pub error: Option<OleError>,
}

impl<T> Converted<T> {
    #[inline]
    pub fn complete(value: T) -> Self {
        Self { value, error: None }
    }

    #[inline]
    pub fn partial(value: T, error: Option<OleError>) -> Self {
        Self { value, error }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Converted<U> {
        Converted {
            value: f(self.value),
            error: self.error,
        }
    }

    /// Drop the partial value if an error was recorded
    pub fn into_result(self) -> Result<T> {
        match self.error {
            None => Ok(self.value),
            Some(err) => Err(err),
        }
    }

    pub fn into_parts(self) -> (T, Option<OleError>) {
        (self.value, self.error)
    }
}

/// Keeps the first error of a loop that must not stop early
#[derive(Debug, Default)]
pub(crate) struct FirstError(Option<OleError>);

impl FirstError {
    #[inline]
    pub(crate) fn record(&mut self, err: OleError) {
        if self.0.is_none() {
            self.0 = Some(err);
        }
    }

    #[inline]
    pub(crate) fn into_inner(self) -> Option<OleError> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        let mut first = FirstError::default();
        first.record(OleError::ElementReadFailed { index: 1, hr: HResult::E_FAIL });
        first.record(OleError::ElementReadFailed { index: 4, hr: HResult::E_FAIL });
        assert_eq!(first.into_inner().and_then(|e| e.element_index()), Some(1));
    }

    #[test]
    fn test_converted_into_result() {
        let ok = Converted::complete(3);
        assert_eq!(ok.into_result().unwrap(), 3);

        let partial = Converted::partial(vec![1, 2], Some(OleError::CreationFailed));
        assert!(!partial.is_complete());
        assert!(matches!(partial.into_result(), Err(OleError::CreationFailed)));
    }

    #[test]
    fn test_nested_hresult() {
        let err = OleError::ElementConversionFailed {
            index: 2,
            source: Box::new(OleError::ArrayQueryFailed { hr: HResult::DISP_E_BADVARTYPE }),
        };
        assert_eq!(err.hresult(), Some(HResult::DISP_E_BADVARTYPE));
        assert_eq!(err.element_index(), Some(2));
        assert_eq!(
            err.to_string(),
            "unable to interpret array element 2: unable to query array: 0x80020008 (DISP_E_BADVARTYPE)"
        );
    }
}
