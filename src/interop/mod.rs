//! Interoperability - the boundary with the foreign object runtime
//!
//! Architecture:
//! - `raw.rs` - `#[repr(C)]` ABI structs (MULTI_QI, COSERVERINFO, VARIANT, IUnknown)
//! - `platform.rs` - `Platform` trait, one method per foreign entry point
//! - `library.rs` - Dynamic library loading (dlopen/LoadLibrary)
//! - `system.rs` - The real platform over ole32/oleaut32
//! - `simulated.rs` - In-process platform with failure injection (`simulated` feature)
//! - `string.rs` - Call-scoped BSTRs
//! - `object.rs` - Owned interface references

mod library;
mod object;
mod platform;
mod raw;
#[cfg(any(test, feature = "simulated"))]
mod simulated;
mod string;
mod system;

pub use library::Library;
pub use object::{ObjectKind, ObjectRef};
pub use platform::{ArrayBounds, ArrayHandle, Bstr, Platform};
pub use raw::{
    CoAuthIdentity, CoAuthInfo, CoServerInfo, IUnknown, IUnknownVtbl, MultiQi, RawVariant, VariantPayload,
};
#[cfg(any(test, feature = "simulated"))]
pub use simulated::{ActivationCall, InterfaceOutcome, SimulatedObject, SimulatedPlatform};
pub use string::{read_bstr, ForeignString};
pub use system::SystemPlatform;
