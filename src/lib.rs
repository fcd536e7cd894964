//! olebridge - activation and marshalling bridge to a COM/OLE-style object runtime
//!
//! Activates several interfaces of a local or remote object in one round
//! trip, and converts SAFEARRAYs and VARIANTs into native Rust values with
//! exact reference-count accounting.

// Core modules
pub mod core;
pub mod errors;
pub mod interop;

// Protocol layers
pub mod activation;
pub mod conversion;

// Infrastructure
pub mod config;
pub mod logging;

// Re-export commonly used items
pub use crate::core::{ClsCtx, ForeignGuid, Guid, HResult, VarType, IID_IDISPATCH, IID_IUNKNOWN};
pub use activation::{Activator, InterfaceResult, InterfaceResults, ServerTarget};
pub use config::BridgeConfig;
pub use conversion::{Converter, NativeArray, NativeValue, OwnedArray};
pub use errors::{Converted, OleError, Result};
pub use interop::{ArrayHandle, ObjectKind, ObjectRef, Platform, RawVariant, SystemPlatform};
#[cfg(any(test, feature = "simulated"))]
pub use interop::{SimulatedObject, SimulatedPlatform};
