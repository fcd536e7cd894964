//! Identifier codec and the foreign scalar types
//!
//! Nothing in here touches the foreign runtime; every conversion is a pure
//! function of its input.

pub mod guid;
pub mod types;

pub use guid::{ForeignGuid, Guid, IID_IDISPATCH, IID_IUNKNOWN};
pub use types::{ClsCtx, HResult, VarType};
