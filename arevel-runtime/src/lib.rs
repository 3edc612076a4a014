//! Arevel runtime library
//!
//! The operator dispatch matrix and the builtins generated code calls:
//! - `dispatch`: binary and unary operators over runtime values
//! - `builtins`: map construction, invocation, member access, filtering,
//!   stream generation, conditionals
//! - `Runtime`: settings shared by one evaluation

mod builtins;
mod context;
mod dispatch;
mod helpers;

pub use builtins::{attr, call_value, generate, get, Builtin};
pub use context::{Runtime, DEFAULT_MAX_STREAM_LEN};
pub use dispatch::{binary, unary};

/// Re-export core types for hosts
pub mod prelude {
    pub use crate::{Builtin, Runtime};
    pub use arevel_core::prelude::*;
}
