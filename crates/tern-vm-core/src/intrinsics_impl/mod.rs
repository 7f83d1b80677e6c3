//! Intrinsics implementation modules
//!
//! ## Current modules:
//! - `error` - Error.prototype and the native error type prototypes
//! - `array` - Array.prototype[@@iterator] and %ArrayIteratorPrototype%
//! - `promise` - Promise constructor, statics and prototype methods

pub mod array;
pub mod error;
pub mod promise;

use crate::context::VmContext;

/// Install every built-in method on the allocated intrinsics
pub(crate) fn install(ctx: &mut VmContext) {
    error::init_error_prototypes(ctx);
    array::init_array_prototype(ctx);
    promise::init_promise_prototype(ctx);
    promise::install_promise_statics(ctx);
}
