//! # Tern VM Core
//!
//! Promise and job-queue core for the Tern JavaScript engine.
//!
//! ## Design Principles
//!
//! - **Single-threaded**: a `VmContext` owns its heap and job queue; jobs run to completion
//! - **Handle-based heap**: objects live in an arena and are referenced by `ObjectId`, so
//!   promises and the reactions that capture them never form reference cycles
//! - **Errors become rejections**: once a promise capability exists, every abrupt completion
//!   is turned into a rejection through `VmContext::error_to_value`

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod capability;
pub mod combinators;
pub mod context;
pub mod error;
pub mod function;
pub mod heap;
pub mod intrinsics;
pub mod intrinsics_impl;
pub mod iterator;
pub mod microtask;
pub mod object;
pub mod promise;
pub mod rejection_tracker;
pub mod value;

pub use capability::PromiseCapability;
pub use context::VmContext;
pub use error::{VmError, VmResult};
pub use heap::ObjectId;
pub use microtask::{DrainOutcome, Job, JobFailure, JobKind, JobQueue};
pub use object::{ErrorKind, PropertyKey, WellKnownSymbol};
pub use promise::PromiseState;
pub use rejection_tracker::{RejectionOperation, RejectionTracker};
pub use value::Value;
