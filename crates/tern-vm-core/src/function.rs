//! Function objects.
//!
//! Host code supplies behavior through [`NativeFn`] closures. The promise
//! machinery uses dedicated variants instead of closures so that each
//! built-in function's internal slots (its promise, its once-only flag, its
//! element index) are plain data that can be inspected and tested.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::capability::CapabilityExecutor;
use crate::combinators::ResolveElementFunction;
use crate::context::VmContext;
use crate::error::VmResult;
use crate::heap::ObjectId;
use crate::intrinsics_impl::promise::FinallyFunction;
use crate::promise::ResolvingFunction;
use crate::value::Value;

/// Host function: `(context, this, arguments) -> completion`
pub type NativeFn = Rc<dyn Fn(&mut VmContext, &Value, &[Value]) -> VmResult<Value>>;

/// Host constructor: `(context, arguments, new_target) -> completion`
pub type NativeConstructFn = Rc<dyn Fn(&mut VmContext, &[Value], ObjectId) -> VmResult<Value>>;

/// `[[Call]]` behavior of a function object
#[derive(Clone)]
pub enum FunctionKind {
    /// Host closure
    Native(NativeFn),
    /// Promise resolve function
    PromiseResolve(ResolvingFunction),
    /// Promise reject function
    PromiseReject(ResolvingFunction),
    /// `GetCapabilitiesExecutor` closure
    CapabilityExecutor(CapabilityExecutor),
    /// `Promise.all` / `Promise.allSettled` element function
    ResolveElement(ResolveElementFunction),
    /// `Promise.prototype.finally` fulfillment wrapper
    ThenFinally(FinallyFunction),
    /// `Promise.prototype.finally` rejection wrapper
    CatchFinally(FinallyFunction),
    /// Returns the captured value
    ValueThunk(Value),
    /// Throws the captured value
    Thrower(Value),
}

impl FunctionKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Native(_) => "Native",
            Self::PromiseResolve(_) => "PromiseResolve",
            Self::PromiseReject(_) => "PromiseReject",
            Self::CapabilityExecutor(_) => "CapabilityExecutor",
            Self::ResolveElement(_) => "ResolveElement",
            Self::ThenFinally(_) => "ThenFinally",
            Self::CatchFinally(_) => "CatchFinally",
            Self::ValueThunk(_) => "ValueThunk",
            Self::Thrower(_) => "Thrower",
        }
    }
}

/// Internal slots of a function object
#[derive(Clone)]
pub struct FunctionObject {
    /// `name` as reported in error messages
    pub name: Arc<str>,
    /// Declared parameter count
    pub length: u32,
    /// `[[Call]]`
    pub kind: FunctionKind,
    /// `[[Construct]]`, when the function is a constructor
    pub construct: Option<NativeConstructFn>,
}

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionObject")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("kind", &self.kind.label())
            .field("constructor", &self.construct.is_some())
            .finish()
    }
}

/// Argument at `index`, or undefined when absent
#[inline]
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}
