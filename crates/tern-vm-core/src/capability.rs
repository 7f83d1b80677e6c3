//! Promise capabilities and the capability factory.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::VmContext;
use crate::error::{VmError, VmResult};
use crate::function::FunctionKind;
use crate::value::Value;

/// `PromiseCapability` record: a promise bundled with the functions that
/// settle it
#[derive(Clone, Debug)]
pub struct PromiseCapability {
    /// The promise (any object the constructor returned)
    pub promise: Value,
    /// Resolves `promise`
    pub resolve: Value,
    /// Rejects `promise`
    pub reject: Value,
}

#[derive(Debug, Default)]
struct CapabilitySlots {
    resolve: Value,
    reject: Value,
}

/// Internal slots of the executor passed to a constructor by
/// [`VmContext::new_promise_capability`]
#[derive(Clone, Debug, Default)]
pub struct CapabilityExecutor {
    slots: Rc<RefCell<CapabilitySlots>>,
}

impl CapabilityExecutor {
    /// GetCapabilitiesExecutor body. A slot may only be written while it
    /// still holds undefined.
    pub(crate) fn call(&self, resolve: Value, reject: Value) -> VmResult<()> {
        let mut slots = self.slots.borrow_mut();
        if !slots.resolve.is_undefined() {
            return Err(VmError::type_error("Promise executor has already been invoked"));
        }
        if !slots.reject.is_undefined() {
            return Err(VmError::type_error("Promise executor has already been invoked"));
        }
        slots.resolve = resolve;
        slots.reject = reject;
        Ok(())
    }

    fn take(&self) -> (Value, Value) {
        let slots = self.slots.borrow();
        (slots.resolve.clone(), slots.reject.clone())
    }
}

impl VmContext {
    /// NewPromiseCapability(C)
    pub fn new_promise_capability(&mut self, constructor: &Value) -> VmResult<PromiseCapability> {
        if !self.is_constructor(constructor) {
            return Err(VmError::type_error(format!(
                "{} is not a constructor",
                self.describe(constructor)
            )));
        }

        let executor = CapabilityExecutor::default();
        let executor_fn =
            self.create_builtin_function("", 2, FunctionKind::CapabilityExecutor(executor.clone()));
        let promise = self.construct(constructor, &[executor_fn], None)?;

        let (resolve, reject) = executor.take();
        if !self.is_callable(&resolve) {
            return Err(VmError::type_error("Promise resolve function is not callable"));
        }
        if !self.is_callable(&reject) {
            return Err(VmError::type_error("Promise reject function is not callable"));
        }
        Ok(PromiseCapability {
            promise,
            resolve,
            reject,
        })
    }

    /// IfAbruptRejectPromise: reject `capability` with the error and hand
    /// back its promise. Fails only if the reject function itself throws.
    pub fn reject_capability(
        &mut self,
        capability: &PromiseCapability,
        err: VmError,
    ) -> VmResult<Value> {
        let reason = self.error_to_value(err);
        self.call(&capability.reject, &Value::Undefined, &[reason])?;
        Ok(capability.promise.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::PromiseState;

    #[test]
    fn test_executor_rejects_second_call() {
        let executor = CapabilityExecutor::default();
        executor.call(Value::int32(1), Value::Undefined).unwrap();
        let err = executor.call(Value::int32(2), Value::int32(3)).unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }

    #[test]
    fn test_executor_tolerates_undefined_first_call() {
        let executor = CapabilityExecutor::default();
        executor.call(Value::Undefined, Value::Undefined).unwrap();
        executor.call(Value::int32(1), Value::int32(2)).unwrap();
        assert_eq!(executor.take(), (Value::int32(1), Value::int32(2)));
    }

    #[test]
    fn test_capability_from_intrinsic_promise() {
        let mut ctx = VmContext::new();
        let promise_ctor = ctx.promise_constructor();
        let capability = ctx.new_promise_capability(&promise_ctor).unwrap();
        assert_eq!(ctx.promise_state(&capability.promise), Some(PromiseState::Pending));
        ctx.call(&capability.resolve, &Value::Undefined, &[Value::int32(7)])
            .unwrap();
        assert_eq!(ctx.promise_result(&capability.promise), Some(Value::int32(7)));
    }

    #[test]
    fn test_non_constructor_is_type_error() {
        let mut ctx = VmContext::new();
        let f = ctx.create_native_function("f", 0, |_, _, _| Ok(Value::Undefined));
        assert!(matches!(
            ctx.new_promise_capability(&f),
            Err(VmError::TypeError(_))
        ));
        assert!(matches!(
            ctx.new_promise_capability(&Value::int32(1)),
            Err(VmError::TypeError(_))
        ));
    }

    #[test]
    fn test_constructor_that_never_calls_executor() {
        let mut ctx = VmContext::new();
        let ctor = ctx.create_native_constructor("Lazy", 1, |ctx, _, _| Ok(ctx.create_object()));
        let err = ctx.new_promise_capability(&ctor).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Promise resolve function is not callable");
    }
}
