//! Promise constructor and prototype methods
//!
//! ## Constructor statics:
//! - `Promise.resolve(value)`
//! - `Promise.reject(reason)`
//! - `Promise.all(iterable)`
//! - `Promise.allSettled(iterable)`
//! - `Promise.race(iterable)`
//! - `Promise.withResolvers()`
//! - `get Promise[@@species]`
//!
//! ## Prototype methods:
//! - `Promise.prototype.then(onFulfilled, onRejected)`
//! - `Promise.prototype.catch(onRejected)`
//! - `Promise.prototype.finally(onFinally)`

use std::rc::Rc;

use crate::context::VmContext;
use crate::error::{VmError, VmResult};
use crate::function::{FunctionKind, NativeConstructFn, NativeFn, arg};
use crate::heap::ObjectId;
use crate::object::WellKnownSymbol;
use crate::value::Value;

// ============================================================================
// Helpers
// ============================================================================

/// SpeciesConstructor(O, defaultConstructor)
pub fn species_constructor(
    ctx: &mut VmContext,
    object: &Value,
    default_constructor: &Value,
) -> VmResult<Value> {
    let constructor = ctx.get(object, "constructor")?;
    if constructor.is_undefined() {
        return Ok(default_constructor.clone());
    }
    if !constructor.is_object() {
        return Err(VmError::type_error("object.constructor is not an object"));
    }
    let species = ctx.get(&constructor, WellKnownSymbol::Species)?;
    if species.is_nullish() {
        return Ok(default_constructor.clone());
    }
    if ctx.is_constructor(&species) {
        Ok(species)
    } else {
        Err(VmError::type_error(
            "object.constructor[Symbol.species] is not a constructor",
        ))
    }
}

/// Internal slots shared by the then-finally and catch-finally functions
#[derive(Clone, Debug)]
pub struct FinallyFunction {
    /// User callback, called with no arguments
    pub on_finally: Value,
    /// Constructor used to resolve the callback's result
    pub constructor: Value,
}

impl FinallyFunction {
    /// Then Finally Function: run `onFinally`, then fulfil with `value`
    pub(crate) fn then_finally(&self, ctx: &mut VmContext, value: Value) -> VmResult<Value> {
        let promise = self.settle_callback(ctx)?;
        let value_thunk = ctx.create_builtin_function("", 0, FunctionKind::ValueThunk(value));
        ctx.invoke(&promise, "then", &[value_thunk])
    }

    /// Catch Finally Function: run `onFinally`, then re-throw `reason`
    pub(crate) fn catch_finally(&self, ctx: &mut VmContext, reason: Value) -> VmResult<Value> {
        let promise = self.settle_callback(ctx)?;
        let thrower = ctx.create_builtin_function("", 0, FunctionKind::Thrower(reason));
        ctx.invoke(&promise, "then", &[thrower])
    }

    fn settle_callback(&self, ctx: &mut VmContext) -> VmResult<Value> {
        let result = ctx.call(&self.on_finally, &Value::Undefined, &[])?;
        ctx.promise_resolve(&self.constructor, result)
    }
}

// ============================================================================
// Constructor
// ============================================================================

/// `Promise(executor)` called without `new`
pub(crate) fn promise_call_behavior() -> NativeFn {
    Rc::new(|_: &mut VmContext, _: &Value, _: &[Value]| -> VmResult<Value> {
        Err(VmError::type_error(
            "Promise constructor cannot be invoked without 'new'",
        ))
    })
}

/// `new Promise(executor)`
pub(crate) fn promise_construct_behavior() -> NativeConstructFn {
    Rc::new(|ctx: &mut VmContext, args: &[Value], new_target: ObjectId| -> VmResult<Value> {
        let executor = arg(args, 0);
        if !ctx.is_callable(&executor) {
            return Err(VmError::type_error(format!(
                "Promise resolver {} is not a function",
                ctx.describe(&executor)
            )));
        }

        let prototype = ctx.get(&Value::Object(new_target), "prototype")?;
        let promise = ctx.create_promise(prototype.as_object());
        let (resolve, reject) = ctx.create_resolving_functions(promise);
        if let Err(err) = ctx.call(&executor, &Value::Undefined, &[resolve, reject.clone()]) {
            let reason = ctx.error_to_value(err);
            ctx.call(&reject, &Value::Undefined, &[reason])?;
        }
        Ok(Value::Object(promise))
    })
}

// ============================================================================
// Prototype
// ============================================================================

fn promise_then(ctx: &mut VmContext, this: &Value, args: &[Value]) -> VmResult<Value> {
    let promise = match this.as_object() {
        Some(id) if ctx.is_promise(this) => id,
        _ => {
            return Err(VmError::type_error(format!(
                "Method Promise.prototype.then called on incompatible receiver {}",
                ctx.describe(this)
            )));
        }
    };
    let default_constructor = ctx.promise_constructor();
    let constructor = species_constructor(ctx, this, &default_constructor)?;
    let capability = ctx.new_promise_capability(&constructor)?;
    ctx.perform_promise_then(promise, &arg(args, 0), &arg(args, 1), capability)
}

fn promise_catch(ctx: &mut VmContext, this: &Value, args: &[Value]) -> VmResult<Value> {
    ctx.invoke(this, "then", &[Value::Undefined, arg(args, 0)])
}

fn promise_finally(ctx: &mut VmContext, this: &Value, args: &[Value]) -> VmResult<Value> {
    if !this.is_object() {
        return Err(VmError::type_error(format!(
            "Method Promise.prototype.finally called on incompatible receiver {}",
            ctx.describe(this)
        )));
    }
    let default_constructor = ctx.promise_constructor();
    let constructor = species_constructor(ctx, this, &default_constructor)?;

    let on_finally = arg(args, 0);
    let (then_finally, catch_finally) = if ctx.is_callable(&on_finally) {
        let slots = FinallyFunction {
            on_finally,
            constructor,
        };
        (
            ctx.create_builtin_function("", 1, FunctionKind::ThenFinally(slots.clone())),
            ctx.create_builtin_function("", 1, FunctionKind::CatchFinally(slots)),
        )
    } else {
        (on_finally.clone(), on_finally)
    };
    ctx.invoke(this, "then", &[then_finally, catch_finally])
}

/// Initialize `%Promise.prototype%`
pub fn init_promise_prototype(ctx: &mut VmContext) {
    let intrinsics = *ctx.intrinsics();
    let proto = intrinsics.promise_prototype;

    ctx.define_property(proto, "constructor", Value::Object(intrinsics.promise));
    ctx.define_property(intrinsics.promise, "prototype", Value::Object(proto));

    let methods: [(&str, u32, fn(&mut VmContext, &Value, &[Value]) -> VmResult<Value>); 3] = [
        ("then", 2, promise_then),
        ("catch", 1, promise_catch),
        ("finally", 1, promise_finally),
    ];
    for (name, length, method) in methods {
        let function = ctx.create_native_function(name, length, method);
        ctx.define_property(proto, name, function);
    }

    ctx.define_property(proto, WellKnownSymbol::ToStringTag, Value::string("Promise"));
}

// ============================================================================
// Statics
// ============================================================================

fn promise_resolve_static(ctx: &mut VmContext, this: &Value, args: &[Value]) -> VmResult<Value> {
    if !this.is_object() {
        return Err(VmError::type_error("PromiseResolve called on non-object"));
    }
    ctx.promise_resolve(this, arg(args, 0))
}

fn promise_reject_static(ctx: &mut VmContext, this: &Value, args: &[Value]) -> VmResult<Value> {
    ctx.promise_reject(this, arg(args, 0))
}

fn promise_all_static(ctx: &mut VmContext, this: &Value, args: &[Value]) -> VmResult<Value> {
    ctx.promise_all(this, &arg(args, 0))
}

fn promise_all_settled_static(
    ctx: &mut VmContext,
    this: &Value,
    args: &[Value],
) -> VmResult<Value> {
    ctx.promise_all_settled(this, &arg(args, 0))
}

fn promise_race_static(ctx: &mut VmContext, this: &Value, args: &[Value]) -> VmResult<Value> {
    ctx.promise_race(this, &arg(args, 0))
}

fn promise_with_resolvers(ctx: &mut VmContext, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let capability = ctx.new_promise_capability(this)?;
    Ok(ctx.create_data_object(&[
        ("promise", capability.promise),
        ("resolve", capability.resolve),
        ("reject", capability.reject),
    ]))
}

/// Install the `Promise` statics and the `@@species` getter
pub fn install_promise_statics(ctx: &mut VmContext) {
    let promise = ctx.intrinsics().promise;

    let statics: [(&str, u32, fn(&mut VmContext, &Value, &[Value]) -> VmResult<Value>); 6] = [
        ("resolve", 1, promise_resolve_static),
        ("reject", 1, promise_reject_static),
        ("all", 1, promise_all_static),
        ("allSettled", 1, promise_all_settled_static),
        ("race", 1, promise_race_static),
        ("withResolvers", 0, promise_with_resolvers),
    ];
    for (name, length, method) in statics {
        let function = ctx.create_native_function(name, length, method);
        ctx.define_property(promise, name, function);
    }

    let species = ctx.create_native_function("get [Symbol.species]", 0, |_, this, _| {
        Ok(this.clone())
    });
    ctx.define_accessor(promise, WellKnownSymbol::Species, Some(species), None);
}
