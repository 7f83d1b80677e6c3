//! Shared helpers for runtime integration tests
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tern_vm_core::{PromiseState, Value, VmContext, VmError, VmResult};

/// Values recorded by a [`recorder`] function
pub type Log = Rc<RefCell<Vec<Value>>>;

/// A function that appends its first argument to the returned log
pub fn recorder(ctx: &mut VmContext) -> (Value, Log) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let f = ctx.create_native_function("record", 1, move |_, _, args| {
        sink.borrow_mut()
            .push(args.first().cloned().unwrap_or_default());
        Ok(Value::Undefined)
    });
    (f, log)
}

/// A function that appends `label` to a shared string log
pub fn labelled(ctx: &mut VmContext, log: &Rc<RefCell<Vec<String>>>, label: &str) -> Value {
    let sink = log.clone();
    let label = label.to_string();
    ctx.create_native_function("labelled", 1, move |_, _, _| {
        sink.borrow_mut().push(label.clone());
        Ok(Value::Undefined)
    })
}

/// A function that throws `value`
pub fn thrower(ctx: &mut VmContext, value: Value) -> Value {
    ctx.create_native_function("thrower", 0, move |_, _, _| {
        Err(VmError::exception(value.clone()))
    })
}

/// `%Promise%`
pub fn promise_ctor(ctx: &VmContext) -> Value {
    ctx.promise_constructor()
}

/// `Promise.resolve(value)`
pub fn resolved(ctx: &mut VmContext, value: Value) -> VmResult<Value> {
    let ctor = ctx.promise_constructor();
    ctx.promise_resolve(&ctor, value)
}

/// `Promise.reject(reason)`
pub fn rejected(ctx: &mut VmContext, reason: Value) -> VmResult<Value> {
    let ctor = ctx.promise_constructor();
    ctx.promise_reject(&ctor, reason)
}

/// A pending promise together with its resolve and reject functions
pub fn deferred(ctx: &mut VmContext) -> VmResult<(Value, Value, Value)> {
    let ctor = ctx.promise_constructor();
    let capability = ctx.new_promise_capability(&ctor)?;
    Ok((capability.promise, capability.resolve, capability.reject))
}

/// Call `resolve` or `reject` with one argument
pub fn settle(ctx: &mut VmContext, function: &Value, value: Value) -> VmResult<()> {
    ctx.call(function, &Value::Undefined, &[value])?;
    Ok(())
}

/// A thenable whose `then` synchronously calls `resolve(value)`
pub fn thenable_resolving_to(ctx: &mut VmContext, value: Value) -> Value {
    let then = ctx.create_native_function("then", 2, move |ctx, _, args| {
        let resolve = args.first().cloned().unwrap_or_default();
        ctx.call(&resolve, &Value::Undefined, &[value.clone()])
    });
    ctx.create_data_object(&[("then", then)])
}

/// Counts calls made to an iterator's `return` and `next`
#[derive(Clone, Default)]
pub struct IteratorCalls {
    pub next_calls: Rc<Cell<usize>>,
    pub return_calls: Rc<Cell<usize>>,
}

/// An iterable over `values` whose iterator has a counting `return`
pub fn counted_iterable(ctx: &mut VmContext, values: Vec<Value>) -> (Value, IteratorCalls) {
    let calls = IteratorCalls::default();
    let remaining = Rc::new(RefCell::new(values.into_iter()));

    let next_calls = calls.next_calls.clone();
    let next = ctx.create_native_function("next", 0, move |ctx, _, _| {
        next_calls.set(next_calls.get() + 1);
        let item = remaining.borrow_mut().next();
        Ok(match item {
            Some(value) => ctx.create_data_object(&[("value", value), ("done", Value::boolean(false))]),
            None => ctx.create_data_object(&[("value", Value::Undefined), ("done", Value::boolean(true))]),
        })
    });
    let return_calls = calls.return_calls.clone();
    let ret = ctx.create_native_function("return", 0, move |ctx, _, _| {
        return_calls.set(return_calls.get() + 1);
        Ok(ctx.create_object())
    });
    let iterator = ctx.create_data_object(&[("next", next), ("return", ret)]);

    let get_iterator = ctx.create_native_function("[Symbol.iterator]", 0, move |_, _, _| {
        Ok(iterator.clone())
    });
    let iterable = ctx.create_object();
    if let Some(id) = iterable.as_object() {
        ctx.define_property(id, tern_vm_core::WellKnownSymbol::Iterator, get_iterator);
    }
    (iterable, calls)
}

/// An iterable whose iterator results carry a throwing getter for `key`
/// (`"value"` or `"done"`); the other field is a plain data property
pub fn poisoned_result_iterable(
    ctx: &mut VmContext,
    key: &'static str,
    error: Value,
) -> (Value, IteratorCalls) {
    let calls = IteratorCalls::default();

    let next_calls = calls.next_calls.clone();
    let next = ctx.create_native_function("next", 0, move |ctx, _, _| {
        next_calls.set(next_calls.get() + 1);
        let result = if key == "value" {
            ctx.create_data_object(&[("done", Value::boolean(false))])
        } else {
            ctx.create_data_object(&[("value", Value::int32(1))])
        };
        let getter = thrower(ctx, error.clone());
        if let Some(id) = result.as_object() {
            ctx.define_accessor(id, key, Some(getter), None);
        }
        Ok(result)
    });
    let return_calls = calls.return_calls.clone();
    let ret = ctx.create_native_function("return", 0, move |ctx, _, _| {
        return_calls.set(return_calls.get() + 1);
        Ok(ctx.create_object())
    });
    let iterator = ctx.create_data_object(&[("next", next), ("return", ret)]);

    let get_iterator = ctx.create_native_function("[Symbol.iterator]", 0, move |_, _, _| {
        Ok(iterator.clone())
    });
    let iterable = ctx.create_object();
    if let Some(id) = iterable.as_object() {
        ctx.define_property(id, tern_vm_core::WellKnownSymbol::Iterator, get_iterator);
    }
    (iterable, calls)
}

/// Current state of a promise value
pub fn state(ctx: &VmContext, promise: &Value) -> PromiseState {
    ctx.promise_state(promise).expect("value is a promise")
}

/// Settled result of a promise value
pub fn result(ctx: &VmContext, promise: &Value) -> Value {
    ctx.promise_result(promise).expect("value is a promise")
}

/// Elements of the array a promise was fulfilled with
pub fn fulfilled_array(ctx: &VmContext, promise: &Value) -> Vec<Value> {
    assert_eq!(state(ctx, promise), PromiseState::Fulfilled);
    ctx.array_values(&result(ctx, promise))
        .expect("fulfilled with an array")
}
