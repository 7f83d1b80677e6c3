//! NewPromiseCapability executor discipline and SpeciesConstructor

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::*;
use tern_vm_core::{PromiseState, Value, VmContext, VmError, VmResult, WellKnownSymbol};
use tern_vm_runtime::Tern;

/// A constructor that calls its executor with each argument pair in turn
/// and returns a fresh plain object
fn constructor_calling_executor_with(
    ctx: &mut VmContext,
    calls: Vec<(Value, Value)>,
) -> Value {
    ctx.create_native_constructor("Custom", 1, move |ctx, args, _| {
        let executor = args.first().cloned().unwrap_or_default();
        for (resolve, reject) in &calls {
            ctx.call(&executor, &Value::Undefined, &[resolve.clone(), reject.clone()])?;
        }
        Ok(ctx.create_object())
    })
}

fn noop(ctx: &mut VmContext) -> Value {
    ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined))
}

fn capability_of(ctx: &mut VmContext, ctor: &Value) -> VmResult<Value> {
    let capability = ctx.new_promise_capability(ctor)?;
    Ok(capability.promise)
}

#[test]
fn test_non_constructor_is_type_error() {
    let mut tern = Tern::new();
    let report = tern.run(|ctx| {
        let f = noop(ctx);
        capability_of(ctx, &f)
    });
    assert!(matches!(report.result, Err(VmError::TypeError(_))));

    let report = tern.run(|ctx| capability_of(ctx, &Value::Undefined));
    assert!(matches!(report.result, Err(VmError::TypeError(_))));
}

#[test]
fn test_executor_called_once_with_functions() {
    let mut tern = Tern::new();
    let report = tern.run(|ctx| {
        let (resolve, reject) = (noop(ctx), noop(ctx));
        let ctor = constructor_calling_executor_with(ctx, vec![(resolve, reject)]);
        capability_of(ctx, &ctor)
    });
    assert!(report.result.is_ok());
}

#[test]
fn test_executor_called_twice_with_functions_throws() {
    let mut tern = Tern::new();
    let report = tern.run(|ctx| {
        let (resolve, reject) = (noop(ctx), noop(ctx));
        let ctor = constructor_calling_executor_with(
            ctx,
            vec![(resolve.clone(), reject.clone()), (resolve, reject)],
        );
        capability_of(ctx, &ctor)
    });
    assert!(matches!(report.result, Err(VmError::TypeError(_))));
}

#[test]
fn test_executor_first_call_with_undefined_is_tolerated() {
    let mut tern = Tern::new();
    let report = tern.run(|ctx| {
        let (resolve, reject) = (noop(ctx), noop(ctx));
        let ctor = constructor_calling_executor_with(
            ctx,
            vec![(Value::Undefined, Value::Undefined), (resolve, reject)],
        );
        capability_of(ctx, &ctor)
    });
    assert!(report.result.is_ok());
}

#[test]
fn test_executor_called_with_non_callable_then_functions_throws() {
    let mut tern = Tern::new();
    let report = tern.run(|ctx| {
        let (resolve, reject) = (noop(ctx), noop(ctx));
        let ctor = constructor_calling_executor_with(
            ctx,
            vec![(Value::int32(1), Value::Undefined), (resolve, reject)],
        );
        capability_of(ctx, &ctor)
    });
    assert!(matches!(report.result, Err(VmError::TypeError(_))));
}

#[test]
fn test_non_callable_reject_is_type_error() {
    let mut tern = Tern::new();
    let report = tern.run(|ctx| {
        let resolve = noop(ctx);
        let ctor = constructor_calling_executor_with(ctx, vec![(resolve, Value::int32(1))]);
        capability_of(ctx, &ctor)
    });
    let err = report.result.unwrap_err();
    assert_eq!(err.to_string(), "TypeError: Promise reject function is not callable");
}

#[test]
fn test_constructor_exception_propagates() {
    let mut tern = Tern::new();
    let report = tern.run(|ctx| {
        let ctor = ctx.create_native_constructor("Throws", 1, |_, _, _| {
            Err(VmError::exception(Value::string("ctor")))
        });
        capability_of(ctx, &ctor)
    });
    let err = report.result.unwrap_err();
    assert_eq!(err.thrown_value(), Some(&Value::string("ctor")));
}

#[test]
fn test_capability_promise_is_whatever_the_constructor_returns() {
    let mut tern = Tern::new();
    tern.run(|ctx| {
        let (resolve, reject) = (noop(ctx), noop(ctx));
        let ctor = constructor_calling_executor_with(ctx, vec![(resolve.clone(), reject)]);
        let capability = ctx.new_promise_capability(&ctor)?;
        assert!(!ctx.is_promise(&capability.promise));
        assert_eq!(capability.resolve, resolve);

        let record = ctx.invoke(&ctor, "withResolvers", &[]);
        assert!(record.is_err(), "Custom has no withResolvers of its own");
        let promise_ctor = promise_ctor(ctx);
        let with_resolvers = ctx.get(&promise_ctor, "withResolvers")?;
        let record = ctx.call(&with_resolvers, &ctor, &[])?;
        assert!(ctx.get(&record, "promise")?.is_object());
        Ok(())
    })
    .into_result()
    .unwrap();
}

#[test]
fn test_then_builds_result_through_species() {
    let mut tern = Tern::new();
    let constructed = Rc::new(Cell::new(0));
    let derived = tern
        .run(|ctx| {
            let counter = constructed.clone();
            let species = ctx.create_native_constructor("Species", 1, move |ctx, args, _| {
                counter.set(counter.get() + 1);
                let ctor = ctx.promise_constructor();
                ctx.construct(&ctor, args, None)
            });
            let holder = ctx.create_object();
            ctx.define_property(holder.as_object().unwrap(), WellKnownSymbol::Species, species);

            let p = resolved(ctx, Value::int32(1))?;
            ctx.define_property(p.as_object().unwrap(), "constructor", holder);
            ctx.invoke(&p, "then", &[])
        })
        .into_result()
        .unwrap();

    assert_eq!(constructed.get(), 1);
    assert_eq!(state(tern.context(), &derived), PromiseState::Fulfilled);
}

#[test]
fn test_then_rejects_bad_species() {
    let mut tern = Tern::new();
    let report = tern.run(|ctx| {
        let holder = ctx.create_data_object(&[]);
        let id = holder.as_object().unwrap();
        ctx.define_property(id, WellKnownSymbol::Species, Value::int32(1));
        let p = resolved(ctx, Value::int32(1))?;
        ctx.define_property(p.as_object().unwrap(), "constructor", holder);
        ctx.invoke(&p, "then", &[])
    });
    assert!(matches!(report.result, Err(VmError::TypeError(_))));
}

#[test]
fn test_null_species_falls_back_to_promise() {
    let mut tern = Tern::new();
    let derived = tern
        .run(|ctx| {
            let holder = ctx.create_object();
            ctx.define_property(holder.as_object().unwrap(), WellKnownSymbol::Species, Value::Null);
            let p = resolved(ctx, Value::int32(4))?;
            ctx.define_property(p.as_object().unwrap(), "constructor", holder);
            ctx.invoke(&p, "then", &[])
        })
        .into_result()
        .unwrap();
    assert!(tern.context().is_promise(&derived));
    assert_eq!(result(tern.context(), &derived), Value::int32(4));
}
