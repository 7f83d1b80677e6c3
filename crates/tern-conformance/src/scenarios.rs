//! Scenario catalog
//!
//! Every scenario drives a fresh [`Tern`] runtime and checks one observable
//! promise behavior. Scenario names are `feature/slug`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tern_vm_core::{ErrorKind, PromiseState, Value, VmContext, VmError, VmResult, WellKnownSymbol};
use tern_vm_runtime::Tern;

/// Outcome of a scenario body: `Err` carries the failure message
pub type Outcome = Result<(), String>;

/// A named conformance check
#[derive(Clone, Copy)]
pub struct Scenario {
    /// Unique name, `feature/slug`
    pub name: &'static str,
    /// Feature group used for reporting
    pub feature: &'static str,
    /// Scenario body
    pub body: fn(&mut Tern) -> Outcome,
}

impl Scenario {
    /// Create a scenario
    pub const fn new(name: &'static str, feature: &'static str, body: fn(&mut Tern) -> Outcome) -> Self {
        Self { name, feature, body }
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("feature", &self.feature)
            .finish()
    }
}

/// All scenarios, in catalog order
pub fn catalog() -> Vec<Scenario> {
    vec![
        Scenario::new("core/settles-once", "core", core_settles_once),
        Scenario::new("core/reject-then-resolve-inert", "core", core_reject_then_resolve_inert),
        Scenario::new("core/self-resolution-type-error", "core", core_self_resolution),
        Scenario::new("core/thenable-assimilated-in-job", "core", core_thenable_in_job),
        Scenario::new("core/thenable-throw-after-resolve", "core", core_thenable_throw_after_resolve),
        Scenario::new("core/non-callable-then", "core", core_non_callable_then),
        Scenario::new("core/executor-throw-rejects", "core", core_executor_throw_rejects),
        Scenario::new("then/pass-through", "then", then_pass_through),
        Scenario::new("then/handler-throw-rejects", "then", then_handler_throw),
        Scenario::new("then/reactions-are-asynchronous", "then", then_asynchronous),
        Scenario::new("then/catch-delegates-to-then", "then", then_catch_delegates),
        Scenario::new("all/input-order", "all", all_input_order),
        Scenario::new("all/empty-fulfils-synchronously", "all", all_empty_sync),
        Scenario::new("all/first-rejection-wins", "all", all_first_rejection),
        Scenario::new("all/plain-values", "all", all_plain_values),
        Scenario::new("all/next-throw-not-closed", "all", all_next_throw_not_closed),
        Scenario::new("all/then-throw-closes-iterator", "all", all_then_throw_closes),
        Scenario::new("allSettled/record-shape", "allSettled", all_settled_record_shape),
        Scenario::new("allSettled/empty-fulfils-synchronously", "allSettled", all_settled_empty),
        Scenario::new("race/first-settlement-wins", "race", race_first_wins),
        Scenario::new("race/empty-stays-pending", "race", race_empty_pending),
        Scenario::new("race/resolve-throw-closes-iterator", "race", race_resolve_throw_closes),
        Scenario::new("resolve/returns-same-promise", "resolve", resolve_same_promise),
        Scenario::new("resolve/non-object-receiver", "resolve", resolve_non_object_receiver),
        Scenario::new("reject/no-assimilation", "reject", reject_no_assimilation),
        Scenario::new("capability/non-constructor", "capability", capability_non_constructor),
        Scenario::new("capability/executor-twice", "capability", capability_executor_twice),
        Scenario::new("capability/executor-retry-after-undefined", "capability", capability_retry),
        Scenario::new("capability/with-resolvers", "capability", capability_with_resolvers),
        Scenario::new("finally/preserves-value", "finally", finally_preserves_value),
        Scenario::new("finally/throw-overrides", "finally", finally_throw_overrides),
        Scenario::new("ordering/attachment-order", "ordering", ordering_attachment_order),
        Scenario::new("ordering/promise-resolution-ticks", "ordering", ordering_resolution_ticks),
        Scenario::new("ordering/nested-jobs-queue-last", "ordering", ordering_nested_jobs),
        Scenario::new("tracking/unhandled-reported", "tracking", tracking_unhandled),
        Scenario::new("tracking/handled-same-turn", "tracking", tracking_handled_same_turn),
        Scenario::new("tracking/handled-next-turn", "tracking", tracking_handled_next_turn),
    ]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Labels = Rc<RefCell<Vec<String>>>;

fn turn<T>(tern: &mut Tern, f: impl FnOnce(&mut VmContext) -> VmResult<T>) -> Result<T, String> {
    tern.run(f).into_result().map_err(|err| err.to_string())
}

fn ensure(condition: bool, message: impl Into<String>) -> Outcome {
    if condition { Ok(()) } else { Err(message.into()) }
}

fn ensure_eq<T: PartialEq + fmt::Debug>(what: &str, actual: T, expected: T) -> Outcome {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, got {actual:?}"))
    }
}

fn settled(ctx: &VmContext, promise: &Value) -> Result<(PromiseState, Value), String> {
    match (ctx.promise_state(promise), ctx.promise_result(promise)) {
        (Some(state), Some(result)) => Ok((state, result)),
        _ => Err(format!("{} is not a promise", ctx.describe(promise))),
    }
}

fn ensure_settled(ctx: &VmContext, promise: &Value, state: PromiseState, result: Value) -> Outcome {
    let (actual_state, actual_result) = settled(ctx, promise)?;
    ensure_eq("state", actual_state, state)?;
    ensure_eq("result", actual_result, result)
}

fn ensure_rejected_with(ctx: &VmContext, promise: &Value, kind: ErrorKind) -> Outcome {
    let (state, reason) = settled(ctx, promise)?;
    ensure_eq("state", state, PromiseState::Rejected)?;
    ensure_eq("error kind", ctx.error_kind(&reason), Some(kind))
}

fn labelled(ctx: &mut VmContext, labels: &Labels, label: &str) -> Value {
    let sink = labels.clone();
    let label = label.to_string();
    ctx.create_native_function("labelled", 1, move |_, _, _| {
        sink.borrow_mut().push(label.clone());
        Ok(Value::Undefined)
    })
}

fn recorder(ctx: &mut VmContext) -> (Value, Rc<RefCell<Vec<Vec<Value>>>>) {
    let calls: Rc<RefCell<Vec<Vec<Value>>>> = Rc::default();
    let sink = calls.clone();
    let f = ctx.create_native_function("record", 1, move |_, _, args| {
        sink.borrow_mut().push(args.to_vec());
        Ok(Value::Undefined)
    });
    (f, calls)
}

fn thrower(ctx: &mut VmContext, value: Value) -> Value {
    ctx.create_native_function("thrower", 0, move |_, _, _| {
        Err(VmError::exception(value.clone()))
    })
}

fn resolved(ctx: &mut VmContext, value: Value) -> VmResult<Value> {
    let ctor = ctx.promise_constructor();
    ctx.promise_resolve(&ctor, value)
}

fn rejected(ctx: &mut VmContext, reason: Value) -> VmResult<Value> {
    let ctor = ctx.promise_constructor();
    ctx.promise_reject(&ctor, reason)
}

fn deferred(ctx: &mut VmContext) -> VmResult<(Value, Value, Value)> {
    let ctor = ctx.promise_constructor();
    let capability = ctx.new_promise_capability(&ctor)?;
    Ok((capability.promise, capability.resolve, capability.reject))
}

fn settle(ctx: &mut VmContext, function: &Value, value: Value) -> VmResult<()> {
    ctx.call(function, &Value::Undefined, &[value])?;
    Ok(())
}

fn object_id(value: &Value) -> VmResult<tern_vm_core::ObjectId> {
    value
        .as_object()
        .ok_or_else(|| VmError::type_error("expected an object"))
}

/// Iterable over `values` whose iterator counts `return` calls. When
/// `throw_at` is set, the `next` call with that index throws instead.
fn counted_iterable(
    ctx: &mut VmContext,
    values: Vec<Value>,
    throw_at: Option<usize>,
) -> VmResult<(Value, Rc<Cell<usize>>)> {
    let returns = Rc::new(Cell::new(0));
    let position = Rc::new(Cell::new(0usize));
    let values = Rc::new(values);

    let next = ctx.create_native_function("next", 0, move |ctx, _, _| {
        let index = position.get();
        position.set(index + 1);
        if throw_at == Some(index) {
            return Err(VmError::exception(Value::string("next")));
        }
        Ok(match values.get(index) {
            Some(value) => ctx.create_data_object(&[("value", value.clone()), ("done", Value::boolean(false))]),
            None => ctx.create_data_object(&[("value", Value::Undefined), ("done", Value::boolean(true))]),
        })
    });
    let counter = returns.clone();
    let ret = ctx.create_native_function("return", 0, move |ctx, _, _| {
        counter.set(counter.get() + 1);
        Ok(ctx.create_object())
    });
    let iterator = ctx.create_data_object(&[("next", next), ("return", ret)]);
    let get_iterator = ctx.create_native_function("[Symbol.iterator]", 0, move |_, _, _| Ok(iterator.clone()));

    let iterable = ctx.create_object();
    ctx.define_property(object_id(&iterable)?, WellKnownSymbol::Iterator, get_iterator);
    Ok((iterable, returns))
}

// ---------------------------------------------------------------------------
// core
// ---------------------------------------------------------------------------

fn core_settles_once(tern: &mut Tern) -> Outcome {
    let promise = turn(tern, |ctx| {
        let (promise, resolve, reject) = deferred(ctx)?;
        settle(ctx, &resolve, Value::int32(1))?;
        settle(ctx, &resolve, Value::int32(2))?;
        settle(ctx, &reject, Value::int32(3))?;
        Ok(promise)
    })?;
    ensure_settled(tern.context(), &promise, PromiseState::Fulfilled, Value::int32(1))
}

fn core_reject_then_resolve_inert(tern: &mut Tern) -> Outcome {
    let promise = turn(tern, |ctx| {
        let (promise, resolve, reject) = deferred(ctx)?;
        settle(ctx, &reject, Value::string("no"))?;
        settle(ctx, &resolve, Value::string("yes"))?;
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        ctx.invoke(&promise, "catch", &[noop])?;
        Ok(promise)
    })?;
    ensure_settled(tern.context(), &promise, PromiseState::Rejected, Value::string("no"))
}

fn core_self_resolution(tern: &mut Tern) -> Outcome {
    let promise = turn(tern, |ctx| {
        let (promise, resolve, _) = deferred(ctx)?;
        settle(ctx, &resolve, promise.clone())?;
        Ok(promise)
    })?;
    ensure_rejected_with(tern.context(), &promise, ErrorKind::TypeError)
}

fn core_thenable_in_job(tern: &mut Tern) -> Outcome {
    let (promise, pending_after_resolve) = turn(tern, |ctx| {
        let then = ctx.create_native_function("then", 2, |ctx, _, args| {
            let resolve = args.first().cloned().unwrap_or_default();
            ctx.call(&resolve, &Value::Undefined, &[Value::int32(42)])
        });
        let thenable = ctx.create_data_object(&[("then", then)]);
        let (promise, resolve, _) = deferred(ctx)?;
        settle(ctx, &resolve, thenable)?;
        let pending = ctx.promise_state(&promise) == Some(PromiseState::Pending);
        Ok((promise, pending))
    })?;
    ensure(pending_after_resolve, "thenable's then ran synchronously")?;
    ensure_settled(tern.context(), &promise, PromiseState::Fulfilled, Value::int32(42))
}

fn core_thenable_throw_after_resolve(tern: &mut Tern) -> Outcome {
    let promise = turn(tern, |ctx| {
        let then = ctx.create_native_function("then", 2, |ctx, _, args| {
            let resolve = args.first().cloned().unwrap_or_default();
            ctx.call(&resolve, &Value::Undefined, &[Value::string("first")])?;
            Err(VmError::exception(Value::string("late")))
        });
        let thenable = ctx.create_data_object(&[("then", then)]);
        resolved(ctx, thenable)
    })?;
    ensure_settled(tern.context(), &promise, PromiseState::Fulfilled, Value::string("first"))
}

fn core_non_callable_then(tern: &mut Tern) -> Outcome {
    let (promise, object) = turn(tern, |ctx| {
        let object = ctx.create_data_object(&[("then", Value::int32(5))]);
        let promise = resolved(ctx, object.clone())?;
        Ok((promise, object))
    })?;
    ensure_settled(tern.context(), &promise, PromiseState::Fulfilled, object)
}

fn core_executor_throw_rejects(tern: &mut Tern) -> Outcome {
    let promise = turn(tern, |ctx| {
        let executor = thrower(ctx, Value::string("boom"));
        let ctor = ctx.promise_constructor();
        let promise = ctx.construct(&ctor, &[executor], None)?;
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        ctx.invoke(&promise, "catch", &[noop])?;
        Ok(promise)
    })?;
    ensure_settled(tern.context(), &promise, PromiseState::Rejected, Value::string("boom"))
}

// ---------------------------------------------------------------------------
// then
// ---------------------------------------------------------------------------

fn then_pass_through(tern: &mut Tern) -> Outcome {
    let (fulfilled, rejected_tail) = turn(tern, |ctx| {
        let source = resolved(ctx, Value::int32(7))?;
        let fulfilled = ctx.invoke(&source, "then", &[Value::Undefined, Value::Undefined])?;
        let failing = rejected(ctx, Value::string("r"))?;
        let tail = ctx.invoke(&failing, "then", &[Value::int32(1)])?;
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        ctx.invoke(&tail, "catch", &[noop])?;
        Ok((fulfilled, tail))
    })?;
    let ctx = tern.context();
    ensure_settled(ctx, &fulfilled, PromiseState::Fulfilled, Value::int32(7))?;
    ensure_settled(ctx, &rejected_tail, PromiseState::Rejected, Value::string("r"))
}

fn then_handler_throw(tern: &mut Tern) -> Outcome {
    let derived = turn(tern, |ctx| {
        let source = resolved(ctx, Value::int32(1))?;
        let handler = thrower(ctx, Value::string("handler"));
        let derived = ctx.invoke(&source, "then", &[handler])?;
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        ctx.invoke(&derived, "catch", &[noop])?;
        Ok(derived)
    })?;
    ensure_settled(tern.context(), &derived, PromiseState::Rejected, Value::string("handler"))
}

fn then_asynchronous(tern: &mut Tern) -> Outcome {
    let labels: Labels = Rc::default();
    turn(tern, |ctx| {
        let source = resolved(ctx, Value::Undefined)?;
        let reaction = labelled(ctx, &labels, "reaction");
        ctx.invoke(&source, "then", &[reaction])?;
        labels.borrow_mut().push("sync".into());
        Ok(())
    })?;
    ensure_eq("labels", labels.borrow().clone(), vec!["sync".to_string(), "reaction".to_string()])
}

fn then_catch_delegates(tern: &mut Tern) -> Outcome {
    let (record, calls) = recorder(tern.context_mut());
    turn(tern, |ctx| {
        let failing = rejected(ctx, Value::string("caught"))?;
        ctx.invoke(&failing, "catch", &[record])?;
        Ok(())
    })?;
    ensure_eq("catch calls", calls.borrow().clone(), vec![vec![Value::string("caught")]])
}

// ---------------------------------------------------------------------------
// all
// ---------------------------------------------------------------------------

fn all_input_order(tern: &mut Tern) -> Outcome {
    let combined = turn(tern, |ctx| {
        let (a, resolve_a, _) = deferred(ctx)?;
        let (b, resolve_b, _) = deferred(ctx)?;
        let list = ctx.create_array(vec![a, b]);
        let ctor = ctx.promise_constructor();
        let combined = ctx.promise_all(&ctor, &list)?;
        settle(ctx, &resolve_b, Value::string("b"))?;
        settle(ctx, &resolve_a, Value::string("a"))?;
        Ok(combined)
    })?;
    let ctx = tern.context();
    let (state, result) = settled(ctx, &combined)?;
    ensure_eq("state", state, PromiseState::Fulfilled)?;
    ensure_eq(
        "values",
        ctx.array_values(&result),
        Some(vec![Value::string("a"), Value::string("b")]),
    )
}

fn all_empty_sync(tern: &mut Tern) -> Outcome {
    let state = turn(tern, |ctx| {
        let list = ctx.create_array(Vec::new());
        let ctor = ctx.promise_constructor();
        let combined = ctx.promise_all(&ctor, &list)?;
        Ok(ctx.promise_state(&combined))
    })?;
    ensure_eq("state before drain", state, Some(PromiseState::Fulfilled))
}

fn all_first_rejection(tern: &mut Tern) -> Outcome {
    let combined = turn(tern, |ctx| {
        let (a, _, reject_a) = deferred(ctx)?;
        let (b, _, reject_b) = deferred(ctx)?;
        let list = ctx.create_array(vec![a, b]);
        let ctor = ctx.promise_constructor();
        let combined = ctx.promise_all(&ctor, &list)?;
        settle(ctx, &reject_b, Value::string("second"))?;
        settle(ctx, &reject_a, Value::string("first"))?;
        Ok(combined)
    })?;
    ensure_settled(tern.context(), &combined, PromiseState::Rejected, Value::string("second"))
}

fn all_plain_values(tern: &mut Tern) -> Outcome {
    let combined = turn(tern, |ctx| {
        let list = ctx.create_array(vec![Value::int32(1), Value::string("x")]);
        let ctor = ctx.promise_constructor();
        ctx.promise_all(&ctor, &list)
    })?;
    let ctx = tern.context();
    let (_, result) = settled(ctx, &combined)?;
    ensure_eq("values", ctx.array_values(&result), Some(vec![Value::int32(1), Value::string("x")]))
}

fn all_next_throw_not_closed(tern: &mut Tern) -> Outcome {
    let (combined, returns) = turn(tern, |ctx| {
        let (iterable, returns) = counted_iterable(ctx, vec![Value::int32(1)], Some(1))?;
        let ctor = ctx.promise_constructor();
        let combined = ctx.promise_all(&ctor, &iterable)?;
        Ok((combined, returns))
    })?;
    ensure_eq("return calls", returns.get(), 0)?;
    ensure_settled(tern.context(), &combined, PromiseState::Rejected, Value::string("next"))
}

fn all_then_throw_closes(tern: &mut Tern) -> Outcome {
    let (combined, returns) = turn(tern, |ctx| {
        let poisoned = resolved(ctx, Value::int32(1))?;
        let then = thrower(ctx, Value::string("then"));
        ctx.define_property(object_id(&poisoned)?, "then", then);
        let (iterable, returns) = counted_iterable(ctx, vec![poisoned, Value::int32(2)], None)?;
        let ctor = ctx.promise_constructor();
        let combined = ctx.promise_all(&ctor, &iterable)?;
        Ok((combined, returns))
    })?;
    ensure_eq("return calls", returns.get(), 1)?;
    ensure_settled(tern.context(), &combined, PromiseState::Rejected, Value::string("then"))
}

// ---------------------------------------------------------------------------
// allSettled
// ---------------------------------------------------------------------------

fn all_settled_record_shape(tern: &mut Tern) -> Outcome {
    let records = turn(tern, |ctx| {
        let ok = resolved(ctx, Value::int32(1))?;
        let bad = rejected(ctx, Value::string("e"))?;
        let list = ctx.create_array(vec![ok, bad]);
        let ctor = ctx.promise_constructor();
        ctx.promise_all_settled(&ctor, &list)
    })?;

    let ctx = tern.context_mut();
    let (state, result) = settled(ctx, &records)?;
    ensure_eq("state", state, PromiseState::Fulfilled)?;
    let entries = ctx.array_values(&result).ok_or("result is not an array")?;
    ensure_eq("record count", entries.len(), 2)?;

    let read = |ctx: &mut VmContext, record: &Value, key: &str| {
        ctx.get(record, key).map_err(|err| err.to_string())
    };
    ensure_eq("status[0]", read(ctx, &entries[0], "status")?, Value::string("fulfilled"))?;
    ensure_eq("value[0]", read(ctx, &entries[0], "value")?, Value::int32(1))?;
    ensure_eq("status[1]", read(ctx, &entries[1], "status")?, Value::string("rejected"))?;
    ensure_eq("reason[1]", read(ctx, &entries[1], "reason")?, Value::string("e"))
}

fn all_settled_empty(tern: &mut Tern) -> Outcome {
    let state = turn(tern, |ctx| {
        let list = ctx.create_array(Vec::new());
        let ctor = ctx.promise_constructor();
        let combined = ctx.promise_all_settled(&ctor, &list)?;
        Ok(ctx.promise_state(&combined))
    })?;
    ensure_eq("state before drain", state, Some(PromiseState::Fulfilled))
}

// ---------------------------------------------------------------------------
// race
// ---------------------------------------------------------------------------

fn race_first_wins(tern: &mut Tern) -> Outcome {
    let winner = turn(tern, |ctx| {
        let (slow, resolve_slow, _) = deferred(ctx)?;
        let (fast, _, reject_fast) = deferred(ctx)?;
        let list = ctx.create_array(vec![slow, fast]);
        let ctor = ctx.promise_constructor();
        let winner = ctx.promise_race(&ctor, &list)?;
        settle(ctx, &reject_fast, Value::string("fast"))?;
        settle(ctx, &resolve_slow, Value::string("slow"))?;
        Ok(winner)
    })?;
    ensure_settled(tern.context(), &winner, PromiseState::Rejected, Value::string("fast"))
}

fn race_empty_pending(tern: &mut Tern) -> Outcome {
    let winner = turn(tern, |ctx| {
        let list = ctx.create_array(Vec::new());
        let ctor = ctx.promise_constructor();
        ctx.promise_race(&ctor, &list)
    })?;
    ensure_eq("state", tern.context().promise_state(&winner), Some(PromiseState::Pending))
}

fn race_resolve_throw_closes(tern: &mut Tern) -> Outcome {
    let (winner, returns) = turn(tern, |ctx| {
        let ctor = ctx.promise_constructor();
        let bad_resolve = thrower(ctx, Value::string("resolve"));
        ctx.define_property(object_id(&ctor)?, "resolve", bad_resolve);
        let (iterable, returns) = counted_iterable(ctx, vec![Value::int32(1)], None)?;
        let winner = ctx.promise_race(&ctor, &iterable)?;
        Ok((winner, returns))
    })?;
    ensure_eq("return calls", returns.get(), 1)?;
    ensure_settled(tern.context(), &winner, PromiseState::Rejected, Value::string("resolve"))
}

// ---------------------------------------------------------------------------
// resolve / reject
// ---------------------------------------------------------------------------

fn resolve_same_promise(tern: &mut Tern) -> Outcome {
    let (original, again) = turn(tern, |ctx| {
        let original = resolved(ctx, Value::int32(1))?;
        let again = resolved(ctx, original.clone())?;
        Ok((original, again))
    })?;
    ensure_eq("identity", again, original)
}

fn resolve_non_object_receiver(tern: &mut Tern) -> Outcome {
    let kind = turn(tern, |ctx| {
        let ctor = ctx.promise_constructor();
        let resolve = ctx.get(&ctor, "resolve")?;
        Ok(match ctx.call(&resolve, &Value::int32(5), &[Value::int32(1)]) {
            Err(VmError::TypeError(_)) => Some(ErrorKind::TypeError),
            Err(err) => {
                let value = ctx.error_to_value(err);
                ctx.error_kind(&value)
            }
            Ok(_) => None,
        })
    })?;
    ensure_eq("thrown error kind", kind, Some(ErrorKind::TypeError))
}

fn reject_no_assimilation(tern: &mut Tern) -> Outcome {
    let (inner, outer) = turn(tern, |ctx| {
        let inner = resolved(ctx, Value::int32(1))?;
        let outer = rejected(ctx, inner.clone())?;
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        ctx.invoke(&outer, "catch", &[noop])?;
        Ok((inner, outer))
    })?;
    ensure_settled(tern.context(), &outer, PromiseState::Rejected, inner)
}

// ---------------------------------------------------------------------------
// capability
// ---------------------------------------------------------------------------

/// Constructor that hands its executor two calls worth of arguments
fn twice_calling_constructor(ctx: &mut VmContext, first_undefined: bool) -> Value {
    ctx.create_native_constructor("Twice", 1, move |ctx, args, _| {
        let executor = args.first().cloned().unwrap_or_default();
        let resolve = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        let reject = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        if first_undefined {
            ctx.call(&executor, &Value::Undefined, &[Value::Undefined, Value::Undefined])?;
        } else {
            ctx.call(&executor, &Value::Undefined, &[resolve.clone(), reject.clone()])?;
        }
        ctx.call(&executor, &Value::Undefined, &[resolve, reject])?;
        Ok(ctx.create_object())
    })
}

fn capability_non_constructor(tern: &mut Tern) -> Outcome {
    let outcome = turn(tern, |ctx| {
        let plain = ctx.create_native_function("plain", 0, |_, _, _| Ok(Value::Undefined));
        Ok(ctx.new_promise_capability(&plain).is_err())
    })?;
    ensure(outcome, "capability from a non-constructor must fail")
}

fn capability_executor_twice(tern: &mut Tern) -> Outcome {
    let error = turn(tern, |ctx| {
        let ctor = twice_calling_constructor(ctx, false);
        Ok(ctx.new_promise_capability(&ctor).err())
    })?;
    ensure(
        matches!(error, Some(VmError::TypeError(_))),
        format!("expected TypeError from second executor call, got {error:?}"),
    )
}

fn capability_retry(tern: &mut Tern) -> Outcome {
    let ok = turn(tern, |ctx| {
        let ctor = twice_calling_constructor(ctx, true);
        Ok(ctx.new_promise_capability(&ctor).is_ok())
    })?;
    ensure(ok, "executor call with undefined slots must be retryable")
}

fn capability_with_resolvers(tern: &mut Tern) -> Outcome {
    let promise = turn(tern, |ctx| {
        let ctor = ctx.promise_constructor();
        let record = ctx.invoke(&ctor, "withResolvers", &[])?;
        let promise = ctx.get(&record, "promise")?;
        let resolve = ctx.get(&record, "resolve")?;
        settle(ctx, &resolve, Value::string("done"))?;
        Ok(promise)
    })?;
    ensure_settled(tern.context(), &promise, PromiseState::Fulfilled, Value::string("done"))
}

// ---------------------------------------------------------------------------
// finally
// ---------------------------------------------------------------------------

fn finally_preserves_value(tern: &mut Tern) -> Outcome {
    let (on_finally, calls) = recorder(tern.context_mut());
    let tail = turn(tern, |ctx| {
        let source = resolved(ctx, Value::int32(1))?;
        ctx.invoke(&source, "finally", &[on_finally])
    })?;
    ensure_eq("onFinally arguments", calls.borrow().clone(), vec![Vec::new()])?;
    ensure_settled(tern.context(), &tail, PromiseState::Fulfilled, Value::int32(1))
}

fn finally_throw_overrides(tern: &mut Tern) -> Outcome {
    let tail = turn(tern, |ctx| {
        let source = resolved(ctx, Value::int32(1))?;
        let on_finally = thrower(ctx, Value::string("finally"));
        let tail = ctx.invoke(&source, "finally", &[on_finally])?;
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        ctx.invoke(&tail, "catch", &[noop])?;
        Ok(tail)
    })?;
    ensure_settled(tern.context(), &tail, PromiseState::Rejected, Value::string("finally"))
}

// ---------------------------------------------------------------------------
// ordering
// ---------------------------------------------------------------------------

fn ordering_attachment_order(tern: &mut Tern) -> Outcome {
    let labels: Labels = Rc::default();
    turn(tern, |ctx| {
        let first = resolved(ctx, Value::Undefined)?;
        let second = resolved(ctx, Value::Undefined)?;
        let b = labelled(ctx, &labels, "b");
        ctx.invoke(&second, "then", &[b])?;
        let a = labelled(ctx, &labels, "a");
        ctx.invoke(&first, "then", &[a])?;
        Ok(())
    })?;
    ensure_eq("labels", labels.borrow().clone(), vec!["b".to_string(), "a".to_string()])
}

fn ordering_resolution_ticks(tern: &mut Tern) -> Outcome {
    let labels: Labels = Rc::default();
    turn(tern, |ctx| {
        let inner = resolved(ctx, Value::Undefined)?;
        let (outer, resolve_outer, _) = deferred(ctx)?;
        settle(ctx, &resolve_outer, inner)?;
        let a = labelled(ctx, &labels, "a");
        ctx.invoke(&outer, "then", &[a])?;

        let mut tail = resolved(ctx, Value::Undefined)?;
        for label in ["b", "c", "d"] {
            let f = labelled(ctx, &labels, label);
            tail = ctx.invoke(&tail, "then", &[f])?;
        }
        Ok(())
    })?;
    let expected: Vec<String> = ["b", "c", "a", "d"].into_iter().map(String::from).collect();
    ensure_eq("labels", labels.borrow().clone(), expected)
}

fn ordering_nested_jobs(tern: &mut Tern) -> Outcome {
    let labels: Labels = Rc::default();
    turn(tern, |ctx| {
        let outer = resolved(ctx, Value::Undefined)?;
        let sink = labels.clone();
        let nested = ctx.create_native_function("nested", 1, move |ctx, _, _| {
            sink.borrow_mut().push("first".into());
            let inner = resolved(ctx, Value::Undefined)?;
            let f = labelled(ctx, &sink, "nested");
            ctx.invoke(&inner, "then", &[f])
        });
        ctx.invoke(&outer, "then", &[nested])?;
        let second = labelled(ctx, &labels, "second");
        ctx.invoke(&outer, "then", &[second])?;
        Ok(())
    })?;
    let expected: Vec<String> = ["first", "second", "nested"].into_iter().map(String::from).collect();
    ensure_eq("labels", labels.borrow().clone(), expected)
}

// ---------------------------------------------------------------------------
// tracking
// ---------------------------------------------------------------------------

fn tracking_unhandled(tern: &mut Tern) -> Outcome {
    let report = tern.run(|ctx| rejected(ctx, Value::string("lost")));
    ensure_eq("unhandled count", report.unhandled_rejections.len(), 1)?;
    ensure_eq(
        "unhandled reason",
        report.unhandled_rejections[0].reason.clone(),
        Value::string("lost"),
    )
}

fn tracking_handled_same_turn(tern: &mut Tern) -> Outcome {
    let report = tern.run(|ctx| {
        let failing = rejected(ctx, Value::string("caught"))?;
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        ctx.invoke(&failing, "catch", &[noop])
    });
    ensure_eq("unhandled count", report.unhandled_rejections.len(), 0)
}

fn tracking_handled_next_turn(tern: &mut Tern) -> Outcome {
    let first = tern.run(|ctx| rejected(ctx, Value::string("late")));
    ensure_eq("first turn unhandled", first.unhandled_rejections.len(), 1)?;
    let failing = first.result.map_err(|err| err.to_string())?;

    let second = tern.run(|ctx| {
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        ctx.invoke(&failing, "catch", &[noop])
    });
    ensure_eq("second turn unhandled", second.unhandled_rejections.len(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique_and_prefixed_by_feature() {
        let scenarios = catalog();
        let mut seen = HashSet::new();
        for scenario in &scenarios {
            assert!(seen.insert(scenario.name), "duplicate {}", scenario.name);
            assert!(
                scenario.name.starts_with(&format!("{}/", scenario.feature)),
                "{} not under {}",
                scenario.name,
                scenario.feature
            );
        }
    }

    #[test]
    fn test_every_scenario_passes_on_a_fresh_runtime() {
        for scenario in catalog() {
            let mut tern = Tern::new();
            if let Err(message) = (scenario.body)(&mut tern) {
                panic!("{} failed: {message}", scenario.name);
            }
        }
    }
}
