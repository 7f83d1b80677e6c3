//! Promise combinators: `all`, `allSettled`, `race`, `resolve`, `reject`.
//!
//! `all` and `allSettled` share one driver. Every element gets its own
//! [`ResolveElementFunction`] holding its index, its once-only flag and a
//! handle to the shared [`CombinatorState`]. The remaining-elements counter
//! starts at one so the output cannot complete while the loop is still
//! running; the loop drops that bias when the iterator is exhausted.
//!
//! ## Error paths
//!
//! Errors after the output capability exists never throw; they reject it.
//! The driver reports where the error came from ([`DriverAbrupt`]):
//!
//! - consuming a produced value (`C.resolve(value)`, reading or calling
//!   `then`): the iterator is still open and is closed before rejecting
//! - advancing the iterator (`next`, `done`, `value`): the iterator is
//!   already finished and is not closed
//! - settling the output capability after exhaustion: the iterator is
//!   finished and is not closed

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::capability::PromiseCapability;
use crate::context::VmContext;
use crate::error::{VmError, VmResult};
use crate::function::FunctionKind;
use crate::iterator::IteratorRecord;
use crate::value::Value;

/// State shared by the element functions of one `all`/`allSettled` call
#[derive(Debug)]
pub struct CombinatorState {
    values: Vec<Value>,
    remaining: usize,
    capability: PromiseCapability,
}

impl CombinatorState {
    fn new(capability: PromiseCapability) -> Self {
        Self {
            values: Vec::new(),
            remaining: 1,
            capability,
        }
    }

    /// Drop one outstanding count. Returns the finished values when the
    /// count reaches zero.
    fn release(&mut self) -> Option<Vec<Value>> {
        self.remaining = self.remaining.saturating_sub(1);
        (self.remaining == 0).then(|| self.values.clone())
    }

    /// Outstanding elements, plus one while the loop is running
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

/// What an element function records at its index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    /// `Promise.all` resolve element: the value itself
    All,
    /// `Promise.allSettled` resolve element: `{ status: "fulfilled", value }`
    AllSettledFulfilled,
    /// `Promise.allSettled` reject element: `{ status: "rejected", reason }`
    AllSettledRejected,
}

/// Internal slots of a `Promise.all` / `Promise.allSettled` element function
#[derive(Clone, Debug)]
pub struct ResolveElementFunction {
    index: usize,
    already_called: Rc<Cell<bool>>,
    state: Rc<RefCell<CombinatorState>>,
    kind: ElementKind,
}

impl ResolveElementFunction {
    /// Input position this function writes
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this function (or its allSettled sibling) already ran
    pub fn already_called(&self) -> bool {
        self.already_called.get()
    }

    pub(crate) fn call(&self, ctx: &mut VmContext, x: Value) -> VmResult<Value> {
        if self.already_called.replace(true) {
            return Ok(Value::Undefined);
        }

        let entry = match self.kind {
            ElementKind::All => x,
            ElementKind::AllSettledFulfilled => ctx.create_data_object(&[
                ("status", Value::string("fulfilled")),
                ("value", x),
            ]),
            ElementKind::AllSettledRejected => ctx.create_data_object(&[
                ("status", Value::string("rejected")),
                ("reason", x),
            ]),
        };

        let (finished, resolve) = {
            let mut state = self.state.borrow_mut();
            if let Some(slot) = state.values.get_mut(self.index) {
                *slot = entry;
            }
            (state.release(), state.capability.resolve.clone())
        };

        match finished {
            Some(values) => {
                let array = ctx.create_array(values);
                ctx.call(&resolve, &Value::Undefined, &[array])
            }
            None => Ok(Value::Undefined),
        }
    }
}

/// Where a combinator loop completed abruptly
#[derive(Debug)]
enum DriverAbrupt {
    /// `C.resolve(value)` or `then` failed; the iterator is still open
    Consuming(VmError),
    /// `IteratorStepValue` failed; the iterator is already done
    Advancing(VmError),
    /// Resolving the output capability failed after exhaustion
    Settling(VmError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    All,
    AllSettled,
    Race,
}

impl Combinator {
    fn name(self) -> &'static str {
        match self {
            Self::All => "Promise.all",
            Self::AllSettled => "Promise.allSettled",
            Self::Race => "Promise.race",
        }
    }
}

impl VmContext {
    /// `Promise.all(iterable)` with `constructor` as the receiver
    pub fn promise_all(&mut self, constructor: &Value, iterable: &Value) -> VmResult<Value> {
        self.run_combinator(Combinator::All, constructor, iterable)
    }

    /// `Promise.allSettled(iterable)` with `constructor` as the receiver
    pub fn promise_all_settled(&mut self, constructor: &Value, iterable: &Value) -> VmResult<Value> {
        self.run_combinator(Combinator::AllSettled, constructor, iterable)
    }

    /// `Promise.race(iterable)` with `constructor` as the receiver
    pub fn promise_race(&mut self, constructor: &Value, iterable: &Value) -> VmResult<Value> {
        self.run_combinator(Combinator::Race, constructor, iterable)
    }

    /// PromiseResolve(C, x): `x` itself when it is a promise whose
    /// `constructor` is `C`, otherwise a new promise resolved with `x`
    pub fn promise_resolve(&mut self, constructor: &Value, x: Value) -> VmResult<Value> {
        if self.is_promise(&x) {
            let x_constructor = self.get(&x, "constructor")?;
            if x_constructor.same_value(constructor) {
                return Ok(x);
            }
        }
        let capability = self.new_promise_capability(constructor)?;
        self.call(&capability.resolve, &Value::Undefined, &[x])?;
        Ok(capability.promise)
    }

    /// `Promise.reject(r)` with `constructor` as the receiver
    pub fn promise_reject(&mut self, constructor: &Value, reason: Value) -> VmResult<Value> {
        let capability = self.new_promise_capability(constructor)?;
        self.call(&capability.reject, &Value::Undefined, &[reason])?;
        Ok(capability.promise)
    }

    /// GetPromiseResolve(C)
    fn get_promise_resolve(&mut self, constructor: &Value) -> VmResult<Value> {
        let resolve = self.get(constructor, "resolve")?;
        if !self.is_callable(&resolve) {
            return Err(VmError::type_error(format!(
                "{} is not a function",
                self.describe(&resolve)
            )));
        }
        Ok(resolve)
    }

    fn run_combinator(
        &mut self,
        combinator: Combinator,
        constructor: &Value,
        iterable: &Value,
    ) -> VmResult<Value> {
        let capability = self.new_promise_capability(constructor)?;
        let promise_resolve = match self.get_promise_resolve(constructor) {
            Ok(resolve) => resolve,
            Err(err) => return self.reject_capability(&capability, err),
        };
        let mut record = match self.get_iterator(iterable) {
            Ok(record) => record,
            Err(err) => return self.reject_capability(&capability, err),
        };

        let outcome = match combinator {
            Combinator::All | Combinator::AllSettled => self.perform_all(
                combinator,
                &mut record,
                constructor,
                &capability,
                &promise_resolve,
            ),
            Combinator::Race => {
                self.perform_race(&mut record, constructor, &capability, &promise_resolve)
            }
        };

        match outcome {
            Ok(promise) => Ok(promise),
            Err(DriverAbrupt::Consuming(err)) => {
                trace!(combinator = combinator.name(), %err, "closing iterator");
                let err = if record.done {
                    err
                } else {
                    self.iterator_close(&record, err)
                };
                self.reject_capability(&capability, err)
            }
            Err(DriverAbrupt::Advancing(err)) => self.reject_capability(&capability, err),
            Err(DriverAbrupt::Settling(err)) => self.reject_capability(&capability, err),
        }
    }

    fn perform_all(
        &mut self,
        combinator: Combinator,
        record: &mut IteratorRecord,
        constructor: &Value,
        capability: &PromiseCapability,
        promise_resolve: &Value,
    ) -> Result<Value, DriverAbrupt> {
        let state = Rc::new(RefCell::new(CombinatorState::new(capability.clone())));
        let mut index = 0;

        loop {
            let Some(next_value) = self
                .iterator_step_value(record)
                .map_err(DriverAbrupt::Advancing)?
            else {
                let finished = state.borrow_mut().release();
                if let Some(values) = finished {
                    let array = self.create_array(values);
                    self.call(&capability.resolve, &Value::Undefined, &[array])
                        .map_err(DriverAbrupt::Settling)?;
                }
                return Ok(capability.promise.clone());
            };

            state.borrow_mut().values.push(Value::Undefined);
            let next_promise = self
                .call(promise_resolve, constructor, &[next_value])
                .map_err(DriverAbrupt::Consuming)?;

            let already_called = Rc::new(Cell::new(false));
            let element = |kind| {
                FunctionKind::ResolveElement(ResolveElementFunction {
                    index,
                    already_called: already_called.clone(),
                    state: state.clone(),
                    kind,
                })
            };
            let (on_fulfilled, on_rejected) = if combinator == Combinator::AllSettled {
                let on_fulfilled = element(ElementKind::AllSettledFulfilled);
                let on_rejected = element(ElementKind::AllSettledRejected);
                (
                    self.create_builtin_function("", 1, on_fulfilled),
                    self.create_builtin_function("", 1, on_rejected),
                )
            } else {
                let on_fulfilled = element(ElementKind::All);
                (
                    self.create_builtin_function("", 1, on_fulfilled),
                    capability.reject.clone(),
                )
            };

            state.borrow_mut().remaining += 1;
            self.invoke(&next_promise, "then", &[on_fulfilled, on_rejected])
                .map_err(DriverAbrupt::Consuming)?;
            index += 1;
        }
    }

    fn perform_race(
        &mut self,
        record: &mut IteratorRecord,
        constructor: &Value,
        capability: &PromiseCapability,
        promise_resolve: &Value,
    ) -> Result<Value, DriverAbrupt> {
        while let Some(next_value) = self
            .iterator_step_value(record)
            .map_err(DriverAbrupt::Advancing)?
        {
            let next_promise = self
                .call(promise_resolve, constructor, &[next_value])
                .map_err(DriverAbrupt::Consuming)?;
            self.invoke(
                &next_promise,
                "then",
                &[capability.resolve.clone(), capability.reject.clone()],
            )
            .map_err(DriverAbrupt::Consuming)?;
        }
        Ok(capability.promise.clone())
    }
}
