//! Promise state machine.
//!
//! A promise moves from `Pending` to `Fulfilled` or `Rejected` exactly once.
//! Settling moves the matching reaction list out of the promise and queues
//! one reaction job per entry, in registration order; the other list is
//! dropped. Reactions registered on an already-settled promise are queued
//! as jobs as well, never run synchronously.
//!
//! Resolve and reject functions are created in pairs sharing one
//! [`AlreadyResolved`] cell: whichever is called first wins and every
//! later call to either is a silent no-op.

use std::cell::Cell;
use std::rc::Rc;

use crate::capability::PromiseCapability;
use crate::context::VmContext;
use crate::error::{VmError, VmResult};
use crate::function::FunctionKind;
use crate::heap::ObjectId;
use crate::microtask::Job;
use crate::object::{ErrorKind, JsObject, ObjectKind};
use crate::rejection_tracker::RejectionOperation;
use crate::value::Value;

/// Promise state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromiseState {
    /// Not yet settled
    Pending,
    /// Fulfilled with a value
    Fulfilled,
    /// Rejected with a reason
    Rejected,
}

/// Internal slots of a promise object
#[derive(Debug)]
pub struct PromiseSlot {
    state: PromiseState,
    result: Value,
    fulfill_reactions: Vec<PromiseReaction>,
    reject_reactions: Vec<PromiseReaction>,
    is_handled: bool,
}

impl PromiseSlot {
    /// A pending promise with no reactions
    pub fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            result: Value::Undefined,
            fulfill_reactions: Vec::new(),
            reject_reactions: Vec::new(),
            is_handled: false,
        }
    }

    /// Current state
    pub fn state(&self) -> PromiseState {
        self.state
    }

    /// Fulfillment value or rejection reason; undefined while pending
    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Whether a rejection handler has ever been attached
    pub fn is_handled(&self) -> bool {
        self.is_handled
    }

    /// Number of reactions waiting for settlement
    pub fn pending_reactions(&self) -> usize {
        self.fulfill_reactions.len() + self.reject_reactions.len()
    }
}

impl Default for PromiseSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Which settlement a reaction responds to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionType {
    /// Runs on fulfillment
    Fulfill,
    /// Runs on rejection
    Reject,
}

/// Reaction handler
#[derive(Clone, Debug)]
pub enum ReactionHandler {
    /// No callable handler was given: pass the value through on
    /// fulfillment, re-throw the reason on rejection
    Identity,
    /// User handler
    Callable(Value),
}

/// `PromiseReaction` record
#[derive(Clone, Debug)]
pub struct PromiseReaction {
    /// Capability of the dependent promise
    pub capability: PromiseCapability,
    /// Settlement this reaction responds to
    pub reaction_type: ReactionType,
    /// Handler to run
    pub handler: ReactionHandler,
}

/// The `[[AlreadyResolved]]` cell shared by a resolve/reject pair
#[derive(Clone, Debug, Default)]
pub struct AlreadyResolved(Rc<Cell<bool>>);

impl AlreadyResolved {
    /// A fresh, unclaimed cell
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the cell to resolved. Returns `true` only for the first caller.
    pub fn claim(&self) -> bool {
        !self.0.replace(true)
    }

    /// Whether either function of the pair has been called
    pub fn is_claimed(&self) -> bool {
        self.0.get()
    }
}

/// Internal slots of a promise resolve or reject function
#[derive(Clone, Debug)]
pub struct ResolvingFunction {
    /// Promise settled by this function
    pub promise: ObjectId,
    /// Shared with the other function of the pair
    pub already_resolved: AlreadyResolved,
}

/// Result of probing a resolution value for a `then` method
enum Thenable {
    NotObject,
    NotCallable,
    Callable(Value),
}

impl VmContext {
    /// Allocate a pending promise; `prototype` defaults to `%Promise.prototype%`
    pub fn create_promise(&mut self, prototype: Option<ObjectId>) -> ObjectId {
        let proto = prototype.unwrap_or(self.intrinsics().promise_prototype);
        self.heap_mut().alloc(JsObject::new(
            Some(proto),
            ObjectKind::Promise(PromiseSlot::new()),
        ))
    }

    /// IsPromise
    pub fn is_promise(&self, value: &Value) -> bool {
        self.promise_slot(value).is_some()
    }

    /// Promise internal slots of a value
    pub fn promise_slot(&self, value: &Value) -> Option<&PromiseSlot> {
        self.heap().get(value.as_object()?).as_promise()
    }

    /// State of a promise value
    pub fn promise_state(&self, value: &Value) -> Option<PromiseState> {
        self.promise_slot(value).map(PromiseSlot::state)
    }

    /// Result of a promise value (undefined while pending)
    pub fn promise_result(&self, value: &Value) -> Option<Value> {
        self.promise_slot(value).map(|slot| slot.result().clone())
    }

    fn promise_slot_mut(&mut self, promise: ObjectId) -> Option<&mut PromiseSlot> {
        self.heap_mut().get_mut(promise).as_promise_mut()
    }

    /// CreateResolvingFunctions: a resolve/reject pair for `promise`
    /// sharing one once-only flag
    pub fn create_resolving_functions(&mut self, promise: ObjectId) -> (Value, Value) {
        let already_resolved = AlreadyResolved::new();
        let resolve = self.create_builtin_function(
            "",
            1,
            FunctionKind::PromiseResolve(ResolvingFunction {
                promise,
                already_resolved: already_resolved.clone(),
            }),
        );
        let reject = self.create_builtin_function(
            "",
            1,
            FunctionKind::PromiseReject(ResolvingFunction {
                promise,
                already_resolved,
            }),
        );
        (resolve, reject)
    }

    /// Body of a promise resolve function
    pub(crate) fn resolve_function_called(&mut self, function: &ResolvingFunction, resolution: Value) {
        if !function.already_resolved.claim() {
            return;
        }
        self.resolve_promise_with(function.promise, resolution);
    }

    /// Body of a promise reject function
    pub(crate) fn reject_function_called(&mut self, function: &ResolvingFunction, reason: Value) {
        if !function.already_resolved.claim() {
            return;
        }
        self.reject_promise(function.promise, reason);
    }

    /// Resolve `promise` with `resolution`, assimilating thenables.
    ///
    /// Never throws: a self-resolution or a throwing `then` getter turns
    /// into a rejection of `promise`.
    fn resolve_promise_with(&mut self, promise: ObjectId, resolution: Value) {
        if resolution.as_object() == Some(promise) {
            let reason = self.create_error(ErrorKind::TypeError, "Chaining cycle detected for promise");
            self.reject_promise(promise, reason);
            return;
        }

        match self.classify_thenable(&resolution) {
            Ok(Thenable::NotObject) | Ok(Thenable::NotCallable) => {
                self.fulfill_promise(promise, resolution);
            }
            Ok(Thenable::Callable(then)) => {
                self.enqueue_job(Job::PromiseResolveThenable {
                    promise,
                    thenable: resolution,
                    then,
                });
            }
            Err(err) => {
                let reason = self.error_to_value(err);
                self.reject_promise(promise, reason);
            }
        }
    }

    fn classify_thenable(&mut self, value: &Value) -> VmResult<Thenable> {
        if !value.is_object() {
            return Ok(Thenable::NotObject);
        }
        let then = self.get(value, "then")?;
        if self.is_callable(&then) {
            Ok(Thenable::Callable(then))
        } else {
            Ok(Thenable::NotCallable)
        }
    }

    /// FulfillPromise. No-op unless `promise` is pending.
    pub fn fulfill_promise(&mut self, promise: ObjectId, value: Value) {
        let Some(slot) = self.promise_slot_mut(promise) else {
            return;
        };
        if slot.state != PromiseState::Pending {
            return;
        }
        let reactions = std::mem::take(&mut slot.fulfill_reactions);
        slot.reject_reactions.clear();
        slot.state = PromiseState::Fulfilled;
        slot.result = value.clone();
        self.trigger_reactions(reactions, value);
    }

    /// RejectPromise. No-op unless `promise` is pending.
    pub fn reject_promise(&mut self, promise: ObjectId, reason: Value) {
        let Some(slot) = self.promise_slot_mut(promise) else {
            return;
        };
        if slot.state != PromiseState::Pending {
            return;
        }
        let reactions = std::mem::take(&mut slot.reject_reactions);
        slot.fulfill_reactions.clear();
        slot.state = PromiseState::Rejected;
        slot.result = reason.clone();
        let handled = slot.is_handled;
        if !handled {
            self.rejection_tracker_mut()
                .track(promise, RejectionOperation::Reject);
        }
        self.trigger_reactions(reactions, reason);
    }

    fn trigger_reactions(&mut self, reactions: Vec<PromiseReaction>, argument: Value) {
        for reaction in reactions {
            self.enqueue_job(Job::PromiseReaction {
                reaction,
                argument: argument.clone(),
            });
        }
    }

    /// PerformPromiseThen: register reactions on `promise` that settle
    /// `capability`, and return the capability's promise
    pub fn perform_promise_then(
        &mut self,
        promise: ObjectId,
        on_fulfilled: &Value,
        on_rejected: &Value,
        capability: PromiseCapability,
    ) -> VmResult<Value> {
        let handler_for = |ctx: &VmContext, handler: &Value| {
            if ctx.is_callable(handler) {
                ReactionHandler::Callable(handler.clone())
            } else {
                ReactionHandler::Identity
            }
        };
        let fulfill_reaction = PromiseReaction {
            capability: capability.clone(),
            reaction_type: ReactionType::Fulfill,
            handler: handler_for(&*self, on_fulfilled),
        };
        let reject_reaction = PromiseReaction {
            capability: capability.clone(),
            reaction_type: ReactionType::Reject,
            handler: handler_for(&*self, on_rejected),
        };

        let Some(slot) = self.promise_slot_mut(promise) else {
            return Err(VmError::type_error("PerformPromiseThen called on non-promise"));
        };
        let was_handled = std::mem::replace(&mut slot.is_handled, true);
        match slot.state {
            PromiseState::Pending => {
                slot.fulfill_reactions.push(fulfill_reaction);
                slot.reject_reactions.push(reject_reaction);
            }
            PromiseState::Fulfilled => {
                let value = slot.result.clone();
                self.enqueue_job(Job::PromiseReaction {
                    reaction: fulfill_reaction,
                    argument: value,
                });
            }
            PromiseState::Rejected => {
                let reason = slot.result.clone();
                if !was_handled {
                    self.rejection_tracker_mut()
                        .track(promise, RejectionOperation::Handle);
                }
                self.enqueue_job(Job::PromiseReaction {
                    reaction: reject_reaction,
                    argument: reason,
                });
            }
        }
        Ok(capability.promise)
    }

    /// PromiseReactionJob
    pub(crate) fn run_reaction_job(
        &mut self,
        reaction: PromiseReaction,
        argument: Value,
    ) -> VmResult<()> {
        let handler_result = match (&reaction.handler, reaction.reaction_type) {
            (ReactionHandler::Identity, ReactionType::Fulfill) => Ok(argument),
            (ReactionHandler::Identity, ReactionType::Reject) => Err(VmError::exception(argument)),
            (ReactionHandler::Callable(handler), _) => {
                self.call(handler, &Value::Undefined, &[argument])
            }
        };

        let capability = reaction.capability;
        match handler_result {
            Ok(value) => {
                self.call(&capability.resolve, &Value::Undefined, &[value])?;
            }
            Err(err) => {
                let reason = self.error_to_value(err);
                self.call(&capability.reject, &Value::Undefined, &[reason])?;
            }
        }
        Ok(())
    }

    /// PromiseResolveThenableJob
    pub(crate) fn run_resolve_thenable_job(
        &mut self,
        promise: ObjectId,
        thenable: Value,
        then: Value,
    ) -> VmResult<()> {
        let (resolve, reject) = self.create_resolving_functions(promise);
        if let Err(err) = self.call(&then, &thenable, &[resolve, reject.clone()]) {
            let reason = self.error_to_value(err);
            self.call(&reject, &Value::Undefined, &[reason])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_with_functions(ctx: &mut VmContext) -> (Value, Value, Value) {
        let promise = ctx.create_promise(None);
        let (resolve, reject) = ctx.create_resolving_functions(promise);
        (Value::Object(promise), resolve, reject)
    }

    #[test]
    fn test_already_resolved_claims_once() {
        let cell = AlreadyResolved::new();
        let other = cell.clone();
        assert!(!cell.is_claimed());
        assert!(cell.claim());
        assert!(!other.claim());
        assert!(other.is_claimed());
    }

    #[test]
    fn test_resolve_then_reject_is_inert() {
        let mut ctx = VmContext::new();
        let (promise, resolve, reject) = pending_with_functions(&mut ctx);
        ctx.call(&resolve, &Value::Undefined, &[Value::int32(1)]).unwrap();
        ctx.call(&reject, &Value::Undefined, &[Value::int32(2)]).unwrap();
        ctx.call(&resolve, &Value::Undefined, &[Value::int32(3)]).unwrap();
        assert_eq!(ctx.promise_state(&promise), Some(PromiseState::Fulfilled));
        assert_eq!(ctx.promise_result(&promise), Some(Value::int32(1)));
    }

    #[test]
    fn test_self_resolution_rejects_with_type_error() {
        let mut ctx = VmContext::new();
        let (promise, resolve, _) = pending_with_functions(&mut ctx);
        ctx.call(&resolve, &Value::Undefined, &[promise.clone()]).unwrap();
        assert_eq!(ctx.promise_state(&promise), Some(PromiseState::Rejected));
        let reason = ctx.promise_result(&promise).unwrap();
        assert_eq!(ctx.error_kind(&reason), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_thenable_resolution_is_deferred_to_a_job() {
        let mut ctx = VmContext::new();
        let (promise, resolve, _) = pending_with_functions(&mut ctx);
        let then = ctx.create_native_function("then", 2, |ctx, _, args| {
            let resolve = crate::function::arg(args, 0);
            ctx.call(&resolve, &Value::Undefined, &[Value::string("inner")])
        });
        let thenable = ctx.create_data_object(&[("then", then)]);
        ctx.call(&resolve, &Value::Undefined, &[thenable]).unwrap();

        assert_eq!(ctx.promise_state(&promise), Some(PromiseState::Pending));
        assert_eq!(ctx.job_queue().len(), 1);
        let outcome = ctx.run_jobs(None);
        assert_eq!(outcome.thenable_jobs, 1);
        assert_eq!(ctx.promise_result(&promise), Some(Value::string("inner")));
    }

    #[test]
    fn test_throwing_then_getter_rejects() {
        let mut ctx = VmContext::new();
        let (promise, resolve, _) = pending_with_functions(&mut ctx);
        let getter = ctx.create_native_function("get then", 0, |_, _, _| {
            Err(VmError::exception(Value::string("getter")))
        });
        let thenable = ctx.create_object();
        ctx.define_accessor(thenable.as_object().unwrap(), "then", Some(getter), None);
        ctx.call(&resolve, &Value::Undefined, &[thenable]).unwrap();
        assert_eq!(ctx.promise_state(&promise), Some(PromiseState::Rejected));
        assert_eq!(ctx.promise_result(&promise), Some(Value::string("getter")));
        assert!(ctx.job_queue().is_empty());
    }

    #[test]
    fn test_settling_clears_reactions() {
        let mut ctx = VmContext::new();
        let (promise, resolve, _) = pending_with_functions(&mut ctx);
        let promise_ctor = ctx.promise_constructor();
        let capability = ctx.new_promise_capability(&promise_ctor).unwrap();
        let id = promise.as_object().unwrap();
        ctx.perform_promise_then(id, &Value::Undefined, &Value::Undefined, capability)
            .unwrap();
        assert_eq!(ctx.promise_slot(&promise).unwrap().pending_reactions(), 2);

        ctx.call(&resolve, &Value::Undefined, &[Value::int32(5)]).unwrap();
        assert_eq!(ctx.promise_slot(&promise).unwrap().pending_reactions(), 0);
        assert_eq!(ctx.job_queue().len(), 1);
    }
}
