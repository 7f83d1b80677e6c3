//! Execution context: the heap, the intrinsics, the job queue and the
//! object operations (`Get`, `Set`, `Call`, `Construct`) every other module
//! is written against.

use std::rc::Rc;
use std::sync::Arc;

use crate::error::{VmError, VmResult};
use crate::function::{FunctionKind, FunctionObject, NativeConstructFn, NativeFn};
use crate::heap::{Heap, ObjectId};
use crate::intrinsics::Intrinsics;
use crate::intrinsics_impl;
use crate::microtask::JobQueue;
use crate::object::{ErrorKind, JsObject, ObjectKind, Property, PropertyKey};
use crate::rejection_tracker::RejectionTracker;
use crate::value::Value;

/// Nested `Call`/`Construct` depth at which a RangeError is raised
pub const MAX_CALL_DEPTH: usize = 256;

/// A single-threaded execution context.
///
/// Owns every object it creates. Promise jobs are queued on the context's
/// [`JobQueue`] and run by [`VmContext::run_jobs`]; nothing in here runs a
/// job implicitly.
pub struct VmContext {
    heap: Heap,
    intrinsics: Intrinsics,
    jobs: JobQueue,
    rejections: RejectionTracker,
    call_depth: usize,
}

impl VmContext {
    /// Create a context with the standard intrinsics installed
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let intrinsics = Intrinsics::allocate(&mut heap);
        let mut ctx = Self {
            heap,
            intrinsics,
            jobs: JobQueue::new(),
            rejections: RejectionTracker::new(),
            call_depth: 0,
        };
        intrinsics_impl::install(&mut ctx);
        ctx
    }

    /// The object arena
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The object arena, mutably
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Well-known intrinsic objects
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// `%Promise%` as a value
    pub fn promise_constructor(&self) -> Value {
        Value::Object(self.intrinsics.promise)
    }

    /// Pending promise jobs
    pub fn job_queue(&self) -> &JobQueue {
        &self.jobs
    }

    /// Pending promise jobs, mutably
    pub fn job_queue_mut(&mut self) -> &mut JobQueue {
        &mut self.jobs
    }

    /// Rejection tracking state
    pub fn rejection_tracker(&self) -> &RejectionTracker {
        &self.rejections
    }

    /// Rejection tracking state, mutably
    pub fn rejection_tracker_mut(&mut self) -> &mut RejectionTracker {
        &mut self.rejections
    }

    // ------------------------------------------------------------------
    // Object creation
    // ------------------------------------------------------------------

    /// Create an ordinary object inheriting from `%Object.prototype%`
    pub fn create_object(&mut self) -> Value {
        let proto = self.intrinsics.object_prototype;
        self.create_object_with_proto(Some(proto))
    }

    /// Create an ordinary object with the given prototype
    pub fn create_object_with_proto(&mut self, prototype: Option<ObjectId>) -> Value {
        Value::Object(self.heap.alloc(JsObject::new(prototype, ObjectKind::Ordinary)))
    }

    /// Create an ordinary object from `(name, value)` pairs
    pub fn create_data_object(&mut self, entries: &[(&str, Value)]) -> Value {
        let obj = self.create_object();
        if let Some(id) = obj.as_object() {
            let object = self.heap.get_mut(id);
            for (name, value) in entries {
                object.define_data(PropertyKey::string(name), value.clone());
            }
        }
        obj
    }

    /// CreateArrayFromList
    pub fn create_array(&mut self, values: Vec<Value>) -> Value {
        let proto = self.intrinsics.array_prototype;
        Value::Object(
            self.heap
                .alloc(JsObject::new(Some(proto), ObjectKind::Array(values))),
        )
    }

    /// Elements of an array value
    pub fn array_values(&self, value: &Value) -> Option<Vec<Value>> {
        match &self.heap.get(value.as_object()?).kind {
            ObjectKind::Array(elements) => Some(elements.clone()),
            _ => None,
        }
    }

    /// Create a native error object with `name` and `message`
    pub fn create_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let proto = self.intrinsics.error_prototype_for(kind);
        let mut object = JsObject::new(Some(proto), ObjectKind::Error(kind));
        object.define_data(PropertyKey::string("message"), Value::string(message));
        Value::Object(self.heap.alloc(object))
    }

    /// Native error kind of an error object
    pub fn error_kind(&self, value: &Value) -> Option<ErrorKind> {
        match self.heap.get(value.as_object()?).kind {
            ObjectKind::Error(kind) => Some(kind),
            _ => None,
        }
    }

    /// Create a host function
    pub fn create_native_function<F>(&mut self, name: &str, length: u32, f: F) -> Value
    where
        F: Fn(&mut VmContext, &Value, &[Value]) -> VmResult<Value> + 'static,
    {
        let call: NativeFn = Rc::new(f);
        self.create_builtin_function(name, length, FunctionKind::Native(call))
    }

    /// Create a host constructor.
    ///
    /// The constructor gets a fresh `prototype` object whose `constructor`
    /// points back at it. Calling it without `new` throws a TypeError.
    pub fn create_native_constructor<F>(&mut self, name: &str, length: u32, f: F) -> Value
    where
        F: Fn(&mut VmContext, &[Value], ObjectId) -> VmResult<Value> + 'static,
    {
        let construct: NativeConstructFn = Rc::new(f);
        let owned_name = name.to_string();
        let call: NativeFn = Rc::new(
            move |_: &mut VmContext, _: &Value, _: &[Value]| -> VmResult<Value> {
                Err(VmError::type_error(format!(
                    "Class constructor {} cannot be invoked without 'new'",
                    owned_name
                )))
            },
        );
        let function_prototype = self.intrinsics.function_prototype;
        let ctor = self.heap.alloc(JsObject::new(
            Some(function_prototype),
            ObjectKind::Function(FunctionObject {
                name: Arc::from(name),
                length,
                kind: FunctionKind::Native(call),
                construct: Some(construct),
            }),
        ));
        let prototype = self.create_object();
        self.define_property(ctor, "prototype", prototype.clone());
        if let Some(proto_id) = prototype.as_object() {
            self.define_property(proto_id, "constructor", Value::Object(ctor));
        }
        Value::Object(ctor)
    }

    /// Create a function object with built-in `[[Call]]` behavior
    pub(crate) fn create_builtin_function(
        &mut self,
        name: &str,
        length: u32,
        kind: FunctionKind,
    ) -> Value {
        let proto = self.intrinsics.function_prototype;
        Value::Object(self.heap.alloc(JsObject::new(
            Some(proto),
            ObjectKind::Function(FunctionObject {
                name: Arc::from(name),
                length,
                kind,
                construct: None,
            }),
        )))
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Define (or overwrite) an own data property without invoking setters
    pub fn define_property(&mut self, target: ObjectId, key: impl Into<PropertyKey>, value: Value) {
        self.heap.get_mut(target).define_data(key.into(), value);
    }

    /// Define an own accessor property
    pub fn define_accessor(
        &mut self,
        target: ObjectId,
        key: impl Into<PropertyKey>,
        getter: Option<Value>,
        setter: Option<Value>,
    ) {
        self.heap
            .get_mut(target)
            .properties
            .insert(key.into(), Property::Accessor { getter, setter });
    }

    /// GetV: property lookup along the prototype chain, running getters.
    ///
    /// Primitives other than null/undefined have no properties in this
    /// engine and read as undefined.
    pub fn get(&mut self, target: &Value, key: impl Into<PropertyKey>) -> VmResult<Value> {
        let key = key.into();
        let Some(start) = target.as_object() else {
            if target.is_nullish() {
                return Err(VmError::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target, key
                )));
            }
            return Ok(Value::Undefined);
        };

        let mut current = Some(start);
        while let Some(id) = current {
            let object = self.heap.get(id);
            if let ObjectKind::Array(elements) = &object.kind {
                match &key {
                    PropertyKey::Index(i) => {
                        if let Some(value) = elements.get(*i as usize) {
                            return Ok(value.clone());
                        }
                    }
                    k if k.is_named("length") => {
                        return Ok(Value::number(elements.len() as f64));
                    }
                    _ => {}
                }
            }
            match object.get_own(&key) {
                Some(Property::Data(value)) => return Ok(value.clone()),
                Some(Property::Accessor { getter, .. }) => {
                    return match getter.clone() {
                        Some(getter) => self.call(&getter, target, &[]),
                        None => Ok(Value::Undefined),
                    };
                }
                None => current = object.prototype,
            }
        }
        Ok(Value::Undefined)
    }

    /// Set: runs an inherited setter if one exists, otherwise writes an own
    /// data property on `target`
    pub fn set(
        &mut self,
        target: &Value,
        key: impl Into<PropertyKey>,
        value: Value,
    ) -> VmResult<()> {
        let key = key.into();
        let Some(start) = target.as_object() else {
            return Err(VmError::type_error(format!(
                "Cannot set property '{}' on {}",
                key,
                target.type_name()
            )));
        };

        let mut current = Some(start);
        while let Some(id) = current {
            let object = self.heap.get(id);
            match object.get_own(&key) {
                Some(Property::Accessor { setter, .. }) => {
                    return match setter.clone() {
                        Some(setter) => self.call(&setter, target, &[value]).map(|_| ()),
                        None => Ok(()),
                    };
                }
                Some(Property::Data(_)) => break,
                None => current = object.prototype,
            }
        }

        let object = self.heap.get_mut(start);
        if let (ObjectKind::Array(elements), PropertyKey::Index(i)) = (&mut object.kind, &key) {
            let index = *i as usize;
            if index >= elements.len() {
                elements.resize(index + 1, Value::Undefined);
            }
            elements[index] = value;
            return Ok(());
        }
        object.define_data(key, value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// IsCallable
    pub fn is_callable(&self, value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|id| self.heap.get(id).is_callable())
    }

    /// IsConstructor
    pub fn is_constructor(&self, value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|id| self.heap.get(id).is_constructor())
    }

    /// Call(F, V, argumentsList)
    pub fn call(&mut self, callee: &Value, this: &Value, args: &[Value]) -> VmResult<Value> {
        let kind = match callee.as_object().map(|id| &self.heap.get(id).kind) {
            Some(ObjectKind::Function(function)) => function.kind.clone(),
            _ => {
                return Err(VmError::type_error(format!(
                    "{} is not a function",
                    self.describe(callee)
                )));
            }
        };

        self.enter_call()?;
        let result = self.dispatch_call(kind, this, args);
        self.call_depth -= 1;
        result
    }

    /// Construct(F, argumentsList, newTarget); `new_target` defaults to `F`
    pub fn construct(
        &mut self,
        callee: &Value,
        args: &[Value],
        new_target: Option<&Value>,
    ) -> VmResult<Value> {
        let construct = match callee.as_object().map(|id| &self.heap.get(id).kind) {
            Some(ObjectKind::Function(FunctionObject {
                construct: Some(construct),
                ..
            })) => construct.clone(),
            _ => {
                return Err(VmError::type_error(format!(
                    "{} is not a constructor",
                    self.describe(callee)
                )));
            }
        };
        let new_target = match new_target.unwrap_or(callee) {
            target if self.is_constructor(target) => target.as_object(),
            target => {
                return Err(VmError::type_error(format!(
                    "{} is not a constructor",
                    self.describe(target)
                )));
            }
        };
        let Some(new_target) = new_target else {
            return Err(VmError::internal("constructor without object handle"));
        };

        self.enter_call()?;
        let result = construct(self, args, new_target);
        self.call_depth -= 1;
        result
    }

    /// Invoke(V, P, argumentsList)
    pub fn invoke(
        &mut self,
        target: &Value,
        key: impl Into<PropertyKey>,
        args: &[Value],
    ) -> VmResult<Value> {
        let method = self.get(target, key)?;
        self.call(&method, target, args)
    }

    fn enter_call(&mut self) -> VmResult<()> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(VmError::StackOverflow);
        }
        self.call_depth += 1;
        Ok(())
    }

    fn dispatch_call(&mut self, kind: FunctionKind, this: &Value, args: &[Value]) -> VmResult<Value> {
        use crate::function::arg;

        match kind {
            FunctionKind::Native(f) => f(self, this, args),
            FunctionKind::PromiseResolve(resolving) => {
                self.resolve_function_called(&resolving, arg(args, 0));
                Ok(Value::Undefined)
            }
            FunctionKind::PromiseReject(resolving) => {
                self.reject_function_called(&resolving, arg(args, 0));
                Ok(Value::Undefined)
            }
            FunctionKind::CapabilityExecutor(executor) => {
                executor.call(arg(args, 0), arg(args, 1))?;
                Ok(Value::Undefined)
            }
            FunctionKind::ResolveElement(element) => element.call(self, arg(args, 0)),
            FunctionKind::ThenFinally(finally) => finally.then_finally(self, arg(args, 0)),
            FunctionKind::CatchFinally(finally) => finally.catch_finally(self, arg(args, 0)),
            FunctionKind::ValueThunk(value) => Ok(value),
            FunctionKind::Thrower(reason) => Err(VmError::exception(reason)),
        }
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Turn an abrupt completion into the value a promise is rejected with.
    ///
    /// Thrown values are returned as-is; engine errors become native error
    /// objects of the matching kind.
    pub fn error_to_value(&mut self, err: VmError) -> Value {
        match err {
            VmError::Exception(thrown) => thrown.value,
            VmError::TypeError(message) => self.create_error(ErrorKind::TypeError, &message),
            VmError::RangeError(message) => self.create_error(ErrorKind::RangeError, &message),
            VmError::StackOverflow => {
                self.create_error(ErrorKind::RangeError, "Maximum call stack size exceeded")
            }
            VmError::InternalError(message) => self.create_error(ErrorKind::Error, &message),
        }
    }

    /// Short human-readable form of a value for error messages
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("\"{}\"", s),
            Value::Object(id) => match &self.heap.get(*id).kind {
                ObjectKind::Function(f) if f.name.is_empty() => "function".to_string(),
                ObjectKind::Function(f) => format!("function {}", f.name),
                ObjectKind::Array(_) => "[object Array]".to_string(),
                ObjectKind::Promise(_) => "[object Promise]".to_string(),
                ObjectKind::Error(kind) => kind.name().to_string(),
                _ => "[object Object]".to_string(),
            },
            other => other.to_string(),
        }
    }
}

impl Default for VmContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmContext")
            .field("objects", &self.heap.len())
            .field("pending_jobs", &self.jobs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::WellKnownSymbol;

    #[test]
    fn test_getter_runs_with_receiver() {
        let mut ctx = VmContext::new();
        let obj = ctx.create_object();
        let getter = ctx.create_native_function("get x", 0, |_, this, _| Ok(this.clone()));
        ctx.define_accessor(obj.as_object().unwrap(), "x", Some(getter), None);
        assert_eq!(ctx.get(&obj, "x").unwrap(), obj);
    }

    #[test]
    fn test_get_on_nullish_is_type_error() {
        let mut ctx = VmContext::new();
        let err = ctx.get(&Value::undefined(), "then").unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
        assert_eq!(ctx.get(&Value::int32(1), "then").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_array_elements_and_length() {
        let mut ctx = VmContext::new();
        let arr = ctx.create_array(vec![Value::int32(1), Value::int32(2)]);
        assert_eq!(ctx.get(&arr, 1u32).unwrap(), Value::int32(2));
        assert_eq!(ctx.get(&arr, "length").unwrap(), Value::int32(2));
        ctx.set(&arr, 3u32, Value::int32(4)).unwrap();
        assert_eq!(
            ctx.array_values(&arr).unwrap(),
            vec![
                Value::int32(1),
                Value::int32(2),
                Value::Undefined,
                Value::int32(4)
            ]
        );
        let iterator = ctx.get(&arr, WellKnownSymbol::Iterator).unwrap();
        assert!(ctx.is_callable(&iterator));
    }

    #[test]
    fn test_call_non_callable_is_type_error() {
        let mut ctx = VmContext::new();
        let obj = ctx.create_object();
        let err = ctx.call(&obj, &Value::undefined(), &[]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: [object Object] is not a function");
    }

    #[test]
    fn test_native_constructor_requires_new() {
        let mut ctx = VmContext::new();
        let ctor = ctx.create_native_constructor("Thing", 0, |ctx, _, _| Ok(ctx.create_object()));
        assert!(ctx.is_constructor(&ctor));
        assert!(ctx.call(&ctor, &Value::undefined(), &[]).is_err());
        let instance = ctx.construct(&ctor, &[], None).unwrap();
        assert!(instance.is_object());
        let proto = ctx.get(&ctor, "prototype").unwrap();
        assert_eq!(ctx.get(&proto, "constructor").unwrap(), ctor);
    }

    #[test]
    fn test_runaway_recursion_is_range_error() {
        let mut ctx = VmContext::new();
        let f = ctx.create_native_function("recurse", 0, |ctx, this, _| {
            let me = ctx.get(this, "self")?;
            ctx.call(&me, this, &[])
        });
        let holder = ctx.create_data_object(&[("self", f.clone())]);
        let err = ctx.call(&f, &holder, &[]).unwrap_err();
        assert!(matches!(err, VmError::StackOverflow));
        let value = ctx.error_to_value(err);
        assert_eq!(ctx.error_kind(&value), Some(ErrorKind::RangeError));
    }
}
