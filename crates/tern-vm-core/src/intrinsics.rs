//! Well-known intrinsic objects.
//!
//! The objects are allocated up front so that every handle exists before
//! any property is installed; `intrinsics_impl` then fills in the methods.

use std::sync::Arc;

use crate::function::{FunctionKind, FunctionObject};
use crate::heap::{Heap, ObjectId};
use crate::intrinsics_impl::promise as promise_impl;
use crate::object::{ErrorKind, JsObject, ObjectKind};

/// Handles to the intrinsic objects of a context
#[derive(Clone, Copy, Debug)]
pub struct Intrinsics {
    /// `%Object.prototype%`
    pub object_prototype: ObjectId,
    /// `%Function.prototype%`
    pub function_prototype: ObjectId,
    /// `%Array.prototype%`
    pub array_prototype: ObjectId,
    /// `%ArrayIteratorPrototype%`
    pub array_iterator_prototype: ObjectId,
    /// `%Error.prototype%`
    pub error_prototype: ObjectId,
    /// `%TypeError.prototype%`
    pub type_error_prototype: ObjectId,
    /// `%RangeError.prototype%`
    pub range_error_prototype: ObjectId,
    /// `%Promise%`
    pub promise: ObjectId,
    /// `%Promise.prototype%`
    pub promise_prototype: ObjectId,
}

impl Intrinsics {
    /// Allocate the intrinsic objects with their prototype links
    pub(crate) fn allocate(heap: &mut Heap) -> Self {
        let ordinary = |heap: &mut Heap, proto: Option<ObjectId>| {
            heap.alloc(JsObject::new(proto, ObjectKind::Ordinary))
        };

        let object_prototype = ordinary(heap, None);
        let function_prototype = ordinary(heap, Some(object_prototype));
        let array_prototype = heap.alloc(JsObject::new(
            Some(object_prototype),
            ObjectKind::Array(Vec::new()),
        ));
        let array_iterator_prototype = ordinary(heap, Some(object_prototype));
        let error_prototype = ordinary(heap, Some(object_prototype));
        let type_error_prototype = ordinary(heap, Some(error_prototype));
        let range_error_prototype = ordinary(heap, Some(error_prototype));
        let promise_prototype = ordinary(heap, Some(object_prototype));
        let promise = heap.alloc(JsObject::new(
            Some(function_prototype),
            ObjectKind::Function(FunctionObject {
                name: Arc::from("Promise"),
                length: 1,
                kind: FunctionKind::Native(promise_impl::promise_call_behavior()),
                construct: Some(promise_impl::promise_construct_behavior()),
            }),
        ));

        Self {
            object_prototype,
            function_prototype,
            array_prototype,
            array_iterator_prototype,
            error_prototype,
            type_error_prototype,
            range_error_prototype,
            promise,
            promise_prototype,
        }
    }

    /// Prototype for instances of a native error kind
    pub fn error_prototype_for(&self, kind: ErrorKind) -> ObjectId {
        match kind {
            ErrorKind::Error => self.error_prototype,
            ErrorKind::TypeError => self.type_error_prototype,
            ErrorKind::RangeError => self.range_error_prototype,
        }
    }
}
