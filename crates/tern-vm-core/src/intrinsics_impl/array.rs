//! Array iteration: `Array.prototype[@@iterator]` / `values` and
//! `%ArrayIteratorPrototype%.next`.
//!
//! The iterator reads the array's elements live, so elements appended
//! while iterating are still visited.

use crate::context::VmContext;
use crate::error::{VmError, VmResult};
use crate::object::{ArrayIteratorState, JsObject, ObjectKind, WellKnownSymbol};
use crate::value::Value;

/// CreateIterResultObject
pub fn create_iter_result(ctx: &mut VmContext, value: Value, done: bool) -> Value {
    ctx.create_data_object(&[("value", value), ("done", Value::boolean(done))])
}

fn make_array_iterator(ctx: &mut VmContext, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let array = match this.as_object() {
        Some(id) if matches!(ctx.heap().get(id).kind, ObjectKind::Array(_)) => id,
        _ => {
            return Err(VmError::type_error(format!(
                "Array.prototype.values called on {}",
                ctx.describe(this)
            )));
        }
    };
    let proto = ctx.intrinsics().array_iterator_prototype;
    let iterator = ctx.heap_mut().alloc(JsObject::new(
        Some(proto),
        ObjectKind::ArrayIterator(ArrayIteratorState {
            array,
            next_index: 0,
            exhausted: false,
        }),
    ));
    Ok(Value::Object(iterator))
}

fn array_iterator_next(ctx: &mut VmContext, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let incompatible = || VmError::type_error("next method called on incompatible receiver");
    let id = this.as_object().ok_or_else(incompatible)?;
    let (array, index, exhausted) = match &ctx.heap().get(id).kind {
        ObjectKind::ArrayIterator(state) => (state.array, state.next_index, state.exhausted),
        _ => return Err(incompatible()),
    };
    if exhausted {
        return Ok(create_iter_result(ctx, Value::Undefined, true));
    }

    let element = match &ctx.heap().get(array).kind {
        ObjectKind::Array(elements) => elements.get(index).cloned(),
        _ => None,
    };
    if let ObjectKind::ArrayIterator(state) = &mut ctx.heap_mut().get_mut(id).kind {
        match element {
            Some(_) => state.next_index += 1,
            None => state.exhausted = true,
        }
    }
    Ok(match element {
        Some(value) => create_iter_result(ctx, value, false),
        None => create_iter_result(ctx, Value::Undefined, true),
    })
}

/// Install array iteration on `%Array.prototype%` and
/// `%ArrayIteratorPrototype%`
pub fn init_array_prototype(ctx: &mut VmContext) {
    let intrinsics = *ctx.intrinsics();

    let values = ctx.create_native_function("values", 0, make_array_iterator);
    ctx.define_property(intrinsics.array_prototype, "values", values.clone());
    ctx.define_property(intrinsics.array_prototype, WellKnownSymbol::Iterator, values);

    let next = ctx.create_native_function("next", 0, array_iterator_next);
    ctx.define_property(intrinsics.array_iterator_prototype, "next", next);
    ctx.define_property(
        intrinsics.array_iterator_prototype,
        WellKnownSymbol::ToStringTag,
        Value::string("Array Iterator"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterator_sees_appended_elements() {
        let mut ctx = VmContext::new();
        let arr = ctx.create_array(vec![Value::int32(1)]);
        let iterator = ctx.invoke(&arr, WellKnownSymbol::Iterator, &[]).unwrap();

        let first = ctx.invoke(&iterator, "next", &[]).unwrap();
        assert_eq!(ctx.get(&first, "value").unwrap(), Value::int32(1));
        ctx.set(&arr, 1u32, Value::int32(2)).unwrap();
        let second = ctx.invoke(&iterator, "next", &[]).unwrap();
        assert_eq!(ctx.get(&second, "value").unwrap(), Value::int32(2));

        let end = ctx.invoke(&iterator, "next", &[]).unwrap();
        assert_eq!(ctx.get(&end, "done").unwrap(), Value::boolean(true));
        ctx.set(&arr, 2u32, Value::int32(3)).unwrap();
        let still_done = ctx.invoke(&iterator, "next", &[]).unwrap();
        assert_eq!(ctx.get(&still_done, "done").unwrap(), Value::boolean(true));
    }

    #[test]
    fn test_next_on_wrong_receiver() {
        let mut ctx = VmContext::new();
        let arr = ctx.create_array(Vec::new());
        let iterator = ctx.invoke(&arr, "values", &[]).unwrap();
        let next = ctx.get(&iterator, "next").unwrap();
        let plain = ctx.create_object();
        assert!(ctx.call(&next, &plain, &[]).is_err());
    }
}
