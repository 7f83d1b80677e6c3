//! Iterator protocol operations used by the combinators.

use crate::context::VmContext;
use crate::error::{VmError, VmResult};
use crate::object::WellKnownSymbol;
use crate::value::Value;

/// Iterator Record
#[derive(Clone, Debug)]
pub struct IteratorRecord {
    /// The iterator object
    pub iterator: Value,
    /// `next`, read once when the record is created
    pub next_method: Value,
    /// Set when the iterator reported completion or a step failed
    pub done: bool,
}

impl VmContext {
    /// GetIterator(obj, sync)
    pub fn get_iterator(&mut self, iterable: &Value) -> VmResult<IteratorRecord> {
        let method = self.get(iterable, WellKnownSymbol::Iterator)?;
        if !self.is_callable(&method) {
            return Err(VmError::type_error(format!(
                "{} is not iterable",
                self.describe(iterable)
            )));
        }
        let iterator = self.call(&method, iterable, &[])?;
        if !iterator.is_object() {
            return Err(VmError::type_error(
                "Result of the Symbol.iterator method is not an object",
            ));
        }
        let next_method = self.get(&iterator, "next")?;
        Ok(IteratorRecord {
            iterator,
            next_method,
            done: false,
        })
    }

    /// IteratorStepValue: the next value, or `None` once the iterator is
    /// done. Any abrupt completion marks the record done, so a failing
    /// iterator is never closed afterwards.
    pub fn iterator_step_value(&mut self, record: &mut IteratorRecord) -> VmResult<Option<Value>> {
        let step = self.step(record);
        if !matches!(step, Ok(Some(_))) {
            record.done = true;
        }
        step
    }

    fn step(&mut self, record: &IteratorRecord) -> VmResult<Option<Value>> {
        let result = self.call(&record.next_method, &record.iterator, &[])?;
        if !result.is_object() {
            return Err(VmError::type_error(format!(
                "Iterator result {} is not an object",
                self.describe(&result)
            )));
        }
        if self.get(&result, "done")?.to_boolean() {
            return Ok(None);
        }
        self.get(&result, "value").map(Some)
    }

    /// IteratorClose for a throw completion.
    ///
    /// Calls the iterator's `return` method if it has one. The original
    /// error is always what comes back; failures while looking up or
    /// calling `return` are discarded.
    pub fn iterator_close(&mut self, record: &IteratorRecord, completion: VmError) -> VmError {
        let Ok(return_method) = self.get(&record.iterator, "return") else {
            return completion;
        };
        if return_method.is_nullish() {
            return completion;
        }
        if let Err(discarded) = self.call(&return_method, &record.iterator, &[]) {
            tracing::trace!(%discarded, "iterator return failed during close");
        }
        completion
    }
}
