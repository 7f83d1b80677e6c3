//! Object arena.
//!
//! Every object created by a [`VmContext`](crate::VmContext) lives in its
//! `Heap` and is addressed by an [`ObjectId`]. Objects are never freed one
//! by one: the whole arena is dropped with its context. Reactions, jobs and
//! combinator state hold handles rather than owning pointers, so a promise
//! that is captured by its own reactions does not form an ownership cycle.

use crate::object::JsObject;

/// Handle to an object in a [`Heap`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Position of the object in its arena
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owning table of all objects of one context
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<JsObject>,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an object into the heap and return its handle
    pub fn alloc(&mut self, object: JsObject) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    /// Borrow an object.
    ///
    /// Handles are only minted by [`Heap::alloc`], so every `ObjectId` a
    /// context hands out is valid for that context.
    #[inline]
    pub fn get(&self, id: ObjectId) -> &JsObject {
        &self.objects[id.index()]
    }

    /// Borrow an object mutably
    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> &mut JsObject {
        &mut self.objects[id.index()]
    }

    /// Number of allocated objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no object has been allocated yet
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;

    #[test]
    fn test_alloc_returns_distinct_handles() {
        let mut heap = Heap::new();
        assert!(heap.is_empty());
        let a = heap.alloc(JsObject::new(None, ObjectKind::Ordinary));
        let b = heap.alloc(JsObject::new(Some(a), ObjectKind::Ordinary));
        assert_ne!(a, b);
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.get(b).prototype, Some(a));
    }
}
