//! Heap objects and the minimal property model the promise core relies on.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::function::FunctionObject;
use crate::heap::ObjectId;
use crate::promise::PromiseSlot;
use crate::value::Value;

/// Well-known symbols used as property keys
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    /// `Symbol.iterator`
    Iterator,
    /// `Symbol.species`
    Species,
    /// `Symbol.toStringTag`
    ToStringTag,
}

/// Property key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String-named property
    String(Arc<str>),
    /// Array index
    Index(u32),
    /// Well-known symbol
    Symbol(WellKnownSymbol),
}

impl PropertyKey {
    /// Create a string key
    pub fn string(s: &str) -> Self {
        Self::String(Arc::from(s))
    }

    /// Check whether this key names the given string property
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, Self::String(s) if &**s == name)
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

impl From<WellKnownSymbol> for PropertyKey {
    fn from(symbol: WellKnownSymbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Index(i) => write!(f, "{}", i),
            Self::Symbol(WellKnownSymbol::Iterator) => write!(f, "Symbol(Symbol.iterator)"),
            Self::Symbol(WellKnownSymbol::Species) => write!(f, "Symbol(Symbol.species)"),
            Self::Symbol(WellKnownSymbol::ToStringTag) => write!(f, "Symbol(Symbol.toStringTag)"),
        }
    }
}

/// An own property
#[derive(Clone, Debug)]
pub enum Property {
    /// Plain value
    Data(Value),
    /// Getter/setter pair; either side may be absent
    Accessor {
        /// Function called on `Get`
        getter: Option<Value>,
        /// Function called on `Set`
        setter: Option<Value>,
    },
}

/// Native error constructors known to the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// `Error`
    Error,
    /// `TypeError`
    TypeError,
    /// `RangeError`
    RangeError,
}

impl ErrorKind {
    /// Constructor name, also used as the `name` property
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
        }
    }
}

/// Built-in array iterator state
#[derive(Clone, Debug)]
pub struct ArrayIteratorState {
    /// Iterated array
    pub array: ObjectId,
    /// Next index to yield
    pub next_index: usize,
    /// Set once the iterator has reported `done`
    pub exhausted: bool,
}

/// Internal slots that distinguish exotic and built-in objects
#[derive(Debug)]
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array with dense element storage
    Array(Vec<Value>),
    /// Error instance
    Error(ErrorKind),
    /// Callable (and possibly constructible) object
    Function(FunctionObject),
    /// Promise instance
    Promise(PromiseSlot),
    /// `%ArrayIteratorPrototype%` instance
    ArrayIterator(ArrayIteratorState),
}

/// A heap object
#[derive(Debug)]
pub struct JsObject {
    /// `[[Prototype]]`
    pub prototype: Option<ObjectId>,
    /// Own properties in insertion order
    pub properties: IndexMap<PropertyKey, Property>,
    /// Internal slots
    pub kind: ObjectKind,
}

impl JsObject {
    /// Create an object with no own properties
    pub fn new(prototype: Option<ObjectId>, kind: ObjectKind) -> Self {
        Self {
            prototype,
            properties: IndexMap::new(),
            kind,
        }
    }

    /// Look up an own property
    pub fn get_own(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Define (or overwrite) an own data property
    pub fn define_data(&mut self, key: PropertyKey, value: Value) {
        self.properties.insert(key, Property::Data(value));
    }

    /// Whether `[[Call]]` is present
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    /// Whether `[[Construct]]` is present
    pub fn is_constructor(&self) -> bool {
        matches!(&self.kind, ObjectKind::Function(f) if f.construct.is_some())
    }

    /// Promise internal slots, if this is a promise
    pub fn as_promise(&self) -> Option<&PromiseSlot> {
        match &self.kind {
            ObjectKind::Promise(slot) => Some(slot),
            _ => None,
        }
    }

    /// Mutable promise internal slots, if this is a promise
    pub fn as_promise_mut(&mut self) -> Option<&mut PromiseSlot> {
        match &mut self.kind {
            ObjectKind::Promise(slot) => Some(slot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_key_display() {
        assert_eq!(PropertyKey::from("then").to_string(), "then");
        assert_eq!(PropertyKey::from(3u32).to_string(), "3");
        assert_eq!(
            PropertyKey::from(WellKnownSymbol::Iterator).to_string(),
            "Symbol(Symbol.iterator)"
        );
        assert!(PropertyKey::from("then").is_named("then"));
    }

    #[test]
    fn test_define_data_keeps_insertion_order() {
        let mut obj = JsObject::new(None, ObjectKind::Ordinary);
        obj.define_data("status".into(), Value::string("fulfilled"));
        obj.define_data("value".into(), Value::int32(1));
        let keys: Vec<String> = obj.properties.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["status", "value"]);
        assert!(!obj.is_callable());
        assert!(obj.as_promise().is_none());
    }
}
