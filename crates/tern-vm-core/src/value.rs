//! JavaScript values
//!
//! Primitive values are stored inline; objects are handles into the
//! context's [`Heap`](crate::heap::Heap). A `Value` never owns heap data,
//! so cloning one is cheap and cannot create reference cycles.

use std::fmt;
use std::sync::Arc;

use crate::heap::ObjectId;

/// A JavaScript value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// IEEE 754 double
    Number(f64),
    /// Immutable string
    String(Arc<str>),
    /// Reference to a heap object
    Object(ObjectId),
}

impl Value {
    /// Create undefined value
    #[inline]
    pub fn undefined() -> Self {
        Self::Undefined
    }

    /// Create null value
    #[inline]
    pub fn null() -> Self {
        Self::Null
    }

    /// Create boolean value
    #[inline]
    pub fn boolean(b: bool) -> Self {
        Self::Boolean(b)
    }

    /// Create number value
    #[inline]
    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Create number value from a 32-bit integer
    #[inline]
    pub fn int32(n: i32) -> Self {
        Self::Number(n as f64)
    }

    /// Create string value
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Create object value
    #[inline]
    pub fn object(id: ObjectId) -> Self {
        Self::Object(id)
    }

    /// Check if undefined
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Check if null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if null or undefined
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Check if this is an object (including functions and promises)
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Get the object handle
    #[inline]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// ToBoolean
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// SameValue (ES2026 §7.2.10): like `==` on the representation, but
    /// NaN equals NaN and +0 differs from -0.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                a == b && a.is_sign_negative() == b.is_sign_negative()
            }
            _ => self == other,
        }
    }

    /// `typeof`-style name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) => "object",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Undefined
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e21 => {
                write!(f, "{}", *n as i64)
            }
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
            Self::Object(id) => write!(f, "[object #{}]", id.index()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::int32(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Object(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_nan_and_zero() {
        let nan = Value::number(f64::NAN);
        assert!(nan.same_value(&Value::number(f64::NAN)));
        assert!(!Value::number(0.0).same_value(&Value::number(-0.0)));
        assert!(Value::int32(3).same_value(&Value::number(3.0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::int32(42).to_string(), "42");
        assert_eq!(Value::number(1.5).to_string(), "1.5");
        assert_eq!(Value::undefined().to_string(), "undefined");
        assert_eq!(Value::string("abc").to_string(), "abc");
    }

    #[test]
    fn test_to_boolean() {
        assert!(!Value::undefined().to_boolean());
        assert!(!Value::number(f64::NAN).to_boolean());
        assert!(!Value::string("").to_boolean());
        assert!(Value::string("x").to_boolean());
        assert!(Value::int32(-1).to_boolean());
    }
}
