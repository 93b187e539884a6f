//! Runtime value model: one tagged value per operand-stack or local
//! slot. Longs and doubles occupy a single slot, and the reference
//! view is folded into the same enum, so a slot is never "half" of
//! anything.
use std::fmt;
use std::sync::Arc;

/// A single operand-stack or local-variable slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Ref(Reference),
}

impl Value {
    /// Default value for a field or local of the given descriptor:
    /// zero for primitives, null for objects and arrays.
    pub fn default_of(descriptor: &str) -> Value {
        match descriptor.as_bytes().first() {
            Some(b'B' | b'C' | b'I' | b'S' | b'Z') => Value::Int(0),
            Some(b'J') => Value::Long(0),
            Some(b'F') => Value::Float(0.0),
            Some(b'D') => Value::Double(0.0),
            _ => Value::Ref(Reference::Null),
        }
    }

    /// Narrow the slot to an int. The interpreter trusts its input, so
    /// a slot of another kind converts instead of failing.
    pub fn as_int(&self) -> i32 {
        match *self {
            Value::Int(v) => v,
            Value::Long(v) => v as i32,
            Value::Float(v) => v as i32,
            Value::Double(v) => v as i32,
            Value::Ref(_) => 0,
        }
    }

    pub fn as_long(&self) -> i64 {
        match *self {
            Value::Int(v) => i64::from(v),
            Value::Long(v) => v,
            Value::Float(v) => v as i64,
            Value::Double(v) => v as i64,
            Value::Ref(_) => 0,
        }
    }

    pub fn as_float(&self) -> f32 {
        match *self {
            Value::Int(v) => v as f32,
            Value::Long(v) => v as f32,
            Value::Float(v) => v,
            Value::Double(v) => v as f32,
            Value::Ref(_) => 0.0,
        }
    }

    pub fn as_double(&self) -> f64 {
        match *self {
            Value::Int(v) => f64::from(v),
            Value::Long(v) => v as f64,
            Value::Float(v) => f64::from(v),
            Value::Double(v) => v,
            Value::Ref(_) => 0.0,
        }
    }

    /// Reference view of the slot. Primitive slots read as null.
    pub fn as_ref_value(&self) -> Reference {
        match self {
            Value::Ref(r) => r.clone(),
            _ => Reference::Null,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Ref(_))
    }
}

/// Everything the interpreter treats as an object pointer: null,
/// interned strings, heap ids for objects and arrays, bare class
/// tokens for classes that were never loaded, and opaque host values
/// handed out by natives (the console object, the current thread).
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Null,
    Str(Arc<str>),
    Object(u64),
    Array(u64),
    Class(Arc<str>),
    Host(&'static str),
}

impl Reference {
    pub fn is_null(&self) -> bool {
        matches!(self, Reference::Null)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Null => write!(f, "null"),
            Reference::Str(s) => write!(f, "\"{s}\""),
            Reference::Object(id) => write!(f, "obj@{id}"),
            Reference::Array(id) => write!(f, "arr@{id}"),
            Reference::Class(name) => write!(f, "class<{name}>"),
            Reference::Host(token) => write!(f, "{token}"),
        }
    }
}
