//! Runtime values in Arevel
//!
//! Values are none, booleans, numbers, text, streams (ordered sequences),
//! objects (maps with flat entries and callable signatures) or functions.
//! Every value is `Send + Sync`, so finished results can cross threads.

use crate::{Function, Number, Object};
use serde::Serialize;
use std::fmt;

/// Runtime value in Arevel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    None,
    Boolean(bool),
    Number(Number),
    Text(String),
    Stream(Vec<Value>),
    Object(Object),
    Function(Function),
}

/// Operand type tag used by the runtime dispatch tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    None,
    Boolean,
    Number,
    Text,
    Stream,
    Object,
    Function,
}

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::None => "none",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::Text => "text",
            TypeTag::Stream => "stream",
            TypeTag::Object => "object",
            TypeTag::Function => "function",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    // ========== Safe Accessors (never panic) ==========

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Dispatch tag of this value
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::None => TypeTag::None,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::Text(_) => TypeTag::Text,
            Value::Stream(_) => TypeTag::Stream,
            Value::Object(_) => TypeTag::Object,
            Value::Function(_) => TypeTag::Function,
        }
    }

    /// Type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    /// Truth value used by conditionals and boolean operators.
    /// Streams and objects are truthy when non-empty.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_zero(),
            Value::Text(s) => !s.is_empty(),
            Value::Stream(items) => !items.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Function(_) => true,
        }
    }

    /// Render for display inside a container: text is quoted.
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("none"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Stream(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                f.write_str("]")
            }
            Value::Object(obj) => {
                f.write_str("{")?;
                let mut first = true;
                for (key, value) in obj.entries() {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    key.fmt_nested(f)?;
                    f.write_str(": ")?;
                    value.fmt_nested(f)?;
                }
                for method in obj.methods() {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}", method)?;
                }
                f.write_str("}")
            }
            Value::Function(func) => write!(f, "{}", func),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::None
    }
}

// From implementations for convenience
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from_i64(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Stream(items)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Value::Function(func)
    }
}
