//! Argument extraction shared by the builtins

use arevel_core::{Function, Number, Object, RuntimeError, Value};

/// Fetch argument `index`, failing with an arity error naming `func`
pub fn arg<'a>(args: &'a [Value], index: usize, func: &str) -> Result<&'a Value, RuntimeError> {
    args.get(index)
        .ok_or_else(|| RuntimeError::arg_count(func, index + 1, args.len()))
}

/// Check an exact argument count
pub fn expect_args(args: &[Value], expected: usize, func: &str) -> Result<(), RuntimeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RuntimeError::arg_count(func, expected, args.len()))
    }
}

pub fn extract_number<'a>(value: &'a Value, func: &str) -> Result<&'a Number, RuntimeError> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(RuntimeError::arg_type(func, "number", other.tag())),
    }
}

pub fn extract_numbers(value: &Value, func: &str) -> Result<Vec<Number>, RuntimeError> {
    match value {
        Value::Stream(items) => items
            .iter()
            .map(|item| extract_number(item, func).cloned())
            .collect(),
        other => Err(RuntimeError::arg_type(func, "stream", other.tag())),
    }
}

pub fn extract_text<'a>(value: &'a Value, func: &str) -> Result<&'a str, RuntimeError> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(RuntimeError::arg_type(func, "text", other.tag())),
    }
}

pub fn extract_object<'a>(value: &'a Value, func: &str) -> Result<&'a Object, RuntimeError> {
    match value {
        Value::Object(o) => Ok(o),
        other => Err(RuntimeError::arg_type(func, "object", other.tag())),
    }
}

pub fn extract_function<'a>(value: &'a Value, func: &str) -> Result<&'a Function, RuntimeError> {
    match value {
        Value::Function(f) => Ok(f),
        other => Err(RuntimeError::arg_type(func, "function", other.tag())),
    }
}

/// Convert an integral number to a signed index
pub fn extract_index(value: &Number, func: &str) -> Result<i64, RuntimeError> {
    value
        .to_i64()
        .ok_or_else(|| RuntimeError::arg_type(func, "integer", arevel_core::TypeTag::Number))
}
