//! Builtin functions called by generated code
//!
//! Generated code never evaluates operators or structural forms inline; it
//! calls one of these builtins by name. Both backends share the names, so
//! JavaScript output and the in-process machine agree on the calling
//! convention.

use crate::dispatch::{binary, unary};
use crate::helpers::{
    arg, expect_args, extract_function, extract_index, extract_numbers, extract_object,
    extract_text,
};
use crate::Runtime;
use arevel_core::{BinaryOp, Number, Object, RuntimeError, UnaryOp, Value};

/// A runtime library entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Binary(BinaryOp),
    Unary(UnaryOp),
    /// `__stream__(array)`: wrap an array literal as a stream
    Stream,
    /// `__generate__(before, after, inclusive)`: arithmetic progression
    Generate,
    /// `__map__()`: empty object
    Map,
    /// `__insert__(object, key, value)`: object with one more flat entry
    Insert,
    /// `__define__(object, function)`: object with one more signature entry
    Define,
    /// `__guard__(function, guard)`: function restricted by a guard
    Guard,
    /// `__call__(callee, args...)`
    Call,
    /// `__attr__(object, name)`
    Attr,
    /// `__get__(target, filter)`: indexing and filtering
    Get,
    /// `__cond__(condition, then, else)`: `then`/`else` are zero-argument functions
    Cond,
    /// `__unresolved__(name)`: always fails
    Unresolved,
}

impl Builtin {
    /// Name used by generated code
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Binary(op) => op.runtime_name(),
            Builtin::Unary(op) => op.runtime_name(),
            Builtin::Stream => "__stream__",
            Builtin::Generate => "__generate__",
            Builtin::Map => "__map__",
            Builtin::Insert => "__insert__",
            Builtin::Define => "__define__",
            Builtin::Guard => "__guard__",
            Builtin::Call => "__call__",
            Builtin::Attr => "__attr__",
            Builtin::Get => "__get__",
            Builtin::Cond => "__cond__",
            Builtin::Unresolved => "__unresolved__",
        }
    }

    pub fn call(self, args: Vec<Value>, rt: &Runtime) -> Result<Value, RuntimeError> {
        let name = self.name();
        match self {
            Builtin::Binary(op) => {
                expect_args(&args, 2, name)?;
                binary(op, &args[0], &args[1], rt)
            }
            Builtin::Unary(op) => {
                expect_args(&args, 1, name)?;
                unary(op, &args[0], rt)
            }
            Builtin::Stream => {
                expect_args(&args, 1, name)?;
                match args.into_iter().next() {
                    Some(Value::Stream(items)) => Ok(Value::Stream(items)),
                    Some(other) => Err(RuntimeError::arg_type(name, "stream", other.tag())),
                    None => Err(RuntimeError::arg_count(name, 1, 0)),
                }
            }
            Builtin::Generate => {
                expect_args(&args, 3, name)?;
                let before = extract_numbers(&args[0], name)?;
                let after = extract_numbers(&args[1], name)?;
                generate(&before, &after, args[2].truthy(), rt)
            }
            Builtin::Map => {
                expect_args(&args, 0, name)?;
                Ok(Value::Object(Object::new()))
            }
            Builtin::Insert => {
                expect_args(&args, 3, name)?;
                let mut args = args.into_iter();
                let (target, key, value) = match (args.next(), args.next(), args.next()) {
                    (Some(t), Some(k), Some(v)) => (t, k, v),
                    _ => return Err(RuntimeError::arg_count(name, 3, 0)),
                };
                let mut obj = extract_object(&target, name)?.clone();
                obj.insert(key, value);
                Ok(Value::Object(obj))
            }
            Builtin::Define => {
                expect_args(&args, 2, name)?;
                let mut obj = extract_object(&args[0], name)?.clone();
                obj.define(extract_function(&args[1], name)?.clone());
                Ok(Value::Object(obj))
            }
            Builtin::Guard => {
                expect_args(&args, 2, name)?;
                let func = extract_function(&args[0], name)?;
                let guard = extract_function(&args[1], name)?;
                Ok(Value::Function(func.clone().with_guard(guard)))
            }
            Builtin::Call => {
                let mut args = args.into_iter();
                let callee = args.next().ok_or_else(|| RuntimeError::arg_count(name, 1, 0))?;
                call_value(&callee, args.collect())
            }
            Builtin::Attr => {
                expect_args(&args, 2, name)?;
                let field = extract_text(&args[1], name)?;
                attr(&args[0], field)
            }
            Builtin::Get => {
                expect_args(&args, 2, name)?;
                get(&args[0], &args[1])
            }
            Builtin::Cond => {
                if args.len() != 2 && args.len() != 3 {
                    return Err(RuntimeError::arg_count(name, 3, args.len()));
                }
                let branch = if arg(&args, 0, name)?.truthy() {
                    Some(&args[1])
                } else {
                    args.get(2)
                };
                match branch {
                    Some(Value::Function(f)) => f.invoke(Vec::new()),
                    Some(Value::None) | None => Ok(Value::None),
                    Some(other) => Err(RuntimeError::arg_type(name, "function", other.tag())),
                }
            }
            Builtin::Unresolved => {
                expect_args(&args, 1, name)?;
                Err(RuntimeError::unresolved_reference(extract_text(&args[0], name)?))
            }
        }
    }
}

/// Apply a function or an object with signature entries.
///
/// A function checks arity and guard. An object tries its signature entries
/// in declaration order and applies the first one that accepts the arguments.
pub fn call_value(callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match callee {
        Value::Function(func) => {
            if args.len() != func.arity() {
                return Err(RuntimeError::arg_count(
                    &func.to_string(),
                    func.arity(),
                    args.len(),
                ));
            }
            if !func.accepts(&args)? {
                return Err(RuntimeError::no_matching_signature(args.len()));
            }
            func.invoke(args)
        }
        Value::Object(obj) => {
            for method in obj.methods() {
                if method.accepts(&args)? {
                    return method.invoke(args);
                }
            }
            Err(RuntimeError::no_matching_signature(args.len()))
        }
        other => Err(RuntimeError::not_callable(other.tag())),
    }
}

/// Member access: flat text-keyed entries of an object
pub fn attr(target: &Value, field: &str) -> Result<Value, RuntimeError> {
    match target {
        Value::Object(obj) => obj
            .field(field)
            .cloned()
            .ok_or_else(|| RuntimeError::undefined_field(field)),
        other => Err(RuntimeError::undefined_field(field)
            .with_note(format!("value of type {} has no fields", other.tag()))),
    }
}

/// Indexing and filtering
///
/// - stream by number: element, negative indices count from the end
/// - stream by stream: keep elements whose mask entry is truthy
/// - stream by function or callable object: keep elements the predicate accepts
/// - object by key: flat entry
/// - text by number: character
pub fn get(target: &Value, filter: &Value) -> Result<Value, RuntimeError> {
    match (target, filter) {
        (Value::Stream(items), Value::Number(n)) => {
            let index = extract_index(n, "__get__")?;
            resolve_index(index, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| RuntimeError::index_out_of_range(index, items.len()))
        }
        (Value::Stream(items), Value::Stream(mask)) => {
            if items.len() != mask.len() {
                return Err(RuntimeError::length_mismatch(items.len(), mask.len()));
            }
            Ok(Value::Stream(
                items
                    .iter()
                    .zip(mask.iter())
                    .filter(|(_, keep)| keep.truthy())
                    .map(|(item, _)| item.clone())
                    .collect(),
            ))
        }
        (Value::Stream(items), predicate @ (Value::Function(_) | Value::Object(_))) => {
            let mut kept = Vec::new();
            for item in items {
                if call_value(predicate, vec![item.clone()])?.truthy() {
                    kept.push(item.clone());
                }
            }
            Ok(Value::Stream(kept))
        }
        (Value::Object(obj), key) => obj
            .get(key)
            .cloned()
            .ok_or_else(|| RuntimeError::undefined_field(&key.to_string())),
        (Value::Text(text), Value::Number(n)) => {
            let index = extract_index(n, "__get__")?;
            let len = text.chars().count();
            resolve_index(index, len)
                .and_then(|i| text.chars().nth(i))
                .map(|c| Value::Text(c.to_string()))
                .ok_or_else(|| RuntimeError::index_out_of_range(index, len))
        }
        (target, filter) => Err(RuntimeError::unsupported_operation(
            "[]",
            target.tag(),
            filter.tag(),
        )),
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

/// Build the stream for `[before.., start .. end, after..]`.
///
/// `before` holds the elements written before the range operator, its last
/// element being the start (0 when empty). `after` holds the elements
/// written after it, its first element being the end. The step is the
/// difference of the last two `before` elements, or 1 toward the end.
pub fn generate(
    before: &[Number],
    after: &[Number],
    inclusive: bool,
    rt: &Runtime,
) -> Result<Value, RuntimeError> {
    let (end, tail) = after.split_first().ok_or_else(RuntimeError::unbounded_range)?;
    let zero = Number::from_i64(0);
    let (start, prefix) = match before.split_last() {
        Some((start, prefix)) => (start.clone(), prefix),
        None => (zero.clone(), before),
    };

    let step = match prefix.last() {
        Some(previous) => start.sub(previous),
        None if *end < start => Number::from_i64(-1),
        None => Number::from_i64(1),
    };
    if step.is_zero() {
        return Err(RuntimeError::domain_error("range step is zero"));
    }
    let ascending = step > zero;

    let mut items: Vec<Value> = prefix.iter().cloned().map(Value::Number).collect();
    let mut current = start;
    loop {
        let within = match (ascending, inclusive) {
            (true, true) => current <= *end,
            (true, false) => current < *end,
            (false, true) => current >= *end,
            (false, false) => current > *end,
        };
        if !within {
            break;
        }
        if items.len() >= rt.max_stream_len {
            return Err(RuntimeError::stream_too_long(rt.max_stream_len));
        }
        let next = current.add(&step);
        items.push(Value::Number(current));
        current = next;
    }
    items.extend(tail.iter().cloned().map(Value::Number));

    if items.len() > rt.max_stream_len {
        return Err(RuntimeError::stream_too_long(rt.max_stream_len));
    }
    Ok(Value::Stream(items))
}
