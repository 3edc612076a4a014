//! Operator dispatch
//!
//! Every binary operator is resolved through a table keyed by the pair of
//! operand type tags. The table is an exhaustive `match`, so adding a
//! `TypeTag` forces every operator to decide what it does with it. A pair
//! with no entry fails with `UnsupportedOperation` naming the operator and
//! both operand types.
//!
//! Streams broadcast: a stream against a scalar applies the operator to each
//! element, two streams combine pairwise and must have the same length.

use crate::Runtime;
use arevel_core::{BinaryOp, Number, RuntimeError, TypeTag, UnaryOp, Value};
use std::cmp::Ordering;

/// How a binary operator combines one tag pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kernel {
    Arithmetic,
    Concat,
    Compare,
    Equality,
    Logical,
    Contains,
    Identity,
    BroadcastLeft,
    BroadcastRight,
    Pairwise,
}

/// The dispatch table
fn kernel(op: BinaryOp, left: TypeTag, right: TypeTag) -> Option<Kernel> {
    use TypeTag as T;

    match op {
        BinaryOp::Add => match (left, right) {
            (T::Number, T::Number) => Some(Kernel::Arithmetic),
            (T::Text, T::Text | T::Number | T::Boolean | T::None)
            | (T::Number | T::Boolean | T::None, T::Text) => Some(Kernel::Concat),
            (T::Stream, T::Stream) => Some(Kernel::Pairwise),
            (T::Stream, T::Number | T::Text) => Some(Kernel::BroadcastLeft),
            (T::Number | T::Text, T::Stream) => Some(Kernel::BroadcastRight),
            _ => None,
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Pow => {
            match (left, right) {
                (T::Number, T::Number) => Some(Kernel::Arithmetic),
                (T::Stream, T::Stream) => Some(Kernel::Pairwise),
                (T::Stream, T::Number) => Some(Kernel::BroadcastLeft),
                (T::Number, T::Stream) => Some(Kernel::BroadcastRight),
                _ => None,
            }
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => match (left, right) {
            (T::Number, T::Number) | (T::Text, T::Text) => Some(Kernel::Compare),
            (T::Stream, T::Stream) => Some(Kernel::Pairwise),
            (T::Stream, T::Number | T::Text) => Some(Kernel::BroadcastLeft),
            (T::Number | T::Text, T::Stream) => Some(Kernel::BroadcastRight),
            _ => None,
        },
        BinaryOp::Eq | BinaryOp::Ne => match (left, right) {
            (T::Stream, T::Stream) => Some(Kernel::Pairwise),
            (T::Stream, _) => Some(Kernel::BroadcastLeft),
            (_, T::Stream) => Some(Kernel::BroadcastRight),
            _ => Some(Kernel::Equality),
        },
        BinaryOp::And | BinaryOp::Or => match (left, right) {
            (T::Stream, T::Stream) => Some(Kernel::Pairwise),
            (T::Stream, _) => Some(Kernel::BroadcastLeft),
            (_, T::Stream) => Some(Kernel::BroadcastRight),
            _ => Some(Kernel::Logical),
        },
        BinaryOp::In | BinaryOp::NotIn => match (left, right) {
            (_, T::Stream) | (_, T::Object) | (T::Text, T::Text) => Some(Kernel::Contains),
            _ => None,
        },
        BinaryOp::Is => Some(Kernel::Identity),
    }
}

/// Apply a binary operator to two runtime values
pub fn binary(op: BinaryOp, left: &Value, right: &Value, rt: &Runtime) -> Result<Value, RuntimeError> {
    let unsupported = || RuntimeError::unsupported_operation(op.symbol(), left.tag(), right.tag());
    let kernel = kernel(op, left.tag(), right.tag()).ok_or_else(unsupported)?;

    match kernel {
        Kernel::Arithmetic => match (left, right) {
            (Value::Number(a), Value::Number(b)) => arithmetic(op, a, b, rt),
            _ => Err(unsupported()),
        },
        Kernel::Concat => Ok(Value::Text(format!("{}{}", left, right))),
        Kernel::Compare => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a.cmp(b),
                (Value::Text(a), Value::Text(b)) => a.cmp(b),
                _ => return Err(unsupported()),
            };
            Ok(Value::Boolean(compare(op, ordering)))
        }
        Kernel::Equality | Kernel::Identity => {
            let equal = left == right;
            Ok(Value::Boolean(if op == BinaryOp::Ne { !equal } else { equal }))
        }
        Kernel::Logical => {
            let result = match op {
                BinaryOp::And => left.truthy() && right.truthy(),
                _ => left.truthy() || right.truthy(),
            };
            Ok(Value::Boolean(result))
        }
        Kernel::Contains => {
            let found = match right {
                Value::Stream(items) => items.contains(left),
                Value::Object(obj) => obj.contains_key(left),
                Value::Text(haystack) => match left {
                    Value::Text(needle) => haystack.contains(needle.as_str()),
                    _ => return Err(unsupported()),
                },
                _ => return Err(unsupported()),
            };
            Ok(Value::Boolean(if op == BinaryOp::NotIn { !found } else { found }))
        }
        Kernel::BroadcastLeft => match left {
            Value::Stream(items) => items
                .iter()
                .map(|item| binary(op, item, right, rt))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Stream),
            _ => Err(unsupported()),
        },
        Kernel::BroadcastRight => match right {
            Value::Stream(items) => items
                .iter()
                .map(|item| binary(op, left, item, rt))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Stream),
            _ => Err(unsupported()),
        },
        Kernel::Pairwise => match (left, right) {
            (Value::Stream(a), Value::Stream(b)) => {
                if a.len() != b.len() {
                    return Err(RuntimeError::length_mismatch(a.len(), b.len()));
                }
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| binary(op, x, y, rt))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Stream)
            }
            _ => Err(unsupported()),
        },
    }
}

fn arithmetic(op: BinaryOp, a: &Number, b: &Number, rt: &Runtime) -> Result<Value, RuntimeError> {
    let result = match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => a.sub(b),
        BinaryOp::Mul => a.mul(b),
        BinaryOp::Div => a.checked_div(b)?,
        BinaryOp::Rem => a.checked_rem(b)?,
        BinaryOp::Pow => a.pow_real(b, rt.precision)?,
        other => {
            return Err(RuntimeError::unsupported_operation(
                other.symbol(),
                TypeTag::Number,
                TypeTag::Number,
            ))
        }
    };
    Ok(Value::Number(result))
}

fn compare(op: BinaryOp, ordering: Ordering) -> bool {
    match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    }
}

/// Apply a unary operator
pub fn unary(op: UnaryOp, operand: &Value, rt: &Runtime) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (_, Value::Stream(items)) => items
            .iter()
            .map(|item| unary(op, item, rt))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Stream),
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(n.neg())),
        (UnaryOp::Neg, other) => Err(RuntimeError::unsupported_unary(op.symbol(), other.tag())),
        (UnaryOp::Not, other) => Ok(Value::Boolean(!other.truthy())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arevel_core::{codes, Object};
    use pretty_assertions::assert_eq;

    fn rt() -> Runtime {
        Runtime::new()
    }

    fn num(n: i64) -> Value {
        Value::from(n)
    }

    fn stream(items: &[i64]) -> Value {
        Value::Stream(items.iter().map(|n| num(*n)).collect())
    }

    #[test]
    fn test_add_numbers() {
        assert_eq!(binary(BinaryOp::Add, &num(1), &num(2), &rt()).unwrap(), num(3));
    }

    #[test]
    fn test_add_number_and_text_concatenates() {
        let result = binary(BinaryOp::Add, &num(1), &"a".into(), &rt()).unwrap();
        assert_eq!(result, Value::from("1a"));
    }

    #[test]
    fn test_stream_broadcasts_against_scalar() {
        let result = binary(BinaryOp::Add, &stream(&[1, 2]), &num(3), &rt()).unwrap();
        assert_eq!(result, stream(&[4, 5]));

        let result = binary(BinaryOp::Mul, &num(2), &stream(&[1, 2, 3]), &rt()).unwrap();
        assert_eq!(result, stream(&[2, 4, 6]));
    }

    #[test]
    fn test_streams_combine_pairwise() {
        let result = binary(BinaryOp::Sub, &stream(&[5, 7]), &stream(&[1, 2]), &rt()).unwrap();
        assert_eq!(result, stream(&[4, 5]));

        let err = binary(BinaryOp::Sub, &stream(&[5, 7]), &stream(&[1]), &rt()).unwrap_err();
        assert_eq!(err.code, codes::LENGTH_MISMATCH);
    }

    #[test]
    fn test_unsupported_pair_names_both_types() {
        let err = binary(BinaryOp::Add, &true.into(), &stream(&[1]), &rt()).unwrap_err();
        assert_eq!(err.code, codes::UNSUPPORTED_OPERATION);
        assert!(err.message.contains("boolean"), "{}", err.message);
        assert!(err.message.contains("stream"), "{}", err.message);
        assert!(err.message.contains('+'), "{}", err.message);
    }

    #[test]
    fn test_division_by_zero() {
        let err = binary(BinaryOp::Div, &num(1), &num(0), &rt()).unwrap_err();
        assert_eq!(err.code, codes::DIV_ZERO);
    }

    #[test]
    fn test_power_and_remainder() {
        assert_eq!(binary(BinaryOp::Pow, &num(2), &num(10), &rt()).unwrap(), num(1024));
        assert_eq!(binary(BinaryOp::Rem, &num(10), &num(4), &rt()).unwrap(), num(2));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(binary(BinaryOp::Lt, &num(1), &num(2), &rt()).unwrap(), Value::Boolean(true));
        assert_eq!(binary(BinaryOp::Ge, &num(1), &num(2), &rt()).unwrap(), Value::Boolean(false));
        assert_eq!(
            binary(BinaryOp::Lt, &"apple".into(), &"banana".into(), &rt()).unwrap(),
            Value::Boolean(true)
        );
        let err = binary(BinaryOp::Lt, &num(1), &"a".into(), &rt()).unwrap_err();
        assert_eq!(err.code, codes::UNSUPPORTED_OPERATION);
    }

    #[test]
    fn test_comparison_broadcasts() {
        let result = binary(BinaryOp::Gt, &stream(&[1, 5, 3]), &num(2), &rt()).unwrap();
        assert_eq!(result, Value::Stream(vec![false.into(), true.into(), true.into()]));
    }

    #[test]
    fn test_equality_across_types() {
        assert_eq!(binary(BinaryOp::Eq, &num(1), &"1".into(), &rt()).unwrap(), Value::Boolean(false));
        assert_eq!(binary(BinaryOp::Ne, &num(1), &"1".into(), &rt()).unwrap(), Value::Boolean(true));
        assert_eq!(binary(BinaryOp::Eq, &Value::None, &Value::None, &rt()).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_boolean_operators_coerce() {
        assert_eq!(binary(BinaryOp::And, &num(1), &"x".into(), &rt()).unwrap(), Value::Boolean(true));
        assert_eq!(binary(BinaryOp::Or, &num(0), &Value::None, &rt()).unwrap(), Value::Boolean(false));

        let result = binary(BinaryOp::And, &stream(&[0, 1]), &true.into(), &rt()).unwrap();
        assert_eq!(result, Value::Stream(vec![false.into(), true.into()]));
    }

    #[test]
    fn test_membership() {
        assert_eq!(binary(BinaryOp::In, &num(2), &stream(&[1, 2]), &rt()).unwrap(), Value::Boolean(true));
        assert_eq!(binary(BinaryOp::NotIn, &num(3), &stream(&[1, 2]), &rt()).unwrap(), Value::Boolean(true));
        assert_eq!(binary(BinaryOp::In, &"ell".into(), &"hello".into(), &rt()).unwrap(), Value::Boolean(true));

        let mut obj = Object::new();
        obj.insert("k".into(), num(1));
        assert_eq!(
            binary(BinaryOp::In, &"k".into(), &Value::Object(obj), &rt()).unwrap(),
            Value::Boolean(true)
        );

        let err = binary(BinaryOp::In, &num(1), &num(1), &rt()).unwrap_err();
        assert_eq!(err.code, codes::UNSUPPORTED_OPERATION);
    }

    #[test]
    fn test_is_does_not_broadcast() {
        let result = binary(BinaryOp::Is, &stream(&[1, 2]), &stream(&[1, 2]), &rt()).unwrap();
        assert_eq!(result, Value::Boolean(true));
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOp::Neg, &num(3), &rt()).unwrap(), num(-3));
        assert_eq!(unary(UnaryOp::Neg, &stream(&[1, -2]), &rt()).unwrap(), stream(&[-1, 2]));
        assert_eq!(unary(UnaryOp::Not, &Value::None, &rt()).unwrap(), Value::Boolean(true));
        let err = unary(UnaryOp::Neg, &"a".into(), &rt()).unwrap_err();
        assert_eq!(err.code, codes::UNSUPPORTED_OPERATION);
    }
}
