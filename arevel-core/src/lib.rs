//! Arevel Core - Fundamental types
//!
//! This crate provides the core types used throughout Arevel:
//! - `Number`: Arbitrary precision decimal numbers
//! - `Value`: Runtime values (none, booleans, numbers, text, streams, objects, functions)
//! - `SyntaxError` / `RuntimeError`: Structured errors with machine-readable codes
//! - `BinaryOp` / `UnaryOp`: Operator vocabulary shared by parser and runtime

mod error;
mod function;
mod number;
mod object;
mod ops;
mod value;

pub use error::{codes, ArevelError, RuntimeError, SyntaxError};
pub use function::{Callable, Function};
pub use number::{Number, NumberError, DEFAULT_PRECISION};
pub use object::Object;
pub use ops::{BinaryOp, UnaryOp};
pub use value::{TypeTag, Value};

/// Cell identifier, unique within one view snapshot
pub type CellId = u64;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::codes;
    pub use crate::{
        ArevelError, BinaryOp, CellId, Function, Number, Object, RuntimeError, SyntaxError,
        TypeTag, UnaryOp, Value,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    mod number_tests {
        use super::*;

        #[test]
        fn test_from_i64() {
            let n = Number::from_i64(42);
            assert_eq!(n.to_i64(), Some(42));
        }

        #[test]
        fn test_from_str_integer() {
            let n = Number::from_str("123").unwrap();
            assert_eq!(n.to_i64(), Some(123));
        }

        #[test]
        fn test_from_str_decimal() {
            let n = Number::from_str("3.1415").unwrap();
            assert!(!n.is_integer());
            assert_eq!(n.to_string(), "3.1415");
        }

        #[test]
        fn test_from_str_leading_dot() {
            let n = Number::from_str(".75").unwrap();
            assert_eq!(n.to_string(), "0.75");
            let n = Number::from_str("-.5").unwrap();
            assert_eq!(n.to_string(), "-0.5");
        }

        #[test]
        fn test_from_str_scientific() {
            let n = Number::from_str("1.5e2").unwrap();
            assert_eq!(n.to_i64(), Some(150));

            let n = Number::from_str("123e+10").unwrap();
            assert_eq!(n.to_i64(), Some(1_230_000_000_000));

            let n = Number::from_str("1e-10").unwrap();
            assert_eq!(n.to_string(), "0.0000000001");
        }

        #[test]
        fn test_from_str_rejects_garbage() {
            assert!(Number::from_str("").is_err());
            assert!(Number::from_str(".").is_err());
            assert!(Number::from_str("5.1e").is_err());
            assert!(Number::from_str("12a").is_err());
        }

        #[test]
        fn test_display_integers_plainly() {
            assert_eq!(Number::from_i64(1).to_string(), "1");
            assert_eq!(Number::from_i64(-42).to_string(), "-42");
            assert_eq!(Number::from_i64(0).to_string(), "0");
            assert_eq!(Number::from_str("2.50").unwrap().to_string(), "2.5");
        }

        #[test]
        fn test_decimal_addition_is_exact() {
            let a = Number::from_str("0.1").unwrap();
            let b = Number::from_str("0.2").unwrap();
            assert_eq!(a.add(&b), Number::from_str("0.3").unwrap());
        }

        #[test]
        fn test_arithmetic() {
            let a = Number::from_i64(50);
            let b = Number::from_i64(8);
            assert_eq!(a.add(&b).to_i64(), Some(58));
            assert_eq!(a.sub(&b).to_i64(), Some(42));
            assert_eq!(a.mul(&b).to_i64(), Some(400));
            assert_eq!(a.neg().to_i64(), Some(-50));
            assert_eq!(a.checked_div(&b).unwrap().to_string(), "6.25");
        }

        #[test]
        fn test_div_by_zero() {
            let a = Number::from_i64(42);
            let b = Number::from_i64(0);
            assert_eq!(a.checked_div(&b), Err(NumberError::DivisionByZero));
            assert_eq!(a.checked_rem(&b), Err(NumberError::DivisionByZero));
        }

        #[test]
        fn test_rem_follows_dividend_sign() {
            let seven = Number::from_i64(7);
            let three = Number::from_i64(3);
            assert_eq!(seven.checked_rem(&three).unwrap().to_i64(), Some(1));
            assert_eq!(seven.neg().checked_rem(&three).unwrap().to_i64(), Some(-1));
        }

        #[test]
        fn test_pow() {
            let n = Number::from_i64(2);
            assert_eq!(n.pow(10).unwrap().to_i64(), Some(1024));
            assert_eq!(n.pow(-2).unwrap().to_string(), "0.25");
            assert_eq!(n.pow(0).unwrap().to_i64(), Some(1));
            assert_eq!(Number::from_i64(0).pow(-1), Err(NumberError::DivisionByZero));
        }

        #[test]
        fn test_pow_real_fractional() {
            let four = Number::from_i64(4);
            let half = Number::from_str("0.5").unwrap();
            let result = four.pow_real(&half, 50).unwrap();
            assert!(result.to_string().starts_with("2") || result.to_string().starts_with("1.9999"));

            let negative = Number::from_i64(-4);
            assert!(matches!(
                negative.pow_real(&half, 50),
                Err(NumberError::DomainError(_))
            ));
        }

        #[test]
        fn test_pow_real_rejects_zero_precision() {
            let two = Number::from_i64(2);
            let half = Number::from_str("0.5").unwrap();
            assert!(matches!(two.pow_real(&half, 0), Err(NumberError::DomainError(_))));
            // integer exponents never consult the precision
            assert_eq!(two.pow_real(&Number::from_i64(3), 0).unwrap().to_i64(), Some(8));
        }

        #[test]
        fn test_long_literals_keep_every_digit() {
            let text = "123456789012345678901234567890123456789012345678901234567890";
            assert_eq!(Number::from_str(text).unwrap().to_string(), text);

            let text = "-0.000123456789012345678901234567890123456789012345678901234567890123";
            assert_eq!(Number::from_str(text).unwrap().to_string(), text);

            let a = Number::from_str("100000000000000000000000000000000000000000000000000000000001").unwrap();
            let b = Number::from_str("100000000000000000000000000000000000000000000000000000000000").unwrap();
            assert_ne!(a, b);
        }

        #[test]
        fn test_huge_exponents_display_compactly() {
            assert_eq!(Number::from_str("1e20000000").unwrap().to_string(), "1e20000000");
            assert_eq!(Number::from_str("-2.5e-20000000").unwrap().to_string(), "-25e-20000001");
            assert_eq!(Number::from_str("12300e100").unwrap().to_string(), "123e102");
            assert_eq!(Number::from_str("1e65").unwrap().to_string(), "1e65");
            assert_eq!(Number::from_str("1e-70").unwrap().to_string(), "1e-70");

            let padded = Number::from_str("1e64").unwrap().to_string();
            assert_eq!(padded.len(), 65);
            assert!(padded.starts_with('1') && padded[1..].chars().all(|c| c == '0'));

            for text in ["1e20000000", "-25e-20000001", "123e102"] {
                let n = Number::from_str(text).unwrap();
                assert_eq!(Number::from_str(&n.to_string()).unwrap(), n);
            }
        }

        #[test]
        fn test_ordering() {
            assert!(Number::from_i64(1) < Number::from_i64(2));
            assert!(Number::from_str("-0.5").unwrap() < Number::from_i64(0));
        }
    }

    mod value_tests {
        use super::*;

        #[test]
        fn test_from_i64() {
            let v: Value = 42i64.into();
            assert!(matches!(v, Value::Number(_)));
            assert_eq!(v.as_number().unwrap().to_i64(), Some(42));
        }

        #[test]
        fn test_from_str() {
            let v: Value = "hello".into();
            assert_eq!(v.as_text(), Some("hello"));
        }

        #[test]
        fn test_tags() {
            assert_eq!(Value::from(0).tag(), TypeTag::Number);
            assert_eq!(Value::from("").tag(), TypeTag::Text);
            assert_eq!(Value::from(true).type_name(), "boolean");
            assert_eq!(Value::None.type_name(), "none");
            assert_eq!(Value::Stream(vec![]).type_name(), "stream");
        }

        #[test]
        fn test_truthiness() {
            assert!(Value::from(1).truthy());
            assert!(!Value::from(0).truthy());
            assert!(Value::from("hi").truthy());
            assert!(!Value::from("").truthy());
            assert!(!Value::None.truthy());
            assert!(!Value::Stream(vec![]).truthy());
            assert!(Value::Stream(vec![Value::None]).truthy());
            assert!(!Value::Object(Object::new()).truthy());
        }

        #[test]
        fn test_display() {
            let stream = Value::Stream(vec![1.into(), "a".into(), true.into(), Value::None]);
            assert_eq!(stream.to_string(), r#"[1, "a", true, none]"#);

            let mut obj = Object::new();
            obj.insert("x".into(), 1.into());
            obj.insert("y".into(), "b".into());
            assert_eq!(Value::Object(obj).to_string(), r#"{"x": 1, "y": "b"}"#);
        }

        #[test]
        fn test_structural_equality() {
            assert_eq!(Value::from(1), Value::from(1));
            assert_ne!(Value::from(1), Value::from("1"));
            assert_eq!(
                Value::Stream(vec![1.into(), 2.into()]),
                Value::Stream(vec![1.into(), 2.into()])
            );
        }

        #[test]
        fn test_object_insert_replaces_existing_key() {
            let mut obj = Object::new();
            obj.insert("a".into(), 1.into());
            obj.insert("b".into(), 2.into());
            obj.insert("a".into(), 3.into());
            let keys: Vec<String> = obj.entries().map(|(k, _)| k.to_string()).collect();
            assert_eq!(keys, vec!["a", "b"]);
            assert_eq!(obj.field("a"), Some(&Value::from(3)));
        }

        #[test]
        fn test_serialize() {
            let json = serde_json::to_value(Value::from(3)).unwrap();
            assert_eq!(json, serde_json::json!({"type": "number", "value": "3"}));
            let json = serde_json::to_value(Value::None).unwrap();
            assert_eq!(json, serde_json::json!({"type": "none"}));
        }
    }

    mod function_tests {
        use super::*;

        fn double() -> Function {
            Function::native(&["x"], |args| {
                let n = args[0].as_number().cloned().unwrap_or_else(|| Number::from_i64(0));
                Ok(Value::Number(n.mul(&Number::from_i64(2))))
            })
        }

        #[test]
        fn test_invoke() {
            let f = double();
            assert_eq!(f.arity(), 1);
            assert_eq!(f.invoke(vec![21.into()]).unwrap(), Value::from(42));
            assert_eq!(f.to_string(), "<function(x)>");
        }

        #[test]
        fn test_guard() {
            let positive = Function::native(&["x"], |args| {
                Ok(Value::Boolean(args[0].as_number().map_or(false, |n| !n.is_negative())))
            });
            let f = double().with_guard(&positive);
            assert!(f.has_guard());
            assert!(f.accepts(&[3.into()]).unwrap());
            assert!(!f.accepts(&[(-3).into()]).unwrap());
            assert!(!f.accepts(&[]).unwrap());
        }

        #[test]
        fn test_identity_equality() {
            let f = double();
            let g = f.clone();
            assert_eq!(f, g);
            assert_ne!(f, double());
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_error_construction() {
            let err = RuntimeError::div_zero();
            assert_eq!(err.code, codes::DIV_ZERO);
        }

        #[test]
        fn test_unsupported_operation_names_types() {
            let err = RuntimeError::unsupported_operation("+", TypeTag::Boolean, TypeTag::Stream);
            assert!(err.message.contains("boolean"));
            assert!(err.message.contains("stream"));
        }

        #[test]
        fn test_error_with_note() {
            let err = RuntimeError::unresolved_reference("x").with_note("from cell 3");
            assert_eq!(err.notes, vec!["from cell 3".to_string()]);
        }

        #[test]
        fn test_from_number_error() {
            let err: RuntimeError = NumberError::DivisionByZero.into();
            assert_eq!(err.code, codes::DIV_ZERO);
        }

        #[test]
        fn test_tagged_serialization() {
            let err: ArevelError = SyntaxError::unterminated_string(4).into();
            let json = serde_json::to_value(&err).unwrap();
            assert_eq!(json["kind"], "SyntaxError");
            assert_eq!(json["index"], 4);

            let err: ArevelError = RuntimeError::div_zero().into();
            let json = serde_json::to_value(&err).unwrap();
            assert_eq!(json["kind"], "RuntimeError");
            assert_eq!(json["code"], codes::DIV_ZERO);
        }

        #[test]
        fn test_error_display() {
            let err = SyntaxError::unexpected_token(")", 7);
            let display = format!("{}", err);
            assert!(display.contains("UNEXPECTED_TOKEN"));
            assert!(display.contains('7'));
        }
    }
}
