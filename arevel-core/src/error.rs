//! Structured errors
//!
//! Two kinds reach the caller: `SyntaxError` (lexing, parsing, lowering;
//! carries the character index) and `RuntimeError` (raised while executing a
//! cell). Both carry a machine-readable code. Errors never cross a cell
//! boundary: a failing cell fails alone.

use crate::{NumberError, TypeTag};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard error codes (machine-readable)
pub mod codes {
    // Syntax
    pub const INVALID_FLOAT: &str = "INVALID_FLOAT";
    pub const INVALID_NUMBER: &str = "INVALID_NUMBER";
    pub const UNTERMINATED_STRING: &str = "UNTERMINATED_STRING";
    pub const UNKNOWN_TOKEN: &str = "UNKNOWN_TOKEN";
    pub const INVALID_INDENTATION: &str = "INVALID_INDENTATION";
    pub const UNEXPECTED_TOKEN: &str = "UNEXPECTED_TOKEN";
    pub const EXPECTED_TOKEN: &str = "EXPECTED_TOKEN";
    pub const UNEXPECTED_END: &str = "UNEXPECTED_END";
    pub const INVALID_EXPRESSION: &str = "INVALID_EXPRESSION";

    // Runtime
    pub const UNSUPPORTED_OPERATION: &str = "UNSUPPORTED_OPERATION";
    pub const UNRESOLVED_REFERENCE: &str = "UNRESOLVED_REFERENCE";
    pub const CYCLIC_DEPENDENCY: &str = "CYCLIC_DEPENDENCY";
    pub const DIV_ZERO: &str = "DIV_ZERO";
    pub const DOMAIN_ERROR: &str = "DOMAIN_ERROR";
    pub const OVERFLOW: &str = "OVERFLOW";
    pub const NOT_CALLABLE: &str = "NOT_CALLABLE";
    pub const NO_MATCHING_SIGNATURE: &str = "NO_MATCHING_SIGNATURE";
    pub const INDEX_OUT_OF_RANGE: &str = "INDEX_OUT_OF_RANGE";
    pub const UNDEFINED_FIELD: &str = "UNDEFINED_FIELD";
    pub const UNBOUNDED_RANGE: &str = "UNBOUNDED_RANGE";
    pub const LENGTH_MISMATCH: &str = "LENGTH_MISMATCH";
    pub const ARG_COUNT: &str = "ARG_COUNT";
    pub const ARG_TYPE: &str = "ARG_TYPE";
    pub const STREAM_TOO_LONG: &str = "STREAM_TOO_LONG";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Error raised while turning source text into an expression tree
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{code}] {message} (at index {index})")]
pub struct SyntaxError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Character index of the offending input
    pub index: usize,
}

impl SyntaxError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, index: usize) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            index,
        }
    }

    // ========== Common Error Constructors ==========

    pub fn invalid_float(index: usize) -> Self {
        Self::new(codes::INVALID_FLOAT, "Invalid float format", index)
    }

    pub fn invalid_number(index: usize) -> Self {
        Self::new(codes::INVALID_NUMBER, "Invalid number", index)
    }

    pub fn unterminated_string(index: usize) -> Self {
        Self::new(codes::UNTERMINATED_STRING, "Unterminated string", index)
    }

    pub fn unknown_token(lexeme: &str, index: usize) -> Self {
        Self::new(codes::UNKNOWN_TOKEN, format!("Unknown token '{}'", lexeme), index)
    }

    pub fn invalid_indentation(index: usize) -> Self {
        Self::new(
            codes::INVALID_INDENTATION,
            "Indentation does not match any enclosing block",
            index,
        )
    }

    pub fn unexpected_token(lexeme: &str, index: usize) -> Self {
        Self::new(codes::UNEXPECTED_TOKEN, format!("Unexpected token '{}'", lexeme), index)
    }

    pub fn expected_token(expected: &str, found: &str, index: usize) -> Self {
        Self::new(
            codes::EXPECTED_TOKEN,
            format!("Expected '{}', found '{}'", expected, found),
            index,
        )
    }

    pub fn unexpected_end(index: usize) -> Self {
        Self::new(codes::UNEXPECTED_END, "Unexpected end of input", index)
    }

    pub fn invalid_expression(details: impl Into<String>, index: usize) -> Self {
        Self::new(codes::INVALID_EXPRESSION, details, index)
    }
}

/// Error raised while executing a cell
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct RuntimeError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Propagation notes
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}

impl RuntimeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Builder: add propagation note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    // ========== Common Error Constructors ==========

    pub fn unsupported_operation(op: &str, left: TypeTag, right: TypeTag) -> Self {
        Self::new(
            codes::UNSUPPORTED_OPERATION,
            format!("Unsupported operation: {} {} {}", left, op, right),
        )
    }

    pub fn unsupported_unary(op: &str, operand: TypeTag) -> Self {
        Self::new(
            codes::UNSUPPORTED_OPERATION,
            format!("Unsupported operation: {} {}", op, operand),
        )
    }

    pub fn unresolved_reference(name: &str) -> Self {
        Self::new(
            codes::UNRESOLVED_REFERENCE,
            format!("Unresolved reference: {}", name),
        )
    }

    pub fn cyclic_dependency(cells: &[String]) -> Self {
        Self::new(
            codes::CYCLIC_DEPENDENCY,
            format!("Cyclic dependency: {}", cells.join(" → ")),
        )
    }

    pub fn div_zero() -> Self {
        Self::new(codes::DIV_ZERO, "Division by zero")
    }

    pub fn domain_error(details: impl Into<String>) -> Self {
        Self::new(codes::DOMAIN_ERROR, format!("Domain error: {}", details.into()))
    }

    pub fn overflow() -> Self {
        Self::new(codes::OVERFLOW, "Numeric overflow")
    }

    pub fn not_callable(tag: TypeTag) -> Self {
        Self::new(codes::NOT_CALLABLE, format!("Value of type {} is not callable", tag))
    }

    pub fn no_matching_signature(arg_count: usize) -> Self {
        Self::new(
            codes::NO_MATCHING_SIGNATURE,
            format!("No signature accepts {} argument(s)", arg_count),
        )
    }

    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        Self::new(
            codes::INDEX_OUT_OF_RANGE,
            format!("Index {} out of range for length {}", index, len),
        )
    }

    pub fn undefined_field(name: &str) -> Self {
        Self::new(codes::UNDEFINED_FIELD, format!("Undefined field: {}", name))
    }

    pub fn unbounded_range() -> Self {
        Self::new(codes::UNBOUNDED_RANGE, "Range has no end bound")
    }

    pub fn length_mismatch(left: usize, right: usize) -> Self {
        Self::new(
            codes::LENGTH_MISMATCH,
            format!("Stream length mismatch: {} vs {}", left, right),
        )
    }

    pub fn arg_count(func: &str, expected: usize, got: usize) -> Self {
        Self::new(
            codes::ARG_COUNT,
            format!("{} expects {} argument(s), got {}", func, expected, got),
        )
    }

    pub fn arg_type(func: &str, expected: &str, got: TypeTag) -> Self {
        Self::new(
            codes::ARG_TYPE,
            format!("{}: expected {}, got {}", func, expected, got),
        )
    }

    pub fn stream_too_long(limit: usize) -> Self {
        Self::new(
            codes::STREAM_TOO_LONG,
            format!("Generated stream exceeds {} elements", limit),
        )
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, format!("Internal error: {}", details.into()))
    }
}

impl From<NumberError> for RuntimeError {
    fn from(err: NumberError) -> Self {
        match err {
            NumberError::ParseError(s) => Self::domain_error(format!("invalid number {}", s)),
            NumberError::DivisionByZero => Self::div_zero(),
            NumberError::DomainError(s) => Self::domain_error(s),
            NumberError::Overflow => Self::overflow(),
        }
    }
}

/// Either kind of error, tagged by kind when serialised
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ArevelError {
    #[error(transparent)]
    SyntaxError(SyntaxError),

    #[error(transparent)]
    RuntimeError(RuntimeError),
}

impl ArevelError {
    pub fn code(&self) -> &str {
        match self {
            ArevelError::SyntaxError(e) => &e.code,
            ArevelError::RuntimeError(e) => &e.code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ArevelError::SyntaxError(e) => &e.message,
            ArevelError::RuntimeError(e) => &e.message,
        }
    }
}

impl From<SyntaxError> for ArevelError {
    fn from(err: SyntaxError) -> Self {
        ArevelError::SyntaxError(err)
    }
}

impl From<RuntimeError> for ArevelError {
    fn from(err: RuntimeError) -> Self {
        ArevelError::RuntimeError(err)
    }
}
