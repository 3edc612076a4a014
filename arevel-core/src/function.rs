//! First-class functions
//!
//! A `Function` pairs a parameter list with a [`Callable`] body and an
//! optional guard. Bodies are opaque to the core crate: the execution
//! machine supplies closures over compiled code, tests supply plain Rust
//! closures.

use crate::{RuntimeError, Value};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Anything that can be applied to an argument list
pub trait Callable: Send + Sync {
    fn call(&self, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

impl<F> Callable for F
where
    F: Fn(Vec<Value>) -> Result<Value, RuntimeError> + Send + Sync,
{
    fn call(&self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self(args)
    }
}

#[derive(Clone)]
pub struct Function {
    params: Arc<[String]>,
    body: Arc<dyn Callable>,
    guard: Option<Arc<dyn Callable>>,
}

impl Function {
    pub fn new(params: Vec<String>, body: impl Callable + 'static) -> Self {
        Self {
            params: params.into(),
            body: Arc::new(body),
            guard: None,
        }
    }

    /// Wrap a plain Rust closure
    pub fn native<F>(params: &[&str], body: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Self::new(params.iter().map(|p| p.to_string()).collect(), body)
    }

    /// Builder: attach a guard evaluated with the same arguments as the body
    pub fn with_guard(mut self, guard: &Function) -> Self {
        self.guard = Some(guard.body.clone());
        self
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }

    /// Whether this function takes `args`: the arity matches and the guard,
    /// if any, evaluates truthy.
    pub fn accepts(&self, args: &[Value]) -> Result<bool, RuntimeError> {
        if args.len() != self.arity() {
            return Ok(false);
        }
        match &self.guard {
            Some(guard) => Ok(guard.call(args.to_vec())?.truthy()),
            None => Ok(true),
        }
    }

    /// Apply the body without checking arity or guard
    pub fn invoke(&self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.body.call(args)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function({})>", self.params.join(", "))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.params)
            .field("guarded", &self.has_guard())
            .finish()
    }
}

impl Serialize for Function {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
