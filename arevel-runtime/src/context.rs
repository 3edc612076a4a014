//! Runtime configuration

use arevel_core::DEFAULT_PRECISION;

/// Default upper bound on the length of a generated stream
pub const DEFAULT_MAX_STREAM_LEN: usize = 100_000;

/// Settings shared by every operator and builtin call of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Runtime {
    /// Decimal digits used by fractional powers
    pub precision: u32,
    /// Longest stream `__generate__` may produce
    pub max_stream_len: usize,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            precision: DEFAULT_PRECISION as u32,
            max_stream_len: DEFAULT_MAX_STREAM_LEN,
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_max_stream_len(mut self, max_stream_len: usize) -> Self {
        self.max_stream_len = max_stream_len;
        self
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
