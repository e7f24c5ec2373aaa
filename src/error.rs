//! Sticky error state.
//!
//! Parsing never propagates errors through return values: handlers produce
//! silent misses and the instance remembers the first hard failure.  A set
//! error short-circuits every mutating operation until
//! [`Config::repair`](crate::Config::repair) clears it.  "Not found" is
//! deliberately *not* an error anywhere in the crate: a configuration is
//! permitted to be absent, and hosts detect missing resources through
//! `resource_length() == 0`.

use thiserror::Error;

/// A hard failure recorded on a configuration instance.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An internal counter (group count, word count) would exceed its bound.
    #[error("internal store capacity exceeded")]
    Overflow,
    /// An explicitly reserved allocation was refused.
    #[error("memory allocation failed")]
    Memory,
}
