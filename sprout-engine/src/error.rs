//! Engine error types
//!
//! Re-exports sprout-error so engine users need a single import.

pub use sprout_error::{Error, ErrorKind, ErrorStatus, Result};
