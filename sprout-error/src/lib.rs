//! # sprout-error
//!
//! Unified error handling for sprout.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g., SensorReadFailed, PersistenceWriteFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use sprout_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::SensorOutOfRange, "voltage is NaN")
//!         .with_operation("calibration::classify")
//!         .with_context("voltage", "NaN"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, sprout_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - The engine never retries; retry policy belongs to whoever called it

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using sprout Error
pub type Result<T> = std::result::Result<T, Error>;
