//! Core JavaScript value types, diagnostics, and abstract conversions.
//!
//! This crate provides the foundational types shared by the compiler and the
//! virtual machine: value representation, error types with source locations,
//! and the pure ECMAScript coercions that do not need an object model.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of JavaScript values
//! - [`JsError`] - JavaScript errors carrying a message, line, and source path
//! - [`ErrorKind`] - Types of JavaScript errors
//! - [`SourcePosition`] / [`SourceSpan`] - Source code locations
//! - [`conversion`] - ToNumber, ToInt32, ToUint32, ToBoolean, Number-to-String
//!
//! # Examples
//!
//! ```
//! use core_types::{conversion, ErrorKind, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! assert_eq!(conversion::to_int32(4294967297.0), 1);
//!
//! let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
//! assert_eq!(error.to_string(), "TypeError: undefined is not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod conversion;
mod error;
mod source;
mod value;

pub use error::{ErrorKind, JsError};
pub use source::{SourcePosition, SourceSpan};
pub use value::Value;
