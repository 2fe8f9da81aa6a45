//! StructFS FieldSets: the generic side of a record
//!
//! This crate holds the self-describing containers that serialization
//! backends produce and consume:
//! - `Value`: Dynamically-typed tree (scalars, arrays, nested field sets)
//! - `FieldSet`: Ordered name -> value mapping (the "struct" part)
//! - `ValueKind`: Cheap tag describing which variant a `Value` holds
//!
//! The typed side (records, schemas, transfer) lives in `structfs-reflect`.
//!
//! # Example
//!
//! ```rust
//! use structfs_fieldset::{fieldset, Value};
//!
//! let point = fieldset! { "x" => 3, "y" => 4 };
//!
//! assert_eq!(point.get("x"), Some(&Value::Integer(3)));
//! assert_eq!(point.names().collect::<Vec<_>>(), vec!["x", "y"]);
//! ```
//!
//! # Serde
//!
//! The default `serde` feature implements `serde::Serialize` for `Value` and
//! `FieldSet`, preserving field order.

mod field_set;
mod value;

pub use field_set::{Field, FieldSet};
pub use value::{Value, ValueKind};
