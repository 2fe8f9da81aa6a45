//! StructFS reflection: moving values between records and field sets
//!
//! A record is a Rust struct with named, ordered fields that implements
//! [`Record`] (by hand or with [`impl_record!`]). This crate turns records into
//! [`FieldSet`]s and back:
//! - [`schema_of`]: Resolve (and cache) a record's flattened field schema
//! - [`materialize`]: Check a field set against the schema, convert it at most
//!   once if it does not match, then move every leaf into a new record
//! - [`extract`]: Take a record apart into a field set of its schema's shape
//!
//! Fields are either leaves (one [`Value`], see [`Leaf`]), nested records
//! (stored as a nested field set) or flattened records (merged into the
//! parent, optionally under a prefix).
//!
//! # Example
//!
//! ```rust
//! use structfs_reflect::{extract, fieldset, impl_record, materialize};
//!
//! #[derive(Debug, PartialEq)]
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//! impl_record!(Point { x: leaf i64, y: leaf i64 });
//!
//! let fields = fieldset! { "x" => 3, "y" => 4 };
//! let point: Point = materialize(fields.clone()).unwrap();
//! assert_eq!(point, Point { x: 3, y: 4 });
//! assert_eq!(extract(point).unwrap(), fields);
//! ```
//!
//! # Serde
//!
//! The default `serde` feature implements `serde::Serialize` for [`Schema`],
//! [`FieldDescriptor`] and [`ValueType`] so backends can publish schemas.

mod error;
mod gate;
mod leaf;
mod pointer;
mod record;
mod schema;
mod transfer;

pub use error::{Error, MismatchStage, Mistyped, Result, SchemaMismatch};
pub use gate::{materialize, Materializer};
pub use leaf::Leaf;
pub use record::{FieldDef, Record};
pub use schema::{schema_of, FieldDescriptor, Schema, ValueType};
pub use transfer::{extract, Arguments, FieldSink};

pub use bytes::Bytes;
pub use structfs_fieldset::{fieldset, FieldSet, Value, ValueKind};
