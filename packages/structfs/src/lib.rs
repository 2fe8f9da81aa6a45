//! StructFS: move structured records in and out of self-describing field sets.
//!
//! This crate re-exports the layers most users need:
//! - [`fields`]: `Value` and `FieldSet`, the generic containers
//! - [`reflect`]: records, schemas and the transfer engine
//!
//! The engine entry points are also available at the top level.

pub use structfs_fieldset as fields;
pub use structfs_reflect as reflect;

pub use structfs_reflect::{
    extract, fieldset, impl_record, materialize, schema_of, Error, FieldSet, Materializer, Record,
    Result, Schema, Value,
};
