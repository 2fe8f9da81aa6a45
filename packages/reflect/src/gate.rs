//! The conversion gate in front of every transfer.

use std::fmt;

use structfs_fieldset::FieldSet;
use tracing::{debug, warn};

use crate::error::{Error, MismatchStage, Result};
use crate::record::Record;
use crate::schema::{schema_of, Schema};
use crate::transfer::transfer;

type Adapter = Box<dyn Fn(FieldSet, &Schema) -> Result<FieldSet> + Send + Sync>;

enum Conversion {
    Disabled,
    Record,
    Adapter(Adapter),
}

/// Builds records from field sets.
///
/// Every field set is checked against the target schema first. On a mismatch
/// exactly one conversion runs (the adapter if one is installed, otherwise
/// `Record::convert`) and its output is checked again. A second mismatch is
/// final.
///
/// ```rust
/// use structfs_reflect::{fieldset, impl_record, Materializer};
///
/// struct Point {
///     x: i64,
///     y: i64,
/// }
/// impl_record!(Point { x: leaf i64, y: leaf i64 });
///
/// // Out of order: fine by default, rejected in strict mode.
/// let fields = fieldset! { "y" => 4, "x" => 3 };
/// assert!(Materializer::strict().materialize::<Point>(fields.clone()).is_err());
/// let point: Point = Materializer::new().materialize(fields).unwrap();
/// assert_eq!((point.x, point.y), (3, 4));
/// ```
pub struct Materializer {
    conversion: Conversion,
}

impl Materializer {
    /// Convert mismatched input with `Record::convert`.
    pub fn new() -> Self {
        Self {
            conversion: Conversion::Record,
        }
    }

    /// Reject any input that does not match the schema as given.
    pub fn strict() -> Self {
        Self {
            conversion: Conversion::Disabled,
        }
    }

    /// Convert mismatched input with `adapter` instead of `Record::convert`.
    pub fn with_adapter<F>(adapter: F) -> Self
    where
        F: Fn(FieldSet, &Schema) -> Result<FieldSet> + Send + Sync + 'static,
    {
        Self {
            conversion: Conversion::Adapter(Box::new(adapter)),
        }
    }

    /// Build a `T` from `fields`.
    ///
    /// # Errors
    ///
    /// - `CyclicEmbedding` / `DuplicateField` if `T`'s schema cannot resolve.
    /// - `SchemaMismatch` if the fields (or their one conversion) do not
    ///   match the schema.
    /// - `Conversion` if the conversion itself fails.
    /// - `LeafConversion` if a value does not fit its Rust field type.
    pub fn materialize<T: Record>(&self, fields: FieldSet) -> Result<T> {
        let schema = schema_of::<T>()?;
        let fields = self.normalize::<T>(&schema, fields)?;
        let (record, _moves) = transfer::<T>(&schema, fields)?;
        Ok(record)
    }

    fn normalize<T: Record>(&self, schema: &Schema, fields: FieldSet) -> Result<FieldSet> {
        let mismatch = match schema.check(&fields) {
            Ok(()) => return Ok(fields),
            Err(mismatch) => mismatch,
        };

        let converted = match &self.conversion {
            Conversion::Disabled => {
                return Err(Error::SchemaMismatch {
                    mismatch,
                    stage: MismatchStage::Input,
                })
            }
            Conversion::Record => {
                debug!(record = T::type_name(), %mismatch, "converting with record constructor");
                T::convert(fields, schema)
            }
            Conversion::Adapter(adapter) => {
                debug!(record = T::type_name(), %mismatch, "converting with adapter");
                adapter(fields, schema)
            }
        };
        let converted = converted.inspect_err(|e| {
            warn!(record = T::type_name(), error = %e, "conversion failed");
        })?;

        schema.check(&converted).map_err(|mismatch| {
            warn!(record = T::type_name(), %mismatch, "converted fields still mismatch");
            Error::SchemaMismatch {
                mismatch,
                stage: MismatchStage::Converted,
            }
        })?;
        Ok(converted)
    }
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Materializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conversion = match self.conversion {
            Conversion::Disabled => "disabled",
            Conversion::Record => "record",
            Conversion::Adapter(_) => "adapter",
        };
        f.debug_struct("Materializer")
            .field("conversion", &conversion)
            .finish()
    }
}

/// Build a `T` from `fields` with the default `Materializer`.
///
/// ```rust
/// use structfs_reflect::{fieldset, impl_record, materialize};
///
/// struct Point {
///     x: i64,
///     y: i64,
/// }
/// impl_record!(Point { x: leaf i64, y: leaf i64 });
///
/// let point: Point = materialize(fieldset! { "x" => 3, "y" => 4 }).unwrap();
/// assert_eq!(point.x + point.y, 7);
/// ```
pub fn materialize<T: Record>(fields: FieldSet) -> Result<T> {
    Materializer::new().materialize(fields)
}
