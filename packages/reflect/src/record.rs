//! The reflection facility: how a Rust struct describes itself.

use std::any::TypeId;

use structfs_fieldset::FieldSet;

use crate::error::Result;
use crate::leaf::Leaf;
use crate::schema::{Schema, ValueType};
use crate::transfer::{Arguments, FieldSink};

/// A struct with named, ordered fields that can move to and from a `FieldSet`.
///
/// The four required methods must agree with each other: `construct` pulls
/// and `deconstruct` pushes exactly the fields `fields()` declares, in the
/// same order, using the same kind (`leaf`, `nested`, `flatten`) for each.
/// The `impl_record!` macro writes all four from one field list.
///
/// # Implementing by hand
///
/// ```rust
/// use structfs_reflect::{Arguments, FieldDef, FieldSink, Record, Result};
///
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// impl Record for Point {
///     fn type_name() -> &'static str {
///         "Point"
///     }
///
///     fn fields() -> Vec<FieldDef> {
///         vec![FieldDef::leaf::<i64>("x"), FieldDef::leaf::<i64>("y")]
///     }
///
///     fn construct(args: &mut Arguments<'_>) -> Result<Self> {
///         Ok(Point {
///             x: args.leaf()?,
///             y: args.leaf()?,
///         })
///     }
///
///     fn deconstruct(self, sink: &mut FieldSink<'_>) {
///         sink.leaf(self.x);
///         sink.leaf(self.y);
///     }
/// }
/// ```
pub trait Record: Sized + 'static {
    /// Name used in schemas and error messages.
    fn type_name() -> &'static str;

    /// Declared fields, in declaration order.
    fn fields() -> Vec<FieldDef>;

    /// Build `Self` from the arguments of one transfer.
    ///
    /// Struct expressions evaluate their fields in source order, so writing
    /// `Self { a: args.leaf()?, b: args.nested()? }` consumes the arguments
    /// in declaration order and only yields a value once every field is in.
    fn construct(args: &mut Arguments<'_>) -> Result<Self>;

    /// Push every field into `sink`, in declaration order.
    fn deconstruct(self, sink: &mut FieldSink<'_>);

    /// Converting constructor used when a field set does not match the
    /// schema. Called at most once per `materialize`; its output must match
    /// the schema exactly or the call fails.
    ///
    /// The default picks fields by name into schema order.
    fn convert(fields: FieldSet, schema: &Schema) -> Result<FieldSet> {
        Ok(schema.project(fields))
    }
}

/// Type-erased handle on a `Record` impl, enough to resolve its schema.
#[derive(Clone, Copy)]
pub(crate) struct RecordType {
    id: fn() -> TypeId,
    name: fn() -> &'static str,
    fields: fn() -> Vec<FieldDef>,
}

impl RecordType {
    pub(crate) fn of<R: Record>() -> Self {
        Self {
            id: TypeId::of::<R>,
            name: R::type_name,
            fields: R::fields,
        }
    }

    pub(crate) fn id(&self) -> TypeId {
        (self.id)()
    }

    pub(crate) fn name(&self) -> &'static str {
        (self.name)()
    }

    pub(crate) fn fields(&self) -> Vec<FieldDef> {
        (self.fields)()
    }
}

pub(crate) enum DefKind {
    Leaf(ValueType),
    Nested(RecordType),
    Flatten {
        record: RecordType,
        prefix: &'static str,
    },
}

/// One declared field of a record.
pub struct FieldDef {
    pub(crate) name: &'static str,
    pub(crate) kind: DefKind,
}

impl FieldDef {
    /// A single value.
    pub fn leaf<V: Leaf>(name: &'static str) -> Self {
        Self {
            name,
            kind: DefKind::Leaf(V::value_type()),
        }
    }

    /// A record stored as one nested field set under `name`.
    pub fn nested<R: Record>(name: &'static str) -> Self {
        Self {
            name,
            kind: DefKind::Nested(RecordType::of::<R>()),
        }
    }

    /// A record whose fields are merged into the parent, each renamed to
    /// `prefix` + its own name.
    ///
    /// `name` is the Rust field name; it does not appear in the schema.
    pub fn flatten<R: Record>(name: &'static str, prefix: &'static str) -> Self {
        Self {
            name,
            kind: DefKind::Flatten {
                record: RecordType::of::<R>(),
                prefix,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_flatten(&self) -> bool {
        matches!(self.kind, DefKind::Flatten { .. })
    }
}

/// Implement `Record` for a struct with named fields.
///
/// Each field is written `name: kind Type`, where kind is one of:
/// - `leaf`: the type implements `Leaf`
/// - `nested`: the type implements `Record` and is stored as a nested field set
/// - `flatten`: the type implements `Record` and its fields are merged in
///
/// `leaf Type as "alias"` and `nested Type as "alias"` rename the field in
/// the schema; `flatten Type as "prefix_"` prefixes every merged field. A
/// trailing `convert = path` installs a converting constructor with the
/// signature of `Record::convert`.
///
/// ```rust
/// use structfs_reflect::{fieldset, impl_record, materialize};
///
/// #[derive(Debug, PartialEq)]
/// struct Point {
///     x: i64,
///     y: i64,
/// }
/// impl_record!(Point { x: leaf i64, y: leaf i64 });
///
/// #[derive(Debug, PartialEq)]
/// struct Segment {
///     start: Point,
///     end: Point,
/// }
/// impl_record!(Segment {
///     start: flatten Point as "start_",
///     end: flatten Point as "end_",
/// });
///
/// let fields = fieldset! { "start_x" => 0, "start_y" => 0, "end_x" => 1, "end_y" => 1 };
/// let segment: Segment = materialize(fields).unwrap();
/// assert_eq!(segment.end, Point { x: 1, y: 1 });
/// ```
#[macro_export]
macro_rules! impl_record {
    (@def leaf $field:ident [] $ty:ty) => {
        $crate::FieldDef::leaf::<$ty>(stringify!($field))
    };
    (@def leaf $field:ident [$name:literal] $ty:ty) => {
        $crate::FieldDef::leaf::<$ty>($name)
    };
    (@def nested $field:ident [] $ty:ty) => {
        $crate::FieldDef::nested::<$ty>(stringify!($field))
    };
    (@def nested $field:ident [$name:literal] $ty:ty) => {
        $crate::FieldDef::nested::<$ty>($name)
    };
    (@def flatten $field:ident [] $ty:ty) => {
        $crate::FieldDef::flatten::<$ty>(stringify!($field), "")
    };
    (@def flatten $field:ident [$prefix:literal] $ty:ty) => {
        $crate::FieldDef::flatten::<$ty>(stringify!($field), $prefix)
    };
    (@take leaf $args:ident $ty:ty) => {
        $args.leaf::<$ty>()
    };
    (@take nested $args:ident $ty:ty) => {
        $args.nested::<$ty>()
    };
    (@take flatten $args:ident $ty:ty) => {
        $args.flatten::<$ty>()
    };
    (@put leaf $sink:ident $field:ident) => {
        $sink.leaf($field)
    };
    (@put nested $sink:ident $field:ident) => {
        $sink.nested($field)
    };
    (@put flatten $sink:ident $field:ident) => {
        $sink.flatten($field)
    };
    (
        $record:ident {
            $($field:ident : $kind:ident $ty:ty $(as $name:literal)?),* $(,)?
        }
        $(convert = $convert:path)?
    ) => {
        impl $crate::Record for $record {
            fn type_name() -> &'static str {
                stringify!($record)
            }

            fn fields() -> ::std::vec::Vec<$crate::FieldDef> {
                ::std::vec![$($crate::impl_record!(@def $kind $field [$($name)?] $ty)),*]
            }

            #[allow(unused_variables)]
            fn construct(args: &mut $crate::Arguments<'_>) -> $crate::Result<Self> {
                ::std::result::Result::Ok($record {
                    $($field: $crate::impl_record!(@take $kind args $ty)?),*
                })
            }

            #[allow(unused_variables)]
            fn deconstruct(self, sink: &mut $crate::FieldSink<'_>) {
                let $record { $($field),* } = self;
                $($crate::impl_record!(@put $kind sink $field);)*
            }

            $(
                fn convert(
                    fields: $crate::FieldSet,
                    schema: &$crate::Schema,
                ) -> $crate::Result<$crate::FieldSet> {
                    $convert(fields, schema)
                }
            )?
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_of;

    struct Point {
        x: i64,
        y: i64,
    }

    impl_record!(Point { x: leaf i64, y: leaf i64 });

    struct Renamed {
        id: u32,
        origin: Point,
        offset: Point,
    }

    impl_record!(Renamed {
        id: leaf u32 as "ID",
        origin: nested Point as "Origin",
        offset: flatten Point,
    });

    #[test]
    fn macro_declares_fields_in_order() {
        let fields = Point::fields();
        assert_eq!(
            fields.iter().map(FieldDef::name).collect::<Vec<_>>(),
            vec!["x", "y"]
        );
        assert_eq!(Point::type_name(), "Point");
    }

    #[test]
    fn macro_renames_and_flattens() {
        let defs = Renamed::fields();
        assert_eq!(defs[0].name(), "ID");
        assert_eq!(defs[1].name(), "Origin");
        assert!(defs[2].is_flatten());
        assert_eq!(defs[2].name(), "offset");

        let schema = schema_of::<Renamed>().unwrap();
        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["ID", "Origin", "x", "y"]
        );
    }

    #[test]
    fn record_type_is_erased_but_stable() {
        let a = RecordType::of::<Point>();
        let b = RecordType::of::<Point>();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), RecordType::of::<Renamed>().id());
        assert_eq!(a.name(), "Point");
        assert_eq!(a.fields().len(), 2);
    }

    #[test]
    fn default_convert_projects() {
        let schema = schema_of::<Point>().unwrap();
        let fields = structfs_fieldset::fieldset! { "y" => 2, "x" => 1 };
        let converted = Point::convert(fields, &schema).unwrap();
        assert_eq!(converted.names().collect::<Vec<_>>(), vec!["x", "y"]);
    }
}
