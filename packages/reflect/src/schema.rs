//! Schemas: the canonical, ordered field list of a record type.
//!
//! A `Schema` is resolved once per record type from `Record::fields()` and
//! cached for the life of the process. Flatten fields are expanded in place,
//! so `fields()` is exactly the list of names a field set must carry, in
//! order. The declaration structure (which positions came from which flatten
//! field) is kept alongside as a list of members so the transfer can rebuild
//! the embedded records.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use structfs_fieldset::{FieldSet, Value};
use tracing::debug;

use crate::error::{Error, Mistyped, Result, SchemaMismatch};
use crate::record::{DefKind, Record, RecordType};

/// The type tag of one schema position.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", content = "of", rename_all = "snake_case")
)]
pub enum ValueType {
    Bool,
    Integer,
    Float,
    String,
    Bytes,
    Array(Box<ValueType>),
    /// Admits `Null` or the inner type.
    Optional(Box<ValueType>),
    /// A nested record, checked against its own schema.
    Record(&'static str),
    Any,
}

impl ValueType {
    /// Whether `value` has the shape this type declares.
    ///
    /// For `Record` only the outer shape (a map) is checked here; the fields
    /// inside are the nested schema's business.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Any, _) => true,
            (ValueType::Bool, Value::Bool(_)) => true,
            (ValueType::Integer, Value::Integer(_)) => true,
            (ValueType::Float, Value::Float(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Bytes, Value::Bytes(_)) => true,
            (ValueType::Array(item), Value::Array(items)) => {
                items.iter().all(|value| item.admits(value))
            }
            (ValueType::Optional(_), Value::Null) => true,
            (ValueType::Optional(inner), value) => inner.admits(value),
            (ValueType::Record(_), Value::Map(_)) => true,
            _ => false,
        }
    }
}

/// Largest integer magnitude an `f64` holds exactly.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

impl ValueType {
    /// Widen `value` toward this type where nothing is lost: integers up to
    /// 2^53 into float positions, byte strings into integer arrays. Anything
    /// else comes back unchanged.
    pub fn widen(&self, value: Value) -> Value {
        match (self, value) {
            (ValueType::Float, Value::Integer(i)) if i.unsigned_abs() <= MAX_EXACT_INTEGER => {
                Value::Float(i as f64)
            }
            (ValueType::Optional(inner), value) => inner.widen(value),
            (ValueType::Array(item), Value::Array(items)) => {
                Value::Array(items.into_iter().map(|value| item.widen(value)).collect())
            }
            (ValueType::Array(item), Value::Bytes(bytes)) if **item == ValueType::Integer => {
                Value::Array(bytes.into_iter().map(|b| Value::Integer(i64::from(b))).collect())
            }
            (_, value) => value,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => f.write_str("bool"),
            ValueType::Integer => f.write_str("integer"),
            ValueType::Float => f.write_str("float"),
            ValueType::String => f.write_str("string"),
            ValueType::Bytes => f.write_str("bytes"),
            ValueType::Array(item) => write!(f, "array<{}>", item),
            ValueType::Optional(inner) => write!(f, "optional<{}>", inner),
            ValueType::Record(name) => write!(f, "record `{}`", name),
            ValueType::Any => f.write_str("any"),
        }
    }
}

/// One position of an expanded schema.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldDescriptor {
    name: String,
    position: usize,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    value_type: ValueType,
    /// Set for fields expanded out of a flatten field: the record that
    /// actually declares them.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    declared_by: Option<&'static str>,
    /// Set for nested records.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    schema: Option<Arc<Schema>>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of this field in the expanded schema.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn declared_by(&self) -> Option<&'static str> {
        self.declared_by
    }

    /// The nested record's schema, if this position holds one.
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    pub fn is_nested(&self) -> bool {
        self.schema.is_some()
    }
}

/// Declaration structure of a schema.
///
/// `Field` indexes this schema's own `fields`; `Flatten` covers the
/// `schema.len()` fields starting at `start`, in the flattened record's order.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Member {
    Field(usize),
    Flatten { schema: Arc<Schema>, start: usize },
}

/// The canonical ordered field list of a record type.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Schema {
    #[cfg_attr(feature = "serde", serde(rename = "record"))]
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    #[cfg_attr(feature = "serde", serde(skip))]
    members: Vec<Member>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Expanded fields in order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(FieldDescriptor::name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of leaf values a matching field set carries, nested records
    /// included.
    pub fn leaf_count(&self) -> usize {
        self.fields
            .iter()
            .map(|field| field.schema().map_or(1, |nested| nested.leaf_count()))
            .sum()
    }

    pub(crate) fn members(&self) -> &[Member] {
        &self.members
    }

    /// Check that `fields` has exactly this schema's shape: same names, same
    /// order, admissible values, recursively for nested records.
    pub fn check(&self, fields: &FieldSet) -> std::result::Result<(), SchemaMismatch> {
        let mut mismatch = SchemaMismatch::new(self.type_name);
        self.collect_mismatch(fields, "", &mut mismatch);
        if mismatch.is_empty() {
            Ok(())
        } else {
            Err(mismatch)
        }
    }

    fn collect_mismatch(&self, fields: &FieldSet, prefix: &str, mismatch: &mut SchemaMismatch) {
        let path = |name: &str| format!("{}{}", prefix, name);

        for descriptor in &self.fields {
            let Some(value) = fields.get(descriptor.name()) else {
                mismatch.missing.push(path(descriptor.name()));
                continue;
            };
            if !descriptor.value_type.admits(value) {
                mismatch.mistyped.push(Mistyped {
                    field: path(descriptor.name()),
                    expected: descriptor.value_type.clone(),
                    found: value.kind(),
                });
            } else if let (Some(nested), Value::Map(inner)) = (descriptor.schema(), value) {
                nested.collect_mismatch(inner, &format!("{}.", path(descriptor.name())), mismatch);
            }
        }

        let mut known = Vec::with_capacity(fields.len());
        for name in fields.names() {
            if self.index.contains_key(name) {
                known.push(name);
            } else {
                mismatch.unexpected.push(path(name));
            }
        }

        // Compare the relative order of the names both sides agree on.
        let expected = self.names().filter(|name| fields.contains(name));
        for (&actual, expected) in known.iter().zip(expected) {
            if actual != expected {
                mismatch.misordered.push(path(actual));
            }
        }
    }

    /// Reshape `fields` by name into this schema's order.
    ///
    /// Fields are picked by name (recursively for nested records); unknown
    /// fields are dropped and missing ones stay missing. Leaf values are
    /// widened to their declared type (see `ValueType::widen`). This is the
    /// default converting constructor of every record.
    pub fn project(&self, fields: FieldSet) -> FieldSet {
        let mut source: HashMap<String, Value> = fields.into_iter().collect();
        let mut projected = FieldSet::with_capacity(self.fields.len());
        for descriptor in &self.fields {
            let Some(value) = source.remove(descriptor.name()) else {
                continue;
            };
            let value = match (descriptor.schema(), value) {
                (Some(nested), Value::Map(inner)) => Value::Map(nested.project(inner)),
                (_, value) => descriptor.value_type.widen(value),
            };
            projected.insert(descriptor.name(), value);
        }
        if !source.is_empty() {
            debug!(
                record = self.type_name,
                dropped = source.len(),
                "projection dropped unknown fields"
            );
        }
        projected
    }
}

lazy_static! {
    static ref SCHEMAS: RwLock<HashMap<TypeId, Arc<Schema>>> = RwLock::new(HashMap::new());
}

/// The schema of record type `T`.
///
/// Resolved on first use and cached; later calls return the same `Arc`.
///
/// # Errors
///
/// - `CyclicEmbedding` if `T` embeds itself through nested or flatten fields.
/// - `DuplicateField` if flattening produces two fields with one name.
pub fn schema_of<T: Record>() -> Result<Arc<Schema>> {
    Resolver::default().resolve(RecordType::of::<T>())
}

fn cached(id: TypeId) -> Option<Arc<Schema>> {
    SCHEMAS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned()
}

/// Depth-first resolver carrying the chain of records being expanded.
#[derive(Default)]
struct Resolver {
    stack: Vec<(TypeId, &'static str)>,
}

impl Resolver {
    fn resolve(&mut self, record: RecordType) -> Result<Arc<Schema>> {
        let id = record.id();
        if let Some(schema) = cached(id) {
            return Ok(schema);
        }

        if let Some(start) = self.stack.iter().position(|(seen, _)| *seen == id) {
            let mut path: Vec<&'static str> =
                self.stack[start..].iter().map(|(_, name)| *name).collect();
            path.push(record.name());
            return Err(Error::CyclicEmbedding { path });
        }

        self.stack.push((id, record.name()));
        let built = self.expand(record);
        self.stack.pop();
        let schema = Arc::new(built?);

        debug!(
            record = schema.type_name,
            fields = schema.len(),
            "resolved schema"
        );

        // Two threads may race to resolve the same type; the first insert wins
        // so every caller sees one Arc.
        let mut schemas = SCHEMAS.write().unwrap_or_else(PoisonError::into_inner);
        Ok(schemas.entry(id).or_insert(schema).clone())
    }

    fn expand(&mut self, record: RecordType) -> Result<Schema> {
        let mut builder = SchemaBuilder::new(record.name());
        for def in record.fields() {
            match def.kind {
                DefKind::Leaf(value_type) => builder.field(def.name, value_type, None)?,
                DefKind::Nested(nested) => {
                    let schema = self.resolve(nested)?;
                    builder.field(
                        def.name,
                        ValueType::Record(schema.type_name),
                        Some(schema),
                    )?
                }
                DefKind::Flatten { record, prefix } => {
                    let schema = self.resolve(record)?;
                    builder.flatten(schema, prefix)?
                }
            }
        }
        Ok(builder.finish())
    }
}

struct SchemaBuilder {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    members: Vec<Member>,
    index: HashMap<String, usize>,
}

impl SchemaBuilder {
    fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: Vec::new(),
            members: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn field(
        &mut self,
        name: &str,
        value_type: ValueType,
        schema: Option<Arc<Schema>>,
    ) -> Result<()> {
        let position = self.push(name.to_string(), value_type, None, schema)?;
        self.members.push(Member::Field(position));
        Ok(())
    }

    fn flatten(&mut self, schema: Arc<Schema>, prefix: &str) -> Result<()> {
        let start = self.fields.len();
        for descriptor in &schema.fields {
            self.push(
                format!("{}{}", prefix, descriptor.name),
                descriptor.value_type.clone(),
                Some(descriptor.declared_by.unwrap_or(schema.type_name)),
                descriptor.schema.clone(),
            )?;
        }
        self.members.push(Member::Flatten { schema, start });
        Ok(())
    }

    fn push(
        &mut self,
        name: String,
        value_type: ValueType,
        declared_by: Option<&'static str>,
        schema: Option<Arc<Schema>>,
    ) -> Result<usize> {
        let position = self.fields.len();
        if let Some(&existing) = self.index.get(&name) {
            let first = self.fields[existing].declared_by.unwrap_or(self.type_name);
            return Err(Error::DuplicateField {
                name,
                first,
                second: declared_by.unwrap_or(self.type_name),
            });
        }
        self.index.insert(name.clone(), position);
        self.fields.push(FieldDescriptor {
            name,
            position,
            value_type,
            declared_by,
            schema,
        });
        Ok(position)
    }

    fn finish(self) -> Schema {
        debug_assert_eq!(
            self.fields.iter().map(|f| f.name.as_str()).collect::<HashSet<_>>().len(),
            self.fields.len()
        );
        Schema {
            type_name: self.type_name,
            fields: self.fields,
            members: self.members,
            index: self.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_record;
    use structfs_fieldset::fieldset;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl_record!(Point { x: leaf i64, y: leaf i64 });

    #[derive(Debug, PartialEq)]
    struct Labeled {
        label: String,
        at: Point,
        tags: Vec<String>,
    }

    impl_record!(Labeled {
        label: leaf String,
        at: nested Point,
        tags: leaf Vec<String>,
    });

    #[derive(Debug, PartialEq)]
    struct Segment {
        start: Point,
        end: Point,
    }

    impl_record!(Segment {
        start: flatten Point as "start_",
        end: flatten Point as "end_",
    });

    #[derive(Debug, PartialEq)]
    struct Clash {
        x: i64,
        point: Point,
    }

    impl_record!(Clash { x: leaf i64, point: flatten Point });

    #[test]
    fn leaf_schema() {
        let schema = schema_of::<Point>().unwrap();
        assert_eq!(schema.type_name(), "Point");
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(schema.field("y").unwrap().position(), 1);
        assert_eq!(schema.field("y").unwrap().value_type(), &ValueType::Integer);
        assert_eq!(schema.leaf_count(), 2);
    }

    #[test]
    fn nested_field_occupies_one_position() {
        let schema = schema_of::<Labeled>().unwrap();
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["label", "at", "tags"]);

        let at = schema.field("at").unwrap();
        assert!(at.is_nested());
        assert_eq!(at.value_type(), &ValueType::Record("Point"));
        assert_eq!(schema.leaf_count(), 4);
    }

    #[test]
    fn flatten_expands_in_place_with_prefix() {
        let schema = schema_of::<Segment>().unwrap();
        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["start_x", "start_y", "end_x", "end_y"]
        );
        assert_eq!(schema.field("end_x").unwrap().declared_by(), Some("Point"));
        assert_eq!(schema.field("end_x").unwrap().position(), 2);
        assert_eq!(schema.members().len(), 2);
    }

    #[test]
    fn resolution_is_cached() {
        let first = schema_of::<Segment>().unwrap();
        let second = schema_of::<Segment>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn flatten_collision_is_rejected() {
        let err = schema_of::<Clash>().unwrap_err();
        match err {
            Error::DuplicateField {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "x");
                assert_eq!(first, "Clash");
                assert_eq!(second, "Point");
            }
            other => panic!("expected duplicate field, got {other:?}"),
        }
    }

    #[test]
    fn admits() {
        assert!(ValueType::Float.admits(&Value::Float(1.0)));
        assert!(!ValueType::Float.admits(&Value::Integer(1)));
        assert!(!ValueType::Integer.admits(&Value::Float(1.0)));
        assert!(ValueType::Optional(Box::new(ValueType::String)).admits(&Value::Null));
        assert!(ValueType::Array(Box::new(ValueType::Bool))
            .admits(&Value::Array(vec![Value::Bool(true)])));
        assert!(!ValueType::Array(Box::new(ValueType::Bool))
            .admits(&Value::Array(vec![Value::Integer(0)])));
        assert!(ValueType::Record("Point").admits(&Value::map()));
        assert!(ValueType::Any.admits(&Value::Null));
    }

    #[test]
    fn check_accepts_exact_shape() {
        let schema = schema_of::<Labeled>().unwrap();
        let fields = fieldset! {
            "label" => "origin",
            "at" => fieldset! { "x" => 0, "y" => 0 },
            "tags" => vec!["a", "b"],
        };
        assert_eq!(schema.check(&fields), Ok(()));
    }

    #[test]
    fn check_reports_missing_unexpected_and_nested_paths() {
        let schema = schema_of::<Labeled>().unwrap();
        let fields = fieldset! {
            "label" => 5,
            "at" => fieldset! { "x" => 0 },
            "extra" => true,
        };
        let mismatch = schema.check(&fields).unwrap_err();
        assert_eq!(mismatch.missing, vec!["at.y", "tags"]);
        assert_eq!(mismatch.unexpected, vec!["extra"]);
        assert_eq!(mismatch.mistyped.len(), 1);
        assert_eq!(mismatch.mistyped[0].field, "label");
    }

    #[test]
    fn check_reports_misordered() {
        let schema = schema_of::<Point>().unwrap();
        let mismatch = schema.check(&fieldset! { "y" => 4, "x" => 3 }).unwrap_err();
        assert!(mismatch.missing.is_empty());
        assert_eq!(mismatch.misordered, vec!["y", "x"]);
    }

    #[test]
    fn project_reorders_and_drops_recursively() {
        let schema = schema_of::<Labeled>().unwrap();
        let fields = fieldset! {
            "tags" => Value::array(),
            "at" => fieldset! { "y" => 2, "junk" => 0, "x" => 1 },
            "label" => "p",
            "junk" => 0,
        };
        let projected = schema.project(fields);
        assert_eq!(
            projected,
            fieldset! {
                "label" => "p",
                "at" => fieldset! { "x" => 1, "y" => 2 },
                "tags" => Value::array(),
            }
        );
        assert_eq!(schema.check(&projected), Ok(()));
    }

    #[derive(Debug, PartialEq)]
    struct Reading {
        value: f64,
        scale: Option<f64>,
        raw: Vec<u8>,
    }

    impl_record!(Reading {
        value: leaf f64,
        scale: leaf Option<f64>,
        raw: leaf Vec<u8>,
    });

    #[test]
    fn widen_is_lossless_only() {
        let float = ValueType::Float;
        assert_eq!(float.widen(Value::Integer(3)), Value::Float(3.0));
        assert_eq!(float.widen(Value::Integer(1 << 53)), Value::Float(9007199254740992.0));
        assert_eq!(
            float.widen(Value::Integer((1 << 53) + 1)),
            Value::Integer((1 << 53) + 1)
        );
        assert_eq!(float.widen(Value::from("3")), Value::from("3"));

        let optional = ValueType::Optional(Box::new(ValueType::Float));
        assert_eq!(optional.widen(Value::Null), Value::Null);
        assert_eq!(optional.widen(Value::Integer(2)), Value::Float(2.0));

        let ints = ValueType::Array(Box::new(ValueType::Integer));
        assert_eq!(
            ints.widen(Value::Bytes(vec![1, 255])),
            Value::Array(vec![Value::Integer(1), Value::Integer(255)])
        );
        let strings = ValueType::Array(Box::new(ValueType::String));
        assert_eq!(strings.widen(Value::Bytes(vec![1])), Value::Bytes(vec![1]));
    }

    #[test]
    fn check_does_not_widen() {
        let schema = schema_of::<Reading>().unwrap();
        let fields = fieldset! { "value" => 1, "scale" => 2, "raw" => vec![1u8, 2] };
        let mismatch = schema.check(&fields).unwrap_err();
        let mistyped: Vec<_> = mismatch.mistyped.iter().map(|m| m.field.as_str()).collect();
        assert_eq!(mistyped, vec!["value", "scale", "raw"]);
    }

    #[test]
    fn project_widens_leaves() {
        let schema = schema_of::<Reading>().unwrap();
        let fields = fieldset! { "raw" => vec![1u8, 2], "scale" => 2, "value" => 1 };
        let projected = schema.project(fields);
        assert_eq!(
            projected,
            fieldset! {
                "value" => 1.0,
                "scale" => 2.0,
                "raw" => Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
            }
        );
        assert_eq!(schema.check(&projected), Ok(()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn schema_serializes_for_backends() {
        let schema = schema_of::<Labeled>().unwrap();
        let json = serde_json::to_value(&*schema).unwrap();
        assert_eq!(json["record"], "Labeled");
        assert_eq!(json["fields"][0]["name"], "label");
        assert_eq!(json["fields"][0]["type"], serde_json::json!({ "kind": "string" }));
        assert_eq!(
            json["fields"][2]["type"],
            serde_json::json!({ "kind": "array", "of": { "kind": "string" } })
        );
        assert_eq!(json["fields"][1]["schema"]["record"], "Point");
    }
}
