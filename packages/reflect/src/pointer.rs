//! Pointer trees: borrowed addresses of every leaf in one field set.
//!
//! A `PointerTree` mirrors the member structure of a schema. Each leaf holds
//! a mutable borrow of the matching value inside the field set, each nested
//! position a sub-tree over the nested field set, each flatten position a
//! sub-tree over the same field set. Building one moves nothing; it only
//! resolves names to addresses. The borrow checker guarantees every address
//! is handed out once.

use std::collections::HashMap;

use structfs_fieldset::{FieldSet, Value};

use crate::schema::{FieldDescriptor, Member, Schema};

/// The address of one leaf value, consumable once.
pub(crate) struct Slot<'a> {
    name: &'a str,
    value: &'a mut Value,
    consumed: bool,
}

impl<'a> Slot<'a> {
    fn new(name: &'a str, value: &'a mut Value) -> Self {
        Self {
            name,
            value,
            consumed: false,
        }
    }

    pub(crate) fn name(&self) -> &'a str {
        self.name
    }

    /// Move the value out, leaving `Null` behind.
    ///
    /// # Panics
    ///
    /// If the slot was already taken.
    pub(crate) fn take(&mut self) -> Value {
        assert!(
            !self.consumed,
            "field `{}` transferred more than once",
            self.name
        );
        self.consumed = true;
        std::mem::take(self.value)
    }
}

pub(crate) enum Pointer<'a> {
    Leaf(Slot<'a>),
    Nested(PointerTree<'a>),
    Flatten(PointerTree<'a>),
}

impl Pointer<'_> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Pointer::Leaf(_) => "leaf",
            Pointer::Nested(_) => "nested",
            Pointer::Flatten(_) => "flatten",
        }
    }
}

pub(crate) struct PointerTree<'a> {
    type_name: &'static str,
    pointers: Vec<Pointer<'a>>,
}

type Slots<'a> = HashMap<&'a str, &'a mut Value>;

impl<'a> PointerTree<'a> {
    /// Resolve every leaf of `schema` inside `fields`.
    ///
    /// `fields` must already have passed `schema.check`.
    ///
    /// # Panics
    ///
    /// If a schema name is absent from `fields` or a nested position does not
    /// hold a map. Both mean the shape check was skipped or is wrong.
    pub(crate) fn build(schema: &Schema, fields: &'a mut FieldSet) -> Self {
        let mut slots: Slots<'a> = fields.iter_mut().collect();
        Self::level(schema, schema.fields(), 0, &mut slots)
    }

    /// Build the tree for `schema`, whose fields sit at `offset..` of
    /// `descriptors` (the expanded field list of the outermost schema that
    /// shares this field set).
    fn level(
        schema: &Schema,
        descriptors: &[FieldDescriptor],
        offset: usize,
        slots: &mut Slots<'a>,
    ) -> Self {
        let pointers = schema
            .members()
            .iter()
            .map(|member| match member {
                Member::Field(index) => {
                    let descriptor = &descriptors[offset + index];
                    let Some((name, value)) = slots.remove_entry(descriptor.name()) else {
                        panic!(
                            "`{}` has no field `{}` after passing its schema check",
                            schema.type_name(),
                            descriptor.name()
                        );
                    };
                    let Some(nested) = descriptor.schema() else {
                        return Pointer::Leaf(Slot::new(name, value));
                    };
                    match value {
                        Value::Map(inner) => Pointer::Nested(PointerTree::build(nested, inner)),
                        other => panic!(
                            "nested `{}` at `{}` is a {}, not a map",
                            nested.type_name(),
                            name,
                            other.kind()
                        ),
                    }
                }
                Member::Flatten { schema, start } => {
                    Pointer::Flatten(Self::level(schema, descriptors, offset + start, slots))
                }
            })
            .collect();

        Self {
            type_name: schema.type_name(),
            pointers,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn into_pointers(self) -> Vec<Pointer<'a>> {
        self.pointers
    }

    /// Leaf names, depth-first in declaration order.
    #[cfg(test)]
    pub(crate) fn leaf_names(&self) -> Vec<&'a str> {
        let mut names = Vec::new();
        self.collect_leaf_names(&mut names);
        names
    }

    #[cfg(test)]
    fn collect_leaf_names(&self, names: &mut Vec<&'a str>) {
        for pointer in &self.pointers {
            match pointer {
                Pointer::Leaf(slot) => names.push(slot.name()),
                Pointer::Nested(tree) | Pointer::Flatten(tree) => tree.collect_leaf_names(names),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{impl_record, schema_of};
    use structfs_fieldset::fieldset;

    struct Point {
        x: i64,
        y: i64,
    }

    impl_record!(Point { x: leaf i64, y: leaf i64 });

    struct Size {
        w: u32,
        h: u32,
    }

    impl_record!(Size { w: leaf u32, h: leaf u32 });

    struct Shape {
        name: String,
        origin: Point,
        size: Size,
        anchor: Point,
    }

    impl_record!(Shape {
        name: leaf String,
        origin: nested Point,
        size: flatten Size,
        anchor: flatten Point as "anchor_",
    });

    fn shape_fields() -> FieldSet {
        fieldset! {
            "name" => "box",
            "origin" => fieldset! { "x" => 1, "y" => 2 },
            "w" => 3,
            "h" => 4,
            "anchor_x" => 5,
            "anchor_y" => 6,
        }
    }

    #[test]
    fn leaves_follow_declaration_order() {
        let schema = schema_of::<Shape>().unwrap();
        let mut fields = shape_fields();
        let tree = PointerTree::build(&schema, &mut fields);

        assert_eq!(tree.type_name(), "Shape");
        assert_eq!(
            tree.leaf_names(),
            vec!["name", "x", "y", "w", "h", "anchor_x", "anchor_y"]
        );
    }

    #[test]
    fn tree_mirrors_members() {
        let schema = schema_of::<Shape>().unwrap();
        let mut fields = shape_fields();
        let tree = PointerTree::build(&schema, &mut fields);

        let kinds: Vec<_> = tree.into_pointers().iter().map(Pointer::kind).collect();
        assert_eq!(kinds, vec!["leaf", "nested", "flatten", "flatten"]);
    }

    #[test]
    fn building_moves_nothing() {
        let schema = schema_of::<Shape>().unwrap();
        let mut fields = shape_fields();
        let before = fields.clone();
        drop(PointerTree::build(&schema, &mut fields));
        assert_eq!(fields, before);
    }

    #[test]
    fn slot_take_leaves_null() {
        let mut value = Value::from("moved");
        let mut slot = Slot::new("s", &mut value);
        assert_eq!(slot.take(), Value::from("moved"));
        drop(slot);
        assert!(value.is_null());
    }

    #[test]
    #[should_panic(expected = "transferred more than once")]
    fn slot_rejects_double_take() {
        let mut value = Value::from(1i64);
        let mut slot = Slot::new("x", &mut value);
        slot.take();
        slot.take();
    }

    #[test]
    #[should_panic(expected = "after passing its schema check")]
    fn missing_field_is_a_defect() {
        let schema = schema_of::<Point>().unwrap();
        let mut fields = fieldset! { "x" => 1 };
        PointerTree::build(&schema, &mut fields);
    }
}
