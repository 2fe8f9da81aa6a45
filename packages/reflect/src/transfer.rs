//! The transfer engine: pointer tree in, record out (and back again).
//!
//! `Arguments` walks a pointer tree in declaration order, handing each
//! constructor argument to `Record::construct`. Every leaf is moved out of
//! the field set exactly once; nested and flattened records are built in full
//! by recursion before they are handed to their parent. `FieldSink` is the
//! inverse: `Record::deconstruct` pushes values and the sink names them from
//! the schema.

use std::slice;
use std::vec;

use structfs_fieldset::{FieldSet, Value};
use tracing::trace;

use crate::error::{Error, Result};
use crate::leaf::Leaf;
use crate::pointer::{Pointer, PointerTree};
use crate::record::Record;
use crate::schema::{schema_of, FieldDescriptor, Schema};

/// The constructor arguments of one record, in declaration order.
///
/// Handed to `Record::construct`. Each call consumes the next argument; the
/// kind asked for must match the kind declared in `Record::fields`.
pub struct Arguments<'a> {
    type_name: &'static str,
    pointers: vec::IntoIter<Pointer<'a>>,
    moves: usize,
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(tree: PointerTree<'a>) -> Self {
        Self {
            type_name: tree.type_name(),
            pointers: tree.into_pointers().into_iter(),
            moves: 0,
        }
    }

    /// Move the next leaf value out of the field set.
    ///
    /// # Errors
    ///
    /// `LeafConversion` if the value does not fit `V` (e.g. out of range).
    pub fn leaf<V: Leaf>(&mut self) -> Result<V> {
        let mut slot = match self.next() {
            Pointer::Leaf(slot) => slot,
            other => self.kind_mismatch("leaf", &other),
        };
        let value = slot.take();
        self.moves += 1;

        let found = value.kind();
        V::from_value(value).ok_or_else(|| Error::LeafConversion {
            field: slot.name().to_string(),
            expected: V::value_type(),
            found,
        })
    }

    /// Build the next argument, a nested record, in full.
    pub fn nested<R: Record>(&mut self) -> Result<R> {
        match self.next() {
            Pointer::Nested(tree) => self.descend(tree),
            other => self.kind_mismatch("nested", &other),
        }
    }

    /// Build the next argument, a flattened record, in full.
    pub fn flatten<R: Record>(&mut self) -> Result<R> {
        match self.next() {
            Pointer::Flatten(tree) => self.descend(tree),
            other => self.kind_mismatch("flatten", &other),
        }
    }

    fn descend<R: Record>(&mut self, tree: PointerTree<'a>) -> Result<R> {
        let mut args = Arguments::new(tree);
        let record = R::construct(&mut args)?;
        args.finish();
        self.moves += args.moves;
        Ok(record)
    }

    fn next(&mut self) -> Pointer<'a> {
        match self.pointers.next() {
            Some(pointer) => pointer,
            None => panic!(
                "`{}` constructor takes more fields than its schema declares",
                self.type_name
            ),
        }
    }

    fn kind_mismatch(&self, asked: &str, found: &Pointer<'_>) -> ! {
        panic!(
            "`{}` constructor asked for a {} field but its schema declares a {} field",
            self.type_name,
            asked,
            found.kind()
        )
    }

    /// Assert the constructor consumed every argument.
    fn finish(&self) {
        assert!(
            self.pointers.len() == 0,
            "`{}` constructor left {} declared field(s) untouched",
            self.type_name,
            self.pointers.len()
        );
    }

    pub(crate) fn moves(&self) -> usize {
        self.moves
    }
}

/// Build a `T` from a field set that already matches `schema`.
///
/// Returns the record and the number of values moved.
pub(crate) fn transfer<T: Record>(schema: &Schema, mut fields: FieldSet) -> Result<(T, usize)> {
    let tree = PointerTree::build(schema, &mut fields);
    let mut args = Arguments::new(tree);
    let record = T::construct(&mut args)?;
    args.finish();

    trace!(
        record = schema.type_name(),
        moves = args.moves(),
        "transferred fields"
    );
    Ok((record, args.moves()))
}

/// Receives the fields of a record being extracted, in declaration order.
///
/// Handed to `Record::deconstruct`. Names come from the schema, so flattened
/// fields pick up their prefix without the record knowing about it.
pub struct FieldSink<'s> {
    type_name: &'static str,
    descriptors: slice::Iter<'s, FieldDescriptor>,
    fields: FieldSet,
}

impl<'s> FieldSink<'s> {
    pub(crate) fn new(schema: &'s Schema) -> Self {
        Self {
            type_name: schema.type_name(),
            descriptors: schema.fields().iter(),
            fields: FieldSet::with_capacity(schema.len()),
        }
    }

    pub fn leaf<V: Leaf>(&mut self, value: V) {
        let descriptor = self.next();
        self.fields.insert(descriptor.name(), value.into_value());
    }

    pub fn nested<R: Record>(&mut self, record: R) {
        let descriptor = self.next();
        let Some(schema) = descriptor.schema() else {
            panic!(
                "`{}` pushed a nested record where its schema declares leaf `{}`",
                self.type_name,
                descriptor.name()
            );
        };
        let mut sink = FieldSink::new(schema);
        record.deconstruct(&mut sink);
        self.fields.insert(descriptor.name(), Value::Map(sink.finish()));
    }

    /// Flattened fields land directly in this sink.
    pub fn flatten<R: Record>(&mut self, record: R) {
        record.deconstruct(self);
    }

    fn next(&mut self) -> &'s FieldDescriptor {
        match self.descriptors.next() {
            Some(descriptor) => descriptor,
            None => panic!(
                "`{}` pushed more fields than its schema declares",
                self.type_name
            ),
        }
    }

    fn finish(self) -> FieldSet {
        assert!(
            self.descriptors.len() == 0,
            "`{}` left {} declared field(s) unpushed",
            self.type_name,
            self.descriptors.len()
        );
        self.fields
    }
}

/// Take a record apart into a field set whose shape is exactly
/// `schema_of::<T>()`.
///
/// # Errors
///
/// Only schema resolution can fail (`CyclicEmbedding`, `DuplicateField`).
pub fn extract<T: Record>(record: T) -> Result<FieldSet> {
    let schema = schema_of::<T>()?;
    let mut sink = FieldSink::new(&schema);
    record.deconstruct(&mut sink);
    Ok(sink.finish())
}
