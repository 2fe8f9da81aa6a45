//! The FieldSet type - ordered named fields.

use crate::Value;

/// One named entry of a `FieldSet`.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    name: String,
    value: Value,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.name, self.value)
    }
}

/// A runtime, ordered mapping from field name to value.
///
/// Field order is insertion order and is significant: two field sets with the
/// same entries in a different order are not equal. Names are unique; inserting
/// an existing name replaces its value in place.
///
/// Lookups are linear in the number of fields, which is the right trade-off
/// for record-sized containers.
///
/// # Example
///
/// ```rust
/// use structfs_fieldset::{FieldSet, Value};
///
/// let mut fields = FieldSet::new();
/// fields.insert("name", "Alice");
/// fields.insert("age", 30);
///
/// if let Some(age) = fields.get_mut("age") {
///     *age = Value::Integer(31);
/// }
/// assert_eq!(fields.get("age"), Some(&Value::Integer(31)));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldSet {
    entries: Vec<Field>,
}

impl FieldSet {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty field set with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a field, returning the previous value if the name existed.
    ///
    /// A new name is appended; an existing name keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].value, value)),
            None => {
                self.entries.push(Field { name, value });
                None
            }
        }
    }

    /// Get a field's value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Get the addressable slot of a field by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|field| field.name == name)
            .map(|field| &mut field.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Index of a field in declaration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|field| field.name == name)
    }

    /// Remove a field, preserving the order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.position(name)?;
        Some(self.entries.remove(index).value)
    }

    /// Field names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|field| field.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|field| (field.name.as_str(), &field.value))
    }

    /// Iterate over every field with a mutable borrow of its value.
    ///
    /// The borrows are disjoint, so callers may hold all of them at once.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries.iter_mut().map(|field| {
            let Field { name, value } = field;
            (name.as_str(), value)
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.entries
    }
}

impl IntoIterator for FieldSet {
    type Item = (String, Value);
    type IntoIter = std::iter::Map<std::vec::IntoIter<Field>, fn(Field) -> (String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries
            .into_iter()
            .map(Field::into_parts as fn(Field) -> (String, Value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FieldSet::new();
        fields.extend(iter);
        fields
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for FieldSet {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FieldSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Build a `FieldSet` literal.
///
/// Values go through `Into<Value>`, so plain literals work.
///
/// ```rust
/// use structfs_fieldset::fieldset;
///
/// let fields = fieldset! { "x" => 3, "y" => 4 };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fieldset {
    () => {
        $crate::FieldSet::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::FieldSet::new();
        $(
            fields.insert($name, $value);
        )+
        fields
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldset;

    #[test]
    fn insert_preserves_order() {
        let fields = fieldset! { "b" => 1, "a" => 2, "c" => 3 };
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut fields = fieldset! { "a" => 1, "b" => 2 };
        let old = fields.insert("a", 10);

        assert_eq!(old, Some(Value::Integer(1)));
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&Value::Integer(10)));
    }

    #[test]
    fn order_is_significant_for_equality() {
        let ab = fieldset! { "a" => 1, "b" => 2 };
        let ba = fieldset! { "b" => 2, "a" => 1 };
        assert_ne!(ab, ba);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut fields = fieldset! { "a" => 1, "b" => 2, "c" => 3 };
        assert_eq!(fields.remove("b"), Some(Value::Integer(2)));
        assert_eq!(fields.remove("b"), None);
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn get_mut_is_addressable() {
        let mut fields = fieldset! { "name" => "Alice" };
        let slot = fields.get_mut("name").unwrap();
        let taken = std::mem::take(slot);

        assert_eq!(taken, Value::from("Alice"));
        assert_eq!(fields.get("name"), Some(&Value::Null));
    }

    #[test]
    fn iter_mut_hands_out_disjoint_borrows() {
        let mut fields = fieldset! { "a" => 1, "b" => 2 };
        let slots: Vec<(&str, &mut Value)> = fields.iter_mut().collect();
        for (_, value) in slots {
            *value = Value::Null;
        }
        assert!(fields.iter().all(|(_, value)| value.is_null()));
    }

    #[test]
    fn position_and_contains() {
        let fields = fieldset! { "a" => 1, "b" => 2 };
        assert_eq!(fields.position("b"), Some(1));
        assert!(fields.contains("a"));
        assert!(!fields.contains("z"));
    }

    #[test]
    fn collect_and_into_iter() {
        let fields: FieldSet = vec![("x", 1), ("y", 2)].into_iter().collect();
        let pairs: Vec<(String, Value)> = fields.into_iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("x".to_string(), Value::Integer(1)),
                ("y".to_string(), Value::Integer(2)),
            ]
        );
    }

    #[test]
    fn empty_literal() {
        let fields = fieldset! {};
        assert!(fields.is_empty());
    }
}
