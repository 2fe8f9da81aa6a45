//! Error types for the reflection layer.

use std::fmt;

use structfs_fieldset::ValueKind;

use crate::schema::ValueType;

/// A field whose value does not fit its declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct Mistyped {
    /// Dotted path of the field (`start.x` for nested records).
    pub field: String,
    pub expected: ValueType,
    pub found: ValueKind,
}

/// How a `FieldSet` differs from the schema it was checked against.
///
/// Field names are dotted paths, so a problem inside a nested record reads
/// `outer.inner`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaMismatch {
    /// The record type whose schema was checked.
    pub type_name: &'static str,
    /// Fields the schema declares but the field set lacks.
    pub missing: Vec<String>,
    /// Fields the field set has but the schema does not declare.
    pub unexpected: Vec<String>,
    /// Fields present on both sides but at a different position.
    pub misordered: Vec<String>,
    pub mistyped: Vec<Mistyped>,
}

impl SchemaMismatch {
    pub(crate) fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            ..Self::default()
        }
    }

    /// True when no difference was recorded.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
            && self.unexpected.is_empty()
            && self.misordered.is_empty()
            && self.mistyped.is_empty()
    }
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field set does not match `{}`", self.type_name)?;
        if !self.missing.is_empty() {
            write!(f, "; missing: {}", self.missing.join(", "))?;
        }
        if !self.unexpected.is_empty() {
            write!(f, "; unexpected: {}", self.unexpected.join(", "))?;
        }
        if !self.misordered.is_empty() {
            write!(f, "; out of order: {}", self.misordered.join(", "))?;
        }
        for m in &self.mistyped {
            write!(f, "; `{}` expected {}, found {}", m.field, m.expected, m.found)?;
        }
        Ok(())
    }
}

/// Where a schema mismatch was detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MismatchStage {
    /// The field set as handed to `materialize`, with conversion disabled.
    Input,
    /// The output of the one permitted conversion.
    Converted,
}

impl fmt::Display for MismatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchStage::Input => f.write_str("input"),
            MismatchStage::Converted => f.write_str("after conversion"),
        }
    }
}

/// Errors raised while resolving schemas or transferring fields.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The field set's shape does not match the target schema. Terminal.
    #[error("schema mismatch ({stage}): {mismatch}")]
    SchemaMismatch {
        mismatch: SchemaMismatch,
        stage: MismatchStage,
    },

    /// A record type embeds itself, directly or through other records.
    #[error("cyclic embedding: {}", .path.join(" -> "))]
    CyclicEmbedding { path: Vec<&'static str> },

    /// Two fields of one expanded schema share a name.
    #[error("duplicate field `{name}` declared by both `{first}` and `{second}`")]
    DuplicateField {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    /// A value has the right shape but does not fit the Rust field type.
    #[error("field `{field}` holds a {found} that does not fit {expected}")]
    LeafConversion {
        field: String,
        expected: ValueType,
        found: ValueKind,
    },

    /// A converting constructor or adapter rejected its input.
    #[error("cannot convert into `{type_name}`: {message}")]
    Conversion {
        type_name: &'static str,
        message: String,
    },
}

impl Error {
    /// Build a conversion error, for use in `Record::convert` implementations.
    pub fn conversion(type_name: &'static str, message: impl Into<String>) -> Self {
        Error::Conversion {
            type_name,
            message: message.into(),
        }
    }
}

/// Result type alias for reflection operations.
pub type Result<T> = std::result::Result<T, Error>;
