//! Field and association descriptors.
//!
//! A descriptor names a queryable attribute and carries its declared scalar
//! kind. The public name is what callers use; the column is what ends up in
//! SQL. The two are decoupled so storage naming can change freely.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifier::validate_identifier;

/// Declared scalar kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Text,
    #[serde(alias = "uuid")]
    Guid,
    #[serde(alias = "smallint", alias = "bigint")]
    Integer,
    Float,
    Decimal,
    Boolean,
    #[serde(alias = "datetimetz", alias = "timestamp")]
    DateTime,
}

impl FieldKind {
    /// Kinds matched by substring during free-text search.
    pub const TEXT_LIKE: &'static [FieldKind] = &[FieldKind::String, FieldKind::Text, FieldKind::Guid];

    /// Kinds matched exactly during free-text search when the pattern is numeric.
    pub const NUMBER_LIKE: &'static [FieldKind] =
        &[FieldKind::Integer, FieldKind::Float, FieldKind::Decimal];

    pub fn is_text_like(&self) -> bool {
        Self::TEXT_LIKE.contains(self)
    }

    pub fn is_number_like(&self) -> bool {
        Self::NUMBER_LIKE.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Text => "text",
            FieldKind::Guid => "guid",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Decimal => "decimal",
            FieldKind::Boolean => "boolean",
            FieldKind::DateTime => "datetime",
        }
    }
}

/// A scalar attribute of an entity or association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Public field name
    pub name: String,

    /// Storage column (defaults to the field name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    /// Declared scalar kind
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            column: None,
            kind,
        }
    }

    /// Map the field onto a differently named column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Storage column backing this field.
    pub fn column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_identifier(&self.name, "field")?;
        validate_identifier(self.column(), "column")
    }
}

/// How many associated rows one root row can join to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// The root row holds a foreign key to the associated row.
    ToOne,
    /// Associated rows hold a foreign key to the root row.
    ToMany,
}

/// A relation from the root entity to another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    /// Association name, also used as the join alias
    pub name: String,

    /// Associated table
    pub table: String,

    pub cardinality: Cardinality,

    /// Foreign key column. On the associated table for `ToMany`,
    /// on the root table for `ToOne`.
    pub join_column: String,

    /// Identifier column of the associated table (used by `ToOne` joins)
    #[serde(default = "default_target_identifier")]
    pub target_identifier: String,

    /// Scalar fields of the associated table
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

fn default_target_identifier() -> String {
    crate::defaults::DEFAULT_IDENTIFIER.to_string()
}

impl AssociationDescriptor {
    pub fn to_many(
        name: impl Into<String>,
        table: impl Into<String>,
        join_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            cardinality: Cardinality::ToMany,
            join_column: join_column.into(),
            target_identifier: default_target_identifier(),
            fields: Vec::new(),
        }
    }

    pub fn to_one(
        name: impl Into<String>,
        table: impl Into<String>,
        join_column: impl Into<String>,
    ) -> Self {
        Self {
            cardinality: Cardinality::ToOne,
            ..Self::to_many(name, table, join_column)
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_identifier(&self.name, "association")?;
        validate_identifier(&self.table, "table")?;
        validate_identifier(&self.join_column, "column")?;
        validate_identifier(&self.target_identifier, "column")?;
        for field in &self.fields {
            field.validate()?;
        }
        Ok(())
    }
}
