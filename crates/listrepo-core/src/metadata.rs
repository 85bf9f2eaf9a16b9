//! Entity metadata and the schema registry.
//!
//! Metadata is declared up front (in code or in a YAML/JSON schema file) and
//! validated once when loaded. Repositories take an `Arc<EntityMetadata>`
//! at construction and never look metadata up again.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::descriptor::{AssociationDescriptor, FieldDescriptor, FieldKind};
use crate::error::{Error, Result};
use crate::field_ref::{FieldRef, RelationalKey};
use crate::identifier::validate_identifier;

/// Queryable shape of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name used for registry lookup
    pub name: String,

    /// Root table
    pub table: String,

    /// Name of the identifier field (must be one of `fields`)
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Root scalar fields, in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,

    #[serde(default)]
    pub associations: Vec<AssociationDescriptor>,
}

fn default_identifier() -> String {
    crate::defaults::DEFAULT_IDENTIFIER.to_string()
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            identifier: default_identifier(),
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_association(mut self, association: AssociationDescriptor) -> Self {
        self.associations.push(association);
        self
    }

    /// Check identifiers, uniqueness, and the identifier field.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table, "table").map_err(schema_error(&self.name))?;

        let mut seen = HashSet::new();
        for field in &self.fields {
            field.validate().map_err(schema_error(&self.name))?;
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Schema(format!(
                    "{}: duplicate field '{}'",
                    self.name, field.name
                )));
            }
        }

        let mut seen_assoc = HashSet::new();
        for assoc in &self.associations {
            assoc.validate().map_err(schema_error(&self.name))?;
            if !seen_assoc.insert(assoc.name.as_str()) {
                return Err(Error::Schema(format!(
                    "{}: duplicate association '{}'",
                    self.name, assoc.name
                )));
            }
            let mut seen_sub = HashSet::new();
            if let Some(dup) = assoc.fields.iter().find(|f| !seen_sub.insert(f.name.as_str())) {
                return Err(Error::Schema(format!(
                    "{}: duplicate field '{}' in association '{}'",
                    self.name, dup.name, assoc.name
                )));
            }
        }

        if !seen.contains(self.identifier.as_str()) {
            return Err(Error::Schema(format!(
                "{}: identifier field '{}' is not declared",
                self.name, self.identifier
            )));
        }

        Ok(())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn association_names(&self) -> Vec<&str> {
        self.associations.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn has_association(&self, name: &str) -> bool {
        self.associations.iter().any(|a| a.name == name)
    }

    /// Root field by name.
    pub fn field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    pub fn association(&self, name: &str) -> Result<&AssociationDescriptor> {
        self.associations
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AssociationNotFound(name.to_string()))
    }

    pub fn type_of_field(&self, name: &str) -> Result<FieldKind> {
        self.field(name).map(|f| f.kind)
    }

    pub fn identifier_field(&self) -> Result<&FieldDescriptor> {
        self.field(&self.identifier)
    }

    /// Root fields whose kind is in `kinds`, optionally restricted to `only`.
    ///
    /// Declaration order is preserved.
    pub fn fields_with_kinds(
        &self,
        kinds: &[FieldKind],
        only: Option<&[String]>,
    ) -> Vec<&FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| kinds.contains(&f.kind))
            .filter(|f| only.map_or(true, |names| names.iter().any(|n| *n == f.name)))
            .collect()
    }

    /// Resolve a root field name into a [`FieldRef`].
    pub fn root_ref(&self, name: &str) -> Result<FieldRef> {
        let field = self.field(name)?;
        Ok(FieldRef::root(&field.name, field.column(), field.kind))
    }

    /// Resolve a caller-supplied key (`name`, `assoc_field`, or
    /// `assoc[N]_field`) into a [`FieldRef`].
    pub fn resolve(&self, raw: &str) -> Result<FieldRef> {
        if let Some(key) = RelationalKey::parse(raw) {
            let assoc = self.association(&key.association)?;
            if !assoc.is_to_many() {
                return Err(Error::InvalidInput(format!(
                    "'{}' indexes association '{}', which is not to-many",
                    raw, assoc.name
                )));
            }
            let field = assoc
                .field(&key.field)
                .ok_or_else(|| Error::FieldNotFound(raw.to_string()))?;
            return Ok(
                FieldRef::associated(&assoc.name, &field.name, field.column(), field.kind)
                    .with_index(key.index),
            );
        }

        if let Ok(field) = self.field(raw) {
            return Ok(FieldRef::root(&field.name, field.column(), field.kind));
        }

        for (pos, _) in raw.match_indices('_') {
            let (assoc_name, rest) = (&raw[..pos], &raw[pos + 1..]);
            if let Ok(assoc) = self.association(assoc_name) {
                if let Some(field) = assoc.field(rest) {
                    return Ok(FieldRef::associated(
                        &assoc.name,
                        &field.name,
                        field.column(),
                        field.kind,
                    ));
                }
            }
        }

        Err(Error::FieldNotFound(raw.to_string()))
    }
}

fn schema_error(entity: &str) -> impl Fn(Error) -> Error + '_ {
    move |e| Error::Schema(format!("{}: {}", entity, e))
}

/// Read-only source of entity metadata.
pub trait MetadataProvider: Send + Sync {
    fn metadata(&self, entity: &str) -> Result<Arc<EntityMetadata>>;
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    entities: Vec<EntityMetadata>,
}

/// Explicit registry of entity metadata, populated at startup.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, Arc<EntityMetadata>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register an entity, replacing any previous definition.
    pub fn register(&mut self, metadata: EntityMetadata) -> Result<()> {
        metadata.validate()?;
        self.entities
            .insert(metadata.name.clone(), Arc::new(metadata));
        Ok(())
    }

    pub fn with_entity(mut self, metadata: EntityMetadata) -> Result<Self> {
        self.register(metadata)?;
        Ok(self)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let file: SchemaFile = serde_yaml::from_str(source)?;
        Self::from_entities(file.entities)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let file: SchemaFile = serde_json::from_str(source)?;
        Self::from_entities(file.entities)
    }

    /// Load a schema file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let registry = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&source)?,
            _ => Self::from_yaml_str(&source)?,
        };
        info!(
            subsystem = "listing",
            component = "registry",
            op = "load",
            path = %path.display(),
            entity_count = registry.len(),
            "Schema registry loaded"
        );
        Ok(registry)
    }

    fn from_entities(entities: Vec<EntityMetadata>) -> Result<Self> {
        let mut registry = Self::new();
        for entity in entities {
            if registry.entities.contains_key(&entity.name) {
                return Err(Error::Schema(format!(
                    "entity '{}' is declared twice",
                    entity.name
                )));
            }
            registry.register(entity)?;
        }
        Ok(registry)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl MetadataProvider for SchemaRegistry {
    fn metadata(&self, entity: &str) -> Result<Arc<EntityMetadata>> {
        self.entities
            .get(entity)
            .cloned()
            .ok_or_else(|| Error::EntityNotFound(entity.to_string()))
    }
}
