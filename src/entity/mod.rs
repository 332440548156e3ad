//! Logical entity model: entities, properties, keys and relationships.
//!
//! The model is produced once by [`ModelBuilder`] from entity descriptors,
//! configuration providers and the enabled conventions, and is read-only
//! afterwards.

pub mod builder;
pub mod config;
pub mod convention;
pub mod physical;

pub use builder::ModelBuilder;
pub use config::{
    ConfigurationProvider, EntityConfig, ModelConfiguration, PropertyConfig, RelationshipConfig,
};
pub use convention::{Convention, ConventionSet};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{ColumnType, Index, ReferentialAction};
use crate::naming::NamingConvention;

/// Semantic type of a property, independent of any dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Int16,
    Int32,
    Int64,
    Bool,
    Float64,
    String,
    Uuid,
    DateTime,
    Date,
    Bytes,
}

impl PropertyType {
    pub fn column_type(&self) -> ColumnType {
        match self {
            PropertyType::Int16 => ColumnType::SmallInt,
            PropertyType::Int32 => ColumnType::Integer,
            PropertyType::Int64 => ColumnType::BigInt,
            PropertyType::Bool => ColumnType::Boolean,
            PropertyType::Float64 => ColumnType::Double,
            PropertyType::String => ColumnType::Text,
            PropertyType::Uuid => ColumnType::Uuid,
            PropertyType::DateTime => ColumnType::Timestamp,
            PropertyType::Date => ColumnType::Date,
            PropertyType::Bytes => ColumnType::Binary,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            PropertyType::Int16 | PropertyType::Int32 | PropertyType::Int64
        )
    }

    pub fn supports_max_length(&self) -> bool {
        matches!(self, PropertyType::String | PropertyType::Bytes)
    }
}

// ============================================================================
// Descriptors (builder input)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub property_type: PropertyType,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationDescriptor {
    /// Points at a single principal, e.g. `Comment.Article`.
    Reference { name: String, target: String },
    /// Holds the dependents of this entity, e.g. `Article.Comments`.
    Collection { name: String, target: String },
}

impl NavigationDescriptor {
    pub fn name(&self) -> &str {
        match self {
            NavigationDescriptor::Reference { name, .. }
            | NavigationDescriptor::Collection { name, .. } => name,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            NavigationDescriptor::Reference { target, .. }
            | NavigationDescriptor::Collection { target, .. } => target,
        }
    }
}

/// Shape of an entity type as declared by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(default)]
    pub navigations: Vec<NavigationDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            navigations: Vec::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, property_type: PropertyType) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.into(),
            property_type,
            nullable: false,
        });
        self
    }

    pub fn nullable_property(
        mut self,
        name: impl Into<String>,
        property_type: PropertyType,
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.into(),
            property_type,
            nullable: true,
        });
        self
    }

    pub fn reference(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.navigations.push(NavigationDescriptor::Reference {
            name: name.into(),
            target: target.into(),
        });
        self
    }

    pub fn collection(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.navigations.push(NavigationDescriptor::Collection {
            name: name.into(),
            target: target.into(),
        });
        self
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn find_navigation(&self, name: &str) -> Option<&NavigationDescriptor> {
        self.navigations.iter().find(|n| n.name() == name)
    }
}

// ============================================================================
// Resolved model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueGeneration {
    #[default]
    None,
    AutoIncrement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
    pub nullable: bool,
    pub column_name: String,
    pub column_type: ColumnType,
    pub max_length: Option<u32>,
    pub value_generation: ValueGeneration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub name: String,
    pub table_name: String,
    /// Declaration order.
    pub properties: Vec<Property>,
    /// Property names forming the primary key.
    pub primary_key: Vec<String>,
    pub indexes: Vec<Index>,
}

impl Entity {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_by_column(&self, column: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.column_name == column)
    }

    pub fn key_properties(&self) -> impl Iterator<Item = &Property> {
        self.primary_key.iter().filter_map(|name| self.property(name))
    }

    /// Physical column of a single-property key.
    pub fn key_column(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [only] => self.property(only).map(|p| p.column_name.as_str()),
            _ => None,
        }
    }
}

/// One-to-many relationship between a principal and its dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub principal: String,
    pub dependent: String,
    /// Foreign key property on the dependent.
    pub foreign_key: String,
    pub foreign_key_column: String,
    pub principal_key_column: String,
    pub on_delete: ReferentialAction,
    pub required: bool,
    /// Collection navigation on the principal.
    pub principal_navigation: Option<String>,
    /// Reference navigation on the dependent.
    pub dependent_navigation: Option<String>,
    pub constraint_name: String,
}

impl Relationship {
    /// Name under which dependents are collected on a principal instance.
    pub fn collection_name(&self) -> &str {
        self.principal_navigation
            .as_deref()
            .unwrap_or(self.dependent.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct EntityModel {
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
    naming: NamingConvention,
    conventions: ConventionSet,
    by_name: HashMap<String, usize>,
    by_principal: HashMap<String, Vec<usize>>,
    by_dependent: HashMap<String, Vec<usize>>,
}

impl EntityModel {
    pub(crate) fn new(
        entities: Vec<Entity>,
        relationships: Vec<Relationship>,
        naming: NamingConvention,
        conventions: ConventionSet,
    ) -> Self {
        let by_name = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();

        let mut by_principal: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_dependent: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, rel) in relationships.iter().enumerate() {
            by_principal.entry(rel.principal.clone()).or_default().push(i);
            by_dependent.entry(rel.dependent.clone()).or_default().push(i);
        }

        Self {
            entities,
            relationships,
            naming,
            conventions,
            by_name,
            by_principal,
            by_dependent,
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }

    pub fn entity_for_table(&self, table: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.table_name == table)
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationships in which `entity` is the principal.
    pub fn dependents_of<'a>(&'a self, entity: &str) -> impl Iterator<Item = &'a Relationship> {
        self.by_principal
            .get(entity)
            .into_iter()
            .flatten()
            .map(move |&i| &self.relationships[i])
    }

    /// Relationships in which `entity` is the dependent.
    pub fn principals_of<'a>(&'a self, entity: &str) -> impl Iterator<Item = &'a Relationship> {
        self.by_dependent
            .get(entity)
            .into_iter()
            .flatten()
            .map(move |&i| &self.relationships[i])
    }

    /// Finds the relationship reached through a navigation on `entity`.
    pub fn navigation(&self, entity: &str, navigation: &str) -> Option<&Relationship> {
        self.dependents_of(entity)
            .find(|r| r.collection_name() == navigation)
            .or_else(|| {
                self.principals_of(entity)
                    .find(|r| r.dependent_navigation.as_deref() == Some(navigation))
            })
    }

    pub fn naming(&self) -> &NamingConvention {
        &self.naming
    }

    pub fn conventions(&self) -> &ConventionSet {
        &self.conventions
    }
}
