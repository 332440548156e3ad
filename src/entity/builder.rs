use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::config::{ConfigurationProvider, EntityConfig, ModelConfiguration, RelationshipConfig};
use super::convention::{Convention, ConventionSet};
use super::{
    Entity, EntityDescriptor, EntityModel, NavigationDescriptor, Property, Relationship,
    ValueGeneration,
};
use crate::api::{Error, Result};
use crate::model::{Index, ReferentialAction};
use crate::naming::NamingConvention;

/// Builds an [`EntityModel`] from descriptors, explicit configuration and
/// conventions. Explicit configuration always wins over inference.
#[derive(Default)]
pub struct ModelBuilder {
    descriptors: Vec<EntityDescriptor>,
    providers: Vec<Box<dyn ConfigurationProvider>>,
    conventions: ConventionSet,
    naming: NamingConvention,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, descriptor: EntityDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn entities(mut self, descriptors: impl IntoIterator<Item = EntityDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Registers a configuration provider. Providers run in registration
    /// order, so later providers override earlier ones.
    pub fn apply_configuration(mut self, provider: impl ConfigurationProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn without_convention(mut self, convention: Convention) -> Self {
        self.conventions.disable(convention);
        self
    }

    pub fn with_conventions(mut self, conventions: ConventionSet) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    pub fn build(self) -> Result<EntityModel> {
        let mut config = ModelConfiguration::new();
        for provider in &self.providers {
            provider.configure(&mut config);
        }

        self.validate_configuration(&config)?;

        let mut entities = Vec::with_capacity(self.descriptors.len());
        let mut tables: HashMap<String, String> = HashMap::new();

        for descriptor in &self.descriptors {
            let entity = self.resolve_entity(descriptor, config.entities.get(&descriptor.name))?;
            if let Some(existing) = tables.insert(entity.table_name.clone(), entity.name.clone()) {
                return Err(Error::naming_collision(
                    "model",
                    entity.table_name,
                    existing,
                    &descriptor.name,
                ));
            }
            debug!(entity = %entity.name, table = %entity.table_name, "resolved entity");
            entities.push(entity);
        }

        let relationships = self.resolve_relationships(&config, &mut entities)?;

        if self.conventions.is_enabled(Convention::ForeignKeyIndex) {
            self.add_foreign_key_indexes(&relationships, &mut entities);
        }

        Ok(EntityModel::new(
            entities,
            relationships,
            self.naming,
            self.conventions,
        ))
    }

    fn descriptor_index(&self, name: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.name == name)
    }

    fn validate_configuration(&self, config: &ModelConfiguration) -> Result<()> {
        let mut seen = HashSet::new();
        for descriptor in &self.descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(Error::configuration(
                    &descriptor.name,
                    "entity is declared more than once",
                ));
            }
        }

        for (name, entity_config) in &config.entities {
            let descriptor = self
                .descriptor_index(name)
                .map(|i| &self.descriptors[i])
                .ok_or_else(|| Error::configuration(name, "configured entity is not declared"))?;

            for property in entity_config.properties.keys() {
                if descriptor.find_property(property).is_none() {
                    return Err(Error::configuration(
                        name,
                        format!("configured property '{property}' does not exist"),
                    ));
                }
            }

            for navigation in entity_config.relationships.keys() {
                if descriptor.find_navigation(navigation).is_none() {
                    return Err(Error::configuration(
                        name,
                        format!("configured navigation '{navigation}' does not exist"),
                    ));
                }
            }
        }

        Ok(())
    }

    fn resolve_entity(
        &self,
        descriptor: &EntityDescriptor,
        config: Option<&EntityConfig>,
    ) -> Result<Entity> {
        let table_name = config
            .and_then(|c| c.table.clone())
            .unwrap_or_else(|| self.naming.table_name(&descriptor.name));

        let mut properties = Vec::with_capacity(descriptor.properties.len());
        let mut columns: HashMap<String, String> = HashMap::new();

        for property in &descriptor.properties {
            let property_config = config.and_then(|c| c.properties.get(&property.name));

            let column_name = property_config
                .and_then(|c| c.column.clone())
                .unwrap_or_else(|| self.naming.column_name(&property.name));

            let max_length = property_config.and_then(|c| c.max_length);
            if max_length.is_some() && !property.property_type.supports_max_length() {
                return Err(Error::configuration(
                    &descriptor.name,
                    format!(
                        "property '{}' of type {:?} cannot have a maximum length",
                        property.name, property.property_type
                    ),
                ));
            }

            let nullable = match property_config.and_then(|c| c.required) {
                Some(required) => !required,
                None => property.nullable,
            };

            if let Some(existing) = columns.insert(column_name.clone(), property.name.clone()) {
                return Err(Error::naming_collision(
                    &table_name,
                    column_name,
                    existing,
                    &property.name,
                ));
            }

            properties.push(Property {
                name: property.name.clone(),
                property_type: property.property_type,
                nullable,
                column_name,
                column_type: property.property_type.column_type(),
                max_length,
                value_generation: ValueGeneration::None,
            });
        }

        let primary_key = self.resolve_key(descriptor, config)?;

        for property in properties.iter_mut() {
            if primary_key.contains(&property.name) {
                property.nullable = false;
            }
        }

        if self.conventions.is_enabled(Convention::ValueGeneration) {
            if let [only] = primary_key.as_slice() {
                if let Some(property) = properties.iter_mut().find(|p| &p.name == only) {
                    if property.property_type.is_integer() {
                        property.value_generation = ValueGeneration::AutoIncrement;
                    }
                }
            }
        }

        Ok(Entity {
            name: descriptor.name.clone(),
            table_name,
            properties,
            primary_key,
            indexes: Vec::new(),
        })
    }

    fn resolve_key(
        &self,
        descriptor: &EntityDescriptor,
        config: Option<&EntityConfig>,
    ) -> Result<Vec<String>> {
        if let Some(key) = config.and_then(|c| c.key.as_ref()) {
            if key.is_empty() {
                return Err(Error::configuration(
                    &descriptor.name,
                    "declared primary key is empty",
                ));
            }
            for property in key {
                if descriptor.find_property(property).is_none() {
                    return Err(Error::configuration(
                        &descriptor.name,
                        format!("key property '{property}' does not exist"),
                    ));
                }
            }
            return Ok(key.clone());
        }

        if self.conventions.is_enabled(Convention::KeyDiscovery) {
            let entity_id = format!("{}Id", descriptor.name);
            let discovered = descriptor
                .properties
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case("Id"))
                .or_else(|| {
                    descriptor
                        .properties
                        .iter()
                        .find(|p| p.name.eq_ignore_ascii_case(&entity_id))
                });
            if let Some(property) = discovered {
                return Ok(vec![property.name.clone()]);
            }
        }

        Err(Error::configuration(
            &descriptor.name,
            "no primary key was declared and none could be inferred",
        ))
    }

    fn resolve_relationships(
        &self,
        config: &ModelConfiguration,
        entities: &mut [Entity],
    ) -> Result<Vec<Relationship>> {
        let mut relationships: Vec<Relationship> = Vec::new();
        let mut paired: HashSet<(String, String)> = HashSet::new();

        for dependent in &self.descriptors {
            for navigation in &dependent.navigations {
                let NavigationDescriptor::Reference { name, target } = navigation else {
                    continue;
                };
                let principal = self.target(dependent, name, target)?;

                let reference_config = config
                    .entities
                    .get(&dependent.name)
                    .and_then(|c| c.relationships.get(name));

                let inverse = match reference_config.and_then(|c| c.inverse.as_ref()) {
                    Some(inverse) => match principal.find_navigation(inverse) {
                        Some(NavigationDescriptor::Collection { target, .. })
                            if target == &dependent.name =>
                        {
                            Some(inverse.clone())
                        }
                        _ => {
                            return Err(Error::configuration(
                                &dependent.name,
                                format!(
                                    "inverse '{inverse}' is not a collection of '{}' on '{}'",
                                    dependent.name, principal.name
                                ),
                            ))
                        }
                    },
                    None => principal
                        .navigations
                        .iter()
                        .find(|n| {
                            let targets_dependent = matches!(
                                n,
                                NavigationDescriptor::Collection { target, .. }
                                    if target == &dependent.name
                            );
                            targets_dependent
                                && !paired.contains(&(principal.name.clone(), n.name().to_string()))
                        })
                        .map(|n| n.name().to_string()),
                };

                let inverse_config = inverse.as_ref().and_then(|inv| {
                    config
                        .entities
                        .get(&principal.name)
                        .and_then(|c| c.relationships.get(inv))
                });
                if let Some(inv) = &inverse {
                    paired.insert((principal.name.clone(), inv.clone()));
                }

                let merged = layer(inverse_config, reference_config);
                let relationship = self.resolve_relationship(
                    entities,
                    principal,
                    dependent,
                    Some(name.as_str()),
                    inverse,
                    &merged,
                )?;
                push_unique(&mut relationships, relationship)?;
            }
        }

        for principal in &self.descriptors {
            for navigation in &principal.navigations {
                let NavigationDescriptor::Collection { name, target } = navigation else {
                    continue;
                };
                if paired.contains(&(principal.name.clone(), name.clone())) {
                    continue;
                }
                let dependent = self.target(principal, name, target)?;

                let collection_config = config
                    .entities
                    .get(&principal.name)
                    .and_then(|c| c.relationships.get(name))
                    .cloned()
                    .unwrap_or_default();

                let relationship = self.resolve_relationship(
                    entities,
                    principal,
                    dependent,
                    None,
                    Some(name.clone()),
                    &collection_config,
                )?;
                push_unique(&mut relationships, relationship)?;
            }
        }

        Ok(relationships)
    }

    fn target(
        &self,
        owner: &EntityDescriptor,
        navigation: &str,
        target: &str,
    ) -> Result<&EntityDescriptor> {
        self.descriptor_index(target)
            .map(|i| &self.descriptors[i])
            .ok_or_else(|| {
                Error::configuration(
                    &owner.name,
                    format!("navigation '{navigation}' targets undeclared entity '{target}'"),
                )
            })
    }

    fn resolve_relationship(
        &self,
        entities: &mut [Entity],
        principal: &EntityDescriptor,
        dependent: &EntityDescriptor,
        dependent_navigation: Option<&str>,
        principal_navigation: Option<String>,
        config: &RelationshipConfig,
    ) -> Result<Relationship> {
        let principal_index = entities
            .iter()
            .position(|e| e.name == principal.name)
            .ok_or_else(|| Error::configuration(&principal.name, "entity was not resolved"))?;
        let dependent_index = entities
            .iter()
            .position(|e| e.name == dependent.name)
            .ok_or_else(|| Error::configuration(&dependent.name, "entity was not resolved"))?;

        let principal_entity = &entities[principal_index];
        let principal_table = principal_entity.table_name.clone();
        let principal_key = match principal_entity.primary_key.as_slice() {
            [only] => principal_entity.property(only).cloned(),
            _ => None,
        }
        .ok_or_else(|| {
            Error::configuration(
                &principal.name,
                "relationships require a single-property primary key on the principal",
            )
        })?;

        let foreign_key = match &config.foreign_key {
            Some(property) => {
                if dependent.find_property(property).is_none() {
                    return Err(Error::configuration(
                        &dependent.name,
                        format!("foreign key property '{property}' does not exist"),
                    ));
                }
                property.clone()
            }
            None => self
                .discover_foreign_key(
                    dependent,
                    principal,
                    dependent_navigation,
                    &principal_key.name,
                )
                .ok_or_else(|| {
                    Error::configuration(
                        &dependent.name,
                        format!(
                            "no foreign key property resolves the relationship to '{}'",
                            principal.name
                        ),
                    )
                })?,
        };

        let dependent_entity = &mut entities[dependent_index];
        let dependent_table = dependent_entity.table_name.clone();
        let in_key = dependent_entity.primary_key.contains(&foreign_key);
        let property = dependent_entity
            .properties
            .iter_mut()
            .find(|p| p.name == foreign_key)
            .ok_or_else(|| {
                Error::configuration(
                    &dependent.name,
                    format!("foreign key property '{foreign_key}' does not exist"),
                )
            })?;

        if property.property_type != principal_key.property_type {
            return Err(Error::configuration(
                &dependent.name,
                format!(
                    "foreign key '{}' is {:?} but the key of '{}' is {:?}",
                    foreign_key, property.property_type, principal.name, principal_key.property_type
                ),
            ));
        }

        let required = config.required.unwrap_or(!property.nullable);
        if !required && in_key {
            return Err(Error::configuration(
                &dependent.name,
                format!(
                    "foreign key '{foreign_key}' is part of the primary key \
                     and cannot be optional"
                ),
            ));
        }
        property.nullable = !required;

        let cascade_by_default = self.conventions.is_enabled(Convention::CascadeDelete);
        let on_delete = config.on_delete.unwrap_or(match (required, cascade_by_default) {
            (true, true) => ReferentialAction::Cascade,
            (true, false) => ReferentialAction::Restrict,
            (false, _) => ReferentialAction::SetNull,
        });
        if required && on_delete == ReferentialAction::SetNull {
            return Err(Error::configuration(
                &dependent.name,
                format!("required foreign key '{foreign_key}' cannot be set to null on delete"),
            ));
        }

        let foreign_key_column = property.column_name.clone();
        let constraint_name =
            self.naming
                .foreign_key_name(&dependent_table, &principal_table, &foreign_key_column);

        debug!(
            principal = %principal.name,
            dependent = %dependent.name,
            foreign_key = %foreign_key,
            required,
            on_delete = %on_delete,
            "resolved relationship"
        );

        Ok(Relationship {
            principal: principal.name.clone(),
            dependent: dependent.name.clone(),
            foreign_key,
            foreign_key_column,
            principal_key_column: principal_key.column_name,
            on_delete,
            required,
            principal_navigation,
            dependent_navigation: dependent_navigation.map(str::to_string),
            constraint_name,
        })
    }

    fn discover_foreign_key(
        &self,
        dependent: &EntityDescriptor,
        principal: &EntityDescriptor,
        navigation: Option<&str>,
        principal_key: &str,
    ) -> Option<String> {
        if !self.conventions.is_enabled(Convention::ForeignKeyDiscovery) {
            return None;
        }

        let mut candidates = Vec::new();
        if let Some(navigation) = navigation {
            candidates.push(format!("{navigation}Id"));
            candidates.push(format!("{navigation}{principal_key}"));
        }
        candidates.push(format!("{}Id", principal.name));
        candidates.push(format!("{}{}", principal.name, principal_key));

        candidates.iter().find_map(|candidate| {
            dependent
                .properties
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(candidate))
                .map(|p| p.name.clone())
        })
    }

    fn add_foreign_key_indexes(&self, relationships: &[Relationship], entities: &mut [Entity]) {
        for relationship in relationships {
            let Some(entity) = entities.iter_mut().find(|e| e.name == relationship.dependent)
            else {
                continue;
            };

            let leading_key_column = entity
                .primary_key
                .first()
                .and_then(|k| entity.property(k))
                .map(|p| p.column_name.clone());
            if leading_key_column.as_deref() == Some(relationship.foreign_key_column.as_str()) {
                continue;
            }

            let columns = vec![relationship.foreign_key_column.clone()];
            if entity.indexes.iter().any(|ix| ix.columns == columns) {
                continue;
            }

            let name = self.naming.index_name(&entity.table_name, &columns);
            debug!(table = %entity.table_name, index = %name, "adding foreign key index");
            entity.indexes.push(Index {
                name,
                columns,
                unique: false,
            });
        }
    }
}

/// Combines the configuration of both navigations of one relationship;
/// values on the dependent side win.
fn layer(
    principal_side: Option<&RelationshipConfig>,
    dependent_side: Option<&RelationshipConfig>,
) -> RelationshipConfig {
    let mut merged = principal_side.cloned().unwrap_or_default();
    if let Some(dependent_side) = dependent_side {
        if dependent_side.foreign_key.is_some() {
            merged.foreign_key = dependent_side.foreign_key.clone();
        }
        if dependent_side.required.is_some() {
            merged.required = dependent_side.required;
        }
        if dependent_side.on_delete.is_some() {
            merged.on_delete = dependent_side.on_delete;
        }
    }
    merged
}

fn push_unique(relationships: &mut Vec<Relationship>, relationship: Relationship) -> Result<()> {
    let duplicate = relationships.iter().any(|r| {
        r.principal == relationship.principal
            && r.dependent == relationship.dependent
            && r.foreign_key == relationship.foreign_key
    });
    if duplicate {
        return Err(Error::configuration(
            &relationship.dependent,
            format!(
                "foreign key '{}' is used by more than one relationship to '{}'",
                relationship.foreign_key, relationship.principal
            ),
        ));
    }
    relationships.push(relationship);
    Ok(())
}
