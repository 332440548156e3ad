//! Runtime side of relationships: attaching dependents to principals,
//! stitching flat rows into object trees and flattening them back, and
//! planning cascade deletes.
//!
//! Everything here works from the logical model only, so behaviour is the
//! same whether or not the database carries the foreign key constraints.

mod delete;
mod insert;
mod value;

pub use delete::{DeletePlan, DeleteStep, RowStore};
pub use insert::{InsertPlan, InsertStep};
pub use value::{Row, Value};

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::api::{Error, Result};
use crate::entity::{EntityModel, Relationship};

/// A materialized entity: its row values and the dependents collected
/// under each navigation. Dependents are owned by their principal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    pub entity: String,
    pub values: Row,
    pub collections: BTreeMap<String, Vec<Instance>>,
}

impl Instance {
    pub fn new(entity: impl Into<String>, values: Row) -> Self {
        Self {
            entity: entity.into(),
            values,
            collections: BTreeMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn collection(&self, navigation: &str) -> &[Instance] {
        self.collections
            .get(navigation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A dependent row whose foreign key matches no loaded principal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Orphaned row in '{dependent_table}': {foreign_key_column} = {foreign_key} matches no principal")]
pub struct OrphanedDependent {
    pub dependent_table: String,
    pub foreign_key_column: String,
    pub foreign_key: Value,
    pub row: Row,
}

/// Outcome of [`RelationshipResolver::materialize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Materialized {
    /// Principals in input order, dependents attached in input order.
    pub principals: Vec<Instance>,
    pub orphans: Vec<OrphanedDependent>,
    /// Rows of an optional relationship whose foreign key is null.
    pub unattached: Vec<Row>,
}

impl Materialized {
    /// Fails on the first orphan instead of reporting them.
    pub fn into_result(self) -> Result<Vec<Instance>> {
        match self.orphans.into_iter().next() {
            Some(orphan) => Err(orphan.into()),
            None => Ok(self.principals),
        }
    }
}

pub struct RelationshipResolver<'m> {
    model: &'m EntityModel,
}

impl<'m> RelationshipResolver<'m> {
    pub fn new(model: &'m EntityModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'m EntityModel {
        self.model
    }

    /// Relationship behind the collection navigation `navigation` of `entity`.
    pub fn relationship(&self, entity: &str, navigation: &str) -> Result<&'m Relationship> {
        self.model
            .dependents_of(entity)
            .find(|r| r.collection_name() == navigation)
            .ok_or_else(|| {
                Error::configuration(
                    entity,
                    format!("'{navigation}' is not a collection navigation"),
                )
            })
    }

    /// Adds `dependents` to the collection `navigation` of `principal`,
    /// setting each dependent's foreign key to the principal's key.
    pub fn attach(
        &self,
        principal: &mut Instance,
        navigation: &str,
        dependents: Vec<Instance>,
    ) -> Result<()> {
        let relationship = self.relationship(&principal.entity, navigation)?;

        let key = principal
            .get(&relationship.principal_key_column)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| Error::MissingKey {
                entity: principal.entity.clone(),
                column: relationship.principal_key_column.clone(),
            })?;

        let collection = principal
            .collections
            .entry(relationship.collection_name().to_string())
            .or_default();

        for mut dependent in dependents {
            if dependent.entity != relationship.dependent {
                return Err(Error::configuration(
                    &dependent.entity,
                    format!(
                        "cannot attach to '{}.{navigation}', which holds '{}'",
                        relationship.principal, relationship.dependent
                    ),
                ));
            }
            dependent
                .values
                .insert(relationship.foreign_key_column.clone(), key.clone());
            collection.push(dependent);
        }

        Ok(())
    }

    /// Groups flat dependent rows under their principals.
    ///
    /// Principal and dependent order follow the input. A dependent whose
    /// foreign key names a principal that is not in `principals` becomes an
    /// orphan; the rest of the rows are still materialized. Two principal
    /// rows with the same key fail the call.
    pub fn materialize(
        &self,
        relationship: &Relationship,
        principals: Vec<Row>,
        dependents: Vec<Row>,
    ) -> Result<Materialized> {
        let dependent_table = self
            .model
            .entity(&relationship.dependent)
            .map(|e| e.table_name.clone())
            .ok_or_else(|| {
                Error::configuration(&relationship.dependent, "entity is not in the model")
            })?;
        let navigation = relationship.collection_name().to_string();

        let mut instances = Vec::with_capacity(principals.len());
        let mut positions: HashMap<Value, usize> = HashMap::with_capacity(principals.len());

        for row in principals {
            let key = row
                .get(&relationship.principal_key_column)
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| Error::MissingKey {
                    entity: relationship.principal.clone(),
                    column: relationship.principal_key_column.clone(),
                })?;
            if positions.contains_key(&key) {
                return Err(Error::DuplicateKey {
                    entity: relationship.principal.clone(),
                    column: relationship.principal_key_column.clone(),
                    key: key.to_string(),
                });
            }
            positions.insert(key, instances.len());

            let mut instance = Instance::new(&relationship.principal, row);
            instance.collections.insert(navigation.clone(), Vec::new());
            instances.push(instance);
        }

        let mut orphans = Vec::new();
        let mut unattached = Vec::new();

        for row in dependents {
            let foreign_key = row
                .get(&relationship.foreign_key_column)
                .cloned()
                .unwrap_or_default();

            if foreign_key.is_null() && !relationship.required {
                unattached.push(row);
                continue;
            }

            match positions.get(&foreign_key) {
                Some(&position) => instances[position]
                    .collections
                    .entry(navigation.clone())
                    .or_default()
                    .push(Instance::new(&relationship.dependent, row)),
                None => {
                    warn!(
                        table = %dependent_table,
                        column = %relationship.foreign_key_column,
                        foreign_key = %foreign_key,
                        "orphaned dependent row"
                    );
                    orphans.push(OrphanedDependent {
                        dependent_table: dependent_table.clone(),
                        foreign_key_column: relationship.foreign_key_column.clone(),
                        foreign_key,
                        row,
                    });
                }
            }
        }

        debug!(
            principal = %relationship.principal,
            dependent = %relationship.dependent,
            principals = instances.len(),
            orphans = orphans.len(),
            unattached = unattached.len(),
            "materialized relationship"
        );

        Ok(Materialized {
            principals: instances,
            orphans,
            unattached,
        })
    }
}
