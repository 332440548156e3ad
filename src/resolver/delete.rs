use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace};

use super::{RelationshipResolver, Row, Value};
use crate::api::{Error, Result};
use crate::model::ReferentialAction;
use crate::sqlgen::{quote_ident, Dialect, SqlCommand};

/// In-memory rows per physical table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowStore {
    tables: BTreeMap<String, Vec<Row>>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, row: Row) {
        self.tables.entry(table.into()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Rows of `table` whose `column` equals `value`.
    pub fn matching<'a>(
        &'a self,
        table: &str,
        column: &'a str,
        value: &'a Value,
    ) -> impl Iterator<Item = &'a Row> {
        self.rows(table)
            .iter()
            .filter(move |row| row.get(column) == Some(value))
    }
}

/// One statement of a delete plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DeleteStep {
    /// `DELETE FROM table WHERE key_column = key`
    Delete {
        table: String,
        key_column: String,
        key: Value,
    },
    /// `UPDATE table SET column = NULL WHERE column = value`
    Nullify {
        table: String,
        column: String,
        value: Value,
    },
}

impl DeleteStep {
    /// Executes this step against `store`, returning the rows affected.
    pub fn apply(&self, store: &mut RowStore) -> usize {
        match self {
            DeleteStep::Delete {
                table,
                key_column,
                key,
            } => match store.tables.get_mut(table) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|row| row.get(key_column) != Some(key));
                    before - rows.len()
                }
                None => 0,
            },
            DeleteStep::Nullify {
                table,
                column,
                value,
            } => {
                let mut affected = 0;
                if let Some(rows) = store.tables.get_mut(table) {
                    for row in rows.iter_mut().filter(|r| r.get(column) == Some(value)) {
                        row.insert(column.clone(), Value::Null);
                        affected += 1;
                    }
                }
                affected
            }
        }
    }
}

/// Ordered steps that remove a principal row together with its
/// dependents. Every dependent is deleted or detached before the row it
/// references, so no intermediate state leaves a dangling reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeletePlan {
    steps: Vec<DeleteStep>,
}

impl DeletePlan {
    pub fn steps(&self) -> &[DeleteStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Executes the steps against `store`, returning the number of rows
    /// deleted or updated.
    pub fn apply(&self, store: &mut RowStore) -> usize {
        self.steps.iter().map(|step| step.apply(store)).sum()
    }

    /// Parameterized statements for the execution collaborator.
    pub fn to_commands(&self, dialect: Dialect) -> Vec<SqlCommand> {
        self.steps
            .iter()
            .map(|step| match step {
                DeleteStep::Delete {
                    table,
                    key_column,
                    key,
                } => SqlCommand::with_parameters(
                    format!(
                        "DELETE FROM {} WHERE {} = {};",
                        quote_ident(dialect, table),
                        quote_ident(dialect, key_column),
                        dialect.placeholder(1)
                    ),
                    vec![key.clone()],
                ),
                DeleteStep::Nullify {
                    table,
                    column,
                    value,
                } => SqlCommand::with_parameters(
                    format!(
                        "UPDATE {} SET {} = NULL WHERE {} = {};",
                        quote_ident(dialect, table),
                        quote_ident(dialect, column),
                        quote_ident(dialect, column),
                        dialect.placeholder(1)
                    ),
                    vec![value.clone()],
                ),
            })
            .collect()
    }
}

impl RelationshipResolver<'_> {
    /// Plans the deletion of the `entity` row whose key is `key`.
    ///
    /// Walks every relationship in which the entity is the principal:
    /// cascading dependents are planned for deletion first (recursively),
    /// set-null dependents are detached first, and any restricting
    /// dependent fails the whole plan.
    pub fn plan_delete(&self, entity: &str, key: &Value, store: &RowStore) -> Result<DeletePlan> {
        let mut plan = DeletePlan::default();
        let mut visited = HashSet::new();

        self.collect_deletes(entity, key, store, &mut plan, &mut visited)?;

        debug!(entity, key = %key, steps = plan.steps.len(), "planned delete");
        Ok(plan)
    }

    fn collect_deletes(
        &self,
        entity_name: &str,
        key: &Value,
        store: &RowStore,
        plan: &mut DeletePlan,
        visited: &mut HashSet<(String, Value)>,
    ) -> Result<()> {
        if !visited.insert((entity_name.to_string(), key.clone())) {
            return Ok(());
        }

        let model = self.model();
        let entity = model
            .entity(entity_name)
            .ok_or_else(|| Error::configuration(entity_name, "entity is not in the model"))?;
        let key_column = entity.key_column().ok_or_else(|| {
            Error::configuration(entity_name, "deletes require a single-property primary key")
        })?;

        for relationship in model.dependents_of(entity_name) {
            let dependent = model.entity(&relationship.dependent).ok_or_else(|| {
                Error::configuration(&relationship.dependent, "entity is not in the model")
            })?;

            let rows: Vec<&Row> = store
                .matching(&dependent.table_name, &relationship.foreign_key_column, key)
                .collect();
            if rows.is_empty() {
                continue;
            }

            match relationship.on_delete {
                ReferentialAction::Restrict => {
                    return Err(Error::DeleteRestricted {
                        principal: entity.table_name.clone(),
                        dependent: dependent.table_name.clone(),
                        count: rows.len(),
                    });
                }
                ReferentialAction::SetNull => {
                    trace!(
                        table = %dependent.table_name,
                        rows = rows.len(),
                        "detaching dependents"
                    );
                    plan.steps.push(DeleteStep::Nullify {
                        table: dependent.table_name.clone(),
                        column: relationship.foreign_key_column.clone(),
                        value: key.clone(),
                    });
                }
                ReferentialAction::Cascade => {
                    let dependent_key = dependent.key_column().ok_or_else(|| {
                        Error::configuration(
                            &dependent.name,
                            "cascading deletes require a single-property primary key",
                        )
                    })?;
                    for row in rows {
                        let dependent_value = row
                            .get(dependent_key)
                            .filter(|v| !v.is_null())
                            .ok_or_else(|| Error::MissingKey {
                                entity: dependent.name.clone(),
                                column: dependent_key.to_string(),
                            })?;
                        self.collect_deletes(
                            &dependent.name,
                            dependent_value,
                            store,
                            plan,
                            visited,
                        )?;
                    }
                }
            }
        }

        trace!(table = %entity.table_name, key = %key, "deleting row");
        plan.steps.push(DeleteStep::Delete {
            table: entity.table_name.clone(),
            key_column: key_column.to_string(),
            key: key.clone(),
        });

        Ok(())
    }
}
