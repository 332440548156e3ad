use serde::Serialize;
use tracing::{debug, trace};

use super::{Instance, RelationshipResolver, Row, RowStore, Value};
use crate::api::{Error, Result};
use crate::sqlgen::{quote_ident, Dialect, SqlCommand};

/// One row of an insert plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertStep {
    pub table: String,
    pub row: Row,
}

/// Rows flattened out of an instance tree, each principal ahead of the
/// dependents that reference it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsertPlan {
    steps: Vec<InsertStep>,
}

impl InsertPlan {
    pub fn steps(&self) -> &[InsertStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_rows(self) -> Vec<(String, Row)> {
        self.steps
            .into_iter()
            .map(|step| (step.table, step.row))
            .collect()
    }

    /// Inserts every row into `store`, returning the number of rows added.
    pub fn apply(&self, store: &mut RowStore) -> usize {
        for step in &self.steps {
            store.insert(step.table.clone(), step.row.clone());
        }
        self.steps.len()
    }

    /// Parameterized INSERT statements, columns in name order.
    pub fn to_commands(&self, dialect: Dialect) -> Vec<SqlCommand> {
        self.steps
            .iter()
            .map(|step| {
                let table = quote_ident(dialect, &step.table);
                if step.row.is_empty() {
                    return SqlCommand::new(match dialect {
                        Dialect::MySql => format!("INSERT INTO {table} () VALUES ();"),
                        Dialect::Postgres | Dialect::Sqlite => {
                            format!("INSERT INTO {table} DEFAULT VALUES;")
                        }
                    });
                }

                let columns: Vec<String> =
                    step.row.keys().map(|c| quote_ident(dialect, c)).collect();
                let placeholders: Vec<String> =
                    (1..=step.row.len()).map(|i| dialect.placeholder(i)).collect();

                SqlCommand::with_parameters(
                    format!(
                        "INSERT INTO {table} ({}) VALUES ({});",
                        columns.join(", "),
                        placeholders.join(", ")
                    ),
                    step.row.values().cloned().collect(),
                )
            })
            .collect()
    }
}

impl RelationshipResolver<'_> {
    /// Flattens `root` and everything collected under it into `(table, row)`
    /// pairs, principals first, with each dependent's foreign key set to its
    /// principal's key.
    pub fn dematerialize(&self, root: &Instance) -> Result<Vec<(String, Row)>> {
        Ok(self.plan_insert(root)?.into_rows())
    }

    /// Same as [`dematerialize`](Self::dematerialize), kept as a plan that can
    /// be applied to a [`RowStore`] or turned into INSERT commands.
    ///
    /// Keys are taken from the instances as they are; a principal with
    /// dependents must already carry its key.
    pub fn plan_insert(&self, root: &Instance) -> Result<InsertPlan> {
        let mut plan = InsertPlan::default();
        self.collect_inserts(root, None, &mut plan)?;

        debug!(entity = %root.entity, rows = plan.steps.len(), "planned insert");
        Ok(plan)
    }

    fn collect_inserts(
        &self,
        instance: &Instance,
        foreign_key: Option<(&str, &Value)>,
        plan: &mut InsertPlan,
    ) -> Result<()> {
        let entity = self.model().entity(&instance.entity).ok_or_else(|| {
            Error::configuration(&instance.entity, "entity is not in the model")
        })?;

        let mut row = instance.values.clone();
        if let Some((column, key)) = foreign_key {
            row.insert(column.to_string(), key.clone());
        }

        trace!(table = %entity.table_name, "inserting row");
        let position = plan.steps.len();
        plan.steps.push(InsertStep {
            table: entity.table_name.clone(),
            row,
        });

        for (navigation, dependents) in &instance.collections {
            let relationship = self.relationship(&instance.entity, navigation)?;
            if dependents.is_empty() {
                continue;
            }

            let key = plan.steps[position]
                .row
                .get(&relationship.principal_key_column)
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| Error::MissingKey {
                    entity: instance.entity.clone(),
                    column: relationship.principal_key_column.clone(),
                })?;

            for dependent in dependents {
                if dependent.entity != relationship.dependent {
                    return Err(Error::configuration(
                        &dependent.entity,
                        format!(
                            "found under '{}.{navigation}', which holds '{}'",
                            relationship.principal, relationship.dependent
                        ),
                    ));
                }
                self.collect_inserts(
                    dependent,
                    Some((relationship.foreign_key_column.as_str(), &key)),
                    plan,
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityDescriptor, EntityModel, ModelBuilder, PropertyType};
    use crate::row;

    fn model() -> EntityModel {
        ModelBuilder::new()
            .entity(
                EntityDescriptor::new("Article")
                    .property("Id", PropertyType::Int64)
                    .property("Title", PropertyType::String)
                    .collection("Comments", "Comment"),
            )
            .entity(
                EntityDescriptor::new("Comment")
                    .property("Id", PropertyType::Int64)
                    .property("Message", PropertyType::String)
                    .property("ArticleId", PropertyType::Int64)
                    .reference("Article", "Article")
                    .collection("Replies", "Reply"),
            )
            .entity(
                EntityDescriptor::new("Reply")
                    .property("Id", PropertyType::Int64)
                    .property("CommentId", PropertyType::Int64),
            )
            .build()
            .unwrap()
    }

    fn article_with_comments() -> Instance {
        let mut comment = Instance::new("Comment", row! { "id" => 11, "message" => "m11" });
        comment.collections.insert(
            "Replies".to_string(),
            vec![Instance::new("Reply", row! { "id" => 101 })],
        );

        let mut article = Instance::new("Article", row! { "id" => 1, "title" => "t1" });
        article.collections.insert(
            "Comments".to_string(),
            vec![
                comment,
                Instance::new("Comment", row! { "id" => 12, "message" => "m12" }),
            ],
        );
        article
    }

    #[test]
    fn principals_come_before_dependents() {
        let model = model();
        let resolver = RelationshipResolver::new(&model);

        let rows = resolver.dematerialize(&article_with_comments()).unwrap();

        let order: Vec<_> = rows
            .iter()
            .map(|(table, row)| format!("{table}:{}", row["id"]))
            .collect();
        assert_eq!(order, vec!["article:1", "comment:11", "reply:101", "comment:12"]);
        assert_eq!(rows[1].1["article_id"], Value::Int(1));
        assert_eq!(rows[2].1["comment_id"], Value::Int(11));
        assert_eq!(rows[3].1["article_id"], Value::Int(1));
    }

    #[test]
    fn flattened_rows_materialize_back_into_the_same_tree() {
        let model = model();
        let resolver = RelationshipResolver::new(&model);
        let mut article = Instance::new("Article", row! { "id" => 1, "title" => "t1" });
        resolver
            .attach(
                &mut article,
                "Comments",
                vec![
                    Instance::new("Comment", row! { "id" => 11, "message" => "m11" }),
                    Instance::new("Comment", row! { "id" => 12, "message" => "m12" }),
                ],
            )
            .unwrap();

        let mut store = RowStore::new();
        assert_eq!(resolver.plan_insert(&article).unwrap().apply(&mut store), 3);

        let relationship = resolver.relationship("Article", "Comments").unwrap();
        let materialized = resolver
            .materialize(
                relationship,
                store.rows("article").to_vec(),
                store.rows("comment").to_vec(),
            )
            .unwrap();

        assert_eq!(materialized.into_result().unwrap(), vec![article]);
    }

    #[test]
    fn principal_without_key_cannot_carry_dependents() {
        let model = model();
        let resolver = RelationshipResolver::new(&model);
        let mut article = Instance::new("Article", row! { "title" => "t1" });
        article.collections.insert(
            "Comments".to_string(),
            vec![Instance::new("Comment", row! { "message" => "m11" })],
        );

        assert!(matches!(
            resolver.dematerialize(&article),
            Err(Error::MissingKey { .. })
        ));

        article.collections.insert("Comments".to_string(), Vec::new());
        assert_eq!(resolver.dematerialize(&article).unwrap().len(), 1);
    }

    #[test]
    fn wrong_entity_in_collection_fails() {
        let model = model();
        let resolver = RelationshipResolver::new(&model);
        let mut article = Instance::new("Article", row! { "id" => 1 });
        article.collections.insert(
            "Comments".to_string(),
            vec![Instance::new("Reply", row! { "id" => 101 })],
        );

        assert!(matches!(
            resolver.plan_insert(&article),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn insert_commands_bind_values_in_column_order() {
        let model = model();
        let resolver = RelationshipResolver::new(&model);
        let plan = resolver.plan_insert(&article_with_comments()).unwrap();

        let commands = plan.to_commands(Dialect::Postgres);

        assert_eq!(
            commands[0].sql,
            "INSERT INTO \"article\" (\"id\", \"title\") VALUES ($1, $2);"
        );
        assert_eq!(commands[0].parameters, vec![Value::Int(1), Value::from("t1")]);
        assert_eq!(
            commands[1].sql,
            "INSERT INTO \"comment\" (\"article_id\", \"id\", \"message\") VALUES ($1, $2, $3);"
        );

        let empty = InsertPlan {
            steps: vec![InsertStep {
                table: "reply".to_string(),
                row: Row::new(),
            }],
        };
        assert_eq!(
            empty.to_commands(Dialect::MySql)[0].sql,
            "INSERT INTO `reply` () VALUES ();"
        );
    }
}
