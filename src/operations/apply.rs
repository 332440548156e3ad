use tracing::warn;

use super::MigrationOp;
use crate::api::{Error, Result};
use crate::model::{Schema, Table};

impl Schema {
    /// Applies a single operation to the snapshot.
    ///
    /// Fails when the operation targets something that does not exist or
    /// creates something that already does. Dropping an absent foreign key
    /// is a no-op, matching a generator that never materialized it.
    pub fn apply(&mut self, op: &MigrationOp) -> Result<()> {
        match op {
            MigrationOp::CreateTable(table) => {
                if self.tables.contains_key(&table.name) {
                    return Err(Error::snapshot(format!(
                        "table '{}' already exists",
                        table.name
                    )));
                }
                self.tables.insert(table.name.clone(), table.clone());
            }

            MigrationOp::DropTable { name } => {
                if self.tables.remove(name).is_none() {
                    return Err(Error::snapshot(format!("table '{name}' does not exist")));
                }
            }

            MigrationOp::AddColumn {
                table,
                column,
                position,
            } => {
                let target = table_mut(self, table)?;
                if target.column(&column.name).is_some() {
                    return Err(Error::snapshot(format!(
                        "column '{table}.{}' already exists",
                        column.name
                    )));
                }
                insert_at(&mut target.columns, *position, column.clone());
            }

            MigrationOp::DropColumn { table, column } => {
                let target = table_mut(self, table)?;
                let position = target
                    .columns
                    .iter()
                    .position(|c| &c.name == column)
                    .ok_or_else(|| {
                        Error::snapshot(format!("column '{table}.{column}' does not exist"))
                    })?;
                target.columns.remove(position);
            }

            MigrationOp::AddForeignKey {
                table,
                foreign_key,
                position,
            } => {
                let target = table_mut(self, table)?;
                if target.foreign_key(&foreign_key.name).is_some() {
                    return Err(Error::snapshot(format!(
                        "foreign key '{}' already exists on '{table}'",
                        foreign_key.name
                    )));
                }
                insert_at(&mut target.foreign_keys, *position, foreign_key.clone());
            }

            MigrationOp::DropForeignKey { table, name } => {
                let target = table_mut(self, table)?;
                match target.foreign_keys.iter().position(|fk| &fk.name == name) {
                    Some(position) => {
                        target.foreign_keys.remove(position);
                    }
                    None => {
                        warn!(table = %table, foreign_key = %name, "dropping absent foreign key")
                    }
                }
            }

            MigrationOp::CreateIndex {
                table,
                index,
                position,
            } => {
                let target = table_mut(self, table)?;
                if target.index(&index.name).is_some() {
                    return Err(Error::snapshot(format!(
                        "index '{}' already exists on '{table}'",
                        index.name
                    )));
                }
                insert_at(&mut target.indexes, *position, index.clone());
            }

            MigrationOp::DropIndex { table, name } => {
                let target = table_mut(self, table)?;
                let position = target
                    .indexes
                    .iter()
                    .position(|ix| &ix.name == name)
                    .ok_or_else(|| {
                        Error::snapshot(format!("index '{name}' does not exist on '{table}'"))
                    })?;
                target.indexes.remove(position);
            }
        }

        Ok(())
    }

    /// Applies operations in order, returning the resulting snapshot.
    pub fn applied(&self, ops: &[MigrationOp]) -> Result<Schema> {
        let mut schema = self.clone();
        for op in ops {
            schema.apply(op)?;
        }
        Ok(schema)
    }
}

/// Inserts at `position`, clamped to the list length; `None` appends.
fn insert_at<T>(items: &mut Vec<T>, position: Option<usize>, item: T) {
    let at = position.map_or(items.len(), |p| p.min(items.len()));
    items.insert(at, item);
}

fn table_mut<'a>(schema: &'a mut Schema, name: &str) -> Result<&'a mut Table> {
    schema
        .tables
        .get_mut(name)
        .ok_or_else(|| Error::snapshot(format!("table '{name}' does not exist")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, ColumnType};

    fn text_column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            column_type: ColumnType::Text,
            nullable: false,
            max_length: None,
            auto_increment: false,
        }
    }

    fn schema_with_comment() -> Schema {
        let mut schema = Schema::new();
        schema
            .apply(&MigrationOp::CreateTable(Table::new("comment")))
            .unwrap();
        schema
    }

    #[test]
    fn create_table_twice_fails() {
        let mut schema = schema_with_comment();
        let result = schema.apply(&MigrationOp::CreateTable(Table::new("comment")));
        assert!(matches!(result, Err(Error::Snapshot { .. })));
    }

    #[test]
    fn add_then_drop_column() {
        let mut schema = schema_with_comment();
        schema
            .apply(&MigrationOp::add_column("comment", text_column("message")))
            .unwrap();
        assert!(schema.table("comment").unwrap().column("message").is_some());

        schema
            .apply(&MigrationOp::DropColumn {
                table: "comment".to_string(),
                column: "message".to_string(),
            })
            .unwrap();
        assert!(schema.table("comment").unwrap().columns.is_empty());
    }

    #[test]
    fn drop_absent_foreign_key_is_noop() {
        let mut schema = schema_with_comment();
        let before = schema.clone();
        schema
            .apply(&MigrationOp::DropForeignKey {
                table: "comment".to_string(),
                name: "fk_never_created".to_string(),
            })
            .unwrap();
        assert_eq!(schema, before);
    }

    #[test]
    fn index_on_missing_table_fails() {
        let mut schema = Schema::new();
        let result = schema.apply(&MigrationOp::create_index("ix", "comment", &["a"]));
        assert!(matches!(result, Err(Error::Snapshot { .. })));
    }

    #[test]
    fn positioned_add_column_inserts_in_place() {
        let mut schema = schema_with_comment();
        for name in ["id", "message"] {
            schema
                .apply(&MigrationOp::add_column("comment", text_column(name)))
                .unwrap();
        }

        schema
            .apply(&MigrationOp::AddColumn {
                table: "comment".to_string(),
                column: text_column("article_id"),
                position: Some(1),
            })
            .unwrap();
        schema
            .apply(&MigrationOp::AddColumn {
                table: "comment".to_string(),
                column: text_column("created_at"),
                position: Some(99),
            })
            .unwrap();

        let names: Vec<_> = schema
            .table("comment")
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "article_id", "message", "created_at"]);
    }
}
