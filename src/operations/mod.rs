pub mod apply;
pub mod planner;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::{Error, Result};
use crate::model::{Column, ForeignKey, Index, Schema, Table};

/// One step of a schema delta. Operations are plain data; generation and
/// snapshot application only ever read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MigrationOp {
    CreateTable(Table),
    DropTable {
        name: String,
    },
    /// `position` places the column in the snapshot's column list; `None`
    /// appends. Inverses of drops carry the dropped object's position.
    AddColumn {
        table: String,
        column: Column,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    DropColumn {
        table: String,
        column: String,
    },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    DropForeignKey {
        table: String,
        name: String,
    },
    CreateIndex {
        table: String,
        index: Index,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    DropIndex {
        table: String,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    CreateTable,
    DropTable,
    AddColumn,
    DropColumn,
    AddForeignKey,
    DropForeignKey,
    CreateIndex,
    DropIndex,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::CreateTable => "CreateTable",
            OperationKind::DropTable => "DropTable",
            OperationKind::AddColumn => "AddColumn",
            OperationKind::DropColumn => "DropColumn",
            OperationKind::AddForeignKey => "AddForeignKey",
            OperationKind::DropForeignKey => "DropForeignKey",
            OperationKind::CreateIndex => "CreateIndex",
            OperationKind::DropIndex => "DropIndex",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "createtable" => Ok(OperationKind::CreateTable),
            "droptable" => Ok(OperationKind::DropTable),
            "addcolumn" => Ok(OperationKind::AddColumn),
            "dropcolumn" => Ok(OperationKind::DropColumn),
            "addforeignkey" => Ok(OperationKind::AddForeignKey),
            "dropforeignkey" => Ok(OperationKind::DropForeignKey),
            "createindex" => Ok(OperationKind::CreateIndex),
            "dropindex" => Ok(OperationKind::DropIndex),
            _ => Err(format!(
                "Invalid operation kind '{s}'. Valid kinds: create-table, drop-table, \
                 add-column, drop-column, add-foreign-key, drop-foreign-key, \
                 create-index, drop-index"
            )),
        }
    }
}

impl MigrationOp {
    pub fn create_index(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: &[&str],
    ) -> Self {
        MigrationOp::CreateIndex {
            table: table.into(),
            index: Index {
                name: name.into(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                unique: false,
            },
            position: None,
        }
    }

    pub fn add_column(table: impl Into<String>, column: Column) -> Self {
        MigrationOp::AddColumn {
            table: table.into(),
            column,
            position: None,
        }
    }

    pub fn add_foreign_key(table: impl Into<String>, foreign_key: ForeignKey) -> Self {
        MigrationOp::AddForeignKey {
            table: table.into(),
            foreign_key,
            position: None,
        }
    }

    pub fn drop_index(name: impl Into<String>, table: impl Into<String>) -> Self {
        MigrationOp::DropIndex {
            table: table.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            MigrationOp::CreateTable(_) => OperationKind::CreateTable,
            MigrationOp::DropTable { .. } => OperationKind::DropTable,
            MigrationOp::AddColumn { .. } => OperationKind::AddColumn,
            MigrationOp::DropColumn { .. } => OperationKind::DropColumn,
            MigrationOp::AddForeignKey { .. } => OperationKind::AddForeignKey,
            MigrationOp::DropForeignKey { .. } => OperationKind::DropForeignKey,
            MigrationOp::CreateIndex { .. } => OperationKind::CreateIndex,
            MigrationOp::DropIndex { .. } => OperationKind::DropIndex,
        }
    }

    /// Name of the table the operation touches.
    pub fn table(&self) -> &str {
        match self {
            MigrationOp::CreateTable(table) => &table.name,
            MigrationOp::DropTable { name } => name,
            MigrationOp::AddColumn { table, .. }
            | MigrationOp::DropColumn { table, .. }
            | MigrationOp::AddForeignKey { table, .. }
            | MigrationOp::DropForeignKey { table, .. }
            | MigrationOp::CreateIndex { table, .. }
            | MigrationOp::DropIndex { table, .. } => table,
        }
    }

    /// Computes the operation that undoes `self` when applied to the snapshot
    /// `self` produced from `before`.
    ///
    /// Drops recover the dropped object, and its position among its
    /// siblings, from `before`. Returns `None` for a
    /// `DropForeignKey` whose constraint is absent, since applying it is a no-op.
    pub fn inverse(&self, before: &Schema) -> Result<Option<MigrationOp>> {
        let inverse = match self {
            MigrationOp::CreateTable(table) => MigrationOp::DropTable {
                name: table.name.clone(),
            },
            MigrationOp::DropTable { name } => {
                MigrationOp::CreateTable(require_table(before, name)?.clone())
            }
            MigrationOp::AddColumn { table, column, .. } => MigrationOp::DropColumn {
                table: table.clone(),
                column: column.name.clone(),
            },
            MigrationOp::DropColumn { table, column } => {
                let columns = &require_table(before, table)?.columns;
                let position = columns
                    .iter()
                    .position(|c| &c.name == column)
                    .ok_or_else(|| {
                        Error::snapshot(format!("column '{table}.{column}' does not exist"))
                    })?;
                MigrationOp::AddColumn {
                    table: table.clone(),
                    column: columns[position].clone(),
                    position: Some(position),
                }
            }
            MigrationOp::AddForeignKey {
                table, foreign_key, ..
            } => MigrationOp::DropForeignKey {
                table: table.clone(),
                name: foreign_key.name.clone(),
            },
            MigrationOp::DropForeignKey { table, name } => {
                let foreign_keys = &require_table(before, table)?.foreign_keys;
                match foreign_keys.iter().position(|fk| &fk.name == name) {
                    Some(position) => MigrationOp::AddForeignKey {
                        table: table.clone(),
                        foreign_key: foreign_keys[position].clone(),
                        position: Some(position),
                    },
                    None => return Ok(None),
                }
            }
            MigrationOp::CreateIndex { table, index, .. } => MigrationOp::DropIndex {
                table: table.clone(),
                name: index.name.clone(),
            },
            MigrationOp::DropIndex { table, name } => {
                let indexes = &require_table(before, table)?.indexes;
                let position = indexes
                    .iter()
                    .position(|ix| &ix.name == name)
                    .ok_or_else(|| {
                        Error::snapshot(format!("index '{name}' does not exist on '{table}'"))
                    })?;
                MigrationOp::CreateIndex {
                    table: table.clone(),
                    index: indexes[position].clone(),
                    position: Some(position),
                }
            }
        };

        Ok(Some(inverse))
    }
}

fn require_table<'a>(schema: &'a Schema, name: &str) -> Result<&'a Table> {
    schema
        .table(name)
        .ok_or_else(|| Error::snapshot(format!("table '{name}' does not exist")))
}

/// Builds the Down sequence for `up`, starting from `before`.
///
/// Each operation is inverted against the snapshot as it stands just before
/// that operation runs; the inverses are returned in reverse order.
pub fn invert_operations(up: &[MigrationOp], before: &Schema) -> Result<Vec<MigrationOp>> {
    let mut current = before.clone();
    let mut down = Vec::with_capacity(up.len());

    for op in up {
        if let Some(inverse) = op.inverse(&current)? {
            down.push(inverse);
        }
        current.apply(op)?;
    }

    down.reverse();
    Ok(down)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnType;

    fn column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            column_type: ColumnType::BigInt,
            nullable: false,
            max_length: None,
            auto_increment: false,
        }
    }

    fn comment_schema() -> Schema {
        let mut table = Table::new("comment");
        table.columns.push(column("id"));
        table.columns.push(column("article_id"));
        table.columns.push(column("author_id"));
        table.indexes.push(Index {
            name: "ix_comment_article_id".to_string(),
            columns: vec!["article_id".to_string()],
            unique: false,
        });
        table.indexes.push(Index {
            name: "ix_comment_author_id".to_string(),
            columns: vec!["author_id".to_string()],
            unique: false,
        });
        let mut schema = Schema::new();
        schema.tables.insert("comment".to_string(), table);
        schema
    }

    #[test]
    fn drop_index_inverts_to_create_index_with_columns() {
        let op = MigrationOp::drop_index("ix_comment_article_id", "comment");
        let inverse = op.inverse(&comment_schema()).unwrap();
        assert_eq!(
            inverse,
            Some(MigrationOp::CreateIndex {
                table: "comment".to_string(),
                index: Index {
                    name: "ix_comment_article_id".to_string(),
                    columns: vec!["article_id".to_string()],
                    unique: false,
                },
                position: Some(0),
            })
        );
    }

    #[test]
    fn dropped_column_is_restored_in_place() {
        let before = comment_schema();
        let up = vec![MigrationOp::DropColumn {
            table: "comment".to_string(),
            column: "article_id".to_string(),
        }];

        let down = invert_operations(&up, &before).unwrap();
        assert!(matches!(
            down[0],
            MigrationOp::AddColumn { position: Some(1), .. }
        ));

        let after = before.applied(&up).unwrap();
        let restored = after.applied(&down).unwrap();
        let names: Vec<_> = restored
            .table("comment")
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "article_id", "author_id"]);
        assert_eq!(restored, before);
    }

    #[test]
    fn dropped_leading_index_is_restored_first() {
        let before = comment_schema();
        let up = vec![MigrationOp::drop_index("ix_comment_article_id", "comment")];

        let down = invert_operations(&up, &before).unwrap();
        let restored = before.applied(&up).unwrap().applied(&down).unwrap();

        assert_eq!(restored, before);
    }

    #[test]
    fn drop_of_missing_index_fails() {
        let op = MigrationOp::drop_index("ix_missing", "comment");
        assert!(matches!(
            op.inverse(&comment_schema()),
            Err(Error::Snapshot { .. })
        ));
    }

    #[test]
    fn drop_of_missing_foreign_key_has_no_inverse() {
        let op = MigrationOp::DropForeignKey {
            table: "comment".to_string(),
            name: "fk_comment_article_article_id".to_string(),
        };
        assert_eq!(op.inverse(&comment_schema()).unwrap(), None);
    }

    #[test]
    fn kind_matches_variant() {
        let op = MigrationOp::drop_index("ix", "t");
        assert_eq!(op.kind(), OperationKind::DropIndex);
        assert_eq!(op.table(), "t");
        assert_eq!(OperationKind::AddForeignKey.to_string(), "AddForeignKey");
    }

    #[test]
    fn parses_operation_kinds() {
        assert_eq!("AddForeignKey".parse::<OperationKind>(), Ok(OperationKind::AddForeignKey));
        assert_eq!("drop-index".parse::<OperationKind>(), Ok(OperationKind::DropIndex));
        assert_eq!("create_table".parse::<OperationKind>(), Ok(OperationKind::CreateTable));
        assert!("rename_table".parse::<OperationKind>().is_err());
    }

    #[test]
    fn invert_operations_reverses_order() {
        let up = vec![
            MigrationOp::drop_index("ix_comment_article_id", "comment"),
            MigrationOp::create_index("ix_comment_lookup", "comment", &["article_id"]),
        ];
        let down = invert_operations(&up, &comment_schema()).unwrap();
        assert_eq!(down.len(), 2);
        assert_eq!(down[0], MigrationOp::drop_index("ix_comment_lookup", "comment"));
        assert_eq!(down[1].kind(), OperationKind::CreateIndex);
    }
}
