use super::{Dialect, SqlCommand};
use crate::api::{Error, Result};
use crate::model::{Column, ColumnType, ForeignKey, Index, Table};
use crate::operations::MigrationOp;

/// Default DDL for a single operation in `dialect`.
///
/// Replacement handlers may call this to delegate part of their output.
/// Fails with `UnsupportedOperation` when the dialect has no rule for the
/// operation kind.
pub fn default_sql(op: &MigrationOp, dialect: Dialect) -> Result<Vec<SqlCommand>> {
    let statements = match op {
        MigrationOp::CreateTable(table) => Some(generate_create_table(table, dialect)),

        MigrationOp::DropTable { name } => {
            Some(vec![format!("DROP TABLE {};", quote_ident(dialect, name))])
        }

        MigrationOp::AddColumn { table, column, .. } => Some(vec![format!(
            "ALTER TABLE {} ADD COLUMN {};",
            quote_ident(dialect, table),
            format_column(dialect, column)
        )]),

        MigrationOp::DropColumn { table, column } => Some(vec![format!(
            "ALTER TABLE {} DROP COLUMN {};",
            quote_ident(dialect, table),
            quote_ident(dialect, column)
        )]),

        MigrationOp::AddForeignKey {
            table, foreign_key, ..
        } => {
            generate_add_foreign_key(table, foreign_key, dialect).map(|sql| vec![sql])
        }

        MigrationOp::DropForeignKey { table, name } => {
            generate_drop_foreign_key(table, name, dialect).map(|sql| vec![sql])
        }

        MigrationOp::CreateIndex { table, index, .. } => {
            Some(vec![generate_create_index(table, index, dialect)])
        }

        MigrationOp::DropIndex { table, name } => Some(vec![match dialect {
            Dialect::MySql => format!(
                "DROP INDEX {} ON {};",
                quote_ident(dialect, name),
                quote_ident(dialect, table)
            ),
            Dialect::Postgres | Dialect::Sqlite => {
                format!("DROP INDEX {};", quote_ident(dialect, name))
            }
        }]),
    };

    statements
        .map(|sql| sql.into_iter().map(SqlCommand::new).collect::<Vec<_>>())
        .ok_or_else(|| Error::unsupported(op.kind(), dialect))
}

fn generate_create_table(table: &Table, dialect: Dialect) -> Vec<String> {
    let mut statements = Vec::new();

    // SQLite only honours AUTOINCREMENT on an inline INTEGER PRIMARY KEY.
    let inline_key = match (dialect, &table.primary_key) {
        (Dialect::Sqlite, Some(pk)) if pk.columns.len() == 1 => table
            .column(&pk.columns[0])
            .filter(|c| c.auto_increment)
            .map(|c| c.name.clone()),
        _ => None,
    };

    let mut definitions: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let mut sql = format_column(dialect, column);
            if inline_key.as_deref() == Some(column.name.as_str()) {
                sql.push_str(" PRIMARY KEY AUTOINCREMENT");
            }
            sql
        })
        .collect();

    if let Some(ref primary_key) = table.primary_key {
        if inline_key.is_none() {
            definitions.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                quote_ident(dialect, &primary_key.name),
                format_column_list(dialect, &primary_key.columns)
            ));
        }
    }

    for foreign_key in &table.foreign_keys {
        definitions.push(format!(
            "CONSTRAINT {} {}",
            quote_ident(dialect, &foreign_key.name),
            format_foreign_key(dialect, foreign_key)
        ));
    }

    for index in table.indexes.iter().filter(|ix| ix.unique) {
        definitions.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote_ident(dialect, &index.name),
            format_column_list(dialect, &index.columns)
        ));
    }

    statements.push(format!(
        "CREATE TABLE {} (\n    {}\n);",
        quote_ident(dialect, &table.name),
        definitions.join(",\n    ")
    ));

    for index in table.indexes.iter().filter(|ix| !ix.unique) {
        statements.push(generate_create_index(&table.name, index, dialect));
    }

    statements
}

fn generate_create_index(table: &str, index: &Index, dialect: Dialect) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {}INDEX {} ON {} ({});",
        unique,
        quote_ident(dialect, &index.name),
        quote_ident(dialect, table),
        format_column_list(dialect, &index.columns)
    )
}

fn generate_add_foreign_key(
    table: &str,
    foreign_key: &ForeignKey,
    dialect: Dialect,
) -> Option<String> {
    match dialect {
        Dialect::MySql | Dialect::Postgres => Some(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {};",
            quote_ident(dialect, table),
            quote_ident(dialect, &foreign_key.name),
            format_foreign_key(dialect, foreign_key)
        )),
        Dialect::Sqlite => None,
    }
}

fn generate_drop_foreign_key(table: &str, name: &str, dialect: Dialect) -> Option<String> {
    match dialect {
        Dialect::MySql => Some(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {};",
            quote_ident(dialect, table),
            quote_ident(dialect, name)
        )),
        Dialect::Postgres => Some(format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
            quote_ident(dialect, table),
            quote_ident(dialect, name)
        )),
        Dialect::Sqlite => None,
    }
}

fn format_foreign_key(dialect: Dialect, foreign_key: &ForeignKey) -> String {
    format!(
        "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
        quote_ident(dialect, &foreign_key.column),
        quote_ident(dialect, &foreign_key.referenced_table),
        quote_ident(dialect, &foreign_key.referenced_column),
        foreign_key.on_delete
    )
}

pub(crate) fn format_column(dialect: Dialect, column: &Column) -> String {
    let mut parts = vec![quote_ident(dialect, &column.name), format_type(dialect, column)];

    if !column.nullable {
        parts.push("NOT NULL".to_string());
    }

    if column.auto_increment {
        match dialect {
            Dialect::MySql => parts.push("AUTO_INCREMENT".to_string()),
            Dialect::Postgres => parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string()),
            Dialect::Sqlite => {}
        }
    }

    parts.join(" ")
}

fn format_type(dialect: Dialect, column: &Column) -> String {
    match dialect {
        Dialect::MySql => match column.column_type {
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "int".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Boolean => "tinyint(1)".to_string(),
            ColumnType::Double => "double".to_string(),
            ColumnType::Text => match column.max_length {
                Some(len) => format!("varchar({len})"),
                None => "longtext".to_string(),
            },
            ColumnType::Uuid => "char(36)".to_string(),
            ColumnType::Timestamp => "datetime(6)".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Binary => match column.max_length {
                Some(len) => format!("varbinary({len})"),
                None => "longblob".to_string(),
            },
        },
        Dialect::Postgres => match column.column_type {
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Text => match column.max_length {
                Some(len) => format!("varchar({len})"),
                None => "text".to_string(),
            },
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Binary => "bytea".to_string(),
        },
        Dialect::Sqlite => match column.column_type {
            ColumnType::SmallInt
            | ColumnType::Integer
            | ColumnType::BigInt
            | ColumnType::Boolean => "integer".to_string(),
            ColumnType::Double => "real".to_string(),
            ColumnType::Text | ColumnType::Uuid | ColumnType::Timestamp | ColumnType::Date => {
                "text".to_string()
            }
            ColumnType::Binary => "blob".to_string(),
        },
    }
}

fn format_column_list(dialect: Dialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(dialect, c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn quote_ident(dialect: Dialect, identifier: &str) -> String {
    match dialect {
        Dialect::MySql => format!("`{}`", identifier.replace('`', "``")),
        Dialect::Postgres | Dialect::Sqlite => {
            format!("\"{}\"", identifier.replace('"', "\"\""))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PrimaryKey, ReferentialAction};
    use crate::operations::OperationKind;

    fn column(name: &str, column_type: ColumnType) -> Column {
        Column {
            name: name.to_string(),
            column_type,
            nullable: false,
            max_length: None,
            auto_increment: false,
        }
    }

    fn comment_table() -> Table {
        let mut id = column("id", ColumnType::BigInt);
        id.auto_increment = true;
        Table {
            name: "comment".to_string(),
            columns: vec![
                id,
                column("message", ColumnType::Text),
                column("article_id", ColumnType::BigInt),
            ],
            primary_key: Some(PrimaryKey {
                name: "pk_comment".to_string(),
                columns: vec!["id".to_string()],
            }),
            foreign_keys: vec![ForeignKey {
                name: "fk_comment_article_article_id".to_string(),
                column: "article_id".to_string(),
                referenced_table: "article".to_string(),
                referenced_column: "id".to_string(),
                on_delete: ReferentialAction::Cascade,
            }],
            indexes: vec![Index {
                name: "ix_comment_article_id".to_string(),
                columns: vec!["article_id".to_string()],
                unique: false,
            }],
        }
    }

    fn sql(op: &MigrationOp, dialect: Dialect) -> Vec<String> {
        default_sql(op, dialect)
            .unwrap()
            .into_iter()
            .map(|c| c.sql)
            .collect()
    }

    #[test]
    fn mysql_create_table_lists_columns_then_constraints() {
        let statements = sql(&MigrationOp::CreateTable(comment_table()), Dialect::MySql);

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            "CREATE TABLE `comment` (\n    \
             `id` bigint NOT NULL AUTO_INCREMENT,\n    \
             `message` longtext NOT NULL,\n    \
             `article_id` bigint NOT NULL,\n    \
             CONSTRAINT `pk_comment` PRIMARY KEY (`id`),\n    \
             CONSTRAINT `fk_comment_article_article_id` FOREIGN KEY (`article_id`) REFERENCES `article` (`id`) ON DELETE CASCADE\n);"
        );
        assert_eq!(
            statements[1],
            "CREATE INDEX `ix_comment_article_id` ON `comment` (`article_id`);"
        );
    }

    #[test]
    fn postgres_uses_identity_and_double_quotes() {
        let statements = sql(&MigrationOp::CreateTable(comment_table()), Dialect::Postgres);
        assert!(statements[0].contains("\"id\" bigint NOT NULL GENERATED BY DEFAULT AS IDENTITY"));
        assert!(statements[0].contains("\"message\" text NOT NULL"));
    }

    #[test]
    fn sqlite_inlines_autoincrement_key() {
        let statements = sql(&MigrationOp::CreateTable(comment_table()), Dialect::Sqlite);
        assert!(statements[0].contains("\"id\" integer NOT NULL PRIMARY KEY AUTOINCREMENT"));
        assert!(!statements[0].contains("CONSTRAINT \"pk_comment\""));
    }

    #[test]
    fn max_length_selects_varchar() {
        let mut title = column("title", ColumnType::Text);
        title.max_length = Some(255);
        assert_eq!(format_column(Dialect::MySql, &title), "`title` varchar(255) NOT NULL");
    }

    #[test]
    fn unique_indexes_become_table_constraints() {
        let mut table = comment_table();
        table.indexes[0].unique = true;
        let statements = sql(&MigrationOp::CreateTable(table), Dialect::Postgres);
        assert_eq!(statements.len(), 1);
        assert!(statements[0]
            .contains("CONSTRAINT \"ix_comment_article_id\" UNIQUE (\"article_id\")"));
    }

    #[test]
    fn drop_index_syntax_differs_by_dialect() {
        let op = MigrationOp::drop_index("ix_comment_article_id", "comment");
        assert_eq!(
            sql(&op, Dialect::MySql),
            vec!["DROP INDEX `ix_comment_article_id` ON `comment`;"]
        );
        assert_eq!(
            sql(&op, Dialect::Postgres),
            vec!["DROP INDEX \"ix_comment_article_id\";"]
        );
    }

    #[test]
    fn drop_foreign_key_syntax_differs_by_dialect() {
        let op = MigrationOp::DropForeignKey {
            table: "comment".to_string(),
            name: "fk_comment_article_article_id".to_string(),
        };
        assert_eq!(
            sql(&op, Dialect::MySql),
            vec!["ALTER TABLE `comment` DROP FOREIGN KEY `fk_comment_article_article_id`;"]
        );
        assert_eq!(
            sql(&op, Dialect::Postgres),
            vec!["ALTER TABLE \"comment\" DROP CONSTRAINT IF EXISTS \"fk_comment_article_article_id\";"]
        );
    }

    #[test]
    fn sqlite_has_no_foreign_key_alter_rule() {
        let table = comment_table();
        let op = MigrationOp::add_foreign_key("comment", table.foreign_keys[0].clone());
        assert!(matches!(
            default_sql(&op, Dialect::Sqlite),
            Err(Error::UnsupportedOperation {
                kind: OperationKind::AddForeignKey,
                dialect: Dialect::Sqlite
            })
        ));
    }

    #[test]
    fn quotes_embedded_quote_characters() {
        assert_eq!(quote_ident(Dialect::MySql, "a`b"), "`a``b`");
        assert_eq!(quote_ident(Dialect::Postgres, "a\"b"), "\"a\"\"b\"");
    }
}
