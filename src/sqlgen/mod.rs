//! Migration SQL generation.
//!
//! [`MigrationSqlGenerator`] turns operations into dialect-specific commands.
//! Each operation kind is looked up in a handler table fixed at construction:
//! kinds without a handler use [`default_sql`], others may be transformed
//! first, replaced entirely, or suppressed.

mod ddl;

pub use ddl::{default_sql, quote_ident};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

use crate::api::Result;
use crate::migration::{Direction, Migration};
use crate::operations::{MigrationOp, OperationKind};
use crate::resolver::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Positional parameter marker for the `index`-th parameter (1-based).
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(format!(
                "Invalid dialect '{}'. Valid dialects: mysql, postgres, sqlite",
                s
            )),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        };
        write!(f, "{}", s)
    }
}

/// One executable statement with its positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCommand {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Value>,
}

impl SqlCommand {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }
}

impl fmt::Display for SqlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

pub type TransformFn = dyn Fn(&mut MigrationOp) + Send + Sync;
pub type ReplaceFn = dyn Fn(&MigrationOp, Dialect) -> Result<Vec<SqlCommand>> + Send + Sync;

/// What the generator does with operations of one kind.
pub enum OperationHandler {
    /// Rewrite a copy of the operation, then emit the default SQL for it.
    Transform(Box<TransformFn>),
    /// Emit whatever the function returns instead of the default SQL.
    Replace(Box<ReplaceFn>),
    /// Emit nothing.
    Suppress,
}

impl OperationHandler {
    pub fn transform(f: impl Fn(&mut MigrationOp) + Send + Sync + 'static) -> Self {
        OperationHandler::Transform(Box::new(f))
    }

    pub fn replace(
        f: impl Fn(&MigrationOp, Dialect) -> Result<Vec<SqlCommand>> + Send + Sync + 'static,
    ) -> Self {
        OperationHandler::Replace(Box::new(f))
    }
}

impl fmt::Debug for OperationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationHandler::Transform(_) => f.write_str("Transform(..)"),
            OperationHandler::Replace(_) => f.write_str("Replace(..)"),
            OperationHandler::Suppress => f.write_str("Suppress"),
        }
    }
}

/// Generates SQL for migration operations in one dialect.
///
/// The handler table is fixed once the generator is built; a different
/// policy needs a different generator.
#[derive(Debug)]
pub struct MigrationSqlGenerator {
    dialect: Dialect,
    handlers: HashMap<OperationKind, OperationHandler>,
}

impl MigrationSqlGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            handlers: HashMap::new(),
        }
    }

    /// Registers the handler for `kind`, replacing any earlier one.
    pub fn with_handler(mut self, kind: OperationKind, handler: OperationHandler) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Keeps foreign keys out of the emitted DDL: inline constraints are
    /// stripped from CREATE TABLE and standalone add/drop operations are
    /// dropped. The logical relationships are unaffected.
    pub fn suppress_foreign_keys(self) -> Self {
        self.with_handler(
            OperationKind::CreateTable,
            OperationHandler::transform(|op| {
                if let MigrationOp::CreateTable(table) = op {
                    table.foreign_keys.clear();
                }
            }),
        )
        .with_handler(OperationKind::AddForeignKey, OperationHandler::Suppress)
        .with_handler(OperationKind::DropForeignKey, OperationHandler::Suppress)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn handler(&self, kind: OperationKind) -> Option<&OperationHandler> {
        self.handlers.get(&kind)
    }

    /// Generates commands for `ops` in order.
    ///
    /// Either every operation produces its commands or the call fails and
    /// nothing is returned.
    pub fn generate(&self, ops: &[MigrationOp]) -> Result<Vec<SqlCommand>> {
        let mut commands = Vec::new();

        for op in ops {
            let generated = self.generate_op(op)?;
            trace!(
                kind = %op.kind(),
                table = %op.table(),
                commands = generated.len(),
                "generated operation"
            );
            commands.extend(generated);
        }

        debug!(
            dialect = %self.dialect,
            operations = ops.len(),
            commands = commands.len(),
            "generated migration sql"
        );
        Ok(commands)
    }

    pub fn generate_migration(
        &self,
        migration: &Migration,
        direction: Direction,
    ) -> Result<Vec<SqlCommand>> {
        debug!(migration = %migration.id, direction = %direction, "generating migration");
        self.generate(migration.operations(direction))
    }

    fn generate_op(&self, op: &MigrationOp) -> Result<Vec<SqlCommand>> {
        match self.handlers.get(&op.kind()) {
            None => default_sql(op, self.dialect),
            Some(OperationHandler::Suppress) => Ok(Vec::new()),
            Some(OperationHandler::Transform(transform)) => {
                let mut op = op.clone();
                transform(&mut op);
                default_sql(&op, self.dialect)
            }
            Some(OperationHandler::Replace(replace)) => replace(op, self.dialect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Error;
    use crate::model::{ForeignKey, ReferentialAction, Table};

    fn add_fk() -> MigrationOp {
        MigrationOp::add_foreign_key(
            "comment",
            ForeignKey {
                name: "fk_comment_article_article_id".to_string(),
                column: "article_id".to_string(),
                referenced_table: "article".to_string(),
                referenced_column: "id".to_string(),
                on_delete: ReferentialAction::Cascade,
            },
        )
    }

    #[test]
    fn default_pipeline_emits_one_command_per_simple_op() {
        let generator = MigrationSqlGenerator::new(Dialect::MySql);
        let commands = generator
            .generate(&[
                MigrationOp::create_index("ix_comment_article_id", "comment", &["article_id"]),
                add_fk(),
            ])
            .unwrap();

        assert_eq!(commands.len(), 2);
        assert!(commands[0].sql.starts_with("CREATE INDEX"));
        assert!(commands[1].sql.contains("FOREIGN KEY"));
    }

    #[test]
    fn suppress_handler_emits_nothing() {
        let generator = MigrationSqlGenerator::new(Dialect::MySql).suppress_foreign_keys();
        assert!(generator.generate(&[add_fk()]).unwrap().is_empty());
        assert!(matches!(
            generator.handler(OperationKind::AddForeignKey),
            Some(OperationHandler::Suppress)
        ));
    }

    #[test]
    fn transform_handler_edits_a_copy() {
        let generator = MigrationSqlGenerator::new(Dialect::Postgres).with_handler(
            OperationKind::CreateIndex,
            OperationHandler::transform(|op| {
                if let MigrationOp::CreateIndex { index, .. } = op {
                    index.unique = true;
                }
            }),
        );
        let op = MigrationOp::create_index("ix_comment_article_id", "comment", &["article_id"]);

        let commands = generator.generate(std::slice::from_ref(&op)).unwrap();

        assert!(commands[0].sql.starts_with("CREATE UNIQUE INDEX"));
        assert!(matches!(op, MigrationOp::CreateIndex { ref index, .. } if !index.unique));
    }

    #[test]
    fn replace_handler_can_delegate_to_default() {
        let generator = MigrationSqlGenerator::new(Dialect::Sqlite).with_handler(
            OperationKind::DropTable,
            OperationHandler::replace(|op, dialect| {
                let mut commands = vec![SqlCommand::new("PRAGMA foreign_keys = OFF;")];
                commands.extend(default_sql(op, dialect)?);
                Ok(commands)
            }),
        );

        let commands = generator
            .generate(&[MigrationOp::DropTable {
                name: "comment".to_string(),
            }])
            .unwrap();

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].sql, "DROP TABLE \"comment\";");
    }

    #[test]
    fn unsupported_operation_fails_whole_call() {
        let generator = MigrationSqlGenerator::new(Dialect::Sqlite);
        let result = generator.generate(&[
            MigrationOp::CreateTable(Table::new("article")),
            add_fk(),
        ]);
        assert!(matches!(result, Err(Error::UnsupportedOperation { .. })));
    }

    #[test]
    fn registered_handler_covers_unsupported_kind() {
        let generator = MigrationSqlGenerator::new(Dialect::Sqlite).suppress_foreign_keys();
        assert!(generator.generate(&[add_fk()]).unwrap().is_empty());
    }

    #[test]
    fn dialect_parses_and_formats_placeholders() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("oracle".parse::<Dialect>().is_err());
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::MySql.placeholder(2), "?");
    }

    #[test]
    fn generator_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MigrationSqlGenerator>();
    }
}
