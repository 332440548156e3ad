use crate::migration::Direction;
use crate::operations::MigrationOp;
use crate::sqlgen::SqlCommand;

/// Result of generating SQL for one side of a migration.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    /// Id of the migration the SQL was generated from
    pub migration_id: String,
    pub direction: Direction,
    /// Operations in the order they were generated
    pub operations: Vec<MigrationOp>,
    /// SQL commands to execute, in order
    pub statements: Vec<SqlCommand>,
}

impl GenerateResult {
    /// Whether there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// SQL text only, one entry per command.
    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|c| c.sql.as_str()).collect()
    }
}
