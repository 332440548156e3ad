use crate::entity::{Convention, ConventionSet};
use crate::migration::Direction;
use crate::model::Schema;
use crate::naming::NamingConvention;
use crate::sqlgen::{Dialect, MigrationSqlGenerator};

/// Options for building an entity model.
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    /// Logical to physical identifier transform (default: snake_case)
    pub naming: NamingConvention,
    /// Default conventions, all enabled unless disabled here
    pub conventions: ConventionSet,
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the naming convention.
    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    /// Disable one default convention.
    pub fn without_convention(mut self, convention: Convention) -> Self {
        self.conventions.disable(convention);
        self
    }
}

/// Options for turning a migration into SQL.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Target SQL dialect
    pub dialect: Dialect,
    /// Which side of the migration to generate
    pub direction: Direction,
    /// Keep foreign key constraints out of the emitted DDL
    pub suppress_foreign_keys: bool,
    /// Reorder operations for safe execution before generating
    pub plan: bool,
    /// Snapshot the generated side starts from; its foreign keys order
    /// table drops during planning
    pub snapshot: Option<Schema>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::MySql,
            direction: Direction::Up,
            suppress_foreign_keys: false,
            plan: true,
            snapshot: None,
        }
    }
}

impl GenerateOptions {
    /// Create new generate options for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    /// Generate the Down side instead of Up.
    pub fn down(mut self) -> Self {
        self.direction = Direction::Down;
        self
    }

    /// Strip foreign key constraints from the output.
    pub fn suppress_foreign_keys(mut self) -> Self {
        self.suppress_foreign_keys = true;
        self
    }

    /// Keep the migration's own operation order.
    pub fn without_planning(mut self) -> Self {
        self.plan = false;
        self
    }

    /// Plan against the snapshot the generated side starts from.
    pub fn against(mut self, snapshot: Schema) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Generator configured by these options.
    pub fn generator(&self) -> MigrationSqlGenerator {
        let generator = MigrationSqlGenerator::new(self.dialect);
        if self.suppress_foreign_keys {
            generator.suppress_foreign_keys()
        } else {
            generator
        }
    }
}
