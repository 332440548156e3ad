//! Convenient re-exports for common relmold usage.
//!
//! # Example
//!
//! ```no_run
//! use relmold::prelude::*;
//!
//! let model = ModelBuilder::new()
//!     .entity(EntityDescriptor::new("Article").property("Id", PropertyType::Int64))
//!     .build()
//!     .unwrap();
//!
//! println!("{} table(s)", model.to_schema().tables.len());
//! ```

// High-level functions
pub use crate::api::{build_model, generate, initial_migration};

// Options and results
pub use crate::api::{GenerateOptions, GenerateResult, ModelOptions};

// Errors
pub use crate::api::{Error, Result};

// Entity model
pub use crate::entity::{
    ConfigurationProvider, Convention, ConventionSet, EntityDescriptor, EntityModel,
    ModelBuilder, ModelConfiguration, PropertyType, Relationship,
};

// Physical schema and operations
pub use crate::model::{ReferentialAction, Schema};
pub use crate::operations::{MigrationOp, OperationKind};

// Migrations and SQL generation
pub use crate::migration::{Direction, Migration};
pub use crate::naming::NamingConvention;
pub use crate::sqlgen::{default_sql, Dialect, MigrationSqlGenerator, OperationHandler, SqlCommand};

// Relationship resolution
pub use crate::resolver::{InsertPlan, Instance, RelationshipResolver, Row, RowStore, Value};
