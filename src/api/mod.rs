//! High-level API for embedding relmold in other applications.
//!
//! Each function wires the lower-level modules together for one common
//! task, taking an options struct and returning a structured result.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use relmold::api::{build_model, generate, initial_migration, GenerateOptions, ModelOptions};
//! use relmold::entity::{EntityDescriptor, ModelConfiguration, PropertyType};
//! use relmold::sqlgen::Dialect;
//!
//! let article = EntityDescriptor::new("Article")
//!     .property("Id", PropertyType::Int64)
//!     .property("Title", PropertyType::String);
//!
//! let model = build_model(vec![article], ModelConfiguration::new(), ModelOptions::new()).unwrap();
//! let migration = initial_migration(&model, "Initial", Utc::now()).unwrap();
//! let result = generate(&migration, &GenerateOptions::new(Dialect::MySql)).unwrap();
//!
//! for statement in &result.statements {
//!     println!("{}", statement);
//! }
//! ```

mod error;
mod options;
mod results;

pub use error::{Error, Result};
pub use options::{GenerateOptions, ModelOptions};
pub use results::GenerateResult;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entity::{EntityDescriptor, EntityModel, ModelBuilder, ModelConfiguration};
use crate::migration::{generate_migration_id, Migration};
use crate::model::Schema;
use crate::operations::planner::plan_migration;

/// Builds an entity model from descriptors and explicit configuration.
pub fn build_model(
    descriptors: Vec<EntityDescriptor>,
    configuration: ModelConfiguration,
    options: ModelOptions,
) -> Result<EntityModel> {
    ModelBuilder::new()
        .entities(descriptors)
        .apply_configuration(configuration)
        .with_naming(options.naming)
        .with_conventions(options.conventions)
        .build()
}

/// Migration that creates the whole model in an empty database, with the
/// Down side dropping it again.
pub fn initial_migration(
    model: &EntityModel,
    name: &str,
    created_at: DateTime<Utc>,
) -> Result<Migration> {
    let id = generate_migration_id(created_at, name)?;
    let migration = Migration::with_inverse(id, model.create_operations(), &Schema::new())?;
    debug!(
        migration = %migration.id,
        up = migration.up.len(),
        down = migration.down.len(),
        "built initial migration"
    );
    Ok(migration)
}

/// Generates SQL for one side of `migration`.
pub fn generate(migration: &Migration, options: &GenerateOptions) -> Result<GenerateResult> {
    let mut operations = migration.operations(options.direction).to_vec();
    if options.plan {
        let empty = Schema::new();
        let before = options.snapshot.as_ref().unwrap_or(&empty);
        operations = plan_migration(operations, before);
    }

    let statements = options.generator().generate(&operations)?;

    Ok(GenerateResult {
        migration_id: migration.id.clone(),
        direction: options.direction,
        operations,
        statements,
    })
}
