//! relmold - entity model mapping and schema migration library.
//!
//! Describe entities and their relationships, let conventions and explicit
//! configuration resolve them into tables, keys and foreign keys, and turn
//! the resulting migration operations into dialect-specific SQL through a
//! generator pipeline that can be overridden per operation kind.
//!
//! # Quick Start
//!
//! ```no_run
//! use relmold::prelude::*;
//!
//! let model = ModelBuilder::new()
//!     .entity(
//!         EntityDescriptor::new("Article")
//!             .property("Id", PropertyType::Int64)
//!             .collection("Comments", "Comment"),
//!     )
//!     .entity(
//!         EntityDescriptor::new("Comment")
//!             .property("Id", PropertyType::Int64)
//!             .property("ArticleId", PropertyType::Int64)
//!             .reference("Article", "Article"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let generator = MigrationSqlGenerator::new(Dialect::MySql).suppress_foreign_keys();
//! for command in generator.generate(&model.create_operations()).unwrap() {
//!     println!("{}", command);
//! }
//! ```
//!
//! # Modules
//!
//! - [`naming`] - Logical to physical identifier transform
//! - [`entity`] - Entity descriptors, configuration, conventions and the built model
//! - [`model`] - Physical schema snapshot (tables, columns, keys, indexes)
//! - [`operations`] - Migration operations, inversion, snapshot application, planning
//! - [`migration`] - Named Up/Down migrations and pending detection
//! - [`sqlgen`] - Dialect SQL generation with per-kind handlers
//! - [`resolver`] - Attaching, materializing and cascade-deleting related rows
//! - [`api`] - Errors, options and high-level entry points

pub mod api;
pub mod entity;
pub mod migration;
pub mod model;
pub mod naming;
pub mod operations;
pub mod prelude;
pub mod resolver;
pub mod sqlgen;
