#![allow(unused_imports, dead_code)]

pub use relmold::entity::{
    ConfigurationProvider, Convention, EntityDescriptor, EntityModel, ModelBuilder,
    ModelConfiguration, PropertyType,
};
pub use relmold::migration::{Direction, Migration};
pub use relmold::model::{ReferentialAction, Schema};
pub use relmold::operations::{
    invert_operations, planner::plan_migration, MigrationOp, OperationKind,
};
pub use relmold::resolver::{Instance, RelationshipResolver, Row, RowStore, Value};
pub use relmold::row;
pub use relmold::sqlgen::{Dialect, MigrationSqlGenerator, SqlCommand};
pub use std::collections::BTreeMap;
pub use tempfile;

/// Explicit configuration for the blog article entity.
pub struct ArticleConfig;

impl ConfigurationProvider for ArticleConfig {
    fn configure(&self, config: &mut ModelConfiguration) {
        let article = config.entity("Article");
        article.to_table("article").has_key(&["Id"]);
        article.property("Title").has_max_length(255);
    }
}

/// Explicit configuration for the blog comment entity and its relationship.
pub struct CommentConfig;

impl ConfigurationProvider for CommentConfig {
    fn configure(&self, config: &mut ModelConfiguration) {
        config
            .entity("Comment")
            .has_one("Article")
            .with_many("Comments")
            .has_foreign_key("ArticleId")
            .is_required(true)
            .on_delete(ReferentialAction::Cascade);
    }
}

pub fn article_descriptor() -> EntityDescriptor {
    EntityDescriptor::new("Article")
        .property("Id", PropertyType::Int64)
        .property("Title", PropertyType::String)
        .property("Content", PropertyType::String)
        .collection("Comments", "Comment")
}

pub fn comment_descriptor() -> EntityDescriptor {
    EntityDescriptor::new("Comment")
        .property("Id", PropertyType::Int64)
        .property("Message", PropertyType::String)
        .property("ArticleId", PropertyType::Int64)
        .reference("Article", "Article")
}

/// Article/Comment model with one required, cascading relationship and no
/// foreign key indexes.
pub fn blog_model() -> EntityModel {
    ModelBuilder::new()
        .entity(article_descriptor())
        .entity(comment_descriptor())
        .apply_configuration(ArticleConfig)
        .apply_configuration(CommentConfig)
        .without_convention(Convention::ForeignKeyIndex)
        .build()
        .unwrap()
}

pub fn blog_store() -> RowStore {
    let mut store = RowStore::new();
    store.insert("article", row! { "id" => 1, "title" => "Hello", "content" => "..." });
    store.insert("article", row! { "id" => 2, "title" => "Other", "content" => "..." });
    store.insert("comment", row! { "id" => 11, "message" => "first", "article_id" => 1 });
    store.insert("comment", row! { "id" => 12, "message" => "second", "article_id" => 1 });
    store.insert("comment", row! { "id" => 21, "message" => "elsewhere", "article_id" => 2 });
    store
}

pub fn sql_text(commands: &[SqlCommand]) -> Vec<String> {
    commands.iter().map(|c| c.sql.clone()).collect()
}
