mod common;
use common::*;

use proptest::prelude::*;
use relmold::model::{Column, ColumnType, ForeignKey, Index};
use relmold::naming::NamingConvention;

proptest! {
    #[test]
    fn naming_is_idempotent(name in "[A-Za-z0-9_. ]{0,24}") {
        for naming in [
            NamingConvention::snake_case(),
            NamingConvention::screaming_snake_case(),
            NamingConvention::kebab_case(),
            NamingConvention::preserve(),
        ] {
            let once = naming.physical_name(&name);
            prop_assert_eq!(naming.physical_name(&once), once.clone());
        }
    }

    #[test]
    fn up_then_down_restores_snapshot(choices in prop::collection::vec(0u8..8, 0..16)) {
        let before = indexed_blog_schema();
        let up = operations_from(&choices, &before);

        let migration = Migration::with_inverse("20240101000000_Random", up, &before).unwrap();
        let after = migration.apply_up(&before).unwrap();

        prop_assert_eq!(migration.apply_down(&after).unwrap(), before);
    }

    #[test]
    fn suppression_removes_every_foreign_key_statement(
        choices in prop::collection::vec(0u8..8, 0..16),
    ) {
        let before = indexed_blog_schema();
        let mut ops = blog_model().create_operations();
        ops.extend(operations_from(&choices, &before));

        for dialect in [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite] {
            let generator = MigrationSqlGenerator::new(dialect).suppress_foreign_keys();
            let sql = sql_text(&generator.generate(&ops).unwrap());
            prop_assert!(sql.iter().all(|s| {
                !s.contains("FOREIGN KEY")
                    && !s.contains("CONSTRAINT \"fk_")
                    && !s.contains("CONSTRAINT `fk_")
            }), "foreign key DDL emitted despite suppression");
        }
    }

    #[test]
    fn create_table_precedes_add_foreign_key(ops in Just(mixed_operations()).prop_shuffle()) {
        let planned = plan_migration(ops, &Schema::new());

        let last_create = planned
            .iter()
            .rposition(|op| op.kind() == OperationKind::CreateTable);
        let first_fk = planned
            .iter()
            .position(|op| op.kind() == OperationKind::AddForeignKey);

        if let (Some(last_create), Some(first_fk)) = (last_create, first_fk) {
            prop_assert!(last_create < first_fk);
        }
    }

    #[test]
    fn planning_a_valid_sequence_keeps_it_applicable(
        choices in prop::collection::vec(0u8..8, 0..16),
    ) {
        let before = indexed_blog_schema();
        let ops = operations_from(&choices, &before);
        let expected = before.applied(&ops).unwrap();

        let planned = plan_migration(ops, &before);

        prop_assert_eq!(before.applied(&planned).unwrap(), expected);
    }

    #[test]
    fn resolver_behaviour_does_not_depend_on_suppression(
        comments in Just(blog_store().rows("comment").to_vec()).prop_shuffle(),
    ) {
        let model = blog_model();
        let store = blog_store();
        let articles = store.rows("article").to_vec();

        let mut outcomes = Vec::new();
        for generator in [
            MigrationSqlGenerator::new(Dialect::MySql),
            MigrationSqlGenerator::new(Dialect::MySql).suppress_foreign_keys(),
        ] {
            let sql = sql_text(&generator.generate(&model.create_operations()).unwrap());
            let emits_foreign_keys = sql.iter().any(|s| s.contains("FOREIGN KEY"));

            let resolver = RelationshipResolver::new(&model);
            let relationship = resolver.relationship("Article", "Comments").unwrap();
            let materialized = resolver
                .materialize(relationship, articles.clone(), comments.clone())
                .unwrap();
            let plan = resolver.plan_delete("Article", &Value::Int(1), &store).unwrap();

            outcomes.push((emits_foreign_keys, materialized, plan));
        }

        let (enforced, materialized, plan) = &outcomes[0];
        let (suppressed, suppressed_materialized, suppressed_plan) = &outcomes[1];

        prop_assert!(*enforced);
        prop_assert!(!*suppressed);
        prop_assert_eq!(materialized, suppressed_materialized);
        prop_assert_eq!(plan, suppressed_plan);
        prop_assert_eq!(materialized.principals[0].collection("Comments").len(), 2);
        prop_assert!(materialized.orphans.is_empty());
        prop_assert_eq!(plan.steps().len(), 3);
    }
}

fn indexed_blog_schema() -> Schema {
    ModelBuilder::new()
        .entity(article_descriptor())
        .entity(comment_descriptor())
        .build()
        .unwrap()
        .to_schema()
}

/// Turns a list of choices into operations that are valid in sequence
/// against `start`. Choices that have nothing to act on are skipped.
///
/// Drops reach pre-existing objects that are not last in their list, so an
/// inverse has to put them back where they were.
fn operations_from(choices: &[u8], start: &Schema) -> Vec<MigrationOp> {
    let mut schema = start.clone();
    let mut ops = Vec::new();

    for (i, choice) in choices.iter().enumerate() {
        let comment = schema.table("comment").unwrap();
        let step = match *choice {
            0 => vec![MigrationOp::create_index(
                format!("ix_comment_message_{i}"),
                "comment",
                &["message"],
            )],
            1 => comment
                .indexes
                .first()
                .map(|ix| MigrationOp::drop_index(ix.name.clone(), "comment"))
                .into_iter()
                .collect(),
            2 => vec![MigrationOp::add_column("comment", extra_column(i))],
            3 => comment
                .columns
                .iter()
                .find(|c| c.name != "id" && c.name != "article_id")
                .map(|c| MigrationOp::DropColumn {
                    table: "comment".to_string(),
                    column: c.name.clone(),
                })
                .into_iter()
                .collect(),
            4 => vec![MigrationOp::add_foreign_key(
                "comment",
                ForeignKey {
                    name: format!("fk_comment_article_{i}"),
                    column: "article_id".to_string(),
                    referenced_table: "article".to_string(),
                    referenced_column: "id".to_string(),
                    on_delete: ReferentialAction::Cascade,
                },
            )],
            5 => vec![MigrationOp::DropForeignKey {
                table: "comment".to_string(),
                name: comment
                    .foreign_keys
                    .first()
                    .map(|fk| fk.name.clone())
                    .unwrap_or_else(|| "fk_comment_never_created".to_string()),
            }],
            6 => vec![MigrationOp::CreateIndex {
                table: "article".to_string(),
                index: Index {
                    name: format!("ix_article_title_{i}"),
                    columns: vec!["title".to_string()],
                    unique: true,
                },
                position: None,
            }],
            // drop and re-add a column in one migration
            _ => match comment.column("message") {
                Some(message) => vec![
                    MigrationOp::DropColumn {
                        table: "comment".to_string(),
                        column: "message".to_string(),
                    },
                    MigrationOp::add_column("comment", message.clone()),
                ],
                None => Vec::new(),
            },
        };

        for op in step {
            schema.apply(&op).unwrap();
            ops.push(op);
        }
    }

    ops
}

fn extra_column(i: usize) -> Column {
    Column {
        name: format!("extra_{i}"),
        column_type: ColumnType::Integer,
        nullable: true,
        max_length: None,
        auto_increment: false,
    }
}

fn mixed_operations() -> Vec<MigrationOp> {
    let mut ops = blog_model().create_operations();
    ops.push(MigrationOp::add_foreign_key(
        "comment",
        ForeignKey {
            name: "fk_comment_article_extra".to_string(),
            column: "article_id".to_string(),
            referenced_table: "article".to_string(),
            referenced_column: "id".to_string(),
            on_delete: ReferentialAction::Restrict,
        },
    ));
    ops.push(MigrationOp::create_index("ix_comment_message", "comment", &["message"]));
    ops.push(MigrationOp::drop_index("ix_article_title", "article"));
    ops
}
