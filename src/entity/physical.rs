use tracing::trace;

use super::{Entity, EntityModel, ValueGeneration};
use crate::model::{Column, ForeignKey, PrimaryKey, Schema, Table};
use crate::operations::planner::order_table_creates;
use crate::operations::MigrationOp;

impl EntityModel {
    /// Physical snapshot of the whole model.
    pub fn to_schema(&self) -> Schema {
        let mut schema = Schema::new();
        for entity in self.entities() {
            schema
                .tables
                .insert(entity.table_name.clone(), self.table_for(entity));
        }
        schema
    }

    /// Physical table of one entity, with the foreign keys of every
    /// relationship in which it is the dependent.
    pub fn table_for(&self, entity: &Entity) -> Table {
        let columns = entity
            .properties
            .iter()
            .map(|p| Column {
                name: p.column_name.clone(),
                column_type: p.column_type,
                nullable: p.nullable,
                max_length: p.max_length,
                auto_increment: p.value_generation == ValueGeneration::AutoIncrement,
            })
            .collect();

        let primary_key = Some(PrimaryKey {
            name: self.naming().primary_key_name(&entity.table_name),
            columns: entity
                .key_properties()
                .map(|p| p.column_name.clone())
                .collect(),
        });

        let foreign_keys = self
            .principals_of(&entity.name)
            .filter_map(|rel| {
                let principal = self.entity(&rel.principal)?;
                Some(ForeignKey {
                    name: rel.constraint_name.clone(),
                    column: rel.foreign_key_column.clone(),
                    referenced_table: principal.table_name.clone(),
                    referenced_column: rel.principal_key_column.clone(),
                    on_delete: rel.on_delete,
                })
            })
            .collect();

        Table {
            name: entity.table_name.clone(),
            columns,
            primary_key,
            foreign_keys,
            indexes: entity.indexes.clone(),
        }
    }

    /// Operations that create the model from an empty database.
    ///
    /// Tables come principal-first with their foreign keys inline. If the
    /// relationships form a cycle the tables keep declaration order and the
    /// foreign keys follow as `AddForeignKey`. Indexes are created last.
    pub fn create_operations(&self) -> Vec<MigrationOp> {
        let mut creates = Vec::with_capacity(self.entities().len());
        let mut indexes = Vec::new();

        for entity in self.entities() {
            let mut table = self.table_for(entity);
            let table_indexes = std::mem::take(&mut table.indexes);
            indexes.extend(table_indexes.into_iter().map(|index| MigrationOp::CreateIndex {
                table: table.name.clone(),
                index,
                position: None,
            }));
            creates.push(MigrationOp::CreateTable(table));
        }

        let (mut ops, deferred) = order_table_creates(creates);
        ops.extend(deferred);
        ops.extend(indexes);

        trace!(operations = ops.len(), "built create operations");
        ops
    }
}
