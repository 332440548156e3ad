use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::MigrationOp;
use crate::model::Schema;

/// Orders migration operations for safe sequential execution.
///
/// Foreign key and index drops run first, then tables are created with
/// referenced tables ahead of the tables that reference them, then columns,
/// indexes and foreign keys are added, then columns are dropped, and finally
/// tables are dropped with referencing tables ahead of the tables they
/// reference. Within each bucket the input order is kept.
///
/// `before` is the snapshot the operations start from; its foreign keys
/// decide the table drop order. An operation that acts on an object an
/// earlier operation dropped or created (dropping and recreating a table,
/// adding back a dropped column, dropping an index created in the same
/// batch) is never moved ahead of it: the input is split there and each
/// part is ordered on its own.
pub fn plan_migration(ops: Vec<MigrationOp>, before: &Schema) -> Vec<MigrationOp> {
    let references = table_references(&ops, before);

    let mut result = Vec::with_capacity(ops.len());
    for segment in split_at_conflicts(ops) {
        result.extend(plan_segment(segment, &references));
    }
    result
}

fn plan_segment(
    ops: Vec<MigrationOp>,
    references: &HashMap<String, HashSet<String>>,
) -> Vec<MigrationOp> {
    let mut drop_foreign_keys = Vec::new();
    let mut drop_indexes = Vec::new();
    let mut create_tables = Vec::new();
    let mut add_columns = Vec::new();
    let mut create_indexes = Vec::new();
    let mut add_foreign_keys = Vec::new();
    let mut drop_columns = Vec::new();
    let mut drop_tables = Vec::new();

    for op in ops {
        match op {
            MigrationOp::DropForeignKey { .. } => drop_foreign_keys.push(op),
            MigrationOp::DropIndex { .. } => drop_indexes.push(op),
            MigrationOp::CreateTable(_) => create_tables.push(op),
            MigrationOp::AddColumn { .. } => add_columns.push(op),
            MigrationOp::CreateIndex { .. } => create_indexes.push(op),
            MigrationOp::AddForeignKey { .. } => add_foreign_keys.push(op),
            MigrationOp::DropColumn { .. } => drop_columns.push(op),
            MigrationOp::DropTable { .. } => drop_tables.push(op),
        }
    }

    let (create_tables, deferred_foreign_keys) = order_table_creates(create_tables);

    let mut result = Vec::new();
    result.extend(drop_foreign_keys);
    result.extend(drop_indexes);
    result.extend(create_tables);
    result.extend(add_columns);
    result.extend(create_indexes);
    result.extend(deferred_foreign_keys);
    result.extend(add_foreign_keys);
    result.extend(drop_columns);
    result.extend(order_table_drops(drop_tables, references));
    result
}

/// Position of the operation's bucket in [`plan_segment`].
fn rank(op: &MigrationOp) -> u8 {
    match op {
        MigrationOp::DropForeignKey { .. } => 0,
        MigrationOp::DropIndex { .. } => 1,
        MigrationOp::CreateTable(_) => 2,
        MigrationOp::AddColumn { .. } => 3,
        MigrationOp::CreateIndex { .. } => 4,
        MigrationOp::AddForeignKey { .. } => 5,
        MigrationOp::DropColumn { .. } => 6,
        MigrationOp::DropTable { .. } => 7,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Member<'a> {
    Table,
    Column(&'a str),
    ForeignKey(&'a str),
    Index(&'a str),
}

fn member(op: &MigrationOp) -> Member<'_> {
    match op {
        MigrationOp::CreateTable(_) | MigrationOp::DropTable { .. } => Member::Table,
        MigrationOp::AddColumn { column, .. } => Member::Column(&column.name),
        MigrationOp::DropColumn { column, .. } => Member::Column(column),
        MigrationOp::AddForeignKey { foreign_key, .. } => Member::ForeignKey(&foreign_key.name),
        MigrationOp::DropForeignKey { name, .. } => Member::ForeignKey(name),
        MigrationOp::CreateIndex { index, .. } => Member::Index(&index.name),
        MigrationOp::DropIndex { name, .. } => Member::Index(name),
    }
}

/// Whether bucketing would move `later` ahead of `earlier` although
/// `later` acts on what `earlier` produced or removed.
fn must_follow(earlier: &MigrationOp, later: &MigrationOp) -> bool {
    if rank(later) >= rank(earlier) || earlier.table() != later.table() {
        return false;
    }

    match (earlier, member(later)) {
        (MigrationOp::DropTable { .. }, Member::Table) => true,
        (MigrationOp::CreateTable(table), Member::ForeignKey(name)) => {
            table.foreign_key(name).is_some()
        }
        (MigrationOp::CreateTable(table), Member::Index(name)) => table.index(name).is_some(),
        (_, Member::Table) => false,
        (_, later_member) => member(earlier) == later_member,
    }
}

fn split_at_conflicts(ops: Vec<MigrationOp>) -> Vec<Vec<MigrationOp>> {
    let mut segments = Vec::new();
    let mut current: Vec<MigrationOp> = Vec::new();

    for op in ops {
        if current.iter().any(|earlier| must_follow(earlier, &op)) {
            debug!(
                table = %op.table(),
                kind = %op.kind(),
                "operation depends on an earlier one, keeping their order"
            );
            segments.push(std::mem::take(&mut current));
        }
        current.push(op);
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Tables each table references, from the snapshot and from the foreign
/// keys the operations create.
fn table_references(ops: &[MigrationOp], before: &Schema) -> HashMap<String, HashSet<String>> {
    let mut references: HashMap<String, HashSet<String>> = HashMap::new();
    let mut record = |table: &str, referenced: &str| {
        if table != referenced {
            references
                .entry(table.to_string())
                .or_default()
                .insert(referenced.to_string());
        }
    };

    for table in before.tables.values() {
        for fk in &table.foreign_keys {
            record(&table.name, &fk.referenced_table);
        }
    }
    for op in ops {
        match op {
            MigrationOp::CreateTable(table) => {
                for fk in &table.foreign_keys {
                    record(&table.name, &fk.referenced_table);
                }
            }
            MigrationOp::AddForeignKey {
                table, foreign_key, ..
            } => record(table, &foreign_key.referenced_table),
            _ => {}
        }
    }

    references
}

/// Orders DropTable operations so that referencing tables are dropped
/// before the tables they reference. Cycles keep the input order.
fn order_table_drops(
    ops: Vec<MigrationOp>,
    references: &HashMap<String, HashSet<String>>,
) -> Vec<MigrationOp> {
    if ops.len() < 2 {
        return ops;
    }

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

    for (position, op) in ops.iter().enumerate() {
        let node = graph.add_node(position);
        nodes.insert(op.table().to_string(), node);
    }

    for op in &ops {
        let dependent = nodes[op.table()];
        if let Some(referenced) = references.get(op.table()) {
            for principal in referenced {
                if let Some(&principal) = nodes.get(principal) {
                    graph.update_edge(dependent, principal, ());
                }
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => {
            let mut slots: Vec<Option<MigrationOp>> = ops.into_iter().map(Some).collect();
            order
                .into_iter()
                .filter_map(|node| slots[graph[node]].take())
                .collect()
        }
        Err(cycle) => {
            debug!(
                table = %ops[graph[cycle.node_id()]].table(),
                "foreign key cycle between dropped tables, keeping input order"
            );
            ops
        }
    }
}

/// Topologically sorts CreateTable operations by their inline foreign keys.
///
/// When the references form a cycle, tables keep their input order and every
/// foreign key between tables of the batch is moved out into a trailing
/// AddForeignKey operation.
pub(crate) fn order_table_creates(ops: Vec<MigrationOp>) -> (Vec<MigrationOp>, Vec<MigrationOp>) {
    if ops.len() < 2 {
        return (ops, Vec::new());
    }

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

    for (position, op) in ops.iter().enumerate() {
        let node = graph.add_node(position);
        nodes.insert(op.table().to_string(), node);
    }

    for op in &ops {
        if let MigrationOp::CreateTable(table) = op {
            let dependent = nodes[&table.name];
            for fk in &table.foreign_keys {
                if fk.referenced_table == table.name {
                    continue;
                }
                if let Some(&principal) = nodes.get(&fk.referenced_table) {
                    graph.update_edge(principal, dependent, ());
                }
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => {
            let mut slots: Vec<Option<MigrationOp>> = ops.into_iter().map(Some).collect();
            let sorted = order
                .into_iter()
                .filter_map(|node| slots[graph[node]].take())
                .collect();
            (sorted, Vec::new())
        }
        Err(cycle) => {
            debug!(
                table = %ops[graph[cycle.node_id()]].table(),
                "foreign key cycle between created tables, deferring constraints"
            );
            split_foreign_keys(ops, &nodes)
        }
    }
}

fn split_foreign_keys(
    ops: Vec<MigrationOp>,
    batch: &HashMap<String, NodeIndex>,
) -> (Vec<MigrationOp>, Vec<MigrationOp>) {
    let mut tables = Vec::with_capacity(ops.len());
    let mut deferred = Vec::new();

    for op in ops {
        match op {
            MigrationOp::CreateTable(mut table) => {
                let name = table.name.clone();
                let (cross, local): (Vec<_>, Vec<_>) =
                    table.foreign_keys.into_iter().partition(|fk| {
                        fk.referenced_table != name && batch.contains_key(&fk.referenced_table)
                    });
                table.foreign_keys = local;
                deferred.extend(
                    cross
                        .into_iter()
                        .map(|foreign_key| MigrationOp::add_foreign_key(name.clone(), foreign_key)),
                );
                tables.push(MigrationOp::CreateTable(table));
            }
            other => tables.push(other),
        }
    }

    (tables, deferred)
}
