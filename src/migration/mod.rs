//! Named migrations: an Up sequence paired with the Down sequence that
//! undoes it, identified by a sortable timestamped id.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use crate::api::{Error, Result};
use crate::model::Schema;
use crate::operations::{invert_operations, MigrationOp};

static MIGRATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{14})_([A-Za-z0-9_]+)$").expect("valid migration id regex"));

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub id: String,
    pub up: Vec<MigrationOp>,
    pub down: Vec<MigrationOp>,
}

impl Migration {
    pub fn new(
        id: impl Into<String>,
        up: Vec<MigrationOp>,
        down: Vec<MigrationOp>,
    ) -> Result<Self> {
        let id = id.into();
        parse_migration_id(&id)?;
        Ok(Self { id, up, down })
    }

    /// Builds a migration whose Down sequence is derived from `up` as it
    /// applies to `before`.
    pub fn with_inverse(
        id: impl Into<String>,
        up: Vec<MigrationOp>,
        before: &Schema,
    ) -> Result<Self> {
        let down = invert_operations(&up, before)?;
        Self::new(id, up, down)
    }

    pub fn operations(&self, direction: Direction) -> &[MigrationOp] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    pub fn apply_up(&self, schema: &Schema) -> Result<Schema> {
        schema.applied(&self.up)
    }

    pub fn apply_down(&self, schema: &Schema) -> Result<Schema> {
        schema.applied(&self.down)
    }

    /// Creation time encoded in the id.
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        parse_migration_id(&self.id).map(|(timestamp, _)| timestamp)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let migration: Migration = serde_json::from_str(json)?;
        parse_migration_id(&migration.id)?;
        Ok(migration)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Generates an id like "20240101120000_AddComments".
///
/// Characters other than ASCII alphanumerics and `_` are dropped from the
/// name; spaces and dashes become underscores.
pub fn generate_migration_id(created_at: DateTime<Utc>, name: &str) -> Result<String> {
    let sanitized: String = name
        .replace([' ', '-'], "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let sanitized = sanitized
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if sanitized.is_empty() {
        return Err(Error::migration(format!(
            "migration name '{name}' must contain at least one alphanumeric character"
        )));
    }

    Ok(format!("{}_{}", created_at.format(TIMESTAMP_FORMAT), sanitized))
}

/// Splits an id into its timestamp and name.
pub fn parse_migration_id(id: &str) -> Result<(DateTime<Utc>, String)> {
    let captures = MIGRATION_ID
        .captures(id)
        .ok_or_else(|| Error::migration(format!("'{id}' is not a valid migration id")))?;

    let timestamp = chrono::NaiveDateTime::parse_from_str(&captures[1], TIMESTAMP_FORMAT)
        .map_err(|e| Error::migration(format!("'{id}' has an invalid timestamp: {e}")))?
        .and_utc();

    Ok((timestamp, captures[2].to_string()))
}

/// Migrations not yet recorded in `applied`, in id order.
///
/// Fails if two migrations share an id.
pub fn pending_migrations<'a>(
    migrations: &'a [Migration],
    applied: &[String],
) -> Result<Vec<&'a Migration>> {
    let mut seen = HashSet::new();
    for migration in migrations {
        if !seen.insert(migration.id.as_str()) {
            return Err(Error::migration(format!(
                "duplicate migration id '{}'",
                migration.id
            )));
        }
    }

    let applied: HashSet<&str> = applied.iter().map(String::as_str).collect();
    let mut pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| !applied.contains(m.id.as_str()))
        .collect();
    pending.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(pending)
}
