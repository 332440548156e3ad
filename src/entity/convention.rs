use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Default model-building conventions that a deployment may switch off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Convention {
    /// `Id` or `<Entity>Id` becomes the primary key.
    KeyDiscovery,
    /// `<Navigation>Id`, `<Principal>Id` or `<Navigation><Key>` becomes the foreign key.
    ForeignKeyDiscovery,
    /// Every foreign key column gets a non-unique index.
    ForeignKeyIndex,
    /// Required relationships cascade on delete.
    CascadeDelete,
    /// Single integer keys are generated by the database.
    ValueGeneration,
}

impl Convention {
    pub const ALL: [Convention; 5] = [
        Convention::KeyDiscovery,
        Convention::ForeignKeyDiscovery,
        Convention::ForeignKeyIndex,
        Convention::CascadeDelete,
        Convention::ValueGeneration,
    ];
}

impl FromStr for Convention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "key-discovery" => Ok(Convention::KeyDiscovery),
            "foreign-key-discovery" => Ok(Convention::ForeignKeyDiscovery),
            "foreign-key-index" => Ok(Convention::ForeignKeyIndex),
            "cascade-delete" => Ok(Convention::CascadeDelete),
            "value-generation" => Ok(Convention::ValueGeneration),
            _ => Err(format!(
                "Invalid convention '{}'. Valid conventions: key-discovery, foreign-key-discovery, foreign-key-index, cascade-delete, value-generation",
                s
            )),
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Convention::KeyDiscovery => "key-discovery",
            Convention::ForeignKeyDiscovery => "foreign-key-discovery",
            Convention::ForeignKeyIndex => "foreign-key-index",
            Convention::CascadeDelete => "cascade-delete",
            Convention::ValueGeneration => "value-generation",
        };
        write!(f, "{}", s)
    }
}

/// Capability toggles: every convention is on unless listed as disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionSet {
    disabled: BTreeSet<Convention>,
}

impl ConventionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without(mut self, convention: Convention) -> Self {
        self.disabled.insert(convention);
        self
    }

    pub fn disable(&mut self, convention: Convention) {
        self.disabled.insert(convention);
    }

    pub fn is_enabled(&self, convention: Convention) -> bool {
        !self.disabled.contains(&convention)
    }

    pub fn disabled(&self) -> impl Iterator<Item = Convention> + '_ {
        self.disabled.iter().copied()
    }
}

impl FromIterator<Convention> for ConventionSet {
    fn from_iter<I: IntoIterator<Item = Convention>>(disabled: I) -> Self {
        Self {
            disabled: disabled.into_iter().collect(),
        }
    }
}
