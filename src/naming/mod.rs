//! Logical-to-physical identifier transform.
//!
//! Entity names become table names, property names become column names, and
//! constraint/index names are synthesized from physical names. All of them go
//! through [`NamingConvention::physical_name`], which is total and idempotent.
//! Synthesized names longer than the identifier limit are shortened with a
//! hash suffix.

use heck::{ToShoutySnakeCase, ToSnakeCase};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::api::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseStyle {
    /// `ArticleId` -> `article_id`
    #[default]
    Lower,
    /// `ArticleId` -> `ARTICLE_ID`
    Upper,
    /// Names are used as written.
    Preserve,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NamingConvention {
    case: CaseStyle,
    separator: char,
    #[serde(default = "default_max_identifier_length")]
    max_identifier_length: usize,
}

/// MySQL's identifier limit.
pub const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 64;

const HASH_LENGTH: usize = 8;

fn default_max_identifier_length() -> usize {
    DEFAULT_MAX_IDENTIFIER_LENGTH
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self::snake_case()
    }
}

impl NamingConvention {
    /// Builds a convention; the separator must not be alphanumeric.
    pub fn new(case: CaseStyle, separator: char) -> Result<Self> {
        if separator.is_alphanumeric() {
            return Err(Error::configuration(
                "naming",
                format!("separator '{separator}' must not be alphanumeric"),
            ));
        }
        Ok(Self {
            case,
            separator,
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        })
    }

    /// Caps synthesized constraint and index names at `max` characters.
    pub fn with_max_identifier_length(mut self, max: usize) -> Result<Self> {
        if max <= 2 * HASH_LENGTH {
            return Err(Error::configuration(
                "naming",
                format!("identifier limit {max} leaves no room for a hashed suffix"),
            ));
        }
        self.max_identifier_length = max;
        Ok(self)
    }

    pub fn snake_case() -> Self {
        Self {
            case: CaseStyle::Lower,
            separator: '_',
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        }
    }

    pub fn screaming_snake_case() -> Self {
        Self {
            case: CaseStyle::Upper,
            separator: '_',
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        }
    }

    pub fn kebab_case() -> Self {
        Self {
            case: CaseStyle::Lower,
            separator: '-',
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        }
    }

    pub fn preserve() -> Self {
        Self {
            case: CaseStyle::Preserve,
            separator: '_',
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        }
    }

    pub fn case(&self) -> CaseStyle {
        self.case
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn max_identifier_length(&self) -> usize {
        self.max_identifier_length
    }

    /// Maps a logical identifier to its physical form.
    ///
    /// Word boundaries are camel/Pascal case transitions, `_` and the
    /// configured separator. Any other character that is not an ASCII
    /// alphanumeric is copied through unchanged and also ends a word.
    pub fn physical_name(&self, logical: &str) -> String {
        if self.case == CaseStyle::Preserve {
            return logical.to_string();
        }

        let mut physical = String::with_capacity(logical.len() + 4);
        let mut segment = String::new();

        for c in logical.chars() {
            if c.is_ascii_alphanumeric() || c == '_' || c == self.separator {
                segment.push(c);
            } else {
                physical.push_str(&self.convert_segment(&segment));
                segment.clear();
                physical.push(c);
            }
        }
        physical.push_str(&self.convert_segment(&segment));

        physical
    }

    fn convert_segment(&self, segment: &str) -> String {
        if segment.is_empty() {
            return String::new();
        }

        let normalized = if self.separator == '_' {
            segment.to_string()
        } else {
            segment.replace(self.separator, "_")
        };

        let words = match self.case {
            CaseStyle::Lower => normalized.to_snake_case(),
            CaseStyle::Upper => normalized.to_shouty_snake_case(),
            CaseStyle::Preserve => normalized,
        };

        if self.separator == '_' {
            words
        } else {
            words.replace('_', &self.separator.to_string())
        }
    }

    pub fn table_name(&self, entity: &str) -> String {
        self.physical_name(entity)
    }

    pub fn column_name(&self, property: &str) -> String {
        self.physical_name(property)
    }

    pub fn primary_key_name(&self, table: &str) -> String {
        self.compose(&["pk", table])
    }

    pub fn foreign_key_name(&self, table: &str, referenced_table: &str, column: &str) -> String {
        self.compose(&["fk", table, referenced_table, column])
    }

    pub fn index_name(&self, table: &str, columns: &[String]) -> String {
        let mut parts = vec!["ix", table];
        parts.extend(columns.iter().map(String::as_str));
        self.compose(&parts)
    }

    fn compose(&self, parts: &[&str]) -> String {
        let sep = self.separator.to_string();
        self.shorten(self.physical_name(&parts.join(&sep)))
    }

    /// Cuts `name` to the identifier limit, replacing the tail with a hash of
    /// the full name so that distinct long names stay distinct.
    fn shorten(&self, name: String) -> String {
        if name.chars().count() <= self.max_identifier_length {
            return name;
        }

        let digest = hex::encode(Sha256::digest(name.as_bytes()));
        let hash = match self.case {
            CaseStyle::Upper => digest[..HASH_LENGTH].to_uppercase(),
            CaseStyle::Lower | CaseStyle::Preserve => digest[..HASH_LENGTH].to_string(),
        };

        let keep = self.max_identifier_length - HASH_LENGTH - 1;
        let prefix: String = name.chars().take(keep).collect();
        format!(
            "{}{}{hash}",
            prefix.trim_end_matches(self.separator),
            self.separator
        )
    }
}
