//! Rule set document types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category returned when no rule matches.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Errors from loading a rule set.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("cannot read rule set {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rule set: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid rule set: {0}")]
    Invalid(String),
}

/// Item field a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    Title,
    Channel,
    Topic,
    Description,
}

/// A single rule: matches if the field contains any pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub field: RuleField,
    #[serde(rename = "match")]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDefinition {
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// The declarative rule set document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRuleSet {
    /// Known channel labels.
    #[serde(default)]
    pub senders: Vec<String>,
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryDefinition>,
}
