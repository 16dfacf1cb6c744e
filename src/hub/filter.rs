//! Per-client log filters
//!
//! A filter sees only `{level, branch, message}` of a log event. Clients
//! choose one through the control protocol as a [`FilterSpec`], or the
//! embedding application installs a [`ClientFilter::custom`] predicate.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Most entries a filter spec may list
pub const MAX_FILTER_ENTRIES: usize = 64;

/// Longest accepted filter entry
pub const MAX_FILTER_ENTRY_LEN: usize = 128;

/// What a filter is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct FilterInput<'a> {
    pub level: &'a str,
    pub branch: &'a str,
    pub message: &'a str,
}

/// Client-supplied filter description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FilterSpec {
    /// Accept events from the listed branches at the listed levels
    BranchesLevels {
        #[serde(default)]
        branches: Vec<String>,
        #[serde(default)]
        levels: Vec<String>,
    },
    /// Accept events mentioning any keyword
    Keyword { keywords: Vec<String> },
}

impl FilterSpec {
    /// Check entry counts and lengths
    pub fn validate(&self) -> Result<(), String> {
        match self {
            FilterSpec::BranchesLevels { branches, levels } => {
                check_entries("branches", branches)?;
                check_entries("levels", levels)
            }
            FilterSpec::Keyword { keywords } => {
                if keywords.is_empty() {
                    return Err("keywords must not be empty".into());
                }
                check_entries("keywords", keywords)
            }
        }
    }
}

fn check_entries(field: &str, entries: &[String]) -> Result<(), String> {
    if entries.len() > MAX_FILTER_ENTRIES {
        return Err(format!(
            "{} has {} entries, limit is {}",
            field,
            entries.len(),
            MAX_FILTER_ENTRIES
        ));
    }
    if let Some(entry) = entries
        .iter()
        .find(|e| e.is_empty() || e.len() > MAX_FILTER_ENTRY_LEN)
    {
        return Err(format!("{} entry of length {} is invalid", field, entry.len()));
    }
    Ok(())
}

type Predicate = Arc<dyn Fn(&FilterInput<'_>) -> bool + Send + Sync>;

/// Compiled client filter
#[derive(Clone)]
pub enum ClientFilter {
    /// Empty list matches anything
    BranchesLevels {
        branches: Vec<String>,
        levels: Vec<String>,
    },
    /// Lowercased keywords
    Keyword { keywords: Vec<String> },
    /// Application predicate
    Custom(Predicate),
}

impl ClientFilter {
    /// Filter on branch and level
    pub fn branches_levels(branches: Vec<String>, levels: Vec<String>) -> Self {
        ClientFilter::BranchesLevels { branches, levels }
    }

    /// Case-insensitive keyword filter
    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ClientFilter::Keyword {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Wrap an arbitrary predicate
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&FilterInput<'_>) -> bool + Send + Sync + 'static,
    {
        ClientFilter::Custom(Arc::new(predicate))
    }

    /// Build from a validated spec
    pub fn from_spec(spec: FilterSpec) -> Result<Self, String> {
        spec.validate()?;
        Ok(match spec {
            FilterSpec::BranchesLevels { branches, levels } => {
                ClientFilter::branches_levels(branches, levels)
            }
            FilterSpec::Keyword { keywords } => ClientFilter::keywords(keywords),
        })
    }

    /// Evaluate the filter
    pub fn matches(&self, input: &FilterInput<'_>) -> bool {
        match self {
            ClientFilter::BranchesLevels { branches, levels } => {
                let branch_ok = branches.is_empty() || branches.iter().any(|b| b == input.branch);
                let level_ok = levels.is_empty()
                    || levels.iter().any(|l| l.eq_ignore_ascii_case(input.level));
                branch_ok && level_ok
            }
            ClientFilter::Keyword { keywords } => {
                let haystacks = [
                    input.message.to_lowercase(),
                    input.branch.to_lowercase(),
                    input.level.to_lowercase(),
                ];
                keywords
                    .iter()
                    .any(|k| haystacks.iter().any(|h| h.contains(k.as_str())))
            }
            ClientFilter::Custom(predicate) => predicate(input),
        }
    }
}

impl fmt::Debug for ClientFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientFilter::BranchesLevels { branches, levels } => f
                .debug_struct("BranchesLevels")
                .field("branches", branches)
                .field("levels", levels)
                .finish(),
            ClientFilter::Keyword { keywords } => f
                .debug_struct("Keyword")
                .field("keywords", keywords)
                .finish(),
            ClientFilter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
