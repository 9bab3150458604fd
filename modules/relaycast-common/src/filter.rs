//! Per-kind query filters.
//!
//! Each `Filter` variant only carries the constraints that make sense for its
//! record kind. `Filter::to_query()` lowers it to the `SourceQuery` sent over
//! the wire, which is the only shape sources ever see.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Target;
use crate::types::RecordKind;

/// Default result cap applied when a filter does not set one.
pub const DEFAULT_QUERY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Tracks {
        #[serde(default)]
        authors: Vec<String>,
        /// Attribute equality constraints, e.g. `t` → ["ambient"].
        #[serde(default)]
        tags: BTreeMap<String, Vec<String>>,
        limit: Option<usize>,
    },
    Releases {
        #[serde(default)]
        authors: Vec<String>,
        #[serde(default)]
        tags: BTreeMap<String, Vec<String>>,
        limit: Option<usize>,
    },
    Profiles {
        authors: Vec<String>,
    },
    Engagement {
        targets: Vec<Target>,
        limit: Option<usize>,
    },
    Comments {
        targets: Vec<Target>,
        limit: Option<usize>,
    },
}

impl Filter {
    pub fn tracks() -> Self {
        Filter::Tracks {
            authors: Vec::new(),
            tags: BTreeMap::new(),
            limit: None,
        }
    }

    pub fn releases() -> Self {
        Filter::Releases {
            authors: Vec::new(),
            tags: BTreeMap::new(),
            limit: None,
        }
    }

    /// The record kinds this filter asks for.
    pub fn kinds(&self) -> Vec<RecordKind> {
        match self {
            Filter::Tracks { .. } => vec![RecordKind::Track],
            Filter::Releases { .. } => vec![RecordKind::Release],
            Filter::Profiles { .. } => vec![RecordKind::Profile],
            Filter::Engagement { .. } => vec![RecordKind::Reaction, RecordKind::PaidEngagement],
            Filter::Comments { .. } => vec![RecordKind::Comment],
        }
    }

    pub fn to_query(&self) -> SourceQuery {
        let kinds = self.kinds().into_iter().map(RecordKind::number).collect();
        match self {
            Filter::Tracks {
                authors,
                tags,
                limit,
            }
            | Filter::Releases {
                authors,
                tags,
                limit,
            } => SourceQuery {
                kinds,
                authors: (!authors.is_empty()).then(|| authors.clone()),
                tags: tags.clone(),
                limit: Some(limit.unwrap_or(DEFAULT_QUERY_LIMIT)),
            },
            Filter::Profiles { authors } => SourceQuery {
                kinds,
                authors: Some(authors.clone()),
                tags: BTreeMap::new(),
                // Sources may hold several versions per author.
                limit: Some(DEFAULT_QUERY_LIMIT),
            },
            Filter::Engagement { targets, limit } | Filter::Comments { targets, limit } => {
                SourceQuery {
                    kinds,
                    authors: None,
                    tags: target_tags(targets),
                    limit: Some(limit.unwrap_or(DEFAULT_QUERY_LIMIT)),
                }
            }
        }
    }
}

fn target_tags(targets: &[Target]) -> BTreeMap<String, Vec<String>> {
    let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for target in targets {
        match target {
            Target::Record(id) => tags.entry("e".to_string()).or_default().push(id.clone()),
            Target::Address(c) => tags.entry("a".to_string()).or_default().push(c.to_string()),
        }
    }
    tags
}

/// The wire-level query every source receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub kinds: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}
