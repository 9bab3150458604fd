use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RecordKind
// ---------------------------------------------------------------------------

/// The record kinds the pipeline understands. Wire numbers follow the
/// network's published kind registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Profile,
    Comment,
    Reaction,
    PaidEngagement,
    Track,
    Release,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Profile,
        RecordKind::Comment,
        RecordKind::Reaction,
        RecordKind::PaidEngagement,
        RecordKind::Track,
        RecordKind::Release,
    ];

    pub fn number(self) -> u32 {
        match self {
            RecordKind::Profile => 0,
            RecordKind::Comment => 1,
            RecordKind::Reaction => 7,
            RecordKind::PaidEngagement => 9735,
            RecordKind::Track => 31337,
            RecordKind::Release => 34139,
        }
    }

    pub fn from_number(n: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.number() == n)
    }

    /// Addressable kinds are identified by (author, kind, `d` attribute).
    pub fn is_addressable(self) -> bool {
        matches!(self, RecordKind::Track | RecordKind::Release)
    }

    /// Replaceable kinds keep one current version per (author, kind).
    pub fn is_replaceable(self) -> bool {
        matches!(self, RecordKind::Profile)
    }

    pub fn is_engagement(self) -> bool {
        matches!(self, RecordKind::Reaction | RecordKind::PaidEngagement)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Profile => "profile",
            RecordKind::Comment => "comment",
            RecordKind::Reaction => "reaction",
            RecordKind::PaidEngagement => "paid_engagement",
            RecordKind::Track => "track",
            RecordKind::Release => "release",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Identity helpers
// ---------------------------------------------------------------------------

/// Length of a hex-encoded author key or record id.
pub const ID_HEX_LEN: usize = 64;
/// Length of a hex-encoded record signature.
pub const SIG_HEX_LEN: usize = 128;

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// True if `s` looks like an author identity (64 lowercase hex chars).
pub fn is_valid_author(s: &str) -> bool {
    is_lower_hex(s, ID_HEX_LEN)
}

/// True if `s` looks like a global record id (64 lowercase hex chars).
pub fn is_valid_record_id(s: &str) -> bool {
    is_lower_hex(s, ID_HEX_LEN)
}

/// True if `s` looks like a record signature (128 lowercase hex chars).
/// Signatures are not verified here; that belongs to the upload authorizer.
pub fn is_valid_signature(s: &str) -> bool {
    is_lower_hex(s, SIG_HEX_LEN)
}

// ---------------------------------------------------------------------------
// Coordinate
// ---------------------------------------------------------------------------

/// Logical identity of a mutable record, stable across edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub kind: RecordKind,
    pub author: String,
    pub identifier: String,
}

impl Coordinate {
    pub fn new(kind: RecordKind, author: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            author: author.into(),
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.number(), self.author, self.identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinateParseError {
    #[error("expected kind:author:identifier, got {0} part(s)")]
    Arity(usize),

    #[error("kind is not a known record kind: {0}")]
    Kind(String),

    #[error("author is not a valid identity: {0}")]
    Author(String),
}

impl FromStr for Coordinate {
    type Err = CoordinateParseError;

    /// Parses `kind:author:identifier`. The identifier may itself be empty
    /// but may not contain further separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(CoordinateParseError::Arity(parts.len()));
        }
        let kind = parts[0]
            .parse::<u32>()
            .ok()
            .and_then(RecordKind::from_number)
            .ok_or_else(|| CoordinateParseError::Kind(parts[0].to_string()))?;
        if !is_valid_author(parts[1]) {
            return Err(CoordinateParseError::Author(parts[1].to_string()));
        }
        Ok(Coordinate::new(kind, parts[1], parts[2]))
    }
}

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// A signed envelope exactly as a source returned it. Untrusted until validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(rename = "pubkey")]
    pub author: String,
    pub kind: u32,
    pub created_at: i64,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl RawRecord {
    pub fn record_kind(&self) -> Option<RecordKind> {
        RecordKind::from_number(self.kind)
    }

    /// First value of the first attribute named `name`.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// First value of every attribute named `name`, in order.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name))
            .filter_map(|t| t.get(1))
            .map(String::as_str)
    }

    /// The record's own coordinate, if its kind is addressable or replaceable.
    pub fn coordinate(&self) -> Option<Coordinate> {
        let kind = self.record_kind()?;
        if kind.is_addressable() {
            let d = self.tag_value("d")?;
            Some(Coordinate::new(kind, &self.author, d))
        } else if kind.is_replaceable() {
            Some(Coordinate::new(kind, &self.author, ""))
        } else {
            None
        }
    }
}
