//! Typed projections of validated raw records.
//!
//! Every domain record carries its `Provenance`: the global id, logical
//! timestamp, and (for mutable kinds) coordinate of the raw record it was
//! converted from.

use serde::{Deserialize, Serialize};

use crate::types::{Coordinate, RecordKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub id: String,
    pub author: String,
    pub created_at: i64,
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub provenance: Provenance,
    pub title: String,
    pub media_url: String,
    pub artist: Option<String>,
    pub image_url: Option<String>,
    pub duration_secs: Option<u32>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub provenance: Provenance,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Ordered track references.
    pub tracks: Vec<Coordinate>,
    /// True for user-curated playlists rather than artist releases.
    pub is_playlist: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub provenance: Provenance,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub picture: Option<String>,
    pub about: Option<String>,
    pub lud16: Option<String>,
}

impl ProfileInfo {
    /// Best human-readable label for the author.
    pub fn label(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.name.as_deref().filter(|s| !s.is_empty()))
    }
}

/// What an engagement receipt or comment points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Target {
    Record(String),
    Address(Coordinate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Engagement {
    Reaction { symbol: String },
    Paid { amount: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementReceipt {
    pub provenance: Provenance,
    /// All targets named by the receipt; a receipt may reference both the
    /// record id and its coordinate.
    pub targets: Vec<Target>,
    pub engagement: Engagement,
}

impl EngagementReceipt {
    pub fn amount(&self) -> u64 {
        match self.engagement {
            Engagement::Paid { amount } => amount,
            Engagement::Reaction { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub provenance: Provenance,
    pub target: Target,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainRecord {
    Track(Track),
    Release(Release),
    Profile(ProfileInfo),
    Engagement(EngagementReceipt),
    Comment(Comment),
}

impl DomainRecord {
    pub fn provenance(&self) -> &Provenance {
        match self {
            DomainRecord::Track(t) => &t.provenance,
            DomainRecord::Release(r) => &r.provenance,
            DomainRecord::Profile(p) => &p.provenance,
            DomainRecord::Engagement(e) => &e.provenance,
            DomainRecord::Comment(c) => &c.provenance,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            DomainRecord::Track(_) => RecordKind::Track,
            DomainRecord::Release(_) => RecordKind::Release,
            DomainRecord::Profile(_) => RecordKind::Profile,
            DomainRecord::Engagement(e) => match e.engagement {
                Engagement::Reaction { .. } => RecordKind::Reaction,
                Engagement::Paid { .. } => RecordKind::PaidEngagement,
            },
            DomainRecord::Comment(_) => RecordKind::Comment,
        }
    }

    pub fn id(&self) -> &str {
        &self.provenance().id
    }

    pub fn author(&self) -> &str {
        &self.provenance().author
    }

    pub fn created_at(&self) -> i64 {
        self.provenance().created_at
    }

    pub fn coordinate(&self) -> Option<&Coordinate> {
        self.provenance().coordinate.as_ref()
    }
}
