//! Raw record validation and conversion.
//!
//! `validate` checks structure only; signatures are verified elsewhere.
//! `convert` turns a validated record into its typed `DomainRecord`.
//! `convert_batch` runs both over a batch, dropping and counting anything
//! that fails without stopping on it.

use relaycast_common::{
    is_valid_author, is_valid_record_id, is_valid_signature, Comment, Coordinate, DomainRecord,
    Engagement, EngagementReceipt, ProfileInfo, Provenance, RawRecord, RecordKind, Release,
    Target, Track,
};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Amount extraction
// ---------------------------------------------------------------------------

/// Reads the engagement amount out of a paid-engagement receipt. Payment
/// verification is not done here; implementations only report what the
/// receipt claims.
pub trait AmountExtractor: Send + Sync {
    fn amount(&self, raw: &RawRecord) -> Option<u64>;
}

/// Reads an `amount` attribute in millisats and reports whole sats.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmountTagExtractor;

impl AmountExtractor for AmountTagExtractor {
    fn amount(&self, raw: &RawRecord) -> Option<u64> {
        raw.tag_value("amount")?
            .trim()
            .parse::<u64>()
            .ok()
            .map(|msats| msats / 1000)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub id: String,
    pub kind: u32,
    pub reason: String,
}

impl Rejection {
    fn new(raw: &RawRecord, reason: impl Into<String>) -> Self {
        Self {
            id: raw.id.clone(),
            kind: raw.kind,
            reason: reason.into(),
        }
    }
}

fn require<'a>(raw: &'a RawRecord, name: &str) -> Result<&'a str, Rejection> {
    match raw.tag_value(name).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Rejection::new(raw, format!("missing_{name}"))),
    }
}

fn targets(raw: &RawRecord) -> Vec<Target> {
    let mut out: Vec<Target> = raw
        .tag_values("e")
        .map(|id| Target::Record(id.to_string()))
        .collect();
    out.extend(
        raw.tag_values("a")
            .filter_map(|a| a.parse::<Coordinate>().ok())
            .map(Target::Address),
    );
    out
}

/// Structural check for the record's declared kind.
pub fn validate(raw: &RawRecord, amounts: &dyn AmountExtractor) -> Result<RecordKind, Rejection> {
    let kind = raw
        .record_kind()
        .ok_or_else(|| Rejection::new(raw, "unknown_kind"))?;
    if !is_valid_record_id(&raw.id) {
        return Err(Rejection::new(raw, "bad_id"));
    }
    if !is_valid_author(&raw.author) {
        return Err(Rejection::new(raw, "bad_author"));
    }
    if !is_valid_signature(&raw.sig) {
        return Err(Rejection::new(raw, "bad_signature"));
    }
    if raw.tag_values("a").any(|a| a.parse::<Coordinate>().is_err()) {
        return Err(Rejection::new(raw, "bad_coordinate_reference"));
    }
    if raw.tag_values("e").any(|e| !is_valid_record_id(e)) {
        return Err(Rejection::new(raw, "bad_record_reference"));
    }

    match kind {
        RecordKind::Track => {
            require(raw, "d")?;
            require(raw, "title")?;
            require(raw, "url")?;
        }
        RecordKind::Release => {
            require(raw, "d")?;
            require(raw, "title")?;
        }
        RecordKind::Profile => {
            let parsed: serde_json::Value = serde_json::from_str(&raw.content)
                .map_err(|_| Rejection::new(raw, "profile_not_json"))?;
            if !parsed.is_object() {
                return Err(Rejection::new(raw, "profile_not_object"));
            }
        }
        RecordKind::Reaction => {
            if targets(raw).is_empty() {
                return Err(Rejection::new(raw, "missing_target"));
            }
        }
        RecordKind::PaidEngagement => {
            if targets(raw).is_empty() {
                return Err(Rejection::new(raw, "missing_target"));
            }
            if amounts.amount(raw).is_none() {
                return Err(Rejection::new(raw, "missing_amount"));
            }
        }
        RecordKind::Comment => {
            if targets(raw).is_empty() {
                return Err(Rejection::new(raw, "missing_target"));
            }
            if raw.content.trim().is_empty() {
                return Err(Rejection::new(raw, "empty_body"));
            }
        }
    }
    Ok(kind)
}

pub fn is_valid(raw: &RawRecord, amounts: &dyn AmountExtractor) -> bool {
    validate(raw, amounts).is_ok()
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn provenance(raw: &RawRecord) -> Provenance {
    Provenance {
        id: raw.id.clone(),
        author: raw.author.clone(),
        created_at: raw.created_at,
        coordinate: raw.coordinate(),
    }
}

fn optional(raw: &RawRecord, name: &str) -> Option<String> {
    raw.tag_value(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[derive(Deserialize, Default)]
struct ProfileContent {
    name: Option<String>,
    display_name: Option<String>,
    #[serde(rename = "displayName")]
    display_name_camel: Option<String>,
    picture: Option<String>,
    about: Option<String>,
    lud16: Option<String>,
}

/// Convert a raw record into its domain type. Validates first, so anything
/// that would make construction fail is reported as a rejection.
pub fn convert(raw: &RawRecord, amounts: &dyn AmountExtractor) -> Result<DomainRecord, Rejection> {
    let kind = validate(raw, amounts)?;
    let text = |name: &str| optional(raw, name).unwrap_or_default();

    let record = match kind {
        RecordKind::Track => DomainRecord::Track(Track {
            provenance: provenance(raw),
            title: text("title"),
            media_url: text("url"),
            artist: optional(raw, "artist"),
            image_url: optional(raw, "image"),
            duration_secs: raw
                .tag_value("duration")
                .and_then(|d| d.trim().parse().ok()),
            genres: raw
                .tag_values("t")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        }),
        RecordKind::Release => DomainRecord::Release(Release {
            provenance: provenance(raw),
            title: text("title"),
            description: optional(raw, "description").or_else(|| {
                let body = raw.content.trim();
                (!body.is_empty()).then(|| body.to_string())
            }),
            image_url: optional(raw, "image"),
            tracks: raw
                .tag_values("a")
                .filter_map(|a| a.parse::<Coordinate>().ok())
                .filter(|c| c.kind == RecordKind::Track)
                .collect(),
            is_playlist: raw.tag_values("t").any(|t| t == "playlist"),
        }),
        RecordKind::Profile => {
            let content: ProfileContent = serde_json::from_str(&raw.content).unwrap_or_default();
            DomainRecord::Profile(ProfileInfo {
                provenance: provenance(raw),
                name: content.name,
                display_name: content.display_name.or(content.display_name_camel),
                picture: content.picture,
                about: content.about,
                lud16: content.lud16,
            })
        }
        RecordKind::Reaction => DomainRecord::Engagement(EngagementReceipt {
            provenance: provenance(raw),
            targets: targets(raw),
            engagement: Engagement::Reaction {
                symbol: match raw.content.trim() {
                    "" => "+".to_string(),
                    s => s.to_string(),
                },
            },
        }),
        RecordKind::PaidEngagement => DomainRecord::Engagement(EngagementReceipt {
            provenance: provenance(raw),
            targets: targets(raw),
            engagement: Engagement::Paid {
                amount: amounts.amount(raw).unwrap_or(0),
            },
        }),
        RecordKind::Comment => {
            let all = targets(raw);
            // Address references are more specific than record ids for
            // mutable targets; prefer them.
            let target = all
                .iter()
                .find(|t| matches!(t, Target::Address(_)))
                .or_else(|| all.first())
                .cloned()
                .ok_or_else(|| Rejection::new(raw, "missing_target"))?;
            DomainRecord::Comment(Comment {
                provenance: provenance(raw),
                target,
                body: raw.content.trim().to_string(),
            })
        }
    };
    Ok(record)
}

/// Result of converting a batch of raw records.
#[derive(Debug, Default)]
pub struct Converted {
    pub records: Vec<DomainRecord>,
    pub rejected: Vec<Rejection>,
}

pub fn convert_batch<'a, I>(raws: I, amounts: &dyn AmountExtractor) -> Converted
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut out = Converted::default();
    for raw in raws {
        match convert(raw, amounts) {
            Ok(record) => out.records.push(record),
            Err(rejection) => out.rejected.push(rejection),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(c: char, n: usize) -> String {
        std::iter::repeat(c).take(n).collect()
    }

    fn raw(kind: u32, tags: &[&[&str]], content: &str) -> RawRecord {
        RawRecord {
            id: hex('1', 64),
            author: hex('a', 64),
            kind,
            created_at: 1_700_000_000,
            tags: tags
                .iter()
                .map(|t| t.iter().map(|s| s.to_string()).collect())
                .collect(),
            content: content.to_string(),
            sig: hex('f', 128),
        }
    }

    fn track_ref() -> String {
        format!("31337:{}:song-1", hex('b', 64))
    }

    #[test]
    fn valid_track_converts_with_optional_fields() {
        let r = raw(
            31337,
            &[
                &["d", "song-1"],
                &["title", "Low Tide"],
                &["url", "https://cdn.example/low-tide.mp3"],
                &["duration", "212"],
                &["t", "ambient"],
                &["x-unknown", "ignored"],
            ],
            "",
        );
        let DomainRecord::Track(track) = convert(&r, &AmountTagExtractor).unwrap() else {
            panic!("expected track");
        };
        assert_eq!(track.title, "Low Tide");
        assert_eq!(track.duration_secs, Some(212));
        assert_eq!(track.genres, vec!["ambient"]);
        assert_eq!(
            track.provenance.coordinate.unwrap().identifier,
            "song-1"
        );
    }

    #[test]
    fn track_without_title_rejected() {
        let r = raw(31337, &[&["d", "x"], &["title", "  "], &["url", "u"]], "");
        assert_eq!(
            validate(&r, &AmountTagExtractor).unwrap_err().reason,
            "missing_title"
        );
    }

    #[test]
    fn unparseable_duration_is_ignored_not_fatal() {
        let r = raw(
            31337,
            &[&["d", "x"], &["title", "t"], &["url", "u"], &["duration", "3:30"]],
            "",
        );
        let DomainRecord::Track(track) = convert(&r, &AmountTagExtractor).unwrap() else {
            panic!("expected track");
        };
        assert_eq!(track.duration_secs, None);
    }

    #[test]
    fn bad_author_rejected() {
        let mut r = raw(31337, &[&["d", "x"], &["title", "t"], &["url", "u"]], "");
        r.author = "NotHex".into();
        assert!(!is_valid(&r, &AmountTagExtractor));
    }

    #[test]
    fn unknown_kind_rejected() {
        let r = raw(4242, &[], "");
        assert_eq!(
            validate(&r, &AmountTagExtractor).unwrap_err().reason,
            "unknown_kind"
        );
    }

    #[test]
    fn release_collects_track_references_in_order() {
        let second = format!("31337:{}:song-2", hex('b', 64));
        let r = raw(
            34139,
            &[
                &["d", "tape"],
                &["title", "Summer Tape"],
                &["a", &track_ref()],
                &["a", &second],
                &["t", "playlist"],
            ],
            "liner notes",
        );
        let DomainRecord::Release(release) = convert(&r, &AmountTagExtractor).unwrap() else {
            panic!("expected release");
        };
        assert_eq!(release.tracks.len(), 2);
        assert_eq!(release.tracks[1].identifier, "song-2");
        assert!(release.is_playlist);
        assert_eq!(release.description.as_deref(), Some("liner notes"));
    }

    #[test]
    fn coordinate_reference_with_wrong_arity_rejected() {
        let bad = format!("31337:{}", hex('b', 64));
        let r = raw(34139, &[&["d", "tape"], &["title", "t"], &["a", &bad]], "");
        assert_eq!(
            validate(&r, &AmountTagExtractor).unwrap_err().reason,
            "bad_coordinate_reference"
        );
    }

    #[test]
    fn profile_must_be_json_object() {
        assert!(!is_valid(&raw(0, &[], "not json"), &AmountTagExtractor));
        assert!(!is_valid(&raw(0, &[], "[1,2]"), &AmountTagExtractor));
        let DomainRecord::Profile(p) =
            convert(&raw(0, &[], r#"{"displayName":"Moth"}"#), &AmountTagExtractor).unwrap()
        else {
            panic!("expected profile");
        };
        assert_eq!(p.label(), Some("Moth"));
    }

    #[test]
    fn paid_engagement_needs_amount() {
        let target = track_ref();
        let without = raw(9735, &[&["a", &target]], "");
        assert_eq!(
            validate(&without, &AmountTagExtractor).unwrap_err().reason,
            "missing_amount"
        );

        let with = raw(9735, &[&["a", &target], &["amount", "21000"]], "");
        let DomainRecord::Engagement(receipt) = convert(&with, &AmountTagExtractor).unwrap() else {
            panic!("expected receipt");
        };
        assert_eq!(receipt.amount(), 21);
    }

    #[test]
    fn empty_reaction_defaults_to_plus() {
        let r = raw(7, &[&["e", &hex('2', 64)]], "");
        let DomainRecord::Engagement(receipt) = convert(&r, &AmountTagExtractor).unwrap() else {
            panic!("expected receipt");
        };
        assert_eq!(
            receipt.engagement,
            Engagement::Reaction {
                symbol: "+".into()
            }
        );
    }

    #[test]
    fn comment_prefers_address_target() {
        let r = raw(1, &[&["e", &hex('2', 64)], &["a", &track_ref()]], "great mix");
        let DomainRecord::Comment(c) = convert(&r, &AmountTagExtractor).unwrap() else {
            panic!("expected comment");
        };
        assert!(matches!(c.target, Target::Address(_)));
    }

    #[test]
    fn one_bad_record_does_not_abort_batch() {
        let good = raw(31337, &[&["d", "x"], &["title", "t"], &["url", "u"]], "");
        let mut bad = good.clone();
        bad.sig = "short".into();
        let converted = convert_batch([&bad, &good, &bad], &AmountTagExtractor);
        assert_eq!(converted.records.len(), 1);
        assert_eq!(converted.rejected.len(), 2);
        assert_eq!(converted.rejected[0].reason, "bad_signature");
    }
}
