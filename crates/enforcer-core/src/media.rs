//! Media type matching and `Accept` negotiation.

use std::cmp::Ordering;

/// A parsed media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    quality: f32,
}

impl MediaRange {
    /// Specificity of the range: exact, `type/*`, `*/*`.
    fn specificity(&self) -> u8 {
        match (self.kind.as_str(), self.subtype.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }

    fn covers(&self, kind: &str, subtype: &str) -> bool {
        (self.kind == "*" || self.kind == kind) && (self.subtype == "*" || self.subtype == subtype)
    }
}

/// Strips parameters and lowercases a media type (`Application/JSON; charset=utf-8`
/// becomes `application/json`).
#[must_use]
pub fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn split(media_type: &str) -> (String, String) {
    let essence = essence(media_type);
    match essence.split_once('/') {
        Some((kind, subtype)) => (kind.to_string(), subtype.to_string()),
        None => (essence, "*".to_string()),
    }
}

/// Returns `true` when two media types are compatible. Either side may be a
/// wildcard range.
#[must_use]
pub fn matches(declared: &str, actual: &str) -> bool {
    let (dk, ds) = split(declared);
    let (ak, as_) = split(actual);
    (dk == "*" || ak == "*" || dk == ak) && (ds == "*" || as_ == "*" || ds == as_)
}

/// Returns `true` for `application/json` and `+json` suffixed types.
#[must_use]
pub fn is_json(media_type: &str) -> bool {
    let (kind, subtype) = split(media_type);
    kind == "application" && (subtype == "json" || subtype.ends_with("+json"))
}

fn parse_accept(header_value: &str) -> Vec<MediaRange> {
    let mut ranges = Vec::new();

    for part in header_value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let mut quality = 1.0f32;
        let mut params = part.split(';');
        let (kind, subtype) = split(params.next().unwrap_or_default());

        for param in params {
            if let Some(q_value) = param.trim().strip_prefix("q=") {
                if let Ok(q) = q_value.trim().parse::<f32>() {
                    quality = q.clamp(0.0, 1.0);
                }
            }
        }

        ranges.push(MediaRange {
            kind,
            subtype,
            quality,
        });
    }

    ranges
}

/// Picks the declared media type that best satisfies an `Accept` header.
///
/// Each available type takes the quality of the most specific range that
/// covers it. Types with quality zero are excluded. The highest quality wins
/// and ties go to declaration order. Without an `Accept` header the first
/// declared type is chosen.
///
/// # Example
///
/// ```
/// use enforcer_core::media::negotiate;
///
/// let available = ["application/json", "text/plain"];
/// assert_eq!(
///     negotiate(Some("text/*;q=0.9, application/json;q=0.5"), &available).as_deref(),
///     Some("text/plain")
/// );
/// assert_eq!(negotiate(None, &available).as_deref(), Some("application/json"));
/// assert_eq!(negotiate(Some("image/png"), &available), None);
/// ```
#[must_use]
pub fn negotiate(accept: Option<&str>, available: &[&str]) -> Option<String> {
    let accept = accept.map(str::trim).filter(|a| !a.is_empty());
    let Some(accept) = accept else {
        return available.first().map(ToString::to_string);
    };

    let ranges = parse_accept(accept);
    let mut best: Option<(&str, f32)> = None;

    for candidate in available {
        let (kind, subtype) = split(candidate);
        let quality = ranges
            .iter()
            .filter(|r| r.covers(&kind, &subtype))
            .max_by_key(|r| r.specificity())
            .map_or(0.0, |r| r.quality);

        if quality <= 0.0 {
            continue;
        }
        let better = best.map_or(true, |(_, q)| {
            quality.partial_cmp(&q).unwrap_or(Ordering::Equal) == Ordering::Greater
        });
        if better {
            best = Some((candidate, quality));
        }
    }

    best.map(|(media_type, _)| media_type.to_string())
}
