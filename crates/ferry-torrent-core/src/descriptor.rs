//! Magnet descriptor parsing and discovery endpoint augmentation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;
use url::form_urlencoded::Serializer;

use crate::error::{TransferError, TransferResult};

const MAGNET_SCHEME: &str = "magnet";

/// Stable identifier derived from a descriptor's exact topic.
///
/// Always non-empty lowercase ASCII alphanumerics, so it is safe to use as a
/// file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Accept an identifier that is already in canonical form.
    ///
    /// Returns `None` for empty input or anything outside `[a-z0-9]`.
    #[must_use]
    pub fn from_canonical(value: &str) -> Option<Self> {
        is_canonical(value).then(|| Self(value.to_string()))
    }

    /// Derive the identifier for an exact-topic value such as `urn:btih:ABC123`.
    ///
    /// The segment after the last `:` is used when it is plain alphanumerics;
    /// anything else is hashed.
    #[must_use]
    pub fn from_exact_topic(topic: &str) -> Self {
        let tail = topic.rsplit(':').next().unwrap_or(topic).to_ascii_lowercase();
        if is_canonical(&tail) {
            return Self(tail);
        }
        Self(format!("{:x}", Sha256::digest(topic.as_bytes())))
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_canonical(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed magnet locator.
///
/// Immutable once parsed; [`ContentDescriptor::with_trackers`] returns a new
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    exact_topic: String,
    content_id: ContentId,
    display_name: Option<String>,
    trackers: Vec<String>,
    extra: Vec<(String, String)>,
}

impl ContentDescriptor {
    /// Parse a magnet URI.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidDescriptor`] when the input is not a
    /// magnet URI or carries no `xt` parameter.
    pub fn parse(input: &str) -> TransferResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TransferError::invalid_descriptor("descriptor is empty", trimmed));
        }
        let url = Url::parse(trimmed)
            .map_err(|_| TransferError::invalid_descriptor("descriptor is not a uri", trimmed))?;
        if url.scheme() != MAGNET_SCHEME {
            return Err(TransferError::invalid_descriptor(
                "descriptor must use the magnet scheme",
                trimmed,
            ));
        }

        let mut exact_topic = None;
        let mut display_name = None;
        let mut trackers: Vec<String> = Vec::new();
        let mut extra = Vec::new();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" if exact_topic.is_none() && !value.trim().is_empty() => {
                    exact_topic = Some(value.trim().to_string());
                }
                "dn" if display_name.is_none() => display_name = Some(value.into_owned()),
                "tr" => {
                    let tracker = value.trim();
                    if !tracker.is_empty() && !trackers.iter().any(|known| known == tracker) {
                        trackers.push(tracker.to_string());
                    }
                }
                _ => extra.push((key.into_owned(), value.into_owned())),
            }
        }

        let exact_topic = exact_topic.ok_or_else(|| {
            TransferError::invalid_descriptor("descriptor has no xt parameter", trimmed)
        })?;
        Ok(Self {
            content_id: ContentId::from_exact_topic(&exact_topic),
            exact_topic,
            display_name,
            trackers,
            extra,
        })
    }

    /// Identifier used to key checkpoints.
    #[must_use]
    pub const fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    /// Raw `xt` value.
    #[must_use]
    pub fn exact_topic(&self) -> &str {
        &self.exact_topic
    }

    /// `dn` value, when the descriptor carries one.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Tracker endpoints in first-seen order, without duplicates.
    #[must_use]
    pub fn trackers(&self) -> &[String] {
        &self.trackers
    }

    /// Union `endpoints` into a copy of this descriptor.
    ///
    /// Endpoints already present (or repeated within `endpoints`) are skipped,
    /// so applying the same list twice is a no-op.
    #[must_use]
    pub fn with_trackers<I, S>(&self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        for endpoint in endpoints {
            let endpoint = endpoint.as_ref().trim();
            if !endpoint.is_empty() && !next.trackers.iter().any(|known| known == endpoint) {
                next.trackers.push(endpoint.to_string());
            }
        }
        next
    }

    /// Render back to a magnet URI.
    #[must_use]
    pub fn to_uri(&self) -> String {
        let mut query = Serializer::new(String::new());
        query.append_pair("xt", &self.exact_topic);
        if let Some(name) = &self.display_name {
            query.append_pair("dn", name);
        }
        for tracker in &self.trackers {
            query.append_pair("tr", tracker);
        }
        for (key, value) in &self.extra {
            query.append_pair(key, value);
        }
        format!("{MAGNET_SCHEME}:?{}", query.finish())
    }
}

impl FromStr for ContentDescriptor {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "magnet:?xt=urn:btih:ABC123&dn=Some%20Show&tr=udp%3A%2F%2Fa.example%3A80";

    #[test]
    fn parse_extracts_fields() -> anyhow::Result<()> {
        let descriptor = ContentDescriptor::parse(SAMPLE)?;
        assert_eq!(descriptor.content_id().as_str(), "abc123");
        assert_eq!(descriptor.exact_topic(), "urn:btih:ABC123");
        assert_eq!(descriptor.display_name(), Some("Some Show"));
        assert_eq!(descriptor.trackers(), ["udp://a.example:80".to_string()]);
        Ok(())
    }

    #[test]
    fn parse_rejects_bad_input() {
        for input in [
            "",
            "   ",
            "not a uri",
            "https://example.com/?xt=urn:btih:abc",
            "magnet:?dn=nothing",
            "magnet:?xt=",
        ] {
            let err = ContentDescriptor::parse(input).expect_err(input);
            assert!(
                matches!(err, TransferError::InvalidDescriptor { .. }),
                "{input}: {err:?}"
            );
        }
    }

    #[test]
    fn tracker_union_is_idempotent() -> anyhow::Result<()> {
        let descriptor = ContentDescriptor::parse(SAMPLE)?;
        let defaults = ["udp://b.example:1337", "udp://a.example:80"];
        let once = descriptor.with_trackers(defaults);
        let twice = once.with_trackers(defaults);
        assert_eq!(once, twice);
        assert_eq!(
            twice
                .trackers()
                .iter()
                .filter(|t| t.as_str() == "udp://b.example:1337")
                .count(),
            1
        );
        assert_eq!(descriptor.trackers().len(), 1, "input left untouched");
        Ok(())
    }

    #[test]
    fn uri_round_trips_through_parse() -> anyhow::Result<()> {
        let descriptor = ContentDescriptor::parse(SAMPLE)?.with_trackers(["udp://c.example:6969"]);
        let reparsed: ContentDescriptor = descriptor.to_uri().parse()?;
        assert_eq!(reparsed, descriptor);
        Ok(())
    }

    #[test]
    fn opaque_topics_are_hashed() {
        let id = ContentId::from_exact_topic("urn:sha1:not/alnum");
        assert_eq!(id.as_str().len(), 64);
        assert!(ContentId::from_canonical(id.as_str()).is_some());
        assert!(ContentId::from_canonical("../etc").is_none());
        assert!(ContentId::from_canonical("").is_none());
    }
}
