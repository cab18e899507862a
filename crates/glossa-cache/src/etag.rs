//! ETags and HTTP cache policies
//!
//! An ETag is derived from the freshest timestamp of the data behind a
//! response, so any write that bumps a timestamp changes it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex characters kept from the digest
const ETAG_HEX_LEN: usize = 16;

/// Quoted strong entity tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// Digest of the maximum timestamp, `None` for an empty input
    #[must_use]
    pub fn from_timestamps<I>(timestamps: I) -> Option<Self>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let latest = timestamps.into_iter().max()?;
        let stamp = latest.to_rfc3339_opts(SecondsFormat::Nanos, true);
        Some(Self::from_bytes(stamp.as_bytes()))
    }

    /// Digest of arbitrary bytes
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        let hex = hex::encode(&digest.as_bytes()[..ETAG_HEX_LEN / 2]);
        Self(format!("\"{hex}\""))
    }

    /// Header value, quotes included
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an `If-None-Match` header value matches this tag
    #[must_use]
    pub fn matches(&self, if_none_match: &str) -> bool {
        etag_matches(if_none_match, self.as_str())
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compare an `If-None-Match` list against an ETag
///
/// Entries are comma separated; weak (`W/`) prefixes and quotes are ignored;
/// `*` matches any tag.
#[must_use]
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let expected = normalize(etag);
    if_none_match.split(',').map(str::trim).any(|candidate| {
        let candidate = normalize(candidate);
        candidate == "*" || candidate == expected
    })
}

fn normalize(value: &str) -> &str {
    let value = value.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    value.trim_matches('"')
}

/// Cache-Control policy per response kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    /// Overlay lists and reconciled views; revalidated quickly
    OverlayList,
    /// Cached file payloads and listings
    FilePayload,
    /// Manifest snapshots
    Manifest,
}

impl CachePolicy {
    /// `Cache-Control` header value
    #[must_use]
    pub const fn header_value(self) -> &'static str {
        match self {
            Self::OverlayList => "private, max-age=15, must-revalidate",
            Self::FilePayload => "private, max-age=300",
            Self::Manifest => "public, max-age=3600",
        }
    }
}

/// Outcome of a conditional read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional<T> {
    /// Client copy is current; send 304 with no body
    NotModified { etag: ETag, policy: CachePolicy },
    /// Send the body with its validators
    Fresh {
        body: T,
        etag: Option<ETag>,
        policy: CachePolicy,
    },
}

impl<T> Conditional<T> {
    #[must_use]
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified { .. })
    }

    #[must_use]
    pub fn etag(&self) -> Option<&ETag> {
        match self {
            Self::NotModified { etag, .. } => Some(etag),
            Self::Fresh { etag, .. } => etag.as_ref(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> CachePolicy {
        match self {
            Self::NotModified { policy, .. } | Self::Fresh { policy, .. } => *policy,
        }
    }
}

/// Decide between a 304 and a full response
#[must_use]
pub fn conditional<T>(
    if_none_match: Option<&str>,
    etag: Option<ETag>,
    policy: CachePolicy,
    body: T,
) -> Conditional<T> {
    match (if_none_match, etag) {
        (Some(header), Some(etag)) if etag.matches(header) => Conditional::NotModified { etag, policy },
        (_, etag) => Conditional::Fresh { body, etag, policy },
    }
}
