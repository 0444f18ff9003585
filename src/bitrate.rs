//! Bitrate normalization against a profile's discrete rate set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A requested bitrate as supplied by the user or a config file.
///
/// Requests are never rejected; they are snapped with [`normalize`] when a
/// descriptor is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BitrateRequest {
    Kbps(i64),
    Text(String),
}

impl BitrateRequest {
    /// Snap this request to `allowed`.
    pub fn normalize(&self, allowed: &[u32]) -> u32 {
        match self {
            BitrateRequest::Kbps(kbps) => normalize_kbps(*kbps, allowed),
            BitrateRequest::Text(text) => normalize(text, allowed),
        }
    }
}

impl From<u32> for BitrateRequest {
    fn from(kbps: u32) -> Self {
        BitrateRequest::Kbps(i64::from(kbps))
    }
}

impl From<&str> for BitrateRequest {
    fn from(text: &str) -> Self {
        BitrateRequest::Text(text.to_string())
    }
}

impl std::str::FromStr for BitrateRequest {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<i64>() {
            Ok(kbps) => BitrateRequest::Kbps(kbps),
            Err(_) => BitrateRequest::Text(s.to_string()),
        })
    }
}

impl fmt::Display for BitrateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitrateRequest::Kbps(kbps) => write!(f, "{kbps}"),
            BitrateRequest::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Snap a textual bitrate request to `allowed` (sorted ascending, non-empty).
///
/// - Not an integer: the **maximum** allowed rate.
/// - A member of `allowed`: returned unchanged.
/// - Otherwise the largest member not above the request, or the **minimum**
///   when the request is below every member.
///
/// Note the two fallbacks differ: unparseable goes to the ceiling, too low
/// goes to the floor.
pub fn normalize(requested: &str, allowed: &[u32]) -> u32 {
    match requested.trim().parse::<i64>() {
        Ok(kbps) => normalize_kbps(kbps, allowed),
        Err(_) => allowed.last().copied().unwrap_or_default(),
    }
}

/// Snap an integral request to `allowed` (sorted ascending, non-empty).
pub fn normalize_kbps(requested: i64, allowed: &[u32]) -> u32 {
    allowed
        .iter()
        .rev()
        .find(|&&rate| i64::from(rate) <= requested)
        .or_else(|| allowed.first())
        .copied()
        .unwrap_or_default()
}
