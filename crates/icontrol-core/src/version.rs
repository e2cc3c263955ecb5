// ── Device version ordering ──
//
// Dotted software versions ("11.6.0", "12.1.2.1", "14.1.0-0.0.1")
// compared component-wise with missing components treated as zero.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// A dotted device software version.
#[derive(Debug, Clone, Eq)]
pub struct DeviceVersion {
    parts: Vec<u32>,
    raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version string '{0}'")]
pub struct VersionParseError(pub String);

impl DeviceVersion {
    pub fn parts(&self) -> &[u32] {
        &self.parts
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for DeviceVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Build suffixes ("-0.0.1", " HF1") do not take part in ordering.
        let core = trimmed
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or_default();

        let parts = core
            .split('.')
            .filter(|p| !p.is_empty())
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionParseError(s.to_owned()))?;

        if parts.is_empty() {
            return Err(VersionParseError(s.to_owned()));
        }

        Ok(Self {
            parts,
            raw: trimmed.to_owned(),
        })
    }
}

impl Ord for DeviceVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| {
                let a = self.parts.get(i).copied().unwrap_or(0);
                let b = other.parts.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for DeviceVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DeviceVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for DeviceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for DeviceVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
