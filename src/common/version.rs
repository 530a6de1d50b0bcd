//! Dotted numeric versions (`1`, `2.1`, `4.2`).

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::FlowmendError;

/// A node type version compared component-wise, so `2.10 > 2.9` and
/// `2 == 2.0`.
#[derive(Debug, Clone, Default)]
pub struct Version(Vec<u32>);

impl Version {
    pub fn new(parts: Vec<u32>) -> Self {
        Self(parts)
    }

    /// Convert a `typeVersion` number into a version.
    pub fn from_f64(v: f64) -> Self {
        format!("{}", v).parse().unwrap_or_default()
    }

    /// The version as a `typeVersion` number.
    pub fn as_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(0.0)
    }

    fn trimmed(&self) -> &[u32] {
        let end = self.0.iter().rposition(|p| *p != 0).map(|i| i + 1).unwrap_or(0);
        &self.0[..end]
    }
}

impl FromStr for Version {
    type Err = FlowmendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('v');
        if s.is_empty() {
            return Err(FlowmendError::Convert("empty version string".to_string()));
        }
        let parts = s
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| FlowmendError::Convert(format!("invalid version '{}'", s))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(parts))
    }
}

impl fmt::Display for Version {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let parts: Vec<String> = match self.0.len() {
            0 => vec!["0".to_string()],
            _ => self.0.iter().map(|p| p.to_string()).collect(),
        };
        write!(f, "{}", parts.join("."))
    }
}

impl PartialEq for Version {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.trimmed() == other.trimmed()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::String(s) => s.parse().map_err(serde::de::Error::custom),
            serde_json::Value::Number(n) => n.as_f64().map(Version::from_f64).ok_or_else(|| serde::de::Error::custom("invalid version number")),
            other => Err(serde::de::Error::custom(format!("invalid version: {}", other))),
        }
    }
}

impl From<f64> for Version {
    fn from(v: f64) -> Self {
        Version::from_f64(v)
    }
}
