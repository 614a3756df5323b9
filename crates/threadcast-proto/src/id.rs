//! Numeric-or-string event identifiers.

use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

/// A server-assigned identifier for a message or reply.
///
/// The wire is inconsistent about identifier types: a message created through
/// one path broadcasts its id as a JSON number while the reply referencing it
/// may carry the parent id as a string. Comparing the raw JSON forms silently
/// fails to match `42` against `"42"`, so equality and hashing are defined on
/// the normalized string form instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    /// Identifier delivered as a JSON number.
    Num(i64),
    /// Identifier delivered as a JSON string.
    Text(String),
}

impl EventId {
    /// Normalized string form used for all comparisons.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Self::Num(n) => Cow::Owned(n.to_string()),
            Self::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl PartialEq for EventId {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for EventId {}

impl Hash for EventId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<i64> for EventId {
    fn from(n: i64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
