//! Photo key type shared by the caches and the request table

use std::fmt;
use std::str::FromStr;

/// Identifies a requested photo: either a row id in the local photo store or
/// an opaque URI (remote or file resource).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhotoKey {
    /// Row id in the local photo store
    Id(i64),
    /// Remote (`http`/`https`) or local (`file://`) resource
    Uri(String),
}

impl PhotoKey {
    /// Create a key for a photo row id
    pub const fn id(id: i64) -> Self {
        Self::Id(id)
    }

    /// Create a key for a URI
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri(uri.into())
    }

    /// Whether this key means "no photo".
    ///
    /// Row id 0 is never assigned by the store, and an empty URI points nowhere.
    pub fn is_none(&self) -> bool {
        match self {
            Self::Id(id) => *id == 0,
            Self::Uri(uri) => uri.trim().is_empty(),
        }
    }

    /// Get the row id if this is an id key
    pub const fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Uri(_) => None,
        }
    }
}

impl fmt::Display for PhotoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Uri(uri) => f.write_str(uri),
        }
    }
}

impl FromStr for PhotoKey {
    type Err = std::convert::Infallible;

    /// A decimal integer parses as an id, anything else as a URI.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(s.parse::<i64>().map_or_else(|_| Self::Uri(s.to_string()), Self::Id))
    }
}

impl From<i64> for PhotoKey {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for PhotoKey {
    fn from(uri: &str) -> Self {
        Self::Uri(uri.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!("42".parse::<PhotoKey>().unwrap(), PhotoKey::Id(42));
        assert_eq!(
            "https://example.com/a.png".parse::<PhotoKey>().unwrap(),
            PhotoKey::uri("https://example.com/a.png")
        );
    }

    #[test]
    fn test_none_keys() {
        assert!(PhotoKey::Id(0).is_none());
        assert!(PhotoKey::uri("  ").is_none());
        assert!(!PhotoKey::Id(7).is_none());
        assert!(!PhotoKey::uri("file:///tmp/a.png").is_none());
    }
}
