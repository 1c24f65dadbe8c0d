use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{DocumentPath, Result};

/// Per-document version counter, used for optimistic concurrency control.
///
/// A document is created at version 1 and every write bumps it by one.
/// Deleting and re-creating a document starts over at 1, so transactions
/// record absence separately (`None`) rather than as a version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a freshly created document.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored document snapshot.
#[derive(Debug, Clone)]
pub struct Document {
    /// Where the document lives.
    pub path: DocumentPath,

    /// Version at the time of the read.
    pub version: Version,

    /// The document body. Always a JSON object.
    pub data: serde_json::Value,

    /// When the document was first written.
    pub created_at: DateTime<Utc>,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Deserializes the document body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Returns a top-level field of the document body.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.data.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectionPath;

    #[derive(Deserialize)]
    struct Named {
        name: String,
    }

    #[test]
    fn version_increments() {
        assert_eq!(Version::first().next(), Version::new(2));
        assert_eq!(Version::new(7).as_i64(), 7);
    }

    #[test]
    fn decodes_typed_body() {
        let doc = Document {
            path: CollectionPath::root("shops").doc("s1"),
            version: Version::first(),
            data: serde_json::json!({"name": "Noodle Bar", "extra": 1}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let named: Named = doc.decode().unwrap();
        assert_eq!(named.name, "Noodle Bar");
        assert_eq!(doc.field("extra"), Some(&serde_json::json!(1)));
    }
}
