use std::str::FromStr;

use crate::StoreError;

/// Path to a collection, e.g. `shops` or `shops/abc/history`.
///
/// Root collections have one segment; subcollections hang off a document
/// and therefore always have an odd number of segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Creates a root-level collection path.
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Returns the path of a document in this collection.
    pub fn doc(&self, id: impl AsRef<str>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.as_ref().to_string(),
        }
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to a single document: its parent collection plus its id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// Returns the collection containing this document.
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Returns the document id (last path segment).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the path of a subcollection under this document.
    pub fn subcollection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}/{}", self.collection.0, self.id, name))
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection.0, self.id)
    }
}

impl FromStr for DocumentPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('/').collect();
        if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty())
        {
            return Err(StoreError::InvalidPath(s.to_string()));
        }
        let (collection, id) = s
            .rsplit_once('/')
            .ok_or_else(|| StoreError::InvalidPath(s.to_string()))?;
        Ok(CollectionPath(collection.to_string()).doc(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_paths() {
        let history = CollectionPath::root("shops")
            .doc("shop-1")
            .subcollection("history");
        assert_eq!(history.as_str(), "shops/shop-1/history");

        let record = history.doc("order-9");
        assert_eq!(record.to_string(), "shops/shop-1/history/order-9");
        assert_eq!(record.id(), "order-9");
        assert_eq!(record.collection(), &history);
    }

    #[test]
    fn parses_document_paths() {
        let path: DocumentPath = "users/u1/history/o1".parse().unwrap();
        assert_eq!(path.collection().as_str(), "users/u1/history");
        assert_eq!(path.id(), "o1");
    }

    #[test]
    fn rejects_collection_paths_as_documents() {
        assert!("users".parse::<DocumentPath>().is_err());
        assert!("users/u1/history".parse::<DocumentPath>().is_err());
        assert!("users//x".parse::<DocumentPath>().is_err());
    }
}
