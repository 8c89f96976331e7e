use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON document as stored in a document database
///
/// The id and revision live beside the body and serialize with the
/// CouchDB field names (`_id`, `_rev`), so a `Document` round-trips
/// through the HTTP API unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Document {
    /// An id-less document; the store assigns the id on insert
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Builder-style field setter
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn rev(&self) -> Option<&str> {
        self.rev.as_deref()
    }
}

/// Outcome of a single write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub id: String,
    pub rev: String,
}

/// One row of an `all_docs` listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRow {
    pub id: String,
    pub rev: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllDocsOptions {
    pub include_docs: bool,
}

impl AllDocsOptions {
    pub fn with_docs() -> Self {
        Self { include_docs: true }
    }
}

/// A parsed `<generation>-<hash>` revision string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub generation: u64,
    pub hash: String,
}

impl Revision {
    pub fn parse(rev: &str) -> Option<Self> {
        let (generation, hash) = rev.split_once('-')?;
        Some(Self {
            generation: generation.parse().ok()?,
            hash: hash.to_string(),
        })
    }

    /// The revision that follows `previous` (or the first revision)
    pub fn next(previous: Option<&Revision>) -> Self {
        Self {
            generation: previous
                .map(|r| r.generation.saturating_add(1))
                .unwrap_or(1),
            hash: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.generation, self.hash)
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Higher generation wins; ties break on the hash so every replica picks the same winner
impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_serializes_with_couch_field_names() {
        let doc = Document::with_id("bar").field("foo", "bar");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json, serde_json::json!({"_id": "bar", "foo": "bar"}));

        let parsed: Document =
            serde_json::from_value(serde_json::json!({"_id": "x", "_rev": "1-abc", "n": 3}))
                .unwrap();
        assert_eq!(parsed.id(), Some("x"));
        assert_eq!(parsed.rev(), Some("1-abc"));
        assert_eq!(parsed.get_field("n"), Some(&Value::from(3)));
    }

    #[test]
    fn test_revision_ordering() {
        let a = Revision::parse("2-aaa").unwrap();
        let b = Revision::parse("10-000").unwrap();
        assert!(b > a);
        assert!(Revision::parse("nonsense").is_none());
        assert!(Revision::parse("x-abc").is_none());

        let next = Revision::next(Some(&b));
        assert_eq!(next.generation, 11);
        assert_eq!(Revision::next(None).generation, 1);
    }

    #[test]
    fn test_next_revision_saturates_at_the_largest_generation() {
        let last = Revision::parse(&format!("{}-abc", u64::MAX)).unwrap();
        assert_eq!(Revision::next(Some(&last)).generation, u64::MAX);
    }
}
