use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::{
    replicate_between, DocumentStore, ReplicationOptions, ReplicationReport, StoreClient,
    StoreError,
};
use crate::document::{AllDocsOptions, DocRow, Document, Revision, WriteResult};

type Registry = Arc<RwLock<HashMap<String, Table>>>;

/// Documents of one database, keyed by id
type Table = BTreeMap<String, Document>;

/// A replication the client was asked to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationRecord {
    pub source: String,
    pub target: String,
    pub options: ReplicationOptions,
}

/// Embedded, in-process document store
///
/// Every database opened through the same client (or its clones) lives in
/// one shared registry, so replication between two locators is a copy
/// between two tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreClient {
    registry: Registry,
    replications: Arc<Mutex<Vec<ReplicationRecord>>>,
}

impl MemoryStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the databases that currently exist
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn exists(&self, locator: &str) -> bool {
        self.registry.read().contains_key(locator)
    }

    pub fn doc_count(&self, locator: &str) -> usize {
        self.registry
            .read()
            .get(locator)
            .map(|table| table.len())
            .unwrap_or(0)
    }

    /// Every replication requested so far, oldest first
    pub fn replications(&self) -> Vec<ReplicationRecord> {
        self.replications.lock().clone()
    }
}

#[async_trait]
impl StoreClient for MemoryStoreClient {
    type Store = MemoryStore;

    async fn destroy(&self, locator: &str) -> Result<(), StoreError> {
        let existed = self.registry.write().remove(locator).is_some();
        tracing::debug!(locator, existed, "destroyed embedded database");
        Ok(())
    }

    fn open(&self, locator: &str) -> Result<Self::Store, StoreError> {
        Ok(MemoryStore {
            locator: locator.to_string(),
            registry: self.registry.clone(),
        })
    }

    async fn replicate(
        &self,
        source: &str,
        target: &str,
        options: &ReplicationOptions,
    ) -> Result<ReplicationReport, StoreError> {
        self.replications.lock().push(ReplicationRecord {
            source: source.to_string(),
            target: target.to_string(),
            options: *options,
        });
        replicate_between(&self.open(source)?, &self.open(target)?, options).await
    }
}

/// Handle on one embedded database
#[derive(Debug, Clone)]
pub struct MemoryStore {
    locator: String,
    registry: Registry,
}

impl MemoryStore {
    /// Validate a write against the current table and stamp the new revision
    fn stage(table: &Table, mut doc: Document) -> Result<(String, Document), StoreError> {
        let id = doc
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let current = table.get(&id).and_then(|existing| existing.rev.clone());
        if current != doc.rev {
            return Err(StoreError::Conflict(id));
        }

        let previous = current.as_deref().and_then(Revision::parse);
        doc.id = Some(id.clone());
        doc.rev = Some(Revision::next(previous.as_ref()).to_string());
        Ok((id, doc))
    }

    fn result_of(id: String, doc: &Document) -> WriteResult {
        WriteResult {
            id,
            rev: doc.rev.clone().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn locator(&self) -> &str {
        &self.locator
    }

    async fn ensure_exists(&self) -> Result<(), StoreError> {
        self.registry
            .write()
            .entry(self.locator.clone())
            .or_default();
        Ok(())
    }

    async fn put(&self, doc: Document) -> Result<WriteResult, StoreError> {
        let mut registry = self.registry.write();
        let table = registry.entry(self.locator.clone()).or_default();

        let (id, doc) = Self::stage(table, doc)?;
        let result = Self::result_of(id.clone(), &doc);
        table.insert(id, doc);
        Ok(result)
    }

    async fn bulk_insert(&self, docs: Vec<Document>) -> Result<Vec<WriteResult>, StoreError> {
        let mut registry = self.registry.write();
        let table = registry.entry(self.locator.clone()).or_default();

        // Stage everything first so a single conflict leaves the table untouched
        let mut staged: Vec<(String, Document)> = Vec::with_capacity(docs.len());
        for doc in docs {
            let (id, doc) = Self::stage(table, doc)?;
            if staged.iter().any(|(other, _)| *other == id) {
                return Err(StoreError::Conflict(id));
            }
            staged.push((id, doc));
        }

        Ok(staged
            .into_iter()
            .map(|(id, doc)| {
                let result = Self::result_of(id.clone(), &doc);
                table.insert(id, doc);
                result
            })
            .collect())
    }

    async fn all_docs(&self, options: AllDocsOptions) -> Result<Vec<DocRow>, StoreError> {
        let registry = self.registry.read();
        let Some(table) = registry.get(&self.locator) else {
            return Ok(Vec::new());
        };

        Ok(table
            .iter()
            .map(|(id, doc)| DocRow {
                id: id.clone(),
                rev: doc.rev.clone().unwrap_or_default(),
                doc: options.include_docs.then(|| doc.clone()),
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        self.registry
            .read()
            .get(&self.locator)
            .and_then(|table| table.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn write_replicated(&self, docs: Vec<Document>) -> Result<usize, StoreError> {
        let mut registry = self.registry.write();
        let table = registry.entry(self.locator.clone()).or_default();

        let mut written = 0;
        for doc in docs {
            let (Some(id), Some(rev)) = (doc.id.clone(), doc.rev.as_deref()) else {
                return Err(StoreError::InvalidDocument(
                    "replicated document is missing _id or _rev".to_string(),
                ));
            };
            let incoming = Revision::parse(rev)
                .ok_or_else(|| StoreError::InvalidDocument(format!("bad revision {}", rev)))?;

            let current = table
                .get(&id)
                .and_then(|existing| existing.rev.as_deref())
                .and_then(Revision::parse);

            if current.map_or(true, |current| incoming > current) {
                table.insert(id, doc);
                written += 1;
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_assigns_ids_and_revisions() {
        let client = MemoryStoreClient::new();
        let db = client.open("local").unwrap();

        let named = db.put(Document::with_id("bar").field("foo", "bar")).await.unwrap();
        assert_eq!(named.id, "bar");
        assert!(named.rev.starts_with("1-"));

        let anonymous = db.put(Document::new().field("silly", "x")).await.unwrap();
        assert_eq!(anonymous.id.len(), 32);
        assert_eq!(client.doc_count("local"), 2);
    }

    #[tokio::test]
    async fn test_put_requires_current_revision() {
        let client = MemoryStoreClient::new();
        let db = client.open("local").unwrap();

        let first = db.put(Document::with_id("bar")).await.unwrap();

        let stale = db.put(Document::with_id("bar").field("v", 2)).await;
        assert!(matches!(stale, Err(StoreError::Conflict(id)) if id == "bar"));

        let mut update = Document::with_id("bar").field("v", 2);
        update.rev = Some(first.rev);
        let second = db.put(update).await.unwrap();
        assert!(second.rev.starts_with("2-"));
    }

    #[tokio::test]
    async fn test_bulk_insert_is_all_or_nothing() {
        let client = MemoryStoreClient::new();
        let db = client.open("local").unwrap();
        db.put(Document::with_id("taken")).await.unwrap();

        let batch = vec![Document::with_id("fresh"), Document::with_id("taken")];
        assert!(db.bulk_insert(batch).await.is_err());
        assert_eq!(client.doc_count("local"), 1);

        let batch = (0..10).map(|_| Document::new().field("silly", "t1")).collect();
        let results = db.bulk_insert(batch).await.unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(client.doc_count("local"), 11);
    }

    #[tokio::test]
    async fn test_destroy_missing_database_is_ok() {
        let client = MemoryStoreClient::new();
        client.destroy("never-created").await.unwrap();

        let db = client.open("local").unwrap();
        db.put(Document::with_id("a")).await.unwrap();
        assert!(client.exists("local"));

        client.destroy("local").await.unwrap();
        assert!(!client.exists("local"));
        assert!(matches!(db.get("a").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_all_docs_orders_by_id() {
        let client = MemoryStoreClient::new();
        let db = client.open("local").unwrap();
        for id in ["c", "a", "b"] {
            db.put(Document::with_id(id)).await.unwrap();
        }

        let rows = db.all_docs(AllDocsOptions::default()).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(rows.iter().all(|r| r.doc.is_none()));

        let rows = db.all_docs(AllDocsOptions::with_docs()).await.unwrap();
        assert!(rows.iter().all(|r| r.doc.is_some()));
    }

    #[tokio::test]
    async fn test_replication_keeps_highest_revision() {
        let client = MemoryStoreClient::new();
        let source = client.open("source").unwrap();
        let target = client.open("target").unwrap();

        let first = source.put(Document::with_id("doc").field("v", 1)).await.unwrap();
        let report = client
            .replicate("source", "target", &ReplicationOptions::default().create_target())
            .await
            .unwrap();
        assert_eq!(report.docs_read, 1);
        assert_eq!(report.docs_written, 1);

        let mut update = Document::with_id("doc").field("v", 2);
        update.rev = Some(first.rev);
        source.put(update).await.unwrap();

        // Replicating twice only writes the newer revision once
        client
            .replicate("source", "target", &ReplicationOptions::default())
            .await
            .unwrap();
        let again = client
            .replicate("source", "target", &ReplicationOptions::default())
            .await
            .unwrap();
        assert_eq!(again.docs_written, 0);

        let copy = target.get("doc").await.unwrap();
        assert_eq!(copy.get_field("v"), Some(&serde_json::Value::from(2)));
        assert_eq!(client.replications().len(), 3);
    }
}
