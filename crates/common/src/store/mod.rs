//! Document store abstraction
//!
//! The check talks to its databases through two traits:
//! - [`StoreClient`] destroys and opens databases by locator, and
//!   replicates between two locators
//! - [`DocumentStore`] is one open database
//!
//! [`Database`] pairs an open store with the client that opened it, which is
//! what lets a handle replicate to or from another locator.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::document::{AllDocsOptions, DocRow, Document, WriteResult};

pub mod memory;

pub use memory::{MemoryStore, MemoryStoreClient, ReplicationRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("database not found: {0}")]
    DatabaseNotFound(String),
    /// A write did not carry the current revision of the document
    #[error("document update conflict: {0}")]
    Conflict(String),
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        StoreError::Backend(err.into())
    }
}

/// Options for a single, one-way replication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationOptions {
    /// Create the target database if it does not exist yet
    pub create_target: bool,
    /// Ask the hub in front of the source to run the replication
    ///  instead of copying documents through this process
    pub via_hub: bool,
}

impl ReplicationOptions {
    pub fn create_target(mut self) -> Self {
        self.create_target = true;
        self
    }

    pub fn via_hub(mut self, via_hub: bool) -> Self {
        self.via_hub = via_hub;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    pub docs_read: usize,
    pub docs_written: usize,
}

/// One open document database
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// The locator this store was opened with
    fn locator(&self) -> &str;

    /// Create the database if it is missing; an existing database is left untouched
    async fn ensure_exists(&self) -> Result<(), StoreError>;

    /// Write a document. Updating an existing id requires its current revision.
    async fn put(&self, doc: Document) -> Result<WriteResult, StoreError>;

    /// Write a batch of documents in one request; either all land or none do
    async fn bulk_insert(&self, docs: Vec<Document>) -> Result<Vec<WriteResult>, StoreError>;

    /// List every document, ordered by id
    async fn all_docs(&self, options: AllDocsOptions) -> Result<Vec<DocRow>, StoreError>;

    async fn get(&self, id: &str) -> Result<Document, StoreError>;

    /// Store documents exactly as replicated from elsewhere, keeping their revisions.
    ///
    /// # Returns
    /// * `Ok(usize)` - how many documents were accepted as the new winning revision
    async fn write_replicated(&self, docs: Vec<Document>) -> Result<usize, StoreError>;
}

/// Destroys, opens and replicates databases by locator
#[async_trait]
pub trait StoreClient: Clone + Send + Sync + Debug + 'static {
    type Store: DocumentStore + Clone + 'static;

    /// Destroy the database at `locator`. A missing database is not an error.
    async fn destroy(&self, locator: &str) -> Result<(), StoreError>;

    /// Open a handle on `locator`. Nothing is created until the first write.
    fn open(&self, locator: &str) -> Result<Self::Store, StoreError>;

    /// Replicate every document from `source` into `target`
    async fn replicate(
        &self,
        source: &str,
        target: &str,
        options: &ReplicationOptions,
    ) -> Result<ReplicationReport, StoreError> {
        let source = self.open(source)?;
        let target = self.open(target)?;
        replicate_between(&source, &target, options).await
    }
}

/// Copy every document of `source` into `target`, revisions preserved
pub async fn replicate_between<S, T>(
    source: &S,
    target: &T,
    options: &ReplicationOptions,
) -> Result<ReplicationReport, StoreError>
where
    S: DocumentStore + ?Sized,
    T: DocumentStore + ?Sized,
{
    let docs: Vec<Document> = source
        .all_docs(AllDocsOptions::with_docs())
        .await?
        .into_iter()
        .filter_map(|row| row.doc)
        .collect();

    if options.create_target {
        target.ensure_exists().await?;
    }

    let docs_read = docs.len();
    let docs_written = if docs.is_empty() {
        0
    } else {
        target.write_replicated(docs).await?
    };

    tracing::debug!(
        source = source.locator(),
        target = target.locator(),
        docs_read,
        docs_written,
        "replication finished"
    );

    Ok(ReplicationReport {
        docs_read,
        docs_written,
    })
}

/// An open database together with the client that opened it
#[derive(Debug, Clone)]
pub struct Database<C: StoreClient> {
    client: C,
    store: C::Store,
}

impl<C: StoreClient> Database<C> {
    pub fn open(client: &C, locator: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: client.clone(),
            store: client.open(locator)?,
        })
    }

    pub fn locator(&self) -> &str {
        self.store.locator()
    }

    pub fn store(&self) -> &C::Store {
        &self.store
    }

    pub async fn put(&self, doc: Document) -> Result<WriteResult, StoreError> {
        self.store.put(doc).await
    }

    pub async fn bulk_insert(&self, docs: Vec<Document>) -> Result<Vec<WriteResult>, StoreError> {
        self.store.bulk_insert(docs).await
    }

    pub async fn all_docs(&self, options: AllDocsOptions) -> Result<Vec<DocRow>, StoreError> {
        self.store.all_docs(options).await
    }

    pub async fn get(&self, id: &str) -> Result<Document, StoreError> {
        self.store.get(id).await
    }

    /// Push this database's documents to `target`
    pub async fn replicate_to(
        &self,
        target: &str,
        options: &ReplicationOptions,
    ) -> Result<ReplicationReport, StoreError> {
        self.client.replicate(self.locator(), target, options).await
    }

    /// Pull the documents of `source` into this database
    pub async fn replicate_from(
        &self,
        source: &str,
        options: &ReplicationOptions,
    ) -> Result<ReplicationReport, StoreError> {
        self.client.replicate(source, self.locator(), options).await
    }
}
