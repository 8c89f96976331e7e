use async_trait::async_trait;

use common::document::{AllDocsOptions, DocRow, Document, WriteResult};
use common::store::{
    replicate_between, DocumentStore, MemoryStore, MemoryStoreClient, ReplicationOptions,
    ReplicationReport, StoreClient, StoreError,
};

use crate::couch::{CouchClient, CouchDatabase, CouchError};

/// Whether a locator names a database behind an HTTP endpoint
pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Sends HTTP locators to a [`CouchClient`] and everything else to the embedded store
///
/// In direct mode the scratch databases are plain names and stay in
///  process, while the test database lives on a hub; in bridged mode every
///  locator points at the relay.
#[derive(Debug, Clone)]
pub struct RoutedStoreClient {
    embedded: MemoryStoreClient,
    remote: CouchClient,
}

impl RoutedStoreClient {
    pub fn new() -> Result<Self, CouchError> {
        Ok(Self::with_backends(MemoryStoreClient::new(), CouchClient::new()?))
    }

    pub fn with_backends(embedded: MemoryStoreClient, remote: CouchClient) -> Self {
        Self { embedded, remote }
    }

    pub fn embedded(&self) -> &MemoryStoreClient {
        &self.embedded
    }
}

#[async_trait]
impl StoreClient for RoutedStoreClient {
    type Store = RoutedStore;

    async fn destroy(&self, locator: &str) -> Result<(), StoreError> {
        if is_remote(locator) {
            self.remote.destroy(locator).await
        } else {
            self.embedded.destroy(locator).await
        }
    }

    fn open(&self, locator: &str) -> Result<Self::Store, StoreError> {
        if is_remote(locator) {
            Ok(RoutedStore::Remote(self.remote.open(locator)?))
        } else {
            Ok(RoutedStore::Embedded(self.embedded.open(locator)?))
        }
    }

    async fn replicate(
        &self,
        source: &str,
        target: &str,
        options: &ReplicationOptions,
    ) -> Result<ReplicationReport, StoreError> {
        match (is_remote(source), is_remote(target)) {
            // Only a hub can run a replication on our behalf
            (true, _) if options.via_hub => self.remote.replicate(source, target, options).await,
            (false, false) => self.embedded.replicate(source, target, options).await,
            _ => replicate_between(&self.open(source)?, &self.open(target)?, options).await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RoutedStore {
    Embedded(MemoryStore),
    Remote(CouchDatabase),
}

macro_rules! on_backend {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            RoutedStore::Embedded($store) => $call,
            RoutedStore::Remote($store) => $call,
        }
    };
}

#[async_trait]
impl DocumentStore for RoutedStore {
    fn locator(&self) -> &str {
        on_backend!(self, store => store.locator())
    }

    async fn ensure_exists(&self) -> Result<(), StoreError> {
        on_backend!(self, store => store.ensure_exists().await)
    }

    async fn put(&self, doc: Document) -> Result<WriteResult, StoreError> {
        on_backend!(self, store => store.put(doc).await)
    }

    async fn bulk_insert(&self, docs: Vec<Document>) -> Result<Vec<WriteResult>, StoreError> {
        on_backend!(self, store => store.bulk_insert(docs).await)
    }

    async fn all_docs(&self, options: AllDocsOptions) -> Result<Vec<DocRow>, StoreError> {
        on_backend!(self, store => store.all_docs(options).await)
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        on_backend!(self, store => store.get(id).await)
    }

    async fn write_replicated(&self, docs: Vec<Document>) -> Result<usize, StoreError> {
        on_backend!(self, store => store.write_replicated(docs).await)
    }
}
