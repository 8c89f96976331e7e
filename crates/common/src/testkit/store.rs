use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::document::{AllDocsOptions, DocRow, Document, WriteResult};
use crate::store::{
    DocumentStore, MemoryStore, MemoryStoreClient, ReplicationOptions, ReplicationReport,
    StoreClient, StoreError,
};

/// Store operations that can be observed and failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Destroy,
    Open,
    Replicate,
    EnsureExists,
    Put,
    BulkInsert,
    AllDocs,
    Get,
    WriteReplicated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    /// The locator (or `source -> target` for replication) the call addressed
    pub target: String,
}

#[derive(Debug, Default)]
struct FaultPlan {
    /// op -> 1-based call number that fails
    faults: HashMap<StoreOp, usize>,
    counts: HashMap<StoreOp, usize>,
    calls: Vec<StoreCall>,
    empty_listings: bool,
}

impl FaultPlan {
    fn record(&mut self, op: StoreOp, target: &str) -> Result<(), StoreError> {
        self.calls.push(StoreCall {
            op,
            target: target.to_string(),
        });
        let counter = self.counts.entry(op).or_insert(0);
        *counter += 1;
        let count = *counter;

        if self.faults.get(&op) == Some(&count) {
            return Err(StoreError::backend(format!(
                "injected {:?} failure on call {} ({})",
                op, count, target
            )));
        }
        Ok(())
    }
}

/// Embedded store client that records every call and fails on demand
#[derive(Debug, Clone, Default)]
pub struct FaultyStoreClient {
    inner: MemoryStoreClient,
    plan: Arc<Mutex<FaultPlan>>,
}

impl FaultyStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `nth` (1-based) call of `op`
    pub fn fail_on(self, op: StoreOp, nth: usize) -> Self {
        self.plan.lock().faults.insert(op, nth);
        self
    }

    /// Make `all_docs` report an empty database
    pub fn with_empty_listings(self) -> Self {
        self.plan.lock().empty_listings = true;
        self
    }

    pub fn inner(&self) -> &MemoryStoreClient {
        &self.inner
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.plan.lock().calls.clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.plan.lock().counts.get(&op).copied().unwrap_or(0)
    }

    fn record(&self, op: StoreOp, target: &str) -> Result<(), StoreError> {
        self.plan.lock().record(op, target)
    }
}

#[async_trait]
impl StoreClient for FaultyStoreClient {
    type Store = FaultyStore;

    async fn destroy(&self, locator: &str) -> Result<(), StoreError> {
        self.record(StoreOp::Destroy, locator)?;
        self.inner.destroy(locator).await
    }

    fn open(&self, locator: &str) -> Result<Self::Store, StoreError> {
        self.record(StoreOp::Open, locator)?;
        Ok(FaultyStore {
            inner: self.inner.open(locator)?,
            plan: self.plan.clone(),
        })
    }

    async fn replicate(
        &self,
        source: &str,
        target: &str,
        options: &ReplicationOptions,
    ) -> Result<ReplicationReport, StoreError> {
        self.record(StoreOp::Replicate, &format!("{} -> {}", source, target))?;
        self.inner.replicate(source, target, options).await
    }
}

#[derive(Debug, Clone)]
pub struct FaultyStore {
    inner: MemoryStore,
    plan: Arc<Mutex<FaultPlan>>,
}

impl FaultyStore {
    fn record(&self, op: StoreOp) -> Result<(), StoreError> {
        self.plan.lock().record(op, self.inner.locator())
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    fn locator(&self) -> &str {
        self.inner.locator()
    }

    async fn ensure_exists(&self) -> Result<(), StoreError> {
        self.record(StoreOp::EnsureExists)?;
        self.inner.ensure_exists().await
    }

    async fn put(&self, doc: Document) -> Result<WriteResult, StoreError> {
        self.record(StoreOp::Put)?;
        self.inner.put(doc).await
    }

    async fn bulk_insert(&self, docs: Vec<Document>) -> Result<Vec<WriteResult>, StoreError> {
        self.record(StoreOp::BulkInsert)?;
        self.inner.bulk_insert(docs).await
    }

    async fn all_docs(&self, options: AllDocsOptions) -> Result<Vec<DocRow>, StoreError> {
        self.record(StoreOp::AllDocs)?;
        if self.plan.lock().empty_listings {
            return Ok(Vec::new());
        }
        self.inner.all_docs(options).await
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        self.record(StoreOp::Get)?;
        self.inner.get(id).await
    }

    async fn write_replicated(&self, docs: Vec<Document>) -> Result<usize, StoreError> {
        self.record(StoreOp::WriteReplicated)?;
        self.inner.write_replicated(docs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fault_fires_on_nth_call_only() {
        let client = FaultyStoreClient::new().fail_on(StoreOp::Destroy, 2);

        assert!(client.destroy("a").await.is_ok());
        assert!(client.destroy("b").await.is_err());
        assert!(client.destroy("c").await.is_ok());

        assert_eq!(client.count(StoreOp::Destroy), 3);
        assert_eq!(client.calls()[1].target, "b");
    }
}
