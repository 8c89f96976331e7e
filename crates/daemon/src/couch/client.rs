use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use url::Url;

use common::document::{AllDocsOptions, DocRow, Document, WriteResult};
use common::store::{
    replicate_between, DocumentStore, ReplicationOptions, ReplicationReport, StoreClient,
    StoreError,
};

use super::error::CouchError;

/// Client for databases served over the CouchDB HTTP API
///
/// Locators are full database URLs, e.g. `http://localhost:58000/hub/127.0.0.1/9898/test`.
#[derive(Debug, Clone)]
pub struct CouchClient {
    client: Client,
}

impl CouchClient {
    pub fn new() -> Result<Self, CouchError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        default_headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self { client })
    }

    /// Parse and validate a database locator
    pub fn database_url(locator: &str) -> Result<Url, CouchError> {
        let url = Url::parse(locator)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CouchError::InvalidLocator(locator.to_string()));
        }

        let has_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .is_some_and(|name| !name.is_empty());
        if !has_name {
            return Err(CouchError::InvalidLocator(locator.to_string()));
        }

        Ok(url)
    }

    /// Ask the hub serving `source` to replicate it into `target`
    pub async fn replicate_on_hub(
        &self,
        source: &str,
        target: &str,
        options: &ReplicationOptions,
    ) -> Result<ReplicationReport, CouchError> {
        let source_url = Self::database_url(source)?;
        let endpoint = sibling_url(&source_url, "_replicate")?;

        tracing::debug!(%endpoint, source, target, "requesting hub-side replication");
        let body = json!({
            "source": source,
            "target": target,
            "create_target": options.create_target,
        });
        let response: ReplicateResponse =
            send_json(self.client.post(endpoint.clone()).json(&body), &endpoint).await?;

        let report = response
            .history
            .first()
            .map(|entry| ReplicationReport {
                docs_read: entry.docs_read,
                docs_written: entry.docs_written,
            })
            .unwrap_or_default();
        Ok(report)
    }
}

#[async_trait]
impl StoreClient for CouchClient {
    type Store = CouchDatabase;

    async fn destroy(&self, locator: &str) -> Result<(), StoreError> {
        let url = Self::database_url(locator)?;
        let response = self
            .client
            .delete(url.clone())
            .send()
            .await
            .map_err(CouchError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(%url, "database already absent");
            return Ok(());
        }
        check(response, &url).await?;
        Ok(())
    }

    fn open(&self, locator: &str) -> Result<Self::Store, StoreError> {
        Ok(CouchDatabase {
            url: Self::database_url(locator)?,
            locator: locator.to_string(),
            client: self.client.clone(),
            setup: Arc::new(OnceCell::new()),
        })
    }

    async fn replicate(
        &self,
        source: &str,
        target: &str,
        options: &ReplicationOptions,
    ) -> Result<ReplicationReport, StoreError> {
        if options.via_hub {
            return Ok(self.replicate_on_hub(source, target, options).await?);
        }
        replicate_between(&self.open(source)?, &self.open(target)?, options).await
    }
}

/// One database behind a CouchDB-compatible HTTP endpoint
///
/// The database is created on first use, so a handle can be opened
///  before anything exists on the server.
#[derive(Debug, Clone)]
pub struct CouchDatabase {
    url: Url,
    locator: String,
    client: Client,
    setup: Arc<OnceCell<()>>,
}

impl CouchDatabase {
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn setup(&self) -> Result<(), CouchError> {
        self.setup
            .get_or_try_init(|| self.create_if_missing())
            .await
            .map(|_| ())
    }

    async fn create_if_missing(&self) -> Result<(), CouchError> {
        let response = self.client.put(self.url.clone()).send().await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(());
        }
        check(response, &self.url).await?;
        Ok(())
    }

    fn child_url(&self, segment: &str) -> Result<Url, CouchError> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| CouchError::InvalidLocator(self.locator.clone()))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn bulk_docs(&self, body: serde_json::Value) -> Result<Vec<BulkDocsResult>, CouchError> {
        let url = self.child_url("_bulk_docs")?;
        send_json(self.client.post(url.clone()).json(&body), &url).await
    }
}

#[async_trait]
impl DocumentStore for CouchDatabase {
    fn locator(&self) -> &str {
        &self.locator
    }

    async fn ensure_exists(&self) -> Result<(), StoreError> {
        Ok(self.setup().await?)
    }

    async fn put(&self, doc: Document) -> Result<WriteResult, StoreError> {
        self.setup().await?;

        let (method, url) = match doc.id() {
            Some(id) => (Method::PUT, self.child_url(id)?),
            None => (Method::POST, self.url.clone()),
        };
        let response: WriteResponse =
            send_json(self.client.request(method, url.clone()).json(&doc), &url).await?;

        Ok(WriteResult {
            id: response.id,
            rev: response.rev,
        })
    }

    async fn bulk_insert(&self, docs: Vec<Document>) -> Result<Vec<WriteResult>, StoreError> {
        self.setup().await?;

        let results = self.bulk_docs(json!({ "docs": docs })).await?;
        results
            .into_iter()
            .map(|result| match (result.rev, result.error) {
                (Some(rev), None) => Ok(WriteResult { id: result.id, rev }),
                (_, error) => Err(CouchError::Rejected {
                    id: result.id,
                    error: error.unwrap_or_else(|| "unknown".to_string()),
                    reason: result.reason.unwrap_or_default(),
                }
                .into()),
            })
            .collect()
    }

    async fn all_docs(&self, options: AllDocsOptions) -> Result<Vec<DocRow>, StoreError> {
        self.setup().await?;

        let mut url = self.child_url("_all_docs")?;
        if options.include_docs {
            url.query_pairs_mut().append_pair("include_docs", "true");
        }
        let response: AllDocsResponse = send_json(self.client.get(url.clone()), &url).await?;

        Ok(response
            .rows
            .into_iter()
            .map(|row| DocRow {
                id: row.id,
                rev: row.value.rev,
                doc: row.doc,
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        self.setup().await?;

        let url = self.child_url(id)?;
        match send_json(self.client.get(url.clone()), &url).await {
            Ok(doc) => Ok(doc),
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_replicated(&self, docs: Vec<Document>) -> Result<usize, StoreError> {
        self.setup().await?;

        // The server keeps the winning revision itself and reports nothing back
        let submitted = docs.len();
        self.bulk_docs(json!({ "docs": docs, "new_edits": false }))
            .await?;
        Ok(submitted)
    }
}

/// `url` with its last path segment replaced by `segment`
fn sibling_url(url: &Url, segment: &str) -> Result<Url, CouchError> {
    let mut sibling = url.clone();
    sibling
        .path_segments_mut()
        .map_err(|_| CouchError::InvalidLocator(url.to_string()))?
        .pop()
        .push(segment);
    Ok(sibling)
}

async fn check(response: Response, url: &Url) -> Result<Response, CouchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(CouchError::HttpStatus {
        url: url.to_string(),
        status,
        body: response.text().await.unwrap_or_default(),
    })
}

async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &Url,
) -> Result<T, CouchError> {
    let response = check(request.send().await?, url).await?;
    Ok(response.json::<T>().await?)
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    id: String,
    rev: String,
}

#[derive(Debug, Deserialize)]
struct BulkDocsResult {
    id: String,
    rev: Option<String>,
    error: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    id: String,
    value: RowValue,
    #[serde(default)]
    doc: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct RowValue {
    rev: String,
}

#[derive(Debug, Deserialize)]
struct ReplicateResponse {
    #[serde(default)]
    history: Vec<ReplicationHistory>,
}

#[derive(Debug, Deserialize)]
struct ReplicationHistory {
    #[serde(default)]
    docs_read: usize,
    #[serde(default)]
    docs_written: usize,
}
