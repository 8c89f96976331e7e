//! Axum fakes for the relay and HTTP store tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use url::Url;

use common::document::{AllDocsOptions, Document};
use common::store::{
    DocumentStore, MemoryStoreClient, ReplicationOptions, StoreClient, StoreError,
};
use relaycheck_daemon::relay;
use relaycheck_daemon::CouchClient;

/// Serve `router` on an ephemeral loopback port
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A loopback port nothing listens on
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn base_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

/// A running relay; it stops once this is dropped
pub struct TestRelay {
    pub addr: SocketAddr,
    _shutdown: watch::Sender<()>,
}

impl TestRelay {
    pub fn url(&self) -> Url {
        base_url(self.addr)
    }

    pub fn at(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn spawn_relay(default_hub: SocketAddr, http_key: Option<&str>) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = relay::Config::new(addr, base_url(default_hub))
        .with_http_key(http_key.map(str::to_string));

    let (tx, rx) = watch::channel(());
    tokio::spawn(relay::serve(listener, config, rx));

    TestRelay {
        addr,
        _shutdown: tx,
    }
}

// Echo hub

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    /// Path and query as the hub received them
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Records every request; `/status/{code}` answers with that status
#[derive(Debug, Clone)]
pub struct EchoHub {
    pub name: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl EchoHub {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            seen: Arc::default(),
        }
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub async fn spawn(&self) -> SocketAddr {
        spawn_router(Router::new().fallback(echo).with_state(self.clone())).await
    }
}

async fn echo(State(hub): State<EchoHub>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_default();

    hub.seen.lock().unwrap().push(SeenRequest {
        method: parts.method,
        path: path.clone(),
        headers: parts.headers,
        body,
    });

    let status = path
        .strip_prefix("/status/")
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    (
        status,
        [("x-hub", hub.name.clone())],
        Json(json!({ "hub": hub.name, "path": path })),
    )
        .into_response()
}

// CouchDB-compatible hub backed by the embedded store

#[derive(Debug, Clone, Default)]
pub struct FakeCouch {
    pub store: MemoryStoreClient,
    replications: Arc<Mutex<Vec<Value>>>,
}

impl FakeCouch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bodies of every `/_replicate` request
    pub fn replications(&self) -> Vec<Value> {
        self.replications.lock().unwrap().clone()
    }

    pub async fn spawn(&self) -> SocketAddr {
        let router = Router::new()
            .route("/", get(welcome))
            .route("/_replicate", post(replicate))
            .route(
                "/:db",
                get(db_info).put(create_db).delete(delete_db).post(post_doc),
            )
            .route("/:db/_all_docs", get(all_docs))
            .route("/:db/_bulk_docs", post(bulk_docs))
            .route("/:db/:id", put(put_doc).get(get_doc))
            .with_state(self.clone());
        spawn_router(router).await
    }

    fn existing(&self, db: &str) -> Result<common::store::MemoryStore, Response> {
        if !self.store.exists(db) {
            return Err(couch_error(StatusCode::NOT_FOUND, "not_found"));
        }
        Ok(self.store.open(db).unwrap())
    }
}

fn couch_error(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error, "reason": error }))).into_response()
}

fn store_error(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(_) => couch_error(StatusCode::NOT_FOUND, "not_found"),
        StoreError::Conflict(_) => couch_error(StatusCode::CONFLICT, "conflict"),
        _ => couch_error(StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

async fn welcome() -> Response {
    Json(json!({ "couchdb": "Welcome" })).into_response()
}

async fn db_info(State(couch): State<FakeCouch>, Path(db): Path<String>) -> Response {
    match couch.existing(&db) {
        Ok(_) => Json(json!({ "db_name": db })).into_response(),
        Err(response) => response,
    }
}

async fn create_db(State(couch): State<FakeCouch>, Path(db): Path<String>) -> Response {
    if couch.store.exists(&db) {
        return couch_error(StatusCode::PRECONDITION_FAILED, "file_exists");
    }
    couch.store.open(&db).unwrap().ensure_exists().await.unwrap();
    (StatusCode::CREATED, Json(json!({ "ok": true }))).into_response()
}

async fn delete_db(State(couch): State<FakeCouch>, Path(db): Path<String>) -> Response {
    if let Err(response) = couch.existing(&db) {
        return response;
    }
    couch.store.destroy(&db).await.unwrap();
    Json(json!({ "ok": true })).into_response()
}

async fn write(couch: &FakeCouch, db: &str, doc: Document) -> Response {
    let store = match couch.existing(db) {
        Ok(store) => store,
        Err(response) => return response,
    };
    match store.put(doc).await {
        Ok(result) => (
            StatusCode::CREATED,
            Json(json!({ "ok": true, "id": result.id, "rev": result.rev })),
        )
            .into_response(),
        Err(err) => store_error(err),
    }
}

async fn post_doc(
    State(couch): State<FakeCouch>,
    Path(db): Path<String>,
    Json(doc): Json<Document>,
) -> Response {
    write(&couch, &db, doc).await
}

async fn put_doc(
    State(couch): State<FakeCouch>,
    Path((db, id)): Path<(String, String)>,
    Json(mut doc): Json<Document>,
) -> Response {
    doc.id = Some(id);
    write(&couch, &db, doc).await
}

async fn get_doc(
    State(couch): State<FakeCouch>,
    Path((db, id)): Path<(String, String)>,
) -> Response {
    let store = match couch.existing(&db) {
        Ok(store) => store,
        Err(response) => return response,
    };
    match store.get(&id).await {
        Ok(doc) => Json(doc).into_response(),
        Err(err) => store_error(err),
    }
}

async fn all_docs(
    State(couch): State<FakeCouch>,
    Path(db): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let store = match couch.existing(&db) {
        Ok(store) => store,
        Err(response) => return response,
    };
    let options = AllDocsOptions {
        include_docs: params.get("include_docs").map(String::as_str) == Some("true"),
    };

    let rows: Vec<Value> = store
        .all_docs(options)
        .await
        .unwrap()
        .into_iter()
        .map(|row| {
            let mut value = json!({ "id": row.id, "key": row.id, "value": { "rev": row.rev } });
            if let Some(doc) = row.doc {
                value["doc"] = serde_json::to_value(doc).unwrap();
            }
            value
        })
        .collect();

    Json(json!({ "total_rows": rows.len(), "offset": 0, "rows": rows })).into_response()
}

#[derive(Deserialize)]
struct BulkDocsBody {
    docs: Vec<Document>,
    #[serde(default)]
    new_edits: Option<bool>,
}

async fn bulk_docs(
    State(couch): State<FakeCouch>,
    Path(db): Path<String>,
    Json(body): Json<BulkDocsBody>,
) -> Response {
    let store = match couch.existing(&db) {
        Ok(store) => store,
        Err(response) => return response,
    };

    if body.new_edits == Some(false) {
        store.write_replicated(body.docs).await.unwrap();
        return (StatusCode::CREATED, Json(json!([]))).into_response();
    }

    match store.bulk_insert(body.docs).await {
        Ok(results) => {
            let results: Vec<Value> = results
                .into_iter()
                .map(|r| json!({ "ok": true, "id": r.id, "rev": r.rev }))
                .collect();
            (StatusCode::CREATED, Json(results)).into_response()
        }
        Err(err) => store_error(err),
    }
}

#[derive(Deserialize)]
struct ReplicateBody {
    source: String,
    target: String,
    #[serde(default)]
    create_target: bool,
}

async fn replicate(State(couch): State<FakeCouch>, Json(body): Json<Value>) -> Response {
    couch.replications.lock().unwrap().push(body.clone());

    let request: ReplicateBody = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(_) => return couch_error(StatusCode::BAD_REQUEST, "bad_request"),
    };
    let client = CouchClient::new().unwrap();

    // CouchDB only creates a missing target when asked to
    if !request.create_target {
        let target = reqwest::get(&request.target).await;
        if !matches!(target, Ok(ref response) if response.status().is_success()) {
            return couch_error(StatusCode::NOT_FOUND, "db_not_found");
        }
    }

    let mut options = ReplicationOptions::default();
    options.create_target = request.create_target;

    match client
        .replicate(&request.source, &request.target, &options)
        .await
    {
        Ok(report) => Json(json!({
            "ok": true,
            "history": [{ "docs_read": report.docs_read, "docs_written": report.docs_written }],
        }))
        .into_response(),
        Err(_) => couch_error(StatusCode::INTERNAL_SERVER_ERROR, "replication_failed"),
    }
}

// Report host

#[derive(Debug, Clone, Default)]
pub struct ReportHost {
    reports: Arc<Mutex<Vec<Value>>>,
    pub reject: bool,
}

impl ReportHost {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<Value> {
        self.reports.lock().unwrap().clone()
    }

    pub async fn spawn(&self) -> SocketAddr {
        spawn_router(Router::new().route("/report", post(receive)).with_state(self.clone()))
            .await
    }
}

async fn receive(State(host): State<ReportHost>, Json(report): Json<Value>) -> StatusCode {
    if host.reject {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    host.reports.lock().unwrap().push(report);
    StatusCode::NO_CONTENT
}
