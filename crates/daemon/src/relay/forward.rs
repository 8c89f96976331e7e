use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, DATE, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use url::Url;

use super::RelayState;

/// Requests under this prefix name their hub: `/hub/{host}/{port}/{rest}`
pub const HUB_PREFIX: &str = "/hub/";

/// Largest request body forwarded to a hub
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

const DROPPED_REQUEST_HEADERS: [HeaderName; 2] = [CONTENT_LENGTH, HOST];
const DROPPED_RESPONSE_HEADERS: [HeaderName; 3] = [DATE, CONTENT_LENGTH, TRANSFER_ENCODING];

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid hub path: {0}")]
    InvalidHubPath(String),
    #[error("could not read request body: {0}")]
    Body(#[source] axum::Error),
    #[error("hub at {upstream} unreachable: {source}")]
    Unreachable {
        upstream: String,
        #[source]
        source: reqwest::Error,
    },
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = match &self {
            ForwardError::InvalidHubPath(_) | ForwardError::Body(_) => StatusCode::BAD_REQUEST,
            ForwardError::Unreachable { .. } => StatusCode::BAD_GATEWAY,
        };
        tracing::warn!(%status, error = %self, "relay request failed");
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "text/plain")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Work out where a request for `path` should go
///
/// # Returns
/// * `Ok(Url)` - `http://{host}:{port}/{rest}` for hub paths, otherwise
///   `path` resolved against `default_hub`; the query string is kept
pub fn resolve_upstream(
    default_hub: &Url,
    path: &str,
    query: Option<&str>,
) -> Result<Url, ForwardError> {
    let target = match path.strip_prefix(HUB_PREFIX) {
        Some(hub_path) => {
            let invalid = || ForwardError::InvalidHubPath(path.to_string());
            let mut parts = hub_path.splitn(3, '/');
            let host = parts.next().filter(|host| !host.is_empty()).ok_or_else(invalid)?;
            let port: u16 = parts
                .next()
                .and_then(|port| port.parse().ok())
                .ok_or_else(invalid)?;
            let rest = parts.next().unwrap_or("");
            format!("http://{}:{}/{}", host, port, rest)
        }
        None => {
            let base = default_hub.as_str().trim_end_matches('/');
            format!("{}/{}", base, path.trim_start_matches('/'))
        }
    };

    let mut upstream =
        Url::parse(&target).map_err(|_| ForwardError::InvalidHubPath(path.to_string()))?;
    upstream.set_query(query);
    Ok(upstream)
}

/// Hubs only ever answer with these; anything else is reported as `200`
pub fn translate_status(status: StatusCode) -> StatusCode {
    match status.as_u16() {
        201 | 400 | 404 | 412 | 500 => status,
        _ => StatusCode::OK,
    }
}

fn without(mut headers: HeaderMap, dropped: &[HeaderName]) -> HeaderMap {
    for name in dropped {
        headers.remove(name);
    }
    headers
}

pub async fn handler(
    State(state): State<RelayState>,
    request: Request,
) -> Result<Response, ForwardError> {
    let (parts, body) = request.into_parts();
    let upstream = resolve_upstream(&state.hub_url, parts.uri.path(), parts.uri.query())?;
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(ForwardError::Body)?;

    tracing::debug!(method = %parts.method, %upstream, "forwarding to hub");
    let unreachable = |source| ForwardError::Unreachable {
        upstream: upstream.to_string(),
        source,
    };

    let hub_response = state
        .client
        .request(parts.method, upstream.clone())
        .headers(without(parts.headers, &DROPPED_REQUEST_HEADERS))
        .body(body)
        .send()
        .await
        .map_err(unreachable)?;

    let status = translate_status(hub_response.status());
    let headers = without(hub_response.headers().clone(), &DROPPED_RESPONSE_HEADERS);
    let bytes = hub_response.bytes().await.map_err(unreachable)?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
