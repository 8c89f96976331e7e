use common::store::StoreError;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CouchError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("not a database URL: {0}")]
    InvalidLocator(String),
    #[error("HTTP status {status} from {url}: {body}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("write of {id} rejected ({error}): {reason}")]
    Rejected {
        id: String,
        error: String,
        reason: String,
    },
}

impl CouchError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CouchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<CouchError> for StoreError {
    fn from(err: CouchError) -> Self {
        match err {
            CouchError::InvalidLocator(locator) => StoreError::InvalidLocator(locator),
            CouchError::HttpStatus { url, status, .. } if status == StatusCode::NOT_FOUND => {
                StoreError::NotFound(url)
            }
            CouchError::HttpStatus { url, status, .. } if status == StatusCode::CONFLICT => {
                StoreError::Conflict(url)
            }
            CouchError::Rejected { id, error, .. } if error == "conflict" => {
                StoreError::Conflict(id)
            }
            other => StoreError::backend(other),
        }
    }
}
