use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;

/// The closed taxonomy from which every internal failure is classified.
///
/// Subsystems recover locally from `Transient`/`RateLimited`/`BreakerOpen`/
/// `NoContent`; `Permanent` degrades the owning component to `unhealthy`
/// without crashing the process.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rate limited")]
    RateLimited,

    #[error("circuit breaker open for {0}")]
    BreakerOpen(String),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("no content extracted")]
    NoContent,

    #[error("could not parse LLM response: {0}")]
    ParseError(String),

    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("cancelled")]
    Cancelled,
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_) | CoreError::ParseError(_))
    }
}

impl From<diesel::result::Error> for CoreError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => CoreError::Conflict(info.message().to_string()),
            diesel::result::Error::NotFound => CoreError::Permanent("row not found".into()),
            other => CoreError::Transient(other.to_string()),
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for CoreError {
    fn from(e: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        CoreError::Transient(format!("connection pool: {e}"))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            CoreError::Transient(e.to_string())
        } else if let Some(status) = e.status() {
            if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
                CoreError::Blocked(status.to_string())
            } else if status.is_server_error() || status.as_u16() == 429 {
                CoreError::Transient(status.to_string())
            } else {
                CoreError::Permanent(status.to_string())
            }
        } else {
            CoreError::Transient(e.to_string())
        }
    }
}

/// Closed set of API error codes exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidId,
    InvalidDate,
    InvalidRequest,
    MissingQuery,
    NotFound,
    DatabaseError,
    SearchError,
    ProcessingError,
    ExtractionFailed,
    RateLimitExceeded,
    Unauthorized,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidId => "INVALID_ID",
            ErrorCode::InvalidDate => "INVALID_DATE",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::MissingQuery => "MISSING_QUERY",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::SearchError => "SEARCH_ERROR",
            ErrorCode::ProcessingError => "PROCESSING_ERROR",
            ErrorCode::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidId
            | ErrorCode::InvalidDate
            | ErrorCode::InvalidRequest
            | ErrorCode::MissingQuery => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::DatabaseError
            | ErrorCode::SearchError
            | ErrorCode::ProcessingError
            | ErrorCode::ExtractionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP-boundary error, rendered as the `{success:false, error:{...}}` envelope.
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.code.status();
        let body = json!({
            "success": false,
            "error": ErrorBody {
                code: self.code.as_str(),
                message: self.message,
                details: self.details,
            },
            "request_id": serde_json::Value::Null,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Transient(m) => AppError::new(ErrorCode::DatabaseError, m),
            CoreError::RateLimited => AppError::new(ErrorCode::RateLimitExceeded, "rate limited"),
            CoreError::BreakerOpen(source) => {
                AppError::new(ErrorCode::ProcessingError, format!("source unavailable: {source}"))
            }
            CoreError::Blocked(m) => AppError::new(ErrorCode::ExtractionFailed, m),
            CoreError::NoContent => AppError::new(ErrorCode::ExtractionFailed, "no content extracted"),
            CoreError::ParseError(m) => AppError::new(ErrorCode::ProcessingError, m),
            CoreError::Conflict(m) => AppError::new(ErrorCode::DatabaseError, m),
            CoreError::Permanent(m) => AppError::new(ErrorCode::DatabaseError, m),
            CoreError::Cancelled => AppError::new(ErrorCode::ProcessingError, "cancelled"),
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(e: diesel::result::Error) -> Self {
        CoreError::from(e).into()
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for AppError {
    fn from(e: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        CoreError::from(e).into()
    }
}

impl From<&'static str> for AppError {
    fn from(e: &'static str) -> Self {
        AppError::new(ErrorCode::InvalidRequest, e)
    }
}
