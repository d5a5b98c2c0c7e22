use std::error::Error as StdError;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use sse::RejectionReason;

pub type Result<T> = core::result::Result<T, Error>;

/// Suggested client back-off, in seconds, when the subscriber ceiling is hit.
const RETRY_AFTER_SECS: &str = "30";

#[derive(Debug)]
pub struct Error {
    pub error_kind: WebErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// The broker refused a new subscriber because it is at capacity.
    SubscriberLimitReached,
    /// The broker is shutting down and no longer accepts subscribers.
    ShuttingDown,
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.error_kind {
            WebErrorKind::SubscriberLimitReached => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
                "SERVICE UNAVAILABLE",
            )
                .into_response(),
            WebErrorKind::ShuttingDown => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response()
            }
        }
    }
}

impl From<RejectionReason> for Error {
    fn from(reason: RejectionReason) -> Self {
        let error_kind = match reason {
            RejectionReason::AtCapacity { .. } => WebErrorKind::SubscriberLimitReached,
            RejectionReason::ShuttingDown => WebErrorKind::ShuttingDown,
        };
        Self { error_kind }
    }
}
