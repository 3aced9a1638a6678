//! Endpoint errors.

use displaydoc::Display;
use http::StatusCode;
use thiserror::Error;

/// Errors produced while normalizing a transport request into an invocation
/// input.
///
/// All of these map to a client error response: the request never reached the
/// execution engine. They are logged at info level and the client receives
/// the status code alone, with no diagnostic detail in the body.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum RequestError {
    /// request was malformed: {reason}
    MalformedRequest {
        /// The reason parsing the request failed.
        reason: String,
    },

    /// no GraphQL operation was provided; use the `query` parameter with GET or POST
    MissingQuery,

    /// multipart request has no part named "graphql" or "query"
    MissingMultipartField,
}

impl RequestError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// A machine-readable code identifying this error in logs.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::MalformedRequest { .. } => "MALFORMED_REQUEST",
            RequestError::MissingQuery => "MISSING_QUERY",
            RequestError::MissingMultipartField => "MISSING_MULTIPART_FIELD",
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        RequestError::MalformedRequest {
            reason: err.to_string(),
        }
    }
}

impl From<multer::Error> for RequestError {
    fn from(err: multer::Error) -> Self {
        RequestError::MalformedRequest {
            reason: err.to_string(),
        }
    }
}

impl From<axum::Error> for RequestError {
    fn from(err: axum::Error) -> Self {
        RequestError::MalformedRequest {
            reason: err.to_string(),
        }
    }
}
