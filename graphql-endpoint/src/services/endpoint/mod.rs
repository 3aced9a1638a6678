//! The endpoint processing step: one HTTP request in, one HTTP response out.

use tower::BoxError;

pub(crate) mod body;
pub(crate) mod service;

pub use service::EndpointService;

/// The HTTP body type flowing through the endpoint.
pub type Body = axum::body::Body;

/// A boxed endpoint service.
pub type BoxService = tower::util::BoxService<http::Request<Body>, http::Response<Body>, BoxError>;
