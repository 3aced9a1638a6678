//! Per-request carrier of transport state, passed through to the execution
//! engine.

use http::request::Parts;
use http::HeaderMap;
use http::Method;
use http::Uri;
use once_cell::sync::OnceCell;

use crate::protocols::multipart::FileMap;

/// Transport-derived state for one in-flight request.
///
/// A `Context` is owned by exactly one request. It is constructed from the
/// request head during normalization; the only mutation it ever admits is
/// attaching the uploaded-file map, once, right after construction. After
/// that, readers everywhere observe the same immutable state.
#[derive(Debug)]
pub struct Context {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    read_only: bool,
    files: OnceCell<FileMap>,
}

impl Context {
    pub(crate) fn from_parts(parts: &Parts, read_only: bool) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            read_only,
            files: OnceCell::new(),
        }
    }

    /// A context for invocations that did not come in over the transport,
    /// such as the management surface.
    pub(crate) fn internal() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            read_only: false,
            files: OnceCell::new(),
        }
    }

    /// The HTTP method of the originating request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URI of the originating request.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The headers of the originating request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether this invocation must not execute mutations.
    ///
    /// Set for invocations normalized from GET requests.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The uploaded parts of a multipart request, keyed by field name.
    ///
    /// `None` for anything that was not a multipart request.
    pub fn files(&self) -> Option<&FileMap> {
        self.files.get()
    }

    /// Attach the uploaded-file map. A file map can be attached at most once;
    /// a second attempt is ignored and the original mapping stays in place.
    pub(crate) fn attach_files(&self, files: FileMap) {
        if self.files.set(files).is_err() {
            tracing::debug!("file map was already attached to this context");
        }
    }
}
