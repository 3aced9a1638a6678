//! Utility constructors for endpoint [`Body`] values.

use bytes::Bytes;
use futures::Stream;
use http_body_util::BodyExt;
use tower::BoxError;

use super::Body;

/// Create an empty body.
pub(crate) fn empty() -> Body {
    Body::empty()
}

/// Create a body from a fully materialized chunk.
pub(crate) fn from_bytes<T: Into<Bytes>>(chunk: T) -> Body {
    Body::from(chunk.into())
}

/// Create a streaming body from a stream of chunk results.
pub(crate) fn from_result_stream<S, E>(stream: S) -> Body
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BoxError>,
{
    Body::from_stream(stream)
}

/// Buffer a whole body into memory.
pub(crate) async fn into_bytes<B>(body: B) -> Result<Bytes, B::Error>
where
    B: http_body::Body<Data = Bytes>,
{
    Ok(body.collect().await?.to_bytes())
}
