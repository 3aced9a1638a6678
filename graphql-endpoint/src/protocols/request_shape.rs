//! Detection of the JSON shape of an inbound request body.
//!
//! A batched request is a JSON array of request objects; a single request is
//! an object. The decision only needs the first non-whitespace character, so
//! the body must not be fully buffered just to look at it, and whatever bytes
//! the detection reads must be replayed for the real parser.

use bytes::Bytes;
use bytes::BytesMut;
use futures::future::ready;
use futures::stream;
use futures::StreamExt;

use crate::services::endpoint::Body;

/// The JSON shape of a request body, decided by its first non-whitespace
/// character.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RequestShape {
    /// The body opens a JSON array: a batch of requests.
    Array,
    /// The body opens anything else: a single request (or a parse failure
    /// downstream).
    Object,
    /// The body ended before any non-whitespace character.
    Indeterminate,
}

impl RequestShape {
    /// Classify an in-memory string in a single pass.
    pub(crate) fn of_str(input: &str) -> RequestShape {
        Self::of_slice(input.as_bytes())
    }

    /// Classify an in-memory byte slice in a single pass.
    pub(crate) fn of_slice(input: &[u8]) -> RequestShape {
        Self::decide(input).unwrap_or(RequestShape::Indeterminate)
    }

    /// Classify a streaming body without consuming it.
    ///
    /// Chunks are read off the stream one at a time and accumulated until a
    /// non-whitespace byte shows up or the stream ends. The returned body
    /// chains the accumulated prefix back in front of the unread remainder,
    /// so a parser reading it observes the exact original byte sequence from
    /// the start.
    pub(crate) async fn of_body(body: Body) -> Result<(RequestShape, Body), axum::Error> {
        let mut stream = body.into_data_stream();
        let mut buffered = BytesMut::new();
        let mut shape = RequestShape::Indeterminate;

        while let Some(chunk) = stream.next().await {
            buffered.extend_from_slice(&chunk?);
            if let Some(decision) = Self::decide(&buffered) {
                shape = decision;
                break;
            }
        }

        let prefix = buffered.freeze();
        let replay = stream::once(ready(Ok::<Bytes, axum::Error>(prefix))).chain(stream);
        Ok((shape, Body::from_stream(replay)))
    }

    /// Whether this shape means a batched request.
    pub(crate) fn is_batch(&self) -> bool {
        matches!(self, RequestShape::Array)
    }

    // None while only whitespace has been seen so far.
    fn decide(input: &[u8]) -> Option<RequestShape> {
        input
            .iter()
            .find(|byte| !byte.is_ascii_whitespace())
            .map(|byte| {
                if *byte == b'[' {
                    RequestShape::Array
                } else {
                    RequestShape::Object
                }
            })
    }
}
