//! Implements the endpoint phase of the request lifecycle.
//!
//! One service call runs the whole per-request protocol: notify listeners,
//! normalize the transport request into an invocation input, dispatch it to
//! the execution engine, map the results to wire JSON, and deliver the phase
//! callbacks. Every listener and callback fault is contained locally.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::Poll;

use bytes::Bytes;
use bytes::BytesMut;
use futures::future::ready;
use futures::future::BoxFuture;
use futures::stream;
use futures::StreamExt;
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use http::StatusCode;
use mediatype::names::APPLICATION;
use mediatype::MediaType;
use tokio::sync::oneshot;
use tower::BoxError;
use tower_service::Service;

use super::body;
use super::Body;
use crate::configuration::Configuration;
use crate::context::Context;
use crate::error::RequestError;
use crate::graphql;
use crate::introspection::INTROSPECTION_REQUEST;
use crate::invoker::BatchInvocation;
use crate::invoker::ExecutionEngine;
use crate::invoker::InvocationInput;
use crate::invoker::QueryInvoker;
use crate::invoker::SingleInvocation;
use crate::json_ext::Object;
use crate::listener::ListenerRegistry;
use crate::listener::RequestCallbacks;
use crate::mapper::ResponseMapper;
use crate::protocols::multipart;
use crate::protocols::request_shape::RequestShape;
use crate::services::APPLICATION_JSON_UTF8;

pub(crate) static APPLICATION_JSON_UTF8_HEADER_VALUE: HeaderValue =
    HeaderValue::from_static(APPLICATION_JSON_UTF8);

/// The GraphQL endpoint: a [`Service`] turning transport requests into
/// executed, serialized GraphQL responses.
///
/// Supported request shapes:
///
/// * `GET /schema.json`: the fixed introspection request;
/// * `GET` with `query`, optional `variables` and `operationName` parameters
///   (`query` may also hold a JSON array of requests);
/// * `POST application/graphql`: the body is the raw document;
/// * `POST multipart/form-data`: a `graphql` part (full JSON request or
///   batch) or a `query` part with optional `variables`/`operationName`
///   siblings, plus any number of uploaded files;
/// * `POST` raw JSON: one request object or an array of them.
#[derive(Clone)]
pub struct EndpointService {
    pub(crate) invoker: QueryInvoker,
    pub(crate) mapper: Arc<ResponseMapper>,
    listeners: ListenerRegistry,
    async_dispatch: bool,
}

#[buildstructor::buildstructor]
impl EndpointService {
    /// This is the constructor (or builder) to use when constructing an
    /// `EndpointService`.
    ///
    /// Only the execution engine is required; the mapper defaults to the
    /// process-shared one, the listener registry starts empty, and the
    /// configuration falls back to [`Configuration::default`].
    #[builder(visibility = "pub")]
    fn new(
        engine: Arc<dyn ExecutionEngine>,
        mapper: Option<Arc<ResponseMapper>>,
        listeners: Option<ListenerRegistry>,
        configuration: Option<Configuration>,
    ) -> Self {
        let configuration = configuration.unwrap_or_default();
        Self {
            invoker: QueryInvoker::new(engine),
            mapper: mapper.unwrap_or_else(ResponseMapper::shared),
            listeners: listeners.unwrap_or_default(),
            async_dispatch: configuration.async_dispatch,
        }
    }

    /// The listener registry backing this service. Additions and removals
    /// apply to requests that arrive after the change.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }
}

impl Service<http::Request<Body>> for EndpointService {
    type Response = http::Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Body>) -> Self::Future {
        let self_clone = self.clone();
        let this = std::mem::replace(self, self_clone);
        Box::pin(async move { Ok(this.dispatch(req).await) })
    }
}

impl EndpointService {
    /// Run one request either inline or detached on a worker task, per the
    /// configured dispatch mode.
    async fn dispatch(self, request: http::Request<Body>) -> http::Response<Body> {
        if !self.async_dispatch {
            return self.handle(request).await;
        }

        // The worker owns the request outright; the connection-side future
        // only waits for the explicit completion signal.
        let (completion, completed) = oneshot::channel();
        tokio::spawn(async move {
            let response = self.handle(request).await;
            if completion.send(response).is_err() {
                tracing::debug!("client went away before request completion");
            }
        });
        match completed.await {
            Ok(response) => response,
            Err(_) => {
                tracing::error!("request worker was lost before signalling completion");
                server_error()
            }
        }
    }

    /// One full request lifecycle.
    ///
    /// Listener notification, the pipeline, and the phase callbacks always
    /// run in this order; the callbacks of every phase run in listener
    /// registration order, and `on_finally` is reached on every path.
    async fn handle(self, request: http::Request<Body>) -> http::Response<Body> {
        let (parts, request_body) = request.into_parts();

        let callbacks = self.notify_listeners(&parts);

        match self.run_pipeline(&parts, request_body).await {
            Ok(response) => {
                run_callbacks(&callbacks, |callback| callback.on_success(&response));
                run_callbacks(&callbacks, |callback| callback.on_finally());
                response
            }
            Err(fault) => {
                tracing::error!(error = %fault, "error executing GraphQL request");
                run_callbacks(&callbacks, |callback| callback.on_error(&fault));
                run_callbacks(&callbacks, |callback| callback.on_finally());
                server_error()
            }
        }
    }

    fn notify_listeners(&self, parts: &Parts) -> Vec<Box<dyn RequestCallbacks>> {
        let mut callbacks = Vec::new();
        for listener in self.listeners.snapshot() {
            match listener.on_request(parts) {
                Ok(Some(set)) => callbacks.push(set),
                Ok(None) => {}
                Err(fault) => {
                    tracing::error!(error = %fault, "error running listener");
                }
            }
        }
        callbacks
    }

    async fn run_pipeline(
        &self,
        parts: &Parts,
        request_body: Body,
    ) -> Result<http::Response<Body>, BoxError> {
        if parts.method == Method::GET {
            self.handle_get(parts).await
        } else if parts.method == Method::POST {
            self.handle_post(parts, request_body).await
        } else {
            Ok(http::Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .body(body::empty())
                .expect("valid response"))
        }
    }

    async fn handle_get(&self, parts: &Parts) -> Result<http::Response<Body>, BoxError> {
        if parts.uri.path() == "/schema.json" {
            let context = Arc::new(Context::from_parts(parts, false));
            return self
                .respond_single(SingleInvocation {
                    request: INTROSPECTION_REQUEST.clone(),
                    context,
                })
                .await;
        }

        let parameters: Vec<(String, String)> =
            match serde_urlencoded::from_str(parts.uri.query().unwrap_or("")) {
                Ok(parameters) => parameters,
                Err(err) => {
                    tracing::info!(error = %err, "bad GET request: undecodable query string");
                    return Ok(bad_request());
                }
            };

        let Some(query) = parameter(&parameters, "query") else {
            tracing::info!(
                "bad GET request: path was not \"/schema.json\" and no parameter named \"query\" given"
            );
            return Ok(bad_request());
        };

        // GET must not execute mutations.
        let context = Arc::new(Context::from_parts(parts, true));

        if RequestShape::of_str(query).is_batch() {
            let requests = match self.mapper.read_batch(&Bytes::from(query.to_string())) {
                Ok(requests) => requests,
                Err(err) => {
                    tracing::info!(error = %err, "bad GET request: parsing the batch failed");
                    return Ok(bad_request());
                }
            };
            return self.respond_batch(BatchInvocation { requests, context }).await;
        }

        let variables = match parameter(&parameters, "variables") {
            Some(text) => match self.mapper.deserialize_variables(text) {
                Ok(variables) => variables,
                Err(err) => {
                    tracing::info!(error = %err, "bad GET request: parsing variables failed");
                    return Ok(bad_request());
                }
            },
            None => Object::new(),
        };

        let request = graphql::Request::builder()
            .query(query.to_string())
            .and_operation_name(parameter(&parameters, "operationName").map(str::to_string))
            .variables(variables)
            .build();

        self.respond_single(SingleInvocation { request, context }).await
    }

    async fn handle_post(
        &self,
        parts: &Parts,
        request_body: Body,
    ) -> Result<http::Response<Body>, BoxError> {
        match self.normalize_post(parts, request_body).await {
            Ok(InvocationInput::Single(single)) => self.respond_single(single).await,
            Ok(InvocationInput::Batch(batch)) => self.respond_batch(batch).await,
            Err(err) => {
                tracing::info!(code = err.code(), error = %err, "bad POST request");
                Ok(http::Response::builder()
                    .status(err.status())
                    .body(body::empty())
                    .expect("valid response"))
            }
        }
    }

    /// Normalization rules for POST bodies, in priority order:
    /// `application/graphql`, `multipart/form-data`, then raw JSON.
    async fn normalize_post(
        &self,
        parts: &Parts,
        request_body: Body,
    ) -> Result<InvocationInput, RequestError> {
        if is_application_graphql(&parts.headers) {
            let document = body::into_bytes(request_body).await?;
            let query = String::from_utf8(document.to_vec()).map_err(|err| {
                RequestError::MalformedRequest {
                    reason: err.to_string(),
                }
            })?;
            return Ok(InvocationInput::Single(SingleInvocation {
                request: graphql::Request::builder().query(query).build(),
                context: Arc::new(Context::from_parts(parts, false)),
            }));
        }

        if let Some(boundary) = multipart::form_data_boundary(&parts.headers) {
            return self.normalize_multipart(parts, request_body, boundary).await;
        }

        // Raw JSON: a single request object or an array of them. Shape
        // detection replays whatever it read, so the parser sees the body
        // from its first byte.
        let (shape, request_body) = RequestShape::of_body(request_body).await?;
        let payload = body::into_bytes(request_body).await?;
        let context = Arc::new(Context::from_parts(parts, false));

        if shape.is_batch() {
            Ok(InvocationInput::Batch(BatchInvocation {
                requests: self.mapper.read_batch(&payload)?,
                context,
            }))
        } else {
            Ok(InvocationInput::Single(SingleInvocation {
                request: self.mapper.read_request(&payload)?,
                context,
            }))
        }
    }

    async fn normalize_multipart(
        &self,
        parts: &Parts,
        request_body: Body,
        boundary: String,
    ) -> Result<InvocationInput, RequestError> {
        let fields = multipart::collect_parts(request_body, boundary).await?;
        let context = Arc::new(Context::from_parts(parts, false));

        let input = if let Some(graphql_part) = fields.get("graphql") {
            // The part carries the complete JSON request or batch.
            let payload = graphql_part.bytes().clone();
            if RequestShape::of_slice(&payload).is_batch() {
                InvocationInput::Batch(BatchInvocation {
                    requests: self.mapper.read_batch(&payload)?,
                    context: context.clone(),
                })
            } else {
                InvocationInput::Single(SingleInvocation {
                    request: self.mapper.read_request(&payload)?,
                    context: context.clone(),
                })
            }
        } else if let Some(query_part) = fields.get("query") {
            let payload = query_part.bytes().clone();
            if RequestShape::of_slice(&payload).is_batch() {
                InvocationInput::Batch(BatchInvocation {
                    requests: self.mapper.read_batch(&payload)?,
                    context: context.clone(),
                })
            } else {
                let query = String::from_utf8(payload.to_vec()).map_err(|err| {
                    RequestError::MalformedRequest {
                        reason: err.to_string(),
                    }
                })?;

                let variables = match fields.get("variables") {
                    Some(part) => {
                        let text = std::str::from_utf8(part.bytes()).map_err(|err| {
                            RequestError::MalformedRequest {
                                reason: err.to_string(),
                            }
                        })?;
                        self.mapper.deserialize_variables(text)?
                    }
                    None => Object::new(),
                };

                let operation_name = fields
                    .get("operationName")
                    .map(|part| String::from_utf8_lossy(part.bytes()).trim().to_string());

                InvocationInput::Single(SingleInvocation {
                    request: graphql::Request::builder()
                        .query(query)
                        .and_operation_name(operation_name)
                        .variables(variables)
                        .build(),
                    context: context.clone(),
                })
            }
        } else {
            tracing::info!("bad POST multipart request: no part named \"graphql\" or \"query\"");
            return Err(RequestError::MissingMultipartField);
        };

        context.attach_files(fields);
        Ok(input)
    }

    async fn respond_single(
        &self,
        invocation: SingleInvocation,
    ) -> Result<http::Response<Body>, BoxError> {
        let result = self.invoker.invoke(invocation).await?;
        let payload = self.mapper.serialize(&result)?;

        Ok(http::Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, APPLICATION_JSON_UTF8_HEADER_VALUE.clone())
            .body(body::from_bytes(payload))
            .expect("valid response"))
    }

    /// Stream a batched response: headers first, then `[`, each result as it
    /// becomes available with its separating comma, then `]`. Nothing
    /// buffers the whole array.
    async fn respond_batch(
        &self,
        invocation: BatchInvocation,
    ) -> Result<http::Response<Body>, BoxError> {
        let mapper = self.mapper.clone();
        let results = self.invoker.invoke_batch(invocation).map(move |(result, has_next)| {
            let payload = mapper.serialize(&result)?;
            let mut frame = BytesMut::with_capacity(payload.len() + 1);
            frame.extend_from_slice(payload.as_bytes());
            if has_next {
                frame.extend_from_slice(b",");
            }
            Ok::<Bytes, BoxError>(frame.freeze())
        });

        let framed = stream::once(ready(Ok(Bytes::from_static(b"["))))
            .chain(results)
            .chain(stream::once(ready(Ok(Bytes::from_static(b"]")))));

        Ok(http::Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, APPLICATION_JSON_UTF8_HEADER_VALUE.clone())
            .body(body::from_result_stream(framed))
            .expect("valid response"))
    }
}

fn parameter<'a>(parameters: &'a [(String, String)], name: &str) -> Option<&'a str> {
    parameters
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn is_application_graphql(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| MediaType::parse(value).ok())
        .map(|mime| mime.ty == APPLICATION && mime.subty.as_str() == "graphql")
        .unwrap_or(false)
}

fn run_callbacks<F>(callbacks: &[Box<dyn RequestCallbacks>], action: F)
where
    F: Fn(&dyn RequestCallbacks) -> Result<(), BoxError>,
{
    for callback in callbacks {
        if let Err(fault) = action(callback.as_ref()) {
            tracing::error!(error = %fault, "error running callback");
        }
    }
}

fn bad_request() -> http::Response<Body> {
    http::Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(body::empty())
        .expect("valid response")
}

fn server_error() -> http::Response<Body> {
    http::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(body::empty())
        .expect("valid response")
}
