//! The boundary between this layer and the GraphQL execution engine.
//!
//! The engine is a black box supplied by the host application. The
//! [`QueryInvoker`] wraps it with the two invocation shapes this layer
//! produces: one request to one result, or an ordered batch to an ordered
//! stream of results.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::Stream;
use tower::BoxError;

use crate::context::Context;
use crate::graphql;
use crate::graphql::INTERNAL_ERROR_EXTENSION;

/// The external GraphQL execution engine.
#[async_trait]
pub trait ExecutionEngine: Send + Sync + 'static {
    /// Execute one request against the schema.
    ///
    /// GraphQL-level failures belong in the returned [`graphql::Response`]'s
    /// errors; an `Err` means the engine itself broke and is treated as an
    /// unhandled fault by the caller.
    async fn execute(
        &self,
        request: graphql::Request,
        context: Arc<Context>,
    ) -> Result<graphql::Response, BoxError>;

    /// The names of the schema's top-level query fields.
    fn query_fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// The names of the schema's top-level mutation fields.
    fn mutation_fields(&self) -> Vec<String> {
        Vec::new()
    }
}

/// One normalized request bound to its [`Context`].
pub struct SingleInvocation {
    /// The request to execute.
    pub request: graphql::Request,
    /// The per-request transport context.
    pub context: Arc<Context>,
}

/// An ordered batch of normalized requests sharing one [`Context`].
pub struct BatchInvocation {
    /// The requests to execute, in wire order.
    pub requests: Vec<graphql::Request>,
    /// The per-request transport context.
    pub context: Arc<Context>,
}

/// Either invocation shape a transport request can normalize to.
pub enum InvocationInput {
    /// One request, one result.
    Single(SingleInvocation),
    /// An ordered batch, streamed to an ordered array of results.
    Batch(BatchInvocation),
}

/// Dispatches invocation inputs to the execution engine.
#[derive(Clone)]
pub(crate) struct QueryInvoker {
    engine: Arc<dyn ExecutionEngine>,
}

impl QueryInvoker {
    pub(crate) fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { engine }
    }

    pub(crate) fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }

    /// Execute one request. An engine fault propagates to the caller, which
    /// surfaces it as an unhandled pipeline fault.
    pub(crate) async fn invoke(
        &self,
        invocation: SingleInvocation,
    ) -> Result<graphql::Response, BoxError> {
        self.engine
            .execute(invocation.request, invocation.context)
            .await
    }

    /// Execute a batch strictly in input order, one request at a time.
    ///
    /// Each stream item pairs a result with a has-next flag that is true for
    /// every item except the last. A request whose execution faults still
    /// occupies its index, carrying the fault as a GraphQL error flagged
    /// internal so the error policy sanitizes it; the batch never aborts and
    /// no index is skipped.
    pub(crate) fn invoke_batch(
        &self,
        invocation: BatchInvocation,
    ) -> impl Stream<Item = (graphql::Response, bool)> + Send + 'static {
        let BatchInvocation { requests, context } = invocation;
        let total = requests.len();
        let engine = self.engine.clone();

        stream::unfold(
            (requests.into_iter().enumerate(), engine, context),
            move |(mut pending, engine, context)| async move {
                let (index, request) = pending.next()?;
                let response = match engine.execute(request, context.clone()).await {
                    Ok(response) => response,
                    Err(fault) => {
                        tracing::error!(index, error = %fault, "batch entry execution failed");
                        graphql::Response::from_error(
                            graphql::Error::builder()
                                .message(fault.to_string())
                                .extension(INTERNAL_ERROR_EXTENSION, true)
                                .build(),
                        )
                    }
                };
                Some(((response, index + 1 < total), (pending, engine, context)))
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json_bytes::json as bjson;

    use super::*;

    struct EchoEngine;

    #[async_trait]
    impl ExecutionEngine for EchoEngine {
        async fn execute(
            &self,
            request: graphql::Request,
            _context: Arc<Context>,
        ) -> Result<graphql::Response, BoxError> {
            if request.query == "{fail}" {
                return Err("execution engine exploded".into());
            }
            Ok(graphql::Response::builder()
                .data(bjson!({ "echo": request.query }))
                .build())
        }
    }

    fn batch(documents: &[&str]) -> BatchInvocation {
        BatchInvocation {
            requests: documents
                .iter()
                .map(|document| graphql::Request::builder().query(*document).build())
                .collect(),
            context: Arc::new(Context::internal()),
        }
    }

    #[tokio::test]
    async fn batch_results_keep_input_order_and_has_next() {
        let invoker = QueryInvoker::new(Arc::new(EchoEngine));
        let results: Vec<_> = invoker.invoke_batch(batch(&["{a}", "{b}", "{c}"])).collect().await;

        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|(_, has_next)| *has_next).collect::<Vec<_>>(),
            vec![true, true, false]
        );
        for ((response, _), document) in results.iter().zip(["{a}", "{b}", "{c}"]) {
            assert_eq!(response.data, Some(bjson!({ "echo": document })));
        }
    }

    #[tokio::test]
    async fn failing_batch_entry_keeps_its_index() {
        let invoker = QueryInvoker::new(Arc::new(EchoEngine));
        let results: Vec<_> = invoker.invoke_batch(batch(&["{a}", "{fail}", "{c}"])).collect().await;

        assert_eq!(results.len(), 3);
        let (failed, has_next) = &results[1];
        assert!(*has_next);
        assert!(failed.data.is_none());
        assert!(failed.errors[0].is_internal());
        assert_eq!(results[2].0.data, Some(bjson!({ "echo": "{c}" })));
    }

    #[tokio::test]
    async fn single_engine_fault_propagates() {
        let invoker = QueryInvoker::new(Arc::new(EchoEngine));
        let fault = invoker
            .invoke(SingleInvocation {
                request: graphql::Request::builder().query("{fail}").build(),
                context: Arc::new(Context::internal()),
            })
            .await
            .expect_err("engine fault must surface");
        assert!(fault.to_string().contains("exploded"));
    }
}
