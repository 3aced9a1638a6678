//! Operational surface of the endpoint, for dashboards and consoles.

use std::sync::Arc;

use crate::context::Context;
use crate::graphql;
use crate::invoker::SingleInvocation;
use crate::services::endpoint::EndpointService;

impl EndpointService {
    /// The names of the schema's top-level query fields.
    pub fn queries(&self) -> Vec<String> {
        self.invoker.engine().query_fields()
    }

    /// The names of the schema's top-level mutation fields.
    pub fn mutations(&self) -> Vec<String> {
        self.invoker.engine().mutation_fields()
    }

    /// Execute one document with empty variables, outside any transport
    /// request, and return its serialized wire JSON. A failure returns the
    /// failure's message instead.
    pub async fn execute_query(&self, query: &str) -> String {
        let invocation = SingleInvocation {
            request: graphql::Request::builder().query(query).build(),
            context: Arc::new(Context::internal()),
        };
        match self.invoker.invoke(invocation).await {
            Ok(result) => self
                .mapper
                .serialize(&result)
                .unwrap_or_else(|err| err.to_string()),
            Err(fault) => fault.to_string(),
        }
    }
}
