//! Binds the endpoint service to an axum HTTP server.

use axum::Router;
use tokio::net::TcpListener;

use crate::configuration::Configuration;
use crate::services::endpoint::EndpointService;

/// The axum router serving the endpoint.
///
/// Every path reaches the service: the GraphQL endpoint family is the only
/// route, and `/schema.json` is resolved inside the service itself.
pub fn main_router(service: EndpointService) -> Router {
    Router::new().fallback_service(service)
}

/// Bind the configured listen address and serve requests until the server is
/// shut down.
pub async fn serve(configuration: &Configuration, service: EndpointService) -> std::io::Result<()> {
    let listener = TcpListener::bind(configuration.listen).await?;
    tracing::info!(address = %configuration.listen, "GraphQL endpoint listening");
    axum::serve(listener, main_router(service)).await
}
