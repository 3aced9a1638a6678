//! Endpoint configuration.

use std::net::SocketAddr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Configuration for the GraphQL endpoint server.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// The socket address to listen on.
    pub listen: SocketAddr,

    /// Detach request handling onto a dedicated worker task per request
    /// instead of running it inline on the connection task.
    pub async_dispatch: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            async_dispatch: false,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4000))
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder(visibility = "pub")]
    fn new(listen: Option<SocketAddr>, async_dispatch: Option<bool>) -> Self {
        Self {
            listen: listen.unwrap_or_else(default_listen),
            async_dispatch: async_dispatch.unwrap_or_default(),
        }
    }
}
