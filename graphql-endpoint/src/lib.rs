//! An HTTP request-protocol layer for GraphQL query execution.
//!
//! This crate turns inbound HTTP traffic (GET parameters, raw JSON bodies,
//! `application/graphql` documents, multipart uploads, and batched arrays of
//! requests) into normalized invocations of a host-supplied
//! [`ExecutionEngine`], then streams the results back as JSON. Around every
//! request it runs an ordered, fault-isolated [`RequestListener`] protocol
//! with success/error/finally callbacks, optionally on a worker task detached
//! from the connection.
//!
//! The execution engine itself (parsing, validation, resolution) is not this
//! crate's concern; it is a black box behind the [`ExecutionEngine`] trait.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use graphql_endpoint::Configuration;
//! use graphql_endpoint::EndpointService;
//! use graphql_endpoint::ExecutionEngine;
//!
//! async fn run(engine: Arc<dyn ExecutionEngine>) -> std::io::Result<()> {
//!     let configuration = Configuration::default();
//!     let service = EndpointService::builder()
//!         .engine(engine)
//!         .configuration(configuration.clone())
//!         .build();
//!     graphql_endpoint::serve(&configuration, service).await
//! }
//! ```

#![warn(unreachable_pub)]

mod axum_server;
mod configuration;
mod context;
mod error;
pub mod graphql;
mod introspection;
mod invoker;
pub mod json_ext;
mod listener;
mod management;
mod mapper;
mod protocols;
mod services;

pub use axum_server::main_router;
pub use axum_server::serve;
pub use configuration::Configuration;
pub use context::Context;
pub use error::RequestError;
pub use introspection::INTROSPECTION_QUERY;
pub use invoker::BatchInvocation;
pub use invoker::ExecutionEngine;
pub use invoker::InvocationInput;
pub use invoker::SingleInvocation;
pub use listener::ListenerRegistry;
pub use listener::RequestCallbacks;
pub use listener::RequestListener;
pub use mapper::DefaultErrorPolicy;
pub use mapper::ErrorPolicy;
pub use mapper::ResponseMapper;
pub use protocols::multipart::FileMap;
pub use protocols::multipart::UploadedPart;
pub use services::endpoint::Body;
pub use services::endpoint::BoxService;
pub use services::endpoint::EndpointService;
