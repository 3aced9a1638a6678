//! Implementation of the endpoint service and its request lifecycle.

pub(crate) mod endpoint;

pub(crate) const APPLICATION_JSON_UTF8: &str = "application/json;charset=UTF-8";
