//! Conversion of execution results into their wire form.
//!
//! The [`ResponseMapper`] is the single place where a [`graphql::Response`]
//! becomes JSON text for a client: the configured [`ErrorPolicy`] decides
//! which errors are visible and how they look, and the wire object keeps its
//! keys in construction order (`data`, `errors`, `extensions`).

use std::sync::Arc;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use serde_json_bytes::Value;

use crate::graphql;
use crate::json_ext::Object;

/// Decides which GraphQL errors reach clients, and in what form.
///
/// Supplied by the host application; the default hides internal-only errors.
pub trait ErrorPolicy: Send + Sync {
    /// Whether any of the raw errors should surface at all. When this returns
    /// false the wire form carries no `errors` key.
    fn errors_present(&self, errors: &[graphql::Error]) -> bool {
        !errors.is_empty()
    }

    /// Transform the surviving errors into their client-visible form.
    fn process_errors(&self, errors: Vec<graphql::Error>) -> Vec<graphql::Error> {
        errors
    }
}

/// The default sanitization policy.
///
/// Errors flagged internal (see [`graphql::Error::is_internal`]) are hidden;
/// if any were hidden, one generic error without diagnostic detail takes
/// their place.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorPolicy;

impl ErrorPolicy for DefaultErrorPolicy {
    fn process_errors(&self, errors: Vec<graphql::Error>) -> Vec<graphql::Error> {
        let had_internal = errors.iter().any(graphql::Error::is_internal);
        let mut visible: Vec<graphql::Error> = errors
            .into_iter()
            .filter(|error| !error.is_internal())
            .collect();
        if had_internal {
            visible.push(
                graphql::Error::builder()
                    .message("Internal Server Error(s) while executing query")
                    .extension_code("INTERNAL_ERROR")
                    .build(),
            );
        }
        visible
    }
}

static DEFAULT_MAPPER: OnceCell<Arc<ResponseMapper>> = OnceCell::new();

/// Maps execution results to wire JSON and decodes request payloads.
///
/// One mapper is shared read-mostly across every in-flight request.
pub struct ResponseMapper {
    policy: Arc<dyn ErrorPolicy>,
}

#[buildstructor::buildstructor]
impl ResponseMapper {
    #[builder(visibility = "pub")]
    fn new(policy: Option<Arc<dyn ErrorPolicy>>) -> Self {
        Self {
            policy: policy.unwrap_or_else(|| Arc::new(DefaultErrorPolicy)),
        }
    }

    /// The process-wide mapper with the default error policy.
    ///
    /// Constructed at most once, on first use; every later caller reads the
    /// published instance without synchronization.
    pub fn shared() -> Arc<ResponseMapper> {
        DEFAULT_MAPPER
            .get_or_init(|| Arc::new(ResponseMapper::builder().build()))
            .clone()
    }

    /// The wire form of an execution result, including its data.
    pub fn to_wire(&self, result: &graphql::Response) -> Object {
        self.to_wire_filtered(result, true)
    }

    /// The wire form of an execution result.
    ///
    /// `data` appears (even when null) only when `include_data` is set;
    /// metadata-only calls omit it. `errors` appears only when the policy
    /// surfaces at least the possibility of errors; `extensions` only when
    /// present on the result.
    pub fn to_wire_filtered(&self, result: &graphql::Response, include_data: bool) -> Object {
        let mut wire = Object::new();

        if include_data {
            wire.insert("data", result.data.clone().unwrap_or(Value::Null));
        }

        if self.policy.errors_present(&result.errors) {
            let processed = self.policy.process_errors(result.errors.clone());
            let errors = processed
                .into_iter()
                .map(|error| serde_json_bytes::to_value(&error).unwrap_or(Value::Null))
                .collect::<Vec<_>>();
            wire.insert("errors", Value::Array(errors));
        }

        if let Some(extensions) = &result.extensions {
            wire.insert("extensions", Value::Object(extensions.clone()));
        }

        wire
    }

    /// Serialize an execution result as wire JSON text, stable key order,
    /// UTF-8.
    pub fn serialize(&self, result: &graphql::Response) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Value::Object(self.to_wire(result)))
    }

    /// Decode one GraphQL request object.
    pub fn read_request(&self, bytes: &Bytes) -> Result<graphql::Request, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Decode a JSON array of GraphQL request objects, preserving order.
    pub fn read_batch(&self, bytes: &Bytes) -> Result<Vec<graphql::Request>, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Decode an arbitrary variables payload into a generic nested mapping.
    ///
    /// Nested maps and sequences decode recursively, they are never
    /// flattened. Anything that is not a JSON object is rejected.
    pub fn deserialize_variables(&self, variables: &str) -> Result<Object, serde_json::Error> {
        serde_json::from_str(variables)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json as bjson;
    use test_log::test;

    use super::*;

    fn mapper() -> ResponseMapper {
        ResponseMapper::builder().build()
    }

    #[test]
    fn errors_key_is_omitted_when_policy_reports_none() {
        let result = graphql::Response::builder().data(bjson!({"ping": "pong"})).build();
        let wire = mapper().to_wire(&result);
        assert!(wire.get("errors").is_none());
        assert_eq!(
            mapper().serialize(&result).unwrap(),
            r#"{"data":{"ping":"pong"}}"#
        );
    }

    #[test]
    fn surfaced_errors_are_policy_transformed() {
        let result = graphql::Response::builder()
            .data(Value::Null)
            .errors(vec![
                graphql::Error::builder().message("field failed").build(),
                graphql::Error::builder()
                    .message("connection refused to 10.0.0.3:5432")
                    .extensions(bjson!({ "internal": true }).as_object().cloned().unwrap())
                    .build(),
            ])
            .build();

        let wire = mapper().to_wire(&result);
        let errors = wire.get("errors").unwrap().as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].get("message").unwrap(), &bjson!("field failed"));
        assert_eq!(
            errors[1].get("message").unwrap(),
            &bjson!("Internal Server Error(s) while executing query"),
            "internal detail must not reach the wire"
        );
    }

    #[test]
    fn data_key_is_gated_by_include_data() {
        let result = graphql::Response::builder().data(bjson!({"a": 1})).build();
        let with_data = mapper().to_wire_filtered(&result, true);
        let without_data = mapper().to_wire_filtered(&result, false);
        assert!(with_data.get("data").is_some());
        assert!(without_data.get("data").is_none());
    }

    #[test]
    fn null_data_is_still_written_when_included() {
        let result = graphql::Response::builder()
            .errors(vec![graphql::Error::builder().message("boom").build()])
            .build();
        assert_eq!(
            mapper().serialize(&result).unwrap(),
            r#"{"data":null,"errors":[{"message":"boom"}]}"#
        );
    }

    #[test]
    fn extensions_appear_only_when_present() {
        let bare = graphql::Response::builder().data(Value::Null).build();
        assert!(mapper().to_wire(&bare).get("extensions").is_none());

        let with_extensions = graphql::Response::builder()
            .data(Value::Null)
            .extensions(bjson!({ "tracing": {"version": 1} }).as_object().cloned().unwrap())
            .build();
        let wire = mapper().to_wire(&with_extensions);
        assert_eq!(
            wire.get("extensions").unwrap(),
            &bjson!({ "tracing": {"version": 1} })
        );
    }

    #[test]
    fn wire_keys_keep_construction_order() {
        let result = graphql::Response::builder()
            .data(bjson!({"a": 1}))
            .errors(vec![graphql::Error::builder().message("late").build()])
            .extensions(bjson!({ "took": 3 }).as_object().cloned().unwrap())
            .build();
        let text = mapper().serialize(&result).unwrap();
        let data_at = text.find("\"data\"").unwrap();
        let errors_at = text.find("\"errors\"").unwrap();
        let extensions_at = text.find("\"extensions\"").unwrap();
        assert!(data_at < errors_at && errors_at < extensions_at);
    }

    #[test]
    fn variables_decode_as_nested_mappings() {
        let variables = mapper()
            .deserialize_variables(r#"{"filter": {"tags": ["a", "b"], "depth": {"max": 3}}}"#)
            .unwrap();
        assert_eq!(
            variables.get("filter").unwrap(),
            &bjson!({"tags": ["a", "b"], "depth": {"max": 3}})
        );

        assert!(mapper().deserialize_variables("[1, 2]").is_err());
        assert!(mapper().deserialize_variables("3").is_err());
    }

    #[test]
    fn custom_policy_can_suppress_every_error() {
        struct Mute;
        impl ErrorPolicy for Mute {
            fn errors_present(&self, _errors: &[graphql::Error]) -> bool {
                false
            }
        }

        let mapper = ResponseMapper::builder().policy(Arc::new(Mute) as Arc<dyn ErrorPolicy>).build();
        let result = graphql::Response::builder()
            .data(Value::Null)
            .errors(vec![graphql::Error::builder().message("nope").build()])
            .build();
        assert_eq!(mapper.serialize(&result).unwrap(), r#"{"data":null}"#);
    }

    #[test]
    fn shared_mapper_is_constructed_once() {
        let first = ResponseMapper::shared();
        let second = ResponseMapper::shared();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn batch_decoding_preserves_order() {
        let batch = mapper()
            .read_batch(&Bytes::from_static(
                br#"[{"query":"{a}"},{"query":"{b}"},{"query":"{c}"}]"#,
            ))
            .unwrap();
        let documents: Vec<_> = batch.iter().map(|request| request.query.as_str()).collect();
        assert_eq!(documents, vec!["{a}", "{b}", "{c}"]);
    }
}
