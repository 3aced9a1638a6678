use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;

use super::Error;
use crate::json_ext::Object;

/// The result of executing one GraphQL request.
///
/// This layer only interprets the three standard fields; everything inside
/// `data` and `extensions` belongs to the execution engine. The wire form a
/// client sees is produced by the
/// [`ResponseMapper`][crate::mapper::ResponseMapper], which applies the error
/// policy before serialization.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The GraphQL errors encountered, possibly empty.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional GraphQL extensions.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extensions: Option<Object>,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(data: Option<Value>, errors: Vec<Error>, extensions: Option<Object>) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }

    /// Build a `Response` carrying a single error and no data.
    pub fn from_error(error: Error) -> Self {
        Response {
            errors: vec![error],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serde_json_bytes::json as bjson;

    use super::*;
    use crate::graphql::Location;

    #[test]
    fn test_response() {
        let result = serde_json::from_str::<Response>(
            json!(
            {
              "errors": [
                {
                  "message": "Name for character with ID 1002 could not be fetched.",
                  "locations": [{ "line": 6, "column": 7 }],
                  "extensions": {
                    "error-extension": 5,
                  }
                }
              ],
              "data": {
                "hero": {
                  "name": "R2-D2"
                }
              },
              "extensions": {
                "response-extension": 3,
              }
            })
            .to_string()
            .as_str(),
        );
        assert_eq!(
            result.unwrap(),
            Response::builder()
                .data(bjson!({
                  "hero": {
                    "name": "R2-D2"
                  }
                }))
                .errors(vec![Error {
                    message: "Name for character with ID 1002 could not be fetched.".into(),
                    locations: vec![Location { line: 6, column: 7 }],
                    extensions: bjson!({
                        "error-extension": 5,
                    })
                    .as_object()
                    .cloned()
                    .unwrap(),
                    ..Default::default()
                }])
                .extensions(
                    bjson!({
                        "response-extension": 3,
                    })
                    .as_object()
                    .cloned()
                    .unwrap()
                )
                .build()
        );
    }

    #[test]
    fn absent_fields_stay_off_the_wire() {
        let response = Response::builder().data(Value::Null).build();
        let serialized = serde_json::to_string(&response).unwrap();
        assert_eq!(serialized, r#"{"data":null}"#);
    }
}
