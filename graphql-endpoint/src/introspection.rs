//! The fixed introspection request served for `GET /schema.json`.

use once_cell::sync::Lazy;

use crate::graphql;

/// The standard introspection document, asking a schema for its own
/// structure.
pub const INTROSPECTION_QUERY: &str = r#"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types {
      ...FullType
    }
    directives {
      name
      description
      locations
      args {
        ...InputValue
      }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args {
      ...InputValue
    }
    type {
      ...TypeRef
    }
    isDeprecated
    deprecationReason
  }
  inputFields {
    ...InputValue
  }
  interfaces {
    ...TypeRef
  }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes {
    ...TypeRef
  }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// The pre-built request wrapping [`INTROSPECTION_QUERY`]: empty variables,
/// no operation name. Built once per process, cloned per use.
pub(crate) static INTROSPECTION_REQUEST: Lazy<graphql::Request> =
    Lazy::new(|| graphql::Request::builder().query(INTROSPECTION_QUERY).build());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn introspection_request_has_fixed_shape() {
        let request = INTROSPECTION_REQUEST.clone();
        assert_eq!(request.query, INTROSPECTION_QUERY);
        assert!(request.variables.is_empty());
        assert!(request.operation_name.is_none());
    }
}
