//! GraphQL request envelope detection: `{query, variables?, operationName?}`.

use serde_json::Value;

/// True if the request URL path names a GraphQL endpoint.
#[must_use]
pub fn is_graphql_url(path: &str) -> bool {
    path.contains("/graphql")
}

/// A parsed GraphQL request body.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Option<Value>,
    pub operation_name: Option<String>,
}

/// True if `value` has the shape of a GraphQL request body (has a `query`
/// string key, independent of URL path).
#[must_use]
pub fn sniff(value: &Value) -> bool {
    value.get("query").and_then(Value::as_str).is_some()
}

/// Parse a JSON value into a [`GraphQlRequest`], if it has the expected
/// shape.
#[must_use]
pub fn parse(value: &Value) -> Option<GraphQlRequest> {
    let query = value.get("query")?.as_str()?.to_string();
    let variables = value.get("variables").cloned();
    let operation_name = value
        .get("operationName")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(GraphQlRequest { query, variables, operation_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_graphql_url() {
        assert!(is_graphql_url("/api/graphql"));
        assert!(!is_graphql_url("/api/v1/users"));
    }

    #[test]
    fn sniffs_and_parses_full_envelope() {
        let body = json!({
            "query": "query GetUser($id: ID!) { user(id: $id) { name } }",
            "variables": {"id": "42"},
            "operationName": "GetUser",
        });
        assert!(sniff(&body));
        let parsed = parse(&body).unwrap();
        assert_eq!(parsed.operation_name.as_deref(), Some("GetUser"));
        assert_eq!(parsed.variables, Some(json!({"id": "42"})));
    }

    #[test]
    fn parse_without_optional_fields() {
        let body = json!({"query": "{ users { id } }"});
        let parsed = parse(&body).unwrap();
        assert_eq!(parsed.variables, None);
        assert_eq!(parsed.operation_name, None);
    }

    #[test]
    fn non_graphql_body_not_sniffed() {
        assert!(!sniff(&json!({"foo": "bar"})));
        assert!(parse(&json!({"foo": "bar"})).is_none());
    }
}
