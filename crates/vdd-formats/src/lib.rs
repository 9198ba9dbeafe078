//! Format detection and parsing for the wire formats observed on captured
//! HTTP(S) traffic.
//!
//! Each format has a small detector (`is_x`/`sniff`) plus a total,
//! failure-safe parser: structurally invalid input yields an absence of
//! result rather than an error, so a caller can try several formats in
//! turn without special-casing failure. [`detect`] runs that sequence for
//! the formats this crate knows about; raw binary protobuf (detected by
//! content-type alone, with no envelope of its own to parse) is left to
//! the caller and `vdd-wire`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod async_chunked;
pub mod batch_execute;
pub mod graphql;
pub mod grpc_web;
pub mod multipart;
pub mod ndjson;
pub mod sse;

use serde_json::Value;

/// The outcome of running [`detect`] over one captured body.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectedFormat {
    GrpcWeb(Vec<grpc_web::Frame>),
    BatchExecuteRequest(Vec<batch_execute::RpcCall>),
    BatchExecuteResponse(Vec<batch_execute::WrbEntry>),
    AsyncChunked(Vec<async_chunked::Chunk>),
    Sse(Vec<sse::SseEvent>),
    NdJson(Vec<Value>),
    Multipart(Vec<multipart::Part>),
    GraphQl(graphql::GraphQlRequest),
    /// A JSON array that is itself a JSPB positional encoding — see
    /// `vdd_wire::jspb::decode_jspb` to turn this into a field-number tree.
    JspbArray(Vec<Value>),
    Json(Value),
    /// No parser in this crate recognized the body; the caller should fall
    /// back to raw protobuf (content-type-driven) or treat it as opaque.
    Unknown,
}

/// Run the format detectors over one captured body, in the priority order
/// fixed by the wire-format table: URL-keyed batch-execute first (it wins
/// over content-type), then content-type-keyed formats, then structural
/// sniffing of an undeclared body.
#[must_use]
pub fn detect(content_type: Option<&str>, url_path: &str, body: &[u8]) -> DetectedFormat {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    let text = String::from_utf8_lossy(body);

    if batch_execute::is_batch_execute_url(url_path) {
        let response = batch_execute::parse_response(&text);
        if !response.is_empty() {
            return DetectedFormat::BatchExecuteResponse(response);
        }
        let request = batch_execute::parse_request(&text);
        if !request.is_empty() {
            return DetectedFormat::BatchExecuteRequest(request);
        }
    }

    if grpc_web::is_grpc_web(&ct) {
        let frames = if grpc_web::is_grpc_web_text(&ct) {
            grpc_web::parse_text_frames(&text)
        } else {
            grpc_web::parse_frames(body)
        };
        if let Some(frames) = frames {
            return DetectedFormat::GrpcWeb(frames);
        }
    }

    if async_chunked::is_async_chunked(&text) {
        return DetectedFormat::AsyncChunked(async_chunked::parse(&text));
    }

    if sse::is_sse(&ct) {
        return DetectedFormat::Sse(sse::parse_sse(&text));
    }

    if ndjson::is_ndjson(&ct) || ndjson::sniff(&text) {
        return DetectedFormat::NdJson(ndjson::parse(&text));
    }

    if let Some(boundary) = multipart::boundary_from_content_type(&ct) {
        return DetectedFormat::Multipart(multipart::parse(body, &boundary));
    }

    let json_body = serde_json::from_str::<Value>(&text).ok();

    if graphql::is_graphql_url(url_path) {
        if let Some(value) = &json_body {
            if let Some(gql) = graphql::parse(value) {
                return DetectedFormat::GraphQl(gql);
            }
        }
    }
    if let Some(value) = &json_body {
        if graphql::sniff(value) {
            if let Some(gql) = graphql::parse(value) {
                return DetectedFormat::GraphQl(gql);
            }
        }
    }

    if ct.contains("json+protobuf") {
        if let Some(Value::Array(items)) = &json_body {
            return DetectedFormat::JspbArray(items.clone());
        }
    }

    match json_body {
        Some(Value::Array(items)) => DetectedFormat::JspbArray(items),
        Some(value) => DetectedFormat::Json(value),
        None => DetectedFormat::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_ndjson_by_sniffing() {
        let body = b"{\"a\":1}\n{\"b\":2}\n";
        let result = detect(None, "/stream", body);
        assert_eq!(result, DetectedFormat::NdJson(vec![json!({"a": 1}), json!({"b": 2})]));
    }

    #[test]
    fn detects_plain_json_object() {
        let body = br#"{"hello":"world"}"#;
        let result = detect(Some("application/json"), "/api/v1/users", body);
        assert_eq!(result, DetectedFormat::Json(json!({"hello": "world"})));
    }

    #[test]
    fn detects_jspb_array_without_content_type() {
        let body = br#"[null,"hello",[1,2,3]]"#;
        let result = detect(None, "/rpc", body);
        assert_eq!(result, DetectedFormat::JspbArray(vec![Value::Null, json!("hello"), json!([1, 2, 3])]));
    }

    #[test]
    fn detects_graphql_by_url() {
        let body = br#"{"query":"{ users { id } }"}"#;
        let result = detect(Some("application/json"), "/api/graphql", body);
        assert!(matches!(result, DetectedFormat::GraphQl(_)));
    }

    #[test]
    fn unrecognized_binary_body_is_unknown() {
        let body = [0xDE, 0xAD, 0xBE, 0xEF];
        let result = detect(Some("application/octet-stream"), "/raw", &body);
        assert_eq!(result, DetectedFormat::Unknown);
    }

    #[test]
    fn batch_execute_url_wins_over_content_type() {
        let frame = json!([["wrb.fr", "Rpc", {"ok": true}, null]]).to_string();
        let body = format!(")]}}'\n{}\n{}", frame.len(), frame);
        let result = detect(Some("text/plain"), "/_/app/data/batchexecute", body.as_bytes());
        assert!(matches!(result, DetectedFormat::BatchExecuteResponse(_)));
    }
}
