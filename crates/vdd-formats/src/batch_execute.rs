//! Google-style `batchexecute` envelopes: form-encoded request with a JSON
//! `f.req` field, and a length-prefixed JSON response framed behind an XSSI
//! prefix.

use serde_json::Value;

const XSSI_PREFIX: &str = ")]}'\n";

/// True if the request URL path names a `batchexecute` endpoint.
#[must_use]
pub fn is_batch_execute_url(path: &str) -> bool {
    path.contains("batchexecute")
}

/// One RPC call extracted from the request envelope:
/// `[rpcId, innerJson, null, "generic"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    pub rpc_id: String,
    pub inner: Value,
}

/// Parse the `f.req` field of a form-encoded batch-execute request body.
///
/// `body` is the raw `application/x-www-form-urlencoded` payload.
#[must_use]
pub fn parse_request(body: &str) -> Vec<RpcCall> {
    let Some(f_req) = find_form_field(body, "f.req") else {
        return Vec::new();
    };
    let Ok(Value::Array(outer)) = serde_json::from_str::<Value>(&f_req) else {
        return Vec::new();
    };
    let Some(Value::Array(calls)) = outer.into_iter().next() else {
        return Vec::new();
    };

    calls
        .into_iter()
        .filter_map(|call| {
            let Value::Array(parts) = call else { return None };
            let rpc_id = parts.first()?.as_str()?.to_string();
            let inner = parts.get(1).cloned().unwrap_or(Value::Null);
            Some(RpcCall { rpc_id, inner })
        })
        .collect()
}

fn find_form_field(body: &str, name: &str) -> Option<String> {
    body.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name {
            Some(form_urldecode(value))
        } else {
            None
        }
    })
}

fn form_urldecode(value: &str) -> String {
    let replaced = value.replace('+', " ");
    let mut out = String::with_capacity(replaced.len());
    let mut chars = replaced.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                out.push(byte as char);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// One response entry: a `"wrb.fr"`-tagged reply to an RPC call.
#[derive(Debug, Clone, PartialEq)]
pub struct WrbEntry {
    pub rpc_id: String,
    pub inner: Option<Value>,
    pub error_code: Option<i64>,
}

/// Parse a batch-execute response body: strip the XSSI prefix, walk its
/// decimal-length-prefixed JSON frames, and extract every `"wrb.fr"` entry.
#[must_use]
pub fn parse_response(body: &str) -> Vec<WrbEntry> {
    let Some(mut rest) = body.strip_prefix(XSSI_PREFIX) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    loop {
        rest = rest.trim_start_matches('\n');
        if rest.is_empty() {
            break;
        }
        let Some(newline) = rest.find('\n') else { break };
        let Ok(len) = rest[..newline].trim().parse::<usize>() else {
            break;
        };
        rest = &rest[newline + 1..];
        if rest.len() < len {
            break;
        }
        let (frame, remaining) = rest.split_at(len);
        rest = remaining;

        if let Ok(Value::Array(batches)) = serde_json::from_str::<Value>(frame) {
            for entry in batches {
                if let Some(wrb) = parse_wrb_entry(&entry) {
                    entries.push(wrb);
                }
            }
        }
    }

    entries
}

fn parse_wrb_entry(entry: &Value) -> Option<WrbEntry> {
    let arr = entry.as_array()?;
    if arr.first()?.as_str()? != "wrb.fr" {
        return None;
    }
    let rpc_id = arr.get(1)?.as_str()?.to_string();
    let inner = arr.get(2).filter(|v| !v.is_null()).cloned();
    let error_code = arr.get(3).and_then(Value::as_i64);
    Some(WrbEntry { rpc_id, inner, error_code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_batchexecute_path() {
        assert!(is_batch_execute_url("/_/ScraperUi/data/batchexecute"));
        assert!(!is_batch_execute_url("/api/v1/users"));
    }

    #[test]
    fn parses_f_req_form_field() {
        let envelope = json!([[["GetUsers", {"id": 1}, null, "generic"]]]).to_string();
        let body = format!("f.req={}&at=token", urlencode(&envelope));
        let calls = parse_request(&body);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].rpc_id, "GetUsers");
        assert_eq!(calls[0].inner, json!({"id": 1}));
    }

    #[test]
    fn parses_response_wrb_fr_entries() {
        let frame = json!([["wrb.fr", "GetUsers", {"ok": true}, null]]).to_string();
        let body = format!("{XSSI_PREFIX}{}\n{}", frame.len(), frame);
        let entries = parse_response(&body);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rpc_id, "GetUsers");
        assert_eq!(entries[0].inner, Some(json!({"ok": true})));
        assert_eq!(entries[0].error_code, None);
    }

    #[test]
    fn response_without_xssi_prefix_is_empty() {
        assert!(parse_response("[[\"wrb.fr\"]]").is_empty());
    }

    fn urlencode(s: &str) -> String {
        let mut out = String::new();
        for b in s.bytes() {
            match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(b as char);
                }
                _ => out.push_str(&format!("%{b:02X}")),
            }
        }
        out
    }
}
