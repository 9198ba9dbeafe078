//! Async hex-chunked streams: `)]}'\n` followed by a sequence of
//! `<hex-length>;<chunk-bytes>` frames.

use serde_json::Value;

const XSSI_PREFIX: &str = ")]}'\n";

/// True if `body` starts with the XSSI prefix followed by a hex length.
#[must_use]
pub fn is_async_chunked(body: &str) -> bool {
    let Some(rest) = body.strip_prefix(XSSI_PREFIX) else {
        return false;
    };
    let Some(hex_end) = rest.find(';') else {
        return false;
    };
    !rest[..hex_end].is_empty() && rest[..hex_end].chars().all(|c| c.is_ascii_hexdigit())
}

/// One decoded chunk, classified by its content.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Jspb(Vec<Value>),
    Html(String),
    Text(String),
}

/// Parse an async-chunked body into its classified chunks.
///
/// Stops (returning whatever was parsed so far) at the first malformed
/// frame rather than erroring, per the format parsers' total/failure-safe
/// contract.
#[must_use]
pub fn parse(body: &str) -> Vec<Chunk> {
    let Some(mut rest) = body.strip_prefix(XSSI_PREFIX) else {
        return Vec::new();
    };

    let mut chunks = Vec::new();
    while !rest.is_empty() {
        let Some(semi) = rest.find(';') else { break };
        let Ok(len) = usize::from_str_radix(&rest[..semi], 16) else {
            break;
        };
        rest = &rest[semi + 1..];
        if rest.len() < len {
            break;
        }
        let (chunk_bytes, remaining) = rest.split_at(len);
        rest = remaining;

        chunks.push(classify(chunk_bytes));
    }

    chunks
}

fn classify(chunk: &str) -> Chunk {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(chunk) {
        return Chunk::Jspb(items);
    }
    if chunk.trim_start().starts_with('<') {
        return Chunk::Html(chunk.to_string());
    }
    Chunk::Text(chunk.to_string())
}
