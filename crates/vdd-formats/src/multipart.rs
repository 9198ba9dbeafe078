//! `multipart/mixed` batch request dissection (RFC 2046).

use std::collections::HashMap;

/// Detect `multipart/mixed` and extract its `boundary=` parameter.
#[must_use]
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let ct = content_type.to_ascii_lowercase();
    if !ct.contains("multipart/mixed") {
        return None;
    }
    content_type.split(';').find_map(|segment| {
        let segment = segment.trim();
        segment
            .strip_prefix("boundary=")
            .or_else(|| segment.strip_prefix("Boundary="))
            .map(|b| b.trim_matches('"').to_string())
    })
}

/// One dissected part: its headers and raw body bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Part {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Split a multipart body into its parts given the boundary token (without
/// the leading `--`).
#[must_use]
pub fn parse(body: &[u8], boundary: &str) -> Vec<Part> {
    let delimiter = format!("--{boundary}");
    let text = String::from_utf8_lossy(body);

    text.split(&delimiter)
        .filter(|segment| !segment.trim().is_empty() && *segment != "--" && !segment.starts_with("--"))
        .filter_map(parse_part)
        .collect()
}

fn parse_part(segment: &str) -> Option<Part> {
    let segment = segment.trim_start_matches(['\r', '\n']);
    let (header_block, body) = segment.split_once("\r\n\r\n").or_else(|| segment.split_once("\n\n"))?;

    let mut headers = HashMap::new();
    for line in header_block.lines() {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(
                name.trim().to_ascii_lowercase(),
                value.trim().to_string(),
            );
        }
    }

    let trimmed_body = body.trim_end_matches(['\r', '\n']);
    Some(Part {
        headers,
        body: trimmed_body.as_bytes().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_boundary_from_content_type() {
        let boundary = boundary_from_content_type(r#"multipart/mixed; boundary="batch_abc123""#);
        assert_eq!(boundary.as_deref(), Some("batch_abc123"));
    }

    #[test]
    fn non_multipart_content_type_yields_none() {
        assert!(boundary_from_content_type("application/json").is_none());
    }

    #[test]
    fn splits_two_parts_with_headers() {
        let body = concat!(
            "--batch123\r\n",
            "Content-Type: application/http\r\n",
            "\r\n",
            "GET /users HTTP/1.1\r\n",
            "--batch123\r\n",
            "Content-Type: application/http\r\n",
            "\r\n",
            "GET /orders HTTP/1.1\r\n",
            "--batch123--",
        );

        let parts = parse(body.as_bytes(), "batch123");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].headers.get("content-type").unwrap(), "application/http");
        assert!(String::from_utf8_lossy(&parts[0].body).contains("GET /users"));
        assert!(String::from_utf8_lossy(&parts[1].body).contains("GET /orders"));
    }
}
