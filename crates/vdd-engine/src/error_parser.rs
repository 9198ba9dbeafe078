//! Error parser (C3): decode validation-error responses into a uniform
//! field-discovery list.
//!
//! Input is either a JSON body matching the `google.rpc.Status` JSON
//! mapping, or the binary form (decoded via `vdd-wire` and lifted into the
//! same shape by [`lift_binary_status`]).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use vdd_wire::tree::{decode_tree, LenValue, TreeNode};

/// A field discovered from a validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredField {
    pub path: String,
    pub name: String,
    pub number: Option<u32>,
    pub scalar_type: Option<String>,
    pub message_type: Option<String>,
    pub is_enum: bool,
    pub required: bool,
    pub repeated: bool,
}

/// `service`/`method` metadata lifted from an `ErrorInfo` detail, when
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMetadata {
    pub service: Option<String>,
    pub method: Option<String>,
}

/// The parsed outcome of one error body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedError {
    pub fields: Vec<DiscoveredField>,
    pub metadata: ErrorMetadata,
}

static FIELD_VIOLATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Invalid value at '([^']+)' \(([^)]+)\), (?:Base64 decoding failed for )?"?(x?\d+)"?"#).unwrap()
});
static MISSING_REQUIRED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Missing required field (\w+) at '([^']+)'").unwrap());
static ENUM_INDICATOR_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)cannot add list to non-message field").unwrap(),
        Regex::new(r"(?i)no field found for index \d+, expected a message field").unwrap(),
    ]
});

/// Parse a JSON `google.rpc.Status`-shaped error body.
///
/// Never fails — a body that doesn't match the expected shape yields an
/// empty [`ParsedError`].
#[must_use]
pub fn parse_json_error(body: &Value) -> ParsedError {
    let Some(error) = body.get("error") else {
        return ParsedError::default();
    };

    let mut required_map: HashMap<String, Vec<String>> = HashMap::new();
    let mut fields = Vec::new();
    let mut metadata = ErrorMetadata::default();

    if let Some(details) = error.get("details").and_then(Value::as_array) {
        for detail in details {
            let at_type = detail.get("@type").and_then(Value::as_str).unwrap_or("");
            if at_type.contains("BadRequest") {
                collect_violations(detail, &mut required_map, &mut fields);
            } else if at_type.contains("ErrorInfo") {
                metadata.service = detail.get("domain").and_then(Value::as_str).map(str::to_string);
                metadata.method = detail
                    .get("metadata")
                    .and_then(|m| m.get("method"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }
    }

    if let Some(message) = error.get("message").and_then(Value::as_str) {
        for line in message.lines() {
            collect_from_message_line(line, &mut required_map, &mut fields);
        }
    }

    apply_required_map(&required_map, &mut fields);
    ParsedError { fields, metadata }
}

/// Parse a binary `google.rpc.Status` message (field 1 = code, field 2 =
/// message, field 3 = repeated `google.protobuf.Any` details) by lifting it
/// into the same JSON shape [`parse_json_error`] expects.
#[must_use]
pub fn lift_binary_status(bytes: &[u8]) -> Value {
    let Ok(tree) = decode_tree(bytes) else {
        return Value::Null;
    };

    let mut code = 0i64;
    let mut message = String::new();
    let mut details = Vec::new();

    for node in &tree {
        match (node.field, &node.node) {
            (1, TreeNode::Varint { zigzag, .. }) => code = *zigzag,
            (2, TreeNode::Len(LenValue::String(s))) => message = s.clone(),
            (3, TreeNode::Len(LenValue::Message(children))) => {
                details.push(lift_any(children));
            }
            _ => {}
        }
    }

    serde_json::json!({ "error": { "code": code, "message": message, "details": details } })
}

fn lift_any(children: &[vdd_wire::tree::FieldNode]) -> Value {
    let mut type_url = String::new();
    let mut value = Vec::new();
    for child in children {
        match (child.field, &child.node) {
            (1, TreeNode::Len(LenValue::String(s))) => type_url = s.clone(),
            (2, TreeNode::Len(LenValue::Bytes(b))) => value = b.clone(),
            (2, TreeNode::Len(LenValue::String(s))) => value = s.clone().into_bytes(),
            _ => {}
        }
    }
    serde_json::json!({ "@type": type_url, "_rawValueLen": value.len() })
}

fn collect_violations(
    detail: &Value,
    required_map: &mut HashMap<String, Vec<String>>,
    fields: &mut Vec<DiscoveredField>,
) {
    let Some(violations) = detail.get("fieldViolations").and_then(Value::as_array) else {
        return;
    };
    for violation in violations {
        let description = violation.get("description").and_then(Value::as_str).unwrap_or("");
        let explicit_field = violation.get("field").and_then(Value::as_str);

        if let Some(stripped) = description.strip_prefix("Missing required field ") {
            record_missing_required(stripped, required_map);
            continue;
        }

        let Some(captures) = FIELD_VIOLATION_PATTERN.captures(description) else {
            continue;
        };
        let regex_path = &captures[1];
        let type_str = &captures[2];
        let number = parse_field_number(&captures[3]);
        let path = explicit_field.unwrap_or(regex_path);

        build_field(path, type_str, description, number, fields);
    }
}

/// The violation message's trailing number token is `x<N>` for a field
/// number or a bare `<N>` for a Base64-decode-failure byte offset; only the
/// `x`-prefixed form names a field number.
fn parse_field_number(token: &str) -> Option<u32> {
    token.strip_prefix('x').and_then(|n| n.parse().ok())
}

fn collect_from_message_line(
    line: &str,
    required_map: &mut HashMap<String, Vec<String>>,
    fields: &mut Vec<DiscoveredField>,
) {
    if let Some(stripped) = line.strip_prefix("Missing required field ") {
        record_missing_required(stripped, required_map);
        return;
    }
    if line.starts_with("Invalid value at ") {
        if let Some(captures) = FIELD_VIOLATION_PATTERN.captures(line) {
            let path = &captures[1];
            let type_str = &captures[2];
            let number = parse_field_number(&captures[3]);
            build_field(path, type_str, line, number, fields);
        }
    }
}

fn record_missing_required(stripped: &str, required_map: &mut HashMap<String, Vec<String>>) {
    let Some(captures) = MISSING_REQUIRED_PATTERN.captures(&format!("Missing required field {stripped}")) else {
        return;
    };
    let field_name = captures[1].to_string();
    let parent = captures[2].to_string();
    required_map.entry(parent).or_default().push(field_name);
}

fn build_field(path: &str, type_str: &str, description: &str, number: Option<u32>, fields: &mut Vec<DiscoveredField>) {
    let repeated = path.ends_with(']');
    let trimmed = path.trim_end_matches(|c| c == ']' || c.is_ascii_digit() || c == '[');
    let name = trimmed.rsplit('.').next().unwrap_or(trimmed).to_string();

    let mut field = DiscoveredField {
        path: path.to_string(),
        name,
        number,
        scalar_type: None,
        message_type: None,
        is_enum: false,
        required: false,
        repeated,
    };

    if let Some(scalar) = known_scalar(type_str) {
        field.scalar_type = Some(scalar.to_string());
    } else if let Some(fullname) = type_str.strip_prefix("type.googleapis.com/") {
        field.message_type = Some(fullname.to_string());
    }

    if ENUM_INDICATOR_PATTERNS.iter().any(|re| re.is_match(description)) {
        field.is_enum = true;
    }

    let is_any = field.message_type.as_deref() == Some("google.protobuf.Any");
    fields.push(field);

    if is_any {
        fields.extend(any_children(path));
    }
}

/// `google.protobuf.Any` always carries exactly these two wire fields;
/// synthesize them as children so the probe merge sees `Any` the same way
/// it would see any other two-field message.
fn any_children(parent_path: &str) -> [DiscoveredField; 2] {
    [
        DiscoveredField {
            path: format!("{parent_path}.type_url"),
            name: "type_url".to_string(),
            number: Some(1),
            scalar_type: Some("string".to_string()),
            message_type: None,
            is_enum: false,
            required: false,
            repeated: false,
        },
        DiscoveredField {
            path: format!("{parent_path}.data"),
            name: "data".to_string(),
            number: Some(2),
            scalar_type: Some("bytes".to_string()),
            message_type: None,
            is_enum: false,
            required: false,
            repeated: false,
        },
    ]
}

fn known_scalar(type_str: &str) -> Option<&'static str> {
    const SCALARS: &[(&str, &str)] = &[
        ("TYPE_STRING", "string"),
        ("TYPE_BYTES", "bytes"),
        ("TYPE_BOOL", "bool"),
        ("TYPE_INT32", "int32"),
        ("TYPE_INT64", "int64"),
        ("TYPE_UINT32", "uint32"),
        ("TYPE_UINT64", "uint64"),
        ("TYPE_SINT32", "sint32"),
        ("TYPE_SINT64", "sint64"),
        ("TYPE_FIXED32", "fixed32"),
        ("TYPE_FIXED64", "fixed64"),
        ("TYPE_FLOAT", "float"),
        ("TYPE_DOUBLE", "double"),
    ];
    SCALARS.iter().find(|(key, _)| *key == type_str).map(|(_, v)| *v)
}

fn apply_required_map(required_map: &HashMap<String, Vec<String>>, fields: &mut Vec<DiscoveredField>) {
    for (parent, names) in required_map {
        for name in names {
            if let Some(existing) = fields.iter_mut().find(|f| &f.name == name) {
                existing.required = true;
            } else {
                fields.push(DiscoveredField {
                    path: format!("{parent}.{name}"),
                    name: name.clone(),
                    number: None,
                    scalar_type: None,
                    message_type: None,
                    is_enum: false,
                    required: true,
                    repeated: false,
                });
            }
        }
    }
}

/// Extract an OAuth scope from a 403 response's `WWW-Authenticate` header,
/// e.g. `Bearer scope="https://www.googleapis.com/auth/userinfo.email"`.
#[must_use]
pub fn extract_oauth_scope(www_authenticate: &str) -> Option<String> {
    static SCOPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"scope="([^"]+)""#).unwrap());
    SCOPE_PATTERN
        .captures(www_authenticate)
        .map(|c| c[1].to_string())
}
