//! Probe engine (C4): crafts payloads designed to elicit a validation
//! error, and the pure planning logic (payload shapes, root-level merge,
//! nested-probe queueing) that the orchestrator drives over the network.
//!
//! The actual network round-trips live in [`crate::orchestrator`], which
//! owns the `FetchRelay` collaborator; everything here is synchronous and
//! side-effect-free so it can be tested without a transport.

use serde_json::{json, Value};
use vdd_wire::varint::encode_varint;

use crate::error_parser::{DiscoveredField, ErrorMetadata};

/// Default depth limit for nested probing.
pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// Number of probe fields generated at each level (`x1..=x300` / `1..=300`).
const PROBE_FIELD_COUNT: u32 = 300;

/// The three content-types tried, in order, at the root level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeContentType {
    JsonProtobuf,
    Json,
    XProtobuf,
}

impl ProbeContentType {
    /// The fixed root-level attempt order.
    #[must_use]
    pub fn ordered() -> [Self; 3] {
        [Self::JsonProtobuf, Self::Json, Self::XProtobuf]
    }

    /// The `Content-Type` header value sent with this attempt.
    #[must_use]
    pub fn header_value(self) -> &'static str {
        match self {
            Self::JsonProtobuf => "application/json+protobuf",
            Self::Json => "application/json",
            Self::XProtobuf => "application/x-protobuf",
        }
    }

    /// `true` when this content-type forces `?alt=json` onto the probe URL.
    #[must_use]
    pub fn forces_alt_json(self) -> bool {
        matches!(self, Self::JsonProtobuf | Self::Json)
    }

    /// `true` when the payload is binary protobuf rather than JSON/JSPB.
    #[must_use]
    pub fn is_binary(self) -> bool {
        matches!(self, Self::XProtobuf)
    }
}

/// A probe request body, shaped for either a JSON-speaking or binary
/// content-type.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbePayload {
    Json(Value),
    Binary(Vec<u8>),
}

/// The string probe: `["x1", "x2", ..., "x300"]` (JSON/JSPB) or 300
/// protobuf string fields `i -> "xi"`.
#[must_use]
pub fn string_probe(content_type: ProbeContentType) -> ProbePayload {
    if content_type.is_binary() {
        let mut bytes = Vec::new();
        for i in 1..=PROBE_FIELD_COUNT {
            encode_string_field(&mut bytes, i, &format!("x{i}"));
        }
        ProbePayload::Binary(bytes)
    } else {
        let values: Vec<Value> = (1..=PROBE_FIELD_COUNT).map(|i| json!(format!("x{i}"))).collect();
        ProbePayload::Json(Value::Array(values))
    }
}

/// The int probe: `[1, 2, ..., 300]` (JSON) or 300 protobuf varint fields
/// `i -> i`.
#[must_use]
pub fn int_probe(content_type: ProbeContentType) -> ProbePayload {
    if content_type.is_binary() {
        let mut bytes = Vec::new();
        for i in 1..=PROBE_FIELD_COUNT {
            encode_varint_field(&mut bytes, i, u64::from(i));
        }
        ProbePayload::Binary(bytes)
    } else {
        let values: Vec<Value> = (1..=PROBE_FIELD_COUNT).map(Value::from).collect();
        ProbePayload::Json(Value::Array(values))
    }
}

fn encode_string_field(out: &mut Vec<u8>, field: u32, value: &str) {
    out.extend(encode_varint((u64::from(field) << 3) | 2));
    out.extend(encode_varint(value.len() as u64));
    out.extend(value.as_bytes());
}

fn encode_varint_field(out: &mut Vec<u8>, field: u32, value: u64) {
    out.extend(encode_varint((u64::from(field) << 3) | 0));
    out.extend(encode_varint(value));
}

/// Wrap `payload` so the base probe payload appears nested at
/// `indices[0] -> indices[1] -> ... -> indices[k]`, per the spec's
/// array-of-arrays (JSON) / embedded-message (protobuf) wrapping rule.
#[must_use]
pub fn wrap_nested(payload: ProbePayload, indices: &[u32]) -> ProbePayload {
    match payload {
        ProbePayload::Json(value) => ProbePayload::Json(wrap_json(value, indices)),
        ProbePayload::Binary(bytes) => ProbePayload::Binary(wrap_binary(bytes, indices)),
    }
}

/// `indices[0]` is the outermost nesting step, `indices.last()` the
/// innermost (closest to the payload) — a field number `n` places its
/// payload at (1-based) array position `n`.
fn wrap_json(inner: Value, indices: &[u32]) -> Value {
    let Some((&first, rest)) = indices.split_first() else {
        return inner;
    };
    let wrapped = wrap_json(inner, rest);
    let mut array = vec![Value::Null; (first - 1) as usize];
    array.push(wrapped);
    Value::Array(array)
}

fn wrap_binary(inner: Vec<u8>, indices: &[u32]) -> Vec<u8> {
    let Some((&first, rest)) = indices.split_first() else {
        return inner;
    };
    let wrapped = wrap_binary(inner, rest);
    let mut out = Vec::new();
    out.extend(encode_varint((u64::from(first) << 3) | 2));
    out.extend(encode_varint(wrapped.len() as u64));
    out.extend(wrapped);
    out
}

/// Merge a freshly discovered set of root-level fields into the
/// accumulated set, deduplicating by field number when known: prefer a
/// known type over `unknown`, adopt `message_type` if not yet set, and
/// upgrade (never downgrade) `required`/`repeated`.
pub fn merge_root_fields(existing: &mut Vec<DiscoveredField>, new_fields: Vec<DiscoveredField>) {
    for new_field in new_fields {
        let matched = new_field.number.and_then(|number| {
            existing.iter_mut().find(|f| f.number == Some(number))
        });
        match matched {
            Some(field) => merge_field_in_place(field, new_field),
            None => existing.push(new_field),
        }
    }
}

fn merge_field_in_place(existing: &mut DiscoveredField, new_field: DiscoveredField) {
    if existing.scalar_type.is_none() && existing.message_type.is_none() {
        existing.scalar_type = new_field.scalar_type;
        existing.message_type = new_field.message_type;
    }
    if existing.message_type.is_none() {
        existing.message_type = new_field.message_type;
    }
    existing.required |= new_field.required;
    existing.repeated |= new_field.repeated;
    existing.is_enum |= new_field.is_enum;
}

/// One queued nested probe: the index path to wrap the base payload at,
/// and the depth it was enqueued from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedProbeTask {
    pub indices: Vec<u32>,
    pub depth: u32,
    /// The field number of the discovered field this task is probing
    /// further, so results can be attributed back to it.
    pub parent_field: u32,
}

/// From a set of root-discovered fields, enqueue nested probes for every
/// message field (indices = `[fieldNumber]`) and every repeated field
/// (indices = `[fieldNumber, 1]`, diving into the first element).
#[must_use]
pub fn enqueue_nested(fields: &[DiscoveredField], max_depth: u32) -> Vec<NestedProbeTask> {
    if max_depth == 0 {
        return Vec::new();
    }
    let mut tasks = Vec::new();
    for field in fields {
        let Some(number) = field.number else { continue };
        if field.message_type.is_some() {
            tasks.push(NestedProbeTask { indices: vec![number], depth: 1, parent_field: number });
        } else if field.repeated {
            tasks.push(NestedProbeTask { indices: vec![number, 1], depth: 1, parent_field: number });
        }
    }
    tasks
}

/// Given fields discovered from probing deeper under `task`, enqueue the
/// next level of nesting (message fields found within), bounded by
/// `max_depth`. Returns an empty vec once `task.depth >= max_depth`.
#[must_use]
pub fn enqueue_next_level(task: &NestedProbeTask, discovered: &[DiscoveredField], max_depth: u32) -> Vec<NestedProbeTask> {
    if task.depth >= max_depth {
        return Vec::new();
    }
    let mut tasks = Vec::new();
    for field in discovered {
        let Some(number) = field.number else { continue };
        if field.message_type.is_some() {
            let mut indices = task.indices.clone();
            indices.push(number);
            tasks.push(NestedProbeTask { indices, depth: task.depth + 1, parent_field: number });
        }
    }
    tasks
}

/// Apply the enum-upgrade rule: if a nested probe under `parent_field`
/// revealed an enum indicator, the parent field (found in `fields`) is
/// upgraded from `message` to `enum` and its message-type reference
/// cleared, discarding any pending nested-probe children for it.
pub fn apply_enum_upgrade(fields: &mut [DiscoveredField], parent_field: u32, nested_revealed_enum: bool) {
    if !nested_revealed_enum {
        return;
    }
    if let Some(field) = fields.iter_mut().find(|f| f.number == Some(parent_field)) {
        field.is_enum = true;
        field.message_type = None;
    }
}

/// The outcome of a complete probe run: all discovered fields (root plus
/// every nested level), parser metadata, OAuth scopes seen along the way,
/// and a flat log of every attempt made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResult {
    pub fields: Vec<DiscoveredField>,
    pub metadata: ErrorMetadata,
    pub scopes: Vec<String>,
    pub probe_details: Vec<ProbeAttempt>,
}

/// A single probe send/response pair, recorded for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeAttempt {
    pub content_type: &'static str,
    pub indices: Vec<u32>,
    pub fields_found: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_probe_json_has_300_values() {
        let ProbePayload::Json(Value::Array(values)) = string_probe(ProbeContentType::Json) else {
            panic!("expected json array");
        };
        assert_eq!(values.len(), 300);
        assert_eq!(values[0], json!("x1"));
        assert_eq!(values[299], json!("x300"));
    }

    #[test]
    fn int_probe_json_has_300_values() {
        let ProbePayload::Json(Value::Array(values)) = int_probe(ProbeContentType::Json) else {
            panic!("expected json array");
        };
        assert_eq!(values[0], json!(1));
        assert_eq!(values[299], json!(300));
    }

    #[test]
    fn string_probe_protobuf_is_binary() {
        let payload = string_probe(ProbeContentType::XProtobuf);
        assert!(matches!(payload, ProbePayload::Binary(_)));
    }

    #[test]
    fn ordered_content_types_fixed_sequence() {
        assert_eq!(
            ProbeContentType::ordered(),
            [ProbeContentType::JsonProtobuf, ProbeContentType::Json, ProbeContentType::XProtobuf]
        );
    }

    #[test]
    fn wrap_nested_json_places_payload_at_index_path() {
        let payload = ProbePayload::Json(json!(["x1"]));
        let wrapped = wrap_nested(payload, &[2, 1]);
        let ProbePayload::Json(value) = wrapped else { panic!() };
        assert_eq!(value, json!([null, [["x1"]]]));
    }

    #[test]
    fn merge_root_fields_prefers_known_type_over_unknown() {
        let mut existing = vec![DiscoveredField {
            path: "a".to_string(),
            name: "a".to_string(),
            number: Some(1),
            scalar_type: None,
            message_type: None,
            is_enum: false,
            required: false,
            repeated: false,
        }];
        let new_fields = vec![DiscoveredField {
            path: "a".to_string(),
            name: "a".to_string(),
            number: Some(1),
            scalar_type: Some("string".to_string()),
            message_type: None,
            is_enum: false,
            required: true,
            repeated: false,
        }];
        merge_root_fields(&mut existing, new_fields);
        assert_eq!(existing[0].scalar_type.as_deref(), Some("string"));
        assert!(existing[0].required);
    }

    #[test]
    fn enqueue_nested_handles_message_and_repeated_fields() {
        let fields = vec![
            DiscoveredField {
                path: "m".to_string(),
                name: "m".to_string(),
                number: Some(2),
                scalar_type: None,
                message_type: Some("pkg.M".to_string()),
                is_enum: false,
                required: false,
                repeated: false,
            },
            DiscoveredField {
                path: "r".to_string(),
                name: "r".to_string(),
                number: Some(5),
                scalar_type: Some("string".to_string()),
                message_type: None,
                is_enum: false,
                required: false,
                repeated: true,
            },
        ];
        let tasks = enqueue_nested(&fields, DEFAULT_MAX_DEPTH);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].indices, vec![2]);
        assert_eq!(tasks[1].indices, vec![5, 1]);
    }

    #[test]
    fn enqueue_nested_respects_zero_max_depth() {
        let tasks = enqueue_nested(&[], 0);
        assert!(tasks.is_empty());
    }

    #[test]
    fn apply_enum_upgrade_clears_message_type() {
        let mut fields = vec![DiscoveredField {
            path: "e".to_string(),
            name: "e".to_string(),
            number: Some(3),
            scalar_type: None,
            message_type: Some("pkg.E".to_string()),
            is_enum: false,
            required: false,
            repeated: false,
        }];
        apply_enum_upgrade(&mut fields, 3, true);
        assert!(fields[0].is_enum);
        assert!(fields[0].message_type.is_none());
    }
}
