//! Raw protobuf field decoding (`pbDecodeRaw`) and the heuristic tree
//! decoder (`pbDecodeTree`) that disambiguates `LEN` fields of unknown
//! schema.

use crate::varint::{decode_varint, zigzag_decode, VarintValue};

/// Structural decode failure: the bytes don't conform to the protobuf wire
/// format (truncated varint/length, an out-of-range field number, an
/// unsupported wire type). Callers in `vdd-engine` treat this as absence of
/// a result rather than propagating it to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("varint truncated before continuation bit cleared")]
    Truncated,
    #[error("length-delimited field declares {declared} bytes but only {available} remain")]
    LengthOutOfBounds { declared: u64, available: usize },
    #[error("field number {0} outside the valid range [1, 2^29-1]")]
    FieldNumberOutOfRange(u64),
    #[error("unsupported wire type {0} (group start/end are not handled)")]
    InvalidWireType(u8),
}

const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

/// One `{field, wire, data}` record from a single pass over the raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub field: u32,
    pub wire: RawWire,
}

/// The wire-type-tagged payload of a [`RawField`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawWire {
    Varint(VarintValue),
    Fixed64([u8; 8]),
    /// The length-prefixed payload, with the prefix already stripped.
    Len(Vec<u8>),
    Fixed32([u8; 4]),
}

/// Decode one flat pass of `{field, wire, data}` records from `bytes`.
///
/// Consumes the entire buffer; any leftover partial record is a
/// [`DecodeError`].
pub fn decode_raw(bytes: &[u8]) -> Result<Vec<RawField>, DecodeError> {
    let mut fields = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let (tag, tag_len) = decode_varint(&bytes[pos..])?;
        pos += tag_len;
        let tag = tag.as_u64();
        let wire_type = tag & 0x7;
        let field_number = tag >> 3;
        if field_number == 0 || field_number > MAX_FIELD_NUMBER {
            return Err(DecodeError::FieldNumberOutOfRange(field_number));
        }
        let field = u32::try_from(field_number).expect("checked against MAX_FIELD_NUMBER above");

        let wire = match wire_type {
            0 => {
                let (value, len) = decode_varint(&bytes[pos..])?;
                pos += len;
                RawWire::Varint(value)
            }
            1 => {
                let chunk = take(bytes, pos, 8)?;
                pos += 8;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                RawWire::Fixed64(buf)
            }
            2 => {
                let (len, len_bytes) = decode_varint(&bytes[pos..])?;
                pos += len_bytes;
                let declared = len.as_u64();
                let declared_usize = usize::try_from(declared).map_err(|_| DecodeError::LengthOutOfBounds {
                    declared,
                    available: bytes.len() - pos,
                })?;
                let chunk = take(bytes, pos, declared_usize)?;
                pos += declared_usize;
                RawWire::Len(chunk.to_vec())
            }
            5 => {
                let chunk = take(bytes, pos, 4)?;
                pos += 4;
                let mut buf = [0u8; 4];
                buf.copy_from_slice(chunk);
                RawWire::Fixed32(buf)
            }
            other => return Err(DecodeError::InvalidWireType(u8::try_from(other).unwrap_or(u8::MAX))),
        };

        fields.push(RawField { field, wire });
    }

    Ok(fields)
}

fn take(bytes: &[u8], pos: usize, len: usize) -> Result<&[u8], DecodeError> {
    bytes.get(pos..pos + len).ok_or(DecodeError::LengthOutOfBounds {
        declared: len as u64,
        available: bytes.len().saturating_sub(pos),
    })
}

/// One node of the annotated protobuf tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Varint { raw: VarintValue, zigzag: i64 },
    Fixed64(u64),
    Fixed32(u32),
    Len(LenValue),
}

/// The disambiguated interpretation of a `LEN`-wire-type field.
#[derive(Debug, Clone, PartialEq)]
pub enum LenValue {
    Message(Vec<FieldNode>),
    PackedVarints(Vec<VarintValue>),
    String(String),
    Bytes(Vec<u8>),
}

/// A decoded field: its number plus its interpreted value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub field: u32,
    pub node: TreeNode,
}

/// Decode `bytes` (a complete protobuf message) into an annotated tree.
///
/// # Errors
///
/// Returns [`DecodeError`] if `bytes` does not parse as a well-formed
/// sequence of protobuf fields at the top level. Ambiguous nested `LEN`
/// fields never error — they fall back to [`LenValue::Bytes`].
pub fn decode_tree(bytes: &[u8]) -> Result<Vec<FieldNode>, DecodeError> {
    decode_tree_at_depth(bytes, 0)
}

fn decode_tree_at_depth(bytes: &[u8], depth: usize) -> Result<Vec<FieldNode>, DecodeError> {
    let raw = decode_raw(bytes)?;
    Ok(raw
        .into_iter()
        .map(|field| {
            let node = match field.wire {
                RawWire::Varint(value) => {
                    let zigzag = zigzag_decode(value.as_u64());
                    TreeNode::Varint { raw: value, zigzag }
                }
                RawWire::Fixed64(buf) => TreeNode::Fixed64(u64::from_le_bytes(buf)),
                RawWire::Fixed32(buf) => TreeNode::Fixed32(u32::from_le_bytes(buf)),
                RawWire::Len(data) => TreeNode::Len(classify_len(&data, depth + 1)),
            };
            FieldNode { field: field.field, node }
        })
        .collect())
}

/// Disambiguate a `LEN` field's bytes per the three-way heuristic (embedded
/// message, packed repeated scalar, UTF-8 string), falling back to raw
/// bytes. Never fails.
fn classify_len(data: &[u8], depth: usize) -> LenValue {
    if depth > 0 {
        if let Some(message) = try_embedded_message(data, depth) {
            return message;
        }
    }
    if let Some(packed) = try_packed_varints(data) {
        return LenValue::PackedVarints(packed);
    }
    if let Some(text) = try_printable_utf8(data) {
        return LenValue::String(text);
    }
    LenValue::Bytes(data.to_vec())
}

fn try_embedded_message(data: &[u8], depth: usize) -> Option<LenValue> {
    let raw = decode_raw(data).ok()?;
    if raw.is_empty() {
        return None;
    }

    let field_count = raw.len();
    let (min_field, max_field) = raw
        .iter()
        .map(|f| f.field)
        .fold((u32::MAX, 0u32), |(min, max), f| (min.min(f), max.max(f)));

    if max_field > 10_000 {
        return None;
    }
    let gap = u64::from(max_field - min_field);
    if gap > 100 * field_count as u64 {
        return None;
    }
    if data.len() <= 4 && field_count < 2 {
        return None;
    }

    let children = raw
        .into_iter()
        .map(|field| {
            let node = match field.wire {
                RawWire::Varint(value) => {
                    let zigzag = zigzag_decode(value.as_u64());
                    TreeNode::Varint { raw: value, zigzag }
                }
                RawWire::Fixed64(buf) => TreeNode::Fixed64(u64::from_le_bytes(buf)),
                RawWire::Fixed32(buf) => TreeNode::Fixed32(u32::from_le_bytes(buf)),
                RawWire::Len(inner) => TreeNode::Len(classify_len(&inner, depth + 1)),
            };
            FieldNode { field: field.field, node }
        })
        .collect();

    Some(LenValue::Message(children))
}

fn try_packed_varints(data: &[u8]) -> Option<Vec<VarintValue>> {
    let mut values = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        let (value, len) = decode_varint(&data[pos..]).ok()?;
        values.push(value);
        pos += len;
    }
    if values.len() >= 2 {
        Some(values)
    } else {
        None
    }
}

fn try_printable_utf8(data: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(data).ok()?;
    let all_printable = text.chars().all(|c| {
        matches!(c, '\u{0020}'..='\u{007E}' | '\t' | '\n' | '\r')
            || matches!(c, '\u{00A0}'..='\u{FFFF}')
    });
    if all_printable {
        Some(text.to_string())
    } else {
        None
    }
}
