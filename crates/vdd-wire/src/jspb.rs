//! JSPB: the JSON positional-array protobuf encoding used by many
//! Google-style web frontends. Index `i` of the array encodes field
//! number `i + 1`.

use serde_json::Value;

/// One decoded JSPB field: its protobuf field number plus its interpreted
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct JspbField {
    pub field: u32,
    pub node: JspbNode,
}

/// The disambiguated interpretation of one JSPB array slot.
#[derive(Debug, Clone, PartialEq)]
pub enum JspbNode {
    Scalar(Value),
    /// An array of only primitives — kept as a repeated scalar, not
    /// recursed into.
    RepeatedScalar(Vec<Value>),
    /// An array containing at least one sub-array — a nested message.
    Message(Vec<JspbField>),
    /// A plain JSON object, kept as-is with its own string keys.
    Object(serde_json::Map<String, Value>),
}

/// Decode a JSPB positional array into field-number-indexed nodes.
///
/// `null`/missing entries are skipped entirely — they never produce a
/// [`JspbField`].
#[must_use]
pub fn decode_jspb(array: &[Value]) -> Vec<JspbField> {
    array
        .iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let field = u32::try_from(i + 1).expect("array length fits u32");
            let node = match value {
                Value::Null => return None,
                Value::Array(items) => {
                    if items.iter().any(Value::is_array) {
                        JspbNode::Message(decode_jspb(items))
                    } else {
                        JspbNode::RepeatedScalar(items.clone())
                    }
                }
                Value::Object(map) => JspbNode::Object(map.clone()),
                scalar => JspbNode::Scalar(scalar.clone()),
            };
            Some(JspbField { field, node })
        })
        .collect()
}

/// Re-encode field-number-indexed nodes back into a positional JSON array,
/// filling any gap below the highest field number with `null`.
#[must_use]
pub fn encode_jspb(fields: &[JspbField]) -> Vec<Value> {
    let max_field = fields.iter().map(|f| f.field).max().unwrap_or(0);
    let mut out = vec![Value::Null; max_field as usize];
    for field in fields {
        let idx = (field.field - 1) as usize;
        out[idx] = match &field.node {
            JspbNode::Scalar(value) => value.clone(),
            JspbNode::RepeatedScalar(values) => Value::Array(values.clone()),
            JspbNode::Message(children) => Value::Array(encode_jspb(children)),
            JspbNode::Object(map) => Value::Object(map.clone()),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn positional_decode_matches_nested_shape() {
        let array = json!([null, "hello", [1, 2, 3], [["a", "b"]]]);
        let array = array.as_array().unwrap();
        let fields = decode_jspb(array);

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].field, 2);
        assert_eq!(fields[0].node, JspbNode::Scalar(json!("hello")));
        assert_eq!(fields[1].field, 3);
        assert_eq!(fields[1].node, JspbNode::RepeatedScalar(vec![json!(1), json!(2), json!(3)]));
        assert_eq!(fields[2].field, 4);
        match &fields[2].node {
            JspbNode::Message(children) => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].field, 1);
                assert_eq!(
                    children[0].node,
                    JspbNode::RepeatedScalar(vec![json!("a"), json!("b")])
                );
            }
            other => panic!("expected nested message, got {other:?}"),
        }
    }

    #[test]
    fn null_entries_are_skipped() {
        let array = json!([null, null, "x"]);
        let fields = decode_jspb(array.as_array().unwrap());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, 3);
    }

    #[test]
    fn plain_object_kept_as_object() {
        let array = json!([{"a": 1, "b": 2}]);
        let fields = decode_jspb(array.as_array().unwrap());
        match &fields[0].node {
            JspbNode::Object(map) => assert_eq!(map.len(), 2),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn round_trip_through_encode() {
        let original = json!([null, "hello", [1, 2, 3], [["a", "b"]]]);
        let fields = decode_jspb(original.as_array().unwrap());
        let re_encoded = encode_jspb(&fields);
        assert_eq!(Value::Array(re_encoded), original);
    }
}
