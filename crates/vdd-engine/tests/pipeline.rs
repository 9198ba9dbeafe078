//! Integration tests for the seeded scenarios in the component design:
//! schema disambiguation, probe field-number extraction, JSPB positional
//! decode, chain-link detection, repeated-scalar packed encoding, and
//! merge's `customName` preservation.

use std::collections::HashMap;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use vdd_core::{CapturedRequest, CapturedResponse, ParamLocation, ResourceKind};
use vdd_engine::error_parser::parse_json_error;
use vdd_engine::vdd as vdd_ops;
use vdd_engine::{
    EngineConfig, FetchRelay, MemoryKvStore, Orchestrator, PropertyDef, PropertyLabel,
    RelayRequest, RelayResponse, Schema,
};
use vdd_wire::jspb::{decode_jspb, JspbNode};
use vdd_wire::varint::encode_varint;

/// A relay that always fails, so probe/discovery round-trips are no-ops and
/// the tests stay focused on the learning pipeline itself.
struct DeadRelay;

#[async_trait]
impl FetchRelay for DeadRelay {
    async fn fetch(&self, _request: RelayRequest) -> Result<RelayResponse, String> {
        Err("no network in tests".to_string())
    }
}

fn request(tab_id: u64, request_id: &str, url: &str, method: &str) -> CapturedRequest {
    CapturedRequest {
        tab_id,
        request_id: request_id.to_string(),
        url: url.to_string(),
        method: method.to_string(),
        initiator_origin: None,
        request_headers: HashMap::new(),
        raw_body: None,
        content_type: None,
    }
}

fn json_request(tab_id: u64, request_id: &str, url: &str, method: &str, body: serde_json::Value) -> CapturedRequest {
    CapturedRequest {
        tab_id,
        request_id: request_id.to_string(),
        url: url.to_string(),
        method: method.to_string(),
        initiator_origin: None,
        request_headers: HashMap::new(),
        raw_body: Some(vdd_core::Body::Text(body.to_string())),
        content_type: Some("application/json".to_string()),
    }
}

fn json_response(request_id: &str, body: serde_json::Value) -> CapturedResponse {
    CapturedResponse {
        request_id: request_id.to_string(),
        status: 200,
        response_headers: HashMap::new(),
        body: Some(vdd_core::Body::Text(body.to_string())),
        content_type: Some("application/json".to_string()),
    }
}

/// Scenario 1: `GET /api/v1/users` then `POST /api/v1/users` disambiguate
/// into `get_users`/`post_users`, with the collided `users` key gone.
#[tokio::test]
async fn schema_disambiguation_on_method_collision() {
    let mut orchestrator = Orchestrator::new(EngineConfig::default(), DeadRelay, MemoryKvStore::new());

    orchestrator
        .process_request(&request(1, "r1", "https://example.com/api/v1/users", "GET"))
        .await;
    orchestrator
        .process_request(&request(1, "r2", "https://example.com/api/v1/users", "POST"))
        .await;

    let vdd = orchestrator.vdd("example.com/api/v1").unwrap();
    let learned = vdd.resource(ResourceKind::Learned).unwrap();

    assert!(!learned.methods.contains_key("users"));
    assert!(learned.methods.contains_key("get_users"));
    assert!(learned.methods.contains_key("post_users"));
}

/// Scenario 2: three `BadRequest.fieldViolations` entries resolve to the
/// expected field set, including the required-only entry with no type.
#[test]
fn probe_field_number_extraction_from_field_violations() {
    let body = json!({
        "error": {
            "code": 400,
            "message": "Invalid request",
            "details": [{
                "@type": "type.googleapis.com/google.rpc.BadRequest",
                "fieldViolations": [
                    {"field": "context", "description": "Invalid value at 'context' (TYPE_STRING), x2"},
                    {"field": "browse_id", "description": "Invalid value at 'browse_id' (TYPE_STRING), x5"},
                    {"description": "Missing required field query at 'context'"},
                ]
            }]
        }
    });

    let parsed = parse_json_error(&body);

    let context = parsed.fields.iter().find(|f| f.name == "context").expect("context field");
    assert_eq!(context.number, Some(2));
    assert_eq!(context.scalar_type.as_deref(), Some("string"));

    let browse_id = parsed.fields.iter().find(|f| f.name == "browse_id").expect("browse_id field");
    assert_eq!(browse_id.number, Some(5));
    assert_eq!(browse_id.scalar_type.as_deref(), Some("string"));
    assert!(!browse_id.required);

    let query = parsed.fields.iter().find(|f| f.name == "query").expect("query field");
    assert!(query.required);
    assert!(query.number.is_none());
    assert!(query.scalar_type.is_none());
}

/// Scenario 3: JSPB positional array decodes into the expected tree shape.
#[test]
fn jspb_positional_decode_builds_expected_tree() {
    let input = json!([null, "hello", [1, 2, 3], [["a", "b"]]]);
    let Some(items) = input.as_array() else { panic!("expected array") };

    let fields = decode_jspb(items);

    let field2 = fields.iter().find(|f| f.field == 2).expect("field 2");
    assert_eq!(field2.node, JspbNode::Scalar(json!("hello")));

    let field3 = fields.iter().find(|f| f.field == 3).expect("field 3");
    assert_eq!(field3.node, JspbNode::RepeatedScalar(vec![json!(1), json!(2), json!(3)]));

    let field4 = fields.iter().find(|f| f.field == 4).expect("field 4");
    let JspbNode::Message(nested_fields) = &field4.node else { panic!("expected nested message") };
    assert_eq!(nested_fields.len(), 1);
    let nested_field1 = nested_fields.iter().find(|f| f.field == 1).expect("nested field 1");
    assert_eq!(nested_field1.node, JspbNode::RepeatedScalar(vec![json!("a"), json!("b")]));
}

/// Scenario 4: method A's response value reappears as method B's query
/// parameter, yielding symmetric incoming/outgoing chain links.
#[tokio::test]
async fn chain_link_detected_between_response_and_later_request() {
    let mut orchestrator = Orchestrator::new(EngineConfig::default(), DeadRelay, MemoryKvStore::new());

    orchestrator
        .process_request(&request(1, "r1", "https://example.com/api/v1/account", "GET"))
        .await;
    orchestrator
        .process_response(&json_response("r1", json!({"userId": "u-12345"})))
        .await;

    orchestrator
        .process_request(&request(1, "r2", "https://example.com/api/v1/profile?uid=u-12345", "GET"))
        .await;

    let vdd = orchestrator.vdd("example.com/api/v1").unwrap();
    let learned = vdd.resource(ResourceKind::Learned).unwrap();

    let profile = &learned.methods["profile"];
    let incoming = profile.chains.incoming.first().expect("incoming chain link");
    assert_eq!(incoming.param_name, "uid");
    assert_eq!(incoming.param_location, ParamLocation::Query);
    assert_eq!(incoming.source_field_path, "userId");

    let account = &learned.methods["account"];
    let outgoing = account.chains.outgoing.first().expect("outgoing chain link");
    assert_eq!(outgoing.param_name, "uid");
    assert_eq!(outgoing.target_method_id, incoming.target_method_id);
}

/// A response value that reappears inside a later request's JSON *body*
/// (not just its query string) is indexed as a chain link too.
#[tokio::test]
async fn chain_link_detected_from_request_body_value() {
    let mut orchestrator = Orchestrator::new(EngineConfig::default(), DeadRelay, MemoryKvStore::new());

    orchestrator
        .process_request(&request(1, "r1", "https://example.com/api/v1/account", "GET"))
        .await;
    orchestrator
        .process_response(&json_response("r1", json!({"userId": "u-12345"})))
        .await;

    orchestrator
        .process_request(&json_request(
            1,
            "r2",
            "https://example.com/api/v1/profile",
            "POST",
            json!({"user": {"id": "u-12345"}}),
        ))
        .await;

    let vdd = orchestrator.vdd("example.com/api/v1").unwrap();
    let learned = vdd.resource(ResourceKind::Learned).unwrap();

    let profile = &learned.methods["profile"];
    let incoming = profile.chains.incoming.first().expect("incoming chain link from body");
    assert_eq!(incoming.param_name, "user.id");
    assert_eq!(incoming.param_location, ParamLocation::Body);
    assert_eq!(incoming.source_field_path, "userId");
}

/// Scenario 5: a repeated `int32` field packs to `tag ∥ len ∥ varints`.
#[test]
fn repeated_scalar_packs_as_length_delimited_varints() {
    let values = [1u64, 2, 300];
    let mut packed = Vec::new();
    for v in values {
        packed.extend(encode_varint(v));
    }

    let mut expected = Vec::new();
    expected.extend(encode_varint((4u64 << 3) | 2)); // tag(4, LEN)
    expected.extend(encode_varint(packed.len() as u64));
    expected.extend(&packed);

    assert_eq!(packed, vec![0x01, 0x02, 0xAC, 0x02]);
    assert_eq!(expected, vec![0x22, 0x04, 0x01, 0x02, 0xAC, 0x02]);
}

/// Scenario 6: merging a schema that would re-key `name_1` by field number
/// leaves a `customName` property's key and name untouched.
#[test]
fn merge_preserves_custom_name_on_rekey_attempt() {
    use vdd_core::Vdd;

    let mut vdd = Vdd::new();
    let mut existing = Schema::object("S");
    existing.properties.insert(
        "name_1".to_string(),
        PropertyDef {
            name: "userEmail".to_string(),
            number: Some(1),
            prop_type: vdd_core::PropertyType::Scalar(vdd_core::ScalarType::String),
            label: PropertyLabel::Optional,
            ref_: None,
            items: None,
            custom_name: true,
        },
    );
    vdd_ops::merge_schema(&mut vdd, &existing);

    let mut incoming = Schema::object("S");
    incoming.properties.insert(
        "field1".to_string(),
        PropertyDef {
            name: "email".to_string(),
            number: Some(1),
            prop_type: vdd_core::PropertyType::Scalar(vdd_core::ScalarType::String),
            label: PropertyLabel::Optional,
            ref_: None,
            items: None,
            custom_name: false,
        },
    );
    vdd_ops::merge_schema(&mut vdd, &incoming);

    let merged = vdd.schema("S").expect("schema S");
    assert!(merged.properties.contains_key("name_1"));
    assert!(!merged.properties.contains_key("field1"));
    assert_eq!(merged.properties["name_1"].name, "userEmail");
    assert!(merged.properties["name_1"].custom_name);
}
