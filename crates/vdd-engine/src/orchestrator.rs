//! Orchestrator (C8): drives the per-request/per-response pipeline described
//! in the component design, and the two external collaborators the engine
//! needs but never implements the transport for itself — the
//! credential-preserving fetch relay and the VDD key-value store.
//!
//! The traffic source itself (`{tabId, requestId, url, ...}` delivery) is
//! an embedder-owned collaborator — a browser extension's `webRequest`
//! listener, a proxy, or (in this crate's CLI) a JSON fixture reader. This
//! module consumes [`vdd_core::CapturedRequest`]/[`CapturedResponse`]
//! values; it never produces them.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use vdd_core::{CapturedRequest, CapturedResponse, InterfaceName, MethodId, ParamLocation, ResourceKind, Vdd};
use vdd_formats::DetectedFormat;

use crate::chains::{self, ChainIndex, InputValue};
use crate::config::EngineConfig;
use crate::error_parser;
use crate::probe::{self, ProbeContentType, ProbeResult};
use crate::stats;
use crate::vdd as vdd_ops;

/// The credential-preserving fetch relay the orchestrator routes probe and
/// discovery calls through. The relay supplies the browser's ambient
/// cookies, `Origin`, and `Referer` for the target origin — the
/// orchestrator must never set those headers itself.
#[async_trait]
pub trait FetchRelay: Send + Sync {
    /// Issue one request through the relay.
    ///
    /// # Errors
    ///
    /// Returns an error string (the relay's `error` field, or a transport
    /// failure) — always treated as a terminal no-op for the calling
    /// attempt, never retried within the same call.
    async fn fetch(&self, request: RelayRequest) -> Result<RelayResponse, String>;
}

/// One outbound request routed through [`FetchRelay`].
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// The relay's response.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Default [`FetchRelay`] backed by `reqwest`.
pub struct ReqwestFetchRelay {
    client: reqwest::Client,
}

impl ReqwestFetchRelay {
    /// A new relay using a fresh `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for ReqwestFetchRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchRelay for ReqwestFetchRelay {
    async fn fetch(&self, request: RelayRequest) -> Result<RelayResponse, String> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| e.to_string())?;
        let mut builder = self.client.request(method, &request.url).body(request.body);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(RelayResponse { status, headers, body })
    }
}

/// Opaque key-value persistence for the engine's serialisable state.
/// Deserialisation rehydrates sets from arrays.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Write a value, overwriting any prior value at `key` atomically.
    async fn put(&self, key: &str, value: Value);

    /// Read a previously written value.
    async fn get(&self, key: &str) -> Option<Value>;
}

/// An in-memory [`KvStore`], suitable for tests and the CLI replay driver.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: tokio::sync::RwLock<HashMap<String, Value>>,
}

impl MemoryKvStore {
    /// A new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn put(&self, key: &str, value: Value) {
        self.data.write().await.insert(key.to_string(), value);
    }

    async fn get(&self, key: &str) -> Option<Value> {
        self.data.read().await.get(key).cloned()
    }
}

/// Status of the last attempt to fetch an official discovery document for
/// a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscoveryStatus {
    NotFound(Instant),
}

/// Drives the per-request/per-response pipeline over one or more services'
/// VDDs, holding the concurrency-control state (in-flight probe set,
/// discovery cooldowns) the specification requires but that doesn't belong
/// in the VDD document itself.
pub struct Orchestrator<F: FetchRelay, K: KvStore> {
    config: EngineConfig,
    relay: F,
    store: K,
    vdds: HashMap<String, Vdd>,
    chain_indices: HashMap<u64, ChainIndex>,
    in_flight_probes: HashSet<(String, String)>,
    discovery_status: HashMap<String, DiscoveryStatus>,
    /// Pending requests awaiting a response, keyed by `request_id`.
    pending_requests: HashMap<String, PendingRequest>,
}

struct PendingRequest {
    tab_id: u64,
    interface: InterfaceName,
    method_id: MethodId,
    method_key: String,
}

impl<F: FetchRelay, K: KvStore> Orchestrator<F, K> {
    /// A new orchestrator over a given fetch relay and key-value store.
    pub fn new(config: EngineConfig, relay: F, store: K) -> Self {
        Self {
            config,
            relay,
            store,
            vdds: HashMap::new(),
            chain_indices: HashMap::new(),
            in_flight_probes: HashSet::new(),
            discovery_status: HashMap::new(),
            pending_requests: HashMap::new(),
        }
    }

    /// Borrow the VDD for a service, if any request has been observed yet.
    #[must_use]
    pub fn vdd(&self, interface: &str) -> Option<&Vdd> {
        self.vdds.get(interface)
    }

    /// Every service VDD observed so far, keyed by interface name.
    #[must_use]
    pub fn vdds(&self) -> &HashMap<String, Vdd> {
        &self.vdds
    }

    /// Process one captured request: resolve/learn the method, conditionally
    /// schedule a schema probe, and conditionally schedule a discovery
    /// fetch — steps 1-3 of §4.8.
    #[tracing::instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn process_request(&mut self, request: &CapturedRequest) {
        let url = match url::Url::parse(&request.url) {
            Ok(url) => url,
            Err(_) => {
                warn!(url = %request.url, "could not parse captured request URL, dropping");
                return;
            }
        };
        let host = url.host_str().unwrap_or_default().to_string();
        let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();

        let (interface, consumed) = InterfaceName::derive(&host, &segments);
        let remaining = &segments[consumed.min(segments.len())..];
        let base_name = vdd_core::ident::derive_method_name(remaining);

        let vdd = self.vdds.entry(interface.as_str().to_string()).or_insert_with(|| {
            let mut vdd = Vdd::new();
            vdd.root_url = Some(format!("{}://{}", url.scheme(), host));
            vdd
        });

        let (kind, method_key) = vdd_ops::resolve_method(vdd, &base_name, &request.method, url.path());

        let query_pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let method_id = MethodId::new(&interface, &method_key);

        let mut request_schema = None;
        if let Some(resource) = vdd.resources.get_mut(kind.as_str()) {
            if let Some(method) = resource.methods.get_mut(&method_key) {
                method.id = method_id.as_str().to_string();
                vdd_ops::learn_parameters(method, &query_pairs, &segments[consumed.min(segments.len())..]);
                method.stats.request_count += 1;
                for (name, value) in &query_pairs {
                    let param_stats = method.stats.params.entry(name.clone()).or_default();
                    stats::observe(param_stats, value);
                }
                if let Some(content_type) = &request.content_type {
                    method.observe_content_type(content_type);
                }
                request_schema = learn_body(method, request);
            }
        }
        if let Some(schema) = &request_schema {
            vdd_ops::merge_schema(vdd, schema);
        }

        let mut chain_inputs: Vec<(String, ParamLocation, InputValue)> = query_pairs
            .iter()
            .filter(|(_, v)| chains::is_chainable_string(v))
            .map(|(k, v)| (k.clone(), ParamLocation::Query, InputValue::String(v.clone())))
            .collect();
        if let Some(body) = request_body_json(request) {
            flatten_body_chain_inputs(&body, "", &mut chain_inputs);
        }
        if !chain_inputs.is_empty() {
            let chain_index = self.chain_indices.entry(request.tab_id).or_default();
            let links = chain_index.detect(method_id.as_str(), &chain_inputs);
            for link in links {
                if let Some(resource) = self.vdds.get_mut(interface.as_str()).and_then(|v| v.resources.get_mut(kind.as_str())) {
                    if let Some(method) = resource.methods.get_mut(&method_key) {
                        chains::merge_into(&mut method.chains.incoming, link.clone());
                    }
                }
                self.record_outgoing_chain_link(&link);
            }
        }

        self.pending_requests.insert(
            request.request_id.clone(),
            PendingRequest {
                tab_id: request.tab_id,
                interface: interface.clone(),
                method_id,
                method_key: method_key.clone(),
            },
        );

        let is_protobuf_like = request
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("protobuf") || ct.contains("grpc"));
        let in_probed = kind == ResourceKind::Probed;
        if is_protobuf_like && !in_probed {
            let probe_key = (interface.as_str().to_string(), request.url.clone());
            if !self.in_flight_probes.contains(&probe_key) {
                self.in_flight_probes.insert(probe_key.clone());
                let result = self.run_probe(&request.url, &request.request_headers).await;
                self.in_flight_probes.remove(&probe_key);
                if let Some(result) = result {
                    self.apply_probe_result(&interface, &method_key, &result);
                }
            }
        }

        self.maybe_schedule_discovery(&interface).await;
    }

    /// Process one captured response: classify by content-type, learn the
    /// response schema, and index chainable values — steps 1-3 of §4.8's
    /// response half.
    #[tracing::instrument(skip(self, response), fields(request_id = %response.request_id))]
    pub async fn process_response(&mut self, response: &CapturedResponse) {
        let Some(pending) = self.pending_requests.remove(&response.request_id) else {
            debug!("response has no matching pending request, dropping");
            return;
        };
        let Some(body) = &response.body else { return };
        let Ok(bytes) = body.decode() else {
            warn!("captured response body failed to decode, dropping");
            return;
        };

        let detected = vdd_formats::detect(response.content_type.as_deref(), "", &bytes);
        let Some(json_body) = detected_to_json(&detected) else {
            debug!(content_type = ?response.content_type, "no format detector recognized response body");
            return;
        };

        let response_schema_name = format!("{}Response", safe_method_name(&pending.method_key));
        if let Some(vdd) = self.vdds.get_mut(pending.interface.as_str()) {
            for kind in [ResourceKind::Learned, ResourceKind::Probed, ResourceKind::Official] {
                if let Some(resource) = vdd.resources.get_mut(kind.as_str()) {
                    if let Some(method) = resource.methods.get_mut(&pending.method_key) {
                        method.response = Some(response_schema_name.clone());
                    }
                }
            }
            let schema = vdd_ops::schema_from_json(&response_schema_name, &json_body);
            vdd_ops::merge_schema(vdd, &schema);
        }

        let chain_index = self.chain_indices.entry(pending.tab_id).or_default();
        chain_index.index_response(pending.method_id.as_str(), response.content_type.as_deref(), &json_body);
    }

    async fn run_probe(&self, url: &str, headers: &HashMap<String, String>) -> Option<ProbeResult> {
        let mut result = ProbeResult::default();
        let mut used_content_type: Option<ProbeContentType> = None;

        for content_type in ProbeContentType::ordered() {
            let fields = self.send_probe_pair(url, headers, content_type, &[], &mut result).await;
            if !fields.is_empty() {
                used_content_type = Some(content_type);
                break;
            }
        }

        let Some(content_type) = used_content_type else {
            debug!(url, "probe rejected by target, no content-type revealed a field");
            return None;
        };
        if result.fields.is_empty() {
            return None;
        }

        let mut queue = probe::enqueue_nested(&result.fields, self.config.probe_max_depth);
        while let Some(task) = queue.pop() {
            let nested = self
                .send_probe_pair(url, headers, content_type, &task.indices, &mut result)
                .await;
            let revealed_enum = nested.iter().any(|f| f.is_enum);
            probe::apply_enum_upgrade(&mut result.fields, task.parent_field, revealed_enum);
            if !revealed_enum {
                queue.extend(probe::enqueue_next_level(&task, &nested, self.config.probe_max_depth));
            }
        }

        Some(result)
    }

    /// Send both the string and int probe payload at one nesting path,
    /// merging any discovered fields into `result` and returning just the
    /// fields found at this nesting level (used to decide whether to
    /// enqueue deeper probing).
    async fn send_probe_pair(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        content_type: ProbeContentType,
        indices: &[u32],
        result: &mut ProbeResult,
    ) -> Vec<error_parser::DiscoveredField> {
        let target_url = if content_type.forces_alt_json() && !url.contains("alt=json") {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}alt=json")
        } else {
            url.to_string()
        };

        let mut level_fields = Vec::new();
        for base_payload in [probe::string_probe(content_type), probe::int_probe(content_type)] {
            let payload = probe::wrap_nested(base_payload, indices);
            let body = match &payload {
                probe::ProbePayload::Json(value) => serde_json::to_vec(value).unwrap_or_default(),
                probe::ProbePayload::Binary(bytes) => bytes.clone(),
            };
            let mut request_headers = headers.clone();
            request_headers.insert("Content-Type".to_string(), content_type.header_value().to_string());

            let Ok(response) = self
                .relay
                .fetch(RelayRequest { url: target_url.clone(), method: "POST".to_string(), headers: request_headers, body })
                .await
            else {
                continue;
            };

            let parsed = parse_error_response(&response);
            result.probe_details.push(probe::ProbeAttempt {
                content_type: content_type.header_value(),
                indices: indices.to_vec(),
                fields_found: parsed.fields.len(),
            });
            if !parsed.fields.is_empty() {
                if result.metadata.service.is_none() {
                    result.metadata = parsed.metadata.clone();
                }
                level_fields.extend(parsed.fields.clone());
                probe::merge_root_fields(&mut result.fields, parsed.fields);
            }
            if let Some(header) = response.headers.get("www-authenticate") {
                if let Some(scope) = error_parser::extract_oauth_scope(header) {
                    if !result.scopes.contains(&scope) {
                        result.scopes.push(scope);
                    }
                }
            }
        }
        level_fields
    }

    /// Record a detected [`vdd_core::ChainLink`] as outgoing on whichever
    /// method it names as its source, searching across every known VDD
    /// (the source may live in a different service than the target).
    fn record_outgoing_chain_link(&mut self, link: &vdd_core::ChainLink) {
        for vdd in self.vdds.values_mut() {
            for kind in [ResourceKind::Learned, ResourceKind::Probed, ResourceKind::Official] {
                if let Some(resource) = vdd.resources.get_mut(kind.as_str()) {
                    for method in resource.methods.values_mut() {
                        if method.id == link.source_method_id {
                            chains::merge_into(&mut method.chains.outgoing, link.clone());
                            return;
                        }
                    }
                }
            }
        }
    }

    fn apply_probe_result(&mut self, interface: &InterfaceName, method_key: &str, result: &ProbeResult) {
        let Some(vdd) = self.vdds.get_mut(interface.as_str()) else { return };
        let learned = vdd.resource_mut(ResourceKind::Learned).methods.remove(method_key);
        let Some(method) = learned else { return };
        vdd.resource_mut(ResourceKind::Probed).methods.insert(method_key.to_string(), method);

        let schema_name = format!("{}Request", safe_method_name(method_key));
        let mut schema = vdd_core::Schema::object(&schema_name);
        for field in &result.fields {
            let key = field.number.map_or_else(|| field.name.clone(), |n| format!("field{n}"));
            let prop = probed_field_to_property(field);
            schema.properties.insert(key, prop);
        }
        vdd_ops::merge_probe_schema(vdd, &schema);
    }

    async fn maybe_schedule_discovery(&mut self, interface: &InterfaceName) {
        let key = interface.as_str().to_string();
        let should_fetch = match self.discovery_status.get(&key) {
            None => true,
            Some(DiscoveryStatus::NotFound(at)) => {
                at.elapsed() >= Duration::from_secs(self.config.discovery_cooldown_seconds)
            }
        };
        if !should_fetch {
            debug!(interface = %key, "discovery document fetch still in cooldown, skipping");
            return;
        }

        let Some(vdd) = self.vdds.get(&key) else { return };
        let Some(root_url) = vdd.root_url.clone() else { return };
        let api_key = observed_api_key(vdd);

        for attempt in discovery_attempts(&root_url, api_key.as_deref()) {
            let result = self.relay.fetch(RelayRequest {
                url: attempt.url,
                method: attempt.method,
                headers: attempt.headers,
                body: Vec::new(),
            }).await;
            if let Ok(response) = result {
                if response.status == 200 {
                    self.discovery_status.remove(&key);
                    self.store.put(&format!("discoveryDocs.{key}"), Value::String(
                        String::from_utf8_lossy(&response.body).to_string(),
                    )).await;
                    return;
                }
            }
        }
        debug!(interface = %key, "no discovery document found, entering cooldown");
        self.discovery_status.insert(key, DiscoveryStatus::NotFound(Instant::now()));
    }
}

fn probed_field_to_property(field: &error_parser::DiscoveredField) -> vdd_core::PropertyDef {
    use vdd_core::{PropertyLabel, PropertyType, ScalarType};
    let label = if field.required {
        PropertyLabel::Required
    } else if field.repeated {
        PropertyLabel::Repeated
    } else {
        PropertyLabel::Optional
    };

    if field.is_enum {
        let mut prop = vdd_core::PropertyDef::scalar(&field.name, ScalarType::Enum, label);
        prop.number = field.number;
        return prop;
    }

    if let Some(message_type) = &field.message_type {
        return vdd_core::PropertyDef {
            name: field.name.clone(),
            number: field.number,
            prop_type: PropertyType::Message,
            label,
            ref_: Some(message_type.clone()),
            items: None,
            custom_name: false,
        };
    }

    let scalar = field
        .scalar_type
        .as_deref()
        .and_then(scalar_from_name)
        .unwrap_or(ScalarType::String);
    let mut prop = vdd_core::PropertyDef::scalar(&field.name, scalar, label);
    prop.number = field.number;
    prop
}

fn scalar_from_name(name: &str) -> Option<vdd_core::ScalarType> {
    use vdd_core::ScalarType;
    Some(match name {
        "string" => ScalarType::String,
        "bytes" => ScalarType::Bytes,
        "bool" => ScalarType::Bool,
        "int32" => ScalarType::Int32,
        "int64" => ScalarType::Int64,
        "uint32" => ScalarType::Uint32,
        "uint64" => ScalarType::Uint64,
        "sint32" => ScalarType::Sint32,
        "sint64" => ScalarType::Sint64,
        "fixed32" => ScalarType::Fixed32,
        "fixed64" => ScalarType::Fixed64,
        "float" => ScalarType::Float,
        "double" => ScalarType::Double,
        _ => return None,
    })
}

fn parse_error_response(response: &RelayResponse) -> error_parser::ParsedError {
    if let Ok(text) = std::str::from_utf8(&response.body) {
        if let Ok(json) = serde_json::from_str::<Value>(text) {
            return error_parser::parse_json_error(&json);
        }
    }
    let lifted = error_parser::lift_binary_status(&response.body);
    error_parser::parse_json_error(&lifted)
}

/// Build and attach the request-body schema for a method, returning the
/// schema itself so the caller can fold it into the VDD's schema arena once
/// the method's own mutable borrow has ended.
fn learn_body(method: &mut vdd_core::Method, request: &CapturedRequest) -> Option<vdd_core::Schema> {
    let content_type = request.content_type.as_ref()?;
    let body = request.raw_body.as_ref()?;
    let bytes = body.decode().ok()?;

    let detected = vdd_formats::detect(Some(content_type), &request.url, &bytes);
    let schema_name = format!("{}Request", safe_method_name(&method.id));

    let schema = match &detected {
        DetectedFormat::Json(value) => Some(vdd_ops::schema_from_json(&schema_name, value)),
        DetectedFormat::JspbArray(items) => {
            let fields = vdd_wire::jspb::decode_jspb(items);
            Some(vdd_ops::schema_from_jspb(&schema_name, &fields))
        }
        _ => None,
    }?;

    method.request = Some(schema_name);
    Some(schema)
}

/// Decode a captured request's body into JSON, the same way [`learn_body`]
/// does, for callers that need the value rather than a derived schema.
fn request_body_json(request: &CapturedRequest) -> Option<Value> {
    let content_type = request.content_type.as_ref()?;
    let body = request.raw_body.as_ref()?;
    let bytes = body.decode().ok()?;
    let detected = vdd_formats::detect(Some(content_type), &request.url, &bytes);
    detected_to_json(&detected)
}

/// Walk a decoded request body and collect every chainable leaf value as a
/// `(dotted-path, Body, value)` chain input, the body counterpart of the
/// query-pair flattening already done in [`Orchestrator::process_request`].
fn flatten_body_chain_inputs(value: &Value, path: &str, out: &mut Vec<(String, ParamLocation, InputValue)>) {
    match value {
        Value::String(s) if chains::is_chainable_string(s) => {
            out.push((path.to_string(), ParamLocation::Body, InputValue::String(s.clone())));
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if chains::is_chainable_number(f) {
                    out.push((path.to_string(), ParamLocation::Body, InputValue::Number(f)));
                }
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                flatten_body_chain_inputs(child, &child_path, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_body_chain_inputs(child, &format!("{path}[{index}]"), out);
            }
        }
        _ => {}
    }
}

fn detected_to_json(detected: &DetectedFormat) -> Option<Value> {
    match detected {
        DetectedFormat::Json(value) => Some(value.clone()),
        DetectedFormat::JspbArray(items) => Some(Value::Array(items.clone())),
        DetectedFormat::NdJson(values) => Some(Value::Array(values.clone())),
        _ => None,
    }
}

fn safe_method_name(method_key: &str) -> String {
    method_key
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// One outbound discovery probe: a candidate URL with its HTTP method and
/// headers, per §6's "Discovery URL probe set".
struct DiscoveryAttempt {
    url: String,
    method: String,
    headers: HashMap<String, String>,
}

/// Scan every method observed so far for a query parameter named `key`
/// (case-insensitive, the conventional name for a Google API key) and
/// return its most frequently observed value, if any.
fn observed_api_key(vdd: &Vdd) -> Option<String> {
    vdd.resources
        .values()
        .flat_map(|resource| resource.methods.values())
        .find_map(|method| {
            method
                .stats
                .params
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("key"))
                .and_then(|(_, stats)| stats.values.iter().max_by_key(|(_, count)| **count))
                .map(|(value, _)| value.clone())
        })
}

/// Build the full discovery probe set for one root URL: the well-known
/// static paths, plus (for `*.googleapis.com`) the `$discovery/rest`
/// endpoint with and without an observed API key (as a header and as a
/// `?key=` query param). Every candidate is attempted both as a bare `GET`
/// and as a `POST` carrying `X-Http-Method-Override: GET`.
fn discovery_attempts(root_url: &str, api_key: Option<&str>) -> Vec<DiscoveryAttempt> {
    let mut candidates: Vec<(String, HashMap<String, String>)> = vec![
        (format!("{root_url}/openapi.json"), HashMap::new()),
        (format!("{root_url}/swagger.json"), HashMap::new()),
        (format!("{root_url}/api-docs"), HashMap::new()),
        (format!("{root_url}/v1/openapi.json"), HashMap::new()),
    ];

    if let Ok(url) = url::Url::parse(root_url) {
        if url.host_str().is_some_and(|h| h.ends_with(".googleapis.com")) {
            let discovery_url = format!("{root_url}/$discovery/rest?version=v1");
            candidates.push((discovery_url.clone(), HashMap::new()));
            if let Some(key) = api_key {
                let mut with_header = HashMap::new();
                with_header.insert("X-Goog-Api-Key".to_string(), key.to_string());
                candidates.push((discovery_url.clone(), with_header));
                candidates.push((format!("{discovery_url}&key={key}"), HashMap::new()));
            }
        }
    }

    let mut attempts = Vec::with_capacity(candidates.len() * 2);
    for (url, headers) in candidates {
        attempts.push(DiscoveryAttempt { url: url.clone(), method: "GET".to_string(), headers: headers.clone() });
        let mut override_headers = headers;
        override_headers.insert("X-Http-Method-Override".to_string(), "GET".to_string());
        attempts.push(DiscoveryAttempt { url, method: "POST".to_string(), headers: override_headers });
    }
    attempts
}
