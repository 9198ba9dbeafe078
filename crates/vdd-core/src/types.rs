//! The Virtual Discovery Document (VDD) data model.
//!
//! Mirrors the shape described in the specification's data-model section:
//! a [`Vdd`] holds [`Resource`]s (`learned` / `probed` / `official`), each a
//! map of method-name → [`Method`]; methods reference [`Schema`]s by name.
//!
//! Schemas are stored in an arena (`Vec<Schema>` indexed by [`SchemaId`])
//! rather than linked by owned references, so that cyclic `$ref`s (a nested
//! message referencing its own parent) need no unsafe tricks to represent —
//! the merge walk in `vdd-engine` breaks cycles with a `HashSet<SchemaId>`
//! visited-set over this arena. `$ref` values themselves stay schema *names*
//! (`String`), matching the wire shape a persisted VDD would have; the arena
//! and its name index are purely an in-memory lookup optimization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The canonical protobuf/JSON scalar types the engine can infer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// UTF-8 text.
    String,
    /// Raw bytes (base64 in JSON).
    Bytes,
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    /// A closed set of named integer values; see [`PropertyDef::ref_`] for
    /// the enum's declared value list when known.
    Enum,
}

impl ScalarType {
    /// True for any of the integer variants (signed, unsigned, fixed-width).
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int32
                | Self::Int64
                | Self::Uint32
                | Self::Uint64
                | Self::Sint32
                | Self::Sint64
                | Self::Fixed32
                | Self::Fixed64
                | Self::Sfixed32
                | Self::Sfixed64
        )
    }

    /// True for `float`/`double`.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

/// A property's declared type: a scalar, a nested message, or an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Scalar(ScalarType),
    Message,
    Array,
}

/// Protobuf field cardinality label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyLabel {
    Optional,
    Required,
    Repeated,
}

/// The declared element shape of an array-typed property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArrayItems {
    /// Scalar/message tag of each element, when known.
    pub item_type: Option<PropertyType>,
    /// Schema name of each element, for arrays of messages.
    pub item_ref: Option<String>,
}

/// A single field of a [`Schema`].
///
/// `propertyKey` (the map key in [`Schema::properties`]) is either a JSON
/// object key or the synthetic `field<N>` token for protobuf/JSPB field
/// number `N`; `name` is the human-facing name, equal to the key unless a
/// user rename (`custom_name = true`) has diverged it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Human-facing name; equal to the property key unless renamed.
    pub name: String,
    /// Protobuf field number, when known from an authoritative source
    /// (binary decode or probe). Never changed once set — see
    /// [`Vdd`] module docs and the merge invariants in the specification.
    pub number: Option<u32>,
    pub prop_type: PropertyType,
    pub label: PropertyLabel,
    /// Schema name this property refers to, for message-typed properties.
    pub ref_: Option<String>,
    /// Element shape, for array-typed properties.
    pub items: Option<ArrayItems>,
    /// `true` once a user has renamed this property — an absorbing state:
    /// no later merge may change `name` again.
    pub custom_name: bool,
}

impl PropertyDef {
    /// A new, unrenamed scalar property.
    #[must_use]
    pub fn scalar(name: impl Into<String>, scalar: ScalarType, label: PropertyLabel) -> Self {
        Self {
            name: name.into(),
            number: None,
            prop_type: PropertyType::Scalar(scalar),
            label,
            ref_: None,
            items: None,
            custom_name: false,
        }
    }
}

/// Either `"object"` or a bare scalar, per the specification's `Schema.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Scalar(ScalarType),
}

/// An arena index into [`Vdd`]'s internal schema store.
///
/// Purely an in-process lookup optimization — never serialized as part of a
/// `$ref` (those stay schema names) and never compared across different
/// `Vdd` instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(pub(crate) u32);

/// A named, structured message shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub schema_type: SchemaType,
    pub properties: HashMap<String, PropertyDef>,
}

impl Schema {
    /// A new empty object schema.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema_type: SchemaType::Object,
            properties: HashMap::new(),
        }
    }
}

/// Where a request parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Query,
    Path,
    Header,
    Body,
}

/// A single observed numeric value's `[min, max]` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

/// A statistically-inferred default value and the share of observations
/// that carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultValue {
    pub value: String,
    pub confidence: f64,
}

/// A request or body parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ScalarType,
    pub location: ParamLocation,
    pub required: bool,
    pub description: String,
    pub format: Option<String>,
    /// Closed set of observed string values, once inferred.
    pub enum_values: Option<Vec<String>>,
    /// User-supplied rename, preserved forever once set.
    pub custom_name: Option<String>,
    /// `true` once a user has manually fixed `required` — an absorbing
    /// state the statistics engine (C5) must never override.
    pub custom_required: bool,
    /// `true` once a user has manually fixed `enum_values` — ditto.
    pub custom_enum: bool,
    /// `observedCount / requestCount` from the statistics engine.
    pub required_confidence: f64,
    /// Enum values as statistically detected (distinct from `enum_values`,
    /// which may have been promoted from this or set by a user).
    pub detected_enum: Option<Vec<String>>,
    pub default_value: Option<DefaultValue>,
    pub range: Option<NumericRange>,
}

impl ParamDef {
    /// A freshly observed parameter with no statistics yet.
    #[must_use]
    pub fn new(name: impl Into<String>, param_type: ScalarType, location: ParamLocation) -> Self {
        Self {
            name: name.into(),
            param_type,
            location,
            required: false,
            description: String::new(),
            format: None,
            enum_values: None,
            custom_name: None,
            custom_required: false,
            custom_enum: false,
            required_confidence: 0.0,
            detected_enum: None,
            default_value: None,
            range: None,
        }
    }
}

/// Per-value-format observation counts used to infer [`ParamDef::format`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatHintCounts {
    pub date_time: u64,
    pub uri: u64,
    pub email: u64,
    pub uuid: u64,
    pub integer: u64,
}

/// Value-distribution statistics for one parameter or body field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamStats {
    pub observed_count: u64,
    pub values: HashMap<String, u64>,
    pub numeric_range: Option<NumericRange>,
    pub format_hints: FormatHintCounts,
}

/// Per-method statistics: request volume plus per-parameter/body-field
/// histograms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodStats {
    pub request_count: u64,
    pub params: HashMap<String, ParamStats>,
    pub body_fields: HashMap<String, ParamStats>,
}

/// A directed edge: a response value from `source_method_id` reappeared as
/// an input to `target_method_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub target_method_id: String,
    pub param_name: String,
    pub param_location: ParamLocation,
    pub source_method_id: String,
    pub source_field_path: String,
    pub observed_count: u64,
}

/// Incoming/outgoing [`ChainLink`]s recorded on a method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodChains {
    pub incoming: Vec<ChainLink>,
    pub outgoing: Vec<ChainLink>,
}

/// A single RPC method within a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub id: String,
    /// URL-template string with path parameters as `{name}`.
    pub path: String,
    pub http_method: String,
    pub parameters: HashMap<String, ParamDef>,
    /// Request schema name, if a body schema has been learned.
    pub request: Option<String>,
    /// Response schema name, if a body schema has been learned.
    pub response: Option<String>,
    /// Observed `Content-Type`s, most-recent-first.
    pub content_types: Vec<String>,
    pub stats: MethodStats,
    pub chains: MethodChains,
}

impl Method {
    /// A freshly observed method with no schema or statistics yet.
    #[must_use]
    pub fn new(id: impl Into<String>, path: impl Into<String>, http_method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            http_method: http_method.into(),
            parameters: HashMap::new(),
            request: None,
            response: None,
            content_types: Vec::new(),
            stats: MethodStats::default(),
            chains: MethodChains::default(),
        }
    }

    /// Record an observed content-type, promoting it to the front of
    /// [`Method::content_types`] (most-recent-first) and removing any
    /// earlier duplicate.
    pub fn observe_content_type(&mut self, content_type: &str) {
        self.content_types.retain(|ct| ct != content_type);
        self.content_types.insert(0, content_type.to_string());
    }
}

/// The three reserved resource names, plus the methods map they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Inferred from observed traffic.
    Learned,
    /// Discovered by the error-probe engine.
    Probed,
    /// Fetched from a published discovery document.
    Official,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Learned => "learned",
            Self::Probed => "probed",
            Self::Official => "official",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bucket of methods under one resource name (`learned`, `probed`,
/// `official`, or a user-defined grouping).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub methods: HashMap<String, Method>,
}

/// The Virtual Discovery Document for one service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vdd {
    pub root_url: Option<String>,
    pub resources: HashMap<String, Resource>,
    schemas: Vec<Schema>,
    schema_index: HashMap<String, u32>,
}

impl Vdd {
    /// A new, empty VDD — created lazily on first observation of a service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The resource bucket for `kind`, if any method has been recorded in it.
    #[must_use]
    pub fn resource(&self, kind: ResourceKind) -> Option<&Resource> {
        self.resources.get(kind.as_str())
    }

    /// The resource bucket for `kind`, creating it empty if absent.
    pub fn resource_mut(&mut self, kind: ResourceKind) -> &mut Resource {
        self.resources.entry(kind.as_str().to_string()).or_default()
    }

    /// Find a method by name across all three canonical resources, along
    /// with the resource it lives in.
    #[must_use]
    pub fn find_method(&self, method_name: &str) -> Option<(ResourceKind, &Method)> {
        for kind in [ResourceKind::Probed, ResourceKind::Learned, ResourceKind::Official] {
            if let Some(resource) = self.resources.get(kind.as_str()) {
                if let Some(method) = resource.methods.get(method_name) {
                    return Some((kind, method));
                }
            }
        }
        None
    }

    /// Insert or replace a schema, returning its arena id.
    pub fn put_schema(&mut self, schema: Schema) -> SchemaId {
        if let Some(&idx) = self.schema_index.get(&schema.name) {
            self.schemas[idx as usize] = schema;
            SchemaId(idx)
        } else {
            let idx = u32::try_from(self.schemas.len()).expect("schema arena overflow");
            self.schema_index.insert(schema.name.clone(), idx);
            self.schemas.push(schema);
            SchemaId(idx)
        }
    }

    /// Look up a schema by name.
    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schema_index.get(name).map(|&idx| &self.schemas[idx as usize])
    }

    /// Look up a schema by name, mutably.
    pub fn schema_mut(&mut self, name: &str) -> Option<&mut Schema> {
        if let Some(&idx) = self.schema_index.get(name) {
            Some(&mut self.schemas[idx as usize])
        } else {
            None
        }
    }

    /// Look up a schema by its arena id.
    #[must_use]
    pub fn schema_by_id(&self, id: SchemaId) -> &Schema {
        &self.schemas[id.0 as usize]
    }

    /// Iterate all schema names currently stored.
    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.name.as_str())
    }

    /// Total number of distinct schemas in this VDD.
    #[must_use]
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }
}
