//! Shared data model for the Virtual Discovery Document (VDD).
//!
//! A VDD is the evolving structural description the discovery engine
//! maintains per observed service: its methods, their URL templates,
//! their request/response schemas (including protobuf field numbers),
//! and engine-private statistical metadata.
//!
//! This crate holds only the data model and the pure identifier-derivation
//! helpers that both the learning engine and the probe engine depend on —
//! no parsing, no merge logic. `vdd-wire`, `vdd-formats`, and `vdd-engine`
//! build on top of it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod captured;
pub mod ident;
pub mod types;

pub use captured::{Body, CapturedRequest, CapturedResponse};
pub use ident::{InterfaceName, MethodId};
pub use types::{
    ArrayItems, ChainLink, DefaultValue, FormatHintCounts, Method, MethodChains, MethodStats,
    NumericRange, ParamDef, ParamLocation, ParamStats, PropertyDef, PropertyLabel, PropertyType,
    Resource, ResourceKind, Schema, SchemaId, SchemaType, ScalarType, Vdd,
};
