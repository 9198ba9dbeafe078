//! API discovery engine: reverse-engineers RPC schemas from observed
//! HTTP(S) traffic and maintains a Virtual Discovery Document per service.
//!
//! [`orchestrator`] drives the per-request/per-response pipeline over the
//! data model in `vdd-core`, using the wire codec in `vdd-wire` and the
//! format detectors in `vdd-formats` to turn opaque bytes into schema.
//! [`probe`], [`stats`], [`chains`], [`error_parser`], and [`vdd`] hold the
//! individual learning algorithms the orchestrator composes.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chains;
pub mod config;
pub mod error;
pub mod error_parser;
pub mod orchestrator;
pub mod probe;
pub mod stats;
pub mod vdd;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use orchestrator::{FetchRelay, KvStore, MemoryKvStore, Orchestrator, RelayRequest, RelayResponse, ReqwestFetchRelay};

pub use vdd_core::{
    CapturedRequest, CapturedResponse, ChainLink, InterfaceName, Method, MethodId, MethodStats,
    ParamDef, ParamLocation, ParamStats, PropertyDef, PropertyLabel, PropertyType, Resource,
    ResourceKind, ScalarType, Schema, Vdd,
};
