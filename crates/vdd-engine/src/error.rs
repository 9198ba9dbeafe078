//! Typed error enum for the discovery engine's library API.
//!
//! Structural decode/parse failures never reach this type — per the
//! engine's error-handling design, those are absorbed at the codec/parser
//! boundary and surfaced as absence of a result. `Error` covers only the
//! operations that have a genuine failure mode at the engine boundary:
//! config loading, fixture I/O, and the CLI's file handling.

/// Errors produced by `vdd-engine` library operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// File I/O failure (reading config, fixture, or VDD snapshot files).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML config parsing failure.
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON (de)serialization failure (fixtures, VDD snapshots).
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The credential-preserving fetch relay returned an `error` field, or
    /// the underlying transport failed. Always treated as transient by the
    /// orchestrator — see [`crate::orchestrator`].
    #[error("fetch relay unreachable: {0}")]
    RelayUnreachable(String),
}

/// Convenience alias used throughout the library's public API.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time assertion that `Error` is `Send + Sync`.
    const _: () = {
        const fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    };
}
