//! Identifier derivation: `InterfaceName` and `MethodId`.
//!
//! Both the VDD engine (learning a method from a captured request) and the
//! probe engine (naming a probed method) need the exact same
//! service/method-name derivation rules, so they live here once instead of
//! at each call site.

use regex::Regex;
use std::sync::LazyLock;

/// Path-prefix keywords that mark the start of an API root when no more
/// specific rule (batch-execute, known hostname) applies.
const API_ROOT_KEYWORDS: &[&str] = &[
    "api", "rest", "graphql", "rpc", "gateway", "services", "wp-json", "async",
];

static VERSION_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^v\d+\w*$").unwrap());
static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});
static OBJECT_ID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());
static NUMERIC_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static BASE64ISH_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{16,}$").unwrap());

/// A stable string identifier for a service, derived from host + path prefix.
///
/// Two captured requests that derive the same `InterfaceName` are treated as
/// the same service — the string itself is the service's entire identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct InterfaceName(String);

impl InterfaceName {
    /// Wrap an already-derived string. Prefer [`InterfaceName::derive`] when
    /// starting from a raw host/path pair.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw interface string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the `InterfaceName` for a captured request, and the number of
    /// leading path segments it consumed (needed by the caller to derive the
    /// method-name from the *remaining* segments).
    ///
    /// `path_segments` must already be split on `/` with empty segments
    /// removed.
    #[must_use]
    pub fn derive(host: &str, path_segments: &[&str]) -> (Self, usize) {
        if let Some(batch_idx) = path_segments
            .iter()
            .position(|seg| seg.eq_ignore_ascii_case("batchexecute"))
        {
            let preceding = if batch_idx > 0 {
                path_segments[batch_idx - 1]
            } else {
                ""
            };
            let name = if preceding.is_empty() {
                host.to_string()
            } else {
                format!("{host}/{preceding}")
            };
            return (Self(name), batch_idx + 1);
        }

        if let Some(subdomain) = host.strip_suffix(".googleapis.com") {
            let prefix = subdomain.rsplit('.').next().unwrap_or(subdomain);
            return (Self(prefix.to_string()), 0);
        }

        if let Some(first) = path_segments.first() {
            if API_ROOT_KEYWORDS
                .iter()
                .any(|kw| first.eq_ignore_ascii_case(kw))
            {
                let mut consumed = 1;
                let mut name = format!("{host}/{first}");
                if let Some(second) = path_segments.get(1) {
                    if VERSION_SEGMENT.is_match(second) {
                        name.push('/');
                        name.push_str(second);
                        consumed = 2;
                    }
                }
                return (Self(name), consumed);
            }
        }

        (Self(host.to_string()), 0)
    }
}

impl std::fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<InterfaceName with '/' ⇒ '.'> + '.' + <method-name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MethodId(String);

impl MethodId {
    /// Build a `MethodId` from an interface and a method name.
    #[must_use]
    pub fn new(interface: &InterfaceName, method_name: &str) -> Self {
        let qualified = interface.as_str().replace('/', ".");
        Self(format!("{qualified}.{method_name}"))
    }

    /// The raw method id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// True if `segment` looks dynamic: pure numeric, a UUID, a MongoDB
/// `ObjectId`, or a base64-ish token of 16+ chars containing at least one
/// digit.
#[must_use]
pub fn is_dynamic_segment(segment: &str) -> bool {
    if NUMERIC_SEGMENT.is_match(segment) {
        return true;
    }
    if UUID_SEGMENT.is_match(segment) {
        return true;
    }
    if OBJECT_ID_SEGMENT.is_match(segment) {
        return true;
    }
    BASE64ISH_SEGMENT.is_match(segment) && segment.bytes().any(|b| b.is_ascii_digit())
}

/// Derive the method-name from the path segments that remain after the
/// interface prefix has been consumed.
///
/// Dynamic-looking segments become the literal token `_id`; segments longer
/// than 32 chars or containing `=` are stripped entirely. An empty result
/// becomes `"root"`.
#[must_use]
pub fn derive_method_name(remaining_segments: &[&str]) -> String {
    let parts: Vec<&str> = remaining_segments
        .iter()
        .filter(|seg| seg.len() <= 32 && !seg.contains('='))
        .map(|seg| if is_dynamic_segment(seg) { "_id" } else { seg })
        .collect();

    if parts.is_empty() {
        "root".to_string()
    } else {
        parts.join("_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(path: &str) -> Vec<&str> {
        path.split('/').filter(|s| !s.is_empty()).collect()
    }

    #[test]
    fn generic_api_root_with_version() {
        let (name, consumed) = InterfaceName::derive("example.com", &segs("/api/v1/users"));
        assert_eq!(name.as_str(), "example.com/api/v1");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn generic_api_root_without_version() {
        let (name, consumed) = InterfaceName::derive("example.com", &segs("/api/users"));
        assert_eq!(name.as_str(), "example.com/api");
        assert_eq!(consumed, 1);
    }

    #[test]
    fn googleapis_hostname() {
        let (name, consumed) =
            InterfaceName::derive("content.googleapis.com", &segs("/v1/items"));
        assert_eq!(name.as_str(), "content");
        assert_eq!(consumed, 0);
    }

    #[test]
    fn batch_execute_path() {
        let (name, consumed) = InterfaceName::derive(
            "ui.example.com",
            &segs("/_/ScraperUi/data/batchexecute"),
        );
        assert_eq!(name.as_str(), "ui.example.com/data");
        assert_eq!(consumed, 4);
    }

    #[test]
    fn hostname_only_fallback() {
        let (name, consumed) = InterfaceName::derive("example.com", &segs("/foo/bar"));
        assert_eq!(name.as_str(), "example.com");
        assert_eq!(consumed, 0);
    }

    #[test]
    fn method_id_replaces_slash_with_dot() {
        let interface = InterfaceName::new("example.com/api/v1");
        let id = MethodId::new(&interface, "users");
        assert_eq!(id.as_str(), "example.com.api.v1.users");
    }

    #[test]
    fn dynamic_segment_numeric() {
        assert!(is_dynamic_segment("12345"));
    }

    #[test]
    fn dynamic_segment_uuid() {
        assert!(is_dynamic_segment("550e8400-e29b-41d4-a716-446655440000"));
    }

    #[test]
    fn dynamic_segment_object_id() {
        assert!(is_dynamic_segment("507f1f77bcf86cd799439011"));
    }

    #[test]
    fn dynamic_segment_base64ish_with_digit() {
        assert!(is_dynamic_segment("aGVsbG93b3JsZDEyMzQ"));
    }

    #[test]
    fn not_dynamic_plain_word() {
        assert!(!is_dynamic_segment("users"));
        assert!(!is_dynamic_segment("profile"));
    }

    #[test]
    fn method_name_normalizes_dynamic_and_joins() {
        let name = derive_method_name(&["users", "12345", "profile"]);
        assert_eq!(name, "users__id_profile");
    }

    #[test]
    fn method_name_strips_long_and_equals_segments() {
        let long = "x".repeat(33);
        let name = derive_method_name(&["users", long.as_str(), "a=b"]);
        assert_eq!(name, "users");
    }

    #[test]
    fn method_name_empty_becomes_root() {
        assert_eq!(derive_method_name(&[]), "root");
    }

    #[test]
    fn method_name_all_stripped_becomes_root() {
        assert_eq!(derive_method_name(&["a=b"]), "root");
    }
}
