//! Chain index (C6): tracks response values that reappear as request
//! parameters on a different method, so the engine can surface likely
//! "this output feeds that input" relationships.

use std::collections::HashMap;

use serde_json::Value;
use vdd_core::{ChainLink, ParamLocation};

/// One indexed sighting of a chainable value: which method/field it came
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub method_id: String,
    pub field_path: String,
}

/// Per-tab global index of chainable values observed in responses, split
/// into string and number maps.
#[derive(Debug, Clone, Default)]
pub struct ChainIndex {
    strings: HashMap<String, Vec<Sighting>>,
    numbers: HashMap<String, Vec<Sighting>>,
}

/// A string is chainable when it is 4-500 chars and not one of the JSON
/// literal spellings; a number is chainable when it is not in `{-1, 0, 1}`.
#[must_use]
pub fn is_chainable_string(value: &str) -> bool {
    let len = value.len();
    (4..=500).contains(&len) && !matches!(value, "true" | "false" | "null")
}

/// See [`is_chainable_string`] — the numeric counterpart.
#[must_use]
pub fn is_chainable_number(value: f64) -> bool {
    value != -1.0 && value != 0.0 && value != 1.0
}

fn number_key(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value}")
    } else {
        value.to_string()
    }
}

impl ChainIndex {
    /// A new, empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk a decoded response body recursively, indexing every chainable
    /// value against `(method_id, dotted-path)`.
    ///
    /// `content_type` gates out media bodies (`image/*`, `video/*`) per the
    /// indexing rule; callers should skip calling this entirely for bodies
    /// already known to be opaque binary.
    pub fn index_response(&mut self, method_id: &str, content_type: Option<&str>, body: &Value) {
        if let Some(ct) = content_type {
            let ct = ct.to_ascii_lowercase();
            if ct.starts_with("image/") || ct.starts_with("video/") {
                return;
            }
        }
        self.walk(method_id, "", body);
    }

    fn walk(&mut self, method_id: &str, path: &str, value: &Value) {
        match value {
            Value::String(s) => {
                if is_chainable_string(s) {
                    self.record_string(s, method_id, path);
                }
            }
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    if is_chainable_number(f) {
                        self.record_number(&number_key(f), method_id, path);
                    }
                }
            }
            Value::Object(map) => {
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    self.walk(method_id, &child_path, child);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    let child_path = if path.is_empty() {
                        format!("{i}")
                    } else {
                        format!("{path}.{i}")
                    };
                    self.walk(method_id, &child_path, child);
                }
            }
            Value::Bool(_) | Value::Null => {}
        }
    }

    fn record_string(&mut self, value: &str, method_id: &str, path: &str) {
        let sightings = self.strings.entry(value.to_string()).or_default();
        record(sightings, method_id, path);
    }

    fn record_number(&mut self, key: &str, method_id: &str, path: &str) {
        let sightings = self.numbers.entry(key.to_string()).or_default();
        record(sightings, method_id, path);
    }

    /// Look up every indexed sighting for a string value.
    #[must_use]
    pub fn lookup_string(&self, value: &str) -> &[Sighting] {
        self.strings.get(value).map_or(&[], Vec::as_slice)
    }

    /// Look up every indexed sighting for a numeric value.
    #[must_use]
    pub fn lookup_number(&self, value: f64) -> &[Sighting] {
        self.numbers.get(&number_key(value)).map_or(&[], Vec::as_slice)
    }

    /// Given a new request's flattened input values, emit a [`ChainLink`]
    /// for every indexed sighting whose source method differs from
    /// `target_method_id`.
    #[must_use]
    pub fn detect(
        &self,
        target_method_id: &str,
        inputs: &[(String, ParamLocation, InputValue)],
    ) -> Vec<ChainLink> {
        let mut links = Vec::new();
        for (param_name, location, value) in inputs {
            let sightings: &[Sighting] = match value {
                InputValue::String(s) => self.lookup_string(s),
                InputValue::Number(n) => self.lookup_number(*n),
            };
            for sighting in sightings {
                if sighting.method_id == target_method_id {
                    continue;
                }
                links.push(ChainLink {
                    target_method_id: target_method_id.to_string(),
                    param_name: param_name.clone(),
                    param_location: *location,
                    source_method_id: sighting.method_id.clone(),
                    source_field_path: sighting.field_path.clone(),
                    observed_count: 1,
                });
            }
        }
        links
    }
}

/// A request input value, tagged by kind, for [`ChainIndex::detect`].
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    String(String),
    Number(f64),
}

fn record(sightings: &mut Vec<Sighting>, method_id: &str, path: &str) {
    if sightings
        .iter()
        .any(|s| s.method_id == method_id && s.field_path == path)
    {
        return;
    }
    sightings.push(Sighting {
        method_id: method_id.to_string(),
        field_path: path.to_string(),
    });
}

/// Merge a freshly detected [`ChainLink`] into a method's recorded chains,
/// as outgoing on the source method and incoming on the target method.
/// Re-observation of the same `(target, param, source, path)` increments
/// `observed_count` instead of duplicating.
pub fn record_link(outgoing: &mut Vec<ChainLink>, incoming: &mut Vec<ChainLink>, link: ChainLink) {
    merge_into(outgoing, link.clone());
    merge_into(incoming, link);
}

/// Merge one [`ChainLink`] into a single recorded-chains list, incrementing
/// `observed_count` on re-observation of the same `(target, param, source,
/// path)` tuple instead of duplicating. Used when the source and target
/// methods live in different lists that can't be updated atomically
/// together (e.g. different services' VDDs).
pub fn merge_into(list: &mut Vec<ChainLink>, link: ChainLink) {
    if let Some(existing) = list.iter_mut().find(|l| same_link(l, &link)) {
        existing.observed_count += 1;
    } else {
        list.push(link);
    }
}

fn same_link(a: &ChainLink, b: &ChainLink) -> bool {
    a.target_method_id == b.target_method_id
        && a.param_name == b.param_name
        && a.source_method_id == b.source_method_id
        && a.source_field_path == b.source_field_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indexes_chainable_string_and_skips_short_one() {
        let mut index = ChainIndex::new();
        let body = json!({"userId": "abc123xyz", "flag": "ok"});
        index.index_response("svc.users", Some("application/json"), &body);

        assert_eq!(index.lookup_string("abc123xyz").len(), 1);
        assert!(index.lookup_string("ok").is_empty());
    }

    #[test]
    fn skips_media_content_types() {
        let mut index = ChainIndex::new();
        let body = json!({"userId": "abc123xyz"});
        index.index_response("svc.users", Some("image/png"), &body);
        assert!(index.lookup_string("abc123xyz").is_empty());
    }

    #[test]
    fn numbers_excluding_common_sentinels() {
        let mut index = ChainIndex::new();
        let body = json!({"count": 0, "total": 42});
        index.index_response("svc.stats", None, &body);
        assert!(index.lookup_number(0.0).is_empty());
        assert_eq!(index.lookup_number(42.0).len(), 1);
    }

    #[test]
    fn detect_emits_link_for_cross_method_match_only() {
        let mut index = ChainIndex::new();
        index.index_response("svc.users.get", None, &json!({"id": "abcdefgh"}));

        let same_method = index.detect(
            "svc.users.get",
            &[("id".to_string(), ParamLocation::Query, InputValue::String("abcdefgh".to_string()))],
        );
        assert!(same_method.is_empty());

        let other_method = index.detect(
            "svc.posts.create",
            &[("authorId".to_string(), ParamLocation::Query, InputValue::String("abcdefgh".to_string()))],
        );
        assert_eq!(other_method.len(), 1);
        assert_eq!(other_method[0].source_method_id, "svc.users.get");
        assert_eq!(other_method[0].source_field_path, "id");
    }

    #[test]
    fn record_link_increments_on_duplicate() {
        let mut outgoing = Vec::new();
        let mut incoming = Vec::new();
        let link = ChainLink {
            target_method_id: "t".to_string(),
            param_name: "p".to_string(),
            param_location: ParamLocation::Query,
            source_method_id: "s".to_string(),
            source_field_path: "f".to_string(),
            observed_count: 1,
        };
        record_link(&mut outgoing, &mut incoming, link.clone());
        record_link(&mut outgoing, &mut incoming, link);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].observed_count, 2);
        assert_eq!(incoming[0].observed_count, 2);
    }
}
