//! VDD engine (C7): method resolution/disambiguation, parameter and body
//! learning, schema generation from JSON/JSPB/protobuf trees, and the
//! schema-merge algorithm that folds newly generated schemas into the
//! persisted VDD without losing custom renames or field-number authority.

use std::collections::HashMap;

use serde_json::Value;
use vdd_core::{
    ArrayItems, Method, ParamDef, ParamLocation, PropertyDef, PropertyLabel, PropertyType,
    ResourceKind, Schema, ScalarType, Vdd,
};
use vdd_wire::jspb::{JspbField, JspbNode};
use vdd_wire::tree::{FieldNode, LenValue, TreeNode};

const EXCLUDED_QUERY_PARAMS: &[&str] = &["key", "api_key"];

/// Resolve (creating if needed) the method a freshly observed request maps
/// to, applying the base-name collision disambiguation rule.
///
/// Returns the resource kind and key the method now lives under.
pub fn resolve_method(
    vdd: &mut Vdd,
    base_name: &str,
    http_method: &str,
    path: &str,
) -> (ResourceKind, String) {
    if let Some((kind, existing)) = vdd.find_method(base_name) {
        if existing.http_method.eq_ignore_ascii_case(http_method) {
            return (kind, base_name.to_string());
        }

        let prior_key = format!("{}_{}", existing.http_method.to_lowercase(), base_name);
        let prior_method = existing.clone();
        let resource = vdd.resource_mut(kind);
        resource.methods.remove(base_name);
        resource.methods.insert(prior_key, prior_method);

        let new_key = format!("{}_{}", http_method.to_lowercase(), base_name);
        let new_method = Method::new(new_key.clone(), path, http_method);
        vdd.resource_mut(ResourceKind::Learned)
            .methods
            .insert(new_key.clone(), new_method);
        return (ResourceKind::Learned, new_key);
    }

    let method = Method::new(base_name, path, http_method);
    vdd.resource_mut(ResourceKind::Learned)
        .methods
        .insert(base_name.to_string(), method);
    (ResourceKind::Learned, base_name.to_string())
}

/// Learn query and path parameters from an observed request URL against
/// the method's stored path template.
pub fn learn_parameters(method: &mut Method, query_pairs: &[(String, String)], actual_path_segments: &[&str]) {
    learn_query_parameters(method, query_pairs);
    learn_path_parameters(method, actual_path_segments);
}

fn learn_query_parameters(method: &mut Method, query_pairs: &[(String, String)]) {
    for (name, value) in query_pairs {
        if EXCLUDED_QUERY_PARAMS.contains(&name.to_lowercase().as_str()) {
            continue;
        }
        let scalar = if value.parse::<f64>().is_ok() {
            ScalarType::Int64
        } else {
            ScalarType::String
        };
        method
            .parameters
            .entry(name.clone())
            .or_insert_with(|| ParamDef::new(name.clone(), scalar, ParamLocation::Query));
    }
}

fn learn_path_parameters(method: &mut Method, actual_segments: &[&str]) {
    let template_segments: Vec<&str> = method.path.split('/').filter(|s| !s.is_empty()).collect();
    if template_segments.len() != actual_segments.len() {
        return;
    }

    let mut new_template = Vec::with_capacity(template_segments.len());
    let mut changed = false;
    for (template_seg, actual_seg) in template_segments.iter().zip(actual_segments.iter()) {
        let looks_dynamic = vdd_core::ident::is_dynamic_segment(actual_seg);
        let differs = template_seg != actual_seg;
        if (differs || looks_dynamic) && !template_seg.starts_with('{') {
            let param_name = format!("path_{actual_seg}");
            new_template.push(format!("{{{param_name}}}"));
            method
                .parameters
                .entry(param_name.clone())
                .or_insert_with(|| ParamDef::new(param_name, ScalarType::String, ParamLocation::Path));
            changed = true;
        } else {
            new_template.push((*template_seg).to_string());
        }
    }

    if changed {
        method.path = format!("/{}", new_template.join("/"));
    }
}

/// Generate a schema from a decoded JSON value (object, array, or scalar).
#[must_use]
pub fn schema_from_json(schema_name: &str, value: &Value) -> Schema {
    let mut schema = Schema::object(schema_name);
    if let Value::Object(map) = value {
        for (key, child) in map {
            schema.properties.insert(key.clone(), property_from_json(key, child, schema_name));
        }
    }
    schema
}

fn property_from_json(key: &str, value: &Value, parent_schema: &str) -> PropertyDef {
    match value {
        Value::Bool(_) => PropertyDef::scalar(key, ScalarType::Bool, PropertyLabel::Optional),
        Value::Number(n) => {
            let scalar = if n.is_f64() && n.as_f64().map(|f| f.fract() != 0.0).unwrap_or(false) {
                ScalarType::Double
            } else {
                ScalarType::Int64
            };
            PropertyDef::scalar(key, scalar, PropertyLabel::Optional)
        }
        Value::String(_) => PropertyDef::scalar(key, ScalarType::String, PropertyLabel::Optional),
        Value::Object(_) => {
            let nested_name = format!("{parent_schema}{}", capitalize(key));
            PropertyDef {
                name: key.to_string(),
                number: None,
                prop_type: PropertyType::Message,
                label: PropertyLabel::Optional,
                ref_: Some(nested_name),
                items: None,
                custom_name: false,
            }
        }
        Value::Array(items) => {
            let item_shape = array_item_shape(items, key, parent_schema);
            PropertyDef {
                name: key.to_string(),
                number: None,
                prop_type: PropertyType::Array,
                label: PropertyLabel::Repeated,
                ref_: None,
                items: Some(item_shape),
                custom_name: false,
            }
        }
        Value::Null => PropertyDef::scalar(key, ScalarType::String, PropertyLabel::Optional),
    }
}

fn array_item_shape(items: &[Value], key: &str, parent_schema: &str) -> ArrayItems {
    let all_scalar = items.iter().all(|v| !matches!(v, Value::Object(_) | Value::Array(_)));
    if all_scalar {
        let item_type = items.first().map(|v| match v {
            Value::String(_) => PropertyType::Scalar(ScalarType::String),
            Value::Bool(_) => PropertyType::Scalar(ScalarType::Bool),
            Value::Number(_) => PropertyType::Scalar(ScalarType::Int64),
            _ => PropertyType::Scalar(ScalarType::String),
        });
        ArrayItems { item_type, item_ref: None }
    } else {
        let nested_name = format!("{parent_schema}{}Item", capitalize(key));
        ArrayItems { item_type: Some(PropertyType::Message), item_ref: Some(nested_name) }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Generate a schema from a decoded JSPB field list (indexed JSON array).
#[must_use]
pub fn schema_from_jspb(schema_name: &str, fields: &[JspbField]) -> Schema {
    let mut schema = Schema::object(schema_name);
    for field in fields {
        let key = format!("field{}", field.field);
        let prop = property_from_jspb(&key, field.field, &field.node);
        schema.properties.insert(key, prop);
    }
    schema
}

fn property_from_jspb(key: &str, number: u32, node: &JspbNode) -> PropertyDef {
    match node {
        JspbNode::Scalar(value) => {
            let scalar = scalar_type_from_json_scalar(value);
            let mut prop = PropertyDef::scalar(key, scalar, PropertyLabel::Optional);
            prop.number = Some(number);
            prop
        }
        JspbNode::RepeatedScalar(values) => {
            let item_type = values
                .first()
                .map(|v| PropertyType::Scalar(scalar_type_from_json_scalar(v)));
            PropertyDef {
                name: key.to_string(),
                number: Some(number),
                prop_type: PropertyType::Array,
                label: PropertyLabel::Repeated,
                ref_: None,
                items: Some(ArrayItems { item_type, item_ref: None }),
                custom_name: false,
            }
        }
        JspbNode::Message(_children) => {
            let nested_name = format!("Field{number}Message");
            PropertyDef {
                name: key.to_string(),
                number: Some(number),
                prop_type: PropertyType::Message,
                label: PropertyLabel::Optional,
                ref_: Some(nested_name),
                items: None,
                custom_name: false,
            }
        }
        JspbNode::Object(_) => {
            let nested_name = format!("Field{number}Message");
            PropertyDef {
                name: key.to_string(),
                number: Some(number),
                prop_type: PropertyType::Message,
                label: PropertyLabel::Optional,
                ref_: Some(nested_name),
                items: None,
                custom_name: false,
            }
        }
    }
}

fn scalar_type_from_json_scalar(value: &Value) -> ScalarType {
    match value {
        Value::Bool(_) => ScalarType::Bool,
        Value::Number(n) => {
            if n.as_f64().map(|f| f.fract() != 0.0).unwrap_or(false) {
                ScalarType::Double
            } else {
                ScalarType::Int64
            }
        }
        Value::String(_) => ScalarType::String,
        _ => ScalarType::String,
    }
}

/// Generate a schema from a decoded protobuf tree. Repeated occurrence of
/// the same field number promotes the property to `repeated`.
#[must_use]
pub fn schema_from_tree(schema_name: &str, fields: &[FieldNode]) -> Schema {
    let mut schema = Schema::object(schema_name);
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for field in fields {
        *counts.entry(field.field).or_insert(0) += 1;
    }

    for field in fields {
        let key = format!("field{}", field.field);
        if schema.properties.contains_key(&key) {
            if let Some(existing) = schema.properties.get_mut(&key) {
                if counts[&field.field] > 1 {
                    existing.label = PropertyLabel::Repeated;
                }
            }
            continue;
        }
        let mut prop = property_from_tree_node(&key, field.field, &field.node, schema_name);
        if counts[&field.field] > 1 {
            prop.label = PropertyLabel::Repeated;
        }
        schema.properties.insert(key, prop);
    }
    schema
}

fn property_from_tree_node(key: &str, number: u32, node: &TreeNode, parent_schema: &str) -> PropertyDef {
    match node {
        TreeNode::Varint { .. } => {
            let mut prop = PropertyDef::scalar(key, ScalarType::Int64, PropertyLabel::Optional);
            prop.number = Some(number);
            prop
        }
        TreeNode::Fixed32(_) => {
            let mut prop = PropertyDef::scalar(key, ScalarType::Float, PropertyLabel::Optional);
            prop.number = Some(number);
            prop
        }
        TreeNode::Fixed64(_) => {
            let mut prop = PropertyDef::scalar(key, ScalarType::Double, PropertyLabel::Optional);
            prop.number = Some(number);
            prop
        }
        TreeNode::Len(LenValue::String(_)) => {
            let mut prop = PropertyDef::scalar(key, ScalarType::String, PropertyLabel::Optional);
            prop.number = Some(number);
            prop
        }
        TreeNode::Len(LenValue::Bytes(_)) => {
            let mut prop = PropertyDef::scalar(key, ScalarType::Bytes, PropertyLabel::Optional);
            prop.number = Some(number);
            prop
        }
        TreeNode::Len(LenValue::PackedVarints(_)) => PropertyDef {
            name: key.to_string(),
            number: Some(number),
            prop_type: PropertyType::Array,
            label: PropertyLabel::Repeated,
            ref_: None,
            items: Some(ArrayItems {
                item_type: Some(PropertyType::Scalar(ScalarType::Int64)),
                item_ref: None,
            }),
            custom_name: false,
        },
        TreeNode::Len(LenValue::Message(_)) => {
            let nested_name = format!("{parent_schema}Field{number}");
            PropertyDef {
                name: key.to_string(),
                number: Some(number),
                prop_type: PropertyType::Message,
                label: PropertyLabel::Optional,
                ref_: Some(nested_name),
                items: None,
                custom_name: false,
            }
        }
    }
}

/// Fold a newly generated schema `new_schema` into the VDD's persisted
/// `schemas` map under the existing name, applying the learn-time merge
/// rules (§4.7): match by key or field number, re-key synthetic
/// `field<N>` keys to real names, upgrade types without downgrading, and
/// never touch a `custom_name` property's name.
pub fn merge_schema(vdd: &mut Vdd, new_schema: &Schema) {
    merge_schema_inner(vdd, new_schema, false);
}

/// As [`merge_schema`], but field numbers and message-vs-scalar types from
/// `new_schema` are authoritative (probe data), and `field<N>` keys are
/// re-keyed to real names even when the probe didn't supply one of its
/// own — the probe's synthetic names win over a stale existing one.
pub fn merge_probe_schema(vdd: &mut Vdd, new_schema: &Schema) {
    merge_schema_inner(vdd, new_schema, true);
}

fn merge_schema_inner(vdd: &mut Vdd, new_schema: &Schema, probe_authoritative: bool) {
    let existing = match vdd.schema(&new_schema.name) {
        Some(schema) => schema.clone(),
        None => {
            vdd.put_schema(new_schema.clone());
            return;
        }
    };

    let mut merged = existing.clone();
    let number_to_key: HashMap<u32, String> = existing
        .properties
        .iter()
        .filter_map(|(key, prop)| prop.number.map(|n| (n, key.clone())))
        .collect();

    for (new_key, new_prop) in &new_schema.properties {
        let matched_key = if merged.properties.contains_key(new_key) {
            Some(new_key.clone())
        } else {
            new_prop.number.and_then(|n| number_to_key.get(&n).cloned())
        };

        let Some(matched_key) = matched_key else {
            merged.properties.insert(new_key.clone(), new_prop.clone());
            continue;
        };

        let is_synthetic = |k: &str| k.starts_with("field") && k[5..].parse::<u32>().is_ok();
        let existing_prop = merged.properties.get(&matched_key).unwrap();

        let should_rekey = matched_key != *new_key
            && !existing_prop.custom_name
            && (is_synthetic(&matched_key) || probe_authoritative)
            && !is_synthetic(new_key);

        if should_rekey {
            let mut moved = merged.properties.remove(&matched_key).unwrap();
            merge_property_in_place(&mut moved, new_prop, probe_authoritative);
            merged.properties.insert(new_key.clone(), moved);
        } else {
            let existing_prop = merged.properties.get_mut(&matched_key).unwrap();
            merge_property_in_place(existing_prop, new_prop, probe_authoritative);
        }
    }

    vdd.put_schema(merged);
}

fn merge_property_in_place(existing: &mut PropertyDef, new_prop: &PropertyDef, probe_authoritative: bool) {
    if existing.number.is_none() {
        existing.number = new_prop.number;
    }

    if probe_authoritative {
        if let (PropertyType::Scalar(_), PropertyType::Message) = (existing.prop_type, new_prop.prop_type) {
            existing.prop_type = PropertyType::Message;
        }
    }

    upgrade_scalar_type(existing, new_prop);

    if existing.label == PropertyLabel::Optional && new_prop.label != PropertyLabel::Optional {
        existing.label = new_prop.label;
    }

    if existing.ref_.is_none() {
        existing.ref_ = new_prop.ref_.clone();
    }

    if let Some(new_items) = &new_prop.items {
        match &mut existing.items {
            Some(existing_items) => {
                if existing_items.item_type.is_none() {
                    existing_items.item_type = new_items.item_type;
                }
                if existing_items.item_ref.is_none() {
                    existing_items.item_ref = new_items.item_ref.clone();
                }
            }
            None => existing.items = Some(new_items.clone()),
        }
    }
}

fn upgrade_scalar_type(existing: &mut PropertyDef, new_prop: &PropertyDef) {
    let (PropertyType::Scalar(existing_scalar), PropertyType::Scalar(new_scalar)) =
        (existing.prop_type, new_prop.prop_type)
    else {
        return;
    };

    if existing_scalar == new_scalar {
        return;
    }

    if existing_scalar == ScalarType::String && new_scalar != ScalarType::String {
        existing.prop_type = PropertyType::Scalar(new_scalar);
        return;
    }

    if existing_scalar.is_integer() && new_scalar.is_float() {
        existing.prop_type = PropertyType::Scalar(new_scalar);
    }
}

/// Deep-copy the `learned` and `probed` resources of `previous` into
/// `incoming` (an officially-fetched VDD about to replace the `official`
/// resource), preserving custom renames and stats/chains for every method
/// still present by name.
pub fn preserve_virtual_parts(previous: &Vdd, incoming: &mut Vdd) {
    for kind in [ResourceKind::Learned, ResourceKind::Probed] {
        if let Some(resource) = previous.resource(kind) {
            let target = incoming.resource_mut(kind);
            for (name, method) in &resource.methods {
                target.methods.entry(name.clone()).or_insert_with(|| method.clone());
            }
        }
    }

    if let Some(official) = previous.resource(ResourceKind::Official) {
        let target = incoming.resource_mut(ResourceKind::Official);
        for (name, prior_method) in &official.methods {
            if let Some(new_method) = target.methods.get_mut(name) {
                carry_over_custom_state(prior_method, new_method);
            }
        }
    }
}

fn carry_over_custom_state(prior: &Method, new_method: &mut Method) {
    new_method.stats = prior.stats.clone();
    new_method.chains = prior.chains.clone();
    for (name, prior_param) in &prior.parameters {
        if prior_param.custom_name.is_some() {
            if let Some(new_param) = new_method.parameters.get_mut(name) {
                new_param.custom_name = prior_param.custom_name.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_method_creates_learned_entry() {
        let mut vdd = Vdd::new();
        let (kind, key) = resolve_method(&mut vdd, "users", "GET", "/users");
        assert_eq!(kind, ResourceKind::Learned);
        assert_eq!(key, "users");
        assert!(vdd.find_method("users").is_some());
    }

    #[test]
    fn resolve_method_reuses_same_http_method() {
        let mut vdd = Vdd::new();
        resolve_method(&mut vdd, "users", "GET", "/users");
        let (_, key) = resolve_method(&mut vdd, "users", "GET", "/users");
        assert_eq!(key, "users");
        assert_eq!(vdd.resource(ResourceKind::Learned).unwrap().methods.len(), 1);
    }

    #[test]
    fn resolve_method_disambiguates_different_http_method() {
        let mut vdd = Vdd::new();
        resolve_method(&mut vdd, "users", "GET", "/users");
        let (kind, key) = resolve_method(&mut vdd, "users", "POST", "/users");
        assert_eq!(kind, ResourceKind::Learned);
        assert_eq!(key, "post_users");

        let resource = vdd.resource(ResourceKind::Learned).unwrap();
        assert!(resource.methods.contains_key("get_users"));
        assert!(resource.methods.contains_key("post_users"));
        assert!(!resource.methods.contains_key("users"));
    }

    #[test]
    fn learn_query_parameters_excludes_api_key() {
        let mut method = Method::new("m", "/x", "GET");
        learn_parameters(
            &mut method,
            &[("key".to_string(), "abc".to_string()), ("q".to_string(), "hello".to_string())],
            &[],
        );
        assert!(!method.parameters.contains_key("key"));
        assert!(method.parameters.contains_key("q"));
    }

    #[test]
    fn learn_path_parameters_converts_dynamic_segment() {
        let mut method = Method::new("m", "/users/template", "GET");
        learn_parameters(&mut method, &[], &["users", "12345"]);
        assert_eq!(method.path, "/users/{path_12345}");
        assert!(method.parameters.contains_key("path_12345"));
    }

    #[test]
    fn schema_from_json_infers_types() {
        let value = json!({"name": "a", "count": 3, "ratio": 1.5, "active": true, "tags": ["a", "b"]});
        let schema = schema_from_json("Thing", &value);
        assert_eq!(schema.properties["name"].prop_type, PropertyType::Scalar(ScalarType::String));
        assert_eq!(schema.properties["count"].prop_type, PropertyType::Scalar(ScalarType::Int64));
        assert_eq!(schema.properties["ratio"].prop_type, PropertyType::Scalar(ScalarType::Double));
        assert_eq!(schema.properties["active"].prop_type, PropertyType::Scalar(ScalarType::Bool));
        assert_eq!(schema.properties["tags"].prop_type, PropertyType::Array);
    }

    #[test]
    fn merge_preserves_custom_name() {
        let mut vdd = Vdd::new();
        let mut existing = Schema::object("UserRequest");
        let mut prop = PropertyDef::scalar("userEmail", ScalarType::String, PropertyLabel::Optional);
        prop.number = Some(1);
        prop.custom_name = true;
        existing.properties.insert("userEmail".to_string(), prop);
        vdd.put_schema(existing);

        let mut new_schema = Schema::object("UserRequest");
        let mut new_prop = PropertyDef::scalar("field1", ScalarType::String, PropertyLabel::Optional);
        new_prop.number = Some(1);
        new_schema.properties.insert("field1".to_string(), new_prop);

        merge_schema(&mut vdd, &new_schema);

        let merged = vdd.schema("UserRequest").unwrap();
        assert!(merged.properties.contains_key("userEmail"));
        assert!(!merged.properties.contains_key("field1"));
        assert!(merged.properties["userEmail"].custom_name);
    }

    #[test]
    fn merge_rekeys_synthetic_field_name_to_real_name() {
        let mut vdd = Vdd::new();
        let mut existing = Schema::object("S");
        let mut prop = PropertyDef::scalar("field1", ScalarType::String, PropertyLabel::Optional);
        prop.number = Some(1);
        existing.properties.insert("field1".to_string(), prop);
        vdd.put_schema(existing);

        let mut new_schema = Schema::object("S");
        let mut new_prop = PropertyDef::scalar("name", ScalarType::String, PropertyLabel::Optional);
        new_prop.number = Some(1);
        new_schema.properties.insert("name".to_string(), new_prop);

        merge_schema(&mut vdd, &new_schema);

        let merged = vdd.schema("S").unwrap();
        assert!(merged.properties.contains_key("name"));
        assert!(!merged.properties.contains_key("field1"));
    }

    #[test]
    fn merge_upgrades_int_to_double_never_downgrades() {
        let mut vdd = Vdd::new();
        let mut existing = Schema::object("S");
        existing
            .properties
            .insert("n".to_string(), PropertyDef::scalar("n", ScalarType::Int64, PropertyLabel::Optional));
        vdd.put_schema(existing);

        let mut new_schema = Schema::object("S");
        new_schema
            .properties
            .insert("n".to_string(), PropertyDef::scalar("n", ScalarType::Double, PropertyLabel::Optional));
        merge_schema(&mut vdd, &new_schema);
        assert_eq!(vdd.schema("S").unwrap().properties["n"].prop_type, PropertyType::Scalar(ScalarType::Double));

        let mut downgrade = Schema::object("S");
        downgrade
            .properties
            .insert("n".to_string(), PropertyDef::scalar("n", ScalarType::Int64, PropertyLabel::Optional));
        merge_schema(&mut vdd, &downgrade);
        assert_eq!(vdd.schema("S").unwrap().properties["n"].prop_type, PropertyType::Scalar(ScalarType::Double));
    }

    #[test]
    fn preserve_virtual_parts_carries_learned_resource() {
        let mut previous = Vdd::new();
        previous
            .resource_mut(ResourceKind::Learned)
            .methods
            .insert("users".to_string(), Method::new("svc.users", "/users", "GET"));

        let mut incoming = Vdd::new();
        incoming
            .resource_mut(ResourceKind::Official)
            .methods
            .insert("users".to_string(), Method::new("svc.users", "/users", "GET"));

        preserve_virtual_parts(&previous, &mut incoming);
        assert!(incoming.resource(ResourceKind::Learned).unwrap().methods.contains_key("users"));
    }
}
