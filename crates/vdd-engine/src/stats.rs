//! Per-parameter statistics (C5): histograms over observed values, and the
//! derived-attribute rules that turn those histograms into `required`,
//! `enum`, default-value, format, and range inferences on a [`ParamDef`].
//!
//! The data types ([`MethodStats`], [`ParamStats`]) live in `vdd-core`;
//! this module is purely the algorithms that update them and read derived
//! attributes back out.

use std::sync::LazyLock;

use regex::Regex;
use vdd_core::{MethodStats, NumericRange, ParamDef, ParamStats};

static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$").unwrap()
});
static URI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://\S+$").unwrap());
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});
static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").unwrap());

/// Record one observed string value against `stats`, updating the value
/// histogram, numeric range (if the value parses as a number), and the five
/// format-hint counters.
pub fn observe(stats: &mut ParamStats, value: &str) {
    stats.observed_count += 1;
    *stats.values.entry(value.to_string()).or_insert(0) += 1;

    if let Ok(number) = value.parse::<f64>() {
        stats.numeric_range = Some(match stats.numeric_range {
            Some(range) => NumericRange {
                min: range.min.min(number),
                max: range.max.max(number),
            },
            None => NumericRange { min: number, max: number },
        });
    }

    if DATE_TIME.is_match(value) {
        stats.format_hints.date_time += 1;
    }
    if URI.is_match(value) {
        stats.format_hints.uri += 1;
    }
    if EMAIL.is_match(value) {
        stats.format_hints.email += 1;
    }
    if UUID.is_match(value) {
        stats.format_hints.uuid += 1;
    }
    if INTEGER.is_match(value) {
        stats.format_hints.integer += 1;
    }
}

/// Re-derive every statistics-based attribute on `param` from `stats` and
/// the method's total `request_count`. Attributes a user has fixed
/// (`custom_required` / `custom_enum`) are left untouched.
pub fn derive(param: &mut ParamDef, stats: &ParamStats, request_count: u64) {
    derive_required(param, stats, request_count);
    derive_enum(param, stats);
    derive_default(param, stats);
    derive_format(param, stats);
    derive_range(param, stats);
}

fn derive_required(param: &mut ParamDef, stats: &ParamStats, request_count: u64) {
    let confidence = if request_count == 0 {
        0.0
    } else {
        stats.observed_count as f64 / request_count as f64
    };
    param.required_confidence = confidence;
    if param.custom_required {
        return;
    }
    param.required = confidence >= 1.0 && request_count >= 3;
}

fn derive_enum(param: &mut ParamDef, stats: &ParamStats) {
    if stats.observed_count < 5 {
        return;
    }
    let unique = stats.values.len();
    let max_unique = (0.3 * stats.observed_count as f64).round() as usize;
    if unique < 2 || unique > max_unique {
        return;
    }
    let covered: u64 = stats.values.values().sum();
    if (covered as f64) < 0.8 * stats.observed_count as f64 {
        return;
    }
    let mut values: Vec<String> = stats.values.keys().cloned().collect();
    values.sort();
    param.detected_enum = Some(values.clone());
    if !param.custom_enum {
        param.enum_values = Some(values);
    }
}

fn derive_default(param: &mut ParamDef, stats: &ParamStats) {
    if stats.observed_count < 3 {
        return;
    }
    let Some((value, &count)) = stats.values.iter().max_by_key(|(_, &c)| c) else {
        return;
    };
    let confidence = count as f64 / stats.observed_count as f64;
    if confidence >= 0.8 {
        param.default_value = Some(vdd_core::DefaultValue {
            value: value.clone(),
            confidence,
        });
    }
}

fn derive_format(param: &mut ParamDef, stats: &ParamStats) {
    if stats.observed_count < 5 {
        return;
    }
    let total = stats.observed_count as f64;
    let hints = &stats.format_hints;
    let candidates = [
        ("date-time", hints.date_time),
        ("uri", hints.uri),
        ("email", hints.email),
        ("uuid", hints.uuid),
        ("integer", hints.integer),
    ];
    if let Some((name, _)) = candidates
        .into_iter()
        .find(|(_, count)| *count as f64 / total >= 0.8)
    {
        param.format = Some(name.to_string());
    }
}

fn derive_range(param: &mut ParamDef, stats: &ParamStats) {
    if let Some(range) = stats.numeric_range {
        if range.min != range.max {
            param.range = Some(range);
        }
    }
}

/// A diagnostic-only observation: two parameters within the same method
/// whose observed value sets are identical, and which co-occurred across
/// the method's requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub first: String,
    pub second: String,
}

/// Find parameter pairs within one method's statistics whose observed value
/// sets are identical. Diagnostic only — never feeds back into the VDD.
#[must_use]
pub fn find_correlations(stats: &MethodStats) -> Vec<Correlation> {
    let mut names: Vec<&String> = stats.params.keys().collect();
    names.sort();
    let mut correlations = Vec::new();

    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let a = &stats.params[names[i]];
            let b = &stats.params[names[j]];
            if a.observed_count == 0 || b.observed_count == 0 {
                continue;
            }
            let keys_a: std::collections::BTreeSet<&String> = a.values.keys().collect();
            let keys_b: std::collections::BTreeSet<&String> = b.values.keys().collect();
            if keys_a == keys_b {
                correlations.push(Correlation {
                    first: names[i].clone(),
                    second: names[j].clone(),
                });
            }
        }
    }
    correlations
}
