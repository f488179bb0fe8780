// crates/requiem-registry/src/limiter.rs
// ============================================================================
// Module: Output Size Limiter
// Description: Byte-accurate size accounting and truncation for tool output.
// Purpose: Enforce gate step 8 (spec §4.5/§4.6): truncate oversized output
//          where possible, fail otherwise.
// Dependencies: serde_json, requiem_core::error
// ============================================================================

//! ## Overview
//! Size accounting is exact, never approximate: strings count their UTF-8
//! byte length, numbers and booleans count their stringified length, `null`
//! counts zero, arrays sum their elements' sizes recursively, and objects
//! count the UTF-8 length of their *own* canonical JSON form (not a
//! recursive sum of field sizes — spec §4.6 draws this distinction
//! explicitly). After [`limit_output`] truncates, `size_bytes(output) <=
//! max_bytes` always holds.

use serde_json::Map;
use serde_json::Value;

/// Fixed truncation notice appended to an over-long string.
const STRING_TRUNCATION_NOTICE: &str = "...[truncated]";
/// Sentinel element appended when an array is truncated.
const ARRAY_TRUNCATION_NOTICE: &str = "[... truncated ...]";
/// Sentinel key inserted when an object is truncated.
const OBJECT_TRUNCATION_KEY: &str = "...";
/// Sentinel value paired with [`OBJECT_TRUNCATION_KEY`].
const OBJECT_TRUNCATION_VALUE: &str = "[... truncated ...]";

/// Default output size limit in bytes (1 MiB), overridable by the host via
/// `REQUIEM_TOOL_OUTPUT_MAX_BYTES`.
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;

/// Computes the exact byte size of a JSON value per the accounting rules
/// above.
#[must_use]
pub fn size_bytes(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Bool(b) => if *b { "true" } else { "false" }.len(),
        Value::Number(n) => n.to_string().len(),
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(size_bytes).sum(),
        Value::Object(_) => canonical_len(value),
    }
}

/// Returns the UTF-8 byte length of `value`'s canonical JSON form, falling
/// back to standard serialization if canonicalization fails (only possible
/// for non-finite numbers, which a `Value` parsed from JSON cannot hold).
fn canonical_len(value: &Value) -> usize {
    serde_jcs::to_vec(value)
        .map_or_else(|_| serde_json::to_vec(value).map_or(0, |bytes| bytes.len()), |bytes| bytes.len())
}

/// Whether a value fit within the limit as-is, or was truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitOutcome {
    /// The original value already fit within the limit.
    Fit,
    /// The value was truncated to fit within the limit.
    Truncated,
}

/// Errors from [`limit_output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LimiterError {
    /// The value exceeded the limit and has no truncation strategy (e.g. a
    /// bare number or boolean).
    #[error("output of {actual} bytes exceeds the {limit} byte limit and cannot be truncated")]
    NotTruncatable {
        /// Actual size in bytes.
        actual: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
}

/// Applies gate step 8: if `value` exceeds `max_bytes`, truncate it when a
/// truncation strategy exists for its shape; otherwise fail.
///
/// # Errors
///
/// Returns [`LimiterError::NotTruncatable`] when `value` is a number,
/// boolean, or null that exceeds `max_bytes` on its own (this can only
/// happen for a pathologically large number literal, since null/bool are
/// tiny).
pub fn limit_output(value: Value, max_bytes: usize) -> Result<(Value, LimitOutcome), LimiterError> {
    if size_bytes(&value) <= max_bytes {
        return Ok((value, LimitOutcome::Fit));
    }
    match value {
        Value::String(s) => Ok((Value::String(truncate_string(&s, max_bytes)), LimitOutcome::Truncated)),
        Value::Array(items) => Ok((Value::Array(truncate_array(items, max_bytes)), LimitOutcome::Truncated)),
        Value::Object(fields) => {
            Ok((Value::Object(truncate_object(fields, max_bytes)), LimitOutcome::Truncated))
        }
        other => Err(LimiterError::NotTruncatable { actual: size_bytes(&other), limit: max_bytes }),
    }
}

/// Finds the largest UTF-8-safe prefix of `s` whose byte length, plus
/// [`STRING_TRUNCATION_NOTICE`], does not exceed `max_bytes`.
fn truncate_string(s: &str, max_bytes: usize) -> String {
    let notice_len = STRING_TRUNCATION_NOTICE.len();
    if max_bytes <= notice_len {
        return STRING_TRUNCATION_NOTICE.to_string();
    }
    let budget = max_bytes - notice_len;
    let mut prefix_end = budget.min(s.len());
    while prefix_end > 0 && !s.is_char_boundary(prefix_end) {
        prefix_end -= 1;
    }
    let mut result = s[..prefix_end].to_string();
    result.push_str(STRING_TRUNCATION_NOTICE);
    result
}

/// Appends elements until the next one would overflow, then a notice
/// element.
fn truncate_array(items: Vec<Value>, max_bytes: usize) -> Vec<Value> {
    let notice = Value::String(ARRAY_TRUNCATION_NOTICE.to_string());
    let notice_size = size_bytes(&notice);
    let mut kept = Vec::new();
    let mut running = 0_usize;
    for item in items {
        let item_size = size_bytes(&item);
        if running + item_size + notice_size > max_bytes {
            kept.push(notice);
            return kept;
        }
        running += item_size;
        kept.push(item);
    }
    kept
}

/// Inserts fields key-by-key (in deterministic key order) until the next
/// one would overflow, then a sentinel field.
fn truncate_object(fields: Map<String, Value>, max_bytes: usize) -> Map<String, Value> {
    let mut kept = Map::new();
    kept.insert(OBJECT_TRUNCATION_KEY.to_string(), Value::String(OBJECT_TRUNCATION_VALUE.to_string()));
    let sentinel_size = canonical_len(&Value::Object(kept.clone()));
    kept.clear();
    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();
    for key in keys {
        let value = &fields[key];
        let mut probe = kept.clone();
        probe.insert(key.clone(), value.clone());
        let probe_size = canonical_len(&Value::Object(probe.clone()));
        if probe_size + sentinel_size > max_bytes {
            kept.insert(OBJECT_TRUNCATION_KEY.to_string(), Value::String(OBJECT_TRUNCATION_VALUE.to_string()));
            return kept;
        }
        kept = probe;
    }
    kept
}
