//! Parameter extraction from query strings, form bodies and JSON.
//!
//! Every strategy produces the same [`ParamRecord`] shape so the filter
//! and the aggregator never care where a name came from.

use crate::error::Result;
use crate::filter::{prefix_of, simplify};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Values longer than this (in characters) are replaced by [`TRUNCATED_VALUE`].
pub const MAX_VALUE_CHARS: usize = 30_000;

/// Placeholder for oversized JSON response values.
pub const TRUNCATED_VALUE: &str = "<long truncated>";

/// Placeholder for file upload parts.
pub const BINARY_FILE_VALUE: &str = "<binary file>";

/// Where a parameter was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParamLocation {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "COOKIE")]
    Cookie,
    #[serde(rename = "JSON-RESPONSE")]
    JsonResponse,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Get => "GET",
            ParamLocation::Post => "POST",
            ParamLocation::Cookie => "COOKIE",
            ParamLocation::JsonResponse => "JSON-RESPONSE",
        }
    }
}

/// Kind of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl JsonKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => JsonKind::Object,
            Value::Array(_) => JsonKind::Array,
            Value::String(_) => JsonKind::String,
            Value::Number(_) => JsonKind::Number,
            Value::Bool(_) => JsonKind::Boolean,
            Value::Null => JsonKind::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonKind::Object => "object",
            JsonKind::Array => "array",
            JsonKind::String => "string",
            JsonKind::Number => "number",
            JsonKind::Boolean => "boolean",
            JsonKind::Null => "null",
        }
    }
}

/// Encoding a parameter was carried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    UrlEncoded,
    FormData,
    Json,
    /// JSON response field, tagged with the kind of its value.
    JsonValue(JsonKind),
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::UrlEncoded => "urlencoded",
            ParamType::FormData => "form-data",
            ParamType::Json => "json",
            ParamType::JsonValue(kind) => kind.as_str(),
        }
    }
}

impl Serialize for ParamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One extracted parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamRecord {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub location: ParamLocation,
    /// Shared underscore prefix, set once the prefix has been seen before
    /// in the same parse. Not used by the wordlist output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// `name=value`.
    pub combined: String,
}

impl ParamRecord {
    pub fn new(
        name: String,
        value: String,
        param_type: ParamType,
        location: ParamLocation,
        prefix: Option<String>,
    ) -> Self {
        let combined = format!("{name}={value}");
        Self {
            name,
            value,
            param_type,
            location,
            prefix,
            combined,
        }
    }
}

/// Tracks underscore prefixes within a single parse.
#[derive(Debug, Default)]
pub(crate) struct PrefixTracker {
    seen: HashSet<String>,
}

impl PrefixTracker {
    /// Returns the prefix only if it was already observed.
    pub(crate) fn observe(&mut self, name: &str) -> Option<String> {
        let prefix = prefix_of(name)?;
        if self.seen.contains(prefix) {
            Some(prefix.to_string())
        } else {
            self.seen.insert(prefix.to_string());
            None
        }
    }
}

/// Decode `+` as space, then percent-escapes. Invalid UTF-8 is replaced.
pub fn unquote_plus(input: &str) -> String {
    let spaced = input.replace('+', " ");
    let decoded = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Parse `key=value&...` pairs. Blank values are kept, empty pairs dropped.
pub fn parse_urlencoded(input: &str, location: ParamLocation) -> Vec<ParamRecord> {
    let mut prefixes = PrefixTracker::default();

    url::form_urlencoded::parse(input.as_bytes())
        .map(|(name, value)| {
            let name = name.trim().to_string();
            let prefix = prefixes.observe(&name);
            let value = unquote_plus(&value).trim().to_string();
            ParamRecord::new(name, value, ParamType::UrlEncoded, location, prefix)
        })
        .collect()
}

/// Byte-oriented [`parse_urlencoded`]; non-UTF-8 input yields nothing.
pub fn parse_urlencoded_bytes(body: &[u8], location: ParamLocation) -> Vec<ParamRecord> {
    match std::str::from_utf8(body) {
        Ok(text) => parse_urlencoded(text, location),
        Err(e) => {
            debug!("skipping url-encoded input with invalid utf-8: {e}");
            Vec::new()
        }
    }
}

/// Simplified, deduplicated parameter names of a query string.
pub fn query_param_names(query: &str) -> BTreeSet<String> {
    parse_urlencoded(query, ParamLocation::Get)
        .iter()
        .map(|record| simplify(&record.name))
        .collect()
}

/// Top-level fields of a JSON request body.
///
/// Only an object root yields records; arrays and scalars yield none.
pub fn parse_json_request(body: &[u8]) -> Result<Vec<ParamRecord>> {
    let root: Value = serde_json::from_slice(body)?;
    let Value::Object(fields) = root else {
        return Ok(Vec::new());
    };

    let mut prefixes = PrefixTracker::default();
    let records = fields
        .iter()
        .map(|(name, value)| {
            let name = name.trim().to_string();
            let prefix = prefixes.observe(&name);
            let value = unquote_plus(&stringify(value)).trim().to_string();
            ParamRecord::new(name, value, ParamType::Json, ParamLocation::Post, prefix)
        })
        .collect();
    Ok(records)
}

/// Every named field anywhere in a JSON response body.
///
/// Array elements have no key and integer-like keys are treated as
/// indices, so neither produces a record, but both are still descended
/// into. Malformed JSON yields nothing.
pub fn parse_json_response(body: &[u8]) -> Vec<ParamRecord> {
    match serde_json::from_slice::<Value>(body) {
        Ok(root) => {
            let mut records = Vec::new();
            walk_json("", &root, &mut records);
            records
        }
        Err(e) => {
            debug!("json response body not parsed: {e}");
            Vec::new()
        }
    }
}

fn walk_json(key: &str, value: &Value, out: &mut Vec<ParamRecord>) {
    let key = key.trim();

    if !key.is_empty() && !is_integer_literal(key) {
        let text = stringify(value);
        let text = text.trim();
        let value_text = if text.chars().count() > MAX_VALUE_CHARS {
            TRUNCATED_VALUE.to_string()
        } else {
            text.to_string()
        };
        out.push(ParamRecord::new(
            key.to_string(),
            value_text,
            ParamType::JsonValue(JsonKind::of(value)),
            ParamLocation::JsonResponse,
            None,
        ));
    }

    match value {
        Value::Object(fields) => {
            for (sub_key, sub_value) in fields {
                walk_json(sub_key, sub_value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_json("", item, out);
            }
        }
        _ => {}
    }
}

/// Strings verbatim, everything else as compact JSON text.
///
/// Non-string values read `true`, `null`, `[1,2]` or `{"a":1}` in JSON
/// syntax rather than any language-specific repr. Values never reach a
/// wordlist.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer literal with optional sign and `_` digit separators.
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') {
        return false;
    }
    if digits.contains("__") {
        return false;
    }
    digits.chars().all(|c| c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(records: &[ParamRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_urlencoded_basic() {
        let records = parse_urlencoded("a=1&b=&c&&d=x+y%21", ParamLocation::Get);
        assert_eq!(names(&records), vec!["a", "b", "c", "d"]);
        assert_eq!(records[1].value, "");
        assert_eq!(records[2].value, "");
        assert_eq!(records[3].value, "x y!");
        assert_eq!(records[3].combined, "d=x y!");
        assert!(records
            .iter()
            .all(|r| r.location == ParamLocation::Get && r.param_type == ParamType::UrlEncoded));
    }

    #[test]
    fn test_urlencoded_decodes_names_and_trims() {
        let records = parse_urlencoded("%20user%5Bid%5D%20=%2520", ParamLocation::Post);
        assert_eq!(records[0].name, "user[id]");
        // value is decoded twice: %2520 -> %20 -> " " -> trimmed
        assert_eq!(records[0].value, "");
    }

    #[test]
    fn test_urlencoded_bytes_rejects_invalid_utf8() {
        assert!(parse_urlencoded_bytes(b"a=\xff\xfe", ParamLocation::Post).is_empty());
    }

    #[test]
    fn test_prefix_tag_second_occurrence() {
        let records = parse_urlencoded("user_name=bob&user_id=1&user_age=3", ParamLocation::Post);
        assert_eq!(records[0].prefix, None);
        assert_eq!(records[1].prefix.as_deref(), Some("user"));
        assert_eq!(records[2].prefix.as_deref(), Some("user"));
    }

    #[test]
    fn test_query_param_names_collapse() {
        let names = query_param_names("a=1&b[x]=2&b[y]=3");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b[]"]);
    }

    #[test]
    fn test_json_request_object() {
        let body = br#"{"login": "a%20b", "remember_me": true, "tags": [1, 2], "opts": {"a": 1}, "none": null}"#;
        let records = parse_json_request(body).unwrap();
        assert_eq!(names(&records), vec!["login", "remember_me", "tags", "opts", "none"]);
        assert_eq!(records[0].value, "a b");
        assert_eq!(records[1].value, "true");
        assert_eq!(records[2].value, "[1,2]");
        assert_eq!(records[3].value, r#"{"a":1}"#);
        assert_eq!(records[4].value, "null");
        assert!(records.iter().all(|r| r.param_type == ParamType::Json));
    }

    #[test]
    fn test_json_request_non_object_root() {
        assert!(parse_json_request(b"[1, 2]").unwrap().is_empty());
        assert!(parse_json_request(b"\"x\"").unwrap().is_empty());
        assert!(parse_json_request(b"{broken").is_err());
    }

    #[test]
    fn test_json_response_recursive() {
        let body = br#"{"id": 5, "user": {"name": "bob", "tags": ["x","y"]}}"#;
        let records = parse_json_response(body);
        assert_eq!(names(&records), vec!["id", "user", "name", "tags"]);

        assert_eq!(records[0].param_type, ParamType::JsonValue(JsonKind::Number));
        assert_eq!(records[0].value, "5");
        assert_eq!(records[1].param_type, ParamType::JsonValue(JsonKind::Object));
        assert_eq!(records[3].param_type, ParamType::JsonValue(JsonKind::Array));
        assert!(records
            .iter()
            .all(|r| r.location == ParamLocation::JsonResponse));
    }

    #[test]
    fn test_json_response_skips_numeric_keys_but_descends() {
        let body = br#"{"0": {"inner": null}, "-12": 1, "1_000": 2, "v2": false}"#;
        let records = parse_json_response(body);
        assert_eq!(names(&records), vec!["inner", "v2"]);
        assert_eq!(records[0].param_type, ParamType::JsonValue(JsonKind::Null));
        assert_eq!(records[1].value, "false");
    }

    #[test]
    fn test_json_response_array_root() {
        let records = parse_json_response(br#"[{"a": 1}, [{"b": "c"}]]"#);
        assert_eq!(names(&records), vec!["a", "b"]);
    }

    #[test]
    fn test_json_response_truncates_long_values() {
        let long = "z".repeat(MAX_VALUE_CHARS + 1);
        let body = format!(r#"{{"blob": "{long}", "ok": "{}"}}"#, "z".repeat(10));
        let records = parse_json_response(body.as_bytes());
        assert_eq!(records[0].value, TRUNCATED_VALUE);
        assert_eq!(records[1].value.len(), 10);
    }

    #[test]
    fn test_json_response_malformed_is_empty() {
        assert!(parse_json_response(b"<html>").is_empty());
        assert!(parse_json_response(b"").is_empty());
    }

    #[test]
    fn test_integer_literal() {
        for s in ["0", "42", "-7", "+3", "1_000"] {
            assert!(is_integer_literal(s), "{s}");
        }
        for s in ["", "-", "1.5", "_1", "1_", "1__0", "x1", "0x10"] {
            assert!(!is_integer_literal(s), "{s}");
        }
    }

    #[test]
    fn test_record_serializes_with_type_tags() {
        let record = ParamRecord::new(
            "id".into(),
            "5".into(),
            ParamType::JsonValue(JsonKind::Number),
            ParamLocation::JsonResponse,
            None,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["location"], "JSON-RESPONSE");
        assert!(json.get("prefix").is_none());
    }
}
