//! Cookie and Set-Cookie header parsing.

use crate::error::{Error, Result};
use crate::params::{unquote_plus, ParamLocation, ParamRecord, ParamType, PrefixTracker};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// One `name[=value]` token of a cookie string, anchored at the start.
///
/// Character classes are ASCII-only, so a non-ASCII name ends the scan.
static COOKIE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^[[:space:]]*(?P<key>[[:alnum:]_!#%&'~`><@,:/$*+\-.^|)(?}{=]+?)"#,
        r#"(?:[[:space:]]*=[[:space:]]*(?P<val>"(?:[^\\"]|\\.)*""#,
        r#"|[[:alnum:]_]{3},[[:space:]][[:alnum:]_[:space:]\-]{9,11}[[:space:]][0-9:]{8}[[:space:]][[:alnum:]_]{3}"#,
        r#"|[[:alnum:]_!#%&'~`><@,:/$*+\-.^|)(?}{=\[\]]*))?"#,
        r#"[[:space:]]*(?:[[:space:]]+|;|$)"#,
    ))
    .unwrap()
});

/// Punctuation allowed in a cookie name besides ASCII letters and digits.
const LEGAL_KEY_PUNCTUATION: &str = "!#$%&'*+-.^_`|~:";

/// Cookie attributes that never name a cookie.
const RESERVED_ATTRIBUTES: &[&str] = &[
    "expires", "path", "comment", "domain", "max-age", "secure", "httponly", "version",
    "samesite", "partitioned",
];

/// Attributes allowed without a value.
const FLAG_ATTRIBUTES: &[&str] = &["secure", "httponly", "partitioned"];

/// Parse a `Cookie` header into `(name, value)` pairs, raw values unquoted.
///
/// Repeated names keep their first position and last value. Any invalid
/// token rejects the whole header.
pub fn parse_cookie_jar(header: &str) -> Result<Vec<(String, String)>> {
    let mut jar: Vec<(String, String)> = Vec::new();
    let mut seen_cookie = false;
    let mut rest = header;

    while !rest.is_empty() {
        let Some(caps) = COOKIE_TOKEN_RE.captures(rest) else {
            break;
        };
        let matched = caps.get(0).map(|m| m.end()).unwrap_or(rest.len());
        let key = caps.name("key").map(|m| m.as_str()).unwrap_or("");
        let value = caps.name("val").map(|m| m.as_str());
        rest = &rest[matched..];

        if let Some(attribute) = key.strip_prefix('$') {
            if seen_cookie && !RESERVED_ATTRIBUTES.contains(&attribute.to_lowercase().as_str()) {
                return Err(Error::MalformedBody(format!(
                    "invalid cookie attribute {key:?}"
                )));
            }
            continue;
        }

        let lower = key.to_lowercase();
        if RESERVED_ATTRIBUTES.contains(&lower.as_str()) {
            if !seen_cookie {
                return Err(Error::MalformedBody(format!(
                    "cookie attribute {key:?} before any cookie"
                )));
            }
            if value.is_none() && !FLAG_ATTRIBUTES.contains(&lower.as_str()) {
                return Err(Error::MalformedBody(format!(
                    "cookie attribute {key:?} needs a value"
                )));
            }
            continue;
        }

        let Some(value) = value else {
            return Err(Error::MalformedBody(format!("cookie {key:?} has no value")));
        };
        if !is_legal_key(key) {
            return Err(Error::MalformedBody(format!("illegal cookie name {key:?}")));
        }
        seen_cookie = true;

        let value = unquote_cookie(value);
        match jar.iter_mut().find(|(name, _)| name == key) {
            Some(entry) => entry.1 = value,
            None => jar.push((key.to_string(), value)),
        }
    }

    Ok(jar)
}

fn is_legal_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LEGAL_KEY_PUNCTUATION.contains(c))
}

/// Cookie records of a `Cookie` header. Malformed headers yield nothing.
pub fn parse_cookies(header: &str) -> Vec<ParamRecord> {
    let jar = match parse_cookie_jar(header) {
        Ok(jar) => jar,
        Err(e) => {
            debug!("ignoring cookie header: {e}");
            return Vec::new();
        }
    };

    let mut prefixes = PrefixTracker::default();
    jar.into_iter()
        .map(|(name, value)| {
            let name = name.trim().to_string();
            let prefix = prefixes.observe(&name);
            let value = unquote_plus(&value).trim().to_string();
            ParamRecord::new(name, value, ParamType::UrlEncoded, ParamLocation::Cookie, prefix)
        })
        .collect()
}

/// Names of the cookies in a `Cookie` header.
pub fn cookie_names(header: &str) -> Vec<String> {
    parse_cookie_jar(header)
        .map(|jar| jar.into_iter().map(|(name, _)| name).collect())
        .unwrap_or_default()
}

/// Cookie names set by a list of `Set-Cookie` values.
pub fn set_cookie_names(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.split('=').next().unwrap_or("").trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Strip surrounding quotes and resolve `\"`, `\\` and `\ooo` escapes.
fn unquote_cookie(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };

    let bytes = inner.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let octal = bytes
            .get(i + 1..i + 4)
            .filter(|d| d.iter().all(|b| (b'0'..=b'7').contains(b)))
            .and_then(|d| u8::from_str_radix(std::str::from_utf8(d).ok()?, 8).ok());
        match octal {
            Some(byte) => {
                out.push(byte);
                i += 4;
            }
            None => {
                out.push(bytes[i + 1]);
                i += 2;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
