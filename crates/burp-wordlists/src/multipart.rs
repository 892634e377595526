//! `multipart/form-data` body parsing.
//!
//! Lenient by necessity: captured bodies are often truncated by the proxy,
//! so every complete part seen before the damage is still reported.

use crate::params::{
    unquote_plus, ParamLocation, ParamRecord, ParamType, PrefixTracker, BINARY_FILE_VALUE,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// One part of a multipart body.
#[derive(Debug, Clone, Default)]
struct Part<'a> {
    disposition: Option<String>,
    transfer_encoding: Option<String>,
    payload: &'a [u8],
}

/// Extract form fields from a multipart body.
///
/// File parts are reported with a placeholder value. Parts whose payload
/// is not UTF-8 are skipped. A missing boundary yields nothing.
pub fn parse_multipart(content_type: &str, body: &[u8]) -> Vec<ParamRecord> {
    let Some(boundary) = boundary_of(content_type) else {
        debug!("multipart content type without boundary: {content_type:?}");
        return Vec::new();
    };

    let mut prefixes = PrefixTracker::default();
    let mut records = Vec::new();

    for part in split_parts(body, &boundary) {
        let Some(disposition) = part.disposition.as_deref() else {
            continue;
        };
        let params = header_params(disposition);
        let Some(name) = param_value(&params, "name") else {
            continue;
        };

        let value = if param_value(&params, "filename").is_some() {
            BINARY_FILE_VALUE.to_string()
        } else {
            let payload = decode_payload(part.payload, part.transfer_encoding.as_deref());
            match String::from_utf8(payload) {
                Ok(text) => unquote_plus(&text).trim().to_string(),
                Err(e) => {
                    debug!("skipping multipart field {name:?}: {e}");
                    continue;
                }
            }
        };

        let name = name.trim().to_string();
        let prefix = prefixes.observe(&name);
        records.push(ParamRecord::new(
            name,
            value,
            ParamType::FormData,
            ParamLocation::Post,
            prefix,
        ));
    }

    records
}

/// The `boundary` parameter of a Content-Type value.
pub fn boundary_of(content_type: &str) -> Option<String> {
    let params = header_params(content_type);
    param_value(&params, "boundary").filter(|b| !b.is_empty())
}

/// Split a header value like `form-data; name="a"; filename="b"` into
/// lower-cased parameter names and unquoted values. The leading token is
/// skipped. RFC 2231 `name*=charset''value` parameters are decoded.
pub fn header_params(value: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();

    for segment in split_unquoted(value, ';').into_iter().skip(1) {
        let Some((key, raw)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let raw = raw.trim();

        if let Some(key) = key.strip_suffix('*') {
            let encoded = raw.splitn(3, '\'').last().unwrap_or(raw);
            let decoded = urlencoding::decode_binary(unquote(encoded).as_bytes()).into_owned();
            params.push((key.to_string(), String::from_utf8_lossy(&decoded).into_owned()));
        } else {
            params.push((key, unquote(raw)));
        }
    }

    params
}

fn param_value(params: &[(String, String)], key: &str) -> Option<String> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                pieces.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&value[start..]);
    pieces
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<Part<'a>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    // a delimiter only counts at the start of a line
    let starts: Vec<usize> = find_all(body, delimiter)
        .into_iter()
        .filter(|&pos| pos == 0 || body[pos - 1] == b'\n')
        .collect();

    let mut parts = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let after = start + delimiter.len();
        if body[after..].starts_with(b"--") {
            break;
        }
        let end = starts.get(i + 1).copied().unwrap_or(body.len());

        // skip the rest of the delimiter line
        let segment = &body[after..end];
        let Some(line_end) = segment.iter().position(|&b| b == b'\n') else {
            continue;
        };
        let mut content = &segment[line_end + 1..];
        if starts.get(i + 1).is_some() {
            content = strip_line_break(content);
        }

        parts.push(parse_part(content));
    }
    parts
}

fn parse_part(content: &[u8]) -> Part<'_> {
    let (header_bytes, payload) = match find(content, b"\r\n\r\n") {
        Some(pos) => (&content[..pos], &content[pos + 4..]),
        None => match find(content, b"\n\n") {
            Some(pos) => (&content[..pos], &content[pos + 2..]),
            None => (content, &content[content.len()..]),
        },
    };

    let mut part = Part {
        payload,
        ..Part::default()
    };
    let headers = String::from_utf8_lossy(header_bytes);
    for line in headers.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name.trim().to_lowercase().as_str() {
            "content-disposition" => part.disposition = Some(value.trim().to_string()),
            "content-transfer-encoding" => {
                part.transfer_encoding = Some(value.trim().to_lowercase())
            }
            _ => {}
        }
    }
    part
}

fn decode_payload(payload: &[u8], transfer_encoding: Option<&str>) -> Vec<u8> {
    match transfer_encoding {
        Some("base64") => {
            let compact: Vec<u8> = payload
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            STANDARD.decode(compact).unwrap_or_else(|_| payload.to_vec())
        }
        Some("quoted-printable") => decode_quoted_printable(payload),
        _ => payload.to_vec(),
    }
}

fn decode_quoted_printable(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut i = 0;
    while i < payload.len() {
        if payload[i] != b'=' {
            out.push(payload[i]);
            i += 1;
            continue;
        }
        let rest = &payload[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(byte) = rest
            .get(..2)
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(byte);
            i += 3;
        } else {
            out.push(b'=');
            i += 1;
        }
    }
    out
}

fn strip_line_break(content: &[u8]) -> &[u8] {
    content
        .strip_suffix(b"\r\n")
        .or_else(|| content.strip_suffix(b"\n"))
        .unwrap_or(content)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(pos) = find(&haystack[from..], needle) {
        positions.push(from + pos);
        from += pos + needle.len();
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT: &str = "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxk";

    fn body(parts: &[&str]) -> Vec<u8> {
        let mut out = String::from("\r\n\r\n");
        for part in parts {
            out.push_str("------WebKitFormBoundary7MA4YWxk\r\n");
            out.push_str(part);
            out.push_str("\r\n");
        }
        out.push_str("------WebKitFormBoundary7MA4YWxk--\r\n");
        out.into_bytes()
    }

    #[test]
    fn test_fields_and_files() {
        let body = body(&[
            "Content-Disposition: form-data; name=\"user_name\"\r\n\r\nbob smith",
            "Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\n\x01\x02",
            "Content-Disposition: form-data; name=\"user_note\"\r\n\r\nhi%21+there",
        ]);

        let records = parse_multipart(CT, &body);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["user_name", "avatar", "user_note"]);
        assert_eq!(records[0].value, "bob smith");
        assert_eq!(records[1].value, BINARY_FILE_VALUE);
        assert_eq!(records[2].value, "hi! there");
        assert_eq!(records[2].prefix.as_deref(), Some("user"));
        assert!(records.iter().all(|r| r.param_type == ParamType::FormData));
    }

    #[test]
    fn test_bad_utf8_part_is_skipped() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"------WebKitFormBoundary7MA4YWxk\r\n");
        raw.extend_from_slice(b"Content-Disposition: form-data; name=\"bin\"\r\n\r\n\xff\xfe\r\n");
        raw.extend_from_slice(b"------WebKitFormBoundary7MA4YWxk\r\n");
        raw.extend_from_slice(b"Content-Disposition: form-data; name=\"ok\"\r\n\r\nyes\r\n");
        raw.extend_from_slice(b"------WebKitFormBoundary7MA4YWxk--\r\n");

        let records = parse_multipart(CT, &raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ok");
    }

    #[test]
    fn test_truncated_body_keeps_earlier_parts() {
        let raw = b"------WebKitFormBoundary7MA4YWxk\r\nContent-Disposition: form-data; name=\"first\"\r\n\r\n1\r\n------WebKitFormBoundary7MA4YWxk\r\nContent-Disposition: form-data; name=\"second\"\r\n\r\npartial val";
        let records = parse_multipart(CT, raw);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(records[1].value, "partial val");
    }

    #[test]
    fn test_boundary_text_inside_a_value() {
        let body = body(&[
            "Content-Disposition: form-data; name=\"comment\"\r\n\r\nsee ------WebKitFormBoundary7MA4YWxk here",
            "Content-Disposition: form-data; name=\"after\"\r\n\r\nok",
        ]);

        let records = parse_multipart(CT, &body);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["comment", "after"]);
        assert_eq!(records[0].value, "see ------WebKitFormBoundary7MA4YWxk here");
    }

    #[test]
    fn test_missing_boundary_yields_nothing() {
        assert!(parse_multipart("multipart/form-data", b"--x\r\n\r\n").is_empty());
    }

    #[test]
    fn test_quoted_boundary_and_params() {
        assert_eq!(
            boundary_of("multipart/form-data; boundary=\"a;b\"").as_deref(),
            Some("a;b")
        );
        let params = header_params(r#"form-data; name="we\"ird"; filename*=UTF-8''na%C3%AFve.txt"#);
        assert_eq!(params[0], ("name".to_string(), "we\"ird".to_string()));
        assert_eq!(params[1], ("filename".to_string(), "naïve.txt".to_string()));
    }

    #[test]
    fn test_transfer_encodings() {
        assert_eq!(decode_payload(b"aGVsbG8=", Some("base64")), b"hello");
        assert_eq!(decode_payload(b"a=3Db=\r\nc", Some("quoted-printable")), b"a=bc");
        assert_eq!(decode_payload(b"raw", None), b"raw");
    }
}
