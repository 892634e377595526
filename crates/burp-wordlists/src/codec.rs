//! Raw HTTP message decoding.
//!
//! Turns a (usually base64-wrapped) request or response capture into a
//! header multimap plus body, and routes bodies to the matching parameter
//! extractor by content type.

use crate::error::{Error, Result};
use crate::multipart;
use crate::params::{self, ParamLocation, ParamRecord};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Separator between the header block and the body.
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Header names mapped to every value seen, in message order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: HashMap<String, Vec<String>>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value; the name is lower-cased.
    pub fn append(&mut self, name: &str, value: &str) {
        self.entries
            .entry(name.to_lowercase())
            .or_default()
            .push(value.to_string());
    }

    /// All values for a header, oldest first. Empty if absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First value for a header.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.get_all(name).is_empty()
    }

    /// Lower-cased header names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A decoded HTTP message.
#[derive(Debug, Clone, Default)]
pub struct DecodedMessage {
    pub headers: HeaderMap,
    /// Bytes after the blank line.
    pub body: Vec<u8>,
}

/// Decode a captured message into headers and body.
///
/// When `already_decoded` is false the blob is base64 text; ASCII
/// whitespace inside it is ignored. The start-line is discarded.
pub fn decode_message(blob: &[u8], already_decoded: bool) -> Result<DecodedMessage> {
    let raw = unwrap_blob(blob, already_decoded)?;
    let split = find_separator(&raw).ok_or(Error::MalformedMessage)?;

    let header_block = std::str::from_utf8(&raw[..split])?;
    let mut headers = HeaderMap::new();
    for line in header_block.split("\r\n").skip(1) {
        match line.split_once(": ") {
            Some((name, value)) => headers.append(name, value),
            None => debug!("skipping header line without separator: {line:?}"),
        }
    }

    Ok(DecodedMessage {
        headers,
        body: raw[split + HEADER_END.len()..].to_vec(),
    })
}

/// Body of a captured message, starting at (and including) the blank line.
pub fn extract_body(blob: &[u8], already_decoded: bool) -> Result<Vec<u8>> {
    let raw = unwrap_blob(blob, already_decoded)?;
    let split = find_separator(&raw).ok_or(Error::MalformedMessage)?;
    Ok(raw[split..].to_vec())
}

/// Body decoders known to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Multipart,
    UrlEncoded,
    Json,
}

/// Pick a body decoder by substring match, multipart first.
pub fn classify_content_type(content_type: &str) -> Result<BodyKind> {
    if content_type.contains("multipart/form-data") {
        Ok(BodyKind::Multipart)
    } else if content_type.contains("application/x-www-form-urlencoded") {
        Ok(BodyKind::UrlEncoded)
    } else if content_type.contains("application/json") {
        Ok(BodyKind::Json)
    } else {
        Err(Error::UnsupportedContentType(content_type.to_string()))
    }
}

/// Extract POST parameters from a request body.
///
/// Unknown content types produce no records. The body may still carry the
/// leading blank line returned by [`extract_body`].
pub fn dispatch_body(content_type: &str, body: &[u8]) -> Result<Vec<ParamRecord>> {
    let kind = match classify_content_type(content_type) {
        Ok(kind) => kind,
        Err(Error::UnsupportedContentType(ct)) => {
            debug!("no body decoder for content type {ct:?}");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    match kind {
        BodyKind::Multipart => Ok(multipart::parse_multipart(content_type, body)),
        BodyKind::UrlEncoded => Ok(params::parse_urlencoded_bytes(body, ParamLocation::Post)),
        BodyKind::Json => params::parse_json_request(body),
    }
}

/// Normalize a request path: exactly one leading slash, no query string.
pub fn request_path(raw_path: &str) -> String {
    let path = raw_path.trim_start_matches('/');
    let path = path.split('?').next().unwrap_or("");
    format!("/{path}")
}

/// Last path segment, if it looks like a file name.
pub fn maybe_filename(path: &str) -> Option<&str> {
    let name = base_name(path);
    name.contains('.').then_some(name)
}

/// Text after the last `/`.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Media type part of a Content-Type value.
pub fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

/// Header names listed in a Vary value, lower-cased and deduplicated.
pub fn vary_names(vary: &str) -> BTreeSet<String> {
    vary.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

fn unwrap_blob(blob: &[u8], already_decoded: bool) -> Result<Vec<u8>> {
    if already_decoded {
        return Ok(blob.to_vec());
    }
    let compact: Vec<u8> = blob
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(compact)?)
}

fn find_separator(raw: &[u8]) -> Option<usize> {
    raw.windows(HEADER_END.len()).position(|w| w == HEADER_END)
}
