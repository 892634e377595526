//! Streaming reader for Burp Suite "save items" XML exports.
//!
//! Yields one [`RawTranscriptRecord`] per `<item>` element without loading
//! the whole export into memory. A structural problem ends the stream with
//! a single error; everything yielded before it stays valid.

use crate::codec::{self, DecodedMessage};
use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A request or response capture as stored in the export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBlob {
    pub data: String,
    /// Whether `data` is base64 text.
    pub base64: bool,
}

impl EncodedBlob {
    pub fn is_empty(&self) -> bool {
        self.data.trim().is_empty()
    }

    /// Decode into headers and body.
    pub fn decode_message(&self) -> Result<DecodedMessage> {
        codec::decode_message(self.data.as_bytes(), !self.base64)
    }
}

/// One captured HTTP transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTranscriptRecord {
    pub method: String,
    /// Request path, possibly with a query string.
    pub path: String,
    /// `None` when the capture never completed.
    pub status: Option<String>,
    pub request: Option<EncodedBlob>,
    pub response: Option<EncodedBlob>,
    pub url: Option<String>,
    pub host: Option<String>,
}

impl RawTranscriptRecord {
    pub fn is_complete(&self) -> bool {
        self.status.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Status,
    Path,
    Method,
    Request,
    Response,
    Url,
    Host,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"status" => Some(Field::Status),
            b"path" => Some(Field::Path),
            b"method" => Some(Field::Method),
            b"request" => Some(Field::Request),
            b"response" => Some(Field::Response),
            b"url" => Some(Field::Url),
            b"host" => Some(Field::Host),
            _ => None,
        }
    }

    /// Whether the blob is base64 when the export does not say.
    fn default_base64(&self) -> bool {
        matches!(self, Field::Request)
    }
}

/// Pull parser over a Burp XML export.
pub struct BurpXmlReader<R: BufRead> {
    reader: Reader<R>,
    source: PathBuf,
    buf: Vec<u8>,
    depth: usize,
    finished: bool,
}

impl BurpXmlReader<BufReader<File>> {
    /// Open an export file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file), path))
    }
}

impl<R: BufRead> BurpXmlReader<R> {
    /// Wrap any buffered reader; `source` names it in errors.
    pub fn from_reader(inner: R, source: impl Into<PathBuf>) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            source: source.into(),
            buf: Vec::new(),
            depth: 0,
            finished: false,
        }
    }

    fn fail(&mut self, reason: String) -> Option<Result<RawTranscriptRecord>> {
        self.finished = true;
        Some(Err(Error::CorpusParse {
            file: self.source.clone(),
            reason,
        }))
    }

    fn next_item(&mut self) -> Option<Result<RawTranscriptRecord>> {
        let mut item: Option<RawTranscriptRecord> = None;
        let mut field: Option<Field> = None;
        let mut text = String::new();
        let mut base64 = false;

        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_event_into(&mut self.buf)
                .map(|event| event.into_owned());
            let event = match read {
                Ok(event) => event,
                Err(e) => {
                    let pos = self.reader.buffer_position();
                    return self.fail(format!("{e} at byte {pos}"));
                }
            };

            match event {
                Event::Start(ref e) => {
                    self.depth += 1;
                    let tag = e.name();
                    if tag.as_ref() == b"item" {
                        item = Some(RawTranscriptRecord::default());
                    } else if item.is_some() {
                        field = Field::from_tag(tag.as_ref());
                        if let Some(f) = field {
                            base64 = base64_attr(e).unwrap_or_else(|| f.default_base64());
                        }
                        text.clear();
                    }
                }
                Event::Text(ref e) => {
                    if field.is_some() {
                        match e.unescape() {
                            Ok(s) => text.push_str(&s),
                            Err(_) => text.push_str(&String::from_utf8_lossy(e)),
                        }
                    }
                }
                Event::CData(ref e) => {
                    if field.is_some() {
                        text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Event::End(ref e) => {
                    self.depth = self.depth.saturating_sub(1);
                    let tag = e.name();
                    if tag.as_ref() == b"item" {
                        if let Some(record) = item.take() {
                            return Some(Ok(record));
                        }
                    } else if let (Some(f), Some(record)) = (field.take(), item.as_mut()) {
                        store_field(record, f, std::mem::take(&mut text), base64);
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    if self.depth > 0 {
                        let reason = format!(
                            "unexpected end of file inside {} open element(s)",
                            self.depth
                        );
                        return self.fail(reason);
                    }
                    return None;
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for BurpXmlReader<R> {
    type Item = Result<RawTranscriptRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.next_item()
    }
}

fn base64_attr(e: &BytesStart<'_>) -> Option<bool> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"base64")
        .map(|attr| attr.value.as_ref().eq_ignore_ascii_case(b"true"))
}

fn store_field(record: &mut RawTranscriptRecord, field: Field, text: String, base64: bool) {
    let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };
    match field {
        Field::Status => record.status = non_empty(text),
        Field::Path => record.path = text,
        Field::Method => record.method = text,
        Field::Request => record.request = Some(EncodedBlob { data: text, base64 }),
        Field::Response => record.response = Some(EncodedBlob { data: text, base64 }),
        Field::Url => record.url = non_empty(text),
        Field::Host => record.host = non_empty(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"<?xml version="1.0"?>
<!DOCTYPE items [
<!ELEMENT items (item*)>
]>
<items burpVersion="2023.1" exportTime="Mon Jan 01 00:00:00 UTC 2024">
  <item>
    <time>Mon Jan 01 00:00:00 UTC 2024</time>
    <url><![CDATA[https://example.com/login.php?next=%2F]]></url>
    <host ip="93.184.216.34">example.com</host>
    <method><![CDATA[GET]]></method>
    <path><![CDATA[/login.php?next=%2F]]></path>
    <request base64="true"><![CDATA[R0VUIC8gSFRUUC8xLjENCkhvc3Q6IGV4YW1wbGUuY29tDQoNCg==]]></request>
    <status>200</status>
    <response base64="false"><![CDATA[HTTP/1.1 200 OK]]></response>
  </item>
  <item>
    <method><![CDATA[GET]]></method>
    <path><![CDATA[/pending]]></path>
    <request base64="true"><![CDATA[]]></request>
    <status></status>
    <response></response>
  </item>
</items>"#;

    #[test]
    fn test_reads_items_in_order() {
        let records: Vec<_> = BurpXmlReader::from_reader(EXPORT.as_bytes(), "mem.xml")
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.method, "GET");
        assert_eq!(first.path, "/login.php?next=%2F");
        assert_eq!(first.status.as_deref(), Some("200"));
        assert_eq!(first.host.as_deref(), Some("example.com"));
        assert!(first.request.as_ref().unwrap().base64);
        assert!(!first.response.as_ref().unwrap().base64);
        assert!(first.is_complete());

        let headers = first.request.as_ref().unwrap().decode_message().unwrap().headers;
        assert_eq!(headers.first("host"), Some("example.com"));

        assert!(!records[1].is_complete());
        assert!(records[1].request.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_missing_base64_attribute_defaults() {
        let xml = "<items><item><status>200</status><request>AAAA</request><response>HTTP/1.1 200 OK</response></item></items>";
        let record = BurpXmlReader::from_reader(xml.as_bytes(), "mem.xml")
            .next()
            .unwrap()
            .unwrap();
        assert!(record.request.unwrap().base64);
        assert!(!record.response.unwrap().base64);
    }

    #[test]
    fn test_truncated_export_yields_prefix_then_error() {
        let cut = EXPORT.find("<path><![CDATA[/pending").unwrap();
        let mut reader = BurpXmlReader::from_reader(EXPORT[..cut].as_bytes(), "cut.xml");

        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(Error::CorpusParse { file, .. })) => assert_eq!(file, PathBuf::from("cut.xml")),
            other => panic!("expected corpus error, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_mismatched_tags_are_errors() {
        let xml = "<items><item><status>200</state></item></items>";
        let results: Vec<_> = BurpXmlReader::from_reader(xml.as_bytes(), "bad.xml").collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_empty_export() {
        let mut reader = BurpXmlReader::from_reader("<items></items>".as_bytes(), "e.xml");
        assert!(reader.next().is_none());
    }
}
