//! Corpus aggregation: many exports in, deduplicated category sets out.
//!
//! Failures stay local. A bad record is logged and skipped, a bad file is
//! logged and abandoned, and whatever was gathered before either failure
//! is kept.

use crate::codec::{self, DecodedMessage};
use crate::cookies;
use crate::error::{Error, Result};
use crate::filter::accept;
use crate::params::{self, ParamLocation};
use crate::transcript::{BurpXmlReader, RawTranscriptRecord};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Output categories, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    RequestPaths,
    RequestBaseNames,
    FileNames,
    FileNamesNoExtension,
    PostParams,
    QueryParams,
    RequestParams,
    Cookies,
    Headers,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::RequestPaths,
        Category::RequestBaseNames,
        Category::FileNames,
        Category::FileNamesNoExtension,
        Category::PostParams,
        Category::QueryParams,
        Category::RequestParams,
        Category::Cookies,
        Category::Headers,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::RequestPaths => "request paths",
            Category::RequestBaseNames => "request base names",
            Category::FileNames => "file names",
            Category::FileNamesNoExtension => "file names (no extension)",
            Category::PostParams => "post params",
            Category::QueryParams => "query params",
            Category::RequestParams => "request params",
            Category::Cookies => "cookies",
            Category::Headers => "headers",
        }
    }
}

/// Accumulated wordlist sets. Entries are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusSets {
    pub request_paths: BTreeSet<String>,
    pub filenames: BTreeSet<String>,
    pub post_params: BTreeSet<String>,
    pub query_params: BTreeSet<String>,
    pub cookies: BTreeSet<String>,
    pub headers: BTreeSet<String>,
}

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Processed,
    /// POST body could not be parsed; everything else was collected.
    BodyFailed,
    /// No status, so the capture never finished.
    Incomplete,
    /// Request could not be decoded; only the path was collected.
    Malformed,
}

impl CorpusSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union another set collection into this one.
    pub fn merge(&mut self, other: CorpusSets) {
        self.request_paths.extend(other.request_paths);
        self.filenames.extend(other.filenames);
        self.post_params.extend(other.post_params);
        self.query_params.extend(other.query_params);
        self.cookies.extend(other.cookies);
        self.headers.extend(other.headers);
    }

    pub fn is_empty(&self) -> bool {
        self.request_paths.is_empty()
            && self.filenames.is_empty()
            && self.post_params.is_empty()
            && self.query_params.is_empty()
            && self.cookies.is_empty()
            && self.headers.is_empty()
    }

    /// Last segment of every request path. Paths ending in `/` give `""`.
    pub fn request_base_names(&self) -> BTreeSet<String> {
        self.request_paths
            .iter()
            .map(|path| codec::base_name(path))
            .map(str::to_string)
            .collect()
    }

    /// File names cut at their first dot. Dotfiles give `""`.
    pub fn filenames_without_extension(&self) -> BTreeSet<String> {
        self.filenames
            .iter()
            .filter_map(|name| name.split('.').next())
            .map(str::to_string)
            .collect()
    }

    /// Post and query parameter names together.
    pub fn request_params(&self) -> BTreeSet<String> {
        self.post_params.union(&self.query_params).cloned().collect()
    }

    /// The finished set for one output category.
    pub fn category(&self, category: Category) -> BTreeSet<String> {
        match category {
            Category::RequestPaths => self.request_paths.clone(),
            Category::RequestBaseNames => self.request_base_names(),
            Category::FileNames => self.filenames.clone(),
            Category::FileNamesNoExtension => self.filenames_without_extension(),
            Category::PostParams => self.post_params.clone(),
            Category::QueryParams => self.query_params.clone(),
            Category::RequestParams => self.request_params(),
            Category::Cookies => self.cookies.clone(),
            Category::Headers => self.headers.clone(),
        }
    }

    /// Feed one captured transaction through decode, extract and filter.
    pub fn process_record(&mut self, record: &RawTranscriptRecord) -> RecordOutcome {
        if !record.is_complete() {
            return RecordOutcome::Incomplete;
        }

        let path = codec::request_path(&record.path);
        if let Some(filename) = codec::maybe_filename(&path) {
            self.filenames.insert(filename.to_string());
        }
        self.request_paths.insert(path.clone());

        let request = match decode_request(record) {
            Ok(request) => request,
            Err(e) => {
                warn!("skipping request for {path}: {e}");
                return RecordOutcome::Malformed;
            }
        };
        self.headers
            .extend(request.headers.names().map(str::to_string));

        let mut outcome = RecordOutcome::Processed;
        if record.method == "POST" {
            if let Some(content_type) = request.headers.first("content-type") {
                match codec::dispatch_body(content_type, &request.body) {
                    Ok(records) => {
                        for param in &records {
                            accept(&param.name, &mut self.post_params);
                        }
                    }
                    Err(e) => {
                        warn!("error loading params for {path}: {e}");
                        outcome = RecordOutcome::BodyFailed;
                    }
                }
            }
        }

        if let Some((_, rest)) = record.path.split_once('?') {
            let query = rest.split('?').next().unwrap_or("");
            for param in params::parse_urlencoded(query, ParamLocation::Get) {
                accept(&param.name, &mut self.query_params);
            }
        }

        for header in request.headers.get_all("cookie") {
            for param in cookies::parse_cookies(header) {
                accept(&param.name, &mut self.cookies);
            }
        }

        if let Some(response) = record.response.as_ref().filter(|blob| !blob.is_empty()) {
            match response.decode_message() {
                Ok(message) => self
                    .headers
                    .extend(message.headers.names().map(str::to_string)),
                Err(e) => warn!("skipping response headers for {path}: {e}"),
            }
        }

        outcome
    }
}

fn decode_request(record: &RawTranscriptRecord) -> Result<DecodedMessage> {
    match record.request.as_ref() {
        Some(blob) if !blob.is_empty() => blob.decode_message(),
        _ => Err(Error::MalformedMessage),
    }
}

/// Per-file processing statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    /// Items read from the file, complete or not.
    pub records: usize,
    pub incomplete: usize,
    pub malformed: usize,
    pub body_errors: usize,
    /// False when the file could not be read to the end.
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            completed: true,
            ..Self::default()
        }
    }

    fn count(&mut self, outcome: RecordOutcome) {
        self.records += 1;
        match outcome {
            RecordOutcome::Processed => {}
            RecordOutcome::BodyFailed => self.body_errors += 1,
            RecordOutcome::Incomplete => self.incomplete += 1,
            RecordOutcome::Malformed => self.malformed += 1,
        }
    }

    fn abandon(&mut self, err: &Error) {
        self.completed = false;
        self.error = Some(err.to_string());
    }
}

/// Statistics for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusReport {
    pub files: Vec<FileReport>,
}

impl CorpusReport {
    pub fn total_records(&self) -> usize {
        self.files.iter().map(|f| f.records).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.files.iter().map(|f| f.incomplete + f.malformed).sum()
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.completed)
    }
}

/// Result of processing a set of input files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusRun {
    pub sets: CorpusSets,
    pub report: CorpusReport,
}

/// Drain a record source into `sets`, stopping at the first source error.
pub fn process_records<I>(records: I, source: &Path, sets: &mut CorpusSets) -> FileReport
where
    I: IntoIterator<Item = Result<RawTranscriptRecord>>,
{
    let mut report = FileReport::new(source);

    for next in records {
        match next {
            Ok(record) => report.count(sets.process_record(&record)),
            Err(e) => {
                warn!(
                    "error while parsing {}, might be incomplete: {e}",
                    source.display()
                );
                report.abandon(&e);
                break;
            }
        }
    }

    report
}

/// Process one Burp XML export into `sets`.
pub fn process_file(path: &Path, sets: &mut CorpusSets) -> FileReport {
    let reader = match BurpXmlReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("cannot open {}: {e}", path.display());
            let mut report = FileReport::new(path);
            report.abandon(&e);
            return report;
        }
    };

    let report = process_records(reader, path, sets);
    info!(
        "processed {}: {} records ({} incomplete, {} malformed)",
        path.display(),
        report.records,
        report.incomplete,
        report.malformed
    );
    report
}

/// Process every input file, optionally one rayon task per file.
///
/// Per-file sets are merged by union, so both modes give the same sets.
pub fn process_files(paths: &[PathBuf], parallel: bool) -> CorpusRun {
    let mut run = CorpusRun::default();

    if parallel {
        let per_file: Vec<(CorpusSets, FileReport)> = paths
            .par_iter()
            .map(|path| {
                let mut sets = CorpusSets::new();
                let report = process_file(path, &mut sets);
                (sets, report)
            })
            .collect();
        for (sets, report) in per_file {
            run.sets.merge(sets);
            run.report.files.push(report);
        }
    } else {
        for path in paths {
            let report = process_file(path, &mut run.sets);
            run.report.files.push(report);
        }
    }

    run
}
