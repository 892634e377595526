//! burp-wordlists: turn recorded HTTP history into seed wordlists.
//!
//! Reads Burp Suite XML exports, decodes every captured request and
//! response, and collects request paths, file names, parameter names,
//! cookie names and header names into deduplicated sets.
//!
//! ```no_run
//! use burp_wordlists::corpus::{process_files, Category};
//! use std::path::PathBuf;
//!
//! let run = process_files(&[PathBuf::from("history.xml")], false);
//! for name in run.sets.category(Category::PostParams) {
//!     println!("{name}");
//! }
//! ```

pub mod codec;
pub mod cookies;
pub mod corpus;
pub mod error;
pub mod filter;
pub mod multipart;
pub mod params;
pub mod transcript;

pub use codec::{decode_message, dispatch_body, extract_body, DecodedMessage, HeaderMap};
pub use corpus::{process_file, process_files, Category, CorpusReport, CorpusRun, CorpusSets};
pub use error::{Error, Result};
pub use filter::{accept, is_noise, prefix_of, simplify};
pub use params::{JsonKind, ParamLocation, ParamRecord, ParamType};
pub use transcript::{BurpXmlReader, EncodedBlob, RawTranscriptRecord};
