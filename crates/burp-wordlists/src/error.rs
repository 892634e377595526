use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed message: no header/body separator")]
    MalformedMessage,

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Malformed body: {0}")]
    MalformedBody(String),

    #[error("Corpus parse error in {file}: {reason}")]
    CorpusParse { file: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(format!("base64: {err}"))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::Decode(format!("utf-8: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedBody(format!("json: {err}"))
    }
}
