//! Error kinds for the download pipeline.
//!
//! Fatal kinds abort a run. Per-invoice fetch failures are not errors at this
//! level; they end up as [`crate::types::FailedDownload`] records.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing Coupa credentials: {} not set (check your .env file)", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to connect to Coupa: token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to connect to Coupa: {0}")]
    Transport(String),
    #[error("failed to connect to Coupa: unreadable token response: {0}")]
    InvalidResponse(String),
    #[error("failed to connect to Coupa: could not build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("not a valid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("not a valid CSV: file is not UTF-8 text")]
    Encoding,
    #[error("not a valid CSV: no header row")]
    Empty,
    #[error("not a valid CSV: line {line} has {found} fields, expected {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// Transport-level failure for a single request (connect, timeout, DNS, body read).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FetchError(pub String);

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_connect() {
            format!("connection failed: {}", e)
        } else if e.is_timeout() {
            format!("request timed out: {}", e)
        } else {
            e.to_string()
        };
        FetchError(message)
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("zip write error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write CSV report: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not write Excel report: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("unsupported report format `{0}` (use .csv or .xlsx)")]
    UnsupportedFormat(String),
    #[error("could not locate a Downloads or Desktop folder")]
    NoDownloadDir,
}

/// Errors that stop a run before or during the fetch stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("'Invoice ID' column not found, cannot fetch PDFs")]
    ColumnMissing,
    #[error("no Coupa access token for this session, connect first")]
    NotConnected,
    #[error("invoice id `{0}` has no matching row")]
    Inconsistent(String),
}

/// Top-level error for the command-line front end.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to read input file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not open {path}: {reason}")]
    Open { path: PathBuf, reason: String },
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Pipeline(e.into())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Pipeline(e.into())
    }
}

impl From<ParseError> for AppError {
    fn from(e: ParseError) -> Self {
        AppError::Pipeline(e.into())
    }
}
