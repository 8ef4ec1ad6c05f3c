//! Error handling for the tracing layer.

use std::fmt::{self, Display};
use std::io;
use std::num;

use backtrace::Backtrace;
use serde::ser::{Serialize, SerializeMap, Serializer};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use thiserror::Error;

/// Tracing error, carrying the backtrace captured where the source error
/// was converted.
#[derive(Debug)]
pub struct TraceError {
    pub kind: TraceErrorKind,
    pub backtrace: Box<Backtrace>,
}

// Print out the error and backtrace, including source errors
impl Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}\nBacktrace: \n{:?}", self.kind, self.backtrace)?;

        // Go down the chain of errors
        let mut error: &dyn std::error::Error = &self.kind;
        while let Some(source) = error.source() {
            write!(f, "\n\nCaused by: {source}")?;
            error = source;
        }

        Ok(())
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

// Forward From impls to TraceError from TraceErrorKind. Because From is
// reflexive, this impl also takes care of From<TraceErrorKind>.
impl<T> From<T> for TraceError
where
    TraceErrorKind: From<T>,
{
    fn from(item: T) -> Self {
        TraceError {
            kind: TraceErrorKind::from(item),
            backtrace: Box::new(Backtrace::new()),
        }
    }
}

/// Return a structured response error for the TraceError
impl ResponseError for TraceError {
    fn status_code(&self) -> StatusCode {
        self.kind.status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.kind.status()).json(self)
    }
}

impl Serialize for TraceError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let status = self.kind.status();
        let mut map = serializer.serialize_map(Some(3))?;

        map.serialize_entry("code", &status.as_u16())?;
        map.serialize_entry("error", &status.canonical_reason())?;
        map.serialize_entry("message", &self.kind.to_string())?;
        map.end()
    }
}

#[derive(Error, Debug)]
pub enum TraceErrorKind {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    MetricError(#[from] cadence::MetricError),
    #[error(transparent)]
    ParseIntError(#[from] num::ParseIntError),
    #[error(transparent)]
    ParseUrlError(#[from] url::ParseError),
    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error("Collector rejected spans: {0}")]
    CollectorError(String),
    #[error("Invalid trace or span id: {0}")]
    InvalidId(String),
    #[error("No active span in the request scope")]
    NoActiveSpan,

    #[error("General Error: {0}")]
    GeneralError(String),
}

impl TraceErrorKind {
    /// Get the associated HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json(_) | Self::ParseIntError(_) | Self::ParseUrlError(_) | Self::InvalidId(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
