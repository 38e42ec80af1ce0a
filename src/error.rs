use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvalidFenError {
    #[error("Invalid fen: {0}")]
    Parse(#[from] shakmaty::fen::ParseFenError),
    #[error("Invalid position: {0}")]
    Position(String),
    #[error("Invalid fen: missing {0}")]
    MissingField(&'static str),
    #[error("Invalid fen: bad {field} '{value}'")]
    BadField { field: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Could not start engine {path}: {source}")]
    Spawn { path: PathBuf, source: io::Error },
    #[error("Engine pipe failed: {0}")]
    Io(#[from] io::Error),
    #[error("Engine did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Engine closed its output")]
    Closed,
    #[error("Unexpected engine reply: {0}")]
    UnexpectedReply(String),
}

/// Everything a request against the board can fail with.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    InvalidPosition(#[from] InvalidFenError),
    #[error("{0}")]
    MalformedMove(String),
    #[error("Illegal Move: {0}")]
    IllegalMove(String),
    #[error("Search engine unavailable: {0}")]
    SearchEngineUnavailable(#[from] EngineError),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Method not Supported")]
    UnsupportedMethod,
    #[error("Not Found")]
    NotFound,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No engine binary named {name} in {dirs:?}")]
    EngineNotFound { name: String, dirs: Vec<PathBuf> },
    #[error("Engine path {0} is not a file")]
    NotAFile(PathBuf),
    #[error("Invalid cors origin: {0}")]
    CorsOrigin(String),
    #[error("Unknown log level: {0}")]
    LogLevel(String),
    #[error("Could not open log file: {0}")]
    LogFile(#[from] io::Error),
    #[error("Logger already set: {0}")]
    Logger(#[from] log::SetLoggerError),
}
