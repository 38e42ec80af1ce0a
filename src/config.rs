use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::engine::uci::EngineOptions;
use crate::engine::EngineParameters;
use crate::error::ConfigError;

pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:4200";

#[derive(Parser, Debug, Clone)]
#[command(version, about = "HTTP board server backed by a UCI engine")]
pub struct Config {
    /// Address the http server listens on
    #[arg(long, env = "CHESSBOARD_BIND", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Engine binary to run, skips the directory lookup
    #[arg(long, env = "CHESSBOARD_ENGINE_PATH")]
    pub engine_path: Option<PathBuf>,

    /// Directories searched for the engine binary, in order
    #[arg(long = "engine-dir", env = "CHESSBOARD_ENGINE_DIRS", value_delimiter = ':')]
    pub engine_dirs: Vec<PathBuf>,

    #[arg(long, env = "CHESSBOARD_ENGINE_NAME", default_value = "stockfish")]
    pub engine_name: String,

    /// Search depth for every engine query
    #[arg(long, env = "CHESSBOARD_DEPTH", default_value_t = 15)]
    pub depth: u32,

    #[arg(long, env = "CHESSBOARD_ENGINE_TIMEOUT_MS", default_value_t = 10_000)]
    pub engine_timeout_ms: u64,

    #[arg(long, env = "CHESSBOARD_THREADS", default_value_t = 1)]
    pub threads: u32,

    /// Engine hash table size in MB
    #[arg(long, env = "CHESSBOARD_HASH", default_value_t = 16)]
    pub hash: u32,

    #[arg(long, env = "CHESSBOARD_SKILL_LEVEL", default_value_t = 1)]
    pub skill_level: u32,

    #[arg(long, env = "CHESSBOARD_VARIANT")]
    pub variant: Option<String>,

    /// Origin allowed to call the api from a browser, `*` for any
    #[arg(long, env = "CHESSBOARD_CORS_ORIGIN", default_value = DEFAULT_CORS_ORIGIN)]
    pub cors_origin: String,

    #[arg(long, env = "CHESSBOARD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log file, or a directory to create a timestamped one in
    #[arg(long, env = "CHESSBOARD_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Picks the engine binary once, at startup.
    pub fn resolve_engine_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.engine_path {
            return if path.is_file() {
                Ok(path.clone())
            } else {
                Err(ConfigError::NotAFile(path.clone()))
            };
        }

        let dirs = if self.engine_dirs.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.engine_dirs.clone()
        };

        dirs.iter()
            .map(|dir| dir.join(&self.engine_name))
            .find(|candidate| candidate.is_file())
            .ok_or(ConfigError::EngineNotFound {
                name: self.engine_name.clone(),
                dirs,
            })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            depth: self.depth,
            timeout: Duration::from_millis(self.engine_timeout_ms),
            parameters: EngineParameters {
                threads: self.threads,
                hash_size_mb: self.hash,
                skill_level: self.skill_level,
                variant_name: self.variant.clone(),
            },
        }
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}
