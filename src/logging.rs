use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Local;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

use crate::error::ConfigError;

pub fn init(level: &str, log_file: Option<&Path>) -> Result<(), ConfigError> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| ConfigError::LogLevel(level.to_string()))?;

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let path = log_file_path(path);
        loggers.push(WriteLogger::new(level, config, File::create(path)?));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}

fn log_file_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(format!("chessboard_{}.log", Local::now().format("%Y%m%d_%H%M%S")))
    } else {
        path.to_path_buf()
    }
}

#[test]
fn test_log_file_path() {
    let dir = std::env::temp_dir();
    let in_dir = log_file_path(&dir);

    assert_eq!(Some(dir.as_path()), in_dir.parent());
    assert!(in_dir
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("chessboard_") && name.ends_with(".log")));

    let file = dir.join("server.log");
    assert_eq!(file, log_file_path(&file));
}
