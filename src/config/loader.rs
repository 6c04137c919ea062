//! Load configuration from .auditmap.toml if it exists.

use super::EngineConfig;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Pure function to read config file contents.
pub(crate) fn read_config_file(path: &Path) -> Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Pure function to parse and validate config from a TOML string.
pub fn parse_and_validate_config(contents: &str) -> Result<EngineConfig, String> {
    let config = toml::from_str::<EngineConfig>(contents)
        .map_err(|e| format!("Failed to parse .auditmap.toml: {}", e))?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Try loading config from a specific path, falling back to `None` with a
/// warning on read or parse errors.
pub(crate) fn try_load_config_from_path(config_path: &Path) -> Option<EngineConfig> {
    let contents = match read_config_file(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            // Only log actual errors, not "file not found"
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
            }
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            log::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!("{}. Using defaults.", e);
            None
        }
    }
}

fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Search the directory hierarchy upward from `start` for `.auditmap.toml`
/// and load the first one found, defaulting when none exists.
pub fn load_config(start: &Path) -> EngineConfig {
    const MAX_TRAVERSAL_DEPTH: usize = 10;

    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(".auditmap.toml"))
        .find_map(|path| try_load_config_from_path(&path))
        .map(|mut config| {
            if config.project_path == PathBuf::from(".") {
                config.project_path = start.to_path_buf();
            }
            config
        })
        .unwrap_or_else(|| {
            log::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            EngineConfig::new(start)
        })
}
