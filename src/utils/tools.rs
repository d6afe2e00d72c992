use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::errors::{AppError, AppResult};

static FFMPEG_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ffmpeg version n?(\d+(?:\.\d+)*)").expect("static regex"));

// Structure to represent an external tool
#[derive(Debug, Clone)]
pub struct ExternalTool {
    pub path: PathBuf,
    pub version: Option<String>,
}

/// Find a command in PATH
pub fn check_command_in_path(command: &str) -> AppResult<PathBuf> {
    which::which(command)
        .map_err(|e| AppError::ConfigurationError(format!("{} not found in PATH: {}", command, e)))
}

/// Locate ffmpeg and read its version
pub fn find_ffmpeg() -> AppResult<ExternalTool> {
    let path = check_command_in_path("ffmpeg")?;
    info!("Found ffmpeg at {}", path.display());
    let version = check_ffmpeg_version(&path).ok();
    if let Some(v) = &version {
        debug!("ffmpeg version: {}", v);
    }
    Ok(ExternalTool {
        path,
        version,
    })
}

fn check_ffmpeg_version(path: &Path) -> AppResult<String> {
    let output = Command::new(path).arg("-version").output()?;
    if !output.status.success() {
        return Err(AppError::Other(format!(
            "ffmpeg -version exited with {}",
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_ffmpeg_version(&stdout)
        .ok_or_else(|| AppError::Other("Could not parse ffmpeg version".to_string()))
}

fn parse_ffmpeg_version(banner: &str) -> Option<String> {
    let first_line = banner.lines().next()?;
    FFMPEG_VERSION_RE
        .captures(first_line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
