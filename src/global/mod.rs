use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "interview-recorder";

/// Overrides the config file location when set.
pub const CONFIG_ENV: &str = "INTERVIEW_RECORDER_CONFIG";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(config_dir()?.join("config.toml")),
    }
}

pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| anyhow!("Unable to determine data directory"))
}

/// Default output directory for finished recordings.
pub fn recordings_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("recordings"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recordings_live_under_data_dir() {
        if let (Ok(data), Ok(recordings)) = (data_dir(), recordings_dir()) {
            assert!(recordings.starts_with(&data));
            assert!(data.ends_with(APP_DIR));
        }
    }
}
