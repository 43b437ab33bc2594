mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched when no config file is given.
const DEFAULT_PATHS: &[&str] = &["./audex.toml", "~/.config/audex/config.toml"];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    match find_default_config() {
        Some(path) => {
            tracing::debug!("Using config file {}", path.display());
            load_config(&path)
        }
        None => Ok(Config::default()),
    }
}

/// First existing file among the default locations.
pub fn find_default_config() -> Option<PathBuf> {
    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
        .find(|p| p.is_file())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.tools.probe_timeout_secs == 0 {
        anyhow::bail!("tools.probe_timeout_secs cannot be 0");
    }
    if config.tools.encode_timeout_secs == 0 {
        anyhow::bail!("tools.encode_timeout_secs cannot be 0");
    }

    let extract = &config.extract;
    if extract.input_dir.as_os_str().is_empty() {
        anyhow::bail!("extract.input_dir cannot be empty");
    }
    if extract.output_dir.as_os_str().is_empty() {
        anyhow::bail!("extract.output_dir cannot be empty");
    }
    if extract.sequential && extract.jobs > 1 {
        tracing::warn!(
            "Both sequential and jobs = {} are set, running sequentially",
            extract.jobs
        );
    }

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
