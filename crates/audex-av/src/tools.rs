//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers the locations of ffmpeg and ffprobe once at
//! startup (honoring configured overrides) and hands them to the prober and
//! encoder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tools a batch cannot run without.
pub const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Default probe timeout in seconds.
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 60;

/// Default encode timeout in seconds (6 hours).
const DEFAULT_ENCODE_TIMEOUT_SECS: u64 = 6 * 60 * 60;

/// `[tools]` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary; falls back to `PATH` when unset or missing.
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary; falls back to `PATH` when unset or missing.
    pub ffprobe_path: Option<PathBuf>,
    /// Deadline for a single ffprobe run.
    pub probe_timeout_secs: u64,
    /// Deadline for a single ffmpeg extraction.
    pub encode_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            encode_timeout_secs: DEFAULT_ENCODE_TIMEOUT_SECS,
        }
    }
}

impl ToolsConfig {
    /// Probe deadline as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Encode deadline as a [`Duration`].
    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    fn custom_path(&self, name: &str) -> Option<&Path> {
        match name {
            "ffmpeg" => self.ffmpeg_path.as_deref(),
            "ffprobe" => self.ffprobe_path.as_deref(),
            _ => None,
        }
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// A configured path is used only if it exists; otherwise [`which::which`]
    /// locates the tool. Tools that are not found are omitted.
    pub fn discover(config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in REQUIRED_TOOLS {
            let resolved = match config.custom_path(name) {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "Configured {} path {} does not exist; searching PATH",
                        name,
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tracing::debug!(tool = name, path = %path.display(), "discovered tool");
                tools.insert(name.to_string(), path);
            }
        }

        Self { tools }
    }

    /// Path of the given tool, or [`Error::ToolNotFound`].
    pub fn require(&self, name: &str) -> Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::tool_not_found(name))
    }

    /// Fail with the first missing required tool.
    ///
    /// Called once before any batch work starts.
    pub fn require_all(&self) -> Result<()> {
        for &name in REQUIRED_TOOLS {
            self.require(name)?;
        }
        Ok(())
    }

    /// Check all required tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        REQUIRED_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // Nothing guarantees ffmpeg in CI, but discovery must not panic.
        assert_eq!(registry.check_all().len(), REQUIRED_TOOLS.len());
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require("ffmpeg").unwrap_err();
        assert!(err.is_tool_missing());
        assert!(registry.require_all().is_err());
    }

    #[test]
    fn missing_custom_path_is_not_used() {
        let config = ToolsConfig {
            ffmpeg_path: Some(PathBuf::from("/definitely/not/here/ffmpeg")),
            ..Default::default()
        };
        let registry = ToolRegistry::discover(&config);
        if let Ok(path) = registry.require("ffmpeg") {
            assert_ne!(path, Path::new("/definitely/not/here/ffmpeg"));
        }
    }

    #[test]
    fn tools_config_defaults_from_empty_toml_section() {
        let config: ToolsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ToolsConfig::default());
        assert_eq!(config.probe_timeout(), Duration::from_secs(60));
        assert_eq!(config.encode_timeout(), Duration::from_secs(21_600));
    }
}
