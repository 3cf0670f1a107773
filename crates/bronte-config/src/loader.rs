use crate::schema::BronteConfig;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Load configuration from an explicit path, a discovered config file, or
/// env-backed defaults when no file exists.
pub fn load_config(config_path: Option<&Path>) -> Result<BronteConfig> {
    let path = config_path.map(|p| p.to_path_buf()).or_else(find_config_file);

    match path {
        Some(path) => load_config_from_file(&path),
        None => Ok(BronteConfig::default()),
    }
}

pub fn load_config_from_file(path: &Path) -> Result<BronteConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    parse_config_content(&content, format)
}

fn parse_config_content(content: &str, format: ConfigFormat) -> Result<BronteConfig> {
    match format {
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml::from_str(content).context("Failed to parse YAML"),
    }
}

const CONFIG_CANDIDATES: &[&str] = &[
    "bronte.json",
    "bronte.yml",
    "bronte.yaml",
    ".bronte.json",
    ".bronte.yml",
    ".bronte.yaml",
];

pub fn find_config_file() -> Option<PathBuf> {
    for candidate in CONFIG_CANDIDATES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(home) = env::var("HOME") {
        for candidate in CONFIG_CANDIDATES {
            let path = PathBuf::from(&home)
                .join(".config")
                .join("bronte")
                .join(candidate);
            if path.exists() {
                return Some(path);
            }
        }
    }

    None
}
