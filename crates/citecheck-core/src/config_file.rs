use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Config;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub grobid: Option<GrobidConfig>,
    pub crossref: Option<CrossrefConfig>,
    pub thresholds: Option<ThresholdsConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrobidConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossrefConfig {
    pub url: Option<String>,
    pub mailto: Option<String>,
    pub search_rows: Option<usize>,
    pub lookup_timeout_secs: Option<u64>,
    pub search_timeout_secs: Option<u64>,
    pub requests_per_second: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    pub high: Option<u8>,
    pub medium: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub num_workers: Option<usize>,
}

impl From<&Config> for ConfigFile {
    fn from(config: &Config) -> Self {
        ConfigFile {
            grobid: Some(GrobidConfig {
                url: Some(config.grobid_url.clone()),
                timeout_secs: Some(config.conversion_timeout_secs),
            }),
            crossref: Some(CrossrefConfig {
                url: Some(config.crossref_url.clone()),
                mailto: config.crossref_mailto.clone(),
                search_rows: Some(config.search_rows),
                lookup_timeout_secs: Some(config.lookup_timeout_secs),
                search_timeout_secs: Some(config.search_timeout_secs),
                requests_per_second: Some(config.requests_per_second),
            }),
            thresholds: Some(ThresholdsConfig {
                high: Some(config.thresholds.high),
                medium: Some(config.thresholds.medium),
            }),
            concurrency: Some(ConcurrencyConfig {
                num_workers: Some(config.num_workers),
            }),
        }
    }
}

/// Platform config directory path: `<config_dir>/citecheck/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citecheck").join("config.toml"))
}

/// Load config by cascading CWD `.citecheck.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".citecheck.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

fn pick<T: Clone, S>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        grobid: Some(GrobidConfig {
            url: pick(&overlay.grobid, &base.grobid, |g| g.url.clone()),
            timeout_secs: pick(&overlay.grobid, &base.grobid, |g| g.timeout_secs),
        }),
        crossref: Some(CrossrefConfig {
            url: pick(&overlay.crossref, &base.crossref, |c| c.url.clone()),
            mailto: pick(&overlay.crossref, &base.crossref, |c| c.mailto.clone()),
            search_rows: pick(&overlay.crossref, &base.crossref, |c| c.search_rows),
            lookup_timeout_secs: pick(&overlay.crossref, &base.crossref, |c| {
                c.lookup_timeout_secs
            }),
            search_timeout_secs: pick(&overlay.crossref, &base.crossref, |c| {
                c.search_timeout_secs
            }),
            requests_per_second: pick(&overlay.crossref, &base.crossref, |c| {
                c.requests_per_second
            }),
        }),
        thresholds: Some(ThresholdsConfig {
            high: pick(&overlay.thresholds, &base.thresholds, |t| t.high),
            medium: pick(&overlay.thresholds, &base.thresholds, |t| t.medium),
        }),
        concurrency: Some(ConcurrencyConfig {
            num_workers: pick(&overlay.concurrency, &base.concurrency, |c| c.num_workers),
        }),
    }
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    save_to_path(config, &path)?;
    Ok(path)
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
}
