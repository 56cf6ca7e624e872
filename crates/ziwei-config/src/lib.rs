use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the chart library file
pub const PROVIDER_ENV: &str = "ZIWEI_PROVIDER_LIB";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZiweiSettings {
    /// Explicit chart library path, if configured
    pub provider_path: Option<PathBuf>,
    /// Extra directories searched for the chart library
    pub provider_dirs: Vec<PathBuf>,
    /// Timezone used when the input omits `query.timezone`
    pub default_timezone: Option<String>,
    /// Language used when the input omits `birth.language`
    pub default_language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProviderToml {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    search_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DefaultsToml {
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RootConfigToml {
    #[serde(default)]
    provider: ProviderToml,
    #[serde(default)]
    defaults: DefaultsToml,
}

/// Relative locations tried when no `--config` is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &["ziwei.toml", "configs/ziwei.toml"];

/// Read the config text. An explicit path must exist; the default
/// locations are optional and yield `None` when none of them is present.
pub fn read_config_text(explicit: Option<&Path>) -> anyhow::Result<Option<String>> {
    if let Some(path) = explicit {
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Could not read config {}: {e}", path.display()))?;
        return Ok(Some(text));
    }
    for p in DEFAULT_CONFIG_PATHS {
        if let Ok(c) = fs::read_to_string(p) {
            log::debug!("Using config file {}", p);
            return Ok(Some(c));
        }
    }
    Ok(None)
}

pub fn parse_settings(text: &str) -> anyhow::Result<ZiweiSettings> {
    let root: RootConfigToml = toml::from_str(text)
        .map_err(|e| anyhow::anyhow!("Failed to parse ziwei config: {e}"))?;
    let RootConfigToml { provider, defaults } = root;
    let default_timezone = defaults.timezone.filter(|t| !t.trim().is_empty());
    let default_language = defaults.language.filter(|l| !l.trim().is_empty());
    Ok(ZiweiSettings {
        provider_path: provider.path,
        provider_dirs: provider.search_dirs,
        default_timezone,
        default_language,
    })
}

/// Load settings from `explicit` or the default locations, then apply the
/// `ZIWEI_PROVIDER_LIB` override.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<ZiweiSettings> {
    let mut settings = match read_config_text(explicit)? {
        Some(text) => parse_settings(&text)?,
        None => ZiweiSettings::default(),
    };
    if let Some(path) = std::env::var_os(PROVIDER_ENV) {
        if !path.is_empty() {
            settings.provider_path = Some(PathBuf::from(path));
        }
    }
    Ok(settings)
}

/// Directories searched for the chart library, in order.
pub fn provider_search_dirs(settings: &ZiweiSettings) -> Vec<PathBuf> {
    let mut search = vec![PathBuf::from("./lib")];
    if let Some(home) = dirs::home_dir() {
        search.push(home.join(".ziwei/lib"));
    }
    search.extend(settings.provider_dirs.iter().cloned());
    search
}
