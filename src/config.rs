//! Application-level configuration loading: court count and default tenant group.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CLUB_COURTS_CONFIG_PATH";

/// Smallest number of courts a club can configure.
pub const MIN_COURTS: u32 = 1;
/// Largest number of courts a club can configure.
pub const MAX_COURTS: u32 = 20;
/// Court count used when nothing is configured.
pub const DEFAULT_COURTS: u32 = 10;

/// Number of courts the composer distributes matches over, within
/// [`MIN_COURTS`]..=[`MAX_COURTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourtCount(u32);

impl CourtCount {
    /// Returns `None` when `count` is outside the allowed range.
    pub fn new(count: u32) -> Option<Self> {
        (MIN_COURTS..=MAX_COURTS)
            .contains(&count)
            .then_some(Self(count))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for CourtCount {
    fn default() -> Self {
        Self(DEFAULT_COURTS)
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Initial court count; adjustable at runtime through the settings routes.
    pub court_count: CourtCount,
    /// Tenant group used when a request carries no `x-group-id` header.
    pub group_id: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        courts = app_config.court_count.get(),
                        group = ?app_config.group_id,
                        "loaded club configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    court_count: Option<u32>,
    group_id: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let court_count = match value.court_count {
            Some(count) => CourtCount::new(count).unwrap_or_else(|| {
                warn!(
                    count,
                    min = MIN_COURTS,
                    max = MAX_COURTS,
                    "configured court count out of range; using default"
                );
                CourtCount::default()
            }),
            None => CourtCount::default(),
        };
        let group_id = value
            .group_id
            .map(|group| group.trim().to_owned())
            .filter(|group| !group.is_empty());

        Self {
            court_count,
            group_id,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
