// Runtime configuration: data directory resolution and interaction tuning.
// The data directory honours `STARTPAGE_DATA_DIR` before the platform location.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories::ProjectDirs;

use crate::modules::touch::TouchConfig;
use crate::settings::DEFAULT_SETTINGS_DEBOUNCE_MS;

const QUALIFIER: &str = "app";
const ORGANIZATION: &str = "sovereign";
const APPLICATION: &str = "startpage";

pub const DATA_DIR_ENV: &str = "STARTPAGE_DATA_DIR";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or_else(|| anyhow!("unable to determine project directories for the start page"))
}

/// An empty value counts as unset.
fn dir_from_env(name: &str) -> Option<PathBuf> {
    let value = env::var_os(name)?;
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Directory holding the persisted `navigator_*` values.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = dir_from_env(DATA_DIR_ENV) {
        return Ok(dir);
    }
    Ok(project_dirs()?.data_local_dir().to_path_buf())
}

/// Interaction tuning for a [`StartPage`](crate::page::StartPage).
#[derive(Debug, Clone, PartialEq)]
pub struct StartPageConfig {
    pub touch: TouchConfig,
    /// Trailing delay for background slider writes.
    pub settings_debounce_ms: u64,
    /// Columns in the shortcut grid.
    pub grid_columns: usize,
}

impl Default for StartPageConfig {
    fn default() -> Self {
        Self {
            touch: TouchConfig {
                drop_target_classes: vec![
                    "website-card".to_string(),
                    "search-engine-settings-item".to_string(),
                ],
                ..TouchConfig::default()
            },
            settings_debounce_ms: DEFAULT_SETTINGS_DEBOUNCE_MS,
            grid_columns: 6,
        }
    }
}
