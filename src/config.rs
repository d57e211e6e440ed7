use std::path::PathBuf;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;
use tracing::warn;

use crate::constants::DEFAULT_DATA_DIR;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(skip_serializing, skip_deserializing)]
    pub config_path: PathBuf,
    #[serde(skip_serializing, skip_deserializing)]
    pub config_dir: PathBuf,

    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

async fn resolve_config_path(path_override: Option<PathBuf>) -> Result<PathBuf> {
    let config_path =
        path_override.or_else(|| std::env::var("LATECLONE_CONFIG").ok().map(PathBuf::from));

    if let Some(path) = config_path {
        return Ok(path);
    }

    warn!("No config path override found, looking for config in default locations");

    let cwd = std::env::current_dir()?;

    // try to load from $CWD/lateclone.toml
    let path = cwd.join("lateclone.toml");
    if path.exists() {
        return Ok(path);
    }
    warn!("No config found in current directory ({})", path.display());

    // try to load from $HOME/.config/lateclone/config.toml
    let Some(project_dirs) = directories::ProjectDirs::from("", "", "lateclone") else {
        bail!("Failed to get config dir");
    };

    let path = project_dirs.config_dir().join("config.toml");
    if path.exists() {
        return Ok(path);
    }
    warn!("No config found in home config dir ({})", path.display());

    let path = PathBuf::from("/etc/lateclone/config.toml");
    if path.exists() {
        return Ok(path);
    }
    warn!("No config found in global config dir ({})", path.display());

    bail!("Couldn't load config file.");
}

impl Config {
    pub async fn load(path_override: Option<PathBuf>) -> Result<Self> {
        let config_path = resolve_config_path(path_override).await?;

        let config_str = read_to_string(&config_path).await?;
        let mut config = Self::parse(&config_str)?;
        config.config_path = config_path.clone();

        let Some(config_dir) = config_path.parent().map(|p| p.to_path_buf()) else {
            bail!("Couldn't determine config dir");
        };
        config.config_dir = config_dir;

        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(config_str)?;
        if config.data_dir.as_os_str().is_empty() {
            bail!("data-dir can't be empty");
        }
        Ok(config)
    }

    pub fn absolute_data_dir(&self) -> PathBuf {
        self.config_dir.join(self.data_dir.clone())
    }
}
