use crate::config::rendering::{RenderConfig, WindowConfig};
use crate::config::shaders::{ProgramConfig, ShaderFileConfig};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub log_level: String,
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub shaders: Vec<ShaderFileConfig>,
    pub programs: Vec<ProgramConfig>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            render: RenderConfig::default(),
            shaders: Vec::new(),
            programs: Vec::new(),
        }
    }
}

impl DemoConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Reads `path` and resolves shader paths relative to its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Loads `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            let default_config = Self::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            std::fs::write(path, toml_content).context("Failed to write default config")?;
            return Ok(default_config);
        }
        Self::load(path)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for shader in &mut self.shaders {
            if shader.path.is_relative() {
                shader.path = base.join(&shader.path);
            }
        }
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .with_context(|| format!("Invalid log level '{}'", self.log_level))
    }
}

/// `<platform config dir>/demo.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "MetroManDevTeam", "shaderkit")
        .context("Couldn't determine project directory")?;
    Ok(proj_dirs.config_dir().join("demo.toml"))
}
