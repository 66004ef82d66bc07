use crate::render::shaders::ShaderStage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A shader loaded from disk. Relative paths are resolved against the
/// directory holding the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderFileConfig {
    pub name: String,
    pub stage: ShaderStage,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
}
