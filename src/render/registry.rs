//! Named shader sources, reusable chunks and program definitions.
//!
//! The registry is filled once through [`ShaderRegistryBuilder`] at startup.
//! `build()` expands every `#include <chunk>` line, applies the GLSL version
//! header and checks every program definition, so a [`ShaderRegistry`] only
//! ever holds sources that are ready to hand to the compiler. It has no
//! mutating methods.

use crate::render::shaders::{ShaderError, ShaderSource, ShaderStage};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("Shader '{shader}' includes unknown chunk '{chunk}'")]
    UnknownChunk { shader: String, chunk: String },
    #[error("Include cycle: {}", .0.join(" -> "))]
    IncludeCycle(Vec<String>),
    #[error("Program '{program}' references unknown shader '{shader}'")]
    UnknownShader { program: String, shader: String },
    #[error("Program '{program}' expects a {expected} shader but '{shader}' is a {found} shader")]
    StageMismatch {
        program: String,
        shader: String,
        expected: ShaderStage,
        found: ShaderStage,
    },
    #[error("Shader '{name}' is invalid: {source}")]
    InvalidSource {
        name: String,
        #[source]
        source: ShaderError,
    },
    #[error("Failed to read shader '{name}' from {}: {source}", path.display())]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProgramDef {
    vertex: String,
    fragment: String,
}

/// Collects definitions; nothing is checked until [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ShaderRegistryBuilder {
    glsl_version: Option<String>,
    chunks: Vec<(String, String)>,
    shaders: Vec<(String, ShaderStage, String)>,
    programs: Vec<(String, ProgramDef)>,
    io_errors: Vec<RegistryError>,
}

impl ShaderRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepended as `#version <v>` to every shader that lacks a directive.
    pub fn glsl_version(mut self, version: impl Into<String>) -> Self {
        self.glsl_version = Some(version.into());
        self
    }

    pub fn add_chunk(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.chunks.push((name.into(), text.into()));
        self
    }

    pub fn add_shader(
        mut self,
        name: impl Into<String>,
        stage: ShaderStage,
        text: impl Into<String>,
    ) -> Self {
        self.shaders.push((name.into(), stage, text.into()));
        self
    }

    /// Reads the file now; a read failure is reported by `build`.
    pub fn add_shader_file(
        mut self,
        name: impl Into<String>,
        stage: ShaderStage,
        path: impl AsRef<Path>,
    ) -> Self {
        let name = name.into();
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => self.shaders.push((name, stage, text)),
            Err(source) => self.io_errors.push(RegistryError::Io {
                name,
                path: path.to_path_buf(),
                source,
            }),
        }
        self
    }

    pub fn add_program(
        mut self,
        name: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        self.programs.push((
            name.into(),
            ProgramDef {
                vertex: vertex.into(),
                fragment: fragment.into(),
            },
        ));
        self
    }

    pub fn build(mut self) -> Result<ShaderRegistry, RegistryError> {
        if !self.io_errors.is_empty() {
            return Err(self.io_errors.remove(0));
        }

        let chunks = into_unique_map("chunk", self.chunks)?;
        let raw_shaders = into_unique_map(
            "shader",
            self.shaders
                .into_iter()
                .map(|(name, stage, text)| (name, (stage, text))),
        )?;
        let programs = into_unique_map("program", self.programs)?;

        let mut shaders = BTreeMap::new();
        for (name, (stage, text)) in raw_shaders {
            let mut chain = vec![name.clone()];
            let expanded = expand_includes(&name, &text, &chunks, &mut chain)?;
            let text = match &self.glsl_version {
                Some(version) if !has_version_directive(&expanded) => {
                    format!("#version {version}\n{expanded}")
                }
                _ => expanded,
            };
            let source = ShaderSource::new(stage, text).map_err(|source| {
                RegistryError::InvalidSource {
                    name: name.clone(),
                    source,
                }
            })?;
            shaders.insert(name, source);
        }

        for (program, def) in &programs {
            check_stage(program, &def.vertex, ShaderStage::Vertex, &shaders)?;
            check_stage(program, &def.fragment, ShaderStage::Fragment, &shaders)?;
        }

        Ok(ShaderRegistry { shaders, programs })
    }
}

fn into_unique_map<V>(
    kind: &'static str,
    entries: impl IntoIterator<Item = (String, V)>,
) -> Result<BTreeMap<String, V>, RegistryError> {
    let mut map = BTreeMap::new();
    for (name, value) in entries {
        if map.contains_key(&name) {
            return Err(RegistryError::Duplicate { kind, name });
        }
        map.insert(name, value);
    }
    Ok(map)
}

fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("#include")?;
    let rest = rest.trim();
    rest.strip_prefix('<')?.strip_suffix('>').map(str::trim)
}

/// Looks for `#version` as the first thing after blank lines and comments.
fn has_version_directive(text: &str) -> bool {
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return rest.starts_with("#version");
        }
    }
}

/// `chain` holds the shader name followed by the chunks currently being
/// expanded; seeing a chunk already on it is a cycle.
fn expand_includes(
    shader: &str,
    text: &str,
    chunks: &BTreeMap<String, String>,
    chain: &mut Vec<String>,
) -> Result<String, RegistryError> {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let Some(chunk) = include_target(line) else {
            out.push_str(line);
            out.push('\n');
            continue;
        };

        if chain[1..].iter().any(|c| c == chunk) {
            let mut cycle = chain.clone();
            cycle.push(chunk.to_string());
            return Err(RegistryError::IncludeCycle(cycle));
        }
        let body = chunks
            .get(chunk)
            .ok_or_else(|| RegistryError::UnknownChunk {
                shader: shader.to_string(),
                chunk: chunk.to_string(),
            })?;

        chain.push(chunk.to_string());
        out.push_str(&expand_includes(shader, body, chunks, chain)?);
        chain.pop();
    }
    Ok(out)
}

fn check_stage(
    program: &str,
    shader: &str,
    expected: ShaderStage,
    shaders: &BTreeMap<String, ShaderSource>,
) -> Result<(), RegistryError> {
    let source = shaders
        .get(shader)
        .ok_or_else(|| RegistryError::UnknownShader {
            program: program.to_string(),
            shader: shader.to_string(),
        })?;
    if source.stage() != expected {
        return Err(RegistryError::StageMismatch {
            program: program.to_string(),
            shader: shader.to_string(),
            expected,
            found: source.stage(),
        });
    }
    Ok(())
}

/// Frozen set of expanded shader sources and program definitions.
#[derive(Debug, Clone)]
pub struct ShaderRegistry {
    shaders: BTreeMap<String, ShaderSource>,
    programs: BTreeMap<String, ProgramDef>,
}

impl ShaderRegistry {
    pub fn builder() -> ShaderRegistryBuilder {
        ShaderRegistryBuilder::new()
    }

    pub fn shader(&self, name: &str) -> Option<&ShaderSource> {
        self.shaders.get(name)
    }

    /// Vertex and fragment sources of a program.
    pub fn program(&self, name: &str) -> Option<(&ShaderSource, &ShaderSource)> {
        let def = self.programs.get(name)?;
        // Both names were checked by `build`.
        Some((self.shaders.get(&def.vertex)?, self.shaders.get(&def.fragment)?))
    }

    pub fn shader_names(&self) -> impl Iterator<Item = &str> {
        self.shaders.keys().map(String::as_str)
    }

    pub fn program_names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    /// Shaders no program refers to.
    pub fn unused_shaders(&self) -> Vec<&str> {
        let used: HashSet<&str> = self
            .programs
            .values()
            .flat_map(|def| [def.vertex.as_str(), def.fragment.as_str()])
            .collect();
        self.shader_names().filter(|name| !used.contains(name)).collect()
    }
}
