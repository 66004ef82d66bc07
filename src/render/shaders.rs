// shaders.rs - checked compile/link pipeline for one vertex + one fragment stage

use crate::render::backend::{ShaderBackend, Uniform};
use crate::render::registry::ShaderRegistry;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader source is empty")]
    EmptySource { stage: ShaderStage },
    #[error("{stage} shader source contains a NUL byte at offset {position}")]
    InteriorNul { stage: ShaderStage, position: usize },
    #[error("Failed to create {object}: {reason}")]
    ObjectCreation { object: String, reason: String },
    #[error("{stage} shader compilation failed:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("Program linking failed:\n{log}")]
    Link { log: String },
    #[error("Unknown program: {0}")]
    UnknownProgram(String),
}

/// Source text for one stage. Never empty, never contains NUL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    stage: ShaderStage,
    text: String,
}

impl ShaderSource {
    pub fn new(stage: ShaderStage, text: impl Into<String>) -> Result<Self, ShaderError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ShaderError::EmptySource { stage });
        }
        if let Some(position) = text.bytes().position(|b| b == 0) {
            return Err(ShaderError::InteriorNul { stage, position });
        }
        Ok(Self { stage, text })
    }

    pub fn vertex(text: impl Into<String>) -> Result<Self, ShaderError> {
        Self::new(ShaderStage::Vertex, text)
    }

    pub fn fragment(text: impl Into<String>) -> Result<Self, ShaderError> {
        Self::new(ShaderStage::Fragment, text)
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A successfully compiled stage. Dropping it releases the shader object.
pub struct CompiledShader<B: ShaderBackend> {
    backend: Rc<B>,
    handle: B::Shader,
    stage: ShaderStage,
}

impl<B: ShaderBackend> CompiledShader<B> {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn handle(&self) -> B::Shader {
        self.handle
    }
}

impl<B: ShaderBackend> fmt::Debug for CompiledShader<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledShader")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .finish()
    }
}

impl<B: ShaderBackend> Drop for CompiledShader<B> {
    fn drop(&mut self) {
        debug!("Releasing {} shader {:?}", self.stage, self.handle);
        self.backend.delete_shader(self.handle);
    }
}

/// A linked program. Only ever constructed fully linked.
pub struct ShaderProgram<B: ShaderBackend> {
    backend: Rc<B>,
    handle: B::Program,
    validation_log: Option<String>,
    uniforms: HashMap<String, Option<B::UniformLocation>>,
}

impl<B: ShaderBackend> ShaderProgram<B> {
    pub fn handle(&self) -> B::Program {
        self.handle
    }

    /// Driver output from a validation pass that reported a problem.
    pub fn validation_log(&self) -> Option<&str> {
        self.validation_log.as_deref()
    }

    pub fn bind(&self) {
        self.backend.use_program(Some(self.handle));
    }

    /// Cached lookup; a miss is remembered so the warning is logged once.
    pub fn uniform_location(&mut self, name: &str) -> Option<B::UniformLocation> {
        if let Some(location) = self.uniforms.get(name) {
            return *location;
        }

        let location = self.backend.uniform_location(self.handle, name);
        if location.is_none() {
            warn!("Uniform '{}' not found in program {:?}", name, self.handle);
        }
        self.uniforms.insert(name.to_string(), location);
        location
    }

    /// Like [`uniform_location`](Self::uniform_location) without the warning.
    pub fn has_uniform(&mut self, name: &str) -> bool {
        if let Some(location) = self.uniforms.get(name) {
            return location.is_some();
        }
        let location = self.backend.uniform_location(self.handle, name);
        self.uniforms.insert(name.to_string(), location);
        location.is_some()
    }

    /// Binds the program and uploads `value`. Returns false when the uniform
    /// is not active in this program.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<Uniform>) -> bool {
        let Some(location) = self.uniform_location(name) else {
            return false;
        };
        self.bind();
        self.backend.set_uniform(location, value.into());
        true
    }
}

impl<B: ShaderBackend> fmt::Debug for ShaderProgram<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("handle", &self.handle)
            .field("validation_log", &self.validation_log)
            .finish()
    }
}

impl<B: ShaderBackend> Drop for ShaderProgram<B> {
    fn drop(&mut self) {
        debug!("Releasing program {:?}", self.handle);
        self.backend.delete_program(self.handle);
    }
}

/// Turns shader source text into linked programs on one context.
pub struct ShaderBuilder<B: ShaderBackend> {
    backend: Rc<B>,
}

impl<B: ShaderBackend> Clone for ShaderBuilder<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Rc::clone(&self.backend),
        }
    }
}

impl<B: ShaderBackend> ShaderBuilder<B> {
    pub fn new(backend: Rc<B>) -> Self {
        Self { backend }
    }

    pub fn compile_stage(&self, source: &ShaderSource) -> Result<CompiledShader<B>, ShaderError> {
        let stage = source.stage();
        let handle = self
            .backend
            .create_shader(stage)
            .map_err(|reason| ShaderError::ObjectCreation {
                object: format!("{stage} shader"),
                reason,
            })?;

        // Owned from here on: any early return releases the object.
        let shader = CompiledShader {
            backend: Rc::clone(&self.backend),
            handle,
            stage,
        };

        self.backend.shader_source(handle, source.text());
        self.backend.compile_shader(handle);

        if !self.backend.compile_status(handle) {
            let log = self.backend.shader_info_log(handle);
            return Err(ShaderError::Compile { stage, log });
        }

        let log = self.backend.shader_info_log(handle);
        if !log.trim().is_empty() {
            debug!("{} shader {:?} compiled with warnings:\n{}", stage, handle, log);
        }

        Ok(shader)
    }

    /// Links a vertex and a fragment stage. Both stages are released by this
    /// call whatever the outcome. Validation problems are reported on the
    /// returned program rather than failing the link.
    pub fn link(
        &self,
        vertex: CompiledShader<B>,
        fragment: CompiledShader<B>,
    ) -> Result<ShaderProgram<B>, ShaderError> {
        debug_assert_eq!(vertex.stage(), ShaderStage::Vertex);
        debug_assert_eq!(fragment.stage(), ShaderStage::Fragment);

        let handle = self
            .backend
            .create_program()
            .map_err(|reason| ShaderError::ObjectCreation {
                object: "program".to_string(),
                reason,
            })?;

        let mut program = ShaderProgram {
            backend: Rc::clone(&self.backend),
            handle,
            validation_log: None,
            uniforms: HashMap::new(),
        };

        self.backend.attach_shader(handle, vertex.handle());
        self.backend.attach_shader(handle, fragment.handle());
        self.backend.link_program(handle);

        let linked = self.backend.link_status(handle);
        self.backend.detach_shader(handle, vertex.handle());
        self.backend.detach_shader(handle, fragment.handle());
        drop(vertex);
        drop(fragment);

        if !linked {
            let log = self.backend.program_info_log(handle);
            return Err(ShaderError::Link { log });
        }

        self.backend.validate_program(handle);
        if !self.backend.validate_status(handle) {
            let log = self.backend.program_info_log(handle);
            warn!("Program {:?} failed validation (continuing):\n{}", handle, log);
            program.validation_log = Some(log);
        }

        debug!("Linked program {:?}", handle);
        Ok(program)
    }

    pub fn build(
        &self,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
    ) -> Result<ShaderProgram<B>, ShaderError> {
        let vertex = self.compile_stage(vertex)?;
        let fragment = self.compile_stage(fragment)?;
        self.link(vertex, fragment)
    }

    pub fn build_named(
        &self,
        registry: &ShaderRegistry,
        name: &str,
    ) -> Result<ShaderProgram<B>, ShaderError> {
        let (vertex, fragment) = registry
            .program(name)
            .ok_or_else(|| ShaderError::UnknownProgram(name.to_string()))?;
        self.build(vertex, fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::registry::ShaderRegistryBuilder;
    use crate::render::testing::MockBackend;

    const VERTEX_SRC: &str = r#"
        #version 330 core
        layout (location = 0) in vec3 aPos;
        layout (location = 1) in vec4 aColor;
        out vec4 vertex_color;
        void main() {
            vertex_color = aColor;
            gl_Position = vec4(aPos, 1.0);
        }
    "#;

    const FRAGMENT_SRC: &str = r#"
        #version 330 core
        in vec4 vertex_color;
        out vec4 FragColor;
        void main() {
            FragColor = vertex_color;
        }
    "#;

    fn setup() -> (Rc<MockBackend>, ShaderBuilder<MockBackend>) {
        let backend = Rc::new(MockBackend::default());
        let builder = ShaderBuilder::new(Rc::clone(&backend));
        (backend, builder)
    }

    fn sources(vertex: &str, fragment: &str) -> (ShaderSource, ShaderSource) {
        (
            ShaderSource::vertex(vertex).unwrap(),
            ShaderSource::fragment(fragment).unwrap(),
        )
    }

    #[test]
    fn test_valid_pair_builds() {
        let (backend, builder) = setup();
        let (vs, fs) = sources(VERTEX_SRC, FRAGMENT_SRC);

        let program = builder.build(&vs, &fs).unwrap();
        assert!(program.validation_log().is_none());

        // Stages are released once linked; only the program remains.
        assert_eq!(backend.live_shaders(), 0);
        assert_eq!(backend.live_programs(), 1);

        drop(program);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn test_vertex_syntax_error_stops_before_fragment() {
        let (backend, builder) = setup();
        let (vs, fs) = sources("void main(){gl_Position=vec4(0);", FRAGMENT_SRC);

        match builder.build(&vs, &fs) {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(log.contains("syntax error"));
            }
            other => panic!("expected vertex compile error, got {:?}", other),
        }

        assert_eq!(backend.submitted_stages(), vec![ShaderStage::Vertex]);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_fragment_error_releases_vertex() {
        let (backend, builder) = setup();
        let (vs, fs) = sources(VERTEX_SRC, "void main() { FragColor = vec4(1.0;");

        match builder.build(&vs, &fs) {
            Err(ShaderError::Compile { stage, .. }) => assert_eq!(stage, ShaderStage::Fragment),
            other => panic!("expected fragment compile error, got {:?}", other),
        }

        assert_eq!(
            backend.submitted_stages(),
            vec![ShaderStage::Vertex, ShaderStage::Fragment]
        );
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_missing_interface_variable_is_link_error() {
        let (backend, builder) = setup();
        let vertex = "out vec4 vertex_color;\nvoid main() { gl_Position = vec4(0.0); }";
        let fragment = "in vec3 normal;\nout vec4 FragColor;\nvoid main() { FragColor = vec4(normal, 1.0); }";
        let (vs, fs) = sources(vertex, fragment);

        match builder.build(&vs, &fs) {
            Err(ShaderError::Link { log }) => assert!(log.contains("normal")),
            other => panic!("expected link error, got {:?}", other),
        }
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_undeclared_frag_color_is_link_error() {
        let (backend, builder) = setup();
        let (vs, fs) = sources(
            "void main(){gl_Position=vec4(0);}",
            "void main(){FragColor=vec4(1);}",
        );

        let err = builder.build(&vs, &fs).unwrap_err();
        match &err {
            ShaderError::Link { log } => assert!(log.contains("FragColor")),
            other => panic!("expected link error, got {:?}", other),
        }
        assert!(err.to_string().contains("FragColor"));
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_validation_failure_is_advisory() {
        let (backend, builder) = setup();
        backend.fail_validation("no active texture unit bound");
        let (vs, fs) = sources(VERTEX_SRC, FRAGMENT_SRC);

        let program = builder.build(&vs, &fs).unwrap();
        assert_eq!(
            program.validation_log(),
            Some("no active texture unit bound")
        );
        assert_eq!(backend.live_programs(), 1);
    }

    #[test]
    fn test_builds_are_independent() {
        let (backend, builder) = setup();
        let (vs, fs) = sources(VERTEX_SRC, FRAGMENT_SRC);

        let first = builder.build(&vs, &fs).unwrap();
        let second = builder.build(&vs, &fs).unwrap();
        assert_ne!(first.handle(), second.handle());
        assert_eq!(backend.live_programs(), 2);

        drop(first);
        assert_eq!(backend.live_programs(), 1);
    }

    #[test]
    fn test_full_log_is_preserved() {
        let (backend, builder) = setup();
        let long_log: String = (0..500)
            .map(|i| format!("ERROR: 0:{i}: 'value_{i}' : undeclared identifier\n"))
            .collect();
        backend.set_compile_log(&long_log);
        let (vs, fs) = sources("void main() { gl_Position = vec4(0.0; }", FRAGMENT_SRC);

        match builder.build(&vs, &fs) {
            Err(ShaderError::Compile { log, .. }) => assert_eq!(log, long_log),
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_object_creation_failure() {
        let (backend, builder) = setup();
        backend.refuse_objects();
        let source = ShaderSource::vertex(VERTEX_SRC).unwrap();

        match builder.compile_stage(&source) {
            Err(ShaderError::ObjectCreation { object, .. }) => assert_eq!(object, "vertex shader"),
            other => panic!("expected object creation error, got {:?}", other),
        }
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_program_creation_failure_releases_stages() {
        let (backend, builder) = setup();
        backend.refuse_programs();
        let (vs, fs) = sources(VERTEX_SRC, FRAGMENT_SRC);

        match builder.build(&vs, &fs) {
            Err(ShaderError::ObjectCreation { object, .. }) => assert_eq!(object, "program"),
            other => panic!("expected object creation error, got {:?}", other),
        }
        assert_eq!(
            backend.submitted_stages(),
            vec![ShaderStage::Vertex, ShaderStage::Fragment]
        );
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_source_rejects_empty_and_nul() {
        assert!(matches!(
            ShaderSource::vertex("  \n\t"),
            Err(ShaderError::EmptySource { stage: ShaderStage::Vertex })
        ));
        assert!(matches!(
            ShaderSource::fragment("void main() {}\0"),
            Err(ShaderError::InteriorNul { stage: ShaderStage::Fragment, position: 14 })
        ));
    }

    #[test]
    fn test_uniform_lookup_is_cached() {
        let (backend, builder) = setup();
        let fragment = "uniform vec4 u_tint;\nout vec4 FragColor;\nvoid main() { FragColor = u_tint; }";
        let (vs, fs) = sources(VERTEX_SRC, fragment);
        let mut program = builder.build(&vs, &fs).unwrap();

        assert!(program.set_uniform("u_tint", glam::Vec4::ONE));
        assert!(program.set_uniform("u_tint", glam::Vec4::ZERO));
        assert!(!program.set_uniform("u_missing", 1.0f32));
        assert!(!program.set_uniform("u_missing", 2.0f32));

        assert_eq!(backend.uniform_lookups(), 2);
        assert_eq!(backend.uniform_uploads(), 2);
    }

    #[test]
    fn test_build_named_from_registry() {
        let (backend, builder) = setup();
        let registry = ShaderRegistryBuilder::new()
            .add_shader("standard_vertex", ShaderStage::Vertex, VERTEX_SRC)
            .add_shader("plain_fragment", ShaderStage::Fragment, FRAGMENT_SRC)
            .add_program("plain", "standard_vertex", "plain_fragment")
            .build()
            .unwrap();

        let program = builder.build_named(&registry, "plain").unwrap();
        assert_eq!(backend.live_programs(), 1);
        drop(program);

        assert!(matches!(
            builder.build_named(&registry, "missing"),
            Err(ShaderError::UnknownProgram(name)) if name == "missing"
        ));
        assert_eq!(backend.live_handles(), 0);
    }
}
