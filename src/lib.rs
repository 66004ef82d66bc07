pub mod config;
pub mod render;
pub mod scene;

// Re-export commonly used types
pub use config::DemoConfig;
pub use render::backend::{GlContext, ShaderBackend, Uniform};
pub use render::layout::{AttribType, VertexAttribute, VertexLayout};
pub use render::mesh::{ColoredVertex, GpuMesh, MeshData};
pub use render::registry::{RegistryError, ShaderRegistry, ShaderRegistryBuilder};
pub use render::shaders::{
    CompiledShader, ShaderBuilder, ShaderError, ShaderProgram, ShaderSource, ShaderStage,
};
