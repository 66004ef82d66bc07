pub mod backend;
pub mod geometry;
pub mod layout;
pub mod mesh;
pub mod registry;
pub mod shaders;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{GlContext, ShaderBackend};
pub use registry::ShaderRegistry;
pub use shaders::{ShaderBuilder, ShaderProgram};
