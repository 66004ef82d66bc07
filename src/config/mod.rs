pub mod core;
pub mod rendering;
pub mod shaders;

pub use self::core::DemoConfig;
pub use rendering::{RenderConfig, SceneKind, WindowConfig};
pub use shaders::{ProgramConfig, ShaderFileConfig};
