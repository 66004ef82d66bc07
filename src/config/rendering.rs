use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Triangle,
    Quad,
    Plane,
    Sphere,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    /// Prepended as `#version` to registry shaders that lack one.
    pub glsl_version: String,
    pub program: String,
    pub scene: SceneKind,
    pub color: [f32; 4],
    pub tint: Option<[f32; 4]>,
    /// Radians per second about the Y axis.
    pub spin: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.5, 0.5, 0.5, 1.0],
            glsl_version: "330 core".to_string(),
            program: "plain".to_string(),
            scene: SceneKind::Sphere,
            // DarkGreen
            color: [0.0, 0.392, 0.0, 1.0],
            tint: None,
            spin: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "shaderkit".to_string(),
            width: 800,
            height: 600,
            vsync: true,
        }
    }
}
