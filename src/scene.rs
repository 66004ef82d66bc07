use crate::config::{DemoConfig, RenderConfig, SceneKind};
use crate::render::backend::{GlContext, ShaderBackend};
use crate::render::geometry;
use crate::render::mesh::{ColoredVertex, GpuMesh, MeshData, MeshError};
use crate::render::registry::{RegistryError, ShaderRegistry, ShaderRegistryBuilder};
use crate::render::shaders::{ShaderProgram, ShaderStage};
use glam::{Mat4, Vec3, Vec4};
use log::info;
use std::time::Instant;

/// Shaders every demo registry starts with.
pub mod builtin_shaders {
    pub const TRANSFORM_CHUNK: &str = "uniform mat4 u_transform;";

    pub const STANDARD_VERTEX: &str = r#"
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec4 aColor;
#include <transform>

out vec4 vertex_color;

void main() {
    vertex_color = aColor;
    gl_Position = u_transform * vec4(aPos, 1.0);
}
"#;

    pub const PLAIN_FRAGMENT: &str = r#"
in vec4 vertex_color;
out vec4 FragColor;

void main() {
    FragColor = vertex_color;
}
"#;

    pub const TINTED_FRAGMENT: &str = r#"
in vec4 vertex_color;
uniform vec4 u_tint;
out vec4 FragColor;

void main() {
    FragColor = vertex_color * u_tint;
}
"#;
}

const SCENE_SCALE: f32 = 0.8;

/// Built-in shaders plus whatever the config adds, frozen into one registry.
pub fn registry_for(config: &DemoConfig) -> Result<ShaderRegistry, RegistryError> {
    let mut builder = ShaderRegistryBuilder::new()
        .glsl_version(config.render.glsl_version.as_str())
        .add_chunk("transform", builtin_shaders::TRANSFORM_CHUNK)
        .add_shader(
            "standard_vertex",
            ShaderStage::Vertex,
            builtin_shaders::STANDARD_VERTEX,
        )
        .add_shader(
            "plain_fragment",
            ShaderStage::Fragment,
            builtin_shaders::PLAIN_FRAGMENT,
        )
        .add_shader(
            "tinted_fragment",
            ShaderStage::Fragment,
            builtin_shaders::TINTED_FRAGMENT,
        )
        .add_program("plain", "standard_vertex", "plain_fragment")
        .add_program("tinted", "standard_vertex", "tinted_fragment");

    for shader in &config.shaders {
        builder = builder.add_shader_file(&shader.name, shader.stage, &shader.path);
    }
    for program in &config.programs {
        builder = builder.add_program(&program.name, &program.vertex, &program.fragment);
    }
    builder.build()
}

pub fn mesh_for(render: &RenderConfig) -> MeshData<ColoredVertex> {
    let color = Vec4::from_array(render.color);
    match render.scene {
        SceneKind::Triangle => geometry::triangle(),
        SceneKind::Quad => geometry::quad(color),
        SceneKind::Plane => geometry::plane(1.5, 1.5, 8, 8, color),
        SceneKind::Sphere => geometry::sphere(1.0, 16, 16, color),
    }
}

/// Spin about Y, squeeze X by the aspect ratio and flip Z so +Z faces the
/// viewer under the default depth range.
pub fn transform(elapsed_secs: f32, spin: f32, aspect: f32) -> Mat4 {
    let aspect = if aspect > 0.0 { aspect } else { 1.0 };
    Mat4::from_scale(Vec3::new(SCENE_SCALE / aspect, SCENE_SCALE, -SCENE_SCALE))
        * Mat4::from_rotation_y(elapsed_secs * spin)
}

/// The configured tint, or white when the program reads `u_tint` and none
/// was given, so a tinted program never samples an unset uniform.
pub fn initial_tint<B: ShaderBackend>(
    program: &mut ShaderProgram<B>,
    tint: Option<[f32; 4]>,
) -> Option<Vec4> {
    match tint {
        Some(tint) => Some(Vec4::from_array(tint)),
        None if program.has_uniform("u_tint") => {
            info!("Program reads u_tint but no tint is configured, using white");
            Some(Vec4::ONE)
        }
        None => None,
    }
}

/// One program, one mesh, one draw call per frame.
pub struct DemoScene {
    program: ShaderProgram<GlContext>,
    mesh: GpuMesh,
    spin: f32,
    tint: Option<Vec4>,
    started: Instant,
}

impl DemoScene {
    pub fn new(
        gl: &GlContext,
        mut program: ShaderProgram<GlContext>,
        render: &RenderConfig,
    ) -> Result<Self, MeshError> {
        let mesh = GpuMesh::upload(gl, &mesh_for(render))?;
        let tint = initial_tint(&mut program, render.tint);
        Ok(Self {
            program,
            mesh,
            spin: render.spin,
            tint,
            started: Instant::now(),
        })
    }

    pub fn draw(&mut self, aspect: f32) {
        let elapsed = self.started.elapsed().as_secs_f32();
        self.program.bind();
        self.program
            .set_uniform("u_transform", transform(elapsed, self.spin, aspect));
        if let Some(tint) = self.tint {
            self.program.set_uniform("u_tint", tint);
        }
        self.mesh.draw();
    }
}
