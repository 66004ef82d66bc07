//! The graphics-context side of shader building.
//!
//! [`ShaderBackend`] is everything the builder needs from a live GL context:
//! object creation and deletion, source submission, compile/link/validate and
//! the status and log queries that go with them. [`GlContext`] implements it on
//! top of the `gl` function pointers.

use crate::render::shaders::ShaderStage;
use gl::types::*;
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::ffi::{c_void, CString};
use std::fmt;
use std::marker::PhantomData;

/// A typed uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl From<i32> for Uniform {
    fn from(value: i32) -> Self {
        Uniform::Int(value)
    }
}

impl From<f32> for Uniform {
    fn from(value: f32) -> Self {
        Uniform::Float(value)
    }
}

impl From<Vec2> for Uniform {
    fn from(value: Vec2) -> Self {
        Uniform::Vec2(value)
    }
}

impl From<Vec3> for Uniform {
    fn from(value: Vec3) -> Self {
        Uniform::Vec3(value)
    }
}

impl From<Vec4> for Uniform {
    fn from(value: Vec4) -> Self {
        Uniform::Vec4(value)
    }
}

impl From<Mat4> for Uniform {
    fn from(value: Mat4) -> Self {
        Uniform::Mat4(value)
    }
}

/// Operations a current rendering context must provide.
///
/// Handles are plain copyable names; ownership is tracked one level up by
/// `CompiledShader` and `ShaderProgram`. Creation calls return the driver's
/// complaint as a `String` when no object could be allocated.
pub trait ShaderBackend {
    type Shader: Copy + fmt::Debug + PartialEq;
    type Program: Copy + fmt::Debug + PartialEq;
    type UniformLocation: Copy + fmt::Debug;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn link_status(&self, program: Self::Program) -> bool;
    fn validate_program(&self, program: Self::Program);
    fn validate_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);

    fn use_program(&self, program: Option<Self::Program>);
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;
    fn set_uniform(&self, location: Self::UniformLocation, value: Uniform);
}

/// Proof that the `gl` entry points are loaded for the current context.
///
/// GL objects belong to the thread that made the context current, so this
/// type is neither `Send` nor `Sync`.
pub struct GlContext {
    _not_send: PhantomData<*const ()>,
}

impl GlContext {
    /// Loads every GL entry point through `loader`.
    ///
    /// # Safety
    /// A GL context must be current on the calling thread, and must stay
    /// current for as long as the returned value (or anything built from it)
    /// is used.
    pub unsafe fn load_with<F>(loader: F) -> Self
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        Self {
            _not_send: PhantomData,
        }
    }

    pub fn set_viewport(&self, width: u32, height: u32) {
        unsafe { gl::Viewport(0, 0, width as GLsizei, height as GLsizei) };
    }

    pub fn enable_depth_test(&self) {
        unsafe {
            gl::Enable(gl::DEPTH_TEST);
            gl::DepthFunc(gl::LESS);
        }
    }

    pub fn clear(&self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        unsafe {
            gl::ClearColor(r, g, b, a);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT);
        }
    }

    pub fn version_string(&self) -> String {
        self.get_string(gl::VERSION)
    }

    pub fn renderer_string(&self) -> String {
        self.get_string(gl::RENDERER)
    }

    fn get_string(&self, name: GLenum) -> String {
        let ptr = unsafe { gl::GetString(name) };
        if ptr.is_null() {
            return String::new();
        }
        unsafe { std::ffi::CStr::from_ptr(ptr as *const std::os::raw::c_char) }
            .to_string_lossy()
            .into_owned()
    }

    fn last_error(&self) -> GLenum {
        unsafe { gl::GetError() }
    }
}

fn stage_enum(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
    }
}

type GetIv = unsafe fn(GLuint, GLenum, *mut GLint);
type GetLog = unsafe fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar);

/// Reads a shader or program info log at its full reported length.
fn read_info_log(object: GLuint, get_iv: GetIv, get_log: GetLog) -> String {
    let mut len: GLint = 0;
    unsafe { get_iv(object, gl::INFO_LOG_LENGTH, &mut len) };
    if len <= 0 {
        return String::new();
    }

    let mut buffer = vec![0u8; len as usize];
    let mut written: GLsizei = 0;
    unsafe { get_log(object, len, &mut written, buffer.as_mut_ptr() as *mut GLchar) };
    buffer.truncate(written.clamp(0, len) as usize);

    String::from_utf8_lossy(&buffer).into_owned()
}

fn query_flag(object: GLuint, pname: GLenum, get_iv: GetIv) -> bool {
    let mut status: GLint = gl::FALSE as GLint;
    unsafe { get_iv(object, pname, &mut status) };
    status == gl::TRUE as GLint
}

impl ShaderBackend for GlContext {
    type Shader = GLuint;
    type Program = GLuint;
    type UniformLocation = GLint;

    fn create_shader(&self, stage: ShaderStage) -> Result<GLuint, String> {
        let shader = unsafe { gl::CreateShader(stage_enum(stage)) };
        if shader == 0 {
            return Err(format!(
                "glCreateShader({stage}) returned 0 (GL error 0x{:04x})",
                self.last_error()
            ));
        }
        Ok(shader)
    }

    fn shader_source(&self, shader: GLuint, source: &str) {
        // Explicit length, so the text does not need a trailing NUL.
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        unsafe { gl::ShaderSource(shader, 1, &ptr, &len) };
    }

    fn compile_shader(&self, shader: GLuint) {
        unsafe { gl::CompileShader(shader) };
    }

    fn compile_status(&self, shader: GLuint) -> bool {
        query_flag(shader, gl::COMPILE_STATUS, gl::GetShaderiv)
    }

    fn shader_info_log(&self, shader: GLuint) -> String {
        read_info_log(shader, gl::GetShaderiv, gl::GetShaderInfoLog)
    }

    fn delete_shader(&self, shader: GLuint) {
        unsafe { gl::DeleteShader(shader) };
    }

    fn create_program(&self) -> Result<GLuint, String> {
        let program = unsafe { gl::CreateProgram() };
        if program == 0 {
            return Err(format!(
                "glCreateProgram returned 0 (GL error 0x{:04x})",
                self.last_error()
            ));
        }
        Ok(program)
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        unsafe { gl::AttachShader(program, shader) };
    }

    fn detach_shader(&self, program: GLuint, shader: GLuint) {
        unsafe { gl::DetachShader(program, shader) };
    }

    fn link_program(&self, program: GLuint) {
        unsafe { gl::LinkProgram(program) };
    }

    fn link_status(&self, program: GLuint) -> bool {
        query_flag(program, gl::LINK_STATUS, gl::GetProgramiv)
    }

    fn validate_program(&self, program: GLuint) {
        unsafe { gl::ValidateProgram(program) };
    }

    fn validate_status(&self, program: GLuint) -> bool {
        query_flag(program, gl::VALIDATE_STATUS, gl::GetProgramiv)
    }

    fn program_info_log(&self, program: GLuint) -> String {
        read_info_log(program, gl::GetProgramiv, gl::GetProgramInfoLog)
    }

    fn delete_program(&self, program: GLuint) {
        unsafe { gl::DeleteProgram(program) };
    }

    fn use_program(&self, program: Option<GLuint>) {
        unsafe { gl::UseProgram(program.unwrap_or(0)) };
    }

    fn uniform_location(&self, program: GLuint, name: &str) -> Option<GLint> {
        let cname = CString::new(name).ok()?;
        let location = unsafe { gl::GetUniformLocation(program, cname.as_ptr()) };
        (location >= 0).then_some(location)
    }

    fn set_uniform(&self, location: GLint, value: Uniform) {
        unsafe {
            match value {
                Uniform::Int(v) => gl::Uniform1i(location, v),
                Uniform::Float(v) => gl::Uniform1f(location, v),
                Uniform::Vec2(v) => gl::Uniform2f(location, v.x, v.y),
                Uniform::Vec3(v) => gl::Uniform3f(location, v.x, v.y, v.z),
                Uniform::Vec4(v) => gl::Uniform4f(location, v.x, v.y, v.z, v.w),
                Uniform::Mat4(m) => {
                    let cols = m.to_cols_array();
                    gl::UniformMatrix4fv(location, 1, gl::FALSE, cols.as_ptr());
                }
            }
        }
    }
}
