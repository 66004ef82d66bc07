use crate::render::backend::GlContext;
use crate::render::layout::{AttribType, LayoutError, VertexAttribute, VertexLayout};
use bytemuck::{Pod, Zeroable};
use gl::types::*;
use log::debug;
use std::ffi::c_void;
use std::mem::{offset_of, size_of};
use std::ptr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("Mesh has no vertices")]
    Empty,
    #[error("Index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("Vertex layout stride {stride} does not match vertex size {size}")]
    StrideMismatch { stride: usize, size: usize },
    #[error("Invalid vertex layout: {0}")]
    Layout(#[from] LayoutError),
}

/// A vertex type that knows how it is laid out in memory.
pub trait Vertex: Pod {
    fn layout() -> VertexLayout;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColoredVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl ColoredVertex {
    pub const POSITION_LOCATION: u32 = 0;
    pub const COLOR_LOCATION: u32 = 1;

    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }
}

impl Vertex for ColoredVertex {
    fn layout() -> VertexLayout {
        VertexLayout::new(size_of::<Self>())
            .with(VertexAttribute::new(
                Self::POSITION_LOCATION,
                3,
                AttribType::F32,
                offset_of!(ColoredVertex, position),
            ))
            .with(VertexAttribute::new(
                Self::COLOR_LOCATION,
                4,
                AttribType::F32,
                offset_of!(ColoredVertex, color),
            ))
    }
}

/// CPU-side triangle mesh. An empty index list means non-indexed drawing.
#[derive(Debug, Clone)]
pub struct MeshData<V: Vertex> {
    pub vertices: Vec<V>,
    pub indices: Vec<u32>,
}

impl<V: Vertex> MeshData<V> {
    pub fn new(vertices: Vec<V>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Number of elements one draw call submits.
    pub fn element_count(&self) -> usize {
        if self.is_indexed() {
            self.indices.len()
        } else {
            self.vertices.len()
        }
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        if self.vertices.is_empty() {
            return Err(MeshError::Empty);
        }
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: self.vertices.len(),
            });
        }

        let layout = V::layout();
        layout.validate()?;
        if layout.stride() != size_of::<V>() {
            return Err(MeshError::StrideMismatch {
                stride: layout.stride(),
                size: size_of::<V>(),
            });
        }
        Ok(())
    }
}

/// Points the bound vertex array at `layout` inside the bound array buffer.
fn attach_layout(layout: &VertexLayout) -> Result<(), LayoutError> {
    layout.validate()?;
    let stride = layout.stride() as GLsizei;

    for attr in layout.attributes() {
        // GL takes the byte offset through the pointer argument.
        let offset = attr.offset as *const c_void;
        unsafe {
            gl::EnableVertexAttribArray(attr.location);
            if attr.is_integer_input() {
                gl::VertexAttribIPointer(
                    attr.location,
                    attr.components as GLint,
                    attr.kind.gl_enum(),
                    stride,
                    offset,
                );
            } else {
                gl::VertexAttribPointer(
                    attr.location,
                    attr.components as GLint,
                    attr.kind.gl_enum(),
                    if attr.normalized { gl::TRUE } else { gl::FALSE },
                    stride,
                    offset,
                );
            }
        }
    }
    Ok(())
}

/// A mesh uploaded to the GPU: one VAO, one vertex buffer, optional index buffer.
pub struct GpuMesh {
    vao: GLuint,
    vbo: GLuint,
    ebo: Option<GLuint>,
    count: GLsizei,
}

impl GpuMesh {
    pub fn upload<V: Vertex>(_gl: &GlContext, data: &MeshData<V>) -> Result<Self, MeshError> {
        data.validate()?;
        let layout = V::layout();

        let mut vao = 0;
        let mut vbo = 0;
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&data.vertices);

        unsafe {
            gl::GenVertexArrays(1, &mut vao);
            gl::BindVertexArray(vao);

            gl::GenBuffers(1, &mut vbo);
            gl::BindBuffer(gl::ARRAY_BUFFER, vbo);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                vertex_bytes.len() as GLsizeiptr,
                vertex_bytes.as_ptr() as *const c_void,
                gl::STATIC_DRAW,
            );
        }

        let mut mesh = GpuMesh {
            vao,
            vbo,
            ebo: None,
            count: data.element_count() as GLsizei,
        };

        if let Err(e) = attach_layout(&layout) {
            unsafe { gl::BindVertexArray(0) };
            return Err(e.into());
        }

        if data.is_indexed() {
            let index_bytes: &[u8] = bytemuck::cast_slice(&data.indices);
            let mut ebo = 0;
            unsafe {
                gl::GenBuffers(1, &mut ebo);
                gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, ebo);
                gl::BufferData(
                    gl::ELEMENT_ARRAY_BUFFER,
                    index_bytes.len() as GLsizeiptr,
                    index_bytes.as_ptr() as *const c_void,
                    gl::STATIC_DRAW,
                );
            }
            mesh.ebo = Some(ebo);
        }

        unsafe {
            gl::BindVertexArray(0);
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
        }

        debug!(
            "Uploaded mesh: {} vertices, {} indices, vao {}",
            data.vertices.len(),
            data.indices.len(),
            vao
        );
        Ok(mesh)
    }

    pub fn draw(&self) {
        unsafe {
            gl::BindVertexArray(self.vao);
            if self.ebo.is_some() {
                gl::DrawElements(
                    gl::TRIANGLES,
                    self.count,
                    gl::UNSIGNED_INT,
                    ptr::null(),
                );
            } else {
                gl::DrawArrays(gl::TRIANGLES, 0, self.count);
            }
            gl::BindVertexArray(0);
        }
    }
}

impl Drop for GpuMesh {
    fn drop(&mut self) {
        unsafe {
            if let Some(ebo) = self.ebo {
                gl::DeleteBuffers(1, &ebo);
            }
            gl::DeleteBuffers(1, &self.vbo);
            gl::DeleteVertexArrays(1, &self.vao);
        }
    }
}
