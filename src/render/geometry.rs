// geometry.rs - mesh builders for the demo scenes

use crate::render::mesh::{ColoredVertex, MeshData};
use glam::{Vec3, Vec4};
use std::f32::consts::PI;

/// Direction the sphere's baked lighting comes from.
pub const LIGHT_DIRECTION: Vec3 = Vec3::new(1.0, 0.0, 2.0);
const AMBIENT: f32 = 0.3;

/// The classic red/green/blue triangle.
pub fn triangle() -> MeshData<ColoredVertex> {
    MeshData::new(
        vec![
            ColoredVertex::new([-0.5, -0.5, 0.0], [1.0, 0.0, 0.0, 1.0]),
            ColoredVertex::new([0.5, -0.5, 0.0], [0.0, 1.0, 0.0, 1.0]),
            ColoredVertex::new([0.0, 0.5, 0.0], [0.0, 0.0, 1.0, 1.0]),
        ],
        Vec::new(),
    )
}

pub fn quad(color: Vec4) -> MeshData<ColoredVertex> {
    let c = color.to_array();
    MeshData::new(
        vec![
            ColoredVertex::new([-0.5, -0.5, 0.0], c),
            ColoredVertex::new([0.5, -0.5, 0.0], c),
            ColoredVertex::new([0.5, 0.5, 0.0], c),
            ColoredVertex::new([-0.5, 0.5, 0.0], c),
        ],
        vec![0, 1, 2, 2, 3, 0],
    )
}

/// Grid in the XY plane centred on the origin.
pub fn plane(
    width: f32,
    height: f32,
    width_segments: u32,
    height_segments: u32,
    color: Vec4,
) -> MeshData<ColoredVertex> {
    let ws = width_segments.max(1);
    let hs = height_segments.max(1);
    let c = color.to_array();

    let mut vertices = Vec::with_capacity(((ws + 1) * (hs + 1)) as usize);
    for iy in 0..=hs {
        let y = height * 0.5 - height * iy as f32 / hs as f32;
        for ix in 0..=ws {
            let x = width * ix as f32 / ws as f32 - width * 0.5;
            vertices.push(ColoredVertex::new([x, y, 0.0], c));
        }
    }

    let mut indices = Vec::with_capacity((ws * hs * 6) as usize);
    for iy in 0..hs {
        for ix in 0..ws {
            let a = ix + (ws + 1) * iy;
            let b = ix + (ws + 1) * (iy + 1);
            let c = (ix + 1) + (ws + 1) * (iy + 1);
            let d = (ix + 1) + (ws + 1) * iy;
            indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    MeshData::new(vertices, indices)
}

/// UV sphere with Lambert shading baked into the vertex colours.
///
/// Segment counts are clamped to at least 3 around and 2 from pole to pole.
pub fn sphere(
    radius: f32,
    width_segments: u32,
    height_segments: u32,
    color: Vec4,
) -> MeshData<ColoredVertex> {
    let ws = width_segments.max(3);
    let hs = height_segments.max(2);
    let light = LIGHT_DIRECTION.normalize();

    let mut vertices = Vec::with_capacity(((ws + 1) * (hs + 1)) as usize);
    for iy in 0..=hs {
        let v = iy as f32 / hs as f32;
        for ix in 0..=ws {
            let u = ix as f32 / ws as f32;
            let normal = Vec3::new(
                -(u * 2.0 * PI).cos() * (v * PI).sin(),
                (v * PI).cos(),
                (u * 2.0 * PI).sin() * (v * PI).sin(),
            );
            let shade = AMBIENT + (1.0 - AMBIENT) * normal.dot(light).max(0.0);
            let lit = (color.truncate() * shade).extend(color.w);
            vertices.push(ColoredVertex::new(
                (normal * radius).to_array(),
                lit.to_array(),
            ));
        }
    }

    let row = ws + 1;
    let mut indices = Vec::new();
    for iy in 0..hs {
        for ix in 0..ws {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            // The pole rows collapse to a single triangle per segment.
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != hs - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    MeshData::new(vertices, indices)
}
