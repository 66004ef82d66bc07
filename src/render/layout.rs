use gl::types::GLenum;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Vertex stride must be non-zero")]
    ZeroStride,
    #[error("Vertex layout has no attributes")]
    NoAttributes,
    #[error("Attribute {location} has {components} components (expected 1-4)")]
    InvalidComponentCount { location: u32, components: u8 },
    #[error("Attribute location {0} is used twice")]
    DuplicateLocation(u32),
    #[error("Attribute {location} ends at byte {end}, past the stride of {stride}")]
    OutOfBounds {
        location: u32,
        end: usize,
        stride: usize,
    },
    #[error("Attribute {location} offset {offset} is not aligned to {align} bytes")]
    Misaligned {
        location: u32,
        offset: usize,
        align: usize,
    },
    #[error("Attributes {first} and {second} overlap")]
    Overlap { first: u32, second: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttribType {
    F32,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
}

impl AttribType {
    pub fn size(self) -> usize {
        match self {
            AttribType::I8 | AttribType::U8 => 1,
            AttribType::I16 | AttribType::U16 => 2,
            AttribType::F32 | AttribType::I32 | AttribType::U32 => 4,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, AttribType::F32)
    }

    pub fn gl_enum(self) -> GLenum {
        match self {
            AttribType::F32 => gl::FLOAT,
            AttribType::I8 => gl::BYTE,
            AttribType::U8 => gl::UNSIGNED_BYTE,
            AttribType::I16 => gl::SHORT,
            AttribType::U16 => gl::UNSIGNED_SHORT,
            AttribType::I32 => gl::INT,
            AttribType::U32 => gl::UNSIGNED_INT,
        }
    }
}

/// One vertex attribute inside an interleaved buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u8,
    pub kind: AttribType,
    /// Integer data is read as fixed-point floats in [0, 1] / [-1, 1].
    pub normalized: bool,
    pub offset: usize,
}

impl VertexAttribute {
    pub fn new(location: u32, components: u8, kind: AttribType, offset: usize) -> Self {
        Self {
            location,
            components,
            kind,
            normalized: false,
            offset,
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    pub fn size(&self) -> usize {
        self.components as usize * self.kind.size()
    }

    pub fn end(&self) -> usize {
        self.offset + self.size()
    }

    /// Integer attributes that are not normalized go through the `I` entry point.
    pub fn is_integer_input(&self) -> bool {
        self.kind.is_integer() && !self.normalized
    }
}

/// Stride plus attribute list for one interleaved vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    stride: usize,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new(stride: usize) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    pub fn with(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Tightly packed attributes in declaration order.
    pub fn builder() -> PackedLayoutBuilder {
        PackedLayoutBuilder::default()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.stride == 0 {
            return Err(LayoutError::ZeroStride);
        }
        if self.attributes.is_empty() {
            return Err(LayoutError::NoAttributes);
        }

        for (i, attr) in self.attributes.iter().enumerate() {
            if !(1..=4).contains(&attr.components) {
                return Err(LayoutError::InvalidComponentCount {
                    location: attr.location,
                    components: attr.components,
                });
            }
            if attr.offset % attr.kind.size() != 0 {
                return Err(LayoutError::Misaligned {
                    location: attr.location,
                    offset: attr.offset,
                    align: attr.kind.size(),
                });
            }
            if attr.end() > self.stride {
                return Err(LayoutError::OutOfBounds {
                    location: attr.location,
                    end: attr.end(),
                    stride: self.stride,
                });
            }

            for other in &self.attributes[..i] {
                if other.location == attr.location {
                    return Err(LayoutError::DuplicateLocation(attr.location));
                }
                if attr.offset < other.end() && other.offset < attr.end() {
                    return Err(LayoutError::Overlap {
                        first: other.location,
                        second: attr.location,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PackedLayoutBuilder {
    attributes: Vec<VertexAttribute>,
    offset: usize,
}

impl PackedLayoutBuilder {
    pub fn attribute(self, location: u32, components: u8, kind: AttribType) -> Self {
        self.push(VertexAttribute::new(location, components, kind, 0))
    }

    pub fn normalized(self, location: u32, components: u8, kind: AttribType) -> Self {
        self.push(VertexAttribute::new(location, components, kind, 0).normalized())
    }

    fn push(mut self, mut attribute: VertexAttribute) -> Self {
        // Keep every attribute aligned to its component size.
        let align = attribute.kind.size();
        self.offset = self.offset.div_ceil(align) * align;
        attribute.offset = self.offset;
        self.offset += attribute.size();
        self.attributes.push(attribute);
        self
    }

    pub fn build(self) -> VertexLayout {
        let align = self
            .attributes
            .iter()
            .map(|a| a.kind.size())
            .max()
            .unwrap_or(1);
        VertexLayout {
            stride: self.offset.div_ceil(align) * align,
            attributes: self.attributes,
        }
    }
}
