use serde::{Deserialize, Serialize};

/// Component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    F32,
    U8,
    U16,
    I16,
}

impl AttributeType {
    pub const fn byte_size(self) -> u32 {
        match self {
            AttributeType::F32 => 4,
            AttributeType::U8 => 1,
            AttributeType::U16 | AttributeType::I16 => 2,
        }
    }
}

impl Default for AttributeType {
    fn default() -> Self {
        AttributeType::F32
    }
}

/// One interleaved vertex attribute. Missing fields in a config record
/// fall back to a single non-normalized float, matching the most common
/// attribute shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexAttribute {
    pub name: String,
    #[serde(default = "VertexAttribute::default_size")]
    pub size: u32,
    #[serde(default, rename = "type")]
    pub ty: AttributeType,
    #[serde(default)]
    pub normalized: bool,
}

impl VertexAttribute {
    /// A `size`-component float attribute.
    pub fn floats(name: &str, size: u32) -> Self {
        Self {
            name: name.to_string(),
            size,
            ty: AttributeType::F32,
            normalized: false,
        }
    }

    /// A normalized unsigned-byte attribute, the usual packing for
    /// per-vertex colors.
    pub fn normalized_u8(name: &str, size: u32) -> Self {
        Self {
            name: name.to_string(),
            size,
            ty: AttributeType::U8,
            normalized: true,
        }
    }

    pub fn byte_size(&self) -> u32 {
        self.size * self.ty.byte_size()
    }

    const fn default_size() -> u32 {
        1
    }
}

/// Buffer update frequency hint passed through to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferUsage {
    Static,
    Dynamic,
    Stream,
}

impl Default for BufferUsage {
    fn default() -> Self {
        BufferUsage::Dynamic
    }
}

/// An interleaved vertex buffer layout: usage hint plus ordered
/// attributes. The stride is derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexBufferLayout {
    #[serde(default)]
    pub usage: BufferUsage,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexBufferLayout {
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        Self {
            usage: BufferUsage::default(),
            attributes,
        }
    }

    pub fn stride(&self) -> u32 {
        self.attributes.iter().map(VertexAttribute::byte_size).sum()
    }
}
