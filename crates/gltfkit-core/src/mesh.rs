//! Meshes and primitives.

use indexmap::IndexMap;

use crate::indices::{AccessorId, BufferViewId, MaterialId, VariantId};
use crate::object::Common;
use crate::types::PrimitiveMode;

/// Attribute semantic (`POSITION`, `TEXCOORD_0`, ...) to accessor, in declaration order.
pub type AttributeMap = IndexMap<String, AccessorId>;

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub common: Common,
    pub primitives: Vec<Primitive>,
    /// Default morph target weights.
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct Primitive {
    pub common: Common,
    pub attributes: AttributeMap,
    pub indices: Option<AccessorId>,
    pub material: Option<MaterialId>,
    pub mode: PrimitiveMode,
    pub targets: Vec<AttributeMap>,
    pub variant_mappings: Vec<MaterialMapping>,
    /// Geometry stored by an external mesh codec. Cleared once decoded.
    pub draco: Option<DracoCompression>,
}

impl Primitive {
    pub fn attribute(&self, semantic: &str) -> Option<AccessorId> {
        self.attributes.get(semantic).copied()
    }
}

/// `KHR_draco_mesh_compression` descriptor of a primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct DracoCompression {
    pub buffer_view: BufferViewId,
    /// Semantic to attribute id inside the compressed stream.
    pub attributes: IndexMap<String, u32>,
}

/// Material used by a primitive when any of `variants` is active.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialMapping {
    pub material: MaterialId,
    pub variants: Vec<VariantId>,
    pub name: Option<String>,
}
