//! Pluggable mesh decompression.

use indexmap::IndexMap;

use crate::decode::AccessorData;
use crate::error::Result;

/// Output of a mesh decompressor: decoded attribute streams keyed by
/// semantic, and optional indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPrimitive {
    pub attributes: IndexMap<String, AccessorData>,
    pub indices: Option<AccessorData>,
}

/// Decoder for a compressed primitive payload such as
/// `KHR_draco_mesh_compression`.
///
/// `attributes` maps each semantic to its attribute id inside the
/// compressed stream.
pub trait MeshDecompressor: Send + Sync {
    fn decompress(
        &self,
        compressed: &[u8],
        attributes: &IndexMap<String, u32>,
    ) -> Result<DecodedPrimitive>;
}
