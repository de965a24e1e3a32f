//! Buffers and buffer views.

use crate::indices::BufferId;
use crate::object::Common;
use crate::types::BufferTarget;

/// Raw byte storage.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    pub common: Common,
    pub byte_length: usize,
    /// Owned bytes. Absent for buffers that only exist as a compression fallback.
    pub data: Option<Vec<u8>>,
    /// External location of the bytes. Data URIs are never stored here.
    pub uri: Option<String>,
    /// Serialized inline as a base64 data URI. Set for buffers loaded from a
    /// data URI and for buffers generated while processing a load.
    pub from_data_uri: bool,
    /// Declared as `EXT_meshopt_compression` fallback: no loadable data.
    pub is_compression_fallback: bool,
}

impl Buffer {
    /// A buffer owning `data`, to be embedded on save.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Buffer {
            byte_length: data.len(),
            data: Some(data),
            ..Buffer::default()
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

/// Encoding of a meshopt-compressed buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshoptMode {
    Attributes,
    Triangles,
    Indices,
}

impl MeshoptMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ATTRIBUTES" => Some(MeshoptMode::Attributes),
            "TRIANGLES" => Some(MeshoptMode::Triangles),
            "INDICES" => Some(MeshoptMode::Indices),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeshoptMode::Attributes => "ATTRIBUTES",
            MeshoptMode::Triangles => "TRIANGLES",
            MeshoptMode::Indices => "INDICES",
        }
    }
}

/// Post-decode transform applied to each element of an attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeshoptFilter {
    #[default]
    None,
    Octahedral,
    Quaternion,
    Exponential,
}

impl MeshoptFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(MeshoptFilter::None),
            "OCTAHEDRAL" => Some(MeshoptFilter::Octahedral),
            "QUATERNION" => Some(MeshoptFilter::Quaternion),
            "EXPONENTIAL" => Some(MeshoptFilter::Exponential),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeshoptFilter::None => "NONE",
            MeshoptFilter::Octahedral => "OCTAHEDRAL",
            MeshoptFilter::Quaternion => "QUATERNION",
            MeshoptFilter::Exponential => "EXPONENTIAL",
        }
    }
}

/// Compressed backing storage of a buffer view.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshoptCompression {
    pub buffer: BufferId,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: usize,
    pub count: usize,
    pub mode: MeshoptMode,
    pub filter: MeshoptFilter,
}

impl MeshoptCompression {
    /// Size of the decoded stream, `None` when it overflows.
    pub fn decoded_len(&self) -> Option<usize> {
        self.count.checked_mul(self.byte_stride)
    }

    /// End of the compressed bytes within their buffer.
    pub fn end(&self) -> Option<usize> {
        self.byte_offset.checked_add(self.byte_length)
    }
}

/// A byte range of a buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferView {
    pub common: Common,
    pub buffer: BufferId,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<BufferTarget>,
    pub compression: Option<MeshoptCompression>,
}

impl BufferView {
    pub fn new(buffer: BufferId, byte_offset: usize, byte_length: usize) -> Self {
        BufferView {
            buffer,
            byte_offset,
            byte_length,
            ..BufferView::default()
        }
    }

    /// End of the view within its buffer, `None` when it overflows.
    pub fn end(&self) -> Option<usize> {
        self.byte_offset.checked_add(self.byte_length)
    }
}
