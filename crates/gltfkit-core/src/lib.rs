//! # gltfkit-core
//!
//! In-memory model of a glTF 2.0 asset and the decoding machinery behind it.
//!
//! The [`Document`] owns every entity; entities refer to each other through
//! typed indices such as [`AccessorId`] and [`NodeId`]. Accessor data is
//! decoded on demand with [`Document::read_accessor`], which resolves byte
//! strides, sparse patches and `EXT_meshopt_compression` buffer views.
//! Decompressed views are cached per document and shared between threads.
//!
//! Mesh decompression (Draco) is not built in: implement
//! [`MeshDecompressor`] and register it with the loader.

pub mod accessor;
pub mod animation;
pub mod buffer;
pub mod cancel;
pub mod decode;
pub mod decompressor;
pub mod document;
pub mod error;
pub mod indices;
pub mod material;
pub mod mesh;
pub mod node;
pub mod object;
pub mod scene;
pub mod texture;
pub mod types;
pub mod workflow;

pub use accessor::{Accessor, SparseStorage};
pub use animation::{Animation, AnimationSampler, Channel, KeyframeTrack};
pub use buffer::{Buffer, BufferView, MeshoptCompression, MeshoptFilter, MeshoptMode};
pub use cancel::CancelToken;
pub use decode::{AccessorData, ViewBytes};
pub use decompressor::{DecodedPrimitive, MeshDecompressor};
pub use document::{Asset, Document};
pub use error::{ErrorCode, GltfError, Result};
pub use indices::*;
pub use material::{Material, MaterialVariant, TextureParams, Workflow};
pub use mesh::{AttributeMap, DracoCompression, MaterialMapping, Mesh, Primitive};
pub use node::{Node, TransformSource};
pub use object::{Common, Extensions, ObjectId};
pub use scene::{Camera, Light, LightKind, Projection, Scene, Skin};
pub use texture::{Image, ImageData, Texture, TextureRealizer, TextureSampler};
pub use types::{
    AlphaMode, BufferTarget, ComponentType, Dimension, ElementLayout, Interpolation, MagFilter,
    MinFilter, PrimitiveMode, TargetPath, WrapMode,
};
