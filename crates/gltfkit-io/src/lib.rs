//! # gltfkit-io
//!
//! Loading and saving of glTF 2.0 assets, as `.gltf` JSON or `.glb`
//! containers, on top of the [`gltfkit_core`] document model.
//!
//! ## Loading
//!
//! ```no_run
//! use gltfkit_io::{load_path, LoadOptions};
//!
//! let doc = load_path("scene.glb", LoadOptions::new())?;
//! let positions = doc.read_accessor(gltfkit_core::AccessorId(0))?.to_f32();
//! # Ok::<(), gltfkit_core::GltfError>(())
//! ```
//!
//! The `*_async` entry points return a [`Task`] and report every pipeline
//! [`Status`] to a listener, which can cancel the work.
//!
//! ## Extensions
//!
//! Recognized extensions are decoded into the model; unknown ones are kept
//! verbatim on their entity and written back on save. A document that
//! *requires* an extension nothing can decode fails to load.
//! `KHR_draco_mesh_compression` needs a [`gltfkit_core::MeshDecompressor`]
//! registered through [`Registry`].

pub mod container;
pub mod extensions;
pub mod images;
pub mod options;
pub mod pipeline;
pub mod processing;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod uri;
pub mod writer;

pub use container::{is_glb, read_container, write_glb, Container};
pub use images::{image_data, realize_texture};
pub use options::{ExportOptions, LoadOptions};
pub use pipeline::{
    load_bytes, load_bytes_async, load_path, load_path_async, serialize_async, write_path_async,
    Listener, Progress, Status, Task,
};
pub use registry::Registry;
pub use resolver::{parse_root, Resolver};
pub use writer::{serialize, write_to_path};
