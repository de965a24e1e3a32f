//! Caller-supplied mesh decompressors, keyed by extension name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gltfkit_core::MeshDecompressor;

use crate::extensions::KHR_DRACO_MESH_COMPRESSION;

/// Maps an extension name to the decompressor that handles it.
///
/// Cloning is cheap; clones share the registered decompressors.
#[derive(Clone, Default)]
pub struct Registry {
    decompressors: HashMap<String, Arc<dyn MeshDecompressor>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&mut self, extension: impl Into<String>, decompressor: Arc<dyn MeshDecompressor>) {
        let extension = extension.into();
        log::debug!("registered mesh decompressor for {}", extension);
        self.decompressors.insert(extension, decompressor);
    }

    /// Builder form of [`Registry::register`].
    pub fn with_decompressor(
        mut self,
        extension: impl Into<String>,
        decompressor: Arc<dyn MeshDecompressor>,
    ) -> Self {
        self.register(extension, decompressor);
        self
    }

    /// Shorthand for registering a `KHR_draco_mesh_compression` decoder.
    pub fn with_draco(self, decompressor: Arc<dyn MeshDecompressor>) -> Self {
        self.with_decompressor(KHR_DRACO_MESH_COMPRESSION, decompressor)
    }

    pub fn decompressor(&self, extension: &str) -> Option<&Arc<dyn MeshDecompressor>> {
        self.decompressors.get(extension)
    }

    pub fn is_empty(&self) -> bool {
        self.decompressors.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.decompressors.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("decompressors", &names).finish()
    }
}
