//! Load and export options.

use std::path::{Path, PathBuf};

use crate::registry::Registry;

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Generate smooth normals for triangle primitives that have none.
    pub create_normals_if_absent: bool,
    /// Directory relative URIs resolve against. Defaults to the directory of
    /// the loaded file; in-memory loads without it only accept embedded data.
    pub asset_directory: Option<PathBuf>,
    pub registry: Registry,
}

impl LoadOptions {
    pub fn new() -> Self {
        LoadOptions::default()
    }

    pub fn with_create_normals_if_absent(mut self, create: bool) -> Self {
        self.create_normals_if_absent = create;
        self
    }

    pub fn with_asset_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.asset_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Write a single GLB container instead of glTF JSON.
    pub binary: bool,
    /// Written to `asset.generator` when the document names none. Without
    /// either, no generator is written.
    pub generator: Option<String>,
}

impl ExportOptions {
    pub fn new() -> Self {
        ExportOptions::default()
    }

    pub fn binary() -> Self {
        ExportOptions {
            binary: true,
            ..ExportOptions::default()
        }
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = Some(generator.into());
        self
    }
}
