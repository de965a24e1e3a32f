//! The document: owner of every entity collection.

use std::path::PathBuf;

use serde_json::Value;

use crate::accessor::Accessor;
use crate::animation::Animation;
use crate::buffer::{Buffer, BufferView, MeshoptMode};
use crate::decode::accessor::span_end;
use crate::decode::cache::DecodeCache;
use crate::error::{GltfError, Result};
use crate::indices::*;
use crate::material::{Material, MaterialVariant, TextureParams};
use crate::mesh::{AttributeMap, Mesh};
use crate::node::Node;
use crate::object::Extensions;
use crate::scene::{Camera, Light, Scene, Skin};
use crate::texture::{Image, Texture, TextureSampler};
use crate::types::{Dimension, Interpolation};

/// `asset` metadata.
#[derive(Debug, Clone)]
pub struct Asset {
    pub version: String,
    pub min_version: Option<String>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    pub extensions: Extensions,
    pub extras: Option<Value>,
}

impl Default for Asset {
    fn default() -> Self {
        Asset {
            version: "2.0".to_string(),
            min_version: None,
            generator: None,
            copyright: None,
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

/// A complete glTF asset. Entities reference each other by typed index into
/// the collections held here.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub asset: Asset,
    /// Location the document was loaded from, if any.
    pub url: Option<PathBuf>,
    pub extensions_used: Vec<String>,
    pub extensions_required: Vec<String>,

    pub accessors: Vec<Accessor>,
    pub animations: Vec<Animation>,
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub cameras: Vec<Camera>,
    pub images: Vec<Image>,
    pub lights: Vec<Light>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub samplers: Vec<TextureSampler>,
    pub scenes: Vec<Scene>,
    pub skins: Vec<Skin>,
    pub textures: Vec<Texture>,
    pub variants: Vec<MaterialVariant>,
    pub default_scene: Option<SceneId>,

    /// Top-level extensions that were not interpreted.
    pub extensions: Extensions,
    pub extras: Option<Value>,

    pub(crate) decode_cache: DecodeCache,
}

fn check<T>(what: &str, index: usize, items: &[T]) -> Result<()> {
    if index < items.len() {
        Ok(())
    } else {
        Err(GltfError::invalid(format!(
            "{} index {} out of range ({} declared)",
            what,
            index,
            items.len()
        )))
    }
}

/// Parse the major component of a `major.minor` version string.
pub fn major_version(version: &str) -> Option<u32> {
    let (major, minor) = version.split_once('.')?;
    minor.parse::<u32>().ok()?;
    major.parse().ok()
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn accessor(&self, id: AccessorId) -> Result<&Accessor> {
        self.accessors
            .get(id.index())
            .ok_or_else(|| GltfError::invalid(format!("Invalid accessor index: {}", id.0)))
    }

    pub fn buffer_view(&self, id: BufferViewId) -> Result<&BufferView> {
        self.buffer_views
            .get(id.index())
            .ok_or_else(|| GltfError::invalid(format!("Invalid buffer view index: {}", id.0)))
    }

    pub fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers
            .get(id.index())
            .ok_or_else(|| GltfError::invalid(format!("Invalid buffer index: {}", id.0)))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| GltfError::invalid(format!("Invalid node index: {}", id.0)))
    }

    /// The default scene, or the first one when none is designated.
    pub fn scene(&self) -> Option<&Scene> {
        match self.default_scene {
            Some(id) => self.scenes.get(id.index()),
            None => self.scenes.first(),
        }
    }

    /// Root nodes: those without a parent, in declaration order.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].parent.is_none())
            .map(NodeId::from)
            .collect()
    }

    /// Drop all cached decompressed buffer views.
    pub fn clear_decoded_cache(&self) {
        self.decode_cache.clear();
    }

    /// Check reference integrity and graph invariants, and fill in node
    /// parent links.
    pub fn validate(&mut self) -> Result<()> {
        self.check()?;
        let parents = self.parent_links()?;
        for (node, parent) in self.nodes.iter_mut().zip(parents) {
            node.parent = parent;
        }
        Ok(())
    }

    /// The checks of [`Document::validate`] without touching the document.
    pub fn check(&self) -> Result<()> {
        self.validate_version()?;
        self.validate_buffers()?;
        self.validate_accessors()?;
        self.validate_meshes()?;
        self.validate_materials()?;
        self.validate_skins()?;
        self.validate_animations()?;
        self.validate_scenes()?;
        self.parent_links()?;
        self.detect_cycles()
    }

    fn validate_version(&self) -> Result<()> {
        match major_version(&self.asset.version) {
            Some(2) => {}
            Some(1) => {
                return Err(GltfError::LegacyFormatUnsupported(format!(
                    "asset version {}",
                    self.asset.version
                )))
            }
            _ => {
                return Err(GltfError::invalid(format!(
                    "Unsupported asset version: {}",
                    self.asset.version
                )))
            }
        }
        if let Some(min) = &self.asset.min_version {
            if major_version(min) != Some(2) {
                return Err(GltfError::invalid(format!("Unsupported minVersion: {}", min)));
            }
        }
        Ok(())
    }

    fn validate_buffers(&self) -> Result<()> {
        for (i, buffer) in self.buffers.iter().enumerate() {
            if let Some(data) = &buffer.data {
                if data.len() != buffer.byte_length {
                    return Err(GltfError::invalid(format!(
                        "Buffer {} holds {} bytes but declares byteLength {}",
                        i,
                        data.len(),
                        buffer.byte_length
                    )));
                }
            }
        }

        for (i, view) in self.buffer_views.iter().enumerate() {
            check("buffer", view.buffer.index(), &self.buffers)?;
            let buffer = &self.buffers[view.buffer.index()];
            match view.end() {
                Some(end) if end <= buffer.byte_length => {}
                _ => {
                    return Err(GltfError::invalid(format!(
                        "Buffer view {} (offset {}, length {}) exceeds buffer length {}",
                        i, view.byte_offset, view.byte_length, buffer.byte_length
                    )))
                }
            }
            if view.byte_stride == Some(0) {
                return Err(GltfError::invalid(format!("Buffer view {} has zero stride", i)));
            }
            if let Some(c) = &view.compression {
                check("buffer", c.buffer.index(), &self.buffers)?;
                let source = &self.buffers[c.buffer.index()];
                if c.end().map_or(true, |end| end > source.byte_length) {
                    return Err(GltfError::invalid(format!(
                        "Compressed data of buffer view {} exceeds its buffer",
                        i
                    )));
                }
                let stride_ok = match c.mode {
                    MeshoptMode::Attributes => {
                        c.byte_stride > 0 && c.byte_stride <= 256 && c.byte_stride % 4 == 0
                    }
                    MeshoptMode::Triangles => {
                        (c.byte_stride == 2 || c.byte_stride == 4) && c.count % 3 == 0
                    }
                    MeshoptMode::Indices => c.byte_stride == 2 || c.byte_stride == 4,
                };
                if !stride_ok {
                    return Err(GltfError::invalid(format!(
                        "Buffer view {}: invalid stride {} or count {} for {} compression",
                        i,
                        c.byte_stride,
                        c.count,
                        c.mode.as_str()
                    )));
                }
                match c.decoded_len() {
                    Some(len) if len >= view.byte_length => {}
                    len => {
                        return Err(GltfError::invalid(format!(
                            "Buffer view {}: compressed stream of {} x {} bytes decodes to {:?}, view needs {}",
                            i, c.count, c.byte_stride, len, view.byte_length
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_accessors(&self) -> Result<()> {
        for (i, accessor) in self.accessors.iter().enumerate() {
            let layout = accessor.layout();
            if accessor.normalized && !accessor.component_type.is_integer() {
                return Err(GltfError::invalid(format!(
                    "Accessor {} is normalized but has float components",
                    i
                )));
            }
            let n = accessor.dimension.component_count();
            if (!accessor.min.is_empty() && accessor.min.len() != n)
                || (!accessor.max.is_empty() && accessor.max.len() != n)
            {
                return Err(GltfError::invalid(format!(
                    "Accessor {} min/max must have {} components",
                    i, n
                )));
            }

            if let Some(view_id) = accessor.buffer_view {
                check("buffer view", view_id.index(), &self.buffer_views)?;
                let view = &self.buffer_views[view_id.index()];
                let element = layout.stored_size();
                let stride = view.byte_stride.unwrap_or(element);
                if stride < element {
                    return Err(GltfError::invalid(format!(
                        "Accessor {}: stride {} smaller than element size {}",
                        i, stride, element
                    )));
                }
                match span_end(accessor.byte_offset, accessor.count, stride, element) {
                    Some(needed) if needed <= view.byte_length => {}
                    needed => {
                        return Err(GltfError::invalid(format!(
                            "Accessor {} ({} elements) needs {:?} bytes but buffer view {} has {}",
                            i, accessor.count, needed, view_id.0, view.byte_length
                        )))
                    }
                }
            }

            if let Some(sparse) = &accessor.sparse {
                if sparse.count > accessor.count {
                    return Err(GltfError::invalid(format!(
                        "Accessor {}: sparse count {} exceeds count {}",
                        i, sparse.count, accessor.count
                    )));
                }
                if !sparse.index_component_type.is_unsigned_integer() {
                    return Err(GltfError::invalid(format!(
                        "Accessor {}: sparse indices must be unsigned integers",
                        i
                    )));
                }
                check("buffer view", sparse.index_view.index(), &self.buffer_views)?;
                check("buffer view", sparse.value_view.index(), &self.buffer_views)?;
                let index_end = span_end(
                    sparse.index_offset,
                    sparse.count,
                    sparse.index_component_type.byte_size(),
                    sparse.index_component_type.byte_size(),
                );
                let value_end = span_end(
                    sparse.value_offset,
                    sparse.count,
                    layout.stored_size(),
                    layout.stored_size(),
                );
                let index_len = self.buffer_views[sparse.index_view.index()].byte_length;
                let value_len = self.buffer_views[sparse.value_view.index()].byte_length;
                if index_end.map_or(true, |end| end > index_len)
                    || value_end.map_or(true, |end| end > value_len)
                {
                    return Err(GltfError::invalid(format!(
                        "Accessor {}: sparse data exceeds its buffer views",
                        i
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_attributes(&self, what: &str, attributes: &AttributeMap) -> Result<Option<usize>> {
        let mut count = None;
        for (semantic, id) in attributes {
            check("accessor", id.index(), &self.accessors)?;
            let c = self.accessors[id.index()].count;
            match count {
                None => count = Some(c),
                Some(expected) if expected != c => {
                    return Err(GltfError::invalid(format!(
                        "{}: attribute {} has count {}, expected {}",
                        what, semantic, c, expected
                    )))
                }
                _ => {}
            }
        }
        Ok(count)
    }

    fn validate_meshes(&self) -> Result<()> {
        for (m, mesh) in self.meshes.iter().enumerate() {
            for (p, prim) in mesh.primitives.iter().enumerate() {
                let what = format!("Mesh {} primitive {}", m, p);
                let count = self.check_attributes(&what, &prim.attributes)?;
                for target in &prim.targets {
                    let target_count = self.check_attributes(&what, target)?;
                    if let (Some(a), Some(b)) = (count, target_count) {
                        if a != b {
                            return Err(GltfError::invalid(format!(
                                "{}: morph target count {} differs from attribute count {}",
                                what, b, a
                            )));
                        }
                    }
                }
                if let Some(indices) = prim.indices {
                    check("accessor", indices.index(), &self.accessors)?;
                    let accessor = &self.accessors[indices.index()];
                    if accessor.dimension != Dimension::Scalar
                        || !accessor.component_type.is_unsigned_integer()
                    {
                        return Err(GltfError::invalid(format!(
                            "{}: indices must be unsigned integer scalars",
                            what
                        )));
                    }
                }
                if let Some(material) = prim.material {
                    check("material", material.index(), &self.materials)?;
                }
                for mapping in &prim.variant_mappings {
                    check("material", mapping.material.index(), &self.materials)?;
                    for variant in &mapping.variants {
                        check("material variant", variant.index(), &self.variants)?;
                    }
                }
                if let Some(draco) = &prim.draco {
                    check("buffer view", draco.buffer_view.index(), &self.buffer_views)?;
                }
            }
        }
        Ok(())
    }

    fn check_texture(&self, params: &TextureParams) -> Result<()> {
        check("texture", params.texture.index(), &self.textures)
    }

    fn validate_materials(&self) -> Result<()> {
        for material in &self.materials {
            for params in material.texture_params() {
                self.check_texture(params)?;
            }
        }
        for texture in &self.textures {
            if let Some(s) = texture.sampler {
                check("sampler", s.index(), &self.samplers)?;
            }
            for image in [texture.source, texture.basisu_source, texture.webp_source]
                .into_iter()
                .flatten()
            {
                check("image", image.index(), &self.images)?;
            }
        }
        for (i, image) in self.images.iter().enumerate() {
            match (&image.uri, image.buffer_view) {
                (Some(_), None) => {}
                (None, Some(view)) => {
                    check("buffer view", view.index(), &self.buffer_views)?;
                    if image.mime_type.is_none() {
                        return Err(GltfError::invalid(format!(
                            "Image {} uses a buffer view but has no mimeType",
                            i
                        )));
                    }
                }
                _ => {
                    return Err(GltfError::invalid(format!(
                        "Image {} must have exactly one of uri or bufferView",
                        i
                    )))
                }
            }
        }
        Ok(())
    }

    fn validate_skins(&self) -> Result<()> {
        for (i, skin) in self.skins.iter().enumerate() {
            for joint in &skin.joints {
                check("node", joint.index(), &self.nodes)?;
            }
            if let Some(skeleton) = skin.skeleton {
                check("node", skeleton.index(), &self.nodes)?;
            }
            if let Some(ibm) = skin.inverse_bind_matrices {
                check("accessor", ibm.index(), &self.accessors)?;
                let count = self.accessors[ibm.index()].count;
                if count != skin.joints.len() {
                    return Err(GltfError::invalid(format!(
                        "Skin {} has {} joints but {} inverse bind matrices",
                        i,
                        skin.joints.len(),
                        count
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_animations(&self) -> Result<()> {
        for (a, animation) in self.animations.iter().enumerate() {
            for channel in &animation.channels {
                check("animation sampler", channel.sampler, &animation.samplers)?;
                if let Some(node) = channel.target_node {
                    check("node", node.index(), &self.nodes)?;
                }
            }
            for (s, sampler) in animation.samplers.iter().enumerate() {
                check("accessor", sampler.input.index(), &self.accessors)?;
                check("accessor", sampler.output.index(), &self.accessors)?;
                let input = self.accessors[sampler.input.index()].count;
                let output = self.accessors[sampler.output.index()].count;
                let ok = if input == 0 {
                    output == 0
                } else {
                    let ratio = output / input;
                    output % input == 0
                        && ratio >= 1
                        && (sampler.interpolation != Interpolation::CubicSpline || ratio % 3 == 0)
                };
                if !ok {
                    return Err(GltfError::invalid(format!(
                        "Animation {} sampler {}: {} outputs do not match {} inputs",
                        a, s, output, input
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_scenes(&self) -> Result<()> {
        for scene in &self.scenes {
            for node in &scene.nodes {
                check("node", node.index(), &self.nodes)?;
            }
        }
        if let Some(scene) = self.default_scene {
            check("scene", scene.index(), &self.scenes)?;
        }
        for node in &self.nodes {
            if let Some(c) = node.camera {
                check("camera", c.index(), &self.cameras)?;
            }
            if let Some(m) = node.mesh {
                check("mesh", m.index(), &self.meshes)?;
            }
            if let Some(s) = node.skin {
                check("skin", s.index(), &self.skins)?;
            }
            if let Some(l) = node.light {
                check("light", l.index(), &self.lights)?;
            }
            for child in &node.children {
                check("node", child.index(), &self.nodes)?;
            }
            for accessor in node.instancing.values() {
                check("accessor", accessor.index(), &self.accessors)?;
            }
        }
        Ok(())
    }

    fn parent_links(&self) -> Result<Vec<Option<NodeId>>> {
        let mut parents: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                if let Some(existing) = parents[child.index()] {
                    return Err(GltfError::invalid(format!(
                        "Node {} has more than one parent ({} and {})",
                        child.0, existing.0, i
                    )));
                }
                parents[child.index()] = Some(NodeId::from(i));
            }
        }
        Ok(parents)
    }

    /// Depth-first walk from every scene root, then from every node not yet
    /// reached, so cycles outside any scene are found as well.
    fn detect_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let starts = self
            .scenes
            .iter()
            .flat_map(|s| s.nodes.iter().map(|n| n.index()))
            .chain(0..self.nodes.len());

        for start in starts {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // (node, next child position)
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::InProgress;
            while let Some((node, pos)) = stack.pop() {
                let children = &self.nodes[node].children;
                if pos < children.len() {
                    stack.push((node, pos + 1));
                    let child = children[pos].index();
                    match marks[child] {
                        Mark::InProgress => {
                            return Err(GltfError::invalid(format!(
                                "Cycle detected at node {}",
                                child
                            )))
                        }
                        Mark::Unvisited => {
                            marks[child] = Mark::InProgress;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentType;

    fn doc_with_nodes(n: usize) -> Document {
        let mut doc = Document::new();
        doc.nodes = (0..n).map(|_| Node::default()).collect();
        doc
    }

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("2.0"), Some(2));
        assert_eq!(major_version("1.1"), Some(1));
        assert_eq!(major_version("two"), None);
    }

    #[test]
    fn test_parents_are_linked() {
        let mut doc = doc_with_nodes(3);
        doc.nodes[0].children = vec![NodeId(1), NodeId(2)];
        doc.scenes.push(Scene {
            nodes: vec![NodeId(0)],
            ..Scene::default()
        });
        doc.validate().unwrap();
        assert_eq!(doc.nodes[1].parent, Some(NodeId(0)));
        assert_eq!(doc.nodes[0].parent, None);
        assert_eq!(doc.root_nodes(), vec![NodeId(0)]);
    }

    #[test]
    fn test_two_node_cycle_is_rejected() {
        let mut doc = doc_with_nodes(2);
        doc.nodes[0].children = vec![NodeId(1)];
        doc.nodes[1].children = vec![NodeId(0)];
        let err = doc.validate().unwrap_err();
        assert!(err.to_string().contains("Cycle"));
    }

    #[test]
    fn test_self_child_is_rejected() {
        let mut doc = doc_with_nodes(1);
        doc.nodes[0].children = vec![NodeId(0)];
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_shared_child_is_rejected() {
        let mut doc = doc_with_nodes(3);
        doc.nodes[0].children = vec![NodeId(2)];
        doc.nodes[1].children = vec![NodeId(2)];
        let err = doc.validate().unwrap_err();
        assert!(err.to_string().contains("more than one parent"));
    }

    #[test]
    fn test_diamond_free_deep_chain_is_accepted() {
        let mut doc = doc_with_nodes(500);
        for i in 0..499 {
            doc.nodes[i].children = vec![NodeId(i as u32 + 1)];
        }
        doc.validate().unwrap();
    }

    #[test]
    fn test_normalized_float_is_rejected() {
        let mut doc = Document::new();
        let mut accessor = Accessor::new(None, ComponentType::F32, Dimension::Scalar, 1);
        accessor.normalized = true;
        doc.accessors.push(accessor);
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_legacy_version() {
        let mut doc = Document::new();
        doc.asset.version = "1.0".into();
        let err = doc.validate().unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::LegacyFormatUnsupported);
    }

    #[test]
    fn test_huge_view_offset_is_invalid() {
        let mut doc = Document::new();
        doc.buffers.push(Buffer::from_bytes(vec![0; 12]));
        doc.buffer_views.push(BufferView::new(BufferId(0), usize::MAX, 12));
        let err = doc.validate().unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidDocument);
    }

    #[test]
    fn test_huge_accessor_count_is_invalid() {
        let mut doc = Document::new();
        doc.buffers.push(Buffer::from_bytes(vec![0; 12]));
        doc.buffer_views.push(BufferView::new(BufferId(0), 0, 12));
        doc.accessors.push(Accessor::new(
            Some(BufferViewId(0)),
            ComponentType::F32,
            Dimension::Scalar,
            1 << 62,
        ));
        let err = doc.validate().unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidDocument);
    }

    #[test]
    fn test_image_needs_exactly_one_source() {
        let mut doc = Document::new();
        doc.images.push(Image::default());
        assert!(doc.validate().is_err());
    }
}
