//! Serialization engine: document model back to glTF JSON or GLB.

use std::fs;
use std::path::Path;

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::{Map, Value};

use gltfkit_core::accessor::Accessor;
use gltfkit_core::animation::Animation;
use gltfkit_core::buffer::{Buffer, BufferView, MeshoptFilter};
use gltfkit_core::document::Document;
use gltfkit_core::error::{GltfError, Result};
use gltfkit_core::material::{Material, TextureParams};
use gltfkit_core::mesh::{AttributeMap, Mesh, Primitive};
use gltfkit_core::node::{Node, TransformSource};
use gltfkit_core::object::{Common, Extensions};
use gltfkit_core::scene::{Camera, Light, LightKind, Projection};
use gltfkit_core::texture::{Image, Texture, TextureSampler};
use gltfkit_core::types::{AlphaMode, Interpolation, PrimitiveMode, WrapMode};

use crate::container::write_glb;
use crate::extensions::{self as ext, is_recognized};
use crate::options::ExportOptions;
use crate::resolver::CHANNEL_TARGET_KEY;
use crate::schema::*;
use crate::uri::{encode_data_uri, OCTET_STREAM};

/// Where a buffer's bytes go on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    /// The GLB binary chunk.
    BinaryChunk,
    /// Inline base64 data URI.
    DataUri,
    /// External reference, written as is.
    Uri(&'a str),
    /// `EXT_meshopt_compression` fallback with no bytes of its own.
    Fallback(Option<&'a str>),
}

/// Decide how buffer `index` is written under `options`.
pub fn placement<'a>(index: usize, buffer: &'a Buffer, options: &ExportOptions) -> Result<Placement<'a>> {
    let has_data = buffer.data.is_some();
    let placement = if options.binary && index == 0 && has_data {
        Placement::BinaryChunk
    } else if buffer.from_data_uri && has_data {
        Placement::DataUri
    } else if let Some(uri) = buffer.uri.as_deref() {
        if buffer.is_compression_fallback {
            Placement::Fallback(Some(uri))
        } else {
            Placement::Uri(uri)
        }
    } else if buffer.is_compression_fallback {
        Placement::Fallback(None)
    } else if has_data && !options.binary {
        Placement::DataUri
    } else {
        return Err(GltfError::InvalidOptions(if options.binary {
            format!(
                "Buffer {} has neither a uri nor a data URI; only the first buffer can be \
                 embedded in a GLB container",
                index
            )
        } else {
            format!("Buffer {} has no data and no uri", index)
        }));
    };
    Ok(placement)
}

/// Check that every buffer can be placed under `options`.
pub fn check_buffers(doc: &Document, options: &ExportOptions) -> Result<()> {
    for (i, buffer) in doc.buffers.iter().enumerate() {
        placement(i, buffer, options)?;
    }
    Ok(())
}

/// Serialize `doc` to GLB or JSON bytes, as `options` selects.
pub fn serialize(doc: &Document, options: &ExportOptions) -> Result<Vec<u8>> {
    let (root, bin) = to_root(doc, options)?;
    if options.binary {
        let json = serde_json::to_vec(&root)?;
        Ok(write_glb(&json, bin))
    } else {
        Ok(serde_json::to_vec_pretty(&root)?)
    }
}

/// Serialize `doc` and write it to `path`.
///
/// Companion files named by buffer or image URIs are not written.
pub fn write_to_path(doc: &Document, path: &Path, options: &ExportOptions) -> Result<usize> {
    let bytes = serialize(doc, options)?;
    fs::write(path, &bytes).map_err(|e| GltfError::from_file_io(e, path))?;
    Ok(bytes.len())
}

/// Convert the document to schema types, borrowing the bytes of the binary
/// chunk when one is written.
pub fn to_root<'a>(doc: &'a Document, options: &ExportOptions) -> Result<(Root, Option<&'a [u8]>)> {
    let mut writer = Writer {
        used: IndexSet::new(),
    };
    let mut bin = None;

    let mut buffers = Vec::with_capacity(doc.buffers.len());
    for (i, buffer) in doc.buffers.iter().enumerate() {
        let place = placement(i, buffer, options)?;
        if place == Placement::BinaryChunk {
            bin = buffer.bytes();
        }
        buffers.push(writer.buffer(buffer, place)?);
    }

    let mut root = Root {
        asset: AssetJson {
            version: doc.asset.version.clone(),
            min_version: doc.asset.min_version.clone(),
            generator: doc
                .asset
                .generator
                .clone()
                .or_else(|| options.generator.clone()),
            copyright: doc.asset.copyright.clone(),
            extensions: writer.extensions(&doc.asset.extensions),
            extras: doc.asset.extras.clone(),
        },
        buffers,
        buffer_views: doc
            .buffer_views
            .iter()
            .map(|v| writer.buffer_view(v))
            .collect::<Result<_>>()?,
        accessors: doc.accessors.iter().map(|a| writer.accessor(a)).collect(),
        images: doc.images.iter().map(|i| writer.image(i)).collect(),
        samplers: doc.samplers.iter().map(|s| writer.sampler(s)).collect(),
        textures: doc
            .textures
            .iter()
            .map(|t| writer.texture(t))
            .collect::<Result<_>>()?,
        materials: doc
            .materials
            .iter()
            .map(|m| writer.material(m))
            .collect::<Result<_>>()?,
        meshes: doc.meshes.iter().map(|m| writer.mesh(m)).collect::<Result<_>>()?,
        cameras: doc.cameras.iter().map(|c| writer.camera(c)).collect(),
        nodes: doc.nodes.iter().map(|n| writer.node(n)).collect::<Result<_>>()?,
        skins: doc
            .skins
            .iter()
            .map(|s| SkinJson {
                inverse_bind_matrices: s.inverse_bind_matrices.map(usize::from),
                skeleton: s.skeleton.map(usize::from),
                joints: s.joints.iter().copied().map(usize::from).collect(),
                name: s.common.name.clone(),
                extensions: writer.extensions(&s.common.extensions),
                extras: s.common.extras.clone(),
            })
            .collect(),
        animations: doc.animations.iter().map(|a| writer.animation(a)).collect(),
        scenes: doc
            .scenes
            .iter()
            .map(|s| SceneJson {
                nodes: s.nodes.iter().copied().map(usize::from).collect(),
                name: s.common.name.clone(),
                extensions: writer.extensions(&s.common.extensions),
                extras: s.common.extras.clone(),
            })
            .collect(),
        scene: doc.default_scene.map(usize::from),
        extensions: writer.extensions(&doc.extensions),
        extras: doc.extras.clone(),
        ..Root::default()
    };

    if !doc.lights.is_empty() {
        let lights = ext::LightsJson {
            lights: doc.lights.iter().map(|l| writer.light(l)).collect(),
        };
        writer.put(&mut root.extensions, ext::KHR_LIGHTS_PUNCTUAL, &lights)?;
    }
    if !doc.variants.is_empty() {
        let variants = ext::VariantsJson {
            variants: doc
                .variants
                .iter()
                .map(|v| ext::VariantJson {
                    name: v.common.name.clone().unwrap_or_default(),
                    extensions: writer.extensions(&v.common.extensions),
                    extras: v.common.extras.clone(),
                })
                .collect(),
        };
        writer.put(&mut root.extensions, ext::KHR_MATERIALS_VARIANTS, &variants)?;
    }

    root.extensions_used = extensions_used(doc, &writer.used);
    root.extensions_required = doc
        .extensions_required
        .iter()
        .filter(|name| root.extensions_used.contains(name))
        .cloned()
        .collect();

    Ok((root, bin))
}

/// Names emitted anywhere, plus listed names that live nowhere in particular.
fn extensions_used(doc: &Document, emitted: &IndexSet<String>) -> Vec<String> {
    let mut used: IndexSet<String> = doc
        .extensions_used
        .iter()
        .filter(|name| {
            emitted.contains(name.as_str())
                || !is_recognized(name)
                || name.as_str() == ext::KHR_MESH_QUANTIZATION
        })
        .cloned()
        .collect();
    used.extend(emitted.iter().cloned());
    used.into_iter().collect()
}

fn non_default<T: PartialEq>(value: T, default: T) -> Option<T> {
    if value == default {
        None
    } else {
        Some(value)
    }
}

fn indices(map: &AttributeMap) -> AttributesJson {
    map.iter().map(|(k, v)| (k.clone(), usize::from(*v))).collect()
}

/// How a texture reference spells its scalar.
#[derive(Clone, Copy)]
enum TextureKind {
    Plain,
    Normal,
    Occlusion,
}

/// Tracks extension names as they are emitted.
struct Writer {
    used: IndexSet<String>,
}

impl Writer {
    fn extensions(&mut self, opaque: &Extensions) -> JsonExtensions {
        self.used.extend(ext::names(opaque).map(str::to_string));
        opaque.clone()
    }

    fn put<T: Serialize>(&mut self, map: &mut JsonExtensions, name: &str, payload: &T) -> Result<()> {
        self.used.insert(name.to_string());
        ext::put(map, name, payload)
    }

    fn common(&mut self, common: &Common) -> (Option<String>, JsonExtensions, Option<Value>) {
        (
            common.name.clone(),
            self.extensions(&common.extensions),
            common.extras.clone(),
        )
    }

    fn buffer(&mut self, buffer: &Buffer, place: Placement<'_>) -> Result<BufferJson> {
        let (name, mut extensions, extras) = self.common(&buffer.common);
        let data_len = buffer.data.as_ref().map_or(buffer.byte_length, Vec::len);
        let uri = match place {
            Placement::BinaryChunk => None,
            Placement::DataUri => buffer.bytes().map(|b| encode_data_uri(b, OCTET_STREAM)),
            Placement::Uri(uri) => Some(uri.to_string()),
            Placement::Fallback(uri) => {
                let payload = ext::MeshoptBufferJson { fallback: true };
                self.put(&mut extensions, ext::EXT_MESHOPT_COMPRESSION, &payload)?;
                uri.map(str::to_string)
            }
        };
        let byte_length = match place {
            Placement::Fallback(_) => buffer.byte_length,
            _ => data_len,
        };
        Ok(BufferJson {
            byte_length,
            uri,
            name,
            extensions,
            extras,
        })
    }

    fn buffer_view(&mut self, view: &BufferView) -> Result<BufferViewJson> {
        let (name, mut extensions, extras) = self.common(&view.common);
        if let Some(c) = &view.compression {
            let payload = ext::MeshoptBufferViewJson {
                buffer: c.buffer.index(),
                byte_offset: c.byte_offset,
                byte_length: c.byte_length,
                byte_stride: c.byte_stride,
                count: c.count,
                mode: c.mode.as_str().to_string(),
                filter: non_default(c.filter, MeshoptFilter::None).map(|f| f.as_str().to_string()),
            };
            self.put(&mut extensions, ext::EXT_MESHOPT_COMPRESSION, &payload)?;
        }
        Ok(BufferViewJson {
            buffer: view.buffer.index(),
            byte_offset: view.byte_offset,
            byte_length: view.byte_length,
            byte_stride: view.byte_stride,
            target: view.target.map(|t| t.gl()),
            name,
            extensions,
            extras,
        })
    }

    fn accessor(&mut self, accessor: &Accessor) -> AccessorJson {
        let (name, extensions, extras) = self.common(&accessor.common);
        let sparse = accessor.sparse.as_ref().map(|s| SparseJson {
            count: s.count,
            indices: SparseIndicesJson {
                buffer_view: s.index_view.index(),
                byte_offset: s.index_offset,
                component_type: s.index_component_type.gl(),
            },
            values: SparseValuesJson {
                buffer_view: s.value_view.index(),
                byte_offset: s.value_offset,
            },
            extensions: self.extensions(&s.common.extensions),
            extras: s.common.extras.clone(),
        });
        AccessorJson {
            buffer_view: accessor.buffer_view.map(usize::from),
            byte_offset: accessor.byte_offset,
            component_type: accessor.component_type.gl(),
            normalized: accessor.normalized,
            count: accessor.count,
            accessor_type: accessor.dimension.as_str().to_string(),
            min: accessor.min.clone(),
            max: accessor.max.clone(),
            sparse,
            name,
            extensions,
            extras,
        }
    }

    fn image(&mut self, image: &Image) -> ImageJson {
        let (name, extensions, extras) = self.common(&image.common);
        ImageJson {
            uri: image.uri.clone(),
            mime_type: image.mime_type.clone(),
            buffer_view: image.buffer_view.map(usize::from),
            name,
            extensions,
            extras,
        }
    }

    fn sampler(&mut self, sampler: &TextureSampler) -> SamplerJson {
        let (name, extensions, extras) = self.common(&sampler.common);
        SamplerJson {
            mag_filter: sampler.mag_filter.map(|f| f.gl()),
            min_filter: sampler.min_filter.map(|f| f.gl()),
            wrap_s: non_default(sampler.wrap_s, WrapMode::Repeat).map(WrapMode::gl),
            wrap_t: non_default(sampler.wrap_t, WrapMode::Repeat).map(WrapMode::gl),
            name,
            extensions,
            extras,
        }
    }

    fn texture(&mut self, texture: &Texture) -> Result<TextureJson> {
        let (name, mut extensions, extras) = self.common(&texture.common);
        if let Some(source) = texture.basisu_source {
            let payload = ext::TextureSourceJson { source: source.index() };
            self.put(&mut extensions, ext::KHR_TEXTURE_BASISU, &payload)?;
        }
        if let Some(source) = texture.webp_source {
            let payload = ext::TextureSourceJson { source: source.index() };
            self.put(&mut extensions, ext::EXT_TEXTURE_WEBP, &payload)?;
        }
        Ok(TextureJson {
            sampler: texture.sampler.map(usize::from),
            source: texture.source.map(usize::from),
            name,
            extensions,
            extras,
        })
    }

    // ========================================================================
    // Materials
    // ========================================================================

    fn texture_info(&mut self, params: &TextureParams, kind: TextureKind) -> Result<TextureInfoJson> {
        let mut extensions = self.extensions(&params.extensions);
        if let Some(t) = &params.transform {
            let payload = ext::TextureTransformJson {
                offset: non_default(t.offset, [0.0; 2]),
                rotation: non_default(t.rotation, 0.0),
                scale: non_default(t.scale, [1.0; 2]),
                tex_coord: t.tex_coord,
            };
            self.put(&mut extensions, ext::KHR_TEXTURE_TRANSFORM, &payload)?;
        }
        let scalar = non_default(params.scale, 1.0);
        let (scale, strength) = match kind {
            TextureKind::Plain => (None, None),
            TextureKind::Normal => (scalar, None),
            TextureKind::Occlusion => (None, scalar),
        };
        Ok(TextureInfoJson {
            index: params.texture.index(),
            tex_coord: non_default(params.tex_coord, 0),
            scale,
            strength,
            extensions,
            extras: params.extras.clone(),
        })
    }

    fn texture_opt(&mut self, params: &Option<TextureParams>) -> Result<Option<TextureInfoJson>> {
        params
            .as_ref()
            .map(|p| self.texture_info(p, TextureKind::Plain))
            .transpose()
    }

    fn material(&mut self, material: &Material) -> Result<MaterialJson> {
        let (name, mut extensions, extras) = self.common(&material.common);

        let pbr_metallic_roughness = match &material.metallic_roughness {
            Some(mr) => Some(PbrMetallicRoughnessJson {
                base_color_factor: non_default(mr.base_color_factor, [1.0; 4]),
                base_color_texture: self.texture_opt(&mr.base_color_texture)?,
                metallic_factor: non_default(mr.metallic_factor, 1.0),
                roughness_factor: non_default(mr.roughness_factor, 1.0),
                metallic_roughness_texture: self.texture_opt(&mr.metallic_roughness_texture)?,
                ..PbrMetallicRoughnessJson::default()
            }),
            None => None,
        };

        if let Some(sg) = &material.specular_glossiness {
            let payload = ext::SpecularGlossinessJson {
                diffuse_factor: Some(sg.diffuse_factor),
                diffuse_texture: self.texture_opt(&sg.diffuse_texture)?,
                specular_factor: Some(sg.specular_factor),
                glossiness_factor: Some(sg.glossiness_factor),
                specular_glossiness_texture: self.texture_opt(&sg.specular_glossiness_texture)?,
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS, &payload)?;
        }
        if let Some(s) = &material.specular {
            let payload = ext::SpecularJson {
                specular_factor: Some(s.specular_factor),
                specular_texture: self.texture_opt(&s.specular_texture)?,
                specular_color_factor: Some(s.specular_color_factor),
                specular_color_texture: self.texture_opt(&s.specular_color_texture)?,
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_SPECULAR, &payload)?;
        }
        if let Some(t) = &material.transmission {
            let payload = ext::TransmissionJson {
                transmission_factor: Some(t.transmission_factor),
                transmission_texture: self.texture_opt(&t.transmission_texture)?,
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_TRANSMISSION, &payload)?;
        }
        if let Some(v) = &material.volume {
            let payload = ext::VolumeJson {
                thickness_factor: Some(v.thickness_factor),
                thickness_texture: self.texture_opt(&v.thickness_texture)?,
                attenuation_distance: v.attenuation_distance,
                attenuation_color: Some(v.attenuation_color),
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_VOLUME, &payload)?;
        }
        if let Some(c) = &material.clearcoat {
            let payload = ext::ClearcoatJson {
                clearcoat_factor: Some(c.clearcoat_factor),
                clearcoat_texture: self.texture_opt(&c.clearcoat_texture)?,
                clearcoat_roughness_factor: Some(c.clearcoat_roughness_factor),
                clearcoat_roughness_texture: self.texture_opt(&c.clearcoat_roughness_texture)?,
                clearcoat_normal_texture: match &c.clearcoat_normal_texture {
                    Some(p) => Some(self.texture_info(p, TextureKind::Normal)?),
                    None => None,
                },
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_CLEARCOAT, &payload)?;
        }
        if let Some(s) = &material.sheen {
            let payload = ext::SheenJson {
                sheen_color_factor: Some(s.sheen_color_factor),
                sheen_color_texture: self.texture_opt(&s.sheen_color_texture)?,
                sheen_roughness_factor: Some(s.sheen_roughness_factor),
                sheen_roughness_texture: self.texture_opt(&s.sheen_roughness_texture)?,
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_SHEEN, &payload)?;
        }
        if let Some(i) = &material.iridescence {
            let payload = ext::IridescenceJson {
                iridescence_factor: Some(i.iridescence_factor),
                iridescence_texture: self.texture_opt(&i.iridescence_texture)?,
                iridescence_ior: Some(i.iridescence_ior),
                iridescence_thickness_minimum: Some(i.thickness_minimum),
                iridescence_thickness_maximum: Some(i.thickness_maximum),
                iridescence_thickness_texture: self.texture_opt(&i.thickness_texture)?,
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_IRIDESCENCE, &payload)?;
        }
        if let Some(a) = &material.anisotropy {
            let payload = ext::AnisotropyJson {
                anisotropy_strength: Some(a.strength),
                anisotropy_rotation: Some(a.rotation),
                anisotropy_texture: self.texture_opt(&a.texture)?,
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_ANISOTROPY, &payload)?;
        }
        if let Some(strength) = material.emissive_strength {
            let payload = ext::EmissiveStrengthJson {
                emissive_strength: Some(strength),
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_EMISSIVE_STRENGTH, &payload)?;
        }
        if let Some(ior) = material.ior {
            self.put(&mut extensions, ext::KHR_MATERIALS_IOR, &ext::IorJson { ior: Some(ior) })?;
        }
        if material.unlit {
            self.put(&mut extensions, ext::KHR_MATERIALS_UNLIT, &Map::new())?;
        }

        Ok(MaterialJson {
            pbr_metallic_roughness,
            normal_texture: match &material.normal_texture {
                Some(p) => Some(self.texture_info(p, TextureKind::Normal)?),
                None => None,
            },
            occlusion_texture: match &material.occlusion_texture {
                Some(p) => Some(self.texture_info(p, TextureKind::Occlusion)?),
                None => None,
            },
            emissive_texture: self.texture_opt(&material.emissive_texture)?,
            emissive_factor: non_default(material.emissive_factor, [0.0; 3]),
            alpha_mode: non_default(material.alpha_mode, AlphaMode::Opaque).map(|m| m.as_str().to_string()),
            alpha_cutoff: material.alpha_cutoff,
            double_sided: material.double_sided,
            name,
            extensions,
            extras,
        })
    }

    // ========================================================================
    // Meshes, nodes and the rest of the scene graph
    // ========================================================================

    fn primitive(&mut self, prim: &Primitive) -> Result<PrimitiveJson> {
        let mut extensions = self.extensions(&prim.common.extensions);
        if let Some(draco) = &prim.draco {
            let payload = ext::DracoJson {
                buffer_view: draco.buffer_view.index(),
                attributes: draco.attributes.clone(),
            };
            self.put(&mut extensions, ext::KHR_DRACO_MESH_COMPRESSION, &payload)?;
        }
        if !prim.variant_mappings.is_empty() {
            let payload = ext::PrimitiveVariantsJson {
                mappings: prim
                    .variant_mappings
                    .iter()
                    .map(|m| ext::MappingJson {
                        material: m.material.index(),
                        variants: m.variants.iter().copied().map(usize::from).collect(),
                        name: m.name.clone(),
                    })
                    .collect(),
            };
            self.put(&mut extensions, ext::KHR_MATERIALS_VARIANTS, &payload)?;
        }
        Ok(PrimitiveJson {
            attributes: indices(&prim.attributes),
            indices: prim.indices.map(usize::from),
            material: prim.material.map(usize::from),
            mode: non_default(prim.mode, PrimitiveMode::Triangles).map(PrimitiveMode::gl),
            targets: prim.targets.iter().map(indices).collect(),
            extensions,
            extras: prim.common.extras.clone(),
        })
    }

    fn mesh(&mut self, mesh: &Mesh) -> Result<MeshJson> {
        let (name, extensions, extras) = self.common(&mesh.common);
        Ok(MeshJson {
            primitives: mesh
                .primitives
                .iter()
                .map(|p| self.primitive(p))
                .collect::<Result<_>>()?,
            weights: mesh.weights.clone(),
            name,
            extensions,
            extras,
        })
    }

    fn node(&mut self, node: &Node) -> Result<NodeJson> {
        let (name, mut extensions, extras) = self.common(&node.common);
        if let Some(light) = node.light {
            let payload = ext::NodeLightJson { light: light.index() };
            self.put(&mut extensions, ext::KHR_LIGHTS_PUNCTUAL, &payload)?;
        }
        if !node.instancing.is_empty() {
            let payload = ext::InstancingJson {
                attributes: indices(&node.instancing),
            };
            self.put(&mut extensions, ext::EXT_MESH_GPU_INSTANCING, &payload)?;
        }

        let mut json = NodeJson {
            camera: node.camera.map(usize::from),
            children: node.children.iter().copied().map(usize::from).collect(),
            skin: node.skin.map(usize::from),
            mesh: node.mesh.map(usize::from),
            weights: node.weights.clone(),
            name,
            extensions,
            extras,
            ..NodeJson::default()
        };
        match node.transform_source() {
            TransformSource::Identity => {}
            TransformSource::Matrix => json.matrix = Some(node.matrix()),
            TransformSource::Trs => {
                json.translation = non_default(node.translation(), [0.0; 3]);
                json.rotation = non_default(node.rotation(), [0.0, 0.0, 0.0, 1.0]);
                json.scale = non_default(node.scale(), [1.0; 3]);
            }
        }
        Ok(json)
    }

    fn camera(&mut self, camera: &Camera) -> CameraJson {
        let (name, extensions, extras) = self.common(&camera.common);
        let mut json = CameraJson {
            name,
            extensions,
            extras,
            ..CameraJson::default()
        };
        match camera.projection {
            Projection::Perspective {
                aspect_ratio,
                yfov,
                znear,
                zfar,
            } => {
                json.camera_type = "perspective".into();
                json.perspective = Some(PerspectiveJson {
                    aspect_ratio,
                    yfov,
                    zfar,
                    znear,
                });
            }
            Projection::Orthographic {
                xmag,
                ymag,
                znear,
                zfar,
            } => {
                json.camera_type = "orthographic".into();
                json.orthographic = Some(OrthographicJson {
                    xmag,
                    ymag,
                    zfar,
                    znear,
                });
            }
        }
        json
    }

    fn light(&mut self, light: &Light) -> ext::LightJson {
        let (name, extensions, extras) = self.common(&light.common);
        let spot = match light.kind {
            LightKind::Spot {
                inner_cone_angle,
                outer_cone_angle,
            } => Some(ext::SpotJson {
                inner_cone_angle: Some(inner_cone_angle),
                outer_cone_angle: Some(outer_cone_angle),
            }),
            _ => None,
        };
        ext::LightJson {
            light_type: light.kind.as_str().to_string(),
            color: non_default(light.color, [1.0; 3]),
            intensity: non_default(light.intensity, 1.0),
            range: light.range,
            spot,
            name,
            extensions,
            extras,
        }
    }

    fn animation(&mut self, animation: &Animation) -> AnimationJson {
        let (name, extensions, extras) = self.common(&animation.common);
        let channels = animation
            .channels
            .iter()
            .map(|c| {
                let mut extensions = c.common.extensions.clone();
                let target_extensions = match extensions.remove(CHANNEL_TARGET_KEY) {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                ChannelJson {
                    sampler: c.sampler,
                    target: ChannelTargetJson {
                        node: c.target_node.map(usize::from),
                        path: c.target_path.as_str().to_string(),
                        extensions: self.extensions(&target_extensions),
                    },
                    extensions: self.extensions(&extensions),
                    extras: c.common.extras.clone(),
                }
            })
            .collect();
        let samplers = animation
            .samplers
            .iter()
            .map(|s| AnimationSamplerJson {
                input: s.input.index(),
                interpolation: non_default(s.interpolation, Interpolation::Linear)
                    .map(|i| i.as_str().to_string()),
                output: s.output.index(),
                extensions: self.extensions(&s.common.extensions),
                extras: s.common.extras.clone(),
            })
            .collect();
        AnimationJson {
            channels,
            samplers,
            name,
            extensions,
            extras,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltfkit_core::indices::BufferId;
    use gltfkit_core::ErrorCode;

    #[test]
    fn test_only_first_buffer_in_chunk() {
        let mut doc = Document::new();
        doc.buffers.push(Buffer::from_bytes(vec![1, 2, 3, 4]));
        doc.buffers.push(Buffer::from_bytes(vec![5, 6, 7, 8]));

        let err = check_buffers(&doc, &ExportOptions::binary()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOptions);
        // plain export embeds both as data URIs
        assert!(check_buffers(&doc, &ExportOptions::new()).is_ok());

        doc.buffers[1].from_data_uri = true;
        assert!(check_buffers(&doc, &ExportOptions::binary()).is_ok());
    }

    #[test]
    fn test_placements() {
        let options = ExportOptions::binary();
        let mut external = Buffer::default();
        external.uri = Some("mesh.bin".into());
        assert_eq!(placement(1, &external, &options).unwrap(), Placement::Uri("mesh.bin"));

        let mut fallback = Buffer::default();
        fallback.is_compression_fallback = true;
        assert_eq!(placement(0, &fallback, &options).unwrap(), Placement::Fallback(None));

        let first = Buffer::from_bytes(vec![0; 4]);
        assert_eq!(placement(0, &first, &options).unwrap(), Placement::BinaryChunk);
        assert_eq!(placement(0, &first, &ExportOptions::new()).unwrap(), Placement::DataUri);
    }

    #[test]
    fn test_generator_and_used_extensions() {
        let mut doc = Document::new();
        doc.asset.version = "2.0".into();
        doc.extensions_used = vec![
            "VENDOR_listed".into(),
            ext::KHR_MATERIALS_UNLIT.into(),
            ext::KHR_MESH_QUANTIZATION.into(),
        ];
        doc.extensions_required = vec![ext::KHR_MATERIALS_UNLIT.into(), ext::KHR_MESH_QUANTIZATION.into()];
        doc.buffers.push(Buffer::from_bytes(vec![0; 8]));
        doc.buffer_views.push(BufferView::new(BufferId(0), 0, 8));

        let (root, bin) = to_root(&doc, &ExportOptions::binary().with_generator("test")).unwrap();
        assert_eq!(root.asset.generator.as_deref(), Some("test"));
        assert_eq!(bin.map(<[u8]>::len), Some(8));
        assert!(root.buffers[0].uri.is_none());
        // unlit is listed but no material uses it
        assert_eq!(root.extensions_used, ["VENDOR_listed", ext::KHR_MESH_QUANTIZATION]);
        assert_eq!(root.extensions_required, [ext::KHR_MESH_QUANTIZATION]);
    }

    #[test]
    fn test_node_writes_declared_form() {
        let mut doc = Document::new();
        doc.asset.version = "2.0".into();
        let mut trs = Node::default();
        trs.set_trs([1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0], [1.0; 3]);
        let mut matrix = Node::default();
        matrix.set_matrix(gltfkit_core::node::IDENTITY_MATRIX);
        doc.nodes = vec![trs, matrix, Node::default()];

        let (root, _) = to_root(&doc, &ExportOptions::new()).unwrap();
        assert_eq!(root.nodes[0].translation, Some([1.0, 0.0, 0.0]));
        assert!(root.nodes[0].rotation.is_none() && root.nodes[0].matrix.is_none());
        assert!(root.nodes[1].matrix.is_some());
        assert!(root.nodes[2].matrix.is_none() && root.nodes[2].translation.is_none());
    }
}
