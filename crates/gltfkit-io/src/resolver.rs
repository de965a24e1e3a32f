//! Schema resolver: JSON schema types to the document model.
//!
//! Entities are allocated in declaration order, so every index in the JSON
//! maps directly onto a typed id. Range and graph checks run afterwards in
//! [`Document::validate`].

use std::fs;
use std::path::Path;

use serde_json::Value;

use gltfkit_core::accessor::{Accessor, SparseStorage};
use gltfkit_core::animation::{Animation, AnimationSampler, Channel};
use gltfkit_core::buffer::{Buffer, BufferView, MeshoptCompression, MeshoptFilter, MeshoptMode};
use gltfkit_core::document::{Asset, Document};
use gltfkit_core::error::{GltfError, Result};
use gltfkit_core::indices::*;
use gltfkit_core::material::{
    Anisotropy, Clearcoat, Iridescence, Material, MaterialVariant, MetallicRoughness, Sheen,
    Specular, SpecularGlossiness, TextureParams, TextureTransform, Transmission, Volume,
};
use gltfkit_core::mesh::{AttributeMap, DracoCompression, MaterialMapping, Mesh, Primitive};
use gltfkit_core::node::Node;
use gltfkit_core::object::{Common, Extensions};
use gltfkit_core::scene::{Camera, Light, LightKind, Projection, Scene, Skin};
use gltfkit_core::texture::{Image, Texture, TextureSampler};
use gltfkit_core::types::{
    AlphaMode, BufferTarget, ComponentType, Dimension, Interpolation, MagFilter, MinFilter,
    PrimitiveMode, TargetPath, WrapMode,
};

use crate::extensions::{self as ext, take};
use crate::schema::*;
use crate::uri::{decode_data_uri, is_data_uri, resolve_path};

/// Key under which a channel keeps its target's extensions.
pub const CHANNEL_TARGET_KEY: &str = "target";

/// Parse JSON text into schema types.
///
/// Malformed JSON is `InvalidJson`; well-formed JSON that does not fit the
/// schema is `InvalidDocument`. glTF 1.x content is rejected before the
/// schema is applied, since its layout differs throughout.
pub fn parse_root(json: &[u8]) -> Result<Root> {
    let value: Value = serde_json::from_slice(json)?;
    if let Some(version) = value.pointer("/asset/version").and_then(Value::as_str) {
        if version.split('.').next() == Some("1") {
            return Err(GltfError::LegacyFormatUnsupported(format!(
                "asset version {}",
                version
            )));
        }
    }
    Ok(serde_json::from_value(value)?)
}

fn common(name: Option<String>, extensions: Extensions, extras: Option<Value>) -> Common {
    Common {
        name,
        extensions,
        extras,
        ..Common::default()
    }
}

fn component_type(value: u32) -> Result<ComponentType> {
    ComponentType::from_gl(value)
        .ok_or_else(|| GltfError::invalid(format!("Unknown componentType: {}", value)))
}

fn attributes(json: AttributesJson) -> AttributeMap {
    json.into_iter()
        .map(|(semantic, index)| (semantic, AccessorId::from(index)))
        .collect()
}

/// Make decoded bytes match a buffer's declared length.
fn fit_length(index: usize, mut bytes: Vec<u8>, declared: usize, source: &str) -> Result<Vec<u8>> {
    if bytes.len() < declared {
        return Err(GltfError::invalid(format!(
            "Buffer {}: {} holds {} bytes, byteLength is {}",
            index,
            source,
            bytes.len(),
            declared
        )));
    }
    if bytes.len() > declared {
        log::warn!(
            "buffer {}: {} holds {} bytes, truncating to byteLength {}",
            index,
            source,
            bytes.len(),
            declared
        );
        bytes.truncate(declared);
    }
    Ok(bytes)
}

/// Builds a [`Document`] from parsed schema types.
pub struct Resolver<'a> {
    bin: Option<&'a [u8]>,
    base_dir: Option<&'a Path>,
}

impl<'a> Resolver<'a> {
    /// `bin` is the container's first binary chunk; `base_dir` anchors
    /// relative buffer URIs.
    pub fn new(bin: Option<&'a [u8]>, base_dir: Option<&'a Path>) -> Self {
        Resolver { bin, base_dir }
    }

    pub fn resolve(&self, root: Root) -> Result<Document> {
        let Root {
            asset,
            extensions_used,
            extensions_required,
            accessors,
            animations,
            buffers,
            buffer_views,
            cameras,
            images,
            materials,
            meshes,
            nodes,
            samplers,
            scene,
            scenes,
            skins,
            textures,
            mut extensions,
            extras,
        } = root;

        let mut doc = Document::new();
        doc.asset = Asset {
            version: asset.version,
            min_version: asset.min_version,
            generator: asset.generator,
            copyright: asset.copyright,
            extensions: asset.extensions,
            extras: asset.extras,
        };
        doc.extensions_used = extensions_used;
        doc.extensions_required = extensions_required;

        if let Some(lights) = take::<ext::LightsJson>(&mut extensions, ext::KHR_LIGHTS_PUNCTUAL)? {
            doc.lights = lights
                .lights
                .into_iter()
                .map(light)
                .collect::<Result<_>>()?;
        }
        if let Some(variants) = take::<ext::VariantsJson>(&mut extensions, ext::KHR_MATERIALS_VARIANTS)? {
            doc.variants = variants
                .variants
                .into_iter()
                .map(|v| MaterialVariant {
                    common: common(Some(v.name), v.extensions, v.extras),
                })
                .collect();
        }
        doc.extensions = extensions;
        doc.extras = extras;

        doc.buffers = buffers
            .into_iter()
            .enumerate()
            .map(|(i, b)| self.buffer(i, b))
            .collect::<Result<_>>()?;
        doc.buffer_views = buffer_views.into_iter().map(buffer_view).collect::<Result<_>>()?;
        doc.accessors = accessors.into_iter().map(accessor).collect::<Result<_>>()?;
        doc.images = images.into_iter().map(image).collect();
        doc.samplers = samplers.into_iter().map(sampler).collect();
        doc.textures = textures.into_iter().map(texture).collect::<Result<_>>()?;
        doc.materials = materials.into_iter().map(material).collect::<Result<_>>()?;
        doc.meshes = meshes.into_iter().map(mesh).collect::<Result<_>>()?;
        doc.cameras = cameras.into_iter().map(camera).collect::<Result<_>>()?;
        doc.nodes = nodes.into_iter().map(node).collect::<Result<_>>()?;
        doc.skins = skins.into_iter().map(skin).collect();
        doc.animations = animations.into_iter().map(animation).collect::<Result<_>>()?;
        doc.scenes = scenes
            .into_iter()
            .map(|s| Scene {
                common: common(s.name, s.extensions, s.extras),
                nodes: s.nodes.into_iter().map(NodeId::from).collect(),
            })
            .collect();
        doc.default_scene = scene.map(SceneId::from);

        Ok(doc)
    }

    fn buffer(&self, index: usize, json: BufferJson) -> Result<Buffer> {
        let mut extensions = json.extensions;
        let meshopt = take::<ext::MeshoptBufferJson>(&mut extensions, ext::EXT_MESHOPT_COMPRESSION)?;
        let is_fallback = meshopt.map_or(false, |m| m.fallback);

        let mut buffer = Buffer {
            common: common(json.name, extensions, json.extras),
            byte_length: json.byte_length,
            is_compression_fallback: is_fallback,
            ..Buffer::default()
        };

        match json.uri {
            Some(uri) if is_data_uri(&uri) => {
                let bytes = decode_data_uri(&uri)?.bytes;
                buffer.data = Some(fit_length(index, bytes, json.byte_length, "data URI")?);
                buffer.from_data_uri = true;
            }
            Some(uri) if is_fallback => {
                // the decoder never reads it, so the file is not loaded
                buffer.uri = Some(uri);
            }
            Some(uri) => {
                let path = resolve_path(self.base_dir, &uri)?;
                let bytes = fs::read(&path).map_err(|e| GltfError::from_file_io(e, &path))?;
                log::debug!("read buffer {} from {}", index, path.display());
                buffer.data = Some(fit_length(index, bytes, json.byte_length, "file")?);
                buffer.uri = Some(uri);
            }
            None => match self.bin {
                Some(bin) if index == 0 => {
                    if bin.len() < json.byte_length {
                        return Err(GltfError::too_short(format!(
                            "BIN chunk of {} bytes for buffer of {} bytes",
                            bin.len(),
                            json.byte_length
                        )));
                    }
                    buffer.data = Some(bin[..json.byte_length].to_vec());
                }
                _ if is_fallback => {}
                _ => {
                    return Err(GltfError::invalid(format!(
                        "Buffer {} has no uri and no binary chunk backs it",
                        index
                    )))
                }
            },
        }
        Ok(buffer)
    }
}

fn buffer_view(json: BufferViewJson) -> Result<BufferView> {
    let mut extensions = json.extensions;
    let compression = take::<ext::MeshoptBufferViewJson>(&mut extensions, ext::EXT_MESHOPT_COMPRESSION)?
        .map(|m| -> Result<MeshoptCompression> {
            let mode = MeshoptMode::parse(&m.mode)
                .ok_or_else(|| GltfError::invalid(format!("Unknown meshopt mode: {}", m.mode)))?;
            let filter = match m.filter.as_deref() {
                None => MeshoptFilter::None,
                Some(f) => MeshoptFilter::parse(f)
                    .ok_or_else(|| GltfError::invalid(format!("Unknown meshopt filter: {}", f)))?,
            };
            Ok(MeshoptCompression {
                buffer: BufferId::from(m.buffer),
                byte_offset: m.byte_offset,
                byte_length: m.byte_length,
                byte_stride: m.byte_stride,
                count: m.count,
                mode,
                filter,
            })
        })
        .transpose()?;

    let target = json
        .target
        .map(|t| {
            BufferTarget::from_gl(t)
                .ok_or_else(|| GltfError::invalid(format!("Unknown buffer view target: {}", t)))
        })
        .transpose()?;

    Ok(BufferView {
        common: common(json.name, extensions, json.extras),
        buffer: BufferId::from(json.buffer),
        byte_offset: json.byte_offset,
        byte_length: json.byte_length,
        byte_stride: json.byte_stride,
        target,
        compression,
    })
}

fn accessor(json: AccessorJson) -> Result<Accessor> {
    let dimension = Dimension::parse(&json.accessor_type)
        .ok_or_else(|| GltfError::invalid(format!("Unknown accessor type: {}", json.accessor_type)))?;

    let sparse = json
        .sparse
        .map(|s| -> Result<SparseStorage> {
            Ok(SparseStorage {
                common: common(None, s.extensions, s.extras),
                count: s.count,
                index_view: BufferViewId::from(s.indices.buffer_view),
                index_offset: s.indices.byte_offset,
                index_component_type: component_type(s.indices.component_type)?,
                value_view: BufferViewId::from(s.values.buffer_view),
                value_offset: s.values.byte_offset,
            })
        })
        .transpose()?;

    Ok(Accessor {
        common: common(json.name, json.extensions, json.extras),
        buffer_view: json.buffer_view.map(BufferViewId::from),
        byte_offset: json.byte_offset,
        component_type: component_type(json.component_type)?,
        dimension,
        count: json.count,
        normalized: json.normalized,
        min: json.min,
        max: json.max,
        sparse,
    })
}

fn image(json: ImageJson) -> Image {
    Image {
        common: common(json.name, json.extensions, json.extras),
        uri: json.uri,
        buffer_view: json.buffer_view.map(BufferViewId::from),
        mime_type: json.mime_type,
    }
}

fn sampler(json: SamplerJson) -> TextureSampler {
    let wrap = |w: Option<u32>| match w {
        None => WrapMode::default(),
        Some(v) => WrapMode::from_gl(v).unwrap_or_else(|| {
            log::warn!("unknown wrap mode {}, using REPEAT", v);
            WrapMode::default()
        }),
    };
    TextureSampler {
        common: common(json.name, json.extensions, json.extras),
        mag_filter: json.mag_filter.and_then(MagFilter::from_gl),
        min_filter: json.min_filter.and_then(MinFilter::from_gl),
        wrap_s: wrap(json.wrap_s),
        wrap_t: wrap(json.wrap_t),
    }
}

fn texture(json: TextureJson) -> Result<Texture> {
    let mut extensions = json.extensions;
    let basisu = take::<ext::TextureSourceJson>(&mut extensions, ext::KHR_TEXTURE_BASISU)?;
    let webp = take::<ext::TextureSourceJson>(&mut extensions, ext::EXT_TEXTURE_WEBP)?;
    Ok(Texture {
        common: common(json.name, extensions, json.extras),
        sampler: json.sampler.map(SamplerId::from),
        source: json.source.map(ImageId::from),
        basisu_source: basisu.map(|s| ImageId::from(s.source)),
        webp_source: webp.map(|s| ImageId::from(s.source)),
    })
}

// ============================================================================
// Materials
// ============================================================================

fn texture_params(info: TextureInfoJson) -> Result<TextureParams> {
    let mut extensions = info.extensions;
    let transform = take::<ext::TextureTransformJson>(&mut extensions, ext::KHR_TEXTURE_TRANSFORM)?
        .map(|t| TextureTransform {
            offset: t.offset.unwrap_or([0.0; 2]),
            rotation: t.rotation.unwrap_or(0.0),
            scale: t.scale.unwrap_or([1.0; 2]),
            tex_coord: t.tex_coord,
        });
    Ok(TextureParams {
        texture: TextureId::from(info.index),
        tex_coord: info.tex_coord.unwrap_or(0),
        scale: info.scale.or(info.strength).unwrap_or(1.0),
        transform,
        extensions,
        extras: info.extras,
    })
}

fn texture_opt(info: Option<TextureInfoJson>) -> Result<Option<TextureParams>> {
    info.map(texture_params).transpose()
}

fn material(json: MaterialJson) -> Result<Material> {
    let mut extensions = json.extensions;

    let metallic_roughness = json
        .pbr_metallic_roughness
        .map(|pbr| -> Result<MetallicRoughness> {
            let defaults = MetallicRoughness::default();
            Ok(MetallicRoughness {
                base_color_factor: pbr.base_color_factor.unwrap_or(defaults.base_color_factor),
                base_color_texture: texture_opt(pbr.base_color_texture)?,
                metallic_factor: pbr.metallic_factor.unwrap_or(defaults.metallic_factor),
                roughness_factor: pbr.roughness_factor.unwrap_or(defaults.roughness_factor),
                metallic_roughness_texture: texture_opt(pbr.metallic_roughness_texture)?,
            })
        })
        .transpose()?;

    let specular_glossiness = take::<ext::SpecularGlossinessJson>(
        &mut extensions,
        ext::KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS,
    )?
    .map(|sg| -> Result<SpecularGlossiness> {
        let d = SpecularGlossiness::default();
        Ok(SpecularGlossiness {
            diffuse_factor: sg.diffuse_factor.unwrap_or(d.diffuse_factor),
            diffuse_texture: texture_opt(sg.diffuse_texture)?,
            specular_factor: sg.specular_factor.unwrap_or(d.specular_factor),
            glossiness_factor: sg.glossiness_factor.unwrap_or(d.glossiness_factor),
            specular_glossiness_texture: texture_opt(sg.specular_glossiness_texture)?,
        })
    })
    .transpose()?;

    let specular = take::<ext::SpecularJson>(&mut extensions, ext::KHR_MATERIALS_SPECULAR)?
        .map(|s| -> Result<Specular> {
            let d = Specular::default();
            Ok(Specular {
                specular_factor: s.specular_factor.unwrap_or(d.specular_factor),
                specular_texture: texture_opt(s.specular_texture)?,
                specular_color_factor: s.specular_color_factor.unwrap_or(d.specular_color_factor),
                specular_color_texture: texture_opt(s.specular_color_texture)?,
            })
        })
        .transpose()?;

    let transmission = take::<ext::TransmissionJson>(&mut extensions, ext::KHR_MATERIALS_TRANSMISSION)?
        .map(|t| -> Result<Transmission> {
            Ok(Transmission {
                transmission_factor: t.transmission_factor.unwrap_or(0.0),
                transmission_texture: texture_opt(t.transmission_texture)?,
            })
        })
        .transpose()?;

    let volume = take::<ext::VolumeJson>(&mut extensions, ext::KHR_MATERIALS_VOLUME)?
        .map(|v| -> Result<Volume> {
            let d = Volume::default();
            Ok(Volume {
                thickness_factor: v.thickness_factor.unwrap_or(d.thickness_factor),
                thickness_texture: texture_opt(v.thickness_texture)?,
                attenuation_distance: v.attenuation_distance,
                attenuation_color: v.attenuation_color.unwrap_or(d.attenuation_color),
            })
        })
        .transpose()?;

    let clearcoat = take::<ext::ClearcoatJson>(&mut extensions, ext::KHR_MATERIALS_CLEARCOAT)?
        .map(|c| -> Result<Clearcoat> {
            Ok(Clearcoat {
                clearcoat_factor: c.clearcoat_factor.unwrap_or(0.0),
                clearcoat_texture: texture_opt(c.clearcoat_texture)?,
                clearcoat_roughness_factor: c.clearcoat_roughness_factor.unwrap_or(0.0),
                clearcoat_roughness_texture: texture_opt(c.clearcoat_roughness_texture)?,
                clearcoat_normal_texture: texture_opt(c.clearcoat_normal_texture)?,
            })
        })
        .transpose()?;

    let sheen = take::<ext::SheenJson>(&mut extensions, ext::KHR_MATERIALS_SHEEN)?
        .map(|s| -> Result<Sheen> {
            Ok(Sheen {
                sheen_color_factor: s.sheen_color_factor.unwrap_or([0.0; 3]),
                sheen_color_texture: texture_opt(s.sheen_color_texture)?,
                sheen_roughness_factor: s.sheen_roughness_factor.unwrap_or(0.0),
                sheen_roughness_texture: texture_opt(s.sheen_roughness_texture)?,
            })
        })
        .transpose()?;

    let iridescence = take::<ext::IridescenceJson>(&mut extensions, ext::KHR_MATERIALS_IRIDESCENCE)?
        .map(|i| -> Result<Iridescence> {
            let d = Iridescence::default();
            Ok(Iridescence {
                iridescence_factor: i.iridescence_factor.unwrap_or(d.iridescence_factor),
                iridescence_texture: texture_opt(i.iridescence_texture)?,
                iridescence_ior: i.iridescence_ior.unwrap_or(d.iridescence_ior),
                thickness_minimum: i.iridescence_thickness_minimum.unwrap_or(d.thickness_minimum),
                thickness_maximum: i.iridescence_thickness_maximum.unwrap_or(d.thickness_maximum),
                thickness_texture: texture_opt(i.iridescence_thickness_texture)?,
            })
        })
        .transpose()?;

    let anisotropy = take::<ext::AnisotropyJson>(&mut extensions, ext::KHR_MATERIALS_ANISOTROPY)?
        .map(|a| -> Result<Anisotropy> {
            Ok(Anisotropy {
                strength: a.anisotropy_strength.unwrap_or(0.0),
                rotation: a.anisotropy_rotation.unwrap_or(0.0),
                texture: texture_opt(a.anisotropy_texture)?,
            })
        })
        .transpose()?;

    let emissive_strength =
        take::<ext::EmissiveStrengthJson>(&mut extensions, ext::KHR_MATERIALS_EMISSIVE_STRENGTH)?
            .map(|e| e.emissive_strength.unwrap_or(1.0));
    let ior = take::<ext::IorJson>(&mut extensions, ext::KHR_MATERIALS_IOR)?.map(|i| i.ior.unwrap_or(1.5));
    let unlit = extensions.remove(ext::KHR_MATERIALS_UNLIT).is_some();

    let alpha_mode = match json.alpha_mode.as_deref() {
        None => AlphaMode::default(),
        Some(mode) => AlphaMode::parse(mode)
            .ok_or_else(|| GltfError::invalid(format!("Unknown alphaMode: {}", mode)))?,
    };

    Ok(Material {
        common: common(json.name, extensions, json.extras),
        metallic_roughness,
        specular_glossiness,
        specular,
        transmission,
        volume,
        clearcoat,
        sheen,
        iridescence,
        anisotropy,
        emissive_strength,
        ior,
        normal_texture: texture_opt(json.normal_texture)?,
        occlusion_texture: texture_opt(json.occlusion_texture)?,
        emissive_texture: texture_opt(json.emissive_texture)?,
        emissive_factor: json.emissive_factor.unwrap_or([0.0; 3]),
        alpha_mode,
        alpha_cutoff: json.alpha_cutoff,
        double_sided: json.double_sided,
        unlit,
    })
}

// ============================================================================
// Meshes, nodes and the rest of the scene graph
// ============================================================================

fn primitive(json: PrimitiveJson) -> Result<Primitive> {
    let mut extensions = json.extensions;
    let draco = take::<ext::DracoJson>(&mut extensions, ext::KHR_DRACO_MESH_COMPRESSION)?.map(|d| {
        DracoCompression {
            buffer_view: BufferViewId::from(d.buffer_view),
            attributes: d.attributes,
        }
    });
    let variant_mappings = take::<ext::PrimitiveVariantsJson>(&mut extensions, ext::KHR_MATERIALS_VARIANTS)?
        .map(|v| {
            v.mappings
                .into_iter()
                .map(|m| MaterialMapping {
                    material: MaterialId::from(m.material),
                    variants: m.variants.into_iter().map(VariantId::from).collect(),
                    name: m.name,
                })
                .collect()
        })
        .unwrap_or_default();

    let mode = match json.mode {
        None => PrimitiveMode::default(),
        Some(m) => PrimitiveMode::from_gl(m)
            .ok_or_else(|| GltfError::invalid(format!("Unknown primitive mode: {}", m)))?,
    };

    Ok(Primitive {
        common: common(None, extensions, json.extras),
        attributes: attributes(json.attributes),
        indices: json.indices.map(AccessorId::from),
        material: json.material.map(MaterialId::from),
        mode,
        targets: json.targets.into_iter().map(attributes).collect(),
        variant_mappings,
        draco,
    })
}

fn mesh(json: MeshJson) -> Result<Mesh> {
    Ok(Mesh {
        common: common(json.name, json.extensions, json.extras),
        primitives: json.primitives.into_iter().map(primitive).collect::<Result<_>>()?,
        weights: json.weights,
    })
}

fn node(json: NodeJson) -> Result<Node> {
    let mut extensions = json.extensions;
    let light = take::<ext::NodeLightJson>(&mut extensions, ext::KHR_LIGHTS_PUNCTUAL)?;
    let instancing = take::<ext::InstancingJson>(&mut extensions, ext::EXT_MESH_GPU_INSTANCING)?;

    let mut node = Node::default();
    node.common = common(json.name, extensions, json.extras);
    node.camera = json.camera.map(CameraId::from);
    node.mesh = json.mesh.map(MeshId::from);
    node.skin = json.skin.map(SkinId::from);
    node.light = light.map(|l| LightId::from(l.light));
    node.children = json.children.into_iter().map(NodeId::from).collect();
    node.weights = json.weights;
    node.instancing = instancing.map(|i| attributes(i.attributes)).unwrap_or_default();

    // matrix wins when both forms are present
    if let Some(matrix) = json.matrix {
        if json.translation.is_some() || json.rotation.is_some() || json.scale.is_some() {
            log::warn!("node declares both matrix and TRS; using the matrix");
        }
        node.set_matrix(matrix);
    } else if json.translation.is_some() || json.rotation.is_some() || json.scale.is_some() {
        node.set_trs(
            json.translation.unwrap_or([0.0; 3]),
            json.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]),
            json.scale.unwrap_or([1.0; 3]),
        );
    }
    Ok(node)
}

fn camera(json: CameraJson) -> Result<Camera> {
    let projection = match (json.camera_type.as_str(), json.perspective, json.orthographic) {
        ("perspective", Some(p), _) => Projection::Perspective {
            aspect_ratio: p.aspect_ratio,
            yfov: p.yfov,
            znear: p.znear,
            zfar: p.zfar,
        },
        ("orthographic", _, Some(o)) => Projection::Orthographic {
            xmag: o.xmag,
            ymag: o.ymag,
            znear: o.znear,
            zfar: o.zfar,
        },
        (kind, _, _) => {
            return Err(GltfError::invalid(format!(
                "Camera of type '{}' lacks its projection block",
                kind
            )))
        }
    };
    Ok(Camera {
        common: common(json.name, json.extensions, json.extras),
        projection,
    })
}

fn light(json: ext::LightJson) -> Result<Light> {
    let kind = match json.light_type.as_str() {
        "directional" => LightKind::Directional,
        "point" => LightKind::Point,
        "spot" => {
            let spot = json.spot.unwrap_or_default();
            LightKind::Spot {
                inner_cone_angle: spot.inner_cone_angle.unwrap_or(0.0),
                outer_cone_angle: spot.outer_cone_angle.unwrap_or(std::f32::consts::FRAC_PI_4),
            }
        }
        other => return Err(GltfError::invalid(format!("Unknown light type: {}", other))),
    };
    let mut light = Light::new(kind);
    light.common = common(json.name, json.extensions, json.extras);
    light.color = json.color.unwrap_or(light.color);
    light.intensity = json.intensity.unwrap_or(light.intensity);
    light.range = json.range;
    Ok(light)
}

fn skin(json: SkinJson) -> Skin {
    Skin {
        common: common(json.name, json.extensions, json.extras),
        inverse_bind_matrices: json.inverse_bind_matrices.map(AccessorId::from),
        skeleton: json.skeleton.map(NodeId::from),
        joints: json.joints.into_iter().map(NodeId::from).collect(),
    }
}

fn animation(json: AnimationJson) -> Result<Animation> {
    let channels = json
        .channels
        .into_iter()
        .map(|c| {
            let mut extensions = c.extensions;
            // target extensions ride along under a reserved key
            if !c.target.extensions.is_empty() {
                extensions.insert(CHANNEL_TARGET_KEY.into(), Value::Object(c.target.extensions));
            }
            Channel {
                common: common(None, extensions, c.extras),
                sampler: c.sampler,
                target_node: c.target.node.map(NodeId::from),
                target_path: TargetPath::parse(&c.target.path),
            }
        })
        .collect();

    let samplers = json
        .samplers
        .into_iter()
        .map(|s| -> Result<AnimationSampler> {
            let interpolation = match s.interpolation.as_deref() {
                None => Interpolation::default(),
                Some(i) => Interpolation::parse(i)
                    .ok_or_else(|| GltfError::invalid(format!("Unknown interpolation: {}", i)))?,
            };
            Ok(AnimationSampler {
                common: common(None, s.extensions, s.extras),
                input: AccessorId::from(s.input),
                output: AccessorId::from(s.output),
                interpolation,
            })
        })
        .collect::<Result<_>>()?;

    Ok(Animation {
        common: common(json.name, json.extensions, json.extras),
        channels,
        samplers,
    })
}
