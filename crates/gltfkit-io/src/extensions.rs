//! Extension dispatch.
//!
//! Recognized extensions are taken out of an object's `extensions` map and
//! parsed into typed payloads; everything left behind stays attached to the
//! entity verbatim so it survives a save.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use gltfkit_core::error::{GltfError, Result};

use crate::registry::Registry;
use crate::schema::{AttributesJson, JsonExtensions, TextureInfoJson};

pub const EXT_MESHOPT_COMPRESSION: &str = "EXT_meshopt_compression";
pub const KHR_DRACO_MESH_COMPRESSION: &str = "KHR_draco_mesh_compression";
pub const KHR_LIGHTS_PUNCTUAL: &str = "KHR_lights_punctual";
pub const EXT_MESH_GPU_INSTANCING: &str = "EXT_mesh_gpu_instancing";
pub const KHR_MATERIALS_VARIANTS: &str = "KHR_materials_variants";
pub const KHR_TEXTURE_BASISU: &str = "KHR_texture_basisu";
pub const EXT_TEXTURE_WEBP: &str = "EXT_texture_webp";
pub const KHR_TEXTURE_TRANSFORM: &str = "KHR_texture_transform";
pub const KHR_MESH_QUANTIZATION: &str = "KHR_mesh_quantization";
pub const KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS: &str = "KHR_materials_pbrSpecularGlossiness";
pub const KHR_MATERIALS_SPECULAR: &str = "KHR_materials_specular";
pub const KHR_MATERIALS_TRANSMISSION: &str = "KHR_materials_transmission";
pub const KHR_MATERIALS_VOLUME: &str = "KHR_materials_volume";
pub const KHR_MATERIALS_CLEARCOAT: &str = "KHR_materials_clearcoat";
pub const KHR_MATERIALS_SHEEN: &str = "KHR_materials_sheen";
pub const KHR_MATERIALS_IRIDESCENCE: &str = "KHR_materials_iridescence";
pub const KHR_MATERIALS_ANISOTROPY: &str = "KHR_materials_anisotropy";
pub const KHR_MATERIALS_EMISSIVE_STRENGTH: &str = "KHR_materials_emissive_strength";
pub const KHR_MATERIALS_IOR: &str = "KHR_materials_ior";
pub const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";

/// Extensions this crate decodes without outside help.
pub const BUILTIN_EXTENSIONS: &[&str] = &[
    EXT_MESHOPT_COMPRESSION,
    KHR_LIGHTS_PUNCTUAL,
    EXT_MESH_GPU_INSTANCING,
    KHR_MATERIALS_VARIANTS,
    KHR_TEXTURE_BASISU,
    EXT_TEXTURE_WEBP,
    KHR_TEXTURE_TRANSFORM,
    KHR_MESH_QUANTIZATION,
    KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS,
    KHR_MATERIALS_SPECULAR,
    KHR_MATERIALS_TRANSMISSION,
    KHR_MATERIALS_VOLUME,
    KHR_MATERIALS_CLEARCOAT,
    KHR_MATERIALS_SHEEN,
    KHR_MATERIALS_IRIDESCENCE,
    KHR_MATERIALS_ANISOTROPY,
    KHR_MATERIALS_EMISSIVE_STRENGTH,
    KHR_MATERIALS_IOR,
    KHR_MATERIALS_UNLIT,
];

/// Names whose payloads are interpreted into the document model. Any other
/// name found on an object is kept as opaque data.
pub fn is_recognized(name: &str) -> bool {
    name == KHR_DRACO_MESH_COMPRESSION || BUILTIN_EXTENSIONS.contains(&name)
}

/// Whether a load can honour `name` with the given registry.
pub fn is_supported(name: &str, registry: &Registry) -> bool {
    BUILTIN_EXTENSIONS.contains(&name)
        || (name == KHR_DRACO_MESH_COMPRESSION && registry.decompressor(name).is_some())
}

/// Fail on required extensions nobody can decode; warn about used ones.
pub fn check_support(used: &[String], required: &[String], registry: &Registry) -> Result<()> {
    for name in required {
        if !is_supported(name, registry) {
            return Err(GltfError::UnsupportedExtension(name.clone()));
        }
    }
    for name in used {
        if !is_supported(name, registry) {
            log::warn!("extension {} is used but not supported; ignoring it", name);
        }
    }
    Ok(())
}

/// Remove and parse a recognized extension from an object's map.
pub fn take<T: DeserializeOwned>(extensions: &mut JsonExtensions, name: &str) -> Result<Option<T>> {
    match extensions.remove(name) {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| GltfError::invalid(format!("Malformed {} extension: {}", name, e))),
        None => Ok(None),
    }
}

/// Serialize a payload into an object's extension map.
pub fn put<T: Serialize>(extensions: &mut JsonExtensions, name: &str, payload: &T) -> Result<()> {
    let value = serde_json::to_value(payload)?;
    extensions.insert(name.to_string(), value);
    Ok(())
}

/// Names used by an extension map, recognized or not.
pub fn names(extensions: &Map<String, Value>) -> impl Iterator<Item = &str> {
    extensions.keys().map(String::as_str)
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

// ============================================================================
// Buffer and mesh compression
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshoptBufferViewJson {
    pub buffer: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: usize,
    pub count: usize,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshoptBufferJson {
    #[serde(default, skip_serializing_if = "is_false")]
    pub fallback: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoJson {
    pub buffer_view: usize,
    #[serde(default)]
    pub attributes: IndexMap<String, u32>,
}

// ============================================================================
// Scene extensions
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightsJson {
    #[serde(default)]
    pub lights: Vec<LightJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightJson {
    #[serde(rename = "type")]
    pub light_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot: Option<SpotJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: JsonExtensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_cone_angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_cone_angle: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NodeLightJson {
    pub light: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InstancingJson {
    pub attributes: AttributesJson,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VariantsJson {
    #[serde(default)]
    pub variants: Vec<VariantJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VariantJson {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: JsonExtensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimitiveVariantsJson {
    #[serde(default)]
    pub mappings: Vec<MappingJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingJson {
    pub material: usize,
    pub variants: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ============================================================================
// Texture extensions
// ============================================================================

/// `KHR_texture_basisu` / `EXT_texture_webp` payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TextureSourceJson {
    pub source: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureTransformJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tex_coord: Option<u32>,
}

// ============================================================================
// Material extensions
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecularGlossinessJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffuse_factor: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffuse_texture: Option<TextureInfoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_factor: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glossiness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_glossiness_texture: Option<TextureInfoJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecularJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_texture: Option<TextureInfoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_color_factor: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_color_texture: Option<TextureInfoJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_texture: Option<TextureInfoJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness_texture: Option<TextureInfoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation_distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation_color: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearcoatJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_texture: Option<TextureInfoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_roughness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_roughness_texture: Option<TextureInfoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearcoat_normal_texture: Option<TextureInfoJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheenJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_color_factor: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_color_texture: Option<TextureInfoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_roughness_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheen_roughness_texture: Option<TextureInfoJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IridescenceJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_texture: Option<TextureInfoJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_ior: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_thickness_minimum: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_thickness_maximum: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iridescence_thickness_texture: Option<TextureInfoJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnisotropyJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anisotropy_strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anisotropy_rotation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anisotropy_texture: Option<TextureInfoJson>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissiveStrengthJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_strength: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IorJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ior: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltfkit_core::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_take_leaves_unknown_extensions() {
        let mut exts: JsonExtensions = serde_json::from_value(json!({
            "KHR_texture_transform": {"offset": [0.5, 0.0]},
            "VENDOR_thing": {"a": [1, 2, 3]}
        }))
        .unwrap();

        let transform: Option<TextureTransformJson> = take(&mut exts, KHR_TEXTURE_TRANSFORM).unwrap();
        assert_eq!(transform.unwrap().offset, Some([0.5, 0.0]));
        assert_eq!(exts.len(), 1);
        assert_eq!(exts["VENDOR_thing"], json!({"a": [1, 2, 3]}));
    }

    #[test]
    fn test_malformed_payload() {
        let mut exts: JsonExtensions =
            serde_json::from_value(json!({"KHR_materials_ior": {"ior": "dense"}})).unwrap();
        let err = take::<IorJson>(&mut exts, KHR_MATERIALS_IOR).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocument);
    }

    #[test]
    fn test_required_support() {
        let registry = Registry::new();
        let used = vec![KHR_DRACO_MESH_COMPRESSION.to_string()];
        assert!(check_support(&used, &[], &registry).is_ok());

        let err = check_support(&used, &used, &registry).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedExtension);

        let required = vec![EXT_MESHOPT_COMPRESSION.to_string()];
        assert!(check_support(&required, &required, &registry).is_ok());
    }
}
