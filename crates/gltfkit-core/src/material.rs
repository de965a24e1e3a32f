//! Materials and their extension parameter blocks.

use crate::indices::TextureId;
use crate::object::{Common, Extensions};
use crate::types::AlphaMode;

/// `KHR_texture_transform` on a texture reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureTransform {
    pub offset: [f32; 2],
    pub rotation: f32,
    pub scale: [f32; 2],
    pub tex_coord: Option<u32>,
}

impl Default for TextureTransform {
    fn default() -> Self {
        TextureTransform {
            offset: [0.0; 2],
            rotation: 0.0,
            scale: [1.0; 2],
            tex_coord: None,
        }
    }
}

/// A material's use of a texture.
#[derive(Debug, Clone)]
pub struct TextureParams {
    pub texture: TextureId,
    pub tex_coord: u32,
    /// Normal scale or occlusion strength, 1 elsewhere.
    pub scale: f32,
    pub transform: Option<TextureTransform>,
    pub extensions: Extensions,
    pub extras: Option<serde_json::Value>,
}

impl TextureParams {
    pub fn new(texture: TextureId) -> Self {
        TextureParams {
            texture,
            tex_coord: 0,
            scale: 1.0,
            transform: None,
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetallicRoughness {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureParams>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureParams>,
}

impl Default for MetallicRoughness {
    fn default() -> Self {
        MetallicRoughness {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpecularGlossiness {
    pub diffuse_factor: [f32; 4],
    pub diffuse_texture: Option<TextureParams>,
    pub specular_factor: [f32; 3],
    pub glossiness_factor: f32,
    pub specular_glossiness_texture: Option<TextureParams>,
}

impl Default for SpecularGlossiness {
    fn default() -> Self {
        SpecularGlossiness {
            diffuse_factor: [1.0; 4],
            diffuse_texture: None,
            specular_factor: [1.0; 3],
            glossiness_factor: 1.0,
            specular_glossiness_texture: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Specular {
    pub specular_factor: f32,
    pub specular_texture: Option<TextureParams>,
    pub specular_color_factor: [f32; 3],
    pub specular_color_texture: Option<TextureParams>,
}

impl Default for Specular {
    fn default() -> Self {
        Specular {
            specular_factor: 1.0,
            specular_texture: None,
            specular_color_factor: [1.0; 3],
            specular_color_texture: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transmission {
    pub transmission_factor: f32,
    pub transmission_texture: Option<TextureParams>,
}

#[derive(Debug, Clone)]
pub struct Volume {
    pub thickness_factor: f32,
    pub thickness_texture: Option<TextureParams>,
    /// Absent means infinite.
    pub attenuation_distance: Option<f32>,
    pub attenuation_color: [f32; 3],
}

impl Default for Volume {
    fn default() -> Self {
        Volume {
            thickness_factor: 0.0,
            thickness_texture: None,
            attenuation_distance: None,
            attenuation_color: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Clearcoat {
    pub clearcoat_factor: f32,
    pub clearcoat_texture: Option<TextureParams>,
    pub clearcoat_roughness_factor: f32,
    pub clearcoat_roughness_texture: Option<TextureParams>,
    pub clearcoat_normal_texture: Option<TextureParams>,
}

#[derive(Debug, Clone, Default)]
pub struct Sheen {
    pub sheen_color_factor: [f32; 3],
    pub sheen_color_texture: Option<TextureParams>,
    pub sheen_roughness_factor: f32,
    pub sheen_roughness_texture: Option<TextureParams>,
}

#[derive(Debug, Clone)]
pub struct Iridescence {
    pub iridescence_factor: f32,
    pub iridescence_texture: Option<TextureParams>,
    pub iridescence_ior: f32,
    pub thickness_minimum: f32,
    pub thickness_maximum: f32,
    pub thickness_texture: Option<TextureParams>,
}

impl Default for Iridescence {
    fn default() -> Self {
        Iridescence {
            iridescence_factor: 0.0,
            iridescence_texture: None,
            iridescence_ior: 1.3,
            thickness_minimum: 100.0,
            thickness_maximum: 400.0,
            thickness_texture: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Anisotropy {
    pub strength: f32,
    pub rotation: f32,
    pub texture: Option<TextureParams>,
}

/// Shading model a material is authored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    MetallicRoughness,
    SpecularGlossiness,
}

#[derive(Debug, Clone, Default)]
pub struct Material {
    pub common: Common,
    pub metallic_roughness: Option<MetallicRoughness>,
    pub specular_glossiness: Option<SpecularGlossiness>,
    pub specular: Option<Specular>,
    pub transmission: Option<Transmission>,
    pub volume: Option<Volume>,
    pub clearcoat: Option<Clearcoat>,
    pub sheen: Option<Sheen>,
    pub iridescence: Option<Iridescence>,
    pub anisotropy: Option<Anisotropy>,
    pub emissive_strength: Option<f32>,
    pub ior: Option<f32>,
    pub normal_texture: Option<TextureParams>,
    pub occlusion_texture: Option<TextureParams>,
    pub emissive_texture: Option<TextureParams>,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    /// Only meaningful in `Mask` mode. Defaults to 0.5.
    pub alpha_cutoff: Option<f32>,
    pub double_sided: bool,
    pub unlit: bool,
}

impl Material {
    /// Specular-glossiness takes precedence when both blocks are present.
    pub fn workflow(&self) -> Workflow {
        if self.specular_glossiness.is_some() {
            Workflow::SpecularGlossiness
        } else {
            Workflow::MetallicRoughness
        }
    }

    pub fn effective_alpha_cutoff(&self) -> f32 {
        self.alpha_cutoff.unwrap_or(0.5)
    }

    /// Every texture reference of the material.
    pub fn texture_params(&self) -> Vec<&TextureParams> {
        let mut out: Vec<&TextureParams> = Vec::new();
        if let Some(mr) = &self.metallic_roughness {
            out.extend(mr.base_color_texture.iter());
            out.extend(mr.metallic_roughness_texture.iter());
        }
        if let Some(sg) = &self.specular_glossiness {
            out.extend(sg.diffuse_texture.iter());
            out.extend(sg.specular_glossiness_texture.iter());
        }
        if let Some(s) = &self.specular {
            out.extend(s.specular_texture.iter());
            out.extend(s.specular_color_texture.iter());
        }
        if let Some(t) = &self.transmission {
            out.extend(t.transmission_texture.iter());
        }
        if let Some(v) = &self.volume {
            out.extend(v.thickness_texture.iter());
        }
        if let Some(c) = &self.clearcoat {
            out.extend(c.clearcoat_texture.iter());
            out.extend(c.clearcoat_roughness_texture.iter());
            out.extend(c.clearcoat_normal_texture.iter());
        }
        if let Some(s) = &self.sheen {
            out.extend(s.sheen_color_texture.iter());
            out.extend(s.sheen_roughness_texture.iter());
        }
        if let Some(i) = &self.iridescence {
            out.extend(i.iridescence_texture.iter());
            out.extend(i.thickness_texture.iter());
        }
        if let Some(a) = &self.anisotropy {
            out.extend(a.texture.iter());
        }
        out.extend(self.normal_texture.iter());
        out.extend(self.occlusion_texture.iter());
        out.extend(self.emissive_texture.iter());
        out
    }
}

/// A named alternate material set (`KHR_materials_variants`).
#[derive(Debug, Clone, Default)]
pub struct MaterialVariant {
    pub common: Common,
}
