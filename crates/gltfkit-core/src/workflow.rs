//! Approximate conversion from the specular-glossiness workflow to
//! metallic-roughness, for consumers that only understand the latter.

use crate::material::{MetallicRoughness, SpecularGlossiness};

const DIELECTRIC_SPECULAR: f32 = 0.04;
const EPSILON: f32 = 1e-6;

fn perceived_brightness(c: [f32; 3]) -> f32 {
    (0.299 * c[0] * c[0] + 0.587 * c[1] * c[1] + 0.114 * c[2] * c[2]).sqrt()
}

fn solve_metallic(diffuse: f32, specular: f32, one_minus_specular_strength: f32) -> f32 {
    if specular < DIELECTRIC_SPECULAR {
        return 0.0;
    }
    let a = DIELECTRIC_SPECULAR;
    let b = diffuse * one_minus_specular_strength / (1.0 - DIELECTRIC_SPECULAR) + specular
        - 2.0 * DIELECTRIC_SPECULAR;
    let c = DIELECTRIC_SPECULAR - specular;
    let discriminant = (b * b - 4.0 * a * c).max(0.0);
    ((-b + discriminant.sqrt()) / (2.0 * a)).clamp(0.0, 1.0)
}

/// Derive metallic-roughness factors from a specular-glossiness block.
///
/// The diffuse texture is reused as the base color texture. Per-texel
/// conversion of the specular-glossiness texture is not performed, so no
/// metallic-roughness texture is produced.
pub fn to_metallic_roughness(sg: &SpecularGlossiness) -> MetallicRoughness {
    let diffuse = [sg.diffuse_factor[0], sg.diffuse_factor[1], sg.diffuse_factor[2]];
    let specular = sg.specular_factor;
    let max_specular = specular[0].max(specular[1]).max(specular[2]);
    let one_minus = 1.0 - max_specular;

    let metallic = solve_metallic(
        perceived_brightness(diffuse),
        perceived_brightness(specular),
        one_minus,
    );

    let diffuse_scale = one_minus / (1.0 - DIELECTRIC_SPECULAR) / (1.0 - metallic).max(EPSILON);
    let specular_scale = 1.0 / metallic.max(EPSILON);
    let blend = metallic * metallic;

    let mut base = [0.0f32; 4];
    for k in 0..3 {
        let from_diffuse = diffuse[k] * diffuse_scale;
        let from_specular = (specular[k] - DIELECTRIC_SPECULAR * (1.0 - metallic)) * specular_scale;
        base[k] = (from_diffuse + blend * (from_specular - from_diffuse)).clamp(0.0, 1.0);
    }
    base[3] = sg.diffuse_factor[3];

    MetallicRoughness {
        base_color_factor: base,
        base_color_texture: sg.diffuse_texture.clone(),
        metallic_factor: metallic,
        roughness_factor: 1.0 - sg.glossiness_factor,
        metallic_roughness_texture: None,
    }
}
