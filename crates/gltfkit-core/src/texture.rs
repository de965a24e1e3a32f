//! Textures, images, samplers and the texture realization interface.

use crate::error::Result;
use crate::indices::{BufferViewId, ImageId, SamplerId};
use crate::object::Common;
use crate::types::{MagFilter, MinFilter, WrapMode};

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_KTX2: &str = "image/ktx2";
pub const MIME_WEBP: &str = "image/webp";

#[derive(Debug, Clone, Default)]
pub struct Texture {
    pub common: Common,
    pub sampler: Option<SamplerId>,
    pub source: Option<ImageId>,
    /// `KHR_texture_basisu` source.
    pub basisu_source: Option<ImageId>,
    /// `EXT_texture_webp` source.
    pub webp_source: Option<ImageId>,
}

/// Image bytes come from exactly one of `uri` or `buffer_view`.
#[derive(Debug, Clone, Default)]
pub struct Image {
    pub common: Common,
    pub uri: Option<String>,
    pub buffer_view: Option<BufferViewId>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TextureSampler {
    pub common: Common,
    pub mag_filter: Option<MagFilter>,
    pub min_filter: Option<MinFilter>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

/// Fully decoded image bytes handed to a [`TextureRealizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Turns image bytes into a renderer-native texture object.
pub trait TextureRealizer {
    type Texture;

    /// Whether images of this MIME type can be realized.
    fn supports(&self, mime_type: &str) -> bool;

    fn realize(&self, image: &ImageData) -> Result<Self::Texture>;
}

/// Infer an image MIME type from its leading bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const KTX2: &[u8] = &[
        0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
    ];

    if bytes.starts_with(PNG) {
        Some(MIME_PNG)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(MIME_JPEG)
    } else if bytes.starts_with(KTX2) {
        Some(MIME_KTX2)
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(MIME_WEBP)
    } else {
        None
    }
}

/// Infer a MIME type from a file name or URI extension.
pub fn mime_type_for_uri(uri: &str) -> Option<&'static str> {
    let path = uri.split(|c: char| c == '?' || c == '#').next().unwrap_or(uri);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some(MIME_PNG),
        "jpg" | "jpeg" => Some(MIME_JPEG),
        "ktx2" => Some(MIME_KTX2),
        "webp" => Some(MIME_WEBP),
        _ => None,
    }
}

/// Magic bytes first, then the declared type, then the URI extension.
pub fn infer_mime_type(bytes: &[u8], declared: Option<&str>, uri: Option<&str>) -> Option<String> {
    sniff_mime_type(bytes)
        .map(str::to_string)
        .or_else(|| declared.map(str::to_string))
        .or_else(|| uri.and_then(mime_type_for_uri).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(
            sniff_mime_type(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]),
            Some(MIME_PNG)
        );
        assert_eq!(sniff_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(MIME_JPEG));
        assert_eq!(sniff_mime_type(b"RIFF\0\0\0\0WEBPVP8 "), Some(MIME_WEBP));
        assert_eq!(sniff_mime_type(b"plain"), None);
    }

    #[test]
    fn test_infer_falls_back_to_declared_then_extension() {
        assert_eq!(infer_mime_type(b"??", Some("image/x-custom"), None).as_deref(), Some("image/x-custom"));
        assert_eq!(infer_mime_type(b"??", None, Some("tex/Albedo.KTX2")).as_deref(), Some(MIME_KTX2));
        assert_eq!(mime_type_for_uri("a.jpeg?v=2"), Some(MIME_JPEG));
        assert_eq!(infer_mime_type(b"??", None, Some("noext")), None);
    }
}
