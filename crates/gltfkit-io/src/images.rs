//! Image byte access and texture realization.

use std::fs;
use std::path::Path;

use gltfkit_core::document::Document;
use gltfkit_core::error::{GltfError, Result};
use gltfkit_core::indices::{ImageId, TextureId};
use gltfkit_core::texture::{infer_mime_type, ImageData, TextureRealizer};
use gltfkit_core::CancelToken;

use crate::uri::{decode_data_uri, is_data_uri, resolve_path};

/// Resolve an image's bytes from its buffer view, data URI or file, and
/// infer its MIME type.
///
/// Relative file URIs resolve against `base_dir`, falling back to the
/// directory of the document's own location.
pub fn image_data(doc: &Document, id: ImageId, base_dir: Option<&Path>) -> Result<ImageData> {
    let image = doc
        .images
        .get(id.index())
        .ok_or_else(|| GltfError::invalid(format!("Invalid image index: {}", id.0)))?;

    let (bytes, declared) = match (image.buffer_view, image.uri.as_deref()) {
        (Some(view), _) => {
            let bytes = doc.buffer_view_bytes(view, &CancelToken::new())?.to_vec();
            (bytes, image.mime_type.clone())
        }
        (None, Some(uri)) if is_data_uri(uri) => {
            let data = decode_data_uri(uri)?;
            (data.bytes, image.mime_type.clone().or(data.mime_type))
        }
        (None, Some(uri)) => {
            let doc_dir = doc.url.as_deref().and_then(Path::parent);
            let path = resolve_path(base_dir.or(doc_dir), uri)?;
            let bytes = fs::read(&path).map_err(|e| GltfError::from_file_io(e, &path))?;
            (bytes, image.mime_type.clone())
        }
        (None, None) => {
            return Err(GltfError::invalid(format!(
                "Image {} has neither a uri nor a bufferView",
                id.0
            )))
        }
    };

    let mime_type = infer_mime_type(&bytes, declared.as_deref(), image.uri.as_deref())
        .ok_or_else(|| GltfError::invalid(format!("Cannot determine the type of image {}", id.0)))?;
    Ok(ImageData { bytes, mime_type })
}

/// Realize a texture through `realizer`.
///
/// Sources are tried in the order `KHR_texture_basisu`, `EXT_texture_webp`,
/// then the core source; the first whose MIME type the realizer accepts is
/// used. `None` when no source is acceptable.
pub fn realize_texture<R: TextureRealizer>(
    doc: &Document,
    id: TextureId,
    realizer: &R,
    base_dir: Option<&Path>,
) -> Result<Option<R::Texture>> {
    let texture = doc
        .textures
        .get(id.index())
        .ok_or_else(|| GltfError::invalid(format!("Invalid texture index: {}", id.0)))?;

    let candidates = [texture.basisu_source, texture.webp_source, texture.source];
    for source in candidates.into_iter().flatten() {
        let data = image_data(doc, source, base_dir)?;
        if realizer.supports(&data.mime_type) {
            log::debug!("realizing texture {} from image {} ({})", id.0, source.0, data.mime_type);
            return realizer.realize(&data).map(Some);
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltfkit_core::texture::{Image, Texture, MIME_PNG, MIME_WEBP};
    use gltfkit_core::ErrorCode;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    struct PngOnly;

    impl TextureRealizer for PngOnly {
        type Texture = usize;

        fn supports(&self, mime_type: &str) -> bool {
            mime_type == MIME_PNG
        }

        fn realize(&self, image: &ImageData) -> Result<usize> {
            Ok(image.bytes.len())
        }
    }

    fn image_with_uri(uri: String) -> Image {
        Image {
            uri: Some(uri),
            ..Image::default()
        }
    }

    #[test]
    fn test_data_uri_image() {
        let mut doc = Document::new();
        let uri = crate::uri::encode_data_uri(PNG_HEADER, "application/octet-stream");
        doc.images.push(image_with_uri(uri));
        let data = image_data(&doc, ImageId(0), None).unwrap();
        assert_eq!(data.mime_type, MIME_PNG);
        assert_eq!(data.bytes, PNG_HEADER);
    }

    #[test]
    fn test_unknown_image_type() {
        let mut doc = Document::new();
        doc.images.push(image_with_uri("data:;base64,AAAA".into()));
        let err = image_data(&doc, ImageId(0), None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocument);
    }

    #[test]
    fn test_realizer_skips_unsupported_sources() {
        let mut doc = Document::new();
        let webp = crate::uri::encode_data_uri(b"RIFF\0\0\0\0WEBPVP8 ", MIME_WEBP);
        let png = crate::uri::encode_data_uri(PNG_HEADER, MIME_PNG);
        doc.images.push(image_with_uri(webp));
        doc.images.push(image_with_uri(png));
        doc.textures.push(Texture {
            source: Some(ImageId(1)),
            webp_source: Some(ImageId(0)),
            ..Texture::default()
        });

        let realized = realize_texture(&doc, TextureId(0), &PngOnly, None).unwrap();
        assert_eq!(realized, Some(PNG_HEADER.len()));
    }
}
