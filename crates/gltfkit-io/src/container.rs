//! GLB container framing.
//!
//! Input that starts with the GLB magic is split into its JSON chunk and
//! binary chunks; anything else is taken to be glTF JSON text.

use byteorder::{ByteOrder, LittleEndian};
use gltfkit_core::error::{GltfError, Result};

// ============================================================================
// GLB Binary Format Constants
// ============================================================================

pub const GLB_MAGIC: u32 = 0x46546C67; // "glTF" in little-endian
pub const GLB_VERSION: u32 = 2;
pub const GLB_CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
pub const GLB_CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// The framed parts of a loadable input.
#[derive(Debug)]
pub struct Container<'a> {
    pub json: &'a [u8],
    /// Binary chunks in file order. Only the first one backs buffer 0.
    pub bin: Vec<&'a [u8]>,
    pub is_binary: bool,
}

impl<'a> Container<'a> {
    pub fn first_bin(&self) -> Option<&'a [u8]> {
        self.bin.first().copied()
    }
}

/// Whether the bytes carry the GLB magic.
pub fn is_glb(data: &[u8]) -> bool {
    data.len() >= 4 && LittleEndian::read_u32(&data[0..4]) == GLB_MAGIC
}

/// Split raw input into JSON text and binary chunks.
pub fn read_container(data: &[u8]) -> Result<Container<'_>> {
    if data.is_empty() {
        return Err(GltfError::NoDataToLoad);
    }
    if is_glb(data) {
        return read_glb(data);
    }
    let json = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    Ok(Container {
        json,
        bin: Vec::new(),
        is_binary: false,
    })
}

fn read_glb(data: &[u8]) -> Result<Container<'_>> {
    if data.len() < HEADER_LEN {
        return Err(GltfError::too_short("GLB header"));
    }

    let version = LittleEndian::read_u32(&data[4..8]);
    let length = LittleEndian::read_u32(&data[8..12]) as usize;

    match version {
        GLB_VERSION => {}
        1 => {
            return Err(GltfError::LegacyFormatUnsupported(
                "GLB container version 1".into(),
            ))
        }
        other => {
            return Err(GltfError::UnknownFormat(format!(
                "Unsupported GLB version: {}",
                other
            )))
        }
    }
    if length > data.len() {
        return Err(GltfError::too_short(format!(
            "GLB declares {} bytes, {} present",
            length,
            data.len()
        )));
    }
    if length < data.len() {
        return Err(GltfError::UnknownFormat(format!(
            "GLB declares {} bytes but {} are present",
            length,
            data.len()
        )));
    }

    let mut offset = HEADER_LEN;
    let mut json: Option<&[u8]> = None;
    let mut bin = Vec::new();

    while offset < length {
        if offset + CHUNK_HEADER_LEN > length {
            return Err(GltfError::too_short("GLB chunk header"));
        }
        let chunk_length = LittleEndian::read_u32(&data[offset..offset + 4]) as usize;
        let chunk_type = LittleEndian::read_u32(&data[offset + 4..offset + 8]);
        offset += CHUNK_HEADER_LEN;

        if offset + chunk_length > length {
            return Err(GltfError::too_short(format!(
                "GLB chunk of {} bytes at offset {}",
                chunk_length, offset
            )));
        }
        let chunk = &data[offset..offset + chunk_length];
        offset += chunk_length;

        match chunk_type {
            GLB_CHUNK_JSON if json.is_none() && bin.is_empty() => json = Some(chunk),
            GLB_CHUNK_JSON => {
                return Err(GltfError::UnknownFormat(
                    "JSON chunk must be the first and only JSON chunk".into(),
                ))
            }
            _ if json.is_none() => {
                return Err(GltfError::UnknownFormat(
                    "First GLB chunk is not JSON".into(),
                ))
            }
            GLB_CHUNK_BIN => bin.push(chunk),
            other => log::warn!("skipping unknown GLB chunk type 0x{:08X}", other),
        }
    }

    let json = json.ok_or_else(|| GltfError::UnknownFormat("No JSON chunk".into()))?;
    Ok(Container {
        json,
        bin,
        is_binary: true,
    })
}

/// Assemble a GLB file from JSON text and an optional binary chunk.
///
/// JSON is padded with spaces and binary data with zeros to 4-byte
/// boundaries. The binary chunk is omitted when `bin` is `None`.
pub fn write_glb(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let json_padding = (4 - (json.len() % 4)) % 4;
    let padded_json_len = json.len() + json_padding;

    let bin_padding = bin.map_or(0, |b| (4 - (b.len() % 4)) % 4);
    let padded_bin_len = bin.map_or(0, |b| b.len() + bin_padding);
    let bin_chunk_len = if bin.is_some() {
        CHUNK_HEADER_LEN + padded_bin_len
    } else {
        0
    };

    let total_len = HEADER_LEN + CHUNK_HEADER_LEN + padded_json_len + bin_chunk_len;
    let mut output = Vec::with_capacity(total_len);

    // Header
    output.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    output.extend_from_slice(&GLB_VERSION.to_le_bytes());
    output.extend_from_slice(&(total_len as u32).to_le_bytes());

    // JSON chunk
    output.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    output.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
    output.extend_from_slice(json);
    output.resize(output.len() + json_padding, b' ');

    // Binary chunk
    if let Some(bin) = bin {
        output.extend_from_slice(&(padded_bin_len as u32).to_le_bytes());
        output.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
        output.extend_from_slice(bin);
        output.resize(output.len() + bin_padding, 0);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================
