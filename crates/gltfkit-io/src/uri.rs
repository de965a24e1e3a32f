//! URI handling: data URIs, percent-decoding and relative file resolution.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gltfkit_core::error::{GltfError, Result};

pub const OCTET_STREAM: &str = "application/octet-stream";

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUri {
    /// Media type from the URI header, if one was given.
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Decode `data:[<mediatype>][;base64],<data>`.
pub fn decode_data_uri(uri: &str) -> Result<DataUri> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| GltfError::invalid("Invalid data URI: missing data: prefix"))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| GltfError::invalid("Invalid data URI: no comma"))?;

    let (media, is_base64) = match header.strip_suffix(";base64") {
        Some(media) => (media, true),
        None => (header, false),
    };
    let mime_type = media
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let bytes = if is_base64 {
        STANDARD
            .decode(data.trim_end())
            .map_err(|e| GltfError::invalid(format!("Invalid base64 in data URI: {}", e)))?
    } else {
        percent_decode(data)
    };
    Ok(DataUri { mime_type, bytes })
}

/// Encode bytes as a base64 data URI.
pub fn encode_data_uri(data: &[u8], mime_type: &str) -> String {
    let mut output = format!("data:{};base64,", mime_type);
    STANDARD.encode_string(data, &mut output);
    output
}

pub fn percent_decode(input: &str) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                output.push((h << 4) | l);
                i += 3;
                continue;
            }
        }
        output.push(bytes[i]);
        i += 1;
    }

    output
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Resolve a relative URI against a base directory.
///
/// Only relative references and `file:` URIs name loadable files; any other
/// scheme is rejected.
pub fn resolve_path(base: Option<&Path>, uri: &str) -> Result<PathBuf> {
    let uri = uri.split(|c: char| c == '?' || c == '#').next().unwrap_or(uri);
    let (is_file_url, reference) = match uri.strip_prefix("file://") {
        Some(rest) => (true, rest),
        None => (false, uri),
    };
    if !is_file_url && has_scheme(reference) {
        return Err(GltfError::LoadFailed(format!(
            "URI scheme not supported: {}",
            uri
        )));
    }

    let decoded = String::from_utf8(percent_decode(reference))
        .map_err(|_| GltfError::invalid(format!("URI is not valid UTF-8: {}", uri)))?;
    let path = Path::new(&decoded);
    Ok(match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    })
}

/// `scheme:` per RFC 3986, ignoring single-letter drive prefixes.
fn has_scheme(uri: &str) -> bool {
    match uri.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
