//! Decoders for `EXT_meshopt_compression` streams.
//!
//! Three bitstreams are supported: the attribute (vertex) codec, the
//! triangle index codec and the index sequence codec. Each decodes into a
//! caller-provided destination of exactly `count * stride` bytes.

use byteorder::{ByteOrder, LittleEndian};

use crate::buffer::{MeshoptCompression, MeshoptMode};
use crate::cancel::CancelToken;
use crate::decode::filter::apply_filter;
use crate::error::{try_zeroed, GltfError, Result};

const VERTEX_HEADER: u8 = 0xa0;
const INDEX_HEADER: u8 = 0xe0;
const SEQUENCE_HEADER: u8 = 0xd0;

const VERTEX_BLOCK_SIZE_BYTES: usize = 8192;
const VERTEX_BLOCK_MAX_SIZE: usize = 256;
const BYTE_GROUP_SIZE: usize = 16;
const BYTE_GROUP_DECODE_LIMIT: usize = 24;
const TAIL_MAX_SIZE: usize = 32;

fn corrupt(msg: &str) -> GltfError {
    GltfError::invalid(format!("meshopt: {}", msg))
}

/// Decode a whole compressed buffer view, including its filter.
pub fn decode_stream(
    compression: &MeshoptCompression,
    source: &[u8],
    cancel: &CancelToken,
) -> Result<Vec<u8>> {
    let len = compression
        .decoded_len()
        .ok_or_else(|| corrupt("decoded size overflows"))?;
    let mut out = try_zeroed(len)?;
    let count = compression.count;
    let stride = compression.byte_stride;
    match compression.mode {
        MeshoptMode::Attributes => decode_vertex_buffer(&mut out, count, stride, source, cancel)?,
        MeshoptMode::Triangles => decode_index_buffer(&mut out, count, stride, source)?,
        MeshoptMode::Indices => decode_index_sequence(&mut out, count, stride, source)?,
    }
    apply_filter(compression.filter, &mut out, count, stride)?;
    Ok(out)
}

// ============================================================================
// Attribute codec
// ============================================================================

fn vertex_block_size(vertex_size: usize) -> usize {
    let result = (VERTEX_BLOCK_SIZE_BYTES / vertex_size) & !(BYTE_GROUP_SIZE - 1);
    result.min(VERTEX_BLOCK_MAX_SIZE)
}

#[inline]
fn unzigzag8(v: u8) -> u8 {
    (v & 1).wrapping_neg() ^ (v >> 1)
}

/// Decode one 16-byte group with `bitslog2` selecting 0, 2, 4 or 8 bits per
/// value. Returns the position after the group's data.
fn decode_bytes_group(src: &[u8], pos: usize, out: &mut [u8], bitslog2: u8) -> usize {
    match bitslog2 {
        0 => {
            out[..BYTE_GROUP_SIZE].fill(0);
            pos
        }
        1 => {
            let mut var = pos + 4;
            for b in 0..4 {
                let byte = src[pos + b];
                for k in 0..4 {
                    let enc = (byte >> (6 - 2 * k)) & 3;
                    out[b * 4 + k] = if enc == 3 {
                        var += 1;
                        src[var - 1]
                    } else {
                        enc
                    };
                }
            }
            var
        }
        2 => {
            let mut var = pos + 8;
            for b in 0..8 {
                let byte = src[pos + b];
                for k in 0..2 {
                    let enc = (byte >> (4 - 4 * k)) & 15;
                    out[b * 2 + k] = if enc == 15 {
                        var += 1;
                        src[var - 1]
                    } else {
                        enc
                    };
                }
            }
            var
        }
        _ => {
            out[..BYTE_GROUP_SIZE].copy_from_slice(&src[pos..pos + BYTE_GROUP_SIZE]);
            pos + BYTE_GROUP_SIZE
        }
    }
}

fn decode_bytes(src: &[u8], mut pos: usize, out: &mut [u8]) -> Result<usize> {
    let size = out.len();
    let header_size = (size / BYTE_GROUP_SIZE + 3) / 4;
    if src.len() - pos < header_size {
        return Err(corrupt("truncated byte group header"));
    }
    let header = pos;
    pos += header_size;

    for i in (0..size).step_by(BYTE_GROUP_SIZE) {
        // Guarantees every read of the group below stays in bounds.
        if src.len() - pos < BYTE_GROUP_DECODE_LIMIT {
            return Err(corrupt("truncated byte group"));
        }
        let group = i / BYTE_GROUP_SIZE;
        let bitslog2 = (src[header + group / 4] >> ((group % 4) * 2)) & 3;
        pos = decode_bytes_group(src, pos, &mut out[i..i + BYTE_GROUP_SIZE], bitslog2);
    }
    Ok(pos)
}

fn decode_vertex_block(
    src: &[u8],
    mut pos: usize,
    dst: &mut [u8],
    count: usize,
    vertex_size: usize,
    last_vertex: &mut [u8],
) -> Result<usize> {
    let aligned = (count + BYTE_GROUP_SIZE - 1) & !(BYTE_GROUP_SIZE - 1);
    let mut deltas = [0u8; VERTEX_BLOCK_MAX_SIZE];

    for k in 0..vertex_size {
        pos = decode_bytes(src, pos, &mut deltas[..aligned])?;
        let mut p = last_vertex[k];
        for i in 0..count {
            let v = unzigzag8(deltas[i]).wrapping_add(p);
            dst[i * vertex_size + k] = v;
            p = v;
        }
    }

    last_vertex.copy_from_slice(&dst[(count - 1) * vertex_size..count * vertex_size]);
    Ok(pos)
}

/// Decode `count` vertices of `vertex_size` bytes.
pub fn decode_vertex_buffer(
    dst: &mut [u8],
    count: usize,
    vertex_size: usize,
    src: &[u8],
    cancel: &CancelToken,
) -> Result<()> {
    if vertex_size == 0 || vertex_size > 256 || vertex_size % 4 != 0 {
        return Err(corrupt("vertex size must be a multiple of 4 up to 256"));
    }
    if dst.len() < count * vertex_size {
        return Err(corrupt("destination too small"));
    }
    let header = *src.first().ok_or_else(|| corrupt("empty vertex stream"))?;
    if header & 0xf0 != VERTEX_HEADER {
        return Err(corrupt("bad vertex stream header"));
    }
    if header & 0x0f > 0 {
        return Err(corrupt("unsupported vertex stream version"));
    }

    let mut pos = 1;
    let tail_size = vertex_size.max(TAIL_MAX_SIZE);
    if src.len() - pos < tail_size {
        return Err(corrupt("truncated vertex stream"));
    }

    let mut last_vertex = src[src.len() - vertex_size..].to_vec();
    let block_size = vertex_block_size(vertex_size);

    let mut offset = 0;
    while offset < count {
        cancel.check()?;
        let block = block_size.min(count - offset);
        let range = offset * vertex_size..(offset + block) * vertex_size;
        pos = decode_vertex_block(
            src,
            pos,
            &mut dst[range],
            block,
            vertex_size,
            &mut last_vertex,
        )?;
        offset += block;
    }

    if src.len() - pos != tail_size {
        return Err(corrupt("trailing data in vertex stream"));
    }
    Ok(())
}

// ============================================================================
// Index codecs
// ============================================================================

fn read_vbyte(src: &[u8], pos: &mut usize) -> Result<u32> {
    let mut next = || -> Result<u8> {
        let b = *src.get(*pos).ok_or_else(|| corrupt("truncated varint"))?;
        *pos += 1;
        Ok(b)
    };

    let lead = next()?;
    if lead < 128 {
        return Ok(lead as u32);
    }
    let mut result = (lead & 127) as u32;
    let mut shift = 7;
    for _ in 0..4 {
        let group = next()?;
        result |= ((group & 127) as u32) << shift;
        shift += 7;
        if group < 128 {
            break;
        }
    }
    Ok(result)
}

fn read_index(src: &[u8], pos: &mut usize, last: u32) -> Result<u32> {
    let v = read_vbyte(src, pos)?;
    let d = (v >> 1) ^ (v & 1).wrapping_neg();
    Ok(last.wrapping_add(d))
}

fn write_index(dst: &mut [u8], i: usize, index_size: usize, value: u32) {
    if index_size == 2 {
        LittleEndian::write_u16(&mut dst[i * 2..i * 2 + 2], value as u16);
    } else {
        LittleEndian::write_u32(&mut dst[i * 4..i * 4 + 4], value);
    }
}

struct Fifos {
    edges: [[u32; 2]; 16],
    edge_offset: usize,
    vertices: [u32; 16],
    vertex_offset: usize,
}

impl Fifos {
    fn new() -> Self {
        Fifos {
            edges: [[u32::MAX; 2]; 16],
            edge_offset: 0,
            vertices: [u32::MAX; 16],
            vertex_offset: 0,
        }
    }

    fn edge(&self, back: usize) -> [u32; 2] {
        self.edges[self.edge_offset.wrapping_sub(1 + back) & 15]
    }

    /// Vertex `back` entries behind the write position.
    fn vertex(&self, back: usize) -> u32 {
        self.vertices[self.vertex_offset.wrapping_sub(back) & 15]
    }

    fn push_edge(&mut self, a: u32, b: u32) {
        self.edges[self.edge_offset] = [a, b];
        self.edge_offset = (self.edge_offset + 1) & 15;
    }

    fn push_vertex(&mut self, v: u32, advance: bool) {
        self.vertices[self.vertex_offset] = v;
        self.vertex_offset = (self.vertex_offset + advance as usize) & 15;
    }
}

/// Decode a triangle list of `count` indices, each `index_size` bytes.
pub fn decode_index_buffer(
    dst: &mut [u8],
    count: usize,
    index_size: usize,
    src: &[u8],
) -> Result<()> {
    if count % 3 != 0 || (index_size != 2 && index_size != 4) {
        return Err(corrupt("triangle stream needs a multiple of 3 indices of 2 or 4 bytes"));
    }
    if dst.len() < count * index_size {
        return Err(corrupt("destination too small"));
    }
    if src.len() < 1 + count / 3 + 16 {
        return Err(corrupt("truncated triangle stream"));
    }
    if src[0] & 0xf0 != INDEX_HEADER {
        return Err(corrupt("bad triangle stream header"));
    }
    let version = src[0] & 0x0f;
    if version > 1 {
        return Err(corrupt("unsupported triangle stream version"));
    }

    let mut fifo = Fifos::new();
    let mut next: u32 = 0;
    let mut last: u32 = 0;
    let fecmax = if version >= 1 { 13 } else { 15 };

    let mut code = 1;
    let mut data = code + count / 3;
    let data_safe_end = src.len() - 16;
    let codeaux_table = &src[data_safe_end..];

    for i in (0..count).step_by(3) {
        if data > data_safe_end {
            return Err(corrupt("truncated triangle data"));
        }
        let codetri = src[code];
        code += 1;

        if codetri < 0xf0 {
            let fe = (codetri >> 4) as usize;
            let [a, b] = fifo.edge(fe);
            let fec = (codetri & 15) as usize;

            if fec < fecmax {
                let c = if fec == 0 { next } else { fifo.vertex(1 + fec) };
                let fresh = fec == 0;
                next += fresh as u32;

                write_triangle(dst, i, index_size, a, b, c);
                fifo.push_vertex(c, fresh);
                fifo.push_edge(c, b);
                fifo.push_edge(a, c);
            } else {
                // 13 and 14 step the last free index by -1 and +1
                let c = if fec != 15 {
                    let delta = fec as i32 - (fec ^ 3) as i32;
                    last.wrapping_add(delta as u32)
                } else {
                    read_index(src, &mut data, last)?
                };
                last = c;

                write_triangle(dst, i, index_size, a, b, c);
                fifo.push_vertex(c, true);
                fifo.push_edge(c, b);
                fifo.push_edge(a, c);
            }
        } else if codetri < 0xfe {
            let codeaux = codeaux_table[(codetri & 15) as usize];
            let feb = (codeaux >> 4) as usize;
            let fec = (codeaux & 15) as usize;

            let a = next;
            next += 1;
            let b = if feb == 0 { next } else { fifo.vertex(feb) };
            let feb0 = feb == 0;
            next += feb0 as u32;
            let c = if fec == 0 { next } else { fifo.vertex(fec) };
            let fec0 = fec == 0;
            next += fec0 as u32;

            write_triangle(dst, i, index_size, a, b, c);
            fifo.push_vertex(a, true);
            fifo.push_vertex(b, feb0);
            fifo.push_vertex(c, fec0);
            fifo.push_edge(b, a);
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
        } else {
            let codeaux = *src.get(data).ok_or_else(|| corrupt("truncated triangle data"))?;
            data += 1;
            let fea = if codetri == 0xfe { 0 } else { 15 };
            let feb = (codeaux >> 4) as usize;
            let fec = (codeaux & 15) as usize;

            if codeaux == 0 {
                next = 0;
            }

            let mut take_next = || {
                let v = next;
                next += 1;
                v
            };
            let mut a = if fea == 0 { take_next() } else { 0 };
            let mut b = if feb == 0 { take_next() } else { fifo.vertex(feb) };
            let mut c = if fec == 0 { take_next() } else { fifo.vertex(fec) };

            if fea == 15 {
                a = read_index(src, &mut data, last)?;
                last = a;
            }
            if feb == 15 {
                b = read_index(src, &mut data, last)?;
                last = b;
            }
            if fec == 15 {
                c = read_index(src, &mut data, last)?;
                last = c;
            }

            write_triangle(dst, i, index_size, a, b, c);
            fifo.push_vertex(a, true);
            fifo.push_vertex(b, feb == 0 || feb == 15);
            fifo.push_vertex(c, fec == 0 || fec == 15);
            fifo.push_edge(b, a);
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
        }
    }

    if data != data_safe_end {
        return Err(corrupt("trailing data in triangle stream"));
    }
    Ok(())
}

fn write_triangle(dst: &mut [u8], i: usize, index_size: usize, a: u32, b: u32, c: u32) {
    write_index(dst, i, index_size, a);
    write_index(dst, i + 1, index_size, b);
    write_index(dst, i + 2, index_size, c);
}

/// Decode a free-form index sequence of `count` indices.
pub fn decode_index_sequence(
    dst: &mut [u8],
    count: usize,
    index_size: usize,
    src: &[u8],
) -> Result<()> {
    if index_size != 2 && index_size != 4 {
        return Err(corrupt("index sequence needs 2 or 4 byte indices"));
    }
    if dst.len() < count * index_size {
        return Err(corrupt("destination too small"));
    }
    if src.len() < 1 + count + 4 {
        return Err(corrupt("truncated index sequence"));
    }
    if src[0] & 0xf0 != SEQUENCE_HEADER {
        return Err(corrupt("bad index sequence header"));
    }
    if src[0] & 0x0f > 1 {
        return Err(corrupt("unsupported index sequence version"));
    }

    let data_safe_end = src.len() - 4;
    let mut data = 1;
    let mut last = [0u32; 2];

    for i in 0..count {
        if data >= data_safe_end {
            return Err(corrupt("truncated index sequence"));
        }
        let v = read_vbyte(src, &mut data)?;
        let current = (v & 1) as usize;
        let v = v >> 1;
        let d = (v >> 1) ^ (v & 1).wrapping_neg();
        let index = last[current].wrapping_add(d);
        last[current] = index;
        write_index(dst, i, index_size, index);
    }

    if data != data_safe_end {
        return Err(corrupt("trailing data in index sequence"));
    }
    Ok(())
}
