//! Accessor decoding: strided reads, sparse patches and normalization.

use std::ops::Deref;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use num_traits::{AsPrimitive, Bounded, PrimInt};

use crate::accessor::Accessor;
use crate::animation::KeyframeTrack;
use crate::cancel::CancelToken;
use crate::decode::meshopt;
use crate::document::Document;
use crate::error::{try_zeroed, GltfError, Result};
use crate::indices::{AccessorId, AnimationId, BufferViewId};
use crate::types::{ComponentType, Dimension, ElementLayout, Interpolation};

/// Tightly packed decoded elements of an accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorData {
    pub component_type: ComponentType,
    pub dimension: Dimension,
    pub normalized: bool,
    pub count: usize,
    /// `count * element_size()` little-endian bytes.
    pub bytes: Vec<u8>,
}

/// Map a fixed-point integer onto `[0, 1]` or `[-1, 1]`.
pub fn normalize<T>(v: T) -> f32
where
    T: PrimInt + Bounded + AsPrimitive<f32>,
{
    let max: f32 = T::max_value().as_();
    (v.as_() / max).max(-1.0)
}

impl AccessorData {
    pub fn layout(&self) -> ElementLayout {
        ElementLayout::new(self.component_type, self.dimension)
    }

    pub fn element_size(&self) -> usize {
        self.layout().packed_size()
    }

    pub fn element(&self, i: usize) -> &[u8] {
        let size = self.element_size();
        &self.bytes[i * size..(i + 1) * size]
    }

    /// Build float data from a flat list of components.
    pub fn from_f32(dimension: Dimension, values: &[f32]) -> Self {
        let mut bytes = vec![0u8; values.len() * 4];
        LittleEndian::write_f32_into(values, &mut bytes);
        AccessorData {
            component_type: ComponentType::F32,
            dimension,
            normalized: false,
            count: values.len() / dimension.component_count(),
            bytes,
        }
    }

    /// Build scalar index data.
    pub fn from_u32(values: &[u32]) -> Self {
        let mut bytes = vec![0u8; values.len() * 4];
        LittleEndian::write_u32_into(values, &mut bytes);
        AccessorData {
            component_type: ComponentType::U32,
            dimension: Dimension::Scalar,
            normalized: false,
            count: values.len(),
            bytes,
        }
    }

    fn component_f32(&self, k: usize, denormalize: bool) -> f32 {
        let b = &self.bytes;
        match self.component_type {
            ComponentType::I8 => {
                let v = b[k] as i8;
                if denormalize { normalize(v) } else { v as f32 }
            }
            ComponentType::U8 => {
                let v = b[k];
                if denormalize { normalize(v) } else { v as f32 }
            }
            ComponentType::I16 => {
                let v = LittleEndian::read_i16(&b[k * 2..]);
                if denormalize { normalize(v) } else { v as f32 }
            }
            ComponentType::U16 => {
                let v = LittleEndian::read_u16(&b[k * 2..]);
                if denormalize { normalize(v) } else { v as f32 }
            }
            ComponentType::U32 => {
                let v = LittleEndian::read_u32(&b[k * 4..]);
                if denormalize { normalize(v) } else { v as f32 }
            }
            ComponentType::F32 => LittleEndian::read_f32(&b[k * 4..]),
        }
    }

    fn component_total(&self) -> usize {
        self.count * self.dimension.component_count()
    }

    /// Components as floats, de-normalized when the accessor is normalized.
    pub fn to_f32(&self) -> Vec<f32> {
        (0..self.component_total())
            .map(|k| self.component_f32(k, self.normalized))
            .collect()
    }

    /// Components as floats without de-normalization.
    pub fn to_f32_raw(&self) -> Vec<f32> {
        (0..self.component_total())
            .map(|k| self.component_f32(k, false))
            .collect()
    }

    /// Integer components widened to `u32`. Fails for float data.
    pub fn to_u32(&self) -> Result<Vec<u32>> {
        let b = &self.bytes;
        let n = self.component_total();
        let out = match self.component_type {
            ComponentType::U8 => b[..n].iter().map(|&v| v as u32).collect(),
            ComponentType::I8 => b[..n].iter().map(|&v| v as i8 as u32).collect(),
            ComponentType::U16 => (0..n).map(|k| LittleEndian::read_u16(&b[k * 2..]) as u32).collect(),
            ComponentType::I16 => (0..n).map(|k| LittleEndian::read_i16(&b[k * 2..]) as u32).collect(),
            ComponentType::U32 => (0..n).map(|k| LittleEndian::read_u32(&b[k * 4..])).collect(),
            ComponentType::F32 => {
                return Err(GltfError::invalid("float accessor read as integers"));
            }
        };
        Ok(out)
    }

    /// Write the elements back in stored form at `offset`, `stride` bytes apart.
    pub fn write_strided(&self, dst: &mut [u8], offset: usize, stride: usize) -> Result<()> {
        let layout = self.layout();
        let stored = layout.stored_size();
        if span_end(offset, self.count, stride, stored).map_or(true, |end| end > dst.len()) {
            return Err(GltfError::invalid("destination too small for accessor data"));
        }
        for i in 0..self.count {
            let at = offset + i * stride;
            layout.unpack_into(self.element(i), &mut dst[at..at + stored]);
        }
        Ok(())
    }

    /// Per-component minimum and maximum, as written to `min`/`max`.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.dimension.component_count();
        let raw = self.to_f32_raw();
        let mut min = vec![f64::INFINITY; n];
        let mut max = vec![f64::NEG_INFINITY; n];
        for (k, v) in raw.iter().enumerate() {
            let c = k % n;
            min[c] = min[c].min(*v as f64);
            max[c] = max[c].max(*v as f64);
        }
        if self.count == 0 {
            return (Vec::new(), Vec::new());
        }
        (min, max)
    }
}

/// Bytes of a buffer view: borrowed from its buffer, or shared decoded data.
pub enum ViewBytes<'a> {
    Borrowed(&'a [u8]),
    Decoded(Arc<[u8]>, usize),
}

impl Deref for ViewBytes<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ViewBytes::Borrowed(b) => b,
            ViewBytes::Decoded(b, len) => &b[..*len],
        }
    }
}

impl Document {
    /// The bytes covered by a buffer view, decompressing them on first use.
    pub fn buffer_view_bytes(&self, id: BufferViewId, cancel: &CancelToken) -> Result<ViewBytes<'_>> {
        let view = self.buffer_view(id)?;

        if let Some(compression) = &view.compression {
            let decoded = self.decode_cache.get_or_decode(id, || {
                let source = self.buffer(compression.buffer)?;
                let data = source.bytes().ok_or_else(|| {
                    GltfError::invalid(format!(
                        "Buffer {} holding compressed data has no bytes",
                        compression.buffer.0
                    ))
                })?;
                let src = compression
                    .end()
                    .and_then(|end| data.get(compression.byte_offset..end))
                    .ok_or_else(|| {
                        GltfError::too_short(format!("compressed stream of buffer view {}", id.0))
                    })?;
                log::debug!(
                    "decoding meshopt buffer view {} ({} bytes, {} elements of {} bytes)",
                    id.0,
                    compression.byte_length,
                    compression.count,
                    compression.byte_stride
                );
                meshopt::decode_stream(compression, src, cancel)
            })?;
            let len = view.byte_length.min(decoded.len());
            return Ok(ViewBytes::Decoded(decoded, len));
        }

        let buffer = self.buffer(view.buffer)?;
        let data = buffer.bytes().ok_or_else(|| {
            GltfError::invalid(format!("Buffer {} has no data loaded", view.buffer.0))
        })?;
        view.end()
            .and_then(|end| data.get(view.byte_offset..end))
            .map(ViewBytes::Borrowed)
            .ok_or_else(|| GltfError::too_short(format!("buffer view {}", id.0)))
    }

    /// Decode a compressed buffer view into the cache. No-op for plain views.
    pub fn decode_buffer_view(&self, id: BufferViewId, cancel: &CancelToken) -> Result<()> {
        if self.buffer_view(id)?.compression.is_some() {
            self.buffer_view_bytes(id, cancel)?;
        }
        Ok(())
    }

    pub fn read_accessor(&self, id: AccessorId) -> Result<AccessorData> {
        self.read_accessor_with(id, &CancelToken::new())
    }

    /// Decode an accessor: dense base data (or zeros), then sparse patches.
    pub fn read_accessor_with(&self, id: AccessorId, cancel: &CancelToken) -> Result<AccessorData> {
        let accessor = self.accessor(id)?;
        let layout = accessor.layout();
        let size = layout.packed_size();
        let total = accessor.count.checked_mul(size).ok_or_else(|| {
            GltfError::invalid(format!("Accessor {}: count {} is too large", id.0, accessor.count))
        })?;
        let mut bytes = try_zeroed(total)?;

        if let Some(view_id) = accessor.buffer_view {
            let view = self.buffer_view(view_id)?;
            let src = self.buffer_view_bytes(view_id, cancel)?;
            let stored = layout.stored_size();
            let stride = view.byte_stride.unwrap_or(stored);
            read_strided(&src, accessor.byte_offset, stride, layout, &mut bytes, accessor.count)
                .map_err(|_| {
                    GltfError::invalid(format!("Accessor {} reads past buffer view {}", id.0, view_id.0))
                })?;
        }

        if let Some(sparse) = &accessor.sparse {
            self.apply_sparse(id, accessor, &mut bytes, cancel)?;
            log::trace!("applied {} sparse patches to accessor {}", sparse.count, id.0);
        }

        Ok(AccessorData {
            component_type: accessor.component_type,
            dimension: accessor.dimension,
            normalized: accessor.normalized,
            count: accessor.count,
            bytes,
        })
    }

    fn apply_sparse(
        &self,
        id: AccessorId,
        accessor: &Accessor,
        bytes: &mut [u8],
        cancel: &CancelToken,
    ) -> Result<()> {
        let sparse = match &accessor.sparse {
            Some(s) => s,
            None => return Ok(()),
        };
        let layout = accessor.layout();
        let size = layout.packed_size();
        let stored = layout.stored_size();

        let index_src = self.buffer_view_bytes(sparse.index_view, cancel)?;
        let value_src = self.buffer_view_bytes(sparse.value_view, cancel)?;
        let index_size = sparse.index_component_type.byte_size();

        let mut previous: Option<u32> = None;
        for p in 0..sparse.count {
            let raw = span_end(sparse.index_offset, p + 1, index_size, index_size)
                .and_then(|end| index_src.get(end - index_size..end))
                .ok_or_else(|| GltfError::invalid(format!("Accessor {}: sparse indices truncated", id.0)))?;
            let index = match sparse.index_component_type {
                ComponentType::U8 => raw[0] as u32,
                ComponentType::U16 => LittleEndian::read_u16(raw) as u32,
                ComponentType::U32 => LittleEndian::read_u32(raw),
                other => {
                    return Err(GltfError::invalid(format!(
                        "Accessor {}: sparse index type {:?} is not unsigned",
                        id.0, other
                    )))
                }
            };
            if index as usize >= accessor.count {
                return Err(GltfError::invalid(format!(
                    "Accessor {}: sparse index {} out of range (count {})",
                    id.0, index, accessor.count
                )));
            }
            if previous.map_or(false, |prev| index <= prev) {
                return Err(GltfError::invalid(format!(
                    "Accessor {}: sparse indices are not strictly increasing",
                    id.0
                )));
            }
            previous = Some(index);

            let value = span_end(sparse.value_offset, p + 1, stored, stored)
                .and_then(|end| value_src.get(end - stored..end))
                .ok_or_else(|| GltfError::invalid(format!("Accessor {}: sparse values truncated", id.0)))?;
            let to = index as usize * size;
            layout.pack_into(value, &mut bytes[to..to + size]);
        }
        Ok(())
    }

    /// Decode the keyframes driving one animation channel.
    pub fn keyframe_track(&self, animation: AnimationId, channel: usize) -> Result<KeyframeTrack> {
        let anim = self
            .animations
            .get(animation.index())
            .ok_or_else(|| GltfError::invalid(format!("Invalid animation index: {}", animation.0)))?;
        let channel = anim
            .channels
            .get(channel)
            .ok_or_else(|| GltfError::invalid(format!("Invalid channel index: {}", channel)))?;
        let sampler = anim
            .samplers
            .get(channel.sampler)
            .ok_or_else(|| GltfError::invalid(format!("Invalid sampler index: {}", channel.sampler)))?;

        let times = self.read_accessor(sampler.input)?.to_f32();
        let output = self.read_accessor(sampler.output)?;
        let values = output.to_f32();
        let mut components = output.dimension.component_count();
        let per_key = match sampler.interpolation {
            Interpolation::CubicSpline => 3,
            _ => 1,
        };
        // morph weights pack every target's weight into one scalar stream
        if output.dimension == Dimension::Scalar && !times.is_empty() {
            components = values.len() / (times.len() * per_key).max(1);
        }

        Ok(KeyframeTrack {
            times,
            values,
            components: components.max(1),
            interpolation: sampler.interpolation,
        })
    }
}

/// End of `count` elements of `element` bytes laid out `stride` apart from
/// `offset`, or `None` on overflow. An empty run ends at `offset`.
pub fn span_end(offset: usize, count: usize, stride: usize, element: usize) -> Option<usize> {
    match count.checked_sub(1) {
        None => Some(offset),
        Some(last) => last.checked_mul(stride)?.checked_add(element)?.checked_add(offset),
    }
}

/// Copy `count` stored elements into packed form.
fn read_strided(
    src: &[u8],
    offset: usize,
    stride: usize,
    layout: ElementLayout,
    dst: &mut [u8],
    count: usize,
) -> std::result::Result<(), ()> {
    let stored = layout.stored_size();
    let size = layout.packed_size();
    for i in 0..count {
        let end = span_end(offset, i + 1, stride, stored).ok_or(())?;
        let element = src.get(end - stored..end).ok_or(())?;
        layout.pack_into(element, &mut dst[i * size..(i + 1) * size]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::SparseStorage;
    use crate::buffer::{Buffer, BufferView};
    use crate::indices::BufferId;
    use crate::object::Common;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn doc_with_buffer(bytes: Vec<u8>) -> Document {
        let mut doc = Document::new();
        let len = bytes.len();
        doc.buffers.push(Buffer::from_bytes(bytes));
        doc.buffer_views.push(BufferView::new(BufferId(0), 0, len));
        doc
    }

    #[test]
    fn test_normalize_boundaries() {
        assert_eq!(normalize(0u8), 0.0);
        assert_eq!(normalize(255u8), 1.0);
        assert_eq!(normalize(-32768i16), -1.0);
        assert_eq!(normalize(32767i16), 1.0);
        assert_eq!(normalize(-128i8), -1.0);
        assert_eq!(normalize(65535u16), 1.0);
    }

    #[test]
    fn test_span_end() {
        assert_eq!(span_end(4, 0, 12, 12), Some(4));
        assert_eq!(span_end(4, 3, 16, 12), Some(48));
        assert_eq!(span_end(usize::MAX, 1, 4, 4), None);
        assert_eq!(span_end(0, 1 << 62, 8, 8), None);
    }

    #[test]
    fn test_huge_count_fails_without_allocating() {
        let mut doc = Document::new();
        doc.accessors
            .push(Accessor::new(None, ComponentType::F32, Dimension::Vec4, 1 << 62));
        let err = doc.read_accessor(AccessorId(0)).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidDocument);
    }

    #[test]
    fn test_read_float_scalars() {
        let mut doc = doc_with_buffer(f32_bytes(&[1.0, 2.0, 3.0]));
        doc.accessors.push(Accessor::new(
            Some(BufferViewId(0)),
            ComponentType::F32,
            Dimension::Scalar,
            3,
        ));
        let data = doc.read_accessor(AccessorId(0)).unwrap();
        assert_eq!(data.to_f32(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_strided_read_is_packed() {
        // two u16 vec2 elements interleaved with 4 bytes of other data
        let bytes = vec![1, 0, 2, 0, 0xEE, 0xEE, 0xEE, 0xEE, 3, 0, 4, 0, 0xEE, 0xEE, 0xEE, 0xEE];
        let mut doc = doc_with_buffer(bytes);
        doc.buffer_views[0].byte_stride = Some(8);
        doc.accessors.push(Accessor::new(
            Some(BufferViewId(0)),
            ComponentType::U16,
            Dimension::Vec2,
            2,
        ));
        let data = doc.read_accessor(AccessorId(0)).unwrap();
        assert_eq!(data.bytes, vec![1, 0, 2, 0, 3, 0, 4, 0]);
        assert_eq!(data.to_u32().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_normalized_u8_to_f32() {
        let mut doc = doc_with_buffer(vec![0, 255, 0, 0]);
        let mut accessor = Accessor::new(Some(BufferViewId(0)), ComponentType::U8, Dimension::Vec2, 1);
        accessor.normalized = true;
        doc.accessors.push(accessor);
        let data = doc.read_accessor(AccessorId(0)).unwrap();
        assert_eq!(data.to_f32(), vec![0.0, 1.0]);
        assert_eq!(data.to_f32_raw(), vec![0.0, 255.0]);
    }

    #[test]
    fn test_sparse_without_base_view() {
        let mut bytes = vec![1u8, 3];
        bytes.extend(f32_bytes(&[7.0, 9.0]));
        let mut doc = Document::new();
        doc.buffers.push(Buffer::from_bytes(bytes));
        doc.buffer_views.push(BufferView::new(BufferId(0), 0, 2));
        doc.buffer_views.push(BufferView::new(BufferId(0), 2, 8));

        let mut accessor = Accessor::new(None, ComponentType::F32, Dimension::Scalar, 5);
        accessor.sparse = Some(SparseStorage {
            common: Common::default(),
            count: 2,
            index_view: BufferViewId(0),
            index_offset: 0,
            index_component_type: ComponentType::U8,
            value_view: BufferViewId(1),
            value_offset: 0,
        });
        doc.accessors.push(accessor);

        let data = doc.read_accessor(AccessorId(0)).unwrap();
        assert_eq!(data.to_f32(), vec![0.0, 7.0, 0.0, 9.0, 0.0]);
    }

    #[test]
    fn test_sparse_rejects_unordered_indices() {
        let mut bytes = vec![3u8, 1];
        bytes.extend(f32_bytes(&[7.0, 9.0]));
        let mut doc = Document::new();
        doc.buffers.push(Buffer::from_bytes(bytes));
        doc.buffer_views.push(BufferView::new(BufferId(0), 0, 2));
        doc.buffer_views.push(BufferView::new(BufferId(0), 2, 8));
        let mut accessor = Accessor::new(None, ComponentType::F32, Dimension::Scalar, 5);
        accessor.sparse = Some(SparseStorage {
            common: Common::default(),
            count: 2,
            index_view: BufferViewId(0),
            index_offset: 0,
            index_component_type: ComponentType::U8,
            value_view: BufferViewId(1),
            value_offset: 0,
        });
        doc.accessors.push(accessor);
        let err = doc.read_accessor(AccessorId(0)).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidDocument);
    }

    #[test]
    fn test_buffer_without_data() {
        let mut doc = Document::new();
        doc.buffers.push(Buffer {
            byte_length: 4,
            uri: Some("missing.bin".into()),
            ..Buffer::default()
        });
        doc.buffer_views.push(BufferView::new(BufferId(0), 0, 4));
        doc.accessors.push(Accessor::new(
            Some(BufferViewId(0)),
            ComponentType::F32,
            Dimension::Scalar,
            1,
        ));
        assert!(doc.read_accessor(AccessorId(0)).is_err());
    }

    #[test]
    fn test_write_strided_matches_source() {
        let bytes = vec![1, 0, 2, 0, 0, 0, 0, 0, 3, 0, 4, 0, 0, 0, 0, 0];
        let mut doc = doc_with_buffer(bytes.clone());
        doc.buffer_views[0].byte_stride = Some(8);
        doc.accessors.push(Accessor::new(
            Some(BufferViewId(0)),
            ComponentType::U16,
            Dimension::Vec2,
            2,
        ));
        let data = doc.read_accessor(AccessorId(0)).unwrap();
        let mut out = vec![0u8; bytes.len()];
        data.write_strided(&mut out, 0, 8).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_bounds() {
        let data = AccessorData::from_f32(Dimension::Vec2, &[1.0, -2.0, 3.0, 4.0]);
        let (min, max) = data.bounds();
        assert_eq!(min, vec![1.0, -2.0]);
        assert_eq!(max, vec![3.0, 4.0]);
    }
}
