//! Post-resolve decode work: compressed buffer views, sparse accessors,
//! animation inputs, mesh decompression and normal generation.

use rayon::prelude::*;

use gltfkit_core::accessor::Accessor;
use gltfkit_core::buffer::{Buffer, BufferView};
use gltfkit_core::decode::AccessorData;
use gltfkit_core::document::Document;
use gltfkit_core::error::{GltfError, Result};
use gltfkit_core::indices::{AccessorId, BufferId, BufferViewId};
use gltfkit_core::mesh::{AttributeMap, Primitive};
use gltfkit_core::types::{BufferTarget, ComponentType, Dimension, PrimitiveMode};
use gltfkit_core::{CancelToken, DecodedPrimitive};

use crate::extensions::KHR_DRACO_MESH_COMPRESSION;
use crate::options::LoadOptions;

/// Run every processing step over a resolved document.
///
/// `progress` receives the completed fraction of this stage and may stop
/// the work by returning an error.
pub fn process(
    doc: &mut Document,
    options: &LoadOptions,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32) -> Result<()>,
) -> Result<()> {
    decode_compressed_views(doc, cancel)?;
    progress(0.4)?;

    check_sparse_accessors(doc, cancel)?;
    check_animation_inputs(doc)?;
    progress(0.6)?;

    splice_compressed_meshes(doc, options, cancel)?;
    progress(0.8)?;

    if options.create_normals_if_absent {
        generate_normals(doc, cancel)?;
    }
    progress(1.0)
}

/// Decompress every meshopt buffer view into the cache, in parallel.
fn decode_compressed_views(doc: &Document, cancel: &CancelToken) -> Result<()> {
    let views: Vec<BufferViewId> = doc
        .buffer_views
        .iter()
        .enumerate()
        .filter(|(_, v)| v.compression.is_some())
        .map(|(i, _)| BufferViewId::from(i))
        .collect();
    if views.is_empty() {
        return Ok(());
    }
    log::debug!("decoding {} compressed buffer views", views.len());
    views.par_iter().try_for_each(|&id| {
        cancel.check()?;
        doc.decode_buffer_view(id, cancel)
    })
}

/// Sparse patches are range-checked only when applied, so apply them all.
fn check_sparse_accessors(doc: &Document, cancel: &CancelToken) -> Result<()> {
    let sparse: Vec<AccessorId> = doc
        .accessors
        .iter()
        .enumerate()
        .filter(|(_, a)| a.sparse.is_some())
        .map(|(i, _)| AccessorId::from(i))
        .collect();
    sparse.par_iter().try_for_each(|&id| {
        cancel.check()?;
        doc.read_accessor_with(id, cancel).map(|_| ())
    })
}

fn check_animation_inputs(doc: &Document) -> Result<()> {
    for (a, animation) in doc.animations.iter().enumerate() {
        for sampler in &animation.samplers {
            let times = doc.read_accessor(sampler.input)?.to_f32();
            if times.windows(2).any(|w| w[1] < w[0]) {
                return Err(GltfError::invalid(format!(
                    "Animation {}: input accessor {} is not non-decreasing",
                    a, sampler.input.0
                )));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Generated geometry
// ============================================================================

/// Collects generated streams into one new buffer, one view per stream.
struct BufferBuilder {
    buffer: BufferId,
    bytes: Vec<u8>,
}

impl BufferBuilder {
    fn new(doc: &Document) -> Self {
        BufferBuilder {
            buffer: BufferId::from(doc.buffers.len()),
            bytes: Vec::new(),
        }
    }

    fn append(
        &mut self,
        doc: &mut Document,
        data: &AccessorData,
        target: BufferTarget,
        bounds: (Vec<f64>, Vec<f64>),
    ) -> AccessorId {
        let padding = (4 - self.bytes.len() % 4) % 4;
        self.bytes.resize(self.bytes.len() + padding, 0);
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(&data.bytes);

        let mut view = BufferView::new(self.buffer, offset, data.bytes.len());
        view.target = Some(target);
        let view_id = BufferViewId::from(doc.buffer_views.len());
        doc.buffer_views.push(view);

        let mut accessor = Accessor::new(Some(view_id), data.component_type, data.dimension, data.count);
        accessor.normalized = data.normalized;
        (accessor.min, accessor.max) = bounds;
        let id = AccessorId::from(doc.accessors.len());
        doc.accessors.push(accessor);
        id
    }

    fn finish(self, doc: &mut Document) {
        if self.bytes.is_empty() {
            return;
        }
        let mut buffer = Buffer::from_bytes(self.bytes);
        buffer.from_data_uri = true;
        doc.buffers.push(buffer);
    }
}

/// Declared bounds of the accessor a decoded stream replaces.
fn declared_bounds(doc: &Document, declared: Option<AccessorId>) -> (Vec<f64>, Vec<f64>) {
    declared
        .and_then(|id| doc.accessors.get(id.index()))
        .map(|a| (a.min.clone(), a.max.clone()))
        .unwrap_or_default()
}

fn primitives_where(doc: &Document, keep: impl Fn(&Primitive) -> bool) -> Vec<(usize, usize)> {
    doc.meshes
        .iter()
        .enumerate()
        .flat_map(|(m, mesh)| {
            mesh.primitives
                .iter()
                .enumerate()
                .filter(|(_, p)| keep(p))
                .map(move |(p, _)| (m, p))
        })
        .collect()
}

/// Replace compressed primitives with the decompressor's output.
fn splice_compressed_meshes(doc: &mut Document, options: &LoadOptions, cancel: &CancelToken) -> Result<()> {
    let targets = primitives_where(doc, |p| p.draco.is_some());
    if targets.is_empty() {
        return Ok(());
    }
    let decompressor = match options.registry.decompressor(KHR_DRACO_MESH_COMPRESSION) {
        Some(d) => d.clone(),
        None => {
            log::warn!(
                "{} primitives use {} and no decompressor is registered; leaving them compressed",
                targets.len(),
                KHR_DRACO_MESH_COMPRESSION
            );
            return Ok(());
        }
    };

    let mut builder = BufferBuilder::new(doc);
    for (m, p) in targets {
        cancel.check()?;
        let prim = &doc.meshes[m].primitives[p];
        let draco = match &prim.draco {
            Some(d) => d.clone(),
            None => continue,
        };
        let compressed = doc.buffer_view_bytes(draco.buffer_view, cancel)?.to_vec();
        let decoded: DecodedPrimitive = decompressor.decompress(&compressed, &draco.attributes)?;
        log::debug!(
            "mesh {} primitive {}: decompressed {} bytes into {} attributes",
            m,
            p,
            compressed.len(),
            decoded.attributes.len()
        );

        let declared_indices = prim.indices;
        let declared_attributes = prim.attributes.clone();
        check_decoded(doc, m, p, &declared_attributes, &decoded)?;

        let mut attributes = declared_attributes.clone();
        for (semantic, data) in &decoded.attributes {
            let mut bounds = declared_bounds(doc, declared_attributes.get(semantic).copied());
            if bounds.0.is_empty() && semantic == "POSITION" {
                bounds = data.bounds();
            }
            let id = builder.append(doc, data, BufferTarget::ArrayBuffer, bounds);
            attributes.insert(semantic.clone(), id);
        }
        let indices = match &decoded.indices {
            Some(data) => {
                let bounds = declared_bounds(doc, declared_indices);
                Some(builder.append(doc, data, BufferTarget::ElementArrayBuffer, bounds))
            }
            None => declared_indices,
        };

        let prim = &mut doc.meshes[m].primitives[p];
        prim.attributes = attributes;
        prim.indices = indices;
        prim.draco = None;
    }
    builder.finish(doc);
    Ok(())
}

/// Decompressed streams must form a valid primitive together with the
/// declared attributes they leave in place.
fn check_decoded(
    doc: &Document,
    m: usize,
    p: usize,
    declared: &AttributeMap,
    decoded: &DecodedPrimitive,
) -> Result<()> {
    let what = format!("Mesh {} primitive {}", m, p);
    let streams = decoded
        .attributes
        .iter()
        .map(|(semantic, data)| (semantic.as_str(), data))
        .chain(decoded.indices.iter().map(|data| ("indices", data)));
    for (name, data) in streams {
        if data.count.checked_mul(data.element_size()) != Some(data.bytes.len()) {
            return Err(GltfError::invalid(format!(
                "{}: decompressed {} holds {} bytes for {} elements",
                what,
                name,
                data.bytes.len(),
                data.count
            )));
        }
    }

    let mut count = None;
    let kept = declared
        .iter()
        .filter(|(semantic, _)| !decoded.attributes.contains_key(*semantic))
        .map(|(semantic, id)| Ok((semantic.as_str(), doc.accessor(*id)?.count)))
        .collect::<Result<Vec<_>>>()?;
    let decoded_counts = decoded.attributes.iter().map(|(semantic, data)| (semantic.as_str(), data.count));
    for (semantic, c) in decoded_counts.chain(kept) {
        match count {
            None => count = Some(c),
            Some(expected) if expected != c => {
                return Err(GltfError::invalid(format!(
                    "{}: decompressed attribute {} has count {}, expected {}",
                    what, semantic, c, expected
                )))
            }
            _ => {}
        }
    }

    if let Some(indices) = &decoded.indices {
        if indices.dimension != Dimension::Scalar || !indices.component_type.is_unsigned_integer() {
            return Err(GltfError::invalid(format!(
                "{}: decompressed indices must be unsigned integer scalars",
                what
            )));
        }
        if let Some(n) = count {
            if let Some(bad) = indices.to_u32()?.into_iter().find(|&i| i as usize >= n) {
                return Err(GltfError::invalid(format!(
                    "{}: decompressed index {} out of range for {} vertices",
                    what, bad, n
                )));
            }
        }
    }
    Ok(())
}

/// Area-weighted smooth normals for triangle lists without them.
fn generate_normals(doc: &mut Document, cancel: &CancelToken) -> Result<()> {
    let targets = primitives_where(doc, |p| {
        p.attribute("POSITION").is_some() && p.attribute("NORMAL").is_none() && p.draco.is_none()
    });
    if targets.is_empty() {
        return Ok(());
    }

    let mut builder = BufferBuilder::new(doc);
    for (m, p) in targets {
        cancel.check()?;
        let prim = &doc.meshes[m].primitives[p];
        let position = match prim.attribute("POSITION") {
            Some(id) => id,
            None => continue,
        };
        let accessor = doc.accessor(position)?;
        if prim.mode != PrimitiveMode::Triangles
            || accessor.component_type != ComponentType::F32
            || accessor.dimension != Dimension::Vec3
        {
            log::warn!(
                "mesh {} primitive {}: normals can only be generated for float triangle lists",
                m,
                p
            );
            continue;
        }

        let positions = doc.read_accessor_with(position, cancel)?.to_f32();
        let vertex_count = positions.len() / 3;
        let indices = match prim.indices {
            Some(id) => doc.read_accessor_with(id, cancel)?.to_u32()?,
            None => (0..vertex_count as u32).collect(),
        };
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(GltfError::invalid(format!(
                "Mesh {} primitive {}: index {} out of range ({} vertices)",
                m, p, bad, vertex_count
            )));
        }

        let normals = smooth_normals(&positions, &indices);
        let data = AccessorData::from_f32(Dimension::Vec3, &normals);
        let id = builder.append(doc, &data, BufferTarget::ArrayBuffer, (Vec::new(), Vec::new()));
        doc.meshes[m].primitives[p].attributes.insert("NORMAL".to_string(), id);
    }
    builder.finish(doc);
    Ok(())
}

fn smooth_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex = |i: u32| {
        let i = i as usize * 3;
        [positions[i], positions[i + 1], positions[i + 2]]
    };
    let mut normals = vec![0.0f32; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
        let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        // unnormalized cross product: its length is twice the triangle area
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        for &v in tri {
            let v = v as usize * 3;
            normals[v] += n[0];
            normals[v + 1] += n[1];
            normals[v + 2] += n[2];
        }
    }
    for n in normals.chunks_exact_mut(3) {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > 0.0 {
            n.iter_mut().for_each(|c| *c /= len);
        } else {
            n.copy_from_slice(&[0.0, 0.0, 1.0]);
        }
    }
    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smooth_normals_of_a_quad() {
        let positions = [
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ];
        let normals = smooth_normals(&positions, &[0, 1, 2, 0, 2, 3]);
        for n in normals.chunks(3) {
            assert_eq!(n, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_unreferenced_vertex_gets_default_normal() {
        let positions = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 5.0, 5.0, 5.0];
        let normals = smooth_normals(&positions, &[0, 1, 2]);
        assert_eq!(&normals[9..], [0.0, 0.0, 1.0]);
        assert_eq!(&normals[..3], [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_decreasing_animation_input() {
        let mut doc = Document::new();
        let times = AccessorData::from_f32(Dimension::Scalar, &[0.0, 1.0, 0.5]);
        let mut builder = BufferBuilder::new(&doc);
        let input = builder.append(&mut doc, &times, BufferTarget::ArrayBuffer, Default::default());
        builder.finish(&mut doc);
        doc.animations.push(gltfkit_core::Animation {
            samplers: vec![gltfkit_core::AnimationSampler {
                common: Default::default(),
                input,
                output: input,
                interpolation: Default::default(),
            }],
            ..Default::default()
        });
        let err = check_animation_inputs(&doc).unwrap_err();
        assert_eq!(err.code(), gltfkit_core::ErrorCode::InvalidDocument);
    }

    fn decoded(attributes: Vec<(&str, AccessorData)>, indices: Option<AccessorData>) -> DecodedPrimitive {
        DecodedPrimitive {
            attributes: attributes.into_iter().map(|(s, d)| (s.to_string(), d)).collect(),
            indices,
        }
    }

    #[test]
    fn test_decoded_primitive_checks() {
        let doc = Document::new();
        let declared = AttributeMap::new();
        let triangle = AccessorData::from_f32(Dimension::Vec3, &[0.0; 9]);

        let ok = decoded(vec![("POSITION", triangle.clone())], Some(AccessorData::from_u32(&[0, 1, 2])));
        check_decoded(&doc, 0, 0, &declared, &ok).unwrap();

        let short_normals = AccessorData::from_f32(Dimension::Vec3, &[0.0; 6]);
        let mismatched = decoded(
            vec![("POSITION", triangle.clone()), ("NORMAL", short_normals)],
            None,
        );
        let err = check_decoded(&doc, 0, 0, &declared, &mismatched).unwrap_err();
        assert_eq!(err.code(), gltfkit_core::ErrorCode::InvalidDocument);

        let float_indices = AccessorData::from_f32(Dimension::Scalar, &[0.0, 1.0, 2.0]);
        let bad_indices = decoded(vec![("POSITION", triangle.clone())], Some(float_indices));
        assert!(check_decoded(&doc, 0, 0, &declared, &bad_indices).is_err());

        let out_of_range = decoded(vec![("POSITION", triangle.clone())], Some(AccessorData::from_u32(&[0, 1, 3])));
        assert!(check_decoded(&doc, 0, 0, &declared, &out_of_range).is_err());

        let mut truncated = triangle;
        truncated.bytes.pop();
        assert!(check_decoded(&doc, 0, 0, &declared, &decoded(vec![("POSITION", truncated)], None)).is_err());
    }
}
