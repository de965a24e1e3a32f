//! End-to-end tests for the load pipeline: framing, resolution, status
//! reporting, cancellation and the processing stage.

use std::fs;
use std::ops::ControlFlow;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use gltfkit_core::{
    AccessorData, AccessorId, DecodedPrimitive, Dimension, ErrorCode, GltfError, MeshDecompressor,
    Result,
};
use gltfkit_io::uri::encode_data_uri;
use gltfkit_io::{
    load_bytes, load_bytes_async, load_path, read_container, write_glb, LoadOptions, Registry,
    Status,
};
use indexmap::IndexMap;
use proptest::prelude::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn data_uri(bytes: &[u8]) -> String {
    encode_data_uri(bytes, "application/octet-stream")
}

/// A GLB holding one scalar float accessor over `[1.0, 2.5, -3.0]`.
fn three_floats_glb() -> Vec<u8> {
    let json = br#"{
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 12}],
        "bufferViews": [{"buffer": 0, "byteLength": 12}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "SCALAR"}]
    }"#;
    write_glb(json, Some(&f32_bytes(&[1.0, 2.5, -3.0])))
}

/// Records every report a listener receives.
#[derive(Debug, Clone, PartialEq)]
struct Report {
    status: Status,
    fraction: f32,
    has_output: bool,
    error: Option<ErrorCode>,
}

fn recorder() -> (
    Arc<Mutex<Vec<Report>>>,
    impl FnMut(&gltfkit_io::Progress<'_, gltfkit_core::Document>) -> ControlFlow<()> + Send + 'static,
) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let listener = move |p: &gltfkit_io::Progress<'_, gltfkit_core::Document>| {
        sink.lock().unwrap().push(Report {
            status: p.status,
            fraction: p.fraction,
            has_output: p.output.is_some(),
            error: p.error.map(GltfError::code),
        });
        ControlFlow::Continue(())
    };
    (reports, listener)
}

#[test]
fn test_glb_three_floats() {
    init();
    let doc = load_bytes(three_floats_glb(), LoadOptions::new()).unwrap();
    let data = doc.read_accessor(AccessorId(0)).unwrap();
    assert_eq!(data.to_f32(), vec![1.0, 2.5, -3.0]);
    assert_eq!(doc.buffers.len(), 1);
}

#[test]
fn test_status_order_and_output_only_at_complete() {
    init();
    let (reports, listener) = recorder();
    let doc = load_bytes_async(three_floats_glb(), LoadOptions::new(), listener)
        .wait()
        .unwrap();
    assert_eq!(doc.accessors.len(), 1);

    let reports = reports.lock().unwrap();
    let statuses: Vec<Status> = reports.iter().map(|r| r.status).collect();
    assert_eq!(statuses.first(), Some(&Status::Parsing));
    assert_eq!(statuses.last(), Some(&Status::Complete));
    let mut last = 0;
    for status in &statuses {
        assert!(*status as i32 >= last, "status went backwards: {:?}", statuses);
        last = *status as i32;
    }
    assert!(statuses.contains(&Status::Validating));
    assert!(statuses.contains(&Status::Processing));
    assert_eq!(statuses.iter().filter(|s| s.is_terminal()).count(), 1);

    for r in reports.iter() {
        assert_eq!(r.has_output, r.status == Status::Complete);
        assert!(r.error.is_none());
        assert!((0.0..=1.0).contains(&r.fraction));
    }
    assert_eq!(reports.last().map(|r| r.fraction), Some(1.0));
}

#[test]
fn test_sparse_index_out_of_range_fails_load() {
    init();
    // one u8 index (5) then one f32 value (1.0)
    let mut bytes = vec![5, 0, 0, 0];
    bytes.extend(f32_bytes(&[1.0]));
    let json = format!(
        r#"{{
            "asset": {{"version": "2.0"}},
            "buffers": [{{"byteLength": 8, "uri": "{}"}}],
            "bufferViews": [
                {{"buffer": 0, "byteOffset": 0, "byteLength": 1}},
                {{"buffer": 0, "byteOffset": 4, "byteLength": 4}}
            ],
            "accessors": [{{
                "componentType": 5126, "count": 5, "type": "SCALAR",
                "sparse": {{
                    "count": 1,
                    "indices": {{"bufferView": 0, "componentType": 5121}},
                    "values": {{"bufferView": 1}}
                }}
            }}]
        }}"#,
        data_uri(&bytes)
    );

    let (reports, listener) = recorder();
    let err = load_bytes_async(json.into_bytes(), LoadOptions::new(), listener)
        .wait()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidDocument);

    let reports = reports.lock().unwrap();
    let last = reports.last().unwrap();
    assert_eq!(last.status, Status::Error);
    assert_eq!(last.error, Some(ErrorCode::InvalidDocument));
    assert!(reports.iter().all(|r| !r.has_output));
}

#[test]
fn test_sparse_patch_in_range_loads() {
    init();
    let mut bytes = vec![4, 0, 0, 0];
    bytes.extend(f32_bytes(&[7.0]));
    let json = format!(
        r#"{{
            "asset": {{"version": "2.0"}},
            "buffers": [{{"byteLength": 8, "uri": "{}"}}],
            "bufferViews": [
                {{"buffer": 0, "byteLength": 1}},
                {{"buffer": 0, "byteOffset": 4, "byteLength": 4}}
            ],
            "accessors": [{{
                "componentType": 5126, "count": 5, "type": "SCALAR",
                "sparse": {{
                    "count": 1,
                    "indices": {{"bufferView": 0, "componentType": 5121}},
                    "values": {{"bufferView": 1}}
                }}
            }}]
        }}"#,
        data_uri(&bytes)
    );
    let doc = load_bytes(json, LoadOptions::new()).unwrap();
    let data = doc.read_accessor(AccessorId(0)).unwrap();
    assert_eq!(data.to_f32(), vec![0.0, 0.0, 0.0, 0.0, 7.0]);
}

#[test]
fn test_glb_length_mismatch_is_framing_error() {
    init();
    let mut glb = three_floats_glb();
    let declared = glb.len() as u32 + 16;
    glb[8..12].copy_from_slice(&declared.to_le_bytes());

    let err = load_bytes(glb, LoadOptions::new()).unwrap_err();
    assert!(err.code().is_framing(), "unexpected error {:?}", err);
}

#[test]
fn test_empty_input() {
    init();
    let err = load_bytes(Vec::new(), LoadOptions::new()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoDataToLoad);
}

#[test]
fn test_invalid_json() {
    init();
    let err = load_bytes(&b"{\"asset\": "[..], LoadOptions::new()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidJson);
}

#[test]
fn test_required_extension_without_decoder() {
    init();
    let json = br#"{
        "asset": {"version": "2.0"},
        "extensionsUsed": ["KHR_draco_mesh_compression"],
        "extensionsRequired": ["KHR_draco_mesh_compression"]
    }"#;
    let (reports, listener) = recorder();
    let err = load_bytes_async(json.to_vec(), LoadOptions::new(), listener)
        .wait()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedExtension);

    let reports = reports.lock().unwrap();
    assert!(reports.iter().all(|r| !r.has_output));
    assert!(reports.iter().all(|r| r.status != Status::Complete));
    assert_eq!(
        reports.iter().filter(|r| r.status == Status::Error).count(),
        1
    );
}

#[test]
fn test_required_vendor_extension_fails() {
    init();
    let json = br#"{
        "asset": {"version": "2.0"},
        "extensionsUsed": ["VENDOR_magic"],
        "extensionsRequired": ["VENDOR_magic"]
    }"#;
    let err = load_bytes(&json[..], LoadOptions::new()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedExtension);
}

#[test]
fn test_node_cycle_is_rejected() {
    init();
    let json = br#"{
        "asset": {"version": "2.0"},
        "nodes": [{"children": [1]}, {"children": [0]}],
        "scenes": [{"nodes": [0]}]
    }"#;
    let err = load_bytes(&json[..], LoadOptions::new()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidDocument);
}

#[test]
fn test_legacy_document_is_rejected() {
    init();
    let json = br#"{"asset": {"version": "1.0"}}"#;
    let err = load_bytes(&json[..], LoadOptions::new()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::LegacyFormatUnsupported);
}

#[test]
fn test_listener_break_cancels_once() {
    init();
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let task = load_bytes_async(three_floats_glb(), LoadOptions::new(), move |p| {
        sink.lock()
            .unwrap()
            .push((p.status, p.error.map(GltfError::code), p.output.is_some()));
        if p.status == Status::Validating {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    let err = task.wait().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);

    let reports = reports.lock().unwrap();
    let errors: Vec<_> = reports.iter().filter(|r| r.0 == Status::Error).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1, Some(ErrorCode::Cancelled));
    assert_eq!(reports.last().map(|r| r.0), Some(Status::Error));
    assert!(reports.iter().all(|r| r.0 != Status::Complete && !r.2));
}

#[test]
fn test_cancel_from_caller() {
    init();
    let (started_tx, started_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();
    let resume_rx = Mutex::new(resume_rx);
    let (status_tx, status_rx) = mpsc::channel();

    let task = load_bytes_async(three_floats_glb(), LoadOptions::new(), move |p| {
        let _ = status_tx.send(p.status);
        if p.status == Status::Parsing {
            let _ = started_tx.send(());
            let _ = resume_rx.lock().unwrap().recv();
        }
        ControlFlow::Continue(())
    });

    started_rx.recv().unwrap();
    task.cancel();
    resume_tx.send(()).unwrap();

    let err = task.wait().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);
    let statuses: Vec<Status> = status_rx.try_iter().collect();
    assert_eq!(statuses.last(), Some(&Status::Error));
    assert!(!statuses.contains(&Status::Complete));
}

#[test]
fn test_external_buffer_resolves_beside_file() {
    init();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("data.bin"), f32_bytes(&[0.5, 1.5])).unwrap();
    let json = r#"{
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 8, "uri": "data.bin"}],
        "bufferViews": [{"buffer": 0, "byteLength": 8}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR"}]
    }"#;
    let path = dir.path().join("scene.gltf");
    fs::write(&path, json).unwrap();

    let doc = load_path(&path, LoadOptions::new()).unwrap();
    assert_eq!(doc.read_accessor(AccessorId(0)).unwrap().to_f32(), vec![0.5, 1.5]);
    assert_eq!(doc.url.as_deref(), Some(path.as_path()));

    fs::remove_file(dir.path().join("data.bin")).unwrap();
    let err = load_path(&path, LoadOptions::new()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FileNotFound);
}

#[test]
fn test_missing_file() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let err = load_path(dir.path().join("absent.glb"), LoadOptions::new()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FileNotFound);
}

#[test]
fn test_meshopt_view_is_decoded_during_load() {
    init();
    // index sequence stream for [0, 1, 2]
    let stream = [0xd0, 0x00, 0x04, 0x04, 0, 0, 0, 0];
    let json = format!(
        r#"{{
            "asset": {{"version": "2.0"}},
            "extensionsUsed": ["EXT_meshopt_compression"],
            "extensionsRequired": ["EXT_meshopt_compression"],
            "buffers": [
                {{"byteLength": 8, "uri": "{}"}},
                {{"byteLength": 12, "extensions": {{"EXT_meshopt_compression": {{"fallback": true}}}}}}
            ],
            "bufferViews": [{{
                "buffer": 1, "byteLength": 12,
                "extensions": {{"EXT_meshopt_compression": {{
                    "buffer": 0, "byteLength": 8, "byteStride": 4, "count": 3, "mode": "INDICES"
                }}}}
            }}],
            "accessors": [{{"bufferView": 0, "componentType": 5125, "count": 3, "type": "SCALAR"}}]
        }}"#,
        data_uri(&stream)
    );
    let doc = load_bytes(json, LoadOptions::new()).unwrap();
    let data = doc.read_accessor(AccessorId(0)).unwrap();
    assert_eq!(data.to_u32().unwrap(), vec![0, 1, 2]);
    assert!(doc.buffers[1].is_compression_fallback);
}

/// Returns a fixed triangle and checks the payload it was handed.
struct FixedTriangle {
    expected: Vec<u8>,
}

impl MeshDecompressor for FixedTriangle {
    fn decompress(&self, compressed: &[u8], attributes: &IndexMap<String, u32>) -> Result<DecodedPrimitive> {
        if compressed != self.expected.as_slice() {
            return Err(GltfError::invalid("unexpected payload"));
        }
        let mut decoded = DecodedPrimitive::default();
        if attributes.contains_key("POSITION") {
            decoded.attributes.insert(
                "POSITION".into(),
                AccessorData::from_f32(
                    Dimension::Vec3,
                    &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                ),
            );
        }
        decoded.indices = Some(AccessorData::from_u32(&[0, 1, 2]));
        Ok(decoded)
    }
}

fn draco_document(payload: &[u8]) -> String {
    format!(
        r#"{{
            "asset": {{"version": "2.0"}},
            "extensionsUsed": ["KHR_draco_mesh_compression"],
            "extensionsRequired": ["KHR_draco_mesh_compression"],
            "buffers": [{{"byteLength": {}, "uri": "{}"}}],
            "bufferViews": [{{"buffer": 0, "byteLength": {}}}],
            "accessors": [
                {{"componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}},
                {{"componentType": 5123, "count": 3, "type": "SCALAR"}}
            ],
            "meshes": [{{"primitives": [{{
                "attributes": {{"POSITION": 0}},
                "indices": 1,
                "extensions": {{"KHR_draco_mesh_compression": {{
                    "bufferView": 0, "attributes": {{"POSITION": 0}}
                }}}}
            }}]}}]
        }}"#,
        payload.len(),
        data_uri(payload),
        payload.len()
    )
}

#[test]
fn test_draco_primitive_is_spliced() {
    init();
    let payload = b"DRACO\x02\x02\x01".to_vec();
    let registry = Registry::new().with_draco(Arc::new(FixedTriangle {
        expected: payload.clone(),
    }));
    let options = LoadOptions::new().with_registry(registry);
    let doc = load_bytes(draco_document(&payload), options).unwrap();

    let prim = &doc.meshes[0].primitives[0];
    assert!(prim.draco.is_none());
    let position = prim.attribute("POSITION").unwrap();
    assert_eq!(
        doc.read_accessor(position).unwrap().to_f32(),
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
    );
    assert_eq!(doc.accessor(position).unwrap().max, vec![1.0, 1.0, 0.0]);
    let indices = prim.indices.unwrap();
    assert_eq!(doc.read_accessor(indices).unwrap().to_u32().unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_draco_decoder_failure_fails_load() {
    init();
    let registry = Registry::new().with_draco(Arc::new(FixedTriangle {
        expected: b"something else".to_vec(),
    }));
    let options = LoadOptions::new().with_registry(registry);
    let err = load_bytes(draco_document(b"DRACO"), options).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidDocument);
}

/// Hands back whatever primitive it was built with.
struct Canned(DecodedPrimitive);

impl MeshDecompressor for Canned {
    fn decompress(&self, _: &[u8], _: &IndexMap<String, u32>) -> Result<DecodedPrimitive> {
        Ok(self.0.clone())
    }
}

struct Panicking;

impl MeshDecompressor for Panicking {
    fn decompress(&self, _: &[u8], _: &IndexMap<String, u32>) -> Result<DecodedPrimitive> {
        panic!("decoder blew up")
    }
}

fn load_with_decoder(decoder: Arc<dyn MeshDecompressor>) -> (GltfError, Vec<Report>) {
    let options = LoadOptions::new().with_registry(Registry::new().with_draco(decoder));
    let (reports, listener) = recorder();
    let err = load_bytes_async(draco_document(b"DRACO").into_bytes(), options, listener)
        .wait()
        .unwrap_err();
    let reports = reports.lock().unwrap().clone();
    (err, reports)
}

fn assert_single_error(reports: &[Report], code: ErrorCode) {
    let terminal: Vec<&Report> = reports.iter().filter(|r| r.status.is_terminal()).collect();
    assert_eq!(terminal.len(), 1, "{:?}", reports);
    assert_eq!(terminal[0].status, Status::Error);
    assert_eq!(terminal[0].error, Some(code));
    assert!(reports.iter().all(|r| !r.has_output));
}

#[test]
fn test_panicking_decoder_fails_load_once() {
    init();
    let (err, reports) = load_with_decoder(Arc::new(Panicking));
    assert_eq!(err.code(), ErrorCode::LoadFailed);
    assert_single_error(&reports, ErrorCode::LoadFailed);
}

#[test]
fn test_inconsistent_decoded_primitive_fails_load() {
    init();
    let triangle = AccessorData::from_f32(Dimension::Vec3, &[0.0; 9]);

    let mut short_normals = DecodedPrimitive::default();
    short_normals.attributes.insert("POSITION".into(), triangle.clone());
    short_normals
        .attributes
        .insert("NORMAL".into(), AccessorData::from_f32(Dimension::Vec3, &[0.0; 6]));

    let mut float_indices = DecodedPrimitive::default();
    float_indices.attributes.insert("POSITION".into(), triangle.clone());
    float_indices.indices = Some(AccessorData::from_f32(Dimension::Scalar, &[0.0, 1.0, 2.0]));

    let mut far_index = DecodedPrimitive::default();
    far_index.attributes.insert("POSITION".into(), triangle);
    far_index.indices = Some(AccessorData::from_u32(&[0, 1, 3]));

    for decoded in [short_normals, float_indices, far_index] {
        let (err, reports) = load_with_decoder(Arc::new(Canned(decoded)));
        assert_eq!(err.code(), ErrorCode::InvalidDocument);
        assert_single_error(&reports, ErrorCode::InvalidDocument);
    }
}

#[test]
fn test_huge_offsets_and_counts_fail_cleanly() {
    init();
    let view_offset = br#"{
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 12}],
        "bufferViews": [{"buffer": 0, "byteOffset": 18446744073709551615, "byteLength": 12}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "SCALAR"}]
    }"#;
    let accessor_count = br#"{
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 12}],
        "bufferViews": [{"buffer": 0, "byteLength": 12}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 4611686018427387904, "type": "SCALAR"}]
    }"#;
    let bin = f32_bytes(&[1.0, 2.5, -3.0]);
    for json in [&view_offset[..], &accessor_count[..]] {
        let (reports, listener) = recorder();
        let err = load_bytes_async(write_glb(json, Some(&bin)), LoadOptions::new(), listener)
            .wait()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDocument);
        assert_single_error(&reports.lock().unwrap(), ErrorCode::InvalidDocument);
    }
}

#[test]
fn test_index_past_u32_is_rejected() {
    init();
    let json = br#"{
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 12}],
        "bufferViews": [{"buffer": 0, "byteLength": 12}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "SCALAR"}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 4294967296}}]}]
    }"#;
    let glb = write_glb(json, Some(&f32_bytes(&[1.0, 2.5, -3.0])));
    let err = load_bytes(glb, LoadOptions::new()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidDocument);
}

#[test]
fn test_normals_are_generated_on_request() {
    init();
    let positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let json = format!(
        r#"{{
            "asset": {{"version": "2.0"}},
            "buffers": [{{"byteLength": 36, "uri": "{}"}}],
            "bufferViews": [{{"buffer": 0, "byteLength": 36}}],
            "accessors": [{{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}}],
            "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}}}]}}]
        }}"#,
        data_uri(&positions)
    );

    let plain = load_bytes(json.clone(), LoadOptions::new()).unwrap();
    assert!(plain.meshes[0].primitives[0].attribute("NORMAL").is_none());

    let options = LoadOptions::new().with_create_normals_if_absent(true);
    let doc = load_bytes(json, options).unwrap();
    let normal = doc.meshes[0].primitives[0].attribute("NORMAL").unwrap();
    let values = doc.read_accessor(normal).unwrap().to_f32();
    assert_eq!(values.len(), 9);
    for n in values.chunks(3) {
        assert!(n[0].abs() < 1e-6 && n[1].abs() < 1e-6);
        assert!((n[2] - 1.0).abs() < 1e-6);
    }
}

proptest! {
    #[test]
    fn test_truncated_glb_is_framing_error(cut in 4usize..44) {
        let glb = three_floats_glb();
        let cut = cut.min(glb.len() - 1);
        let err = read_container(&glb[..cut]).unwrap_err();
        prop_assert!(err.code().is_framing());
    }
}
