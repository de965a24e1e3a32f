//! Save-side tests: GLB and JSON re-serialization, preserved extensions and
//! the asynchronous save tasks.

use std::fs;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

use gltfkit_core::{AccessorId, Buffer, Document, ErrorCode, GltfError};
use gltfkit_io::uri::{decode_data_uri, encode_data_uri};
use gltfkit_io::{
    load_bytes, load_path, read_container, serialize, serialize_async, write_glb,
    write_path_async, ExportOptions, LoadOptions, Status,
};
use serde_json::{json, Value};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn source_json() -> Value {
    json!({
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 12}],
        "bufferViews": [{"buffer": 0, "byteLength": 12}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "SCALAR"}]
    })
}

fn source_glb() -> (Vec<u8>, Vec<u8>) {
    let bin = f32_bytes(&[1.0, 2.5, -3.0]);
    let json = serde_json::to_vec(&source_json()).unwrap();
    (write_glb(&json, Some(&bin)), bin)
}

#[test]
fn test_glb_reserialize_keeps_chunk_and_json() {
    init();
    let (glb, bin) = source_glb();
    let doc = load_bytes(glb, LoadOptions::new()).unwrap();
    let out = serialize(&doc, &ExportOptions::binary()).unwrap();

    let declared = u32::from_le_bytes([out[8], out[9], out[10], out[11]]) as usize;
    assert_eq!(declared, out.len());
    assert_eq!(&out[0..4], b"glTF");

    let container = read_container(&out).unwrap();
    assert!(container.is_binary);
    assert_eq!(container.first_bin(), Some(bin.as_slice()));

    let written: Value = serde_json::from_slice(container.json).unwrap();
    assert_eq!(written, source_json());
}

#[test]
fn test_plain_export_embeds_data_uri() {
    init();
    let (glb, bin) = source_glb();
    let doc = load_bytes(glb, LoadOptions::new()).unwrap();
    let out = serialize(&doc, &ExportOptions::new()).unwrap();

    let written: Value = serde_json::from_slice(&out).unwrap();
    let uri = written["buffers"][0]["uri"].as_str().unwrap();
    assert!(uri.starts_with("data:application/octet-stream;base64,"));
    assert_eq!(decode_data_uri(uri).unwrap().bytes, bin);

    let reloaded = load_bytes(out, LoadOptions::new()).unwrap();
    assert_eq!(
        reloaded.read_accessor(AccessorId(0)).unwrap().to_f32(),
        vec![1.0, 2.5, -3.0]
    );
}

#[test]
fn test_generator_option_and_existing_generator() {
    init();
    let mut doc = Document::new();
    let out = serialize(&doc, &ExportOptions::new()).unwrap();
    let written: Value = serde_json::from_slice(&out).unwrap();
    assert!(written["asset"].get("generator").is_none());

    let out = serialize(&doc, &ExportOptions::new().with_generator("tool 1")).unwrap();
    let written: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(written["asset"]["generator"], "tool 1");

    doc.asset.generator = Some("authoring app".into());
    let out = serialize(&doc, &ExportOptions::new().with_generator("tool 1")).unwrap();
    let written: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(written["asset"]["generator"], "authoring app");
}

#[test]
fn test_unknown_extensions_and_extras_survive() {
    init();
    let source = json!({
        "asset": {"version": "2.0"},
        "extensionsUsed": ["VENDOR_wobble"],
        "materials": [{
            "name": "shiny",
            "extensions": {"VENDOR_wobble": {"amplitude": 0.25, "axes": ["x", "y"]}},
            "extras": {"author": "someone"}
        }],
        "nodes": [{"name": "root", "extras": [1, 2, 3]}],
        "scenes": [{"nodes": [0]}],
        "scene": 0
    });
    let doc = load_bytes(serde_json::to_vec(&source).unwrap(), LoadOptions::new()).unwrap();
    let out = serialize(&doc, &ExportOptions::new()).unwrap();
    let written: Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(
        written["materials"][0]["extensions"]["VENDOR_wobble"],
        source["materials"][0]["extensions"]["VENDOR_wobble"]
    );
    assert_eq!(written["materials"][0]["extras"], source["materials"][0]["extras"]);
    assert_eq!(written["nodes"][0]["extras"], source["nodes"][0]["extras"]);
    assert_eq!(written["scene"], 0);
    let used = written["extensionsUsed"].as_array().unwrap();
    assert!(used.contains(&Value::from("VENDOR_wobble")));
}

#[test]
fn test_recognized_extensions_round_trip() {
    init();
    let source = json!({
        "asset": {"version": "2.0"},
        "extensionsUsed": ["KHR_materials_unlit", "KHR_lights_punctual", "KHR_texture_transform"],
        "extensions": {"KHR_lights_punctual": {"lights": [
            {"type": "point", "color": [1.0, 0.5, 0.25], "intensity": 3.0}
        ]}},
        "images": [{"uri": "albedo.png"}],
        "textures": [{"source": 0}],
        "materials": [{
            "pbrMetallicRoughness": {"baseColorTexture": {
                "index": 0,
                "extensions": {"KHR_texture_transform": {"offset": [0.5, 0.0], "scale": [2.0, 2.0]}}
            }},
            "extensions": {"KHR_materials_unlit": {}}
        }],
        "nodes": [{"extensions": {"KHR_lights_punctual": {"light": 0}}}]
    });
    let doc = load_bytes(serde_json::to_vec(&source).unwrap(), LoadOptions::new()).unwrap();
    assert_eq!(doc.lights.len(), 1);
    assert!(doc.materials[0].unlit);

    let out = serialize(&doc, &ExportOptions::new()).unwrap();
    let written: Value = serde_json::from_slice(&out).unwrap();
    let material = &written["materials"][0];
    assert!(material["extensions"]["KHR_materials_unlit"].is_object());
    let transform = &material["pbrMetallicRoughness"]["baseColorTexture"]["extensions"]
        ["KHR_texture_transform"];
    assert_eq!(transform["offset"], json!([0.5, 0.0]));
    assert_eq!(transform["scale"], json!([2.0, 2.0]));
    assert_eq!(written["nodes"][0]["extensions"]["KHR_lights_punctual"]["light"], 0);
    assert_eq!(
        written["extensions"]["KHR_lights_punctual"]["lights"][0]["type"],
        "point"
    );

    let used: Vec<&str> = written["extensionsUsed"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    for name in ["KHR_materials_unlit", "KHR_lights_punctual", "KHR_texture_transform"] {
        assert!(used.contains(&name), "{} missing from {:?}", name, used);
    }
}

#[test]
fn test_undecoded_draco_is_written_back() {
    init();
    let payload = b"DRACO".to_vec();
    let source = json!({
        "asset": {"version": "2.0"},
        "extensionsUsed": ["KHR_draco_mesh_compression"],
        "buffers": [{"byteLength": 5, "uri": encode_data_uri(&payload, "application/octet-stream")}],
        "bufferViews": [{"buffer": 0, "byteLength": 5}],
        "accessors": [{"componentType": 5126, "count": 3, "type": "VEC3"}],
        "meshes": [{"primitives": [{
            "attributes": {"POSITION": 0},
            "extensions": {"KHR_draco_mesh_compression": {
                "bufferView": 0, "attributes": {"POSITION": 0}
            }}
        }]}]
    });
    let doc = load_bytes(serde_json::to_vec(&source).unwrap(), LoadOptions::new()).unwrap();
    assert!(doc.meshes[0].primitives[0].draco.is_some());

    let out = serialize(&doc, &ExportOptions::new()).unwrap();
    let written: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        written["meshes"][0]["primitives"][0]["extensions"]["KHR_draco_mesh_compression"],
        source["meshes"][0]["primitives"][0]["extensions"]["KHR_draco_mesh_compression"]
    );
    assert_eq!(written["extensionsUsed"], json!(["KHR_draco_mesh_compression"]));
}

#[test]
fn test_binary_export_rejects_second_embedded_buffer() {
    init();
    let mut doc = Document::new();
    doc.buffers.push(Buffer::from_bytes(vec![1, 2, 3, 4]));
    doc.buffers.push(Buffer::from_bytes(vec![5, 6, 7, 8]));

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let task = serialize_async(doc, ExportOptions::binary(), move |p| {
        sink.lock().unwrap().push((p.status, p.error.map(GltfError::code)));
        ControlFlow::Continue(())
    });
    let err = task.wait().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidOptions);

    let statuses = statuses.lock().unwrap();
    assert_eq!(
        statuses.last(),
        Some(&(Status::Error, Some(ErrorCode::InvalidOptions)))
    );
    assert!(statuses.iter().all(|(s, _)| *s != Status::Complete));
}

#[test]
fn test_serialize_async_reports_save_stages() {
    init();
    let (glb, _) = source_glb();
    let doc = load_bytes(glb, LoadOptions::new()).unwrap();

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let bytes = serialize_async(doc, ExportOptions::binary(), move |p| {
        sink.lock()
            .unwrap()
            .push((p.status, p.output.map(|b: &Vec<u8>| b.len())));
        ControlFlow::Continue(())
    })
    .wait()
    .unwrap();

    let statuses = statuses.lock().unwrap();
    let order: Vec<Status> = statuses.iter().map(|(s, _)| *s).collect();
    assert_eq!(order.first(), Some(&Status::Validating));
    assert_eq!(order.last(), Some(&Status::Complete));
    assert!(order.contains(&Status::Processing));
    assert_eq!(statuses.last().and_then(|(_, len)| *len), Some(bytes.len()));
}

#[test]
fn test_write_path_async_then_reload() {
    init();
    let (glb, _) = source_glb();
    let doc = load_bytes(glb, LoadOptions::new()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copy.glb");

    write_path_async(doc, &path, ExportOptions::binary(), |_| ControlFlow::Continue(()))
        .wait()
        .unwrap();
    assert!(fs::metadata(&path).unwrap().len() > 0);

    let reloaded = load_path(&path, LoadOptions::new()).unwrap();
    assert_eq!(
        reloaded.read_accessor(AccessorId(0)).unwrap().to_f32(),
        vec![1.0, 2.5, -3.0]
    );
}

#[test]
fn test_save_cancelled_by_listener() {
    init();
    let task = serialize_async(Document::new(), ExportOptions::new(), |p| {
        if p.status == Status::Processing {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(task.wait().unwrap_err().code(), ErrorCode::Cancelled);
}
