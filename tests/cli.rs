use assert_cmd::prelude::*;
use once_cell::sync::Lazy;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};

static MODEL_BYTES: Lazy<Vec<u8>> = Lazy::new(build_glb);

/// Builds a GLB container holding one named triangle mesh with a material.
fn build_glb() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u16; 3] = [0, 1, 2];
    let mut bin = Vec::new();
    for value in positions {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    for value in indices {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let json = r#"{
  "asset": {"version": "2.0"},
  "scene": 0,
  "scenes": [{"nodes": [0]}],
  "nodes": [{"name": "Pyramid", "mesh": 0}],
  "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1, "material": 0}]}],
  "materials": [{"pbrMetallicRoughness": {"baseColorFactor": [0.8, 0.2, 0.1, 1.0]}}],
  "accessors": [
    {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
    {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
  ],
  "bufferViews": [
    {"buffer": 0, "byteOffset": 0, "byteLength": 36},
    {"buffer": 0, "byteOffset": 36, "byteLength": 6}
  ],
  "buffers": [{"byteLength": 44}]
}"#;
    let mut json_bytes = json.as_bytes().to_vec();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }

    let mut buffer = Vec::new();
    buffer.extend_from_slice(b"glTF");
    buffer.extend_from_slice(&2u32.to_le_bytes());
    buffer.extend_from_slice(&0u32.to_le_bytes());

    buffer.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    buffer.extend_from_slice(b"JSON");
    buffer.extend_from_slice(&json_bytes);

    buffer.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    buffer.extend_from_slice(b"BIN\0");
    buffer.extend_from_slice(&bin);

    let total = buffer.len() as u32;
    buffer[8..12].copy_from_slice(&total.to_le_bytes());
    buffer
}

fn write_model(bytes: &[u8]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp model");
    tmp.write_all(bytes).expect("write model");
    tmp
}

#[test]
fn cli_prints_the_model_summary() {
    let model = write_model(&MODEL_BYTES);
    let mut cmd = Command::cargo_bin("meshview").expect("binary exists");
    cmd.arg(model.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("with 1 objects"))
        .stdout(contains(" - Pyramid (mesh): 3 vertices, 1 polygons, 2 triangles"));
}

#[test]
fn cli_export_is_byte_identical() {
    let model = write_model(&MODEL_BYTES);
    let out_dir = TempDir::new().expect("temp dir");
    let destination = out_dir.path().join("model.glb");

    let mut cmd = Command::cargo_bin("meshview").expect("binary exists");
    cmd.arg(model.path())
        .arg("--summary-only")
        .arg("--export")
        .arg(&destination);
    cmd.assert().success().stdout(contains("Exported"));

    let exported = std::fs::read(&destination).expect("read export");
    assert_eq!(exported, *MODEL_BYTES);
}

#[test]
fn cli_rejects_a_malformed_model() {
    let model = write_model(b"this is not a glb");
    let mut cmd = Command::cargo_bin("meshview").expect("binary exists");
    cmd.arg(model.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("invalid GLB magic"));
}

#[test]
fn cli_rejects_unknown_arguments() {
    let mut cmd = Command::cargo_bin("meshview").expect("binary exists");
    cmd.arg("--frobnicate");
    cmd.assert().failure().stderr(contains("Unknown argument"));
}
