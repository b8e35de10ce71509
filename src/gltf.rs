use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;

use crate::document::GlbDocument;

/// GPU ready mesh buffers produced from a glTF primitive.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of unique vertices in the buffer.
    pub fn vertex_count(&self) -> u32 {
        (self.vertices.len() / 6) as u32
    }

    /// Position of the vertex at `index`.
    pub fn position(&self, index: u32) -> Vec3 {
        let base = index as usize * 6;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }
}

/// Renderable node produced by flattening the glTF scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GltfPrimitive {
    pub name: Option<String>,
    pub transform: Mat4,
    pub mesh: usize,
    pub material: Option<GltfMaterial>,
}

/// Material factors read from a glTF material definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GltfMaterial {
    pub base_color: Vec3,
    pub opacity: f32,
    pub alpha_blend: bool,
    pub emissive: Vec3,
}

/// Fully decoded model: one entry in `primitives` per renderable primitive,
/// indexing into `meshes`.
#[derive(Debug, Clone, Default)]
pub struct GltfModel {
    pub primitives: Vec<GltfPrimitive>,
    pub meshes: Vec<MeshData>,
}

/// Decodes the document's JSON chunk and builds mesh buffers from the
/// binary chunk.
pub fn decode_document(document: &GlbDocument) -> Result<GltfModel> {
    decode(document.json(), document.binary())
}

pub fn decode(json: &str, binary: Option<&[u8]>) -> Result<GltfModel> {
    let root: Root = serde_json::from_str(json).context("invalid glTF JSON")?;
    let reader = Reader {
        root: &root,
        binary,
    };

    let scene_index = root.scene.unwrap_or(0);
    let scene = root
        .scenes
        .get(scene_index)
        .ok_or_else(|| anyhow!("glTF document has no scene at index {scene_index}"))?;

    let mut model = GltfModel::default();
    let mut mesh_lookup: HashMap<(usize, usize), usize> = HashMap::new();
    let mut visited = vec![false; root.nodes.len()];
    for &node in &scene.nodes {
        flatten_node(
            &reader,
            node,
            Mat4::IDENTITY,
            &mut model,
            &mut mesh_lookup,
            &mut visited,
        )?;
    }

    if model.primitives.is_empty() {
        return Err(anyhow!("glTF scene contains no renderable meshes"));
    }
    Ok(model)
}

fn flatten_node(
    reader: &Reader<'_>,
    index: usize,
    parent: Mat4,
    model: &mut GltfModel,
    mesh_lookup: &mut HashMap<(usize, usize), usize>,
    visited: &mut [bool],
) -> Result<()> {
    let node = reader
        .root
        .nodes
        .get(index)
        .ok_or_else(|| anyhow!("node index {index} is out of bounds"))?;
    if std::mem::replace(&mut visited[index], true) {
        return Err(anyhow!("node {index} appears twice in the scene graph"));
    }

    let world = parent * node_transform(node);

    if let Some(mesh_index) = node.mesh {
        let mesh = reader
            .root
            .meshes
            .get(mesh_index)
            .ok_or_else(|| anyhow!("mesh index {mesh_index} is out of bounds"))?;
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            // Mode 4 is the triangle list; anything else has no counterpart
            // in the render pipeline.
            if primitive.mode.unwrap_or(4) != 4 {
                log::warn!(
                    "skipping non-triangle primitive {primitive_index} of mesh {mesh_index}"
                );
                continue;
            }

            let slot = match mesh_lookup.entry((mesh_index, primitive_index)) {
                std::collections::hash_map::Entry::Occupied(entry) => *entry.get(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let data = build_mesh(reader, primitive).with_context(|| {
                        format!("failed to decode primitive {primitive_index} of mesh {mesh_index}")
                    })?;
                    let slot = model.meshes.len();
                    model.meshes.push(data);
                    entry.insert(slot);
                    slot
                }
            };

            let material = primitive
                .material
                .map(|material_index| read_material(reader.root, material_index))
                .transpose()?;
            model.primitives.push(GltfPrimitive {
                name: node.name.clone().or_else(|| mesh.name.clone()),
                transform: world,
                mesh: slot,
                material,
            });
        }
    }

    for &child in &node.children {
        flatten_node(reader, child, world, model, mesh_lookup, visited)?;
    }
    Ok(())
}

fn node_transform(node: &Node) -> Mat4 {
    if let Some(matrix) = node.matrix {
        return Mat4::from_cols_array(&matrix);
    }
    let translation = node.translation.map(Vec3::from).unwrap_or(Vec3::ZERO);
    let rotation = node
        .rotation
        .map(Quat::from_array)
        .unwrap_or(Quat::IDENTITY);
    let scale = node.scale.map(Vec3::from).unwrap_or(Vec3::ONE);
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

fn read_material(root: &Root, index: usize) -> Result<GltfMaterial> {
    let material = root
        .materials
        .get(index)
        .ok_or_else(|| anyhow!("material index {index} is out of bounds"))?;
    let base_color_factor = material
        .pbr_metallic_roughness
        .as_ref()
        .and_then(|pbr| pbr.base_color_factor)
        .unwrap_or([1.0, 1.0, 1.0, 1.0]);
    Ok(GltfMaterial {
        base_color: Vec3::new(
            base_color_factor[0],
            base_color_factor[1],
            base_color_factor[2],
        ),
        opacity: base_color_factor[3],
        alpha_blend: material.alpha_mode.as_deref() == Some("BLEND"),
        emissive: material
            .emissive_factor
            .map(Vec3::from)
            .unwrap_or(Vec3::ZERO),
    })
}

fn build_mesh(reader: &Reader<'_>, primitive: &Primitive) -> Result<MeshData> {
    let position_accessor = primitive
        .attributes
        .get("POSITION")
        .copied()
        .ok_or_else(|| anyhow!("primitive has no POSITION attribute"))?;
    let positions = reader.read_vec3(position_accessor).context("POSITION")?;
    if positions.is_empty() {
        return Err(anyhow!("primitive POSITION accessor is empty"));
    }

    let normals = match primitive.attributes.get("NORMAL").copied() {
        Some(accessor) => Some(reader.read_vec3(accessor).context("NORMAL")?),
        None => None,
    };
    if let Some(normals) = normals.as_ref() {
        if normals.len() != positions.len() {
            return Err(anyhow!(
                "NORMAL count {} does not match POSITION count {}",
                normals.len(),
                positions.len()
            ));
        }
    }

    let indices = match primitive.indices {
        Some(accessor) => reader.read_indices(accessor).context("indices")?,
        None => (0..positions.len() as u32).collect(),
    };
    if indices.len() % 3 != 0 {
        return Err(anyhow!(
            "index count {} is not a multiple of three",
            indices.len()
        ));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(anyhow!(
            "index {bad} is out of bounds for {} vertices",
            positions.len()
        ));
    }

    let mut vertices = Vec::with_capacity(positions.len() * 6);
    for (i, position) in positions.iter().enumerate() {
        vertices.extend_from_slice(&[position.x, position.y, position.z]);
        let normal = normals
            .as_ref()
            .map(|normals| normals[i])
            .unwrap_or(Vec3::ZERO);
        vertices.extend_from_slice(&[normal.x, normal.y, normal.z]);
    }

    let mut mesh = MeshData { vertices, indices };
    if normals.is_none() {
        compute_normals(&mut mesh);
    }
    Ok(mesh)
}

fn compute_normals(mesh: &mut MeshData) {
    let vertex_count = mesh.vertices.len() / 6;
    let mut accum = vec![Vec3::ZERO; vertex_count];

    for triangle in mesh.indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;
        let p0 = Vec3::from_slice(&mesh.vertices[i0 * 6..i0 * 6 + 3]);
        let p1 = Vec3::from_slice(&mesh.vertices[i1 * 6..i1 * 6 + 3]);
        let p2 = Vec3::from_slice(&mesh.vertices[i2 * 6..i2 * 6 + 3]);
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        let normal = normal.normalize_or_zero();
        mesh.vertices[i * 6 + 3] = normal.x;
        mesh.vertices[i * 6 + 4] = normal.y;
        mesh.vertices[i * 6 + 5] = normal.z;
    }
}

const COMPONENT_U8: u32 = 5121;
const COMPONENT_U16: u32 = 5123;
const COMPONENT_U32: u32 = 5125;
const COMPONENT_F32: u32 = 5126;

struct Reader<'a> {
    root: &'a Root,
    binary: Option<&'a [u8]>,
}

impl Reader<'_> {
    fn read_vec3(&self, accessor_index: usize) -> Result<Vec<Vec3>> {
        let accessor = self.accessor(accessor_index)?;
        if accessor.kind != "VEC3" || accessor.component_type != COMPONENT_F32 {
            return Err(anyhow!(
                "accessor {accessor_index} is {} of component {}, expected float VEC3",
                accessor.kind,
                accessor.component_type
            ));
        }
        let (bytes, stride) = self.view_bytes(accessor, 12)?;
        let mut values = Vec::with_capacity(accessor.count);
        for i in 0..accessor.count {
            let base = i * stride;
            let x = read_f32(bytes, base)?;
            let y = read_f32(bytes, base + 4)?;
            let z = read_f32(bytes, base + 8)?;
            values.push(Vec3::new(x, y, z));
        }
        Ok(values)
    }

    fn read_indices(&self, accessor_index: usize) -> Result<Vec<u32>> {
        let accessor = self.accessor(accessor_index)?;
        if accessor.kind != "SCALAR" {
            return Err(anyhow!(
                "index accessor {accessor_index} is {}, expected SCALAR",
                accessor.kind
            ));
        }
        let element = match accessor.component_type {
            COMPONENT_U8 => 1,
            COMPONENT_U16 => 2,
            COMPONENT_U32 => 4,
            other => {
                return Err(anyhow!(
                    "index accessor {accessor_index} has unsupported component type {other}"
                ))
            }
        };
        let (bytes, stride) = self.view_bytes(accessor, element)?;
        let mut values = Vec::with_capacity(accessor.count);
        for i in 0..accessor.count {
            let base = i * stride;
            let value = match element {
                1 => bytes[base] as u32,
                2 => u16::from_le_bytes(
                    bytes[base..base + 2]
                        .try_into()
                        .expect("slice length verified"),
                ) as u32,
                _ => u32::from_le_bytes(
                    bytes[base..base + 4]
                        .try_into()
                        .expect("slice length verified"),
                ),
            };
            values.push(value);
        }
        Ok(values)
    }

    fn accessor(&self, index: usize) -> Result<&Accessor> {
        self.root
            .accessors
            .get(index)
            .ok_or_else(|| anyhow!("accessor index {index} is out of bounds"))
    }

    /// Returns the accessor's byte window and element stride, bounds-checked
    /// against the binary chunk.
    fn view_bytes<'b>(
        &'b self,
        accessor: &Accessor,
        element_size: usize,
    ) -> Result<(&'b [u8], usize)> {
        let view_index = accessor
            .buffer_view
            .ok_or_else(|| anyhow!("accessor has no buffer view"))?;
        let view = self
            .root
            .buffer_views
            .get(view_index)
            .ok_or_else(|| anyhow!("buffer view index {view_index} is out of bounds"))?;
        let buffer = self
            .root
            .buffers
            .get(view.buffer)
            .ok_or_else(|| anyhow!("buffer index {} is out of bounds", view.buffer))?;
        if buffer.uri.is_some() {
            return Err(anyhow!(
                "buffer {} references an external URI; only the embedded binary chunk is supported",
                view.buffer
            ));
        }
        let binary = self
            .binary
            .ok_or_else(|| anyhow!("document has no binary chunk"))?;

        let stride = view.byte_stride.unwrap_or(element_size);
        if stride < element_size {
            return Err(anyhow!(
                "buffer view stride {stride} is smaller than the element size {element_size}"
            ));
        }
        let start = view.byte_offset + accessor.byte_offset;
        let needed = if accessor.count == 0 {
            0
        } else {
            (accessor.count - 1) * stride + element_size
        };
        let view_end = view.byte_offset + view.byte_length;
        if start + needed > view_end || view_end > binary.len() {
            return Err(anyhow!(
                "accessor window [{start}, {}) extends past the binary chunk ({} bytes)",
                start + needed,
                binary.len()
            ));
        }
        Ok((&binary[start..start + needed], stride))
    }
}

fn read_f32(bytes: &[u8], offset: usize) -> Result<f32> {
    let slice = bytes
        .get(offset..offset + 4)
        .ok_or_else(|| anyhow!("unexpected end of accessor data"))?;
    Ok(f32::from_le_bytes(
        slice.try_into().expect("slice length verified"),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct Root {
    #[serde(default)]
    scene: Option<usize>,
    #[serde(default)]
    scenes: Vec<SceneDef>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    meshes: Vec<Mesh>,
    #[serde(default)]
    materials: Vec<MaterialDef>,
    #[serde(default)]
    accessors: Vec<Accessor>,
    #[serde(default, rename = "bufferViews")]
    buffer_views: Vec<BufferView>,
    #[serde(default)]
    buffers: Vec<Buffer>,
}

#[derive(Debug, Default, Deserialize)]
struct SceneDef {
    #[serde(default)]
    nodes: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct Node {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    children: Vec<usize>,
    #[serde(default)]
    mesh: Option<usize>,
    #[serde(default)]
    matrix: Option<[f32; 16]>,
    #[serde(default)]
    translation: Option<[f32; 3]>,
    #[serde(default)]
    rotation: Option<[f32; 4]>,
    #[serde(default)]
    scale: Option<[f32; 3]>,
}

#[derive(Debug, Default, Deserialize)]
struct Mesh {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    primitives: Vec<Primitive>,
}

#[derive(Debug, Default, Deserialize)]
struct Primitive {
    #[serde(default)]
    attributes: HashMap<String, usize>,
    #[serde(default)]
    indices: Option<usize>,
    #[serde(default)]
    material: Option<usize>,
    #[serde(default)]
    mode: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct MaterialDef {
    #[serde(default, rename = "pbrMetallicRoughness")]
    pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(default, rename = "alphaMode")]
    alpha_mode: Option<String>,
    #[serde(default, rename = "emissiveFactor")]
    emissive_factor: Option<[f32; 3]>,
}

#[derive(Debug, Default, Deserialize)]
struct PbrMetallicRoughness {
    #[serde(default, rename = "baseColorFactor")]
    base_color_factor: Option<[f32; 4]>,
}

#[derive(Debug, Default, Deserialize)]
struct Accessor {
    #[serde(default, rename = "bufferView")]
    buffer_view: Option<usize>,
    #[serde(default, rename = "byteOffset")]
    byte_offset: usize,
    #[serde(rename = "componentType")]
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
struct BufferView {
    buffer: usize,
    #[serde(default, rename = "byteOffset")]
    byte_offset: usize,
    #[serde(rename = "byteLength")]
    byte_length: usize,
    #[serde(default, rename = "byteStride")]
    byte_stride: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct Buffer {
    #[serde(default)]
    uri: Option<String>,
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    /// JSON for a single triangle with positions, u16 indices, and one
    /// material; the matching binary chunk is [`triangle_bin`].
    pub fn triangle_json(name: &str) -> String {
        format!(
            r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [{{"name": "{name}", "mesh": 0, "translation": [1, 0, 0]}}],
  "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}, "indices": 1, "material": 0}}]}}],
  "materials": [{{
    "pbrMetallicRoughness": {{"baseColorFactor": [0.8, 0.2, 0.1, 0.5]}},
    "alphaMode": "BLEND",
    "emissiveFactor": [0.0, 0.1, 0.0]
  }}],
  "accessors": [
    {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}},
    {{"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}}
  ],
  "bufferViews": [
    {{"buffer": 0, "byteOffset": 0, "byteLength": 36}},
    {{"buffer": 0, "byteOffset": 36, "byteLength": 6}}
  ],
  "buffers": [{{"byteLength": 44}}]
}}"#
        )
    }

    pub fn triangle_bin() -> Vec<u8> {
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
        bin
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::{triangle_bin, triangle_json};
    use super::*;

    #[test]
    fn decodes_triangle_with_material() {
        let bin = triangle_bin();
        let model = decode(&triangle_json("Tri"), Some(&bin)).unwrap();

        assert_eq!(model.primitives.len(), 1);
        assert_eq!(model.meshes.len(), 1);

        let primitive = &model.primitives[0];
        assert_eq!(primitive.name.as_deref(), Some("Tri"));
        assert_eq!(
            primitive.transform.transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 0.0, 0.0)
        );

        let material = primitive.material.expect("material factors");
        assert_eq!(material.base_color, Vec3::new(0.8, 0.2, 0.1));
        assert_eq!(material.opacity, 0.5);
        assert!(material.alpha_blend);
        assert_eq!(material.emissive, Vec3::new(0.0, 0.1, 0.0));

        let mesh = &model.meshes[0];
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn computes_normals_when_missing() {
        let bin = triangle_bin();
        let model = decode(&triangle_json("Tri"), Some(&bin)).unwrap();
        for chunk in model.meshes[0].vertices.chunks_exact(6) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn child_transforms_compose() {
        let json = r#"{
  "scenes": [{"nodes": [0]}],
  "nodes": [
    {"translation": [0, 2, 0], "children": [1]},
    {"mesh": 0, "translation": [1, 0, 0]}
  ],
  "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
  "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}],
  "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}],
  "buffers": [{"byteLength": 36}]
}"#;
        let bin = triangle_bin();
        let model = decode(json, Some(&bin)).unwrap();
        assert_eq!(
            model.primitives[0].transform.transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 2.0, 0.0)
        );
    }

    #[test]
    fn missing_positions_is_an_error() {
        let json = r#"{
  "scenes": [{"nodes": [0]}],
  "nodes": [{"mesh": 0}],
  "meshes": [{"primitives": [{"attributes": {}}]}]
}"#;
        let err = decode(json, None).unwrap_err();
        assert!(format!("{err:?}").contains("POSITION"));
    }

    #[test]
    fn external_buffer_uri_is_an_error() {
        let json = r#"{
  "scenes": [{"nodes": [0]}],
  "nodes": [{"mesh": 0}],
  "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
  "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}],
  "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}],
  "buffers": [{"byteLength": 36, "uri": "mesh.bin"}]
}"#;
        let err = decode(json, Some(&[0u8; 36])).unwrap_err();
        assert!(format!("{err:?}").contains("external URI"));
    }

    #[test]
    fn out_of_bounds_index_is_an_error() {
        let json = r#"{
  "scenes": [{"nodes": [0]}],
  "nodes": [{"mesh": 0}],
  "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
  "accessors": [
    {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
    {"bufferView": 1, "componentType": 5125, "count": 3, "type": "SCALAR"}
  ],
  "bufferViews": [
    {"buffer": 0, "byteOffset": 0, "byteLength": 36},
    {"buffer": 0, "byteOffset": 36, "byteLength": 12}
  ],
  "buffers": [{"byteLength": 48}]
}"#;
        let mut bin = vec![0u8; 36];
        for value in [0u32, 1, 9] {
            bin.extend_from_slice(&value.to_le_bytes());
        }
        let err = decode(json, Some(&bin)).unwrap_err();
        assert!(format!("{err:?}").contains("out of bounds"));
    }

    #[test]
    fn empty_scene_is_an_error() {
        let json = r#"{"scenes": [{"nodes": []}]}"#;
        assert!(decode(json, None).is_err());
    }
}
