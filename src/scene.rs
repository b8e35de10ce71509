use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::document::GlbDocument;
use crate::gltf::{self, GltfMaterial, MeshData};

/// Runtime representation of a loaded model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub meshes: Vec<MeshData>,
}

impl Scene {
    /// Builds the renderable scene from a validated `.glb` document.
    pub fn from_document(document: &GlbDocument) -> Result<Self> {
        let model = gltf::decode_document(document)
            .with_context(|| format!("failed to decode {}", document.label()))?;

        let objects = model
            .primitives
            .into_iter()
            .enumerate()
            .map(|(index, primitive)| SceneObject {
                id: index as u32,
                name: primitive.name,
                object_type: "mesh".to_string(),
                transform: primitive.transform,
                mesh: primitive.mesh,
                material: primitive.material.map(Material::from),
            })
            .collect();

        Ok(Self {
            objects,
            meshes: model.meshes,
        })
    }

    /// World-space bounding box over every object's vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut bounds: Option<(Vec3, Vec3)> = None;
        for object in &self.objects {
            let Some(mesh) = self.meshes.get(object.mesh) else {
                continue;
            };
            for index in 0..mesh.vertex_count() {
                let world = object.transform.transform_point3(mesh.position(index));
                bounds = Some(match bounds {
                    Some((min, max)) => (min.min(world), max.max(world)),
                    None => (world, world),
                });
            }
        }
        bounds
    }

    /// Statistics for the mesh referenced by `object`, when it exists.
    pub fn stats_for(&self, object: &SceneObject) -> Option<MeshStats> {
        self.meshes
            .get(object.mesh)
            .map(|mesh| MeshStats::from_vertex_count(mesh.vertex_count()))
    }
}

/// Renderable node of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: u32,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub object_type: String,
    pub transform: Mat4,
    pub mesh: usize,
    pub material: Option<Material>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            id: 0,
            name: None,
            object_type: "mesh".to_string(),
            transform: Mat4::IDENTITY,
            mesh: 0,
            material: Some(Material::default()),
        }
    }
}

impl SceneObject {
    /// Display name: the authored name when present, a stable fallback
    /// otherwise.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Object {}", self.id),
        }
    }
}

/// Surface appearance of one scene object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub base_color: Vec3,
    pub opacity: f32,
    pub transparent: bool,
    pub wireframe: bool,
    pub emissive: Vec3,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec3::ONE,
            opacity: 1.0,
            transparent: false,
            wireframe: false,
            emissive: Vec3::ZERO,
        }
    }
}

impl From<GltfMaterial> for Material {
    fn from(factors: GltfMaterial) -> Self {
        Self {
            base_color: factors.base_color,
            opacity: factors.opacity,
            transparent: factors.alpha_blend,
            wireframe: false,
            emissive: factors.emissive,
        }
    }
}

/// Read-only statistics derived from a mesh's vertex count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshStats {
    pub vertices: u32,
    pub polygons: u32,
    pub triangles: u32,
}

impl MeshStats {
    pub fn from_vertex_count(vertices: u32) -> Self {
        let polygons = vertices / 3;
        Self {
            vertices,
            polygons,
            triangles: polygons * 2,
        }
    }
}
