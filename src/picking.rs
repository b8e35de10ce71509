use glam::{Mat4, Vec2, Vec3};

use crate::data_model::DataModel;
use crate::gltf::MeshData;
use crate::scene::SceneObject;

/// Emissive tint applied to the hovered object.
pub const HIGHLIGHT_EMISSIVE: Vec3 = Vec3::new(0.25, 0.25, 0.05);

/// World-space ray used for pointer picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Builds the ray through `ndc` (x and y in [-1, 1], y up) for the given
    /// view-projection matrix.
    pub fn from_ndc(ndc: Vec2, view_proj: Mat4) -> Option<Self> {
        let inverse = view_proj.inverse();
        let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
        let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        let direction = far - near;
        if direction.length_squared() <= f32::EPSILON || !direction.is_finite() {
            return None;
        }
        Some(Self {
            origin: near,
            direction: direction.normalize(),
        })
    }
}

/// Result of a pick: the nearest intersected object and its distance from
/// the ray origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub object: u32,
    pub distance: f32,
}

/// Intersects the ray with every object's triangles and returns the nearest
/// hit. No intersection is a normal outcome, not an error.
pub fn pick_nearest(ray: &Ray, objects: &[SceneObject], meshes: &[MeshData]) -> Option<PickHit> {
    let mut nearest: Option<PickHit> = None;
    for object in objects {
        let Some(mesh) = meshes.get(object.mesh) else {
            continue;
        };
        for triangle in mesh.indices.chunks_exact(3) {
            let a = object.transform.transform_point3(mesh.position(triangle[0]));
            let b = object.transform.transform_point3(mesh.position(triangle[1]));
            let c = object.transform.transform_point3(mesh.position(triangle[2]));
            let Some(distance) = intersect_triangle(ray, a, b, c) else {
                continue;
            };
            if nearest.map_or(true, |hit| distance < hit.distance) {
                nearest = Some(PickHit {
                    object: object.id,
                    distance,
                });
            }
        }
    }
    nearest
}

/// Möller–Trumbore ray/triangle intersection. Backfaces count as hits so
/// that picking matches the renderer, which does not cull.
fn intersect_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(edge2);
    let determinant = edge1.dot(p);
    if determinant.abs() < EPSILON {
        return None;
    }
    let inverse_det = 1.0 / determinant;
    let s = ray.origin - a;
    let u = s.dot(p) * inverse_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inverse_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inverse_det;
    (t > 1e-4).then_some(t)
}

/// Hover highlight as an explicit two-state machine.
///
/// `Highlighting` remembers the emissive value the object carried before the
/// highlight was applied; the saved value is restored before the hover
/// reference changes or clears. `saved_emissive` is `None` for objects
/// without a material: they are still reported as hovered, but no tint is
/// applied or restored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Highlighting {
        object: u32,
        saved_emissive: Option<Vec3>,
    },
}

impl HoverState {
    /// Currently hovered object, if any.
    pub fn hovered(&self) -> Option<u32> {
        match self {
            Self::Idle => None,
            Self::Highlighting { object, .. } => Some(*object),
        }
    }

    /// Advances the machine with this frame's pick candidate, applying and
    /// restoring emissive tints through the data model.
    pub fn observe(&mut self, candidate: Option<PickHit>, model: &DataModel) {
        match (*self, candidate.map(|hit| hit.object)) {
            (Self::Idle, None) => {}
            (Self::Idle, Some(id)) => self.begin(id, model),
            (Self::Highlighting { object, .. }, Some(id)) if object == id => {
                // Re-applying the tint is idempotent.
                model.set_emissive(id, HIGHLIGHT_EMISSIVE);
            }
            (Self::Highlighting { .. }, Some(id)) => {
                self.restore(model);
                self.begin(id, model);
            }
            (Self::Highlighting { .. }, None) => {
                self.restore(model);
                *self = Self::Idle;
            }
        }
    }

    /// Drops the hover reference without touching the model. Used when the
    /// objects it pointed into have been replaced wholesale.
    pub fn forget(&mut self) {
        *self = Self::Idle;
    }

    fn begin(&mut self, id: u32, model: &DataModel) {
        let saved = model.material(id).map(|material| material.emissive);
        if saved.is_some() {
            model.set_emissive(id, HIGHLIGHT_EMISSIVE);
        }
        *self = Self::Highlighting {
            object: id,
            saved_emissive: saved,
        };
    }

    fn restore(&self, model: &DataModel) {
        if let Self::Highlighting {
            object,
            saved_emissive: Some(tint),
        } = self
        {
            model.set_emissive(*object, *tint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, SceneObject};

    fn unit_triangle() -> MeshData {
        MeshData {
            vertices: vec![
                -1.0, -1.0, 0.0, 0.0, 0.0, 1.0, //
                1.0, -1.0, 0.0, 0.0, 0.0, 1.0, //
                0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
            ],
            indices: vec![0, 1, 2],
        }
    }

    fn object_at(id: u32, z: f32) -> SceneObject {
        SceneObject {
            id,
            transform: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            material: Some(Material {
                emissive: Vec3::splat(id as f32 * 0.1),
                ..Material::default()
            }),
            ..SceneObject::default()
        }
    }

    fn forward_ray() -> Ray {
        Ray {
            origin: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        }
    }

    #[test]
    fn picks_the_nearest_object() {
        let meshes = vec![unit_triangle()];
        let objects = vec![object_at(0, -4.0), object_at(1, 0.0)];
        let hit = pick_nearest(&forward_ray(), &objects, &meshes).unwrap();
        assert_eq!(hit.object, 1);
        assert!((hit.distance - 5.0).abs() < 1e-4);
    }

    #[test]
    fn missing_the_scene_is_not_an_error() {
        let meshes = vec![unit_triangle()];
        let objects = vec![object_at(0, 0.0)];
        let ray = Ray {
            origin: Vec3::new(10.0, 10.0, 5.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        assert!(pick_nearest(&ray, &objects, &meshes).is_none());
    }

    #[test]
    fn ndc_ray_points_into_the_scene() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.1, 100.0);
        let ray = Ray::from_ndc(Vec2::ZERO, projection * view).unwrap();
        assert!(ray.direction.z < -0.99);
    }

    fn hit(object: u32) -> Option<PickHit> {
        Some(PickHit {
            object,
            distance: 1.0,
        })
    }

    #[test]
    fn hover_saves_and_restores_the_original_tint() {
        let model = DataModel::from_objects(vec![object_at(0, 0.0), object_at(1, 0.0)]);
        let mut hover = HoverState::default();

        hover.observe(hit(0), &model);
        assert_eq!(hover.hovered(), Some(0));
        assert_eq!(model.material(0).unwrap().emissive, HIGHLIGHT_EMISSIVE);

        // Moving to another object restores the first one's tint.
        hover.observe(hit(1), &model);
        assert_eq!(hover.hovered(), Some(1));
        assert_eq!(model.material(0).unwrap().emissive, Vec3::splat(0.0));
        assert_eq!(model.material(1).unwrap().emissive, HIGHLIGHT_EMISSIVE);

        // Leaving the scene restores and clears.
        hover.observe(None, &model);
        assert_eq!(hover.hovered(), None);
        assert_eq!(model.material(1).unwrap().emissive, Vec3::splat(0.1));
    }

    #[test]
    fn at_most_one_object_is_tinted() {
        let model = DataModel::from_objects(vec![
            object_at(0, 0.0),
            object_at(1, 0.0),
            object_at(2, 0.0),
        ]);
        let mut hover = HoverState::default();
        for id in [0u32, 1, 2, 1, 0] {
            hover.observe(hit(id), &model);
            let tinted = model
                .all_objects()
                .iter()
                .filter(|object| object.material.unwrap().emissive == HIGHLIGHT_EMISSIVE)
                .count();
            assert_eq!(tinted, 1);
        }
    }

    #[test]
    fn repeated_hover_is_idempotent() {
        let model = DataModel::from_objects(vec![object_at(3, 0.0)]);
        let mut hover = HoverState::default();
        hover.observe(hit(3), &model);
        hover.observe(hit(3), &model);
        hover.observe(None, &model);
        // The saved value survives repeated application.
        assert_eq!(model.material(3).unwrap().emissive, Vec3::splat(0.3));
    }

    #[test]
    fn material_less_objects_hover_without_tinting() {
        let mut object = object_at(0, 0.0);
        object.material = None;
        let model = DataModel::from_objects(vec![object]);
        let mut hover = HoverState::default();

        hover.observe(hit(0), &model);
        assert_eq!(hover.hovered(), Some(0));
        assert!(model.material(0).is_none());

        hover.observe(None, &model);
        assert_eq!(hover.hovered(), None);
    }

    #[test]
    fn forget_drops_the_reference_without_writing() {
        let model = DataModel::from_objects(vec![object_at(0, 0.0)]);
        let mut hover = HoverState::default();
        hover.observe(hit(0), &model);

        // Simulates a model swap: the new object 0 must not receive the old
        // object's saved tint.
        model.replace_objects(vec![object_at(0, 0.0)]);
        hover.forget();
        assert_eq!(hover.hovered(), None);
        assert_eq!(model.material(0).unwrap().emissive, Vec3::splat(0.0));
    }
}
