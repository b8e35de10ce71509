use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use crate::scene::{Material, SceneObject};

/// Thread-safe container mirroring the mutable state of the loaded model.
#[derive(Debug, Default)]
pub struct DataModel {
    objects: Arc<RwLock<Vec<SceneObject>>>,
}

impl Clone for DataModel {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
        }
    }
}

impl DataModel {
    /// Creates an empty data model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a data model from an initial set of objects.
    pub fn from_objects(objects: Vec<SceneObject>) -> Self {
        Self {
            objects: Arc::new(RwLock::new(objects)),
        }
    }

    /// Replaces the stored objects with a new snapshot. The previous model's
    /// objects are discarded wholesale.
    pub fn replace_objects(&self, objects: Vec<SceneObject>) {
        *self.objects.write() = objects;
    }

    /// Returns a snapshot of all stored objects.
    pub fn all_objects(&self) -> Vec<SceneObject> {
        self.objects.read().clone()
    }

    /// Number of objects currently stored.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns a clone of the requested object.
    pub fn get(&self, id: u32) -> Option<SceneObject> {
        self.objects
            .read()
            .iter()
            .find(|object| object.id == id)
            .cloned()
    }

    /// Applies a mutation to the requested object.
    pub fn update<F, R>(&self, id: u32, mut updater: F) -> Option<R>
    where
        F: FnMut(&mut SceneObject) -> R,
    {
        let mut guard = self.objects.write();
        let object = guard.iter_mut().find(|object| object.id == id)?;
        Some(updater(object))
    }

    /// Applies a mutation to the requested object's material. Objects
    /// without a material are left untouched.
    pub fn update_material<F>(&self, id: u32, mut updater: F) -> bool
    where
        F: FnMut(&mut Material),
    {
        self.update(id, |object| {
            if let Some(material) = object.material.as_mut() {
                updater(material);
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Current material of the requested object, when it has one.
    pub fn material(&self, id: u32) -> Option<Material> {
        self.get(id).and_then(|object| object.material)
    }

    pub fn set_base_color(&self, id: u32, color: Vec3) -> bool {
        self.update_material(id, |material| material.base_color = color)
    }

    pub fn set_opacity(&self, id: u32, opacity: f32) -> bool {
        self.update_material(id, |material| material.opacity = opacity)
    }

    pub fn set_transparent(&self, id: u32, transparent: bool) -> bool {
        self.update_material(id, |material| material.transparent = transparent)
    }

    pub fn set_wireframe(&self, id: u32, wireframe: bool) -> bool {
        self.update_material(id, |material| material.wireframe = wireframe)
    }

    pub fn set_emissive(&self, id: u32, emissive: Vec3) -> bool {
        self.update_material(id, |material| material.emissive = emissive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_object(id: u32) -> SceneObject {
        SceneObject {
            id,
            ..SceneObject::default()
        }
    }

    #[test]
    fn replace_and_get_object() {
        let model = DataModel::from_objects(vec![make_object(0)]);
        assert!(model.get(0).is_some());
        model.replace_objects(vec![make_object(7)]);
        assert!(model.get(0).is_none());
        assert!(model.get(7).is_some());
    }

    #[test]
    fn update_modifies_material() {
        let model = DataModel::from_objects(vec![make_object(0)]);
        assert!(model.set_opacity(0, 0.37));
        let material = model.material(0).unwrap();
        assert_eq!(material.opacity, 0.37);
    }

    #[test]
    fn update_touches_only_the_addressed_object() {
        let model = DataModel::from_objects(vec![make_object(0), make_object(1)]);
        model.set_opacity(0, 0.37);
        assert_eq!(model.material(0).unwrap().opacity, 0.37);
        assert_eq!(model.material(1).unwrap().opacity, 1.0);
    }

    #[test]
    fn update_returns_false_for_missing_object() {
        let model = DataModel::new();
        assert!(!model.set_base_color(3, Vec3::ONE));
    }

    #[test]
    fn material_less_object_is_not_mutated() {
        let mut object = make_object(0);
        object.material = None;
        let model = DataModel::from_objects(vec![object]);
        assert!(!model.set_wireframe(0, true));
        assert!(model.get(0).is_some());
        assert!(model.material(0).is_none());
    }
}
