use glam::Vec3;

use crate::scene::{MeshStats, SceneObject};

/// Currently selected object. Selection has an independent lifetime from
/// hover tracking: selecting an object does not stop hover updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    selected: Option<u32>,
}

impl Selection {
    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    /// Handles a pointer click. Only a click made while an object is hovered
    /// changes the selection; a click into empty space is ignored.
    pub fn click(&mut self, hovered: Option<u32>) -> bool {
        match hovered {
            Some(id) if self.selected != Some(id) => {
                self.selected = Some(id);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}

/// Mirrored, editable view of the selected object's material and derived
/// mesh statistics. Rebuilt from the live object whenever the selection
/// changes, discarding any state from the previous selection.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialEditState {
    pub label: String,
    pub color: [f32; 3],
    pub hex: String,
    pub opacity: f32,
    pub transparent: bool,
    pub wireframe: bool,
    pub has_material: bool,
    pub stats: MeshStats,
}

impl MaterialEditState {
    pub fn from_object(object: &SceneObject, stats: MeshStats) -> Self {
        let material = object.material.unwrap_or_default();
        let color = material.base_color;
        Self {
            label: object.label(),
            color: [color.x, color.y, color.z],
            hex: format_hex_color(color),
            opacity: material.opacity,
            transparent: material.transparent,
            wireframe: material.wireframe,
            has_material: object.material.is_some(),
            stats,
        }
    }

    pub fn color_vec(&self) -> Vec3 {
        Vec3::from_array(self.color)
    }

    /// Updates the working color, keeping the hex text in sync.
    pub fn set_color(&mut self, color: Vec3) {
        self.color = [color.x, color.y, color.z];
        self.hex = format_hex_color(color);
    }
}

/// Parses `#rrggbb` (the leading `#` is optional) into a linear-ish RGB
/// triple in [0, 1]. Returns `None` for anything else.
pub fn parse_hex_color(text: &str) -> Option<Vec3> {
    let digits = text.trim().strip_prefix('#').unwrap_or(text.trim());
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).expect("hex digits verified") as f32 / 255.0
    };
    Some(Vec3::new(channel(0..2), channel(2..4), channel(4..6)))
}

pub fn format_hex_color(color: Vec3) -> String {
    let to_byte = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        to_byte(color.x),
        to_byte(color.y),
        to_byte(color.z)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Material;

    #[test]
    fn click_with_hover_selects() {
        let mut selection = Selection::default();
        assert!(selection.click(Some(2)));
        assert_eq!(selection.selected(), Some(2));
    }

    #[test]
    fn click_without_hover_keeps_the_selection() {
        let mut selection = Selection::default();
        selection.click(Some(2));
        assert!(!selection.click(None));
        assert_eq!(selection.selected(), Some(2));
    }

    #[test]
    fn reselecting_the_same_object_reports_no_change() {
        let mut selection = Selection::default();
        selection.click(Some(1));
        assert!(!selection.click(Some(1)));
    }

    #[test]
    fn edit_state_mirrors_the_live_material() {
        let object = SceneObject {
            id: 5,
            name: Some("Wing".to_string()),
            material: Some(Material {
                base_color: Vec3::new(1.0, 0.0, 0.0),
                opacity: 0.4,
                transparent: true,
                wireframe: true,
                emissive: Vec3::ZERO,
            }),
            ..SceneObject::default()
        };
        let state = MaterialEditState::from_object(&object, MeshStats::from_vertex_count(9));
        assert_eq!(state.label, "Wing");
        assert_eq!(state.hex, "#ff0000");
        assert_eq!(state.opacity, 0.4);
        assert!(state.transparent);
        assert!(state.wireframe);
        assert!(state.has_material);
        assert_eq!(state.stats.polygons, 3);
        assert_eq!(state.stats.triangles, 6);
    }

    #[test]
    fn edit_state_for_material_less_object() {
        let object = SceneObject {
            material: None,
            ..SceneObject::default()
        };
        let state = MaterialEditState::from_object(&object, MeshStats::default());
        assert!(!state.has_material);
    }

    #[test]
    fn hex_parsing_round_trips() {
        assert_eq!(parse_hex_color("#ff8000"), parse_hex_color("FF8000"));
        let color = parse_hex_color("#336699").unwrap();
        assert_eq!(format_hex_color(color), "#336699");
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!(parse_hex_color("#12345").is_none());
        assert!(parse_hex_color("red").is_none());
        assert!(parse_hex_color("#gg0000").is_none());
    }
}
