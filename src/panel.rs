use std::path::PathBuf;

use crate::data_model::DataModel;
use crate::document::{GlbDocument, EXPORT_FILE_NAME};
use crate::gltf::MeshData;
use crate::scene::MeshStats;
use crate::selection::{format_hex_color, parse_hex_color, MaterialEditState, Selection};

/// Request produced by a panel interaction, carried out by the host shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    OpenModel(PathBuf),
    ExportModel(PathBuf),
}

/// Side panel exposing the selected object's material controls and mesh
/// statistics, plus the open/export affordances.
#[derive(Debug, Default)]
pub struct InspectorPanel {
    edit: Option<MaterialEditState>,
    synced: Option<u32>,
    status: String,
}

impl InspectorPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    #[cfg(test)]
    pub(crate) fn edit_state(&self) -> Option<&MaterialEditState> {
        self.edit.as_ref()
    }

    /// Re-mirrors the edit state from the live object whenever the selection
    /// reference changes, discarding whatever the previous selection left
    /// behind.
    pub fn sync(&mut self, selection: &Selection, model: &DataModel, meshes: &[MeshData]) {
        let selected = selection.selected();
        if selected == self.synced {
            return;
        }
        self.synced = selected;
        self.edit = selected.and_then(|id| model.get(id)).map(|object| {
            let stats = meshes
                .get(object.mesh)
                .map(|mesh| MeshStats::from_vertex_count(mesh.vertex_count()))
                .unwrap_or_default();
            MaterialEditState::from_object(&object, stats)
        });
    }

    /// Builds the panel for this frame. Material edits are applied to the
    /// data model immediately; open/export requests are returned for the
    /// host to carry out.
    pub fn ui(
        &mut self,
        ctx: &egui::Context,
        model: &DataModel,
        document: Option<&GlbDocument>,
        loading: bool,
    ) -> Vec<PanelAction> {
        let mut actions = Vec::new();

        egui::SidePanel::right("inspector")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Model");
                match document {
                    Some(document) => {
                        ui.label(document.label());
                        ui.label(format!(
                            "{} objects, {} bytes",
                            model.object_count(),
                            document.len()
                        ));
                    }
                    None => {
                        ui.label("No model loaded");
                    }
                }
                if loading {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Loading…");
                    });
                }

                ui.horizontal(|ui| {
                    if ui.button("Open…").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("binary glTF", &["glb"])
                            .pick_file()
                        {
                            actions.push(PanelAction::OpenModel(path));
                        }
                    }
                    let export = egui::Button::new("Export");
                    if ui.add_enabled(document.is_some(), export).clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .set_file_name(EXPORT_FILE_NAME)
                            .save_file()
                        {
                            actions.push(PanelAction::ExportModel(path));
                        }
                    }
                });

                ui.separator();
                match self.edit.as_mut() {
                    Some(edit) => {
                        let id = self.synced.expect("edit state implies a selection");
                        selected_object_ui(ui, id, edit, model);
                    }
                    None => {
                        ui.label("Click an object to inspect it");
                    }
                }

                if !self.status.is_empty() {
                    ui.separator();
                    ui.label(egui::RichText::new(&self.status).weak());
                }
            });

        actions
    }
}

fn selected_object_ui(ui: &mut egui::Ui, id: u32, edit: &mut MaterialEditState, model: &DataModel) {
    ui.heading(&edit.label);

    ui.label(format!("Vertices: {}", edit.stats.vertices));
    ui.label(format!("Polygons: {}", edit.stats.polygons));
    ui.label(format!("Triangles: {}", edit.stats.triangles));

    if !edit.has_material {
        ui.separator();
        ui.label("This object has no material to edit");
        return;
    }

    ui.separator();
    ui.horizontal(|ui| {
        ui.label("Color");
        if ui.color_edit_button_rgb(&mut edit.color).changed() {
            let color = edit.color_vec();
            edit.hex = format_hex_color(color);
            model.set_base_color(id, color);
        }
    });
    ui.horizontal(|ui| {
        ui.label("Hex");
        let response = ui.text_edit_singleline(&mut edit.hex);
        let committed =
            response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
        if committed || (response.changed() && edit.hex.len() == 7) {
            match parse_hex_color(&edit.hex) {
                Some(color) => {
                    edit.set_color(color);
                    model.set_base_color(id, color);
                }
                None => {
                    if committed {
                        edit.hex = format_hex_color(edit.color_vec());
                    }
                }
            }
        }
    });

    if ui.checkbox(&mut edit.wireframe, "Wireframe").changed() {
        model.set_wireframe(id, edit.wireframe);
    }
    if ui.checkbox(&mut edit.transparent, "Transparent").changed() {
        model.set_transparent(id, edit.transparent);
    }
    // The slider's range is the only clamp applied to opacity.
    if ui
        .add(egui::Slider::new(&mut edit.opacity, 0.0..=1.0).text("Opacity"))
        .changed()
    {
        model.set_opacity(id, edit.opacity);
    }
}
