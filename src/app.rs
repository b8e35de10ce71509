use crate::data_model::DataModel;
use crate::document::GlbDocument;
use crate::scene::Scene;

/// Prints the object summary used by `--summary-only` and the headless
/// fallback.
pub fn print_model_summary(document: &GlbDocument, scene: &Scene) {
    println!(
        "Loaded {} with {} objects ({} bytes)",
        document.label(),
        scene.objects.len(),
        document.len()
    );
    for object in &scene.objects {
        let stats = scene.stats_for(object).unwrap_or_default();
        println!(
            " - {} ({}): {} vertices, {} polygons, {} triangles",
            object.label(),
            object.object_type,
            stats.vertices,
            stats.polygons,
            stats.triangles
        );
    }
}

/// Prints the material state of every object, used when the viewer exits.
pub fn print_final_state(model: &DataModel) {
    println!("Final material states:");
    for object in model.all_objects() {
        match object.material {
            Some(material) => println!(
                " - {} color=({:.2}, {:.2}, {:.2}) opacity={:.2} wireframe={} transparent={}",
                object.label(),
                material.base_color.x,
                material.base_color.y,
                material.base_color.z,
                material.opacity,
                material.wireframe,
                material.transparent
            ),
            None => println!(" - {} (no material)", object.label()),
        }
    }
}
