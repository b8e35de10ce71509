//! Core modules for the meshview glTF viewer.
//!
//! The crate exposes high level building blocks that can be composed to
//! build bespoke viewers or tooling around binary glTF files.  Window and
//! event-loop integration are intentionally kept in the binary so that the
//! interaction logic remains testable headless.

pub mod app;
pub mod camera;
pub mod data_model;
pub mod document;
pub mod gltf;
pub mod input;
pub mod loader;
pub mod panel;
pub mod picking;
pub mod render;
pub mod scene;
pub mod selection;

pub use camera::OrbitCamera;
pub use data_model::DataModel;
pub use document::GlbDocument;
pub use gltf::MeshData;
pub use input::{InputState, MouseButton};
pub use loader::{LoadOutcome, LoadedModel, ModelLoader};
pub use panel::{InspectorPanel, PanelAction};
pub use picking::{pick_nearest, HoverState, PickHit, Ray};
pub use render::{CameraParams, EguiOverlay, LightParams, Renderer};
pub use scene::{Material, MeshStats, Scene, SceneObject};
pub use selection::{MaterialEditState, Selection};
