use std::any::Any;
use std::cell::RefCell;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{error, info};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use meshview::app::{print_final_state, print_model_summary};
use meshview::loader::load_sync;
use meshview::picking::{pick_nearest, Ray};
use meshview::render::overlay::OverlayPaint;
use meshview::{
    DataModel, EguiOverlay, GlbDocument, HoverState, InputState, InspectorPanel, LightParams,
    LoadOutcome, LoadedModel, MeshData, ModelLoader, MouseButton, OrbitCamera, PanelAction,
    Renderer, Selection,
};

/// A left click that travels less than this many pixels selects instead of
/// orbiting.
const CLICK_SLOP: f32 = 4.0;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;

    if options.summary_only {
        return run_headless(&options);
    }
    match run_interactive(&options) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() && options.path.is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&options)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(options: &CliOptions) -> Result<()> {
    let path = options
        .path
        .as_deref()
        .ok_or_else(|| anyhow!("a model path is required without a window"))?;
    let (document, scene) = load_sync(Path::new(path))?;
    print_model_summary(&document, &scene);

    if let Some(export) = &options.export {
        document
            .export_to(export)
            .with_context(|| format!("failed to export to {export}"))?;
        println!("Exported {} bytes to {export}", document.len());
    }
    Ok(())
}

fn run_interactive(options: &CliOptions) -> Result<()> {
    // Window creation panics instead of erroring on some headless setups;
    // trap it so the caller can fall back to the summary path.
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let window = Arc::new(
        WindowBuilder::new()
            .with_title("meshview")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window)))?;
    let overlay = EguiOverlay::new(renderer.device(), renderer.surface_format());
    let egui_ctx = egui::Context::default();
    let egui_state = egui_winit::State::new(
        egui_ctx.clone(),
        egui::ViewportId::ROOT,
        window.as_ref(),
        Some(window.scale_factor() as f32),
        None,
    );

    let mut app = AppState {
        renderer,
        overlay,
        egui_ctx,
        egui_state,
        model: DataModel::new(),
        meshes: Vec::new(),
        document: None,
        loader: ModelLoader::new(),
        input: InputState::new(),
        camera: OrbitCamera::default(),
        hover: HoverState::default(),
        selection: Selection::default(),
        panel: InspectorPanel::new(),
        last_cursor: None,
        drag_distance: 0.0,
        pending_click: false,
    };

    if let Some(path) = &options.path {
        app.panel.set_status(format!("Loading {path}…"));
        app.loader.request(PathBuf::from(path));
    }

    let failure: Rc<RefCell<Option<anyhow::Error>>> = Rc::new(RefCell::new(None));
    let failure_slot = Rc::clone(&failure);
    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Err(err) = app.process_event(event, elwt) {
            *failure_slot.borrow_mut() = Some(err);
            elwt.exit();
        }
    })?;

    match Rc::try_unwrap(failure) {
        Ok(cell) => match cell.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        },
        Err(_) => Ok(()),
    }
}

struct AppState {
    renderer: Renderer,
    overlay: EguiOverlay,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    model: DataModel,
    meshes: Vec<MeshData>,
    document: Option<GlbDocument>,
    loader: ModelLoader,
    input: InputState,
    camera: OrbitCamera,
    hover: HoverState,
    selection: Selection,
    panel: InspectorPanel,
    last_cursor: Option<Vec2>,
    drag_distance: f32,
    pending_click: bool,
}

impl AppState {
    fn process_event(
        &mut self,
        event: Event<()>,
        elwt: &EventLoopWindowTarget<()>,
    ) -> Result<()> {
        match event {
            Event::WindowEvent { window_id, event } if window_id == self.renderer.window_id() => {
                let response = self
                    .egui_state
                    .on_window_event(self.renderer.window(), &event);
                match event {
                    WindowEvent::CloseRequested => {
                        self.shutdown();
                        elwt.exit();
                    }
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(size);
                    }
                    WindowEvent::KeyboardInput { event, .. } if !response.consumed => {
                        if event.state == ElementState::Pressed
                            && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                        {
                            self.selection.clear();
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let cursor = Vec2::new(position.x as f32, position.y as f32);
                        if !response.consumed {
                            self.drag_camera(cursor);
                        }
                        self.last_cursor = Some(cursor);
                        self.input.set_mouse_position(cursor);
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        self.handle_mouse_button(state, button, response.consumed);
                    }
                    WindowEvent::MouseWheel { delta, .. } if !response.consumed => {
                        let steps = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(position) => position.y as f32 / 60.0,
                        };
                        self.input.add_scroll(steps);
                    }
                    WindowEvent::RedrawRequested => {
                        self.redraw()?;
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn drag_camera(&mut self, cursor: Vec2) {
        let Some(last) = self.last_cursor else {
            return;
        };
        let delta = cursor - last;
        if self.input.is_mouse_button_down(MouseButton::LEFT) {
            self.drag_distance += delta.length();
            self.camera.orbit(delta);
        } else if self.input.is_mouse_button_down(MouseButton::RIGHT)
            || self.input.is_mouse_button_down(MouseButton::MIDDLE)
        {
            self.camera.pan(delta);
        }
    }

    fn handle_mouse_button(
        &mut self,
        state: ElementState,
        button: WinitMouseButton,
        consumed_by_ui: bool,
    ) {
        let index = match button {
            WinitMouseButton::Left => 0,
            WinitMouseButton::Right => 1,
            WinitMouseButton::Middle => 2,
            WinitMouseButton::Back => 3,
            WinitMouseButton::Forward => 4,
            WinitMouseButton::Other(value) => value,
        } as u8;
        let mapped = MouseButton::new(index);
        match state {
            ElementState::Pressed => {
                self.input.set_mouse_button_down(mapped);
                if !consumed_by_ui && mapped == MouseButton::LEFT {
                    self.drag_distance = 0.0;
                }
            }
            ElementState::Released => {
                self.input.set_mouse_button_up(mapped);
                if !consumed_by_ui
                    && mapped == MouseButton::LEFT
                    && self.drag_distance < CLICK_SLOP
                {
                    self.pending_click = true;
                }
            }
        }
    }

    fn redraw(&mut self) -> Result<()> {
        if let Some(outcome) = self.loader.poll() {
            match outcome {
                LoadOutcome::Loaded(loaded) => self.install_model(*loaded),
                LoadOutcome::Failed { label, error, .. } => {
                    error!("failed to load {label}: {error}");
                    self.panel.set_status(format!("Failed to load {label}: {error}"));
                }
            }
        }

        // UI pass first so it can claim the pointer for this frame.
        let raw_input = self.egui_state.take_egui_input(self.renderer.window());
        self.panel.sync(&self.selection, &self.model, &self.meshes);
        let egui_ctx = self.egui_ctx.clone();
        let mut actions = Vec::new();
        let full_output = egui_ctx.run(raw_input, |ctx| {
            actions = self.panel.ui(
                ctx,
                &self.model,
                self.document.as_ref(),
                self.loader.is_loading(),
            );
        });
        self.egui_state
            .handle_platform_output(self.renderer.window(), full_output.platform_output);
        let primitives = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for action in actions {
            match action {
                PanelAction::OpenModel(path) => {
                    self.panel
                        .set_status(format!("Loading {}…", path.display()));
                    self.loader.request(path);
                }
                PanelAction::ExportModel(path) => match self.export_document(&path) {
                    Ok(bytes) => {
                        self.panel
                            .set_status(format!("Exported {bytes} bytes to {}", path.display()));
                    }
                    Err(err) => {
                        error!("export failed: {err:?}");
                        self.panel.set_status(format!("Export failed: {err:#}"));
                    }
                },
            }
        }

        let ui_owns_pointer =
            self.egui_ctx.wants_pointer_input() || self.egui_ctx.is_pointer_over_area();
        let scroll = self.input.take_scroll();
        if !ui_owns_pointer && scroll != 0.0 {
            self.camera.zoom(scroll);
        }

        // Per-frame pick: the pointer holder is sampled at frame cadence, not
        // per pointer event.
        let camera = self.camera.params(self.renderer.aspect());
        let objects = self.model.all_objects();
        let candidate = if ui_owns_pointer {
            None
        } else {
            self.input
                .pointer_ndc(self.renderer.viewport_size())
                .and_then(|ndc| Ray::from_ndc(ndc, camera.view_proj))
                .and_then(|ray| pick_nearest(&ray, &objects, &self.meshes))
        };
        self.hover.observe(candidate, &self.model);

        if std::mem::take(&mut self.pending_click) {
            self.selection.click(self.hover.hovered());
        }

        self.renderer
            .update_globals(&camera, &LightParams::default_rig());
        let objects = self.model.all_objects();
        let paint = OverlayPaint {
            overlay: &mut self.overlay,
            primitives: &primitives,
            textures_delta: &full_output.textures_delta,
            pixels_per_point: full_output.pixels_per_point,
        };
        if let Err(err) = self.renderer.render(&objects, Some(paint)) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; retrying next frame");
                }
            }
        }
        Ok(())
    }

    /// Installs a finished load, replacing the previous model wholesale.
    fn install_model(&mut self, loaded: LoadedModel) {
        info!(
            "loaded {} ({} objects, {} meshes)",
            loaded.document.label(),
            loaded.scene.objects.len(),
            loaded.scene.meshes.len()
        );
        // The old hover/selection point into objects that no longer exist.
        self.hover.forget();
        self.selection.clear();

        let bounds = loaded.scene.bounds();
        self.renderer.set_meshes(&loaded.scene.meshes);
        self.meshes = loaded.scene.meshes;
        self.model.replace_objects(loaded.scene.objects);
        if let Some((min, max)) = bounds {
            self.camera.frame(min, max);
        }
        self.panel
            .set_status(format!("Loaded {}", loaded.document.label()));
        self.document = Some(loaded.document);
    }

    fn export_document(&self, path: &Path) -> Result<u64> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| anyhow!("no model loaded"))?;
        document.export_to(path)?;
        Ok(document.len() as u64)
    }

    fn shutdown(&mut self) {
        print_final_state(&self.model);
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

struct CliOptions {
    path: Option<String>,
    summary_only: bool,
    export: Option<String>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut path = None;
        let mut summary_only = false;
        let mut export = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--export" => {
                    let destination = args
                        .next()
                        .ok_or_else(|| anyhow!("--export requires a destination path"))?;
                    export = Some(destination);
                }
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: meshview [model.glb] [--summary-only] [--export <path>]"
                    ));
                }
                other => {
                    if path.replace(other.to_string()).is_some() {
                        return Err(anyhow!("only one model path may be given"));
                    }
                }
            }
        }
        if export.is_some() && path.is_none() {
            return Err(anyhow!("--export requires a model path"));
        }
        Ok(Self {
            path,
            summary_only,
            export,
        })
    }
}
