use egui_wgpu::ScreenDescriptor;

/// Paints the egui inspector on top of the scene pass.
///
/// Window-event plumbing (egui-winit) stays with the host shell; this type
/// only owns the GPU side of the overlay.
pub struct EguiOverlay {
    renderer: egui_wgpu::Renderer,
}

/// One frame's worth of UI output, handed to [`crate::render::Renderer::render`].
pub struct OverlayPaint<'a> {
    pub overlay: &'a mut EguiOverlay,
    pub primitives: &'a [egui::ClippedPrimitive],
    pub textures_delta: &'a egui::TexturesDelta,
    pub pixels_per_point: f32,
}

impl EguiOverlay {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        Self {
            renderer: egui_wgpu::Renderer::new(device, surface_format, None, 1),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn paint(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        primitives: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        screen: &ScreenDescriptor,
    ) {
        for (id, image_delta) in &textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }
        // No paint callbacks are used, so the returned command buffers are
        // always empty.
        let _ = self
            .renderer
            .update_buffers(device, queue, encoder, primitives, screen);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.renderer.render(&mut pass, primitives, screen);
        }

        for id in &textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
