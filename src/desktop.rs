//! eframe host: paints the display field, forwards mouse and touch input,
//! and exposes the session parameters in a side panel.

use crate::backend::Backend;
use crate::config::{SimulationParameters, SurfaceSize};
use crate::error::Result;
use crate::export::ImageExporter;
use crate::frame_loop::{FrameHandle, FrameLoop, FrameScheduler, LoopState};
use crate::pointer::{PointerPhase, PointerSample, PointerSender, random_splats};
use eframe::egui;
use glam::Vec2;
use std::path::Path;

const PARAMS_KEY: &str = "inkflow_params";
const MOUSE_POINTER_ID: u64 = 0;
const SPLASH_COUNT: usize = 8;

/// Frame requests become egui repaint requests.
pub struct RepaintScheduler {
    ctx: egui::Context,
    next_id: u64,
    pending: Option<FrameHandle>,
}

impl RepaintScheduler {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            next_id: 0,
            pending: None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl FrameScheduler for RepaintScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending = Some(handle);
        self.ctx.request_repaint();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

type BackendFactory<B> = Box<dyn FnMut() -> Result<B>>;

pub struct FluidApp<B: Backend> {
    make_backend: BackendFactory<B>,
    engine: Option<FrameLoop<B, RepaintScheduler>>,
    sender: Option<PointerSender>,
    params: SimulationParameters,
    /// Edited in the panel, applied on restart.
    pending_params: SimulationParameters,
    surface: Option<SurfaceSize>,
    texture: Option<egui::TextureHandle>,
    exporter: ImageExporter,
    mouse_down: bool,
    status: String,
}

impl<B: Backend> FluidApp<B> {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        params: SimulationParameters,
        make_backend: impl FnMut() -> Result<B> + 'static,
    ) -> Self {
        let params = cc
            .storage
            .and_then(|storage| eframe::get_value::<SimulationParameters>(storage, PARAMS_KEY))
            .filter(|stored| stored.validate().is_ok())
            .unwrap_or(params);

        Self {
            make_backend: Box::new(make_backend),
            engine: None,
            sender: None,
            pending_params: params.clone(),
            params,
            surface: None,
            texture: None,
            exporter: ImageExporter::new(512, 512),
            mouse_down: false,
            status: String::new(),
        }
    }

    /// Tears down the running engine and starts a fresh one for `surface`.
    /// On failure the canvas stays empty and the error is shown.
    fn restart(&mut self, ctx: &egui::Context, surface: SurfaceSize) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
        self.sender = None;
        self.surface = Some(surface);

        let started = (self.make_backend)().and_then(|backend| {
            FrameLoop::start(
                backend,
                self.params.clone(),
                surface,
                RepaintScheduler::new(ctx.clone()),
            )
        });
        match started {
            Ok(engine) => {
                self.sender = Some(engine.pointer_sender());
                self.engine = Some(engine);
                self.status.clear();
            }
            Err(err) => {
                log::error!("fluid effect disabled: {err}");
                self.status = format!("Effect disabled: {err}");
            }
        }
    }

    fn forward_input(&mut self, ctx: &egui::Context, rect: egui::Rect) {
        let Some(sender) = &self.sender else {
            return;
        };
        let normalize = |pos: egui::Pos2| {
            Vec2::new(
                (pos.x - rect.left()) / rect.width(),
                (pos.y - rect.top()) / rect.height(),
            )
        };

        let (events, time) = ctx.input(|i| (i.events.clone(), i.time));
        let timestamp_ms = time * 1000.0;
        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    ..
                } => {
                    if pressed && rect.contains(pos) {
                        self.mouse_down = true;
                        sender.send(PointerSample::down(MOUSE_POINTER_ID, normalize(pos), timestamp_ms));
                    } else if !pressed && self.mouse_down {
                        self.mouse_down = false;
                        sender.send(PointerSample::up(MOUSE_POINTER_ID, normalize(pos), timestamp_ms));
                    }
                }
                egui::Event::PointerMoved(pos) if self.mouse_down => {
                    sender.send(PointerSample::moved(MOUSE_POINTER_ID, normalize(pos), timestamp_ms));
                }
                egui::Event::Touch { id, phase, pos, .. } => {
                    let phase = match phase {
                        egui::TouchPhase::Start if rect.contains(pos) => PointerPhase::Down,
                        egui::TouchPhase::Start => continue,
                        egui::TouchPhase::Move => PointerPhase::Move,
                        egui::TouchPhase::End | egui::TouchPhase::Cancel => PointerPhase::Up,
                    };
                    // Id 0 belongs to the mouse.
                    let id = id.0.wrapping_add(1);
                    sender.send(PointerSample::new(id, normalize(pos), timestamp_ms, phase));
                }
                _ => {}
            }
        }
    }

    fn run_frame(&mut self, ctx: &egui::Context) {
        let Some(engine) = &mut self.engine else {
            return;
        };
        if !engine.scheduler().has_pending() {
            return;
        }
        let timestamp_ms = ctx.input(|i| i.time) * 1000.0;
        let Some(report) = engine.on_frame(timestamp_ms) else {
            return;
        };
        if !report.rendered {
            return;
        }

        match engine.display_snapshot() {
            Ok(snapshot) => {
                let image = egui::ColorImage::from_rgba_unmultiplied(
                    [snapshot.width as usize, snapshot.height as usize],
                    &snapshot.to_rgba8(),
                );
                match &mut self.texture {
                    Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("inkflow_display", image, egui::TextureOptions::LINEAR));
                    }
                }
            }
            Err(err) => log::warn!("display readback failed: {err}"),
        }
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        let mut restart = false;
        let mut splash = false;
        let mut reset = false;
        let mut export = false;

        egui::SidePanel::left("controls").show(ctx, |ui| {
            ui.heading("inkflow");

            match &self.engine {
                Some(engine) => {
                    ui.label(format!("FPS: {:.1}", engine.fps()));
                    let sim = engine.simulation();
                    let (sw, sh) = sim.sim_size();
                    let (dw, dh) = sim.dye_size();
                    ui.label(format!("Grid {sw}x{sh}, dye {dw}x{dh}"));
                    ui.label(format!("Backend: {}", sim.backend().name()));
                }
                None => {
                    ui.label("Engine stopped");
                }
            }
            if !self.status.is_empty() {
                ui.colored_label(egui::Color32::LIGHT_RED, &self.status);
            }

            ui.separator();
            ui.horizontal(|ui| {
                if let Some(engine) = &mut self.engine {
                    let label = if engine.state() == LoopState::Suspended {
                        "Resume"
                    } else {
                        "Suspend"
                    };
                    if ui.button(label).clicked() {
                        match engine.state() {
                            LoopState::Suspended => engine.resume(),
                            _ => engine.suspend(),
                        }
                    }
                }
                splash = ui.button("Splash").clicked();
                reset = ui.button("Reset").clicked();
            });
            export = ui.button("Export PNG").clicked();

            ui.separator();
            let p = &mut self.pending_params;
            ui.add(egui::Slider::new(&mut p.sim_resolution, 32..=256).text("Sim resolution"));
            ui.add(egui::Slider::new(&mut p.dye_resolution, 64..=1024).text("Dye resolution"));
            ui.add(egui::Slider::new(&mut p.density_dissipation, 0.9..=1.0).text("Density dissipation"));
            ui.add(egui::Slider::new(&mut p.velocity_dissipation, 0.9..=1.0).text("Velocity dissipation"));
            ui.add(egui::Slider::new(&mut p.pressure_iterations, 1..=80).text("Pressure iterations"));
            ui.add(egui::Slider::new(&mut p.splat_radius, 0.05..=1.0).text("Splat radius"));
            restart = ui
                .add_enabled(*p != self.params, egui::Button::new("Apply"))
                .clicked();
        });

        if let Some(engine) = &mut self.engine {
            if splash {
                for splat in random_splats(SPLASH_COUNT, &mut rand::thread_rng()) {
                    if let Err(err) = engine.splat(&splat) {
                        log::warn!("splash failed: {err}");
                        break;
                    }
                }
            }
            if reset {
                if let Err(err) = engine.simulation_mut().reset() {
                    log::warn!("reset failed: {err}");
                }
            }
            if export {
                match engine.display_snapshot() {
                    Ok(snapshot) => {
                        let path = Path::new("inkflow_frame.png");
                        match self.exporter.export_display_png(&snapshot, path) {
                            Ok(()) => self.status = format!("Exported {}", path.display()),
                            Err(err) => self.status = format!("Export failed: {err}"),
                        }
                    }
                    Err(err) => self.status = format!("Export failed: {err}"),
                }
            }
        }

        if restart {
            self.params = self.pending_params.clone();
            if let Some(surface) = self.surface {
                self.restart(ctx, surface);
            }
        }
    }
}

impl<B: Backend> eframe::App for FluidApp<B> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.side_panel(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let surface = SurfaceSize::from_logical(rect.width(), rect.height(), ctx.pixels_per_point());

                if self.engine.is_none() && self.surface.is_none() {
                    self.restart(ctx, surface);
                } else if self.surface != Some(surface) {
                    self.surface = Some(surface);
                    if let Some(engine) = &mut self.engine {
                        if engine.resize(surface).is_err() {
                            self.engine = None;
                            self.sender = None;
                            self.status = "Effect disabled after resize failure".into();
                        }
                    }
                }

                self.forward_input(ctx, rect);
                self.run_frame(ctx);

                if let Some(texture) = &self.texture {
                    ui.painter().image(
                        texture.id(),
                        rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
            });
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, PARAMS_KEY, &self.params);
    }
}
