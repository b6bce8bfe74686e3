#[cfg(not(target_arch = "wasm32"))]
use inkflow::{
    AnalysisRecorder, DefaultBackend, FluidApp, FluidMetrics, FrameLoop, ImageExporter,
    ManualScheduler, PointerSample, SimulationParameters, SurfaceSize, field::FieldKind,
};
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

#[cfg(not(target_arch = "wasm32"))]
const FRAME_MS: f64 = 1000.0 / 60.0;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let config = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);
    let params = match &config {
        Some(path) => SimulationParameters::from_path(path)?,
        None => SimulationParameters::default(),
    };

    if args.len() > 1 && args[1] == "test" {
        // Run headless scenario and export PNGs
        let out_dir = args
            .get(2)
            .filter(|arg| !arg.starts_with("--"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        run_headless_test(params, &out_dir)?;
    } else {
        run_gui_app(params)?;
    }

    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(all(not(target_arch = "wasm32"), feature = "cpu"))]
fn create_backend() -> inkflow::Result<DefaultBackend> {
    Ok(DefaultBackend::new())
}

#[cfg(all(not(target_arch = "wasm32"), not(feature = "cpu")))]
fn create_backend() -> inkflow::Result<DefaultBackend> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|err| inkflow::FluidError::UnsupportedBackend(err.to_string()))?;
    runtime.block_on(DefaultBackend::new())
}

#[cfg(not(target_arch = "wasm32"))]
fn run_headless_test(
    params: SimulationParameters,
    out_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Running headless ink scenario with quantitative analysis...");
    std::fs::create_dir_all(out_dir)?;

    let params = SimulationParameters {
        sim_resolution: params.sim_resolution.min(128),
        dye_resolution: params.dye_resolution.min(512),
        ..params
    };
    let surface = SurfaceSize::new(512, 512);
    let mut engine = FrameLoop::start(create_backend()?, params, surface, ManualScheduler::new())?;
    let exporter = ImageExporter::new(512, 512);
    let mut recorder = AnalysisRecorder::new();

    // Drag one pointer left to right across the middle of the surface.
    let sender = engine.pointer_sender();
    sender.send(PointerSample::down(1, glam::Vec2::new(0.25, 0.5), 0.0));

    for frame in 0..=60u32 {
        let timestamp = frame as f64 * FRAME_MS;
        if (1..=20).contains(&frame) {
            let x = 0.25 + frame as f32 * 0.025;
            sender.send(PointerSample::moved(1, glam::Vec2::new(x, 0.5), timestamp));
        } else if frame == 21 {
            sender.send(PointerSample::up(1, glam::Vec2::new(0.75, 0.5), timestamp));
        }

        let Some(report) = engine.on_frame(timestamp) else {
            return Err("frame loop stopped".into());
        };
        let metrics = recorder.record_frame(engine.simulation_mut())?;
        if frame % 10 == 0 {
            metrics.print_summary();
            println!("  dt {:.4}s, splats {}", report.dt, report.splats);
            println!();

            let prefix = format!("test_{frame:04}");
            exporter.export_simulation(engine.simulation_mut(), out_dir, &prefix)?;
            let display = engine.display_snapshot()?;
            exporter.export_display_png(&display, &out_dir.join(format!("{prefix}_display.png")))?;
        }
    }

    recorder.print_trends();

    let dye = engine.simulation_mut().read(FieldKind::Dye)?;
    let velocity = engine.simulation_mut().read(FieldKind::Velocity)?;
    let final_metrics = FluidMetrics::from_snapshots(engine.simulation().frame(), &dye, &velocity);
    if final_metrics.dye.non_finite + final_metrics.velocity.non_finite > 0 {
        return Err("non-finite values in final state".into());
    }

    engine.destroy();
    println!("Test completed! Output written to {}", out_dir.display());
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn run_gui_app(params: SimulationParameters) -> Result<(), Box<dyn std::error::Error>> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_title("inkflow - Interactive Ink Simulation"),
        ..Default::default()
    };

    eframe::run_native(
        "inkflow",
        options,
        Box::new(move |cc| Box::new(FluidApp::new(cc, params, create_backend))),
    )?;
    Ok(())
}
