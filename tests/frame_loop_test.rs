#![cfg(feature = "cpu")]

use glam::Vec2;
use inkflow::{
    CpuBackend, FieldKind, FluidError, FpsCounter, FrameLoop, LoopState, ManualScheduler,
    PointerSample, SimulationParameters, SurfaceSize,
};

fn start() -> FrameLoop<CpuBackend, ManualScheduler> {
    let params = SimulationParameters {
        sim_resolution: 32,
        dye_resolution: 64,
        pressure_iterations: 10,
        color_seed: Some(3),
        ..SimulationParameters::default()
    };
    FrameLoop::start(CpuBackend::new(), params, SurfaceSize::new(64, 64), ManualScheduler::new())
        .unwrap()
}

#[test]
fn test_start_requests_first_frame() {
    let engine = start();
    assert_eq!(engine.state(), LoopState::Running);
    assert_eq!(engine.scheduler().requested(), 1);
    assert_eq!(engine.pending_frame(), engine.scheduler().pending());
}

#[test]
fn test_first_frame_uses_zero_dt() {
    let mut engine = start();
    let first = engine.on_frame(1000.0).unwrap();
    assert_eq!(first.dt, 0.0);
    assert_eq!(first.frame, 1);
    assert!(first.rendered);

    let second = engine.on_frame(1010.0).unwrap();
    assert!((second.dt - 0.010).abs() < 1e-6);
    assert_eq!(second.frame, 2);
    assert_eq!(engine.scheduler().requested(), 3);
}

#[test]
fn test_large_gap_is_clamped() {
    let mut engine = start();
    let ceiling = engine.simulation().params().dt_ceiling;
    let sender = engine.pointer_sender();

    sender.send(PointerSample::down(1, Vec2::new(0.3, 0.5), 0.0));
    engine.on_frame(0.0).unwrap();
    sender.send(PointerSample::moved(1, Vec2::new(0.6, 0.5), 10.0));
    let report = engine.on_frame(5000.0).unwrap();

    assert_eq!(report.dt, ceiling);
    assert_eq!(report.splats, 1);
    for kind in [FieldKind::Velocity, FieldKind::Dye, FieldKind::Pressure] {
        let snapshot = engine.simulation_mut().read(kind).unwrap();
        assert!(snapshot.is_finite(), "{kind:?} has non-finite values");
    }
}

#[test]
fn test_timestamps_going_backwards_give_zero_dt() {
    let mut engine = start();
    engine.on_frame(500.0).unwrap();
    let report = engine.on_frame(400.0).unwrap();
    assert_eq!(report.dt, 0.0);
}

#[test]
fn test_suspend_cancels_pending_frame() {
    let mut engine = start();
    engine.on_frame(0.0).unwrap();
    let frame = engine.simulation().frame();

    engine.suspend();
    assert_eq!(engine.state(), LoopState::Suspended);
    assert_eq!(engine.scheduler().pending(), None);
    assert_eq!(engine.scheduler().cancelled(), 1);
    assert!(engine.on_frame(16.0).is_none());
    assert_eq!(engine.simulation().frame(), frame);

    engine.resume();
    assert_eq!(engine.state(), LoopState::Running);
    assert!(engine.scheduler().pending().is_some());
    // Wall time spent suspended is not integrated.
    let report = engine.on_frame(60_000.0).unwrap();
    assert_eq!(report.dt, 0.0);
    assert_eq!(report.frame, frame + 1);
}

#[test]
fn test_destroy_releases_everything() {
    let mut engine = start();
    engine.on_frame(0.0).unwrap();
    assert_eq!(engine.simulation().backend().live_textures(), 8);

    engine.destroy();
    assert_eq!(engine.state(), LoopState::Destroyed);
    assert_eq!(engine.simulation().backend().live_textures(), 0);
    assert_eq!(engine.scheduler().pending(), None);
    assert!(engine.on_frame(16.0).is_none());
    assert!(matches!(
        engine.resize(SurfaceSize::new(32, 32)),
        Err(FluidError::Destroyed)
    ));
    assert!(matches!(engine.display_snapshot(), Err(FluidError::Destroyed)));

    // Idempotent.
    engine.destroy();
    engine.resume();
    assert_eq!(engine.state(), LoopState::Destroyed);
}

#[test]
fn test_resize_reallocates_fields() {
    let mut engine = start();
    engine.on_frame(0.0).unwrap();
    engine.resize(SurfaceSize::new(128, 64)).unwrap();

    let sim = engine.simulation();
    assert_eq!(sim.sim_size(), (64, 32));
    assert_eq!(sim.dye_size(), (128, 64));
    assert_eq!(sim.backend().live_textures(), 8);
    assert!(engine.on_frame(16.0).unwrap().rendered);
}

#[test]
fn test_injection_is_quantized_to_frames() {
    let mut engine = start();
    let sender = engine.pointer_sender();

    sender.send(PointerSample::down(1, Vec2::new(0.2, 0.5), 0.0));
    for i in 1..=4 {
        sender.send(PointerSample::moved(1, Vec2::new(0.2 + i as f32 * 0.05, 0.5), i as f64));
    }
    assert_eq!(engine.on_frame(0.0).unwrap().splats, 1, "many moves, one splat");

    // Held still: nothing to inject.
    assert_eq!(engine.on_frame(16.0).unwrap().splats, 0);

    sender.send(PointerSample::down(2, Vec2::new(0.5, 0.2), 20.0));
    sender.send(PointerSample::moved(1, Vec2::new(0.5, 0.5), 21.0));
    sender.send(PointerSample::moved(2, Vec2::new(0.5, 0.4), 22.0));
    assert_eq!(engine.on_frame(32.0).unwrap().splats, 2);

    sender.send(PointerSample::up(1, Vec2::new(0.5, 0.5), 40.0));
    sender.send(PointerSample::up(2, Vec2::new(0.5, 0.4), 40.0));
    assert_eq!(engine.on_frame(48.0).unwrap().splats, 0);
}

#[test]
fn test_flick_within_one_frame_splats() {
    let mut engine = start();
    let sender = engine.pointer_sender();

    sender.send(PointerSample::down(1, Vec2::new(0.3, 0.5), 0.0));
    sender.send(PointerSample::moved(1, Vec2::new(0.5, 0.5), 4.0));
    sender.send(PointerSample::up(1, Vec2::new(0.5, 0.5), 8.0));
    let report = engine.on_frame(16.0).unwrap();

    assert_eq!(report.splats, 1);
    assert!(!engine.simulation_mut().read(FieldKind::Dye).unwrap().is_zero());
    assert_eq!(engine.on_frame(32.0).unwrap().splats, 0, "released pointer is forgotten");
}

#[test]
fn test_last_move_before_release_splats() {
    let mut engine = start();
    let sender = engine.pointer_sender();

    sender.send(PointerSample::down(1, Vec2::new(0.3, 0.5), 0.0));
    assert_eq!(engine.on_frame(0.0).unwrap().splats, 0);

    sender.send(PointerSample::moved(1, Vec2::new(0.6, 0.5), 10.0));
    sender.send(PointerSample::up(1, Vec2::new(0.6, 0.5), 12.0));
    assert_eq!(engine.on_frame(16.0).unwrap().splats, 1);
    assert_eq!(engine.on_frame(32.0).unwrap().splats, 0);
}

#[test]
fn test_zero_sized_resize_is_refused_without_stopping() {
    let mut engine = start();
    engine.on_frame(0.0).unwrap();

    let flat = SurfaceSize {
        width: 64,
        height: 0,
        device_pixel_ratio: 1.0,
    };
    assert!(matches!(engine.resize(flat), Err(FluidError::Config(_))));
    assert_eq!(engine.state(), LoopState::Running);
    assert_eq!(engine.simulation().dye_size(), (64, 64));
    assert_eq!(engine.simulation().backend().live_textures(), 8);
    assert!(engine.on_frame(16.0).unwrap().rendered);
}

#[test]
fn test_scripted_splat_reaches_display() {
    let mut engine = start();
    engine
        .splat(&inkflow::Splat {
            point: Vec2::new(0.5, 0.5),
            force: Vec2::ZERO,
            color: glam::Vec3::new(1.0, 0.5, 0.0),
        })
        .unwrap();
    engine.on_frame(0.0).unwrap();

    let display = engine.display_snapshot().unwrap();
    let rgba = display.to_rgba8();
    assert_eq!(rgba.len(), 64 * 64 * 4);
    assert!(rgba.chunks(4).any(|px| px[0] > 200));
}

#[test]
fn test_fps_counter_windows() {
    let mut fps = FpsCounter::new();
    for i in 0..100 {
        assert_eq!(fps.tick(i as f64 * 10.0), None);
    }
    let rate = fps.tick(1000.0).unwrap();
    assert!((95.0..=105.0).contains(&rate), "rate {rate}");
    assert_eq!(fps.fps(), rate);

    fps.reset();
    assert_eq!(fps.fps(), rate, "reset keeps the last reading");
    assert_eq!(fps.tick(5000.0), None);
}
