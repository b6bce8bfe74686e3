#![cfg(feature = "cpu")]

use glam::{Vec2, Vec3};
use inkflow::injector::{SplatSettings, clamp_force, corrected_radius};
use inkflow::{
    CpuBackend, FieldKind, PointerState, Simulation, SimulationParameters, Splat, SurfaceSize,
};

const FORCE: f32 = 6000.0;

fn small_simulation() -> Simulation<CpuBackend> {
    let params = SimulationParameters {
        sim_resolution: 32,
        dye_resolution: 32,
        ..SimulationParameters::default()
    };
    Simulation::new(CpuBackend::new(), params, SurfaceSize::new(32, 32)).unwrap()
}

fn pointer(id: u64, force: Vec2) -> PointerState {
    let splat = Splat {
        point: Vec2::new(0.5, 0.5),
        force,
        color: Vec3::new(0.15, 0.0, 0.0),
    };
    PointerState::from_splat(id, &splat, FORCE)
}

#[test]
fn test_radius_widens_on_wide_surfaces() {
    assert!((corrected_radius(0.25, 1.0) - 0.0025).abs() < 1e-7);
    assert!((corrected_radius(0.25, 2.0) - 0.005).abs() < 1e-7);
    assert!((corrected_radius(0.25, 0.5) - 0.0025).abs() < 1e-7);

    let settings = SplatSettings::new(0.25, 2.0, FORCE, 20000.0);
    assert_eq!(settings.radius, corrected_radius(0.25, 2.0));
    assert_eq!(settings.aspect_ratio, 2.0);
}

#[test]
fn test_force_is_capped() {
    assert_eq!(clamp_force(Vec2::new(3000.0, 4000.0), 1000.0), Vec2::new(600.0, 800.0));
    assert_eq!(clamp_force(Vec2::new(30.0, 40.0), 1000.0), Vec2::new(30.0, 40.0));
    assert_eq!(clamp_force(Vec2::ZERO, 1000.0), Vec2::ZERO);
}

#[test]
fn test_pointer_state_round_trips_splat() {
    let state = pointer(4, Vec2::new(600.0, -300.0));
    assert_eq!(state.delta, Vec2::new(0.1, -0.05));
    let splat = state.to_splat(FORCE);
    assert!((splat.force - Vec2::new(600.0, -300.0)).length() < 1e-3);
}

#[test]
fn test_coincident_pointers_add_up() {
    let force = Vec2::new(300.0, 0.0);

    let mut single = small_simulation();
    assert_eq!(single.inject(&[pointer(1, force)]).unwrap(), 1);
    let one = single.read(FieldKind::Velocity).unwrap();

    let mut double = small_simulation();
    assert_eq!(double.inject(&[pointer(1, force), pointer(2, force)]).unwrap(), 2);
    let two = double.read(FieldKind::Velocity).unwrap();

    let peak = one.data.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    assert!(peak > 100.0, "splat did not land, peak {peak}");
    for (a, b) in one.data.iter().zip(&two.data) {
        assert!((2.0 * a - b).abs() <= 1e-3 * peak, "{b} is not twice {a}");
    }

    let dye_one = single.read(FieldKind::Dye).unwrap().sum();
    let dye_two = double.read(FieldKind::Dye).unwrap().sum();
    assert!((dye_two - 2.0 * dye_one).abs() < 1e-3 * dye_two.abs());
}

#[test]
fn test_non_finite_splat_is_dropped() {
    let mut sim = small_simulation();
    for splat in [
        Splat {
            point: Vec2::new(f32::NAN, 0.5),
            force: Vec2::X,
            color: Vec3::ONE,
        },
        Splat {
            point: Vec2::splat(0.5),
            force: Vec2::new(f32::INFINITY, 0.0),
            color: Vec3::ONE,
        },
        Splat {
            point: Vec2::splat(0.5),
            force: Vec2::X,
            color: Vec3::new(0.0, f32::NAN, 0.0),
        },
    ] {
        assert!(!sim.splat(&splat).unwrap());
    }
    assert!(sim.read(FieldKind::Velocity).unwrap().is_zero());
    assert!(sim.read(FieldKind::Dye).unwrap().is_zero());
}

#[test]
fn test_still_pointers_do_not_inject() {
    let mut sim = small_simulation();

    let mut still = pointer(2, Vec2::new(300.0, 0.0));
    still.moved = false;

    assert_eq!(sim.inject(&[still]).unwrap(), 0);
    assert!(sim.read(FieldKind::Velocity).unwrap().is_zero());
    assert!(sim.read(FieldKind::Dye).unwrap().is_zero());
}

#[test]
fn test_released_pointer_with_pending_movement_injects() {
    let mut sim = small_simulation();

    let mut released = pointer(1, Vec2::new(300.0, 0.0));
    released.active = false;
    let mut still = pointer(2, Vec2::new(300.0, 0.0));
    still.moved = false;

    assert_eq!(sim.inject(&[released, still]).unwrap(), 1);
    assert!(!sim.read(FieldKind::Velocity).unwrap().is_zero());
    assert!(!sim.read(FieldKind::Dye).unwrap().is_zero());
}

#[test]
fn test_oversized_force_is_clamped_before_drawing() {
    let params = SimulationParameters {
        sim_resolution: 32,
        dye_resolution: 32,
        max_splat_force: 100.0,
        ..SimulationParameters::default()
    };
    let mut sim = Simulation::new(CpuBackend::new(), params, SurfaceSize::new(32, 32)).unwrap();
    sim.splat(&Splat {
        point: Vec2::new(0.5, 0.5),
        force: Vec2::new(1.0e6, 0.0),
        color: Vec3::ZERO,
    })
    .unwrap();

    let velocity = sim.read(FieldKind::Velocity).unwrap();
    let peak = velocity.data.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    assert!(peak <= 100.0 + 1e-3, "peak {peak}");
    assert!(peak > 50.0);
}
