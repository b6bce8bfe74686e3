use glam::Vec2;
use inkflow::analysis::{divergence_at, mean_abs_divergence, mean_abs_vorticity};
use inkflow::{AnalysisRecorder, FieldMetrics, FieldSnapshot, FluidMetrics};

fn velocity_field(width: u32, height: u32, f: impl Fn(u32, u32) -> [f32; 2]) -> FieldSnapshot {
    let mut snapshot = FieldSnapshot::zeroed(width, height, 2);
    for y in 0..height {
        for x in 0..width {
            snapshot.texel_mut(x, y).copy_from_slice(&f(x, y));
        }
    }
    snapshot
}

#[test]
fn test_metrics_of_single_blob() {
    let mut dye = FieldSnapshot::zeroed(4, 4, 3);
    dye.texel_mut(1, 2).copy_from_slice(&[0.5, 0.25, 0.25]);

    let metrics = FieldMetrics::from_snapshot(&dye);
    assert_eq!(metrics.total, 1.0);
    assert_eq!(metrics.centroid, Some(Vec2::new(0.375, 0.625)));
    assert_eq!(metrics.non_finite, 0);
    assert!((metrics.mean_abs - 0.5 / 16.0).abs() < 1e-7);

    assert_eq!(FieldMetrics::from_snapshot(&FieldSnapshot::zeroed(4, 4, 3)).centroid, None);
}

#[test]
fn test_non_finite_texels_are_counted_not_summed() {
    let mut dye = FieldSnapshot::zeroed(2, 2, 3);
    dye.texel_mut(0, 0)[0] = f32::NAN;
    dye.texel_mut(1, 1)[2] = 2.0;

    let metrics = FieldMetrics::from_snapshot(&dye);
    assert_eq!(metrics.non_finite, 1);
    assert_eq!(metrics.total, 2.0);
}

#[test]
fn test_divergence_stencil() {
    // vx = x: interior divergence 1, clamped edges see half.
    let velocity = velocity_field(4, 4, |x, _| [x as f32, 0.0]);
    assert_eq!(divergence_at(&velocity, 1, 1), 1.0);
    assert_eq!(divergence_at(&velocity, 0, 1), 0.5);
    assert_eq!(divergence_at(&velocity, 3, 1), 0.5);
    assert!((mean_abs_divergence(&velocity) - 0.75).abs() < 1e-6);

    let uniform = velocity_field(4, 4, |_, _| [2.0, -1.0]);
    assert_eq!(mean_abs_divergence(&uniform), 0.0);
    assert_eq!(mean_abs_vorticity(&uniform), 0.0);
}

#[test]
fn test_shear_has_vorticity_but_no_divergence() {
    let shear = velocity_field(8, 8, |_, y| [y as f32, 0.0]);
    assert_eq!(mean_abs_divergence(&shear), 0.0);
    assert!(mean_abs_vorticity(&shear) > 0.5);
}

#[test]
fn test_recorder_reports_mass_change() {
    let velocity = FieldSnapshot::zeroed(2, 2, 2);
    let mut full = FieldSnapshot::zeroed(2, 2, 3);
    full.data.fill(1.0);
    let mut half = FieldSnapshot::zeroed(2, 2, 3);
    half.data.fill(0.5);

    let mut recorder = AnalysisRecorder::new();
    assert_eq!(recorder.mass_change_percent(), None);
    recorder.metrics_history.push(FluidMetrics::from_snapshots(1, &full, &velocity));
    recorder.metrics_history.push(FluidMetrics::from_snapshots(2, &half, &velocity));

    assert_eq!(recorder.first().unwrap().frame, 1);
    assert_eq!(recorder.last().unwrap().frame, 2);
    assert_eq!(recorder.mass_change_percent(), Some(-50.0));
    assert_eq!(recorder.last().unwrap().kinetic_energy, 0.0);
}
