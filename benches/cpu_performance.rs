use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use glam::{Vec2, Vec3};
use inkflow::{CpuBackend, PointerState, Simulation, SimulationParameters, Splat, SurfaceSize};

fn seeded_simulation(sim_resolution: u32, dye_resolution: u32) -> Simulation<CpuBackend> {
    let params = SimulationParameters {
        sim_resolution,
        dye_resolution,
        ..SimulationParameters::default()
    };
    let surface = SurfaceSize::new(dye_resolution, dye_resolution);
    let mut sim = Simulation::new(CpuBackend::new(), params, surface).unwrap();

    // Add some initial state
    sim.splat(&Splat {
        point: Vec2::new(0.5, 0.5),
        force: Vec2::new(800.0, 200.0),
        color: Vec3::new(1.0, 0.3, 0.1),
    })
    .unwrap();
    sim
}

fn benchmark_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_step");

    for size in [32u32, 64, 128].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut sim = seeded_simulation(size, size * 2);
            b.iter(|| {
                black_box(sim.step(1.0 / 60.0, &[]).unwrap());
            });
        });
    }
    group.finish();
}

fn benchmark_full_scenario(c: &mut Criterion) {
    c.bench_function("full_64_dye256_20steps", |b| {
        let splat = Splat {
            point: Vec2::new(0.3, 0.5),
            force: Vec2::new(600.0, 0.0),
            color: Vec3::new(0.15, 0.05, 0.0),
        };
        let pointer = PointerState::from_splat(1, &splat, 6000.0);
        b.iter(|| {
            let mut sim = seeded_simulation(64, 256);
            for _ in 0..20 {
                black_box(sim.step(1.0 / 60.0, std::slice::from_ref(&pointer)).unwrap());
            }
            sim.render().unwrap();
        });
    });
}

fn benchmark_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("operations");

    group.bench_function("project", |b| {
        let mut sim = seeded_simulation(128, 256);
        b.iter(|| {
            // 20 Jacobi sweeps plus divergence and gradient passes
            black_box(sim.project().unwrap());
        });
    });

    group.bench_function("advect_velocity", |b| {
        let mut sim = seeded_simulation(128, 256);
        b.iter(|| {
            black_box(sim.advect_velocity(1.0 / 60.0).unwrap());
        });
    });

    group.bench_function("advect_dye", |b| {
        let mut sim = seeded_simulation(128, 512);
        b.iter(|| {
            black_box(sim.advect_dye(1.0 / 60.0).unwrap());
        });
    });

    group.bench_function("splat", |b| {
        let mut sim = seeded_simulation(128, 512);
        let splat = Splat {
            point: Vec2::new(0.4, 0.6),
            force: Vec2::new(10.0, 0.0),
            color: Vec3::splat(0.01),
        };
        b.iter(|| {
            black_box(sim.splat(&splat).unwrap());
        });
    });

    group.bench_function("render", |b| {
        let mut sim = seeded_simulation(128, 512);
        b.iter(|| {
            black_box(sim.render().unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_step, benchmark_full_scenario, benchmark_operations);
criterion_main!(benches);
