#![cfg(feature = "cpu")]

use inkflow::advection::advect;
use inkflow::field::{self, create_double_buffer};
use inkflow::program::ProgramLibrary;
use inkflow::{Backend, Channels, CpuBackend, FieldDesc};

const SIZE: u32 = 16;

fn pattern(x: u32, y: u32) -> [f32; 3] {
    [
        ((x * 7 + y * 3) % 11) as f32 / 10.0,
        ((x + y) % 5) as f32 / 4.0,
        if x == y { 1.0 } else { 0.25 },
    ]
}

#[test]
fn test_dissipation_is_exponential_decay() {
    let mut backend = CpuBackend::new();
    let programs = ProgramLibrary::compile(&mut backend).unwrap();

    let velocity = field::allocate(&mut backend, FieldDesc::new("velocity", SIZE, SIZE, Channels::Vector)).unwrap();
    let mut dye = create_double_buffer(&mut backend, FieldDesc::new("dye", SIZE, SIZE, Channels::Color)).unwrap();

    let initial: Vec<f32> = (0..SIZE)
        .flat_map(|y| (0..SIZE).flat_map(move |x| pattern(x, y)))
        .collect();
    backend.write(dye.read_mut(), &initial).unwrap();

    let dissipation: f32 = 0.9;
    let steps = 10;
    for _ in 0..steps {
        advect(&mut backend, &programs.advect, &mut dye, Some(&velocity), 0.016, dissipation).unwrap();
    }

    let result = backend.read(dye.read()).unwrap();
    let factor = dissipation.powi(steps);
    for (got, start) in result.data.iter().zip(initial.iter()) {
        let expected = start * factor;
        assert!(
            (got - expected).abs() <= 1e-5 * start.abs().max(1.0),
            "expected {expected}, got {got}"
        );
    }
}

#[test]
fn test_uniform_velocity_shifts_by_one_texel() {
    let mut backend = CpuBackend::new();
    let programs = ProgramLibrary::compile(&mut backend).unwrap();

    // One texel per second to the right.
    let mut velocity = field::allocate(&mut backend, FieldDesc::new("velocity", SIZE, SIZE, Channels::Vector)).unwrap();
    let flow: Vec<f32> = (0..SIZE * SIZE).flat_map(|_| [1.0, 0.0]).collect();
    backend.write(&mut velocity, &flow).unwrap();

    let mut dye = create_double_buffer(&mut backend, FieldDesc::new("dye", SIZE, SIZE, Channels::Scalar)).unwrap();
    let column: Vec<f32> = (0..SIZE)
        .flat_map(|_| (0..SIZE).map(|x| if x == 5 { 1.0 } else { 0.0 }))
        .collect();
    backend.write(dye.read_mut(), &column).unwrap();

    advect(&mut backend, &programs.advect, &mut dye, Some(&velocity), 1.0, 1.0).unwrap();
    let result = backend.read(dye.read()).unwrap();

    for y in 0..SIZE {
        for x in 0..SIZE {
            let expected = if x == 6 { 1.0 } else { 0.0 };
            assert!(
                (result.texel(x, y)[0] - expected).abs() < 1e-5,
                "texel ({x}, {y}) = {}",
                result.texel(x, y)[0]
            );
        }
    }
}

#[test]
fn test_self_advection_with_zero_velocity_only_dissipates() {
    let mut backend = CpuBackend::new();
    let programs = ProgramLibrary::compile(&mut backend).unwrap();

    let mut velocity = create_double_buffer(&mut backend, FieldDesc::new("velocity", 8, 8, Channels::Vector)).unwrap();
    advect(&mut backend, &programs.advect, &mut velocity, None, 0.016, 0.5).unwrap();
    assert!(backend.read(velocity.read()).unwrap().is_zero());

    let mut uniform = create_double_buffer(&mut backend, FieldDesc::new("velocity", 8, 8, Channels::Vector)).unwrap();
    // Constant flow advects onto itself unchanged apart from dissipation.
    backend.write(uniform.read_mut(), &[2.0; 128]).unwrap();
    advect(&mut backend, &programs.advect, &mut uniform, None, 0.016, 0.5).unwrap();
    let result = backend.read(uniform.read()).unwrap();
    assert!(result.data.iter().all(|&v| (v - 1.0).abs() < 1e-6));
}

#[test]
fn test_dye_at_higher_resolution_uses_velocity_texel_size() {
    let mut backend = CpuBackend::new();
    let programs = ProgramLibrary::compile(&mut backend).unwrap();

    // Velocity of one sim texel per second on an 8-wide grid moves 1/8 of
    // the surface, which is four texels of a 32-wide dye grid.
    let mut velocity = field::allocate(&mut backend, FieldDesc::new("velocity", 8, 8, Channels::Vector)).unwrap();
    let flow: Vec<f32> = (0..64).flat_map(|_| [1.0, 0.0]).collect();
    backend.write(&mut velocity, &flow).unwrap();

    let mut dye = create_double_buffer(&mut backend, FieldDesc::new("dye", 32, 32, Channels::Scalar)).unwrap();
    let column: Vec<f32> = (0..32)
        .flat_map(|_| (0..32).map(|x| if x == 10 { 1.0 } else { 0.0 }))
        .collect();
    backend.write(dye.read_mut(), &column).unwrap();

    advect(&mut backend, &programs.advect, &mut dye, Some(&velocity), 1.0, 1.0).unwrap();
    let result = backend.read(dye.read()).unwrap();
    assert!((result.texel(14, 16)[0] - 1.0).abs() < 1e-5);
    assert!(result.texel(10, 16)[0].abs() < 1e-5);
}
