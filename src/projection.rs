//! Pressure projection: makes the velocity field (approximately)
//! divergence free.

use crate::backend::Backend;
use crate::error::Result;
use crate::field::{DoubleBuffer, Field};
use crate::program::ProgramLibrary;
use crate::shaders::StageUniforms;

/// Divergence, `iterations` Jacobi sweeps on pressure, then gradient
/// subtraction into velocity.
///
/// Pressure starts from zero on every call, so the result depends only on
/// the velocity field passed in.
pub fn project<B: Backend>(
    backend: &mut B,
    programs: &ProgramLibrary<B::Program>,
    velocity: &mut DoubleBuffer<Field<B::Texture>>,
    pressure: &mut DoubleBuffer<Field<B::Texture>>,
    divergence: &mut Field<B::Texture>,
    iterations: u32,
) -> Result<()> {
    let grid = StageUniforms::grid(velocity.read().texel_size());

    backend.draw(&programs.divergence, &grid, &[velocity.read()], divergence)?;

    backend.clear(pressure.read_mut())?;
    for _ in 0..iterations {
        let (read, write) = pressure.read_write();
        backend.draw(&programs.pressure, &grid, &[read, &*divergence], write)?;
        pressure.swap();
    }

    let (read, write) = velocity.read_write();
    backend.draw(&programs.gradient_subtract, &grid, &[pressure.read(), read], write)?;
    velocity.swap();
    Ok(())
}
