//! Pointer forcing: Gaussian splats into velocity and dye.

use crate::backend::Backend;
use crate::error::Result;
use crate::field::{DoubleBuffer, Field};
use crate::pointer::{PointerState, Splat};
use crate::shaders::StageUniforms;
use glam::{Vec2, Vec4};

/// Splat constants for one frame, derived from the session parameters and
/// the current surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplatSettings {
    /// Radius as passed to the splat program.
    pub radius: f32,
    pub aspect_ratio: f32,
    pub splat_force: f32,
    pub max_splat_force: f32,
}

impl SplatSettings {
    pub fn new(splat_radius: f32, aspect_ratio: f32, splat_force: f32, max_splat_force: f32) -> Self {
        Self {
            radius: corrected_radius(splat_radius, aspect_ratio),
            aspect_ratio,
            splat_force,
            max_splat_force,
        }
    }
}

/// The configured radius is in hundredths; wide surfaces widen it so the
/// splat keeps its size relative to the short side.
pub fn corrected_radius(splat_radius: f32, aspect_ratio: f32) -> f32 {
    let radius = splat_radius / 100.0;
    if aspect_ratio > 1.0 {
        radius * aspect_ratio
    } else {
        radius
    }
}

/// Caps the impulse length at `max`.
pub fn clamp_force(force: Vec2, max: f32) -> Vec2 {
    let length = force.length();
    if length > max && length > 0.0 {
        force * (max / length)
    } else {
        force
    }
}

/// Draws one splat into `buffer` and swaps it.
fn splat_field<B: Backend>(
    backend: &mut B,
    program: &B::Program,
    buffer: &mut DoubleBuffer<Field<B::Texture>>,
    point: Vec2,
    value: Vec4,
    settings: &SplatSettings,
) -> Result<()> {
    let uniforms = StageUniforms::splat(point, settings.radius, settings.aspect_ratio, value);
    let (read, write) = buffer.read_write();
    backend.draw(program, &uniforms, &[read], write)?;
    buffer.swap();
    Ok(())
}

/// Applies one splat to velocity then dye. Returns `false` when the splat
/// was dropped for carrying non-finite values.
pub fn splat<B: Backend>(
    backend: &mut B,
    program: &B::Program,
    velocity: &mut DoubleBuffer<Field<B::Texture>>,
    dye: &mut DoubleBuffer<Field<B::Texture>>,
    splat: &Splat,
    settings: &SplatSettings,
) -> Result<bool> {
    if !(splat.point.is_finite() && splat.force.is_finite() && splat.color.is_finite()) {
        log::warn!("dropping non-finite splat at {:?}", splat.point);
        return Ok(false);
    }

    let force = clamp_force(splat.force, settings.max_splat_force);
    splat_field(backend, program, velocity, splat.point, force.extend(0.0).extend(0.0), settings)?;
    splat_field(backend, program, dye, splat.point, splat.color.extend(0.0), settings)?;
    Ok(true)
}

/// Splats every pointer that moved since the last frame, including one
/// released during it. Returns the number of splats applied.
pub fn inject<B: Backend>(
    backend: &mut B,
    program: &B::Program,
    velocity: &mut DoubleBuffer<Field<B::Texture>>,
    dye: &mut DoubleBuffer<Field<B::Texture>>,
    pointers: &[PointerState],
    settings: &SplatSettings,
) -> Result<usize> {
    let mut applied = 0;
    for pointer in pointers.iter().filter(|p| p.moved) {
        let splat_data = pointer.to_splat(settings.splat_force);
        if splat(backend, program, velocity, dye, &splat_data, settings)? {
            applied += 1;
        }
    }
    Ok(applied)
}
