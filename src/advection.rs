use crate::backend::Backend;
use crate::error::Result;
use crate::field::{DoubleBuffer, Field};
use crate::shaders::StageUniforms;

/// Semi-Lagrangian transport of `field` along `velocity`, scaled by
/// `dissipation`, followed by a swap of `field`.
///
/// `velocity == None` advects the field along itself (velocity
/// self-advection). Velocity is in texels of its own grid per second.
pub fn advect<B: Backend>(
    backend: &mut B,
    program: &B::Program,
    field: &mut DoubleBuffer<Field<B::Texture>>,
    velocity: Option<&Field<B::Texture>>,
    dt: f32,
    dissipation: f32,
) -> Result<()> {
    let (read, write) = field.read_write();
    let velocity = velocity.unwrap_or(read);
    let uniforms = StageUniforms::advect(velocity.texel_size(), dt, dissipation);
    backend.draw(program, &uniforms, &[velocity, read], write)?;
    field.swap();
    Ok(())
}
