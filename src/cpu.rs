//! Software backend: runs the stage programs texel by texel.
//!
//! Each kernel below is the Rust twin of the WGSL fragment in `shaders.rs`,
//! sampled through the same clamp-to-edge bilinear rules, so results match
//! the GPU path up to float rounding.

use crate::backend::Backend;
use crate::error::{FluidError, Result};
use crate::field::{Channels, Field, FieldDesc, FieldSnapshot};
use crate::program::link_source;
use crate::shaders::{Stage, StageUniforms};
use glam::{IVec2, Vec2, Vec4};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

#[derive(Debug, Clone)]
pub struct CpuTexture {
    texels: Vec<Vec4>,
}

#[derive(Debug, Clone, Copy)]
pub struct CpuProgram {
    stage: Stage,
}

impl CpuProgram {
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

#[derive(Debug)]
pub struct CpuBackend {
    max_texture_dimension: u32,
    live_textures: usize,
    draw_calls: u64,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::with_max_texture_dimension(DEFAULT_MAX_TEXTURE_DIMENSION)
    }

    /// Backend that refuses textures larger than `limit` on either side.
    pub fn with_max_texture_dimension(limit: u32) -> Self {
        Self {
            max_texture_dimension: limit,
            live_textures: 0,
            draw_calls: 0,
        }
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }
}

impl Backend for CpuBackend {
    type Texture = CpuTexture;
    type Program = CpuProgram;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }

    fn create_texture(&mut self, desc: &FieldDesc) -> Result<CpuTexture> {
        let limit = self.max_texture_dimension;
        if desc.width == 0 || desc.height == 0 || desc.width > limit || desc.height > limit {
            return Err(FluidError::ResourceExhausted {
                width: desc.width,
                height: desc.height,
                limit,
            });
        }
        self.live_textures += 1;
        Ok(CpuTexture {
            texels: vec![Vec4::ZERO; desc.texel_count()],
        })
    }

    fn compile(&mut self, stage: Stage, vertex_source: &str, fragment_source: &str) -> Result<CpuProgram> {
        link_source(stage, vertex_source, fragment_source)?;
        Ok(CpuProgram { stage })
    }

    fn draw(
        &mut self,
        program: &CpuProgram,
        uniforms: &StageUniforms,
        inputs: &[&Field<CpuTexture>],
        target: &mut Field<CpuTexture>,
    ) -> Result<()> {
        let stage = program.stage;
        if inputs.len() != stage.input_count() {
            return Err(FluidError::BindingMismatch {
                stage,
                expected: stage.input_count(),
                got: inputs.len(),
            });
        }

        let samplers: Vec<Sampler<'_>> = inputs.iter().map(|field| Sampler::new(field)).collect();
        let width = target.width() as usize;
        let height = target.height() as usize;
        let channels = target.channels();
        let u = *uniforms;

        let shade_row = |(y, row): (usize, &mut [Vec4])| {
            for (x, out) in row.iter_mut().enumerate() {
                let uv = Vec2::new(
                    (x as f32 + 0.5) / width as f32,
                    (y as f32 + 0.5) / height as f32,
                );
                *out = store(shade(stage, uv, &samplers, &u), channels);
            }
        };

        let texels = &mut target.texture_mut().texels;
        #[cfg(not(target_arch = "wasm32"))]
        texels.par_chunks_mut(width).enumerate().for_each(shade_row);
        #[cfg(target_arch = "wasm32")]
        texels.chunks_mut(width).enumerate().for_each(shade_row);

        self.draw_calls += 1;
        Ok(())
    }

    fn clear(&mut self, field: &mut Field<CpuTexture>) -> Result<()> {
        field.texture_mut().texels.fill(Vec4::ZERO);
        Ok(())
    }

    fn read(&mut self, field: &Field<CpuTexture>) -> Result<FieldSnapshot> {
        let channels = field.channels().count();
        let mut snapshot = FieldSnapshot::zeroed(field.width(), field.height(), channels);
        for (chunk, texel) in snapshot
            .data
            .chunks_mut(channels)
            .zip(field.texture().texels.iter())
        {
            chunk.copy_from_slice(&texel.to_array()[..channels]);
        }
        Ok(snapshot)
    }

    fn write(&mut self, field: &mut Field<CpuTexture>, data: &[f32]) -> Result<()> {
        let channels = field.channels();
        let count = channels.count();
        let expected = field.desc().texel_count() * count;
        if data.len() != expected {
            return Err(FluidError::Readback(format!(
                "upload to {} expects {expected} values, got {}",
                field.desc().label,
                data.len()
            )));
        }
        for (texel, chunk) in field.texture_mut().texels.iter_mut().zip(data.chunks(count)) {
            let mut values = [0.0; 4];
            values[..count].copy_from_slice(chunk);
            *texel = store(Vec4::from_array(values), channels);
        }
        Ok(())
    }

    fn release(&mut self, field: Field<CpuTexture>) {
        drop(field.into_texture());
        self.live_textures = self.live_textures.saturating_sub(1);
    }
}

/// Drops what the matching GPU format would not keep.
fn store(value: Vec4, channels: Channels) -> Vec4 {
    match channels {
        Channels::Scalar => Vec4::new(value.x, 0.0, 0.0, 0.0),
        Channels::Vector => Vec4::new(value.x, value.y, 0.0, 0.0),
        Channels::Color => Vec4::new(value.x, value.y, value.z, 0.0),
        Channels::Rgba => {
            let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() / 255.0;
            Vec4::new(quantize(value.x), quantize(value.y), quantize(value.z), quantize(value.w))
        }
    }
}

struct Sampler<'a> {
    texels: &'a [Vec4],
    size: IVec2,
}

impl<'a> Sampler<'a> {
    fn new(field: &'a Field<CpuTexture>) -> Self {
        Self {
            texels: &field.texture().texels,
            size: IVec2::new(field.width() as i32, field.height() as i32),
        }
    }

    fn texel(&self, coord: IVec2) -> Vec4 {
        let c = coord.clamp(IVec2::ZERO, self.size - IVec2::ONE);
        self.texels[(c.y * self.size.x + c.x) as usize]
    }

    fn texel_coord(&self, uv: Vec2) -> IVec2 {
        (uv * self.size.as_vec2()).floor().as_ivec2()
    }

    fn bilinear(&self, uv: Vec2) -> Vec4 {
        let st = uv * self.size.as_vec2() - Vec2::splat(0.5);
        let origin = st.floor();
        let f = st - origin;
        let c = origin.as_ivec2();
        let a = self.texel(c);
        let b = self.texel(c + IVec2::new(1, 0));
        let d = self.texel(c + IVec2::new(0, 1));
        let e = self.texel(c + IVec2::new(1, 1));
        let top = a.lerp(b, f.x);
        let bottom = d.lerp(e, f.x);
        top.lerp(bottom, f.y)
    }

    /// Left, right, bottom and top neighbours of `c`.
    fn neighbours(&self, c: IVec2) -> [Vec4; 4] {
        [
            self.texel(c - IVec2::new(1, 0)),
            self.texel(c + IVec2::new(1, 0)),
            self.texel(c - IVec2::new(0, 1)),
            self.texel(c + IVec2::new(0, 1)),
        ]
    }
}

fn shade(stage: Stage, uv: Vec2, inputs: &[Sampler<'_>], u: &StageUniforms) -> Vec4 {
    match stage {
        Stage::Display => {
            let color = inputs[0].bilinear(uv).truncate().clamp(glam::Vec3::ZERO, glam::Vec3::ONE);
            color.extend(1.0)
        }
        Stage::Splat => {
            let mut offset = uv - Vec2::from_array(u.point);
            offset.x *= u.aspect_ratio;
            let weight = (-offset.dot(offset) / u.radius).exp();
            let base = &inputs[0];
            base.texel(base.texel_coord(uv)) + weight * Vec4::from_array(u.value)
        }
        Stage::Advect => {
            let velocity = inputs[0].bilinear(uv).truncate().truncate();
            let coord = uv - u.dt * velocity * Vec2::from_array(u.texel_size);
            u.dissipation * inputs[1].bilinear(coord)
        }
        Stage::Divergence => {
            let velocity = &inputs[0];
            let [l, r, b, t] = velocity.neighbours(velocity.texel_coord(uv));
            let divergence = 0.5 * ((r.x - l.x) + (t.y - b.y));
            Vec4::new(divergence, 0.0, 0.0, 1.0)
        }
        Stage::Pressure => {
            let pressure = &inputs[0];
            let c = pressure.texel_coord(uv);
            let [l, r, b, t] = pressure.neighbours(c);
            let divergence = inputs[1].texel(c).x;
            Vec4::new((l.x + r.x + b.x + t.x - divergence) * 0.25, 0.0, 0.0, 1.0)
        }
        Stage::GradientSubtract => {
            let pressure = &inputs[0];
            let c = pressure.texel_coord(uv);
            let [l, r, b, t] = pressure.neighbours(c);
            let velocity =
                inputs[1].texel(c).truncate().truncate() - 0.5 * Vec2::new(r.x - l.x, t.x - b.x);
            Vec4::new(velocity.x, velocity.y, 0.0, 1.0)
        }
    }
}
