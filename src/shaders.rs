//! WGSL sources for the six simulation stages.
//!
//! Every stage is a fragment program drawn over a full-screen quad. The
//! shared vertex source also carries the uniform block and the texel
//! helpers, so fragment sources only declare their input fields.
//! Sampling is done with `textureLoad` (bilinear, clamp-to-edge) which keeps
//! 32-bit float fields usable without filterable-float support, and lets the
//! CPU backend mirror the exact same arithmetic.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Display,
    Splat,
    Advect,
    Divergence,
    Pressure,
    GradientSubtract,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Display,
        Stage::Splat,
        Stage::Advect,
        Stage::Divergence,
        Stage::Pressure,
        Stage::GradientSubtract,
    ];

    /// Number of fields bound at `@binding(1..)`, in binding order.
    pub fn input_count(self) -> usize {
        match self {
            Stage::Display | Stage::Splat | Stage::Divergence => 1,
            Stage::Advect | Stage::Pressure | Stage::GradientSubtract => 2,
        }
    }

    pub fn fragment_source(self) -> &'static str {
        match self {
            Stage::Display => DISPLAY_SHADER,
            Stage::Splat => SPLAT_SHADER,
            Stage::Advect => ADVECTION_SHADER,
            Stage::Divergence => DIVERGENCE_SHADER,
            Stage::Pressure => PRESSURE_SHADER,
            Stage::GradientSubtract => GRADIENT_SUBTRACT_SHADER,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Display => "display",
            Stage::Splat => "splat",
            Stage::Advect => "advect",
            Stage::Divergence => "divergence",
            Stage::Pressure => "pressure",
            Stage::GradientSubtract => "gradient_subtract",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Uniform block shared by every stage (`struct StageUniforms` in WGSL).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StageUniforms {
    /// Texel size of the grid the stage steps through (the velocity grid for advection).
    pub texel_size: [f32; 2],
    pub point: [f32; 2],
    pub value: [f32; 4],
    pub aspect_ratio: f32,
    pub radius: f32,
    pub dt: f32,
    pub dissipation: f32,
}

impl StageUniforms {
    pub fn display() -> Self {
        Self::default()
    }

    pub fn splat(point: Vec2, radius: f32, aspect_ratio: f32, value: Vec4) -> Self {
        Self {
            point: point.to_array(),
            value: value.to_array(),
            aspect_ratio,
            radius,
            ..Self::default()
        }
    }

    pub fn advect(velocity_texel_size: Vec2, dt: f32, dissipation: f32) -> Self {
        Self {
            texel_size: velocity_texel_size.to_array(),
            dt,
            dissipation,
            ..Self::default()
        }
    }

    pub fn grid(texel_size: Vec2) -> Self {
        Self {
            texel_size: texel_size.to_array(),
            ..Self::default()
        }
    }
}

pub const VERTEX_SHADER: &str = r"
struct StageUniforms {
    texel_size: vec2<f32>,
    point: vec2<f32>,
    value: vec4<f32>,
    aspect_ratio: f32,
    radius: f32,
    dt: f32,
    dissipation: f32,
};

@group(0) @binding(0)
var<uniform> params: StageUniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

// Unit quad as a 4-vertex triangle strip; uv.y grows downward like texture rows.
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    let corner = vec2<f32>(f32(vertex_index & 1u), f32((vertex_index >> 1u) & 1u));
    var out: VertexOutput;
    out.uv = corner;
    out.clip_position = vec4<f32>(corner.x * 2.0 - 1.0, 1.0 - corner.y * 2.0, 0.0, 1.0);
    return out;
}

fn texel(tex: texture_2d<f32>, coord: vec2<i32>) -> vec4<f32> {
    let size = vec2<i32>(textureDimensions(tex));
    let clamped = clamp(coord, vec2<i32>(0, 0), size - vec2<i32>(1, 1));
    return textureLoad(tex, clamped, 0);
}

fn texel_coord(tex: texture_2d<f32>, uv: vec2<f32>) -> vec2<i32> {
    return vec2<i32>(floor(uv * vec2<f32>(textureDimensions(tex))));
}

fn sample_bilinear(tex: texture_2d<f32>, uv: vec2<f32>) -> vec4<f32> {
    let st = uv * vec2<f32>(textureDimensions(tex)) - vec2<f32>(0.5, 0.5);
    let origin = floor(st);
    let f = st - origin;
    let c = vec2<i32>(origin);
    let a = texel(tex, c);
    let b = texel(tex, c + vec2<i32>(1, 0));
    let d = texel(tex, c + vec2<i32>(0, 1));
    let e = texel(tex, c + vec2<i32>(1, 1));
    let top = mix(a, b, vec4<f32>(f.x));
    let bottom = mix(d, e, vec4<f32>(f.x));
    return mix(top, bottom, vec4<f32>(f.y));
}
";

pub const DISPLAY_SHADER: &str = r"
@group(0) @binding(1)
var dye_field: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = sample_bilinear(dye_field, in.uv).rgb;
    return vec4<f32>(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
";

pub const SPLAT_SHADER: &str = r"
@group(0) @binding(1)
var base_field: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var offset = in.uv - params.point;
    offset.x = offset.x * params.aspect_ratio;
    let weight = exp(-dot(offset, offset) / params.radius);
    let current = texel(base_field, texel_coord(base_field, in.uv));
    return current + weight * params.value;
}
";

pub const ADVECTION_SHADER: &str = r"
@group(0) @binding(1)
var velocity_field: texture_2d<f32>;

@group(0) @binding(2)
var source_field: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let velocity = sample_bilinear(velocity_field, in.uv).xy;
    let coord = in.uv - params.dt * velocity * params.texel_size;
    return params.dissipation * sample_bilinear(source_field, coord);
}
";

pub const DIVERGENCE_SHADER: &str = r"
@group(0) @binding(1)
var velocity_field: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = texel_coord(velocity_field, in.uv);
    let l = texel(velocity_field, c - vec2<i32>(1, 0)).x;
    let r = texel(velocity_field, c + vec2<i32>(1, 0)).x;
    let b = texel(velocity_field, c - vec2<i32>(0, 1)).y;
    let t = texel(velocity_field, c + vec2<i32>(0, 1)).y;
    let divergence = 0.5 * ((r - l) + (t - b));
    return vec4<f32>(divergence, 0.0, 0.0, 1.0);
}
";

pub const PRESSURE_SHADER: &str = r"
@group(0) @binding(1)
var pressure_field: texture_2d<f32>;

@group(0) @binding(2)
var divergence_field: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = texel_coord(pressure_field, in.uv);
    let l = texel(pressure_field, c - vec2<i32>(1, 0)).x;
    let r = texel(pressure_field, c + vec2<i32>(1, 0)).x;
    let b = texel(pressure_field, c - vec2<i32>(0, 1)).x;
    let t = texel(pressure_field, c + vec2<i32>(0, 1)).x;
    let divergence = texel(divergence_field, c).x;
    let pressure = (l + r + b + t - divergence) * 0.25;
    return vec4<f32>(pressure, 0.0, 0.0, 1.0);
}
";

pub const GRADIENT_SUBTRACT_SHADER: &str = r"
@group(0) @binding(1)
var pressure_field: texture_2d<f32>;

@group(0) @binding(2)
var velocity_field: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = texel_coord(pressure_field, in.uv);
    let l = texel(pressure_field, c - vec2<i32>(1, 0)).x;
    let r = texel(pressure_field, c + vec2<i32>(1, 0)).x;
    let b = texel(pressure_field, c - vec2<i32>(0, 1)).x;
    let t = texel(pressure_field, c + vec2<i32>(0, 1)).x;
    let velocity = texel(velocity_field, c).xy - 0.5 * vec2<f32>(r - l, t - b);
    return vec4<f32>(velocity, 0.0, 1.0);
}
";
