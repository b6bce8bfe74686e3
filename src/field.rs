//! Field storage: backend textures wrapped with their shape, the ping-pong
//! `DoubleBuffer`, and owned CPU snapshots for readback.

use crate::backend::Backend;
use crate::config::{SimulationParameters, SurfaceSize};
use crate::error::{FluidError, Result};
use glam::Vec2;

/// Channel layout of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channels {
    Scalar,
    Vector,
    Color,
    Rgba,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Scalar => 1,
            Channels::Vector => 2,
            Channels::Color => 3,
            Channels::Rgba => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
}

impl FieldDesc {
    pub fn new(label: &'static str, width: u32, height: u32, channels: Channels) -> Self {
        Self {
            label,
            width,
            height,
            channels,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A 2D grid backed by one backend texture. Sampled bilinearly with
/// clamp-to-edge addressing.
#[derive(Debug)]
pub struct Field<T> {
    desc: FieldDesc,
    texture: T,
}

impl<T> Field<T> {
    pub fn new(desc: FieldDesc, texture: T) -> Self {
        Self { desc, texture }
    }

    pub fn desc(&self) -> &FieldDesc {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn channels(&self) -> Channels {
        self.desc.channels
    }

    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.desc.width as f32, 1.0 / self.desc.height as f32)
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    pub fn texture_mut(&mut self) -> &mut T {
        &mut self.texture
    }

    pub fn into_texture(self) -> T {
        self.texture
    }
}

/// Read/write pair of identically shaped fields.
///
/// `swap` flips an index; nothing is copied. The only way to obtain the
/// write side together with the read side is `read_write`, which hands out
/// disjoint borrows, so a draw can never target the field it samples.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    fields: [T; 2],
    read: usize,
}

impl<T> DoubleBuffer<T> {
    pub fn new(read: T, write: T) -> Self {
        Self {
            fields: [read, write],
            read: 0,
        }
    }

    pub fn read(&self) -> &T {
        &self.fields[self.read]
    }

    pub fn write(&self) -> &T {
        &self.fields[1 - self.read]
    }

    pub fn read_mut(&mut self) -> &mut T {
        &mut self.fields[self.read]
    }

    pub fn write_mut(&mut self) -> &mut T {
        &mut self.fields[1 - self.read]
    }

    pub fn read_write(&mut self) -> (&T, &mut T) {
        let (first, second) = self.fields.split_at_mut(1);
        if self.read == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    pub fn into_inner(self) -> [T; 2] {
        self.fields
    }
}

impl<T> DoubleBuffer<Field<T>> {
    pub fn desc(&self) -> &FieldDesc {
        self.read().desc()
    }
}

pub fn allocate<B: Backend>(backend: &mut B, desc: FieldDesc) -> Result<Field<B::Texture>> {
    let texture = backend.create_texture(&desc)?;
    Ok(Field::new(desc, texture))
}

pub fn create_double_buffer<B: Backend>(
    backend: &mut B,
    desc: FieldDesc,
) -> Result<DoubleBuffer<Field<B::Texture>>> {
    let read = allocate(backend, desc)?;
    let write = match allocate(backend, desc) {
        Ok(field) => field,
        Err(err) => {
            backend.release(read);
            return Err(err);
        }
    };
    Ok(DoubleBuffer::new(read, write))
}

/// Grid dimensions for a short-side `resolution` on a surface of the given
/// aspect ratio (width / height).
pub fn grid_size(resolution: u32, aspect_ratio: f32) -> (u32, u32) {
    let aspect = if aspect_ratio < 1.0 {
        1.0 / aspect_ratio
    } else {
        aspect_ratio
    };
    let short = resolution.max(1);
    let long = ((resolution as f32 * aspect).round() as u32).max(1);
    if aspect_ratio > 1.0 {
        (long, short)
    } else {
        (short, long)
    }
}

/// Scales `(width, height)` down so neither side exceeds `limit`.
pub fn clamp_size((width, height): (u32, u32), limit: u32) -> (u32, u32) {
    let largest = width.max(height);
    if largest <= limit || limit == 0 {
        return (width, height);
    }
    let scale = limit as f32 / largest as f32;
    (
        ((width as f32 * scale).floor() as u32).clamp(1, limit),
        ((height as f32 * scale).floor() as u32).clamp(1, limit),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Velocity,
    Dye,
    Pressure,
    Divergence,
    Display,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub sim: (u32, u32),
    pub dye: (u32, u32),
    pub display: (u32, u32),
}

impl FieldLayout {
    pub fn for_surface(params: &SimulationParameters, surface: &SurfaceSize) -> Self {
        let aspect = surface.aspect_ratio();
        Self {
            sim: grid_size(params.sim_resolution, aspect),
            dye: grid_size(params.dye_resolution, aspect),
            display: (surface.width, surface.height),
        }
    }

    pub fn clamped(&self, limit: u32) -> Self {
        Self {
            sim: clamp_size(self.sim, limit),
            dye: clamp_size(self.dye, limit),
            display: clamp_size(self.display, limit),
        }
    }
}

pub struct FieldSet<T> {
    pub velocity: DoubleBuffer<Field<T>>,
    pub dye: DoubleBuffer<Field<T>>,
    pub pressure: DoubleBuffer<Field<T>>,
    pub divergence: Field<T>,
    pub display: Field<T>,
}

impl<T> FieldSet<T> {
    pub fn allocate<B>(backend: &mut B, layout: &FieldLayout) -> Result<Self>
    where
        B: Backend<Texture = T>,
    {
        let (sim_w, sim_h) = layout.sim;
        let (dye_w, dye_h) = layout.dye;
        let (display_w, display_h) = layout.display;

        // Allocate in order and hand everything back on the first failure.
        let mut made: Vec<Field<T>> = Vec::with_capacity(8);
        let descs = [
            FieldDesc::new("velocity_0", sim_w, sim_h, Channels::Vector),
            FieldDesc::new("velocity_1", sim_w, sim_h, Channels::Vector),
            FieldDesc::new("dye_0", dye_w, dye_h, Channels::Color),
            FieldDesc::new("dye_1", dye_w, dye_h, Channels::Color),
            FieldDesc::new("pressure_0", sim_w, sim_h, Channels::Scalar),
            FieldDesc::new("pressure_1", sim_w, sim_h, Channels::Scalar),
            FieldDesc::new("divergence", sim_w, sim_h, Channels::Scalar),
            FieldDesc::new("display", display_w, display_h, Channels::Rgba),
        ];
        for desc in descs {
            match allocate(backend, desc) {
                Ok(field) => made.push(field),
                Err(err) => {
                    for field in made {
                        backend.release(field);
                    }
                    return Err(err);
                }
            }
        }

        let mut fields = made.into_iter();
        let mut next = || {
            fields
                .next()
                .ok_or_else(|| FluidError::UnsupportedBackend("field allocation came up short".into()))
        };
        let velocity = DoubleBuffer::new(next()?, next()?);
        let dye = DoubleBuffer::new(next()?, next()?);
        let pressure = DoubleBuffer::new(next()?, next()?);
        let divergence = next()?;
        let display = next()?;

        log::debug!(
            "allocated fields: sim {}x{}, dye {}x{}, display {}x{}",
            sim_w,
            sim_h,
            dye_w,
            dye_h,
            display_w,
            display_h
        );

        Ok(Self {
            velocity,
            dye,
            pressure,
            divergence,
            display,
        })
    }

    pub fn get(&self, kind: FieldKind) -> &Field<T> {
        match kind {
            FieldKind::Velocity => self.velocity.read(),
            FieldKind::Dye => self.dye.read(),
            FieldKind::Pressure => self.pressure.read(),
            FieldKind::Divergence => &self.divergence,
            FieldKind::Display => &self.display,
        }
    }

    pub fn get_mut(&mut self, kind: FieldKind) -> &mut Field<T> {
        match kind {
            FieldKind::Velocity => self.velocity.read_mut(),
            FieldKind::Dye => self.dye.read_mut(),
            FieldKind::Pressure => self.pressure.read_mut(),
            FieldKind::Divergence => &mut self.divergence,
            FieldKind::Display => &mut self.display,
        }
    }

    pub fn release<B>(self, backend: &mut B)
    where
        B: Backend<Texture = T>,
    {
        let [v0, v1] = self.velocity.into_inner();
        let [d0, d1] = self.dye.into_inner();
        let [p0, p1] = self.pressure.into_inner();
        for field in [v0, v1, d0, d1, p0, p1, self.divergence, self.display] {
            backend.release(field);
        }
    }
}

/// Owned CPU copy of a field, `channels` values per texel, row-major with
/// row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl FieldSnapshot {
    pub fn zeroed(width: u32, height: u32, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0.0; width as usize * height as usize * channels],
        }
    }

    pub fn texel(&self, x: u32, y: u32) -> &[f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn texel_mut(&mut self, x: u32, y: u32) -> &mut [f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &mut self.data[start..start + self.channels]
    }

    /// Normalized coordinates of a texel center.
    pub fn uv(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }

    /// RGBA8 bytes, channels beyond the stored ones filled with 0 (alpha with 255).
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for texel in self.data.chunks(self.channels) {
            for c in 0..3 {
                let v = texel.get(c).copied().unwrap_or(0.0);
                bytes.push((v.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
            let alpha = if self.channels == 4 { texel[3] } else { 1.0 };
            bytes.push((alpha.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
        bytes
    }
}
