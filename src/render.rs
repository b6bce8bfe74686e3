use crate::field::FieldSnapshot;
use image::{ImageBuffer, Rgb, RgbImage, RgbaImage};

pub struct Renderer {
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    fn source_texel<'a>(&self, snapshot: &'a FieldSnapshot, x: u32, y: u32) -> &'a [f32] {
        let sx = ((x as u64 * snapshot.width as u64) / self.width as u64) as u32;
        let sy = ((y as u64 * snapshot.height as u64) / self.height as u64) as u32;
        snapshot.texel(sx.min(snapshot.width - 1), sy.min(snapshot.height - 1))
    }

    pub fn render_dye(&self, dye: &FieldSnapshot) -> RgbImage {
        let mut img = ImageBuffer::new(self.width, self.height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let texel = self.source_texel(dye, x, y);
            let channel = |c: usize| {
                let v = texel.get(c).copied().unwrap_or(0.0);
                if v.is_finite() {
                    (v.clamp(0.0, 1.0) * 255.0) as u8
                } else {
                    0
                }
            };
            *pixel = Rgb([channel(0), channel(1), channel(2)]);
        }
        img
    }

    /// Velocity as color: red for |x|, green for |y|, normalized to the
    /// largest component in the field.
    pub fn render_velocity(&self, velocity: &FieldSnapshot) -> RgbImage {
        let peak = velocity
            .data
            .iter()
            .filter(|v| v.is_finite())
            .fold(0.0f32, |m, v| m.max(v.abs()))
            .max(f32::EPSILON);

        let mut img = ImageBuffer::new(self.width, self.height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let texel = self.source_texel(velocity, x, y);
            let vel_x = texel.first().copied().unwrap_or(0.0);
            let vel_y = texel.get(1).copied().unwrap_or(0.0);
            let r = ((vel_x.abs() / peak * 255.0).min(255.0)) as u8;
            let g = ((vel_y.abs() / peak * 255.0).min(255.0)) as u8;
            *pixel = Rgb([r, g, 128]);
        }
        img
    }

    pub fn render_display(&self, display: &FieldSnapshot) -> Option<RgbaImage> {
        RgbaImage::from_raw(display.width, display.height, display.to_rgba8())
    }
}
