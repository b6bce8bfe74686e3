//! Session configuration and host surface description.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters fixed for the lifetime of a simulation session.
///
/// Every key is optional in JSON; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationParameters {
    /// Texels along the short side of the velocity/pressure grid.
    pub sim_resolution: u32,
    pub dye_resolution: u32,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    pub pressure_iterations: u32,
    /// Splat falloff, in hundredths of the normalized surface.
    pub splat_radius: f32,
    /// Gain from a pointer delta (normalized units per frame) to a velocity impulse.
    pub splat_force: f32,
    pub max_splat_force: f32,
    /// Upper bound on one integration step, in seconds.
    pub dt_ceiling: f32,
    /// Frames between NaN/Inf sweeps; 0 disables them.
    pub nan_check_interval: u32,
    pub color_seed: Option<u64>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 0.98,
            velocity_dissipation: 0.99,
            pressure_iterations: 20,
            splat_radius: 0.25,
            splat_force: 6000.0,
            max_splat_force: 20000.0,
            dt_ceiling: 1.0 / 60.0,
            nan_check_interval: 60,
            color_seed: None,
        }
    }
}

impl SimulationParameters {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Caps the dye grid at the short side of `surface` in device pixels;
    /// finer dye than the surface can show is wasted work.
    pub fn fitted_to(&self, surface: &SurfaceSize) -> Self {
        let short_side = surface.width.min(surface.height).max(1);
        Self {
            dye_resolution: self.dye_resolution.min(short_side),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_resolution == 0 {
            return Err(invalid("simResolution", "must be at least 1"));
        }
        if self.dye_resolution == 0 {
            return Err(invalid("dyeResolution", "must be at least 1"));
        }
        if self.pressure_iterations == 0 {
            return Err(invalid("pressureIterations", "must be at least 1"));
        }
        check_unit("densityDissipation", self.density_dissipation)?;
        check_unit("velocityDissipation", self.velocity_dissipation)?;
        check_positive("splatRadius", self.splat_radius)?;
        check_positive("dtCeiling", self.dt_ceiling)?;
        check_positive("maxSplatForce", self.max_splat_force)?;
        if !self.splat_force.is_finite() {
            return Err(invalid("splatForce", "must be finite"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, format!("{value} is outside [0, 1]")))
    }
}

fn check_positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("{value} must be a positive number")))
    }
}

/// Drawable area supplied by the host, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            device_pixel_ratio: 1.0,
        }
    }

    /// Converts a size in logical (CSS/egui point) units to device pixels.
    pub fn from_logical(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        let ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self {
            width: ((width * ratio).round() as u32).max(1),
            height: ((height * ratio).round() as u32).max(1),
            device_pixel_ratio: ratio,
        }
    }

    /// Rejects sizes that did not come through `new`/`from_logical`, such
    /// as a deserialized zero side.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid(
                "surface",
                format!("{}x{} has a zero side", self.width, self.height),
            ));
        }
        check_positive("devicePixelRatio", self.device_pixel_ratio)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}
