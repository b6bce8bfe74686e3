//! The simulation stepper: owns every field and runs the per-frame stage
//! sequence against them.

use crate::advection::advect;
use crate::backend::Backend;
use crate::config::{SimulationParameters, SurfaceSize};
use crate::error::{FluidError, Result};
use crate::field::{FieldKind, FieldLayout, FieldSet, FieldSnapshot};
use crate::injector::{self, SplatSettings};
use crate::pointer::{PointerState, Splat};
use crate::program::ProgramLibrary;
use crate::projection::project;
use crate::shaders::StageUniforms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperState {
    Idle,
    Stepping,
    Suspended,
    Destroyed,
}

pub struct Simulation<B: Backend> {
    backend: B,
    programs: ProgramLibrary<B::Program>,
    fields: Option<FieldSet<B::Texture>>,
    layout: FieldLayout,
    params: SimulationParameters,
    surface: SurfaceSize,
    state: StepperState,
    frame: u64,
}

impl<B: Backend> Simulation<B> {
    /// Compiles every stage program and allocates all fields. Nothing is
    /// kept if either step fails.
    pub fn new(mut backend: B, params: SimulationParameters, surface: SurfaceSize) -> Result<Self> {
        params.validate()?;
        surface.validate()?;
        let programs = ProgramLibrary::compile(&mut backend)?;
        let (fields, layout) = allocate_fields(&mut backend, &params, &surface)?;

        log::info!(
            "simulation ready on {}: sim {}x{}, dye {}x{}, surface {}x{}",
            backend.name(),
            layout.sim.0,
            layout.sim.1,
            layout.dye.0,
            layout.dye.1,
            surface.width,
            surface.height
        );

        Ok(Self {
            backend,
            programs,
            fields: Some(fields),
            layout,
            params,
            surface,
            state: StepperState::Idle,
            frame: 0,
        })
    }

    /// One frame: inject, advect velocity, advect dye, project. Returns
    /// the number of splats applied.
    ///
    /// A suspended simulation ignores the call. `dt` is in seconds and is
    /// clamped to `[0, dt_ceiling]`.
    pub fn step(&mut self, dt: f32, pointers: &[PointerState]) -> Result<usize> {
        match self.state {
            StepperState::Destroyed => return Err(FluidError::Destroyed),
            StepperState::Suspended => return Ok(0),
            StepperState::Idle | StepperState::Stepping => {}
        }
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.params.dt_ceiling)
        } else {
            0.0
        };

        self.state = StepperState::Stepping;
        let result = self.run_stages(dt, pointers);
        self.state = StepperState::Idle;
        let applied = result?;

        self.frame += 1;
        let interval = self.params.nan_check_interval as u64;
        if interval > 0 && self.frame % interval == 0 {
            self.sanitize()?;
        }
        Ok(applied)
    }

    fn run_stages(&mut self, dt: f32, pointers: &[PointerState]) -> Result<usize> {
        let applied = if pointers.is_empty() {
            0
        } else {
            self.inject(pointers)?
        };
        self.advect_velocity(dt)?;
        self.advect_dye(dt)?;
        self.project()?;
        Ok(applied)
    }

    fn splat_settings(&self) -> SplatSettings {
        SplatSettings::new(
            self.params.splat_radius,
            self.surface.aspect_ratio(),
            self.params.splat_force,
            self.params.max_splat_force,
        )
    }

    pub fn inject(&mut self, pointers: &[PointerState]) -> Result<usize> {
        let settings = self.splat_settings();
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        injector::inject(
            &mut self.backend,
            &self.programs.splat,
            &mut fields.velocity,
            &mut fields.dye,
            pointers,
            &settings,
        )
    }

    /// Applies one splat directly, bypassing pointer tracking.
    pub fn splat(&mut self, splat: &Splat) -> Result<bool> {
        let settings = self.splat_settings();
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        injector::splat(
            &mut self.backend,
            &self.programs.splat,
            &mut fields.velocity,
            &mut fields.dye,
            splat,
            &settings,
        )
    }

    pub fn advect_velocity(&mut self, dt: f32) -> Result<()> {
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        advect(
            &mut self.backend,
            &self.programs.advect,
            &mut fields.velocity,
            None,
            dt,
            self.params.velocity_dissipation,
        )
    }

    pub fn advect_dye(&mut self, dt: f32) -> Result<()> {
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        advect(
            &mut self.backend,
            &self.programs.advect,
            &mut fields.dye,
            Some(fields.velocity.read()),
            dt,
            self.params.density_dissipation,
        )
    }

    pub fn project(&mut self) -> Result<()> {
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        project(
            &mut self.backend,
            &self.programs,
            &mut fields.velocity,
            &mut fields.pressure,
            &mut fields.divergence,
            self.params.pressure_iterations,
        )
    }

    pub fn render(&mut self) -> Result<()> {
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        self.backend.draw(
            &self.programs.display,
            &StageUniforms::display(),
            &[fields.dye.read()],
            &mut fields.display,
        )
    }

    /// Reallocates every field for `surface`. An invalid surface is refused
    /// with the current fields intact; an allocation failure leaves the
    /// simulation destroyed.
    pub fn resize(&mut self, surface: SurfaceSize) -> Result<()> {
        if self.fields.is_none() {
            return Err(FluidError::Destroyed);
        }
        // A bad size is refused before the current fields are touched.
        surface.validate()?;
        let old = self.fields.take().ok_or(FluidError::Destroyed)?;
        old.release(&mut self.backend);

        match allocate_fields(&mut self.backend, &self.params, &surface) {
            Ok((fields, layout)) => {
                log::debug!(
                    "resized to {}x{}: sim {}x{}, dye {}x{}",
                    surface.width,
                    surface.height,
                    layout.sim.0,
                    layout.sim.1,
                    layout.dye.0,
                    layout.dye.1
                );
                self.fields = Some(fields);
                self.layout = layout;
                self.surface = surface;
                Ok(())
            }
            Err(err) => {
                self.state = StepperState::Destroyed;
                Err(err)
            }
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        for buffer in [&mut fields.velocity, &mut fields.dye, &mut fields.pressure] {
            self.backend.clear(buffer.read_mut())?;
            self.backend.clear(buffer.write_mut())?;
        }
        self.backend.clear(&mut fields.divergence)?;
        self.backend.clear(&mut fields.display)?;
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<()> {
        if self.state == StepperState::Destroyed {
            return Err(FluidError::Destroyed);
        }
        self.state = StepperState::Suspended;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            StepperState::Destroyed => Err(FluidError::Destroyed),
            _ => {
                self.state = StepperState::Idle;
                Ok(())
            }
        }
    }

    /// Releases every field. Further calls fail with `Destroyed`.
    pub fn destroy(&mut self) {
        if let Some(fields) = self.fields.take() {
            fields.release(&mut self.backend);
            log::info!("simulation destroyed after {} frames", self.frame);
        }
        self.state = StepperState::Destroyed;
    }

    /// Clears any stateful field holding a NaN or infinity. Returns the
    /// fields that were reset.
    pub fn sanitize(&mut self) -> Result<Vec<FieldKind>> {
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        let mut reset = Vec::new();
        for kind in [FieldKind::Velocity, FieldKind::Dye, FieldKind::Pressure] {
            let snapshot = self.backend.read(fields.get(kind))?;
            if snapshot.is_finite() {
                continue;
            }
            log::warn!("non-finite values in {kind:?} field, resetting it");
            let buffer = match kind {
                FieldKind::Velocity => &mut fields.velocity,
                FieldKind::Dye => &mut fields.dye,
                _ => &mut fields.pressure,
            };
            self.backend.clear(buffer.read_mut())?;
            self.backend.clear(buffer.write_mut())?;
            reset.push(kind);
        }
        Ok(reset)
    }

    pub fn read(&mut self, kind: FieldKind) -> Result<FieldSnapshot> {
        let fields = self.fields.as_ref().ok_or(FluidError::Destroyed)?;
        self.backend.read(fields.get(kind))
    }

    pub fn upload(&mut self, kind: FieldKind, data: &[f32]) -> Result<()> {
        let fields = self.fields.as_mut().ok_or(FluidError::Destroyed)?;
        self.backend.write(fields.get_mut(kind), data)
    }

    pub fn state(&self) -> StepperState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == StepperState::Destroyed
    }

    pub fn sim_size(&self) -> (u32, u32) {
        self.layout.sim
    }

    pub fn dye_size(&self) -> (u32, u32) {
        self.layout.dye
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.layout.display
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn surface(&self) -> &SurfaceSize {
        &self.surface
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn fields(&self) -> Option<&FieldSet<B::Texture>> {
        self.fields.as_ref()
    }
}

impl<B: Backend> Drop for Simulation<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Allocates the field set for `surface`, retrying once at the backend's
/// texture limit when the requested sizes do not fit.
fn allocate_fields<B: Backend>(
    backend: &mut B,
    params: &SimulationParameters,
    surface: &SurfaceSize,
) -> Result<(FieldSet<B::Texture>, FieldLayout)> {
    let layout = FieldLayout::for_surface(params, surface);
    match FieldSet::allocate(backend, &layout) {
        Ok(fields) => Ok((fields, layout)),
        Err(FluidError::ResourceExhausted { width, height, limit }) => {
            let clamped = layout.clamped(limit);
            log::warn!(
                "{width}x{height} exceeds texture limit {limit}, retrying with sim {}x{}, dye {}x{}",
                clamped.sim.0,
                clamped.sim.1,
                clamped.dye.0,
                clamped.dye.1
            );
            match FieldSet::allocate(backend, &clamped) {
                Ok(fields) => Ok((fields, clamped)),
                Err(err) => Err(FluidError::UnsupportedBackend(format!(
                    "field allocation failed after clamping: {err}"
                ))),
            }
        }
        Err(err) => Err(err),
    }
}
