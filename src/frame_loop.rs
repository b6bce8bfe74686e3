//! Wall-clock driver: one stepper invocation per display refresh.

use crate::backend::Backend;
use crate::config::{SimulationParameters, SurfaceSize};
use crate::error::{FluidError, Result};
use crate::field::{FieldKind, FieldSnapshot};
use crate::pointer::{PointerQueue, PointerSender, PointerTracker, Splat};
use crate::stepper::Simulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Source of display-refresh callbacks (`requestAnimationFrame`, an egui
/// repaint request, a test harness).
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler for headless hosts: records requests, the caller decides when
/// frames happen.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: Option<FrameHandle>,
    requested: u64,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending = Some(handle);
        self.requested += 1;
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}

/// Frames counted over rolling one-second windows.
#[derive(Debug, Default, Clone)]
pub struct FpsCounter {
    window_start_ms: Option<f64>,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    pub const WINDOW_MS: f64 = 1000.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a frame. Returns the new rate when a window closes.
    pub fn tick(&mut self, timestamp_ms: f64) -> Option<f32> {
        let start = *self.window_start_ms.get_or_insert(timestamp_ms);
        self.frames += 1;
        let elapsed = timestamp_ms - start;
        if elapsed >= Self::WINDOW_MS {
            self.fps = (self.frames as f64 * 1000.0 / elapsed) as f32;
            self.frames = 0;
            self.window_start_ms = Some(timestamp_ms);
            Some(self.fps)
        } else {
            None
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn reset(&mut self) {
        *self = Self {
            fps: self.fps,
            ..Self::default()
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Suspended,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    /// Integration step actually used, in seconds.
    pub dt: f32,
    pub splats: usize,
    pub rendered: bool,
    pub fps: f32,
}

pub struct FrameLoop<B: Backend, S: FrameScheduler> {
    simulation: Simulation<B>,
    scheduler: S,
    pending: Option<FrameHandle>,
    queue: PointerQueue,
    tracker: PointerTracker,
    last_timestamp_ms: Option<f64>,
    fps: FpsCounter,
    state: LoopState,
}

impl<B: Backend, S: FrameScheduler> FrameLoop<B, S> {
    /// Builds the simulation and requests the first frame. Construction
    /// errors are returned to the host as is.
    pub fn start(
        backend: B,
        params: SimulationParameters,
        surface: SurfaceSize,
        mut scheduler: S,
    ) -> Result<Self> {
        let tracker = PointerTracker::new(params.color_seed);
        let simulation = Simulation::new(backend, params, surface)?;
        let pending = Some(scheduler.request_frame());
        Ok(Self {
            simulation,
            scheduler,
            pending,
            queue: PointerQueue::new(),
            tracker,
            last_timestamp_ms: None,
            fps: FpsCounter::new(),
            state: LoopState::Running,
        })
    }

    pub fn pointer_sender(&self) -> PointerSender {
        self.queue.sender()
    }

    /// Display-refresh callback. Returns `None` when the loop is not running.
    pub fn on_frame(&mut self, timestamp_ms: f64) -> Option<FrameReport> {
        if self.state != LoopState::Running {
            return None;
        }
        self.pending = None;

        let dt = self.frame_dt(timestamp_ms);
        let aspect_ratio = self.simulation.surface().aspect_ratio();
        for sample in self.queue.drain() {
            self.tracker.apply(&sample, aspect_ratio);
        }
        let pointers = self.tracker.active();
        self.tracker.end_frame();

        let (splats, rendered) = match self
            .simulation
            .step(dt, &pointers)
            .and_then(|applied| self.simulation.render().map(|()| applied))
        {
            Ok(applied) => (applied, true),
            Err(FluidError::Destroyed) => {
                log::error!("simulation lost, stopping frame loop");
                self.destroy();
                return None;
            }
            Err(err) => {
                log::warn!("skipping frame {}: {err}", self.simulation.frame());
                (0, false)
            }
        };

        if let Some(fps) = self.fps.tick(timestamp_ms) {
            log::info!("{fps:.1} fps");
        }
        self.pending = Some(self.scheduler.request_frame());

        Some(FrameReport {
            frame: self.simulation.frame(),
            dt,
            splats,
            rendered,
            fps: self.fps.fps(),
        })
    }

    fn frame_dt(&mut self, timestamp_ms: f64) -> f32 {
        let ceiling = self.simulation.params().dt_ceiling;
        let dt = match self.last_timestamp_ms {
            // First frame after start or resume.
            None => 0.0,
            Some(last) if timestamp_ms.is_finite() => ((timestamp_ms - last) / 1000.0).max(0.0) as f32,
            Some(_) => 0.0,
        };
        if timestamp_ms.is_finite() {
            self.last_timestamp_ms = Some(timestamp_ms);
        }
        dt.min(ceiling)
    }

    /// Reallocates the fields for a new surface. An invalid size is refused
    /// and the loop keeps running; an allocation failure leaves it inert.
    pub fn resize(&mut self, surface: SurfaceSize) -> Result<()> {
        if self.state == LoopState::Destroyed {
            return Err(FluidError::Destroyed);
        }
        if let Err(err) = self.simulation.resize(surface) {
            log::error!("resize to {}x{} failed: {err}", surface.width, surface.height);
            if self.simulation.is_destroyed() {
                self.destroy();
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn suspend(&mut self) {
        if self.state != LoopState::Running {
            return;
        }
        self.cancel_pending();
        if let Err(err) = self.simulation.suspend() {
            log::warn!("suspend failed: {err}");
        }
        self.state = LoopState::Suspended;
    }

    pub fn resume(&mut self) {
        if self.state != LoopState::Suspended {
            return;
        }
        if let Err(err) = self.simulation.resume() {
            log::warn!("resume failed: {err}");
            return;
        }
        self.last_timestamp_ms = None;
        self.fps.reset();
        self.pending = Some(self.scheduler.request_frame());
        self.state = LoopState::Running;
    }

    /// Cancels the pending frame and releases every field. Idempotent.
    pub fn destroy(&mut self) {
        self.cancel_pending();
        self.simulation.destroy();
        self.tracker.clear();
        self.state = LoopState::Destroyed;
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    /// Injects a splat outside the pointer path (scripted input, splash).
    pub fn splat(&mut self, splat: &Splat) -> Result<bool> {
        self.simulation.splat(splat)
    }

    pub fn display_snapshot(&mut self) -> Result<FieldSnapshot> {
        self.simulation.read(FieldKind::Display)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn simulation(&self) -> &Simulation<B> {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation<B> {
        &mut self.simulation
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}
