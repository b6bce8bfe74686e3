//! Real-time stable-fluids ink simulation.
//!
//! A `Simulation` owns double-buffered velocity, dye and pressure fields on
//! a `Backend` and advances them with splat, advect and projection passes;
//! `FrameLoop` drives it from display-refresh callbacks.

pub mod advection;
pub mod analysis;
pub mod backend;
pub mod config;
pub mod desktop;
pub mod error;
pub mod export;
pub mod field;
pub mod frame_loop;
pub mod injector;
pub mod pointer;
pub mod program;
pub mod projection;
pub mod render;
pub mod shaders;
pub mod stepper;

#[cfg(feature = "cpu")]
pub mod cpu;

#[cfg(feature = "gpu")]
pub mod gpu;

#[cfg(all(target_arch = "wasm32", feature = "cpu"))]
pub mod web;

// Feature-based backend selection
#[cfg(feature = "cpu")]
pub type DefaultBackend = cpu::CpuBackend;

#[cfg(all(feature = "gpu", not(feature = "cpu")))]
pub type DefaultBackend = gpu::GpuBackend;

pub use analysis::{AnalysisRecorder, FieldMetrics, FluidMetrics};
pub use backend::Backend;
pub use config::{SimulationParameters, SurfaceSize};
pub use desktop::FluidApp;
pub use error::{ConfigError, FluidError, Result};
pub use export::ImageExporter;
pub use field::{Channels, DoubleBuffer, Field, FieldDesc, FieldKind, FieldSnapshot};
pub use frame_loop::{FpsCounter, FrameLoop, FrameReport, FrameScheduler, LoopState, ManualScheduler};
pub use pointer::{PointerSample, PointerState, PointerTracker, Splat};
pub use render::Renderer;
pub use shaders::{Stage, StageUniforms};
pub use stepper::{Simulation, StepperState};

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;

#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;
