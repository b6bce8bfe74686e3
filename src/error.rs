use crate::shaders::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FluidError {
    #[error("No usable graphics backend: {0}")]
    UnsupportedBackend(String),
    #[error("Failed to compile {stage} program:\n{diagnostic}")]
    ShaderCompile { stage: Stage, diagnostic: String },
    #[error("Cannot allocate {width}x{height} field (backend limit {limit})")]
    ResourceExhausted { width: u32, height: u32, limit: u32 },
    #[error("{stage} program expects {expected} input field(s), got {got}")]
    BindingMismatch {
        stage: Stage,
        expected: usize,
        got: usize,
    },
    #[error("Field readback failed: {0}")]
    Readback(String),
    #[error("Simulation has been destroyed")]
    Destroyed,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid parameter `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub type Result<T, E = FluidError> = std::result::Result<T, E>;
