//! Stage program compilation and the compiled library the stepper draws with.

use crate::backend::Backend;
use crate::error::{FluidError, Result};
use crate::shaders::{Stage, VERTEX_SHADER};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Parses and validates one stage's WGSL module and checks it against the
/// binding contract of `stage`. Returns the linked source.
pub fn link_source(stage: Stage, vertex_source: &str, fragment_source: &str) -> Result<String> {
    let source = format!("{vertex_source}\n{fragment_source}");

    let module = naga::front::wgsl::parse_str(&source)
        .map_err(|err| compile_error(stage, err.emit_to_string(&source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|err| compile_error(stage, format!("{err:?}")))?;

    let has_entry = |name: &str, kind: naga::ShaderStage| {
        module
            .entry_points
            .iter()
            .any(|entry| entry.name == name && entry.stage == kind)
    };
    if !has_entry(VERTEX_ENTRY, naga::ShaderStage::Vertex) {
        return Err(compile_error(
            stage,
            format!("missing vertex entry point `{VERTEX_ENTRY}`"),
        ));
    }
    if !has_entry(FRAGMENT_ENTRY, naga::ShaderStage::Fragment) {
        return Err(compile_error(
            stage,
            format!("missing fragment entry point `{FRAGMENT_ENTRY}`"),
        ));
    }

    let textures = module
        .global_variables
        .iter()
        .filter(|(_, var)| matches!(module.types[var.ty].inner, naga::TypeInner::Image { .. }))
        .count();
    if textures != stage.input_count() {
        return Err(compile_error(
            stage,
            format!(
                "declares {textures} texture binding(s), stage reads {}",
                stage.input_count()
            ),
        ));
    }

    Ok(source)
}

fn compile_error(stage: Stage, diagnostic: String) -> FluidError {
    log::error!("{stage} program failed to compile:\n{diagnostic}");
    FluidError::ShaderCompile { stage, diagnostic }
}

/// The six compiled stage programs. Only ever constructed complete.
pub struct ProgramLibrary<P> {
    pub display: P,
    pub splat: P,
    pub advect: P,
    pub divergence: P,
    pub pressure: P,
    pub gradient_subtract: P,
}

impl<P> ProgramLibrary<P> {
    pub fn compile<B>(backend: &mut B) -> Result<Self>
    where
        B: Backend<Program = P>,
    {
        let mut compile = |stage: Stage| {
            backend.compile(stage, VERTEX_SHADER, stage.fragment_source())
        };

        let library = Self {
            display: compile(Stage::Display)?,
            splat: compile(Stage::Splat)?,
            advect: compile(Stage::Advect)?,
            divergence: compile(Stage::Divergence)?,
            pressure: compile(Stage::Pressure)?,
            gradient_subtract: compile(Stage::GradientSubtract)?,
        };
        log::info!("compiled {} stage programs on {}", Stage::ALL.len(), backend.name());
        Ok(library)
    }

    pub fn get(&self, stage: Stage) -> &P {
        match stage {
            Stage::Display => &self.display,
            Stage::Splat => &self.splat,
            Stage::Advect => &self.advect,
            Stage::Divergence => &self.divergence,
            Stage::Pressure => &self.pressure,
            Stage::GradientSubtract => &self.gradient_subtract,
        }
    }
}
