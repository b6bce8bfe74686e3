use crate::error::Result;
use crate::field::{Field, FieldDesc, FieldSnapshot};
use crate::shaders::{Stage, StageUniforms};

/// A shader-capable device the stepper drives.
///
/// Textures are opaque; the stepper only ever holds them inside `Field`s.
/// `draw` takes its inputs by shared reference and its target by exclusive
/// reference, so sampling and writing one physical field in the same pass
/// cannot be expressed.
pub trait Backend {
    type Texture;
    type Program;

    fn name(&self) -> &'static str;

    fn max_texture_dimension(&self) -> u32;

    fn create_texture(&mut self, desc: &FieldDesc) -> Result<Self::Texture>;

    fn compile(
        &mut self,
        stage: Stage,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self::Program>;

    /// One full-screen pass of `program` into `target`.
    fn draw(
        &mut self,
        program: &Self::Program,
        uniforms: &StageUniforms,
        inputs: &[&Field<Self::Texture>],
        target: &mut Field<Self::Texture>,
    ) -> Result<()>;

    fn clear(&mut self, field: &mut Field<Self::Texture>) -> Result<()>;

    fn read(&mut self, field: &Field<Self::Texture>) -> Result<FieldSnapshot>;

    /// Replaces the contents of `field`; `data` holds `channels` values per texel.
    fn write(&mut self, field: &mut Field<Self::Texture>, data: &[f32]) -> Result<()>;

    fn release(&mut self, field: Field<Self::Texture>);
}
