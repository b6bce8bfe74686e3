use crate::backend::Backend;
use crate::field::{FieldKind, FieldSnapshot};
use crate::render::Renderer;
use crate::stepper::Simulation;
use std::path::{Path, PathBuf};

type ExportResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

pub struct ImageExporter {
    renderer: Renderer,
}

impl ImageExporter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            renderer: Renderer::new(width, height),
        }
    }

    pub fn export_dye_png(&self, dye: &FieldSnapshot, path: &Path) -> ExportResult<()> {
        self.renderer.render_dye(dye).save(path)?;
        Ok(())
    }

    pub fn export_velocity_png(&self, velocity: &FieldSnapshot, path: &Path) -> ExportResult<()> {
        self.renderer.render_velocity(velocity).save(path)?;
        Ok(())
    }

    pub fn export_display_png(&self, display: &FieldSnapshot, path: &Path) -> ExportResult<()> {
        let img = self
            .renderer
            .render_display(display)
            .ok_or("display snapshot does not hold RGBA data")?;
        img.save(path)?;
        Ok(())
    }

    /// Writes `<prefix>_dye.png` and `<prefix>_velocity.png` for the
    /// simulation's current state. Returns the written paths.
    pub fn export_simulation<B: Backend>(
        &self,
        simulation: &mut Simulation<B>,
        output_dir: &Path,
        prefix: &str,
    ) -> ExportResult<Vec<PathBuf>> {
        let dye = simulation.read(FieldKind::Dye)?;
        let velocity = simulation.read(FieldKind::Velocity)?;

        let dye_path = output_dir.join(format!("{prefix}_dye.png"));
        let velocity_path = output_dir.join(format!("{prefix}_velocity.png"));
        self.export_dye_png(&dye, &dye_path)?;
        self.export_velocity_png(&velocity, &velocity_path)?;
        Ok(vec![dye_path, velocity_path])
    }

    /// Steps `steps` frames at a fixed `dt`, exporting the dye after each.
    pub fn export_frame_sequence<B: Backend>(
        &self,
        simulation: &mut Simulation<B>,
        steps: usize,
        dt: f32,
        output_dir: &Path,
        prefix: &str,
    ) -> ExportResult<()> {
        for i in 0..steps {
            simulation.step(dt, &[])?;
            let dye = simulation.read(FieldKind::Dye)?;
            let path = output_dir.join(format!("{prefix}_frame_{i:04}.png"));
            self.export_dye_png(&dye, &path)?;
        }
        Ok(())
    }
}
