use crate::backend::Backend;
use crate::error::Result;
use crate::field::{FieldKind, FieldSnapshot};
use crate::stepper::Simulation;
use glam::Vec2;
use std::fmt;

/// Summary statistics over one field snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMetrics {
    pub total: f64,
    pub max_magnitude: f32,
    /// Mean absolute value of the first channel.
    pub mean_abs: f32,
    /// Mass-weighted center in uv coordinates, `None` for an empty field.
    pub centroid: Option<Vec2>,
    pub non_finite: usize,
}

impl FieldMetrics {
    pub fn from_snapshot(snapshot: &FieldSnapshot) -> Self {
        let mut total = 0.0f64;
        let mut max_magnitude: f32 = 0.0;
        let mut abs_first = 0.0f64;
        let mut weight_sum = 0.0f64;
        let mut weighted = (0.0f64, 0.0f64);
        let mut non_finite = 0;

        for y in 0..snapshot.height {
            for x in 0..snapshot.width {
                let texel = snapshot.texel(x, y);
                if texel.iter().any(|v| !v.is_finite()) {
                    non_finite += 1;
                    continue;
                }
                total += texel.iter().map(|&v| v as f64).sum::<f64>();
                let magnitude = texel.iter().map(|v| v * v).sum::<f32>().sqrt();
                max_magnitude = max_magnitude.max(magnitude);
                abs_first += texel[0].abs() as f64;

                let mass: f64 = texel.iter().map(|v| v.abs() as f64).sum();
                if mass > 0.0 {
                    let uv = snapshot.uv(x, y);
                    weighted.0 += mass * uv.x as f64;
                    weighted.1 += mass * uv.y as f64;
                    weight_sum += mass;
                }
            }
        }

        let count = (snapshot.width as usize * snapshot.height as usize).max(1);
        let centroid = (weight_sum > 0.0).then(|| {
            Vec2::new(
                (weighted.0 / weight_sum) as f32,
                (weighted.1 / weight_sum) as f32,
            )
        });

        Self {
            total,
            max_magnitude,
            mean_abs: (abs_first / count as f64) as f32,
            centroid,
            non_finite,
        }
    }
}

fn clamped(snapshot: &FieldSnapshot, x: i64, y: i64) -> &[f32] {
    let x = x.clamp(0, snapshot.width as i64 - 1) as u32;
    let y = y.clamp(0, snapshot.height as i64 - 1) as u32;
    snapshot.texel(x, y)
}

/// Mean |∇·v| over a velocity snapshot, using the same clamped
/// central-difference stencil as the divergence program.
pub fn mean_abs_divergence(velocity: &FieldSnapshot) -> f32 {
    if velocity.channels < 2 || velocity.data.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for y in 0..velocity.height as i64 {
        for x in 0..velocity.width as i64 {
            sum += divergence_at(velocity, x, y).abs() as f64;
        }
    }
    (sum / (velocity.width as f64 * velocity.height as f64)) as f32
}

pub fn divergence_at(velocity: &FieldSnapshot, x: i64, y: i64) -> f32 {
    let l = clamped(velocity, x - 1, y)[0];
    let r = clamped(velocity, x + 1, y)[0];
    let b = clamped(velocity, x, y - 1)[1];
    let t = clamped(velocity, x, y + 1)[1];
    0.5 * ((r - l) + (t - b))
}

/// Mean |∇×v|, same stencil.
pub fn mean_abs_vorticity(velocity: &FieldSnapshot) -> f32 {
    if velocity.channels < 2 || velocity.data.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for y in 0..velocity.height as i64 {
        for x in 0..velocity.width as i64 {
            let l = clamped(velocity, x - 1, y)[1];
            let r = clamped(velocity, x + 1, y)[1];
            let b = clamped(velocity, x, y - 1)[0];
            let t = clamped(velocity, x, y + 1)[0];
            sum += (0.5 * ((r - l) - (t - b))).abs() as f64;
        }
    }
    (sum / (velocity.width as f64 * velocity.height as f64)) as f32
}

#[derive(Debug, Clone)]
pub struct FluidMetrics {
    pub frame: u64,
    pub dye: FieldMetrics,
    pub velocity: FieldMetrics,
    pub kinetic_energy: f64,
    pub mean_abs_divergence: f32,
    pub mean_abs_vorticity: f32,
}

impl FluidMetrics {
    pub fn from_snapshots(frame: u64, dye: &FieldSnapshot, velocity: &FieldSnapshot) -> Self {
        let kinetic_energy = velocity
            .data
            .chunks(velocity.channels.max(1))
            .filter(|v| v.iter().all(|c| c.is_finite()))
            .map(|v| 0.5 * v.iter().map(|&c| c as f64 * c as f64).sum::<f64>())
            .sum();
        Self {
            frame,
            dye: FieldMetrics::from_snapshot(dye),
            velocity: FieldMetrics::from_snapshot(velocity),
            kinetic_energy,
            mean_abs_divergence: mean_abs_divergence(velocity),
            mean_abs_vorticity: mean_abs_vorticity(velocity),
        }
    }

    pub fn analyze<B: Backend>(simulation: &mut Simulation<B>) -> Result<Self> {
        let dye = simulation.read(FieldKind::Dye)?;
        let velocity = simulation.read(FieldKind::Velocity)?;
        Ok(Self::from_snapshots(simulation.frame(), &dye, &velocity))
    }

    pub fn print_summary(&self) {
        println!("{self}");
    }
}

impl fmt::Display for FluidMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frame {} Metrics:", self.frame)?;
        writeln!(f, "  Dye Mass: {:.6}", self.dye.total)?;
        writeln!(f, "  Max Dye: {:.6}", self.dye.max_magnitude)?;
        match self.dye.centroid {
            Some(c) => writeln!(f, "  Dye Centroid: ({:.4}, {:.4})", c.x, c.y)?,
            None => writeln!(f, "  Dye Centroid: -")?,
        }
        writeln!(f, "  Kinetic Energy: {:.6}", self.kinetic_energy)?;
        writeln!(f, "  Max Velocity: {:.6}", self.velocity.max_magnitude)?;
        writeln!(f, "  Velocity Divergence: {:.6}", self.mean_abs_divergence)?;
        writeln!(f, "  Vorticity: {:.6}", self.mean_abs_vorticity)?;
        write!(
            f,
            "  Non-finite texels: {}",
            self.dye.non_finite + self.velocity.non_finite
        )
    }
}

#[derive(Debug, Default)]
pub struct AnalysisRecorder {
    pub metrics_history: Vec<FluidMetrics>,
}

impl AnalysisRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame<B: Backend>(&mut self, simulation: &mut Simulation<B>) -> Result<&FluidMetrics> {
        let metrics = FluidMetrics::analyze(simulation)?;
        self.metrics_history.push(metrics);
        Ok(&self.metrics_history[self.metrics_history.len() - 1])
    }

    pub fn first(&self) -> Option<&FluidMetrics> {
        self.metrics_history.first()
    }

    pub fn last(&self) -> Option<&FluidMetrics> {
        self.metrics_history.last()
    }

    /// Relative change of dye mass from the first to the last record, in percent.
    pub fn mass_change_percent(&self) -> Option<f64> {
        let (first, last) = (self.first()?, self.last()?);
        (first.dye.total != 0.0).then(|| (last.dye.total - first.dye.total) / first.dye.total * 100.0)
    }

    pub fn print_trends(&self) {
        let (Some(first), Some(last)) = (self.first(), self.last()) else {
            return;
        };
        if self.metrics_history.len() < 2 {
            return;
        }

        println!("=== TREND ANALYSIS ===");
        println!(
            "Mass change: {:.6} -> {:.6} ({:+.3}%)",
            first.dye.total,
            last.dye.total,
            self.mass_change_percent().unwrap_or(0.0)
        );
        println!(
            "Kinetic Energy change: {:.6} -> {:.6} ({:+.3}%)",
            first.kinetic_energy,
            last.kinetic_energy,
            (last.kinetic_energy - first.kinetic_energy) / first.kinetic_energy.max(0.001) * 100.0
        );
        println!(
            "Divergence change: {:.6} -> {:.6}",
            first.mean_abs_divergence, last.mean_abs_divergence
        );
        if let (Some(a), Some(b)) = (first.dye.centroid, last.dye.centroid) {
            println!(
                "Centroid drift: ({:.4}, {:.4}) -> ({:.4}, {:.4})",
                a.x, a.y, b.x, b.y
            );
        }
    }
}
