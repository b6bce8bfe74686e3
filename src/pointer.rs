//! Pointer input: samples from the host, per-pointer state, and the queue
//! that carries samples from the input side to the frame loop.

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// One input event. `position` is normalized to `[0,1]²`, y growing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub id: u64,
    pub position: Vec2,
    pub timestamp_ms: f64,
    pub phase: PointerPhase,
}

impl PointerSample {
    pub fn new(id: u64, position: Vec2, timestamp_ms: f64, phase: PointerPhase) -> Self {
        Self {
            id,
            position,
            timestamp_ms,
            phase,
        }
    }

    pub fn down(id: u64, position: Vec2, timestamp_ms: f64) -> Self {
        Self::new(id, position, timestamp_ms, PointerPhase::Down)
    }

    pub fn moved(id: u64, position: Vec2, timestamp_ms: f64) -> Self {
        Self::new(id, position, timestamp_ms, PointerPhase::Move)
    }

    pub fn up(id: u64, position: Vec2, timestamp_ms: f64) -> Self {
        Self::new(id, position, timestamp_ms, PointerPhase::Up)
    }
}

/// A localized impulse: `force` goes into velocity, `color` into dye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub point: Vec2,
    pub force: Vec2,
    pub color: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerState {
    pub id: u64,
    pub position: Vec2,
    /// Aspect-corrected movement accumulated since the last frame.
    pub delta: Vec2,
    pub active: bool,
    pub moved: bool,
    pub color: Vec3,
    last_timestamp_ms: f64,
}

impl PointerState {
    fn new(id: u64, position: Vec2, timestamp_ms: f64, color: Vec3) -> Self {
        Self {
            id,
            position,
            delta: Vec2::ZERO,
            active: true,
            moved: false,
            color,
            last_timestamp_ms: timestamp_ms,
        }
    }

    /// Pointer state carrying exactly this splat, for scripted input.
    pub fn from_splat(id: u64, splat: &Splat, splat_force: f32) -> Self {
        let delta = if splat_force != 0.0 {
            splat.force / splat_force
        } else {
            Vec2::ZERO
        };
        Self {
            id,
            position: splat.point,
            delta,
            active: true,
            moved: true,
            color: splat.color,
            last_timestamp_ms: 0.0,
        }
    }

    fn track(&mut self, sample: &PointerSample, aspect_ratio: f32) {
        if sample.timestamp_ms < self.last_timestamp_ms {
            return;
        }
        self.delta += correct_delta(sample.position - self.position, aspect_ratio);
        self.position = sample.position;
        self.last_timestamp_ms = sample.timestamp_ms;
        self.moved = self.delta.length_squared() > 0.0;
    }

    pub fn last_timestamp_ms(&self) -> f64 {
        self.last_timestamp_ms
    }

    pub fn to_splat(&self, splat_force: f32) -> Splat {
        Splat {
            point: self.position,
            force: self.delta * splat_force,
            color: self.color,
        }
    }
}

/// Movement deltas are scaled so a stroke of equal screen length yields an
/// equal impulse along either axis.
pub fn correct_delta(delta: Vec2, aspect_ratio: f32) -> Vec2 {
    let mut corrected = delta;
    if aspect_ratio < 1.0 {
        corrected.x *= aspect_ratio;
    }
    if aspect_ratio > 1.0 {
        corrected.y /= aspect_ratio;
    }
    corrected
}

/// Splat colors: a random hue at full saturation, dimmed to 0.15.
#[derive(Debug)]
pub struct ColorPicker {
    rng: StdRng,
}

impl ColorPicker {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn next_color(&mut self) -> Vec3 {
        let hue: f32 = self.rng.gen_range(0.0..1.0);
        hsv_to_rgb(hue, 1.0, 1.0) * 0.15
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    match (sector as i32).rem_euclid(6) {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

/// `count` splats at random points with random directions and colors.
pub fn random_splats<R: Rng>(count: usize, rng: &mut R) -> Vec<Splat> {
    (0..count)
        .map(|_| {
            let point = Vec2::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0));
            let force = Vec2::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)) * 1000.0;
            let hue: f32 = rng.gen_range(0.0..1.0);
            // Splash colors are brighter than pointer strokes.
            let color = hsv_to_rgb(hue, 1.0, 1.0) * 1.5;
            Splat {
                point,
                force,
                color,
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct PointerTracker {
    pointers: HashMap<u64, PointerState>,
    colors: ColorPicker,
}

impl PointerTracker {
    pub fn new(color_seed: Option<u64>) -> Self {
        Self {
            pointers: HashMap::new(),
            colors: ColorPicker::new(color_seed),
        }
    }

    pub fn apply(&mut self, sample: &PointerSample, aspect_ratio: f32) {
        if !sample.position.is_finite() || !sample.timestamp_ms.is_finite() {
            log::warn!("ignoring non-finite pointer sample for id {}", sample.id);
            return;
        }

        match sample.phase {
            PointerPhase::Down => {
                let color = self.colors.next_color();
                self.pointers.insert(
                    sample.id,
                    PointerState::new(sample.id, sample.position, sample.timestamp_ms, color),
                );
            }
            PointerPhase::Move => {
                // Hover moves carry no pointer.
                let Some(state) = self.pointers.get_mut(&sample.id) else {
                    return;
                };
                if state.active {
                    state.track(sample, aspect_ratio);
                }
            }
            PointerPhase::Up => {
                let Some(state) = self.pointers.get_mut(&sample.id) else {
                    return;
                };
                if state.active {
                    state.track(sample, aspect_ratio);
                }
                state.active = false;
                // Movement gathered this frame still splats; end_frame drops it.
                if !state.moved {
                    self.pointers.remove(&sample.id);
                }
            }
        }
    }

    /// Pointers that should splat this frame, ordered by id. Includes
    /// pointers released this frame with movement still pending.
    pub fn active(&self) -> Vec<PointerState> {
        let mut active: Vec<PointerState> = self
            .pointers
            .values()
            .filter(|state| state.moved)
            .cloned()
            .collect();
        active.sort_by_key(|state| state.id);
        active
    }

    pub fn get(&self, id: u64) -> Option<&PointerState> {
        self.pointers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// Clears the per-frame movement after injection consumed it and
    /// forgets released pointers.
    pub fn end_frame(&mut self) {
        self.pointers.retain(|_, state| state.active);
        for state in self.pointers.values_mut() {
            state.delta = Vec2::ZERO;
            state.moved = false;
        }
    }

    pub fn clear(&mut self) {
        self.pointers.clear();
    }
}

type SharedQueue = Arc<Mutex<VecDeque<PointerSample>>>;

fn lock(queue: &SharedQueue) -> MutexGuard<'_, VecDeque<PointerSample>> {
    // A panicking producer cannot leave a half-pushed sample behind.
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct PointerQueue {
    samples: SharedQueue,
}

/// Producer handle for input threads and event callbacks.
#[derive(Debug, Clone)]
pub struct PointerSender {
    samples: SharedQueue,
}

impl PointerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> PointerSender {
        PointerSender {
            samples: Arc::clone(&self.samples),
        }
    }

    pub fn drain(&self) -> Vec<PointerSample> {
        lock(&self.samples).drain(..).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.samples).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PointerSender {
    pub fn send(&self, sample: PointerSample) {
        let mut samples = lock(&self.samples);
        if samples.len() >= QUEUE_CAPACITY {
            samples.pop_front();
            log::warn!("pointer queue full, dropped oldest sample");
        }
        samples.push_back(sample);
    }
}
