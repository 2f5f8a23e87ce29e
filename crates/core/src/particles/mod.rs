use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{BurstConfig, HostEnv};
use crate::stage::{Color, SurfaceHandle};

/// A burst asked for by a scene hook or the ambient scheduler. Origin is
/// normalized to the surface ([0, 1] per axis); the simulator resolves it
/// against the surface dimensions when the burst fires.
#[derive(Debug, Clone)]
pub struct BurstRequest {
    pub origin: (f32, f32),
    pub color: Color,
    pub count: usize,
}

/// Queue the engine drains once per frame, after the timeline and ambient
/// session have run.
pub type EffectQueue = Rc<RefCell<Vec<BurstRequest>>>;

#[derive(Debug, Clone)]
struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    life: f32,
    radius: f32,
    color: Color,
}

/// Bounded-lifetime particle simulation over the stage's drawing surface.
/// One simulation loop exists at most; overlapping bursts pour into it
/// rather than spawning a second loop.
pub struct ParticleField {
    surface: Option<SurfaceHandle>,
    config: BurstConfig,
    reduced_motion: bool,
    small_screen: bool,
    high_density: bool,
    particles: Vec<Particle>,
    frames_left: u32,
    rng: StdRng,
}

impl ParticleField {
    pub fn new(surface: Option<SurfaceHandle>, config: BurstConfig, env: &HostEnv, seed: u64) -> Self {
        Self {
            surface,
            config,
            reduced_motion: env.reduced_motion,
            small_screen: env.small_screen(),
            high_density: env.high_density(),
            particles: Vec::new(),
            frames_left: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Device scaling keeps per-frame drawing cost bounded on weak targets.
    pub fn scaled_count(&self, requested: usize) -> usize {
        let mut count = requested as f32;
        if self.small_screen {
            count *= 0.5;
        }
        if self.high_density {
            count *= 0.6;
        }
        count.round() as usize
    }

    /// Spawns `count` particles at the normalized `origin`. A complete no-op
    /// under reduced motion or without a live drawing surface.
    pub fn burst(&mut self, origin: (f32, f32), color: Color, count: usize) {
        if self.reduced_motion {
            return;
        }
        let Some(surface) = self.surface.clone() else {
            return;
        };
        if surface.borrow().is_detached() {
            return;
        }

        let (width, height) = {
            let surface = surface.borrow();
            (surface.width, surface.height)
        };
        let x = origin.0.clamp(0.0, 1.0) * width;
        let y = origin.1.clamp(0.0, 1.0) * height;
        let speed = self.config.speed;

        for _ in 0..self.scaled_count(count) {
            self.particles.push(Particle {
                x,
                y,
                vx: self.rng.gen_range(-speed..=speed),
                vy: self.rng.gen_range(-speed..=speed),
                life: self.config.max_frames as f32,
                radius: self.rng.gen_range(1.5..3.5),
                color,
            });
        }
        self.frames_left = self.config.max_frames;
    }

    pub fn is_active(&self) -> bool {
        self.frames_left > 0 && !self.particles.is_empty()
    }

    /// One frame of simulation: integrate every particle, then repaint the
    /// surface from scratch. Ends the loop at the frame budget or as soon as
    /// the surface disappears.
    pub fn step(&mut self) {
        if !self.is_active() {
            return;
        }
        let Some(surface) = self.surface.clone() else {
            self.particles.clear();
            self.frames_left = 0;
            return;
        };
        if surface.borrow().is_detached() {
            self.particles.clear();
            self.frames_left = 0;
            return;
        }

        let gravity = self.config.gravity;
        let max_life = self.config.max_frames as f32;
        for particle in &mut self.particles {
            particle.x += particle.vx;
            particle.y += particle.vy;
            particle.vy += gravity;
            particle.life -= 1.0;
        }
        self.particles.retain(|particle| particle.life > 0.0);

        let mut surface = surface.borrow_mut();
        surface.clear();
        for particle in &self.particles {
            let alpha = particle.life / max_life;
            surface.fill_circle(particle.x, particle.y, particle.radius, particle.color, alpha);
        }
        drop(surface);

        self.frames_left -= 1;
        if self.frames_left == 0 || self.particles.is_empty() {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.particles.clear();
        self.frames_left = 0;
        if let Some(surface) = &self.surface {
            surface.borrow_mut().clear();
        }
    }

    /// Drops every particle and leaves the surface blank. Part of engine
    /// teardown; safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.particles.is_empty() && self.frames_left == 0 {
            return;
        }
        self.finish();
    }
}

impl std::fmt::Debug for ParticleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleField")
            .field("particles", &self.particles.len())
            .field("frames_left", &self.frames_left)
            .field("reduced_motion", &self.reduced_motion)
            .finish()
    }
}
