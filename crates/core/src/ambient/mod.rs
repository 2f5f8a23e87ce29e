use std::f32::consts::TAU;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{DemoConfig, HostEnv};
use crate::particles::{BurstRequest, EffectQueue};
use crate::stage::{targets, BackdropHandle, Color, Stage, TargetHandle};

/// The secondary loops that run alongside scene progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    GlowPulse,
    Drift,
    Float,
    HighlightPulse,
}

struct AmbientLoop {
    target: TargetHandle,
    kind: LoopKind,
    phase: f32,
}

impl AmbientLoop {
    fn tick(&mut self, dt: f32) {
        self.phase += dt;
        let mut target = self.target.borrow_mut();
        match self.kind {
            LoopKind::GlowPulse => {
                // Breathing glow.
                target.glow = 0.5 + 0.5 * (self.phase * TAU / 3.2).sin();
            }
            LoopKind::Drift => {
                target.x = (self.phase * 0.11).sin() * 30.0;
                target.y = (self.phase * 0.07).cos() * 18.0;
            }
            LoopKind::Float => {
                // The intro scene holds the focal element; respect its lock.
                if !target.parallax_locked {
                    target.y = (self.phase * 0.8).sin() * 8.0;
                }
            }
            LoopKind::HighlightPulse => {
                target.glow = (self.phase * 2.4).sin().max(0.0);
            }
        }
    }
}

impl fmt::Debug for AmbientLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientLoop")
            .field("target", &self.target.borrow().name().to_string())
            .field("kind", &self.kind)
            .finish()
    }
}

/// The ambient session: every secondary loop, the randomized burst
/// scheduler, and the backdrop render loop. At most one is active;
/// [`AmbientSession::start`] while running does nothing, and
/// [`AmbientSession::stop`] cancels all pending work.
pub struct AmbientSession {
    active: bool,
    loops: Vec<AmbientLoop>,
    /// Seconds until the next scheduled burst; `None` means nothing pending.
    pending_burst: Option<f32>,
    interval: (f32, f32),
    burst_count: usize,
    rng: StdRng,
    backdrop: Option<BackdropHandle>,
    effects: EffectQueue,
}

impl AmbientSession {
    pub fn new(effects: EffectQueue, seed: u64) -> Self {
        Self {
            active: false,
            loops: Vec::new(),
            pending_burst: None,
            interval: (0.0, 0.0),
            burst_count: 0,
            rng: StdRng::seed_from_u64(seed),
            backdrop: None,
            effects,
        }
    }

    /// Spins the session up. Idempotent: calling while already active
    /// creates no duplicate loops and no second burst schedule. The backdrop
    /// render loop starts here, never at build time, so idle visitors pay no
    /// continuous render cost.
    pub fn start(&mut self, stage: &Stage, config: &DemoConfig, env: &HostEnv, backdrop: bool) {
        if self.active {
            return;
        }
        self.active = true;

        self.loops.clear();
        let mounts = [
            (targets::GLOW, LoopKind::GlowPulse),
            (targets::HAZE, LoopKind::Drift),
            (targets::FOCAL, LoopKind::Float),
            (targets::LOGO, LoopKind::Float),
            (targets::CIRCUIT, LoopKind::HighlightPulse),
        ];
        for (name, kind) in mounts {
            if let Some(target) = stage.target(name) {
                self.loops.push(AmbientLoop {
                    target,
                    kind,
                    phase: 0.0,
                });
            }
        }

        self.interval = if env.small_screen() {
            config.bursts.small_screen_interval
        } else {
            config.bursts.interval
        };
        self.burst_count = config.bursts.count;
        let delay = self.draw_delay();
        self.pending_burst = Some(delay);

        if backdrop {
            self.backdrop = stage.backdrop();
            if let Some(backdrop) = &self.backdrop {
                backdrop.borrow_mut().start();
            }
        }
    }

    /// Cancels every pending scheduled burst and terminates every loop.
    pub fn stop(&mut self) {
        self.active = false;
        self.loops.clear();
        self.pending_burst = None;
        if let Some(backdrop) = self.backdrop.take() {
            backdrop.borrow_mut().stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Pending delayed calls; zero or one by construction.
    pub fn pending_tasks(&self) -> usize {
        usize::from(self.pending_burst.is_some())
    }

    pub fn burst_interval(&self) -> (f32, f32) {
        self.interval
    }

    pub fn advance(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        for ambient_loop in &mut self.loops {
            ambient_loop.tick(dt);
        }

        let mut remaining = dt;
        while let Some(delay) = self.pending_burst {
            if remaining < delay {
                self.pending_burst = Some(delay - remaining);
                break;
            }
            remaining -= delay;
            let origin = (self.rng.gen_range(0.2..0.8), self.rng.gen_range(0.2..0.6));
            self.effects.borrow_mut().push(BurstRequest {
                origin,
                color: Color::ACCENT,
                count: self.burst_count,
            });
            let delay = self.draw_delay();
            self.pending_burst = Some(delay);
        }

        if let Some(backdrop) = &self.backdrop {
            backdrop.borrow_mut().render_frame();
        }
    }

    fn draw_delay(&mut self) -> f32 {
        self.rng.gen_range(self.interval.0..=self.interval.1)
    }
}

impl fmt::Debug for AmbientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientSession")
            .field("active", &self.active)
            .field("loops", &self.loops.len())
            .field("pending_burst", &self.pending_burst)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn session() -> (AmbientSession, EffectQueue, Stage) {
        let effects: EffectQueue = Rc::new(RefCell::new(Vec::new()));
        let session = AmbientSession::new(effects.clone(), 11);
        (session, effects, Stage::standard())
    }

    fn start(session: &mut AmbientSession, stage: &Stage) {
        session.start(stage, &DemoConfig::default(), &HostEnv::default(), true);
    }

    #[test]
    fn starting_twice_creates_no_duplicate_loops() {
        let (mut session, _effects, stage) = session();
        start(&mut session, &stage);
        let loops = session.loop_count();
        assert!(loops > 0);
        assert_eq!(session.pending_tasks(), 1);

        start(&mut session, &stage);
        assert_eq!(session.loop_count(), loops);
        assert_eq!(session.pending_tasks(), 1);

        // One render loop: one frame per advance, not two.
        let backdrop = stage.backdrop().unwrap();
        session.advance(0.016);
        assert_eq!(backdrop.borrow().frames_rendered(), 1);
    }

    #[test]
    fn stop_cancels_all_pending_work() {
        let (mut session, effects, stage) = session();
        start(&mut session, &stage);
        session.stop();

        assert_eq!(session.pending_tasks(), 0);
        assert_eq!(session.loop_count(), 0);
        assert!(!stage.backdrop().unwrap().borrow().is_running());

        session.advance(1000.0);
        assert!(effects.borrow().is_empty());
    }

    #[test]
    fn bursts_fire_within_the_configured_interval() {
        let (mut session, effects, stage) = session();
        start(&mut session, &stage);
        let (min, max) = session.burst_interval();
        assert_eq!((min, max), DemoConfig::default().bursts.interval);

        session.advance(min * 0.5);
        assert!(effects.borrow().is_empty());

        session.advance(max);
        assert!(!effects.borrow().is_empty());
    }

    #[test]
    fn every_fired_burst_reschedules_the_next() {
        let (mut session, effects, stage) = session();
        start(&mut session, &stage);
        let (_, max) = session.burst_interval();

        for _ in 0..4 {
            session.advance(max);
        }
        assert!(effects.borrow().len() >= 3);
        assert_eq!(session.pending_tasks(), 1);
    }

    #[test]
    fn small_screens_use_the_tighter_interval() {
        let effects: EffectQueue = Rc::new(RefCell::new(Vec::new()));
        let mut session = AmbientSession::new(effects, 3);
        let stage = Stage::standard();
        let env = HostEnv {
            viewport_width: 390.0,
            ..HostEnv::default()
        };
        session.start(&stage, &DemoConfig::default(), &env, false);
        assert_eq!(
            session.burst_interval(),
            DemoConfig::default().bursts.small_screen_interval
        );
    }

    #[test]
    fn backdrop_stays_idle_until_the_session_starts() {
        let (mut session, _effects, stage) = session();
        let backdrop = stage.backdrop().unwrap();
        assert!(!backdrop.borrow().is_running());

        start(&mut session, &stage);
        assert!(backdrop.borrow().is_running());
    }

    #[test]
    fn float_loop_respects_the_parallax_lock() {
        let (mut session, _effects, stage) = session();
        let focal = stage.target(targets::FOCAL).unwrap();
        focal.borrow_mut().parallax_locked = true;
        start(&mut session, &stage);

        session.advance(0.5);
        assert_eq!(focal.borrow().y, 0.0);

        focal.borrow_mut().parallax_locked = false;
        session.advance(0.5);
        assert!(focal.borrow().y.abs() > 0.0);
    }
}
