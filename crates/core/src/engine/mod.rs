use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::ambient::AmbientSession;
use crate::caps::Capabilities;
use crate::config::{DemoConfig, HostEnv};
use crate::error::ShowreelError;
use crate::particles::{EffectQueue, ParticleField};
use crate::registry::CleanupRegistry;
use crate::scene;
use crate::stage::{targets, Stage, StageEvent};
use crate::tween::Timeline;
use crate::visibility::{
    signal_from_event, PlaybackDirective, VisibilityController, VisibilitySignal,
};
use crate::Result;

/// Version string reported through the public control surface.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seed used when the config does not pin one. Keeps headless runs
/// reproducible by default.
const DEFAULT_SEED: u64 = 0x5eed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    /// Fully wired and driving playback.
    Ready,
    /// The sequencing runtime is absent: hosted content was left visible and
    /// every control call is an inert no-op.
    Disabled,
}

#[derive(Debug, Clone, Copy, Default)]
struct PointerState {
    x: f32,
    y: f32,
    present: bool,
}

/// Top-level lifecycle manager and the public control surface. Owns the
/// master timeline, the ambient session, the particle field, and the
/// visibility controller; everything it wires is recorded in the cleanup
/// registry and reversed on destroy.
pub struct Showreel {
    stage: Stage,
    env: HostEnv,
    config: DemoConfig,
    state: LifecycleState,
    caps: Option<Capabilities>,
    timeline: Option<Timeline>,
    ambient: Option<AmbientSession>,
    particles: Option<ParticleField>,
    visibility: Option<VisibilityController>,
    registry: CleanupRegistry,
    effects: EffectQueue,
    pointer: Rc<RefCell<PointerState>>,
    signals: Rc<RefCell<VecDeque<VisibilitySignal>>>,
    killed: Rc<RefCell<bool>>,
}

impl Showreel {
    /// Builds an engine around a mounted stage. Nothing runs until
    /// [`Showreel::initialize`].
    pub fn new(stage: Stage, env: HostEnv, config: DemoConfig) -> Self {
        Self {
            stage,
            env,
            config,
            state: LifecycleState::Uninitialized,
            caps: None,
            timeline: None,
            ambient: None,
            particles: None,
            visibility: None,
            registry: CleanupRegistry::new(),
            effects: Rc::new(RefCell::new(Vec::new())),
            pointer: Rc::new(RefCell::new(PointerState::default())),
            signals: Rc::new(RefCell::new(VecDeque::new())),
            killed: Rc::new(RefCell::new(false)),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Resolves handles and capabilities, builds the master timeline paused
    /// at time zero, and wires interactions and the visibility controller.
    /// Idempotent: a second call on an initialized engine does nothing.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != LifecycleState::Uninitialized {
            return Ok(());
        }

        let Some(hero) = self.stage.target(targets::HERO) else {
            tracing::warn!("primary presentation surface missing; initialize aborted");
            return Err(ShowreelError::MissingTarget(targets::HERO.to_string()));
        };

        let caps = Capabilities::resolve(&self.env);
        if let Err(err) = caps.require_sequencing() {
            // Fail fast: leave hosted content in its default visible state.
            tracing::warn!(error = %err, "demo disabled");
            hero.borrow_mut().opacity = 1.0;
            self.state = LifecycleState::Disabled;
            return Ok(());
        }

        let seed = self.config.seed.unwrap_or(DEFAULT_SEED);
        if let Some(backdrop) = self.stage.backdrop() {
            backdrop.borrow_mut().reset();
        }

        let mut timeline = scene::build_timeline(&self.stage, &caps, &self.config, &self.effects);
        if self.env.reduced_motion {
            timeline.set_time_scale(self.config.motion.reduced_time_scale);
        }
        self.timeline = Some(timeline);
        self.particles = Some(ParticleField::new(
            self.stage.surface(),
            self.config.bursts.clone(),
            &self.env,
            seed,
        ));
        self.ambient = Some(AmbientSession::new(self.effects.clone(), seed ^ 0xa51));
        self.visibility = Some(VisibilityController::new(caps.viewport, self.env.page_visible));

        self.wire_listeners(&caps);
        self.caps = Some(caps);
        self.state = LifecycleState::Ready;
        tracing::info!(version = VERSION, "showreel initialized");
        Ok(())
    }

    fn wire_listeners(&mut self, caps: &Capabilities) {
        let bus = self.stage.bus();

        // Pointer / tilt input for parallax and magnetic hover.
        let pointer = self.pointer.clone();
        let id = bus.borrow_mut().subscribe(Box::new(move |event| match event {
            StageEvent::PointerMoved { x, y } => {
                *pointer.borrow_mut() = PointerState {
                    x: x.clamp(-1.0, 1.0),
                    y: y.clamp(-1.0, 1.0),
                    present: true,
                }
            }
            StageEvent::PointerLeft => pointer.borrow_mut().present = false,
            _ => {}
        }));
        let unsubscribe = bus.clone();
        self.registry.defer(move || unsubscribe.borrow_mut().unsubscribe(id));

        // Viewport, page-visibility, and resize signals under the resolved
        // viewport strategy.
        let strategy = caps.viewport;
        let signals = self.signals.clone();
        let id = bus.borrow_mut().subscribe(Box::new(move |event| {
            if let Some(signal) = signal_from_event(strategy, event) {
                signals.borrow_mut().push_back(signal);
            }
        }));
        let unsubscribe = bus.clone();
        self.registry.defer(move || unsubscribe.borrow_mut().unsubscribe(id));

        // Page-unload safety kill.
        let killed = self.killed.clone();
        let id = bus.borrow_mut().subscribe(Box::new(move |event| {
            if matches!(event, StageEvent::Unload) {
                *killed.borrow_mut() = true;
            }
        }));
        let unsubscribe = bus.clone();
        self.registry.defer(move || unsubscribe.borrow_mut().unsubscribe(id));
    }

    /// Full teardown: stops every timeline and loop, releases graphics
    /// resources, reverses every registry entry. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.state == LifecycleState::Uninitialized {
            return;
        }

        if let Some(timeline) = &mut self.timeline {
            timeline.pause();
        }
        self.timeline = None;
        if let Some(ambient) = &mut self.ambient {
            ambient.stop();
        }
        self.ambient = None;
        if let Some(particles) = &mut self.particles {
            particles.teardown();
        }
        self.particles = None;
        if let Some(backdrop) = self.stage.backdrop() {
            backdrop.borrow_mut().release();
        }

        self.registry.dispose_all();
        self.signals.borrow_mut().clear();
        self.effects.borrow_mut().clear();
        *self.pointer.borrow_mut() = PointerState::default();
        *self.killed.borrow_mut() = false;
        self.visibility = None;
        self.caps = None;
        self.state = LifecycleState::Uninitialized;
        tracing::info!("showreel destroyed");
    }

    /// Destroy followed by initialize, for re-activation after dynamic
    /// content changes. Initialization failure is logged, never raised.
    pub fn rebuild(&mut self) {
        self.destroy();
        if let Err(err) = self.initialize() {
            tracing::warn!(error = %err, "rebuild could not re-initialize");
        }
    }

    /// Starts the ambient session and plays the master timeline from zero.
    pub fn play(&mut self) {
        if self.state != LifecycleState::Ready {
            return;
        }
        self.start_ambient();
        if let Some(timeline) = &mut self.timeline {
            timeline.seek_start();
            timeline.play();
        }
    }

    pub fn pause(&mut self) {
        if self.state != LifecycleState::Ready {
            return;
        }
        if let Some(timeline) = &mut self.timeline {
            timeline.pause();
        }
        if let Some(ambient) = &mut self.ambient {
            ambient.stop();
        }
    }

    /// Rewinds to time zero, paused, with the ambient session stopped.
    pub fn reset(&mut self) {
        if self.state != LifecycleState::Ready {
            return;
        }
        if let Some(timeline) = &mut self.timeline {
            timeline.seek_start();
            timeline.pause();
        }
        if let Some(ambient) = &mut self.ambient {
            ambient.stop();
        }
    }

    /// Adjusts the playback rate. A caller write always wins over the
    /// reduced-motion default until the next rebuild re-applies it.
    pub fn set_time_scale(&mut self, factor: f32) {
        if self.state != LifecycleState::Ready {
            return;
        }
        if let Some(timeline) = &mut self.timeline {
            timeline.set_time_scale(factor);
        }
    }

    pub fn is_active(&self) -> bool {
        self.timeline
            .as_ref()
            .map(Timeline::is_playing)
            .unwrap_or(false)
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    pub fn time_scale(&self) -> f32 {
        self.timeline
            .as_ref()
            .map(Timeline::time_scale)
            .unwrap_or(1.0)
    }

    /// Virtual timeline time consumed since the last seek.
    pub fn virtual_elapsed(&self) -> f32 {
        self.timeline
            .as_ref()
            .map(Timeline::virtual_elapsed)
            .unwrap_or(0.0)
    }

    pub fn current_scene(&self) -> Option<&str> {
        self.timeline.as_ref().and_then(Timeline::current_segment)
    }

    pub fn loops_completed(&self) -> u64 {
        self.timeline
            .as_ref()
            .map(Timeline::loops_completed)
            .unwrap_or(0)
    }

    pub fn ambient_active(&self) -> bool {
        self.ambient
            .as_ref()
            .map(AmbientSession::is_active)
            .unwrap_or(false)
    }

    /// Forwards a host event to every live subscription. Harmless before
    /// initialization and after destroy: the bus is empty then.
    pub fn dispatch(&mut self, event: StageEvent) {
        self.stage.emit(&event);
    }

    /// One frame of engine time. Order within the frame: environment
    /// signals, pointer input, master timeline, ambient session, queued
    /// burst effects, particle simulation.
    pub fn advance(&mut self, dt: f32) {
        if self.state != LifecycleState::Ready {
            return;
        }
        if *self.killed.borrow() {
            tracing::info!("unload received; stopping all animation work");
            self.destroy();
            return;
        }

        self.apply_signals();
        self.apply_pointer();

        if let Some(timeline) = &mut self.timeline {
            let outcome = timeline.advance(dt);
            for name in &outcome.started {
                tracing::debug!(scene = name.as_str(), "scene started");
            }
            for fault in &outcome.faults {
                // Non-fatal guard: a broken hook never takes playback down.
                tracing::warn!(error = %fault, "animation fault; playback continues");
            }
        }

        if let Some(ambient) = &mut self.ambient {
            ambient.advance(dt);
        }

        let requests: Vec<_> = self.effects.borrow_mut().drain(..).collect();
        if let Some(particles) = &mut self.particles {
            for request in requests {
                particles.burst(request.origin, request.color, request.count);
            }
            particles.step();
        }
    }

    fn apply_signals(&mut self) {
        loop {
            let signal = self.signals.borrow_mut().pop_front();
            let Some(signal) = signal else { break };
            let playing = self.is_active();
            let Some(visibility) = &mut self.visibility else {
                break;
            };
            for directive in visibility.apply(signal, playing) {
                match directive {
                    PlaybackDirective::Suspend => {
                        tracing::debug!("suspending playback");
                        if let Some(timeline) = &mut self.timeline {
                            timeline.pause();
                        }
                        if let Some(ambient) = &mut self.ambient {
                            ambient.stop();
                        }
                    }
                    PlaybackDirective::Resume { resume_playback } => {
                        tracing::debug!(resume_playback, "resuming playback");
                        if resume_playback {
                            self.start_ambient();
                            if let Some(timeline) = &mut self.timeline {
                                timeline.play();
                            }
                        }
                    }
                    PlaybackDirective::RefreshGeometry { width, height } => {
                        if let Some(surface) = self.stage.surface() {
                            surface.borrow_mut().resize(width, height);
                        }
                        self.env.viewport_width = width;
                        self.env.viewport_height = height;
                    }
                }
            }
        }
    }

    fn start_ambient(&mut self) {
        let backdrop = self.caps.map(|caps| caps.backdrop).unwrap_or(false);
        if let Some(ambient) = &mut self.ambient {
            ambient.start(&self.stage, &self.config, &self.env, backdrop);
        }
    }

    /// Pointer-driven parallax and magnetic hover. Targets holding a
    /// parallax lock are left alone.
    fn apply_pointer(&mut self) {
        let pointer = *self.pointer.borrow();
        let range = self.config.motion.parallax_range;
        let pull = self.config.motion.magnet_pull;
        for handle in self.stage.each_target() {
            let mut target = handle.borrow_mut();
            if target.parallax_locked || target.parallax_depth == 0.0 {
                continue;
            }
            if pointer.present {
                let mut dx = pointer.x * target.parallax_depth * range;
                let mut dy = pointer.y * target.parallax_depth * range;
                if target.magnetic {
                    dx += pointer.x * pull;
                    dy += pointer.y * pull;
                }
                target.parallax_x = dx;
                target.parallax_y = dy;
            } else {
                target.parallax_x = 0.0;
                target.parallax_y = 0.0;
            }
        }
    }
}

impl fmt::Debug for Showreel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Showreel")
            .field("state", &self.state)
            .field("active", &self.is_active())
            .field("current_scene", &self.current_scene())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn engine() -> Showreel {
        Showreel::new(Stage::standard(), HostEnv::default(), DemoConfig::default())
    }

    fn ready_engine() -> Showreel {
        let mut engine = engine();
        engine.initialize().unwrap();
        engine
    }

    #[test]
    fn control_calls_before_initialization_are_safe_noops() {
        let mut engine = engine();
        engine.play();
        engine.pause();
        engine.reset();
        engine.set_time_scale(2.0);
        engine.advance(FRAME);
        engine.destroy();
        assert!(!engine.is_active());
        assert_eq!(engine.state(), LifecycleState::Uninitialized);

        engine.initialize().unwrap();
        engine.play();
        assert!(engine.is_active());
        assert_eq!(engine.virtual_elapsed(), 0.0);
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut engine = ready_engine();
        engine.play();
        engine.advance(0.5);
        let elapsed = engine.virtual_elapsed();

        engine.initialize().unwrap();
        assert!(engine.is_active());
        assert_eq!(engine.virtual_elapsed(), elapsed);
    }

    #[test]
    fn missing_primary_surface_aborts_initialization() {
        let mut engine = Showreel::new(Stage::new(), HostEnv::default(), DemoConfig::default());
        assert!(engine.initialize().is_err());
        assert_eq!(engine.state(), LifecycleState::Uninitialized);
        engine.play();
        assert!(!engine.is_active());
    }

    #[test]
    fn missing_sequencing_runtime_disables_and_leaves_content_visible() {
        let stage = Stage::standard();
        let hero = stage.target(targets::HERO).unwrap();
        hero.borrow_mut().opacity = 0.2;

        let env = HostEnv {
            sequencing_runtime: false,
            ..HostEnv::default()
        };
        let mut engine = Showreel::new(stage, env, DemoConfig::default());
        engine.initialize().unwrap();

        assert_eq!(engine.state(), LifecycleState::Disabled);
        assert_eq!(hero.borrow().opacity, 1.0);

        engine.play();
        engine.advance(FRAME);
        assert!(!engine.is_active());
        assert!(!engine.ambient_active());
    }

    #[test]
    fn play_starts_ambient_and_timeline_from_zero() {
        let mut engine = ready_engine();
        engine.play();
        engine.advance(0.5);
        assert!(engine.is_active());
        assert!(engine.ambient_active());
        assert_eq!(engine.current_scene(), Some("intro"));

        // play() restarts from time zero.
        engine.play();
        assert_eq!(engine.virtual_elapsed(), 0.0);
    }

    #[test]
    fn pause_stops_the_ambient_session_too() {
        let mut engine = ready_engine();
        engine.play();
        engine.pause();
        assert!(!engine.is_active());
        assert!(!engine.ambient_active());
    }

    #[test]
    fn reset_rewinds_paused() {
        let mut engine = ready_engine();
        engine.play();
        engine.advance(1.0);
        engine.reset();
        assert!(!engine.is_active());
        assert_eq!(engine.virtual_elapsed(), 0.0);
    }

    #[test]
    fn destroy_is_reentrant_and_reverses_every_listener() {
        let mut engine = ready_engine();
        engine.play();
        engine.destroy();
        assert!(!engine.is_active());
        assert_eq!(engine.state(), LifecycleState::Uninitialized);
        assert!(engine.stage().bus().borrow().is_empty());

        engine.destroy();
        assert_eq!(engine.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn rebuild_restores_fresh_playback_behavior() {
        let mut engine = ready_engine();
        engine.play();
        engine.advance(2.0);
        engine.destroy();

        engine.rebuild();
        assert_eq!(engine.state(), LifecycleState::Ready);
        assert!(!engine.is_active());

        engine.play();
        assert!(engine.is_active());
        assert_eq!(engine.virtual_elapsed(), 0.0);
        engine.pause();
        assert!(!engine.is_active());
    }

    #[test]
    fn suspend_resume_replays_only_when_playing_at_suspend_time() {
        let mut engine = ready_engine();
        engine.play();

        engine.dispatch(StageEvent::Scroll { progress: 1.4 });
        engine.advance(FRAME);
        assert!(!engine.is_active());
        assert!(!engine.ambient_active());

        engine.dispatch(StageEvent::Scroll { progress: 0.5 });
        engine.advance(FRAME);
        assert!(engine.is_active());
        assert!(engine.ambient_active());
    }

    #[test]
    fn scrolling_never_auto_starts_an_idle_demo() {
        let mut engine = ready_engine();
        engine.dispatch(StageEvent::Scroll { progress: -0.2 });
        engine.advance(FRAME);
        engine.dispatch(StageEvent::Scroll { progress: 0.5 });
        engine.advance(FRAME);
        assert!(!engine.is_active());
        assert!(!engine.ambient_active());
    }

    #[test]
    fn page_hidden_suspends_until_shown_again() {
        let mut engine = ready_engine();
        engine.play();
        engine.dispatch(StageEvent::PageVisibility { visible: false });
        engine.advance(FRAME);
        assert!(!engine.is_active());

        engine.dispatch(StageEvent::PageVisibility { visible: true });
        engine.advance(FRAME);
        assert!(engine.is_active());
    }

    #[test]
    fn half_time_scale_halves_virtual_progress() {
        let mut full = ready_engine();
        let mut half = ready_engine();
        full.play();
        half.play();
        half.set_time_scale(0.5);

        for _ in 0..60 {
            full.advance(FRAME);
            half.advance(FRAME);
        }
        assert!((half.virtual_elapsed() - full.virtual_elapsed() / 2.0).abs() < 1e-3);
    }

    #[test]
    fn caller_time_scale_wins_over_the_reduced_motion_default() {
        let env = HostEnv {
            reduced_motion: true,
            ..HostEnv::default()
        };
        let mut engine = Showreel::new(Stage::standard(), env, DemoConfig::default());
        engine.initialize().unwrap();
        assert_eq!(
            engine.time_scale(),
            DemoConfig::default().motion.reduced_time_scale
        );

        engine.set_time_scale(2.0);
        assert_eq!(engine.time_scale(), 2.0);
    }

    #[test]
    fn unload_kills_all_animation_work() {
        let mut engine = ready_engine();
        engine.play();
        engine.dispatch(StageEvent::Unload);
        engine.advance(FRAME);
        assert_eq!(engine.state(), LifecycleState::Uninitialized);
        assert!(!engine.is_active());
        assert!(engine.stage().bus().borrow().is_empty());
    }

    #[test]
    fn playback_reaches_bursts_that_draw_on_the_surface() {
        let mut engine = ready_engine();
        let surface = engine.stage().surface().unwrap();
        engine.play();
        for _ in 0..600 {
            engine.advance(0.1);
        }
        assert!(surface.borrow().mutation_count() > 0);
        assert!(engine.loops_completed() > 0);
    }

    #[test]
    fn pointer_parallax_skips_locked_targets() {
        let mut engine = ready_engine();
        let focal = engine.stage().target(targets::FOCAL).unwrap();
        focal.borrow_mut().parallax_locked = true;
        let logo = engine.stage().target(targets::LOGO).unwrap();

        engine.dispatch(StageEvent::PointerMoved { x: 1.0, y: 0.0 });
        engine.advance(FRAME);

        assert_eq!(focal.borrow().parallax_x, 0.0);
        assert!(logo.borrow().parallax_x > 0.0);

        engine.dispatch(StageEvent::PointerLeft);
        engine.advance(FRAME);
        assert_eq!(logo.borrow().parallax_x, 0.0);
    }

    #[test]
    fn resize_refreshes_surface_geometry() {
        let mut engine = ready_engine();
        engine.dispatch(StageEvent::Resized {
            width: 640.0,
            height: 360.0,
        });
        engine.advance(FRAME);
        let surface = engine.stage().surface().unwrap();
        assert_eq!(surface.borrow().width, 640.0);
    }
}
