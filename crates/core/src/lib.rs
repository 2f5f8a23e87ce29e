//! Core library for the Showreel demo engine.
//!
//! Showreel choreographs a looping, multi-scene animated product demo on a
//! single presentation surface: a master timeline of scene segments, ambient
//! background loops, particle bursts, pointer-driven parallax, and
//! visibility-aware pause/resume, all behind a small control API with
//! leak-free teardown. Each module owns a distinct subsystem and the
//! lifecycle manager in [`engine`] ties them together.

pub mod ambient;
pub mod caps;
pub mod config;
pub mod engine;
pub mod error;
pub mod particles;
pub mod registry;
pub mod scene;
pub mod stage;
pub mod tween;
pub mod visibility;

pub use ambient::AmbientSession;
pub use caps::{Capabilities, RevealMode, ViewportStrategy};
pub use config::{BurstConfig, DemoConfig, HostEnv, MotionConfig, TimingConfig};
pub use engine::{LifecycleState, Showreel, VERSION};
pub use error::{Result, ShowreelError};
pub use particles::{BurstRequest, EffectQueue, ParticleField};
pub use registry::CleanupRegistry;
pub use scene::{SceneHooks, SCENE_ORDER};
pub use stage::{Color, DrawSurface, Stage, StageEvent, VisualTarget};
pub use tween::{Easing, FrameOutcome, Segment, Step, Timeline, Tween};
pub use visibility::{PlaybackDirective, VisibilityController, VisibilityState};
