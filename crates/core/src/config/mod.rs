use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the demo engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub timing: TimingConfig,
    pub bursts: BurstConfig,
    pub motion: MotionConfig,
    /// Seed for the burst scheduler and particle spread. `None` seeds from
    /// the scheduler default, which keeps headless runs reproducible.
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            bursts: BurstConfig::default(),
            motion: MotionConfig::default(),
            seed: None,
        }
    }
}

impl DemoConfig {
    /// Parses a JSON preset. Missing sections fall back to their defaults so
    /// presets only need to name the values they override.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Durations that shape the master timeline, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause between the end of one full loop and the start of the next.
    pub loop_delay: f32,
    /// Crossfade length shared by every scene transition.
    pub crossfade: f32,
    /// Opening reveal length of the intro scene.
    pub reveal: f32,
    /// Character reveal length of the typing scene.
    pub typing: f32,
    /// How long each scene holds after its entrance settles.
    pub dwell: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            loop_delay: 1.5,
            crossfade: 0.6,
            reveal: 1.2,
            typing: 2.4,
            dwell: 2.0,
        }
    }
}

/// Particle burst tuning shared by the simulator and the ambient scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    /// Uniform range the next ambient burst delay is drawn from, in seconds.
    pub interval: (f32, f32),
    /// Tighter range used on small screens.
    pub small_screen_interval: (f32, f32),
    /// Requested particle count per burst before device scaling.
    pub count: usize,
    /// Hard per-burst frame budget for the simulation loop.
    pub max_frames: u32,
    /// Constant per-frame downward acceleration.
    pub gravity: f32,
    /// Symmetric bound on initial particle velocity per axis.
    pub speed: f32,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            interval: (6.0, 12.0),
            small_screen_interval: (3.0, 7.0),
            count: 24,
            max_frames: 120,
            gravity: 0.18,
            speed: 3.2,
        }
    }
}

/// Pointer and accessibility motion tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Default time scale applied when the host signals reduced motion.
    pub reduced_time_scale: f32,
    /// Maximum parallax displacement at full pointer deflection, in pixels.
    pub parallax_range: f32,
    /// Extra pull applied to magnetic hover targets.
    pub magnet_pull: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            reduced_time_scale: 0.5,
            parallax_range: 18.0,
            magnet_pull: 6.0,
        }
    }
}

/// Snapshot of the host environment taken once per initialize cycle. All
/// capability resolution and device scaling reads from this, never from
/// scattered feature probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostEnv {
    pub reduced_motion: bool,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub pixel_ratio: f32,
    pub page_visible: bool,
    /// The tween/sequencing runtime. Required; absence disables the engine.
    pub sequencing_runtime: bool,
    /// Character-stream text reveal capability.
    pub character_stream: bool,
    /// Precise scroll-linked viewport trigger capability.
    pub scroll_linked_trigger: bool,
    /// Background 3D rendering capability.
    pub backdrop_renderer: bool,
}

impl Default for HostEnv {
    fn default() -> Self {
        Self {
            reduced_motion: false,
            viewport_width: 1280.0,
            viewport_height: 800.0,
            pixel_ratio: 1.0,
            page_visible: true,
            sequencing_runtime: true,
            character_stream: true,
            scroll_linked_trigger: true,
            backdrop_renderer: true,
        }
    }
}

impl HostEnv {
    pub fn small_screen(&self) -> bool {
        self.viewport_width < 768.0
    }

    pub fn high_density(&self) -> bool {
        self.pixel_ratio > 1.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_preset_keeps_defaults() {
        let config = DemoConfig::from_json(r#"{"timing": {"loop_delay": 3.0}}"#).unwrap();
        assert_eq!(config.timing.loop_delay, 3.0);
        assert_eq!(config.timing.crossfade, TimingConfig::default().crossfade);
        assert_eq!(config.bursts.count, BurstConfig::default().count);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = DemoConfig::default();
        let json = config.to_json().unwrap();
        let back = DemoConfig::from_json(&json).unwrap();
        assert_eq!(back.bursts.max_frames, config.bursts.max_frames);
    }

    #[test]
    fn device_classification() {
        let mut env = HostEnv::default();
        assert!(!env.small_screen());
        env.viewport_width = 390.0;
        env.pixel_ratio = 3.0;
        assert!(env.small_screen());
        assert!(env.high_density());
    }
}
