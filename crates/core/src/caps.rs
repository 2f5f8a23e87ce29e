use crate::config::HostEnv;
use crate::error::ShowreelError;
use crate::Result;

/// How the typing scene reveals its text. Both modes produce the same
/// visible outcome; they differ only in what drives the character count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealMode {
    /// Character-stream capability present: characters arrive as a stream
    /// clocked against the segment position.
    Streamed,
    /// Manual fallback: per-frame progress accumulation.
    Incremental,
}

/// Which viewport-detection strategy feeds the visibility controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportStrategy {
    /// Precise scroll-linked trigger reporting progress through the band.
    ScrollLinked,
    /// Generic intersection observer fallback.
    Intersection,
}

/// Capability set resolved exactly once per initialize cycle. Every optional
/// collaborator is bound to its documented fallback here, never probed again
/// at call sites.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// The tween/sequencing runtime. Absent disables the whole engine.
    pub sequencing: bool,
    pub text_reveal: RevealMode,
    pub viewport: ViewportStrategy,
    /// Whether the background 3D layer participates at all.
    pub backdrop: bool,
}

impl Capabilities {
    pub fn resolve(env: &HostEnv) -> Self {
        Self {
            sequencing: env.sequencing_runtime,
            text_reveal: if env.character_stream {
                RevealMode::Streamed
            } else {
                RevealMode::Incremental
            },
            viewport: if env.scroll_linked_trigger {
                ViewportStrategy::ScrollLinked
            } else {
                ViewportStrategy::Intersection
            },
            backdrop: env.backdrop_renderer,
        }
    }

    /// Errors when the required sequencing runtime is unavailable. Optional
    /// capabilities never error; they bind fallbacks instead.
    pub fn require_sequencing(&self) -> Result<()> {
        if self.sequencing {
            Ok(())
        } else {
            Err(ShowreelError::MissingCapability("sequencing runtime"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_environment_resolves_primary_strategies() {
        let caps = Capabilities::resolve(&HostEnv::default());
        assert!(caps.sequencing);
        assert_eq!(caps.text_reveal, RevealMode::Streamed);
        assert_eq!(caps.viewport, ViewportStrategy::ScrollLinked);
        assert!(caps.backdrop);
    }

    #[test]
    fn missing_optionals_bind_fallbacks() {
        let env = HostEnv {
            character_stream: false,
            scroll_linked_trigger: false,
            backdrop_renderer: false,
            ..HostEnv::default()
        };
        let caps = Capabilities::resolve(&env);
        assert!(caps.sequencing);
        assert_eq!(caps.text_reveal, RevealMode::Incremental);
        assert_eq!(caps.viewport, ViewportStrategy::Intersection);
        assert!(!caps.backdrop);
    }

    #[test]
    fn sequencing_is_the_only_hard_requirement() {
        let env = HostEnv {
            sequencing_runtime: false,
            ..HostEnv::default()
        };
        assert!(Capabilities::resolve(&env).require_sequencing().is_err());
        assert!(Capabilities::resolve(&HostEnv::default())
            .require_sequencing()
            .is_ok());
    }
}
