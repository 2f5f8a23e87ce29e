use crate::caps::ViewportStrategy;
use crate::stage::StageEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Active,
    Suspended,
}

/// Normalized environment signal, independent of which viewport strategy
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisibilitySignal {
    SurfaceEntered,
    SurfaceLeft,
    PageShown,
    PageHidden,
    Resized { width: f32, height: f32 },
}

/// What the lifecycle manager should do in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackDirective {
    /// Pause the master timeline and stop the ambient session.
    Suspend,
    /// Restart the ambient session; resume the timeline only when the
    /// captured flag says it was playing at suspend time.
    Resume { resume_playback: bool },
    /// Re-measure surface geometry after a resize.
    RefreshGeometry { width: f32, height: f32 },
}

/// Translates a raw stage event into a visibility signal under the resolved
/// viewport strategy. The two strategies listen to different events but
/// yield identical suspend/resume semantics downstream.
pub fn signal_from_event(strategy: ViewportStrategy, event: &StageEvent) -> Option<VisibilitySignal> {
    match (strategy, event) {
        (ViewportStrategy::ScrollLinked, StageEvent::Scroll { progress }) => {
            // Inside the band means visible; leaving either boundary counts.
            if (0.0..=1.0).contains(progress) {
                Some(VisibilitySignal::SurfaceEntered)
            } else {
                Some(VisibilitySignal::SurfaceLeft)
            }
        }
        (ViewportStrategy::Intersection, StageEvent::Intersection { visible }) => Some(if *visible {
            VisibilitySignal::SurfaceEntered
        } else {
            VisibilitySignal::SurfaceLeft
        }),
        (_, StageEvent::PageVisibility { visible }) => Some(if *visible {
            VisibilitySignal::PageShown
        } else {
            VisibilitySignal::PageHidden
        }),
        (_, StageEvent::Resized { width, height }) => Some(VisibilitySignal::Resized {
            width: *width,
            height: *height,
        }),
        _ => None,
    }
}

/// Two-state machine suspending and resuming playback from viewport and
/// page-visibility signals. Pure: it emits directives and never touches the
/// timeline or ambient session itself.
#[derive(Debug)]
pub struct VisibilityController {
    state: VisibilityState,
    strategy: ViewportStrategy,
    in_viewport: bool,
    page_visible: bool,
    /// Captured at the moment of suspension so a resume never starts a
    /// timeline the user never started.
    was_playing: bool,
}

impl VisibilityController {
    pub fn new(strategy: ViewportStrategy, page_visible: bool) -> Self {
        Self {
            state: VisibilityState::Active,
            strategy,
            in_viewport: true,
            page_visible,
            was_playing: false,
        }
    }

    pub fn state(&self) -> VisibilityState {
        self.state
    }

    pub fn strategy(&self) -> ViewportStrategy {
        self.strategy
    }

    /// Feeds one signal through the state machine. `timeline_playing` is the
    /// live play state at this instant, not a cached value.
    pub fn apply(
        &mut self,
        signal: VisibilitySignal,
        timeline_playing: bool,
    ) -> Vec<PlaybackDirective> {
        let mut directives = Vec::new();

        match signal {
            VisibilitySignal::SurfaceEntered => self.in_viewport = true,
            VisibilitySignal::SurfaceLeft => self.in_viewport = false,
            VisibilitySignal::PageShown => self.page_visible = true,
            VisibilitySignal::PageHidden => self.page_visible = false,
            VisibilitySignal::Resized { width, height } => {
                directives.push(PlaybackDirective::RefreshGeometry { width, height });
            }
        }

        match self.state {
            VisibilityState::Active if !self.in_viewport || !self.page_visible => {
                self.was_playing = timeline_playing;
                self.state = VisibilityState::Suspended;
                directives.push(PlaybackDirective::Suspend);
            }
            VisibilityState::Suspended if self.in_viewport && self.page_visible => {
                self.state = VisibilityState::Active;
                directives.push(PlaybackDirective::Resume {
                    resume_playback: self.was_playing,
                });
            }
            _ => {}
        }

        directives
    }
}
