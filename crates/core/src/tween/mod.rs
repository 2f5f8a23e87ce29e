use std::f32::consts::PI;
use std::fmt;

use crate::caps::RevealMode;
use crate::error::ShowreelError;
use crate::stage::{Prop, TargetHandle};

/// Caret blink rate for text reveals, in full on/off cycles per second.
const BLINK_HZ: f32 = 1.6;

/// Callback attached to a segment boundary. Errors are collected by the
/// timeline and handed to the caller; they never stop playback.
pub type Hook = Box<dyn FnMut() -> crate::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    QuadOut,
    CubicOut,
    SineInOut,
    BackOut,
}

impl Easing {
    pub fn value(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
            Easing::BackOut => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                1.0 + c3 * (t - 1.0).powi(3) + c1 * (t - 1.0).powi(2)
            }
        }
    }
}

/// One property animation against one target. `from` defaults to whatever
/// value the target holds when the tween first becomes active, which is what
/// makes crossfades composable without knowing the prior scene's end state.
pub struct Tween {
    target: TargetHandle,
    prop: Prop,
    from: Option<f32>,
    to: f32,
    duration: f32,
    delay: f32,
    easing: Easing,
    elapsed: f32,
    captured_from: Option<f32>,
}

impl Tween {
    pub fn new(target: TargetHandle, prop: Prop, to: f32, duration: f32) -> Self {
        Self {
            target,
            prop,
            from: None,
            to,
            duration: duration.max(0.0),
            delay: 0.0,
            easing: Easing::QuadOut,
            elapsed: 0.0,
            captured_from: None,
        }
    }

    pub fn from(mut self, value: f32) -> Self {
        self.from = Some(value);
        self
    }

    pub fn delay(mut self, delay: f32) -> Self {
        self.delay = delay.max(0.0);
        self
    }

    pub fn ease(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    fn total(&self) -> f32 {
        self.delay + self.duration
    }

    fn reset(&mut self) {
        self.elapsed = 0.0;
        self.captured_from = None;
    }

    /// Advances by `dt` and returns the time left over past completion, or
    /// `None` while still running.
    fn advance(&mut self, dt: f32) -> Option<f32> {
        self.elapsed += dt;
        let active = self.elapsed - self.delay;
        if active < 0.0 {
            return None;
        }

        let from = *self
            .captured_from
            .get_or_insert_with(|| self.from.unwrap_or_else(|| self.target.borrow().get(self.prop)));

        let t = if self.duration <= 0.0 {
            1.0
        } else {
            (active / self.duration).min(1.0)
        };
        let value = from + (self.to - from) * self.easing.value(t);
        self.target.borrow_mut().set(self.prop, value);

        if active >= self.duration {
            Some(self.elapsed - self.total())
        } else {
            None
        }
    }
}

impl fmt::Debug for Tween {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tween")
            .field("target", &self.target.borrow().name().to_string())
            .field("prop", &self.prop)
            .field("to", &self.to)
            .field("duration", &self.duration)
            .field("delay", &self.delay)
            .finish()
    }
}

/// Text reveal with a blinking caret overlay. The two modes are the
/// interchangeable strategies for the typing scene; both land on the full
/// text after `duration` seconds.
pub struct Reveal {
    target: TargetHandle,
    caret: Option<TargetHandle>,
    duration: f32,
    mode: RevealMode,
    elapsed: f32,
    progress: f32,
}

impl Reveal {
    pub fn new(target: TargetHandle, caret: Option<TargetHandle>, duration: f32, mode: RevealMode) -> Self {
        Self {
            target,
            caret,
            duration: duration.max(0.0),
            mode,
            elapsed: 0.0,
            progress: 0.0,
        }
    }

    fn reset(&mut self) {
        self.elapsed = 0.0;
        self.progress = 0.0;
        self.target.borrow_mut().visible_chars = 0;
    }

    fn advance(&mut self, dt: f32) -> Option<f32> {
        self.elapsed += dt;

        let fraction = match self.mode {
            // Stream clocked against the step position.
            RevealMode::Streamed => {
                if self.duration <= 0.0 {
                    1.0
                } else {
                    (self.elapsed / self.duration).min(1.0)
                }
            }
            // Manual accumulation, the shape a per-frame callback produces.
            RevealMode::Incremental => {
                if self.duration <= 0.0 {
                    self.progress = 1.0;
                } else {
                    self.progress = (self.progress + dt / self.duration).min(1.0);
                }
                self.progress
            }
        };

        {
            let mut target = self.target.borrow_mut();
            let len = target.text.chars().count() as f32;
            target.set(Prop::VisibleChars, (fraction * len).floor());
        }

        let done = self.elapsed >= self.duration;
        if let Some(caret) = &self.caret {
            let blink_on = (self.elapsed * BLINK_HZ).fract() < 0.5;
            caret.borrow_mut().opacity = if !done && blink_on { 1.0 } else { 0.0 };
        }

        if done {
            let mut target = self.target.borrow_mut();
            target.visible_chars = target.text.chars().count();
            Some(self.elapsed - self.duration)
        } else {
            None
        }
    }
}

impl fmt::Debug for Reveal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reveal")
            .field("target", &self.target.borrow().name().to_string())
            .field("duration", &self.duration)
            .field("mode", &self.mode)
            .finish()
    }
}

/// One entry in a segment's ordered step list.
pub enum Step {
    Tween(Tween),
    /// A group of tweens running concurrently; the step completes when the
    /// longest member does. This is what scene crossfades are made of.
    Together(Vec<Tween>),
    Wait { duration: f32, elapsed: f32 },
    Call { hook: Hook, fired: bool },
    Reveal(Reveal),
}

impl Step {
    pub fn wait(duration: f32) -> Self {
        Step::Wait {
            duration: duration.max(0.0),
            elapsed: 0.0,
        }
    }

    pub fn call(hook: Hook) -> Self {
        Step::Call { hook, fired: false }
    }

    fn reset(&mut self) {
        match self {
            Step::Tween(tween) => tween.reset(),
            Step::Together(tweens) => {
                for tween in tweens {
                    tween.reset();
                }
            }
            Step::Wait { elapsed, .. } => *elapsed = 0.0,
            Step::Call { fired, .. } => *fired = false,
            Step::Reveal(reveal) => reveal.reset(),
        }
    }

    fn advance(&mut self, dt: f32, faults: &mut Vec<ShowreelError>) -> Option<f32> {
        match self {
            Step::Tween(tween) => tween.advance(dt),
            Step::Together(tweens) => {
                let mut leftover = f32::INFINITY;
                for tween in tweens.iter_mut() {
                    match tween.advance(dt) {
                        Some(extra) => leftover = leftover.min(extra),
                        None => leftover = -1.0,
                    }
                }
                if tweens.is_empty() {
                    Some(dt)
                } else if leftover >= 0.0 {
                    Some(leftover)
                } else {
                    None
                }
            }
            Step::Wait { duration, elapsed } => {
                *elapsed += dt;
                if *elapsed >= *duration {
                    Some(*elapsed - *duration)
                } else {
                    None
                }
            }
            Step::Call { hook, fired } => {
                if !*fired {
                    *fired = true;
                    if let Err(err) = hook() {
                        faults.push(err);
                    }
                }
                Some(dt)
            }
            Step::Reveal(reveal) => reveal.advance(dt),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Tween(tween) => f.debug_tuple("Tween").field(tween).finish(),
            Step::Together(tweens) => f.debug_tuple("Together").field(&tweens.len()).finish(),
            Step::Wait { duration, .. } => f.debug_tuple("Wait").field(duration).finish(),
            Step::Call { .. } => f.write_str("Call"),
            Step::Reveal(reveal) => f.debug_tuple("Reveal").field(reveal).finish(),
        }
    }
}

/// A named scene segment: ordered steps plus optional boundary hooks.
/// Factories that find their targets missing return [`Segment::empty`],
/// which is a valid member of the timeline that consumes no time.
pub struct Segment {
    name: String,
    steps: Vec<Step>,
    current: usize,
    started: bool,
    completed: bool,
    on_start: Option<Hook>,
    on_complete: Option<Hook>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            current: 0,
            started: false,
            completed: false,
            on_start: None,
            on_complete: None,
        }
    }

    /// A no-op segment that starts and completes in the same frame.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn on_start(mut self, hook: Hook) -> Self {
        self.on_start = Some(hook);
        self
    }

    pub fn on_complete(mut self, hook: Hook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.started = false;
        self.completed = false;
        for step in &mut self.steps {
            step.reset();
        }
    }

    fn fire(hook: &mut Option<Hook>, faults: &mut Vec<ShowreelError>) {
        if let Some(hook) = hook {
            if let Err(err) = hook() {
                faults.push(err);
            }
        }
    }

    /// Advances by `dt`, returning leftover time once the segment completes.
    pub fn advance(&mut self, mut dt: f32, faults: &mut Vec<ShowreelError>) -> Option<f32> {
        if self.completed {
            return Some(dt);
        }
        if !self.started {
            self.started = true;
            Self::fire(&mut self.on_start, faults);
        }

        while let Some(step) = self.steps.get_mut(self.current) {
            match step.advance(dt, faults) {
                None => return None,
                Some(leftover) => {
                    self.current += 1;
                    dt = leftover;
                }
            }
        }

        self.completed = true;
        Self::fire(&mut self.on_complete, faults);
        Some(dt)
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .field("current", &self.current)
            .field("started", &self.started)
            .finish()
    }
}

/// What one frame of timeline progress produced.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    /// Names of segments whose playback started this frame, in order.
    pub started: Vec<String>,
    /// Hook errors raised this frame. Logged by the caller, never fatal.
    pub faults: Vec<ShowreelError>,
}

/// The master timeline: the full ordered, infinitely looping composition of
/// scene segments with a fixed pause between loop iterations. Exactly one
/// exists per initialize cycle and the lifecycle manager owns it.
pub struct Timeline {
    segments: Vec<Segment>,
    current: usize,
    loop_delay: f32,
    delay_left: f32,
    playing: bool,
    time_scale: f32,
    virtual_elapsed: f32,
    loops_completed: u64,
}

impl Timeline {
    pub fn new(segments: Vec<Segment>, loop_delay: f32) -> Self {
        Self {
            segments,
            current: 0,
            loop_delay: loop_delay.max(0.0),
            delay_left: 0.0,
            playing: false,
            time_scale: 1.0,
            virtual_elapsed: 0.0,
            loops_completed: 0,
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Rewinds to time zero without changing the play state.
    pub fn seek_start(&mut self) {
        self.current = 0;
        self.delay_left = 0.0;
        self.virtual_elapsed = 0.0;
        for segment in &mut self.segments {
            segment.reset();
        }
    }

    pub fn set_time_scale(&mut self, factor: f32) {
        self.time_scale = factor.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Total virtual time consumed since the last seek.
    pub fn virtual_elapsed(&self) -> f32 {
        self.virtual_elapsed
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(Segment::name)
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn current_segment(&self) -> Option<&str> {
        self.segments.get(self.current).map(Segment::name)
    }

    pub fn loops_completed(&self) -> u64 {
        self.loops_completed
    }

    /// Advances real time by `dt`; segment order is strict and at most one
    /// segment is mid-transition when this returns.
    pub fn advance(&mut self, dt: f32) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        if !self.playing || self.segments.is_empty() {
            return outcome;
        }
        let mut dt = dt * self.time_scale;
        if dt <= 0.0 {
            return outcome;
        }
        self.virtual_elapsed += dt;

        // Bail out if a whole loop iteration consumed no time, which happens
        // when every segment is a no-op and the loop delay is zero.
        let mut dt_at_last_wrap = f32::INFINITY;

        loop {
            if self.delay_left > 0.0 {
                if dt < self.delay_left {
                    self.delay_left -= dt;
                    return outcome;
                }
                dt -= self.delay_left;
                self.delay_left = 0.0;
            }

            let segment = &mut self.segments[self.current];
            if !segment.has_started() {
                outcome.started.push(segment.name().to_string());
            }
            match segment.advance(dt, &mut outcome.faults) {
                None => return outcome,
                Some(leftover) => {
                    dt = leftover;
                    self.current += 1;
                    if self.current >= self.segments.len() {
                        self.current = 0;
                        self.loops_completed += 1;
                        for segment in &mut self.segments {
                            segment.reset();
                        }
                        self.delay_left = self.loop_delay;
                        if dt >= dt_at_last_wrap {
                            return outcome;
                        }
                        dt_at_last_wrap = dt;
                    }
                    if dt <= 0.0 {
                        return outcome;
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("segments", &self.segments.len())
            .field("current", &self.current)
            .field("playing", &self.playing)
            .field("time_scale", &self.time_scale)
            .field("loops_completed", &self.loops_completed)
            .finish()
    }
}
