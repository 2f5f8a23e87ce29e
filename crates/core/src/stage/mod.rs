use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Canonical visual target names the scene factories and ambient loops look
/// up. Hosts mounting a custom stage use these to wire their own elements.
pub mod targets {
    pub const HERO: &str = "hero";
    pub const FOCAL: &str = "focal";
    pub const TAGLINE: &str = "tagline";
    pub const CARET: &str = "caret";
    pub const SHOWCASE: &str = "showcase";
    pub const CUSTOMIZE: &str = "customize";
    pub const EXPORT: &str = "export";
    pub const INTEGRATION: &str = "integration";
    pub const SECURITY: &str = "security";
    pub const CATALOG: &str = "catalog";
    pub const SIGNUP: &str = "signup";
    pub const GLOW: &str = "glow";
    pub const HAZE: &str = "haze";
    pub const LOGO: &str = "logo";
    pub const CIRCUIT: &str = "circuit";
}

/// Simple sRGB color used by the particle simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const ACCENT: Color = Color { r: 94, g: 234, b: 212 };
    pub const EMBER: Color = Color { r: 251, g: 146, b: 60 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Animatable properties exposed by a visual target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    Opacity,
    X,
    Y,
    Scale,
    Rotation,
    Glow,
    VisibleChars,
}

/// One named element on the presentation surface. Scenes tween its
/// properties; the pointer pipeline writes the parallax offsets.
#[derive(Debug, Clone)]
pub struct VisualTarget {
    name: String,
    pub opacity: f32,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub rotation: f32,
    pub glow: f32,
    pub text: String,
    pub visible_chars: usize,
    /// Parallax displacement factor; zero opts the target out entirely.
    pub parallax_depth: f32,
    /// While set, pointer input leaves the target alone.
    pub parallax_locked: bool,
    pub parallax_x: f32,
    pub parallax_y: f32,
    pub magnetic: bool,
}

impl VisualTarget {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            opacity: 1.0,
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation: 0.0,
            glow: 0.0,
            text: String::new(),
            visible_chars: 0,
            parallax_depth: 0.0,
            parallax_locked: false,
            parallax_x: 0.0,
            parallax_y: 0.0,
            magnetic: false,
        }
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.parallax_depth = depth;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn magnetic(mut self) -> Self {
        self.magnetic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, prop: Prop) -> f32 {
        match prop {
            Prop::Opacity => self.opacity,
            Prop::X => self.x,
            Prop::Y => self.y,
            Prop::Scale => self.scale,
            Prop::Rotation => self.rotation,
            Prop::Glow => self.glow,
            Prop::VisibleChars => self.visible_chars as f32,
        }
    }

    pub fn set(&mut self, prop: Prop, value: f32) {
        match prop {
            Prop::Opacity => self.opacity = value.clamp(0.0, 1.0),
            Prop::X => self.x = value,
            Prop::Y => self.y = value,
            Prop::Scale => self.scale = value,
            Prop::Rotation => self.rotation = value,
            Prop::Glow => self.glow = value,
            Prop::VisibleChars => {
                self.visible_chars = (value.max(0.0).round() as usize).min(self.text.chars().count())
            }
        }
    }
}

pub type TargetHandle = Rc<RefCell<VisualTarget>>;

/// Drawing surface the particle simulator renders into. The implementation
/// records mutation counts instead of pixels so tests can assert on exactly
/// how much drawing happened.
#[derive(Debug)]
pub struct DrawSurface {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
    detached: bool,
    mutations: u64,
    live_marks: usize,
}

impl DrawSurface {
    pub fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
            detached: false,
            mutations: 0,
            live_marks: 0,
        }
    }

    /// Clears the whole surface.
    pub fn clear(&mut self) {
        if self.detached {
            return;
        }
        self.mutations += 1;
        self.live_marks = 0;
    }

    pub fn fill_circle(&mut self, _x: f32, _y: f32, _radius: f32, _color: Color, _alpha: f32) {
        if self.detached {
            return;
        }
        self.mutations += 1;
        self.live_marks += 1;
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    /// Marks the surface as gone from the host. Further draw calls are
    /// ignored; the particle loop observes this and stops.
    pub fn detach(&mut self) {
        self.detached = true;
        self.live_marks = 0;
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Marks currently drawn since the last clear.
    pub fn live_marks(&self) -> usize {
        self.live_marks
    }
}

pub type SurfaceHandle = Rc<RefCell<DrawSurface>>;

/// Handle onto the background 3D layer. The engine only drives its
/// lifecycle; what it draws is the renderer's business.
#[derive(Debug, Default)]
pub struct Backdrop {
    running: bool,
    released: bool,
    frames_rendered: u64,
}

impl Backdrop {
    pub fn start(&mut self) {
        if self.released {
            return;
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn render_frame(&mut self) {
        if self.running {
            self.frames_rendered += 1;
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Releases GPU-side resources. The backdrop stays inert until the next
    /// initialize cycle calls [`Backdrop::reset`].
    pub fn release(&mut self) {
        self.running = false;
        self.released = true;
    }

    pub fn reset(&mut self) {
        self.released = false;
        self.running = false;
        self.frames_rendered = 0;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

pub type BackdropHandle = Rc<RefCell<Backdrop>>;

/// Environment and input events the host forwards to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// Pointer (or device tilt) position normalized to [-1, 1] per axis.
    PointerMoved { x: f32, y: f32 },
    PointerLeft,
    /// Scroll-linked progress of the surface through the viewport band.
    /// Inside [0, 1] means visible; either side means scrolled out.
    Scroll { progress: f32 },
    /// Intersection-observer style visibility report.
    Intersection { visible: bool },
    PageVisibility { visible: bool },
    Resized { width: f32, height: f32 },
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&StageEvent)>;

/// Single-threaded pub/sub for stage events. Every subscription is recorded
/// in the lifecycle manager's cleanup registry as a disposer, so teardown
/// leaves the bus empty and no handler can fire afterwards.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

impl EventBus {
    pub fn subscribe(&mut self, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, handler));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.handlers.retain(|(existing, _)| *existing != id);
    }

    pub fn emit(&mut self, event: &StageEvent) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

pub type BusHandle = Rc<RefCell<EventBus>>;

/// The presentation surface as the engine sees it: named visual targets, an
/// optional particle drawing surface, an optional backdrop layer, and the
/// event bus the host feeds.
#[derive(Debug, Default)]
pub struct Stage {
    targets: BTreeMap<String, TargetHandle>,
    surface: Option<SurfaceHandle>,
    backdrop: Option<BackdropHandle>,
    bus: BusHandle,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage with every canonical target mounted, a drawing surface, and a
    /// backdrop layer. Used by the headless driver and most tests.
    pub fn standard() -> Self {
        let mut stage = Self::new();
        stage.add_target(VisualTarget::named(targets::HERO));
        stage.add_target(VisualTarget::named(targets::FOCAL).with_depth(1.0).magnetic());
        stage.add_target(
            VisualTarget::named(targets::TAGLINE).with_text("Build demos people actually watch"),
        );
        stage.add_target(VisualTarget::named(targets::CARET));
        stage.add_target(VisualTarget::named(targets::SHOWCASE).with_depth(0.4));
        stage.add_target(VisualTarget::named(targets::CUSTOMIZE));
        stage.add_target(VisualTarget::named(targets::EXPORT));
        stage.add_target(VisualTarget::named(targets::INTEGRATION).with_depth(0.25));
        stage.add_target(VisualTarget::named(targets::SECURITY));
        stage.add_target(VisualTarget::named(targets::CATALOG));
        stage.add_target(VisualTarget::named(targets::SIGNUP).magnetic());
        stage.add_target(VisualTarget::named(targets::GLOW));
        stage.add_target(VisualTarget::named(targets::HAZE).with_depth(0.1));
        stage.add_target(VisualTarget::named(targets::LOGO).with_depth(0.6));
        stage.add_target(VisualTarget::named(targets::CIRCUIT));
        stage.set_surface(DrawSurface::new(1280.0, 800.0, 1.0));
        stage.set_backdrop(Backdrop::default());
        stage
    }

    pub fn add_target(&mut self, target: VisualTarget) -> TargetHandle {
        let name = target.name().to_string();
        let handle = Rc::new(RefCell::new(target));
        self.targets.insert(name, handle.clone());
        handle
    }

    pub fn target(&self, name: &str) -> Option<TargetHandle> {
        self.targets.get(name).cloned()
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn each_target(&self) -> impl Iterator<Item = &TargetHandle> {
        self.targets.values()
    }

    pub fn set_surface(&mut self, surface: DrawSurface) -> SurfaceHandle {
        let handle = Rc::new(RefCell::new(surface));
        self.surface = Some(handle.clone());
        handle
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface.clone()
    }

    pub fn set_backdrop(&mut self, backdrop: Backdrop) -> BackdropHandle {
        let handle = Rc::new(RefCell::new(backdrop));
        self.backdrop = Some(handle.clone());
        handle
    }

    pub fn backdrop(&self) -> Option<BackdropHandle> {
        self.backdrop.clone()
    }

    pub fn bus(&self) -> BusHandle {
        self.bus.clone()
    }

    /// Delivers one host event to every live subscription.
    pub fn emit(&self, event: &StageEvent) {
        self.bus.borrow_mut().emit(event);
    }
}
