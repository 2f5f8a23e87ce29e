use crate::caps::Capabilities;
use crate::config::{DemoConfig, TimingConfig};
use crate::particles::{BurstRequest, EffectQueue};
use crate::stage::{targets, Color, Prop, Stage, TargetHandle};
use crate::tween::{Easing, Hook, Reveal, Segment, Step, Timeline, Tween};

/// The fixed scene order of the master timeline.
pub const SCENE_ORDER: [&str; 9] = [
    "intro",
    "typing",
    "showcase",
    "customize",
    "export",
    "integration",
    "security",
    "catalog",
    "signup",
];

/// Optional boundary callbacks a caller can attach to any scene factory.
#[derive(Default)]
pub struct SceneHooks {
    pub on_start: Option<Hook>,
    pub on_complete: Option<Hook>,
}

impl SceneHooks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at_start(hook: Hook) -> Self {
        Self {
            on_start: Some(hook),
            ..Self::default()
        }
    }
}

fn apply_hooks(mut segment: Segment, hooks: SceneHooks) -> Segment {
    if let Some(hook) = hooks.on_start {
        segment = segment.on_start(hook);
    }
    if let Some(hook) = hooks.on_complete {
        segment = segment.on_complete(hook);
    }
    segment
}

/// Crossfade into `group`, fading the previous scene's group out while this
/// one comes in. Works without the previous group: that scene degraded to a
/// no-op and left nothing visible.
fn crossfade(stage: &Stage, prev: &str, group: &TargetHandle, timing: &TimingConfig) -> Step {
    let mut tweens = vec![Tween::new(group.clone(), Prop::Opacity, 1.0, timing.crossfade)
        .from(0.0)
        .ease(Easing::QuadOut)];
    if let Some(prev) = stage.target(prev) {
        tweens.push(Tween::new(prev, Prop::Opacity, 0.0, timing.crossfade).ease(Easing::QuadOut));
    }
    Step::Together(tweens)
}

fn burst_hook(effects: &EffectQueue, origin: (f32, f32), color: Color, count: usize) -> Hook {
    let effects = effects.clone();
    Box::new(move || {
        effects.borrow_mut().push(BurstRequest {
            origin,
            color,
            count,
        });
        Ok(())
    })
}

/// Opening reveal. Recenters the floating focal element and holds it out of
/// the parallax pipeline until the scene completes.
pub fn intro_scene(stage: &Stage, timing: &TimingConfig, hooks: SceneHooks) -> Segment {
    let Some(hero) = stage.target(targets::HERO) else {
        return Segment::empty("intro");
    };
    let focal = stage.target(targets::FOCAL);

    let lock = focal.clone();
    let mut user_start = hooks.on_start;
    let start: Hook = Box::new(move || {
        if let Some(focal) = &lock {
            let mut focal = focal.borrow_mut();
            focal.x = 0.0;
            focal.y = 0.0;
            focal.parallax_x = 0.0;
            focal.parallax_y = 0.0;
            focal.parallax_locked = true;
        }
        match user_start.as_mut() {
            Some(hook) => hook(),
            None => Ok(()),
        }
    });

    let release = focal.clone();
    let mut user_complete = hooks.on_complete;
    let complete: Hook = Box::new(move || {
        if let Some(focal) = &release {
            focal.borrow_mut().parallax_locked = false;
        }
        match user_complete.as_mut() {
            Some(hook) => hook(),
            None => Ok(()),
        }
    });

    let mut entrance = vec![
        Tween::new(hero.clone(), Prop::Opacity, 1.0, timing.reveal).from(0.0),
        Tween::new(hero.clone(), Prop::Scale, 1.0, timing.reveal)
            .from(0.92)
            .ease(Easing::BackOut),
    ];
    if let Some(prev) = stage.target(targets::SIGNUP) {
        // Looping: the last scene's group is still up when the intro replays.
        entrance.push(Tween::new(prev, Prop::Opacity, 0.0, timing.crossfade));
    }
    if let Some(focal) = &focal {
        entrance.push(
            Tween::new(focal.clone(), Prop::Opacity, 1.0, timing.reveal)
                .from(0.0)
                .delay(timing.reveal * 0.3),
        );
    }

    Segment::new("intro")
        .on_start(start)
        .on_complete(complete)
        .step(Step::Together(entrance))
        .step(Step::wait(timing.dwell))
}

/// Description line revealed character by character under a blinking caret.
/// The reveal strategy was bound at capability resolution.
pub fn typing_scene(
    stage: &Stage,
    caps: &Capabilities,
    timing: &TimingConfig,
    hooks: SceneHooks,
) -> Segment {
    let Some(tagline) = stage.target(targets::TAGLINE) else {
        return Segment::empty("typing");
    };
    let caret = stage.target(targets::CARET);

    apply_hooks(
        Segment::new("typing")
            .step(crossfade(stage, targets::HERO, &tagline, timing))
            .step(Step::Reveal(Reveal::new(
                tagline.clone(),
                caret,
                timing.typing,
                caps.text_reveal,
            )))
            .step(Step::wait(timing.dwell)),
        hooks,
    )
}

/// Capability showcase with a celebratory burst as it lands.
pub fn showcase_scene(
    stage: &Stage,
    timing: &TimingConfig,
    effects: &EffectQueue,
    hooks: SceneHooks,
) -> Segment {
    let Some(group) = stage.target(targets::SHOWCASE) else {
        return Segment::empty("showcase");
    };

    apply_hooks(
        Segment::new("showcase")
            .step(crossfade(stage, targets::TAGLINE, &group, timing))
            .step(Step::call(burst_hook(effects, (0.5, 0.4), Color::ACCENT, 24)))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Scale, 1.0, 0.5)
                    .from(0.9)
                    .ease(Easing::BackOut),
            ))
            .step(Step::wait(timing.dwell)),
        hooks,
    )
}

pub fn customize_scene(stage: &Stage, timing: &TimingConfig, hooks: SceneHooks) -> Segment {
    let Some(group) = stage.target(targets::CUSTOMIZE) else {
        return Segment::empty("customize");
    };

    apply_hooks(
        Segment::new("customize")
            .step(crossfade(stage, targets::SHOWCASE, &group, timing))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Rotation, 3.0, 0.4).ease(Easing::SineInOut),
            ))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Rotation, 0.0, 0.4).ease(Easing::SineInOut),
            ))
            .step(Step::wait(timing.dwell)),
        hooks,
    )
}

pub fn export_scene(stage: &Stage, timing: &TimingConfig, hooks: SceneHooks) -> Segment {
    let Some(group) = stage.target(targets::EXPORT) else {
        return Segment::empty("export");
    };

    apply_hooks(
        Segment::new("export")
            .step(crossfade(stage, targets::CUSTOMIZE, &group, timing))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Y, 0.0, 0.6)
                    .from(24.0)
                    .ease(Easing::CubicOut),
            ))
            .step(Step::wait(timing.dwell)),
        hooks,
    )
}

pub fn integration_scene(stage: &Stage, timing: &TimingConfig, hooks: SceneHooks) -> Segment {
    let Some(group) = stage.target(targets::INTEGRATION) else {
        return Segment::empty("integration");
    };

    apply_hooks(
        Segment::new("integration")
            .step(crossfade(stage, targets::EXPORT, &group, timing))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Glow, 1.0, 0.8).ease(Easing::SineInOut),
            ))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Glow, 0.2, 0.8).ease(Easing::SineInOut),
            ))
            .step(Step::wait(timing.dwell)),
        hooks,
    )
}

pub fn security_scene(stage: &Stage, timing: &TimingConfig, hooks: SceneHooks) -> Segment {
    let Some(group) = stage.target(targets::SECURITY) else {
        return Segment::empty("security");
    };

    apply_hooks(
        Segment::new("security")
            .step(crossfade(stage, targets::INTEGRATION, &group, timing))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Scale, 1.06, 0.5).ease(Easing::SineInOut),
            ))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Scale, 1.0, 0.5).ease(Easing::SineInOut),
            ))
            .step(Step::wait(timing.dwell)),
        hooks,
    )
}

pub fn catalog_scene(stage: &Stage, timing: &TimingConfig, hooks: SceneHooks) -> Segment {
    let Some(group) = stage.target(targets::CATALOG) else {
        return Segment::empty("catalog");
    };

    apply_hooks(
        Segment::new("catalog")
            .step(crossfade(stage, targets::SECURITY, &group, timing))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::X, 0.0, 0.9)
                    .from(-40.0)
                    .ease(Easing::CubicOut),
            ))
            .step(Step::wait(timing.dwell)),
        hooks,
    )
}

/// Closing call to action; fires a second burst as the loop lands.
pub fn signup_scene(
    stage: &Stage,
    timing: &TimingConfig,
    effects: &EffectQueue,
    hooks: SceneHooks,
) -> Segment {
    let Some(group) = stage.target(targets::SIGNUP) else {
        return Segment::empty("signup");
    };

    apply_hooks(
        Segment::new("signup")
            .step(crossfade(stage, targets::CATALOG, &group, timing))
            .step(Step::Tween(
                Tween::new(group.clone(), Prop::Scale, 1.0, 0.5)
                    .from(0.85)
                    .ease(Easing::BackOut),
            ))
            .step(Step::call(burst_hook(effects, (0.5, 0.6), Color::EMBER, 18)))
            .step(Step::wait(timing.dwell)),
        hooks,
    )
}

/// Composes all nine scenes, in order, into the master timeline. The result
/// is paused at time zero; the lifecycle manager decides when it plays.
pub fn build_timeline(
    stage: &Stage,
    caps: &Capabilities,
    config: &DemoConfig,
    effects: &EffectQueue,
) -> Timeline {
    let timing = &config.timing;
    let segments = vec![
        intro_scene(stage, timing, SceneHooks::none()),
        typing_scene(stage, caps, timing, SceneHooks::none()),
        showcase_scene(stage, timing, effects, SceneHooks::none()),
        customize_scene(stage, timing, SceneHooks::none()),
        export_scene(stage, timing, SceneHooks::none()),
        integration_scene(stage, timing, SceneHooks::none()),
        security_scene(stage, timing, SceneHooks::none()),
        catalog_scene(stage, timing, SceneHooks::none()),
        signup_scene(stage, timing, effects, SceneHooks::none()),
    ];
    Timeline::new(segments, timing.loop_delay)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::HostEnv;

    fn effects() -> EffectQueue {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn full_caps() -> Capabilities {
        Capabilities::resolve(&HostEnv::default())
    }

    #[test]
    fn every_factory_degrades_to_a_noop_on_an_empty_stage() {
        let stage = Stage::new();
        let timing = TimingConfig::default();
        let caps = full_caps();
        let effects = effects();

        let segments = [
            intro_scene(&stage, &timing, SceneHooks::none()),
            typing_scene(&stage, &caps, &timing, SceneHooks::none()),
            showcase_scene(&stage, &timing, &effects, SceneHooks::none()),
            customize_scene(&stage, &timing, SceneHooks::none()),
            export_scene(&stage, &timing, SceneHooks::none()),
            integration_scene(&stage, &timing, SceneHooks::none()),
            security_scene(&stage, &timing, SceneHooks::none()),
            catalog_scene(&stage, &timing, SceneHooks::none()),
            signup_scene(&stage, &timing, &effects, SceneHooks::none()),
        ];

        for (segment, expected) in segments.iter().zip(SCENE_ORDER) {
            assert!(segment.is_noop(), "{expected} should be a no-op");
            assert_eq!(segment.name(), expected);
        }
    }

    #[test]
    fn timeline_holds_all_scenes_in_declared_order() {
        let stage = Stage::standard();
        let timeline = build_timeline(&stage, &full_caps(), &DemoConfig::default(), &effects());
        assert_eq!(timeline.segment_count(), SCENE_ORDER.len());
        let names: Vec<&str> = timeline.segment_names().collect();
        assert_eq!(names, SCENE_ORDER);
        assert!(!timeline.is_playing());
    }

    #[test]
    fn intro_locks_parallax_for_its_duration_then_releases() {
        let stage = Stage::standard();
        let focal = stage.target(targets::FOCAL).unwrap();
        focal.borrow_mut().x = 33.0;

        let timing = TimingConfig::default();
        let mut segment = intro_scene(&stage, &timing, SceneHooks::none());

        let mut faults = Vec::new();
        segment.advance(0.1, &mut faults);
        assert!(focal.borrow().parallax_locked);
        assert_eq!(focal.borrow().x, 0.0);

        // Run well past the reveal and dwell.
        segment.advance(timing.reveal + timing.dwell + 1.0, &mut faults);
        assert!(!focal.borrow().parallax_locked);
        assert!(faults.is_empty());
    }

    #[test]
    fn showcase_queues_a_burst_when_it_lands() {
        let stage = Stage::standard();
        let timing = TimingConfig::default();
        let effects = effects();
        let mut segment = showcase_scene(&stage, &timing, &effects, SceneHooks::none());

        let mut faults = Vec::new();
        // Crossfade finishes and the burst hook runs.
        segment.advance(timing.crossfade + 0.1, &mut faults);
        assert_eq!(effects.borrow().len(), 1);

        // Replays request a fresh burst each loop.
        segment.reset();
        segment.advance(timing.crossfade + 0.1, &mut faults);
        assert_eq!(effects.borrow().len(), 2);
    }

    #[test]
    fn caller_hooks_ride_along_with_scene_behavior() {
        let stage = Stage::standard();
        let timing = TimingConfig::default();
        let seen = Rc::new(RefCell::new(0));
        let hook_seen = seen.clone();
        let hooks = SceneHooks::at_start(Box::new(move || {
            *hook_seen.borrow_mut() += 1;
            Ok(())
        }));

        let mut segment = intro_scene(&stage, &timing, hooks);
        let mut faults = Vec::new();
        segment.advance(0.1, &mut faults);
        assert_eq!(*seen.borrow(), 1);
        assert!(stage.target(targets::FOCAL).unwrap().borrow().parallax_locked);
    }

    #[test]
    fn scenes_crossfade_the_previous_group_out() {
        let stage = Stage::standard();
        let timing = TimingConfig::default();
        let hero = stage.target(targets::HERO).unwrap();
        hero.borrow_mut().opacity = 1.0;

        let caps = full_caps();
        let mut segment = typing_scene(&stage, &caps, &timing, SceneHooks::none());
        let mut faults = Vec::new();
        segment.advance(timing.crossfade, &mut faults);

        assert!(hero.borrow().opacity < 1e-5);
        let tagline = stage.target(targets::TAGLINE).unwrap();
        assert!((tagline.borrow().opacity - 1.0).abs() < 1e-5);
    }
}
