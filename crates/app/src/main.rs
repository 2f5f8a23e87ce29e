use std::path::PathBuf;

use clap::{Parser, Subcommand};
use showreel_core::{scene, Capabilities, DemoConfig, HostEnv, Showreel, Stage, StageEvent};
use tracing_subscriber::EnvFilter;

fn main() -> showreel_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            frames,
            fps,
            reduced_motion,
            small_screen,
            preset,
        } => run_headless(frames, fps, reduced_motion, small_screen, preset.as_deref()),
        Commands::Scenes => list_scenes(),
    }
}

fn run_headless(
    frames: u32,
    fps: u32,
    reduced_motion: bool,
    small_screen: bool,
    preset: Option<&std::path::Path>,
) -> showreel_core::Result<()> {
    let config = match preset {
        Some(path) => DemoConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => DemoConfig::default(),
    };
    let env = HostEnv {
        reduced_motion,
        viewport_width: if small_screen { 390.0 } else { 1280.0 },
        ..HostEnv::default()
    };

    tracing::info!(frames, fps, reduced_motion, "starting headless run");

    let mut engine = Showreel::new(Stage::standard(), env, config);
    engine.initialize()?;
    engine.play();

    let dt = 1.0 / fps.max(1) as f32;
    let mut last_scene = String::new();
    for frame in 0..frames {
        // A little pointer drift so the parallax path is exercised too.
        let t = frame as f32 * dt;
        engine.dispatch(StageEvent::PointerMoved {
            x: (t * 0.4).sin(),
            y: (t * 0.3).cos(),
        });
        engine.advance(dt);

        if let Some(current) = engine.current_scene() {
            if current != last_scene {
                tracing::info!(scene = current, t, "scene");
                last_scene = current.to_string();
            }
        }
    }

    tracing::info!(
        loops = engine.loops_completed(),
        elapsed = engine.virtual_elapsed(),
        "run finished"
    );
    engine.destroy();
    Ok(())
}

fn list_scenes() -> showreel_core::Result<()> {
    let stage = Stage::standard();
    let config = DemoConfig::default();
    let caps = Capabilities::resolve(&HostEnv::default());
    let effects = showreel_core::EffectQueue::default();
    let timeline = scene::build_timeline(&stage, &caps, &config, &effects);

    for segment in timeline.segments() {
        println!("{:<12} {} steps", segment.name(), segment.step_count());
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Looping product demo engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the demo headlessly for a fixed number of frames.
    Run {
        /// Number of frames to step through.
        #[arg(long, default_value_t = 600)]
        frames: u32,
        /// Virtual frame rate used to derive the per-frame delta.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Simulate a reduced-motion preference.
        #[arg(long)]
        reduced_motion: bool,
        /// Simulate a small-screen viewport.
        #[arg(long)]
        small_screen: bool,
        /// Optional JSON preset overriding the default configuration.
        #[arg(short, long)]
        preset: Option<PathBuf>,
    },
    /// Print the fixed scene order of the master timeline.
    Scenes,
}
