use std::{path::PathBuf, time::Duration};

use bevy::{
    app::{AppExit, ScheduleRunnerPlugin},
    log::LogPlugin,
    prelude::*,
};
use clap::Parser;
use miette::{IntoDiagnostic, Result};


mod channel;
mod config;
mod controller;
mod domain;
mod protocol;
mod resource;
mod simulator;
mod status;
mod vision;

use config::SimConfig;
use domain::{Division, MatchState, PhysicsWorld, TickLoop};
use resource::{ConfigRes, LoopRes, MatchRes, StatusRes, TrackerRes, WorldRes};
use status::{MotionTracker, StatusReport};

/// Headless small-size robot soccer simulator.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Play on a division A field whatever the configuration says.
    #[arg(long)]
    force_division_a: bool,
    /// Stop after running this many seconds.
    #[arg(long, value_name = "SECONDS")]
    duration: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path).into_diagnostic()?,
        None => SimConfig::default(),
    };
    if cli.force_division_a {
        let forced = SimConfig {
            division: Division::A,
            ..config.clone()
        };
        config = forced.with_division_defaults(&config);
    }

    let world = PhysicsWorld::build(&config.world_spec()).into_diagnostic()?;
    let mut tick_loop = TickLoop::new();
    tick_loop
        .start(config.physics.desired_fps)
        .into_diagnostic()?;
    tick_loop.set_full_speed(config.physics.full_speed);

    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_millis(1))),
        LogPlugin::default(),
    ))
    .insert_resource(ConfigRes::from(config))
    .insert_resource(WorldRes::from(world))
    .insert_resource(MatchRes::from(MatchState::new()))
    .insert_resource(LoopRes::from(tick_loop))
    .insert_resource(TrackerRes::from(MotionTracker::default()))
    .insert_resource(StatusRes::from(StatusReport::default()))
    .add_plugins((controller::Controller, vision::Vision, simulator::Simulator));
    if let Some(seconds) = cli.duration {
        app.add_systems(Update, exit_after(Duration::from_secs(seconds)));
    }
    app.run();

    Ok(())
}

fn exit_after(limit: Duration) -> impl FnMut(Res<Time>, EventWriter<AppExit>) {
    move |time: Res<Time>, mut exit: EventWriter<AppExit>| {
        if time.elapsed() >= limit {
            exit.send(AppExit);
        }
    }
}
