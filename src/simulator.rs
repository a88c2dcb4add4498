//! Simulation of the match: runs physics ticks at the configured rate and reacts to operator
//! actions and configuration edits between ticks.
//!
//! Every tick steps the world, checks for goals and publishes a vision frame, in that order.
//! Commands, actions and edits are handled before the ticks of a frame, never during one.

use bevy::{app::AppExit, prelude::*};
use nalgebra::Vector3;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    config::{ConfigChange, SimConfig},
    controller::CommandReceiver,
    domain::{
        interval_for, Angle, BallSpot, LoopError, MatchState, PhysicsWorld, Pose, Position,
        Selection, Team, TickLoop, WheelID, WorldError, DAMPING_THRESHOLD,
    },
    protocol::PerturbationError,
    resource::{ConfigRes, LoopRes, MatchRes, StatusRes, TrackerRes, WorldRes},
    status::StatusReport,
    vision::VisionPublisher,
};

const STATUS_PERIOD: f64 = 1.0;

pub struct Simulator;

impl Plugin for Simulator {
    fn build(&self, app: &mut App) {
        app.add_event::<ConfigEdited>()
            .add_event::<SimAction>()
            .add_systems(
                Update,
                (
                    handle_config_edits,
                    handle_actions,
                    receive_commands,
                    simulate,
                    report_status,
                )
                    .chain(),
            )
            .add_systems(Last, stop_on_exit);
    }
}

/// A complete new configuration, as produced by whatever edits the settings.
#[derive(Event, Clone, Debug)]
pub struct ConfigEdited(pub SimConfig);

/// Operator interventions.
#[derive(Event, Clone, Debug, PartialEq)]
pub enum SimAction {
    PutBall(BallSpot),
    /// Moves the selected robot to a typed pose.
    PlaceSelected(PoseEntry),
    ToggleRobot { team: Team, id: usize },
    /// Back to the formation pose, at rest.
    ResetRobot { team: Team, id: usize },
    Select(Selection),
    MoveCursor(Vector3<f64>),
    /// Rebuilds the world from the current configuration and resets the score.
    Restart,
    CustomFps(f64),
}

/// Pose as typed by an operator: metres and degrees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseEntry {
    pub x: String,
    pub y: String,
    pub angle: String,
}

impl PoseEntry {
    pub fn parse(&self) -> Result<Pose, InputValidationError> {
        let field = |name: &'static str, value: &str| {
            value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| InputValidationError::NotNumeric {
                    field: name,
                    value: value.to_string(),
                })
        };
        Ok(Pose::new(
            Position::new(field("x", &self.x)?, field("y", &self.y)?),
            Angle::from_deg(field("angle", &self.angle)?),
        ))
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum InputValidationError {
    #[error("{field} is not a number: {value:?}")]
    NotNumeric { field: &'static str, value: String },
}

#[derive(Error, Debug, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Input(#[from] InputValidationError),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Loop(#[from] LoopError),
    #[error(transparent)]
    Perturbation(#[from] PerturbationError),
    #[error("no robot selected")]
    NoRobotSelected,
}

/// Mutable view of everything an action or an edit may touch.
pub struct Core<'a> {
    pub config: &'a mut SimConfig,
    pub world: &'a mut PhysicsWorld,
    pub match_state: &'a mut MatchState,
    pub tick_loop: &'a mut TickLoop,
    pub vision: &'a mut VisionPublisher,
    pub receiver: &'a mut CommandReceiver,
}

impl Core<'_> {
    /// Applies an edited configuration. An edit that cannot be applied completely is rejected
    /// before anything changes.
    pub fn apply_config_edit(&mut self, edited: SimConfig) -> Result<Vec<ConfigChange>, SimError> {
        let edited = edited.with_division_defaults(self.config);
        let changes = ConfigChange::between(self.config, &edited);

        interval_for(edited.physics.desired_fps)?;
        edited.perturbation().validate()?;
        let mut candidate = Some(PhysicsWorld::build(&edited.world_spec())?);
        for change in &changes {
            self.apply_change(change, &edited, &mut candidate)?;
        }
        *self.config = edited;
        Ok(changes)
    }

    fn apply_change(
        &mut self,
        change: &ConfigChange,
        edited: &SimConfig,
        candidate: &mut Option<PhysicsWorld>,
    ) -> Result<(), SimError> {
        match change {
            ConfigChange::Rebuild => {
                if let Some(world) = candidate.take() {
                    *self.world = world;
                }
                info!(
                    "world rebuilt: division {:?}, {} robots per team, {} contact surfaces",
                    self.world.field().division(),
                    self.world.robots_per_team(),
                    self.world.surfaces().len()
                );
            }
            ConfigChange::RestartRequired => {
                warn!("geometry changed, restart the simulation to apply it");
            }
            ConfigChange::BallMass(mass) => {
                self.world
                    .ball_mut()
                    .set_mass(*mass)
                    .map_err(WorldError::from)?;
            }
            ConfigChange::BallSurface => {
                self.world
                    .update_ball_surface(&edited.ball)
                    .map_err(WorldError::from)?;
            }
            ConfigChange::BallDamping { linear, angular } => {
                self.world
                    .ball_mut()
                    .set_damping(*linear, *angular, DAMPING_THRESHOLD);
            }
            ConfigChange::RobotMasses => {
                self.world
                    .set_robot_masses(&edited.robot)
                    .map_err(WorldError::from)?;
                if let Some(robot) = self.world.robots().first() {
                    let wheel = robot
                        .wheel_mass(WheelID::FrontLeft)
                        .map_err(WorldError::from)?;
                    info!(
                        chassis = robot.chassis_mass(),
                        aux = robot.aux_mass(),
                        kicker = robot.kicker_mass(),
                        wheel,
                        "robot body mass set to {} kg",
                        robot.body_mass()
                    );
                }
            }
            ConfigChange::Gravity(gravity) => {
                self.world.set_gravity(*gravity);
                info!("gravity set to {}", -self.world.gravity().z);
            }
            ConfigChange::TickRate(fps) => {
                self.tick_loop.set_rate(*fps)?;
                info!("new FPS set: {fps}");
            }
            ConfigChange::FullSpeed(full_speed) => self.tick_loop.set_full_speed(*full_speed),
            ConfigChange::VisionChannel { address, port } => {
                if let Err(err) = self.vision.reconfigure(address, *port) {
                    error!(%err, "vision channel disabled");
                }
            }
            ConfigChange::CommandPort(port) => {
                if let Err(err) = self.receiver.reconfigure(*port) {
                    error!(%err, "command channel disabled");
                }
            }
            ConfigChange::Perturbation => {
                self.vision.set_perturbation(edited.perturbation(), edited.seed)
            }
        }
        Ok(())
    }

    pub fn apply_action(&mut self, action: &SimAction) -> Result<(), SimError> {
        let reset_velocity = self.config.physics.reset_velocity_on_teleport;
        match action {
            SimAction::PutBall(spot) => {
                let position = self.world.field().ball_spot(*spot);
                let ball = self.world.ball_mut();
                ball.put_at(position);
                if reset_velocity {
                    ball.zero_velocity();
                }
            }
            SimAction::PlaceSelected(entry) => {
                let Selection::Robot { team, id } = self.match_state.selection() else {
                    return Err(SimError::NoRobotSelected);
                };
                let pose = entry.parse()?;
                let robot = self.world.robot_mut(team, id)?;
                robot.set_xy(pose.position.x(), pose.position.y());
                robot.set_dir(pose.heading);
                if reset_velocity {
                    robot.zero_velocity();
                }
                let placed = robot.pose();
                info!(
                    "robot {id}:{team:?} placed at x={:.3} y={:.3} angle={:.1}",
                    placed.position.x(),
                    placed.position.y(),
                    placed.heading.to_deg()
                );
            }
            SimAction::ToggleRobot { team, id } => {
                let robot = self.world.robot_mut(*team, *id)?;
                robot.set_on(!robot.is_on());
                let state = if robot.is_on() { "on" } else { "off" };
                info!("robot {id}:{team:?} turned {state}");
            }
            SimAction::ResetRobot { team, id } => {
                let pose = self
                    .world
                    .formation_pose(*team, *id)
                    .ok_or(WorldError::UnknownRobot(*team, *id))?;
                let robot = self.world.robot_mut(*team, *id)?;
                robot.set_pose(pose);
                robot.zero_velocity();
            }
            SimAction::Select(selection) => self.match_state.select(*selection),
            SimAction::MoveCursor(cursor) => self.match_state.move_cursor(*cursor),
            SimAction::Restart => {
                self.world.rebuild(&self.config.world_spec())?;
                self.match_state.reset();
                info!("simulation restarted");
            }
            SimAction::CustomFps(fps) => {
                self.tick_loop.set_rate(*fps)?;
                self.config.physics.desired_fps = *fps;
                info!("new FPS set by user: {fps}");
            }
        }
        Ok(())
    }
}

/// One tick: physics step, goal check, vision frame. Returns the team that scored, if any.
pub fn run_tick(
    world: &mut PhysicsWorld,
    match_state: &mut MatchState,
    vision: &mut VisionPublisher,
    dt: f64,
) -> Result<Option<Team>, WorldError> {
    world.step(dt)?;
    let scored = match_state.check_goal(world.field(), world.ball());
    if let Some(team) = scored {
        let score = match_state.score();
        info!(
            "goal for {team:?}: BLUE {} x {} YELLOW",
            score.goals_blue, score.goals_yellow
        );
    }
    let frame = vision.capture(world);
    vision.publish(frame);
    Ok(scored)
}

#[allow(clippy::too_many_arguments)]
fn handle_config_edits(
    mut events: EventReader<ConfigEdited>,
    mut config: ResMut<ConfigRes>,
    mut world: ResMut<WorldRes>,
    mut match_state: ResMut<MatchRes>,
    mut tick_loop: ResMut<LoopRes>,
    mut vision: ResMut<VisionPublisher>,
    mut receiver: ResMut<CommandReceiver>,
) {
    let mut core = Core {
        config: &mut config,
        world: &mut world,
        match_state: &mut match_state,
        tick_loop: &mut tick_loop,
        vision: &mut vision,
        receiver: &mut receiver,
    };
    for ConfigEdited(edited) in events.read() {
        match core.apply_config_edit(edited.clone()) {
            Ok(changes) => debug!(?changes, "configuration applied"),
            Err(err) => error!(%err, "configuration edit rejected"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_actions(
    mut events: EventReader<SimAction>,
    mut config: ResMut<ConfigRes>,
    mut world: ResMut<WorldRes>,
    mut match_state: ResMut<MatchRes>,
    mut tick_loop: ResMut<LoopRes>,
    mut vision: ResMut<VisionPublisher>,
    mut receiver: ResMut<CommandReceiver>,
) {
    let mut core = Core {
        config: &mut config,
        world: &mut world,
        match_state: &mut match_state,
        tick_loop: &mut tick_loop,
        vision: &mut vision,
        receiver: &mut receiver,
    };
    for action in events.read() {
        if let Err(err) = core.apply_action(action) {
            warn!(%err, ?action, "action rejected");
        }
    }
}

fn receive_commands(mut receiver: ResMut<CommandReceiver>, mut world: ResMut<WorldRes>) {
    let summary = receiver.poll(&mut world);
    if summary.packets > 0 {
        debug!(?summary, "command packets received");
    }
}

fn simulate(
    time: Res<Time>,
    mut tick_loop: ResMut<LoopRes>,
    mut world: ResMut<WorldRes>,
    mut match_state: ResMut<MatchRes>,
    mut vision: ResMut<VisionPublisher>,
    mut tracker: ResMut<TrackerRes>,
) {
    let ticks = tick_loop.advance(time.delta());
    let dt = tick_loop.dt();
    for _ in 0..ticks {
        if let Err(err) = run_tick(&mut world, &mut match_state, &mut vision, dt) {
            error!(%err, "physics step failed");
            break;
        }
        tracker.observe(&world, match_state.selection(), dt);
    }
}

fn stop_on_exit(
    mut exits: EventReader<AppExit>,
    mut tick_loop: ResMut<LoopRes>,
    world: Res<WorldRes>,
) {
    if exits.is_empty() {
        return;
    }
    exits.clear();
    if tick_loop.is_running() {
        tick_loop.stop();
        info!("simulation stopped after {} physics steps", world.steps());
    }
}

fn report_status(
    time: Res<Time>,
    mut since_report: Local<f64>,
    match_state: Res<MatchRes>,
    tick_loop: Res<LoopRes>,
    vision: Res<VisionPublisher>,
    tracker: Res<TrackerRes>,
    mut status: ResMut<StatusRes>,
) {
    *since_report += time.delta_seconds_f64();
    if *since_report < STATUS_PERIOD {
        return;
    }
    *since_report = 0.0;

    let report = StatusReport::collect(&match_state, &tick_loop, &tracker, vision.perturbation());
    debug!(
        score = %report.score,
        frame_rate = %report.frame_rate,
        cursor = %report.cursor,
        selection = %report.selection,
        motion = ?report.motion,
        "status"
    );
    **status = report;
}
