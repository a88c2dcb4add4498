//! The physics world: every body of a match, the contact surfaces between them and the step
//! function advancing them.
//!
//! Topology (field, robot count) only changes through [`PhysicsWorld::rebuild`], which builds a
//! complete new world before replacing the old one. Parameters change in place.

use nalgebra::Vector3;
use thiserror::Error;

use super::{
    body::{MassError, RigidBody},
    formation::{formation_for, FormationEntry, FormationError},
    surface::{
        BodyKey, ContactSurface, FrictionDirection, SurfaceError, SurfaceMode, SurfaceRegistry,
    },
    BallConfig, BallModel, Contact, FieldSpec, HasCollision, Pose, RobotCommand,
    RobotConfig, RobotError, RobotModel, Team, Wall, WheelID,
};

/// Surface parameters for pairs that are not configurable.
mod surfaces {
    use super::{ContactSurface, SurfaceMode};

    pub const BALL_WALL: ContactSurface =
        ContactSurface::new(SurfaceMode::BOUNCE_APPROX, 0.1, 0.5, 0.1);
    pub const BALL_KICKER: ContactSurface =
        ContactSurface::new(SurfaceMode::BOUNCE_APPROX, 0.8, 0.1, 0.1);
    pub const BALL_CHASSIS: ContactSurface =
        ContactSurface::new(SurfaceMode::BOUNCE_APPROX, 0.1, 0.5, 0.1);
    pub const CHASSIS_CHASSIS: ContactSurface =
        ContactSurface::new(SurfaceMode::BOUNCE_APPROX, 0.1, 0.2, 0.1);
    pub const CHASSIS_WALL: ContactSurface =
        ContactSurface::new(SurfaceMode::BOUNCE_APPROX, 0.1, 0.2, 0.1);
}

#[derive(Error, Debug, PartialEq)]
pub enum WorldError {
    #[error(transparent)]
    Formation(#[from] FormationError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Robot(#[from] RobotError),
    #[error(transparent)]
    Mass(#[from] MassError),
    #[error("no {0:?} robot with id {1}")]
    UnknownRobot(Team, usize),
}

/// Everything needed to build a world from scratch.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldSpec {
    pub field: FieldSpec,
    pub robots_per_team: usize,
    pub ball: BallConfig,
    pub robot: RobotConfig,
    /// Magnitude of the downward gravity in m/s².
    pub gravity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsWorld {
    field: FieldSpec,
    gravity: Vector3<f64>,
    ball: BallModel,
    robots: Vec<RobotModel>,
    formation: Vec<FormationEntry>,
    walls: Vec<Wall>,
    surfaces: SurfaceRegistry,
    robots_per_team: usize,
    steps: u64,
}

impl PhysicsWorld {
    pub fn build(spec: &WorldSpec) -> Result<Self, WorldError> {
        let formation = formation_for(spec.robots_per_team)?;
        let robots = formation
            .iter()
            .map(|entry| RobotModel::new(entry.team, entry.id, entry.pose, spec.robot.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let ball = BallModel::new(&spec.ball)?;
        let walls = spec.field.walls();
        let surfaces = Self::register_surfaces(spec, robots.len(), walls.len())?;

        Ok(Self {
            field: spec.field.clone(),
            gravity: Vector3::new(0.0, 0.0, -spec.gravity),
            ball,
            robots,
            formation,
            walls,
            surfaces,
            robots_per_team: spec.robots_per_team,
            steps: 0,
        })
    }

    /// Replaces the whole world. On failure the current world is left untouched.
    pub fn rebuild(&mut self, spec: &WorldSpec) -> Result<(), WorldError> {
        *self = Self::build(spec)?;
        Ok(())
    }

    fn register_surfaces(
        spec: &WorldSpec,
        robot_count: usize,
        wall_count: usize,
    ) -> Result<SurfaceRegistry, SurfaceError> {
        let mut registry = SurfaceRegistry::new();
        registry.register(BodyKey::Ball, BodyKey::Ground, ball_ground_surface(&spec.ball))?;
        for wall in 0..wall_count {
            registry.register(BodyKey::Ball, BodyKey::Wall(wall), surfaces::BALL_WALL)?;
        }
        let wheel_ground = ContactSurface::new(
            SurfaceMode {
                bounce: false,
                ..SurfaceMode::ALL
            },
            spec.robot.wheel_friction,
            0.0,
            0.0,
        )
        .with_slip(spec.robot.wheel_slip[0], spec.robot.wheel_slip[1]);

        for robot in 0..robot_count {
            registry.register(BodyKey::Ball, BodyKey::Kicker(robot), surfaces::BALL_KICKER)?;
            registry.register(BodyKey::Ball, BodyKey::Chassis(robot), surfaces::BALL_CHASSIS)?;
            for other in robot + 1..robot_count {
                registry.register(
                    BodyKey::Chassis(robot),
                    BodyKey::Chassis(other),
                    surfaces::CHASSIS_CHASSIS,
                )?;
            }
            for wall in 0..wall_count {
                registry.register(
                    BodyKey::Chassis(robot),
                    BodyKey::Wall(wall),
                    surfaces::CHASSIS_WALL,
                )?;
            }
            for wheel in 0..WheelID::iter().len() {
                registry.register(BodyKey::Wheel(robot, wheel), BodyKey::Ground, wheel_ground)?;
            }
        }
        Ok(registry)
    }

    pub fn field(&self) -> &FieldSpec {
        &self.field
    }

    pub fn gravity(&self) -> Vector3<f64> {
        self.gravity
    }

    pub fn set_gravity(&mut self, magnitude: f64) {
        self.gravity = Vector3::new(0.0, 0.0, -magnitude);
    }

    pub fn ball(&self) -> &BallModel {
        &self.ball
    }

    pub fn ball_mut(&mut self) -> &mut BallModel {
        &mut self.ball
    }

    pub fn robots(&self) -> &[RobotModel] {
        &self.robots
    }

    pub fn robots_per_team(&self) -> usize {
        self.robots_per_team
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Blue robots come first, so the index is `team * robots_per_team + id`.
    pub fn robot_index(&self, team: Team, id: usize) -> Option<usize> {
        (id < self.robots_per_team).then_some(team.index() * self.robots_per_team + id)
    }

    pub fn robot(&self, team: Team, id: usize) -> Result<&RobotModel, WorldError> {
        self.robot_index(team, id)
            .and_then(|index| self.robots.get(index))
            .ok_or(WorldError::UnknownRobot(team, id))
    }

    pub fn robot_mut(&mut self, team: Team, id: usize) -> Result<&mut RobotModel, WorldError> {
        self.robot_index(team, id)
            .and_then(|index| self.robots.get_mut(index))
            .ok_or(WorldError::UnknownRobot(team, id))
    }

    pub fn formation_pose(&self, team: Team, id: usize) -> Option<Pose> {
        self.formation
            .iter()
            .find(|entry| entry.team == team && entry.id == id)
            .map(|entry| entry.pose)
    }

    /// Hands a command to the robot's pending slot. Returns `Ok(false)` if the robot is off.
    pub fn submit_command(
        &mut self,
        team: Team,
        command: RobotCommand,
    ) -> Result<bool, WorldError> {
        Ok(self.robot_mut(team, command.id)?.submit(command))
    }

    pub fn update_ball_surface(&mut self, config: &BallConfig) -> Result<(), SurfaceError> {
        *self.surfaces.find_mut(BodyKey::Ball, BodyKey::Ground)? = ball_ground_surface(config);
        Ok(())
    }

    /// Applies the configured part masses to every robot.
    pub fn set_robot_masses(&mut self, config: &RobotConfig) -> Result<(), RobotError> {
        for robot in &mut self.robots {
            robot.set_chassis_mass(config.body_mass)?;
            robot.set_kicker_mass(config.kicker_mass)?;
            for wheel_id in WheelID::iter() {
                robot.set_wheel_mass(*wheel_id, config.wheel_mass)?;
            }
        }
        Ok(())
    }

    /// Advances all bodies by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> Result<(), WorldError> {
        if dt <= 0.0 {
            return Ok(());
        }
        let g = (-self.gravity.z).max(0.0);

        for robot in &mut self.robots {
            robot.apply_pending();
        }

        for (index, robot) in self.robots.iter_mut().enumerate() {
            let wheel_ground = *self.surfaces.find(BodyKey::Wheel(index, 0), BodyKey::Ground)?;
            robot.drive(dt, &wheel_ground, g);

            let ball_kicker = *self.surfaces.find(BodyKey::Ball, BodyKey::Kicker(index))?;
            robot.dribble(&mut self.ball, &ball_kicker, g, dt);
            robot.kick(&mut self.ball);
        }

        self.ball.body_mut().integrate(dt, Some(self.gravity));
        for robot in &mut self.robots {
            robot.body_mut().integrate(dt, None);
        }

        self.resolve_ball_ground(dt)?;
        self.resolve_ball_walls(dt)?;
        self.resolve_ball_robots(dt)?;
        self.resolve_robot_robot(dt)?;
        self.resolve_robot_walls(dt)?;

        self.steps += 1;
        Ok(())
    }

    fn resolve_ball_ground(&mut self, dt: f64) -> Result<(), WorldError> {
        let surface = *self.surfaces.find(BodyKey::Ball, BodyKey::Ground)?;
        let radius = self.ball.radius();
        let body = self.ball.body_mut();
        if body.position.z > radius {
            return Ok(());
        }
        body.position.z = radius;
        let approach = -body.velocity.z;
        if approach <= 0.0 {
            return Ok(());
        }
        // Speed gained from gravity during this step is resting contact, not impact.
        let impact = (approach + self.gravity.z * dt).max(0.0);
        let restitution = surface.restitution(impact);
        body.velocity.z = restitution * impact;
        let normal_impulse = body.mass() * (1.0 + restitution) * approach;

        let tangential = Vector3::new(body.velocity.x, body.velocity.y, 0.0);
        let speed = tangential.norm();
        if speed > 0.0 {
            let impulse = surface.tangential_impulse(
                speed,
                body.inverse_mass(),
                normal_impulse,
                dt,
                FrictionDirection::First,
            );
            body.apply_impulse(-tangential / speed * impulse);
        }
        Ok(())
    }

    fn resolve_ball_walls(&mut self, dt: f64) -> Result<(), WorldError> {
        for (index, wall) in self.walls.iter().enumerate() {
            if self.ball.position().z - self.ball.radius() >= wall.height() {
                continue;
            }
            if let Some(contact) = self.ball.contact_with(wall) {
                let surface = *self.surfaces.find(BodyKey::Ball, BodyKey::Wall(index))?;
                resolve_contact(self.ball.body_mut(), None, &contact, &surface, dt);
            }
        }
        Ok(())
    }

    fn resolve_ball_robots(&mut self, dt: f64) -> Result<(), WorldError> {
        for (index, robot) in self.robots.iter_mut().enumerate() {
            if let Some((contact, on_kicker)) = robot.ball_contact(&self.ball) {
                let part = if on_kicker {
                    BodyKey::Kicker(index)
                } else {
                    BodyKey::Chassis(index)
                };
                let surface = *self.surfaces.find(BodyKey::Ball, part)?;
                resolve_contact(
                    self.ball.body_mut(),
                    Some(robot.body_mut()),
                    &contact,
                    &surface,
                    dt,
                );
            }
        }
        Ok(())
    }

    fn resolve_robot_robot(&mut self, dt: f64) -> Result<(), WorldError> {
        for index in 0..self.robots.len() {
            let (head, tail) = self.robots.split_at_mut(index + 1);
            let robot = &mut head[index];
            for (offset, other) in tail.iter_mut().enumerate() {
                if let Some(contact) = robot.contact_with(&*other) {
                    let surface = *self.surfaces.find(
                        BodyKey::Chassis(index),
                        BodyKey::Chassis(index + 1 + offset),
                    )?;
                    resolve_contact(
                        robot.body_mut(),
                        Some(other.body_mut()),
                        &contact,
                        &surface,
                        dt,
                    );
                }
            }
        }
        Ok(())
    }

    fn resolve_robot_walls(&mut self, dt: f64) -> Result<(), WorldError> {
        for (index, robot) in self.robots.iter_mut().enumerate() {
            for (wall_index, wall) in self.walls.iter().enumerate() {
                if let Some(contact) = robot.contact_with(wall) {
                    let surface = *self
                        .surfaces
                        .find(BodyKey::Chassis(index), BodyKey::Wall(wall_index))?;
                    resolve_contact(robot.body_mut(), None, &contact, &surface, dt);
                }
            }
        }
        Ok(())
    }
}

fn ball_ground_surface(config: &BallConfig) -> ContactSurface {
    ContactSurface::new(
        SurfaceMode::ALL,
        config.friction,
        config.bounce,
        config.bounce_velocity,
    )
    .with_slip(config.slip, config.slip)
}

/// Planar contact between `body` and `other` (static when `None`). The contact normal points
/// from `other` towards `body`.
fn resolve_contact(
    body: &mut RigidBody,
    mut other: Option<&mut RigidBody>,
    contact: &Contact,
    surface: &ContactSurface,
    dt: f64,
) {
    let normal = contact.normal.with_z(0.0);
    let inverse_mass = body.inverse_mass();
    let other_inverse_mass = other.as_ref().map_or(0.0, |o| o.inverse_mass());
    let total_inverse_mass = inverse_mass + other_inverse_mass;

    let correction = normal * (contact.depth / total_inverse_mass);
    body.position += correction * inverse_mass;
    if let Some(ref mut other) = other {
        other.position -= correction * other_inverse_mass;
    }

    let other_velocity = other
        .as_ref()
        .map_or_else(Vector3::zeros, |o| Vector3::new(o.velocity.x, o.velocity.y, 0.0));
    let relative = Vector3::new(body.velocity.x, body.velocity.y, 0.0) - other_velocity;
    let normal_speed = relative.dot(&normal);
    if normal_speed >= 0.0 {
        return;
    }

    let restitution = surface.restitution(-normal_speed);
    let normal_impulse = -(1.0 + restitution) * normal_speed / total_inverse_mass;

    let tangent = Vector3::new(-normal.y, normal.x, 0.0);
    let tangential_impulse = surface.tangential_impulse(
        relative.dot(&tangent),
        total_inverse_mass,
        normal_impulse,
        dt,
        FrictionDirection::First,
    );
    let impulse = normal * normal_impulse - tangent * tangential_impulse;
    body.apply_impulse(impulse);
    if let Some(other) = other {
        other.apply_impulse(-impulse);
    }
}
