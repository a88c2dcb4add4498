//! Robot with four omni wheels, a kicker with dribbler and a near massless auxiliary body.
//!
//! The parts are rigidly attached, so the robot moves as one planar [`RigidBody`] whose mass and
//! inertia are recomputed whenever a part mass changes. The wheels drive the body through the
//! wheel–ground contact surface.

use std::{collections::BTreeMap, f64::consts::FRAC_PI_4, slice::Iter};

use nalgebra::{Matrix3x4, Matrix4x3, RowVector3, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    body::{checked_mass, MassError, RigidBody},
    surface::{ContactSurface, FrictionDirection},
    Angle, BallModel, Contact, HasCollision, Pose, Position, Shape, Team,
};

/// Share of the configured body mass carried by the chassis; the auxiliary body takes the rest.
pub const CHASSIS_MASS_SHARE: f64 = 0.99;

/// How far the ball may be from the kicker face and still count as touching it.
const KICKER_TOLERANCE: f64 = 0.005;

#[derive(Clone, Debug, PartialEq)]
pub struct RobotModel {
    team: Team,
    id: usize,
    body: RigidBody,
    chassis_mass: f64,
    aux_mass: f64,
    kicker_mass: f64,
    wheels: BTreeMap<WheelID, Wheel>,
    config: RobotConfig,
    on: bool,
    pending: Option<RobotCommand>,
    actuation: Actuation,
    kick: Option<Kick>,
    dribbler_spin: f64,
}

impl RobotModel {
    pub fn new(team: Team, id: usize, pose: Pose, config: RobotConfig) -> Result<Self, RobotError> {
        let body_mass = checked_mass(config.body_mass)?;
        let wheel_mass = checked_mass(config.wheel_mass)?;
        let kicker_mass = checked_mass(config.kicker_mass)?;
        let mut robot = Self {
            team,
            id,
            body: RigidBody::new(1.0, 1.0)?,
            chassis_mass: CHASSIS_MASS_SHARE * body_mass,
            aux_mass: (1.0 - CHASSIS_MASS_SHARE) * body_mass,
            kicker_mass,
            wheels: BTreeMap::from_iter(WheelID::iter().zip(config.wheel_angles).map(
                |(wheel_id, angle)| {
                    (
                        *wheel_id,
                        Wheel {
                            mass: wheel_mass,
                            angle: Angle::from_deg(angle),
                        },
                    )
                },
            )),
            config,
            on: true,
            pending: None,
            actuation: Actuation::default(),
            kick: None,
            dribbler_spin: 0.0,
        };
        robot.update_mass_properties()?;
        robot.set_pose(pose);
        Ok(robot)
    }

    pub fn team(&self) -> Team {
        self.team
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut RigidBody {
        &mut self.body
    }

    pub fn position(&self) -> Position {
        Position::from(&self.body.position)
    }

    pub fn heading(&self) -> Angle {
        Angle::new(self.body.heading).normalized()
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position(), self.heading())
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.body.velocity
    }

    /// Teleports the robot. Velocities are left untouched.
    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.body.position.x = x;
        self.body.position.y = y;
    }

    pub fn set_dir(&mut self, heading: Angle) {
        self.body.heading = heading.radians();
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.set_xy(pose.position.x(), pose.position.y());
        self.set_dir(pose.heading);
    }

    pub fn zero_velocity(&mut self) {
        self.body.zero_velocity();
    }

    pub fn chassis_mass(&self) -> f64 {
        self.chassis_mass
    }

    pub fn aux_mass(&self) -> f64 {
        self.aux_mass
    }

    /// Chassis plus auxiliary body, i.e. the configured body mass.
    pub fn body_mass(&self) -> f64 {
        self.chassis_mass + self.aux_mass
    }

    pub fn kicker_mass(&self) -> f64 {
        self.kicker_mass
    }

    pub fn wheel_mass(&self, wheel_id: WheelID) -> Result<f64, RobotError> {
        if let Some(wheel) = self.wheels.get(&wheel_id) {
            Ok(wheel.mass)
        } else {
            Err(RobotError::MissingWheelID(wheel_id))
        }
    }

    pub fn set_chassis_mass(&mut self, mass: f64) -> Result<(), RobotError> {
        let mass = checked_mass(mass)?;
        self.chassis_mass = CHASSIS_MASS_SHARE * mass;
        self.aux_mass = (1.0 - CHASSIS_MASS_SHARE) * mass;
        self.update_mass_properties()
    }

    pub fn set_wheel_mass(&mut self, wheel_id: WheelID, mass: f64) -> Result<(), RobotError> {
        let mass = checked_mass(mass)?;
        if let Some(ref mut wheel) = self.wheels.get_mut(&wheel_id) {
            wheel.mass = mass;
        } else {
            return Err(RobotError::MissingWheelID(wheel_id));
        }
        self.update_mass_properties()
    }

    pub fn set_kicker_mass(&mut self, mass: f64) -> Result<(), RobotError> {
        self.kicker_mass = checked_mass(mass)?;
        self.update_mass_properties()
    }

    fn update_mass_properties(&mut self) -> Result<(), RobotError> {
        let wheel_mass: f64 = self.wheels.values().map(|w| w.mass).sum();
        let mass = self.chassis_mass + self.aux_mass + self.kicker_mass + wheel_mass;
        let inertia = 0.5 * (self.chassis_mass + self.aux_mass) * self.config.radius.powi(2)
            + wheel_mass * self.config.wheel_distance.powi(2)
            + self.kicker_mass * self.config.kicker_distance.powi(2);
        self.body.set_mass_properties(mass, inertia)?;
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Switching a robot off drops everything it was told to do.
    pub fn set_on(&mut self, on: bool) {
        self.on = on;
        if !on {
            self.pending = None;
            self.actuation = Actuation::default();
            self.kick = None;
            self.dribbler_spin = 0.0;
        }
    }

    /// Stores `command` for the next step, replacing any command not yet applied. Returns `false`
    /// when the robot is off and the command was discarded.
    pub fn submit(&mut self, command: RobotCommand) -> bool {
        if !self.on {
            return false;
        }
        self.pending = Some(command);
        true
    }

    /// Consumes the pending command, if any.
    pub fn apply_pending(&mut self) -> Option<RobotCommand> {
        let command = self.pending.take()?;
        self.apply_command(&command);
        Some(command)
    }

    pub fn apply_command(&mut self, command: &RobotCommand) {
        if !self.on {
            return;
        }
        self.actuation = command.actuation;
        self.kick = (command.kick.flat > 0.0 || command.kick.chip > 0.0).then_some(command.kick);
        self.dribbler_spin = command.dribbler_spin.max(0.0);
    }

    /// Body twist `(vx, vy, omega)` in the robot frame produced by wheel angular speeds, as the
    /// least squares solution over the four wheels.
    pub fn twist_for(&self, wheel_speeds: Vector4<f64>) -> Vector3<f64> {
        let j = self.jacobian();
        let surface_speeds = wheel_speeds * self.config.wheel_radius;
        let pseudo_inverse: Option<Matrix3x4<f64>> =
            (j.transpose() * j).try_inverse().map(|n| n * j.transpose());
        pseudo_inverse
            .map(|p| p * surface_speeds)
            .unwrap_or_else(Vector3::zeros)
    }

    fn jacobian(&self) -> Matrix4x3<f64> {
        let rows = WheelID::iter()
            .map(|wheel_id| {
                let angle: f64 = self.wheels[wheel_id].angle.into();
                RowVector3::new(-angle.sin(), angle.cos(), self.config.wheel_distance)
            })
            .collect::<Vec<_>>();
        Matrix4x3::from_rows(&rows)
    }

    pub fn target_twist(&self) -> Vector3<f64> {
        match self.actuation {
            Actuation::Wheels(speeds) => self.twist_for(Vector4::from(speeds)),
            Actuation::Velocity { vx, vy, omega } => Vector3::new(vx, vy, omega),
        }
    }

    /// Traction forces pushing the body towards its target twist during the next integration.
    pub fn drive(&mut self, dt: f64, wheel_ground: &ContactSurface, gravity: f64) {
        let target = self.target_twist();
        let (sin, cos) = self.body.heading.sin_cos();
        let velocity = self.body.velocity;
        let local = Vector2::new(
            cos * velocity.x + sin * velocity.y,
            -sin * velocity.x + cos * velocity.y,
        );
        let mass = self.body.mass();
        let normal_impulse = mass * gravity.max(0.0) * dt;

        let jx = wheel_ground.tangential_impulse(
            target.x - local.x,
            1.0 / mass,
            normal_impulse,
            dt,
            FrictionDirection::First,
        );
        let jy = wheel_ground.tangential_impulse(
            target.y - local.y,
            1.0 / mass,
            normal_impulse,
            dt,
            FrictionDirection::Second,
        );
        let impulse = Vector3::new(cos * jx - sin * jy, sin * jx + cos * jy, 0.0);
        self.body.add_force(impulse / dt);

        let inertia = self.body.inertia();
        let limit = wheel_ground.friction_limit(normal_impulse, dt) * self.config.wheel_distance;
        let angular_impulse =
            ((target.z - self.body.angular_velocity) * inertia).clamp(-limit, limit);
        self.body.add_torque(angular_impulse / dt);
    }

    /// Ball position in the robot frame.
    fn local_ball_position(&self, ball: &BallModel) -> Position {
        (Position::from(&ball.position()) - self.position()).rotate_vector(-self.heading())
    }

    /// Contact of the ball with the robot from the ball's point of view. The flag tells whether
    /// the ball hit the flat kicker face instead of the round chassis.
    pub fn ball_contact(&self, ball: &BallModel) -> Option<(Contact, bool)> {
        if ball.position().z - ball.radius() >= self.config.height {
            return None;
        }
        let local = self.local_ball_position(ball);
        if local.x() > 0.0 && local.y().abs() <= self.config.kicker_width / 2.0 {
            let depth = self.config.kicker_distance + ball.radius() - local.x();
            if depth <= 0.0 {
                return None;
            }
            let normal = self.heading().direction();
            let contact = Contact {
                normal,
                depth,
                point: self.position() + normal.scale(self.config.kicker_distance),
            };
            return Some((contact, true));
        }
        ball.contact_with(self).map(|contact| (contact, false))
    }

    pub fn touches_kicker(&self, ball: &BallModel) -> bool {
        let local = self.local_ball_position(ball);
        let front = self.config.kicker_distance;
        local.y().abs() <= self.config.kicker_width / 2.0
            && local.x() >= front - KICKER_TOLERANCE
            && local.x() <= front + ball.radius() + KICKER_TOLERANCE
            && ball.position().z - ball.radius() < self.config.height
    }

    /// Fires a requested kick if the ball is on the kicker. The request is consumed either way.
    pub fn kick(&mut self, ball: &mut BallModel) -> bool {
        let Some(kick) = self.kick.take() else {
            return false;
        };
        if !self.touches_kicker(ball) {
            return false;
        }
        let max = self.config.max_kick_speed;
        let flat = kick.flat.clamp(0.0, max);
        let chip = kick.chip.clamp(0.0, max);
        let horizontal = flat + chip * FRAC_PI_4.cos();
        let direction = self.heading().direction();
        ball.set_velocity(Vector3::new(
            self.body.velocity.x + direction.x() * horizontal,
            self.body.velocity.y + direction.y() * horizontal,
            chip * FRAC_PI_4.sin(),
        ));
        true
    }

    /// Pulls a ball sitting on the kicker towards the robot.
    pub fn dribble(
        &self,
        ball: &mut BallModel,
        ball_kicker: &ContactSurface,
        gravity: f64,
        dt: f64,
    ) {
        if self.dribbler_spin <= 0.0 || !self.touches_kicker(ball) {
            return;
        }
        let pull_speed = self.dribbler_spin * ball.radius() * self.config.dribbler_gain;
        let impulse = ball_kicker.tangential_impulse(
            pull_speed,
            1.0 / ball.mass(),
            ball.mass() * gravity.max(0.0) * dt,
            dt,
            FrictionDirection::First,
        );
        let inward = -self.heading().direction();
        ball.body_mut().apply_impulse(inward.with_z(0.0) * impulse);
    }
}

impl HasCollision for RobotModel {
    fn shape(&self) -> Shape {
        Shape::Circle {
            position: self.position(),
            radius: self.config.radius,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum RobotError {
    #[error("missing wheel id {0:?}")]
    MissingWheelID(WheelID),
    #[error(transparent)]
    Mass(#[from] MassError),
}

/// Geometry and default masses of a robot. Distances are offsets from the robot centre; the
/// robot's front faces the positive x-axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobotConfig {
    pub radius: f64,
    pub height: f64,
    /// Distance from the centre to the kicker face.
    pub kicker_distance: f64,
    pub kicker_width: f64,
    pub wheel_radius: f64,
    /// Distance from the centre to each wheel contact point.
    pub wheel_distance: f64,
    /// Wheel mounting angles in degrees, ordered like [`WheelID::iter`].
    pub wheel_angles: [f64; 4],
    pub body_mass: f64,
    pub wheel_mass: f64,
    pub kicker_mass: f64,
    /// Wheel–ground friction; negative means unbounded.
    pub wheel_friction: f64,
    /// Force dependent slip along and across the robot heading.
    pub wheel_slip: [f64; 2],
    pub max_kick_speed: f64,
    pub dribbler_gain: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            radius: 0.09,
            height: 0.146,
            kicker_distance: 0.073,
            kicker_width: 0.08,
            wheel_radius: 0.027,
            wheel_distance: 0.0782,
            wheel_angles: [60.0, 135.0, 225.0, 300.0],
            body_mass: 1.5,
            wheel_mass: 0.2,
            kicker_mass: 0.02,
            wheel_friction: 0.8,
            wheel_slip: [0.0, 0.0],
            max_kick_speed: 8.0,
            dribbler_gain: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum WheelID {
    FrontLeft,
    RearLeft,
    RearRight,
    FrontRight,
}

impl WheelID {
    pub fn iter() -> Iter<'static, WheelID> {
        static WHEELS: [WheelID; 4] = [
            WheelID::FrontLeft,
            WheelID::RearLeft,
            WheelID::RearRight,
            WheelID::FrontRight,
        ];
        WHEELS.iter()
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Wheel {
    mass: f64,
    angle: Angle,
}

/// How a command drives the wheels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Actuation {
    /// Angular speed of every wheel in rad/s, ordered like [`WheelID::iter`].
    Wheels([f64; 4]),
    /// Body velocity in the robot frame.
    Velocity { vx: f64, vy: f64, omega: f64 },
}

impl Default for Actuation {
    fn default() -> Self {
        Actuation::Velocity {
            vx: 0.0,
            vy: 0.0,
            omega: 0.0,
        }
    }
}

/// Kick speeds in m/s; zero means no kick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Kick {
    pub flat: f64,
    pub chip: f64,
}

/// Latest instruction for one robot, as received from a controller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RobotCommand {
    pub id: usize,
    pub actuation: Actuation,
    pub kick: Kick,
    /// Dribbler spin in rad/s.
    pub dribbler_spin: f64,
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::domain::{surface::SurfaceMode, BallConfig};

    const EPSILON: f64 = 1e-9;

    fn robot() -> RobotModel {
        RobotModel::new(
            Team::Blue,
            0,
            Pose::new(Position::new(0.0, 0.0), Angle::new(0.0)),
            RobotConfig::default(),
        )
        .unwrap()
    }

    /// Wheel angular speeds (rad/s) realising a body twist in the robot frame.
    fn wheel_speeds(robot: &RobotModel, twist: Vector3<f64>) -> Vector4<f64> {
        robot.jacobian() * twist / robot.config.wheel_radius
    }

    fn velocity(vx: f64, vy: f64, omega: f64) -> RobotCommand {
        RobotCommand {
            actuation: Actuation::Velocity { vx, vy, omega },
            ..RobotCommand::default()
        }
    }

    #[rstest]
    #[case(1.5)]
    #[case(2.0)]
    #[case(0.001)]
    #[case(40.0)]
    fn test_robot_set_chassis_mass_split(#[case] mass: f64) {
        let mut robot = robot();
        robot.set_chassis_mass(mass).unwrap();
        assert_abs_diff_eq!(robot.chassis_mass(), 0.99 * mass, epsilon = EPSILON);
        assert_abs_diff_eq!(robot.aux_mass(), 0.01 * mass, epsilon = EPSILON);
        assert_abs_diff_eq!(robot.body_mass(), mass, epsilon = EPSILON);
        assert_abs_diff_eq!(
            robot.body().mass(),
            mass + 4.0 * 0.2 + 0.02,
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_robot_rejects_invalid_masses() {
        let mut robot = robot();
        assert_eq!(
            robot.set_chassis_mass(0.0),
            Err(RobotError::Mass(MassError::NonPositive(0.0)))
        );
        assert!(robot.set_kicker_mass(-1.0).is_err());
        assert_abs_diff_eq!(robot.body_mass(), 1.5, epsilon = EPSILON);
    }

    #[test]
    fn test_robot_wheel_and_kicker_masses() {
        let mut robot = robot();
        robot.set_wheel_mass(WheelID::RearLeft, 0.5).unwrap();
        robot.set_kicker_mass(0.1).unwrap();
        assert_abs_diff_eq!(robot.wheel_mass(WheelID::RearLeft).unwrap(), 0.5);
        assert_abs_diff_eq!(robot.wheel_mass(WheelID::FrontLeft).unwrap(), 0.2);
        assert_abs_diff_eq!(robot.body().mass(), 1.5 + 0.5 + 0.6 + 0.1, epsilon = EPSILON);
    }

    #[test]
    fn test_robot_set_xy_is_absolute() {
        let mut once = robot();
        once.set_xy(1.0, -2.0);
        let mut twice = robot();
        twice.set_xy(1.0, -2.0);
        twice.set_xy(1.0, -2.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_robot_teleport_keeps_velocity() {
        let mut robot = robot();
        robot.body_mut().velocity = Vector3::new(1.0, 0.5, 0.0);
        robot.set_xy(2.0, 2.0);
        robot.set_dir(Angle::new(PI));
        assert_eq!(robot.velocity(), Vector3::new(1.0, 0.5, 0.0));
        assert_abs_diff_eq!(robot.heading().radians(), PI, epsilon = EPSILON);
    }

    #[rstest]
    #[case::forward(Vector3::new(1.0, 0.0, 0.0))]
    #[case::sideways(Vector3::new(0.0, -0.7, 0.0))]
    #[case::turning(Vector3::new(0.0, 0.0, 3.0))]
    #[case::combined(Vector3::new(0.5, 0.5, -1.0))]
    fn test_robot_wheel_kinematics(#[case] twist: Vector3<f64>) {
        let mut robot = robot();
        let speeds = wheel_speeds(&robot, twist);
        robot.apply_command(&RobotCommand {
            actuation: Actuation::Wheels(speeds.into()),
            ..RobotCommand::default()
        });
        let result = robot.target_twist();
        assert_abs_diff_eq!(result.x, twist.x, epsilon = EPSILON);
        assert_abs_diff_eq!(result.y, twist.y, epsilon = EPSILON);
        assert_abs_diff_eq!(result.z, twist.z, epsilon = EPSILON);
    }

    #[test]
    fn test_robot_pure_rotation_spins_all_wheels_equally() {
        let robot = robot();
        let speeds = wheel_speeds(&robot, Vector3::new(0.0, 0.0, 1.0));
        for speed in speeds.iter() {
            assert_abs_diff_eq!(*speed, 0.0782 / 0.027, epsilon = EPSILON);
        }
    }

    #[test]
    fn test_robot_last_command_wins() {
        let mut robot = robot();
        assert!(robot.submit(velocity(1.0, 0.0, 0.0)));
        assert!(robot.submit(velocity(0.0, 2.0, 0.0)));
        let applied = robot.apply_pending().unwrap();
        assert_eq!(applied, velocity(0.0, 2.0, 0.0));
        assert_eq!(robot.actuation, velocity(0.0, 2.0, 0.0).actuation);
        assert_eq!(robot.apply_pending(), None);
    }

    #[test]
    fn test_robot_off_discards_commands() {
        let mut robot = robot();
        robot.submit(velocity(1.0, 0.0, 0.0));
        robot.set_on(false);
        assert!(!robot.submit(velocity(1.0, 0.0, 0.0)));
        assert_eq!(robot.apply_pending(), None);
        assert_eq!(robot.actuation, Actuation::default());
    }

    #[test]
    fn test_robot_drive_reaches_target_with_ample_friction() {
        let mut robot = robot();
        robot.set_dir(Angle::new(0.5 * PI));
        robot.apply_command(&velocity(1.0, 0.0, 0.0));
        let surface = ContactSurface::new(SurfaceMode::BOUNCE_APPROX, -1.0, 0.0, 0.0);
        robot.drive(0.01, &surface, 9.81);
        robot.body_mut().integrate(0.01, None);
        assert_abs_diff_eq!(robot.velocity().x, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(robot.velocity().y, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_robot_drive_is_limited_by_friction() {
        let mut robot = robot();
        robot.apply_command(&velocity(10.0, 0.0, 0.0));
        let surface = ContactSurface::new(SurfaceMode::BOUNCE_APPROX, 0.5, 0.0, 0.0);
        robot.drive(0.01, &surface, 10.0);
        robot.body_mut().integrate(0.01, None);
        assert_abs_diff_eq!(robot.velocity().x, 0.05, epsilon = EPSILON);
    }

    #[rstest]
    #[case::flat(Kick { flat: 4.0, chip: 0.0 }, 4.0, 0.0)]
    #[case::chip(Kick { flat: 0.0, chip: 2.0 }, 2.0 * FRAC_PI_4.cos(), 2.0 * FRAC_PI_4.sin())]
    #[case::clamped(Kick { flat: 20.0, chip: 0.0 }, 8.0, 0.0)]
    fn test_robot_kick(#[case] kick: Kick, #[case] horizontal: f64, #[case] vertical: f64) {
        let mut robot = robot();
        let mut ball = BallModel::new(&BallConfig::default()).unwrap();
        ball.put_at(Position::new(0.073 + 0.0215, 0.0));
        robot.apply_command(&RobotCommand {
            kick,
            ..RobotCommand::default()
        });
        assert!(robot.kick(&mut ball));
        assert_abs_diff_eq!(ball.velocity().x, horizontal, epsilon = EPSILON);
        assert_abs_diff_eq!(ball.velocity().z, vertical, epsilon = EPSILON);
        assert!(!robot.kick(&mut ball));
    }

    #[test]
    fn test_robot_kick_misses_distant_ball() {
        let mut robot = robot();
        let mut ball = BallModel::new(&BallConfig::default()).unwrap();
        ball.put_at(Position::new(0.5, 0.0));
        robot.apply_command(&RobotCommand {
            kick: Kick {
                flat: 4.0,
                chip: 0.0,
            },
            ..RobotCommand::default()
        });
        assert!(!robot.kick(&mut ball));
        assert_eq!(ball.velocity(), Vector3::zeros());
    }
}
