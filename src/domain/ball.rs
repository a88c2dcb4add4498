//! The ball: a single rigid sphere.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{
    body::{Damping, MassError, RigidBody},
    HasCollision, Position, Shape,
};

/// Velocity threshold below which ball damping is not applied.
pub const DAMPING_THRESHOLD: f64 = 0.001;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BallConfig {
    pub radius: f64,
    pub mass: f64,
    /// Ball–ground friction; negative means unbounded.
    pub friction: f64,
    pub slip: f64,
    pub bounce: f64,
    pub bounce_velocity: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            radius: 0.0215,
            mass: 0.043,
            friction: 0.05,
            slip: 1.0,
            bounce: 0.5,
            bounce_velocity: 0.1,
            linear_damping: 0.004,
            angular_damping: 0.004,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BallModel {
    body: RigidBody,
    radius: f64,
}

impl BallModel {
    pub fn new(config: &BallConfig) -> Result<Self, MassError> {
        // Solid sphere; only the vertical axis is tracked.
        let inertia = 0.4 * config.mass * config.radius.powi(2);
        let mut body = RigidBody::new(config.mass, inertia)?;
        body.position = Vector3::new(0.0, 0.0, config.radius);
        body.damping = Damping::new(
            config.linear_damping,
            config.angular_damping,
            DAMPING_THRESHOLD,
        );
        Ok(Self {
            body,
            radius: config.radius,
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn mass(&self) -> f64 {
        self.body.mass()
    }

    pub fn set_mass(&mut self, mass: f64) -> Result<(), MassError> {
        self.body.set_mass(mass)
    }

    pub fn set_damping(&mut self, linear: f64, angular: f64, threshold: f64) {
        self.body.damping = Damping::new(linear, angular, threshold);
    }

    pub fn position(&self) -> Vector3<f64> {
        self.body.position
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.body.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.body.velocity = velocity;
    }

    /// Teleports the ball onto the ground at an absolute field position. The velocity is kept.
    pub fn put_at(&mut self, position: Position) {
        self.body.position = position.with_z(self.radius);
    }

    pub fn zero_velocity(&mut self) {
        self.body.zero_velocity();
    }

    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut RigidBody {
        &mut self.body
    }
}

impl HasCollision for BallModel {
    fn shape(&self) -> Shape {
        Shape::Circle {
            position: Position::from(&self.body.position),
            radius: self.radius,
        }
    }
}
