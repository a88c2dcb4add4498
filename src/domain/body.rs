//! Rigid body state and integration.

use nalgebra::Vector3;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum MassError {
    #[error("mass must be strictly positive, got {0}")]
    NonPositive(f64),
}

pub fn checked_mass(mass: f64) -> Result<f64, MassError> {
    if mass > 0.0 && mass.is_finite() {
        Ok(mass)
    } else {
        Err(MassError::NonPositive(mass))
    }
}

/// Velocity damping in the style of ODE: above the threshold, a fraction of the velocity is
/// removed every step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Damping {
    pub linear: f64,
    pub angular: f64,
    pub linear_threshold: f64,
    pub angular_threshold: f64,
}

impl Damping {
    pub const fn new(linear: f64, angular: f64, threshold: f64) -> Self {
        Self {
            linear,
            angular,
            linear_threshold: threshold,
            angular_threshold: threshold,
        }
    }
}

/// A body with a full 3-D position but rotation only about the vertical axis.
#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub heading: f64,
    pub angular_velocity: f64,
    mass: f64,
    /// Moment of inertia about the vertical axis.
    inertia: f64,
    pub damping: Damping,
    force: Vector3<f64>,
    torque: f64,
}

impl RigidBody {
    pub fn new(mass: f64, inertia: f64) -> Result<Self, MassError> {
        Ok(Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            heading: 0.0,
            angular_velocity: 0.0,
            mass: checked_mass(mass)?,
            inertia: checked_mass(inertia)?,
            damping: Damping::default(),
            force: Vector3::zeros(),
            torque: 0.0,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn inverse_mass(&self) -> f64 {
        1.0 / self.mass
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Changes the mass and scales the inertia with it.
    pub fn set_mass(&mut self, mass: f64) -> Result<(), MassError> {
        let mass = checked_mass(mass)?;
        self.inertia *= mass / self.mass;
        self.mass = mass;
        Ok(())
    }

    /// Replaces mass and inertia of a composite body after one of its parts changed.
    pub fn set_mass_properties(&mut self, mass: f64, inertia: f64) -> Result<(), MassError> {
        let mass = checked_mass(mass)?;
        self.inertia = checked_mass(inertia)?;
        self.mass = mass;
        Ok(())
    }

    pub fn add_force(&mut self, force: Vector3<f64>) {
        self.force += force;
    }

    pub fn add_torque(&mut self, torque: f64) {
        self.torque += torque;
    }

    pub fn apply_impulse(&mut self, impulse: Vector3<f64>) {
        self.velocity += impulse / self.mass;
    }

    pub fn zero_velocity(&mut self) {
        self.velocity = Vector3::zeros();
        self.angular_velocity = 0.0;
    }

    /// Semi-implicit Euler step. Accumulated forces are consumed.
    pub fn integrate(&mut self, dt: f64, gravity: Option<Vector3<f64>>) {
        let acceleration = self.force / self.mass + gravity.unwrap_or_else(Vector3::zeros);
        self.velocity += acceleration * dt;
        self.angular_velocity += self.torque / self.inertia * dt;
        self.apply_damping();

        self.position += self.velocity * dt;
        self.heading += self.angular_velocity * dt;

        self.force = Vector3::zeros();
        self.torque = 0.0;
    }

    fn apply_damping(&mut self) {
        if self.velocity.norm() > self.damping.linear_threshold {
            self.velocity *= 1.0 - self.damping.linear;
        }
        if self.angular_velocity.abs() > self.damping.angular_threshold {
            self.angular_velocity *= 1.0 - self.damping.angular;
        }
    }
}
