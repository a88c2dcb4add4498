//! Outbound vision frames and their optional perturbation.

use std::io::{Read, Write};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::codec::{Decode, Encode, ProtocolError, Result};
use crate::domain::{PhysicsWorld, Team};

const MM_PER_M: f64 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BallDetection {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RobotDetection {
    pub team: Team,
    pub id: u8,
    pub x: f32,
    pub y: f32,
    /// Radians, counter-clockwise from the positive x-axis.
    pub orientation: f32,
}

/// Snapshot of the world as reported to vision clients.
#[derive(Clone, Debug, PartialEq)]
pub struct VisionFrame {
    pub sequence: u32,
    /// Seconds since the simulator started.
    pub capture_time: f64,
    pub ball: Option<BallDetection>,
    pub robots: Vec<RobotDetection>,
}

impl VisionFrame {
    pub fn capture(world: &PhysicsWorld, sequence: u32, capture_time: f64) -> Self {
        let ball = world.ball().position() * MM_PER_M;
        Self {
            sequence,
            capture_time,
            ball: Some(BallDetection {
                x: ball.x as f32,
                y: ball.y as f32,
                z: ball.z as f32,
            }),
            robots: world
                .robots()
                .iter()
                .map(|robot| {
                    let position = robot.position().scale(MM_PER_M);
                    RobotDetection {
                        team: robot.team(),
                        id: robot.id() as u8,
                        x: position.x() as f32,
                        y: position.y() as f32,
                        orientation: robot.heading().radians() as f32,
                    }
                })
                .collect(),
        }
    }
}

impl Encode for BallDetection {
    fn encode(&self, write: impl Write) -> Result<()> {
        [self.x, self.y, self.z].encode(write)
    }

    fn encode_len(&self) -> usize {
        12
    }
}

impl Decode for BallDetection {
    fn decode(read: impl Read) -> Result<Self> {
        let [x, y, z] = <[f32; 3]>::decode(read)?;
        Ok(Self { x, y, z })
    }
}

impl Encode for RobotDetection {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        self.team.encode(&mut write)?;
        self.id.encode(&mut write)?;
        [self.x, self.y, self.orientation].encode(write)
    }

    fn encode_len(&self) -> usize {
        14
    }
}

impl Decode for RobotDetection {
    fn decode(mut read: impl Read) -> Result<Self> {
        let team = Team::decode(&mut read)?;
        let id = u8::decode(&mut read)?;
        let [x, y, orientation] = <[f32; 3]>::decode(read)?;
        Ok(Self {
            team,
            id,
            x,
            y,
            orientation,
        })
    }
}

impl Encode for VisionFrame {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        self.sequence.encode(&mut write)?;
        self.capture_time.encode(&mut write)?;
        self.ball.encode(&mut write)?;
        self.robots.encode(write)
    }

    fn encode_len(&self) -> usize {
        4 + 8 + self.ball.encode_len() + self.robots.encode_len()
    }
}

impl Decode for VisionFrame {
    fn decode(mut read: impl Read) -> Result<Self> {
        Ok(Self {
            sequence: u32::decode(&mut read)?,
            capture_time: f64::decode(&mut read)?,
            ball: Option::decode(&mut read)?,
            robots: Vec::decode(read)?,
        })
    }
}

/// Uniform jitter added to reported poses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseConfig {
    pub enabled: bool,
    /// Millimetres.
    pub deviation_x: f64,
    /// Millimetres.
    pub deviation_y: f64,
    /// Degrees.
    pub deviation_angle: f64,
}

/// Probabilities of an object missing from a frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VanishingConfig {
    pub enabled: bool,
    pub ball: f64,
    pub blue: f64,
    pub yellow: f64,
}

#[derive(Error, Debug, PartialEq)]
pub enum PerturbationError {
    #[error("noise deviation {0} must be finite and not negative, got {1}")]
    InvalidDeviation(&'static str, f64),
    #[error("vanishing probability {0} must lie in [0, 1], got {1}")]
    InvalidProbability(&'static str, f64),
}

impl NoiseConfig {
    pub fn validate(&self) -> std::result::Result<(), PerturbationError> {
        for (name, deviation) in [
            ("x", self.deviation_x),
            ("y", self.deviation_y),
            ("angle", self.deviation_angle),
        ] {
            if !(deviation.is_finite() && deviation >= 0.0) {
                return Err(PerturbationError::InvalidDeviation(name, deviation));
            }
        }
        Ok(())
    }
}

impl VanishingConfig {
    pub fn validate(&self) -> std::result::Result<(), PerturbationError> {
        for (name, probability) in [
            ("ball", self.ball),
            ("blue", self.blue),
            ("yellow", self.yellow),
        ] {
            if !(0.0..=1.0).contains(&probability) {
                return Err(PerturbationError::InvalidProbability(name, probability));
            }
        }
        Ok(())
    }

    fn probability(&self, team: Team) -> f64 {
        match team {
            Team::Blue => self.blue,
            Team::Yellow => self.yellow,
        }
    }
}

/// Alters what a frame reports, never the world it was captured from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Perturbation {
    pub noise: NoiseConfig,
    pub vanishing: VanishingConfig,
}

impl Perturbation {
    pub fn new(noise: NoiseConfig, vanishing: VanishingConfig) -> Self {
        Self { noise, vanishing }
    }

    pub fn validate(&self) -> std::result::Result<(), PerturbationError> {
        self.noise.validate()?;
        self.vanishing.validate()
    }

    pub fn apply(&self, mut frame: VisionFrame, rng: &mut impl Rng) -> VisionFrame {
        if self.vanishing.enabled {
            if vanishes(rng, self.vanishing.ball) {
                frame.ball = None;
            }
            frame
                .robots
                .retain(|robot| !vanishes(rng, self.vanishing.probability(robot.team)));
        }
        if self.noise.enabled {
            if let Some(ref mut ball) = frame.ball {
                ball.x += jitter(rng, self.noise.deviation_x) as f32;
                ball.y += jitter(rng, self.noise.deviation_y) as f32;
            }
            for robot in &mut frame.robots {
                robot.x += jitter(rng, self.noise.deviation_x) as f32;
                robot.y += jitter(rng, self.noise.deviation_y) as f32;
                robot.orientation += jitter(rng, self.noise.deviation_angle).to_radians() as f32;
            }
        }
        frame
    }
}

/// NaN or non-positive probabilities never hide an object; anything above 1 always does.
fn vanishes(rng: &mut impl Rng, probability: f64) -> bool {
    if !(probability > 0.0) {
        return false;
    }
    rng.random_bool(probability.min(1.0))
}

fn jitter(rng: &mut impl Rng, deviation: f64) -> f64 {
    let deviation = deviation.abs();
    if deviation.is_finite() && deviation > 0.0 {
        rng.random_range(-deviation..=deviation)
    } else {
        0.0
    }
}
