//! Simulator configuration and the classification of configuration edits.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::{BallConfig, Division, FieldGeometry, FieldSpec, RobotConfig, WorldSpec},
    protocol::{NoiseConfig, Perturbation, PerturbationError, VanishingConfig},
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] PerturbationError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub division: Division,
    pub robots_per_team: usize,
    pub geometry: GeometryConfig,
    pub ball: BallConfig,
    pub robot: RobotConfig,
    pub physics: PhysicsConfig,
    pub network: NetworkConfig,
    pub noise: NoiseConfig,
    pub vanishing: VanishingConfig,
    /// Seed of the random generator used for noise and vanishing.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            division: Division::A,
            robots_per_team: Division::A.default_robot_count(),
            geometry: GeometryConfig::default(),
            ball: BallConfig::default(),
            robot: RobotConfig::default(),
            physics: PhysicsConfig::default(),
            network: NetworkConfig::default(),
            noise: NoiseConfig::default(),
            vanishing: VanishingConfig::default(),
            seed: 0x5eed,
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(contents)?;
        config.perturbation().validate()?;
        Ok(config)
    }

    pub fn perturbation(&self) -> Perturbation {
        Perturbation::new(self.noise.clone(), self.vanishing.clone())
    }

    /// Geometry of the active division.
    pub fn field_geometry(&self) -> &FieldGeometry {
        match self.division {
            Division::A => &self.geometry.division_a,
            Division::B => &self.geometry.division_b,
        }
    }

    pub fn world_spec(&self) -> WorldSpec {
        WorldSpec {
            field: FieldSpec::new(self.division, self.field_geometry().clone()),
            robots_per_team: self.robots_per_team,
            ball: self.ball.clone(),
            robot: self.robot.clone(),
            gravity: self.physics.gravity,
        }
    }

    /// Switching the division without touching the robot count selects the division's count.
    pub fn with_division_defaults(mut self, previous: &SimConfig) -> Self {
        if self.division != previous.division && self.robots_per_team == previous.robots_per_team {
            self.robots_per_team = self.division.default_robot_count();
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    pub division_a: FieldGeometry,
    pub division_b: FieldGeometry,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            division_a: FieldGeometry::division_a(),
            division_b: FieldGeometry::division_b(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsConfig {
    /// Magnitude of the downward gravity in m/s².
    pub gravity: f64,
    pub desired_fps: f64,
    pub full_speed: bool,
    /// Zero the velocity of teleported robots and balls.
    pub reset_velocity_on_teleport: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            desired_fps: 65.0,
            full_speed: false,
            reset_velocity_on_teleport: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub vision_address: String,
    pub vision_port: u16,
    pub command_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vision_address: "224.5.23.2".to_string(),
            vision_port: 10020,
            command_port: 20011,
        }
    }
}

/// One consequence of a configuration edit.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigChange {
    /// Topology changed; the world has to be rebuilt.
    Rebuild,
    /// Geometry changed without a rebuild; takes effect on the next restart.
    RestartRequired,
    BallMass(f64),
    BallSurface,
    BallDamping { linear: f64, angular: f64 },
    RobotMasses,
    Gravity(f64),
    TickRate(f64),
    FullSpeed(bool),
    VisionChannel { address: String, port: u16 },
    CommandPort(u16),
    Perturbation,
}

impl ConfigChange {
    /// Everything that has to happen to go from `old` to `new`. A rebuild builds the world from
    /// `new`, so world parameters are not listed separately then.
    pub fn between(old: &SimConfig, new: &SimConfig) -> Vec<ConfigChange> {
        let mut changes = Vec::new();

        let rebuild = old.division != new.division
            || old.robots_per_team != new.robots_per_team
            || old.ball.radius != new.ball.radius;
        if rebuild {
            changes.push(ConfigChange::Rebuild);
        } else {
            if old.geometry != new.geometry || robot_geometry_changed(&old.robot, &new.robot) {
                changes.push(ConfigChange::RestartRequired);
            }
            if old.ball.mass != new.ball.mass {
                changes.push(ConfigChange::BallMass(new.ball.mass));
            }
            if old.ball.friction != new.ball.friction
                || old.ball.slip != new.ball.slip
                || old.ball.bounce != new.ball.bounce
                || old.ball.bounce_velocity != new.ball.bounce_velocity
            {
                changes.push(ConfigChange::BallSurface);
            }
            if old.ball.linear_damping != new.ball.linear_damping
                || old.ball.angular_damping != new.ball.angular_damping
            {
                changes.push(ConfigChange::BallDamping {
                    linear: new.ball.linear_damping,
                    angular: new.ball.angular_damping,
                });
            }
            if old.robot.body_mass != new.robot.body_mass
                || old.robot.wheel_mass != new.robot.wheel_mass
                || old.robot.kicker_mass != new.robot.kicker_mass
            {
                changes.push(ConfigChange::RobotMasses);
            }
            if old.physics.gravity != new.physics.gravity {
                changes.push(ConfigChange::Gravity(new.physics.gravity));
            }
        }

        if old.physics.desired_fps != new.physics.desired_fps {
            changes.push(ConfigChange::TickRate(new.physics.desired_fps));
        }
        if old.physics.full_speed != new.physics.full_speed {
            changes.push(ConfigChange::FullSpeed(new.physics.full_speed));
        }
        if old.network.vision_address != new.network.vision_address
            || old.network.vision_port != new.network.vision_port
        {
            changes.push(ConfigChange::VisionChannel {
                address: new.network.vision_address.clone(),
                port: new.network.vision_port,
            });
        }
        if old.network.command_port != new.network.command_port {
            changes.push(ConfigChange::CommandPort(new.network.command_port));
        }
        if old.noise != new.noise || old.vanishing != new.vanishing || old.seed != new.seed {
            changes.push(ConfigChange::Perturbation);
        }
        changes
    }
}

/// Robot parameters other than masses only take effect with a rebuild.
fn robot_geometry_changed(old: &RobotConfig, new: &RobotConfig) -> bool {
    let without_masses = |config: &RobotConfig| RobotConfig {
        body_mass: 0.0,
        wheel_mass: 0.0,
        kicker_mass: 0.0,
        ..config.clone()
    };
    without_masses(old) != without_masses(new)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
            division = "B"
            robots_per_team = 3

            [network]
            command_port = 20012
            "#,
        )
        .unwrap();
        assert_eq!(config.division, Division::B);
        assert_eq!(config.network.command_port, 20012);
        assert_eq!(config.network.vision_port, 10020);
        assert_eq!(config.field_geometry(), &FieldGeometry::division_b());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        assert!(matches!(
            SimConfig::from_toml_str("[physics]\ngravty = 9.8\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[rstest]
    #[case::nan_probability("[vanishing]\nenabled = true\nball = nan\n")]
    #[case::infinite_deviation("[noise]\nenabled = true\ndeviation_x = inf\n")]
    fn test_config_rejects_invalid_perturbation(#[case] contents: &str) {
        assert!(matches!(
            SimConfig::from_toml_str(contents),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_config_load_missing_file() {
        assert!(matches!(
            SimConfig::load("/nonexistent/pitch-sim.toml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[rstest]
    #[case::division_only(Division::B, 5, 3)]
    #[case::division_and_count(Division::B, 4, 4)]
    #[case::same_division(Division::A, 6, 6)]
    fn test_config_division_defaults(
        #[case] division: Division,
        #[case] requested: usize,
        #[case] expected: usize,
    ) {
        let old = SimConfig::default();
        let new = SimConfig {
            division,
            robots_per_team: requested,
            ..SimConfig::default()
        }
        .with_division_defaults(&old);
        assert_eq!(new.robots_per_team, expected);
    }

    #[test]
    fn test_change_structural_edit_rebuilds() {
        let old = SimConfig::default();
        let mut new = old.clone();
        new.robots_per_team = 3;
        new.ball.mass = 0.05;
        new.physics.desired_fps = 100.0;
        assert_eq!(
            ConfigChange::between(&old, &new),
            vec![ConfigChange::Rebuild, ConfigChange::TickRate(100.0)]
        );
    }

    #[test]
    fn test_change_geometry_edit_is_advisory() {
        let old = SimConfig::default();
        let mut new = old.clone();
        new.geometry.division_a.length = 11.0;
        assert_eq!(
            ConfigChange::between(&old, &new),
            vec![ConfigChange::RestartRequired]
        );
    }

    #[test]
    fn test_change_in_place_edits() {
        let old = SimConfig::default();
        let mut new = old.clone();
        new.ball.friction = 0.1;
        new.ball.linear_damping = 0.01;
        new.robot.kicker_mass = 0.03;
        new.physics.gravity = 0.0;
        new.network.vision_port = 10006;
        new.network.command_port = 20020;
        new.noise.enabled = true;
        assert_eq!(
            ConfigChange::between(&old, &new),
            vec![
                ConfigChange::BallSurface,
                ConfigChange::BallDamping {
                    linear: 0.01,
                    angular: 0.004
                },
                ConfigChange::RobotMasses,
                ConfigChange::Gravity(0.0),
                ConfigChange::VisionChannel {
                    address: "224.5.23.2".to_string(),
                    port: 10006
                },
                ConfigChange::CommandPort(20020),
                ConfigChange::Perturbation,
            ]
        );
    }

    #[test]
    fn test_change_nothing() {
        let config = SimConfig::default();
        assert_eq!(ConfigChange::between(&config, &config), vec![]);
    }
}
