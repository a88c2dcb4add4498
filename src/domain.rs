//! The domain module encapsulates the rules of the simulated match: field geometry, the ball and
//! robot bodies, contact surfaces, the physics step, scoring and tick scheduling.
//!
//! Nothing in here knows about sockets or the bevy runtime, so everything can be exercised
//! directly in tests.

mod ball;
mod basis;
mod body;
mod collision;
mod field;
mod formation;
mod match_state;
mod robot;
mod surface;
mod tick_loop;
mod world;

pub use ball::{BallConfig, BallModel, DAMPING_THRESHOLD};
pub use basis::{Angle, Pose, Position};
pub use collision::{Contact, HasCollision, Shape};
pub use field::{BallSpot, Division, FieldGeometry, FieldSpec, Team, Wall};
pub use formation::FormationError;
pub use match_state::{MatchScore, MatchState, Selection};
pub use robot::{Actuation, Kick, RobotCommand, RobotConfig, RobotError, RobotModel, WheelID};
pub use tick_loop::{interval_for, LoopError, TickLoop};
pub use world::{PhysicsWorld, WorldError, WorldSpec};
