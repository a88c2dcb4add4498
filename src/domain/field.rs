//! Division dependent field geometry.
//!
//! The field centre is the origin, the x axis runs along the field length towards the yellow
//! goal and the y axis along the width. All lengths are in metres.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{HasCollision, Position, Shape};

/// Height of the boundary walls around the field.
const BOUNDARY_WALL_HEIGHT: f64 = 1.0;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Division {
    #[default]
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
}

impl Division {
    /// Robots per team a division is played with.
    pub fn default_robot_count(self) -> usize {
        match self {
            Division::A => 5,
            Division::B => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Team {
    Blue,
    Yellow,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Blue, Team::Yellow];

    pub fn index(self) -> usize {
        match self {
            Team::Blue => 0,
            Team::Yellow => 1,
        }
    }

    pub fn opponent(self) -> Team {
        match self {
            Team::Blue => Team::Yellow,
            Team::Yellow => Team::Blue,
        }
    }

    /// Sign of the x coordinate of the goal this team defends.
    pub fn goal_side(self) -> f64 {
        match self {
            Team::Blue => -1.0,
            Team::Yellow => 1.0,
        }
    }
}

impl TryFrom<u8> for Team {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Team::Blue),
            1 => Ok(Team::Yellow),
            _ => Err(value),
        }
    }
}

/// Configurable dimensions of one division.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldGeometry {
    pub length: f64,
    pub width: f64,
    pub line_width: f64,
    pub center_circle_radius: f64,
    pub free_kick_distance: f64,
    pub penalty_width: f64,
    pub penalty_depth: f64,
    /// Distance of the penalty mark from the goal line.
    pub penalty_point: f64,
    pub margin: f64,
    pub referee_margin: f64,
    pub wall_thickness: f64,
    pub goal_thickness: f64,
    pub goal_depth: f64,
    pub goal_width: f64,
    pub goal_height: f64,
}

impl FieldGeometry {
    pub fn division_a() -> Self {
        Self {
            length: 12.0,
            width: 9.0,
            line_width: 0.01,
            center_circle_radius: 0.5,
            free_kick_distance: 0.2,
            penalty_width: 3.6,
            penalty_depth: 1.8,
            penalty_point: 1.2,
            margin: 0.3,
            referee_margin: 0.4,
            wall_thickness: 0.05,
            goal_thickness: 0.02,
            goal_depth: 0.18,
            goal_width: 1.8,
            goal_height: 0.16,
        }
    }

    pub fn division_b() -> Self {
        Self {
            length: 9.0,
            width: 6.0,
            penalty_width: 2.0,
            penalty_depth: 1.0,
            penalty_point: 1.0,
            goal_width: 1.0,
            ..Self::division_a()
        }
    }
}

/// Fixed ball placements offered to operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BallSpot {
    Center,
    Corner1,
    Corner2,
    Corner3,
    Corner4,
    Penalty1,
    Penalty2,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Wall {
    position: Position,
    x_length: f64,
    y_length: f64,
    height: f64,
}

impl Wall {
    fn new(position: Position, x_length: f64, y_length: f64, height: f64) -> Self {
        Self {
            position,
            x_length,
            y_length,
            height,
        }
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl HasCollision for Wall {
    fn shape(&self) -> Shape {
        Shape::Rectangle {
            position: self.position,
            x_length: self.x_length,
            y_length: self.y_length,
        }
    }
}

/// Geometry of the active division. Every derived quantity is computed on demand.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    division: Division,
    geometry: FieldGeometry,
}

impl FieldSpec {
    pub fn new(division: Division, geometry: FieldGeometry) -> Self {
        Self { division, geometry }
    }

    pub fn division(&self) -> Division {
        self.division
    }

    pub fn half_length(&self) -> f64 {
        self.geometry.length / 2.0
    }

    pub fn half_width(&self) -> f64 {
        self.geometry.width / 2.0
    }

    pub fn center_line_x(&self) -> f64 {
        0.0
    }

    /// Penalty mark in front of the goal defended by `team`.
    pub fn penalty_mark(&self, team: Team) -> Position {
        Position::new(
            team.goal_side() * (self.half_length() - self.geometry.penalty_point),
            0.0,
        )
    }

    pub fn corner(&self, x_side: f64, y_side: f64) -> Position {
        Position::new(
            x_side.signum() * self.half_length(),
            y_side.signum() * self.half_width(),
        )
    }

    pub fn ball_spot(&self, spot: BallSpot) -> Position {
        match spot {
            BallSpot::Center => Position::new(self.center_line_x(), 0.0),
            BallSpot::Corner1 => self.corner(-1.0, -1.0),
            BallSpot::Corner2 => self.corner(-1.0, 1.0),
            BallSpot::Corner3 => self.corner(1.0, -1.0),
            BallSpot::Corner4 => self.corner(1.0, 1.0),
            BallSpot::Penalty1 => self.penalty_mark(Team::Yellow),
            BallSpot::Penalty2 => self.penalty_mark(Team::Blue),
        }
    }

    /// Distance from the centre to the inner side of the boundary walls.
    pub fn enclosure(&self) -> Position {
        let margin = self.geometry.margin + self.geometry.referee_margin;
        Position::new(self.half_length() + margin, self.half_width() + margin)
    }

    /// Boundary walls followed by the walls of both goals.
    pub fn walls(&self) -> Vec<Wall> {
        let enclosure = self.enclosure();
        let t = self.geometry.wall_thickness;
        let mut walls = vec![
            Wall::new(
                Position::new(0.0, enclosure.y() + t / 2.0),
                2.0 * (enclosure.x() + t),
                t,
                BOUNDARY_WALL_HEIGHT,
            ),
            Wall::new(
                Position::new(0.0, -enclosure.y() - t / 2.0),
                2.0 * (enclosure.x() + t),
                t,
                BOUNDARY_WALL_HEIGHT,
            ),
            Wall::new(
                Position::new(-enclosure.x() - t / 2.0, 0.0),
                t,
                2.0 * enclosure.y(),
                BOUNDARY_WALL_HEIGHT,
            ),
            Wall::new(
                Position::new(enclosure.x() + t / 2.0, 0.0),
                t,
                2.0 * enclosure.y(),
                BOUNDARY_WALL_HEIGHT,
            ),
        ];

        let gt = self.geometry.goal_thickness;
        let depth = self.geometry.goal_depth;
        let half_goal = self.geometry.goal_width / 2.0;
        let height = self.geometry.goal_height;
        for team in Team::ALL {
            let side = team.goal_side();
            walls.push(Wall::new(
                Position::new(side * (self.half_length() + depth + gt / 2.0), 0.0),
                gt,
                2.0 * (half_goal + gt),
                height,
            ));
            for y_side in [1.0, -1.0] {
                walls.push(Wall::new(
                    Position::new(
                        side * (self.half_length() + depth / 2.0),
                        y_side * (half_goal + gt / 2.0),
                    ),
                    depth,
                    gt,
                    height,
                ));
            }
        }
        walls
    }

    /// Team whose goal fully contains the ball, if any.
    pub fn goal_containing(&self, ball: &Vector3<f64>, ball_radius: f64) -> Option<Team> {
        if ball.y.abs() >= self.geometry.goal_width / 2.0 || ball.z >= self.geometry.goal_height {
            return None;
        }
        Team::ALL
            .into_iter()
            .find(|team| team.goal_side() * ball.x > self.half_length() + ball_radius)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn field() -> FieldSpec {
        FieldSpec::new(
            Division::A,
            FieldGeometry {
                length: 9.0,
                width: 6.0,
                ..FieldGeometry::division_a()
            },
        )
    }

    #[rstest]
    #[case::center(BallSpot::Center, Position::new(0.0, 0.0))]
    #[case::corner_1(BallSpot::Corner1, Position::new(-4.5, -3.0))]
    #[case::corner_2(BallSpot::Corner2, Position::new(-4.5, 3.0))]
    #[case::corner_3(BallSpot::Corner3, Position::new(4.5, -3.0))]
    #[case::corner_4(BallSpot::Corner4, Position::new(4.5, 3.0))]
    #[case::penalty_1(BallSpot::Penalty1, Position::new(3.3, 0.0))]
    #[case::penalty_2(BallSpot::Penalty2, Position::new(-3.3, 0.0))]
    fn test_field_ball_spot(#[case] spot: BallSpot, #[case] expected: Position) {
        assert_abs_diff_eq!(field().ball_spot(spot), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_field_derived_values_follow_geometry() {
        let mut geometry = FieldGeometry::division_b();
        let before = FieldSpec::new(Division::B, geometry.clone());
        geometry.length = 10.0;
        let after = FieldSpec::new(Division::B, geometry);
        assert_abs_diff_eq!(before.half_length(), 4.5);
        assert_abs_diff_eq!(after.half_length(), 5.0);
        assert_abs_diff_eq!(after.penalty_mark(Team::Yellow).x(), 4.0);
    }

    #[test]
    fn test_field_walls_enclose_the_field() {
        let field = field();
        let walls = field.walls();
        assert_eq!(walls.len(), 10);
        let enclosure = field.enclosure();
        assert_abs_diff_eq!(enclosure.x(), 5.2);
        assert_abs_diff_eq!(enclosure.y(), 3.7);
        for wall in &walls[..4] {
            if let Shape::Rectangle { position, .. } = wall.shape() {
                assert!(
                    position.x().abs() > field.half_length()
                        || position.y().abs() > field.half_width()
                );
            }
        }
    }

    #[rstest]
    #[case::inside_blue_goal(Vector3::new(-4.6, 0.0, 0.02), Some(Team::Blue))]
    #[case::inside_yellow_goal(Vector3::new(4.6, 0.2, 0.02), Some(Team::Yellow))]
    #[case::on_goal_line(Vector3::new(-4.5, 0.0, 0.02), None)]
    #[case::beside_goal(Vector3::new(-4.6, 1.0, 0.02), None)]
    #[case::over_goal(Vector3::new(-4.6, 0.0, 0.5), None)]
    fn test_field_goal_containing(#[case] ball: Vector3<f64>, #[case] expected: Option<Team>) {
        assert_eq!(field().goal_containing(&ball, 0.0215), expected);
    }

    #[test]
    fn test_division_default_robot_count() {
        assert_eq!(Division::A.default_robot_count(), 5);
        assert_eq!(Division::B.default_robot_count(), 3);
    }
}
