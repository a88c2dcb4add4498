//! Score, selection and cursor of the running match.

use nalgebra::Vector3;

use super::{BallModel, FieldSpec, Team};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MatchScore {
    pub goals_blue: u32,
    pub goals_yellow: u32,
}

impl MatchScore {
    fn credit(&mut self, team: Team) {
        match team {
            Team::Blue => self.goals_blue += 1,
            Team::Yellow => self.goals_yellow += 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Selection {
    #[default]
    None,
    Ball,
    Robot {
        team: Team,
        id: usize,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchState {
    score: MatchScore,
    selection: Selection,
    cursor: Vector3<f64>,
    /// Goal the ball was inside of at the previous check.
    ball_in_goal: Option<Team>,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self) -> MatchScore {
        self.score
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn cursor(&self) -> Vector3<f64> {
        self.cursor
    }

    pub fn move_cursor(&mut self, cursor: Vector3<f64>) {
        self.cursor = cursor;
    }

    /// Credits a goal when the ball enters a goal. A ball staying in the goal scores once; it has
    /// to leave and re-enter to score again. A ball moved straight from one goal into the other
    /// scores in the new goal. Returns the scoring team.
    pub fn check_goal(&mut self, field: &FieldSpec, ball: &BallModel) -> Option<Team> {
        let defending = field.goal_containing(&ball.position(), ball.radius());
        let entered = defending.filter(|team| self.ball_in_goal != Some(*team));
        self.ball_in_goal = defending;

        let scoring = entered?.opponent();
        self.score.credit(scoring);
        Some(scoring)
    }

    /// Full restart: score and goal tracking start over, selection and cursor stay.
    pub fn reset(&mut self) {
        self.score = MatchScore::default();
        self.ball_in_goal = None;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::domain::{BallConfig, Division, FieldGeometry, Position};

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

    fn ball_at(x: f64, y: f64) -> BallModel {
        let mut ball = BallModel::new(&BallConfig::default()).unwrap();
        ball.put_at(Position::new(x, y));
        ball
    }

    #[test]
    fn test_goal_in_blue_goal_scores_once_for_yellow() {
        let field = field();
        let mut state = MatchState::new();
        assert_eq!(state.check_goal(&field, &ball_at(-4.0, 0.0)), None);
        assert_eq!(
            state.check_goal(&field, &ball_at(-4.6, 0.0)),
            Some(Team::Yellow)
        );
        for _ in 0..10 {
            assert_eq!(state.check_goal(&field, &ball_at(-4.6, 0.1)), None);
        }
        assert_eq!(
            state.score(),
            MatchScore {
                goals_blue: 0,
                goals_yellow: 1
            }
        );
    }

    #[test]
    fn test_goal_counts_again_after_leaving() {
        let field = field();
        let mut state = MatchState::new();
        state.check_goal(&field, &ball_at(4.6, 0.0));
        state.check_goal(&field, &ball_at(4.0, 0.0));
        state.check_goal(&field, &ball_at(4.6, 0.0));
        assert_eq!(
            state.score(),
            MatchScore {
                goals_blue: 2,
                goals_yellow: 0
            }
        );
    }

    #[test]
    fn test_ball_moved_between_goals_scores_in_both() {
        let field = field();
        let mut state = MatchState::new();
        assert_eq!(
            state.check_goal(&field, &ball_at(4.6, 0.0)),
            Some(Team::Blue)
        );
        assert_eq!(
            state.check_goal(&field, &ball_at(-4.6, 0.0)),
            Some(Team::Yellow)
        );
        assert_eq!(state.check_goal(&field, &ball_at(-4.6, 0.0)), None);
        assert_eq!(
            state.score(),
            MatchScore {
                goals_blue: 1,
                goals_yellow: 1
            }
        );
    }

    #[test]
    fn test_reset_clears_score_only() {
        let field = field();
        let mut state = MatchState::new();
        state.select(Selection::Robot {
            team: Team::Yellow,
            id: 2,
        });
        state.move_cursor(Vector3::new(1.0, 2.0, 0.0));
        state.check_goal(&field, &ball_at(4.6, 0.0));
        state.reset();
        assert_eq!(state.score(), MatchScore::default());
        assert_eq!(
            state.selection(),
            Selection::Robot {
                team: Team::Yellow,
                id: 2
            }
        );
        assert_eq!(state.cursor(), Vector3::new(1.0, 2.0, 0.0));
    }
}
