//! Human readable state for whatever front end displays the simulation.

use nalgebra::Vector3;

use crate::{
    domain::{MatchScore, MatchState, PhysicsWorld, Selection, TickLoop},
    protocol::Perturbation,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusReport {
    pub score: String,
    pub frame_rate: String,
    pub cursor: String,
    pub selection: String,
    pub noise: bool,
    pub vanishing: bool,
    /// Speed and acceleration magnitude of the selected object.
    pub motion: Option<Motion>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub speed: f64,
    pub acceleration: f64,
}

impl StatusReport {
    pub fn collect(
        match_state: &MatchState,
        tick_loop: &TickLoop,
        tracker: &MotionTracker,
        perturbation: &Perturbation,
    ) -> Self {
        Self {
            score: score_label(match_state.score()),
            frame_rate: frame_rate_label(tick_loop.measured_fps()),
            cursor: cursor_label(match_state.cursor()),
            selection: selection_label(match_state.selection()),
            noise: perturbation.noise.enabled,
            vanishing: perturbation.vanishing.enabled,
            motion: tracker.latest(),
        }
    }
}

/// Tracks the motion of the selection from one tick to the next.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotionTracker {
    previous: Option<(Selection, Vector3<f64>)>,
    latest: Option<Motion>,
}

impl MotionTracker {
    /// Samples the selected object; called once per tick with the tick period.
    pub fn observe(&mut self, world: &PhysicsWorld, selection: Selection, period: f64) {
        let velocity = match selection {
            Selection::None => None,
            Selection::Ball => Some(world.ball().velocity()),
            Selection::Robot { team, id } => {
                world.robot(team, id).ok().map(|robot| robot.velocity())
            }
        };
        self.latest = self.sample(selection, velocity, period);
    }

    pub fn latest(&self) -> Option<Motion> {
        self.latest
    }

    fn sample(
        &mut self,
        selection: Selection,
        velocity: Option<Vector3<f64>>,
        period: f64,
    ) -> Option<Motion> {
        let Some(velocity) = velocity else {
            self.previous = None;
            return None;
        };
        let acceleration = match self.previous {
            Some((previous_selection, previous))
                if previous_selection == selection && period > 0.0 =>
            {
                (velocity - previous).norm() / period
            }
            _ => 0.0,
        };
        self.previous = Some((selection, velocity));
        Some(Motion {
            speed: velocity.norm(),
            acceleration,
        })
    }
}

pub fn score_label(score: MatchScore) -> String {
    format!("BLUE {} x {} YELLOW", score.goals_blue, score.goals_yellow)
}

pub fn frame_rate_label(fps: f64) -> String {
    format!("Frame rate: {fps:06.2} fps")
}

pub fn cursor_label(cursor: Vector3<f64>) -> String {
    format!(
        "Cursor: [X={:+.3};Y={:+.3};Z={:+.3}]",
        cursor.x, cursor.y, cursor.z
    )
}

pub fn selection_label(selection: Selection) -> String {
    match selection {
        Selection::None => String::new(),
        Selection::Ball => "Ball".to_string(),
        Selection::Robot { team, id } => format!("{id}:{team:?}"),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::domain::Team;

    #[test]
    fn test_labels() {
        assert_snapshot!(
            score_label(MatchScore {
                goals_blue: 1,
                goals_yellow: 2
            }),
            @"BLUE 1 x 2 YELLOW"
        );
        assert_snapshot!(frame_rate_label(60.0), @"Frame rate: 060.00 fps");
        assert_snapshot!(frame_rate_label(125.5), @"Frame rate: 125.50 fps");
        assert_snapshot!(
            cursor_label(Vector3::new(1.5, -0.25, 0.0)),
            @"Cursor: [X=+1.500;Y=-0.250;Z=+0.000]"
        );
        assert_snapshot!(
            selection_label(Selection::Robot {
                team: Team::Yellow,
                id: 3
            }),
            @"3:Yellow"
        );
        assert_eq!(selection_label(Selection::None), "");
    }

    #[test]
    fn test_motion_tracker() {
        let mut tracker = MotionTracker::default();
        let first = tracker
            .sample(Selection::Ball, Some(Vector3::new(3.0, 4.0, 0.0)), 0.01)
            .unwrap();
        assert_abs_diff_eq!(first.speed, 5.0);
        assert_abs_diff_eq!(first.acceleration, 0.0);

        let second = tracker
            .sample(Selection::Ball, Some(Vector3::new(3.0, 4.1, 0.0)), 0.01)
            .unwrap();
        assert_abs_diff_eq!(second.acceleration, 10.0, epsilon = 1e-9);

        assert_eq!(tracker.sample(Selection::None, None, 0.01), None);
    }
}
