//! Kick-off layouts keyed by the number of robots per team.
//!
//! Slots are filled in order, so larger formations extend smaller ones. All slots fit inside the
//! smaller division B field.

use std::f64::consts::PI;

use thiserror::Error;

use super::{Angle, Pose, Position, Team};

/// Blue slots in the own (negative x) half. Yellow uses the point mirrored slot.
const SLOTS: [(f64, f64); 11] = [
    (-4.2, 0.0),
    (-3.0, -1.0),
    (-3.0, 1.0),
    (-1.5, 0.0),
    (-1.5, -2.0),
    (-1.5, 2.0),
    (-0.8, -1.0),
    (-0.8, 1.0),
    (-3.0, -2.5),
    (-3.0, 2.5),
    (-2.2, 0.0),
];

pub const SUPPORTED_COUNTS: [usize; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 11];

#[derive(Error, Debug, PartialEq)]
pub enum FormationError {
    #[error("no formation for {0} robots per team")]
    UnsupportedCount(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FormationEntry {
    pub team: Team,
    pub id: usize,
    pub pose: Pose,
}

/// Poses of both teams, blue first.
pub fn formation_for(count: usize) -> Result<Vec<FormationEntry>, FormationError> {
    if !SUPPORTED_COUNTS.contains(&count) {
        return Err(FormationError::UnsupportedCount(count));
    }
    Ok(Team::ALL
        .into_iter()
        .flat_map(|team| {
            SLOTS[..count]
                .iter()
                .enumerate()
                .map(move |(id, &(x, y))| FormationEntry {
                    team,
                    id,
                    pose: slot_pose(team, x, y),
                })
        })
        .collect())
}

fn slot_pose(team: Team, x: f64, y: f64) -> Pose {
    match team {
        Team::Blue => Pose::new(Position::new(x, y), Angle::new(0.0)),
        Team::Yellow => Pose::new(Position::new(-x, -y), Angle::new(PI)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_formation_covers_both_teams_once(
        #[values(1, 2, 3, 4, 5, 6, 7, 8, 11)] count: usize,
    ) {
        let formation = formation_for(count).unwrap();
        assert_eq!(formation.len(), 2 * count);
        let keys = formation
            .iter()
            .map(|entry| (entry.team, entry.id))
            .collect::<BTreeSet<_>>();
        assert_eq!(keys.len(), 2 * count);
    }

    #[rstest]
    #[case(0)]
    #[case(9)]
    #[case(10)]
    #[case(12)]
    fn test_formation_unsupported_count(#[case] count: usize) {
        assert_eq!(
            formation_for(count),
            Err(FormationError::UnsupportedCount(count))
        );
    }

    #[test]
    fn test_formation_is_deterministic_and_mirrored() {
        assert_eq!(formation_for(5).unwrap(), formation_for(5).unwrap());
        let formation = formation_for(3).unwrap();
        let blue = formation[1].pose;
        let yellow = formation[4].pose;
        assert_eq!(formation[4].team, Team::Yellow);
        assert_eq!(formation[4].id, 1);
        assert_abs_diff_eq!(yellow.position, -blue.position);
        assert_abs_diff_eq!(yellow.heading.radians(), PI);
    }

    #[test]
    fn test_formation_robots_do_not_overlap() {
        let formation = formation_for(11).unwrap();
        for (i, a) in formation.iter().enumerate() {
            for b in &formation[i + 1..] {
                assert!((a.pose.position - b.pose.position).norm() > 0.18);
            }
        }
    }
}
