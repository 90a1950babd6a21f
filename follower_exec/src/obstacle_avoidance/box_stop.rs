//! # Box stop avoider

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use nalgebra::Point2;
use nav_if::cmd::MoveCmd;

use super::{AvoidState, ObstacleAvoider};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Stops the robot when an obstacle lies inside a box in the direction of travel.
///
/// The box extends from the robot's origin along the direction of the speed demand, and grows
/// with the demanded speed so that faster motion stops earlier.
#[derive(Debug, Default, Clone)]
pub struct BoxStopAvoider {
    /// Whether the previous call stopped the robot, used to only log on the first stop.
    blocked: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BoxStopAvoider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}

impl ObstacleAvoider for BoxStopAvoider {
    fn avoid(&mut self, cmd: &mut MoveCmd, obstacles_rb: &[Point2<f64>], state: &AvoidState) -> bool {
        if cmd.is_stop() {
            self.blocked = false;
            return false;
        }

        let params = state.params;
        let length_m = params.box_min_length_m + cmd.speed_ms.abs() * params.box_length_per_speed_s;

        // Reversing looks behind the robot instead
        let dir = cmd.speed_ms.signum();

        let hit = obstacles_rb.iter().find(|o| {
            let along_m = o.x * dir;
            along_m >= 0.0 && along_m <= length_m && o.y.abs() <= params.box_half_width_m
        });

        match hit {
            Some(o) => {
                if !self.blocked {
                    warn!(
                        "Obstacle at ({:.2}, {:.2}) inside the {:.2} m stopping box, stopping",
                        o.x, o.y, length_m
                    );
                }
                self.blocked = true;
                *cmd = MoveCmd::stop();
                true
            }
            None => {
                self.blocked = false;
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::test::params;
    use super::*;

    #[test]
    fn test_box_stop() {
        let params = params();
        let state = AvoidState {
            path: None,
            params: &params,
        };
        let mut avoider = BoxStopAvoider::new();

        // At 0.5 m/s the box is 1.5 m long
        let obstacles = vec![Point2::new(1.2, 0.3), Point2::new(-0.5, 0.0)];

        let mut cmd = MoveCmd::new(0.5, 0.0);
        assert!(avoider.avoid(&mut cmd, &obstacles, &state));
        assert!(cmd.is_stop());
        assert!(avoider.is_blocked());

        // Slower, so the box no longer reaches the obstacle ahead
        let mut cmd = MoveCmd::new(0.1, 0.0);
        assert!(!avoider.avoid(&mut cmd, &obstacles, &state));
        assert_eq!(cmd, MoveCmd::new(0.1, 0.0));
        assert!(!avoider.is_blocked());

        // Reversing into the obstacle behind
        let mut cmd = MoveCmd::new(-0.1, 0.0);
        assert!(avoider.avoid(&mut cmd, &obstacles, &state));

        // Outside the width of the box
        let wide = vec![Point2::new(0.5, 0.6)];
        let mut cmd = MoveCmd::new(0.5, 0.0);
        assert!(!avoider.avoid(&mut cmd, &wide, &state));
    }
}
