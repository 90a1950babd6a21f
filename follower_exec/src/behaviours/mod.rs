//! # Behaviours
//!
//! The behaviour state machine sequences the discrete control modes of the follower:
//!
//! - `OnLine` - nominal path following.
//! - `ApproachTurningPoint` - slowing down and stopping at a waypoint where the path changes
//!   heading.
//! - `EmergencyBreak` - stops the robot and ends the task with an internal error.
//!
//! Each cycle the current behaviour is executed once, issuing at most one motion command, and
//! returns a [`Step`]: either the behaviour to run on the next cycle (possibly itself), or the
//! result the task finished with.
//!
//! A behaviour that cannot get a frame transform holds the robot and retries on the next cycle.
//! Any other failure indicates an inconsistent path or progress, and sends the machine into
//! `EmergencyBreak`.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod approach_turning_point;
mod emergency_break;
mod on_line;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt::Display;

use log::{error, warn};
use nav_if::action::ResultStatus;

use crate::follower::{FollowerContext, FollowerError};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    EmergencyBreak,
    OnLine,
    ApproachTurningPoint {
        /// Set once the turning point has been reached
        done: bool,
    },
}

/// Outcome of executing a behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run this behaviour on the next cycle.
    Next(Behaviour),

    /// The task is over.
    Finished(ResultStatus),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Behaviour {
    /// Perform one control step.
    pub fn execute(self, ctx: &mut FollowerContext) -> Step {
        let result = match self {
            Behaviour::EmergencyBreak => Ok(emergency_break::execute(ctx)),
            Behaviour::OnLine => on_line::execute(ctx),
            Behaviour::ApproachTurningPoint { done } => approach_turning_point::execute(done, ctx),
        };

        match result {
            Ok(step) => step,
            Err(FollowerError::TransformError(e)) => {
                warn!("{} holding the robot: {}", self, e);
                ctx.stop_motion();
                Step::Next(self)
            }
            Err(e) => {
                error!("{} failed: {}", self, e);
                ctx.stop_motion();
                Step::Next(Behaviour::EmergencyBreak)
            }
        }
    }

    /// Whether the robot may stray further than the path limit during this behaviour.
    pub fn is_leaving_path_allowed(&self) -> bool {
        matches!(self, Behaviour::ApproachTurningPoint { .. })
    }

    /// Advance the target waypoint as far as this behaviour allows.
    ///
    /// Only `OnLine` moves the target, the other behaviours leave it where it is.
    pub fn select_next_waypoint(self, ctx: &mut FollowerContext) -> Result<Self, FollowerError> {
        if let Behaviour::OnLine = self {
            on_line::select_next_waypoint(ctx)?;
        }

        Ok(self)
    }
}

impl Display for Behaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Behaviour::EmergencyBreak => write!(f, "EmergencyBreak"),
            Behaviour::OnLine => write!(f, "OnLine"),
            Behaviour::ApproachTurningPoint { .. } => write!(f, "ApproachTurningPoint"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        follower::{FollowerParams, NavTask, Progress, RobotIo},
        obstacle_avoidance::{BoxStopAvoider, NoAvoider, ObstacleAvoider},
        path::{Path, Waypoint},
        sim::{SimClock, SimRobot},
        tf::{RigidTransform, StaticTransforms},
    };
    use nalgebra::Point2;
    use nav_if::action::FeedbackStatus;
    use std::sync::Arc;

    fn params() -> FollowerParams {
        util::params::load_str(
            r#"
            planner = "Null"
            local_frame = "odom"
            transform_timeout_s = 0.1
            wp_tolerance_m = 0.1
            goal_tolerance_m = 0.2
            turning_point_switch_dist_m = 1.0
            turning_angle_threshold_rad = 0.5
            max_distance_to_path_m = 1.0
            nominal_speed_ms = 0.5
            min_speed_ms = 0.1
            steering_gain = 1.0
            max_curv_m = 2.0
            lookahead_m = 0.5
            obstacle_sense_range_m = 3.0
            obstacle_timeout_s = 1.0

            [avoider]
            kind = "BoxStop"
            box_half_width_m = 0.4
            box_min_length_m = 0.5
            box_length_per_speed_s = 1.0
            "#,
        )
        .unwrap()
    }

    struct Fixture {
        params: FollowerParams,
        io: RobotIo,
        task: NavTask,
        robot: SimRobot,
        tfs: StaticTransforms,
        clock: SimClock,
    }

    impl Fixture {
        fn new(path: Path, pose: Waypoint) -> Self {
            Self::with_avoider(path, pose, Box::new(NoAvoider))
        }

        fn with_avoider(path: Path, pose: Waypoint, avoider: Box<dyn ObstacleAvoider>) -> Self {
            let robot = SimRobot::new(pose);
            let tfs = StaticTransforms::new();
            tfs.set("map", "odom", RigidTransform::identity());
            let clock = SimClock::new();

            let io = RobotIo {
                controller: Box::new(robot.clone()),
                pose: Box::new(robot.clone()),
                tf: Box::new(tfs.clone()),
                clock: Box::new(clock.clone()),
                avoider,
                obstacles_rb: Vec::new(),
            };

            Self {
                params: params(),
                io,
                task: NavTask::new(Arc::new(path)),
                robot,
                tfs,
                clock,
            }
        }

        fn execute(&mut self, behaviour: Behaviour) -> Step {
            let mut ctx = FollowerContext {
                params: &self.params,
                io: &mut self.io,
                task: &mut self.task,
            };
            behaviour.execute(&mut ctx)
        }
    }

    /// A right angle turn at (3, 0), then on to (3, 3).
    fn corner() -> Path {
        Path::from_waypoints(
            "map",
            vec![
                Waypoint::new(0.0, 0.0, 0.0),
                Waypoint::new(1.5, 0.0, 0.0),
                Waypoint::new(3.0, 0.0, 0.0),
                Waypoint::new(3.0, 3.0, 0.0),
            ],
        )
    }

    #[test]
    fn test_on_line_advances_waypoints() {
        let mut f = Fixture::new(corner(), Waypoint::new(0.0, 0.0, 0.0));

        assert_eq!(f.execute(Behaviour::OnLine), Step::Next(Behaviour::OnLine));

        // The first waypoint is under the robot, the second is a straight continuation
        assert_eq!(f.task.progress.wp_index, 1);
        assert_eq!(f.robot.last_cmd().speed_ms, 0.5);
        assert_eq!(f.task.feedback.status, FeedbackStatus::Moving);

        // Passing the straight waypoint moves the target on to the corner
        f.robot.set_pose(Waypoint::new(1.7, 0.2, 0.0));
        assert_eq!(f.execute(Behaviour::OnLine), Step::Next(Behaviour::OnLine));
        assert_eq!(f.task.progress.wp_index, 2);
    }

    #[test]
    fn test_on_line_to_approach() {
        let mut f = Fixture::new(corner(), Waypoint::new(2.5, 0.0, 0.0));
        f.task.progress.wp_index = 2;

        assert_eq!(
            f.execute(Behaviour::OnLine),
            Step::Next(Behaviour::ApproachTurningPoint { done: false })
        );

        // A turning point further away than the switch distance is not approached yet
        f.robot.set_pose(Waypoint::new(1.5, 0.0, 0.0));
        assert_eq!(f.execute(Behaviour::OnLine), Step::Next(Behaviour::OnLine));
    }

    #[test]
    fn test_approach_then_done() {
        let mut f = Fixture::new(corner(), Waypoint::new(2.5, 0.0, 0.0));
        f.task.progress.wp_index = 2;

        // Still approaching, slower than nominal
        let approach = Behaviour::ApproachTurningPoint { done: false };
        assert_eq!(f.execute(approach), Step::Next(approach));
        let speed_ms = f.robot.last_cmd().speed_ms;
        assert!(speed_ms < 0.5 && speed_ms > 0.1);
        assert_eq!(
            f.task.feedback.status,
            FeedbackStatus::ApproachingTurningPoint
        );

        // At the turning point the robot stops
        f.robot.set_pose(Waypoint::new(2.95, 0.0, 0.0));
        let done = Behaviour::ApproachTurningPoint { done: true };
        assert_eq!(f.execute(approach), Step::Next(done));
        assert!(f.robot.last_cmd().is_stop());
        assert_eq!(f.task.progress.wp_index, 2);

        // Then moves on to the next waypoint
        assert_eq!(f.execute(done), Step::Next(Behaviour::OnLine));
        assert_eq!(f.task.progress.wp_index, 3);
    }

    #[test]
    fn test_passing_turning_point_counts_as_done() {
        let mut f = Fixture::new(corner(), Waypoint::new(3.3, 0.3, 0.0));
        f.task.progress.wp_index = 2;

        assert_eq!(
            f.execute(Behaviour::ApproachTurningPoint { done: false }),
            Step::Next(Behaviour::ApproachTurningPoint { done: true })
        );
    }

    #[test]
    fn test_sub_path_change_and_success() {
        let path = Path::new(
            "map",
            vec![
                vec![Waypoint::new(0.0, 0.0, 0.0), Waypoint::new(1.0, 0.0, 0.0)],
                vec![Waypoint::new(1.0, 0.0, 0.0), Waypoint::new(1.0, 1.0, 0.0)],
            ],
        );
        let mut f = Fixture::new(path, Waypoint::new(1.0, 0.0, 0.0));
        let done = Behaviour::ApproachTurningPoint { done: true };

        f.task.progress.wp_index = 1;
        assert_eq!(f.execute(done), Step::Next(Behaviour::OnLine));
        assert_eq!(
            f.task.progress,
            Progress {
                sub_path_index: 1,
                wp_index: 0
            }
        );

        f.task.progress.wp_index = 1;
        assert_eq!(f.execute(done), Step::Finished(ResultStatus::Success));
        assert!(f.robot.last_cmd().is_stop());
    }

    #[test]
    fn test_path_lost() {
        let mut f = Fixture::new(corner(), Waypoint::new(1.0, 2.0, 0.0));
        f.task.progress.wp_index = 2;

        assert_eq!(
            f.execute(Behaviour::OnLine),
            Step::Finished(ResultStatus::PathLost)
        );

        // Leaving the path is fine while approaching a turning point
        assert!(Behaviour::ApproachTurningPoint { done: false }.is_leaving_path_allowed());
        assert!(!Behaviour::OnLine.is_leaving_path_allowed());
    }

    #[test]
    fn test_emergency_break() {
        let mut f = Fixture::new(corner(), Waypoint::new(1.0, 0.0, 0.0));

        assert_eq!(
            f.execute(Behaviour::EmergencyBreak),
            Step::Finished(ResultStatus::InternalError)
        );
        assert_eq!(f.robot.stop_count(), 1);
    }

    #[test]
    fn test_no_path() {
        let mut f = Fixture::new(Path::new_empty("map"), Waypoint::default());

        assert_eq!(
            f.execute(Behaviour::OnLine),
            Step::Finished(ResultStatus::NoPath)
        );
    }

    #[test]
    fn test_transform_failure_holds() {
        let mut f = Fixture::new(corner(), Waypoint::new(1.0, 0.0, 0.0));
        f.tfs.remove("map", "odom");

        let approach = Behaviour::ApproachTurningPoint { done: false };
        assert_eq!(f.execute(approach), Step::Next(approach));
        assert_eq!(f.robot.stop_count(), 1);
    }

    #[test]
    fn test_inconsistent_progress_breaks() {
        let mut f = Fixture::new(corner(), Waypoint::new(0.0, 0.0, 0.0));

        // Get the robot moving first
        assert_eq!(f.execute(Behaviour::OnLine), Step::Next(Behaviour::OnLine));
        assert!(!f.robot.last_cmd().is_stop());

        f.task.progress.sub_path_index = 4;

        assert_eq!(
            f.execute(Behaviour::OnLine),
            Step::Next(Behaviour::EmergencyBreak)
        );

        // Stopped on entering the break, not a cycle later
        assert_eq!(f.robot.stop_count(), 1);
        assert!(f.robot.last_cmd().is_stop());
    }

    #[test]
    fn test_select_next_waypoint_hook() {
        let mut f = Fixture::new(corner(), Waypoint::new(0.0, 0.0, 0.0));
        let mut ctx = FollowerContext {
            params: &f.params,
            io: &mut f.io,
            task: &mut f.task,
        };

        // Approaching never moves the target
        let approach = Behaviour::ApproachTurningPoint { done: false };
        assert_eq!(approach.select_next_waypoint(&mut ctx).unwrap(), approach);
        assert_eq!(ctx.progress().wp_index, 0);

        assert_eq!(
            Behaviour::OnLine.select_next_waypoint(&mut ctx).unwrap(),
            Behaviour::OnLine
        );
        assert_eq!(ctx.progress().wp_index, 1);
    }

    #[test]
    fn test_obstacle_blocks_then_fails() {
        let mut f = Fixture::with_avoider(
            corner(),
            Waypoint::new(0.0, 0.0, 0.0),
            Box::new(BoxStopAvoider::new()),
        );
        f.io.obstacles_rb = vec![Point2::new(0.6, 0.0)];

        assert_eq!(f.execute(Behaviour::OnLine), Step::Next(Behaviour::OnLine));
        assert!(f.robot.last_cmd().is_stop());
        assert_eq!(f.task.feedback.status, FeedbackStatus::ObstacleBlocked);

        f.clock.set(1.5);
        assert_eq!(
            f.execute(Behaviour::OnLine),
            Step::Finished(ResultStatus::Obstacle)
        );
    }
}
