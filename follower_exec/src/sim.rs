//! # Simulated collaborators
//!
//! A kinematic robot and a manually stepped clock, used by the executable's simulation loop, the
//! benchmarks and the unit tests.
//!
//! Both are handles onto shared state: clones see the same robot or clock. This lets one handle
//! be lent out as the pose provider while another is lent out mutably as the controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    sync::Arc,
};

use log::trace;
use nalgebra::Point2;
use nav_if::cmd::MoveCmd;

use crate::{
    obstacle_avoidance::ObstacleCloud,
    path::{Path, Waypoint},
    robot::{PoseProvider, RobotController},
    tf::TimeSource,
};
use util::maths::wrap_pi;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Clock which only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_s: Rc<Cell<f64>>,
}

/// A unicycle robot driving the last command it was given.
#[derive(Debug, Clone)]
pub struct SimRobot {
    state: Rc<RefCell<SimRobotState>>,
}

#[derive(Debug)]
struct SimRobotState {
    /// Pose in the local frame
    pose: Waypoint,

    cmd: MoveCmd,
    installed_path: Option<Arc<Path>>,
    reset_count: usize,
    stop_count: usize,

    /// Obstacles in the local frame
    obstacles_m: Vec<Point2<f64>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now_s: f64) {
        self.now_s.set(now_s);
    }

    pub fn advance(&self, dt_s: f64) {
        self.now_s.set(self.now_s.get() + dt_s);
    }
}

impl TimeSource for SimClock {
    fn now(&self) -> f64 {
        self.now_s.get()
    }
}

impl SimRobot {
    pub fn new(pose: Waypoint) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimRobotState {
                pose,
                cmd: MoveCmd::stop(),
                installed_path: None,
                reset_count: 0,
                stop_count: 0,
                obstacles_m: Vec::new(),
            })),
        }
    }

    pub fn set_pose(&self, pose: Waypoint) {
        self.state.borrow_mut().pose = pose;
    }

    /// The path most recently installed by the follower.
    pub fn installed_path(&self) -> Option<Arc<Path>> {
        self.state.borrow().installed_path.clone()
    }

    pub fn reset_count(&self) -> usize {
        self.state.borrow().reset_count
    }

    pub fn stop_count(&self) -> usize {
        self.state.borrow().stop_count
    }

    /// The command currently being driven.
    pub fn last_cmd(&self) -> MoveCmd {
        self.state.borrow().cmd
    }

    /// Place obstacles in the world, given in the local frame.
    pub fn set_obstacles(&self, obstacles_m: Vec<Point2<f64>>) {
        self.state.borrow_mut().obstacles_m = obstacles_m;
    }

    /// Get the obstacles within `range_m` of the robot, in the robot frame.
    pub fn sense_obstacles(&self, range_m: f64) -> ObstacleCloud {
        let state = self.state.borrow();
        let local_to_robot = state.pose.as_isometry().inverse();

        state
            .obstacles_m
            .iter()
            .map(|o| local_to_robot * o)
            .filter(|o| o.coords.norm() <= range_m)
            .collect()
    }

    /// Drive the current command for `dt_s` seconds.
    pub fn step(&self, dt_s: f64) {
        let mut state = self.state.borrow_mut();
        let cmd = state.cmd;
        let pose = &mut state.pose;

        pose.x += cmd.speed_ms * pose.orientation.cos() * dt_s;
        pose.y += cmd.speed_ms * pose.orientation.sin() * dt_s;
        pose.orientation = wrap_pi(pose.orientation + cmd.yaw_rate_rads() * dt_s);

        trace!(
            "Sim robot at ({:.3}, {:.3}, {:.3})",
            pose.x,
            pose.y,
            pose.orientation
        );
    }
}

impl RobotController for SimRobot {
    fn reset(&mut self) {
        self.state.borrow_mut().reset_count += 1;
    }

    fn set_path(&mut self, path: Arc<Path>) {
        self.state.borrow_mut().installed_path = Some(path);
    }

    fn stop_motion(&mut self) {
        let mut state = self.state.borrow_mut();
        state.cmd = MoveCmd::stop();
        state.stop_count += 1;
    }

    fn set_command(&mut self, cmd: MoveCmd) {
        self.state.borrow_mut().cmd = cmd;
    }
}

impl PoseProvider for SimRobot {
    fn current_pose(&self) -> Waypoint {
        self.state.borrow().pose
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_unicycle() {
        let robot = SimRobot::new(Waypoint::default());
        let mut ctrl = robot.clone();

        ctrl.set_command(MoveCmd::new(1.0, 0.0));
        robot.step(0.5);
        assert!((robot.current_pose().x - 0.5).abs() < 1e-9);

        // Quarter turn on a 1 m radius, in small steps
        robot.set_pose(Waypoint::default());
        ctrl.set_command(MoveCmd::new(1.0, 1.0));
        for _ in 0..1000 {
            robot.step(PI / 2.0 / 1000.0);
        }
        let pose = robot.current_pose();
        assert!((pose.x - 1.0).abs() < 1e-2);
        assert!((pose.y - 1.0).abs() < 1e-2);
        assert!((pose.orientation - PI / 2.0).abs() < 1e-6);

        ctrl.stop_motion();
        assert!(robot.last_cmd().is_stop());
        assert_eq!(robot.stop_count(), 1);
    }

    #[test]
    fn test_sense_obstacles() {
        let robot = SimRobot::new(Waypoint::new(1.0, 1.0, PI / 2.0));
        robot.set_obstacles(vec![Point2::new(1.0, 2.0), Point2::new(10.0, 10.0)]);

        let seen = robot.sense_obstacles(3.0);
        assert_eq!(seen.len(), 1);

        // Straight ahead of the robot
        assert!((seen[0] - Point2::new(1.0, 0.0)).norm() < 1e-9);
    }
}
