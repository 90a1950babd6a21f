//! # Robot interfaces
//!
//! The follower does not drive actuators itself. It hands paths and motion commands to an
//! external trajectory-following controller, and reads the robot pose from an external
//! localisation source. Both are modelled by the traits in this module.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use nav_if::cmd::MoveCmd;

use crate::path::{Path, Waypoint};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Sink for the paths and commands produced by the follower.
pub trait RobotController {
    /// Clear any progress the controller has made along its current path.
    fn reset(&mut self);

    /// Install a new path, replacing the previous one.
    fn set_path(&mut self, path: Arc<Path>);

    /// Bring the robot to a halt as quickly as possible.
    fn stop_motion(&mut self);

    /// Demand a motion command.
    fn set_command(&mut self, cmd: MoveCmd);
}

/// Source of the robot pose in the local frame.
pub trait PoseProvider {
    fn current_pose(&self) -> Waypoint;
}
