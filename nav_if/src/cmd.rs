//! # Motion commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A motion command for the robot, expressed as a generic Ackermann-style manouvre.
///
/// The robot drives in a circle about a centre of rotation defined by the curvature. The
/// obstacle avoidance policy may modify the command in place before it is sent to the
/// controller.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveCmd {
    /// The speed of the manouvre in meters/second.
    ///
    /// Positive speeds are "forwards", negative speeds are "backwards"
    pub speed_ms: f64,

    /// The curvature of the manouvre in 1/meters.
    ///
    /// Follows the right hand rule about the robot's Z+ (upwards) axis, so that positive
    /// curvature is a turn to the left, and negative curvature a turn to the right.
    pub curv_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MoveCmd {
    pub fn new(speed_ms: f64, curv_m: f64) -> Self {
        Self { speed_ms, curv_m }
    }

    /// A command which brings the robot to a halt.
    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stop(&self) -> bool {
        self.speed_ms == 0.0
    }

    /// The yaw rate this command produces, in radians/second.
    pub fn yaw_rate_rads(&self) -> f64 {
        self.speed_ms * self.curv_m
    }
}
