//! # Obstacle avoidance
//!
//! An obstacle avoider is a policy consulted by the behaviours just before a motion command is
//! sent to the robot controller. It is given the proposed command, the obstacle points around
//! the robot (in the robot's own frame, +ve x forwards) and the ancillary state of the follower,
//! and may modify the command in place.
//!
//! Two policies are provided:
//!
//! - [`NoAvoider`] - the identity policy, never touches the command.
//! - [`BoxStopAvoider`] - stops the robot if any obstacle lies in a box ahead of it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod box_stop;
mod params;

pub use box_stop::BoxStopAvoider;
pub use params::{AvoiderKind, AvoiderParams};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Point2;
use nav_if::cmd::MoveCmd;

use crate::path::Path;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// A set of obstacle points, in the robot frame.
pub type ObstacleCloud = Vec<Point2<f64>>;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait ObstacleAvoider {
    /// Adjust `cmd` to avoid the obstacles, returning true if it was changed.
    fn avoid(&mut self, cmd: &mut MoveCmd, obstacles_rb: &[Point2<f64>], state: &AvoidState) -> bool;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State available to the avoider on each call.
#[derive(Debug, Clone, Copy)]
pub struct AvoidState<'a> {
    /// The path currently installed in the controller, if any.
    pub path: Option<&'a Path>,

    pub params: &'a AvoiderParams,
}

/// Avoider which does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAvoider;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ObstacleAvoider for NoAvoider {
    fn avoid(&mut self, _cmd: &mut MoveCmd, _obstacles_rb: &[Point2<f64>], _state: &AvoidState) -> bool {
        false
    }
}

impl AvoiderParams {
    /// Create the avoider selected by these parameters.
    pub fn build(&self) -> Box<dyn ObstacleAvoider> {
        match self.kind {
            AvoiderKind::None => Box::new(NoAvoider),
            AvoiderKind::BoxStop => Box::new(BoxStopAvoider::new()),
        }
    }
}
