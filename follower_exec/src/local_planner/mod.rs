//! # Local planner
//!
//! The local planner periodically re-derives a short, locally feasible path from the robot's
//! current pose toward the end of the global sub-path being tracked, and hands it to the robot
//! controller. Two planners are provided:
//!
//! - [`LocalPlannerBfs`] - a bounded breadth-first tree search over robot poses, scored by the
//!   plugins in the constraint and scorer registries.
//! - [`LocalPlannerNull`] - performs no planning, the global path is forwarded to the controller
//!   unchanged.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod bfs;
mod null;
mod params;
pub mod postproc;

pub use bfs::{LocalPlannerBfs, PlannerReport};
pub use null::LocalPlannerNull;
pub use params::{LocalPlannerParams, SmoothingParams};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use nalgebra::Point2;

use crate::{
    path::{Path, PathError},
    robot::{PoseProvider, RobotController},
    scoring::{ConstraintRegistry, RegistryError, ScorerRegistry},
    tf::{TimeSource, TransformLookup},
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait LocalPlanner {
    /// Set the global path the local path is derived from.
    fn set_global_path(&mut self, path: Arc<Path>, controller: &mut dyn RobotController);

    /// Derive a new local path, if one is due.
    ///
    /// Returns `Ok(None)` when no new path was produced this cycle, in which case the
    /// controller's path is left untouched. When a new path is produced it has already been
    /// installed in the controller.
    fn update_local_path(
        &mut self,
        io: &mut PlannerIo,
        constraints: &mut ConstraintRegistry,
        scorers: &mut ScorerRegistry,
    ) -> Result<Option<Arc<Path>>, LocalPlannerError>;

    fn set_params(&mut self, params: LocalPlannerParams);

    /// Set the current velocity of the robot.
    fn set_velocity(&mut self, velocity_ms: f64);

    /// Returns true if this planner does no planning of its own.
    fn is_null(&self) -> bool;

    /// Statistics of the last plan made, if the planner keeps any.
    fn last_report(&self) -> Option<&PlannerReport> {
        None
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The collaborators a planner uses during one update.
pub struct PlannerIo<'a> {
    pub tf: &'a dyn TransformLookup,
    pub clock: &'a dyn TimeSource,
    pub pose: &'a dyn PoseProvider,
    pub controller: &'a mut dyn RobotController,

    /// Obstacle points in the robot frame
    pub obstacles_rb: &'a [Point2<f64>],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LocalPlannerError {
    #[error("No global path has been set")]
    NoGlobalPath,

    #[error("Invalid global path: {0}")]
    PathError(#[from] PathError),

    #[error("Plugin registry error: {0}")]
    RegistryError(#[from] RegistryError),
}
