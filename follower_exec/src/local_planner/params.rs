//! # Local planner parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::scoring::ScoringParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the search planner.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalPlannerParams {
    /// Minimum time between two re-plans
    pub update_interval_s: f64,

    /// Maximum time to wait for the global to local frame transform
    pub transform_timeout_s: f64,

    /// Frame local paths are expressed in
    pub local_frame: String,

    /// Capacity of the node arena
    pub max_num_nodes: usize,

    /// Deepest level of the search tree which will be expanded
    pub max_depth: usize,

    /// Distance to the last waypoint of the sub-path under which a node is a goal
    pub goal_tolerance_m: f64,

    /// Remaining progress along the sub-path under which no re-plan is made
    pub early_exit_threshold_m: f64,

    /// Distance between a node and its successors
    pub step_length_m: f64,

    /// Time of travel used to scale the step length with the set velocity
    pub step_time_s: f64,

    /// Change in heading between neighbouring successors
    pub steer_angle_step_rad: f64,

    /// Number of successors generated from each node
    pub num_steer_angles: usize,

    /// Smoothing of the raw search output
    pub first_smoothing: SmoothingParams,

    /// Spacing of the resampled path
    pub interpolation_step_m: f64,

    /// Smoothing of the resampled path
    pub second_smoothing: SmoothingParams,

    /// Standard plugins used with this planner
    pub scoring: ScoringParams,
}

/// Parameters of one smoothing pass.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SmoothingParams {
    /// How strongly each waypoint is pulled toward its neighbours
    pub weight: f64,

    /// Maximum distance a waypoint may be moved
    pub max_displacement_m: f64,
}
