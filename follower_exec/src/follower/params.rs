//! # Path follower parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::obstacle_avoidance::AvoiderParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the path follower and its behaviours.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowerParams {
    /// Which local planner to use
    pub planner: PlannerKind,

    /// Frame the robot pose is provided in
    pub local_frame: String,

    /// Maximum time to wait for a frame transform
    pub transform_timeout_s: f64,

    /// Distance at which an intermediate waypoint is considered reached
    pub wp_tolerance_m: f64,

    /// Distance at which the final waypoint of the path is considered reached
    pub goal_tolerance_m: f64,

    /// Distance from a turning point at which the robot starts to approach it
    pub turning_point_switch_dist_m: f64,

    /// Change in path heading above which a waypoint is a turning point
    pub turning_angle_threshold_rad: f64,

    /// Distance from the current path segment above which the robot has lost the path
    pub max_distance_to_path_m: f64,

    /// Speed demand while following the path
    pub nominal_speed_ms: f64,

    /// Speed demand when arriving at a turning point
    pub min_speed_ms: f64,

    /// Gain applied to the pursuit curvature
    pub steering_gain: f64,

    /// Limit on the magnitude of the curvature demand
    pub max_curv_m: f64,

    /// Distance ahead along the local path of the point the robot steers toward
    pub lookahead_m: f64,

    /// Range within which obstacles are passed to the planner and avoider
    pub obstacle_sense_range_m: f64,

    /// Time the avoider may hold the robot back before the task fails
    pub obstacle_timeout_s: f64,

    pub avoider: AvoiderParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PlannerKind {
    /// Use the search based planner
    Bfs,

    /// Follow the global path directly
    Null,
}
