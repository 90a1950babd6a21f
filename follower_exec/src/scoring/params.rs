//! # Scoring parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the standard constraint and scorer plugins.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringParams {
    /// Maximum distance a candidate pose may be from the global sub-path
    pub max_dist_to_path_m: f64,

    /// Distance to the previous local path above which the last path scorer is ignored
    pub max_dist_to_last_path_m: f64,

    /// Minimum distance a candidate pose must keep from every obstacle
    pub min_obstacle_clearance_m: f64,

    /// Weight of the distance to the global sub-path in the node cost
    pub path_weight: f64,

    /// Weight of the distance to the previous local path in the node cost
    pub last_path_weight: f64,

    /// Weight of the obstacle proximity cost
    pub obstacle_weight: f64,

    /// Distance beyond which obstacles add no cost
    pub obstacle_range_m: f64,

    /// Activation vector for the constraint registry
    pub constraints_active: Vec<bool>,

    /// Activation vector for the scorer registry
    pub scorers_active: Vec<bool>,
}
