//! # Obstacle avoider parameters

use serde::Deserialize;

/// Selects which obstacle avoider the follower uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AvoiderKind {
    None,
    BoxStop,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvoiderParams {
    pub kind: AvoiderKind,

    /// Half of the width of the stopping box, centred on the robot's x axis
    pub box_half_width_m: f64,

    /// Length of the stopping box when stationary
    pub box_min_length_m: f64,

    /// Extra box length per m/s of speed demand
    pub box_length_per_speed_s: f64,
}
