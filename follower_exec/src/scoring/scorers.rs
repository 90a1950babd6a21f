//! # Scorer plugins

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Point2;

use super::{PathBinding, PlanningContext, Plugin, RegistryError, Scorer};
use crate::path::{cumulative_distances, distance_to_path, project_onto, Waypoint};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Scores a pose by how far along the sub-path it has progressed.
///
/// The score is the arc length from the first waypoint of the sub-path to the point of the
/// sub-path closest to the pose, so the score of the last waypoint is the length of the
/// sub-path and `score(last) - score(pose)` is the distance still to go.
#[derive(Debug, Clone, Default)]
pub struct Dis2StartScorer {
    /// Waypoints and their cumulative distances, set on configure
    distances: Option<(Vec<Waypoint>, Vec<f64>)>,
}

/// Weighted distance from a pose to a path.
#[derive(Debug, Clone)]
pub struct Dis2PathScorer {
    binding: PathBinding,
    weight: f64,
    path: Option<Vec<Waypoint>>,
}

/// Cost rising linearly from zero at `range_m` to `weight` on top of the nearest obstacle.
#[derive(Debug, Clone)]
pub struct Dis2ObstScorer {
    weight: f64,
    range_m: f64,
    obstacles_m: Option<Vec<Point2<f64>>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Dis2StartScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precompute the cumulative distances along the given waypoints.
    pub fn set_distances(&mut self, waypoints: &[Waypoint]) {
        self.distances = Some((waypoints.to_vec(), cumulative_distances(waypoints)));
    }
}

impl Plugin for Dis2StartScorer {
    fn name(&self) -> &'static str {
        "Dis2StartScorer"
    }

    fn configure(&mut self, ctx: &PlanningContext) {
        self.set_distances(ctx.sub_path);
    }
}

impl Scorer for Dis2StartScorer {
    fn score(&self, pose: &Waypoint) -> Result<f64, RegistryError> {
        let (waypoints, cum_dists) = self
            .distances
            .as_ref()
            .ok_or_else(|| RegistryError::NotConfigured(self.name()))?;

        Ok(project_onto(waypoints, cum_dists, &pose.position()).map_or(0.0, |p| p.arc_length_m))
    }
}

impl Dis2PathScorer {
    pub fn new(binding: PathBinding, weight: f64) -> Self {
        Self {
            binding,
            weight,
            path: None,
        }
    }
}

impl Plugin for Dis2PathScorer {
    fn name(&self) -> &'static str {
        match self.binding {
            PathBinding::GlobalSubPath => "Dis2PathScorer",
            PathBinding::LastLocalPath => "Dis2LastPathScorer",
        }
    }

    fn configure(&mut self, ctx: &PlanningContext) {
        self.path = Some(ctx.bound_path(self.binding).to_vec());
    }
}

impl Scorer for Dis2PathScorer {
    fn score(&self, pose: &Waypoint) -> Result<f64, RegistryError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| RegistryError::NotConfigured(self.name()))?;

        Ok(distance_to_path(path, &pose.position()).map_or(0.0, |d| self.weight * d))
    }
}

impl Dis2ObstScorer {
    pub fn new(weight: f64, range_m: f64) -> Self {
        Self {
            weight,
            range_m,
            obstacles_m: None,
        }
    }
}

impl Plugin for Dis2ObstScorer {
    fn name(&self) -> &'static str {
        "Dis2ObstScorer"
    }

    fn configure(&mut self, ctx: &PlanningContext) {
        self.obstacles_m = Some(ctx.obstacles_m.to_vec());
    }
}

impl Scorer for Dis2ObstScorer {
    fn score(&self, pose: &Waypoint) -> Result<f64, RegistryError> {
        let obstacles = self
            .obstacles_m
            .as_ref()
            .ok_or_else(|| RegistryError::NotConfigured(self.name()))?;

        let p = pose.position();
        let min_dist_m = obstacles
            .iter()
            .map(|o| (*o - p).norm())
            .fold(std::f64::INFINITY, f64::min);

        if min_dist_m >= self.range_m || self.range_m <= 0.0 {
            Ok(0.0)
        } else {
            Ok(self.weight * (1.0 - min_dist_m / self.range_m))
        }
    }
}
