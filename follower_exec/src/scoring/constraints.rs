//! # Constraint plugins

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Point2;

use super::{Constraint, PathBinding, PlanningContext, Plugin, RegistryError};
use crate::path::{distance_to_path, Waypoint};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Limits how far a pose may stray from a path.
///
/// While the bound path is empty (no previous local path yet) every pose is accepted.
#[derive(Debug, Clone)]
pub struct Dis2PathConstraint {
    binding: PathBinding,
    max_dist_m: f64,
    path: Option<Vec<Waypoint>>,
}

/// Requires a minimum clearance from every obstacle point.
#[derive(Debug, Clone)]
pub struct Dis2ObstConstraint {
    min_clearance_m: f64,
    obstacles_m: Option<Vec<Point2<f64>>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Dis2PathConstraint {
    pub fn new(binding: PathBinding, max_dist_m: f64) -> Self {
        Self {
            binding,
            max_dist_m,
            path: None,
        }
    }
}

impl Plugin for Dis2PathConstraint {
    fn name(&self) -> &'static str {
        match self.binding {
            PathBinding::GlobalSubPath => "Dis2PathConstraint",
            PathBinding::LastLocalPath => "Dis2LastPathConstraint",
        }
    }

    fn configure(&mut self, ctx: &PlanningContext) {
        self.path = Some(ctx.bound_path(self.binding).to_vec());
    }
}

impl Constraint for Dis2PathConstraint {
    fn is_satisfied(&self, pose: &Waypoint) -> Result<bool, RegistryError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| RegistryError::NotConfigured(self.name()))?;

        Ok(distance_to_path(path, &pose.position()).map_or(true, |d| d <= self.max_dist_m))
    }

    /// Staying near the previous local path is a preference, not a requirement.
    fn is_required(&self) -> bool {
        self.binding == PathBinding::GlobalSubPath
    }
}

impl Dis2ObstConstraint {
    pub fn new(min_clearance_m: f64) -> Self {
        Self {
            min_clearance_m,
            obstacles_m: None,
        }
    }
}

impl Plugin for Dis2ObstConstraint {
    fn name(&self) -> &'static str {
        "Dis2ObstConstraint"
    }

    fn configure(&mut self, ctx: &PlanningContext) {
        self.obstacles_m = Some(ctx.obstacles_m.to_vec());
    }
}

impl Constraint for Dis2ObstConstraint {
    fn is_satisfied(&self, pose: &Waypoint) -> Result<bool, RegistryError> {
        let obstacles = self
            .obstacles_m
            .as_ref()
            .ok_or_else(|| RegistryError::NotConfigured(self.name()))?;

        let p = pose.position();
        let min_sq = self.min_clearance_m * self.min_clearance_m;

        Ok(obstacles.iter().all(|o| (*o - p).norm_squared() >= min_sq))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dis2path_empty_binding_passes() {
        let mut c = Dis2PathConstraint::new(PathBinding::LastLocalPath, 0.1);
        let sub_path = vec![Waypoint::new(0.0, 0.0, 0.0), Waypoint::new(1.0, 0.0, 0.0)];

        c.configure(&PlanningContext {
            sub_path: &sub_path,
            last_local_path: &[],
            obstacles_m: &[],
        });

        assert!(c.is_satisfied(&Waypoint::new(10.0, 10.0, 0.0)).unwrap());
        assert!(!c.is_required());
    }

    #[test]
    fn test_dis2obst_reconfigure() {
        let mut c = Dis2ObstConstraint::new(0.5);
        let pose = Waypoint::new(0.0, 0.0, 0.0);
        let near = vec![Point2::new(0.2, 0.2)];

        c.configure(&PlanningContext {
            sub_path: &[],
            last_local_path: &[],
            obstacles_m: &near,
        });
        assert!(!c.is_satisfied(&pose).unwrap());

        // The next cycle's obstacles replace the old ones
        c.configure(&PlanningContext {
            sub_path: &[],
            last_local_path: &[],
            obstacles_m: &[],
        });
        assert!(c.is_satisfied(&pose).unwrap());
    }
}
