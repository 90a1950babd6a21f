//! # Null local planner

use std::sync::Arc;

use log::debug;

use super::{LocalPlanner, LocalPlannerError, LocalPlannerParams, PlannerIo};
use crate::{
    path::Path,
    robot::RobotController,
    scoring::{ConstraintRegistry, ScorerRegistry},
};

/// Planner which treats the global path as the local path.
#[derive(Debug, Default)]
pub struct LocalPlannerNull {
    global_path: Option<Arc<Path>>,
}

impl LocalPlannerNull {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_path(&self) -> Option<&Arc<Path>> {
        self.global_path.as_ref()
    }
}

impl LocalPlanner for LocalPlannerNull {
    fn set_global_path(&mut self, path: Arc<Path>, controller: &mut dyn RobotController) {
        debug!("Forwarding global path directly to the controller");
        controller.set_path(Arc::clone(&path));
        self.global_path = Some(path);
    }

    fn update_local_path(
        &mut self,
        _io: &mut PlannerIo,
        _constraints: &mut ConstraintRegistry,
        _scorers: &mut ScorerRegistry,
    ) -> Result<Option<Arc<Path>>, LocalPlannerError> {
        Ok(None)
    }

    fn set_params(&mut self, _params: LocalPlannerParams) {}

    fn set_velocity(&mut self, _velocity_ms: f64) {}

    fn is_null(&self) -> bool {
        true
    }
}
