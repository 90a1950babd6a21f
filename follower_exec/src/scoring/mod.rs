//! # Constraint and scorer plugins
//!
//! The local planner evaluates candidate poses against two kinds of plugin:
//!
//! - [`Constraint`]s - feasibility predicates, `is_satisfied(pose)`.
//! - [`Scorer`]s - cost functions, `score(pose)`.
//!
//! Plugins are held in a [`Registry`] alongside an activation vector which selects the entries
//! used in the current planning cycle. Inactive entries are never configured or evaluated, they
//! contribute a neutral value (pass for constraints, zero for scorers).
//!
//! Some plugins hold reference state, for example the sub-path they measure distance to. This
//! state is bound once per cycle through [`Plugin::configure`], before any evaluation. Evaluating
//! a stateful plugin which has not been configured is a wiring bug and is reported as
//! [`RegistryError::NotConfigured`].
//!
//! The position of each plugin in its registry is fixed by the convention in [`index`], which
//! the planner's cost function relies on.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod constraints;
mod params;
mod scorers;

pub use constraints::{Dis2ObstConstraint, Dis2PathConstraint};
pub use params::ScoringParams;
pub use scorers::{Dis2ObstScorer, Dis2PathScorer, Dis2StartScorer};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Point2;
use serde::Deserialize;

use crate::path::Waypoint;

// ------------------------------------------------------------------------------------------------
// INDEX CONVENTION
// ------------------------------------------------------------------------------------------------

/// Registry positions of the standard plugins.
///
/// These positions are part of the planner's contract and must not change.
pub mod index {
    /// Distance to the global sub-path must stay within limits.
    pub const DIS2PATH_CONSTRAINT: usize = 0;

    /// Distance to the previous local path. Gates the [`DIS2LAST_SCORER`] term.
    pub const DIS2LAST_CONSTRAINT: usize = 1;

    /// Clearance from obstacles.
    pub const DIS2OBST_CONSTRAINT: usize = 2;

    /// Progress along the global sub-path. Used for the goal distance and the early exit check.
    pub const DIS2START_SCORER: usize = 0;

    /// Distance to the global sub-path.
    pub const DIS2PATH_SCORER: usize = 1;

    /// Proximity to obstacles.
    pub const DIS2OBST_SCORER: usize = 2;

    /// Distance to the previous local path.
    pub const DIS2LAST_SCORER: usize = 3;

    pub const NUM_CONSTRAINTS: usize = 3;
    pub const NUM_SCORERS: usize = 4;
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Behaviour common to all constraint and scorer plugins.
pub trait Plugin {
    /// Human readable name of the plugin, used in errors and logs.
    fn name(&self) -> &'static str;

    /// Bind the plugin to the reference data of the current planning cycle.
    ///
    /// Stateless plugins keep the default, which does nothing.
    fn configure(&mut self, _ctx: &PlanningContext) {}
}

/// A feasibility predicate over a pose.
pub trait Constraint: Plugin {
    fn is_satisfied(&self, pose: &Waypoint) -> Result<bool, RegistryError>;

    /// Whether a pose failing this constraint must be discarded by the search.
    ///
    /// Constraints which are not required only gate parts of the cost.
    fn is_required(&self) -> bool {
        true
    }
}

/// A cost function over a pose.
pub trait Scorer: Plugin {
    fn score(&self, pose: &Waypoint) -> Result<f64, RegistryError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Reference data plugins may bind to at the start of a planning cycle.
///
/// Everything here is expressed in the local (odometry) frame.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    /// The global sub-path being tracked, transformed into the local frame.
    pub sub_path: &'a [Waypoint],

    /// The raw local path produced by the previous successful cycle. Empty before the first.
    pub last_local_path: &'a [Waypoint],

    /// Obstacle points.
    pub obstacles_m: &'a [Point2<f64>],
}

/// An ordered set of plugins with the flags selecting which are used this cycle.
pub struct Registry<P: ?Sized> {
    entries: Vec<Box<P>>,
    active: Vec<bool>,
}

pub type ConstraintRegistry = Registry<dyn Constraint>;
pub type ScorerRegistry = Registry<dyn Scorer>;

/// Which path a distance-to-path plugin measures against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub enum PathBinding {
    /// The global sub-path, re-expressed in the local frame.
    GlobalSubPath,

    /// The local path produced by the previous cycle.
    LastLocalPath,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Activation vector has {flags} entries but the registry holds {entries} plugins")]
    ActivationLengthMismatch { entries: usize, flags: usize },

    #[error("No plugin registered at index {0}")]
    MissingEntry(usize),

    #[error("Plugin {0} was evaluated before being configured")]
    NotConfigured(&'static str),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a> PlanningContext<'a> {
    /// Get the path selected by the binding.
    pub fn bound_path(&self, binding: PathBinding) -> &'a [Waypoint] {
        match binding {
            PathBinding::GlobalSubPath => self.sub_path,
            PathBinding::LastLocalPath => self.last_local_path,
        }
    }
}

impl<P: ?Sized + Plugin> Registry<P> {
    /// Build a registry with every entry active.
    pub fn new(entries: Vec<Box<P>>) -> Self {
        let active = vec![true; entries.len()];
        Self { entries, active }
    }

    /// Build a registry with the given activation vector.
    pub fn with_active(entries: Vec<Box<P>>, active: Vec<bool>) -> Result<Self, RegistryError> {
        let mut reg = Self::new(entries);
        reg.set_active(active)?;
        Ok(reg)
    }

    /// Replace the activation vector, which must have one flag per entry.
    pub fn set_active(&mut self, active: Vec<bool>) -> Result<(), RegistryError> {
        if active.len() != self.entries.len() {
            return Err(RegistryError::ActivationLengthMismatch {
                entries: self.entries.len(),
                flags: active.len(),
            });
        }

        self.active = active;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if there is an entry at `index` and it is active.
    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    pub fn active_flags(&self) -> &[bool] {
        &self.active
    }

    /// Configure every active entry for a new cycle. Inactive entries are left untouched.
    pub fn configure(&mut self, ctx: &PlanningContext) {
        for (entry, _) in self
            .entries
            .iter_mut()
            .zip(self.active.iter())
            .filter(|(_, active)| **active)
        {
            entry.configure(ctx);
        }
    }

    /// Get the active entry at `index`, `None` if the entry is inactive.
    fn active_entry(&self, index: usize) -> Result<Option<&P>, RegistryError> {
        let entry = self
            .entries
            .get(index)
            .ok_or(RegistryError::MissingEntry(index))?;

        if self.active[index] {
            Ok(Some(&**entry))
        } else {
            Ok(None)
        }
    }
}

impl Registry<dyn Constraint> {
    /// Evaluate the constraint at `index`. Inactive constraints pass.
    pub fn check(&self, index: usize, pose: &Waypoint) -> Result<bool, RegistryError> {
        match self.active_entry(index)? {
            Some(c) => c.is_satisfied(pose),
            None => Ok(true),
        }
    }

    /// Returns true if the pose passes every active, required constraint.
    pub fn required_satisfied(&self, pose: &Waypoint) -> Result<bool, RegistryError> {
        for (c, _) in self
            .entries
            .iter()
            .zip(self.active.iter())
            .filter(|(c, active)| **active && c.is_required())
        {
            if !c.is_satisfied(pose)? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl Registry<dyn Scorer> {
    /// Evaluate the scorer at `index`. Inactive scorers score zero.
    pub fn score(&self, index: usize, pose: &Waypoint) -> Result<f64, RegistryError> {
        match self.active_entry(index)? {
            Some(s) => s.score(pose),
            None => Ok(0.0),
        }
    }
}

impl ScoringParams {
    /// Build the standard constraint registry, laid out according to [`index`].
    pub fn build_constraints(&self) -> Result<ConstraintRegistry, RegistryError> {
        let entries: Vec<Box<dyn Constraint>> = vec![
            Box::new(Dis2PathConstraint::new(
                PathBinding::GlobalSubPath,
                self.max_dist_to_path_m,
            )),
            Box::new(Dis2PathConstraint::new(
                PathBinding::LastLocalPath,
                self.max_dist_to_last_path_m,
            )),
            Box::new(Dis2ObstConstraint::new(self.min_obstacle_clearance_m)),
        ];

        Registry::with_active(entries, self.constraints_active.clone())
    }

    /// Build the standard scorer registry, laid out according to [`index`].
    pub fn build_scorers(&self) -> Result<ScorerRegistry, RegistryError> {
        let entries: Vec<Box<dyn Scorer>> = vec![
            Box::new(Dis2StartScorer::new()),
            Box::new(Dis2PathScorer::new(
                PathBinding::GlobalSubPath,
                self.path_weight,
            )),
            Box::new(Dis2ObstScorer::new(
                self.obstacle_weight,
                self.obstacle_range_m,
            )),
            Box::new(Dis2PathScorer::new(
                PathBinding::LastLocalPath,
                self.last_path_weight,
            )),
        ];

        Registry::with_active(entries, self.scorers_active.clone())
    }
}
