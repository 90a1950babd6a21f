//! # Path follower library.
//!
//! This library allows the executable, the benchmarks and other crates in the workspace to access
//! the path following core.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Behaviour state machine - the discrete control modes of the follower
pub mod behaviours;

/// Path follower - runs follow path tasks, sequencing planning and behaviours
pub mod follower;

/// Local planner - derives short feasible paths from the global path
pub mod local_planner;

/// Obstacle avoidance - last line filtering of motion commands against nearby obstacles
pub mod obstacle_avoidance;

/// Path primitives - waypoints, sub-paths and geometric queries over them
pub mod path;

/// Interfaces to the robot's controller and pose estimate
pub mod robot;

/// Constraint and scorer plugins used by the local planner
pub mod scoring;

/// Simulated robot and clock used by the executable, benchmarks and tests
pub mod sim;

/// Frame transforms and time
pub mod tf;
