//! # Navigation interface crate.
//!
//! Provides the types exchanged between the path follower core and the components around it:
//! the motion command sent to the robot controller, and the goal/feedback/result vocabulary of a
//! follow path task.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Motion commands issued to the robot controller
pub mod cmd;

/// Follow path task status, feedback and results
pub mod action;
