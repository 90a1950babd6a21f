//! # Follow path task interface
//!
//! A follow path task is submitted as a goal, reports feedback while it is active and finishes
//! with a [`ResultStatus`]. The status produced by the behaviour state machine is the value
//! surfaced when the task is done.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt::Display;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Terminal status of a follow path task.
///
/// The numeric codes are part of the interface and must not be renumbered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResultStatus {
    /// The goal was reached.
    Success = 0,

    /// The task was cancelled by the client.
    Aborted = 1,

    /// The robot left the path further than allowed.
    PathLost = 2,

    /// The task was given no usable path.
    NoPath = 3,

    /// The path is blocked by an obstacle.
    Obstacle = 4,

    /// The controller hit an internal fault, for example an emergency break.
    InternalError = 5,
}

/// Status reported in feedback while a follow path task is active.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackStatus {
    /// Driving along the path.
    Moving,

    /// Slowing down to pass a turning point.
    ApproachingTurningPoint,

    /// The obstacle avoidance policy is holding the robot back.
    ObstacleBlocked,
}

/// Lifecycle of a goal as seen by the client.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalState {
    Active,
    Succeeded,
    Aborted,
    Preempted,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Feedback published once per behaviour cycle while a task is active.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowPathFeedback {
    pub status: FeedbackStatus,

    /// Distance from the robot to the current target waypoint.
    pub dist_to_target_m: f64,

    /// Index of the sub-path currently being followed.
    pub sub_path_index: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("{0} is not a valid follow path result code")]
pub struct InvalidResultCode(pub u8);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ResultStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == ResultStatus::Success
    }

    /// The goal state a client observes when a task finishes with this status.
    pub fn goal_state(self) -> GoalState {
        match self {
            ResultStatus::Success => GoalState::Succeeded,
            ResultStatus::Aborted => GoalState::Preempted,
            _ => GoalState::Aborted,
        }
    }
}

impl TryFrom<u8> for ResultStatus {
    type Error = InvalidResultCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ResultStatus::Success),
            1 => Ok(ResultStatus::Aborted),
            2 => Ok(ResultStatus::PathLost),
            3 => Ok(ResultStatus::NoPath),
            4 => Ok(ResultStatus::Obstacle),
            5 => Ok(ResultStatus::InternalError),
            c => Err(InvalidResultCode(c)),
        }
    }
}

impl Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Success => write!(f, "success"),
            ResultStatus::Aborted => write!(f, "aborted"),
            ResultStatus::PathLost => write!(f, "path lost"),
            ResultStatus::NoPath => write!(f, "no path"),
            ResultStatus::Obstacle => write!(f, "obstacle"),
            ResultStatus::InternalError => write!(f, "internal error"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_result_codes() {
        for code in 0..6u8 {
            let status = ResultStatus::try_from(code).unwrap();
            assert_eq!(status.code(), code);
        }

        assert!(ResultStatus::try_from(6).is_err());
        assert_eq!(ResultStatus::InternalError.code(), 5);
    }

    #[test]
    fn test_goal_state() {
        assert_eq!(ResultStatus::Success.goal_state(), GoalState::Succeeded);
        assert_eq!(ResultStatus::Aborted.goal_state(), GoalState::Preempted);
        assert_eq!(ResultStatus::PathLost.goal_state(), GoalState::Aborted);
    }

    #[test]
    fn test_feedback_serialises() {
        let fb = FollowPathFeedback {
            status: FeedbackStatus::Moving,
            dist_to_target_m: 1.5,
            sub_path_index: 0,
        };

        let json = serde_json::to_string(&fb).unwrap();
        assert!(json.contains("\"Moving\""));
    }
}
