//! # EmergencyBreak behaviour

use log::warn;
use nav_if::action::ResultStatus;

use super::Step;
use crate::follower::FollowerContext;

/// Halt the robot and end the task with an internal error.
pub(super) fn execute(ctx: &mut FollowerContext) -> Step {
    warn!("Emergency break engaged, stopping the robot");
    ctx.stop_motion();

    Step::Finished(ResultStatus::InternalError)
}
