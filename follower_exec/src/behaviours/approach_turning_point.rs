//! # ApproachTurningPoint behaviour
//!
//! The robot slows down as it closes on a turning point, steering straight for it. Once the
//! point is reached the robot stops and the behaviour is marked done. The following step decides
//! where to go next: the next waypoint, the next sub-path, or the end of the task.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use nav_if::action::{FeedbackStatus, ResultStatus};
use util::maths::{clamp, lin_map};

use super::{Behaviour, Step};
use crate::follower::{FollowerContext, FollowerError};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn execute(done: bool, ctx: &mut FollowerContext) -> Result<Step, FollowerError> {
    if done {
        return handle_done(ctx);
    }

    let params = ctx.options();
    let target = ctx.next_waypoint()?;
    let dist_m = ctx.distance_to(&target)?;

    ctx.set_feedback(FeedbackStatus::ApproachingTurningPoint, dist_m);

    if check_if_done(ctx, dist_m)? {
        info!(
            "Turning point {} reached, {:.2} m away",
            ctx.progress().wp_index,
            dist_m
        );
        ctx.stop_motion();
        return Ok(Step::Next(Behaviour::ApproachTurningPoint { done: true }));
    }

    let speed_ms = clamp(
        lin_map(
            (params.wp_tolerance_m, params.turning_point_switch_dist_m),
            (params.min_speed_ms, params.nominal_speed_ms),
            dist_m,
        ),
        params.min_speed_ms,
        params.nominal_speed_ms,
    );

    let target_rb = ctx.next_waypoint_local()?.position();
    let cmd = ctx.pursuit_cmd(&target_rb, speed_ms);
    ctx.send_command(cmd);

    if ctx.obstacle_timed_out() {
        warn!("Blocked by an obstacle for too long");
        ctx.stop_motion();
        return Ok(Step::Finished(ResultStatus::Obstacle));
    }

    Ok(Step::Next(Behaviour::ApproachTurningPoint { done: false }))
}

/// Returns true once the robot is at the turning point, or has passed close by it.
pub(super) fn check_if_done(ctx: &FollowerContext, dist_m: f64) -> Result<bool, FollowerError> {
    let params = ctx.options();
    let tolerance_m = if ctx.is_final_waypoint()? {
        params.goal_tolerance_m
    } else {
        params.wp_tolerance_m
    };

    Ok(dist_m < tolerance_m
        || (dist_m < params.turning_point_switch_dist_m && ctx.has_passed_target()?))
}

/// Move on from a reached turning point.
pub(super) fn handle_done(ctx: &mut FollowerContext) -> Result<Step, FollowerError> {
    let progress = ctx.progress();
    let sub_path_len = ctx.current_sub_path()?.len();

    if progress.wp_index + 1 < sub_path_len {
        ctx.advance_waypoint();
        Ok(Step::Next(Behaviour::OnLine))
    } else if progress.sub_path_index + 1 < ctx.sub_path_count() {
        ctx.advance_sub_path();
        info!("Starting sub-path {}", progress.sub_path_index + 1);
        Ok(Step::Next(Behaviour::OnLine))
    } else {
        ctx.stop_motion();
        info!("End of the path reached");
        Ok(Step::Finished(ResultStatus::Success))
    }
}
