//! # OnLine behaviour
//!
//! Nominal path following. The robot drives at the nominal speed toward the steering target,
//! ticking off intermediate waypoints as it reaches or passes them. When the target is a turning
//! point and the robot comes within the switch distance of it, control passes to
//! [`Behaviour::ApproachTurningPoint`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use nav_if::action::{FeedbackStatus, ResultStatus};

use super::{Behaviour, Step};
use crate::follower::{FollowerContext, FollowerError};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn execute(ctx: &mut FollowerContext) -> Result<Step, FollowerError> {
    if ctx.sub_path_count() == 0 {
        warn!("No path to follow");
        ctx.stop_motion();
        return Ok(Step::Finished(ResultStatus::NoPath));
    }

    Behaviour::OnLine.select_next_waypoint(ctx)?;

    let params = ctx.options();
    let progress = ctx.progress();
    let target = ctx.next_waypoint()?;
    let dist_m = ctx.distance_to(&target)?;

    if ctx.is_turning_point(progress.wp_index)? && dist_m < params.turning_point_switch_dist_m {
        info!(
            "Approaching turning point {} of sub-path {} ({:.2} m away)",
            progress.wp_index, progress.sub_path_index, dist_m
        );
        return Ok(Step::Next(Behaviour::ApproachTurningPoint { done: false }));
    }

    let off_path_m = ctx.distance_to_segment()?;
    if off_path_m > params.max_distance_to_path_m && !Behaviour::OnLine.is_leaving_path_allowed() {
        warn!(
            "Robot is {:.2} m from the path, limit is {:.2} m",
            off_path_m, params.max_distance_to_path_m
        );
        ctx.stop_motion();
        return Ok(Step::Finished(ResultStatus::PathLost));
    }

    let target_rb = ctx.steering_target()?;
    let cmd = ctx.pursuit_cmd(&target_rb, params.nominal_speed_ms);

    ctx.set_feedback(FeedbackStatus::Moving, dist_m);
    ctx.send_command(cmd);

    if ctx.obstacle_timed_out() {
        warn!("Blocked by an obstacle for too long");
        ctx.stop_motion();
        return Ok(Step::Finished(ResultStatus::Obstacle));
    }

    Ok(Step::Next(Behaviour::OnLine))
}

/// Move the target past every intermediate waypoint the robot has reached or passed.
///
/// Turning points are never skipped, they are handled by the approach behaviour.
pub(super) fn select_next_waypoint(ctx: &mut FollowerContext) -> Result<(), FollowerError> {
    let tolerance_m = ctx.options().wp_tolerance_m;

    loop {
        let wp_index = ctx.progress().wp_index;
        if ctx.is_turning_point(wp_index)? {
            return Ok(());
        }

        let target = ctx.next_waypoint()?;
        if ctx.distance_to(&target)? >= tolerance_m && !ctx.has_passed_target()? {
            return Ok(());
        }

        debug!("Waypoint {} reached", wp_index);
        ctx.advance_waypoint();
    }
}
