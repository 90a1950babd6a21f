//! # Path follower
//!
//! The [`PathFollower`] drives one follow path task at a time. Each cycle it:
//!
//! 1. Asks the local planner for a new local path, which the planner installs in the robot
//!    controller itself.
//! 2. Executes one step of the current [`Behaviour`], which issues a motion command and returns
//!    the behaviour to run next, or the task's result.
//!
//! The state of a task (the global path, the local path, progress along the global path and the
//! latest feedback) lives in a [`NavTask`], created when a goal is accepted and dropped when the
//! task finishes, is cancelled, or fails. Behaviours see the task together with the robot
//! collaborators through a [`FollowerContext`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;

pub use params::{FollowerParams, PlannerKind};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use log::{debug, error, info, warn};
use nalgebra::Point2;
use nav_if::{
    action::{FeedbackStatus, FollowPathFeedback, GoalState, ResultStatus},
    cmd::MoveCmd,
};

use crate::{
    behaviours::{Behaviour, Step},
    local_planner::{
        LocalPlanner, LocalPlannerBfs, LocalPlannerError, LocalPlannerNull, LocalPlannerParams,
        PlannerIo, PlannerReport,
    },
    obstacle_avoidance::{AvoidState, ObstacleAvoider, ObstacleCloud},
    path::{
        cumulative_distances, distance_to_path, point_at_arc_length, project_onto,
        segment_heading, sub_path_length, Path, PathError, SubPath, Waypoint,
    },
    robot::{PoseProvider, RobotController},
    scoring::{ConstraintRegistry, RegistryError, ScorerRegistry},
    tf::{TimeSource, TransformError, TransformLookup},
};
use util::{
    maths::{clamp, get_ang_dist},
    time::seconds_to_std,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The external collaborators of the follower.
pub struct RobotIo {
    pub controller: Box<dyn RobotController>,
    pub pose: Box<dyn PoseProvider>,
    pub tf: Box<dyn TransformLookup>,
    pub clock: Box<dyn TimeSource>,
    pub avoider: Box<dyn ObstacleAvoider>,

    /// Latest obstacle points in the robot frame
    pub obstacles_rb: ObstacleCloud,
}

/// Position of the current target along the global path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub sub_path_index: usize,

    /// Index of the target waypoint within the sub-path
    pub wp_index: usize,
}

/// State of one follow path task.
#[derive(Debug)]
pub struct NavTask {
    pub global_path: Arc<Path>,

    /// Latest path produced by the local planner, `None` until the first plan for the current
    /// sub-path has been made.
    pub local_path: Option<Arc<Path>>,

    pub progress: Progress,
    pub behaviour: Behaviour,
    pub feedback: FollowPathFeedback,

    /// Last command sent to the controller
    pub last_cmd: MoveCmd,

    /// Time at which the obstacle avoider started holding the robot back
    pub blocked_since_s: Option<f64>,
}

/// Everything a behaviour can see and act on during one step.
pub struct FollowerContext<'a> {
    pub params: &'a FollowerParams,
    pub io: &'a mut RobotIo,
    pub task: &'a mut NavTask,
}

/// Runs follow path tasks.
pub struct PathFollower {
    params: FollowerParams,
    planner: Box<dyn LocalPlanner>,
    constraints: ConstraintRegistry,
    scorers: ScorerRegistry,
    io: RobotIo,
    task: Option<NavTask>,
    goal_state: Option<GoalState>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FollowerError {
    #[error("Invalid path: {0}")]
    PathError(#[from] PathError),

    #[error("Waypoint {wp_index} is past the end of sub-path {sub_path_index}")]
    WaypointOutOfRange {
        sub_path_index: usize,
        wp_index: usize,
    },

    #[error("Frame transform failed: {0}")]
    TransformError(#[from] TransformError),

    #[error("Local planner error: {0}")]
    LocalPlannerError(#[from] LocalPlannerError),

    #[error("Could not build the plugin registries: {0}")]
    RegistryError(#[from] RegistryError),

    #[error("The follower uses local frame {follower} but the planner uses {planner}")]
    FrameMismatch { follower: String, planner: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavTask {
    pub fn new(global_path: Arc<Path>) -> Self {
        Self {
            global_path,
            local_path: None,
            progress: Progress::default(),
            behaviour: Behaviour::OnLine,
            feedback: FollowPathFeedback {
                status: FeedbackStatus::Moving,
                dist_to_target_m: 0.0,
                sub_path_index: 0,
            },
            last_cmd: MoveCmd::stop(),
            blocked_since_s: None,
        }
    }
}

impl<'a> FollowerContext<'a> {
    pub fn options(&self) -> &'a FollowerParams {
        self.params
    }

    pub fn progress(&self) -> Progress {
        self.task.progress
    }

    pub fn sub_path_count(&self) -> usize {
        self.task.global_path.sub_path_count()
    }

    /// The sub-path of the global path currently being followed.
    pub fn current_sub_path(&self) -> Result<&SubPath, FollowerError> {
        Ok(self
            .task
            .global_path
            .sub_path(self.task.progress.sub_path_index)?)
    }

    /// The target waypoint, in the frame of the global path.
    pub fn next_waypoint(&self) -> Result<Waypoint, FollowerError> {
        let progress = self.task.progress;
        self.current_sub_path()?
            .get(progress.wp_index)
            .copied()
            .ok_or(FollowerError::WaypointOutOfRange {
                sub_path_index: progress.sub_path_index,
                wp_index: progress.wp_index,
            })
    }

    /// The target waypoint, in the robot frame.
    pub fn next_waypoint_local(&self) -> Result<Waypoint, FollowerError> {
        let pose = self.robot_pose()?;
        Ok(self
            .next_waypoint()?
            .transformed(&pose.as_isometry().inverse()))
    }

    /// The robot pose expressed in the given frame.
    pub fn robot_pose_in(&self, frame_id: &str) -> Result<Waypoint, FollowerError> {
        let pose = self.io.pose.current_pose();

        if frame_id == self.params.local_frame {
            return Ok(pose);
        }

        let local_to_frame = self.io.tf.lookup(
            frame_id,
            &self.params.local_frame,
            self.io.clock.now(),
            seconds_to_std(self.params.transform_timeout_s),
        )?;

        Ok(pose.transformed(&local_to_frame))
    }

    /// The robot pose expressed in the frame of the global path.
    pub fn robot_pose(&self) -> Result<Waypoint, FollowerError> {
        self.robot_pose_in(self.task.global_path.frame_id())
    }

    /// Distance from the robot to a waypoint of the global path.
    pub fn distance_to(&self, wp: &Waypoint) -> Result<f64, FollowerError> {
        Ok(self.robot_pose()?.distance_to(wp))
    }

    /// Returns true if the robot needs to change heading at the waypoint.
    ///
    /// The last waypoint of every sub-path is a turning point.
    pub fn is_turning_point(&self, wp_index: usize) -> Result<bool, FollowerError> {
        let sub_path = self.current_sub_path()?;

        if wp_index + 1 >= sub_path.len() {
            return Ok(true);
        }
        if wp_index == 0 {
            return Ok(false);
        }

        let heading_in = segment_heading(&sub_path[wp_index - 1], &sub_path[wp_index]);
        let heading_out = segment_heading(&sub_path[wp_index], &sub_path[wp_index + 1]);

        Ok(get_ang_dist(heading_in, heading_out).abs() > self.params.turning_angle_threshold_rad)
    }

    /// Returns true if the target is the last waypoint of the last sub-path.
    pub fn is_final_waypoint(&self) -> Result<bool, FollowerError> {
        let progress = self.task.progress;
        Ok(progress.sub_path_index + 1 >= self.sub_path_count()
            && progress.wp_index + 1 >= self.current_sub_path()?.len())
    }

    /// Returns true if the robot is beyond the target along the segment leading to it.
    pub fn has_passed_target(&self) -> Result<bool, FollowerError> {
        let wp_index = self.task.progress.wp_index;
        if wp_index == 0 {
            return Ok(false);
        }

        let sub_path = self.current_sub_path()?;
        let target = self.next_waypoint()?;
        let seg = target.position() - sub_path[wp_index - 1].position();
        let rel = self.robot_pose()?.position() - target.position();

        Ok(rel.dot(&seg) > 0.0)
    }

    /// Distance from the robot to the segment leading to the target.
    pub fn distance_to_segment(&self) -> Result<f64, FollowerError> {
        self.next_waypoint()?;

        let wp_index = self.task.progress.wp_index;
        let sub_path = self.current_sub_path()?;
        let position = self.robot_pose()?.position();

        let segment = match wp_index {
            0 => &sub_path[0..1],
            i => &sub_path[(i - 1)..=i],
        };

        Ok(distance_to_path(segment, &position).unwrap_or(0.0))
    }

    /// The point the robot should steer toward, in the robot frame.
    ///
    /// This is a point a fixed distance ahead along the local path, or the target waypoint if
    /// there is no local path or the robot is near its end.
    pub fn steering_target(&self) -> Result<Point2<f64>, FollowerError> {
        if let Some(local) = self.task.local_path.as_ref() {
            let pose = self.robot_pose_in(local.frame_id())?;
            let wps = local.sub_path(0)?;
            let cum_dists = cumulative_distances(wps);

            if let Some(proj) = project_onto(wps, &cum_dists, &pose.position()) {
                let ahead_m = proj.arc_length_m + self.params.lookahead_m;

                if ahead_m < sub_path_length(wps) {
                    if let Some(p) = point_at_arc_length(wps, &cum_dists, ahead_m) {
                        return Ok(pose.as_isometry().inverse() * p);
                    }
                }
            }
        }

        Ok(self.next_waypoint_local()?.position())
    }

    /// A command driving the robot along the arc through the target at the given speed.
    pub fn pursuit_cmd(&self, target_rb: &Point2<f64>, speed_ms: f64) -> MoveCmd {
        let dist_sq = target_rb.coords.norm_squared();
        if dist_sq < std::f64::EPSILON {
            return MoveCmd::stop();
        }

        let curv_m = clamp(
            self.params.steering_gain * 2.0 * target_rb.y / dist_sq,
            -self.params.max_curv_m,
            self.params.max_curv_m,
        );

        MoveCmd::new(speed_ms, curv_m)
    }

    pub fn set_feedback(&mut self, status: FeedbackStatus, dist_to_target_m: f64) {
        self.task.feedback = FollowPathFeedback {
            status,
            dist_to_target_m,
            sub_path_index: self.task.progress.sub_path_index,
        };
    }

    /// Pass the command through the obstacle avoider and send it to the controller.
    ///
    /// Returns true if the avoider changed the command.
    pub fn send_command(&mut self, cmd: MoveCmd) -> bool {
        let mut cmd = cmd;
        let state = AvoidState {
            path: self
                .task
                .local_path
                .as_deref()
                .or(Some(self.task.global_path.as_ref())),
            params: &self.params.avoider,
        };

        let changed = self
            .io
            .avoider
            .avoid(&mut cmd, &self.io.obstacles_rb, &state);

        if changed {
            self.task.feedback.status = FeedbackStatus::ObstacleBlocked;
            if self.task.blocked_since_s.is_none() {
                self.task.blocked_since_s = Some(self.io.clock.now());
            }
        } else {
            self.task.blocked_since_s = None;
        }

        self.task.last_cmd = cmd;
        self.io.controller.set_command(cmd);

        changed
    }

    /// Returns true if the avoider has held the robot back for longer than allowed.
    pub fn obstacle_timed_out(&self) -> bool {
        match self.task.blocked_since_s {
            Some(t) => self.io.clock.now() - t > self.params.obstacle_timeout_s,
            None => false,
        }
    }

    pub fn stop_motion(&mut self) {
        self.task.last_cmd = MoveCmd::stop();
        self.io.controller.stop_motion();
    }

    pub fn advance_waypoint(&mut self) {
        self.task.progress.wp_index += 1;
    }

    pub fn advance_sub_path(&mut self) {
        self.task.progress.sub_path_index += 1;
        self.task.progress.wp_index = 0;
    }
}

impl PathFollower {
    /// Create a new follower with no active task.
    pub fn new(
        params: FollowerParams,
        planner_params: LocalPlannerParams,
        io: RobotIo,
    ) -> Result<Self, FollowerError> {
        let constraints = planner_params.scoring.build_constraints()?;
        let scorers = planner_params.scoring.build_scorers()?;

        let planner: Box<dyn LocalPlanner> = match params.planner {
            PlannerKind::Bfs => {
                if planner_params.local_frame != params.local_frame {
                    return Err(FollowerError::FrameMismatch {
                        follower: params.local_frame.clone(),
                        planner: planner_params.local_frame,
                    });
                }
                Box::new(LocalPlannerBfs::new(planner_params))
            }
            PlannerKind::Null => Box::new(LocalPlannerNull::new()),
        };

        info!("PathFollower created with {:?} local planner", params.planner);

        Ok(Self {
            params,
            planner,
            constraints,
            scorers,
            io,
            task: None,
            goal_state: None,
        })
    }

    /// Start following a new path, preempting any active task.
    ///
    /// A path without any sub-paths is accepted, and finishes with [`ResultStatus::NoPath`] on
    /// the next cycle. A path containing an empty sub-path is rejected.
    pub fn accept_goal(&mut self, path: Path) -> Result<(), FollowerError> {
        for i in 0..path.sub_path_count() {
            path.sub_path(i)?;
        }

        if self.task.take().is_some() {
            warn!("New goal received, preempting the active task");
            self.io.controller.stop_motion();
        }

        let path = Arc::new(path);

        if !path.is_empty() {
            self.planner
                .set_global_path(Arc::clone(&path), &mut *self.io.controller);
        }

        info!(
            "Following new path in {} with {} sub-paths, {:.2} m long",
            path.frame_id(),
            path.sub_path_count(),
            path.get_length()
        );

        self.task = Some(NavTask::new(path));
        self.goal_state = Some(GoalState::Active);

        Ok(())
    }

    /// Cancel the active task, returning its result if there was one.
    pub fn cancel(&mut self) -> Option<ResultStatus> {
        self.task.take()?;

        info!("Follow path task cancelled");
        self.io.controller.stop_motion();
        self.goal_state = Some(ResultStatus::Aborted.goal_state());

        Some(ResultStatus::Aborted)
    }

    /// Set the obstacles seen this cycle, in the robot frame.
    pub fn set_obstacles(&mut self, obstacles_rb: ObstacleCloud) {
        self.io.obstacles_rb = obstacles_rb;
    }

    /// Replace the planner parameters, rebuilding the plugin registries.
    pub fn set_planner_params(&mut self, params: LocalPlannerParams) -> Result<(), FollowerError> {
        self.constraints = params.scoring.build_constraints()?;
        self.scorers = params.scoring.build_scorers()?;
        self.planner.set_params(params);

        Ok(())
    }

    /// Run the local planner for the active task.
    pub fn replan(&mut self) -> Result<Option<Arc<Path>>, FollowerError> {
        let task = match self.task.as_mut() {
            Some(t) => t,
            None => return Ok(None),
        };

        if task.global_path.is_empty() {
            return Ok(None);
        }

        let mut io = PlannerIo {
            tf: &*self.io.tf,
            clock: &*self.io.clock,
            pose: &*self.io.pose,
            controller: &mut *self.io.controller,
            obstacles_rb: &self.io.obstacles_rb,
        };

        let local_path =
            self.planner
                .update_local_path(&mut io, &mut self.constraints, &mut self.scorers)?;

        if let Some(p) = local_path.as_ref() {
            task.local_path = Some(Arc::clone(p));
        }

        Ok(local_path)
    }

    /// Execute one step of the current behaviour, returning the task's result if it finished.
    pub fn execute_behaviour(&mut self) -> Option<ResultStatus> {
        let task = self.task.as_mut()?;
        let behaviour = task.behaviour;
        let prev_sub_path_index = task.progress.sub_path_index;

        let step = {
            let mut ctx = FollowerContext {
                params: &self.params,
                io: &mut self.io,
                task: &mut *task,
            };
            behaviour.execute(&mut ctx)
        };

        self.planner.set_velocity(task.last_cmd.speed_ms);

        match step {
            Step::Next(next) => {
                if next != behaviour {
                    info!("Behaviour changed from {} to {}", behaviour, next);
                }
                task.behaviour = next;

                // Plan against the new sub-path from now on
                if task.progress.sub_path_index != prev_sub_path_index {
                    debug!(
                        "Moving on to sub-path {}",
                        task.progress.sub_path_index
                    );
                    task.local_path = None;
                    let remaining = task
                        .global_path
                        .remaining_from(task.progress.sub_path_index);
                    self.planner
                        .set_global_path(Arc::new(remaining), &mut *self.io.controller);
                }

                None
            }
            Step::Finished(status) => {
                if status.is_success() {
                    info!("Follow path task finished: {}", status);
                } else {
                    warn!("Follow path task failed: {}", status);
                }

                self.task = None;
                self.goal_state = Some(status.goal_state());

                Some(status)
            }
        }
    }

    /// Run one full cycle, planning then executing the current behaviour.
    ///
    /// A planner error leaves the controller without a valid path, so the task is ended through
    /// an emergency break.
    pub fn step(&mut self) -> Option<ResultStatus> {
        if let Err(e) = self.replan() {
            error!("Local planning failed: {}", e);
            if let Some(task) = self.task.as_mut() {
                task.behaviour = Behaviour::EmergencyBreak;
            }
        }

        self.execute_behaviour()
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn goal_state(&self) -> Option<GoalState> {
        self.goal_state
    }

    pub fn feedback(&self) -> Option<FollowPathFeedback> {
        self.task.as_ref().map(|t| t.feedback)
    }

    pub fn behaviour(&self) -> Option<Behaviour> {
        self.task.as_ref().map(|t| t.behaviour)
    }

    pub fn progress(&self) -> Option<Progress> {
        self.task.as_ref().map(|t| t.progress)
    }

    pub fn local_path(&self) -> Option<&Arc<Path>> {
        self.task.as_ref().and_then(|t| t.local_path.as_ref())
    }

    pub fn planner_report(&self) -> Option<&PlannerReport> {
        self.planner.last_report()
    }

    pub fn is_null_planner(&self) -> bool {
        self.planner.is_null()
    }
}
