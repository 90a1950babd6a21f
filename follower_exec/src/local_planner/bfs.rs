//! # Breadth-first search local planner
//!
//! Each update grows a search tree from the robot's current pose. Every node has a fixed number
//! of successors, reached by stepping a fixed distance at a spread of headings either side of the
//! node's own heading. Successors failing a required constraint are discarded, the rest are
//! costed with the active scorers and queued.
//!
//! The tree lives in an arena allocated once per update, with parents referenced by index. The
//! search stops when a node close enough to the end of the sub-path is dequeued, when the
//! frontier is empty, or when the depth limit is passed. Once the arena is full no more nodes are
//! expanded, but the remaining frontier is still checked for the goal.
//!
//! The cheapest node seen is kept throughout, so even if the goal is never reached the path to
//! the best candidate is returned.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::VecDeque, sync::Arc, time::Instant};

use log::{debug, info, trace, warn};
use nalgebra::Point2;
use serde::Serialize;

use super::{
    postproc::{interpolate_path, smooth_path},
    LocalPlanner, LocalPlannerError, LocalPlannerParams, PlannerIo,
};
use crate::{
    path::{Path, PathError, SubPath, Waypoint},
    robot::RobotController,
    scoring::{index, ConstraintRegistry, PlanningContext, RegistryError, ScorerRegistry},
};
use util::{maths::wrap_pi, time::seconds_to_std};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The search based local planner.
pub struct LocalPlannerBfs {
    params: LocalPlannerParams,

    global_path: Option<Arc<Path>>,

    /// Raw (unsmoothed) output of the last successful search, in the local frame.
    last_local_path: SubPath,

    /// Time of the last committed plan, `None` if a plan is due immediately.
    last_update_s: Option<f64>,

    /// Magnitude of the robot's velocity.
    velocity_ms: f64,

    last_report: Option<PlannerReport>,
}

/// Statistics of one successful planning cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PlannerReport {
    /// Time at which the plan was made
    pub time_s: f64,

    /// Number of nodes allocated in the arena
    pub num_nodes: usize,

    /// True if the search reached the end of the sub-path
    pub reached_goal: bool,

    /// Cost of the node the path leads to
    pub best_cost: f64,

    /// Number of waypoints in the raw search output
    pub num_raw_waypoints: usize,

    pub search_duration_s: f64,
    pub postproc_duration_s: f64,
}

/// A node of the search tree.
#[derive(Debug, Clone, Copy)]
struct LNode {
    pose: Waypoint,

    /// Index of the parent node in the arena, `None` for the root
    parent: Option<usize>,

    level: usize,
}

/// Result of a single search.
struct SearchResult {
    /// Index of the node the path should lead to
    best: Option<usize>,
    best_cost: f64,
    reached_goal: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LocalPlannerBfs {
    pub fn new(params: LocalPlannerParams) -> Self {
        Self {
            params,
            global_path: None,
            last_local_path: Vec::new(),
            last_update_s: None,
            velocity_ms: 0.0,
            last_report: None,
        }
    }

    pub fn params(&self) -> &LocalPlannerParams {
        &self.params
    }

    /// Time of the last committed plan.
    pub fn last_update_s(&self) -> Option<f64> {
        self.last_update_s
    }

    /// The raw search output the current local path was made from.
    pub fn last_local_path(&self) -> &[Waypoint] {
        &self.last_local_path
    }

    /// Number of nodes the arena holds, always room for at least the root.
    fn capacity(&self) -> usize {
        self.params.max_num_nodes.max(1)
    }

    /// Distance between a node and its successors.
    fn step_length_m(&self) -> f64 {
        self.params
            .step_length_m
            .max(self.velocity_ms * self.params.step_time_s)
    }

    /// Grow the search tree from the root node toward `goal`.
    ///
    /// `dis2last` is the progress score of the goal, used to turn each node's progress score into
    /// the distance still to go.
    fn search(
        &self,
        nodes: &mut Vec<LNode>,
        goal: &Waypoint,
        dis2last: f64,
        constraints: &ConstraintRegistry,
        scorers: &ScorerRegistry,
    ) -> Result<SearchResult, RegistryError> {
        let capacity = self.capacity();
        let mut fifo = VecDeque::new();
        fifo.push_back(0);

        let mut result = SearchResult {
            best: None,
            best_cost: std::f64::INFINITY,
            reached_goal: false,
        };

        while let Some(&current) = fifo.front() {
            if nodes[current].level > self.params.max_depth {
                break;
            }
            fifo.pop_front();

            if nodes[current].pose.distance_to(goal) < self.params.goal_tolerance_m {
                result.best = Some(current);
                result.reached_goal = true;
                break;
            }

            if nodes.len() >= capacity {
                continue;
            }

            for succ in self.expand(nodes, current, constraints)? {
                let cost = node_cost(&nodes[succ].pose, dis2last, constraints, scorers)?;

                if cost < result.best_cost {
                    result.best_cost = cost;
                    result.best = Some(succ);
                }

                fifo.push_back(succ);
            }
        }

        // Report the cost of the goal node rather than the cheapest seen before it
        if result.reached_goal {
            if let Some(best) = result.best {
                result.best_cost = node_cost(&nodes[best].pose, dis2last, constraints, scorers)?;
            }
        }

        Ok(result)
    }

    /// Generate the feasible successors of `parent`, returning their indices in the arena.
    fn expand(
        &self,
        nodes: &mut Vec<LNode>,
        parent: usize,
        constraints: &ConstraintRegistry,
    ) -> Result<Vec<usize>, RegistryError> {
        let capacity = self.capacity();
        let from = nodes[parent];
        let step_m = self.step_length_m();
        let centre = (self.params.num_steer_angles as f64 - 1.0) / 2.0;
        let mut successors = Vec::with_capacity(self.params.num_steer_angles);

        for k in 0..self.params.num_steer_angles {
            if nodes.len() >= capacity {
                break;
            }

            let heading = wrap_pi(
                from.pose.orientation + (k as f64 - centre) * self.params.steer_angle_step_rad,
            );
            let pose = Waypoint::new(
                from.pose.x + step_m * heading.cos(),
                from.pose.y + step_m * heading.sin(),
                heading,
            );

            if !constraints.required_satisfied(&pose)? {
                continue;
            }

            nodes.push(LNode {
                pose,
                parent: Some(parent),
                level: from.level + 1,
            });
            successors.push(nodes.len() - 1);
        }

        Ok(successors)
    }
}

impl LocalPlanner for LocalPlannerBfs {
    fn set_global_path(&mut self, path: Arc<Path>, _controller: &mut dyn RobotController) {
        debug!(
            "New global path in {} with {} sub-paths",
            path.frame_id(),
            path.sub_path_count()
        );

        self.global_path = Some(path);
        self.last_local_path.clear();

        // Plan against the new path straight away
        self.last_update_s = None;
    }

    fn update_local_path(
        &mut self,
        io: &mut PlannerIo,
        constraints: &mut ConstraintRegistry,
        scorers: &mut ScorerRegistry,
    ) -> Result<Option<Arc<Path>>, LocalPlannerError> {
        let now_s = io.clock.now();

        // ---- RATE LIMIT ----

        if let Some(last_s) = self.last_update_s {
            if now_s - last_s < self.params.update_interval_s {
                trace!("Local plan not due yet");
                return Ok(None);
            }
        }

        let global_path = self
            .global_path
            .as_ref()
            .ok_or(LocalPlannerError::NoGlobalPath)?;

        // Only the first sub-path is planned against
        let sub_path = global_path.sub_path(0)?;

        // ---- FRAME CORRECTION ----

        let global_to_local = match io.tf.lookup(
            global_path.frame_id(),
            &self.params.local_frame,
            now_s,
            seconds_to_std(self.params.transform_timeout_s),
        ) {
            Ok(t) => t.inverse(),
            Err(e) => {
                warn!("Cannot plan local path: {}", e);
                return Ok(None);
            }
        };

        let waypoints: SubPath = sub_path
            .iter()
            .map(|wp| wp.transformed(&global_to_local))
            .collect();
        let goal = *waypoints.last().ok_or(PathError::EmptySubPath(0))?;

        let pose = io.pose.current_pose();
        let robot_to_local = pose.as_isometry();
        let obstacles_m: Vec<Point2<f64>> = io
            .obstacles_rb
            .iter()
            .map(|o| robot_to_local * o)
            .collect();

        // ---- CONFIGURE PLUGINS ----

        {
            let ctx = PlanningContext {
                sub_path: &waypoints,
                last_local_path: &self.last_local_path,
                obstacles_m: &obstacles_m,
            };
            constraints.configure(&ctx);
            scorers.configure(&ctx);
        }

        // ---- EARLY EXIT ----

        let dis2last = scorers.score(index::DIS2START_SCORER, &goal)?;
        let remaining_m = dis2last - scorers.score(index::DIS2START_SCORER, &pose)?;

        if remaining_m < self.params.early_exit_threshold_m {
            debug!(
                "Only {:.2} m left along the sub-path, not re-planning",
                remaining_m
            );
            return Ok(None);
        }

        // ---- SEARCH ----

        let search_start = Instant::now();

        let mut nodes = Vec::with_capacity(self.capacity());
        nodes.push(LNode {
            pose,
            parent: None,
            level: 0,
        });

        let result = self.search(&mut nodes, &goal, dis2last, constraints, scorers)?;
        let search_duration_s = search_start.elapsed().as_secs_f64();

        info!(
            "Local search allocated {} nodes in {:.3} ms",
            nodes.len(),
            search_duration_s * 1e3
        );

        let best = match result.best {
            Some(b) => b,
            None => {
                warn!("Local search found no feasible successor of the current pose");
                return Ok(None);
            }
        };

        // ---- RECONSTRUCTION ----

        let mut raw = Vec::with_capacity(nodes[best].level + 1);
        let mut cursor = Some(best);
        while let Some(i) = cursor {
            raw.push(nodes[i].pose);
            cursor = nodes[i].parent;
        }
        raw.reverse();

        // ---- POST-PROCESSING ----

        let postproc_start = Instant::now();

        let smoothed = smooth_path(&raw, self.params.first_smoothing);
        let dense = interpolate_path(&smoothed, self.params.interpolation_step_m);
        let local_wps = smooth_path(&dense, self.params.second_smoothing);

        let postproc_duration_s = postproc_start.elapsed().as_secs_f64();
        debug!(
            "Local path post-processing took {:.3} ms",
            postproc_duration_s * 1e3
        );

        // ---- COMMIT ----

        let local_path = Arc::new(Path::from_waypoints(
            self.params.local_frame.clone(),
            local_wps,
        ));

        io.controller.reset();
        io.controller.set_path(Arc::clone(&local_path));

        self.last_report = Some(PlannerReport {
            time_s: now_s,
            num_nodes: nodes.len(),
            reached_goal: result.reached_goal,
            best_cost: result.best_cost,
            num_raw_waypoints: raw.len(),
            search_duration_s,
            postproc_duration_s,
        });
        self.last_local_path = raw;
        self.last_update_s = Some(now_s);

        Ok(Some(local_path))
    }

    fn set_params(&mut self, params: LocalPlannerParams) {
        self.params = params;
    }

    fn set_velocity(&mut self, velocity_ms: f64) {
        self.velocity_ms = velocity_ms.abs();
    }

    fn is_null(&self) -> bool {
        false
    }

    fn last_report(&self) -> Option<&PlannerReport> {
        self.last_report.as_ref()
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Cost of a candidate pose.
///
/// The distance still to go along the sub-path, plus the distance to the sub-path and the
/// obstacle proximity. The distance to the previous local path is only added while the pose is
/// close enough to it to satisfy the last path constraint.
fn node_cost(
    pose: &Waypoint,
    dis2last: f64,
    constraints: &ConstraintRegistry,
    scorers: &ScorerRegistry,
) -> Result<f64, RegistryError> {
    let mut cost = (dis2last - scorers.score(index::DIS2START_SCORER, pose)?)
        + scorers.score(index::DIS2PATH_SCORER, pose)?
        + scorers.score(index::DIS2OBST_SCORER, pose)?;

    if constraints.check(index::DIS2LAST_CONSTRAINT, pose)? {
        cost += scorers.score(index::DIS2LAST_SCORER, pose)?;
    }

    Ok(cost)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        sim::{SimClock, SimRobot},
        tf::{RigidTransform, StaticTransforms},
    };
    use nalgebra::Vector2;

    fn params() -> LocalPlannerParams {
        util::params::load_str(
            r#"
            update_interval_s = 0.1
            transform_timeout_s = 0.1
            local_frame = "odom"
            max_num_nodes = 2000
            max_depth = 10
            goal_tolerance_m = 0.5
            early_exit_threshold_m = 0.8
            step_length_m = 1.0
            step_time_s = 0.0
            steer_angle_step_rad = 0.4
            num_steer_angles = 3
            interpolation_step_m = 0.1

            [first_smoothing]
            weight = 0.6
            max_displacement_m = 0.15

            [second_smoothing]
            weight = 2.0
            max_displacement_m = 0.4

            [scoring]
            max_dist_to_path_m = 1.0
            max_dist_to_last_path_m = 0.5
            min_obstacle_clearance_m = 0.3
            path_weight = 1.0
            last_path_weight = 0.5
            obstacle_weight = 1.0
            obstacle_range_m = 1.0
            constraints_active = [true, true, true]
            scorers_active = [true, true, true, true]
            "#,
        )
        .unwrap()
    }

    struct Fixture {
        planner: LocalPlannerBfs,
        robot: SimRobot,
        ctrl: SimRobot,
        tfs: StaticTransforms,
        clock: SimClock,
        constraints: ConstraintRegistry,
        scorers: ScorerRegistry,
        obstacles_rb: Vec<Point2<f64>>,
    }

    impl Fixture {
        fn new(path: Path) -> Self {
            let params = params();
            let robot = SimRobot::new(Waypoint::new(0.0, 0.0, 0.0));
            let mut ctrl = robot.clone();
            let tfs = StaticTransforms::new();
            tfs.set("map", "odom", RigidTransform::identity());

            let constraints = params.scoring.build_constraints().unwrap();
            let scorers = params.scoring.build_scorers().unwrap();

            let mut planner = LocalPlannerBfs::new(params);
            planner.set_global_path(Arc::new(path), &mut ctrl);

            Self {
                planner,
                robot,
                ctrl,
                tfs,
                clock: SimClock::new(),
                constraints,
                scorers,
                obstacles_rb: Vec::new(),
            }
        }

        fn update(&mut self) -> Option<Arc<Path>> {
            let mut io = PlannerIo {
                tf: &self.tfs,
                clock: &self.clock,
                pose: &self.robot,
                controller: &mut self.ctrl,
                obstacles_rb: &self.obstacles_rb,
            };

            self.planner
                .update_local_path(&mut io, &mut self.constraints, &mut self.scorers)
                .unwrap()
        }
    }

    fn straight_5m() -> Path {
        Path::from_waypoints(
            "map",
            vec![Waypoint::new(0.0, 0.0, 0.0), Waypoint::new(5.0, 0.0, 0.0)],
        )
    }

    #[test]
    fn test_reaches_goal() {
        let mut f = Fixture::new(straight_5m());

        let local = f.update().expect("Expected a local path");
        let wps = local.sub_path(0).unwrap();

        assert_eq!(local.frame_id(), "odom");
        assert!(wps[0].distance_to(&Waypoint::new(0.0, 0.0, 0.0)) < 1e-6);
        assert!(wps[wps.len() - 1].distance_to(&Waypoint::new(5.0, 0.0, 0.0)) < 0.5);

        // Committed to the controller after a reset
        assert!(Arc::ptr_eq(&f.robot.installed_path().unwrap(), &local));
        assert_eq!(f.robot.reset_count(), 1);

        let report = f.planner.last_report().unwrap();
        assert!(report.reached_goal);
        assert!(report.num_nodes <= 2000);
        assert_eq!(f.planner.last_local_path().len(), report.num_raw_waypoints);
    }

    #[test]
    fn test_rate_limited() {
        let mut f = Fixture::new(straight_5m());

        let first = f.update().unwrap();

        f.clock.set(0.05);
        assert!(f.update().is_none());
        assert!(Arc::ptr_eq(&f.robot.installed_path().unwrap(), &first));
        assert_eq!(f.robot.reset_count(), 1);

        f.clock.set(0.15);
        assert!(f.update().is_some());
        assert_eq!(f.robot.reset_count(), 2);
    }

    #[test]
    fn test_transform_failure_does_not_advance() {
        let mut f = Fixture::new(straight_5m());

        f.clock.set(1.0);
        f.tfs.remove("map", "odom");
        assert!(f.update().is_none());
        assert!(f.planner.last_update_s().is_none());
        assert!(f.robot.installed_path().is_none());

        // Retrying at the same instant plans straight away
        f.tfs.set("map", "odom", RigidTransform::identity());
        assert!(f.update().is_some());
        assert_eq!(f.planner.last_update_s(), Some(1.0));
    }

    #[test]
    fn test_frame_correction() {
        // Map coordinates are odometry coordinates shifted 10 m along x
        let path = Path::from_waypoints(
            "map",
            vec![Waypoint::new(10.0, 0.0, 0.0), Waypoint::new(15.0, 0.0, 0.0)],
        );
        let mut f = Fixture::new(path);
        f.tfs.set(
            "map",
            "odom",
            RigidTransform::new(Vector2::new(10.0, 0.0), 0.0),
        );

        let local = f.update().unwrap();
        let wps = local.sub_path(0).unwrap();
        assert!(wps[wps.len() - 1].distance_to(&Waypoint::new(5.0, 0.0, 0.0)) < 0.5);
    }

    #[test]
    fn test_frame_correction_with_rotation() {
        // Odometry x runs along map y
        let half_pi = std::f64::consts::FRAC_PI_2;
        let path = Path::from_waypoints(
            "map",
            vec![
                Waypoint::new(0.0, 0.0, half_pi),
                Waypoint::new(0.0, 5.0, half_pi),
            ],
        );
        let mut f = Fixture::new(path);
        f.tfs.set(
            "map",
            "odom",
            RigidTransform::new(Vector2::new(0.0, 0.0), half_pi),
        );

        let local = f.update().unwrap();
        let wps = local.sub_path(0).unwrap();

        assert_eq!(local.frame_id(), "odom");
        assert!(wps[0].distance_to(&Waypoint::new(0.0, 0.0, 0.0)) < 1e-6);
        assert!(wps[wps.len() - 1].distance_to(&Waypoint::new(5.0, 0.0, 0.0)) < 0.5);

        // Dead ahead of the robot, not off to its side
        assert!(wps.iter().all(|w| w.y.abs() < 1.0));
    }

    #[test]
    fn test_early_exit_near_goal() {
        let mut f = Fixture::new(straight_5m());
        f.robot.set_pose(Waypoint::new(4.5, 0.0, 0.0));

        assert!(f.update().is_none());
        assert!(f.robot.installed_path().is_none());
    }

    #[test]
    fn test_no_feasible_successor() {
        let mut f = Fixture::new(straight_5m());

        // Boxed in by obstacles one step away in every direction considered
        f.obstacles_rb = (-2..=2)
            .map(|k| {
                let a = k as f64 * 0.4;
                Point2::new(a.cos(), a.sin())
            })
            .collect();

        assert!(f.update().is_none());
        assert!(f.planner.last_update_s().is_none());
    }

    #[test]
    fn test_missing_global_path_is_an_error() {
        let params = params();
        let robot = SimRobot::new(Waypoint::default());
        let mut ctrl = robot.clone();
        let tfs = StaticTransforms::new();
        let clock = SimClock::new();
        let mut constraints = params.scoring.build_constraints().unwrap();
        let mut scorers = params.scoring.build_scorers().unwrap();
        let mut planner = LocalPlannerBfs::new(params);

        let mut io = PlannerIo {
            tf: &tfs,
            clock: &clock,
            pose: &robot,
            controller: &mut ctrl,
            obstacles_rb: &[],
        };

        match planner.update_local_path(&mut io, &mut constraints, &mut scorers) {
            Err(LocalPlannerError::NoGlobalPath) => (),
            r => panic!("Expected no global path error, got {:?}", r),
        }

        planner.set_global_path(Arc::new(Path::new("map", vec![vec![]])), io.controller);
        match planner.update_local_path(&mut io, &mut constraints, &mut scorers) {
            Err(LocalPlannerError::PathError(PathError::EmptySubPath(0))) => (),
            r => panic!("Expected empty sub-path error, got {:?}", r),
        }
    }
}
