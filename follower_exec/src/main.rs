//! Path follower executable entry point.
//!
//! # Architecture
//!
//! The executable runs the path follower against a simulated robot:
//!
//!     - Initialise the session, logging and parameters
//!     - Load the path to follow, either from the JSON file given as the only argument or a
//!       built in default
//!     - Main loop:
//!         - Obstacle sensing
//!         - Local planning and behaviour execution
//!         - Archiving of new local paths and planner reports
//!         - Robot motion
//!
//! The loop ends when the follow path task finishes or runs out of time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use nalgebra::{Point2, Vector2};
use std::{
    env,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

// Internal
use follower_lib::{
    follower::{FollowerParams, PathFollower, RobotIo},
    local_planner::LocalPlannerParams,
    path::{Path, Waypoint},
    robot::PoseProvider,
    sim::SimRobot,
    tf::{RigidTransform, SessionClock, StaticTransforms},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

/// Maximum time the task is given before it is cancelled.
const MAX_TASK_DURATION_S: f64 = 300.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("follower_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Path Follower Executable\n");
    info!(
        "Software root: {:?}",
        host::get_sw_root().wrap_err("Failed to find the software root")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let follower_params: FollowerParams =
        util::params::load("path_follower.toml").wrap_err("Could not load follower params")?;
    let planner_params: LocalPlannerParams =
        util::params::load("local_planner.toml").wrap_err("Could not load local planner params")?;

    info!("Exec parameters loaded");

    // ---- LOAD PATH ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let path = match args.len() {
        1 => {
            info!("No path provided, following the default path");
            default_path()
        }
        2 => {
            info!("Loading path from \"{}\"", &args[1]);
            let path_str = std::fs::read_to_string(&args[1])
                .wrap_err_with(|| format!("Could not read path file {}", &args[1]))?;
            serde_json::from_str(&path_str).wrap_err("Could not parse the path file")?
        }
        n => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                n - 1
            ))
        }
    };

    // ---- INITIALISE SIMULATION ----

    // Odometry starts at the map's origin offset, so the robot begins at the start of the default
    // path.
    let tfs = StaticTransforms::new();
    tfs.set(
        "map",
        &follower_params.local_frame,
        RigidTransform::new(Vector2::new(1.0, -0.5), 0.0),
    );

    let robot = SimRobot::new(Waypoint::default());
    robot.set_obstacles(vec![Point2::new(4.5, 2.6), Point2::new(7.2, 0.4)]);

    let sense_range_m = follower_params.obstacle_sense_range_m;
    let avoider = follower_params.avoider.build();

    let io = RobotIo {
        controller: Box::new(robot.clone()),
        pose: Box::new(robot.clone()),
        tf: Box::new(tfs),
        clock: Box::new(SessionClock),
        avoider,
        obstacles_rb: Vec::new(),
    };

    let mut follower = PathFollower::new(follower_params, planner_params, io)
        .wrap_err("Failed to initialise the path follower")?;

    follower
        .accept_goal(path.clone())
        .wrap_err("The path was rejected")?;
    session::save("global_path.json", path);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let task_start_s = session::get_elapsed_seconds();
    let mut last_local_path: Option<Arc<Path>> = None;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- DATA INPUT ----

        follower.set_obstacles(robot.sense_obstacles(sense_range_m));

        // ---- FOLLOWER PROCESSING ----

        if let Some(status) = follower.step() {
            info!(
                "Task finished with {} ({:?})",
                status,
                follower.goal_state()
            );
            break;
        }

        // Archive each new local path along with the report of the plan that made it
        if let Some(local_path) = follower.local_path() {
            let is_new = match last_local_path.as_ref() {
                Some(p) => !Arc::ptr_eq(p, local_path),
                None => true,
            };

            if is_new {
                session::save_with_timestamp("local_path/local_path.json", (**local_path).clone());
                if let Some(report) = follower.planner_report() {
                    session::save_with_timestamp("planner_report/report.json", report.clone());
                }
                last_local_path = Some(Arc::clone(local_path));
            }
        }

        if let Some(feedback) = follower.feedback() {
            debug!(
                "{:?}: {:.2} m to target on sub-path {}",
                feedback.status, feedback.dist_to_target_m, feedback.sub_path_index
            );
        }

        if session::get_elapsed_seconds() - task_start_s > MAX_TASK_DURATION_S {
            warn!("Task took longer than {} s, cancelling", MAX_TASK_DURATION_S);
            follower.cancel();
            break;
        }

        // ---- SIMULATION ----

        robot.step(CYCLE_PERIOD_S);

        // ---- CYCLE MANAGEMENT ----

        // Get the cycle duration and sleep for the rest of the period
        let cycle_dur = Instant::now() - cycle_start_instant;
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }
    }

    let pose = robot.current_pose();
    info!(
        "Robot finished at ({:.2}, {:.2}, {:.2}) in the local frame",
        pose.x, pose.y, pose.orientation
    );

    session.exit();

    Ok(())
}

/// A path with a gentle bend then a sharp turn, split into two sub-paths at the turn.
fn default_path() -> Path {
    Path::new(
        "map",
        vec![
            vec![
                Waypoint::new(1.0, -0.5, 0.0),
                Waypoint::new(4.0, -0.5, 0.0),
                Waypoint::new(7.0, 1.0, 0.0),
            ],
            vec![
                Waypoint::new(7.0, 1.0, 0.0),
                Waypoint::new(7.0, 4.0, 0.0),
            ],
        ],
    )
}
