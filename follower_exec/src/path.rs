//! # Path
//!
//! This module defines the waypoint and path types shared by the planners and behaviours, along
//! with the geometric queries the scorers and behaviours need (lengths, nearest points, arc
//! lengths).
//!
//! A [`Path`] is treated as immutable once it has been handed out. Components which produce a
//! new path build a fresh one and swap it in wholesale.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single pose along a path.
///
/// The frame the waypoint is expressed in is given by the [`Path`] containing it.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,

    /// Heading of the waypoint (angle to the +ve x axis) in radians.
    pub orientation: f64,
}

/// A contiguous run of waypoints, treated as one planning unit.
pub type SubPath = Vec<Waypoint>;

/// A path made up of one or more sub-paths, tagged with the frame it is expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    frame_id: String,
    sub_paths: Vec<SubPath>,
}

/// The closest point on a sub-path to some query point.
#[derive(Debug, Copy, Clone)]
pub struct Projection {
    /// The closest point on the path
    pub point_m: Point2<f64>,

    /// Index of the segment the point lies on. Segment `i` joins waypoints `i` and `i + 1`.
    pub segment_index: usize,

    /// Distance along the path from its first waypoint to the closest point
    pub arc_length_m: f64,

    /// Distance between the query point and the closest point
    pub distance_m: f64,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Sub-path {index} requested but the path only has {count} sub-paths")]
    SubPathOutOfRange { index: usize, count: usize },

    #[error("Sub-path {0} contains no waypoints")]
    EmptySubPath(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    pub fn new(x: f64, y: f64, orientation: f64) -> Self {
        Self { x, y, orientation }
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Euclidian distance between the positions of two waypoints.
    pub fn distance_to(&self, other: &Waypoint) -> f64 {
        (self.position() - other.position()).norm()
    }

    /// The waypoint as a rigid transform from the frame the waypoint is in to a frame sitting on
    /// the waypoint, facing along its orientation.
    pub fn as_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x, self.y), self.orientation)
    }

    /// Apply a rigid transform to the waypoint, rotating and translating the position and
    /// rotating the orientation.
    pub fn transformed(&self, transform: &Isometry2<f64>) -> Waypoint {
        let p = transform * self.position();
        Waypoint {
            x: p.x,
            y: p.y,
            orientation: util::maths::wrap_pi(self.orientation + transform.rotation.angle()),
        }
    }
}

impl Path {
    /// Create a new empty path in the given frame.
    pub fn new_empty<S: Into<String>>(frame_id: S) -> Self {
        Self {
            frame_id: frame_id.into(),
            sub_paths: Vec::new(),
        }
    }

    pub fn new<S: Into<String>>(frame_id: S, sub_paths: Vec<SubPath>) -> Self {
        Self {
            frame_id: frame_id.into(),
            sub_paths,
        }
    }

    /// Create a path consisting of a single sub-path.
    pub fn from_waypoints<S: Into<String>>(frame_id: S, waypoints: SubPath) -> Self {
        Self::new(frame_id, vec![waypoints])
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn sub_path_count(&self) -> usize {
        self.sub_paths.len()
    }

    pub fn sub_paths(&self) -> &[SubPath] {
        &self.sub_paths
    }

    /// Get the sub-path at the given index.
    ///
    /// Sub-paths without any waypoints are a violation of the path producer's contract and are
    /// reported as errors rather than returned.
    pub fn sub_path(&self, index: usize) -> Result<&SubPath, PathError> {
        let sub_path = self
            .sub_paths
            .get(index)
            .ok_or(PathError::SubPathOutOfRange {
                index,
                count: self.sub_paths.len(),
            })?;

        if sub_path.is_empty() {
            return Err(PathError::EmptySubPath(index));
        }

        Ok(sub_path)
    }

    /// Returns true if the path has no waypoints at all.
    pub fn is_empty(&self) -> bool {
        self.sub_paths.iter().all(|s| s.is_empty())
    }

    /// Total length of the path in meters, summed over all sub-paths.
    pub fn get_length(&self) -> f64 {
        self.sub_paths.iter().map(|s| sub_path_length(s)).sum()
    }

    /// A new path made of the sub-paths from `index` onwards.
    ///
    /// Returns an empty path if `index` is past the last sub-path.
    pub fn remaining_from(&self, index: usize) -> Path {
        Path {
            frame_id: self.frame_id.clone(),
            sub_paths: self.sub_paths.iter().skip(index).cloned().collect(),
        }
    }

    /// Return a copy of this path with every waypoint transformed, tagged with the new frame.
    pub fn transformed<S: Into<String>>(&self, transform: &Isometry2<f64>, frame_id: S) -> Path {
        Path {
            frame_id: frame_id.into(),
            sub_paths: self
                .sub_paths
                .iter()
                .map(|s| s.iter().map(|wp| wp.transformed(transform)).collect())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Length of the polyline joining the waypoints.
pub fn sub_path_length(waypoints: &[Waypoint]) -> f64 {
    waypoints.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Distance along the polyline from the first waypoint to each waypoint.
///
/// The first element is always zero, the last is the length of the sub-path.
pub fn cumulative_distances(waypoints: &[Waypoint]) -> Vec<f64> {
    let mut dists = Vec::with_capacity(waypoints.len());
    let mut total = 0.0;

    for (i, wp) in waypoints.iter().enumerate() {
        if i > 0 {
            total += waypoints[i - 1].distance_to(wp);
        }
        dists.push(total);
    }

    dists
}

/// Heading of the segment from `from` to `to`, in radians.
pub fn segment_heading(from: &Waypoint, to: &Waypoint) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Find the closest point on the sub-path to `point_m`.
///
/// `cum_dists` must be the result of [`cumulative_distances`] for the same waypoints. Returns
/// `None` for an empty sub-path.
pub fn project_onto(
    waypoints: &[Waypoint],
    cum_dists: &[f64],
    point_m: &Point2<f64>,
) -> Option<Projection> {
    let first = waypoints.first()?;
    let query = *point_m;

    // A single waypoint is its own closest point
    if waypoints.len() == 1 {
        return Some(Projection {
            point_m: first.position(),
            segment_index: 0,
            arc_length_m: 0.0,
            distance_m: (first.position() - query).norm(),
        });
    }

    let mut best: Option<Projection> = None;

    for (i, seg) in waypoints.windows(2).enumerate() {
        let start = seg[0].position();
        let seg_vec = seg[1].position() - start;
        let seg_len_sq = seg_vec.norm_squared();

        // Fraction along the segment of the perpendicular foot, limited to the segment itself.
        // Degenerate segments collapse onto their start point.
        let t = if seg_len_sq > std::f64::EPSILON {
            ((query - start).dot(&seg_vec) / seg_len_sq).max(0.0).min(1.0)
        } else {
            0.0
        };

        let foot = start + seg_vec * t;
        let distance_m = (foot - query).norm();

        if best.map_or(true, |b| distance_m < b.distance_m) {
            best = Some(Projection {
                point_m: foot,
                segment_index: i,
                arc_length_m: cum_dists[i] + t * seg_len_sq.sqrt(),
                distance_m,
            });
        }
    }

    best
}

/// The point at `arc_length_m` along the sub-path, clamped to its ends.
pub fn point_at_arc_length(
    waypoints: &[Waypoint],
    cum_dists: &[f64],
    arc_length_m: f64,
) -> Option<Point2<f64>> {
    let first = waypoints.first()?;
    let last = waypoints.last()?;

    if arc_length_m <= 0.0 {
        return Some(first.position());
    }

    for (i, seg) in waypoints.windows(2).enumerate() {
        if arc_length_m <= cum_dists[i + 1] {
            let seg_len_m = cum_dists[i + 1] - cum_dists[i];
            let t = if seg_len_m > std::f64::EPSILON {
                (arc_length_m - cum_dists[i]) / seg_len_m
            } else {
                0.0
            };

            return Some(seg[0].position() + (seg[1].position() - seg[0].position()) * t);
        }
    }

    Some(last.position())
}

/// Shortest distance from `point_m` to the sub-path, or `None` if the sub-path is empty.
pub fn distance_to_path(waypoints: &[Waypoint], point_m: &Point2<f64>) -> Option<f64> {
    let cum_dists = cumulative_distances(waypoints);
    project_onto(waypoints, &cum_dists, point_m).map(|p| p.distance_m)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn l_shape() -> SubPath {
        vec![
            Waypoint::new(0.0, 0.0, 0.0),
            Waypoint::new(2.0, 0.0, 0.0),
            Waypoint::new(2.0, 3.0, PI / 2.0),
        ]
    }

    #[test]
    fn test_length_and_cumulative() {
        let path = Path::from_waypoints("map", l_shape());

        assert!((path.get_length() - 5.0).abs() < 1e-9);
        assert_eq!(cumulative_distances(&l_shape()), vec![0.0, 2.0, 5.0]);
        assert_eq!(sub_path_length(&[]), 0.0);
    }

    #[test]
    fn test_sub_path_errors() {
        let path = Path::new("map", vec![l_shape(), vec![]]);

        assert!(path.sub_path(0).is_ok());
        match path.sub_path(1) {
            Err(PathError::EmptySubPath(1)) => (),
            r => panic!("Expected empty sub-path error, got {:?}", r),
        }
        match path.sub_path(2) {
            Err(PathError::SubPathOutOfRange { index: 2, count: 2 }) => (),
            r => panic!("Expected out of range error, got {:?}", r),
        }
    }

    #[test]
    fn test_projection() {
        let wps = l_shape();
        let cum = cumulative_distances(&wps);

        // Beside the first segment
        let p = project_onto(&wps, &cum, &Point2::new(1.0, -0.5)).unwrap();
        assert_eq!(p.segment_index, 0);
        assert!((p.arc_length_m - 1.0).abs() < 1e-9);
        assert!((p.distance_m - 0.5).abs() < 1e-9);

        // Beside the second segment
        let p = project_onto(&wps, &cum, &Point2::new(2.5, 1.0)).unwrap();
        assert_eq!(p.segment_index, 1);
        assert!((p.arc_length_m - 3.0).abs() < 1e-9);
        assert!((p.distance_m - 0.5).abs() < 1e-9);

        // Beyond the end clamps onto the last waypoint
        let p = project_onto(&wps, &cum, &Point2::new(2.0, 4.0)).unwrap();
        assert!((p.arc_length_m - 5.0).abs() < 1e-9);
        assert!((p.distance_m - 1.0).abs() < 1e-9);

        assert!(distance_to_path(&[], &Point2::origin()).is_none());
    }

    #[test]
    fn test_point_at_arc_length() {
        let wps = l_shape();
        let cum = cumulative_distances(&wps);

        let p = point_at_arc_length(&wps, &cum, 3.5).unwrap();
        assert!((p - Point2::new(2.0, 1.5)).norm() < 1e-9);

        // Clamped at both ends
        assert_eq!(point_at_arc_length(&wps, &cum, -1.0), Some(Point2::new(0.0, 0.0)));
        assert_eq!(point_at_arc_length(&wps, &cum, 9.0), Some(Point2::new(2.0, 3.0)));
    }

    #[test]
    fn test_remaining_from() {
        let path = Path::new("map", vec![l_shape(), vec![Waypoint::new(5.0, 5.0, 0.0)]]);

        let rest = path.remaining_from(1);
        assert_eq!(rest.frame_id(), "map");
        assert_eq!(rest.sub_path_count(), 1);
        assert_eq!(rest.sub_path(0).unwrap()[0], Waypoint::new(5.0, 5.0, 0.0));

        assert!(path.remaining_from(2).is_empty());
    }

    #[test]
    fn test_transform() {
        // Rotate a quarter turn anticlockwise then shift along x
        let iso = Isometry2::new(Vector2::new(1.0, 0.0), PI / 2.0);
        let wp = Waypoint::new(1.0, 0.0, 0.0).transformed(&iso);

        assert!((wp.x - 1.0).abs() < 1e-9);
        assert!((wp.y - 1.0).abs() < 1e-9);
        assert!((wp.orientation - PI / 2.0).abs() < 1e-9);

        let path = Path::from_waypoints("map", l_shape()).transformed(&iso, "odom");
        assert_eq!(path.frame_id(), "odom");
        assert!((path.get_length() - 5.0).abs() < 1e-9);

        // Transforming by the inverse recovers the original
        let back = path.transformed(&iso.inverse(), "map");
        for (a, b) in back.sub_paths()[0].iter().zip(l_shape().iter()) {
            assert!(a.distance_to(b) < 1e-9);
        }
    }
}
