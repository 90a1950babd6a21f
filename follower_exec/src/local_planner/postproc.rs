//! # Local path post-processing
//!
//! The raw output of the search is a coarse polyline of node poses. Before it is given to the
//! controller it is smoothed, resampled at a fixed spacing, then smoothed again.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Point2;

use super::params::SmoothingParams;
use crate::path::{cumulative_distances, segment_heading, Waypoint};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const MAX_SMOOTHING_ITERS: usize = 100;

/// Largest waypoint movement in one iteration at which smoothing is considered converged
const SMOOTHING_TOLERANCE_M: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Smooth the path by pulling each interior waypoint toward its neighbours.
///
/// Each waypoint settles at the weighted average of its original position and its smoothed
/// neighbours. No waypoint is moved further than `max_displacement_m` from its original position,
/// and the first and last waypoints are not moved at all.
pub fn smooth_path(waypoints: &[Waypoint], params: SmoothingParams) -> Vec<Waypoint> {
    let n = waypoints.len();
    if n < 3 {
        return waypoints.to_vec();
    }

    let orig: Vec<Point2<f64>> = waypoints.iter().map(|w| w.position()).collect();
    let mut smooth = orig.clone();
    let w = params.weight;

    for _ in 0..MAX_SMOOTHING_ITERS {
        let mut max_change_m: f64 = 0.0;

        for i in 1..(n - 1) {
            let avg = (orig[i].coords + (smooth[i - 1].coords + smooth[i + 1].coords) * w)
                / (1.0 + 2.0 * w);
            max_change_m = max_change_m.max((avg - smooth[i].coords).norm());
            smooth[i] = Point2::from(avg);
        }

        if max_change_m < SMOOTHING_TOLERANCE_M {
            break;
        }
    }

    for (s, o) in smooth.iter_mut().zip(orig.iter()) {
        let disp = *s - *o;
        let disp_m = disp.norm();
        if disp_m > params.max_displacement_m {
            *s = *o + disp * (params.max_displacement_m / disp_m);
        }
    }

    let mut out: Vec<Waypoint> = waypoints
        .iter()
        .zip(smooth.iter())
        .map(|(wp, p)| Waypoint::new(p.x, p.y, wp.orientation))
        .collect();

    update_interior_orientations(&mut out);

    out
}

/// Resample the path so that consecutive waypoints are `step_m` apart along the path.
///
/// The first and last waypoints are kept, so the final segment may be shorter than the step.
pub fn interpolate_path(waypoints: &[Waypoint], step_m: f64) -> Vec<Waypoint> {
    if waypoints.len() < 2 || step_m <= 0.0 {
        return waypoints.to_vec();
    }

    let cum_dists = cumulative_distances(waypoints);
    let total_m = cum_dists[cum_dists.len() - 1];

    let mut out = vec![waypoints[0]];
    let mut seg = 0;
    let mut k = 1;

    loop {
        let s = k as f64 * step_m;
        if s >= total_m - SMOOTHING_TOLERANCE_M {
            break;
        }

        while cum_dists[seg + 1] < s {
            seg += 1;
        }

        let a = waypoints[seg];
        let b = waypoints[seg + 1];
        let seg_len_m = cum_dists[seg + 1] - cum_dists[seg];
        let t = (s - cum_dists[seg]) / seg_len_m;

        out.push(Waypoint::new(
            a.x + t * (b.x - a.x),
            a.y + t * (b.y - a.y),
            segment_heading(&a, &b),
        ));

        k += 1;
    }

    out.push(waypoints[waypoints.len() - 1]);

    out
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Point each interior waypoint along the chord joining its neighbours.
fn update_interior_orientations(waypoints: &mut [Waypoint]) {
    for i in 1..waypoints.len().saturating_sub(1) {
        waypoints[i].orientation = segment_heading(&waypoints[i - 1], &waypoints[i + 1]);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn zigzag() -> Vec<Waypoint> {
        (0..8)
            .map(|i| Waypoint::new(i as f64, if i % 2 == 0 { 0.0 } else { 0.5 }, 0.0))
            .collect()
    }

    #[test]
    fn test_smoothing_limits() {
        let raw = zigzag();
        let params = SmoothingParams {
            weight: 2.0,
            max_displacement_m: 0.1,
        };
        let smooth = smooth_path(&raw, params);

        assert_eq!(smooth.len(), raw.len());
        assert_eq!(smooth[0].position(), raw[0].position());
        assert_eq!(smooth[7].position(), raw[7].position());

        for (s, r) in smooth.iter().zip(raw.iter()) {
            assert!(s.distance_to(r) <= 0.1 + 1e-9);
        }

        // The zigzag is flattened
        assert!(smooth[1].y < 0.5);
        assert!(smooth[2].y > 0.0);
    }

    #[test]
    fn test_interpolation_spacing() {
        let raw = vec![
            Waypoint::new(0.0, 0.0, 0.0),
            Waypoint::new(1.0, 0.0, 0.0),
            Waypoint::new(1.0, 0.55, 0.0),
        ];
        let dense = interpolate_path(&raw, 0.1);

        assert_eq!(dense[0], raw[0]);
        assert_eq!(*dense.last().unwrap(), raw[2]);

        // 1.55 m in 0.1 m steps, plus the end point
        assert_eq!(dense.len(), 17);

        // Chords across the corner may be shorter than the step
        for w in dense.windows(2).take(dense.len() - 2) {
            let d = w[0].distance_to(&w[1]);
            assert!(d <= 0.1 + 1e-9 && d > 0.07);
        }
    }

    #[test]
    fn test_full_postprocessing_keeps_endpoints() {
        let raw = zigzag();
        let first = SmoothingParams {
            weight: 0.6,
            max_displacement_m: 0.15,
        };
        let second = SmoothingParams {
            weight: 2.0,
            max_displacement_m: 0.4,
        };

        let out = smooth_path(&interpolate_path(&smooth_path(&raw, first), 0.1), second);

        assert!(out[0].distance_to(&raw[0]) < 1e-9);
        assert!(out.last().unwrap().distance_to(raw.last().unwrap()) < 1e-9);
    }

    #[test]
    fn test_full_postprocessing_spacing() {
        // Search-like output turning through a right angle in 1 m steps
        let mut raw = vec![Waypoint::new(0.0, 0.0, 0.0)];
        for &heading in [0.0_f64, 0.0, 0.4, 0.8, 1.2, 1.57, 1.57].iter() {
            let last = raw[raw.len() - 1];
            raw.push(Waypoint::new(
                last.x + heading.cos(),
                last.y + heading.sin(),
                heading,
            ));
        }

        let first = SmoothingParams {
            weight: 0.6,
            max_displacement_m: 0.15,
        };
        let second = SmoothingParams {
            weight: 2.0,
            max_displacement_m: 0.4,
        };

        let out = smooth_path(&interpolate_path(&smooth_path(&raw, first), 0.1), second);
        assert!(out.len() > 60);

        // Only the final segment may be short
        for w in out.windows(2).take(out.len() - 2) {
            let d = w[0].distance_to(&w[1]);
            assert!((d - 0.1).abs() < 0.035, "spacing {} m", d);
        }
    }
}
