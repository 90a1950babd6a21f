//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where 
    T: Float 
{
    target_range.0 
        + ((value - source_range.0) 
        * (target_range.1 - target_range.0) 
        / (source_range.1 - source_range.0))
}

/// Clamp a value into the inclusive range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    value.max(min).min(max)
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float + FloatConst
{
    rem_euclid(angle + T::PI(), T::PI() + T::PI()) - T::PI()
}

/// Get the signed shortest angular distance from `a` to `b`, in the range [-pi, pi).
///
/// A positive result means `b` lies anticlockwise of `a`.
pub fn get_ang_dist<T>(a: T, b: T) -> T
where
    T: Float + FloatConst
{
    wrap_pi(b - a)
}

/// Least nonnegative remainder of `lhs (mod rhs)`.
///
/// Round-off can give `r == rhs.abs()` when `lhs` is a tiny negative number.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_wrap_pi() {
        assert!(approx(wrap_pi(0.0), 0.0));
        assert!(approx(wrap_pi(1.5 * PI), -0.5 * PI));
        assert!(approx(wrap_pi(-1.5 * PI), 0.5 * PI));
        assert!(approx(wrap_pi(4.0 * PI + 0.25), 0.25));
    }

    #[test]
    fn test_get_ang_dist() {
        assert!(approx(get_ang_dist(1.0, 2.0), 1.0));
        assert!(approx(get_ang_dist(2.0, 1.0), -1.0));
        assert!(approx(get_ang_dist(0.9 * PI, -0.9 * PI), 0.2 * PI));
        assert!(approx(get_ang_dist(-0.9 * PI, 0.9 * PI), -0.2 * PI));
    }

    #[test]
    fn test_lin_map_and_clamp() {
        assert!(approx(lin_map((0.0, 2.0), (0.1, 0.5), 1.0), 0.3));
        assert_eq!(clamp(3.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-3.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5, -1.0, 1.0), 0.5);
    }
}
