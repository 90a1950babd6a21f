//! # Frame transforms and time
//!
//! The core consumes two services from the surrounding middleware: a lookup of the rigid
//! transform between two named frames, and a monotonic time source. Both are traits here so the
//! executive, benchmarks and tests can provide their own.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
    time::Duration,
};

use nalgebra::Isometry2;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// A planar rigid transform (rotation followed by translation).
pub type RigidTransform = Isometry2<f64>;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Provides transforms between named frames.
pub trait TransformLookup {
    /// Get the transform mapping coordinates expressed in `source` into `target` at `time_s`.
    ///
    /// Implementations may block for at most `timeout` waiting for the transform to become
    /// available, after which they must return [`TransformError::Timeout`].
    fn lookup(
        &self,
        target: &str,
        source: &str,
        time_s: f64,
        timeout: Duration,
    ) -> Result<RigidTransform, TransformError>;
}

/// A monotonic source of time, in seconds.
pub trait TimeSource {
    fn now(&self) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A set of fixed transforms between pairs of frames.
///
/// Clones share the same underlying set, so a transform published through one handle is seen by
/// all of them. Lookups never block.
#[derive(Debug, Clone, Default)]
pub struct StaticTransforms {
    transforms: Rc<RefCell<HashMap<(String, String), RigidTransform>>>,
}

/// Time source backed by the session clock.
///
/// Reads zero until a session has been started.
#[derive(Debug, Copy, Clone, Default)]
pub struct SessionClock;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Timed out after {timeout:?} waiting for the transform from {from_frame} to {to_frame}")]
    Timeout {
        to_frame: String,
        from_frame: String,
        timeout: Duration,
    },

    #[error("No transform is known from {from_frame} to {to_frame}")]
    Unavailable { to_frame: String, from_frame: String },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StaticTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transform mapping `source` coordinates into `target`.
    pub fn set(&self, target: &str, source: &str, transform: RigidTransform) {
        self.transforms
            .borrow_mut()
            .insert((target.to_string(), source.to_string()), transform);
    }

    /// Forget the transform between the two frames, in either direction.
    pub fn remove(&self, target: &str, source: &str) {
        let mut transforms = self.transforms.borrow_mut();
        transforms.remove(&(target.to_string(), source.to_string()));
        transforms.remove(&(source.to_string(), target.to_string()));
    }
}

impl TransformLookup for StaticTransforms {
    fn lookup(
        &self,
        target: &str,
        source: &str,
        _time_s: f64,
        _timeout: Duration,
    ) -> Result<RigidTransform, TransformError> {
        if target == source {
            return Ok(RigidTransform::identity());
        }

        let transforms = self.transforms.borrow();

        if let Some(t) = transforms.get(&(target.to_string(), source.to_string())) {
            return Ok(*t);
        }

        // The reverse direction is just as good once inverted
        match transforms.get(&(source.to_string(), target.to_string())) {
            Some(t) => Ok(t.inverse()),
            None => Err(TransformError::Unavailable {
                to_frame: target.to_string(),
                from_frame: source.to_string(),
            }),
        }
    }
}

impl TimeSource for SessionClock {
    fn now(&self) -> f64 {
        if util::session::is_initialised() {
            util::session::get_elapsed_seconds()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::{Point2, Vector2};

    #[test]
    fn test_static_lookup() {
        let tfs = StaticTransforms::new();
        let timeout = Duration::from_millis(100);

        tfs.set("map", "odom", RigidTransform::new(Vector2::new(1.0, 2.0), 0.0));

        // Direct
        let t = tfs.lookup("map", "odom", 0.0, timeout).unwrap();
        let p = t * Point2::new(0.0, 0.0);
        assert!((p - Point2::new(1.0, 2.0)).norm() < 1e-9);

        // Inverse
        let t = tfs.lookup("odom", "map", 0.0, timeout).unwrap();
        let p = t * Point2::new(1.0, 2.0);
        assert!(p.coords.norm() < 1e-9);

        // Same frame
        assert!(tfs.lookup("odom", "odom", 0.0, timeout).is_ok());

        // Shared handles see removals
        let other = tfs.clone();
        other.remove("odom", "map");
        match tfs.lookup("map", "odom", 0.0, timeout) {
            Err(TransformError::Unavailable { .. }) => (),
            r => panic!("Expected unavailable transform, got {:?}", r),
        }
    }
}
