//! Container-leveling reset pose.
//!
//! When an arm holding a container is reset, the wrist is counter-rotated
//! so the container ends up level.  Solving for that wrist angle needs the
//! container's live rotation; the result is cached per arm and replayed on
//! later resets until the arm lets go of what it holds.

use std::collections::HashMap;

use transport_types::{Arm, Quaternion};

/// Arm → joint-angle vector that holds the arm's container level.
#[derive(Debug, Clone, Default)]
pub struct ArmResetPoseCache {
    poses: HashMap<Arm, Vec<f32>>,
}

impl ArmResetPoseCache {
    pub fn get(&self, arm: Arm) -> Option<&[f32]> {
        self.poses.get(&arm).map(Vec::as_slice)
    }

    pub fn insert(&mut self, arm: Arm, angles: Vec<f32>) {
        self.poses.insert(arm, angles);
    }

    /// Forget `arm`'s pose.  Returns whether one was cached.
    pub fn remove(&mut self, arm: Arm) -> bool {
        self.poses.remove(&arm).is_some()
    }

    pub fn clear(&mut self) {
        self.poses.clear();
    }
}

/// Wrist pitch (degrees) that levels a container currently at `rotation`,
/// starting from the neutral wrist.
///
/// The container's tilt about its local x axis is
/// `atan2(2(xw − yz), 1 − 2(x² + z²))`.  Its negation maps to the wrist
/// target as follows:
///
/// | negated tilt `n` | wrist target |
/// |---|---|
/// | `n > 90` | `n − 180` |
/// | `0 < n <= 90` | `−n` |
/// | `n <= 0` | `n` |
pub fn level_correction(rotation: Quaternion) -> f32 {
    let x_rot = -rotation.pitch();
    if x_rot > 90.0 {
        x_rot - 180.0
    } else if x_rot > 0.0 {
        -x_rot
    } else {
        x_rot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn tilted_forward_is_counter_rotated() {
        // Tilt +25: negated is -25, passed through.
        let q = Quaternion::from_yaw(40.0).mul(Quaternion::from_pitch(25.0));
        assert!(close(level_correction(q), -25.0));
    }

    #[test]
    fn small_positive_correction_is_negated() {
        let q = Quaternion::from_pitch(-30.0);
        assert!(close(level_correction(q), -30.0));
    }

    #[test]
    fn large_correction_wraps_by_half_turn() {
        let q = Quaternion::from_yaw(-100.0).mul(Quaternion::from_pitch(-120.0));
        assert!(close(level_correction(q), -60.0));
    }

    #[test]
    fn steep_backward_tilt_passes_through() {
        // Negated tilt of -170 is below -90 and is returned as is.
        let q = Quaternion::from_pitch(170.0);
        assert!(close(level_correction(q), -170.0));
    }

    #[test]
    fn level_container_needs_nothing() {
        assert!(close(level_correction(Quaternion::from_yaw(73.0)), 0.0));
    }

    #[test]
    fn cache_remove_reports_presence() {
        let mut cache = ArmResetPoseCache::default();
        cache.insert(Arm::Right, vec![-90.0, 0.0, 90.0, -25.0]);
        assert_eq!(cache.get(Arm::Right).map(|a| a[3]), Some(-25.0));
        assert!(cache.get(Arm::Left).is_none());
        assert!(cache.remove(Arm::Right));
        assert!(!cache.remove(Arm::Right));
        assert!(cache.get(Arm::Right).is_none());
    }
}
