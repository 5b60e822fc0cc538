//! # Angles and Paths
//!
//! Yaw follows the usual block-game convention: 0° faces +Z, 90° faces -X.

use warden_shared::{Vec2, Vec3};

/// Vectors shorter than this have no meaningful direction.
const MIN_DIRECTION_LENGTH: f64 = 1e-6;

/// Angle between two planar vectors, in degrees `[0, 180]`.
///
/// Returns 0.0 when either vector is (near) zero.
#[must_use]
pub fn angle_between(v1: Vec2, v2: Vec2) -> f64 {
    let l1 = v1.length();
    let l2 = v2.length();
    if l1 < MIN_DIRECTION_LENGTH || l2 < MIN_DIRECTION_LENGTH {
        return 0.0;
    }
    let cos = (v1.dot(v2) / (l1 * l2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Wraps an angle into `(-180, 180]`.
#[must_use]
pub fn wrap_degrees(angle: f64) -> f64 {
    let mut wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped -= 360.0;
    } else if wrapped <= -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

/// Absolute shortest rotation between two yaw angles, in degrees.
#[must_use]
pub fn yaw_delta(from: f64, to: f64) -> f64 {
    wrap_degrees(to - from).abs()
}

/// Unit facing vector for a yaw angle.
#[must_use]
pub fn yaw_to_direction(yaw: f64) -> Vec2 {
    let radians = yaw.to_radians();
    Vec2::new(-radians.sin(), radians.cos())
}

/// Points along the straight segment `from → to`, at most `step` apart.
///
/// Both endpoints are included. A zero-length segment yields one point.
#[must_use]
pub fn sample_path(from: Vec3, to: Vec3, step: f64) -> Vec<Vec3> {
    let distance = from.distance(to);
    if distance < MIN_DIRECTION_LENGTH || step <= 0.0 || !distance.is_finite() {
        return vec![to];
    }
    let segments = (distance / step).ceil().max(1.0) as usize;
    (0..=segments)
        .map(|i| from.lerp(to, i as f64 / segments as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_between_basic() {
        let x = Vec2::new(1.0, 0.0);
        let z = Vec2::new(0.0, 2.0);
        assert!((angle_between(x, z) - 90.0).abs() < 1e-9);
        assert!((angle_between(x, Vec2::new(-3.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!(angle_between(x, x).abs() < 1e-6);
    }

    #[test]
    fn test_angle_zero_vector_guard() {
        assert_eq!(angle_between(Vec2::ZERO, Vec2::new(1.0, 1.0)), 0.0);
        assert_eq!(angle_between(Vec2::new(1.0, 1.0), Vec2::ZERO), 0.0);
    }

    #[test]
    fn test_wrap_and_yaw_delta() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert!((yaw_delta(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((yaw_delta(10.0, 350.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_yaw_direction() {
        let south = yaw_to_direction(0.0);
        assert!((south.y - 1.0).abs() < 1e-12);
        let west = yaw_to_direction(90.0);
        assert!((west.x + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_path_spacing() {
        let from = Vec3::new(0.0, 64.0, 0.0);
        let to = Vec3::new(1.0, 64.0, 0.0);
        let points = sample_path(from, to, 0.25);
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], from);
        assert_eq!(points[4], to);
        assert!((points[2].x - 0.5).abs() < 1e-12);

        assert_eq!(sample_path(from, from, 0.25), vec![from]);
    }
}
