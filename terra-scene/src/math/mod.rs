use std::f64::consts::{PI, TAU};

mod cartographic;
pub use cartographic::*;

pub const EPSILON1: f64 = 0.1;
pub const EPSILON2: f64 = 0.01;
pub const EPSILON3: f64 = 0.001;
pub const EPSILON5: f64 = 0.00001;
pub const EPSILON6: f64 = 0.000001;
pub const EPSILON7: f64 = 0.0000001;
pub const EPSILON10: f64 = 0.0000000001;
pub const EPSILON12: f64 = 0.000000000001;
pub const EPSILON14: f64 = 0.00000000000001;
pub const EPSILON15: f64 = 0.000000000000001;
pub const EPSILON20: f64 = 0.00000000000000000001;

/// Compares two numbers using an absolute tolerance, falling back to a tolerance relative to
/// the larger magnitude. When `absolute_epsilon` is `None` the relative one is reused.
pub fn equals_epsilon(
    left: f64,
    right: f64,
    relative_epsilon: Option<f64>,
    absolute_epsilon: Option<f64>,
) -> bool {
    let relative_epsilon = relative_epsilon.unwrap_or(0.0);
    let absolute_epsilon = absolute_epsilon.unwrap_or(relative_epsilon);
    let abs_diff = (left - right).abs();
    abs_diff <= absolute_epsilon || abs_diff <= relative_epsilon * left.abs().max(right.abs())
}

pub fn lerp(p: f64, q: f64, time: f64) -> f64 {
    (1.0 - time) * p + time * q
}

/// Euclidean modulo, the result has the sign of `n`.
pub fn modulo(m: f64, n: f64) -> f64 {
    if m.signum() == n.signum() && m.abs() < n.abs() {
        return m;
    }
    ((m % n) + n) % n
}

pub fn negative_pi_to_pi(angle: f64) -> f64 {
    if (-PI..=PI).contains(&angle) {
        return angle;
    }
    zero_to_two_pi(angle + PI) - PI
}

pub fn zero_to_two_pi(angle: f64) -> f64 {
    if (0.0..=TAU).contains(&angle) {
        return angle;
    }
    let m = modulo(angle, TAU);
    if m.abs() < EPSILON14 && angle.abs() > EPSILON14 {
        return TAU;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_epsilon_uses_relative_tolerance_for_large_values() {
        assert!(equals_epsilon(1.0, 1.0 + EPSILON7, Some(EPSILON6), None));
        assert!(!equals_epsilon(1.0, 1.1, Some(EPSILON6), None));
        assert!(equals_epsilon(
            6378137.0,
            6378137.5,
            Some(EPSILON7),
            Some(EPSILON14)
        ));
    }

    #[test]
    fn wraps_angles() {
        assert!(equals_epsilon(
            negative_pi_to_pi(PI + 0.5),
            -PI + 0.5,
            Some(EPSILON14),
            None
        ));
        assert!(equals_epsilon(
            zero_to_two_pi(-0.5),
            TAU - 0.5,
            Some(EPSILON14),
            None
        ));
        assert_eq!(zero_to_two_pi(TAU * 2.0), TAU);
        assert_eq!(negative_pi_to_pi(1.0), 1.0);
    }

    #[test]
    fn lerps() {
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
    }
}
