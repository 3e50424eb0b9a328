// Scalar interpolation helpers

/// Linear interpolation from `a` to `b` by `t`
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Where `value` sits between `a` and `b` (0 at `a`, 1 at `b`, unclamped)
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    (value - a) / (b - a)
}

/// Map `value` from the input range onto the output range
pub fn remap(in_min: f32, in_max: f32, out_min: f32, out_max: f32, value: f32) -> f32 {
    let t = inverse_lerp(in_min, in_max, value);
    lerp(out_min, out_max, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints_and_midpoint() {
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
    }

    #[test]
    fn inverse_lerp_is_unclamped() {
        assert_eq!(inverse_lerp(0.0, 255.0, 255.0), 1.0);
        assert_eq!(inverse_lerp(0.0, 10.0, 20.0), 2.0);
        assert_eq!(inverse_lerp(0.0, 10.0, -5.0), -0.5);
    }

    #[test]
    fn remap_between_ranges() {
        assert_eq!(remap(0.0, 1.0, -1.0, 1.0, 0.5), 0.0);
        assert_eq!(remap(0.0, 255.0, 0.0, 1.0, 0.0), 0.0);
        assert!((remap(-1.0, 1.0, 0.0, 100.0, 0.5) - 75.0).abs() < 1e-5);
    }
}
