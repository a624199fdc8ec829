// src/normalize.rs - Sensor space to display space
use nalgebra::Vector2;

use crate::config::DisplayConfig;
use crate::pose::JointSample;
use crate::sensor::RawPosition;

/// Maps a raw skeleton-space position to a display-space joint sample.
pub trait Normalizer {
    fn normalize(&self, raw: &RawPosition) -> JointSample;
}

impl<N: Normalizer + ?Sized> Normalizer for Box<N> {
    fn normalize(&self, raw: &RawPosition) -> JointSample {
        (**self).normalize(raw)
    }
}

/// Skeleton-to-depth-image projection scale at the 320x240 reference resolution.
const SKELETON_TO_DEPTH_MULTIPLIER: f64 = 285.63;
const REFERENCE_WIDTH: f64 = 320.0;
const REFERENCE_HEIGHT: f64 = 240.0;

/// Projects skeleton-space meters onto a display centred on the origin with y up.
///
/// With the default 480x360 display, x spans [-240, 240] and y spans [-180, 180].
/// `z` is converted from meters to millimeters, `w` passes through.
#[derive(Debug, Clone, Copy)]
pub struct DepthProjection {
    width: u32,
    height: u32,
}

impl DepthProjection {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(config.width, config.height)
    }

    /// Depth image coordinates (origin top-left) of a skeleton-space point.
    pub fn to_depth_image(&self, raw: &RawPosition) -> Vector2<f64> {
        if raw.z <= f64::from(f32::EPSILON) {
            return Vector2::zeros();
        }
        let scale = SKELETON_TO_DEPTH_MULTIPLIER / raw.z;
        let u = 0.5 + raw.x * scale / REFERENCE_WIDTH;
        let v = 0.5 - raw.y * scale / REFERENCE_HEIGHT;
        Vector2::new(u * f64::from(self.width), v * f64::from(self.height))
    }
}

impl Default for DepthProjection {
    fn default() -> Self {
        Self::from_config(&DisplayConfig::default())
    }
}

impl Normalizer for DepthProjection {
    fn normalize(&self, raw: &RawPosition) -> JointSample {
        let image = self.to_depth_image(raw);
        let half = Vector2::new(f64::from(self.width / 2), f64::from(self.height / 2));
        let centred = image - half;
        JointSample {
            x: centred.x,
            y: -centred.y,
            z: raw.z * 1000.0,
            w: raw.w,
        }
    }
}

/// Copies the raw components through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Normalizer for PassThrough {
    fn normalize(&self, raw: &RawPosition) -> JointSample {
        JointSample::new(raw.x, raw.y, raw.z, raw.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_point_on_axis_maps_to_origin() {
        let projection = DepthProjection::new(480, 360);
        let sample = projection.normalize(&RawPosition::new(0.0, 0.0, 2.0, 1.0));
        assert!(approx(sample.x, 0.0));
        assert!(approx(sample.y, 0.0));
        assert!(approx(sample.z, 2000.0));
        assert!(approx(sample.w, 1.0));
    }

    #[test]
    fn test_up_and_right_are_positive() {
        let projection = DepthProjection::new(480, 360);
        let sample = projection.normalize(&RawPosition::new(0.5, 0.5, 2.0, 1.0));
        // 0.5 * (285.63 / 2) / 320 * 480
        assert!(approx(sample.x, 0.5 * 285.63 / 2.0 / 320.0 * 480.0));
        assert!(approx(sample.y, 0.5 * 285.63 / 2.0 / 240.0 * 360.0));
    }

    #[test]
    fn test_zero_depth_is_guarded() {
        let projection = DepthProjection::new(480, 360);
        let image = projection.to_depth_image(&RawPosition::new(1.0, 1.0, 0.0, 0.0));
        assert_eq!(image, Vector2::zeros());
        let sample = projection.normalize(&RawPosition::new(1.0, 1.0, 0.0, 0.0));
        assert!(approx(sample.x, -240.0));
        assert!(approx(sample.y, 180.0));
        assert!(sample.x.is_finite() && sample.y.is_finite());
    }

    #[test]
    fn test_pass_through() {
        let sample = PassThrough.normalize(&RawPosition::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(sample, JointSample::new(1.0, 2.0, 3.0, 4.0));
    }
}
