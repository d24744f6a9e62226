//! Scripted camera descent towards the surface.

use glam::Vec3;

/// A straight-down descent along a fixed direction, with altitude falling
/// geometrically so each frame closes the same fraction of the distance.
#[derive(Clone, Debug)]
pub(crate) struct Approach {
    direction: Vec3,
    radius: f32,
    start_altitude: f32,
    end_altitude: f32,
    frames: u32,
}

impl Approach {
    pub(crate) fn new(radius: f32, start_altitude: f32, end_altitude: f32, frames: u32) -> Self {
        Self {
            direction: Vec3::new(0.3, 0.8, 0.52).normalize(),
            radius,
            start_altitude: start_altitude.max(f32::EPSILON),
            end_altitude: end_altitude.max(f32::EPSILON),
            frames: frames.max(1),
        }
    }

    pub(crate) fn frames(&self) -> u32 {
        self.frames
    }

    /// Altitude above the surface at `frame`.
    pub(crate) fn altitude(&self, frame: u32) -> f32 {
        if self.frames == 1 {
            return self.end_altitude;
        }
        let t = frame.min(self.frames - 1) as f32 / (self.frames - 1) as f32;
        self.start_altitude * (self.end_altitude / self.start_altitude).powf(t)
    }

    /// Viewer position at `frame`.
    pub(crate) fn viewer(&self, frame: u32) -> Vec3 {
        self.direction * (self.radius + self.altitude(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_altitude_endpoints() {
        let approach = Approach::new(100.0, 1000.0, 10.0, 5);
        assert!((approach.altitude(0) - 1000.0).abs() < 1e-2);
        assert!((approach.altitude(4) - 10.0).abs() < 1e-3);
        assert!((approach.altitude(2) - 100.0).abs() < 1e-2);
        assert!((approach.altitude(99) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_viewer_above_surface() {
        let approach = Approach::new(100.0, 50.0, 1.0, 3);
        for frame in 0..approach.frames() {
            let distance = approach.viewer(frame).length();
            assert!((distance - 100.0 - approach.altitude(frame)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_single_frame_uses_end_altitude() {
        let approach = Approach::new(100.0, 50.0, 2.0, 0);
        assert_eq!(approach.frames(), 1);
        assert_eq!(approach.altitude(0), 2.0);
    }
}
