use crate::prelude::{PointFields, RawReading};

/// Offset between the tilt axis and the sensor origin used by the scanning head.
pub const DEFAULT_WHEEL_BASE: f64 = 15.35;

fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    // Adding zero folds -0.0 into 0.0.
    scaled.round() / 100.0 + 0.0
}

/// Projects a tilt/pan/distance reading into Cartesian space, rounded to two decimals.
pub fn transform(inclination: f64, pan_angle: f64, distance: f64, wheel_base: f64) -> (f64, f64, f64) {
    let inc = inclination.to_radians();
    let pan = pan_angle.to_radians();

    let x = wheel_base * inc.cos() + distance * pan.cos() * inc.sin();
    let y = distance * pan.sin();
    let z = wheel_base * inc.sin() - distance * pan.cos() * inc.cos();

    (round2(x), round2(y), round2(z))
}

/// Applies [`transform`] with a fixed wheel base.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateTransformer {
    wheel_base: f64,
}

impl CoordinateTransformer {
    pub fn new(wheel_base: f64) -> Self {
        Self { wheel_base }
    }

    pub fn wheel_base(&self) -> f64 {
        self.wheel_base
    }

    pub fn project(&self, reading: &RawReading) -> PointFields {
        let (x, y, z) = transform(
            reading.inclination,
            reading.pan_angle,
            reading.distance,
            self.wheel_base,
        );
        PointFields {
            intensity: reading.intensity,
            x,
            y,
            z,
        }
    }
}

impl Default for CoordinateTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_WHEEL_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_head_points_straight_down_the_axis() {
        assert_eq!(transform(0.0, 0.0, 100.0, 15.35), (15.35, 0.0, -100.0));
    }

    #[test]
    fn quarter_pan_moves_distance_into_y() {
        let (x, y, z) = transform(0.0, 90.0, 50.0, 15.35);
        assert_eq!((x, y, z), (15.35, 50.0, 0.0));
    }

    #[test]
    fn vertical_tilt_swaps_axes() {
        let (x, y, z) = transform(90.0, 0.0, 10.0, 2.0);
        assert_eq!((x, y, z), (10.0, 0.0, 2.0));
    }

    #[test]
    fn results_are_rounded_to_two_decimals() {
        let (x, y, _) = transform(30.0, 45.0, 12.345, 1.0);
        assert_eq!(x, (x * 100.0).round() / 100.0);
        assert_eq!(y, 8.73);
    }

    #[test]
    fn huge_distances_stay_finite() {
        let (x, y, z) = transform(0.0, 0.0, 1e307, 15.35);
        assert_eq!((x, y, z), (15.35, 0.0, -1e307));

        let projected = CoordinateTransformer::default().project(&RawReading {
            inclination: 45.0,
            pan_angle: 10.0,
            distance: f64::MAX,
            intensity: 1.0,
        });
        assert!(projected.is_finite());
    }

    #[test]
    fn non_finite_fields_are_detected() {
        let fields = PointFields {
            intensity: 1.0,
            x: 0.0,
            y: f64::NEG_INFINITY,
            z: 0.0,
        };
        assert!(!fields.is_finite());
    }

    #[test]
    fn projection_is_deterministic_and_keeps_intensity() {
        let transformer = CoordinateTransformer::default();
        let reading = RawReading {
            inclination: 12.5,
            pan_angle: 33.0,
            distance: 240.0,
            intensity: 88.0,
        };
        let first = transformer.project(&reading);
        assert_eq!(first, transformer.project(&reading));
        assert_eq!(first.intensity, 88.0);
    }
}
