use rand::{rngs::StdRng, Rng, SeedableRng};
use scancore::protocol::{FIELD_SEPARATOR, GROUP_SEPARATOR};
use serde::{Deserialize, Serialize};

/// Configuration for a synthetic pan/tilt sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub tilt_max: u32,
    pub tilt_step: u32,
    pub pan_max: u32,
    pub pan_step: u32,
    pub readings_per_frame: usize,
    pub base_distance: f64,
    pub noise: f64,
    pub seed: u64,
    pub interval_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            tilt_max: 135,
            tilt_step: 1,
            pan_max: 180,
            pan_step: 1,
            readings_per_frame: 12,
            base_distance: 120.0,
            noise: 2.0,
            seed: 0,
            interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SweepSample {
    tilt: u32,
    pan: u32,
    distance: f64,
    intensity: u32,
}

fn build_samples(config: &SweepConfig) -> Vec<SweepSample> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let tilt_step = config.tilt_step.max(1) as usize;
    let pan_step = config.pan_step.max(1) as usize;
    let mut samples = Vec::new();

    for (row, tilt) in (0..=config.tilt_max).step_by(tilt_step).enumerate() {
        let mut pans: Vec<u32> = (0..=config.pan_max).step_by(pan_step).collect();
        // Boustrophedon: every other row pans back.
        if row % 2 == 1 {
            pans.reverse();
        }
        for pan in pans {
            let shape = 1.0 + 0.3 * (2.0 * (pan as f64).to_radians()).sin();
            let jitter = if config.noise > 0.0 {
                rng.gen_range(-config.noise..config.noise)
            } else {
                0.0
            };
            samples.push(SweepSample {
                tilt,
                pan,
                distance: (config.base_distance * shape + jitter).max(0.0),
                intensity: rng.gen_range(40..=200),
            });
        }
    }

    samples
}

fn format_frame(samples: &[SweepSample]) -> Option<String> {
    let first = samples.first()?;
    let mut frame = first.tilt.to_string();
    let mut tilt = first.tilt;
    let mut group: Vec<String> = Vec::new();

    for sample in samples {
        if sample.tilt != tilt {
            group.push(sample.tilt.to_string());
            frame.push(GROUP_SEPARATOR);
            frame.push_str(&group.join(&FIELD_SEPARATOR.to_string()));
            group.clear();
            tilt = sample.tilt;
        }
        group.push(format!("{:.1}", sample.distance));
        group.push(sample.intensity.to_string());
        group.push(sample.pan.to_string());
    }
    frame.push(GROUP_SEPARATOR);
    frame.push_str(&group.join(&FIELD_SEPARATOR.to_string()));

    Some(frame)
}

/// Builds producer frames for a full sweep. A frame that crosses into a new
/// tilt row announces the new inclination as the trailing field of its group.
pub fn build_sweep_frames(config: &SweepConfig) -> Vec<String> {
    build_samples(config)
        .chunks(config.readings_per_frame.max(1))
        .filter_map(format_frame)
        .collect()
}
