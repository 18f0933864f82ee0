pub mod sweep;

pub use sweep::{build_sweep_frames, SweepConfig};
