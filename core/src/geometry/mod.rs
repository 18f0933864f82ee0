pub mod transform;

pub use transform::{transform, CoordinateTransformer, DEFAULT_WHEEL_BASE};
