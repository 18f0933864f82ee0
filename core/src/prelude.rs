use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One sensor-relative reading decoded from a producer frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub inclination: f64,
    pub pan_angle: f64,
    pub distance: f64,
    pub intensity: f64,
}

/// Cartesian fields of a point before the store assigns identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointFields {
    pub intensity: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PointFields {
    pub fn is_finite(&self) -> bool {
        [self.intensity, self.x, self.y, self.z]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// A stored point. Immutable once created; only a clear removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: Uuid,
    pub intensity: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub created_at: DateTime<Utc>,
}

impl Point {
    pub fn new(fields: PointFields) -> Self {
        Self {
            id: Uuid::new_v4(),
            intensity: fields.intensity,
            x: fields.x,
            y: fields.y,
            z: fields.z,
            created_at: Utc::now(),
        }
    }

    pub fn fields(&self) -> PointFields {
        PointFields {
            intensity: self.intensity,
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

/// Common error type for decoding, storage and delivery.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("unparsable frame: no field separator in message")]
    MissingFieldSeparator,
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("outbound channel closed")]
    ChannelClosed,
    #[error("observer outbox full")]
    OutboxFull,
    #[error("connection closed")]
    ConnectionClosed,
}

pub type ScanResult<T> = Result<T, ScanError>;
