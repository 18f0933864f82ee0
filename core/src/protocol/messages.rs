use crate::prelude::{Point, PointFields, ScanResult};
use crate::protocol::frame::{FIELD_SEPARATOR, GROUP_SEPARATOR};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client role that subscribes to point-cloud updates.
pub const OBSERVER_CLIENT: &str = "web";

/// Control objects understood from observers, keyed by their `type` discriminator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Register { client: String },
    ClearScan,
}

/// Classification of one inbound text message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage<'a> {
    Control(ControlMessage),
    /// A structured object without a handled `type`.
    Unhandled(Value),
    /// Delimiter-bearing producer report.
    Frame(&'a str),
    Unknown,
}

impl<'a> InboundMessage<'a> {
    pub fn classify(text: &'a str) -> Self {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
            return match ControlMessage::deserialize(&value) {
                Ok(control) => InboundMessage::Control(control),
                Err(_) => InboundMessage::Unhandled(value),
            };
        }

        if text.contains(FIELD_SEPARATOR) || text.contains(GROUP_SEPARATOR) {
            InboundMessage::Frame(text)
        } else {
            InboundMessage::Unknown
        }
    }
}

/// Point shape sent to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WirePoint {
    pub intensity: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<&Point> for WirePoint {
    fn from(point: &Point) -> Self {
        let PointFields { intensity, x, y, z } = point.fields();
        Self { intensity, x, y, z }
    }
}

/// Structured events sent from the relay to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    InitialState { data: Vec<WirePoint> },
    NewPoints { data: Vec<WirePoint> },
    ClearResponse { success: bool },
    ScanCleared { data: Vec<WirePoint> },
}

impl ServerMessage {
    pub fn initial_state(points: &[Point]) -> Self {
        ServerMessage::InitialState {
            data: points.iter().map(WirePoint::from).collect(),
        }
    }

    pub fn new_points(points: &[Point]) -> Self {
        ServerMessage::NewPoints {
            data: points.iter().map(WirePoint::from).collect(),
        }
    }

    pub fn scan_cleared() -> Self {
        ServerMessage::ScanCleared { data: Vec::new() }
    }

    pub fn to_text(&self) -> ScanResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Plain-text notices replied to the sender of a message that could not be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorNotice {
    ParseFailed,
    UnknownFormat,
    Other(String),
}

impl ErrorNotice {
    pub fn to_text(&self) -> String {
        match self {
            ErrorNotice::ParseFailed => "ERROR:PARSE_FAILED".to_string(),
            ErrorNotice::UnknownFormat => "ERROR:UNKNOWN_FORMAT".to_string(),
            ErrorNotice::Other(description) => format!("ERROR:{}", description),
        }
    }
}
