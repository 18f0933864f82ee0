use crate::prelude::{RawReading, ScanError, ScanResult};

pub const GROUP_SEPARATOR: char = '|';
pub const FIELD_SEPARATOR: char = ';';

/// Result of tokenizing one field of a group.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Value(f64),
    Skip,
}

impl Field {
    fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Field::Value(value),
            _ => Field::Skip,
        }
    }

    fn value(self) -> Option<f64> {
        match self {
            Field::Value(value) => Some(value),
            Field::Skip => None,
        }
    }
}

/// Readings decoded from one producer message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFrame {
    pub readings: Vec<RawReading>,
    /// Inclination announced by a trailing marker and still in effect when the message ended.
    pub pending_inclination: Option<f64>,
    /// Triples discarded because a field was not numeric or no inclination was known.
    pub dropped_triples: usize,
}

impl DecodedFrame {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Decoder for the producer text protocol: `group ("|" group)*`, `group = field (";" field)*`.
///
/// The leading field of the first group sets the initial inclination. In every
/// later group whose field count is congruent to 1 modulo 3, the last field is
/// the inclination for the triples that follow it. All remaining fields are read
/// as `(distance, intensity, pan_angle)` triples.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, message: &str) -> ScanResult<DecodedFrame> {
        self.decode_with(message, None)
    }

    /// Like [`FrameDecoder::decode`], but falls back to `carried` when the
    /// leading field is not numeric.
    pub fn decode_with(&self, message: &str, carried: Option<f64>) -> ScanResult<DecodedFrame> {
        if !message.contains(FIELD_SEPARATOR) {
            return Err(ScanError::MissingFieldSeparator);
        }

        let mut frame = DecodedFrame::default();
        let mut inclination: Option<f64> = None;
        let mut leading = true;

        let groups = message
            .split(GROUP_SEPARATOR)
            .map(str::trim)
            .filter(|group| !group.is_empty());

        for group in groups {
            let mut fields: Vec<Field> = group.split(FIELD_SEPARATOR).map(Field::parse).collect();
            let mut marker = None;

            if leading {
                leading = false;
                inclination = fields.remove(0).value().or(carried);
            } else if fields.len() % 3 == 1 {
                marker = fields.pop();
            }

            for triple in fields.chunks(3) {
                match (triple, inclination) {
                    (
                        &[Field::Value(distance), Field::Value(intensity), Field::Value(pan_angle)],
                        Some(inclination),
                    ) => {
                        frame.readings.push(RawReading {
                            inclination,
                            pan_angle,
                            distance,
                            intensity,
                        });
                        frame.pending_inclination = None;
                    }
                    _ => frame.dropped_triples += 1,
                }
            }

            if let Some(next) = marker.and_then(Field::value) {
                inclination = Some(next);
                frame.pending_inclination = Some(next);
            }
        }

        Ok(frame)
    }
}
