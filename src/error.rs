use thiserror::Error;

use crate::routing::RadioAddress;

/// Errors raised while relaying a command. None of these stop a node; the
/// offending line or frame is reported and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("invalid command format: {0:?}")]
    InvalidFormat(String),
    #[error("unknown box {box_id} (valid range: 1 to {num_boxes})")]
    UnknownBox { box_id: i32, num_boxes: usize },
    #[error("malformed message: expected {expected} bytes, got {actual}")]
    MalformedMessage { expected: usize, actual: usize },
    #[error("led {led_id} is out of range (strip has {led_count} leds)")]
    OutOfRangePixel { led_id: i32, led_count: usize },
    #[error("transport failure sending to {address}: {reason}")]
    TransportFailure { address: RadioAddress, reason: String },
}
