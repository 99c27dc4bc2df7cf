use crate::error::RelayError;

/// `led_id` value that blanks the whole strip.
pub const CLEAR_ALL: i32 = -1;

/// Size of an encoded [`WireMessage`]: a 32-bit `led_id`, three colour bytes
/// and one byte of trailing padding, matching the natural alignment of the
/// struct the boards exchange.
pub const WIRE_MESSAGE_SIZE: usize = 8;

/// One LED update as carried over the radio link.
///
/// `led_id` is a 0-based pixel index on the receiving strip, or [`CLEAR_ALL`].
/// Layout is little-endian:
///
/// ```text
/// offset 0..4  led_id (i32 LE)
/// offset 4     r
/// offset 5     g
/// offset 6     b
/// offset 7     padding, written as 0, ignored on decode
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireMessage {
    pub led_id: i32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl WireMessage {
    pub fn new(led_id: i32, r: u8, g: u8, b: u8) -> Self {
        WireMessage { led_id, r, g, b }
    }

    /// Message that turns every pixel off.
    #[cfg(test)]
    pub fn clear_all() -> Self {
        WireMessage::new(CLEAR_ALL, 0, 0, 0)
    }

    pub fn is_clear_all(&self) -> bool {
        self.led_id == CLEAR_ALL
    }

    pub fn encode(&self) -> [u8; WIRE_MESSAGE_SIZE] {
        let mut buf = [0u8; WIRE_MESSAGE_SIZE];
        buf[..4].copy_from_slice(&self.led_id.to_le_bytes());
        buf[4] = self.r;
        buf[5] = self.g;
        buf[6] = self.b;
        buf
    }

    /// Decode a received payload. Anything that is not exactly
    /// [`WIRE_MESSAGE_SIZE`] bytes long is rejected.
    pub fn decode(data: &[u8]) -> Result<Self, RelayError> {
        if data.len() != WIRE_MESSAGE_SIZE {
            return Err(RelayError::MalformedMessage {
                expected: WIRE_MESSAGE_SIZE,
                actual: data.len(),
            });
        }

        let led_id = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        Ok(WireMessage::new(led_id, data[4], data[5], data[6]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let msg = WireMessage::new(66, 255, 128, 1);
        assert_eq!(msg.encode(), [66, 0, 0, 0, 255, 128, 1, 0]);
    }

    #[test]
    fn test_clear_all_layout() {
        let msg = WireMessage::clear_all();
        assert!(msg.is_clear_all());
        assert_eq!(msg.encode(), [0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
    }

    #[test]
    fn test_round_trip_keeps_fields() {
        let msg = WireMessage::new(80, 10, 20, 30);
        let decoded = WireMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_padding_ignored() {
        let decoded = WireMessage::decode(&[5, 0, 0, 0, 1, 2, 3, 0xaa]).unwrap();
        assert_eq!(decoded, WireMessage::new(5, 1, 2, 3));
    }

    #[test]
    fn test_wrong_length_rejected() {
        for len in [0, 4, 7, 9, 250] {
            let data = vec![0u8; len];
            assert_eq!(
                WireMessage::decode(&data),
                Err(RelayError::MalformedMessage { expected: 8, actual: len })
            );
        }
    }
}
