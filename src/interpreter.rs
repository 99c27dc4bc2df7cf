use log::{debug, error, trace, warn};
use smart_leds::RGB8;
use std::fmt;

use crate::command::LocalCommand;
use crate::error::RelayError;
use crate::message::WireMessage;
use crate::strip::LedStrip;

const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterState {
    Idle,
    Applying,
}

/// What an accepted update did to the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Cleared,
    Lit { index: usize, color: RGB8 },
    Filled(RGB8),
    Set { index: usize, color: RGB8 },
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Applied::Cleared => write!(f, "cleared"),
            Applied::Lit { index, color } => {
                write!(f, "led {} only rgb({},{},{})", index, color.r, color.g, color.b)
            }
            Applied::Filled(color) => write!(f, "fill rgb({},{},{})", color.r, color.g, color.b),
            Applied::Set { index, color } => {
                write!(f, "led {} rgb({},{},{})", index, color.r, color.g, color.b)
            }
        }
    }
}

/// Owns the LED buffer of a node and turns messages into latched frames.
///
/// Only one caller may drive an interpreter; nodes feed it from a single
/// loop, so the buffer needs no locking.
pub struct Interpreter<S: LedStrip> {
    buffer: Vec<RGB8>,
    strip: S,
    state: InterpreterState,
}

impl<S: LedStrip> Interpreter<S> {
    /// Create the buffer all black and latch it once so the strip starts dark.
    pub fn new(led_count: usize, brightness: u8, mut strip: S) -> Self {
        strip.set_global_brightness(brightness);
        let mut interpreter = Interpreter {
            buffer: vec![BLACK; led_count],
            strip,
            state: InterpreterState::Idle,
        };
        interpreter.latch();
        interpreter
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &[RGB8] {
        &self.buffer
    }

    #[cfg(test)]
    pub fn state(&self) -> InterpreterState {
        self.state
    }

    #[cfg(test)]
    pub fn strip(&self) -> &S {
        &self.strip
    }

    pub fn strip_mut(&mut self) -> &mut S {
        &mut self.strip
    }

    /// Apply a raw radio payload.
    pub fn apply_bytes(&mut self, data: &[u8]) -> Result<Applied, RelayError> {
        let message = WireMessage::decode(data).map_err(|e| {
            warn!("Rejected frame: {}", e);
            e
        })?;
        self.apply(&message)
    }

    /// Apply a decoded message: the sentinel blanks the strip, a valid index
    /// lights that pixel alone, anything else is rejected untouched.
    pub fn apply(&mut self, message: &WireMessage) -> Result<Applied, RelayError> {
        debug!(
            "Received command: LED {}, color ({}, {}, {})",
            message.led_id, message.r, message.g, message.b
        );

        if message.is_clear_all() {
            return Ok(self.update(|buffer| {
                buffer.fill(BLACK);
                Applied::Cleared
            }));
        }

        let index = self.index(message.led_id)?;
        let color = RGB8::new(message.r, message.g, message.b);
        Ok(self.update(|buffer| {
            buffer.fill(BLACK);
            buffer[index] = color;
            Applied::Lit { index, color }
        }))
    }

    /// Apply a command typed at a standalone node. Unlike radio updates,
    /// `Set` leaves the other pixels as they are.
    pub fn apply_local(&mut self, command: &LocalCommand) -> Result<Applied, RelayError> {
        match *command {
            LocalCommand::Clear => Ok(self.update(|buffer| {
                buffer.fill(BLACK);
                Applied::Cleared
            })),
            LocalCommand::Fill(color) => Ok(self.update(|buffer| {
                buffer.fill(color);
                Applied::Filled(color)
            })),
            LocalCommand::Set { index, color } => {
                let index = self.index(index)?;
                Ok(self.update(|buffer| {
                    buffer[index] = color;
                    Applied::Set { index, color }
                }))
            }
        }
    }

    /// Blank the buffer and latch, used on shutdown.
    pub fn blank(&mut self) {
        self.update(|buffer| buffer.fill(BLACK));
    }

    fn index(&self, led_id: i32) -> Result<usize, RelayError> {
        match usize::try_from(led_id) {
            Ok(index) if index < self.buffer.len() => Ok(index),
            _ => {
                let err = RelayError::OutOfRangePixel {
                    led_id,
                    led_count: self.buffer.len(),
                };
                warn!("Ignoring command: {}", err);
                Err(err)
            }
        }
    }

    fn update<T>(&mut self, mutate: impl FnOnce(&mut [RGB8]) -> T) -> T {
        self.state = InterpreterState::Applying;
        let result = mutate(&mut self.buffer);
        self.latch();
        self.state = InterpreterState::Idle;
        result
    }

    fn latch(&mut self) {
        trace!("Latching {} pixels ({:?})", self.buffer.len(), self.state);
        if let Err(e) = self.strip.latch(&self.buffer) {
            error!("✗ Failed to latch strip: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strip::tests::RecordingStrip;

    fn interpreter(led_count: usize) -> Interpreter<RecordingStrip> {
        let mut interpreter = Interpreter::new(led_count, 96, RecordingStrip::default());
        interpreter.strip_mut().frames.clear();
        interpreter
    }

    fn lit(interpreter: &Interpreter<RecordingStrip>) -> Vec<usize> {
        interpreter
            .pixels()
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != BLACK)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_startup_latches_black() {
        let interpreter = Interpreter::new(81, 96, RecordingStrip::default());
        assert_eq!(interpreter.strip().brightness, Some(96));
        assert_eq!(interpreter.strip().frames, vec![vec![BLACK; 81]]);
        assert_eq!(interpreter.state(), InterpreterState::Idle);
    }

    #[test]
    fn test_clear_all_sentinel() {
        let mut interpreter = interpreter(10);
        interpreter.apply(&WireMessage::new(3, 1, 2, 3)).unwrap();
        interpreter.strip_mut().frames.clear();

        let applied = interpreter.apply(&WireMessage::clear_all()).unwrap();
        assert_eq!(applied, Applied::Cleared);
        assert!(interpreter.pixels().iter().all(|c| *c == BLACK));
        assert_eq!(interpreter.strip().frames.len(), 1);
    }

    #[test]
    fn test_valid_index_lights_only_that_pixel() {
        let mut interpreter = interpreter(81);
        interpreter.apply(&WireMessage::new(66, 255, 0, 0)).unwrap();
        assert_eq!(lit(&interpreter), vec![66]);
        assert_eq!(interpreter.pixels()[66], RGB8::new(255, 0, 0));
        assert_eq!(interpreter.strip().frames.len(), 1);

        interpreter.apply(&WireMessage::new(0, 0, 0, 9)).unwrap();
        assert_eq!(lit(&interpreter), vec![0]);
        assert_eq!(interpreter.strip().frames.len(), 2);

        interpreter.apply(&WireMessage::new(80, 1, 1, 1)).unwrap();
        assert_eq!(lit(&interpreter), vec![80]);
        assert_eq!(interpreter.state(), InterpreterState::Idle);
    }

    #[test]
    fn test_out_of_range_is_noop() {
        let mut interpreter = interpreter(81);
        interpreter.apply(&WireMessage::new(5, 9, 9, 9)).unwrap();
        interpreter.strip_mut().frames.clear();
        let before = interpreter.pixels().to_vec();

        for led_id in [81, 1000, -2, i32::MIN] {
            assert_eq!(
                interpreter.apply(&WireMessage::new(led_id, 1, 2, 3)),
                Err(RelayError::OutOfRangePixel { led_id, led_count: 81 })
            );
        }

        assert_eq!(interpreter.pixels(), &before[..]);
        assert!(interpreter.strip().frames.is_empty());
    }

    #[test]
    fn test_malformed_bytes_are_noop() {
        let mut interpreter = interpreter(8);
        assert!(matches!(
            interpreter.apply_bytes(&[1, 0, 0, 0, 255, 255, 255]),
            Err(RelayError::MalformedMessage { expected: 8, actual: 7 })
        ));
        assert!(interpreter.strip().frames.is_empty());
        assert!(interpreter.pixels().iter().all(|c| *c == BLACK));
    }

    #[test]
    fn test_apply_bytes_round_trip() {
        let mut interpreter = interpreter(8);
        let bytes = WireMessage::new(2, 10, 20, 30).encode();
        assert_eq!(
            interpreter.apply_bytes(&bytes),
            Ok(Applied::Lit { index: 2, color: RGB8::new(10, 20, 30) })
        );
    }

    #[test]
    fn test_latch_failure_keeps_running() {
        let mut interpreter = interpreter(4);
        interpreter.strip_mut().fail = true;
        assert!(interpreter.apply(&WireMessage::new(1, 1, 1, 1)).is_ok());
        assert_eq!(interpreter.state(), InterpreterState::Idle);
        interpreter.strip_mut().fail = false;
        interpreter.apply(&WireMessage::new(2, 1, 1, 1)).unwrap();
        assert_eq!(lit(&interpreter), vec![2]);
    }

    #[test]
    fn test_local_commands() {
        let mut interpreter = interpreter(4);
        let red = RGB8::new(255, 0, 0);
        let blue = RGB8::new(0, 0, 255);

        interpreter.apply_local(&LocalCommand::Fill(red)).unwrap();
        assert!(interpreter.pixels().iter().all(|c| *c == red));

        interpreter
            .apply_local(&LocalCommand::Set { index: 1, color: blue })
            .unwrap();
        assert_eq!(interpreter.pixels(), &[red, blue, red, red]);

        assert!(interpreter
            .apply_local(&LocalCommand::Set { index: 4, color: blue })
            .is_err());

        interpreter.apply_local(&LocalCommand::Clear).unwrap();
        assert!(interpreter.pixels().iter().all(|c| *c == BLACK));
        assert_eq!(interpreter.strip().frames.len(), 3);
    }
}
