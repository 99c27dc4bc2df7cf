use log::{debug, info, warn};
use std::fmt;

use crate::command::parse_addressed;
use crate::error::RelayError;
use crate::message::WireMessage;
use crate::radio::Radio;
use crate::routing::{RadioAddress, RoutingTable};

/// A command that was handed to the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub box_id: i32,
    pub address: RadioAddress,
    pub message: WireMessage,
}

impl fmt::Display for Dispatched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.message;
        write!(
            f,
            "box {} ({}) led {} rgb({},{},{})",
            self.box_id, self.address, m.led_id, m.r, m.g, m.b
        )
    }
}

/// Relays operator lines to boxes: parse, resolve, encode, send.
///
/// Each line is sent at most once; nothing is queued or retried.
pub struct Dispatcher<R: Radio> {
    routes: RoutingTable,
    radio: R,
}

impl<R: Radio> Dispatcher<R> {
    pub fn new(routes: RoutingTable, radio: R) -> Self {
        Dispatcher { routes, radio }
    }

    #[cfg(test)]
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Register every box with the radio. Returns how many succeeded.
    pub fn register_peers(&mut self) -> usize {
        let mut registered = 0;

        for (box_id, address) in self.routes.entries() {
            match self.radio.add_peer(address) {
                Ok(()) => {
                    info!("✓ Added peer: box {} ({})", box_id, address);
                    registered += 1;
                }
                Err(e) => warn!("✗ Failed to add peer for box {}: {}", box_id, e),
            }
        }

        registered
    }

    /// Relay one line. `Ok(None)` means the line was blank.
    pub fn dispatch(&self, line: &str) -> Result<Option<Dispatched>, RelayError> {
        let Some(command) = parse_addressed(line)? else {
            return Ok(None);
        };

        let address = self.routes.resolve(command.box_id)?;
        let color = command.color;
        let message = WireMessage::new(command.led_id, color.r, color.g, color.b);

        debug!(
            "Forwarding to box {} ({}): LED {}, RGB ({},{},{})",
            command.box_id, address, message.led_id, message.r, message.g, message.b
        );
        self.radio.send(address, &message.encode())?;

        Ok(Some(Dispatched {
            box_id: command.box_id,
            address,
            message,
        }))
    }
}
