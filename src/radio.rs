use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::RadioConfig;
use crate::error::RelayError;
use crate::routing::RadioAddress;

/// Channel byte plus the sender's address in front of every payload.
const HEADER_LEN: usize = 7;

/// Largest payload one radio frame can carry.
pub const MAX_PAYLOAD: usize = 250;

/// How often the receiver thread checks the running flag.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Unacknowledged unicast radio link.
pub trait Radio {
    /// Register a peer before sending to it.
    fn add_peer(&mut self, address: RadioAddress) -> Result<(), RelayError>;

    /// Fire-and-forget send of one payload.
    fn send(&self, address: RadioAddress, payload: &[u8]) -> Result<(), RelayError>;
}

/// A payload as it arrived, with the address it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub source: RadioAddress,
    pub payload: Vec<u8>,
}

/// Radio link emulated over UDP: every node owns a socket and a static map
/// from radio address to socket address. Only nodes tuned to the same
/// channel hear each other.
pub struct UdpRadio {
    socket: UdpSocket,
    address: RadioAddress,
    channel: u8,
    routes: BTreeMap<RadioAddress, SocketAddr>,
    peers: BTreeSet<RadioAddress>,
}

impl UdpRadio {
    pub fn bind(config: &RadioConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.bind)
            .context(format!("Failed to bind radio socket to {}", config.bind))?;

        info!(
            "✓ Radio up on {} (address {}, channel {})",
            socket.local_addr()?,
            config.address,
            config.channel
        );

        Ok(UdpRadio {
            socket,
            address: config.address,
            channel: config.channel,
            routes: config.peers.clone(),
            peers: BTreeSet::new(),
        })
    }

    pub fn address(&self) -> RadioAddress {
        self.address
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Spawn the receiver thread. Frames for this channel are pushed onto the
    /// returned queue in arrival order until `running` is cleared.
    pub fn start_receiver(&self, running: Arc<AtomicBool>) -> Result<Receiver<ReceivedFrame>> {
        let socket = self
            .socket
            .try_clone()
            .context("Failed to clone radio socket")?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .context("Failed to set radio read timeout")?;

        let channel = self.channel;
        let (sender, receiver) = mpsc::channel();

        thread::spawn(move || {
            let mut buf = [0u8; HEADER_LEN + MAX_PAYLOAD];

            while running.load(Ordering::Relaxed) {
                let (n, from) = match socket.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                        continue;
                    }
                    Err(e) => {
                        error!("✗ Radio receive failed: {}", e);
                        thread::sleep(RECV_TIMEOUT);
                        continue;
                    }
                };

                trace!("Datagram of {} bytes from {}", n, from);
                let Some(frame) = decode_datagram(channel, &buf[..n]) else {
                    continue;
                };

                if sender.send(frame).is_err() {
                    // Consumer is gone
                    break;
                }
            }

            debug!("Radio receiver stopped");
        });

        Ok(receiver)
    }
}

impl Radio for UdpRadio {
    fn add_peer(&mut self, address: RadioAddress) -> Result<(), RelayError> {
        if !self.routes.contains_key(&address) {
            return Err(RelayError::TransportFailure {
                address,
                reason: "no socket address configured for peer".to_string(),
            });
        }

        self.peers.insert(address);
        Ok(())
    }

    fn send(&self, address: RadioAddress, payload: &[u8]) -> Result<(), RelayError> {
        let failure = |reason: String| RelayError::TransportFailure { address, reason };

        if !self.peers.contains(&address) {
            return Err(failure("peer not registered".to_string()));
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(failure(format!("payload of {} bytes too large", payload.len())));
        }

        let target = self.routes[&address];
        let datagram = encode_datagram(self.channel, self.address, payload);
        self.socket
            .send_to(&datagram, target)
            .map_err(|e| failure(e.to_string()))?;

        trace!("Sent {} bytes to {} ({})", payload.len(), address, target);
        Ok(())
    }
}

fn encode_datagram(channel: u8, source: RadioAddress, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
    datagram.push(channel);
    datagram.extend_from_slice(&source.0);
    datagram.extend_from_slice(payload);
    datagram
}

fn decode_datagram(channel: u8, data: &[u8]) -> Option<ReceivedFrame> {
    if data.len() < HEADER_LEN {
        warn!("Dropping runt datagram of {} bytes", data.len());
        return None;
    }
    if data[0] != channel {
        debug!("Dropping datagram on channel {} (listening on {})", data[0], channel);
        return None;
    }

    let mut source = [0u8; 6];
    source.copy_from_slice(&data[1..HEADER_LEN]);
    Some(ReceivedFrame {
        source: RadioAddress(source),
        payload: data[HEADER_LEN..].to_vec(),
    })
}
