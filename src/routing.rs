use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::RelayError;

/// Six-byte physical radio address, written `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RadioAddress(pub [u8; 6]);

impl fmt::Display for RadioAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

impl FromStr for RadioAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');

        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("radio address {:?} has fewer than 6 octets", s))?;
            if part.len() != 2 {
                return Err(format!("bad octet {:?} in radio address {:?}", part, s));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| format!("bad octet {:?} in radio address {:?}", part, s))?;
        }

        if parts.next().is_some() {
            return Err(format!("radio address {:?} has more than 6 octets", s));
        }

        Ok(RadioAddress(bytes))
    }
}

impl Serialize for RadioAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RadioAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Static map from 1-based box id to the radio address of that box.
///
/// Box ids follow configuration order: the first address is box 1.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    boxes: Vec<RadioAddress>,
}

impl RoutingTable {
    pub fn new(boxes: Vec<RadioAddress>) -> Result<Self, String> {
        for (i, address) in boxes.iter().enumerate() {
            if let Some(j) = boxes[..i].iter().position(|other| other == address) {
                return Err(format!(
                    "boxes {} and {} share radio address {}",
                    j + 1,
                    i + 1,
                    address
                ));
            }
        }

        Ok(RoutingTable { boxes })
    }

    pub fn num_boxes(&self) -> usize {
        self.boxes.len()
    }

    pub fn resolve(&self, box_id: i32) -> Result<RadioAddress, RelayError> {
        let unknown = RelayError::UnknownBox {
            box_id,
            num_boxes: self.boxes.len(),
        };

        if box_id < 1 {
            return Err(unknown);
        }

        self.boxes
            .get(box_id as usize - 1)
            .copied()
            .ok_or(unknown)
    }

    /// `(box_id, address)` pairs in box order.
    pub fn entries(&self) -> impl Iterator<Item = (i32, RadioAddress)> + '_ {
        self.boxes
            .iter()
            .enumerate()
            .map(|(i, address)| (i as i32 + 1, *address))
    }
}
