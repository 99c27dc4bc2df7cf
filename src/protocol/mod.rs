use serde::{Deserialize, Serialize};

mod adalight;
mod awa;

/// Serial framing understood by the pixel controller behind a strip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameProtocol {
    /// Classic Adalight: `Ada` header with the pixel count
    #[default]
    Adalight,
    /// HyperSerial AWA: `Awa` header, Fletcher checksums after the data
    Awa,
}

impl FrameProtocol {
    /// Wrap already-ordered pixel bytes in a complete frame.
    pub fn build_frame(self, pixel_data: &[u8], stride: usize) -> Vec<u8> {
        let led_count = pixel_data.len() / stride.max(1);
        match self {
            FrameProtocol::Adalight => adalight::build_frame(pixel_data, led_count),
            FrameProtocol::Awa => awa::build_frame(pixel_data, led_count),
        }
    }
}

/// Three magic bytes, the 16-bit count big-endian, and the count checksum.
fn header(magic: &[u8; 3], count: u16) -> [u8; 6] {
    let [hi, lo] = count.to_be_bytes();
    [magic[0], magic[1], magic[2], hi, lo, hi ^ lo ^ 0x55]
}
