use super::header;

const MAGIC: &[u8; 3] = b"Awa";

/// Running checksums appended after the pixel data.
#[derive(Default)]
struct Fletcher {
    sum1: u32,
    sum2: u32,
    ext: u32,
}

impl Fletcher {
    fn feed(&mut self, position: usize, byte: u8) {
        self.sum1 = (self.sum1 + byte as u32) % 255;
        self.sum2 = (self.sum2 + self.sum1) % 255;
        self.ext = (self.ext + (byte as u32 ^ position as u16 as u32)) % 255;
    }

    fn finish(self) -> [u8; 3] {
        // 'A' would be mistaken for the start of the next header
        let ext = if self.ext == 0x41 { 0xaa } else { self.ext };
        [self.sum1 as u8, self.sum2 as u8, ext as u8]
    }
}

/// AWA counts pixels minus one in its header.
pub(super) fn build_frame(pixel_data: &[u8], led_count: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(6 + pixel_data.len() + 3);
    frame.extend_from_slice(&header(MAGIC, led_count.saturating_sub(1) as u16));
    frame.extend_from_slice(pixel_data);

    let mut fletcher = Fletcher::default();
    for (position, &byte) in pixel_data.iter().enumerate() {
        fletcher.feed(position, byte);
    }
    frame.extend_from_slice(&fletcher.finish());

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_awa_header_counts_from_zero() {
        let frame = build_frame(&[0, 0, 0], 1);
        assert_eq!(&frame[..6], &[b'A', b'w', b'a', 0, 0, 0x55]);
        assert_eq!(frame.len(), 6 + 3 + 3);
    }

    #[test]
    fn test_awa_checksums() {
        let frame = build_frame(&[1, 2, 3], 1);
        // sum1: 1, 3, 6; sum2: 1, 4, 10; ext: 1^0 + 2^1 + 3^2 = 1 + 3 + 1
        assert_eq!(&frame[9..], &[6, 10, 5]);
    }

    #[test]
    fn test_awa_empty_frame() {
        let frame = build_frame(&[], 0);
        assert_eq!(frame.len(), 9);
    }
}
