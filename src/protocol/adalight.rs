use super::header;

const MAGIC: &[u8; 3] = b"Ada";

pub(super) fn build_frame(pixel_data: &[u8], led_count: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(6 + pixel_data.len());
    frame.extend_from_slice(&header(MAGIC, led_count as u16));
    frame.extend_from_slice(pixel_data);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adalight_header() {
        let frame = build_frame(&[1, 2, 3, 4, 5, 6], 2);
        assert_eq!(&frame[..6], &[b'A', b'd', b'a', 0, 2, 0x57]);
        assert_eq!(&frame[6..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_adalight_wide_count() {
        let data = vec![0u8; 300 * 3];
        let frame = build_frame(&data, 300);
        assert_eq!(&frame[3..6], &[0x01, 0x2c, 0x01 ^ 0x2c ^ 0x55]);
        assert_eq!(frame.len(), 6 + 900);
    }
}
