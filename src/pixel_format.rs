use serde::{Deserialize, Serialize};
use smart_leds::RGB8;

/// Channel order expected by the pixel controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixelFormat {
    #[default]
    Rgb,
    Grb,
    Bgr,
    Rgbw,
    Grbw,
}

impl PixelFormat {
    /// Bytes per pixel on the wire.
    pub fn stride(self) -> usize {
        match self {
            PixelFormat::Rgbw | PixelFormat::Grbw => 4,
            _ => 3,
        }
    }

    /// Flatten pixels into controller byte order.
    pub fn encode<I>(self, pixels: I) -> Vec<u8>
    where
        I: IntoIterator<Item = RGB8>,
    {
        let pixels = pixels.into_iter();
        let mut data = Vec::with_capacity(pixels.size_hint().0 * self.stride());

        for RGB8 { r, g, b } in pixels {
            match self {
                PixelFormat::Rgb => data.extend_from_slice(&[r, g, b]),
                PixelFormat::Grb => data.extend_from_slice(&[g, r, b]),
                PixelFormat::Bgr => data.extend_from_slice(&[b, g, r]),
                PixelFormat::Rgbw => {
                    // White carries the common part of the three channels
                    let w = r.min(g).min(b);
                    data.extend_from_slice(&[r - w, g - w, b - w, w]);
                }
                PixelFormat::Grbw => {
                    let w = r.min(g).min(b);
                    data.extend_from_slice(&[g - w, r - w, b - w, w]);
                }
            }
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };

    #[test]
    fn test_rgb_passthrough() {
        let pixels = [RED, RGB8::new(0, 255, 0), RGB8::new(0, 0, 255)];
        assert_eq!(
            PixelFormat::Rgb.encode(pixels),
            vec![255, 0, 0, 0, 255, 0, 0, 0, 255]
        );
    }

    #[test]
    fn test_grb_transform() {
        assert_eq!(PixelFormat::Grb.encode([RED]), vec![0, 255, 0]);
    }

    #[test]
    fn test_bgr_transform() {
        assert_eq!(PixelFormat::Bgr.encode([RED]), vec![0, 0, 255]);
    }

    #[test]
    fn test_rgbw_transform() {
        assert_eq!(
            PixelFormat::Rgbw.encode([RGB8::new(255, 255, 255)]),
            vec![0, 0, 0, 255]
        );
        assert_eq!(
            PixelFormat::Rgbw.encode([RGB8::new(255, 128, 128)]),
            vec![127, 0, 0, 128]
        );
    }

    #[test]
    fn test_grbw_transform() {
        assert_eq!(
            PixelFormat::Grbw.encode([RGB8::new(255, 255, 255)]),
            vec![0, 0, 0, 255]
        );
        assert_eq!(PixelFormat::Grbw.encode([RED]), vec![0, 255, 0, 0]);
    }

    #[test]
    fn test_format_names() {
        let format: PixelFormat = serde_json::from_str("\"GRBW\"").unwrap();
        assert_eq!(format, PixelFormat::Grbw);
        assert_eq!(format.stride(), 4);
        assert!(serde_json::from_str::<PixelFormat>("\"XYZ\"").is_err());
    }
}
