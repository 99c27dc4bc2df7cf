use smart_leds::RGB8;

use crate::error::RelayError;

const BOX_ID_KEY: &str = "box_id:";
const LED_ID_KEY: &str = "led_id:";

/// Colour used when the keyed master form leaves it out.
pub const DEFAULT_COLOR: RGB8 = RGB8 { r: 255, g: 255, b: 255 };

/// Command accepted by the master: light `led_id` on box `box_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressedCommand {
    pub box_id: i32,
    pub led_id: i32,
    pub color: RGB8,
}

/// Command accepted by a standalone node driving its own strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    Clear,
    Fill(RGB8),
    Set { index: i32, color: RGB8 },
}

/// Parse one line in the master grammar.
///
/// Accepts `box_id:<n>,led_id:<n>` (keys in any order, colour defaults to
/// white) or positional `box_id,led_id,r,g,b`. `Ok(None)` means the line was
/// blank.
pub fn parse_addressed(line: &str) -> Result<Option<AddressedCommand>, RelayError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let (Some(box_id), Some(led_id)) = (
        keyed_value(line, BOX_ID_KEY),
        keyed_value(line, LED_ID_KEY),
    ) {
        return Ok(Some(AddressedCommand {
            box_id,
            led_id,
            color: DEFAULT_COLOR,
        }));
    }

    match positional::<5>(line) {
        Some([box_id, led_id, r, g, b]) => Ok(Some(AddressedCommand {
            box_id,
            led_id,
            color: channels(r, g, b),
        })),
        None => Err(RelayError::InvalidFormat(line.to_string())),
    }
}

/// Parse one line in the standalone grammar: `clear`, `fill,r,g,b` or
/// `index,r,g,b`.
pub fn parse_local(line: &str) -> Result<Option<LocalCommand>, RelayError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if line.eq_ignore_ascii_case("clear") {
        return Ok(Some(LocalCommand::Clear));
    }

    if let Some((head, rest)) = line.split_once(',') {
        if head.trim().eq_ignore_ascii_case("fill") {
            return match positional::<3>(rest) {
                Some([r, g, b]) => Ok(Some(LocalCommand::Fill(channels(r, g, b)))),
                None => Err(RelayError::InvalidFormat(line.to_string())),
            };
        }
    }

    match positional::<4>(line) {
        Some([index, r, g, b]) => Ok(Some(LocalCommand::Set {
            index,
            color: channels(r, g, b),
        })),
        None => Err(RelayError::InvalidFormat(line.to_string())),
    }
}

/// Value following `key`, read up to the next comma or end of line.
fn keyed_value(line: &str, key: &str) -> Option<i32> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let end = rest.find(',').unwrap_or(rest.len());
    Some(lenient_int(&rest[..end]))
}

/// Exactly `N` comma-separated fields, each starting with an integer.
fn positional<const N: usize>(text: &str) -> Option<[i32; N]> {
    let mut values = [0i32; N];
    let mut fields = text.split(',');

    for value in values.iter_mut() {
        *value = leading_int(fields.next()?)?;
    }

    if fields.next().is_some() {
        return None;
    }

    Some(values)
}

/// Channels keep the low 8 bits of the parsed value.
fn channels(r: i32, g: i32, b: i32) -> RGB8 {
    RGB8::new(r as u8, g as u8, b as u8)
}

/// Best-effort integer conversion: leading whitespace, an optional sign and
/// the digits that follow. Text without a numeric prefix yields 0; values past
/// the `i32` range saturate.
pub fn lenient_int(text: &str) -> i32 {
    leading_int(text).unwrap_or(0)
}

/// Like [`lenient_int`] but reports `None` when there is no numeric prefix.
pub fn leading_int(text: &str) -> Option<i32> {
    let s = text.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let run = digits.bytes().take_while(u8::is_ascii_digit).count();
    if run == 0 {
        return None;
    }

    let limit = i32::MAX as i64 + 1;
    let magnitude = digits[..run]
        .bytes()
        .fold(0i64, |acc, b| (acc * 10 + (b - b'0') as i64).min(limit));
    let value = if negative { -magnitude } else { magnitude };

    Some(value.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_defaults_to_white() {
        let cmd = parse_addressed("box_id:1,led_id:66").unwrap().unwrap();
        assert_eq!(
            cmd,
            AddressedCommand { box_id: 1, led_id: 66, color: RGB8::new(255, 255, 255) }
        );
    }

    #[test]
    fn test_keyed_order_independent() {
        let cmd = parse_addressed("led_id:3,box_id:2").unwrap().unwrap();
        assert_eq!((cmd.box_id, cmd.led_id), (2, 3));
    }

    #[test]
    fn test_keyed_lenient_values() {
        let cmd = parse_addressed("box_id:x,led_id:12abc").unwrap().unwrap();
        assert_eq!((cmd.box_id, cmd.led_id), (0, 12));
    }

    #[test]
    fn test_keyed_needs_both_keys() {
        assert!(matches!(
            parse_addressed("box_id:1"),
            Err(RelayError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_addressed("led_id:4"),
            Err(RelayError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_positional() {
        let cmd = parse_addressed("1,5,255,0,0").unwrap().unwrap();
        assert_eq!(
            cmd,
            AddressedCommand { box_id: 1, led_id: 5, color: RGB8::new(255, 0, 0) }
        );
    }

    #[test]
    fn test_positional_strips_whitespace_and_terminators() {
        let cmd = parse_addressed("  2, 7, 1, 2, 3\r\n").unwrap().unwrap();
        assert_eq!(
            cmd,
            AddressedCommand { box_id: 2, led_id: 7, color: RGB8::new(1, 2, 3) }
        );
    }

    #[test]
    fn test_positional_field_count() {
        assert!(parse_addressed("1,5,255,0").is_err());
        assert!(parse_addressed("1,5,255,0,0,9").is_err());
    }

    #[test]
    fn test_positional_channel_truncation() {
        let cmd = parse_addressed("1,0,256,300,-1").unwrap().unwrap();
        assert_eq!(cmd.color, RGB8::new(0, 44, 255));
    }

    #[test]
    fn test_invalid_line() {
        assert_eq!(
            parse_addressed("not,a,valid,line"),
            Err(RelayError::InvalidFormat("not,a,valid,line".to_string()))
        );
    }

    #[test]
    fn test_blank_lines_are_noops() {
        assert_eq!(parse_addressed(""), Ok(None));
        assert_eq!(parse_addressed("  \r\n"), Ok(None));
        assert_eq!(parse_local("\t"), Ok(None));
    }

    #[test]
    fn test_local_clear() {
        assert_eq!(parse_local("clear"), Ok(Some(LocalCommand::Clear)));
        assert_eq!(parse_local(" CLEAR \n"), Ok(Some(LocalCommand::Clear)));
    }

    #[test]
    fn test_local_fill() {
        assert_eq!(
            parse_local("fill,10,20,30"),
            Ok(Some(LocalCommand::Fill(RGB8::new(10, 20, 30))))
        );
        assert!(parse_local("fill,10,20").is_err());
    }

    #[test]
    fn test_local_set() {
        assert_eq!(
            parse_local("4,0,255,0"),
            Ok(Some(LocalCommand::Set { index: 4, color: RGB8::new(0, 255, 0) }))
        );
        assert!(parse_local("4,0,255").is_err());
        assert!(parse_local("not,a,valid,line").is_err());
    }

    #[test]
    fn test_lenient_int() {
        assert_eq!(lenient_int("12abc"), 12);
        assert_eq!(lenient_int("abc"), 0);
        assert_eq!(lenient_int("  -7"), -7);
        assert_eq!(lenient_int("+8"), 8);
        assert_eq!(lenient_int("-"), 0);
        assert_eq!(lenient_int(""), 0);
        assert_eq!(lenient_int("99999999999"), i32::MAX);
        assert_eq!(lenient_int("-99999999999"), i32::MIN);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int(" 5x"), Some(5));
        assert_eq!(leading_int("x5"), None);
        assert_eq!(leading_int(""), None);
    }
}
