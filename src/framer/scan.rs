//! Bracket span scanning over the pending byte buffer

use super::Frame;

/// Find the first minimal, non-nested `open ... close` span at or after
/// `from`. Returns the inclusive byte positions of both brackets.
///
/// A later `open` restarts the candidate span and a line feed abandons it,
/// so nested or unterminated brackets never match.
pub(super) fn find_span(buf: &[u8], from: usize, open: u8, close: u8) -> Option<(usize, usize)> {
    let mut start = None;
    for (idx, &byte) in buf.iter().enumerate().skip(from) {
        if byte == open {
            start = Some(idx);
        } else if byte == close {
            if let Some(s) = start {
                return Some((s, idx));
            }
        } else if byte == b'\n' {
            start = None;
        }
    }
    None
}

/// Remove every `open ... close` span from `buf` in one left-to-right pass,
/// returning the inner contents in order. Each physical span is removed
/// exactly once; the bytes between spans are kept.
pub(super) fn extract_spans(buf: &mut Vec<u8>, open: u8, close: u8) -> Vec<Vec<u8>> {
    let mut contents = Vec::new();
    let mut residual = Vec::with_capacity(buf.len());
    let mut cursor = 0;

    while let Some((start, end)) = find_span(buf, cursor, open, close) {
        residual.extend_from_slice(&buf[cursor..start]);
        contents.push(buf[start + 1..end].to_vec());
        cursor = end + 1;
    }

    if !contents.is_empty() {
        residual.extend_from_slice(&buf[cursor..]);
        *buf = residual;
    }
    contents
}

/// Build a debug frame from square-bracket content
pub(super) fn debug_frame(content: &[u8]) -> Frame {
    Frame::Debug {
        text: String::from_utf8_lossy(content).trim().to_string(),
    }
}

/// Build a command frame from curly-bracket content
///
/// Accepts `"channel" : "value"` (spaced separator, quotes optional) and
/// the JSON object shape `"CHANNEL": "value"`. Anything else becomes a
/// command frame with an empty channel carrying the whole content.
pub(super) fn command_frame(content: &[u8]) -> Frame {
    let text = String::from_utf8_lossy(content);
    let text = text.trim();

    if let Some((channel, value)) = text.split_once(" : ") {
        return Frame::Command {
            channel: channel.trim_matches('"').to_string(),
            value: value.trim_matches('"').to_string(),
        };
    }

    let object = format!("{{{text}}}");
    if let Ok(map) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&object) {
        if let Some((channel, serde_json::Value::String(value))) = map.iter().next() {
            if map.len() == 1 {
                return Frame::Command {
                    channel: channel.clone(),
                    value: value.clone(),
                };
            }
        }
    }

    Frame::Command {
        channel: String::new(),
        value: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_span_minimal() {
        assert_eq!(find_span(b"x[a]b[c]", 0, b'[', b']'), Some((1, 3)));
        assert_eq!(find_span(b"x[a]b[c]", 4, b'[', b']'), Some((5, 7)));
    }

    #[test]
    fn test_find_span_skips_nesting_and_unterminated() {
        // Inner span wins, the stray opener stays behind
        assert_eq!(find_span(b"[a[b]", 0, b'[', b']'), Some((2, 4)));
        assert_eq!(find_span(b"[abc", 0, b'[', b']'), None);
        assert_eq!(find_span(b"]abc", 0, b'[', b']'), None);
    }

    #[test]
    fn test_find_span_does_not_cross_line_feed() {
        assert_eq!(find_span(b"[ab\ncd]", 0, b'[', b']'), None);
        assert_eq!(find_span(b"[ab\r cd]", 0, b'[', b']'), Some((0, 7)));
    }

    #[test]
    fn test_extract_duplicates_removed_once_each() {
        let mut buf = b"[a][a]".to_vec();
        let spans = extract_spans(&mut buf, b'[', b']');
        assert_eq!(spans, vec![b"a".to_vec(), b"a".to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extract_keeps_surrounding_bytes() {
        let mut buf = b"pre{x}mid{y}post{z".to_vec();
        let spans = extract_spans(&mut buf, b'{', b'}');
        assert_eq!(spans.len(), 2);
        assert_eq!(buf, b"premidpost{z");
    }

    #[test]
    fn test_command_frame_spaced_separator() {
        assert_eq!(
            command_frame(br#"CHAN : "ok""#),
            Frame::Command {
                channel: "CHAN".into(),
                value: "ok".into()
            }
        );
    }

    #[test]
    fn test_command_frame_json_shape() {
        assert_eq!(
            command_frame(br#""COM1": "G1PLUS1.0""#),
            Frame::Command {
                channel: "COM1".into(),
                value: "G1PLUS1.0".into()
            }
        );
    }

    #[test]
    fn test_command_frame_without_separator() {
        assert_eq!(
            command_frame(b"  just text "),
            Frame::Command {
                channel: String::new(),
                value: "just text".into()
            }
        );
    }
}
