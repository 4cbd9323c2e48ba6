//! Comparison policies
//!
//! Pure functions that judge an acquired response against a step's
//! expectation. Each returns a [`Verdict`] carrying a diagnostic that is
//! enough to reproduce the judgment; malformed expectations and undefined
//! lookup names are reported as errors instead.

use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

use super::lookup::LookupTable;
use crate::common::{Error, Result};
use crate::framer::{PromptSignal, ERROR_CURSOR, READY_CURSOR};

/// A `{"CHANNEL": "value"}` object inside device output
static CHANNEL_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{"([^"]+)"\s*:\s*"([^"]*)"\}"#).expect("channel object pattern is valid")
});

/// Any minimal curly-bracket span on one line
static CURLY_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{.*?\}").expect("curly span pattern is valid"));

/// Outcome of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub detail: String,
}

impl Verdict {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }

    /// Apply the expected-prompt rule on top of a value verdict
    fn with_prompt(self, expected: Option<PromptSignal>, observed: PromptSignal) -> Self {
        match expected {
            Some(expected) if expected != observed => {
                let mismatch = format!(
                    "Cursor mismatch. Expected '{}', got '{}'",
                    expected, observed
                );
                let detail = if self.passed {
                    mismatch
                } else {
                    format!("{}; {}", self.detail, mismatch)
                };
                Verdict::fail(detail)
            }
            _ => self,
        }
    }
}

/// Drop cursor markers, whitespace and control characters
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| {
            *c != READY_CURSOR as char
                && *c != ERROR_CURSOR as char
                && !c.is_whitespace()
                && !c.is_control()
        })
        .collect()
}

/// Normalize text for comparison, first unwrapping a channel object if the
/// text contains one
pub fn comparable(text: &str) -> String {
    match CHANNEL_OBJECT.captures(text).and_then(|caps| caps.get(2)) {
        Some(value) => normalize(value.as_str()),
        None => normalize(text),
    }
}

/// `simple` / `complex`: normalized equality plus the optional prompt
pub fn compare_text(
    received: &str,
    expected: &str,
    expected_prompt: Option<PromptSignal>,
    observed_prompt: PromptSignal,
) -> Verdict {
    let got = comparable(received);
    let want = comparable(expected);
    let verdict = if got == want {
        Verdict::pass(format!("Received '{}'", got))
    } else {
        Verdict::fail(format!("Expected '{}', received '{}'", want, got))
    };
    verdict.with_prompt(expected_prompt, observed_prompt)
}

/// `regex`: pattern found anywhere in the response plus the optional prompt
pub fn compare_regex(
    received: &str,
    pattern: &str,
    expected_prompt: Option<PromptSignal>,
    observed_prompt: PromptSignal,
) -> Result<Verdict> {
    let re = Regex::new(pattern)
        .map_err(|e| Error::MalformedStep(format!("Invalid pattern '{}': {}", pattern, e)))?;

    let verdict = match re.find(received) {
        Some(m) => Verdict::pass(format!("Regex match: {}", m.as_str())),
        None => Verdict::fail(format!(
            "Regex match not found. Pattern: '{}', Received: '{}'",
            pattern, received
        )),
    };
    Ok(verdict.with_prompt(expected_prompt, observed_prompt))
}

/// The payload of a binary response: the received bytes without the
/// closing cursor and the line terminators after it
///
/// Cursor bytes inside the payload are data and are kept. A response that
/// does not end with a cursor is taken whole.
pub fn binary_payload(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n'))
        .map_or(0, |idx| idx + 1);
    match bytes[..end].split_last() {
        Some((last, payload)) if PromptSignal::from_cursor(*last).is_some() => payload,
        _ => bytes,
    }
}

/// `binary`: the candidate payload must equal the expected hex bytes
pub fn compare_binary(received: &[u8], expected_hex: &str) -> Result<Verdict> {
    let compact: String = expected_hex.chars().filter(|c| !c.is_whitespace()).collect();
    let expected = hex::decode(&compact).map_err(|e| {
        Error::MalformedStep(format!("retValue '{}' is not valid hex: {}", expected_hex, e))
    })?;

    let candidate = binary_payload(received);
    if candidate.is_empty() {
        return Ok(Verdict::fail(format!(
            "No binary data found in response. Raw response: {}",
            hex::encode(received)
        )));
    }

    if candidate == expected.as_slice() {
        return Ok(Verdict::pass(format!("Received {}", hex::encode(candidate))));
    }

    let mut detail = format!(
        "Expected: {}, Received: {}, Length: Expected {} bytes, Got {} bytes",
        hex::encode(&expected),
        hex::encode(candidate),
        expected.len(),
        candidate.len()
    );
    for (pos, (want, got)) in expected.iter().zip(candidate).enumerate() {
        if want != got {
            let _ = write!(
                detail,
                "; Difference at position {}: Expected 0x{:02x}, Got 0x{:02x}",
                pos, want, got
            );
        }
    }
    Ok(Verdict::fail(detail))
}

/// Concatenate the values of every channel object in `text`, with spaces
/// removed
///
/// Objects are parsed as JSON first; spans that do not parse fall back to
/// direct pattern matching.
pub fn extract_channel_values(text: &str) -> String {
    let mut values = String::new();
    for span in CURLY_SPAN.find_iter(text) {
        let span = span.as_str();
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(span) {
            Ok(object) => match object.iter().next() {
                Some((_, serde_json::Value::String(value))) => {
                    values.push_str(&value.replace(' ', ""));
                }
                Some((channel, value)) => {
                    tracing::debug!("Value for {} is not a string: {}", channel, value);
                }
                None => {}
            },
            Err(_) => {
                tracing::debug!("JSON parsing failed, using pattern fallback for: {}", span);
                match CHANNEL_OBJECT.captures(span).and_then(|caps| caps.get(2)) {
                    Some(value) => values.push_str(&value.as_str().replace(' ', "")),
                    None => tracing::debug!("Pattern extraction failed for: {}", span),
                }
            }
        }
    }
    values
}

/// `device_specific`: extracted values must equal the lookup table's
/// primary or alternate value for `name`
pub fn compare_device_specific(
    received: &str,
    name: &str,
    table: &dyn LookupTable,
) -> Result<Verdict> {
    let entry = table.lookup(name);
    if entry.is_missing() {
        return Err(Error::MissingLookupEntry {
            name: name.to_string(),
        });
    }

    let extracted = extract_channel_values(received);
    let got = if extracted.is_empty() {
        comparable(received)
    } else {
        normalize(&extracted)
    };
    let primary = entry.primary.as_deref().map(comparable);
    let alternate = entry.alternate.as_deref().map(comparable);

    if primary.as_deref() == Some(got.as_str()) {
        return Ok(Verdict::pass(format!(
            "Matched value for '{}': '{}'",
            name, got
        )));
    }
    if alternate.as_deref() == Some(got.as_str()) {
        return Ok(Verdict::pass(format!(
            "Matched alternate value for '{}_alt': '{}'",
            name, got
        )));
    }

    let mut detail = format!("Comparison FAILED. Received '{}'", got);
    if let Some(primary) = primary {
        let _ = write!(detail, ", expected '{}'", primary);
    }
    if let Some(alternate) = alternate {
        let _ = write!(detail, ", alternate '{}'", alternate);
    }
    Ok(Verdict::fail(detail))
}

/// Parse a `binOut` command: comma-separated decimal byte values
pub fn parse_decimal_bytes(list: &str) -> Result<Vec<u8>> {
    list.split(',')
        .map(|item| {
            let item = item.trim();
            item.parse::<u8>().map_err(|_| {
                Error::MalformedStep(format!("Invalid decimal value in binOut command: '{}'", item))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::lookup::Identity;

    fn table() -> Identity {
        Identity::from_json(
            r#"{"deviceSpecific": [{"name": "X", "value": "X"}, {"name": "X_alt", "value": "Y"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_normalization_strips_cursor_and_whitespace() {
        assert_eq!(normalize(" OK> \r\n"), "OK");
        assert_eq!(normalize("E R R!"), "ERR");
        let verdict = compare_text(" OK> ", "OK", None, PromptSignal::Ready);
        assert!(verdict.passed, "{}", verdict.detail);
    }

    #[test]
    fn test_text_unwraps_channel_object() {
        let verdict = compare_text(r#"{"COM1": "G1 PLUS"}>"#, "G1PLUS", None, PromptSignal::Ready);
        assert!(verdict.passed, "{}", verdict.detail);
    }

    #[test]
    fn test_text_mismatch_reports_both_sides() {
        let verdict = compare_text("NOPE>", "OK", None, PromptSignal::Ready);
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("'OK'"));
        assert!(verdict.detail.contains("'NOPE'"));
    }

    #[test]
    fn test_prompt_mismatch_fails_matching_value() {
        let verdict = compare_text("OK!", "OK", Some(PromptSignal::Ready), PromptSignal::Error);
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("Cursor mismatch"));

        let verdict = compare_text("OK!", "OK", Some(PromptSignal::Error), PromptSignal::Error);
        assert!(verdict.passed);
    }

    #[test]
    fn test_regex_search_anywhere() {
        let verdict = compare_regex("\r\nOK 12>", r"OK \d+", None, PromptSignal::Ready).unwrap();
        assert!(verdict.passed);
        assert!(verdict.detail.contains("OK 12"));

        let verdict = compare_regex("ERR>", "^OK", None, PromptSignal::Ready).unwrap();
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("Pattern: '^OK'"));
    }

    #[test]
    fn test_regex_prompt_rule() {
        let verdict =
            compare_regex("OK>", "OK", Some(PromptSignal::Error), PromptSignal::Ready).unwrap();
        assert!(!verdict.passed);
    }

    #[test]
    fn test_invalid_regex_is_malformed() {
        let err = compare_regex("x", "(", None, PromptSignal::Ready).unwrap_err();
        assert!(matches!(err, Error::MalformedStep(_)));
    }

    #[test]
    fn test_binary_reports_first_difference() {
        let verdict = compare_binary(&[0x0A, 0x0C, b'>'], "0A0B").unwrap();
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("position 1: Expected 0x0b, Got 0x0c"));
        assert!(!verdict.detail.contains("position 0"));
    }

    #[test]
    fn test_binary_exact_match() {
        let verdict = compare_binary(&[0x0A, 0x0B, b'>'], "0a 0b").unwrap();
        assert!(verdict.passed, "{}", verdict.detail);
    }

    #[test]
    fn test_binary_length_mismatch_and_empty() {
        let verdict = compare_binary(&[0x0A], "0A0B").unwrap();
        assert!(verdict.detail.contains("Expected 2 bytes, Got 1 bytes"));

        let verdict = compare_binary(b">", "0A").unwrap();
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("No binary data"));
    }

    #[test]
    fn test_binary_bad_hex() {
        assert!(matches!(compare_binary(b"x", "0G"), Err(Error::MalformedStep(_))));
    }

    #[test]
    fn test_binary_keeps_cursor_bytes_inside_payload() {
        let verdict = compare_binary(&[0x0A, 0x21, 0x0B, b'>'], "0A210B").unwrap();
        assert!(verdict.passed, "{}", verdict.detail);

        let verdict = compare_binary(&[0x01, 0x3E, 0x02, 0x03, b'>', b'\r', b'\n'], "013E0203")
            .unwrap();
        assert!(verdict.passed, "{}", verdict.detail);
    }

    #[test]
    fn test_binary_payload_strips_only_closing_cursor() {
        assert_eq!(binary_payload(b"ab>cd!"), b"ab>cd");
        assert_eq!(binary_payload(b"ab\r\n>\r\n"), b"ab\r\n");
        assert_eq!(binary_payload(b"ab"), b"ab");
        assert_eq!(binary_payload(b"\r\n"), b"\r\n");
        assert_eq!(binary_payload(b""), b"");
    }

    #[test]
    fn test_device_specific_alternate() {
        let verdict = compare_device_specific(r#"{"COM1": "Y"}>"#, "X", &table()).unwrap();
        assert!(verdict.passed, "{}", verdict.detail);
        assert!(verdict.detail.contains("alternate"));
    }

    #[test]
    fn test_device_specific_mismatch_shows_both_values() {
        let verdict = compare_device_specific(r#"{"COM1": "Z"}>"#, "X", &table()).unwrap();
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("expected 'X'"));
        assert!(verdict.detail.contains("alternate 'Y'"));
    }

    #[test]
    fn test_device_specific_missing_entry() {
        let err = compare_device_specific("W>", "W", &table()).unwrap_err();
        assert!(matches!(err, Error::MissingLookupEntry { .. }));
    }

    #[test]
    fn test_device_specific_concatenates_objects() {
        let text = r#"{"COM1": "AB C"}{"COM1": "D"}{broken "COM2": "E"}>"#;
        assert_eq!(extract_channel_values(text), "ABCD");
    }

    #[test]
    fn test_device_specific_falls_back_to_raw_text() {
        let verdict = compare_device_specific("X >", "X", &table()).unwrap();
        assert!(verdict.passed);
    }

    #[test]
    fn test_decimal_bytes() {
        assert_eq!(parse_decimal_bytes("27, 64,255").unwrap(), vec![27, 64, 255]);
        assert!(parse_decimal_bytes("27,256").is_err());
        assert!(parse_decimal_bytes("").is_err());
        assert!(parse_decimal_bytes("1,,2").is_err());
    }
}
