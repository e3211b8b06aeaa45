//! # Line Protocol Encoder
//!
//! Encodes samples into time-series line protocol.
//!
//! ```text
//! <measurement>,<tag>=<value>,... <field>=<value>,... <timestamp_ms>
//! ```
//!
//! Separators are never escaped. Any name or tag value containing a comma,
//! space, equals sign or newline is rejected instead of producing a line the
//! sink would split differently.

use std::fmt;

use super::sample::Sample;
use crate::error::{RelayError, Result};

/// Characters with structural meaning inside a line or batch.
const RESERVED_CHARS: &[char] = &[',', ' ', '=', '\n', '\r'];

/// Separator between lines of one batch payload.
pub const LINE_SEPARATOR: &str = "\n";

/// One encoded line, guaranteed free of unescaped separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedLine(String);

impl EncodedLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncodedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode one measurement line.
///
/// # Arguments
///
/// * `measurement` - Measurement (table) name
/// * `tags` - Tag pairs, encoded in the given order (may be empty)
/// * `fields` - Numeric field pairs, encoded in the given order (at least one)
/// * `timestamp_ms` - Unix epoch milliseconds, supplied by the caller
///
/// # Errors
///
/// Returns `RelayError::Encoding` if:
/// - `fields` is empty
/// - The measurement, a tag key/value or a field key is empty or contains a
///   reserved character
/// - A field value is NaN or infinite
///
/// # Examples
///
/// ```
/// use vessel_relay::line_protocol::encoder::encode;
///
/// let line = encode("m", &[("source", "x")], &[("a", 1.0)], 1000)?;
/// assert_eq!(line.as_str(), "m,source=x a=1 1000");
/// # Ok::<(), vessel_relay::error::RelayError>(())
/// ```
pub fn encode<K, V, F>(
    measurement: &str,
    tags: &[(K, V)],
    fields: &[(F, f64)],
    timestamp_ms: i64,
) -> Result<EncodedLine>
where
    K: AsRef<str>,
    V: AsRef<str>,
    F: AsRef<str>,
{
    if fields.is_empty() {
        return Err(RelayError::Encoding(format!(
            "measurement '{}' has no fields",
            measurement
        )));
    }

    check_token("measurement", measurement)?;

    let mut line = String::with_capacity(64);
    line.push_str(measurement);

    for (key, value) in tags {
        let (key, value) = (key.as_ref(), value.as_ref());
        check_token("tag key", key)?;
        check_token("tag value", value)?;
        line.push(',');
        line.push_str(key);
        line.push('=');
        line.push_str(value);
    }

    line.push(' ');

    for (index, (key, value)) in fields.iter().enumerate() {
        let key = key.as_ref();
        check_token("field key", key)?;
        if !value.is_finite() {
            return Err(RelayError::Encoding(format!(
                "field '{}' has non-finite value {}",
                key, value
            )));
        }
        if index > 0 {
            line.push(',');
        }
        line.push_str(key);
        line.push('=');
        line.push_str(&value.to_string());
    }

    line.push(' ');
    line.push_str(&timestamp_ms.to_string());

    Ok(EncodedLine(line))
}

/// Encode a [`Sample`] under the given measurement name.
pub fn encode_sample(measurement: &str, sample: &Sample) -> Result<EncodedLine> {
    encode(measurement, sample.tags(), sample.fields(), sample.timestamp_ms())
}

/// Join a batch of lines into one newline-separated payload.
pub fn join_batch(lines: &[EncodedLine]) -> String {
    lines
        .iter()
        .map(EncodedLine::as_str)
        .collect::<Vec<_>>()
        .join(LINE_SEPARATOR)
}

fn check_token(what: &str, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(RelayError::Encoding(format!("{} is empty", what)));
    }

    if let Some(c) = token.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(RelayError::Encoding(format!(
            "{} '{}' contains reserved character {:?}",
            what, token, c
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TAGS: &[(&str, &str)] = &[];

    #[test]
    fn test_encode_basic_line() {
        let line = encode("m", &[("source", "x")], &[("a", 1.0)], 1000).unwrap();
        assert_eq!(line.as_str(), "m,source=x a=1 1000");
    }

    #[test]
    fn test_encode_multiple_tags_and_fields_in_order() {
        let line = encode(
            "vessel",
            &[("source", "Pixhawk"), ("hull", "alpha")],
            &[("latitude", -23.5), ("longitude", -46.25), ("heading", 90.0)],
            1_700_000_000_123,
        )
        .unwrap();

        assert_eq!(
            line.as_str(),
            "vessel,source=Pixhawk,hull=alpha latitude=-23.5,longitude=-46.25,heading=90 1700000000123"
        );
    }

    #[test]
    fn test_encode_without_tags() {
        let line = encode("m", NO_TAGS, &[("a", 0.5)], 42).unwrap();
        assert_eq!(line.as_str(), "m a=0.5 42");
    }

    #[test]
    fn test_encode_is_idempotent() {
        let tags = [("source", "x")];
        let fields = [("a", 1.25), ("b", -3.0)];
        let first = encode("m", &tags, &fields, 1000).unwrap();
        let second = encode("m", &tags, &fields, 1000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_fields_rejected() {
        let fields: &[(&str, f64)] = &[];
        let result = encode("m", &[("source", "x")], fields, 1000);
        assert!(matches!(result, Err(RelayError::Encoding(_))));
    }

    #[test]
    fn test_reserved_characters_rejected() {
        let cases: Vec<Result<EncodedLine>> = vec![
            encode("m,x", NO_TAGS, &[("a", 1.0)], 0),
            encode("m", &[("so urce", "x")], &[("a", 1.0)], 0),
            encode("m", &[("source", "a,b")], &[("a", 1.0)], 0),
            encode("m", &[("source", "a=b")], &[("a", 1.0)], 0),
            encode("m", &[("source", "two words")], &[("a", 1.0)], 0),
            encode("m", NO_TAGS, &[("a=b", 1.0)], 0),
            encode("m", NO_TAGS, &[("line\nbreak", 1.0)], 0),
        ];

        for (i, result) in cases.into_iter().enumerate() {
            match result {
                Err(RelayError::Encoding(msg)) => assert!(msg.contains("reserved"), "case {}: {}", i, msg),
                other => panic!("case {}: expected Encoding error, got {:?}", i, other),
            }
        }
    }

    #[test]
    fn test_empty_names_rejected() {
        assert!(encode("", NO_TAGS, &[("a", 1.0)], 0).is_err());
        assert!(encode("m", &[("", "x")], &[("a", 1.0)], 0).is_err());
        assert!(encode("m", &[("source", "")], &[("a", 1.0)], 0).is_err());
        assert!(encode("m", NO_TAGS, &[("", 1.0)], 0).is_err());
    }

    #[test]
    fn test_non_finite_field_rejected() {
        assert!(matches!(
            encode("m", NO_TAGS, &[("a", f64::NAN)], 0),
            Err(RelayError::Encoding(_))
        ));
        assert!(matches!(
            encode("m", NO_TAGS, &[("a", f64::INFINITY)], 0),
            Err(RelayError::Encoding(_))
        ));
    }

    #[test]
    fn test_encode_sample() {
        let sample = Sample::new(1000).tag("source", "x").field("a", 1.0);
        let line = encode_sample("m", &sample).unwrap();
        assert_eq!(line.to_string(), "m,source=x a=1 1000");
    }

    #[test]
    fn test_join_batch() {
        let lines = vec![
            encode("m", NO_TAGS, &[("a", 1.0)], 1).unwrap(),
            encode("m", NO_TAGS, &[("a", 2.0)], 2).unwrap(),
            encode("m", NO_TAGS, &[("a", 3.0)], 3).unwrap(),
        ];
        assert_eq!(join_batch(&lines), "m a=1 1\nm a=2 2\nm a=3 3");
        assert_eq!(join_batch(&lines[..1]), "m a=1 1");
        assert_eq!(join_batch(&[]), "");
    }
}
