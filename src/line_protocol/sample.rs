//! # Telemetry Sample
//!
//! One timestamped measurement, ready for encoding.

/// A single measurement sample.
///
/// Tags and fields keep insertion order, which is the order they are encoded
/// in. The timestamp is always supplied by the caller.
///
/// # Examples
///
/// ```
/// use vessel_relay::line_protocol::sample::Sample;
///
/// let sample = Sample::new(1_700_000_000_000)
///     .tag("source", "Pixhawk")
///     .field("heading", 182.5);
/// assert_eq!(sample.fields().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    tags: Vec<(String, String)>,
    fields: Vec<(String, f64)>,
    timestamp_ms: i64,
}

impl Sample {
    /// Create an empty sample stamped with `timestamp_ms` (Unix epoch milliseconds).
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ms,
        }
    }

    /// Append a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Append a numeric field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    /// Append a numeric field in place.
    pub fn push_field(&mut self, key: impl Into<String>, value: f64) {
        self.fields.push((key.into(), value));
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn fields(&self) -> &[(String, f64)] {
        &self.fields
    }

    pub fn field_value(&self, key: &str) -> Option<f64> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_order() {
        let sample = Sample::new(5)
            .tag("source", "Pixhawk")
            .tag("vessel", "alpha")
            .field("b", 2.0)
            .field("a", 1.0);

        assert_eq!(sample.tags()[0].0, "source");
        assert_eq!(sample.tags()[1].0, "vessel");
        assert_eq!(sample.fields()[0], ("b".to_string(), 2.0));
        assert_eq!(sample.fields()[1], ("a".to_string(), 1.0));
        assert_eq!(sample.timestamp_ms(), 5);
    }

    #[test]
    fn test_field_lookup() {
        let mut sample = Sample::new(0).field("latitude", -23.5);
        sample.push_field("longitude", -46.6);

        assert_eq!(sample.field_value("latitude"), Some(-23.5));
        assert_eq!(sample.field_value("longitude"), Some(-46.6));
        assert_eq!(sample.field_value("heading"), None);
    }
}
