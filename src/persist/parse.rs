use serde_json::Value;

/// Classification of a state file's contents.
#[derive(Debug)]
pub enum ParseOutcome {
    /// No content, or whitespace only.
    Empty,
    /// Well-formed JSON.
    Value(Value),
    /// Non-empty content that is not valid JSON.
    Malformed(serde_json::Error),
}

impl ParseOutcome {
    /// Classifies raw file bytes.
    pub fn parse(raw: &[u8]) -> Self {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return ParseOutcome::Empty;
        }
        match serde_json::from_slice(raw) {
            Ok(value) => ParseOutcome::Value(value),
            Err(err) => ParseOutcome::Malformed(err),
        }
    }

    /// True for [`ParseOutcome::Value`].
    pub fn is_value(&self) -> bool {
        matches!(self, ParseOutcome::Value(_))
    }
}
