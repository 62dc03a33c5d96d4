use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{DomainError, Settings, SettingsOverrides, Shape};

/// One graded trial. Append-only; never edited after it is logged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEntry {
    #[serde(alias = "rel")]
    pub shape: Shape,
    pub guess: Shape,
    #[serde(alias = "ok")]
    pub correct: bool,
}

/// Everything persisted per user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    pub settings: Settings,
    pub log: Vec<OutcomeEntry>,
}

impl UserRecord {
    pub fn new(settings: Settings, log: Vec<OutcomeEntry>) -> Self {
        Self { settings, log }
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>, DomainError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decodes a stored record without ever failing.
    ///
    /// Unparseable documents give the defaults, malformed settings fields are
    /// ignored one by one, a non-array log becomes empty and malformed log
    /// entries are skipped.
    pub fn from_json_lenient(bytes: &[u8]) -> Self {
        let document: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "stored record is not valid JSON; using defaults");
                return Self::default();
            }
        };
        Self {
            settings: lenient_settings(document.get("settings")),
            log: lenient_log(document.get("log")),
        }
    }
}

/// Reads settings field by field so one bad value does not discard the rest.
pub fn lenient_settings(value: Option<&Value>) -> Settings {
    let Some(Value::Object(fields)) = value else {
        return Settings::default();
    };
    let mut overrides = SettingsOverrides::default();
    for (key, field) in fields {
        let single = Value::Object(Map::from_iter([(key.clone(), field.clone())]));
        match serde_json::from_value::<SettingsOverrides>(single) {
            Ok(parsed) => overrides = overrides.merge(parsed),
            Err(err) => warn!(key = %key, %err, "ignoring malformed setting"),
        }
    }
    Settings::default().with_overrides(&overrides).reconciled()
}

fn lenient_log(value: Option<&Value>) -> Vec<OutcomeEntry> {
    let Some(Value::Array(entries)) = value else {
        if value.is_some() {
            warn!("stored log is not a sequence; starting empty");
        }
        return Vec::new();
    };
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match OutcomeEntry::deserialize(entry) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(index, %err, "skipping malformed log entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triad() -> Shape {
        Shape::from_steps(&[4, 7])
    }

    #[test]
    fn record_json_round_trip() {
        let record = UserRecord::new(
            Settings::default(),
            vec![OutcomeEntry {
                shape: triad(),
                guess: Shape::from_steps(&[3, 7]),
                correct: false,
            }],
        );
        let bytes = record.to_json_pretty().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"midiLow\": 48"));
        assert_eq!(UserRecord::from_json_lenient(&bytes), record);
    }

    #[test]
    fn corrupt_document_gives_defaults() {
        let record = UserRecord::from_json_lenient(b"{not json");
        assert_eq!(record, UserRecord::default());
    }

    #[test]
    fn malformed_pieces_fall_back_individually() {
        let raw = br#"{
            "settings": {"midiLow": "low", "spanMax": 7, "unknown": true},
            "log": [
                {"rel": [0, 4, 7], "guess": [0, 4, 7], "ok": true},
                {"shape": [4, 0], "guess": [0], "correct": false},
                "garbage"
            ]
        }"#;
        let record = UserRecord::from_json_lenient(raw);
        assert_eq!(record.settings.midi_low, 48);
        assert_eq!(record.settings.span_max, 7);
        assert_eq!(record.log.len(), 1);
        assert_eq!(record.log[0].shape, triad());
        assert!(record.log[0].correct);
    }

    #[test]
    fn non_sequence_log_is_empty() {
        let record = UserRecord::from_json_lenient(br#"{"settings": {}, "log": {"a": 1}}"#);
        assert!(record.log.is_empty());
        assert_eq!(record.settings, Settings::default());
    }
}
