use crate::decode::read_document;
use crate::Midi2XmlError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Ids below this are reserved (0 padding, 1 end of sequence).
pub const RESERVED_IDS: usize = 2;

pub const MAX_SHIFT_STEPS: u16 = 100;
pub const VELOCITY_BINS: u8 = 32;

/// One event of a performance log, in the order the built-in vocabulary numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceEvent {
    NoteOn(u8),
    NoteOff(u8),
    /// Steps of 10ms, 1 to 100
    TimeShift(u16),
    /// Velocity bin, 1 to 32
    Velocity(u8),
}

impl PerformanceEvent {
    /// Every event of the built-in vocabulary in code order.
    pub fn all() -> impl Iterator<Item = Self> {
        let note_on = (0..=127).map(Self::NoteOn);
        let note_off = (0..=127).map(Self::NoteOff);
        let shifts = (1..=MAX_SHIFT_STEPS).map(Self::TimeShift);
        let velocities = (1..=VELOCITY_BINS).map(Self::Velocity);
        note_on.chain(note_off).chain(shifts).chain(velocities)
    }

    pub fn token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PerformanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoteOn(key) => write!(f, "note_on_{key}"),
            Self::NoteOff(key) => write!(f, "note_off_{key}"),
            Self::TimeShift(steps) => write!(f, "time_shift_{steps}"),
            Self::Velocity(bin) => write!(f, "velocity_{bin}"),
        }
    }
}

/// Mapping from event token to its code, codes kept as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceVocabulary {
    codes: HashMap<String, String>,
}

impl Default for PerformanceVocabulary {
    fn default() -> Self {
        PerformanceEvent::all()
            .enumerate()
            .map(|(i, event)| (event.token(), (i + RESERVED_IDS).to_string()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PerformanceVocabulary {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            codes: iter
                .into_iter()
                .map(|(token, code)| (token.into(), code.into()))
                .collect(),
        }
    }
}

impl PerformanceVocabulary {
    /// Parse a `{"token": "code", ...}` JSON object.
    pub fn from_json_str(json: &str) -> Result<Self, Midi2XmlError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Midi2XmlError::ConfigError(format!("invalid vocabulary: {e}")))?;
        let Value::Object(entries) = value else {
            return Err(Midi2XmlError::ConfigError(
                "vocabulary must be a JSON object".to_string(),
            ));
        };
        let mut codes = HashMap::with_capacity(entries.len());
        for (token, code) in entries {
            let Value::String(code) = code else {
                return Err(Midi2XmlError::ConfigError(format!(
                    "vocabulary code for {token:?} is not a string: {code}"
                )));
            };
            codes.insert(token, code);
        }
        Ok(Self { codes })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, Midi2XmlError> {
        let json = read_document(path)?;
        Self::from_json_str(&json).map_err(|e| match e {
            Midi2XmlError::ConfigError(msg) => {
                Midi2XmlError::ConfigError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn code(&self, token: &str) -> Option<&str> {
        self.codes.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
