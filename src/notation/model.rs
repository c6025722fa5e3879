use crate::Midi2XmlError;
use std::ops::Range;

/// MIDI resolution used when rendering windows.
pub const TICKS_PER_QUARTER: u16 = 480;
pub const DEFAULT_TEMPO: f64 = 120.0;
pub const DEFAULT_VELOCITY: u8 = 64;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Piece {
    pub title: Option<String>,
    pub parts: Vec<Part>,
}

impl Piece {
    /// Number of measures shared by all parts.
    ///
    /// A piece without parts has zero measures. Parts that disagree on their
    /// measure count make the piece unusable for windowing.
    pub fn measure_count(&self) -> Result<usize, Midi2XmlError> {
        let Some(first) = self.parts.first() else {
            return Ok(0);
        };
        let expected = first.measures.len();
        for part in &self.parts[1..] {
            if part.measures.len() != expected {
                return Err(Midi2XmlError::InconsistentMeasures {
                    part: part.id.clone(),
                    expected,
                    found: part.measures.len(),
                });
            }
        }
        Ok(expected)
    }

    /// All parts restricted to the half-open measure range.
    pub fn window(&self, measures: Range<usize>) -> PieceWindow<'_> {
        PieceWindow {
            start: measures.start,
            parts: self
                .parts
                .iter()
                .map(|part| part.window(measures.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub id: String,
    pub name: String,
    pub channel: u8,
    /// General MIDI program, 0-based
    pub program: Option<u8>,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn window(&self, measures: Range<usize>) -> PartWindow<'_> {
        let end = measures.end.min(self.measures.len());
        let start = measures.start.min(end);
        PartWindow {
            part: self,
            start,
            measures: &self.measures[start..end],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measure {
    pub number: String,
    /// Attributes in effect when the measure starts.
    pub context: Attributes,
    /// Tempo in effect when the measure starts.
    pub tempo: Option<f64>,
    pub elements: Vec<MeasureElement>,
}

impl Measure {
    /// Length of the measure in divisions: the furthest position the cursor reaches.
    pub fn duration(&self) -> u32 {
        let mut cursor = 0u32;
        let mut furthest = 0u32;
        for element in &self.elements {
            match element {
                MeasureElement::Note(note) if !note.chord && !note.grace => {
                    cursor += note.duration;
                }
                MeasureElement::Backup(d) => cursor = cursor.saturating_sub(*d),
                MeasureElement::Forward(d) => cursor += d,
                _ => {}
            }
            furthest = furthest.max(cursor);
        }
        furthest
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeasureElement {
    /// Attribute change, only the fields that changed are set
    Attributes(Attributes),
    Note(Note),
    Backup(u32),
    Forward(u32),
    /// Tempo change in quarter notes per minute
    Tempo(f64),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes {
    /// Divisions per quarter note
    pub divisions: Option<u32>,
    pub key: Option<Key>,
    pub time: Option<TimeSignature>,
    pub staves: Option<u8>,
    pub clefs: Vec<Clef>,
}

impl Attributes {
    pub fn divisions(&self) -> u32 {
        self.divisions.unwrap_or(1).max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.divisions.is_none()
            && self.key.is_none()
            && self.time.is_none()
            && self.staves.is_none()
            && self.clefs.is_empty()
    }

    /// Overlay a change on top of the current attributes.
    pub fn apply(&mut self, change: &Self) {
        if change.divisions.is_some() {
            self.divisions = change.divisions;
        }
        if change.key.is_some() {
            self.key.clone_from(&change.key);
        }
        if change.time.is_some() {
            self.time = change.time;
        }
        if change.staves.is_some() {
            self.staves = change.staves;
        }
        for clef in &change.clefs {
            match self.clefs.iter_mut().find(|c| c.number == clef.number) {
                Some(existing) => existing.clone_from(clef),
                None => self.clefs.push(clef.clone()),
            }
        }
        self.clefs.sort_by_key(|c| c.number);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub fifths: i8,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clef {
    pub number: Option<u8>,
    pub sign: String,
    pub line: Option<i8>,
    pub octave_change: Option<i8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Note {
    /// None for rests
    pub pitch: Option<Pitch>,
    /// Duration in divisions, zero for grace notes
    pub duration: u32,
    pub grace: bool,
    pub chord: bool,
    pub voice: Option<String>,
    pub staff: Option<u8>,
    pub note_type: Option<String>,
    pub dots: u8,
    pub tie_start: bool,
    pub tie_stop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    pub step: char,
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    /// MIDI key number where C4 is 60.
    pub fn midi_key(&self) -> u8 {
        let base: i16 = match self.step {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => 0,
        };
        let key = base + i16::from(self.alter) + (i16::from(self.octave) + 1) * 12;
        key.clamp(0, 127) as u8
    }
}

/// Convert MusicXML divisions to MIDI ticks, rounding to the nearest tick.
pub fn divisions_to_ticks(value: u32, divisions: u32) -> u32 {
    let divisions = u64::from(divisions.max(1));
    let ticks = (u64::from(value) * u64::from(TICKS_PER_QUARTER) + divisions / 2) / divisions;
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

/// Every part of a piece over the same measure range.
#[derive(Debug, Clone)]
pub struct PieceWindow<'a> {
    pub start: usize,
    pub parts: Vec<PartWindow<'a>>,
}

impl PieceWindow<'_> {
    pub fn measure_count(&self) -> usize {
        self.parts.first().map_or(0, |p| p.measures.len())
    }
}

/// A single part over a measure range.
#[derive(Debug, Clone)]
pub struct PartWindow<'a> {
    pub part: &'a Part,
    pub start: usize,
    pub measures: &'a [Measure],
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn quarter(step: char, octave: i8) -> MeasureElement {
        MeasureElement::Note(Note {
            pitch: Some(Pitch {
                step,
                alter: 0,
                octave,
            }),
            duration: 1,
            voice: Some("1".to_string()),
            note_type: Some("quarter".to_string()),
            ..Note::default()
        })
    }

    pub fn simple_part(id: &str, measure_count: usize) -> Part {
        let measures = (0..measure_count)
            .map(|i| Measure {
                number: (i + 1).to_string(),
                context: Attributes {
                    divisions: Some(1),
                    time: Some(TimeSignature {
                        beats: 2,
                        beat_type: 4,
                    }),
                    ..Attributes::default()
                },
                tempo: None,
                elements: vec![quarter('C', 4), quarter('G', 4)],
            })
            .collect();
        Part {
            id: id.to_string(),
            name: id.to_string(),
            channel: 0,
            program: Some(0),
            measures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_midi_key() {
        let pitch = |step, alter, octave| Pitch {
            step,
            alter,
            octave,
        };
        assert_eq!(pitch('C', 0, 4).midi_key(), 60);
        assert_eq!(pitch('C', 1, 4).midi_key(), 61);
        assert_eq!(pitch('D', -1, 4).midi_key(), 61);
        assert_eq!(pitch('A', 0, 4).midi_key(), 69);
        assert_eq!(pitch('B', 0, 3).midi_key(), 59);
        assert_eq!(pitch('C', 0, -2).midi_key(), 0);
        assert_eq!(pitch('G', 0, 9).midi_key(), 127);
    }

    #[test]
    fn test_divisions_to_ticks() {
        assert_eq!(divisions_to_ticks(1, 1), 480);
        assert_eq!(divisions_to_ticks(1, 2), 240);
        assert_eq!(divisions_to_ticks(3, 2), 720);
        assert_eq!(divisions_to_ticks(1, 3), 160);
        assert_eq!(divisions_to_ticks(5, 0), 2400);
    }

    #[test]
    fn test_measure_count_consistent() {
        let piece = Piece {
            title: None,
            parts: vec![simple_part("P1", 4), simple_part("P2", 4)],
        };
        assert_eq!(piece.measure_count().unwrap(), 4);
        assert_eq!(Piece::default().measure_count().unwrap(), 0);
    }

    #[test]
    fn test_measure_count_inconsistent() {
        let piece = Piece {
            title: None,
            parts: vec![simple_part("P1", 4), simple_part("P2", 3)],
        };
        let err = piece.measure_count().unwrap_err();
        assert!(matches!(
            err,
            Midi2XmlError::InconsistentMeasures {
                expected: 4,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_window_bounds() {
        let piece = Piece {
            title: None,
            parts: vec![simple_part("P1", 4), simple_part("P2", 4)],
        };
        let window = piece.window(1..3);
        assert_eq!(window.start, 1);
        assert_eq!(window.parts.len(), 2);
        assert_eq!(window.measure_count(), 2);
        assert_eq!(window.parts[1].measures[0].number, "2");
        // clamped past the end
        let tail = piece.parts[0].window(3..9);
        assert_eq!(tail.measures.len(), 1);
    }

    #[test]
    fn test_measure_duration_with_backup_and_chord() {
        let mut measure = Measure::default();
        measure.elements.push(quarter('C', 4));
        measure.elements.push(MeasureElement::Note(Note {
            chord: true,
            duration: 1,
            ..Note::default()
        }));
        measure.elements.push(quarter('D', 4));
        measure.elements.push(MeasureElement::Backup(2));
        measure.elements.push(MeasureElement::Forward(1));
        assert_eq!(measure.duration(), 2);
    }

    #[test]
    fn test_attributes_apply() {
        let mut current = Attributes {
            divisions: Some(4),
            clefs: vec![Clef {
                number: Some(1),
                sign: "G".to_string(),
                line: Some(2),
                octave_change: None,
            }],
            ..Attributes::default()
        };
        let change = Attributes {
            clefs: vec![Clef {
                number: Some(1),
                sign: "F".to_string(),
                line: Some(4),
                octave_change: None,
            }],
            ..Attributes::default()
        };
        current.apply(&change);
        assert_eq!(current.divisions(), 4);
        assert_eq!(current.clefs.len(), 1);
        assert_eq!(current.clefs[0].sign, "F");
        assert!(!current.is_empty());
        assert!(Attributes::default().is_empty());
    }
}
