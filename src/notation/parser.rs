use crate::notation::model::{
    Attributes, Clef, Key, Measure, MeasureElement, Note, Part, Piece, Pitch, TimeSignature,
};
use crate::Midi2XmlError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, Midi2XmlError>;

fn xml_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> Midi2XmlError {
    Midi2XmlError::ParsingError(format!(
        "XML error at position {}: {err}",
        reader.buffer_position()
    ))
}

/// Parse a `score-partwise` MusicXML document into a piece.
pub fn parse_musicxml(xml: &str) -> Result<Piece> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut piece = Piece::default();
    let mut part_list: HashMap<String, ScorePart> = HashMap::new();
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"score-partwise" => seen_root = true,
                b"score-timewise" => {
                    return Err(Midi2XmlError::ParsingError(
                        "score-timewise documents are not supported".to_string(),
                    ));
                }
                root if !seen_root => {
                    return Err(Midi2XmlError::ParsingError(format!(
                        "unexpected root element <{}>",
                        String::from_utf8_lossy(root)
                    )));
                }
                b"work-title" | b"movement-title" => {
                    let title = read_text(&mut reader)?;
                    if piece.title.is_none() && !title.is_empty() {
                        piece.title = Some(title);
                    }
                }
                b"score-part" => {
                    let id = attribute(e, b"id").unwrap_or_default();
                    let score_part = parse_score_part(&mut reader)?;
                    part_list.insert(id, score_part);
                }
                b"part" => {
                    let index = piece.parts.len();
                    let id = attribute(e, b"id").unwrap_or_else(|| format!("P{}", index + 1));
                    let declared = part_list.remove(&id).unwrap_or_default();
                    let measures = parse_part_measures(&mut reader)?;
                    log::debug!("parsed part {id} with {} measures", measures.len());
                    piece.parts.push(Part {
                        name: declared.name.unwrap_or_else(|| id.clone()),
                        id,
                        channel: channel_for_part(index),
                        program: declared.program,
                        measures,
                    });
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) if !seen_root => {
                return Err(Midi2XmlError::ParsingError(format!(
                    "unexpected root element <{}>",
                    String::from_utf8_lossy(e.name().as_ref())
                )));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(&reader, e)),
            _ => {}
        }
    }

    if piece.parts.is_empty() {
        return Err(Midi2XmlError::ParsingError(
            "document contains no parts".to_string(),
        ));
    }
    Ok(piece)
}

/// Spread parts over the MIDI channels, leaving out the percussion channel.
const fn channel_for_part(index: usize) -> u8 {
    let channel = (index % 15) as u8;
    if channel >= 9 {
        channel + 1
    } else {
        channel
    }
}

#[derive(Debug, Default)]
struct ScorePart {
    name: Option<String>,
    program: Option<u8>,
}

fn parse_score_part(reader: &mut Reader<&[u8]>) -> Result<ScorePart> {
    let mut score_part = ScorePart::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"part-name" => {
                    let name = read_text(reader)?;
                    if !name.is_empty() {
                        score_part.name = Some(name);
                    }
                }
                b"midi-program" => {
                    // MusicXML programs are 1-based
                    score_part.program = read_text(reader)?
                        .parse::<u8>()
                        .ok()
                        .and_then(|p| p.checked_sub(1))
                        .map(|p| p.min(127));
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"score-part" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("score-part")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(score_part)
}

fn parse_part_measures(reader: &mut Reader<&[u8]>) -> Result<Vec<Measure>> {
    let mut measures = Vec::new();
    let mut attributes = Attributes::default();
    let mut tempo = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"measure" => {
                let number = attribute(e, b"number").unwrap_or_else(|| measures.len().to_string());
                let mut measure = Measure {
                    number,
                    context: attributes.clone(),
                    tempo,
                    elements: Vec::new(),
                };
                parse_measure(reader, &mut measure)?;
                for element in &measure.elements {
                    match element {
                        MeasureElement::Attributes(change) => attributes.apply(change),
                        MeasureElement::Tempo(bpm) => tempo = Some(*bpm),
                        _ => {}
                    }
                }
                measures.push(measure);
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"measure" => {
                let number = attribute(e, b"number").unwrap_or_else(|| measures.len().to_string());
                measures.push(Measure {
                    number,
                    context: attributes.clone(),
                    tempo,
                    elements: Vec::new(),
                });
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"part" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("part")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(measures)
}

fn parse_measure(reader: &mut Reader<&[u8]>, measure: &mut Measure) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"attributes" => {
                    let change = parse_attributes(reader)?;
                    if !change.is_empty() {
                        measure.elements.push(MeasureElement::Attributes(change));
                    }
                }
                b"note" => {
                    let note = parse_note(reader)?;
                    measure.elements.push(MeasureElement::Note(note));
                }
                b"backup" | b"forward" => {
                    let is_backup = e.name().as_ref() == b"backup";
                    let duration = parse_duration_element(reader, e.name().as_ref())?;
                    measure.elements.push(if is_backup {
                        MeasureElement::Backup(duration)
                    } else {
                        MeasureElement::Forward(duration)
                    });
                }
                b"sound" => push_tempo(e, measure),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"sound" => push_tempo(e, measure),
            Ok(Event::End(ref e)) if e.name().as_ref() == b"measure" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("measure")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(())
}

fn push_tempo(e: &BytesStart<'_>, measure: &mut Measure) {
    let tempo = attribute(e, b"tempo").and_then(|t| t.parse::<f64>().ok());
    if let Some(bpm) = tempo.filter(|bpm| *bpm > 0.0) {
        measure.elements.push(MeasureElement::Tempo(bpm));
    }
}

fn parse_duration_element(reader: &mut Reader<&[u8]>, name: &[u8]) -> Result<u32> {
    let name = name.to_vec();
    let mut duration = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"duration" => {
                duration = parse_number(&read_text(reader)?);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == name.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof("backup/forward")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(duration)
}

fn parse_attributes(reader: &mut Reader<&[u8]>) -> Result<Attributes> {
    let mut change = Attributes::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"divisions" => {
                    change.divisions = read_text(reader)?.parse::<u32>().ok().filter(|d| *d > 0);
                }
                b"key" => change.key = parse_key(reader)?,
                b"time" => change.time = parse_time(reader)?,
                b"staves" => change.staves = read_text(reader)?.parse().ok(),
                b"clef" => {
                    let number = attribute(e, b"number").and_then(|n| n.parse().ok());
                    change.clefs.push(parse_clef(reader, number)?);
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"attributes" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("attributes")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(change)
}

fn parse_key(reader: &mut Reader<&[u8]>) -> Result<Option<Key>> {
    let mut fifths = None;
    let mut mode = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fifths" => fifths = read_text(reader)?.parse::<i8>().ok(),
                b"mode" => mode = Some(read_text(reader)?).filter(|m| !m.is_empty()),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"key" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("key")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(fifths.map(|fifths| Key { fifths, mode }))
}

fn parse_time(reader: &mut Reader<&[u8]>) -> Result<Option<TimeSignature>> {
    let mut beats = None;
    let mut beat_type = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                // composite signatures such as 3+2 are not representable
                b"beats" => beats = read_text(reader)?.parse::<u8>().ok(),
                b"beat-type" => beat_type = read_text(reader)?.parse::<u8>().ok(),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"time" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("time")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(beats
        .zip(beat_type)
        .map(|(beats, beat_type)| TimeSignature { beats, beat_type }))
}

fn parse_clef(reader: &mut Reader<&[u8]>, number: Option<u8>) -> Result<Clef> {
    let mut clef = Clef {
        number,
        sign: "G".to_string(),
        line: None,
        octave_change: None,
    };
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"sign" => clef.sign = read_text(reader)?,
                b"line" => clef.line = read_text(reader)?.parse().ok(),
                b"clef-octave-change" => clef.octave_change = read_text(reader)?.parse().ok(),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"clef" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("clef")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(clef)
}

fn parse_note(reader: &mut Reader<&[u8]>) -> Result<Note> {
    let mut note = Note::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"pitch" => note.pitch = Some(parse_pitch(reader)?),
                b"duration" => note.duration = parse_number(&read_text(reader)?),
                b"voice" => note.voice = Some(read_text(reader)?),
                b"type" => note.note_type = Some(read_text(reader)?),
                b"staff" => note.staff = read_text(reader)?.parse().ok(),
                b"grace" => note.grace = true,
                b"dot" => note.dots += 1,
                b"chord" => note.chord = true,
                b"tie" => apply_tie(e, &mut note),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"grace" => note.grace = true,
                b"dot" => note.dots += 1,
                b"chord" => note.chord = true,
                b"tie" => apply_tie(e, &mut note),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"note" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("note")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    if note.grace {
        note.duration = 0;
    }
    Ok(note)
}

fn apply_tie(e: &BytesStart<'_>, note: &mut Note) {
    match attribute(e, b"type").as_deref() {
        Some("start") => note.tie_start = true,
        Some("stop") => note.tie_stop = true,
        _ => {}
    }
}

fn parse_pitch(reader: &mut Reader<&[u8]>) -> Result<Pitch> {
    let mut pitch = Pitch {
        step: 'C',
        alter: 0,
        octave: 4,
    };
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"step" => {
                    let step = read_text(reader)?;
                    pitch.step = step.chars().next().map_or('C', |c| c.to_ascii_uppercase());
                }
                // microtonal alterations are rounded to the nearest semitone
                b"alter" => {
                    pitch.alter = read_text(reader)?
                        .parse::<f32>()
                        .map_or(0, |a| a.round().clamp(-2.0, 2.0) as i8);
                }
                b"octave" => pitch.octave = read_text(reader)?.parse().unwrap_or(4),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"pitch" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("pitch")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(pitch)
}

/// Durations are positive integers but some exporters write decimals.
fn parse_number(text: &str) -> u32 {
    text.parse::<u32>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(|d| d.max(0.0).round() as u32))
        .unwrap_or(0)
}

/// Read the text content of the current element up to its end tag.
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let unescaped = e.unescape().map_err(|err| xml_error(reader, err))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => return Err(unexpected_eof("text")),
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
    }
    Ok(text.trim().to_string())
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(std::result::Result::ok)
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn unexpected_eof(element: &str) -> Midi2XmlError {
    Midi2XmlError::ParsingError(format!("unexpected end of document inside <{element}>"))
}


#[cfg(test)]
mod tests {
    use super::test_documents::TWO_PART_SCORE;
    use super::*;

    #[test]
    fn test_parse_two_part_score() {
        let piece = parse_musicxml(TWO_PART_SCORE).unwrap();
        assert_eq!(piece.title.as_deref(), Some("Chorale"));
        assert_eq!(piece.parts.len(), 2);
        assert_eq!(piece.measure_count().unwrap(), 4);

        let soprano = &piece.parts[0];
        assert_eq!(soprano.id, "P1");
        assert_eq!(soprano.name, "Soprano");
        assert_eq!(soprano.program, Some(52));
        assert_eq!(soprano.channel, 0);
        assert_eq!(piece.parts[1].name, "Bass");
        assert_eq!(piece.parts[1].program, None);
        assert_eq!(piece.parts[1].channel, 1);
    }

    #[test]
    fn test_context_is_carried_across_measures() {
        let piece = parse_musicxml(TWO_PART_SCORE).unwrap();
        let soprano = &piece.parts[0];
        // first measure starts without context, the change lives in its elements
        assert!(soprano.measures[0].context.is_empty());
        let second = &soprano.measures[1];
        assert_eq!(second.context.divisions(), 2);
        assert_eq!(
            second.context.key,
            Some(Key {
                fifths: 1,
                mode: Some("major".to_string())
            })
        );
        assert_eq!(
            second.context.time,
            Some(TimeSignature {
                beats: 2,
                beat_type: 4
            })
        );
        assert_eq!(second.tempo, Some(90.0));

        let bass = &piece.parts[1];
        assert_eq!(bass.measures[2].context.clefs[0].sign, "F");
        assert_eq!(bass.measures[3].context.clefs[0].sign, "G");
        assert_eq!(bass.measures[3].context.clefs[0].octave_change, Some(-1));
    }

    #[test]
    fn test_note_details() {
        let piece = parse_musicxml(TWO_PART_SCORE).unwrap();
        let notes: Vec<&Note> = piece.parts[0].measures[0]
            .elements
            .iter()
            .filter_map(|e| match e {
                MeasureElement::Note(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].tie_start && !notes[0].tie_stop);
        assert!(notes[1].tie_stop && !notes[1].tie_start);
        assert_eq!(notes[0].voice.as_deref(), Some("1"));

        let third = &piece.parts[0].measures[2];
        let MeasureElement::Note(dotted) = &third.elements[0] else {
            panic!("expected note");
        };
        assert_eq!(dotted.dots, 1);
        let MeasureElement::Note(sharp) = &third.elements[1] else {
            panic!("expected note");
        };
        assert_eq!(sharp.pitch.unwrap().midi_key(), 73);

        let MeasureElement::Note(rest) = &piece.parts[0].measures[3].elements[0] else {
            panic!("expected note");
        };
        assert!(rest.pitch.is_none());
        assert_eq!(rest.duration, 4);

        let MeasureElement::Note(chord) = &piece.parts[1].measures[0].elements[2] else {
            panic!("expected note");
        };
        assert!(chord.chord);
    }

    #[test]
    fn test_backup_and_forward() {
        let piece = parse_musicxml(TWO_PART_SCORE).unwrap();
        let last = &piece.parts[1].measures[3];
        assert!(matches!(last.elements[1], MeasureElement::Backup(2)));
        assert!(matches!(last.elements[3], MeasureElement::Forward(2)));
        assert_eq!(last.duration(), 4);
    }

    #[test]
    fn test_parse_rejects_bad_documents() {
        assert!(matches!(
            parse_musicxml("<score-partwise><part id=\"P1\"><measure>"),
            Err(Midi2XmlError::ParsingError(_))
        ));
        assert!(matches!(
            parse_musicxml("<score-timewise></score-timewise>"),
            Err(Midi2XmlError::ParsingError(_))
        ));
        assert!(matches!(
            parse_musicxml("<html><body/></html>"),
            Err(Midi2XmlError::ParsingError(_))
        ));
        assert!(matches!(
            parse_musicxml("<score-partwise></score-partwise>"),
            Err(Midi2XmlError::ParsingError(_))
        ));
    }

    #[test]
    fn test_channel_for_part() {
        assert_eq!(channel_for_part(0), 0);
        assert_eq!(channel_for_part(8), 8);
        assert_eq!(channel_for_part(9), 10);
        assert_eq!(channel_for_part(14), 15);
        assert_eq!(channel_for_part(15), 0);
    }
}
