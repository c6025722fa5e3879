use crate::notation::model::{
    divisions_to_ticks, Measure, MeasureElement, PartWindow, PieceWindow, TimeSignature,
    DEFAULT_TEMPO, DEFAULT_VELOCITY, TICKS_PER_QUARTER,
};
use crate::Midi2XmlError;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use std::collections::HashMap;

/// A sounding note in absolute ticks from the start of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedNote {
    pub start: u32,
    pub end: u32,
    pub key: u8,
}

/// Render every part of the window to a format 1 Standard MIDI File.
pub fn window_to_smf(window: &PieceWindow<'_>) -> Result<Vec<u8>, Midi2XmlError> {
    let offsets = measure_offsets(window);
    let mut tracks = Vec::with_capacity(window.parts.len() + 1);
    tracks.push(conductor_track(window, &offsets));
    for part in &window.parts {
        let notes = timed_notes(part, &offsets);
        tracks.push(part_track(part, &notes));
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(TICKS_PER_QUARTER.into()),
        },
        tracks,
    };
    let mut out = Vec::new();
    smf.write(&mut out)
        .map_err(|e| Midi2XmlError::RenderError(format!("failed to write MIDI: {e}")))?;
    Ok(out)
}

/// Start tick of every measure of the window, plus the end tick of the last one.
///
/// Parts may disagree on the length of a measure, the longest one wins.
pub fn measure_offsets(window: &PieceWindow<'_>) -> Vec<u32> {
    let count = window.measure_count();
    let mut offsets = Vec::with_capacity(count + 1);
    let mut tick = 0u32;
    offsets.push(tick);
    for index in 0..count {
        let length = window
            .parts
            .iter()
            .filter_map(|part| part.measures.get(index))
            .map(measure_ticks)
            .max()
            .unwrap_or(0);
        tick = tick.saturating_add(length);
        offsets.push(tick);
    }
    offsets
}

fn measure_ticks(measure: &Measure) -> u32 {
    let mut divisions = measure.context.divisions();
    let mut cursor = 0u32;
    let mut furthest = 0u32;
    for element in &measure.elements {
        match element {
            MeasureElement::Attributes(change) => {
                if let Some(d) = change.divisions {
                    divisions = d.max(1);
                }
            }
            MeasureElement::Note(note) if !note.chord && !note.grace => {
                cursor += divisions_to_ticks(note.duration, divisions);
            }
            MeasureElement::Backup(d) => {
                cursor = cursor.saturating_sub(divisions_to_ticks(*d, divisions));
            }
            MeasureElement::Forward(d) => cursor += divisions_to_ticks(*d, divisions),
            _ => {}
        }
        furthest = furthest.max(cursor);
    }
    furthest
}

/// Collect the notes of a part, merging tied notes into a single event.
pub fn timed_notes(part: &PartWindow<'_>, offsets: &[u32]) -> Vec<TimedNote> {
    let mut notes: Vec<TimedNote> = Vec::new();
    // (key, voice) -> index of the note a tie is extending
    let mut open_ties: HashMap<(u8, Option<&str>), usize> = HashMap::new();

    for (index, measure) in part.measures.iter().enumerate() {
        let offset = offsets.get(index).copied().unwrap_or(0);
        let mut divisions = measure.context.divisions();
        let mut cursor = 0u32;
        let mut last_onset = 0u32;
        for element in &measure.elements {
            match element {
                MeasureElement::Attributes(change) => {
                    if let Some(d) = change.divisions {
                        divisions = d.max(1);
                    }
                }
                MeasureElement::Backup(d) => {
                    cursor = cursor.saturating_sub(divisions_to_ticks(*d, divisions));
                }
                MeasureElement::Forward(d) => cursor += divisions_to_ticks(*d, divisions),
                MeasureElement::Tempo(_) => {}
                MeasureElement::Note(note) => {
                    if note.grace {
                        continue;
                    }
                    let duration = divisions_to_ticks(note.duration, divisions);
                    let onset = if note.chord { last_onset } else { cursor };
                    if !note.chord {
                        last_onset = cursor;
                        cursor += duration;
                    }
                    let Some(pitch) = note.pitch else {
                        continue;
                    };
                    let key = pitch.midi_key();
                    let start = offset + onset;
                    let end = start + duration;
                    let tie_key = (key, note.voice.as_deref());
                    if note.tie_stop {
                        if let Some(open) = open_ties.remove(&tie_key) {
                            notes[open].end = notes[open].end.max(end);
                            if note.tie_start {
                                open_ties.insert(tie_key, open);
                            }
                            continue;
                        }
                    }
                    notes.push(TimedNote { start, end, key });
                    if note.tie_start {
                        open_ties.insert(tie_key, notes.len() - 1);
                    }
                }
            }
        }
    }
    notes.sort_by_key(|n| (n.start, n.key));
    notes
}

fn conductor_track<'a>(window: &PieceWindow<'_>, offsets: &[u32]) -> Track<'a> {
    let mut events: Vec<(u32, TrackEventKind<'a>)> = Vec::new();
    if let Some(part) = window.parts.first() {
        let first = part.measures.first();
        let tempo = first.and_then(|m| m.tempo).unwrap_or(DEFAULT_TEMPO);
        events.push((0, tempo_event(tempo)));
        if let Some(time) = first.and_then(|m| m.context.time) {
            events.push((0, time_signature_event(time)));
        }
        for (index, measure) in part.measures.iter().enumerate() {
            let offset = offsets.get(index).copied().unwrap_or(0);
            for element in &measure.elements {
                match element {
                    MeasureElement::Tempo(bpm) => events.push((offset, tempo_event(*bpm))),
                    MeasureElement::Attributes(change) => {
                        if let Some(time) = change.time {
                            events.push((offset, time_signature_event(time)));
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    events.sort_by_key(|(tick, _)| *tick);
    into_track(events)
}

fn tempo_event<'a>(bpm: f64) -> TrackEventKind<'a> {
    let micros_per_quarter = (60_000_000.0 / bpm).round().clamp(1.0, 16_777_215.0) as u32;
    TrackEventKind::Meta(MetaMessage::Tempo(micros_per_quarter.into()))
}

fn time_signature_event<'a>(time: TimeSignature) -> TrackEventKind<'a> {
    // denominator is stored as a power of two
    let denominator = u8::try_from(time.beat_type.max(1).ilog2()).unwrap_or(2);
    TrackEventKind::Meta(MetaMessage::TimeSignature(time.beats, denominator, 24, 8))
}

fn part_track<'a>(part: &PartWindow<'a>, notes: &[TimedNote]) -> Track<'a> {
    let channel = part.part.channel.into();
    let mut events: Vec<(u32, u8, TrackEventKind<'a>)> = vec![(
        0,
        0,
        TrackEventKind::Meta(MetaMessage::TrackName(part.part.name.as_bytes())),
    )];
    if let Some(program) = part.part.program {
        events.push((
            0,
            0,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: program.into(),
                },
            },
        ));
    }
    for note in notes {
        events.push((
            note.start,
            2,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: note.key.into(),
                    vel: DEFAULT_VELOCITY.into(),
                },
            },
        ));
        // offs sort before ons on the same tick so repeated keys retrigger
        events.push((
            note.end,
            1,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: note.key.into(),
                    vel: 0.into(),
                },
            },
        ));
    }
    events.sort_by_key(|(tick, order, _)| (*tick, *order));
    into_track(events.into_iter().map(|(tick, _, kind)| (tick, kind)).collect())
}

/// Convert absolute ticks to delta times and terminate the track.
fn into_track(events: Vec<(u32, TrackEventKind<'_>)>) -> Track<'_> {
    let mut previous = 0u32;
    let mut track: Track<'_> = events
        .into_iter()
        .map(|(tick, kind)| {
            let delta = tick.saturating_sub(previous);
            previous = tick;
            TrackEvent {
                delta: delta.into(),
                kind,
            }
        })
        .collect();
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}
