use crate::notation::model::{Attributes, Measure, MeasureElement, Note, PartWindow};

/// Convert a single part window to a self-contained MusicXML document.
///
/// The first measure always carries the attributes and tempo in effect so the
/// fragment can be read without the rest of the piece.
pub fn part_window_to_musicxml(window: &PartWindow<'_>, title: Option<&str>) -> String {
    let part = window.part;
    let mut xml = String::new();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#);
    xml.push('\n');
    xml.push_str(r#"<score-partwise version="4.0">"#);
    xml.push('\n');

    if let Some(title) = title {
        xml.push_str(&format!(
            "  <movement-title>{}</movement-title>\n",
            escape_xml(title)
        ));
    }

    xml.push_str("  <part-list>\n");
    xml.push_str(&format!(
        "    <score-part id=\"{}\">\n",
        escape_xml(&part.id)
    ));
    xml.push_str(&format!(
        "      <part-name>{}</part-name>\n",
        escape_xml(&part.name)
    ));
    if let Some(program) = part.program {
        xml.push_str(&format!(
            "      <midi-instrument id=\"{}-I1\">\n",
            escape_xml(&part.id)
        ));
        xml.push_str(&format!(
            "        <midi-channel>{}</midi-channel>\n",
            part.channel + 1
        ));
        xml.push_str(&format!(
            "        <midi-program>{}</midi-program>\n",
            u16::from(program) + 1
        ));
        xml.push_str("      </midi-instrument>\n");
    }
    xml.push_str("    </score-part>\n");
    xml.push_str("  </part-list>\n");

    xml.push_str(&format!("  <part id=\"{}\">\n", escape_xml(&part.id)));
    for (i, measure) in window.measures.iter().enumerate() {
        xml.push_str(&measure_to_xml(measure, i == 0));
    }
    xml.push_str("  </part>\n");
    xml.push_str("</score-partwise>\n");
    xml
}

fn measure_to_xml(measure: &Measure, first_in_window: bool) -> String {
    let mut xml = String::new();
    xml.push_str(&format!(
        "    <measure number=\"{}\">\n",
        escape_xml(&measure.number)
    ));

    let mut elements = measure.elements.iter().peekable();
    if first_in_window {
        // fold a leading change into the carried context
        let mut attributes = measure.context.clone();
        if let Some(MeasureElement::Attributes(change)) = elements.peek() {
            attributes.apply(change);
            elements.next();
        }
        if !attributes.is_empty() {
            xml.push_str(&attributes_to_xml(&attributes));
        }
        let leading_tempo = matches!(elements.peek(), Some(MeasureElement::Tempo(_)));
        if let (Some(bpm), false) = (measure.tempo, leading_tempo) {
            xml.push_str(&sound_to_xml(bpm));
        }
    }

    for element in elements {
        match element {
            MeasureElement::Attributes(change) => xml.push_str(&attributes_to_xml(change)),
            MeasureElement::Note(note) => xml.push_str(&note_to_xml(note)),
            MeasureElement::Backup(duration) => xml.push_str(&format!(
                "      <backup>\n        <duration>{duration}</duration>\n      </backup>\n"
            )),
            MeasureElement::Forward(duration) => xml.push_str(&format!(
                "      <forward>\n        <duration>{duration}</duration>\n      </forward>\n"
            )),
            MeasureElement::Tempo(bpm) => xml.push_str(&sound_to_xml(*bpm)),
        }
    }

    xml.push_str("    </measure>\n");
    xml
}

fn sound_to_xml(bpm: f64) -> String {
    format!("      <sound tempo=\"{bpm}\"/>\n")
}

fn attributes_to_xml(attributes: &Attributes) -> String {
    let mut xml = String::new();
    xml.push_str("      <attributes>\n");
    if let Some(divisions) = attributes.divisions {
        xml.push_str(&format!("        <divisions>{divisions}</divisions>\n"));
    }
    if let Some(key) = &attributes.key {
        xml.push_str("        <key>\n");
        xml.push_str(&format!("          <fifths>{}</fifths>\n", key.fifths));
        if let Some(mode) = &key.mode {
            xml.push_str(&format!("          <mode>{}</mode>\n", escape_xml(mode)));
        }
        xml.push_str("        </key>\n");
    }
    if let Some(time) = attributes.time {
        xml.push_str("        <time>\n");
        xml.push_str(&format!("          <beats>{}</beats>\n", time.beats));
        xml.push_str(&format!(
            "          <beat-type>{}</beat-type>\n",
            time.beat_type
        ));
        xml.push_str("        </time>\n");
    }
    if let Some(staves) = attributes.staves {
        xml.push_str(&format!("        <staves>{staves}</staves>\n"));
    }
    for clef in &attributes.clefs {
        match clef.number {
            Some(number) => xml.push_str(&format!("        <clef number=\"{number}\">\n")),
            None => xml.push_str("        <clef>\n"),
        }
        xml.push_str(&format!("          <sign>{}</sign>\n", escape_xml(&clef.sign)));
        if let Some(line) = clef.line {
            xml.push_str(&format!("          <line>{line}</line>\n"));
        }
        if let Some(change) = clef.octave_change {
            xml.push_str(&format!(
                "          <clef-octave-change>{change}</clef-octave-change>\n"
            ));
        }
        xml.push_str("        </clef>\n");
    }
    xml.push_str("      </attributes>\n");
    xml
}

fn note_to_xml(note: &Note) -> String {
    let mut xml = String::new();
    xml.push_str("      <note>\n");
    if note.grace {
        xml.push_str("        <grace/>\n");
    }
    if note.chord {
        xml.push_str("        <chord/>\n");
    }
    match note.pitch {
        Some(pitch) => {
            xml.push_str("        <pitch>\n");
            xml.push_str(&format!("          <step>{}</step>\n", pitch.step));
            if pitch.alter != 0 {
                xml.push_str(&format!("          <alter>{}</alter>\n", pitch.alter));
            }
            xml.push_str(&format!("          <octave>{}</octave>\n", pitch.octave));
            xml.push_str("        </pitch>\n");
        }
        None => xml.push_str("        <rest/>\n"),
    }
    if !note.grace {
        xml.push_str(&format!("        <duration>{}</duration>\n", note.duration));
    }
    if note.tie_stop {
        xml.push_str("        <tie type=\"stop\"/>\n");
    }
    if note.tie_start {
        xml.push_str("        <tie type=\"start\"/>\n");
    }
    if let Some(voice) = &note.voice {
        xml.push_str(&format!("        <voice>{}</voice>\n", escape_xml(voice)));
    }
    if let Some(note_type) = &note.note_type {
        xml.push_str(&format!("        <type>{}</type>\n", escape_xml(note_type)));
    }
    for _ in 0..note.dots {
        xml.push_str("        <dot/>\n");
    }
    if let Some(staff) = note.staff {
        xml.push_str(&format!("        <staff>{staff}</staff>\n"));
    }
    if note.tie_start || note.tie_stop {
        xml.push_str("        <notations>\n");
        if note.tie_stop {
            xml.push_str("          <tied type=\"stop\"/>\n");
        }
        if note.tie_start {
            xml.push_str("          <tied type=\"start\"/>\n");
        }
        xml.push_str("        </notations>\n");
    }
    xml.push_str("      </note>\n");
    xml
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
