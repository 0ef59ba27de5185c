//! MusicXML reader: converts MusicXML into the Score data model.
//!
//! Partwise input is normalized to timewise first; the walk itself only
//! knows the timewise layout (measures containing parts).

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::element::to_xml_string;
use crate::error::{recover, ConvertError, Result};
use crate::model::*;
use crate::musicxml::chord::ChordAccumulator;
use crate::query::{attribute, child, child_path, children_named, parse_at, parse_document, text_at};
use crate::tables::{Accidental, Duration, Step};
use crate::timewise::partwise_to_timewise;

/// Parse a MusicXML document (partwise or timewise) into a Score.
pub fn read_musicxml(xml: &str) -> Result<Score> {
    let doc = parse_document(xml)?;
    let root = doc.root_element();

    match root.tag_name().name() {
        "score-timewise" => read_timewise(&doc),
        "score-partwise" => {
            log::debug!("normalizing partwise document to timewise");
            let timewise = to_xml_string(&partwise_to_timewise(root)?, None, 0)?;
            let doc = parse_document(&timewise)?;
            read_timewise(&doc)
        }
        other => Err(ConvertError::UnsupportedRootElement {
            found: other.to_string(),
            expected: "<score-partwise> or <score-timewise>".to_string(),
        }),
    }
}

fn read_timewise(doc: &Document) -> Result<Score> {
    let root = doc.root_element();
    let mut score = Score::new();

    read_header(root, &mut score);
    if let Some(part_list) = child(root, "part-list") {
        read_part_list(part_list, &mut score)?;
    }

    // Running attributes per part; MusicXML only writes changes.
    let mut current: Vec<Attributes> = vec![Attributes::default(); score.parts.len()];

    for (index, measure_node) in children_named(root, "measure").enumerate() {
        let mut measure = Measure {
            number: index as u32 + 1,
            staves: Vec::new(),
        };

        for part_node in children_named(measure_node, "part") {
            let id = attribute(part_node, "id").unwrap_or("");
            let part = score.part_for_id(id).ok_or_else(|| {
                ConvertError::malformed("part", format!("id '{id}' is not in the part-list"))
            })?;

            if let Some(attrs) = child(part_node, "attributes") {
                merge_attributes(attrs, &mut current[part])?;
            }
            if index == 0 {
                score.parts[part].attributes = current[part].clone();
            }

            measure.staves.push(Staff {
                part,
                attributes: current[part].clone(),
                events: read_events(part_node)?,
            });
        }

        score.measures.push(measure);
    }

    log::debug!(
        "read {} part(s), {} measure(s) from MusicXML",
        score.parts.len(),
        score.measures.len()
    );
    Ok(score)
}

// ─── Header ──────────────────────────────────────────────────────────

fn read_header(root: Node, score: &mut Score) {
    score.title = text_at(root, &["movement-title"])
        .or_else(|| text_at(root, &["work", "work-title"]))
        .map(String::from);

    let Some(identification) = child(root, "identification") else {
        return;
    };
    for child in identification.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "creator" => {
                let name = child.text().map(str::trim).filter(|t| !t.is_empty());
                if let Some(name) = name {
                    score.contributors.push(Contributor {
                        name: name.to_string(),
                        role: attribute(child, "type").map(String::from),
                    });
                }
            }
            "encoding" => {
                score.software = text_at(child, &["software"]).map(String::from);
            }
            _ => {}
        }
    }
}

// ─── Part List ───────────────────────────────────────────────────────

fn read_part_list(node: Node, score: &mut Score) -> Result<()> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (index, score_part) in children_named(node, "score-part").enumerate() {
        let id = attribute(score_part, "id")
            .ok_or_else(|| ConvertError::malformed("score-part", "missing @id"))?;
        if seen.insert(id.to_string(), index).is_some() {
            return Err(ConvertError::malformed(
                "score-part",
                format!("duplicate id '{id}'"),
            ));
        }

        let instrument = Instrument {
            name: text_at(score_part, &["score-instrument", "instrument-name"]).map(String::from),
            midi_channel: parse_at(score_part, &["midi-instrument", "midi-channel"])?,
            midi_program: parse_at(score_part, &["midi-instrument", "midi-program"])?,
        };
        let has_instrument = instrument != Instrument::default();

        score.parts.push(Part {
            id: id.to_string(),
            staff: index as u32 + 1,
            name: text_at(score_part, &["part-name"]).map(String::from),
            abbreviation: text_at(score_part, &["part-abbreviation"]).map(String::from),
            instrument: has_instrument.then_some(instrument),
            attributes: Attributes::default(),
        });
    }

    Ok(())
}

// ─── Attributes ──────────────────────────────────────────────────────

/// Apply an `<attributes>` block on top of the attributes in force.
fn merge_attributes(node: Node, attrs: &mut Attributes) -> Result<()> {
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "divisions" => attrs.divisions = parse_at(child, &[])?,
            "key" => match parse_at::<i32>(child, &["fifths"])? {
                Some(fifths) => {
                    attrs.key = Some(KeySignature {
                        fifths,
                        mode: text_at(child, &["mode"]).map(String::from),
                    });
                }
                None => log::debug!("skipping non-traditional key signature"),
            },
            "time" => {
                let beats = text_at(child, &["beats"]).and_then(|t| t.parse().ok());
                let beat_type = text_at(child, &["beat-type"]).and_then(|t| t.parse().ok());
                match (beats, beat_type) {
                    (Some(count), Some(unit)) => attrs.meter = Some(Meter { count, unit }),
                    _ => log::warn!("skipping time signature that is not a simple fraction"),
                }
            }
            "clef" => {
                // Multi-staff parts: only the first staff is converted
                if attribute(child, "number").map_or(true, |n| n == "1") {
                    let shape = text_at(child, &["sign"])
                        .ok_or_else(|| ConvertError::malformed("clef", "missing <sign>"))?;
                    attrs.clef = Some(Clef {
                        shape: shape.to_string(),
                        line: parse_at(child, &["line"])?,
                    });
                }
            }
            "staff-details" => {
                let tuning = read_tuning(child)?;
                if !tuning.is_empty() {
                    attrs.tuning = tuning;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// `<staff-tuning>` entries, lowest string first.
fn read_tuning(staff_details: Node) -> Result<Vec<StringTuning>> {
    let mut strings = Vec::new();
    for (index, node) in children_named(staff_details, "staff-tuning").enumerate() {
        let step_text = text_at(node, &["tuning-step"])
            .ok_or_else(|| ConvertError::malformed("staff-tuning", "missing <tuning-step>"))?;
        let step = Step::parse(step_text).ok_or_else(|| {
            ConvertError::malformed("tuning-step", format!("unknown step '{step_text}'"))
        })?;
        let octave = parse_at(node, &["tuning-octave"])?
            .ok_or_else(|| ConvertError::malformed("staff-tuning", "missing <tuning-octave>"))?;
        // Only whole semitones within a double accidental are kept
        let alter = match text_at(node, &["tuning-alter"]) {
            Some(text) => recover(Accidental::from_alter_text(text), "tuning alteration")?
                .flatten()
                .map(Accidental::alter),
            None => None,
        };
        let string = attribute(node, "line")
            .and_then(|l| l.parse().ok())
            .unwrap_or(index as u32 + 1);
        strings.push(StringTuning {
            string,
            step,
            alter,
            octave,
        });
    }
    strings.sort_by_key(|s| s.string);
    Ok(strings)
}

// ─── Notes ───────────────────────────────────────────────────────────

enum SourceEvent {
    Note(Note),
    Rest(Rest),
}

/// Read the events of one part in one measure, grouping chords.
fn read_events(part_node: Node) -> Result<Vec<Event>> {
    // Only the first voice is converted
    let mut first_voice: Option<&str> = None;
    let mut notes = Vec::new();
    for node in children_named(part_node, "note") {
        if child(node, "grace").is_some() {
            log::debug!("skipping grace note");
            continue;
        }
        if let Some(voice) = text_at(node, &["voice"]) {
            match first_voice {
                None => first_voice = Some(voice),
                Some(first) if first != voice => continue,
                Some(_) => {}
            }
        }
        notes.push(node);
    }

    let mut chords = ChordAccumulator::default();
    for (i, node) in notes.iter().enumerate() {
        let next_has_marker = notes
            .get(i + 1)
            .is_some_and(|next| child(*next, "chord").is_some());
        match read_note(*node)? {
            SourceEvent::Rest(rest) => chords.push_rest(rest),
            SourceEvent::Note(note) => chords.push_note(note, next_has_marker),
        }
    }
    Ok(chords.finish())
}

fn read_note(node: Node) -> Result<SourceEvent> {
    let duration = match text_at(node, &["type"]) {
        Some(name) => recover(Duration::from_note_type(name), "duration")?,
        None => None,
    };
    let ticks = parse_at(node, &["duration"])?;

    if let Some(rest) = child(node, "rest") {
        return Ok(SourceEvent::Rest(Rest {
            duration,
            ticks,
            whole_measure: attribute(rest, "measure") == Some("yes"),
        }));
    }

    let pitch = child(node, "pitch")
        .ok_or_else(|| ConvertError::malformed("note", "missing <pitch>"))?;
    let step_text = text_at(pitch, &["step"])
        .ok_or_else(|| ConvertError::malformed("pitch", "missing <step>"))?;
    let step = Step::parse(step_text)
        .ok_or_else(|| ConvertError::malformed("step", format!("unknown step '{step_text}'")))?;
    let octave = parse_at(pitch, &["octave"])?
        .ok_or_else(|| ConvertError::malformed("pitch", "missing <octave>"))?;

    let accidental = match text_at(pitch, &["alter"]) {
        None => None,
        Some(alter) => recover(Accidental::from_alter_text(alter), "accidental")?.flatten(),
    };

    let technical = child_path(node, &["notations", "technical"]);
    let (tab_string, tab_fret) = match technical {
        Some(t) => (parse_at(t, &["string"])?, parse_at(t, &["fret"])?),
        None => (None, None),
    };

    Ok(SourceEvent::Note(Note {
        step,
        octave,
        accidental,
        duration,
        ticks,
        tab_string,
        tab_fret,
        in_chord: false,
    }))
}
