//! MEI reader: converts an MEI document into the Score data model.
//!
//! Score-level definitions are inherited: a measure sees the most recent
//! `scoreDef`/`staffDef` preceding it in document order. The reader walks
//! the `<score>` in document order once and keeps that running state, so
//! each measure is read against the definitions in force at its start.

use std::collections::HashMap;

use roxmltree::Node;

use crate::error::{recover, ConvertError, Result};
use crate::model::*;
use crate::options::ConvertOptions;
use crate::query::{
    attribute, child, child_path, children_named, is_named, parse_attribute, parse_document,
    required_attribute,
};
use crate::tables::{key_sig_from_mei, Accidental, Duration, PitchToken, Step};

/// Parse an MEI document into a Score.
pub fn read_mei(xml: &str, options: &ConvertOptions) -> Result<Score> {
    let doc = parse_document(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "mei" {
        return Err(ConvertError::UnsupportedRootElement {
            found: root.tag_name().name().to_string(),
            expected: "<mei>".to_string(),
        });
    }

    let mut score = Score::new();
    if let Some(head) = child(root, "meiHead") {
        read_header(head, &mut score);
    }

    // meiHead may hold incipit scores; only the one under <music> counts
    let music = child(root, "music")
        .and_then(|m| m.descendants().find(|n| is_named(*n, "score")))
        .ok_or_else(|| ConvertError::malformed("mei", "missing <score>"))?;
    let header_def = child(music, "scoreDef")
        .ok_or_else(|| ConvertError::malformed("score", "missing <scoreDef>"))?;

    let mut definitions = Definitions::new(options.tablature_octave_shift);
    for staff_def in header_def.descendants().filter(|n| is_named(*n, "staffDef")) {
        let part = read_part(staff_def, score.parts.len())?;
        score.parts.push(part);
    }
    definitions.apply_score_def(header_def)?;
    for (index, part) in score.parts.iter_mut().enumerate() {
        part.attributes = definitions.snapshot(part.staff);
        log::debug!("staff {} defined as part {}", part.staff, index);
    }

    for node in music.descendants().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "scoreDef" if node != header_def => definitions.apply_score_def(node)?,
            "staffDef" if !is_header_staff_def(node, header_def) => {
                definitions.apply_staff_def(node)?
            }
            "measure" => {
                let number = score.measures.len() as u32 + 1;
                let measure = read_measure(node, number, &score, &definitions)?;
                score.measures.push(measure);
            }
            _ => {}
        }
    }

    log::debug!(
        "read {} part(s), {} measure(s) from MEI",
        score.parts.len(),
        score.measures.len()
    );
    Ok(score)
}

fn is_header_staff_def(node: Node, header_def: Node) -> bool {
    node.ancestors().any(|a| a == header_def)
}

// ─── Header ──────────────────────────────────────────────────────────

fn read_header(head: Node, score: &mut Score) {
    let title_stmt = child_path(head, &["fileDesc", "titleStmt"]);

    score.title = title_stmt
        .and_then(|t| child(t, "title"))
        .and_then(|t| t.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);

    if let Some(title_stmt) = title_stmt {
        for pers_name in title_stmt.descendants().filter(|n| is_named(*n, "persName")) {
            let Some(name) = pers_name.text().map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            score.contributors.push(Contributor {
                name: name.to_string(),
                role: attribute(pers_name, "role").map(String::from),
            });
        }
    }

    // <application><name>X</name></application>, or bare application text
    let application = head
        .descendants()
        .find(|n| is_named(*n, "application"));
    score.software = application
        .and_then(|app| {
            child(app, "name")
                .and_then(|n| n.text())
                .or_else(|| app.text())
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);
}

// ─── Staff definitions ───────────────────────────────────────────────

fn read_part(staff_def: Node, index: usize) -> Result<Part> {
    let staff: u32 = parse_attribute(staff_def, "n")?
        .ok_or_else(|| ConvertError::malformed("staffDef", "missing @n"))?;
    let name = attribute(staff_def, "label")
        .or_else(|| attribute(staff_def, "label.full"))
        .map(String::from);

    let instrument = match child(staff_def, "instrDef") {
        None => None,
        Some(instr_def) => {
            let program: Option<u8> = parse_attribute(instr_def, "midi.instrnum")?;
            Some(Instrument {
                name: attribute(instr_def, "midi.instrname")
                    .map(|n| n.replace('_', " "))
                    .or_else(|| name.clone()),
                midi_channel: parse_attribute(instr_def, "midi.channel")?,
                // MEI numbers programs from 0, MusicXML from 1
                midi_program: program.map(|p| p.saturating_add(1)),
            })
        }
    };

    Ok(Part {
        id: format!("p{index}"),
        staff,
        name,
        abbreviation: attribute(staff_def, "label.abbr").map(String::from),
        instrument,
        attributes: Attributes::default(),
    })
}

/// Definitions in force at the current point of the walk.
struct Definitions {
    tablature_octave_shift: i32,
    key: Option<KeySignature>,
    meter: Option<Meter>,
    staves: HashMap<u32, Attributes>,
}

impl Definitions {
    fn new(tablature_octave_shift: i32) -> Self {
        Self {
            tablature_octave_shift,
            key: None,
            meter: None,
            staves: HashMap::new(),
        }
    }

    /// A `scoreDef` sets key and meter for every staff; nested
    /// `staffDef`s are applied after it.
    fn apply_score_def(&mut self, node: Node) -> Result<()> {
        if let Some(key) = read_key(node, self.key.as_ref()) {
            self.key = Some(key);
            for staff in self.staves.values_mut() {
                staff.key = None;
            }
        }
        if let Some(meter) = read_meter(node)? {
            self.meter = Some(meter);
            for staff in self.staves.values_mut() {
                staff.meter = None;
            }
        }
        for staff_def in node.descendants().filter(|n| is_named(*n, "staffDef")) {
            self.apply_staff_def(staff_def)?;
        }
        Ok(())
    }

    fn apply_staff_def(&mut self, node: Node) -> Result<()> {
        let Some(n) = parse_attribute::<u32>(node, "n")? else {
            log::debug!("skipping staffDef without @n");
            return Ok(());
        };
        let shift = self.tablature_octave_shift;
        let staff = self.staves.entry(n).or_default();

        if let Some(ppq) = parse_attribute(node, "ppq")? {
            staff.divisions = Some(ppq);
        }
        if let Some(key) = read_key(node, staff.key.as_ref().or(self.key.as_ref())) {
            staff.key = Some(key);
        }
        if let Some(meter) = read_meter(node)? {
            staff.meter = Some(meter);
        }
        if let Some(shape) = attribute(node, "clef.shape") {
            staff.clef = Some(Clef {
                shape: shape.to_string(),
                line: parse_attribute(node, "clef.line")?,
            });
        }
        if let Some(strings) = attribute(node, "tab.strings") {
            staff.tuning = read_tab_strings(strings, shift)?;
        }
        Ok(())
    }

    fn snapshot(&self, staff: u32) -> Attributes {
        let mut attrs = self.staves.get(&staff).cloned().unwrap_or_default();
        attrs.key = attrs.key.or_else(|| self.key.clone());
        attrs.meter = attrs.meter.or_else(|| self.meter.clone());
        attrs
    }
}

/// Key in force after `node`. A `key.sig` with no fifths count (such as
/// `mixed`) leaves the current key untouched.
fn read_key(node: Node, current: Option<&KeySignature>) -> Option<KeySignature> {
    let mode = attribute(node, "key.mode").map(String::from);
    if let Some(sig) = attribute(node, "key.sig") {
        match key_sig_from_mei(sig) {
            Some(fifths) => return Some(KeySignature { fifths, mode }),
            None => {
                log::debug!("<{}>: unreadable @key.sig '{sig}'; keeping current key", node.tag_name().name());
                return None;
            }
        }
    }
    // A mode change alone keeps the signature
    mode.and_then(|mode| {
        current.map(|key| KeySignature {
            fifths: key.fifths,
            mode: Some(mode),
        })
    })
}

fn read_meter(node: Node) -> Result<Option<Meter>> {
    let count = parse_attribute(node, "meter.count")?;
    let unit = parse_attribute(node, "meter.unit")?;
    Ok(match (count, unit) {
        (Some(count), Some(unit)) => Some(Meter { count, unit }),
        _ => None,
    })
}

/// `tab.strings` lists written pitches highest string first; the model
/// keeps sounding pitches lowest string first.
fn read_tab_strings(strings: &str, octave_shift: i32) -> Result<Vec<StringTuning>> {
    let mut tuning = strings
        .split_whitespace()
        .map(|token| {
            PitchToken::parse(token).ok_or_else(|| {
                ConvertError::malformed("staffDef", format!("unreadable @tab.strings token '{token}'"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    tuning.reverse();

    tuning
        .into_iter()
        .enumerate()
        .map(|(i, pitch)| {
            let octave = pitch.octave.checked_sub(octave_shift).ok_or_else(|| {
                ConvertError::malformed("staffDef", format!("@tab.strings octave {} out of range", pitch.octave))
            })?;
            Ok(StringTuning {
                string: i as u32 + 1,
                step: pitch.step,
                alter: (pitch.alter != 0).then_some(pitch.alter),
                octave,
            })
        })
        .collect()
}

// ─── Measures ────────────────────────────────────────────────────────

fn read_measure(node: Node, number: u32, score: &Score, definitions: &Definitions) -> Result<Measure> {
    let mut staves = Vec::new();

    for (position, staff_node) in children_named(node, "staff").enumerate() {
        let n = parse_attribute::<u32>(staff_node, "n")?.unwrap_or(position as u32 + 1);
        let Some(part) = score.part_for_staff(n) else {
            log::warn!("measure {number}: staff {n} has no staffDef, skipping");
            continue;
        };

        let mut layers = children_named(staff_node, "layer");
        let events = match layers.next() {
            Some(layer) => read_layer(layer)?,
            None => Vec::new(),
        };
        if layers.next().is_some() {
            log::debug!("measure {number}: staff {n} has more than one layer, reading the first");
        }

        staves.push(Staff {
            part,
            attributes: definitions.snapshot(n),
            events,
        });
    }

    Ok(Measure { number, staves })
}

fn read_layer(layer: Node) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    collect_events(layer, &mut events)?;
    Ok(events)
}

fn collect_events(container: Node, events: &mut Vec<Event>) -> Result<()> {
    for node in container.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "note" => events.push(Event::Note(read_note(node)?)),
            name @ ("rest" | "mRest") => events.push(Event::Rest(Rest {
                duration: read_duration(node)?,
                ticks: read_ticks(node),
                whole_measure: name == "mRest",
            })),
            "chord" => {
                let notes = children_named(node, "note")
                    .map(|n| {
                        read_note(n).map(|note| Note {
                            in_chord: true,
                            ..note
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let duration = read_duration(node)?.or_else(|| notes.iter().find_map(|n| n.duration));
                let ticks = read_ticks(node).or_else(|| notes.iter().find_map(|n| n.ticks));
                let notes = notes
                    .into_iter()
                    .map(|n| Note {
                        duration: None,
                        ticks: None,
                        ..n
                    })
                    .collect();
                events.push(Event::Chord(Chord {
                    duration,
                    ticks,
                    notes,
                }));
            }
            "beam" => collect_events(node, events)?,
            other => log::debug!("skipping <{other}> in layer"),
        }
    }
    Ok(())
}

fn read_note(node: Node) -> Result<Note> {
    let pname = required_attribute(node, "pname")?;
    let step = Step::parse(pname)
        .ok_or_else(|| ConvertError::malformed("note", format!("unknown @pname '{pname}'")))?;
    let octave = parse_attribute(node, "oct")?
        .ok_or_else(|| ConvertError::malformed("note", "missing @oct"))?;

    Ok(Note {
        step,
        octave,
        accidental: read_accidental(node)?,
        duration: read_duration(node)?,
        ticks: read_ticks(node),
        tab_string: parse_attribute(node, "tab.string")?,
        tab_fret: parse_attribute(node, "tab.fret")?,
        in_chord: false,
    })
}

/// `@accid`, then `@accid.ges`, then a child `<accid>`.
fn read_accidental(node: Node) -> Result<Option<Accidental>> {
    let code = attribute(node, "accid")
        .or_else(|| attribute(node, "accid.ges"))
        .or_else(|| {
            child(node, "accid")
                .and_then(|a| attribute(a, "accid").or_else(|| attribute(a, "accid.ges")))
        });
    match code {
        None | Some("n") => Ok(None),
        Some(code) => recover(Accidental::from_mei(code), "accidental"),
    }
}

fn read_duration(node: Node) -> Result<Option<Duration>> {
    match attribute(node, "dur") {
        Some(code) => recover(Duration::from_mei(code), "duration"),
        None => Ok(None),
    }
}

/// `@dur.ges` in divisions; a trailing `p` is accepted.
fn read_ticks(node: Node) -> Option<u32> {
    let text = attribute(node, "dur.ges")?;
    match text.trim_end_matches('p').parse() {
        Ok(ticks) => Some(ticks),
        Err(_) => {
            log::warn!("unreadable @dur.ges '{text}'; omitting sounding duration");
            None
        }
    }
}
