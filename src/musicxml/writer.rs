//! MusicXML writer: emits a timewise MusicXML 2.0 document from a Score.

use crate::element::{to_xml_string, Element};
use crate::error::Result;
use crate::model::*;
use crate::options::ConvertOptions;
use crate::tables::Duration;

const DOCTYPE: &str = r#"score-timewise PUBLIC "-//Recordare//DTD MusicXML 2.0 Timewise//EN" "http://www.musicxml.org/dtds/timewise.dtd""#;

/// Serialize `score` as a `<score-timewise>` document.
pub fn write_musicxml(score: &Score, options: &ConvertOptions) -> Result<String> {
    let root = build_document(score, options);
    let doctype = options.emit_doctype.then_some(DOCTYPE);
    to_xml_string(&root, doctype, options.indent)
}

/// Build the `<score-timewise>` tree.
pub fn build_document(score: &Score, options: &ConvertOptions) -> Element {
    let mut root = Element::new("score-timewise")
        .attr("version", "2.0")
        .text_child_opt("movement-title", score.title.as_deref());

    if let Some(identification) = identification(score, options) {
        root.push(identification);
    }
    root.push(part_list(score));

    // Last emitted <attributes> per part
    let mut emitted: Vec<Option<Element>> = vec![None; score.parts.len()];

    for measure in &score.measures {
        let mut measure_el = Element::new("measure").attr("number", measure.number);

        for staff in &measure.staves {
            let Some(part) = score.parts.get(staff.part) else {
                continue;
            };
            let mut part_el = Element::new("part").attr("id", &part.id);

            let attributes = attributes_element(&staff.attributes);
            let unchanged = emitted[staff.part]
                .as_ref()
                .is_some_and(|previous| previous.same_definition(&attributes));
            if !unchanged && !attributes.children.is_empty() {
                part_el.push(attributes.clone());
            }
            if unchanged {
                log::debug!("measure {}: attributes of {} unchanged", measure.number, part.id);
            }
            emitted[staff.part] = Some(attributes);

            for event in &staff.events {
                append_event(&mut part_el, event, &staff.attributes);
            }
            measure_el.push(part_el);
        }

        root.push(measure_el);
    }

    root
}

// ─── Header ──────────────────────────────────────────────────────────

fn identification(score: &Score, options: &ConvertOptions) -> Option<Element> {
    let software = score.software.as_deref().or(options.encoder_name.as_deref());
    if score.contributors.is_empty() && software.is_none() {
        return None;
    }

    let mut identification = Element::new("identification");
    for contributor in &score.contributors {
        identification.push(
            Element::with_text("creator", &contributor.name)
                .attr_opt("type", contributor.role.as_deref()),
        );
    }
    if let Some(software) = software {
        identification.push(Element::new("encoding").child(Element::with_text("software", software)));
    }
    Some(identification)
}

fn part_list(score: &Score) -> Element {
    let mut part_list = Element::new("part-list");
    for part in &score.parts {
        let mut score_part = Element::new("score-part").attr("id", &part.id);
        score_part.push(match &part.name {
            Some(name) => Element::with_text("part-name", name),
            None => Element::new("part-name"),
        });
        score_part = score_part.text_child_opt("part-abbreviation", part.abbreviation.as_deref());

        if let Some(instrument) = &part.instrument {
            let instrument_id = format!("{}-I1", part.id);
            let name = instrument.name.as_ref().or(part.name.as_ref());
            if let Some(name) = name {
                score_part.push(
                    Element::new("score-instrument")
                        .attr("id", &instrument_id)
                        .child(Element::with_text("instrument-name", name)),
                );
            }
            if instrument.midi_channel.is_some() || instrument.midi_program.is_some() {
                score_part.push(
                    Element::new("midi-instrument")
                        .attr("id", &instrument_id)
                        .text_child_opt("midi-channel", instrument.midi_channel)
                        .text_child_opt("midi-program", instrument.midi_program),
                );
            }
        }
        part_list.push(score_part);
    }
    part_list
}

// ─── Attributes ──────────────────────────────────────────────────────

fn attributes_element(attrs: &Attributes) -> Element {
    let mut el = Element::new("attributes").text_child_opt("divisions", attrs.divisions);

    if let Some(key) = &attrs.key {
        el.push(
            Element::new("key")
                .child(Element::with_text("fifths", key.fifths))
                .text_child_opt("mode", key.mode.as_deref()),
        );
    }
    if let Some(meter) = &attrs.meter {
        el.push(
            Element::new("time")
                .child(Element::with_text("beats", meter.count))
                .child(Element::with_text("beat-type", meter.unit)),
        );
    }
    if let Some(clef) = &attrs.clef {
        el.push(
            Element::new("clef")
                .child(Element::with_text("sign", &clef.shape))
                .text_child_opt("line", clef.line),
        );
    }
    if !attrs.tuning.is_empty() {
        let mut details =
            Element::new("staff-details").child(Element::with_text("staff-lines", attrs.tuning.len()));
        for string in &attrs.tuning {
            details.push(
                Element::new("staff-tuning")
                    .attr("line", string.string)
                    .child(Element::with_text("tuning-step", string.step.as_str()))
                    .text_child_opt("tuning-alter", string.alter)
                    .child(Element::with_text("tuning-octave", string.octave)),
            );
        }
        el.push(details);
    }
    el
}

// ─── Events ──────────────────────────────────────────────────────────

fn append_event(part: &mut Element, event: &Event, attrs: &Attributes) {
    let divisions = attrs.divisions;
    match event {
        Event::Note(note) => {
            let ticks = sounding_ticks(note.ticks, note.duration, divisions);
            part.push(note_element(note, false, ticks, note.duration));
        }
        Event::Rest(rest) => {
            let mut ticks = sounding_ticks(rest.ticks, rest.duration, divisions);
            let mut marker = Element::new("rest");
            if rest.whole_measure {
                marker.set_attribute("measure", "yes");
                ticks = ticks.or_else(|| measure_ticks(attrs));
            }
            part.push(
                Element::new("note")
                    .child(marker)
                    .text_child_opt("duration", ticks)
                    .child(Element::with_text("voice", 1))
                    .text_child_opt("type", rest.duration.map(|d| d.note_type())),
            );
        }
        Event::Chord(chord) => {
            // Members after the first carry <chord/>
            for (i, note) in chord.notes.iter().enumerate() {
                let duration = chord.duration.or(note.duration);
                let ticks = sounding_ticks(chord.ticks.or(note.ticks), duration, divisions);
                part.push(note_element(note, i > 0, ticks, duration));
            }
        }
    }
}

fn note_element(
    note: &Note,
    chord_marker: bool,
    ticks: Option<u32>,
    duration: Option<Duration>,
) -> Element {
    let mut el = Element::new("note");
    if chord_marker {
        el.push(Element::new("chord"));
    }
    el.push(
        Element::new("pitch")
            .child(Element::with_text("step", note.step.as_str()))
            .text_child_opt("alter", note.accidental.map(|a| a.alter()))
            .child(Element::with_text("octave", note.octave)),
    );
    el = el
        .text_child_opt("duration", ticks)
        .child(Element::with_text("voice", 1))
        .text_child_opt("type", duration.map(|d| d.note_type()))
        .text_child_opt("accidental", note.accidental.map(|a| a.musicxml_name()));

    if note.tab_string.is_some() || note.tab_fret.is_some() {
        el.push(
            Element::new("notations").child(
                Element::new("technical")
                    .text_child_opt("string", note.tab_string)
                    .text_child_opt("fret", note.tab_fret),
            ),
        );
    }
    el
}

/// Length of a full measure in divisions, when the meter divides evenly.
fn measure_ticks(attrs: &Attributes) -> Option<u32> {
    let meter = attrs.meter.as_ref()?;
    let scaled = meter.count.checked_mul(attrs.divisions?)?.checked_mul(4)?;
    (meter.unit != 0 && scaled % meter.unit == 0).then(|| scaled / meter.unit)
}

/// Explicit sounding length, or one derived from the written value.
fn sounding_ticks(
    ticks: Option<u32>,
    duration: Option<Duration>,
    divisions: Option<u32>,
) -> Option<u32> {
    ticks.or_else(|| duration?.ticks(divisions?))
}
