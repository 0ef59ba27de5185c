//! MEI writer: emits an MEI document from a Score.
//!
//! Layout: mei → meiHead + music → body → mdiv → score → scoreDef
//! (with staffGrp) + section → measure → staff → layer → events.
//! A `scoreDef` is written into the section only where the first part's
//! key or meter changes; the header `scoreDef` covers the first measure.

use crate::element::{to_xml_string, Element};
use crate::error::Result;
use crate::model::*;
use crate::options::ConvertOptions;
use crate::tables::{key_sig_to_mei, Duration, PitchToken};

const MEI_NAMESPACE: &str = "http://www.music-encoding.org/ns/mei";
const MEI_VERSION: &str = "2013";

/// Serialize `score` as an MEI document.
pub fn write_mei(score: &Score, options: &ConvertOptions) -> Result<String> {
    let root = build_document(score, options);
    to_xml_string(&root, None, options.indent)
}

/// Build the `<mei>` tree.
pub fn build_document(score: &Score, options: &ConvertOptions) -> Element {
    let mut root = Element::new("mei")
        .attr("xmlns", MEI_NAMESPACE)
        .attr("meiversion", MEI_VERSION);
    root.push(mei_head(score, options));

    let first_definition = score
        .measures
        .first()
        .and_then(lead_attributes)
        .or_else(|| score.parts.first().map(|p| &p.attributes));
    let mut previous = score_def(first_definition);

    let mut staff_grp = Element::new("staffGrp");
    for part in &score.parts {
        staff_grp.push(staff_def(part, options.tablature_octave_shift));
    }
    let header_def = previous.clone().child(staff_grp);

    let mut section = Element::new("section");
    for measure in &score.measures {
        let candidate = score_def(lead_attributes(measure));
        if !candidate.same_definition(&previous) {
            log::debug!("measure {}: score definition changed", measure.number);
            section.push(candidate.clone());
            previous = candidate;
        }
        section.push(measure_element(score, measure));
    }

    let music_score = Element::new("score").child(header_def).child(section);
    root.push(
        Element::new("music").child(
            Element::new("body").child(Element::new("mdiv").child(music_score)),
        ),
    );
    root
}

/// Attributes of the first part present in `measure`.
fn lead_attributes(measure: &Measure) -> Option<&Attributes> {
    measure
        .staves
        .iter()
        .find(|s| s.part == 0)
        .or_else(|| measure.staves.first())
        .map(|s| &s.attributes)
}

// ─── Header ──────────────────────────────────────────────────────────

fn mei_head(score: &Score, options: &ConvertOptions) -> Element {
    let mut title_stmt = Element::new("titleStmt").text_child_opt("title", score.title.as_deref());
    if !score.contributors.is_empty() {
        let mut resp_stmt = Element::new("respStmt");
        for contributor in &score.contributors {
            resp_stmt.push(
                Element::with_text("persName", &contributor.name)
                    .attr_opt("role", contributor.role.as_deref()),
            );
        }
        title_stmt.push(resp_stmt);
    }

    let mut head = Element::new("meiHead").child(
        Element::new("fileDesc")
            .child(title_stmt)
            .child(Element::new("pubStmt")),
    );

    let software = score.software.as_deref().or(options.encoder_name.as_deref());
    if let Some(software) = software {
        head.push(
            Element::new("encodingDesc").child(
                Element::new("appInfo").child(
                    Element::new("application").child(Element::with_text("name", software)),
                ),
            ),
        );
    }
    head
}

// ─── Definitions ─────────────────────────────────────────────────────

fn score_def(attrs: Option<&Attributes>) -> Element {
    let meter = attrs.and_then(|a| a.meter.as_ref());
    let key = attrs.and_then(|a| a.key.as_ref());
    Element::new("scoreDef")
        .attr_opt("meter.count", meter.map(|m| m.count))
        .attr_opt("meter.unit", meter.map(|m| m.unit))
        .attr_opt("key.sig", key.map(|k| key_sig_to_mei(k.fifths)))
        .attr_opt("key.mode", key.and_then(|k| k.mode.as_deref()))
}

fn staff_def(part: &Part, octave_shift: i32) -> Element {
    let attrs = &part.attributes;
    let lines = if attrs.tuning.is_empty() {
        5
    } else {
        attrs.tuning.len()
    };

    let mut el = Element::new("staffDef")
        .attr("n", part.staff)
        .attr("lines", lines)
        .attr_opt("label", part.name.as_deref())
        .attr_opt("label.abbr", part.abbreviation.as_deref())
        .attr_opt("clef.shape", attrs.clef.as_ref().map(|c| c.shape.as_str()))
        .attr_opt("clef.line", attrs.clef.as_ref().and_then(|c| c.line))
        .attr_opt("ppq", attrs.divisions)
        .attr_opt("key.sig", attrs.key.as_ref().map(|k| key_sig_to_mei(k.fifths)))
        .attr_opt("key.mode", attrs.key.as_ref().and_then(|k| k.mode.as_deref()));

    if !attrs.tuning.is_empty() {
        // Written pitch, highest string first
        let strings: Option<Vec<String>> = attrs
            .tuning
            .iter()
            .rev()
            .map(|s| {
                let octave = s.octave.checked_add(octave_shift)?;
                Some(
                    PitchToken {
                        step: s.step,
                        alter: s.alter.unwrap_or(0),
                        octave,
                    }
                    .to_token(),
                )
            })
            .collect();
        match strings {
            Some(strings) => el.set_attribute("tab.strings", strings.join(" ")),
            None => log::warn!("staff {}: tuning octave out of range; omitting tab.strings", part.staff),
        }
    }

    if let Some(instrument) = &part.instrument {
        el.push(
            Element::new("instrDef")
                .attr_opt("midi.channel", instrument.midi_channel)
                // MusicXML numbers programs from 1, MEI from 0
                .attr_opt("midi.instrnum", instrument.midi_program.map(|p| p.saturating_sub(1)))
                .attr_opt(
                    "midi.instrname",
                    instrument.name.as_ref().map(|n| n.replace(' ', "_")),
                ),
        );
    }
    el
}

// ─── Measures ────────────────────────────────────────────────────────

fn measure_element(score: &Score, measure: &Measure) -> Element {
    let mut el = Element::new("measure").attr("n", measure.number);
    for staff in &measure.staves {
        let Some(part) = score.parts.get(staff.part) else {
            continue;
        };
        let mut layer = Element::new("layer").attr("n", 1);
        for event in &staff.events {
            layer.push(event_element(event));
        }
        el.push(Element::new("staff").attr("n", part.staff).child(layer));
    }
    el
}

fn event_element(event: &Event) -> Element {
    match event {
        Event::Note(note) => note_element(note),
        Event::Rest(rest) => {
            let name = if rest.whole_measure { "mRest" } else { "rest" };
            with_duration(Element::new(name), rest.duration, rest.ticks)
        }
        Event::Chord(chord) => {
            let mut el = with_duration(Element::new("chord"), chord.duration, chord.ticks);
            for note in &chord.notes {
                el.push(note_element(note));
            }
            el
        }
    }
}

fn note_element(note: &Note) -> Element {
    let el = Element::new("note")
        .attr("pname", note.step.mei_name())
        .attr("oct", note.octave)
        .attr_opt("accid", note.accidental.map(|a| a.mei_code()))
        .attr_opt("tab.string", note.tab_string)
        .attr_opt("tab.fret", note.tab_fret);
    with_duration(el, note.duration, note.ticks)
}

fn with_duration(el: Element, duration: Option<Duration>, ticks: Option<u32>) -> Element {
    el.attr_opt("dur", duration.map(|d| d.mei_code()))
        .attr_opt("dur.ges", ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Step;
    use pretty_assertions::assert_eq;

    fn part() -> Part {
        Part {
            id: "P1".into(),
            staff: 1,
            name: Some("Classical Guitar".into()),
            abbreviation: Some("Guit.".into()),
            instrument: Some(Instrument {
                name: Some("Classical Guitar".into()),
                midi_channel: Some(1),
                midi_program: Some(25),
            }),
            attributes: Attributes {
                divisions: Some(2),
                clef: Some(Clef {
                    shape: "TAB".into(),
                    line: Some(5),
                }),
                tuning: vec![
                    StringTuning { string: 1, step: Step::E, alter: None, octave: 2 },
                    StringTuning { string: 2, step: Step::A, alter: None, octave: 2 },
                    StringTuning { string: 3, step: Step::F, alter: Some(1), octave: 3 },
                ],
                ..Attributes::default()
            },
        }
    }

    fn measure(number: u32, count: u32) -> Measure {
        Measure {
            number,
            staves: vec![Staff {
                part: 0,
                attributes: Attributes {
                    meter: Some(Meter { count, unit: 4 }),
                    key: Some(KeySignature { fifths: -3, mode: None }),
                    ..Attributes::default()
                },
                events: vec![Event::Note(Note {
                    duration: Some(Duration::Quarter),
                    ticks: Some(2),
                    ..Note::new(Step::G, 3)
                })],
            }],
        }
    }

    #[test]
    fn score_def_only_on_change() {
        let score = Score {
            parts: vec![part()],
            measures: vec![measure(1, 4), measure(2, 4), measure(3, 4), measure(4, 3)],
            ..Score::new()
        };
        let root = build_document(&score, &ConvertOptions::default());
        let defs = root.descendants_named("scoreDef");
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].attribute("meter.count"), Some("4"));
        assert_eq!(defs[0].attribute("key.sig"), Some("3f"));
        assert_eq!(defs[1].attribute("meter.count"), Some("3"));

        let section = root.descendants_named("section")[0];
        let names: Vec<&str> = section.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["measure", "measure", "measure", "scoreDef", "measure"]);
    }

    #[test]
    fn staff_def_carries_written_tuning() {
        let el = staff_def(&part(), 1);
        assert_eq!(el.attribute("tab.strings"), Some("f#4 a3 e3"));
        assert_eq!(el.attribute("lines"), Some("3"));
        assert_eq!(el.attribute("label.abbr"), Some("Guit."));
        let instr_def = el.find("instrDef").unwrap();
        assert_eq!(instr_def.attribute("midi.instrnum"), Some("24"));
        assert_eq!(instr_def.attribute("midi.instrname"), Some("Classical_Guitar"));
    }

    #[test]
    fn metadata_never_uses_placeholders() {
        let score = Score {
            parts: vec![part()],
            ..Score::new()
        };
        let root = build_document(&score, &ConvertOptions::default());
        assert!(root.descendants_named("title").is_empty());
        assert!(root.descendants_named("respStmt").is_empty());
        assert!(root.descendants_named("encodingDesc").is_empty());
    }

    #[test]
    fn out_of_range_tuning_octave_omits_strings() {
        let mut part = part();
        part.attributes.tuning[0].octave = i32::MAX;
        let el = staff_def(&part, 1);
        assert_eq!(el.attribute("tab.strings"), None);
        assert_eq!(el.attribute("lines"), Some("3"));
    }

    #[test]
    fn whole_measure_rest_is_m_rest() {
        let el = event_element(&Event::Rest(Rest {
            ticks: Some(12),
            whole_measure: true,
            ..Rest::default()
        }));
        assert_eq!(el.name, "mRest");
        assert_eq!(el.attribute("dur.ges"), Some("12"));
        let el = event_element(&Event::Rest(Rest {
            duration: Some(Duration::Half),
            ..Rest::default()
        }));
        assert_eq!(el.name, "rest");
    }

    #[test]
    fn notes_carry_duration_attributes() {
        let el = note_element(&Note {
            duration: Some(Duration::Eighth),
            ticks: Some(1),
            tab_string: Some(6),
            tab_fret: Some(0),
            ..Note::new(Step::E, 3)
        });
        assert_eq!(el.attribute("pname"), Some("e"));
        assert_eq!(el.attribute("dur"), Some("8"));
        assert_eq!(el.attribute("dur.ges"), Some("1"));
        assert_eq!(el.attribute("tab.fret"), Some("0"));
        assert_eq!(el.attribute("accid"), None);
    }
}
