//! Integration tests: MEI documents converted to timewise MusicXML.

use meixml::query::parse_document;
use meixml::tables::{Duration, Step};
use meixml::{mei_to_musicxml, musicxml_to_mei, read_mei, ConvertError, ConvertOptions, Event};
use pretty_assertions::assert_eq;
use roxmltree::Node;
use std::path::PathBuf;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn named<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Vec<Node<'a, 'input>> {
    node.descendants().filter(|n| n.tag_name().name() == name).collect()
}

fn text_of(node: Node, name: &str) -> Option<String> {
    named(node, name).first().and_then(|n| n.text()).map(String::from)
}

fn single_note_mei(pname: &str, oct: i32, dur: &str) -> String {
    format!(
        r#"<mei xmlns="http://www.music-encoding.org/ns/mei">
  <music><body><mdiv><score>
    <scoreDef><staffGrp><staffDef n="1" lines="5"/></staffGrp></scoreDef>
    <section>
      <measure n="1"><staff n="1"><layer n="1">
        <note pname="{pname}" oct="{oct}" dur="{dur}"/>
      </layer></staff></measure>
    </section>
  </score></mdiv></body></music>
</mei>"#
    )
}

// ─── Guitar study ───────────────────────────────────────────────────

#[test]
fn guitar_study_metadata_and_part_list() {
    let xml = mei_to_musicxml(&fixture("guitar.mei"), &ConvertOptions::default()).unwrap();
    assert!(xml.contains("DTD MusicXML 2.0 Timewise"));

    let doc = parse_document(&xml).unwrap();
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "score-timewise");
    assert_eq!(text_of(root, "movement-title").as_deref(), Some("Study in E minor"));

    let creators: Vec<(Option<&str>, Option<&str>)> = named(root, "creator")
        .iter()
        .map(|c| (c.attribute("type"), c.text()))
        .collect();
    assert_eq!(
        creators,
        vec![
            (Some("composer"), Some("Francisco Tárrega")),
            (Some("arranger"), Some("A. Student")),
        ]
    );
    assert_eq!(text_of(root, "software").as_deref(), Some("Tabulator 1.2"));

    let score_part = named(root, "score-part")[0];
    assert_eq!(score_part.attribute("id"), Some("p0"));
    assert_eq!(text_of(score_part, "part-name").as_deref(), Some("Classical Guitar"));
    assert_eq!(text_of(score_part, "part-abbreviation").as_deref(), Some("Guit."));
    assert_eq!(text_of(score_part, "instrument-name").as_deref(), Some("Acoustic Guitar"));
    assert_eq!(text_of(score_part, "midi-channel").as_deref(), Some("1"));
    assert_eq!(text_of(score_part, "midi-program").as_deref(), Some("25"));
}

#[test]
fn guitar_study_tuning_is_sounding_and_low_to_high() {
    let xml = mei_to_musicxml(&fixture("guitar.mei"), &ConvertOptions::default()).unwrap();
    let doc = parse_document(&xml).unwrap();
    let first_measure = named(doc.root_element(), "measure")[0];

    assert_eq!(text_of(first_measure, "staff-lines").as_deref(), Some("6"));
    let tuning: Vec<(String, String, String)> = named(first_measure, "staff-tuning")
        .iter()
        .map(|t| {
            (
                t.attribute("line").unwrap_or_default().to_string(),
                text_of(*t, "tuning-step").unwrap_or_default(),
                text_of(*t, "tuning-octave").unwrap_or_default(),
            )
        })
        .collect();
    let expected: Vec<(String, String, String)> = [
        ("1", "E", "2"),
        ("2", "A", "2"),
        ("3", "D", "3"),
        ("4", "G", "3"),
        ("5", "B", "3"),
        ("6", "E", "4"),
    ]
    .iter()
    .map(|(l, s, o)| (l.to_string(), s.to_string(), o.to_string()))
    .collect();
    assert_eq!(tuning, expected);

    assert_eq!(text_of(first_measure, "sign").as_deref(), Some("TAB"));
    assert_eq!(text_of(first_measure, "fifths").as_deref(), Some("1"));
    assert_eq!(text_of(first_measure, "mode").as_deref(), Some("minor"));
    assert_eq!(text_of(first_measure, "beats").as_deref(), Some("3"));
}

#[test]
fn tuning_round_trips_through_musicxml() {
    let options = ConvertOptions::default();
    let xml = mei_to_musicxml(&fixture("guitar.mei"), &options).unwrap();
    let mei = musicxml_to_mei(&xml, &options).unwrap();

    let doc = parse_document(&mei).unwrap();
    let staff_def = named(doc.root_element(), "staffDef")[0];
    assert_eq!(staff_def.attribute("tab.strings"), Some("e5 b4 g4 d4 a3 e3"));
    assert_eq!(staff_def.attribute("lines"), Some("6"));
}

#[test]
fn guitar_study_events() {
    let xml = mei_to_musicxml(&fixture("guitar.mei"), &ConvertOptions::default()).unwrap();
    let doc = parse_document(&xml).unwrap();
    let measures = named(doc.root_element(), "measure");
    assert_eq!(measures.len(), 3);

    // Chord members after the first carry <chord/>; beams are flattened
    let notes = named(measures[0], "note");
    let markers: Vec<bool> = notes.iter().map(|n| !named(*n, "chord").is_empty()).collect();
    assert_eq!(markers, vec![false, false, true, true, false, false]);
    let durations: Vec<Option<String>> = notes.iter().map(|n| text_of(*n, "duration")).collect();
    assert_eq!(
        durations,
        vec![Some("2".into()), Some("2".into()), Some("2".into()), Some("2".into()), Some("1".into()), Some("1".into())]
    );
    assert_eq!(text_of(notes[4], "alter").as_deref(), Some("1"));
    assert_eq!(text_of(notes[4], "accidental").as_deref(), Some("sharp"));
    assert_eq!(text_of(notes[4], "fret").as_deref(), Some("2"));

    // Second layer ignored, unchanged attributes suppressed, duration
    // derived from ppq when dur.ges is absent
    let notes = named(measures[1], "note");
    assert_eq!(notes.len(), 2);
    assert!(named(measures[1], "attributes").is_empty());
    assert_eq!(text_of(notes[0], "duration").as_deref(), Some("4"));
    assert_eq!(text_of(notes[0], "type").as_deref(), Some("half"));
    assert!(!named(notes[1], "rest").is_empty());

    // Meter change re-emits the block
    assert_eq!(text_of(measures[2], "beats").as_deref(), Some("2"));
    assert_eq!(text_of(measures[2], "duration").as_deref(), Some("4"));
    assert_eq!(text_of(measures[2], "accidental").as_deref(), Some("flat"));
}

// ─── Round trip ─────────────────────────────────────────────────────

#[test]
fn single_notes_survive_round_trip() {
    let options = ConvertOptions::default();
    let steps = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];
    let durations = [
        Duration::Whole,
        Duration::Half,
        Duration::Quarter,
        Duration::Eighth,
        Duration::Sixteenth,
    ];

    for step in steps {
        for octave in 0..=9 {
            for duration in durations {
                let source = single_note_mei(step.mei_name(), octave, &duration.mei_code());
                let xml = mei_to_musicxml(&source, &options).unwrap();
                let back = musicxml_to_mei(&xml, &options).unwrap();
                let score = read_mei(&back, &options).unwrap();

                let events = &score.measures[0].staves[0].events;
                let Event::Note(note) = &events[0] else {
                    panic!("expected a note for {step:?}{octave} {duration:?}, got {events:?}");
                };
                assert_eq!(
                    (note.step, note.octave, note.duration),
                    (step, octave, Some(duration))
                );
            }
        }
    }
}

#[test]
fn measure_rest_round_trips() {
    let options = ConvertOptions::default();
    let source = single_note_mei("c", 4, "4")
        .replace(r#"<staffDef n="1" lines="5"/>"#, r#"<staffDef n="1" lines="5" ppq="2" meter.count="3" meter.unit="4"/>"#)
        .replace(r#"<note pname="c" oct="4" dur="4"/>"#, "<mRest/>");
    let xml = mei_to_musicxml(&source, &options).unwrap();
    let doc = parse_document(&xml).unwrap();
    let note = named(doc.root_element(), "note")[0];
    assert_eq!(named(note, "rest")[0].attribute("measure"), Some("yes"));
    assert_eq!(text_of(note, "duration").as_deref(), Some("6"));

    let back = musicxml_to_mei(&xml, &options).unwrap();
    let doc = parse_document(&back).unwrap();
    let m_rest = named(doc.root_element(), "mRest");
    assert_eq!(m_rest.len(), 1);
    assert_eq!(m_rest[0].attribute("dur.ges"), Some("6"));
}

// ─── Errors ─────────────────────────────────────────────────────────

#[test]
fn note_without_octave_is_fatal() {
    let source = single_note_mei("c", 4, "4").replace(r#" oct="4""#, "");
    let result = mei_to_musicxml(&source, &ConvertOptions::default());
    assert!(matches!(
        result,
        Err(ConvertError::MalformedSourceElement { ref element, .. }) if element == "note"
    ));
}

#[test]
fn unknown_codes_are_dropped_not_fatal() {
    let source = single_note_mei("c", 4, "4").replace(r#"dur="4""#, r#"dur="quarter" accid="q""#);
    let xml = mei_to_musicxml(&source, &ConvertOptions::default()).unwrap();
    let doc = parse_document(&xml).unwrap();
    let note = named(doc.root_element(), "note")[0];
    assert_eq!(text_of(note, "step").as_deref(), Some("C"));
    assert!(named(note, "type").is_empty());
    assert!(named(note, "alter").is_empty());
}

#[test]
fn other_roots_are_rejected() {
    let result = mei_to_musicxml("<score-timewise/>", &ConvertOptions::default());
    assert!(matches!(result, Err(ConvertError::UnsupportedRootElement { .. })));
}

#[test]
fn compact_output_is_one_line() {
    let options = ConvertOptions {
        indent: 0,
        emit_doctype: false,
        ..ConvertOptions::default()
    };
    let xml = mei_to_musicxml(&single_note_mei("g", 3, "2"), &options).unwrap();
    assert_eq!(xml.lines().count(), 1);
    assert!(!xml.contains("DOCTYPE"));
}
