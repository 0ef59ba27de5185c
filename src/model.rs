//! Intermediate score model shared by both conversion directions.
//!
//! Readers build a complete `Score` from a source document; writers emit
//! a target document from it. Ownership is strictly top-down: a `Score`
//! owns its parts and measures, a measure owns its staves, a staff owns
//! its events, and a chord owns its member notes.

use serde::{Deserialize, Serialize};

use crate::tables::{Accidental, Duration, Step};

/// A complete musical score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Title of the piece
    pub title: Option<String>,
    /// Composers, arrangers, lyricists, ...
    pub contributors: Vec<Contributor>,
    /// Application that encoded the source document
    pub software: Option<String>,
    /// Parts in staff-definition / score-part order
    pub parts: Vec<Part>,
    /// Measures in document order
    pub measures: Vec<Measure>,
}

/// A named person with an optional role ("composer", "lyricist").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    pub role: Option<String>,
}

/// One instrument staff.
///
/// `id` is the MusicXML part id and `staff` the MEI staff number; both
/// address the same part in their format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub staff: u32,
    /// Full label (e.g., "Classical Guitar")
    pub name: Option<String>,
    /// Abbreviated label (e.g., "Guit.")
    pub abbreviation: Option<String>,
    pub instrument: Option<Instrument>,
    /// Definition in force at the start of the piece
    pub attributes: Attributes,
}

/// MIDI playback settings of a part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: Option<String>,
    /// MIDI channel, 1-16
    pub midi_channel: Option<u8>,
    /// MIDI program, 1-128 as MusicXML numbers it
    pub midi_program: Option<u8>,
}

/// Key, meter, clef, divisions and tuning in force for a part.
///
/// Readers resolve the full snapshot for every measure; writers only
/// emit it where it differs from the previous emission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Divisions per quarter note (MEI `ppq`)
    pub divisions: Option<u32>,
    pub key: Option<KeySignature>,
    pub meter: Option<Meter>,
    pub clef: Option<Clef>,
    /// Open-string tuning, lowest string first, sounding pitch
    pub tuning: Vec<StringTuning>,
}

/// Key signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i32,
    /// Mode (e.g., "major", "minor")
    pub mode: Option<String>,
}

/// Time signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    /// Numerator (e.g., 3 in 3/4)
    pub count: u32,
    /// Denominator (e.g., 4 in 3/4)
    pub unit: u32,
}

/// Clef definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clef {
    /// "G", "F", "C", "TAB", ...
    pub shape: String,
    /// Staff line the clef sits on
    pub line: Option<u32>,
}

/// Tuning of one open string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringTuning {
    /// 1 = lowest string
    pub string: u32,
    pub step: Step,
    pub alter: Option<i32>,
    pub octave: i32,
}

/// A single measure (bar) across all parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// 1-based position in the piece
    pub number: u32,
    /// One entry per part present in the measure
    pub staves: Vec<Staff>,
}

/// The content of one part within one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    /// Index into `Score::parts`
    pub part: usize,
    /// Resolved definition in force for this measure
    pub attributes: Attributes,
    pub events: Vec<Event>,
}

/// Something that takes time on a staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Note(Note),
    Rest(Rest),
    Chord(Chord),
}

/// A pitched note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub step: Step,
    /// Octave number (middle C = C4)
    pub octave: i32,
    pub accidental: Option<Accidental>,
    /// Written value; chord members leave this to their chord
    pub duration: Option<Duration>,
    /// Sounding length in divisions
    pub ticks: Option<u32>,
    pub tab_string: Option<u32>,
    pub tab_fret: Option<u32>,
    /// Whether the note belongs to an enclosing `Chord`
    pub in_chord: bool,
}

/// A rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub duration: Option<Duration>,
    pub ticks: Option<u32>,
    /// Fills the whole measure (MEI `mRest`, MusicXML `<rest measure="yes"/>`).
    #[serde(default)]
    pub whole_measure: bool,
}

/// Simultaneous notes sharing one duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub duration: Option<Duration>,
    pub ticks: Option<u32>,
    pub notes: Vec<Note>,
}

impl Score {
    /// Create a new empty score.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn measure_count(&self) -> usize {
        self.measures.len()
    }

    /// Notes across all measures and parts, chord members included.
    pub fn note_count(&self) -> usize {
        self.measures
            .iter()
            .flat_map(|m| &m.staves)
            .flat_map(|s| &s.events)
            .map(Event::note_count)
            .sum()
    }

    /// Index of the part with MEI staff number `staff`.
    pub fn part_for_staff(&self, staff: u32) -> Option<usize> {
        self.parts.iter().position(|p| p.staff == staff)
    }

    /// Index of the part with MusicXML id `id`.
    pub fn part_for_id(&self, id: &str) -> Option<usize> {
        self.parts.iter().position(|p| p.id == id)
    }
}

impl Note {
    /// A note with only its pitch set.
    pub fn new(step: Step, octave: i32) -> Self {
        Self {
            step,
            octave,
            accidental: None,
            duration: None,
            ticks: None,
            tab_string: None,
            tab_fret: None,
            in_chord: false,
        }
    }
}

impl Event {
    /// Number of notes carried by the event (0 for a rest).
    pub fn note_count(&self) -> usize {
        match self {
            Event::Note(_) => 1,
            Event::Rest(_) => 0,
            Event::Chord(chord) => chord.notes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_are_addressable_both_ways() {
        let part = |id: &str, staff| Part {
            id: id.to_string(),
            staff,
            name: None,
            abbreviation: None,
            instrument: None,
            attributes: Attributes::default(),
        };
        let score = Score {
            parts: vec![part("p0", 1), part("p1", 2)],
            ..Score::new()
        };
        assert_eq!(score.part_for_staff(2), Some(1));
        assert_eq!(score.part_for_id("p0"), Some(0));
        assert_eq!(score.part_for_id("P9"), None);
    }

    #[test]
    fn event_note_counts() {
        let chord = Chord {
            duration: Some(Duration::Half),
            ticks: None,
            notes: vec![Note::new(Step::C, 4), Note::new(Step::E, 4)],
        };
        assert_eq!(Event::Chord(chord).note_count(), 2);
        assert_eq!(Event::Rest(Rest::default()).note_count(), 0);
        assert_eq!(Event::Note(Note::new(Step::A, 3)).note_count(), 1);
    }
}
