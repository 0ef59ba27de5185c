//! Chord grouping for MusicXML note sequences.
//!
//! MusicXML marks only the continuation notes of a chord with `<chord/>`;
//! the note that starts a chord looks like any other note. Membership is
//! therefore decided one note ahead: a note joins (or opens) a chord when
//! its successor carries the marker, and the chord closes on the first
//! member whose successor does not.

use crate::model::{Chord, Event, Note, Rest};

enum State {
    Idle,
    Accumulating(Chord),
}

/// Collects a layer's events, folding chord members into `Chord`s.
pub struct ChordAccumulator {
    state: State,
    events: Vec<Event>,
}

impl ChordAccumulator {
    /// Add a note; `next_has_marker` tells whether the following note in
    /// the sequence carries `<chord/>`.
    pub fn push_note(&mut self, mut note: Note, next_has_marker: bool) {
        let state = std::mem::replace(&mut self.state, State::Idle);
        let mut chord = match state {
            State::Accumulating(chord) => chord,
            State::Idle if next_has_marker => Chord {
                duration: note.duration,
                ticks: note.ticks,
                notes: Vec::new(),
            },
            State::Idle => {
                self.events.push(Event::Note(note));
                return;
            }
        };

        note.in_chord = true;
        note.duration = None;
        note.ticks = None;
        chord.notes.push(note);

        if next_has_marker {
            self.state = State::Accumulating(chord);
        } else {
            self.events.push(Event::Chord(chord));
        }
    }

    /// Add a rest. Rests cannot be chord members, so an open chord closes.
    pub fn push_rest(&mut self, rest: Rest) {
        self.close();
        self.events.push(Event::Rest(rest));
    }

    fn close(&mut self) {
        if let State::Accumulating(chord) = std::mem::replace(&mut self.state, State::Idle) {
            self.events.push(Event::Chord(chord));
        }
    }

    pub fn finish(mut self) -> Vec<Event> {
        self.close();
        self.events
    }
}

impl Default for ChordAccumulator {
    fn default() -> Self {
        Self {
            state: State::Idle,
            events: Vec::new(),
        }
    }
}
