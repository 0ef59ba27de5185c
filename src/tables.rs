//! Lookup tables shared by both conversion directions.
//!
//! - pitch steps and the chromatic pitch-class ring
//! - accidental codes: MEI `s`/`ss`/`f`/`ff` ↔ MusicXML `alter`
//! - durations: MEI `dur` codes ↔ MusicXML `type` names
//! - key signatures: MusicXML `fifths` ↔ MEI `key.sig`
//! - compact tuning tokens (`"c#4"`) used by MEI `tab.strings`

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

// ─── Pitch steps ─────────────────────────────────────────────────────

/// Diatonic pitch name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// Parse a step letter in either case (`"C"`, `"c"`).
    pub fn parse(text: &str) -> Option<Step> {
        let mut chars = text.trim().chars();
        let step = chars.next().and_then(Step::from_letter)?;
        chars.next().is_none().then_some(step)
    }

    pub fn from_letter(letter: char) -> Option<Step> {
        match letter.to_ascii_uppercase() {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }

    /// Upper-case letter, as MusicXML writes it.
    pub fn as_str(self) -> &'static str {
        match self {
            Step::C => "C",
            Step::D => "D",
            Step::E => "E",
            Step::F => "F",
            Step::G => "G",
            Step::A => "A",
            Step::B => "B",
        }
    }

    /// Lower-case letter, as MEI writes `@pname`.
    pub fn mei_name(self) -> &'static str {
        match self {
            Step::C => "c",
            Step::D => "d",
            Step::E => "e",
            Step::F => "f",
            Step::G => "g",
            Step::A => "a",
            Step::B => "b",
        }
    }

    /// Semitones above C.
    pub fn semitone(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }
}

/// The chromatic scale from C, sharps only.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch-class name of `step` moved by `alteration` semitones.
///
/// Wraps around the octave without carrying into the octave number.
pub fn transpose_pitch_class(step: Step, alteration: i32) -> &'static str {
    let index = (i64::from(step.semitone()) + i64::from(alteration)).rem_euclid(12);
    PITCH_CLASSES[index as usize]
}

// ─── Accidentals ─────────────────────────────────────────────────────

/// A written chromatic alteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accidental {
    DoubleFlat,
    Flat,
    Sharp,
    DoubleSharp,
}

impl Accidental {
    /// Map a MusicXML `alter` value. Zero means "no accidental".
    pub fn from_alter(alter: i32) -> Result<Option<Accidental>> {
        match alter {
            -2 => Ok(Some(Accidental::DoubleFlat)),
            -1 => Ok(Some(Accidental::Flat)),
            0 => Ok(None),
            1 => Ok(Some(Accidental::Sharp)),
            2 => Ok(Some(Accidental::DoubleSharp)),
            other => Err(ConvertError::UnknownAccidental(other.to_string())),
        }
    }

    /// Map the text of a MusicXML `<alter>`, which is a decimal.
    pub fn from_alter_text(text: &str) -> Result<Option<Accidental>> {
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| ConvertError::UnknownAccidental(text.trim().to_string()))?;
        if value.fract() != 0.0 {
            return Err(ConvertError::UnknownAccidental(text.trim().to_string()));
        }
        Accidental::from_alter(value as i32)
    }

    /// Map an MEI `@accid` code.
    pub fn from_mei(code: &str) -> Result<Accidental> {
        match code.trim() {
            "ff" => Ok(Accidental::DoubleFlat),
            "f" => Ok(Accidental::Flat),
            "s" => Ok(Accidental::Sharp),
            "ss" | "x" => Ok(Accidental::DoubleSharp),
            other => Err(ConvertError::UnknownAccidental(other.to_string())),
        }
    }

    pub fn alter(self) -> i32 {
        match self {
            Accidental::DoubleFlat => -2,
            Accidental::Flat => -1,
            Accidental::Sharp => 1,
            Accidental::DoubleSharp => 2,
        }
    }

    pub fn mei_code(self) -> &'static str {
        match self {
            Accidental::DoubleFlat => "ff",
            Accidental::Flat => "f",
            Accidental::Sharp => "s",
            Accidental::DoubleSharp => "ss",
        }
    }

    /// Value of the visual MusicXML `<accidental>` element.
    pub fn musicxml_name(self) -> &'static str {
        match self {
            Accidental::DoubleFlat => "flat-flat",
            Accidental::Flat => "flat",
            Accidental::Sharp => "sharp",
            Accidental::DoubleSharp => "double-sharp",
        }
    }
}

// ─── Durations ───────────────────────────────────────────────────────

/// A written note value.
///
/// `Short` carries values produced by the leading-digit fallback
/// (`"32nd"` → 32) that have no named variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duration {
    Long,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    Short(u32),
}

impl Duration {
    /// Normalize a numeric MEI code (1 = whole, 2 = half, ...).
    pub fn from_number(n: u32) -> Duration {
        match n {
            1 => Duration::Whole,
            2 => Duration::Half,
            4 => Duration::Quarter,
            8 => Duration::Eighth,
            16 => Duration::Sixteenth,
            other => Duration::Short(other),
        }
    }

    /// Map an MEI `@dur` code.
    pub fn from_mei(code: &str) -> Result<Duration> {
        match code.trim() {
            "long" => Ok(Duration::Long),
            "breve" => Ok(Duration::Breve),
            other => match other.parse::<u32>() {
                Ok(n) if n > 0 => Ok(Duration::from_number(n)),
                _ => Err(ConvertError::UnrecognizedDurationType(other.to_string())),
            },
        }
    }

    /// Map a MusicXML `<type>` name.
    ///
    /// Unknown names fall back to their leading run of digits, so
    /// `"32nd"` reads as 32.
    pub fn from_note_type(name: &str) -> Result<Duration> {
        let name = name.trim();
        match name {
            "long" => Ok(Duration::Long),
            "breve" => Ok(Duration::Breve),
            "whole" => Ok(Duration::Whole),
            "half" => Ok(Duration::Half),
            "quarter" => Ok(Duration::Quarter),
            "eighth" => Ok(Duration::Eighth),
            "sixteenth" | "16th" => Ok(Duration::Sixteenth),
            other => {
                let digits: String = other.chars().take_while(|c| c.is_ascii_digit()).collect();
                match digits.parse::<u32>() {
                    Ok(n) if n > 0 => Ok(Duration::from_number(n)),
                    _ => Err(ConvertError::UnrecognizedDurationType(other.to_string())),
                }
            }
        }
    }

    /// MEI `@dur` code.
    pub fn mei_code(self) -> String {
        match self {
            Duration::Long => "long".to_string(),
            Duration::Breve => "breve".to_string(),
            Duration::Whole => "1".to_string(),
            Duration::Half => "2".to_string(),
            Duration::Quarter => "4".to_string(),
            Duration::Eighth => "8".to_string(),
            Duration::Sixteenth => "16".to_string(),
            Duration::Short(n) => n.to_string(),
        }
    }

    /// MusicXML `<type>` value.
    pub fn note_type(self) -> String {
        match self {
            Duration::Long => "long".to_string(),
            Duration::Breve => "breve".to_string(),
            Duration::Whole => "whole".to_string(),
            Duration::Half => "half".to_string(),
            Duration::Quarter => "quarter".to_string(),
            Duration::Eighth => "eighth".to_string(),
            Duration::Sixteenth => "16th".to_string(),
            Duration::Short(n) => ordinal(n),
        }
    }

    /// Length in divisions at `ppq` divisions per quarter note, when exact.
    pub fn ticks(self, ppq: u32) -> Option<u32> {
        let whole = ppq.checked_mul(4)?;
        let divisor = match self {
            Duration::Long => return whole.checked_mul(4),
            Duration::Breve => return whole.checked_mul(2),
            Duration::Whole => 1,
            Duration::Half => 2,
            Duration::Quarter => 4,
            Duration::Eighth => 8,
            Duration::Sixteenth => 16,
            Duration::Short(n) => n,
        };
        (divisor > 0 && whole % divisor == 0).then(|| whole / divisor)
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

// ─── Key signatures ──────────────────────────────────────────────────

/// MEI `@key.sig` for a count of fifths: `"0"`, `"3s"`, `"2f"`.
pub fn key_sig_to_mei(fifths: i32) -> String {
    match fifths {
        0 => "0".to_string(),
        n if n > 0 => format!("{n}s"),
        n => format!("{}f", -n),
    }
}

/// Read an MEI `@key.sig`. Plain signed integers are accepted too.
pub fn key_sig_from_mei(text: &str) -> Option<i32> {
    let text = text.trim();
    if let Some(count) = text.strip_suffix('s') {
        return count.parse::<i32>().ok();
    }
    if let Some(count) = text.strip_suffix('f') {
        return count.parse::<i32>().ok().map(|n| -n);
    }
    text.trim_start_matches('+').parse().ok()
}

// ─── Tuning tokens ───────────────────────────────────────────────────

/// A pitch decoded from a compact token such as `"c#4"` or `"bb3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchToken {
    pub step: Step,
    pub alter: i32,
    pub octave: i32,
}

impl PitchToken {
    /// Decode `<step><accidentals><octave>`; `#`/`s` raise, `b`/`f` lower.
    pub fn parse(token: &str) -> Option<PitchToken> {
        let token = token.trim();
        let mut chars = token.char_indices();
        let (_, first) = chars.next()?;
        let step = Step::from_letter(first)?;
        let mut alter = 0;
        let mut octave_start = token.len();
        for (i, c) in chars {
            match c {
                '#' | 's' => alter += 1,
                'x' => alter += 2,
                'b' | 'f' => alter -= 1,
                _ => {
                    octave_start = i;
                    break;
                }
            }
        }
        let octave = token[octave_start..].parse().ok()?;
        Some(PitchToken { step, alter, octave })
    }

    /// Encode through the pitch-class ring, lower case (`"c#4"`).
    pub fn to_token(self) -> String {
        format!(
            "{}{}",
            transpose_pitch_class(self.step, self.alter).to_lowercase(),
            self.octave
        )
    }
}
