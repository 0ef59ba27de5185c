//! meixml: bidirectional converter between MEI and MusicXML scores.
//!
//! Both directions go through the same intermediate [`Score`] model:
//! a source document is read completely into a Score, and only then is
//! the target document written. MusicXML output is always timewise;
//! MusicXML input may be partwise, timewise or a compressed `.mxl`.
//!
//! # Example
//! ```no_run
//! use meixml::{convert_file, ConvertOptions};
//!
//! let direction = convert_file("etude.mei", "etude.xml", &ConvertOptions::default()).unwrap();
//! println!("converted {direction:?}");
//! ```

pub mod element;
pub mod error;
pub mod mei;
pub mod model;
pub mod musicxml;
pub mod mxl;
pub mod options;
pub mod query;
pub mod tables;
pub mod timewise;

use std::path::Path;

pub use error::{ConvertError, Result};
pub use mei::{read_mei, write_mei};
pub use model::*;
pub use musicxml::{read_musicxml, write_musicxml};
pub use mxl::read_mxl;
pub use options::ConvertOptions;

/// Convert an MEI document to timewise MusicXML.
pub fn mei_to_musicxml(mei: &str, options: &ConvertOptions) -> Result<String> {
    log::info!("converting MEI to MusicXML");
    let score = read_mei(mei, options)?;
    let xml = write_musicxml(&score, options)?;
    log::info!(
        "wrote {} part(s), {} measure(s), {} note(s) as MusicXML",
        score.parts.len(),
        score.measure_count(),
        score.note_count()
    );
    Ok(xml)
}

/// Convert a MusicXML document (partwise or timewise) to MEI.
pub fn musicxml_to_mei(musicxml: &str, options: &ConvertOptions) -> Result<String> {
    log::info!("converting MusicXML to MEI");
    let score = read_musicxml(musicxml)?;
    let mei = write_mei(&score, options)?;
    log::info!(
        "wrote {} part(s), {} measure(s), {} note(s) as MEI",
        score.parts.len(),
        score.measure_count(),
        score.note_count()
    );
    Ok(mei)
}

/// Read MusicXML from raw bytes with an optional format hint.
/// If `extension` is None, tries to auto-detect the format.
pub fn read_musicxml_bytes(data: &[u8], extension: Option<&str>) -> Result<Score> {
    match extension {
        Some("mxl") => read_mxl(data),
        Some("musicxml") | Some("xml") => read_musicxml(utf8(data)?),
        _ => match std::str::from_utf8(data) {
            Ok(xml) if xml.trim_start().starts_with('<') => read_musicxml(xml),
            _ => read_mxl(data),
        },
    }
}

/// Convert a parsed score to a JSON string.
pub fn score_to_json(score: &Score) -> Result<String> {
    Ok(serde_json::to_string_pretty(score)?)
}

// ─── Files ───────────────────────────────────────────────────────────

/// Conversion direction, inferred from file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    MeiToMusicXml,
    MusicXmlToMei,
}

impl Direction {
    /// `.mei` → `.xml`/`.musicxml` or `.xml`/`.musicxml`/`.mxl` → `.mei`.
    pub fn infer(input: &Path, output: &Path) -> Result<Direction> {
        match (extension(input).as_deref(), extension(output).as_deref()) {
            (Some("mei"), Some("xml" | "musicxml")) => Ok(Direction::MeiToMusicXml),
            (Some("xml" | "musicxml" | "mxl"), Some("mei")) => Ok(Direction::MusicXmlToMei),
            _ => Err(ConvertError::UnsupportedInputKind(format!(
                "cannot convert '{}' to '{}'",
                input.display(),
                output.display()
            ))),
        }
    }
}

/// Read a score from an MEI or MusicXML file, by extension.
pub fn read_file<P: AsRef<Path>>(path: P, options: &ConvertOptions) -> Result<Score> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConvertError::InputNotFound(path.to_path_buf()));
    }
    let data = std::fs::read(path)?;
    match extension(path).as_deref() {
        Some("mei") => read_mei(utf8(&data)?, options),
        Some(ext @ ("xml" | "musicxml" | "mxl")) => read_musicxml_bytes(&data, Some(ext)),
        _ => Err(ConvertError::UnsupportedInputKind(path.display().to_string())),
    }
}

/// Convert `input` into `output`, choosing the direction from the file
/// extensions. The output file is only created once conversion succeeded.
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &ConvertOptions,
) -> Result<Direction> {
    let (input, output) = (input.as_ref(), output.as_ref());
    if !input.exists() {
        return Err(ConvertError::InputNotFound(input.to_path_buf()));
    }
    let direction = Direction::infer(input, output)?;
    log::info!("{} -> {} ({direction:?})", input.display(), output.display());

    let score = read_file(input, options)?;
    let text = match direction {
        Direction::MeiToMusicXml => write_musicxml(&score, options)?,
        Direction::MusicXmlToMei => write_mei(&score, options)?,
    };
    std::fs::write(output, text)?;
    Ok(direction)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn utf8(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data)
        .map_err(|e| ConvertError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn infer(input: &str, output: &str) -> Result<Direction> {
        Direction::infer(&PathBuf::from(input), &PathBuf::from(output))
    }

    #[test]
    fn direction_follows_extensions() {
        assert_eq!(infer("a.mei", "b.xml").unwrap(), Direction::MeiToMusicXml);
        assert_eq!(infer("a.MEI", "b.musicxml").unwrap(), Direction::MeiToMusicXml);
        assert_eq!(infer("a.xml", "b.mei").unwrap(), Direction::MusicXmlToMei);
        assert_eq!(infer("a.mxl", "b.mei").unwrap(), Direction::MusicXmlToMei);
    }

    #[test]
    fn mismatched_extensions_are_rejected() {
        for (input, output) in [("a.mei", "b.mei"), ("a.xml", "b.xml"), ("a.txt", "b.mei"), ("a", "b")] {
            assert!(matches!(
                infer(input, output),
                Err(ConvertError::UnsupportedInputKind(_))
            ));
        }
    }

    #[test]
    fn bytes_without_hint_are_sniffed() {
        let xml = br#"<score-timewise><part-list/></score-timewise>"#;
        let score = read_musicxml_bytes(xml, None).unwrap();
        assert!(score.parts.is_empty());
        assert!(matches!(
            read_musicxml_bytes(b"PK\x03\x04garbage", None),
            Err(ConvertError::Archive(_))
        ));
    }
}
