//! MXL file handler: reads compressed MusicXML (.mxl) archives.
//!
//! An .mxl file is a ZIP archive containing:
//!   - META-INF/container.xml  declares the root MusicXML file path
//!   - <rootfile>.xml          the actual MusicXML content (e.g., score.xml)
//!   - (optional) other files  images, sounds, etc.

use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{ConvertError, Result};
use crate::model::Score;
use crate::musicxml::read_musicxml;

/// Read a score from .mxl bytes.
pub fn read_mxl(data: &[u8]) -> Result<Score> {
    let xml = extract_musicxml(data)?;
    read_musicxml(&xml)
}

/// Extract the root MusicXML document from .mxl bytes.
pub fn extract_musicxml(data: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| ConvertError::Archive(format!("cannot open archive: {e}")))?;

    let root_path = root_file_path(&mut archive)?;
    log::debug!("mxl root file: {root_path}");

    let mut root_file = archive
        .by_name(&root_path)
        .map_err(|e| ConvertError::Archive(format!("root file '{root_path}' missing: {e}")))?;
    let mut xml = String::new();
    root_file.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Root file named by META-INF/container.xml, or the first MusicXML entry.
fn root_file_path(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String> {
    let container = match archive.by_name("META-INF/container.xml") {
        Ok(mut file) => {
            let mut xml = String::new();
            file.read_to_string(&mut xml)?;
            Some(xml)
        }
        Err(_) => None,
    };

    if let Some(xml) = container {
        let doc = roxmltree::Document::parse(&xml)?;
        return doc
            .descendants()
            .filter(|n| n.tag_name().name() == "rootfile")
            .find_map(|n| n.attribute("full-path"))
            .map(str::to_string)
            .ok_or_else(|| ConvertError::Archive("container.xml names no rootfile".into()));
    }

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names
        .iter()
        .find(|name| {
            !name.starts_with("META-INF/") && (name.ends_with(".xml") || name.ends_with(".musicxml"))
        })
        .cloned()
        .ok_or_else(|| ConvertError::Archive(format!("no MusicXML file in archive: {names:?}")))
}
