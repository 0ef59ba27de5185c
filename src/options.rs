//! Conversion settings.

/// Options shared by both conversion directions.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Spaces per nesting level in the output; 0 writes a single line.
    pub indent: usize,
    /// Octaves between written (MEI) and sounding (MusicXML) pitch of
    /// string tunings. Guitar music is written an octave above sounding.
    pub tablature_octave_shift: i32,
    /// Write the `<!DOCTYPE>` declaration of MusicXML output.
    pub emit_doctype: bool,
    /// Encoding application recorded when the source names none.
    pub encoder_name: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            tablature_octave_shift: 1,
            emit_doctype: true,
            encoder_name: None,
        }
    }
}
