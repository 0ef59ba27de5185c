//! MusicXML side of the converter.
//!
//! Partwise and timewise documents are both accepted on input; output is
//! always timewise.

pub mod chord;
pub mod reader;
pub mod writer;

pub use reader::read_musicxml;
pub use writer::write_musicxml;
