//! MEI side of the converter: reading MEI into a Score and writing it back.

pub mod reader;
pub mod writer;

pub use reader::read_mei;
pub use writer::write_mei;
