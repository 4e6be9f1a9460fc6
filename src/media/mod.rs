//! Movie objects and the backend that decodes and encodes their files.

pub mod backend;
pub(crate) mod editor;
#[cfg(feature = "media-ffmpeg")]
pub mod ffmpeg;
pub(crate) mod importer;
pub mod sink;
pub(crate) mod track;
pub(crate) mod writer;
