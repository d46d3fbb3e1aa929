//! Archive creation
//!
//! Turns a source directory into the single artifact that every backend
//! publishes.

pub mod archiver;

pub use archiver::{ARCHIVE_EXTENSION, Archive, Archiver};
