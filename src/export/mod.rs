//! # Export
//!
//! The save direction of the pipeline: a live object graph is walked into
//! nodes by [`XamlObjectReader`], and nodes are rendered to markup text by
//! [`XamlTextWriter`]. Either half works with any other stage.

mod object_reader;
mod text_writer;

pub use object_reader::XamlObjectReader;
pub use text_writer::{TextWriterSettings, XamlTextWriter};
