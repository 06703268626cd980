//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! ObjectStore
//!     ↓
//! [PdfWriter] (renumbering, header, xref table, trailer)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```

mod object_serializer;
mod pdf_writer;

pub use object_serializer::ObjectSerializer;
pub use pdf_writer::{PdfWriter, PdfWriterConfig, MIN_VERSION};
