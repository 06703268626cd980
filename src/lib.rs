// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::should_implement_trait)]

//! # PDF Minimizer
//!
//! Structural PDF minimization: parse a document, copy the pages you want
//! (and only the objects those pages reach) into a fresh document, and
//! write it back out with dense object numbers and a new cross-reference
//! table.
//!
//! ## Pipeline
//!
//! ```text
//! bytes
//!   ↓
//! [PdfDocument] (xref + trailer, objects parsed on first access)
//!   ↓
//! [flatten_pages] (page tree → ordered pages + inherited attributes)
//!   ↓
//! [PageCopier] (memoized deep copy into an ObjectStore)
//!   ↓
//! [PdfWriter] (renumber, serialize, xref table, trailer)
//!   ↓
//! bytes
//! ```
//!
//! Size goes down because unreachable objects (old revisions, unused
//! resources, orphaned metadata) are never copied. Stream payloads are
//! copied byte for byte; nothing is recompressed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_minimizer::{minimize, Minimizer, MinimizeOptions, PageSelection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = std::fs::read("input.pdf")?;
//!
//! // All pages, default options
//! let output = minimize(&input)?;
//!
//! // Pages 1 and 3 only, with a report
//! let options = MinimizeOptions::new().with_pages(PageSelection::Indices(vec![0, 2]));
//! let (output, report) = Minimizer::new(options).run(&input)?;
//! println!("{} -> {} bytes", report.input_bytes, report.output_bytes);
//! # Ok(())
//! # }
//! ```
//!
//! Encrypted documents are rejected with [`Error::UnsupportedFeature`].
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Object model
pub mod object;
pub mod store;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod objstm;
pub mod parser;
/// Parser configuration options
pub mod parser_config;
pub mod xref;

// Stream decoders
pub mod decoders;

// Page handling
pub mod copier;
pub mod page_tree;

// Output
pub mod writer;

// Driver
pub mod config;
pub mod minimizer;

pub use config::{MinimizeOptions, PageSelection};
pub use document::PdfDocument;
pub use error::{Error, Result};
pub use minimizer::{minimize, MinimizeReport, Minimizer};
pub use object::{Object, ObjectRef};
pub use store::ObjectStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
