//! PDF document writer.
//!
//! Assembles a complete file from an [`ObjectStore`]: header, body, a
//! classic cross-reference table and the trailer.
//!
//! Objects are renumbered densely from 1 in ascending source order, all with
//! generation 0. The output always uses an uncompressed `xref` table, never
//! a cross-reference stream, and never carries `/Encrypt`.

use super::object_serializer::ObjectSerializer;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::store::ObjectStore;
use std::collections::HashMap;
use std::io::Write;

/// Lowest header version written.
pub const MIN_VERSION: (u8, u8) = (1, 4);

/// Configuration for PDF output.
#[derive(Debug, Clone)]
pub struct PdfWriterConfig {
    /// Header version (major, minor)
    pub version: (u8, u8),
    /// Whether to use compact object formatting
    pub compact: bool,
}

impl Default for PdfWriterConfig {
    fn default() -> Self {
        Self {
            version: MIN_VERSION,
            compact: true,
        }
    }
}

impl PdfWriterConfig {
    /// Set the header version.
    pub fn with_version(mut self, version: (u8, u8)) -> Self {
        self.version = version;
        self
    }

    /// Enable or disable compact formatting.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }
}

/// Serializes an [`ObjectStore`] to PDF bytes.
///
/// # Example
///
/// ```
/// use pdf_minimizer::object::Object;
/// use pdf_minimizer::store::ObjectStore;
/// use pdf_minimizer::writer::PdfWriter;
///
/// let mut store = ObjectStore::new();
/// let root = store.insert(Object::Dictionary(Default::default()));
/// store.trailer_mut().root = Some(root);
///
/// let bytes = PdfWriter::new().write(&store)?;
/// assert!(bytes.starts_with(b"%PDF-1.4"));
/// # Ok::<(), pdf_minimizer::error::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    config: PdfWriterConfig,
}

impl PdfWriter {
    /// Create a writer with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with custom config.
    pub fn with_config(config: PdfWriterConfig) -> Self {
        Self { config }
    }

    /// Serialize `store` into a new buffer.
    ///
    /// Fails with [`Error::MalformedDocument`] when the store has no root or
    /// the root is not stored.
    pub fn write(&self, store: &ObjectStore) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.write_to(store, &mut output)?;
        Ok(output)
    }

    /// Serialize `store` into `output`, which is assumed to start empty;
    /// recorded offsets are relative to its initial length.
    pub fn write_to(&self, store: &ObjectStore, output: &mut Vec<u8>) -> Result<()> {
        let root = store
            .trailer()
            .root
            .filter(|r| store.contains(*r))
            .ok_or_else(|| Error::malformed("cannot write a document without a stored /Root"))?;

        let numbering: HashMap<ObjectRef, ObjectRef> = store
            .iter()
            .enumerate()
            .map(|(i, (old, _))| (old, ObjectRef::new(i as u32 + 1, 0)))
            .collect();

        let serializer = if self.config.compact {
            ObjectSerializer::compact()
        } else {
            ObjectSerializer::new()
        };
        let base = output.len();
        let (major, minor) = self.config.version;

        writeln!(output, "%PDF-{}.{}", major, minor)?;
        // Binary marker so transfer tools treat the file as binary.
        output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut offsets = Vec::with_capacity(numbering.len());
        let mut unresolved = 0usize;
        for (old, obj) in store.iter() {
            let new = numbering[&old];
            offsets.push(output.len() - base);
            let body = renumber(obj, &numbering, &mut unresolved);
            serializer.write_indirect(output, new.id, new.gen, &body)?;
        }
        if unresolved > 0 {
            log::warn!("Wrote {} references to missing objects as null", unresolved);
        }

        let xref_start = output.len() - base;
        writeln!(output, "xref")?;
        writeln!(output, "0 {}", offsets.len() + 1)?;
        writeln!(output, "0000000000 65535 f ")?;
        for offset in &offsets {
            writeln!(output, "{:010} 00000 n ", offset)?;
        }

        let mut trailer = vec![
            ("Size", Object::Integer(offsets.len() as i64 + 1)),
            ("Root", Object::Reference(numbering[&root])),
        ];
        if let Some(info) = store.trailer().info.and_then(|i| numbering.get(&i)) {
            trailer.push(("Info", Object::Reference(*info)));
        }
        writeln!(output, "trailer")?;
        serializer.write_object(output, &ObjectSerializer::dict(trailer))?;
        write!(output, "\nstartxref\n{}\n%%EOF\n", xref_start)?;

        log::debug!(
            "Wrote {} objects, {} bytes, xref at {}",
            offsets.len(),
            output.len() - base,
            xref_start
        );
        Ok(())
    }
}

/// Rewrite references through `numbering`. References to objects that are
/// not being written become null.
fn renumber(value: &Object, numbering: &HashMap<ObjectRef, ObjectRef>, unresolved: &mut usize) -> Object {
    match value {
        Object::Reference(r) => match numbering.get(r) {
            Some(new) => Object::Reference(*new),
            None => {
                *unresolved += 1;
                Object::Null
            },
        },
        Object::Array(items) => Object::Array(items.iter().map(|v| renumber(v, numbering, unresolved)).collect()),
        Object::Dictionary(dict) => Object::Dictionary(
            dict.iter()
                .map(|(k, v)| (k.clone(), renumber(v, numbering, unresolved)))
                .collect(),
        ),
        Object::Stream { dict, data } => Object::Stream {
            dict: dict
                .iter()
                .map(|(k, v)| (k.clone(), renumber(v, numbering, unresolved)))
                .collect(),
            data: data.clone(),
        },
        other => other.clone(),
    }
}
