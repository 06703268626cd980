//! Lazily parsed source document.
//!
//! Opening a [`PdfDocument`] reads the header, the cross-reference data and
//! the trailer, and nothing else. Objects are parsed on first access and
//! cached, so a caller that only walks the pages it needs never pays for the
//! rest of the file.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef, ObjectResolver};
use crate::objstm::ObjectStream;
use crate::parser::Parser;
use crate::parser_config::ParserOptions;
use crate::store::{ObjectStore, Trailer};
use crate::xref::{load_xref, CrossRefTable, XRefEntry};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;

/// How far into the file the `%PDF-` header may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// A parsed PDF whose objects are materialized on demand.
///
/// # Example
///
/// ```no_run
/// use pdf_minimizer::document::PdfDocument;
///
/// let mut doc = PdfDocument::open("input.pdf")?;
/// println!("PDF {}.{}", doc.version().0, doc.version().1);
/// let catalog = doc.catalog()?;
/// # Ok::<(), pdf_minimizer::error::Error>(())
/// ```
pub struct PdfDocument {
    data: Bytes,
    version: (u8, u8),
    xref: CrossRefTable,
    trailer: Trailer,
    cache: HashMap<ObjectRef, Object>,
    options: ParserOptions,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("bytes", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Read and open a file with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Open an in-memory PDF with default (lenient) options.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        Self::from_bytes_with_options(data, ParserOptions::default())
    }

    /// Open an in-memory PDF.
    ///
    /// # Errors
    ///
    /// * [`Error::MalformedDocument`] when the header (strict mode only),
    ///   cross-reference data or trailer cannot be read, or the trailer has
    ///   no `/Root`.
    /// * [`Error::UnsupportedFeature`] when the trailer has `/Encrypt`, or the
    ///   input exceeds `max_file_size`.
    pub fn from_bytes_with_options(data: impl Into<Bytes>, options: ParserOptions) -> Result<Self> {
        let mut data: Bytes = data.into();

        if options.max_file_size > 0 && data.len() > options.max_file_size {
            return Err(Error::UnsupportedFeature(format!(
                "input of {} bytes exceeds the {} byte limit",
                data.len(),
                options.max_file_size
            )));
        }

        let version = match find_header(&data) {
            Some((0, version)) => version,
            Some((offset, version)) => {
                // Offsets in the file are relative to the header.
                log::warn!("Ignoring {} bytes of junk before %PDF header", offset);
                data = data.slice(offset..);
                version
            },
            None if options.strict => return Err(Error::malformed_at(0, "missing %PDF- header")),
            None => {
                log::warn!("No %PDF- header found, assuming version 1.4");
                (1, 4)
            },
        };

        let xref = load_xref(&data, &options)?;
        let raw_trailer = xref.trailer();

        if raw_trailer.contains_key("Encrypt") {
            return Err(Error::UnsupportedFeature("encrypted document (/Encrypt in trailer)".to_string()));
        }

        let root = raw_trailer
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::malformed("trailer missing /Root"))?;
        let info = raw_trailer.get("Info").and_then(|o| o.as_reference());

        log::debug!(
            "Opened PDF {}.{} ({} bytes, {} xref entries, root {})",
            version.0,
            version.1,
            data.len(),
            xref.len(),
            root
        );

        Ok(Self {
            data,
            version,
            xref,
            trailer: Trailer {
                root: Some(root),
                info,
            },
            cache: HashMap::new(),
            options,
        })
    }

    /// Header version (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Header version, raised to the catalog's `/Version` when that is newer.
    pub fn effective_version(&mut self) -> Result<(u8, u8)> {
        let catalog = self.catalog()?;
        let declared = catalog
            .as_dict()
            .and_then(|d| d.get("Version"))
            .and_then(|v| v.as_name())
            .and_then(parse_version);
        Ok(match declared {
            Some(v) if v > self.version => v,
            _ => self.version,
        })
    }

    /// Trailer pointers (root and optional info).
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// The raw merged trailer dictionary.
    pub fn trailer_dict(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Reference to the catalog.
    pub fn root_ref(&self) -> ObjectRef {
        // Always set by the constructor.
        self.trailer.root.unwrap_or(ObjectRef::new(0, 0))
    }

    /// Load the catalog dictionary.
    pub fn catalog(&mut self) -> Result<Object> {
        let root = self.root_ref();
        let catalog = self.load_object(root).map_err(|e| match e {
            Error::DanglingReference(_) => Error::malformed(format!("/Root {} does not resolve", root)),
            other => other,
        })?;
        if catalog.as_dict().is_none() {
            return Err(Error::malformed(format!("catalog {} is a {}", root, catalog.type_name())));
        }
        Ok(catalog)
    }

    /// Number of live (in-use or compressed) objects in the cross-reference data.
    pub fn object_count(&self) -> usize {
        self.xref.live_ids().len()
    }

    /// Options this document was opened with.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Load an object, parsing it on first access.
    ///
    /// # Errors
    ///
    /// [`Error::DanglingReference`] when the cross-reference data has no live
    /// entry for `obj_ref`; [`Error::MalformedDocument`] when the entry points
    /// at bytes that are not that object.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.cache.get(&obj_ref) {
            return Ok(cached.clone());
        }

        match self.xref.get(obj_ref.id) {
            None | Some(XRefEntry::Free) => Err(Error::DanglingReference(obj_ref)),
            Some(XRefEntry::InUse { gen, .. }) if gen != obj_ref.gen => {
                log::debug!("{} requested but xref has generation {}", obj_ref, gen);
                Err(Error::DanglingReference(obj_ref))
            },
            Some(XRefEntry::InUse { offset, .. }) => {
                let object = self.parse_at(obj_ref, offset)?;
                self.cache.insert(obj_ref, object.clone());
                Ok(object)
            },
            Some(XRefEntry::Compressed { stream_id, index }) => {
                if obj_ref.gen != 0 {
                    return Err(Error::DanglingReference(obj_ref));
                }
                self.load_from_object_stream(obj_ref, stream_id, index)
            },
        }
    }

    fn parse_at(&self, obj_ref: ObjectRef, offset: usize) -> Result<Object> {
        if offset >= self.data.len() {
            return Err(Error::malformed_at(
                offset,
                format!("xref offset of {} is outside the {}-byte file", obj_ref, self.data.len()),
            ));
        }

        let lengths = |r: ObjectRef| self.lookup_length(r);
        let mut parser = Parser::new(&self.data, offset)
            .with_options(self.options)
            .with_length_resolver(&lengths);

        let (found, object) = parser.parse_indirect_object().map_err(|e| match e {
            Error::MalformedDocument { offset: at, reason } => Error::MalformedDocument {
                offset: at.or(Some(offset)),
                reason: format!("{} (reading {})", reason, obj_ref),
            },
            other => other,
        })?;

        if found.id != obj_ref.id {
            return Err(Error::malformed_at(
                offset,
                format!("xref points {} at the header of {}", obj_ref, found),
            ));
        }
        log::trace!("Parsed {} ({}) at byte {}", obj_ref, object.type_name(), offset);
        Ok(object)
    }

    /// Integer value of a `/Length` object, without touching the cache
    /// mutably. Only top-level objects are consulted.
    fn lookup_length(&self, r: ObjectRef) -> Option<i64> {
        if let Some(cached) = self.cache.get(&r) {
            return cached.as_integer();
        }
        match self.xref.get(r.id)? {
            XRefEntry::InUse { offset, .. } if offset < self.data.len() => {
                let (found, obj) = Parser::new(&self.data, offset)
                    .with_options(self.options)
                    .parse_indirect_object()
                    .ok()?;
                (found.id == r.id).then(|| obj.as_integer()).flatten()
            },
            _ => None,
        }
    }

    fn load_from_object_stream(&mut self, obj_ref: ObjectRef, stream_id: u32, index: u32) -> Result<Object> {
        let stream_ref = ObjectRef::new(stream_id, 0);
        if !matches!(self.xref.get(stream_id), Some(XRefEntry::InUse { .. })) {
            return Err(Error::malformed(format!(
                "{} is stored in {}, which is not a top-level object",
                obj_ref, stream_ref
            )));
        }

        let container = self.load_object(stream_ref).map_err(|e| match e {
            Error::DanglingReference(_) => {
                Error::malformed(format!("object stream {} for {} is missing", stream_ref, obj_ref))
            },
            other => other,
        })?;
        let stream = ObjectStream::parse(stream_ref, &container, &self.options)?;

        // The stream is decoded once; keep every member the xref assigns to it.
        let members: Vec<u32> = stream.member_ids().collect();
        for (slot, id) in members.into_iter().enumerate() {
            let member_ref = ObjectRef::new(id, 0);
            if self.cache.contains_key(&member_ref) {
                continue;
            }
            match self.xref.get(id) {
                Some(XRefEntry::Compressed { stream_id: s, .. }) if s == stream_id => {},
                _ => continue,
            }
            match stream.get(id, slot) {
                Ok(obj) => {
                    self.cache.insert(member_ref, obj);
                },
                Err(e) if id == obj_ref.id => return Err(e),
                Err(e) => log::warn!("Skipping unreadable {} in {}: {}", member_ref, stream_ref, e),
            }
        }

        match self.cache.get(&obj_ref) {
            Some(obj) => Ok(obj.clone()),
            None => {
                let obj = stream.get(obj_ref.id, index as usize)?;
                self.cache.insert(obj_ref, obj.clone());
                Ok(obj)
            },
        }
    }

    /// Load every live object into an [`ObjectStore`] under its original
    /// number.
    ///
    /// Entries that turn out to be dangling are skipped; structural errors
    /// propagate.
    pub fn into_store(mut self) -> Result<ObjectStore> {
        let mut store = ObjectStore::new();

        for id in self.xref.live_ids() {
            let gen = match self.xref.get(id) {
                Some(XRefEntry::InUse { gen, .. }) => gen,
                _ => 0,
            };
            let obj_ref = ObjectRef::new(id, gen);
            match self.load_object(obj_ref) {
                Ok(obj) => {
                    store.set(obj_ref, obj);
                },
                Err(Error::DanglingReference(r)) => log::warn!("Skipping dangling entry {}", r),
                Err(e) => return Err(e),
            }
        }

        *store.trailer_mut() = self.trailer.clone();
        Ok(store)
    }
}

impl ObjectResolver for PdfDocument {
    fn resolve(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        self.load_object(obj_ref)
    }
}

/// Locate `%PDF-M.m` near the start of the buffer.
fn find_header(data: &[u8]) -> Option<(usize, (u8, u8))> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let at = window.windows(5).position(|w| w == b"%PDF-")?;
    let rest = &data[at + 5..];
    let end = rest
        .iter()
        .position(|c| !(c.is_ascii_digit() || *c == b'.'))
        .unwrap_or(rest.len());
    let text = std::str::from_utf8(&rest[..end]).ok()?;
    Some((at, parse_version(text).unwrap_or((1, 4))))
}

/// Parse "1.7" into (1, 7).
pub(crate) fn parse_version(text: &str) -> Option<(u8, u8)> {
    let (major, minor) = text.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}
