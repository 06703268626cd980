//! Copying pages between documents.
//!
//! [`PageCopier`] deep-copies page dictionaries and everything reachable
//! from them into a destination [`ObjectStore`]. A memo from source to
//! destination reference lives for the whole copy operation, so an object
//! reached from several pages (a shared font, an image used twice) is copied
//! once and every copy points at it.
//!
//! Traversal is a worklist, not recursion over indirect objects: a
//! destination slot is allocated and memoized when a reference is first
//! seen, and the body is filled in when the slot is popped. Cycles such as
//! page -> parent -> kids -> page terminate on the memo.
//!
//! Page dictionaries are adjusted on the way:
//!
//! * inheritable attributes (`/Resources`, `/MediaBox`, `/CropBox`,
//!   `/Rotate`) found on ancestors are written onto the page,
//! * `/Parent` is removed; the caller attaches the page to its own tree.
//!
//! References that do not resolve are dropped (dictionary entries) or
//! replaced by `null` (array slots) and counted, except `/Resources` and
//! `/MediaBox` on a page, whose loss fails the copy. References to Page or
//! Pages nodes outside the copied set become `null`, so a link annotation
//! cannot drag the rest of the source tree along.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef, ObjectResolver};
use crate::page_tree::{inherited_from_parents, is_page_node, PageEntry};
use crate::store::ObjectStore;
use std::collections::{HashMap, HashSet};

/// Page attributes whose references must resolve.
const REQUIRED_PAGE_ATTRIBUTES: [&str; 2] = ["Resources", "MediaBox"];

/// Default bound on `/Parent` walks for pages given by reference only.
const MAX_PARENT_DEPTH: usize = 256;

/// Copies pages, and their reachable objects, out of a source document.
///
/// # Example
///
/// ```
/// use pdf_minimizer::copier::PageCopier;
/// use pdf_minimizer::object::{Object, ObjectRef};
/// use pdf_minimizer::store::ObjectStore;
///
/// let mut source = ObjectStore::new();
/// let page = ObjectRef::new(1, 0);
/// source.set(page, Object::Dictionary(
///     [
///         ("Type".to_string(), Object::Name("Page".to_string())),
///         ("MediaBox".to_string(), Object::Array(vec![Object::Integer(0); 4])),
///         ("Resources".to_string(), Object::Dictionary(Default::default())),
///     ]
///     .into_iter()
///     .collect(),
/// ));
///
/// let mut dest = ObjectStore::new();
/// let copied = PageCopier::new(&mut source).copy_pages(&mut dest, &[page])?;
/// assert_eq!(copied.len(), 1);
/// # Ok::<(), pdf_minimizer::error::Error>(())
/// ```
pub struct PageCopier<'s, R: ObjectResolver + ?Sized> {
    source: &'s mut R,
    memo: HashMap<ObjectRef, ObjectRef>,
    dropped_references: usize,
}

/// A destination slot waiting for its body.
struct Pending {
    source: ObjectRef,
    dest: ObjectRef,
    value: Object,
}

impl<'s, R: ObjectResolver + ?Sized> PageCopier<'s, R> {
    /// Create a copier reading from `source`.
    pub fn new(source: &'s mut R) -> Self {
        Self {
            source,
            memo: HashMap::new(),
            dropped_references: 0,
        }
    }

    /// Dangling references dropped so far.
    pub fn dropped_references(&self) -> usize {
        self.dropped_references
    }

    /// Source objects copied so far.
    pub fn copied_objects(&self) -> usize {
        self.memo.len()
    }

    /// Destination reference of a copied source object.
    pub fn mapped(&self, source: ObjectRef) -> Option<ObjectRef> {
        self.memo.get(&source).copied()
    }

    /// Copy pages given by reference, resolving inherited attributes through
    /// each page's `/Parent` chain.
    pub fn copy_pages(&mut self, dest: &mut ObjectStore, page_refs: &[ObjectRef]) -> Result<Vec<ObjectRef>> {
        let mut entries = Vec::with_capacity(page_refs.len());
        for &reference in page_refs {
            let page = self.load_page(reference)?;
            let inherited = match page.as_dict() {
                Some(dict) => inherited_from_parents(&mut *self.source, dict, MAX_PARENT_DEPTH)?,
                None => Dictionary::new(),
            };
            entries.push(PageEntry { reference, inherited });
        }
        self.copy_page_entries(dest, &entries)
    }

    /// Copy pages whose inherited attributes were collected by a page tree
    /// walk. Returns destination references in the order given.
    ///
    /// A page listed twice is copied as two page objects that share
    /// everything below them.
    pub fn copy_page_entries(&mut self, dest: &mut ObjectStore, entries: &[PageEntry]) -> Result<Vec<ObjectRef>> {
        // Register every page first so cross-page links resolve to copies.
        let mut worklist = Vec::new();
        for entry in entries {
            if self.memo.contains_key(&entry.reference) {
                continue;
            }
            let mut page = self.load_page(entry.reference)?;
            prepare_page(&mut page, &entry.inherited);
            self.check_required(entry.reference, &page)?;

            let slot = dest.insert(Object::Null);
            self.memo.insert(entry.reference, slot);
            worklist.push(Pending {
                source: entry.reference,
                dest: slot,
                value: page,
            });
        }
        // Pop in request order.
        worklist.reverse();

        while let Some(pending) = worklist.pop() {
            let body = self.translate(dest, &pending.value, &mut worklist)?;
            log::trace!("Copied {} -> {} ({})", pending.source, pending.dest, body.type_name());
            dest.replace(pending.dest, body)?;
        }

        let mut result = Vec::with_capacity(entries.len());
        let mut emitted = HashSet::new();
        for entry in entries {
            let slot = self
                .memo
                .get(&entry.reference)
                .copied()
                .ok_or(Error::DanglingReference(entry.reference))?;
            if emitted.insert(entry.reference) {
                result.push(slot);
            } else {
                let twin = dest.get(slot)?.clone();
                result.push(dest.insert(twin));
            }
        }

        log::debug!(
            "Copied {} pages, {} objects, dropped {} dangling references",
            result.len(),
            self.memo.len(),
            self.dropped_references
        );
        Ok(result)
    }

    /// Copy one object that is not a page, such as the information
    /// dictionary, through the same memo. `None` when it does not resolve.
    pub fn copy_object(&mut self, dest: &mut ObjectStore, source: ObjectRef) -> Result<Option<ObjectRef>> {
        let mut worklist = Vec::new();
        let mapped = self.map_reference(dest, source, &mut worklist)?;
        while let Some(pending) = worklist.pop() {
            let body = self.translate(dest, &pending.value, &mut worklist)?;
            dest.replace(pending.dest, body)?;
        }
        Ok(mapped)
    }

    fn load_page(&mut self, reference: ObjectRef) -> Result<Object> {
        let page = self.source.resolve(reference).map_err(|e| match e {
            Error::DanglingReference(r) => Error::malformed(format!("page {} does not resolve", r)),
            other => other,
        })?;
        match page.as_dict() {
            Some(dict) if is_page_node(dict) && !matches!(page, Object::Stream { .. }) => Ok(page),
            _ => Err(Error::malformed(format!(
                "{} is not a page dictionary (found {} of type {})",
                reference,
                page.type_name(),
                page.dict_type().unwrap_or("none")
            ))),
        }
    }

    /// Fail when a page's `/Resources` or `/MediaBox` points nowhere.
    fn check_required(&mut self, reference: ObjectRef, page: &Object) -> Result<()> {
        let Some(dict) = page.as_dict() else { return Ok(()) };
        for attr in REQUIRED_PAGE_ATTRIBUTES {
            match dict.get(attr) {
                Some(Object::Reference(r)) => match self.source.resolve(*r) {
                    Ok(_) => {},
                    Err(Error::DanglingReference(r)) => {
                        log::error!("Page {} has a broken /{} ({})", reference, attr, r);
                        return Err(Error::DanglingReference(r));
                    },
                    Err(e) => return Err(e),
                },
                Some(_) => {},
                None => log::warn!("Page {} has no /{}, even by inheritance", reference, attr),
            }
        }
        Ok(())
    }

    /// Copy a direct value, mapping every reference into the destination.
    fn translate(&mut self, dest: &mut ObjectStore, value: &Object, worklist: &mut Vec<Pending>) -> Result<Object> {
        Ok(match value {
            Object::Reference(r) => match self.map_reference(dest, *r, worklist)? {
                Some(mapped) => Object::Reference(mapped),
                None => Object::Null,
            },
            Object::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.translate(dest, item, worklist)?);
                }
                Object::Array(out)
            },
            Object::Dictionary(dict) => Object::Dictionary(self.translate_dict(dest, dict, false, worklist)?),
            Object::Stream { dict, data } => Object::Stream {
                dict: self.translate_dict(dest, dict, true, worklist)?,
                data: data.clone(),
            },
            primitive => primitive.clone(),
        })
    }

    fn translate_dict(
        &mut self,
        dest: &mut ObjectStore,
        dict: &Dictionary,
        is_stream: bool,
        worklist: &mut Vec<Pending>,
    ) -> Result<Dictionary> {
        let mut out = Dictionary::with_capacity(dict.len());
        // Sorted so destination numbering does not depend on hash order.
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();
        for key in keys {
            let value = &dict[key];
            // The writer emits the real payload length inline.
            if is_stream && key == "Length" && matches!(value, Object::Reference(_)) {
                continue;
            }
            let copied = self.translate(dest, value, worklist)?;
            if !copied.is_null() {
                out.insert(key.clone(), copied);
            }
        }
        Ok(out)
    }

    /// Destination reference for `source`, allocating and queueing it on
    /// first sight. `None` means the reference is not carried over.
    fn map_reference(
        &mut self,
        dest: &mut ObjectStore,
        source: ObjectRef,
        worklist: &mut Vec<Pending>,
    ) -> Result<Option<ObjectRef>> {
        if let Some(mapped) = self.memo.get(&source) {
            return Ok(Some(*mapped));
        }

        let value = match self.source.resolve(source) {
            Ok(value) => value,
            Err(Error::DanglingReference(r)) => {
                log::warn!("Dropping dangling reference {}", r);
                self.dropped_references += 1;
                return Ok(None);
            },
            Err(e) => return Err(e),
        };

        if is_foreign_page_tree_node(&value) {
            log::debug!("Not following {} into a page outside the copy", source);
            return Ok(None);
        }

        let slot = dest.insert(Object::Null);
        self.memo.insert(source, slot);
        worklist.push(Pending {
            source,
            dest: slot,
            value,
        });
        Ok(Some(slot))
    }
}

/// Inline inherited attributes and detach the page from its source tree.
fn prepare_page(page: &mut Object, inherited: &Dictionary) {
    if let Some(dict) = page.as_dict_mut() {
        for (key, value) in inherited {
            dict.entry(key.clone()).or_insert_with(|| value.clone());
        }
        dict.remove("Parent");
    }
}

/// Explicitly typed Page or Pages dictionaries. Pages in the copied set are
/// memoized before this is ever asked.
fn is_foreign_page_tree_node(value: &Object) -> bool {
    matches!(value, Object::Dictionary(_)) && matches!(value.dict_type(), Some("Page") | Some("Pages"))
}
