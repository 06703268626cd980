//! Page tree flattening.
//!
//! Pages are leaves of a tree of `/Pages` nodes hanging off the catalog.
//! Some page attributes can be set on an ancestor instead of the page itself
//! (ISO 32000-1, Table 30); they are collected on the way down so each leaf
//! carries the values it would inherit.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef, ObjectResolver};
use std::collections::HashSet;

/// Attributes a page inherits from its ancestors when it lacks them.
pub const INHERITABLE_ATTRIBUTES: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// A page leaf in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// The page dictionary's reference.
    pub reference: ObjectRef,
    /// Inheritable values set on ancestors, nearest ancestor winning.
    /// Attributes the page sets itself are not included.
    pub inherited: Dictionary,
}

/// Flatten the page tree under the catalog's `/Pages` in document order.
///
/// Kids that do not resolve, and nodes already visited (cyclic or shared
/// subtrees), are skipped with a warning.
pub fn flatten_pages<R: ObjectResolver + ?Sized>(
    resolver: &mut R,
    catalog: &Object,
    max_depth: usize,
) -> Result<Vec<PageEntry>> {
    let root = catalog
        .as_dict()
        .and_then(|d| d.get("Pages"))
        .and_then(|p| p.as_reference())
        .ok_or_else(|| Error::malformed("catalog has no /Pages reference"))?;

    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    // Depth-first, kids pushed in reverse so they pop in order.
    let mut stack = vec![(root, Dictionary::new(), 0usize)];

    while let Some((node_ref, inherited, depth)) = stack.pop() {
        if !visited.insert(node_ref) {
            log::warn!("Page tree revisits {}, skipping", node_ref);
            continue;
        }
        if depth > max_depth {
            return Err(Error::malformed(format!("page tree deeper than {} levels", max_depth)));
        }

        let node = match resolver.resolve(node_ref) {
            Ok(node) => node,
            Err(Error::DanglingReference(r)) if node_ref != root => {
                log::warn!("Page tree kid {} does not resolve, skipping", r);
                continue;
            },
            Err(e) => return Err(e),
        };
        let dict = match node.as_dict() {
            Some(dict) => dict,
            None => {
                log::warn!("Page tree node {} is a {}, skipping", node_ref, node.type_name());
                continue;
            },
        };

        if is_page_node(dict) {
            let mut own_inherited = inherited;
            own_inherited.retain(|key, _| !dict.contains_key(key));
            pages.push(PageEntry {
                reference: node_ref,
                inherited: own_inherited,
            });
            continue;
        }

        let mut passed_down = inherited;
        for attr in INHERITABLE_ATTRIBUTES {
            if let Some(value) = dict.get(attr) {
                passed_down.insert(attr.to_string(), value.clone());
            }
        }

        let kids = match dict.get("Kids") {
            Some(kids) => resolver.resolve_value(kids)?,
            None => continue,
        };
        if let Some(kids) = kids.as_array() {
            for kid in kids.iter().rev() {
                match kid.as_reference() {
                    Some(kid_ref) => stack.push((kid_ref, passed_down.clone(), depth + 1)),
                    None => log::warn!("Ignoring direct {} in /Kids of {}", kid.type_name(), node_ref),
                }
            }
        }
    }

    log::debug!("Flattened page tree: {} pages", pages.len());
    Ok(pages)
}

/// Inheritable attributes for a page reached without a tree walk, found by
/// following its `/Parent` chain.
///
/// A broken or cyclic chain ends the walk; whatever was found so far is
/// returned.
pub fn inherited_from_parents<R: ObjectResolver + ?Sized>(
    resolver: &mut R,
    page: &Dictionary,
    max_depth: usize,
) -> Result<Dictionary> {
    let mut inherited = Dictionary::new();
    let mut seen = HashSet::new();
    let mut parent = page.get("Parent").and_then(|p| p.as_reference());

    while let Some(parent_ref) = parent {
        if !seen.insert(parent_ref) || seen.len() > max_depth {
            log::warn!("/Parent chain loops or runs too deep at {}", parent_ref);
            break;
        }
        let node = match resolver.resolve(parent_ref) {
            Ok(node) => node,
            Err(Error::DanglingReference(r)) => {
                log::warn!("/Parent {} does not resolve", r);
                break;
            },
            Err(e) => return Err(e),
        };
        let Some(dict) = node.as_dict() else { break };
        for attr in INHERITABLE_ATTRIBUTES {
            if page.contains_key(attr) || inherited.contains_key(attr) {
                continue;
            }
            if let Some(value) = dict.get(attr) {
                inherited.insert(attr.to_string(), value.clone());
            }
        }
        parent = dict.get("Parent").and_then(|p| p.as_reference());
    }

    Ok(inherited)
}

/// Whether a page tree node is a leaf. Nodes without `/Type` are classified
/// by the presence of `/Kids`.
pub fn is_page_node(dict: &Dictionary) -> bool {
    match dict.get("Type").and_then(|t| t.as_name()) {
        Some("Page") => true,
        Some(_) => false,
        None => !dict.contains_key("Kids"),
    }
}

/// Whether a dictionary is an intermediate `/Pages` node.
pub fn is_pages_node(dict: &Dictionary) -> bool {
    match dict.get("Type").and_then(|t| t.as_name()) {
        Some("Pages") => true,
        Some(_) => false,
        None => dict.contains_key("Kids") && dict.contains_key("Count"),
    }
}
