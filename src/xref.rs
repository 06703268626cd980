//! Cross-reference loading.
//!
//! The cross-reference data maps object numbers to where the object lives:
//! a byte offset for top-level objects, or a slot in an object stream for
//! compressed ones. Both classic `xref` tables and PDF 1.5 cross-reference
//! streams are read, along with the `/Prev` chain of incremental updates and
//! the `/XRefStm` pointer of hybrid-reference files.

use crate::error::{Error, Result};
use crate::lexer::{skip_ws, token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::Parser;
use crate::parser_config::ParserOptions;
use std::collections::{HashMap, HashSet};

/// Where an object can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free (deleted) object
    Free,
    /// Top-level object starting at a byte offset
    InUse {
        /// Offset of the `N G obj` header
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing object stream
        stream_id: u32,
        /// Index of the object within the stream
        index: u32,
    },
}

/// Merged cross-reference data of a whole file.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
}

impl CrossRefTable {
    /// Look up an object number.
    pub fn get(&self, id: u32) -> Option<XRefEntry> {
        self.entries.get(&id).copied()
    }

    /// Merged trailer dictionary. `/Prev` and `/XRefStm` are removed.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object numbers of all in-use and compressed entries, ascending.
    pub fn live_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| !matches!(e, XRefEntry::Free))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Add entries from an older section. Entries already present win.
    fn absorb(&mut self, entries: Vec<(u32, XRefEntry)>) {
        for (id, entry) in entries {
            self.entries.entry(id).or_insert(entry);
        }
    }

    fn absorb_trailer(&mut self, trailer: &Dictionary) {
        for (key, value) in trailer {
            if key != "Prev" && key != "XRefStm" {
                self.trailer.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
}

/// Offset named by the last `startxref` in the file.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let keyword = b"startxref";
    let tail_start = data.len().saturating_sub(4096);
    let pos = data[tail_start..]
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .map(|p| tail_start + p)
        .ok_or_else(|| Error::malformed("startxref not found"))?;

    match token(&data[pos + keyword.len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 && (offset as usize) < data.len() => {
            Ok(offset as usize)
        },
        _ => Err(Error::malformed_at(pos, "startxref is not followed by a valid offset")),
    }
}

/// Load and merge every cross-reference section reachable from the end of
/// the file.
///
/// When `startxref` is missing, the last `xref` table in the file is used.
pub fn load_xref(data: &[u8], options: &ParserOptions) -> Result<CrossRefTable> {
    let start = match find_startxref(data) {
        Ok(offset) => offset,
        Err(e) => {
            let fallback = rfind(data, b"trailer").and_then(|t| rfind(&data[..t], b"xref"));
            match fallback {
                Some(offset) => {
                    log::warn!("{}; using last xref table at byte {}", e, offset);
                    offset
                },
                None => return Err(e),
            }
        },
    };

    let mut table = CrossRefTable::default();
    let mut visited = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("xref /Prev chain loops back to byte {}", offset);
            break;
        }
        if visited.len() > options.max_xref_chain {
            return Err(Error::malformed_at(
                offset,
                format!("more than {} chained xref sections", options.max_xref_chain),
            ));
        }

        let (entries, trailer) = parse_section(data, offset, options)?;

        // A hybrid file's /XRefStm overrides the table it is attached to.
        if let Some(stm) = trailer.get("XRefStm").and_then(|o| o.as_integer()) {
            let stm = usize::try_from(stm).map_err(|_| Error::malformed_at(offset, "negative /XRefStm"))?;
            if visited.insert(stm) {
                let (stm_entries, _) = parse_xref_stream(data, stm, options)?;
                table.absorb(stm_entries);
            }
        }

        table.absorb(entries);
        table.absorb_trailer(&trailer);

        next = match trailer.get("Prev").and_then(|o| o.as_integer()) {
            Some(prev) => Some(usize::try_from(prev).map_err(|_| Error::malformed_at(offset, "negative /Prev"))?),
            None => None,
        };
    }

    log::debug!("Loaded {} xref entries from {} section(s)", table.len(), visited.len());
    Ok(table)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

type Section = (Vec<(u32, XRefEntry)>, Dictionary);

fn parse_section(data: &[u8], offset: usize, options: &ParserOptions) -> Result<Section> {
    if offset >= data.len() {
        return Err(Error::malformed_at(offset, "xref offset outside the file"));
    }
    let at = data.len() - skip_ws(&data[offset..]).len();
    if data[at..].starts_with(b"xref") {
        parse_table(data, at + 4, options)
    } else {
        parse_xref_stream(data, at, options)
    }
}

/// Classic table: subsections of `start count` followed by 20-byte lines,
/// then `trailer` and its dictionary. Tokens are used rather than fixed
/// columns so CR, LF and CRLF line ends all work.
fn parse_table(data: &[u8], mut pos: usize, options: &ParserOptions) -> Result<Section> {
    let mut entries = Vec::new();
    let next = |pos: &mut usize| next_table_token(data, pos);

    loop {
        let section_at = pos;
        let first = match next(&mut pos)? {
            Token::Integer(n) => u32::try_from(n)
                .map_err(|_| Error::malformed_at(section_at, format!("xref subsection start {} out of range", n)))?,
            tok if tok.is_keyword(b"trailer") => break,
            other => {
                return Err(Error::malformed_at(section_at, format!("bad xref subsection header {:?}", other)));
            },
        };
        let count = match next(&mut pos)? {
            Token::Integer(n) => u32::try_from(n)
                .map_err(|_| Error::malformed_at(section_at, format!("xref subsection count {} out of range", n)))?,
            other => {
                return Err(Error::malformed_at(section_at, format!("bad xref subsection count {:?}", other)));
            },
        };
        if count as usize > data.len() / 18 {
            return Err(Error::malformed_at(section_at, format!("xref subsection claims {} entries", count)));
        }

        for i in 0..count {
            let line_at = pos;
            let (field1, field2, kind) = match (next(&mut pos)?, next(&mut pos)?, next(&mut pos)?) {
                (Token::Integer(a), Token::Integer(b), Token::Keyword(k)) => (a, b, k),
                _ => return Err(Error::malformed_at(line_at, "bad xref entry")),
            };
            let entry = match kind {
                b"n" => XRefEntry::InUse {
                    offset: usize::try_from(field1).map_err(|_| Error::malformed_at(line_at, "negative offset"))?,
                    gen: u16::try_from(field2).unwrap_or(u16::MAX),
                },
                b"f" => XRefEntry::Free,
                _ => return Err(Error::malformed_at(line_at, "xref entry type must be 'n' or 'f'")),
            };
            let id = first
                .checked_add(i)
                .ok_or_else(|| Error::malformed_at(line_at, "xref subsection runs past the largest object number"))?;
            entries.push((id, entry));
        }
    }

    let trailer = match Parser::new(data, pos).with_options(*options).parse_object()? {
        Object::Dictionary(dict) => dict,
        other => {
            return Err(Error::malformed_at(pos, format!("trailer is a {}", other.type_name())));
        },
    };

    Ok((entries, trailer))
}

fn next_table_token<'a>(data: &'a [u8], pos: &mut usize) -> Result<Token<'a>> {
    let (rest, tok) =
        token(&data[*pos..]).map_err(|_| Error::malformed_at(*pos, "truncated xref table"))?;
    *pos = data.len() - rest.len();
    Ok(tok)
}

/// Cross-reference stream: an indirect stream object of `/Type /XRef` whose
/// decoded payload holds fixed-width binary records described by `/W`.
fn parse_xref_stream(data: &[u8], offset: usize, options: &ParserOptions) -> Result<Section> {
    if offset >= data.len() {
        return Err(Error::malformed_at(offset, "xref offset outside the file"));
    }
    let (_, obj) = Parser::new(data, offset)
        .with_options(*options)
        .parse_indirect_object()?;

    let Object::Stream { ref dict, .. } = obj else {
        return Err(Error::malformed_at(offset, "xref offset does not point at a table or stream"));
    };
    if dict.get("Type").and_then(|t| t.as_name()) != Some("XRef") {
        return Err(Error::malformed_at(offset, "cross-reference stream lacks /Type /XRef"));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|w| w.as_array())
        .map(|w| w.iter().filter_map(|o| o.as_integer()).map(|n| n.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|w| *w > 8) {
        return Err(Error::malformed_at(offset, "invalid /W in cross-reference stream"));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::malformed_at(offset, "cross-reference stream lacks /Size"))?;

    let index_value = |o: &Object| -> Result<u32> {
        o.as_integer()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::malformed_at(offset, "invalid /Index in cross-reference stream"))
    };
    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks_exact(2)
            .map(|pair| Ok((index_value(&pair[0])?, index_value(&pair[1])?)))
            .collect::<Result<_>>()?,
        None => vec![(0, u32::try_from(size.max(0)).unwrap_or(u32::MAX))],
    };

    let decoded = obj.decode_stream_data_with(options).map_err(|e| {
        Error::malformed_at(offset, format!("cannot decode cross-reference stream: {}", e))
    })?;

    let record_len: usize = widths.iter().sum();
    if record_len == 0 {
        return Err(Error::malformed_at(offset, "zero-width cross-reference records"));
    }
    let mut records = decoded.chunks_exact(record_len);
    let mut entries = Vec::new();

    for (start, count) in ranges {
        for i in 0..count {
            let Some(record) = records.next() else {
                if options.strict {
                    return Err(Error::malformed_at(offset, "cross-reference stream data is truncated"));
                }
                log::warn!("Cross-reference stream at byte {} is truncated", offset);
                return Ok((entries, dict.clone()));
            };

            let (f1, rest) = record.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // An omitted type field defaults to 1.
            let kind = if widths[0] == 0 { 1 } else { read_be(f1) };
            let (f2, f3) = (read_be(f2), read_be(f3));

            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: f2 as usize,
                    gen: f3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: f2 as u32,
                    index: f3 as u32,
                },
                // Unknown types are reserved and mean "null object".
                _ => XRefEntry::Free,
            };
            let id = start
                .checked_add(i)
                .ok_or_else(|| Error::malformed_at(offset, "/Index range runs past the largest object number"))?;
            entries.push((id, entry));
        }
    }

    Ok((entries, dict.clone()))
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
