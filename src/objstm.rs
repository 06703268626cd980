//! Object streams (`/Type /ObjStm`, PDF 1.5+).
//!
//! An object stream packs several non-stream objects into one compressed
//! payload. The decoded payload starts with `/N` pairs of integers
//! `obj_num offset`, where each offset is relative to `/First`:
//!
//! ```text
//! 10 0 11 15 12 28
//! << /Type /Font ... >>      % object 10 at First + 0
//! [0 0 612 792]              % object 11 at First + 15
//! ...
//! ```
//!
//! The header is read once; individual members are parsed on demand.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Object, ObjectRef};
use crate::parser::Parser;
use crate::parser_config::ParserOptions;

/// A decoded object stream with its member table.
#[derive(Debug, Clone)]
pub struct ObjectStream {
    decoded: Vec<u8>,
    first: usize,
    members: Vec<(u32, usize)>,
    options: ParserOptions,
}

impl ObjectStream {
    /// Decode `stream_obj` and read its header. `stream_ref` is used in errors.
    pub fn parse(stream_ref: ObjectRef, stream_obj: &Object, options: &ParserOptions) -> Result<Self> {
        let dict = match stream_obj {
            Object::Stream { dict, .. } => dict,
            other => {
                return Err(Error::malformed(format!(
                    "object stream {} is a {}",
                    stream_ref,
                    other.type_name()
                )));
            },
        };
        if let Some(kind) = dict.get("Type").and_then(|t| t.as_name()) {
            if kind != "ObjStm" {
                return Err(Error::malformed(format!("object {} has /Type /{}, expected /ObjStm", stream_ref, kind)));
            }
        }

        let count = dict.get("N").and_then(|o| o.as_integer());
        let first = dict.get("First").and_then(|o| o.as_integer());
        let (count, first) = match (count, first) {
            (Some(n), Some(f)) if n >= 0 && f >= 0 => (n as usize, f as usize),
            _ => {
                return Err(Error::malformed(format!(
                    "object stream {} lacks a valid /N or /First",
                    stream_ref
                )));
            },
        };

        let decoded = stream_obj.decode_stream_data_with(options).map_err(|e| {
            Error::malformed(format!("cannot decode object stream {}: {}", stream_ref, e))
        })?;
        if first > decoded.len() {
            return Err(Error::malformed(format!(
                "object stream {} has /First {} beyond its {} decoded bytes",
                stream_ref,
                first,
                decoded.len()
            )));
        }

        let mut members = Vec::with_capacity(count.min(first / 2 + 1));
        let mut header = &decoded[..first];
        for _ in 0..count {
            let pair = token(header).and_then(|(rest, id)| token(rest).map(|(rest, off)| (rest, id, off)));
            match pair {
                Ok((rest, Token::Integer(id), Token::Integer(off))) if id >= 0 && off >= 0 => {
                    members.push((id as u32, off as usize));
                    header = rest;
                },
                _ => {
                    return Err(Error::malformed(format!(
                        "object stream {} header is shorter than /N {}",
                        stream_ref, count
                    )));
                },
            }
        }

        Ok(Self {
            decoded,
            first,
            members,
            options: *options,
        })
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the stream has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Object numbers of the members, in header order.
    pub fn member_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.members.iter().map(|(id, _)| *id)
    }

    /// Parse the member at `index`, checking that it carries object number `id`.
    ///
    /// A stale index (the xref says one thing, the header another) falls back
    /// to a lookup by object number.
    pub fn get(&self, id: u32, index: usize) -> Result<Object> {
        let offset = match self.members.get(index) {
            Some((member, offset)) if *member == id => *offset,
            _ => self
                .members
                .iter()
                .find(|(member, _)| *member == id)
                .map(|(_, offset)| *offset)
                .ok_or(Error::DanglingReference(ObjectRef::new(id, 0)))?,
        };

        let start = self.first + offset;
        if start > self.decoded.len() {
            return Err(Error::malformed(format!("object {} lies outside its object stream", id)));
        }
        Parser::new(&self.decoded, start)
            .with_options(self.options)
            .parse_object()
    }
}
