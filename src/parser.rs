//! PDF object parser.
//!
//! Builds [`Object`] values out of lexer tokens. A [`Parser`] is a cursor over
//! the whole input buffer so that every error can name the byte offset it
//! happened at.
//!
//! Streams only occur inside indirect objects, so [`Parser::parse_object`]
//! never produces one; [`Parser::parse_indirect_object`] does, using the
//! dictionary's `/Length` (resolved through a caller-supplied closure when it
//! is an indirect reference) and falling back to scanning for `endstream` in
//! lenient mode.

use crate::error::{Error, Result};
use crate::lexer::{decode_hex_string, decode_literal_string, skip_ws, token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser_config::ParserOptions;

/// Looks up the integer value of an indirect `/Length`.
pub type LengthResolver<'r> = dyn Fn(ObjectRef) -> Option<i64> + 'r;

/// Cursor-based object parser.
pub struct Parser<'a, 'r> {
    data: &'a [u8],
    pos: usize,
    options: ParserOptions,
    length_resolver: Option<&'r LengthResolver<'r>>,
}

impl<'a, 'r> Parser<'a, 'r> {
    /// Create a parser positioned at `pos` in `data`.
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
            options: ParserOptions::default(),
            length_resolver: None,
        }
    }

    /// Use the given options.
    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve indirect stream lengths through `resolver`.
    pub fn with_length_resolver(mut self, resolver: &'r LengthResolver<'r>) -> Self {
        self.length_resolver = Some(resolver);
        self
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn next_token(&mut self) -> Result<Token<'a>> {
        let start = self.data.len() - skip_ws(self.remaining()).len();
        match token(self.remaining()) {
            Ok((rest, tok)) => {
                self.pos = self.data.len() - rest.len();
                Ok(tok)
            },
            Err(_) if start >= self.data.len() => {
                Err(Error::malformed_at(start, "unexpected end of input"))
            },
            Err(_) => Err(Error::malformed_at(
                start,
                format!("unrecognized token starting with 0x{:02X}", self.data[start]),
            )),
        }
    }

    fn peek_token(&self) -> Option<(Token<'a>, usize)> {
        token(self.remaining())
            .ok()
            .map(|(rest, tok)| (tok, self.data.len() - rest.len()))
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        let at = self.data.len() - skip_ws(self.remaining()).len();
        let tok = self.next_token()?;
        if tok.is_keyword(kw.as_bytes()) {
            Ok(())
        } else {
            Err(Error::malformed_at(at, format!("expected '{}', found {:?}", kw, tok)))
        }
    }

    /// Parse one direct object.
    pub fn parse_object(&mut self) -> Result<Object> {
        self.parse_nested(0)
    }

    fn parse_nested(&mut self, depth: usize) -> Result<Object> {
        let at = self.data.len() - skip_ws(self.remaining()).len();
        let tok = self.next_token()?;
        self.object_from_token(tok, at, depth)
    }

    fn object_from_token(&mut self, tok: Token<'a>, at: usize, depth: usize) -> Result<Object> {
        match tok {
            Token::Integer(i) => Ok(self.maybe_reference(i)),
            Token::Real(r) => Ok(Object::Real(r)),
            Token::LiteralString(raw) => Ok(Object::String(decode_literal_string(raw))),
            Token::HexString(raw) => Ok(Object::String(decode_hex_string(raw))),
            Token::Name(name) => Ok(Object::Name(name)),
            Token::ArrayStart => self.parse_array(at, depth + 1),
            Token::DictStart => self.parse_dictionary(at, depth + 1).map(Object::Dictionary),
            Token::Keyword(b"true") => Ok(Object::Boolean(true)),
            Token::Keyword(b"false") => Ok(Object::Boolean(false)),
            Token::Keyword(b"null") => Ok(Object::Null),
            other => Err(Error::malformed_at(at, format!("unexpected token {:?}", other))),
        }
    }

    /// `N G R` is a reference; otherwise the integer stands alone.
    fn maybe_reference(&mut self, first: i64) -> Object {
        let saved = self.pos;
        if let Some((Token::Integer(gen), after_gen)) = self.peek_token() {
            self.pos = after_gen;
            if let Some((tok, after_r)) = self.peek_token() {
                let in_range = (0..=u32::MAX as i64).contains(&first)
                    && (0..=u16::MAX as i64).contains(&gen);
                if in_range && tok.is_keyword(b"R") {
                    self.pos = after_r;
                    return Object::Reference(ObjectRef::new(first as u32, gen as u16));
                }
            }
        }
        self.pos = saved;
        Object::Integer(first)
    }

    fn check_depth(&self, at: usize, depth: usize) -> Result<()> {
        if depth > self.options.max_nesting {
            return Err(Error::malformed_at(
                at,
                format!("nesting deeper than {} levels", self.options.max_nesting),
            ));
        }
        Ok(())
    }

    fn parse_array(&mut self, at: usize, depth: usize) -> Result<Object> {
        self.check_depth(at, depth)?;
        let mut items = Vec::new();

        loop {
            let item_at = self.data.len() - skip_ws(self.remaining()).len();
            let tok = self.next_token().map_err(|_| Error::malformed_at(at, "unterminated array"))?;
            if tok == Token::ArrayEnd {
                return Ok(Object::Array(items));
            }
            items.push(self.object_from_token(tok, item_at, depth)?);
        }
    }

    fn parse_dictionary(&mut self, at: usize, depth: usize) -> Result<Dictionary> {
        self.check_depth(at, depth)?;
        let mut dict = Dictionary::new();

        loop {
            let key_at = self.data.len() - skip_ws(self.remaining()).len();
            let tok = self
                .next_token()
                .map_err(|_| Error::malformed_at(at, "unterminated dictionary"))?;
            match tok {
                Token::DictEnd => return Ok(dict),
                Token::Name(key) => {
                    let value = self.parse_nested(depth)?;
                    // A null value is equivalent to an absent key.
                    if !value.is_null() {
                        dict.insert(key, value);
                    }
                },
                other => {
                    return Err(Error::malformed_at(
                        key_at,
                        format!("dictionary key must be a name, found {:?}", other),
                    ));
                },
            }
        }
    }

    /// Parse `N G obj <object> [stream ... endstream] endobj`.
    pub fn parse_indirect_object(&mut self) -> Result<(ObjectRef, Object)> {
        let header_at = self.data.len() - skip_ws(self.remaining()).len();
        let id = match self.next_token()? {
            Token::Integer(n) if (0..=u32::MAX as i64).contains(&n) => n as u32,
            other => {
                return Err(Error::malformed_at(
                    header_at,
                    format!("expected object number, found {:?}", other),
                ));
            },
        };
        let gen = match self.next_token()? {
            Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
            other => {
                return Err(Error::malformed_at(
                    header_at,
                    format!("expected generation number, found {:?}", other),
                ));
            },
        };
        self.expect_keyword("obj")?;
        let obj_ref = ObjectRef::new(id, gen);

        let body_at = self.data.len() - skip_ws(self.remaining()).len();
        let tok = self.next_token()?;
        let object = match tok {
            Token::DictStart => {
                let dict = self.parse_dictionary(body_at, 1)?;
                match self.peek_token() {
                    Some((tok, after)) if tok.is_keyword(b"stream") => {
                        self.pos = after;
                        let data = self.parse_stream_body(obj_ref, &dict)?;
                        Object::Stream { dict, data }
                    },
                    _ => Object::Dictionary(dict),
                }
            },
            // "N G obj endobj" is an empty object, read as null.
            tok if tok.is_keyword(b"endobj") => return Ok((obj_ref, Object::Null)),
            tok => self.object_from_token(tok, body_at, 0)?,
        };

        match self.peek_token() {
            Some((tok, after)) if tok.is_keyword(b"endobj") => self.pos = after,
            _ if self.options.strict => {
                return Err(Error::malformed_at(self.pos, format!("missing endobj after {}", obj_ref)));
            },
            _ => log::warn!("Object {} is missing endobj", obj_ref),
        }

        Ok((obj_ref, object))
    }

    fn declared_length(&self, dict: &Dictionary) -> Option<usize> {
        let length = match dict.get("Length")? {
            Object::Integer(n) => Some(*n),
            Object::Reference(r) => self.length_resolver.and_then(|resolve| resolve(*r)),
            _ => None,
        }?;
        usize::try_from(length).ok()
    }

    /// Read the payload after the `stream` keyword, leaving the cursor past
    /// `endstream`.
    fn parse_stream_body(&mut self, obj_ref: ObjectRef, dict: &Dictionary) -> Result<bytes::Bytes> {
        let rest = self.remaining();
        let eol = if rest.starts_with(b"\r\n") {
            2
        } else if rest.starts_with(b"\n") || rest.starts_with(b"\r") {
            1
        } else {
            0
        };
        let start = self.pos + eol;

        if let Some(len) = self.declared_length(dict) {
            if let Some(end) = start.checked_add(len).filter(|end| *end <= self.data.len()) {
                let after = skip_ws(&self.data[end..]);
                if after.starts_with(b"endstream") {
                    self.pos = self.data.len() - after.len() + b"endstream".len();
                    return Ok(bytes::Bytes::copy_from_slice(&self.data[start..end]));
                }
            }
            if self.options.strict {
                return Err(Error::malformed_at(
                    start,
                    format!("/Length {} of {} does not end at endstream", len, obj_ref),
                ));
            }
            log::warn!("Stream {} has a wrong /Length ({}), scanning for endstream", obj_ref, len);
        } else if self.options.strict {
            return Err(Error::malformed_at(start, format!("stream {} has no usable /Length", obj_ref)));
        }

        let found = find_keyword(&self.data[start..], b"endstream")
            .ok_or_else(|| Error::malformed_at(start, format!("stream {} has no endstream", obj_ref)))?;
        let mut end = start + found;
        // The EOL before endstream is not part of the data.
        if end > start && self.data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.data[end - 1] == b'\r' {
            end -= 1;
        }
        self.pos = start + found + b"endstream".len();
        Ok(bytes::Bytes::copy_from_slice(&self.data[start..end]))
    }
}

/// Offset of the first occurrence of `keyword` in `haystack`.
pub(crate) fn find_keyword(haystack: &[u8], keyword: &[u8]) -> Option<usize> {
    haystack.windows(keyword.len()).position(|w| w == keyword)
}

/// Parse a single direct object from `input` with default options.
///
/// ```
/// use pdf_minimizer::parser::parse_object;
/// use pdf_minimizer::object::Object;
///
/// let obj = parse_object(b"[1 0 R /Name (text)]").unwrap();
/// assert_eq!(obj.as_array().map(|a| a.len()), Some(3));
/// ```
pub fn parse_object(input: &[u8]) -> Result<Object> {
    Parser::new(input, 0).parse_object()
}
