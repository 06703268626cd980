//! PDF lexer (tokenizer).
//!
//! Splits a byte buffer into the tokens of PDF syntax: numbers, literal and
//! hexadecimal strings, names, the four container delimiters and bare
//! keywords (`true`, `obj`, `R`, `xref`, ...). Whitespace and `%` comments
//! between tokens are skipped.
//!
//! Tokens borrow from the input. String tokens carry their raw bytes; use
//! [`decode_literal_string`] and [`decode_hex_string`] to obtain the value.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};

/// A lexical token.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (`42`, `-7`, `+3`)
    Integer(i64),
    /// Real number (`3.5`, `-.25`, `4.`)
    Real(f64),
    /// Raw bytes between `(` and the matching `)`
    LiteralString(&'a [u8]),
    /// Raw bytes between `<` and `>`
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded, without the leading `/`
    Name(String),
    /// Bare run of regular characters (`true`, `null`, `obj`, `R`, ...)
    Keyword(&'a [u8]),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
}

impl<'a> Token<'a> {
    /// Whether this token is the keyword `kw`.
    pub fn is_keyword(&self, kw: &[u8]) -> bool {
        matches!(self, Token::Keyword(k) if *k == kw)
    }
}

/// PDF whitespace characters.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Anything that is neither whitespace nor a delimiter.
pub fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    value((), take_while1(is_whitespace))(input)
}

/// Skip whitespace and comments, returning the rest of the input.
pub fn skip_ws(input: &[u8]) -> &[u8] {
    match many0(alt((whitespace, comment)))(input) {
        Ok((rest, _)) => rest,
        Err(_) => input,
    }
}

fn number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(pair(
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    ))(input)?;

    // "12abc" is not a number followed by a keyword.
    if rest.first().is_some_and(|&c| is_regular(c)) {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    // Digits and signs only, so this is valid UTF-8.
    let text = std::str::from_utf8(text).unwrap_or("0");
    if !text.contains('.') {
        if let Ok(i) = text.parse::<i64>() {
            return Ok((rest, Token::Integer(i)));
        }
    }
    match text.parse::<f64>() {
        Ok(r) => Ok((rest, Token::Real(r))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))),
    }
}

/// Literal strings nest balanced parentheses, so this scans by hand.
fn literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut i = 0;

    while i < body.len() {
        match body[i] {
            b'\\' => i += 2,
            b'(' => {
                depth += 1;
                i += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[i + 1..], Token::LiteralString(&body[..i])));
                }
                i += 1;
            },
            _ => i += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)))
}

fn hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(
        delimited(
            char('<'),
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            char('>'),
        ),
        Token::HexString,
    )(input)
}

fn name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(preceded(char('/'), take_while(is_regular)), |raw: &[u8]| {
        Token::Name(decode_name(raw))
    })(input)
}

fn delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

fn keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(is_regular), Token::Keyword)(input)
}

/// Parse the next token, skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((delimiter, name, number, literal_string, hex_string, keyword))(input)
}

/// Decode `#XX` escapes in a name.
///
/// Each resulting byte maps to the char with the same code point, so names
/// with non-ASCII bytes survive a parse/serialize cycle unchanged.
pub fn decode_name(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Some(h), Some(l)) = (
                crate::decoders::hex_value(raw[i + 1]),
                crate::decoders::hex_value(raw[i + 2]),
            ) {
                out.push(((h << 4) | l) as char);
                i += 3;
                continue;
            }
        }
        out.push(raw[i] as char);
        i += 1;
    }

    out
}

/// Decode escape sequences in a literal string body.
///
/// Handles `\n \r \t \b \f \( \) \\`, one to three digit octal escapes and
/// backslash line continuations. An end-of-line inside the string is
/// normalized to a single LF. Unknown escapes drop the backslash.
pub fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i];
        if c == b'\r' {
            out.push(b'\n');
            i += if raw.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
            continue;
        }
        if c != b'\\' {
            out.push(c);
            i += 1;
            continue;
        }

        let Some(&next) = raw.get(i + 1) else {
            break;
        };
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'0'..=b'7' => {
                let mut code = (next - b'0') as u32;
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            code = code * 8 + (d - b'0') as u32;
                            i += 1;
                        },
                        _ => break,
                    }
                }
                out.push((code & 0xFF) as u8);
            },
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'\n' => {},
            other => out.push(other),
        }
    }

    out
}

/// Decode the body of a hexadecimal string. Whitespace is ignored and an odd
/// final digit is padded with `0`.
pub fn decode_hex_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() / 2 + 1);
    let mut high: Option<u8> = None;

    for nibble in raw.iter().filter_map(|&c| crate::decoders::hex_value(c)) {
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }

    out
}
