//! PDF object types.
//!
//! [`Object`] is the value model shared by the parser, the copier and the
//! writer. Indirect objects are never owned by other objects; they are named
//! through an [`ObjectRef`] and looked up in the document that owns them, so
//! cyclic graphs (a page pointing at its parent that lists the page as a kid)
//! need no back-pointers.

use crate::decoders::{decode_stream_with_options, DecodeParams};
use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;
use std::collections::HashMap;

/// Dictionary representation. Key order carries no meaning in PDF.
pub type Dictionary = HashMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + raw, still-encoded payload)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Stream data exactly as stored in the file
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
///
/// Ordering is by object number, then generation, which is the order the
/// writer emits objects in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// Anything that can turn a reference into the object it names.
///
/// Implemented by the lazily parsed source ([`crate::document::PdfDocument`])
/// and by the in-memory arena ([`crate::store::ObjectStore`]), so the page
/// tree walker and the copier work against either.
pub trait ObjectResolver {
    /// Resolve `obj_ref`, failing with [`Error::DanglingReference`] when the
    /// document has no such object.
    fn resolve(&mut self, obj_ref: ObjectRef) -> Result<Object>;

    /// Follow a value through at most one level of indirection.
    fn resolve_value(&mut self, value: &Object) -> Result<Object> {
        match value {
            Object::Reference(r) => self.resolve(*r),
            other => Ok(other.clone()),
        }
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an Integer or Real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw payload of a stream object.
    pub fn stream_data(&self) -> Option<&bytes::Bytes> {
        match self {
            Object::Stream { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// `/Type` of a dictionary or stream, if present.
    pub fn dict_type(&self) -> Option<&str> {
        self.as_dict()?.get("Type")?.as_name()
    }

    /// Collect every reference reachable from this value without crossing
    /// into other indirect objects.
    ///
    /// Stream payloads are opaque and never inspected.
    pub fn collect_references(&self, out: &mut Vec<ObjectRef>) {
        match self {
            Object::Reference(r) => out.push(*r),
            Object::Array(arr) => {
                for item in arr {
                    item.collect_references(out);
                }
            },
            Object::Dictionary(dict) | Object::Stream { dict, .. } => {
                for value in dict.values() {
                    value.collect_references(out);
                }
            },
            _ => {},
        }
    }

    /// Decode stream data using the filters named in the stream dictionary.
    ///
    /// The minimizer itself never calls this on page content; it exists for
    /// the xref-stream and object-stream readers and for callers that want
    /// to look inside a payload.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        self.decode_stream_data_with(&ParserOptions::default())
    }

    /// Like [`Object::decode_stream_data`], enforcing the decompression
    /// limits of `options`.
    pub fn decode_stream_data_with(&self, options: &ParserOptions) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = dict
                    .get("Filter")
                    .map(extract_filter_names)
                    .unwrap_or_default();

                if filters.is_empty() {
                    return Ok(data.to_vec());
                }

                let params = extract_decode_params(dict.get("DecodeParms"), filters.len());
                decode_stream_with_options(data, &filters, &params, options)
            },
            _ => Err(Error::Decode(format!(
                "expected Stream, found {}",
                self.type_name()
            ))),
        }
    }
}

/// Extract filter names from a Filter object.
///
/// The Filter entry can be either a single Name or an Array of Names.
fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Per-filter decode parameters.
///
/// `/DecodeParms` is either one dictionary (single filter) or an array with
/// one entry per filter, `null` where a filter takes no parameters.
fn extract_decode_params(params_obj: Option<&Object>, filter_count: usize) -> Vec<Option<DecodeParams>> {
    let mut params = vec![None; filter_count];
    match params_obj {
        Some(Object::Dictionary(d)) => {
            if let Some(slot) = params.first_mut() {
                *slot = Some(DecodeParams::from_dict(d));
            }
        },
        Some(Object::Array(arr)) => {
            for (slot, entry) in params.iter_mut().zip(arr.iter()) {
                if let Object::Dictionary(d) = entry {
                    *slot = Some(DecodeParams::from_dict(d));
                }
            }
        },
        _ => {},
    }
    params
}
