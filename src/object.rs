//! PDF object model.
//!
//! [`Object`] is the tagged sum every layer above the lexer traffics in.
//! Accessors are total: a kind mismatch yields `None` (and helpers built on
//! them yield a zero value), never an error — higher layers decide when
//! absence is meaningful.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Dictionary payload shared by dictionaries and streams.
pub type Dict = HashMap<String, Object>;

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
    /// String (binary-safe byte array)
    String(Vec<u8>),
    /// Name (written with a leading / in the file)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dict),
    /// Stream (dictionary + payload bytes)
    Stream {
        /// Stream dictionary
        dict: Dict,
        /// Raw stream payload, still encoded/encrypted as found in the file
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Identity of an indirect object: `(id, generation)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

impl Object {
    /// Human-readable kind name, without the payload.
    pub fn kind(&self) -> &'static str {
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

    /// Try to cast to real.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Numeric coercion: integers and reals both come back as `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
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

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to string bytes.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Streams expose their dictionary too.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
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

    /// Raw stream payload, if this is a stream.
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

    /// Decode this stream's payload through its declared filter chain.
    ///
    /// Convenience wrapper over [`Object::decode_stream_with`] for streams
    /// that are not encrypted.
    pub fn decode_stream(&self) -> Result<Vec<u8>> {
        self.decode_stream_with(None, ObjectRef::new(0, 0))
    }

    /// Decode this stream's payload, decrypting first when a decryptor is
    /// supplied.
    ///
    /// Decryption happens before filters run; the stream payload in the file
    /// is `encrypt(compress(plain))`. Unencrypted streams get their leading
    /// whitespace trimmed (some producers pad after the `stream` keyword);
    /// encrypted payloads are binary and must not be touched.
    pub fn decode_stream_with(
        &self,
        decryptor: Option<&dyn Fn(&[u8]) -> Result<Vec<u8>>>,
        owner: ObjectRef,
    ) -> Result<Vec<u8>> {
        let (dict, data) = match self {
            Object::Stream { dict, data } => (dict, data),
            _ => {
                return Err(Error::InvalidPdf(format!(
                    "expected Stream, found {}",
                    self.kind()
                )))
            }
        };

        let decrypted = match decryptor {
            Some(decrypt) => {
                log::debug!("decrypting stream {} ({} bytes)", owner, data.len());
                decrypt(data)?
            }
            None => trim_leading_whitespace(data).to_vec(),
        };

        let chain = filter_chain(dict);
        crate::decoders::decode_chain(&decrypted, &chain)
    }
}

/// Access to the object store for layers that walk object graphs.
///
/// Fonts, pages, and the interpreter all need to chase references and
/// read stream bodies; this trait decouples them from the document type.
/// Implementations resolve through their cache and apply decryption and
/// the filter pipeline to stream bodies.
pub trait Resolve {
    /// Follow references until a concrete object (bounded hops); a free or
    /// missing object resolves to null, never an error.
    fn resolve(&self, obj: &Object) -> Object;

    /// Fully decoded bytes of a stream object (or of the stream a
    /// reference points at). `None` when the object is not a stream.
    fn decoded_stream(&self, obj: &Object) -> Option<Vec<u8>>;
}

/// PDF whitespace bytes (NUL, TAB, LF, FF, CR, SPACE).
pub(crate) fn is_pdf_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let mut start = 0;
    while start < data.len() && is_pdf_whitespace(data[start]) {
        start += 1;
    }
    &data[start..]
}

/// One step of a stream's filter pipeline: filter name plus its parameters.
#[derive(Debug, Clone, Default)]
pub struct FilterStep {
    /// Filter name as written (`FlateDecode`, `LZWDecode`, ...)
    pub name: String,
    /// Decode parameters from the matching `/DecodeParms` slot
    pub params: Option<crate::decoders::DecodeParams>,
}

/// Build the ordered filter chain from a stream dictionary.
///
/// `/Filter` may be a single name or an array applied left to right;
/// `/DecodeParms` (or its legacy alias `/DP`) is matched positionally.
pub fn filter_chain(dict: &Dict) -> Vec<FilterStep> {
    let names: Vec<String> = match dict.get("Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().map(|s| s.to_string()))
            .collect(),
        _ => return Vec::new(),
    };

    let parms = dict.get("DecodeParms").or_else(|| dict.get("DP"));
    let params_at = |i: usize| -> Option<crate::decoders::DecodeParams> {
        match parms? {
            Object::Dictionary(d) if i == 0 => Some(crate::decoders::DecodeParams::from_dict(d)),
            Object::Array(arr) => match arr.get(i)? {
                Object::Dictionary(d) => Some(crate::decoders::DecodeParams::from_dict(d)),
                _ => None,
            },
            _ => None,
        }
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| FilterStep {
            params: params_at(i),
            name,
        })
        .collect()
}
