//! PDF object types.

use crate::error::{Error, Result};
use crate::xref::XRef;
use indexmap::IndexMap;

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
    Dictionary(Dict),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: Dict,
        /// Raw (still encoded) stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
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

/// A PDF dictionary.
///
/// Keys keep their insertion order so a parse/serialize round trip does not
/// reorder entries. Values may be indirect references; callers choose per
/// lookup whether a reference should be followed:
///
/// * [`Dict::get_raw`] returns the stored value as-is.
/// * [`Dict::get`] resolves a `Reference` value through the given [`XRef`],
///   making the lookup's dependency on the document explicit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dict {
    entries: IndexMap<String, Object>,
}

impl Dict {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key-value pair, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Object) -> Option<Object> {
        self.entries.insert(key.into(), value)
    }

    /// Look up a key without resolving indirect references.
    pub fn get_raw(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    /// Look up a key, resolving indirect references through `xref`.
    ///
    /// Returns `Ok(None)` when the key is absent. A stored `Reference` is
    /// fetched (which may fail, e.g. with a missing-data signal from a
    /// progressive source); a fetched value that is itself a reference is
    /// followed until a direct object appears, with a [`RefSet`] guarding
    /// against reference cycles.
    pub fn get(&self, key: &str, xref: &XRef) -> Result<Option<Object>> {
        let mut current = match self.entries.get(key) {
            None => return Ok(None),
            Some(obj) => obj.clone(),
        };
        let mut seen = RefSet::new();
        while let Object::Reference(r) = current {
            if !seen.put(r) {
                return Err(Error::InvalidStructure(format!(
                    "reference cycle while resolving /{} at {}",
                    key, r
                )));
            }
            current = xref.fetch(r)?;
        }
        Ok(Some(current))
    }

    /// Remove a key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.shift_remove(key)
    }

    /// Whether the dictionary contains `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter()
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

impl FromIterator<(String, Object)> for Dict {
    fn from_iter<I: IntoIterator<Item = (String, Object)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Set of object references, used for cycle detection while resolving chains
/// of indirect references.
#[derive(Debug, Default)]
pub struct RefSet {
    seen: std::collections::HashSet<ObjectRef>,
}

impl RefSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `r` has been recorded.
    pub fn has(&self, r: ObjectRef) -> bool {
        self.seen.contains(&r)
    }

    /// Record `r`; returns false if it was already present.
    pub fn put(&mut self, r: ObjectRef) -> bool {
        self.seen.insert(r)
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

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dict> {
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

    /// Try to cast to real number. Integers widen to f64.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            Object::Integer(i) => Some(*i as f64),
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

    /// Try to cast to a stream's dictionary and raw data.
    pub fn as_stream(&self) -> Option<(&Dict, &bytes::Bytes)> {
        match self {
            Object::Stream { dict, data } => Some((dict, data)),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Whether this is a stream whose dictionary marks it as an image XObject.
    pub fn is_image_stream(&self) -> bool {
        match self {
            Object::Stream { dict, .. } => {
                dict.get_raw("Subtype").and_then(Object::as_name) == Some("Image")
            },
            _ => false,
        }
    }

    /// Decode stream data using filters specified in the stream dictionary.
    ///
    /// Convenience wrapper over [`Object::decode_stream_data_with_decryption`]
    /// with no decryption.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        self.decode_stream_data_with_decryption(None, 0, 0)
    }

    /// Decode stream data with optional decryption.
    ///
    /// Streams are decrypted BEFORE filters are applied (encryption happens
    /// after compression when the file is written).
    ///
    /// # Arguments
    ///
    /// * `decryption_fn` - Optional decryption function (from the encryption handler)
    /// * `obj_num` - Object number (for logging)
    /// * `gen_num` - Generation number (for logging)
    pub fn decode_stream_data_with_decryption(
        &self,
        decryption_fn: Option<&dyn Fn(&[u8]) -> Result<Vec<u8>>>,
        obj_num: u32,
        gen_num: u16,
    ) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                // Encrypted payloads are binary; only unencrypted streams get
                // the lenient leading-whitespace trim.
                let decrypted_data = if let Some(decrypt) = decryption_fn {
                    log::debug!(
                        "Decrypting stream for object {} {} ({} bytes)",
                        obj_num,
                        gen_num,
                        data.len()
                    );
                    decrypt(data)?
                } else {
                    trim_leading_stream_whitespace(data).to_vec()
                };

                let filters = dict
                    .get_raw("Filter")
                    .map(extract_filter_names)
                    .unwrap_or_default();

                if filters.is_empty() {
                    Ok(decrypted_data)
                } else {
                    let decode_params = extract_decode_params(dict.get_raw("DecodeParms"));
                    crate::decoders::decode_stream_with_params(
                        &decrypted_data,
                        &filters,
                        decode_params.as_ref(),
                    )
                }
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

/// Trim leading PDF whitespace from stream data.
///
/// Stream data begins immediately after the EOL marker following "stream",
/// but some generators add extra whitespace characters.
fn trim_leading_stream_whitespace(data: &[u8]) -> &[u8] {
    let mut start = 0;
    while start < data.len() {
        match data[start] {
            0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20 => start += 1,
            _ => break,
        }
    }
    &data[start..]
}

/// Extract filter names from a Filter object.
///
/// The Filter entry can be a single Name (e.g. /FlateDecode) or an Array of
/// Names applied in order.
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

/// Extract predictor parameters from a DecodeParms object.
///
/// DecodeParms can be a dictionary, an array of dictionaries (one per
/// filter), or absent.
fn extract_decode_params(params_obj: Option<&Object>) -> Option<crate::decoders::DecodeParams> {
    let dict = match params_obj? {
        Object::Dictionary(d) => d,
        Object::Array(arr) => arr.iter().filter_map(|obj| obj.as_dict()).next()?,
        _ => return None,
    };

    let predictor = dict
        .get_raw("Predictor")
        .and_then(|obj| obj.as_integer())
        .unwrap_or(1);

    let columns = dict
        .get_raw("Columns")
        .and_then(|obj| obj.as_integer())
        .unwrap_or(1) as usize;

    let colors = dict
        .get_raw("Colors")
        .and_then(|obj| obj.as_integer())
        .unwrap_or(1) as usize;

    let bits_per_component = dict
        .get_raw("BitsPerComponent")
        .and_then(|obj| obj.as_integer())
        .unwrap_or(8) as usize;

    Some(crate::decoders::DecodeParams {
        predictor,
        columns,
        colors,
        bits_per_component,
    })
}
