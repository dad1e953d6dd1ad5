//! Cross-reference index and object resolution.
//!
//! The [`XRef`] owns the mapping from object number to storage location,
//! the lazy resolution cache, and the decryption wiring. It is built by
//! walking the chain of cross-reference sections (classic tables and
//! cross-reference streams) from the newest section backwards through
//! `Prev` links, and falls back to a brute-force scan of the file when the
//! stored index is absent or inconsistent.
//!
//! Resolution is synchronous: over a progressively loaded source, any
//! operation that needs bytes that have not arrived yet fails with
//! [`Error::MissingData`] carrying the exact range, and the caller retries
//! the same call after supplying it. Retrying is safe; cache entries are
//! only written after an object resolves completely.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};

use log::warn;

use crate::encryption::EncryptionHandler;
use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dict, Object, ObjectRef};
use crate::parser::{parse_indirect, parse_object};
use crate::recovery;
use crate::source::ByteSource;

/// Storage location of one object number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Object number is not in use; `next_free` links the free list.
    Free {
        /// Next free object number (free-list convention)
        next_free: u32,
        /// Generation to use if the number is reused
        gen: u16,
    },
    /// Ordinary indirect object stored at a byte offset.
    Uncompressed {
        /// Byte offset of the `N G obj` header
        offset: usize,
        /// Expected generation number
        gen: u16,
    },
    /// Object stored inside an object stream (ObjStm).
    InStream {
        /// Object number of the containing stream
        stream_num: u32,
        /// Position within the container
        index: u32,
    },
}

/// Cross-reference index for one open document.
#[derive(Debug)]
pub struct XRef {
    source: ByteSource,
    entries: RefCell<HashMap<u32, XRefEntry>>,
    cache: RefCell<HashMap<u32, Object>>,
    trailer: Dict,
    encryption: Option<EncryptionHandler>,
    /// Whether the scan-based rebuild has already run; it runs at most once.
    repaired: Cell<bool>,
    /// Whether the newest index section was a cross-reference stream.
    from_stream: bool,
}

impl XRef {
    /// Build the index by parsing cross-reference sections starting at
    /// `start_offset` (the value after `startxref`).
    ///
    /// `None` for the offset, or any structural failure during parsing,
    /// falls back to rebuilding the index by scanning the whole file. The
    /// missing-data signal is never treated as a structural failure.
    pub fn parse(
        source: ByteSource,
        start_offset: Option<usize>,
        password: Option<&[u8]>,
    ) -> Result<Self> {
        let mut entries = HashMap::new();
        let mut top_trailer: Option<Dict> = None;
        let mut from_stream = false;
        let mut repaired = false;

        let parsed = match start_offset {
            Some(start) => {
                read_sections(&source, start, &mut entries, &mut top_trailer, &mut from_stream)
            },
            None => Err(Error::InvalidXref("no startxref offset".to_string())),
        };

        if let Err(e) = parsed {
            if e.is_missing_data() {
                return Err(e);
            }
            warn!("cross-reference parse failed ({}), rebuilding index by scanning", e);
            entries.clear();
            top_trailer = recover_entries(&source, &mut entries)?;
            from_stream = false;
            repaired = true;
        }

        let trailer = top_trailer
            .ok_or_else(|| Error::InvalidStructure("no trailer dictionary found".to_string()))?;

        let mut xref = XRef {
            source,
            entries: RefCell::new(entries),
            cache: RefCell::new(HashMap::new()),
            trailer,
            encryption: None,
            repaired: Cell::new(repaired),
            from_stream,
        };
        xref.setup_encryption(password)?;
        Ok(xref)
    }

    /// Wire up the standard security handler from the trailer's /Encrypt
    /// entry, authenticating with the given password or the blank default.
    fn setup_encryption(&mut self, password: Option<&[u8]>) -> Result<()> {
        let encrypt_obj = match self.trailer.get_raw("Encrypt") {
            None => return Ok(()),
            Some(Object::Reference(r)) => self.fetch_with(*r, true)?,
            Some(obj) => obj.clone(),
        };
        if encrypt_obj.is_null() {
            return Ok(());
        }

        let file_id = self
            .trailer
            .get_raw("ID")
            .and_then(Object::as_array)
            .and_then(|ids| ids.first())
            .and_then(Object::as_string)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();

        let mut handler = EncryptionHandler::new(&encrypt_obj, file_id)?;
        let password = password.unwrap_or(b"");
        if !handler.authenticate(password) && !password.is_empty() {
            handler.authenticate(b"");
        }
        if !handler.is_authenticated() {
            return Err(Error::PasswordIncorrect);
        }
        self.encryption = Some(handler);
        Ok(())
    }

    /// The trailer dictionary of the newest revision.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Whether the document's newest index section was a cross-reference
    /// stream (used to keep incremental saves in the same encoding).
    pub fn is_stream_based(&self) -> bool {
        self.from_stream
    }

    /// Whether the document carries encryption.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// One past the highest valid object number, from the trailer.
    pub fn size(&self) -> u32 {
        self.trailer
            .get_raw("Size")
            .and_then(Object::as_integer)
            .unwrap_or(0) as u32
    }

    /// Look up the stored entry for an object number.
    pub fn entry(&self, num: u32) -> Option<XRefEntry> {
        self.entries.borrow().get(&num).copied()
    }

    /// Feed more file bytes into the underlying source, then retry whatever
    /// operation reported [`Error::MissingData`].
    pub fn supply(&mut self, offset: usize, chunk: &[u8]) {
        self.source.supply(offset, chunk);
    }

    /// The document catalog (the dictionary the trailer's Root points at).
    pub fn catalog(&self) -> Result<Dict> {
        match self.trailer.get("Root", self)? {
            Some(Object::Dictionary(d)) => Ok(d),
            Some(other) => Err(Error::InvalidStructure(format!(
                "document catalog is not a dictionary ({})",
                other.type_name()
            ))),
            None => Err(Error::InvalidStructure("trailer has no Root entry".to_string())),
        }
    }

    /// Resolve an indirect reference.
    ///
    /// Free or absent object numbers resolve to `Object::Null`; PDFs
    /// legitimately reference freed objects. The result is cached, so a
    /// second fetch of the same number returns the same value without
    /// touching the file again (streams are not cached, except image
    /// streams which are read repeatedly).
    pub fn fetch(&self, r: ObjectRef) -> Result<Object> {
        self.fetch_with(r, false)
    }

    /// [`XRef::fetch`] with an explicit decryption switch. Used internally
    /// for the Encrypt dictionary itself and for the unencrypted-retry path.
    pub fn fetch_with(&self, r: ObjectRef, suppress_encryption: bool) -> Result<Object> {
        if let Some(hit) = self.cache.borrow().get(&r.id) {
            return Ok(hit.clone());
        }

        match self.fetch_entry(r, suppress_encryption) {
            Ok(value) => Ok(value),
            Err(e) if e.is_missing_data() => Err(e),
            Err(
                e @ (Error::Unsupported(_) | Error::UnsupportedFilter(_) | Error::PasswordIncorrect),
            ) => Err(e),
            Err(e) => {
                // One scan-based rebuild, then the same fetch is retried.
                if self.repaired.get() {
                    return Err(e);
                }
                warn!("fetch of {} failed ({}), rebuilding index by scanning", r, e);
                self.repaired.set(true);
                self.rebuild_index()?;
                self.fetch_entry(r, suppress_encryption)
            },
        }
    }

    /// Resolve `obj` if it is a reference; return a clone otherwise.
    pub fn fetch_if_ref(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.fetch(*r),
            other => Ok(other.clone()),
        }
    }

    fn fetch_entry(&self, r: ObjectRef, suppress_encryption: bool) -> Result<Object> {
        let entry = self.entries.borrow().get(&r.id).copied();
        match entry {
            None | Some(XRefEntry::Free { .. }) => {
                self.cache.borrow_mut().insert(r.id, Object::Null);
                Ok(Object::Null)
            },
            Some(XRefEntry::Uncompressed { offset, .. }) => {
                self.fetch_uncompressed(r, offset, suppress_encryption)
            },
            Some(XRefEntry::InStream { stream_num, index }) => {
                self.fetch_compressed(r, stream_num, index)
            },
        }
    }

    fn fetch_uncompressed(
        &self,
        r: ObjectRef,
        offset: usize,
        suppress_encryption: bool,
    ) -> Result<Object> {
        let data = self.source.tail_from(offset)?;
        let (rest, (num, gen_found, value)) = match parse_indirect(data) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Err(missing_or(
                    &self.source,
                    offset,
                    Error::InvalidXref(format!("failed to parse object {} at offset {}", r, offset)),
                ));
            },
        };

        // The parser is lenient at end of input (an unclosed dictionary or
        // array yields what was collected), which is only sound when the
        // bytes really end there. If the parse consumed the whole contiguous
        // run and the file continues past a gap, the value may be truncated;
        // ask for the gap instead of trusting it.
        if rest.is_empty() {
            if let Some((begin, end)) = self.source.gap_after(offset) {
                return Err(Error::MissingData { begin, end });
            }
        }

        if num != r.id || gen_found != r.gen {
            return Err(Error::InvalidXref(format!(
                "bad XRef entry for object {}: header says {} {}",
                r, num, gen_found
            )));
        }

        let value = match (&self.encryption, suppress_encryption) {
            (Some(handler), false) => match decrypt_object(value.clone(), handler, r.id, r.gen) {
                Ok(decrypted) => decrypted,
                Err(e) => {
                    // Some producers leave individual objects unencrypted
                    warn!("decryption of {} failed ({}), using raw bytes", r, e);
                    value
                },
            },
            _ => value,
        };

        // Streams stay uncached so their bytes can be re-read cheaply by
        // position; image streams are the exception (fetched repeatedly).
        let cacheable = !matches!(value, Object::Stream { .. }) || value.is_image_stream();
        if cacheable {
            self.cache.borrow_mut().insert(r.id, value.clone());
        }
        Ok(value)
    }

    /// Resolve an object stored inside an object stream.
    ///
    /// The whole container is materialized and every member whose current
    /// index entry still points at this container is cached in one pass.
    /// Members superseded by a newer revision keep their newer entry, so a
    /// stale compressed copy never shadows an updated object.
    fn fetch_compressed(&self, r: ObjectRef, stream_num: u32, index: u32) -> Result<Object> {
        // Containers must be ordinary indirect objects; anything else would
        // allow unbounded container-in-container recursion.
        match self.entries.borrow().get(&stream_num).copied() {
            Some(XRefEntry::Uncompressed { .. }) => {},
            _ => {
                return Err(Error::InvalidXref(format!(
                    "object stream container {} is not an uncompressed object",
                    stream_num
                )));
            },
        }

        let container = self.fetch(ObjectRef::new(stream_num, 0))?;
        let dict = match container.as_stream() {
            Some((dict, _)) => dict,
            None => {
                return Err(Error::InvalidXref(format!(
                    "object stream container {} is not a stream",
                    stream_num
                )));
            },
        };
        if dict.get_raw("Type").and_then(Object::as_name) != Some("ObjStm") {
            return Err(Error::InvalidXref(format!(
                "object {} is not an object stream",
                stream_num
            )));
        }

        let first = dict
            .get_raw("First")
            .and_then(Object::as_integer)
            .ok_or_else(|| Error::InvalidXref("object stream has no First entry".to_string()))?
            as usize;
        let count = dict
            .get_raw("N")
            .and_then(Object::as_integer)
            .ok_or_else(|| Error::InvalidXref("object stream has no N entry".to_string()))?
            as usize;

        let data = container.decode_stream_data()?;
        if first > data.len() {
            return Err(Error::InvalidXref("object stream First exceeds data length".to_string()));
        }

        // Header: N pairs of (object number, offset relative to First)
        let mut header = &data[..first];
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let (rest, num_tok) = token(header)
                .map_err(|_| Error::InvalidXref("truncated object stream header".to_string()))?;
            let (rest, off_tok) = token(rest)
                .map_err(|_| Error::InvalidXref("truncated object stream header".to_string()))?;
            match (num_tok, off_tok) {
                (Token::Integer(n), Token::Integer(o)) if n >= 0 && o >= 0 => {
                    members.push((n as u32, o as usize));
                },
                _ => {
                    return Err(Error::InvalidXref("invalid object stream header pair".to_string()));
                },
            }
            header = rest;
        }

        let mut requested = None;
        for (i, &(num, rel_offset)) in members.iter().enumerate() {
            let start = first + rel_offset;
            if start > data.len() {
                return Err(Error::InvalidXref(format!(
                    "object stream member {} offset out of bounds",
                    num
                )));
            }
            let (_, value) = parse_object(&data[start..]).map_err(|_| {
                Error::InvalidXref(format!(
                    "failed to parse object {} in stream {}",
                    num, stream_num
                ))
            })?;

            // Only cache members the current index still attributes to this
            // container at this position; anything else is a stale entry
            // superseded by a later revision.
            let current = self.entries.borrow().get(&num).copied();
            let fresh = matches!(
                current,
                Some(XRefEntry::InStream { stream_num: s, index: idx })
                    if s == stream_num && idx == i as u32
            );
            if fresh {
                self.cache.borrow_mut().entry(num).or_insert_with(|| value.clone());
            }
            if num == r.id && i as u32 == index {
                requested = Some(value);
            }
        }

        requested.ok_or_else(|| {
            Error::InvalidXref(format!(
                "bad XRef entry: object {} not found in stream {}",
                r, stream_num
            ))
        })
    }

    /// Replace the entry table with a scan-derived one. The trailer from the
    /// original parse is kept; recovery entries use last-wins semantics and
    /// nested cross-reference streams fill remaining gaps.
    fn rebuild_index(&self) -> Result<()> {
        let mut entries = HashMap::new();
        recover_entries(&self.source, &mut entries)?;
        *self.entries.borrow_mut() = entries;
        Ok(())
    }
}

/// Walk the chain of cross-reference sections breadth-first.
///
/// Each section queues its hybrid `XRefStm` offset (processed before the
/// older revision so table entries win and stream entries fill gaps) and
/// then its `Prev` offset. A visited set keeps adversarial `Prev` cycles
/// from looping.
fn read_sections(
    source: &ByteSource,
    start: usize,
    entries: &mut HashMap<u32, XRefEntry>,
    top_trailer: &mut Option<Dict>,
    from_stream: &mut bool,
) -> Result<()> {
    let mut queue = VecDeque::from([start]);
    let mut visited: HashSet<usize> = HashSet::new();

    while let Some(offset) = queue.pop_front() {
        if !visited.insert(offset) {
            warn!("cross-reference section at offset {} already visited, skipping", offset);
            continue;
        }

        let (dict, is_stream) = read_section_at(source, offset, entries)?;
        if top_trailer.is_none() {
            *top_trailer = Some(dict.clone());
            *from_stream = is_stream;
        }

        if let Some(x) = dict.get_raw("XRefStm").and_then(Object::as_integer) {
            queue.push_back(x as usize);
        }
        match dict.get_raw("Prev") {
            None => {},
            Some(Object::Integer(p)) if *p >= 0 => queue.push_back(*p as usize),
            // Non-conformant writers encode Prev as an indirect reference;
            // its object number is the intended byte offset.
            Some(Object::Reference(r)) => {
                warn!("Prev encoded as indirect reference {}, using its object number as offset", r);
                queue.push_back(r.id as usize);
            },
            Some(other) => {
                warn!("ignoring Prev entry of type {}", other.type_name());
            },
        }
    }

    Ok(())
}

/// Parse one cross-reference section, dispatching on its first token: the
/// `xref` keyword introduces a classic table, an integer introduces the
/// `N G obj` header of a cross-reference stream.
fn read_section_at(
    source: &ByteSource,
    offset: usize,
    entries: &mut HashMap<u32, XRefEntry>,
) -> Result<(Dict, bool)> {
    if offset >= source.len() {
        return Err(Error::InvalidXref(format!(
            "cross-reference offset {} is out of bounds",
            offset
        )));
    }
    let data = source.tail_from(offset)?;

    let result = (|| {
        let (rest, first) = token(data).map_err(|_| {
            Error::InvalidXref(format!("no token at cross-reference offset {}", offset))
        })?;
        match first {
            Token::Keyword(b"xref") => read_table(rest, entries).map(|d| (d, false)),
            Token::Integer(_) => {
                let (_, (_, _, obj)) = parse_indirect(data).map_err(|_| {
                    Error::InvalidXref(format!("invalid cross-reference stream at offset {}", offset))
                })?;
                read_stream_section(&obj, entries).map(|d| (d, true))
            },
            _ => Err(Error::InvalidXref(format!(
                "unexpected content at cross-reference offset {}",
                offset
            ))),
        }
    })();

    // On a progressive source a parse failure usually means the contiguous
    // run ended mid-section; report the gap instead of a structural error.
    match result {
        Err(e) if !e.is_missing_data() => Err(missing_or(source, offset, e)),
        other => other,
    }
}

/// Read a classic cross-reference table (after the `xref` keyword) up to and
/// including its trailer dictionary.
///
/// Entries insert first-wins: the caller walks sections newest-first, and a
/// newer definition must never be overridden by an older revision.
fn read_table(input: &[u8], entries: &mut HashMap<u32, XRefEntry>) -> Result<Dict> {
    let mut rest = input;
    let mut first_subsection = true;

    loop {
        let (r, tok) = next_token(rest)?;
        match tok {
            Token::Keyword(b"trailer") => {
                let (_, obj) = parse_object(r)
                    .map_err(|_| Error::InvalidXref("invalid trailer dictionary".to_string()))?;
                return match obj {
                    Object::Dictionary(d) => Ok(d),
                    other => Err(Error::InvalidXref(format!(
                        "trailer is not a dictionary ({})",
                        other.type_name()
                    ))),
                };
            },
            Token::Integer(start) if (0..=u32::MAX as i64).contains(&start) => {
                let (r, count_tok) = next_token(r)?;
                let count = match count_tok {
                    Token::Integer(c) if (0..=u32::MAX as i64).contains(&c) => c as u32,
                    _ => {
                        return Err(Error::InvalidXref(
                            "invalid cross-reference subsection header".to_string(),
                        ));
                    },
                };
                let mut first = start as u32;
                rest = r;

                for i in 0..count {
                    let (r, off_tok) = next_token(rest)?;
                    let (r, gen_tok) = next_token(r)?;
                    let (r, flag_tok) = next_token(r)?;
                    rest = r;

                    let (off, gen) = match (off_tok, gen_tok) {
                        (Token::Integer(o), Token::Integer(g)) if o >= 0 && g >= 0 => {
                            (o as u64, g as u32)
                        },
                        _ => {
                            return Err(Error::InvalidXref(
                                "invalid cross-reference entry fields".to_string(),
                            ));
                        },
                    };
                    let free = match flag_tok {
                        Token::Keyword(b"n") => false,
                        Token::Keyword(b"f") => true,
                        _ => {
                            return Err(Error::InvalidXref(
                                "invalid cross-reference entry flag".to_string(),
                            ));
                        },
                    };

                    // Some writers claim the table starts at object 1 while
                    // its first row is clearly the object 0 sentinel.
                    if first_subsection && i == 0 && first == 1 && free && off == 0 && gen == 65535 {
                        warn!("cross-reference table claims to start at 1 but begins with the object 0 sentinel");
                        first = 0;
                    }

                    let num = first.checked_add(i).ok_or_else(|| {
                        Error::InvalidXref(
                            "cross-reference entry number out of range".to_string(),
                        )
                    })?;
                    if num == 0 && !free {
                        return Err(Error::InvalidXref(
                            "first cross-reference entry must be free".to_string(),
                        ));
                    }

                    let entry = if free {
                        XRefEntry::Free { next_free: off as u32, gen: gen as u16 }
                    } else {
                        XRefEntry::Uncompressed { offset: off as usize, gen: gen as u16 }
                    };
                    entries.entry(num).or_insert(entry);
                }
                first_subsection = false;
            },
            _ => {
                return Err(Error::InvalidXref(
                    "unexpected token in cross-reference table".to_string(),
                ));
            },
        }
    }
}

/// Read a cross-reference stream section, returning its dictionary (which
/// doubles as the trailer).
fn read_stream_section(obj: &Object, entries: &mut HashMap<u32, XRefEntry>) -> Result<Dict> {
    let (dict, _) = obj.as_stream().ok_or_else(|| {
        Error::InvalidXref("cross-reference stream is not a stream object".to_string())
    })?;
    if dict.get_raw("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(Error::InvalidXref(
            "cross-reference stream missing /Type /XRef".to_string(),
        ));
    }

    // XRef streams are never encrypted, so plain filter decoding suffices.
    let data = obj.decode_stream_data()?;
    read_stream_entries(dict, &data, entries)?;
    Ok(dict.clone())
}

/// Decode the fixed-width binary rows of a cross-reference stream.
///
/// `W` gives the byte widths of the type/field2/field3 columns (big-endian);
/// a zero-width type column defaults every row to type 1. `Index` lists the
/// `(first, count)` ranges covered, defaulting to `[0, Size]`.
pub(crate) fn read_stream_entries(
    dict: &Dict,
    data: &[u8],
    entries: &mut HashMap<u32, XRefEntry>,
) -> Result<()> {
    let w: Vec<usize> = dict
        .get_raw("W")
        .and_then(Object::as_array)
        .map(|arr| {
            arr.iter()
                .map(|o| o.as_integer().unwrap_or(0).max(0) as usize)
                .collect()
        })
        .ok_or_else(|| Error::InvalidXref("cross-reference stream has no W array".to_string()))?;
    if w.len() < 3 {
        return Err(Error::InvalidXref("cross-reference stream W array too short".to_string()));
    }
    let entry_width = w[0] + w[1] + w[2];
    if entry_width == 0 {
        return Err(Error::InvalidXref("cross-reference stream has zero-width entries".to_string()));
    }

    let size = dict
        .get_raw("Size")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidXref("cross-reference stream has no Size".to_string()))?;

    let ranges: Vec<(u32, u32)> = match dict.get_raw("Index").and_then(Object::as_array) {
        Some(arr) => {
            if arr.len() % 2 != 0 {
                return Err(Error::InvalidXref(
                    "cross-reference stream Index has odd length".to_string(),
                ));
            }
            arr.chunks(2)
                .map(|pair| match (pair[0].as_integer(), pair[1].as_integer()) {
                    (Some(f), Some(c)) if f >= 0 && c >= 0 => Ok((f as u32, c as u32)),
                    _ => Err(Error::InvalidXref(
                        "invalid cross-reference stream Index pair".to_string(),
                    )),
                })
                .collect::<Result<_>>()?
        },
        None => vec![(0, size.max(0) as u32)],
    };

    let read_be = |bytes: &[u8]| -> u64 { bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64) };

    let mut pos = 0;
    for (first, count) in ranges {
        for i in 0..count {
            if pos + entry_width > data.len() {
                return Err(Error::InvalidXref(
                    "cross-reference stream data is too short for its Index".to_string(),
                ));
            }
            // Width 0 for the type column means "assume type 1"
            let typ = if w[0] == 0 { 1 } else { read_be(&data[pos..pos + w[0]]) };
            let f2 = read_be(&data[pos + w[0]..pos + w[0] + w[1]]);
            let f3 = read_be(&data[pos + w[0] + w[1]..pos + entry_width]);
            pos += entry_width;

            let num = first + i;
            let entry = match typ {
                0 => XRefEntry::Free { next_free: f2 as u32, gen: f3 as u16 },
                1 => XRefEntry::Uncompressed { offset: f2 as usize, gen: f3 as u16 },
                2 => XRefEntry::InStream { stream_num: f2 as u32, index: f3 as u32 },
                t => {
                    return Err(Error::InvalidXref(format!(
                        "unknown cross-reference entry type {}",
                        t
                    )));
                },
            };
            entries.entry(num).or_insert(entry);
        }
    }

    Ok(())
}

/// Rebuild the entry table by scanning the file, returning the best trailer
/// candidate found (trailer-with-ID preferred, then the last trailer, then
/// the dictionary of a scanned cross-reference stream carrying Root).
fn recover_entries(
    source: &ByteSource,
    entries: &mut HashMap<u32, XRefEntry>,
) -> Result<Option<Dict>> {
    // Scanning needs the whole file; over a progressive source this
    // surfaces the remaining gap rather than guessing.
    let data = source.full()?;
    let scan = recovery::scan_document(data);
    *entries = scan.entries;

    let mut visited: HashSet<usize> = HashSet::new();
    let mut stream_trailer: Option<Dict> = None;
    for off in scan.stream_offsets {
        if !visited.insert(off) {
            continue;
        }
        match parse_indirect(&data[off..]) {
            Ok((_, (_, _, obj))) => match read_stream_section(&obj, entries) {
                Ok(dict) => {
                    if stream_trailer.is_none() && dict.contains_key("Root") {
                        stream_trailer = Some(dict);
                    }
                },
                Err(e) => warn!("skipping cross-reference stream at offset {}: {}", off, e),
            },
            Err(_) => warn!("skipping unparsable cross-reference stream at offset {}", off),
        }
    }

    // Prefer a trailer that can actually open the document.
    let trailer = [scan.trailer, stream_trailer]
        .into_iter()
        .flatten()
        .reduce(|best, candidate| if best.contains_key("Root") { best } else { candidate });
    Ok(trailer)
}

fn next_token(input: &[u8]) -> Result<(&[u8], Token<'_>)> {
    token(input)
        .map_err(|_| Error::InvalidXref("unexpected end of cross-reference data".to_string()))
}

/// On a progressive source, prefer reporting the gap after `offset`'s
/// contiguous run over a structural error; the structural error stands once
/// the file is complete.
fn missing_or(source: &ByteSource, offset: usize, err: Error) -> Error {
    match source.gap_after(offset) {
        Some((begin, end)) => Error::MissingData { begin, end },
        None => err,
    }
}

/// Decrypt every string and stream payload inside `obj` with the per-object
/// key for `(num, gen)`.
fn decrypt_object(obj: Object, handler: &EncryptionHandler, num: u32, gen: u16) -> Result<Object> {
    Ok(match obj {
        Object::String(s) => Object::String(handler.decrypt(&s, num, gen)?),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|o| decrypt_object(o, handler, num, gen))
                .collect::<Result<_>>()?,
        ),
        Object::Dictionary(d) => Object::Dictionary(decrypt_dict(d, handler, num, gen)?),
        Object::Stream { dict, data } => Object::Stream {
            dict: decrypt_dict(dict, handler, num, gen)?,
            data: bytes::Bytes::from(handler.decrypt(&data, num, gen)?),
        },
        other => other,
    })
}

fn decrypt_dict(dict: Dict, handler: &EncryptionHandler, num: u32, gen: u16) -> Result<Dict> {
    dict.iter()
        .map(|(k, v)| decrypt_object(v.clone(), handler, num, gen).map(|nv| (k.clone(), nv)))
        .collect()
}
