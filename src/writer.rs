//! Incremental append-only writer.
//!
//! A [`DataWriter`] extends an existing file (or starts a fresh one) by
//! appending serialized objects followed by a cross-reference section and
//! trailer describing them. The original bytes are never touched, so each
//! save session produces a valid incremental update.
//!
//! Serialization is byte-exact by design: conforming readers are permitted
//! to be byte-literal about the fixed-width table entries and the trailer
//! tail, so the output format is a compatibility surface, not a style
//! choice.
//!
//! Misusing the session (nesting `start_obj`, closing an unopened stream,
//! appending a trailer before `set_trailer`) panics; these are programmer
//! errors a correct caller never hits.

use std::collections::BTreeMap;

use crate::object::{Dict, Object, ObjectRef};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// One pending cross-reference record for the session.
#[derive(Debug, Clone, Copy)]
struct NewEntry {
    offset: usize,
    gen: u16,
    free: bool,
}

/// Append-only serializer for one save session.
#[derive(Debug)]
pub struct DataWriter {
    buf: Vec<u8>,
    /// Bytes that precede `buf` in the final file but are not held here.
    base_offset: usize,
    in_obj: bool,
    in_stream: bool,
    /// Session entries, keyed by object number. Always contains the object 0
    /// sentinel so a written table satisfies the entry-0-free invariant.
    entries: BTreeMap<u32, NewEntry>,
    /// Offset of the newest cross-reference section already in the file;
    /// becomes the trailer's Prev and is replaced by this session's own.
    start_xref: usize,
    trailer: Option<Dict>,
    /// Mirror the original file's index encoding when extending it.
    write_stream_form: bool,
}

impl DataWriter {
    /// Start a session appending to `base` (the complete existing file, or
    /// empty for a fresh one).
    pub fn new(base: Vec<u8>) -> Self {
        Self::build(base, 0)
    }

    /// Start a session for a file whose first `base_len` bytes exist
    /// elsewhere; only the appended suffix is held by the writer.
    pub fn from_offset(base_len: usize) -> Self {
        Self::build(Vec::new(), base_len)
    }

    fn build(buf: Vec<u8>, base_offset: usize) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(0, NewEntry { offset: 0, gen: 65535, free: true });
        Self {
            buf,
            base_offset,
            in_obj: false,
            in_stream: false,
            entries,
            start_xref: 0,
            trailer: None,
            write_stream_form: false,
        }
    }

    /// Total byte length of the file represented by this session.
    pub fn len(&self) -> usize {
        self.base_offset + self.buf.len()
    }

    /// Whether nothing has been written and no base exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the offset of the file's current newest cross-reference
    /// section. It becomes the `Prev` link of the section this session
    /// writes; without it, readers only see this session's objects.
    pub fn set_previous_start_xref(&mut self, offset: usize) -> &mut Self {
        self.start_xref = offset;
        self
    }

    /// Copy the relevant keys of the document's trailer for the session.
    ///
    /// Only Size, Root, Encrypt, Info, ID (and XRefStm for table-form
    /// output) carry over. The index encoding is chosen here: a trailer
    /// whose dictionary is typed `XRef` came from a cross-reference stream,
    /// so the update is written in stream form too.
    ///
    /// Panics when Size or Root is missing.
    pub fn set_trailer(&mut self, trailer: &Dict) -> &mut Self {
        assert!(
            trailer.contains_key("Size") && trailer.contains_key("Root"),
            "trailer must contain Size and Root"
        );
        self.write_stream_form = trailer.get_raw("Type").and_then(Object::as_name) == Some("XRef");

        let mut copied = Dict::new();
        let mut keys = vec!["Size", "Root", "Encrypt", "Info", "ID"];
        if !self.write_stream_form {
            keys.push("XRefStm");
        }
        for key in keys {
            if let Some(value) = trailer.get_raw(key) {
                copied.insert(key, value.clone());
            }
        }
        self.trailer = Some(copied);
        self
    }

    /// Open the indirect object `r`, writing `\nN G obj\n` and recording its
    /// offset for the session's cross-reference section.
    ///
    /// Panics if an object is already open.
    pub fn start_obj(&mut self, r: ObjectRef) -> &mut Self {
        assert!(!self.in_obj, "cannot start an indirect object while the previous one is open");
        self.in_obj = true;
        // +1 for the line feed written before the header
        self.entries
            .insert(r.id, NewEntry { offset: self.len() + 1, gen: r.gen, free: false });
        self.push_str(&format!("\n{} {} obj\n", r.id, r.gen));
        self
    }

    /// Close the object opened by [`DataWriter::start_obj`].
    pub fn end_obj(&mut self) -> &mut Self {
        assert!(self.in_obj, "cannot close an indirect object that was never opened");
        self.in_obj = false;
        self.push_str("\nendobj\n");
        self
    }

    /// Write `dict` followed by the `stream` keyword. The dictionary must
    /// carry a Length covering the payload plus the single line feed
    /// [`DataWriter::end_stream`] writes before `endstream`.
    pub fn start_stream(&mut self, dict: &Dict) -> &mut Self {
        assert!(dict.contains_key("Length"), "stream dictionary must contain Length");
        assert!(!self.in_stream, "cannot start a stream while the previous one is open");
        self.in_stream = true;
        self.append_dict(dict);
        self.push_str("\nstream\n");
        self
    }

    /// Close the stream opened by [`DataWriter::start_stream`].
    pub fn end_stream(&mut self) -> &mut Self {
        assert!(self.in_stream, "cannot close a stream that was never opened");
        self.in_stream = false;
        self.push_str("\nendstream\n");
        self
    }

    /// Append raw bytes verbatim (stream payloads).
    pub fn append_raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn append_bool(&mut self, v: bool) -> &mut Self {
        self.push_str(if v { "true" } else { "false" });
        self
    }

    pub fn append_int(&mut self, v: i64) -> &mut Self {
        self.push_str(&v.to_string());
        self
    }

    pub fn append_real(&mut self, v: f64) -> &mut Self {
        self.push_str(&v.to_string());
        self
    }

    /// Append a string in hex form (`<...>`), sidestepping literal-string
    /// escaping entirely.
    pub fn append_string(&mut self, v: &[u8]) -> &mut Self {
        self.buf.reserve(v.len() * 2 + 2);
        self.buf.push(b'<');
        for &byte in v {
            self.push_hex_byte(byte);
        }
        self.buf.push(b'>');
        self
    }

    /// Append a name, `#XX`-escaping whitespace, delimiters, and bytes
    /// outside the printable range.
    pub fn append_name(&mut self, v: &str) -> &mut Self {
        self.buf.push(b'/');
        for byte in v.bytes() {
            let plain = (33..=126).contains(&byte)
                && !matches!(
                    byte,
                    b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
                );
            if plain {
                self.buf.push(byte);
            } else {
                self.buf.push(b'#');
                self.push_hex_byte(byte);
            }
        }
        self
    }

    pub fn append_null(&mut self) -> &mut Self {
        self.push_str("null");
        self
    }

    pub fn append_ref(&mut self, r: ObjectRef) -> &mut Self {
        self.push_str(&format!("{} {} R", r.id, r.gen));
        self
    }

    pub fn append_array(&mut self, items: &[Object]) -> &mut Self {
        self.buf.push(b'[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.buf.push(b' ');
            }
            self.append_object(item);
        }
        self.buf.push(b']');
        self
    }

    /// Append a dictionary, keys in insertion order, one space between each
    /// key and its value and no separator between pairs.
    pub fn append_dict(&mut self, dict: &Dict) -> &mut Self {
        self.push_str("<<");
        for (key, value) in dict.iter() {
            self.append_name(key);
            self.buf.push(b' ');
            self.append_object(value);
        }
        self.push_str(">>");
        self
    }

    /// Append any object value by dispatching on its type. Streams are the
    /// exception; they go through [`DataWriter::start_stream`].
    pub fn append_object(&mut self, obj: &Object) -> &mut Self {
        match obj {
            Object::Null => self.append_null(),
            Object::Boolean(b) => self.append_bool(*b),
            Object::Integer(i) => self.append_int(*i),
            Object::Real(r) => self.append_real(*r),
            Object::String(s) => self.append_string(s),
            Object::Name(n) => self.append_name(n),
            Object::Array(items) => self.append_array(items),
            Object::Dictionary(d) => self.append_dict(d),
            Object::Reference(r) => self.append_ref(*r),
            Object::Stream { .. } => panic!("streams are written via start_stream/end_stream"),
        }
    }

    /// Terminal operation of the session: write the cross-reference section
    /// (table or stream form, mirroring the original file) and the trailer
    /// tail `\nstartxref\n<offset>\n%%EOF\n`.
    ///
    /// Afterwards the session's entry map is pruned back to the object 0
    /// sentinel; a further save on the same writer starts a fresh revision
    /// whose Prev points at the section written here.
    ///
    /// Panics unless [`DataWriter::set_trailer`] was called.
    pub fn append_trailer(&mut self) -> &mut Self {
        assert!(self.trailer.is_some(), "set_trailer must be called first");

        if self.write_stream_form {
            self.append_xref_stream();
        } else {
            self.append_xref_table();
            let trailer = self.trailer.clone().expect("checked above");
            self.push_str("\ntrailer\n");
            self.append_dict(&trailer);
        }

        self.push_str(&format!("\nstartxref\n{}\n%%EOF\n", self.start_xref));

        self.entries.retain(|&num, _| num == 0);
        self
    }

    /// The session's bytes so far (excluding any `from_offset` prefix).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn append_xref_table(&mut self) {
        if self.start_xref != 0 {
            let prev = self.start_xref as i64;
            if let Some(trailer) = self.trailer.as_mut() {
                trailer.insert("Prev", Object::Integer(prev));
            }
        }
        // +1 for the line feed before the xref keyword
        self.start_xref = self.len() + 1;
        self.push_str("\nxref\n");

        for (start, entries) in self.subsections() {
            self.push_str(&format!("{} {}\n", start, entries.len()));
            for entry in entries {
                let flag = if entry.free { 'f' } else { 'n' };
                // Fixed 20-byte row
                self.push_str(&format!("{:010} {:05} {} \n", entry.offset, entry.gen, flag));
            }
        }
    }

    fn append_xref_stream(&mut self) {
        if self.start_xref != 0 {
            let prev = self.start_xref as i64;
            if let Some(trailer) = self.trailer.as_mut() {
                trailer.insert("Prev", Object::Integer(prev));
            }
        }
        let stream_num = self
            .trailer
            .as_ref()
            .and_then(|t| t.get_raw("Size"))
            .and_then(Object::as_integer)
            .expect("trailer Size must be an integer") as u32;
        if let Some(trailer) = self.trailer.as_mut() {
            trailer.insert("Size", Object::Integer(stream_num as i64 + 1));
        }

        // +1 for the line feed start_obj writes before the header
        self.start_xref = self.len() + 1;
        self.start_obj(ObjectRef::new(stream_num, 0));

        let sections = self.subsections();
        let mut index = Vec::new();
        let mut max_offset = 0usize;
        let mut max_gen = 0u16;
        let mut all_used = true;
        let mut total = 0usize;
        for (start, entries) in &sections {
            index.push(Object::Integer(*start as i64));
            index.push(Object::Integer(entries.len() as i64));
            total += entries.len();
            for entry in entries {
                max_offset = max_offset.max(entry.offset);
                max_gen = max_gen.max(entry.gen);
                all_used = all_used && !entry.free;
            }
        }

        // Minimal field widths in bytes; a width-0 type column tells readers
        // every entry is type 1.
        let typ_width = if all_used { 0 } else { 1 };
        let off_width = byte_width(max_offset as u64);
        let gen_width = byte_width(max_gen as u64);
        let row_width = typ_width + off_width + gen_width;

        let mut rows = Vec::with_capacity(total * row_width * 2 + 1);
        for (_, entries) in &sections {
            for entry in entries {
                if typ_width > 0 {
                    push_hex_field(&mut rows, if entry.free { 0 } else { 1 }, typ_width);
                }
                push_hex_field(&mut rows, entry.offset as u64, off_width);
                push_hex_field(&mut rows, entry.gen as u64, gen_width);
            }
        }
        rows.push(b'>');

        let mut dict = self.trailer.clone().expect("checked by append_trailer");
        dict.insert("Filter", Object::Name("ASCIIHexDecode".to_string()));
        // +1 for the line feed end_stream writes before endstream
        dict.insert("Length", Object::Integer(rows.len() as i64 + 1));
        dict.insert("Type", Object::Name("XRef".to_string()));
        dict.insert("Index", Object::Array(index));
        dict.insert(
            "W",
            Object::Array(vec![
                Object::Integer(typ_width as i64),
                Object::Integer(off_width as i64),
                Object::Integer(gen_width as i64),
            ]),
        );

        self.start_stream(&dict);
        self.append_raw(&rows);
        self.end_stream();
        self.end_obj();
    }

    /// Session entries grouped into maximal runs of consecutive object
    /// numbers, ascending. Each run becomes one subsection.
    fn subsections(&self) -> Vec<(u32, Vec<NewEntry>)> {
        let mut sections: Vec<(u32, Vec<NewEntry>)> = Vec::new();
        let mut prev: Option<u32> = None;
        for (&num, &entry) in &self.entries {
            match (prev, sections.last_mut()) {
                (Some(p), Some(last)) if p + 1 == num => last.1.push(entry),
                _ => sections.push((num, vec![entry])),
            }
            prev = Some(num);
        }
        sections
    }

    fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn push_hex_byte(&mut self, byte: u8) {
        self.buf.push(HEX_DIGITS[(byte >> 4) as usize]);
        self.buf.push(HEX_DIGITS[(byte & 0xF) as usize]);
    }
}

/// Bytes needed to hold `n` big-endian, minimum 1.
fn byte_width(n: u64) -> usize {
    let mut width = 1;
    while width < 8 && n >> (8 * width) != 0 {
        width += 1;
    }
    width
}

/// Append `width` bytes of `n` as uppercase hex, big-endian, zero-padded.
fn push_hex_field(out: &mut Vec<u8>, n: u64, width: usize) {
    for i in (0..width).rev() {
        let byte = ((n >> (8 * i)) & 0xFF) as u8;
        out.push(HEX_DIGITS[(byte >> 4) as usize]);
        out.push(HEX_DIGITS[(byte & 0xF) as usize]);
    }
}
