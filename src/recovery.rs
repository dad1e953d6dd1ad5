//! Brute-force index recovery for damaged files.
//!
//! When the stored cross-reference sections are missing, unreachable, or
//! inconsistent, the document index is rebuilt by scanning the whole file
//! for `N G obj` headers. Later definitions of the same object number win,
//! matching the physical layout of incrementally updated files where newer
//! revisions are appended at the end.
//!
//! The scan also notes which discovered objects look like cross-reference
//! streams; the caller parses those separately to pick up compressed-object
//! entries a plain header scan cannot see.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::bytes::Regex;

use crate::object::{Dict, Object};
use crate::parser::parse_object;
use crate::xref::XRefEntry;

lazy_static! {
    /// `N G obj` headers. The leading non-digit guard keeps "12 0 obj" from
    /// also matching as "2 0 obj" one byte in.
    static ref OBJ_RE: Regex =
        Regex::new(r"(?:^|[^0-9])(\d+)\s+(\d+)\s+obj\b").unwrap();

    /// Classic table sections and their trailers.
    static ref XREF_RE: Regex = Regex::new(r"\bxref\b").unwrap();
    static ref TRAILER_RE: Regex = Regex::new(r"\btrailer\b").unwrap();

    /// /XRef type name inside a dictionary, used to sniff cross-reference
    /// streams among the scanned objects.
    static ref XREF_TYPE_RE: Regex = Regex::new(r"/Type\s*/XRef\b").unwrap();
}

/// How far past an object header to look for the /Type /XRef marker.
const SNIFF_WINDOW: usize = 256;

/// Result of scanning a complete file.
#[derive(Debug, Default)]
pub struct RecoveredIndex {
    /// Object number to location, last definition winning.
    pub entries: HashMap<u32, XRefEntry>,
    /// Best trailer dictionary found among classic table sections.
    pub trailer: Option<Dict>,
    /// Offsets of scanned objects that look like cross-reference streams.
    pub stream_offsets: Vec<usize>,
}

/// Scan `data` (the complete file) for object headers and trailers.
pub fn scan_document(data: &[u8]) -> RecoveredIndex {
    let mut index = RecoveredIndex::default();

    for caps in OBJ_RE.captures_iter(data) {
        let num_match = caps.get(1).unwrap();
        let gen_match = caps.get(2).unwrap();

        let num: u32 = match parse_ascii_u64(num_match.as_bytes()) {
            Some(n) if n <= u32::MAX as u64 => n as u32,
            _ => {
                warn!("skipping object header with oversized number at offset {}", num_match.start());
                continue;
            },
        };
        let gen: u16 = match parse_ascii_u64(gen_match.as_bytes()) {
            Some(g) if g <= u16::MAX as u64 => g as u16,
            _ => {
                warn!("skipping object header with oversized generation at offset {}", num_match.start());
                continue;
            },
        };

        // The header starts at the number, not at the guard byte.
        let offset = num_match.start();
        index.entries.insert(num, XRefEntry::Uncompressed { offset, gen });

        if sniff_xref_stream(data, caps.get(0).unwrap().end()) {
            index.stream_offsets.push(offset);
        }
    }

    debug!(
        "recovery scan found {} objects, {} cross-reference stream candidates",
        index.entries.len(),
        index.stream_offsets.len()
    );

    index.trailer = scan_trailers(data);
    index
}

/// Whether the dictionary following an object header carries /Type /XRef.
///
/// The window stops at the object's stream payload (or its `endobj`) so
/// binary data and the next object's dictionary never feed the regex.
fn sniff_xref_stream(data: &[u8], header_end: usize) -> bool {
    let window_end = (header_end + SNIFF_WINDOW).min(data.len());
    let mut window = &data[header_end..window_end];
    for stop in [b"stream".as_slice(), b"endobj".as_slice()] {
        if let Some(pos) = find_subslice(window, stop) {
            window = &window[..pos];
        }
    }
    XREF_TYPE_RE.is_match(window)
}

/// Collect trailer dictionaries from classic table sections.
///
/// Preference order: the first trailer carrying an /ID (the one the file was
/// originally finalized with, before incremental updates without IDs), then
/// the last trailer seen, since the newest revision is appended last.
fn scan_trailers(data: &[u8]) -> Option<Dict> {
    let mut first_with_id: Option<Dict> = None;
    let mut last: Option<Dict> = None;

    for xref_match in XREF_RE.find_iter(data) {
        let after = &data[xref_match.end()..];
        let trailer_match = match TRAILER_RE.find(after) {
            Some(m) => m,
            None => continue,
        };
        let dict = match parse_object(&after[trailer_match.end()..]) {
            Ok((_, Object::Dictionary(d))) => d,
            _ => {
                warn!(
                    "unparsable trailer after cross-reference section at offset {}",
                    xref_match.start()
                );
                continue;
            },
        };

        if first_with_id.is_none() && dict.contains_key("ID") {
            first_with_id = Some(dict.clone());
        }
        last = Some(dict);
    }

    first_with_id.or(last)
}

fn parse_ascii_u64(digits: &[u8]) -> Option<u64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
