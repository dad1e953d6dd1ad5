//! Document-level open path.
//!
//! A [`Document`] wraps one [`XRef`] index plus the header/startxref
//! bookkeeping needed to build it: validate the `%PDF-` header (tolerating
//! leading junk), find the `startxref` pointer near the end of the file,
//! and hand both to [`XRef::parse`]. When the pointer is missing or
//! garbage, opening still succeeds through the index's scan-based recovery
//! as long as the file contains usable object headers and a trailer.

use std::path::Path;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::source::ByteSource;
use crate::xref::XRef;

/// How far into the file the `%PDF-` header may be preceded by junk.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// How far before the end of the file the `startxref` keyword is sought.
const START_XREF_SEARCH_WINDOW: usize = 1024;

/// An open document.
#[derive(Debug)]
pub struct Document {
    version: (u8, u8),
    xref: XRef,
}

impl Document {
    /// Open a document from a file path, trying the blank password if it is
    /// encrypted.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Open a document from a file path with a user password.
    pub fn open_with_password(path: impl AsRef<Path>, password: &[u8]) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_source(ByteSource::complete(data), Some(password))
    }

    /// Open a document from an in-memory buffer.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_source(ByteSource::complete(data), None)
    }

    /// Open a document from an in-memory buffer with a user password.
    pub fn from_bytes_with_password(data: Vec<u8>, password: &[u8]) -> Result<Self> {
        Self::from_source(ByteSource::complete(data), Some(password))
    }

    /// Open a document over an arbitrary source (possibly still loading).
    ///
    /// Over a progressive source this can fail with [`Error::MissingData`];
    /// supply the reported range to the source and call again.
    pub fn from_source(source: ByteSource, password: Option<&[u8]>) -> Result<Self> {
        let version = parse_header(&source)?;

        let start_xref = match find_start_xref(&source) {
            Some(offset) => Some(offset),
            None => {
                warn!("no startxref found, opening via index recovery");
                None
            },
        };

        let xref = XRef::parse(source, start_xref, password)?;
        info!(
            "opened document: version {}.{}, {} objects{}",
            version.0,
            version.1,
            xref.size(),
            if xref.is_encrypted() { ", encrypted" } else { "" }
        );
        Ok(Self { version, xref })
    }

    /// The version from the file header, as (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The document catalog.
    pub fn catalog(&self) -> Result<Dict> {
        self.xref.catalog()
    }

    /// The trailer dictionary of the newest revision.
    pub fn trailer(&self) -> &Dict {
        self.xref.trailer()
    }

    /// Resolve an indirect reference. See [`XRef::fetch`].
    pub fn get_object(&self, r: ObjectRef) -> Result<Object> {
        self.xref.fetch(r)
    }

    /// Resolve `obj` if it is a reference; clone it otherwise.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        self.xref.fetch_if_ref(obj)
    }

    /// The underlying cross-reference index.
    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    /// Whether the document is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.xref.is_encrypted()
    }

    /// Feed more file bytes after a [`Error::MissingData`] failure, then
    /// retry the operation that reported it.
    pub fn supply(&mut self, offset: usize, chunk: &[u8]) {
        self.xref.supply(offset, chunk);
    }
}

/// Validate the `%PDF-M.m` header and extract the version.
///
/// Some files carry junk bytes before the header; anything within the first
/// kilobyte is tolerated. An unparsable version defaults to 1.4 with a
/// warning rather than failing the open.
fn parse_header(source: &ByteSource) -> Result<(u8, u8)> {
    let end = HEADER_SEARCH_WINDOW.min(source.len());
    let head = source.slice(0, end)?;

    let pos = find_subslice(head, b"%PDF-").ok_or_else(|| {
        Error::InvalidHeader(String::from_utf8_lossy(&head[..head.len().min(8)]).into_owned())
    })?;
    if pos != 0 {
        warn!("{} junk bytes before the file header", pos);
    }

    let rest = &head[pos + 5..];
    let version = rest
        .split(|&b| !b.is_ascii_digit() && b != b'.')
        .next()
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|v| {
            let (major, minor) = v.split_once('.')?;
            Some((major.parse().ok()?, minor.parse().ok()?))
        });
    Ok(version.unwrap_or_else(|| {
        warn!("unparsable version in file header, assuming 1.4");
        (1, 4)
    }))
}

/// Find the offset stored after the last `startxref` keyword near the end
/// of the file. `None` when absent or unparsable; the caller falls back to
/// recovery.
fn find_start_xref(source: &ByteSource) -> Option<usize> {
    let len = source.len();
    let begin = len.saturating_sub(START_XREF_SEARCH_WINDOW);
    let tail = source.slice(begin, len).ok()?;

    let pos = rfind_subslice(tail, b"startxref")?;
    let after = &tail[pos + b"startxref".len()..];
    let digits: Vec<u8> = after
        .iter()
        .copied()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .collect();
    std::str::from_utf8(&digits).ok()?.parse().ok()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
