#![allow(clippy::match_like_matches_macro)]
#![warn(missing_docs)]

//! # PDF Strata
//!
//! Cross-reference and object-storage engine for PDF files: the layer that
//! turns a byte buffer into resolvable objects and back.
//!
//! ## What it does
//!
//! - **Index parsing**: classic `xref` tables, cross-reference streams,
//!   hybrid files, and `Prev` chains across incremental revisions.
//! - **Recovery**: when the stored index is missing or lies, the file is
//!   scanned for object headers and the index rebuilt, so damaged files
//!   still open.
//! - **Lazy resolution**: [`XRef::fetch`] resolves indirect references on
//!   demand with caching, object-stream unpacking, and RC4 decryption.
//! - **Progressive loading**: every read either completes or reports the
//!   exact missing byte range ([`Error::MissingData`]), so documents can be
//!   opened while still downloading.
//! - **Incremental saves**: [`DataWriter`] appends objects plus a new index
//!   section (table or stream form) without touching existing bytes.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_strata::{Document, ObjectRef};
//!
//! # fn main() -> Result<(), pdf_strata::Error> {
//! let doc = Document::open("sample.pdf")?;
//! let catalog = doc.catalog()?;
//! let root = doc.get_object(ObjectRef::new(1, 0))?;
//! println!("{:?} {:?}", catalog, root);
//! # Ok(())
//! # }
//! ```

pub mod error;

pub mod lexer;
pub mod object;
pub mod parser;
pub mod source;

pub mod recovery;
pub mod xref;

pub mod decoders;
pub mod encryption;

pub mod document;
pub mod writer;

pub use document::Document;
pub use error::{Error, Result};
pub use object::{Dict, Object, ObjectRef, RefSet};
pub use source::ByteSource;
pub use writer::DataWriter;
pub use xref::{XRef, XRefEntry};
