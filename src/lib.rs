// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]

//! # PDF Forge
//!
//! PDF object model with a single-pass writer and a cross-reference aware
//! reader, for generating documents and layering new content onto existing
//! ones.
//!
//! ## Writing
//! - **Single forward pass**: object numbers are planned up front, so forward
//!   references never require patching already-written bytes
//! - **Bookmarks**: breadth-first numbered outline with open/closed counts
//! - **Tagged output**: structure tree, XMP metadata and output intent for
//!   PDF/A-2a and PDF/UA-1
//! - **Links and destinations**: named destinations resolved at write time
//!
//! ## Reading
//! - **Both cross-reference encodings**: classic tables and xref streams
//!   (with PNG/TIFF predictors), including `/Prev` incremental-update chains
//!   and hybrid files
//! - **Object streams**: packed objects materialized as ordinary records
//! - **Page accessors**: page tree flattening, content extraction, resource
//!   closure for selective re-embedding
//!
//! ## Merging
//!
//! ```ignore
//! use pdf_forge::document::PdfReader;
//! use pdf_forge::writer::RelocationWriter;
//!
//! # fn main() -> pdf_forge::Result<()> {
//! let mut registry = PdfReader::open("input.pdf")?;
//! let first = registry.pages()[0];
//! registry.append_page_content(first, b"q 1 0 0 RG 72 72 100 100 re S Q", true)?;
//! RelocationWriter::default().save(&registry, "output.pdf")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Object model
pub mod object;
pub mod registry;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod objstm;
/// Reader configuration options
pub mod parser_config;
pub mod xref;

// Stream codec
pub mod decoders;

// PDF writing
pub mod writer;

pub use document::PdfReader;
pub use error::{Error, Result};
pub use object::{Dict, ObjectRef, Token};
pub use parser_config::ReaderOptions;
pub use registry::{Record, Registry};
pub use writer::{Page, PdfWriter, RelocationWriter, WriterConfig};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
