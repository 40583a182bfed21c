//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! Page[] + Resources + BookmarkTree + StructElement[]
//!     ↓
//! [PdfWriter] (object plan, fixed emission order)
//!     ↓
//! [ObjectSerializer] (tokens → PDF syntax)
//!     ↓
//! [ByteSink] (offset tracking)
//!     ↓
//! PDF bytes
//! ```
//!
//! Merge mode goes through [`RelocationWriter`] instead, which re-emits a
//! [`Registry`](crate::registry::Registry) read from an existing file.
//!
//! ```ignore
//! use pdf_forge::writer::{Page, PdfWriter, WriterConfig};
//!
//! let mut writer = PdfWriter::new(WriterConfig::default().with_title("Hello"));
//! let font = writer.add_font("Helvetica")?;
//! let content = format!("BT /{} 12 Tf 72 720 Td (Hello, World!) Tj ET", font);
//! writer.add_page(Page::letter().with_content(content))?;
//! let bytes = writer.finish(Vec::new())?;
//! ```

mod object_serializer;
mod outline_builder;
mod page;
mod pdf_writer;
mod relocation;
mod resources;
mod sink;
mod structure;
mod xmp_metadata;

pub use object_serializer::ObjectSerializer;
pub use outline_builder::{BookmarkId, BookmarkNode, BookmarkTarget, BookmarkTree, OutlineStyle};
pub use page::{Annotation, AnnotationKind, Destination, LinkAction, Page, PageBoxes, Rect};
pub use pdf_writer::{ComplianceMode, ImageEncoding, PdfWriter, WriterConfig, WriterState};
pub use relocation::{RelocationOptions, RelocationWriter};
pub use resources::{PoolObject, ResourcePool, Resources};
pub use sink::{format_real, ByteSink};
pub use structure::{StructContent, StructElement};
pub use xmp_metadata::XmpWriter;
