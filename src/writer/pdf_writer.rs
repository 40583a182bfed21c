//! PDF document writer.
//!
//! Assembles a complete document in one forward pass: header, indirect
//! objects in a fixed order, cross-reference table and trailer. Object
//! numbers are computed up front by [`ObjectPlan`], so an object may refer
//! to one that has not been written yet (a page to its parent, an
//! annotation to its page) without going back to patch earlier bytes.
//!
//! Emission order:
//!
//! 1. XMP metadata and ICC profile (compliance modes only)
//! 2. one content stream per page
//! 3. resource pool objects, then the shared resources dictionary
//! 4. annotations, page by page
//! 5. pages, then the page tree root
//! 6. structure elements, structure tree root, parent tree and the
//!    document node (compliance modes only)
//! 7. outline dictionary and items (when bookmarks exist)
//! 8. document information, then the catalog

use super::object_serializer::ObjectSerializer;
use super::outline_builder::BookmarkTree;
use super::page::Page;
use super::resources::{ResourcePool, Resources};
use super::sink::ByteSink;
use super::structure::{StructElement, StructureTree};
use super::xmp_metadata::XmpWriter;
use crate::decoders::deflate;
use crate::error::{Error, Result};
use crate::object::{array, Dict, Token};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siphasher::sip128::{Hasher128, SipHasher13};
use std::collections::HashMap;
use std::hash::Hasher;
use std::io::Write;
use std::path::Path;

/// File header: version line plus a comment of high-bit bytes so transfer
/// tools treat the file as binary.
const HEADER: &[u8] = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\xC9\n";

/// Accessibility / archival conformance target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceMode {
    /// Plain PDF
    #[default]
    None,
    /// PDF/A-2a (archival, tagged)
    PdfA2a,
    /// PDF/UA-1 (universal accessibility)
    PdfUa1,
}

impl ComplianceMode {
    /// Whether the mode requires tagged output.
    pub fn is_tagged(&self) -> bool {
        !matches!(self, ComplianceMode::None)
    }
}

/// Configuration for PDF generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Document title
    pub title: Option<String>,
    /// Document author
    pub author: Option<String>,
    /// Document subject
    pub subject: Option<String>,
    /// Document keywords
    pub keywords: Option<String>,
    /// Creator application
    pub creator: Option<String>,
    /// Producing library
    pub producer: Option<String>,
    /// Deflate content and resource streams
    pub compress: bool,
    /// Conformance target
    pub compliance: ComplianceMode,
    /// Natural language of the document (catalog `/Lang`)
    pub language: String,
    /// ICC profile for the output intent; required in compliance modes
    pub icc_profile: Option<Vec<u8>>,
    /// Output condition identifier of the output intent
    pub output_condition: String,
    /// Fixed creation date; defaults to the time of finalization
    pub creation_date: Option<DateTime<Utc>>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            title: None,
            author: None,
            subject: None,
            keywords: None,
            creator: Some("pdf_forge".to_string()),
            producer: Some(format!("pdf_forge {}", env!("CARGO_PKG_VERSION"))),
            compress: true,
            compliance: ComplianceMode::None,
            language: "en-US".to_string(),
            icc_profile: None,
            output_condition: "sRGB IEC61966-2.1".to_string(),
            creation_date: None,
        }
    }
}

impl WriterConfig {
    /// Set document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set document author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set document subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set document keywords.
    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    /// Set the creator application.
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Select a conformance target.
    pub fn with_compliance(mut self, compliance: ComplianceMode) -> Self {
        self.compliance = compliance;
        self
    }

    /// Set the document language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the output intent ICC profile.
    pub fn with_icc_profile(mut self, profile: impl Into<Vec<u8>>) -> Self {
        self.icc_profile = Some(profile.into());
        self
    }

    /// Fix the creation date.
    pub fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }
}

/// Writer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Pages and resources are being added
    Collecting,
    /// Objects are being emitted
    Finalizing,
    /// Output flushed and released
    Closed,
}

/// How an image's bytes are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Baseline JPEG, embedded as is (`/DCTDecode`)
    Jpeg {
        /// Number of color components (1, 3 or 4)
        components: u8,
    },
    /// 8-bit RGB samples
    Rgb,
    /// 8-bit grayscale samples
    Gray,
}

/// Object numbers of every emission step, fixed before the first byte is written.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ObjectPlan {
    metadata: Option<u32>,
    icc_profile: Option<u32>,
    first_content: u32,
    first_pool: u32,
    resources: u32,
    first_annotation: u32,
    first_page: u32,
    pages: u32,
    first_struct: Option<u32>,
    outline: Option<u32>,
    info: u32,
    catalog: u32,
}

/// Hands out consecutive object numbers.
struct Cursor(u32);

impl Cursor {
    fn take(&mut self, count: usize) -> u32 {
        let first = self.0;
        self.0 += count as u32;
        first
    }
}

impl ObjectPlan {
    fn new(
        page_count: usize,
        annotation_count: usize,
        pool_len: usize,
        struct_objects: Option<usize>,
        outline_objects: Option<usize>,
    ) -> Self {
        let mut cursor = Cursor(1);
        let tagged = struct_objects.is_some();
        let metadata = tagged.then(|| cursor.take(1));
        let icc_profile = tagged.then(|| cursor.take(1));
        let first_content = cursor.take(page_count);
        let first_pool = cursor.take(pool_len);
        let resources = cursor.take(1);
        let first_annotation = cursor.take(annotation_count);
        let first_page = cursor.take(page_count);
        let pages = cursor.take(1);
        let first_struct = struct_objects.map(|n| cursor.take(n));
        let outline = outline_objects.map(|n| cursor.take(n));
        let info = cursor.take(1);
        let catalog = cursor.take(1);
        Self {
            metadata,
            icc_profile,
            first_content,
            first_pool,
            resources,
            first_annotation,
            first_page,
            pages,
            first_struct,
            outline,
            info,
            catalog,
        }
    }

    fn content(&self, page: usize) -> u32 {
        self.first_content + page as u32
    }

    fn page(&self, page: usize) -> u32 {
        self.first_page + page as u32
    }

    /// `/Size` of the trailer.
    fn size(&self) -> u32 {
        self.catalog + 1
    }
}

/// Writes numbered objects through the sink and records their offsets.
struct Emitter<W: Write> {
    sink: ByteSink<W>,
    offsets: Vec<u64>,
    serializer: ObjectSerializer,
    pool_base: u32,
    pool_len: u32,
}

impl<W: Write> Emitter<W> {
    fn emit(&mut self, id: u32, body: &Dict, stream: Option<&[u8]>) -> Result<()> {
        let expected = self.offsets.len() as u32 + 1;
        if id != expected {
            return Err(Error::InvalidState(format!(
                "object {} emitted where object {} was planned",
                id, expected
            )));
        }
        let mut body = body.clone();
        if let Some(index) = body.tokens().iter().find_map(|t| match t {
            Token::LocalRef(i) if *i >= self.pool_len => Some(*i),
            _ => None,
        }) {
            return Err(Error::UnresolvedReference(index));
        }
        body.rebase_local_refs(self.pool_base);
        self.offsets.push(self.sink.offset());
        self.serializer.write_indirect(&mut self.sink, id, &body, stream)
    }

    /// Emit a stream, deflating it when asked and no filter is set yet.
    fn emit_stream(&mut self, id: u32, mut body: Dict, data: &[u8], compress: bool) -> Result<()> {
        if compress && !body.contains_key("Filter") {
            let packed = deflate(data)?;
            body.insert("Filter", Token::name("FlateDecode"));
            self.emit(id, &body, Some(&packed))
        } else {
            self.emit(id, &body, Some(data))
        }
    }
}

/// PDF document writer.
///
/// Collects pages, resources, bookmarks and structure elements, then
/// writes the whole document in [`PdfWriter::finish`].
#[derive(Debug)]
pub struct PdfWriter {
    config: WriterConfig,
    state: WriterState,
    pages: Vec<Page>,
    resources: Resources,
    pool: ResourcePool,
    fonts: HashMap<String, String>,
    layers: Vec<Token>,
    struct_elements: Vec<StructElement>,
    bookmarks: BookmarkTree,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new(WriterConfig::default())
    }
}

impl PdfWriter {
    /// Create a writer with the given configuration.
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            state: WriterState::Collecting,
            pages: Vec::new(),
            resources: Resources::new(),
            pool: ResourcePool::new(),
            fonts: HashMap::new(),
            layers: Vec::new(),
            struct_elements: Vec::new(),
            bookmarks: BookmarkTree::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WriterState {
        self.state
    }

    fn ensure_collecting(&self, operation: &str) -> Result<()> {
        match self.state {
            WriterState::Collecting => Ok(()),
            state => Err(Error::InvalidState(format!("cannot {} while {:?}", operation, state))),
        }
    }

    /// Append a page; returns its index.
    pub fn add_page(&mut self, page: Page) -> Result<usize> {
        self.ensure_collecting("add a page")?;
        self.pages.push(page);
        Ok(self.pages.len() - 1)
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Mutable access to an added page.
    pub fn page_mut(&mut self, index: usize) -> Option<&mut Page> {
        self.pages.get_mut(index)
    }

    /// The shared resources dictionary.
    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    /// Add an indirect resource object; the returned token refers to it.
    pub fn add_resource_object(&mut self, dict: Dict, stream: Option<Vec<u8>>) -> Result<Token> {
        self.ensure_collecting("add a resource object")?;
        Ok(self.pool.add(dict, stream))
    }

    /// Register one of the standard 14 fonts; returns its resource name.
    ///
    /// Adding the same base font twice returns the same name.
    pub fn add_font(&mut self, base_font: &str) -> Result<String> {
        self.ensure_collecting("add a font")?;
        if let Some(name) = self.fonts.get(base_font) {
            return Ok(name.clone());
        }
        let name = format!("F{}", self.fonts.len() + 1);
        let mut font = Dict::typed("Font")
            .with("Subtype", Token::name("Type1"))
            .with("BaseFont", Token::name(base_font));
        if !matches!(base_font, "Symbol" | "ZapfDingbats") {
            font.insert("Encoding", Token::name("WinAnsiEncoding"));
        }
        let font_ref = self.pool.add(font, None);
        self.resources.insert("Font", &name, font_ref);
        self.fonts.insert(base_font.to_string(), name.clone());
        Ok(name)
    }

    /// Embed an image XObject; returns its resource name.
    pub fn add_image(&mut self, width: u32, height: u32, data: Vec<u8>, encoding: ImageEncoding) -> Result<String> {
        self.ensure_collecting("add an image")?;
        let (color_space, filter) = match encoding {
            ImageEncoding::Jpeg { components: 1 } => ("DeviceGray", Some("DCTDecode")),
            ImageEncoding::Jpeg { components: 4 } => ("DeviceCMYK", Some("DCTDecode")),
            ImageEncoding::Jpeg { .. } => ("DeviceRGB", Some("DCTDecode")),
            ImageEncoding::Rgb => ("DeviceRGB", None),
            ImageEncoding::Gray => ("DeviceGray", None),
        };
        let mut image = Dict::typed("XObject")
            .with("Subtype", Token::name("Image"))
            .with("Width", Token::int(width as i64))
            .with("Height", Token::int(height as i64))
            .with("ColorSpace", Token::name(color_space))
            .with("BitsPerComponent", Token::int(8));
        if let Some(filter) = filter {
            image.insert("Filter", Token::name(filter));
        }
        let name = format!("Im{}", self.resources.names("XObject").len() + 1);
        let image_ref = self.pool.add(image, Some(data));
        self.resources.insert("XObject", &name, image_ref);
        Ok(name)
    }

    /// Add a transparency graphics state; returns its resource name.
    pub fn add_ext_gstate(&mut self, fill_alpha: f64, stroke_alpha: f64) -> Result<String> {
        self.ensure_collecting("add a graphics state")?;
        let name = format!("GS{}", self.resources.names("ExtGState").len() + 1);
        let state = Dict::typed("ExtGState")
            .with("ca", Token::real(fill_alpha.clamp(0.0, 1.0)))
            .with("CA", Token::real(stroke_alpha.clamp(0.0, 1.0)));
        self.resources.insert("ExtGState", &name, state);
        Ok(name)
    }

    /// Add an optional content group (layer); returns its property name
    /// for use in `/OC /name BDC ... EMC`.
    pub fn add_layer(&mut self, name: &str) -> Result<String> {
        self.ensure_collecting("add a layer")?;
        let property = format!("OC{}", self.layers.len() + 1);
        let group = Dict::typed("OCG").with("Name", Token::text(name));
        let group_ref = self.pool.add(group, None);
        self.resources.insert("Properties", &property, group_ref.clone());
        self.layers.push(group_ref);
        Ok(property)
    }

    /// Tag a span of content; only written in compliance modes.
    pub fn add_struct_element(&mut self, element: StructElement) -> Result<()> {
        self.ensure_collecting("add a structure element")?;
        self.struct_elements.push(element);
        Ok(())
    }

    /// Replace the bookmark tree.
    pub fn set_bookmarks(&mut self, tree: BookmarkTree) -> Result<()> {
        self.ensure_collecting("set bookmarks")?;
        self.bookmarks = tree;
        Ok(())
    }

    /// Mutable access to the bookmark tree.
    pub fn bookmarks_mut(&mut self) -> &mut BookmarkTree {
        &mut self.bookmarks
    }

    /// Write the document to `out` and close the writer.
    ///
    /// The writer is closed afterwards whether or not writing succeeded.
    pub fn finish<W: Write>(&mut self, out: W) -> Result<W> {
        self.ensure_collecting("finish")?;
        self.state = WriterState::Finalizing;
        let result = self.write_document(out);
        self.state = WriterState::Closed;
        result
    }

    /// Write the document to a file; a partially written file is removed
    /// on failure.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let result = self
            .finish(std::io::BufWriter::new(file))
            .and_then(|w| w.into_inner().map_err(|e| Error::Io(e.into_error())))
            .and_then(|file| file.sync_all().map_err(Error::from));
        if result.is_err() {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Failed to remove partial file {}: {}", path.display(), e);
            }
        }
        result
    }

    fn validate(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(Error::InvalidDocument("document has no pages".to_string()));
        }
        for (index, page) in self.pages.iter().enumerate() {
            page.validate(index)?;
        }
        if self.config.compliance.is_tagged() {
            if self.config.icc_profile.is_none() {
                return Err(Error::InvalidDocument(format!(
                    "{:?} requires an output intent ICC profile",
                    self.config.compliance
                )));
            }
            if self.config.compliance == ComplianceMode::PdfUa1 && self.config.title.is_none() {
                return Err(Error::InvalidDocument("PDF/UA requires a document title".to_string()));
            }
            let counts: Vec<usize> = self.pages.iter().map(|p| p.annotations().len()).collect();
            StructureTree::new(&self.struct_elements, self.pages.len()).validate(&counts)?;
        }
        Ok(())
    }

    fn write_document<W: Write>(&self, out: W) -> Result<W> {
        self.validate()?;
        let compliance = self.config.compliance;
        let tagged = compliance.is_tagged();
        let compress = self.config.compress;
        let page_count = self.pages.len();
        let annotation_count: usize = self.pages.iter().map(|p| p.annotations().len()).sum();

        let structure = StructureTree::new(&self.struct_elements, page_count);
        if !tagged && !self.struct_elements.is_empty() {
            log::debug!(
                "Ignoring {} structure elements outside compliance modes",
                self.struct_elements.len()
            );
        }

        let plan = ObjectPlan::new(
            page_count,
            annotation_count,
            self.pool.len(),
            tagged.then(|| structure.object_count()),
            (!self.bookmarks.is_empty()).then(|| self.bookmarks.len() + 1),
        );
        log::debug!(
            "Writing {} pages, {} pool objects, {} annotations, {} bookmarks, {} structure elements: {} objects",
            page_count,
            self.pool.len(),
            annotation_count,
            self.bookmarks.len(),
            if tagged { self.struct_elements.len() } else { 0 },
            plan.size() - 1
        );
        log::trace!("Object plan: {:?}", plan);

        let page_ids: Vec<u32> = (0..page_count).map(|i| plan.page(i)).collect();
        let mut annotation_ids: Vec<Vec<u32>> = Vec::with_capacity(page_count);
        let mut next_annotation = plan.first_annotation;
        for page in &self.pages {
            let count = page.annotations().len() as u32;
            annotation_ids.push((next_annotation..next_annotation + count).collect());
            next_annotation += count;
        }

        let mut destinations: HashMap<&str, (usize, f64, f64)> = HashMap::new();
        for (index, page) in self.pages.iter().enumerate() {
            for dest in page.destinations() {
                if destinations.contains_key(dest.name.as_str()) {
                    log::warn!("Duplicate destination '{}' on page {} ignored", dest.name, index);
                    continue;
                }
                destinations.insert(dest.name.as_str(), (index, dest.x, dest.y));
            }
        }
        let resolve = |name: &str| -> Option<Vec<Token>> {
            destinations.get(name).map(|&(page, x, y)| {
                array([
                    Token::reference(plan.page(page)),
                    Token::name("XYZ"),
                    Token::real(x),
                    Token::real(y),
                    Token::int(0),
                ])
            })
        };

        let date = self.config.creation_date.unwrap_or_else(Utc::now);
        let mut emitter = Emitter {
            sink: ByteSink::new(out),
            offsets: Vec::with_capacity(plan.size() as usize),
            serializer: ObjectSerializer::new(),
            pool_base: plan.first_pool,
            pool_len: self.pool.len() as u32,
        };
        emitter.sink.append_bytes(HEADER)?;

        // Metadata and output intent profile
        if let (Some(metadata), Some(icc)) = (plan.metadata, plan.icc_profile) {
            let xmp = XmpWriter::new(compliance, date)
                .title(self.config.title.as_deref())
                .author(self.config.author.as_deref())
                .subject(self.config.subject.as_deref())
                .keywords(self.config.keywords.as_deref())
                .creator_tool(self.config.creator.as_deref())
                .producer(self.config.producer.as_deref())
                .language(&self.config.language)
                .build_bytes();
            let dict = Dict::typed("Metadata").with("Subtype", Token::name("XML"));
            emitter.emit(metadata, &dict, Some(&xmp))?;
            let profile = self.config.icc_profile.as_deref().unwrap_or_default();
            emitter.emit_stream(icc, Dict::new().with("N", Token::int(3)), profile, compress)?;
        }

        // Content streams
        for (index, page) in self.pages.iter().enumerate() {
            emitter.emit_stream(plan.content(index), Dict::new(), page.content(), compress)?;
        }

        // Resources
        for (index, object) in self.pool.objects().iter().enumerate() {
            let id = plan.first_pool + index as u32;
            match &object.stream {
                Some(data) => emitter.emit_stream(id, object.dict.clone(), data, compress)?,
                None => emitter.emit(id, &object.dict, None)?,
            }
        }
        emitter.emit(plan.resources, &self.resources.to_dict(), None)?;

        // Annotations
        let struct_parents = if tagged {
            structure.annotation_keys()
        } else {
            HashMap::new()
        };
        for (page_index, page) in self.pages.iter().enumerate() {
            for (index, annotation) in page.annotations().iter().enumerate() {
                let dict = annotation.build(
                    plan.page(page_index),
                    &page_ids,
                    &resolve,
                    tagged,
                    struct_parents.get(&(page_index, index)).copied(),
                );
                emitter.emit(annotation_ids[page_index][index], &dict, None)?;
            }
        }

        // Page tree
        for (index, page) in self.pages.iter().enumerate() {
            let mut dict = page.build(plan.pages, plan.resources, plan.content(index), &annotation_ids[index]);
            if tagged {
                dict.insert("StructParents", Token::int(index as i64));
                if !page.annotations().is_empty() {
                    dict.insert("Tabs", Token::name("S"));
                }
            }
            emitter.emit(plan.page(index), &dict, None)?;
        }
        let kids = Dict::typed("Pages")
            .with("Kids", array(page_ids.iter().map(|&id| Token::reference(id))))
            .with("Count", Token::int(page_count as i64));
        emitter.emit(plan.pages, &kids, None)?;

        // Structure tree
        if let Some(first) = plan.first_struct {
            let objects = structure.encode(first, &page_ids, &annotation_ids, &self.config.language);
            for (offset, dict) in objects.iter().enumerate() {
                emitter.emit(first + offset as u32, dict, None)?;
            }
        }

        // Outline
        if let Some(outline) = plan.outline {
            let objects = self.bookmarks.encode(outline, &page_ids, &resolve);
            for (offset, dict) in objects.iter().enumerate() {
                emitter.emit(outline + offset as u32, dict, None)?;
            }
        }

        emitter.emit(plan.info, &self.info_dict(date), None)?;

        let catalog = self.catalog_dict(&plan, &destinations, &resolve);
        emitter.emit(plan.catalog, &catalog, None)?;

        // Cross-reference table and trailer
        let id = self.document_id(emitter.sink.offset());
        let Emitter { mut sink, offsets, .. } = emitter;
        write_xref_and_trailer(&mut sink, &offsets, plan.info, plan.catalog, &id)?;
        log::debug!("Wrote {} objects, {} bytes", offsets.len(), sink.offset());
        sink.finish()
    }

    fn info_dict(&self, date: DateTime<Utc>) -> Dict {
        let mut info = Dict::new();
        let fields = [
            ("Title", &self.config.title),
            ("Author", &self.config.author),
            ("Subject", &self.config.subject),
            ("Keywords", &self.config.keywords),
            ("Creator", &self.config.creator),
            ("Producer", &self.config.producer),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                info.insert(key, Token::text(value));
            }
        }
        let stamp = pdf_date(date);
        info.insert("CreationDate", Token::text(&stamp));
        info.insert("ModDate", Token::text(&stamp));
        info
    }

    fn catalog_dict(
        &self,
        plan: &ObjectPlan,
        destinations: &HashMap<&str, (usize, f64, f64)>,
        resolve: &dyn Fn(&str) -> Option<Vec<Token>>,
    ) -> Dict {
        let mut catalog = Dict::typed("Catalog").with("Pages", Token::reference(plan.pages));
        if let Some(outline) = plan.outline {
            catalog.insert("Outlines", Token::reference(outline));
            catalog.insert("PageMode", Token::name("UseOutlines"));
        }
        if !destinations.is_empty() {
            let mut names: Vec<&str> = destinations.keys().copied().collect();
            names.sort_unstable();
            let mut dests = Dict::new();
            for name in names {
                if let Some(dest) = resolve(name) {
                    dests.insert(name, dest);
                }
            }
            catalog.insert("Dests", dests);
        }
        if !self.layers.is_empty() {
            let groups = array(self.layers.iter().cloned());
            let defaults = Dict::new()
                .with("Order", groups.clone())
                .with("ON", groups.clone());
            catalog.insert("OCProperties", Dict::new().with("OCGs", groups).with("D", defaults));
        }
        if let (Some(metadata), Some(icc), Some(first_struct)) = (plan.metadata, plan.icc_profile, plan.first_struct) {
            let structure = StructureTree::new(&self.struct_elements, self.pages.len());
            catalog.insert("Lang", Token::text(&self.config.language));
            catalog.insert("StructTreeRoot", Token::reference(structure.root_id(first_struct)));
            catalog.insert("MarkInfo", Dict::new().with("Marked", Token::Bool(true)));
            catalog.insert("ViewerPreferences", Dict::new().with("DisplayDocTitle", Token::Bool(true)));
            catalog.insert("Metadata", Token::reference(metadata));
            let intent = Dict::typed("OutputIntent")
                .with("S", Token::name("GTS_PDFA1"))
                .with("OutputConditionIdentifier", Token::text(&self.config.output_condition))
                .with("Info", Token::text(&self.config.output_condition))
                .with("DestOutputProfile", Token::reference(icc));
            catalog.insert("OutputIntents", array(intent.into_tokens()));
        }
        catalog
    }

    /// File identifier: SipHash of title, page count and body size.
    fn document_id(&self, byte_count: u64) -> [u8; 16] {
        let mut hasher = SipHasher13::new();
        hasher.write(self.config.title.as_deref().unwrap_or_default().as_bytes());
        hasher.write_u64(self.pages.len() as u64);
        hasher.write_u64(byte_count);
        hasher.finish128().as_u128().to_be_bytes()
    }
}

/// Write the classic cross-reference section for objects `1..=offsets.len()`
/// followed by the trailer.
pub(crate) fn write_xref_and_trailer<W: Write>(
    sink: &mut ByteSink<W>,
    offsets: &[u64],
    info: u32,
    root: u32,
    id: &[u8],
) -> Result<()> {
    let xref_offset = sink.offset();
    let size = offsets.len() + 1;
    sink.append_str(&format!("xref\n0 {}\n0000000000 65535 f \n", size))?;
    for offset in offsets {
        sink.append_str(&format!("{:010} 00000 n \n", offset))?;
    }
    let id: String = id.iter().map(|b| format!("{:02X}", b)).collect();
    sink.append_str(&format!(
        "trailer\n<< /Size {} /ID[<{}><{}>] /Info {} 0 R /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
        size, id, id, info, root, xref_offset
    ))
}

/// `D:YYYYMMDDHHmmSS+00'00'`
fn pdf_date(date: DateTime<Utc>) -> String {
    date.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{Annotation, Rect};
    use chrono::TimeZone;

    fn fixed_config() -> WriterConfig {
        WriterConfig::default()
            .with_compress(false)
            .with_creation_date(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    }

    fn write(writer: &mut PdfWriter) -> String {
        let bytes = writer.finish(Vec::new()).unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_plan_minimal() {
        let plan = ObjectPlan::new(1, 0, 0, None, None);
        assert_eq!(plan.first_content, 1);
        assert_eq!(plan.resources, 2);
        assert_eq!(plan.first_page, 3);
        assert_eq!(plan.pages, 4);
        assert_eq!(plan.info, 5);
        assert_eq!(plan.catalog, 6);
        assert_eq!(plan.size(), 7);
    }

    #[test]
    fn test_plan_full() {
        // 2 pages, 3 annotations, 2 pool objects, 4 structure objects, outline + 2 items
        let plan = ObjectPlan::new(2, 3, 2, Some(4), Some(3));
        assert_eq!(plan.metadata, Some(1));
        assert_eq!(plan.icc_profile, Some(2));
        assert_eq!(plan.first_content, 3);
        assert_eq!(plan.first_pool, 5);
        assert_eq!(plan.resources, 7);
        assert_eq!(plan.first_annotation, 8);
        assert_eq!(plan.first_page, 11);
        assert_eq!(plan.pages, 13);
        assert_eq!(plan.first_struct, Some(14));
        assert_eq!(plan.outline, Some(18));
        assert_eq!(plan.info, 21);
        assert_eq!(plan.catalog, 22);
    }

    #[test]
    fn test_minimal_document() {
        let mut writer = PdfWriter::new(fixed_config());
        writer.add_page(Page::letter().with_content("BT ET")).unwrap();
        let pdf = write(&mut writer);
        assert!(pdf.starts_with("%PDF-1.5\n%"));
        assert!(pdf.contains("1 0 obj\n<< /Length 5 >>\nstream\nBT ET\nendstream\nendobj\n"));
        assert!(pdf.contains("3 0 obj\n<< /Type /Page /Parent 4 0 R"));
        assert!(pdf.contains("xref\n0 7\n0000000000 65535 f \n"));
        assert!(pdf.contains("/Size 7 /ID[<"));
        assert!(pdf.contains("/Info 5 0 R /Root 6 0 R >>\nstartxref\n"));
        assert!(pdf.ends_with("%%EOF\n"));
        assert_eq!(writer.state(), WriterState::Closed);
    }

    #[test]
    fn test_no_pages_is_error() {
        let mut writer = PdfWriter::new(fixed_config());
        assert!(matches!(writer.finish(Vec::new()), Err(Error::InvalidDocument(_))));
        assert_eq!(writer.state(), WriterState::Closed);
    }

    #[test]
    fn test_closed_writer_rejects_changes() {
        let mut writer = PdfWriter::new(fixed_config());
        writer.add_page(Page::a4()).unwrap();
        writer.finish(Vec::new()).unwrap();
        assert!(matches!(writer.add_page(Page::a4()), Err(Error::InvalidState(_))));
        assert!(matches!(writer.finish(Vec::new()), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_fonts_are_deduplicated() {
        let mut writer = PdfWriter::new(fixed_config());
        assert_eq!(writer.add_font("Helvetica").unwrap(), "F1");
        assert_eq!(writer.add_font("Courier").unwrap(), "F2");
        assert_eq!(writer.add_font("Helvetica").unwrap(), "F1");
        writer.add_page(Page::letter()).unwrap();
        let pdf = write(&mut writer);
        // pool objects 2 and 3 sit between the content stream and the resources
        assert!(pdf.contains("2 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica"));
        assert!(pdf.contains("4 0 obj\n<< /Font << /F1 2 0 R /F2 3 0 R >> >>"));
    }

    #[test]
    fn test_layers_in_catalog() {
        let mut writer = PdfWriter::new(fixed_config());
        assert_eq!(writer.add_layer("Notes").unwrap(), "OC1");
        writer.add_page(Page::letter()).unwrap();
        let pdf = write(&mut writer);
        assert!(pdf.contains("<< /Properties << /OC1 2 0 R >> >>"));
        assert!(pdf.contains("/OCProperties << /OCGs [2 0 R] /D << /Order [2 0 R] /ON [2 0 R] >> >>"));
    }

    #[test]
    fn test_links_and_destinations() {
        let mut writer = PdfWriter::new(fixed_config());
        let mut first = Page::letter();
        first.add_annotation(Annotation::goto_named(Rect::new(0.0, 0.0, 50.0, 10.0), "target"));
        let mut second = Page::letter();
        second.add_destination("target", 72.0, 700.0);
        writer.add_page(first).unwrap();
        writer.add_page(second).unwrap();
        let pdf = write(&mut writer);
        // content 1-2, resources 3, annotation 4, pages 5-6, parent 7
        assert!(pdf.contains("/Dest [6 0 R /XYZ 72 700 0]"));
        assert!(pdf.contains("/Dests << /target [6 0 R /XYZ 72 700 0] >>"));
        assert!(pdf.contains("/Annots [4 0 R]"));
    }

    #[test]
    fn test_compliance_requires_profile() {
        let mut writer = PdfWriter::new(fixed_config().with_compliance(ComplianceMode::PdfA2a));
        writer.add_page(Page::letter()).unwrap();
        assert!(matches!(writer.finish(Vec::new()), Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_ext_gstate_inline() {
        let mut writer = PdfWriter::new(fixed_config());
        assert_eq!(writer.add_ext_gstate(0.5, 2.0).unwrap(), "GS1");
        writer.add_page(Page::letter()).unwrap();
        let pdf = write(&mut writer);
        assert!(pdf.contains("/ExtGState << /GS1 << /Type /ExtGState /ca 0.5 /CA 1 >> >>"));
    }

    #[test]
    fn test_dangling_pool_reference() {
        let mut writer = PdfWriter::new(fixed_config());
        writer.resources_mut().insert("XObject", "X1", Token::LocalRef(3));
        writer.add_page(Page::letter()).unwrap();
        assert!(matches!(writer.finish(Vec::new()), Err(Error::UnresolvedReference(3))));
    }

    #[test]
    fn test_pdf_date() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(pdf_date(date), "D:20240102030405+00'00'");
    }

    #[test]
    fn test_config_defaults() {
        let config = WriterConfig::default();
        assert!(config.compress);
        assert_eq!(config.language, "en-US");
        assert_eq!(config.compliance, ComplianceMode::None);
    }
}
