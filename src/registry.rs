//! Indirect object registry.
//!
//! A dense, identity-indexed store of indirect object records. The reader
//! fills it from a parsed file (gaps become placeholder records so identities
//! stay contiguous); callers then inspect or edit it and hand it to the
//! relocation writer.
//!
//! Lookups that miss return `None` rather than an error: most dictionaries
//! are sparse, and a missing optional entry is not a malformed file.

use crate::decoders::{decode_stream, deflate};
use crate::error::{Error, Result};
use crate::object::{array, Dict, ObjectRef, Token};
use crate::parser_config::ReaderOptions;
use bytes::Bytes;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

/// Resource categories whose entries are followed when collecting a page's
/// resource objects.
const RESOURCE_CATEGORIES: &[&str] = &[
    "Font",
    "ExtGState",
    "XObject",
    "ColorSpace",
    "Pattern",
    "Shading",
    "Properties",
];

/// Object types never pulled in while following resource references.
const STRUCTURAL_TYPES: &[&str] = &["Page", "Pages", "Catalog"];

/// One indirect object.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Object number (generation is always written as 0)
    pub id: u32,
    /// Object body, usually a dictionary
    pub dict: Dict,
    /// Raw (still encoded) stream payload
    pub stream: Option<Bytes>,
    /// Byte offset of the object in the file it was read from
    pub source_offset: Option<u64>,
    /// Read from a file, either at an offset or out of an object stream
    pub recovered: bool,
}

impl Record {
    /// A freshly authored record.
    pub fn new(id: u32, dict: Dict) -> Self {
        Self {
            id,
            dict,
            stream: None,
            source_offset: None,
            recovered: false,
        }
    }

    /// Mark the record as read from a file.
    pub fn into_recovered(mut self) -> Self {
        self.recovered = true;
        self
    }

    /// Attach a stream payload.
    pub fn with_stream(mut self, data: impl Into<Bytes>) -> Self {
        self.stream = Some(data.into());
        self
    }

    /// A `null` record standing in for a free or missing identity.
    pub fn placeholder(id: u32) -> Self {
        Self::new(id, Dict::null())
    }

    /// Whether this is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.dict.is_null() && self.stream.is_none()
    }
}

/// Dense registry of indirect objects, numbered from 1.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: Vec<Record>,
    root: Option<ObjectRef>,
    info: Option<ObjectRef>,
    options: ReaderOptions,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry decoding streams with `options`.
    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Number of identities (highest object number).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no objects.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Object number the next [`Registry::add`] will assign.
    pub fn next_id(&self) -> u32 {
        self.records.len() as u32 + 1
    }

    /// Options used when decoding streams.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Add a new record at the next identity.
    pub fn add(&mut self, dict: Dict, stream: Option<Bytes>) -> u32 {
        let id = self.next_id();
        self.records.push(Record {
            id,
            dict,
            stream,
            source_offset: None,
            recovered: false,
        });
        id
    }

    /// Store `record` under its own identity, filling any gap below it with
    /// placeholders. An existing record with the same identity is replaced.
    pub fn insert(&mut self, record: Record) {
        if record.id == 0 {
            return;
        }
        let index = record.id as usize - 1;
        while self.records.len() < index {
            let id = self.records.len() as u32 + 1;
            self.records.push(Record::placeholder(id));
        }
        if index < self.records.len() {
            self.records[index] = record;
        } else {
            self.records.push(record);
        }
    }

    /// Look up a record by object number.
    pub fn get(&self, id: u32) -> Option<&Record> {
        let index = (id as usize).checked_sub(1)?;
        self.records.get(index)
    }

    /// Mutable lookup by object number.
    pub fn get_mut(&mut self, id: u32) -> Option<&mut Record> {
        let index = (id as usize).checked_sub(1)?;
        self.records.get_mut(index)
    }

    /// Record a reference token points at.
    pub fn resolve(&self, token: &Token) -> Option<&Record> {
        self.get(token.as_reference()?.id)
    }

    /// Follow `key` of `dict` to an object body: an inline dictionary is
    /// returned as-is, a reference is resolved.
    pub fn resolve_dict(&self, dict: &Dict, key: &str) -> Option<Dict> {
        if let Some(r) = dict.get_ref(key) {
            let record = self.get(r.id)?;
            return record.dict.is_dict().then(|| record.dict.clone());
        }
        dict.get_dict(key)
    }

    /// All records in identity order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Document catalog reference.
    pub fn root(&self) -> Option<ObjectRef> {
        self.root
    }

    /// Set the document catalog reference.
    pub fn set_root(&mut self, root: Option<ObjectRef>) {
        self.root = root;
    }

    /// Document information dictionary reference.
    pub fn info(&self) -> Option<ObjectRef> {
        self.info
    }

    /// Set the document information dictionary reference.
    pub fn set_info(&mut self, info: Option<ObjectRef>) {
        self.info = info;
    }

    /// The pages root: the one `/Pages` node without a `/Parent`.
    ///
    /// The catalog's `/Pages` entry is preferred when it qualifies; otherwise
    /// the first parentless pages node wins.
    pub fn pages_root(&self) -> Option<u32> {
        let is_root = |record: &Record| record.dict.is_type("Pages") && !record.dict.contains_key("Parent");

        let from_catalog = self
            .root
            .and_then(|r| self.get(r.id))
            .and_then(|catalog| catalog.dict.get_ref("Pages"))
            .and_then(|r| self.get(r.id))
            .filter(|record| is_root(record));
        if let Some(record) = from_catalog {
            return Some(record.id);
        }
        self.records.iter().find(|record| is_root(record)).map(|record| record.id)
    }

    /// Flatten the page tree into page object numbers, in document order.
    pub fn pages(&self) -> Vec<u32> {
        let mut pages = Vec::new();
        let Some(root) = self.pages_root() else {
            return pages;
        };
        let mut visited = HashSet::new();
        self.collect_pages(root, &mut visited, &mut pages);
        pages
    }

    fn collect_pages(&self, id: u32, visited: &mut HashSet<u32>, pages: &mut Vec<u32>) {
        if !visited.insert(id) {
            log::warn!("Page tree cycle at object {}", id);
            return;
        }
        let Some(record) = self.get(id) else {
            return;
        };
        if record.dict.is_type("Page") {
            pages.push(id);
            return;
        }
        for kid in record.dict.get_refs("Kids") {
            self.collect_pages(kid.id, visited, pages);
        }
    }

    /// Value of `key` on a page, following `/Parent` for inheritable entries.
    pub fn inherited(&self, page: u32, key: &str) -> Option<Vec<Token>> {
        let mut visited = HashSet::new();
        let mut current = self.get(page)?;
        loop {
            if let Some(value) = current.dict.get(key) {
                return Some(value.to_vec());
            }
            if !visited.insert(current.id) {
                return None;
            }
            current = self.get(current.dict.get_ref("Parent")?.id)?;
        }
    }

    /// References to a page's content streams, in order.
    pub fn content_refs(&self, page: u32) -> Vec<ObjectRef> {
        let Some(record) = self.get(page) else {
            return Vec::new();
        };
        let direct = record.dict.get_refs("Contents");
        // A single reference may point at an indirect array of streams
        if direct.len() == 1 {
            if let Some(target) = self.get(direct[0].id) {
                if target.stream.is_none() && !target.dict.is_dict() {
                    return target.dict.references().collect();
                }
            }
        }
        direct
    }

    /// Decoded content of a page: its content streams concatenated, one
    /// newline between consecutive streams.
    pub fn page_content(&self, page: u32) -> Result<Vec<u8>> {
        let mut combined = Vec::new();
        for (index, r) in self.content_refs(page).into_iter().enumerate() {
            let record = self.get(r.id).ok_or(Error::ObjectNotFound(r.id, r.gen))?;
            let Some(data) = &record.stream else {
                log::warn!("Content reference {} is not a stream", r);
                continue;
            };
            if index > 0 {
                combined.push(b'\n');
            }
            combined.extend_from_slice(&decode_stream(&record.dict, data, &self.options)?);
        }
        Ok(combined)
    }

    /// Object numbers a page's resources depend on, in discovery order.
    ///
    /// Starts from the (possibly inherited) `/Resources` of the page and
    /// follows every reference reachable from the resource categories: fonts
    /// with their descendant fonts, descriptors, font files and `/ToUnicode`
    /// maps, graphics states, XObjects and so on. Page tree nodes and the
    /// catalog are never followed.
    pub fn page_resource_objects(&self, page: u32) -> IndexSet<u32> {
        let mut found = IndexSet::new();
        let Some(value) = self.inherited(page, "Resources") else {
            return found;
        };
        let resources = match value.as_slice() {
            [Token::Ref(r)] => {
                if self.get(r.id).is_some() {
                    found.insert(r.id);
                }
                match self.get(r.id) {
                    Some(record) => record.dict.clone(),
                    None => return found,
                }
            },
            _ => Dict::from_tokens(value),
        };

        for category in RESOURCE_CATEGORIES {
            let Some(entries) = self.resolve_dict(&resources, category) else {
                continue;
            };
            if let Some(r) = resources.get_ref(category) {
                found.insert(r.id);
            }
            let mut refs: Vec<ObjectRef> = entries.references().collect();
            // Depth first, preserving the order entries appear in
            refs.reverse();
            while let Some(r) = refs.pop() {
                let Some(record) = self.get(r.id) else {
                    continue;
                };
                if STRUCTURAL_TYPES.iter().any(|t| record.dict.is_type(t)) || !found.insert(r.id) {
                    continue;
                }
                let mut children: Vec<ObjectRef> = record
                    .dict
                    .references()
                    .filter(|child| !found.contains(&child.id))
                    .collect();
                children.reverse();
                refs.extend(children);
            }
        }
        found
    }

    /// Append a content stream to a page.
    ///
    /// The new stream is added as a record of its own and appended to the
    /// page's `/Contents`, which becomes an array. Returns the new record's
    /// object number.
    pub fn append_page_content(&mut self, page: u32, content: &[u8], compress: bool) -> Result<u32> {
        let page_record = self.get(page).ok_or(Error::ObjectNotFound(page, 0))?;
        if !page_record.dict.is_type("Page") {
            return Err(Error::InvalidObjectType {
                expected: "Page".to_string(),
                found: page_record.dict.get_name("Type").unwrap_or("untyped").to_string(),
            });
        }
        let mut contents = self.content_refs(page);

        let mut dict = Dict::new();
        let payload = if compress {
            dict.insert("Filter", Token::name("FlateDecode"));
            deflate(content)?
        } else {
            content.to_vec()
        };
        dict.insert("Length", Token::int(payload.len() as i64));
        let id = self.add(dict, Some(Bytes::from(payload)));
        contents.push(ObjectRef::new(id, 0));

        if let Some(page_record) = self.get_mut(page) {
            page_record
                .dict
                .insert("Contents", array(contents.into_iter().map(Token::Ref)));
        }
        log::debug!("Appended content stream {} to page {}", id, page);
        Ok(id)
    }

    /// Copy records from `source` into this registry under new identities.
    ///
    /// References between imported records are rewritten to the new
    /// numbers; references to objects outside `ids` become `null`. Returns
    /// the old-to-new identity map.
    pub fn import_objects(&mut self, source: &Registry, ids: impl IntoIterator<Item = u32>) -> HashMap<u32, u32> {
        let mut mapping = HashMap::new();
        let mut records = Vec::new();
        for id in ids {
            if mapping.contains_key(&id) {
                continue;
            }
            if let Some(record) = source.get(id) {
                mapping.insert(id, self.next_id() + records.len() as u32);
                records.push(record);
            }
        }

        for record in records {
            let mut dict = record.dict.clone();
            dict.map_refs(|r| match mapping.get(&r.id) {
                Some(&new_id) => Token::reference(new_id),
                None => {
                    log::debug!("Dropping reference {} outside the imported set", r);
                    Token::Null
                },
            });
            let id = self.add(dict, record.stream.clone());
            if let Some(imported) = self.get_mut(id) {
                imported.recovered = record.recovered;
            }
        }
        mapping
    }
}
