//! Merge mode: re-emit a whole registry as a fresh file.
//!
//! Every record is written in object-number order. Records recovered from
//! a source file, including those unpacked from object streams, keep their
//! values and payloads unchanged: strings keep their escapes, reals their
//! digits and names their bytes, and only offsets and generations change.
//! Records added since are newly authored and may be deflated on the way out. Gaps in the numbering are written as `null`
//! objects so the cross-reference table stays a single dense section.

use super::object_serializer::ObjectSerializer;
use super::pdf_writer::write_xref_and_trailer;
use super::sink::ByteSink;
use crate::decoders::deflate;
use crate::error::{Error, Result};
use crate::object::{Dict, Token};
use crate::registry::Registry;
use chrono::Utc;
use siphasher::sip128::{Hasher128, SipHasher13};
use std::hash::Hasher;
use std::io::Write;
use std::path::Path;

const HEADER: &[u8] = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\xC9\n";

/// Options for merge-mode output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationOptions {
    /// Deflate newly authored streams that carry no filter
    pub compress: bool,
    /// `/Producer` of the information dictionary added when the registry has none
    pub producer: Option<String>,
}

impl Default for RelocationOptions {
    fn default() -> Self {
        Self {
            compress: true,
            producer: Some(format!("pdf_forge {}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

/// Writes a registry back out with fresh offsets.
#[derive(Debug, Clone, Default)]
pub struct RelocationWriter {
    options: RelocationOptions,
}

impl RelocationWriter {
    /// Create a writer with the given options.
    pub fn new(options: RelocationOptions) -> Self {
        Self { options }
    }

    /// Write `registry` to `out`.
    ///
    /// The registry must name a catalog (`/Root`). If it has no information
    /// dictionary a minimal one is appended after the last record.
    pub fn write<W: Write>(&self, registry: &Registry, out: W) -> Result<W> {
        let root = registry
            .root()
            .ok_or_else(|| Error::InvalidDocument("registry has no /Root".to_string()))?;
        if registry.get(root.id).map_or(true, |r| r.is_placeholder()) {
            return Err(Error::InvalidDocument(format!("/Root {} is not in the registry", root)));
        }

        let serializer = ObjectSerializer::new();
        let mut sink = ByteSink::new(out);
        sink.append_bytes(HEADER)?;
        let mut offsets = Vec::with_capacity(registry.len() + 1);
        let mut relocated = 0usize;
        let mut authored = 0usize;

        for record in registry.records() {
            let mut body = record.dict.clone();
            // Everything is written as generation 0
            body.map_refs(|r| Token::reference(r.id));
            offsets.push(sink.offset());
            match &record.stream {
                Some(data) if !record.recovered && self.options.compress && !body.contains_key("Filter") => {
                    let packed = deflate(data)?;
                    body.insert("Filter", Token::name("FlateDecode"));
                    serializer.write_indirect(&mut sink, record.id, &body, Some(&packed))?;
                },
                Some(data) => serializer.write_indirect(&mut sink, record.id, &body, Some(data))?,
                None => serializer.write_indirect(&mut sink, record.id, &body, None)?,
            }
            if record.recovered {
                relocated += 1;
            } else if !record.is_placeholder() {
                authored += 1;
            }
        }

        let info = match registry.info() {
            Some(info) if registry.get(info.id).is_some() => info.id,
            _ => {
                let id = registry.next_id();
                let mut dict = Dict::new();
                if let Some(producer) = &self.options.producer {
                    dict.insert("Producer", Token::text(producer));
                }
                let stamp = Utc::now().format("D:%Y%m%d%H%M%S+00'00'").to_string();
                dict.insert("ModDate", Token::text(&stamp));
                offsets.push(sink.offset());
                serializer.write_indirect(&mut sink, id, &dict, None)?;
                id
            },
        };

        log::debug!(
            "Merged output: {} relocated, {} new, {} total objects",
            relocated,
            authored,
            offsets.len()
        );

        let mut hasher = SipHasher13::new();
        hasher.write_u32(root.id);
        hasher.write_u64(offsets.len() as u64);
        hasher.write_u64(sink.offset());
        let id = hasher.finish128().as_u128().to_be_bytes();
        write_xref_and_trailer(&mut sink, &offsets, info, root.id, &id)?;
        sink.finish()
    }

    /// Write `registry` to a file, removing it again if writing fails.
    pub fn save(&self, registry: &Registry, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let result = self
            .write(registry, std::io::BufWriter::new(file))
            .and_then(|w| w.into_inner().map_err(|e| Error::Io(e.into_error())))
            .and_then(|file| file.sync_all().map_err(Error::from));
        if result.is_err() {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Failed to remove partial file {}: {}", path.display(), e);
            }
        }
        result
    }
}
