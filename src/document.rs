//! PDF reader.
//!
//! Turns a finalized PDF buffer of unknown layout into a dense [`Registry`]:
//! 1. locate `startxref`
//! 2. resolve the cross-reference chain (classic tables or xref streams)
//! 3. read every in-use object at its offset
//! 4. unpack object streams, materialising each packed object under its own
//!    identity
//! 5. replace containers and xref streams with placeholders and fill gaps
//!
//! Any failure in steps 1-2, and any stream whose declared length runs past
//! the end of the buffer, aborts the read.

use crate::error::{Error, Result};
use crate::lexer::{Lexer, Terminator};
use crate::object::{value_end, Dict, ObjectRef, Token};
use crate::objstm::{is_object_stream, unpack_object_stream};
use crate::parser_config::ReaderOptions;
use crate::registry::{Record, Registry};
use crate::xref::{find_startxref, parse_xref, CrossRefTable, XRefEntryType};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::Path;

/// Largest object number accepted (the PDF implementation limit).
const MAX_OBJECT_NUMBER: u32 = 8_388_607;

/// Reads PDF files into a [`Registry`].
#[derive(Debug, Clone, Default)]
pub struct PdfReader {
    options: ReaderOptions,
}

impl PdfReader {
    /// Create a reader with the given options.
    pub fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Read a file from disk with default options.
    ///
    /// ```no_run
    /// use pdf_forge::document::PdfReader;
    ///
    /// let registry = PdfReader::open("sample.pdf")?;
    /// println!("{} pages", registry.pages().len());
    /// # Ok::<(), pdf_forge::error::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Registry> {
        Self::default().read_file(path)
    }

    /// Read an in-memory buffer with default options.
    pub fn from_bytes(data: &[u8]) -> Result<Registry> {
        Self::default().read(data)
    }

    /// Read a file from disk.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<Registry> {
        let data = std::fs::read(path.as_ref())?;
        log::debug!("Read {} bytes from {}", data.len(), path.as_ref().display());
        self.read(&data)
    }

    /// Read an in-memory buffer.
    pub fn read(&self, data: &[u8]) -> Result<Registry> {
        if !data.starts_with(b"%PDF-") {
            if self.options.strict {
                return Err(Error::ParseError {
                    offset: 0,
                    reason: "missing %PDF- header".to_string(),
                });
            }
            log::warn!("Buffer does not start with a %PDF- header");
        }

        let startxref = find_startxref(data)?;
        let table = parse_xref(data, startxref, &self.options)?;
        log::debug!("Cross-reference chain resolved: {} entries", table.len());

        let mut registry = Registry::with_options(self.options);
        let mut containers: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

        for (id, entry) in table.entries() {
            if id == 0 {
                continue;
            }
            if id > MAX_OBJECT_NUMBER {
                log::warn!("Ignoring object number {} beyond the implementation limit", id);
                continue;
            }
            match entry.entry_type {
                XRefEntryType::Free => {},
                XRefEntryType::Uncompressed => {
                    if let Some(record) = self.read_object(data, entry.offset, id, &table)? {
                        registry.insert(record);
                    }
                },
                XRefEntryType::Compressed => match u32::try_from(entry.offset) {
                    Ok(container) => containers.entry(container).or_default().push(id),
                    Err(_) => log::warn!("Object {} names container {} beyond 32 bits", id, entry.offset),
                },
            }
        }

        for (container, members) in containers {
            self.unpack_container(&mut registry, &table, container, &members)?;
        }

        // Containers and xref streams only carry index data for the old file
        let stale: Vec<u32> = registry
            .records()
            .filter(|record| is_object_stream(&record.dict) || record.dict.is_type("XRef"))
            .map(|record| record.id)
            .collect();
        for id in stale {
            registry.insert(Record::placeholder(id));
        }

        // Pad to the highest number the xref lists; /Size alone is not trusted
        let highest = table.max_object_number().min(MAX_OBJECT_NUMBER);
        if highest as usize > registry.len() {
            registry.insert(Record::placeholder(highest));
        }

        registry.set_root(table.trailer().get_ref("Root"));
        registry.set_info(table.trailer().get_ref("Info"));
        if registry.root().is_none() {
            log::warn!("Trailer has no /Root");
        }
        log::debug!("Registry holds {} objects", registry.len());
        Ok(registry)
    }

    /// Read the indirect object at `offset`.
    ///
    /// Returns `None` for objects skipped in lenient mode.
    fn read_object(&self, data: &[u8], offset: u64, id: u32, table: &CrossRefTable) -> Result<Option<Record>> {
        match self.parse_object_at(data, offset as usize, id, table) {
            Ok(record) => Ok(Some(record)),
            Err(e @ Error::TruncatedStream { .. }) => Err(e),
            Err(e) if self.options.strict => Err(e),
            Err(e) => {
                log::warn!("Skipping object {} at offset {}: {}", id, offset, e);
                Ok(None)
            },
        }
    }

    fn parse_object_at(&self, data: &[u8], offset: usize, id: u32, table: &CrossRefTable) -> Result<Record> {
        if offset >= data.len() {
            return Err(Error::ParseError {
                offset,
                reason: format!("object {} offset is past the end of the buffer", id),
            });
        }
        let mut lexer = Lexer::at(data, offset);
        let header_id = lexer.next_unsigned()?;
        lexer.next_unsigned()?;
        lexer.expect_keyword("obj")?;
        if header_id != id as u64 {
            if self.options.strict {
                return Err(Error::ParseError {
                    offset,
                    reason: format!("expected object {}, found object {}", id, header_id),
                });
            }
            log::warn!("Object header at {} names {} but the xref says {}", offset, header_id, id);
        }

        let (mut tokens, terminator) = lexer.read_body()?;
        let end = value_end(&tokens, 0);
        if end < tokens.len() {
            log::debug!("Object {} has {} trailing tokens", id, tokens.len() - end);
            tokens.truncate(end);
        }
        let dict = Dict::from_tokens(tokens);

        let stream = match terminator {
            Some(Terminator::EndObj) => None,
            Some(Terminator::Stream) => {
                let payload = match self.stream_length(data, &dict, table) {
                    Some(length) => lexer.read_stream_payload(length)?,
                    None => {
                        log::debug!("Object {} has no usable /Length, scanning for endstream", id);
                        lexer.read_stream_until_end()?
                    },
                };
                Some(Bytes::copy_from_slice(payload))
            },
            Some(Terminator::StartXref) | None => {
                if !self.options.allow_missing_endobj {
                    return Err(Error::ParseError {
                        offset,
                        reason: format!("object {} has no endobj", id),
                    });
                }
                log::warn!("Object {} has no endobj", id);
                None
            },
        };

        Ok(Record {
            id,
            dict,
            stream,
            source_offset: Some(offset as u64),
            recovered: true,
        })
    }

    /// Declared `/Length`, following an indirect reference through the table.
    fn stream_length(&self, data: &[u8], dict: &Dict, table: &CrossRefTable) -> Option<usize> {
        let length = match dict.get_token("Length")? {
            Token::Integer(length) => *length,
            Token::Ref(r) => resolve_integer(data, table, *r)?,
            _ => return None,
        };
        usize::try_from(length).ok()
    }

    fn unpack_container(
        &self,
        registry: &mut Registry,
        table: &CrossRefTable,
        container: u32,
        members: &[u32],
    ) -> Result<()> {
        let Some(record) = registry.get(container) else {
            log::warn!("Object stream {} is missing; {} objects lost", container, members.len());
            return Ok(());
        };
        let Some(data) = record.stream.clone() else {
            log::warn!("Object stream {} has no payload", container);
            return Ok(());
        };
        let dict = record.dict.clone();

        let packed = match unpack_object_stream(&dict, &data, &self.options) {
            Ok(packed) => packed,
            Err(e) if self.options.strict => return Err(e),
            Err(e) => {
                log::warn!("Failed to unpack object stream {}: {}", container, e);
                return Ok(());
            },
        };
        log::debug!("Unpacked object stream {}: {} objects", container, packed.len());

        for object in packed {
            // Only the container the newest xref names owns the identity
            let owned = table
                .get(object.id)
                .is_some_and(|e| e.entry_type == XRefEntryType::Compressed && e.offset == container as u64);
            if owned && members.contains(&object.id) {
                registry.insert(Record::new(object.id, object.body).into_recovered());
            }
        }
        Ok(())
    }
}

/// Integer body of an uncompressed object, used for indirect `/Length`.
fn resolve_integer(data: &[u8], table: &CrossRefTable, r: ObjectRef) -> Option<i64> {
    let entry = table.get(r.id)?;
    if entry.entry_type != XRefEntryType::Uncompressed {
        return None;
    }
    let mut lexer = Lexer::at(data, entry.offset as usize);
    lexer.next_unsigned().ok()?;
    lexer.next_unsigned().ok()?;
    lexer.expect_keyword("obj").ok()?;
    lexer.next_token().ok()?.as_integer()
}
