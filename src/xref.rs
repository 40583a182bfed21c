//! Cross-reference resolution.
//!
//! The cross-reference index maps object numbers to byte offsets. Two
//! encodings exist and both are supported:
//! - classic `xref` tables followed by a `trailer` dictionary
//! - cross-reference streams (`/Type /XRef`) whose rows are fixed-width
//!   big-endian fields, usually flate-compressed with a PNG row predictor
//!
//! Incremental updates chain sections through `/Prev`. The previous section
//! is always resolved first and the current section's entries are layered on
//! top, so the newest definition of an object wins.

use crate::decoders::decode_stream;
use crate::error::{Error, Result};
use crate::lexer::{Lexeme, Lexer, Terminator};
use crate::object::{Dict, Token};
use crate::parser_config::ReaderOptions;
use byteorder::{BigEndian, ByteOrder};
use std::collections::{BTreeMap, HashSet};

/// How far back from the end of the file `startxref` is searched for.
const STARTXREF_WINDOW: usize = 2048;

/// Upper bound on a single table subsection.
const MAX_SUBSECTION: u64 = 10_000_000;

/// Type of cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Free entry (type 0 / `f`)
    Free,
    /// Object at a byte offset (type 1 / `n`)
    Uncompressed,
    /// Object inside an object stream (type 2)
    Compressed,
}

/// Cross-reference entry.
///
/// For compressed entries `offset` holds the containing object stream's
/// number and `generation` the index inside that stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Entry type
    pub entry_type: XRefEntryType,
    /// Byte offset, or container object number for compressed entries
    pub offset: u64,
    /// Generation number, or index for compressed entries
    pub generation: u16,
}

impl XRefEntry {
    /// An object stored at a byte offset.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
        }
    }

    /// An object stored in an object stream.
    pub fn compressed(stream_obj_num: u64, index_in_stream: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream_obj_num,
            generation: index_in_stream,
        }
    }

    /// A free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
        }
    }

    /// Whether the entry locates a live object.
    pub fn in_use(&self) -> bool {
        self.entry_type != XRefEntryType::Free
    }
}

/// Resolved cross-reference index plus the merged trailer.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dict,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the entry for `object_number`.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Entry for `object_number`.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// All entries in object-number order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &XRefEntry)> {
        self.entries.iter().map(|(&id, entry)| (id, entry))
    }

    /// Highest object number with an entry.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    /// Merged trailer dictionary (newest values win).
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layer a newer section on top of this one.
    ///
    /// Entries of `newer` replace entries with the same object number, free
    /// entries included (an object deleted by an update stays deleted), and
    /// the newer trailer's keys override the older trailer's.
    pub fn overlay(&mut self, newer: CrossRefTable) {
        self.entries.extend(newer.entries);
        if !self.trailer.is_dict() {
            self.trailer = Dict::new();
        }
        for key in newer.trailer.keys() {
            if let Some(value) = newer.trailer.get(key) {
                self.trailer.insert(key, value.to_vec());
            }
        }
    }
}

/// Locate the offset named by the last `startxref` in `data`.
///
/// Fails with [`Error::InvalidXref`] when the keyword is missing or its
/// offset lies outside the buffer.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let window = &data[window_start..];
    let keyword = window
        .windows(9)
        .rposition(|w| w == b"startxref")
        .ok_or(Error::InvalidXref)?;

    let mut lexer = Lexer::at(data, window_start + keyword + 9);
    let offset = match lexer.next_lexeme() {
        Ok(Some(Lexeme::Token(Token::Integer(offset)))) if offset >= 0 => offset as u64,
        _ => return Err(Error::InvalidXref),
    };
    if offset as usize >= data.len() {
        log::debug!("startxref {} lies past the end of a {} byte buffer", offset, data.len());
        return Err(Error::InvalidXref);
    }
    Ok(offset)
}

/// Resolve the whole cross-reference chain starting at `offset`.
pub fn parse_xref(data: &[u8], offset: u64, options: &ReaderOptions) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    parse_xref_chain(data, offset, options, &mut visited)
}

fn parse_xref_chain(
    data: &[u8],
    offset: u64,
    options: &ReaderOptions,
    visited: &mut HashSet<u64>,
) -> Result<CrossRefTable> {
    if visited.len() as u32 >= options.max_prev_chain || !visited.insert(offset) {
        return Err(Error::XrefChainTooDeep(options.max_prev_chain));
    }
    if offset as usize >= data.len() {
        return Err(Error::InvalidXref);
    }

    let section = parse_section(data, offset as usize, options)?;

    // Older sections first, so this section's entries shadow them
    let mut table = match section.trailer.get_int("Prev") {
        Some(prev) if prev >= 0 => {
            log::debug!("Following /Prev from {} to {}", offset, prev);
            parse_xref_chain(data, prev as u64, options, visited)?
        },
        _ => CrossRefTable::new(),
    };

    // Hybrid files: the table's own entries shadow the /XRefStm entries
    if let Some(stm) = section.trailer.get_int("XRefStm").filter(|&o| o >= 0) {
        if visited.insert(stm as u64) {
            log::debug!("Merging hybrid /XRefStm section at {}", stm);
            let mut hidden = parse_section(data, stm as usize, options)?;
            hidden.trailer = Dict::new();
            table.overlay(hidden);
        }
    }

    table.overlay(section);
    Ok(table)
}

/// Parse one section at `offset` without following `/Prev`.
fn parse_section(data: &[u8], offset: usize, options: &ReaderOptions) -> Result<CrossRefTable> {
    let mut lexer = Lexer::at(data, offset);
    match lexer.next_lexeme()? {
        Some(Lexeme::Token(Token::Keyword(k))) if k == "xref" => {
            log::debug!("Classic xref table at offset {}", offset);
            parse_table(&mut lexer, offset, options)
        },
        Some(Lexeme::Token(Token::Integer(_))) => {
            log::debug!("Cross-reference stream at offset {}", offset);
            parse_xref_stream(data, offset, options)
        },
        _ => Err(Error::InvalidXref),
    }
}

/// Object number of an entry, or `None` in lenient mode when it does not
/// fit 32 bits.
fn entry_number(number: u64, offset: usize, options: &ReaderOptions) -> Result<Option<u32>> {
    match u32::try_from(number) {
        Ok(id) => Ok(Some(id)),
        Err(_) if options.strict => Err(Error::ParseError {
            offset,
            reason: format!("object number {} does not fit 32 bits", number),
        }),
        Err(_) => {
            log::warn!("Ignoring xref entry for object number {}", number);
            Ok(None)
        },
    }
}

/// Parse a classic table; the lexer is positioned after `xref`.
fn parse_table(lexer: &mut Lexer<'_>, offset: usize, options: &ReaderOptions) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    loop {
        let start = match lexer.next_lexeme()? {
            Some(Lexeme::Token(Token::Integer(start))) if start >= 0 => start as u64,
            Some(Lexeme::Token(Token::Keyword(k))) if k == "trailer" => break,
            Some(Lexeme::Terminator(Terminator::StartXref)) | None => {
                return Err(Error::MissingTrailer(offset));
            },
            Some(other) => {
                return Err(Error::ParseError {
                    offset: lexer.position(),
                    reason: format!("unexpected {:?} in xref table", other),
                })
            },
        };
        let count = lexer.next_unsigned()?;
        if count > MAX_SUBSECTION {
            return Err(Error::ParseError {
                offset: lexer.position(),
                reason: format!("xref subsection of {} entries", count),
            });
        }

        for i in 0..count {
            let entry_offset = lexer.next_unsigned()?;
            let generation = lexer.next_unsigned()?.min(u16::MAX as u64) as u16;
            let entry = match lexer.next_token()? {
                Token::Keyword(k) if k == "n" => XRefEntry::uncompressed(entry_offset, generation),
                Token::Keyword(k) if k == "f" => XRefEntry::free(entry_offset, generation),
                other => {
                    return Err(Error::ParseError {
                        offset: lexer.position(),
                        reason: format!("invalid xref entry type {:?}", other),
                    })
                },
            };
            if let Some(id) = entry_number(start + i, offset, options)? {
                table.add_entry(id, entry);
            }
        }
    }

    let trailer = Dict::from_tokens(lexer.read_value()?);
    if !trailer.is_dict() {
        return Err(Error::MissingTrailer(offset));
    }
    table.trailer = trailer;
    Ok(table)
}

/// Parse a cross-reference stream object at `offset`.
fn parse_xref_stream(data: &[u8], offset: usize, options: &ReaderOptions) -> Result<CrossRefTable> {
    let mut lexer = Lexer::at(data, offset);
    lexer.next_unsigned()?;
    lexer.next_unsigned()?;
    lexer.expect_keyword("obj")?;
    let (tokens, terminator) = lexer.read_body()?;
    let dict = Dict::from_tokens(tokens);
    if terminator != Some(Terminator::Stream) {
        return Err(Error::InvalidXref);
    }
    if dict.get_name("Type").is_some_and(|t| t != "XRef") {
        return Err(Error::InvalidObjectType {
            expected: "XRef".to_string(),
            found: dict.get_name("Type").unwrap_or_default().to_string(),
        });
    }

    let payload = match dict.get_int("Length") {
        Some(length) if length >= 0 => lexer.read_stream_payload(length as usize)?,
        _ => lexer.read_stream_until_end()?,
    };
    let decoded = decode_stream(&dict, payload, options)?;

    let widths: Vec<usize> = dict
        .get_array("W")
        .unwrap_or_default()
        .iter()
        .filter_map(Token::as_integer)
        .map(|w| w.max(0) as usize)
        .collect();
    let [w_type, w_field1, w_field2] = widths[..] else {
        return Err(Error::ParseError {
            offset,
            reason: "cross-reference stream /W must hold three widths".to_string(),
        });
    };
    if w_type > 8 || w_field1 > 8 || w_field2 > 8 {
        return Err(Error::ParseError {
            offset,
            reason: format!("unsupported /W [{} {} {}]", w_type, w_field1, w_field2),
        });
    }
    let row_len = w_type + w_field1 + w_field2;
    if row_len == 0 {
        return Err(Error::ParseError {
            offset,
            reason: "empty cross-reference stream rows".to_string(),
        });
    }

    let size = dict.get_int("Size").unwrap_or(0).max(0) as u64;
    let index: Vec<u64> = dict
        .get_array("Index")
        .unwrap_or_default()
        .iter()
        .filter_map(Token::as_integer)
        .map(|v| v.max(0) as u64)
        .collect();
    let ranges: Vec<(u64, u64)> = if index.len() >= 2 {
        index.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
    } else {
        vec![(0, size)]
    };

    let mut table = CrossRefTable::new();
    let mut rows = decoded.chunks_exact(row_len);
    for (start, count) in ranges {
        for i in 0..count {
            let Some(row) = rows.next() else {
                log::warn!("Cross-reference stream at {} ends before its /Index is exhausted", offset);
                break;
            };
            let field = |from: usize, width: usize| -> u64 {
                if width == 0 {
                    0
                } else {
                    BigEndian::read_uint(&row[from..from + width], width)
                }
            };
            // A zero-width type field means every row is type 1
            let entry_type = if w_type == 0 { 1 } else { field(0, w_type) };
            let field1 = field(w_type, w_field1);
            let field2 = field(w_type + w_field1, w_field2);
            let entry = match entry_type {
                0 => XRefEntry::free(field1, field2.min(u16::MAX as u64) as u16),
                1 => XRefEntry::uncompressed(field1, field2.min(u16::MAX as u64) as u16),
                2 => XRefEntry::compressed(field1, field2.min(u16::MAX as u64) as u16),
                other => {
                    // Unknown types are treated as references to the null object
                    log::debug!("Ignoring cross-reference row of type {}", other);
                    continue;
                },
            };
            if let Some(id) = entry_number(start + i, offset, options)? {
                table.add_entry(id, entry);
            }
        }
    }

    table.trailer = dict;
    Ok(table)
}
