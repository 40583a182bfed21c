//! Object stream unpacking (PDF 1.5+).
//!
//! Object streams (`/Type /ObjStm`) pack many objects into one compressed
//! stream:
//! ```text
//! N 0 obj
//! << /Type /ObjStm /N 3 /First 15 /Filter /FlateDecode >>
//! stream
//! 10 0 11 19 12 33      % pairs: (object number, offset relative to /First)
//! << /Type /Font ... >> % object 10
//! [1 2 3]               % object 11
//! ...
//! endstream
//! ```

use crate::decoders::decode_stream;
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::object::{Dict, Token};
use crate::parser_config::ReaderOptions;

/// Limit on `/N`, guarding the pair table allocation.
const MAX_OBJECTS_PER_STREAM: i64 = 1_000_000;

/// One object recovered from an object stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedObject {
    /// Declared object number
    pub id: u32,
    /// Position in the stream's index table
    pub index: u16,
    /// Object body
    pub body: Dict,
}

/// Unpack every object of an object stream.
///
/// `dict` and `data` are the container's dictionary and raw (encoded)
/// payload. Objects that fail to parse are skipped with a warning; a broken
/// index table or a stream that cannot be decoded is an error.
pub fn unpack_object_stream(dict: &Dict, data: &[u8], options: &ReaderOptions) -> Result<Vec<PackedObject>> {
    if dict.get_name("Type").is_some_and(|t| t != "ObjStm") {
        return Err(Error::InvalidObjectType {
            expected: "ObjStm".to_string(),
            found: dict.get_name("Type").unwrap_or_default().to_string(),
        });
    }

    let n = dict.get_int("N").ok_or_else(|| Error::ParseError {
        offset: 0,
        reason: "object stream missing /N".to_string(),
    })?;
    let first = dict.get_int("First").ok_or_else(|| Error::ParseError {
        offset: 0,
        reason: "object stream missing /First".to_string(),
    })?;
    if !(0..=MAX_OBJECTS_PER_STREAM).contains(&n) || first < 0 {
        return Err(Error::ParseError {
            offset: 0,
            reason: format!("invalid object stream /N {} /First {}", n, first),
        });
    }
    let first = first as usize;

    let decoded = decode_stream(dict, data, options)?;
    if decoded.len() < first {
        return Err(Error::ParseError {
            offset: 0,
            reason: format!(
                "object stream data too short: {} bytes, /First is {}",
                decoded.len(),
                first
            ),
        });
    }

    let mut header = Lexer::new(&decoded[..first]);
    let mut pairs = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let id = header.next_unsigned()?;
        let offset = header.next_unsigned()?;
        match u32::try_from(id) {
            Ok(id) => pairs.push(Some((id, usize::try_from(offset).unwrap_or(usize::MAX)))),
            Err(_) => {
                let reason = format!("object number {} in object stream does not fit 32 bits", id);
                if options.strict {
                    return Err(Error::ParseError { offset: 0, reason });
                }
                log::warn!("{}", reason);
                // Keep the slot so later members keep their index
                pairs.push(None);
            },
        }
    }

    let body = &decoded[first..];
    let mut objects = Vec::with_capacity(pairs.len());
    for (index, pair) in pairs.into_iter().enumerate() {
        let Some((id, offset)) = pair else {
            continue;
        };
        let Ok(index) = u16::try_from(index) else {
            let reason = format!("object stream holds more than {} objects", u16::MAX as u32 + 1);
            if options.strict {
                return Err(Error::ParseError { offset: 0, reason });
            }
            log::warn!("{}; ignoring the rest", reason);
            break;
        };
        if offset >= body.len() {
            log::warn!(
                "Object {} offset {} is beyond object stream data length {}",
                id,
                offset,
                body.len()
            );
            continue;
        }
        let mut lexer = Lexer::at(body, offset);
        match lexer.read_value() {
            Ok(tokens) => objects.push(PackedObject {
                id,
                index,
                body: Dict::from_tokens(tokens),
            }),
            Err(e) => log::warn!("Failed to parse object {} in object stream: {}", id, e),
        }
    }
    Ok(objects)
}

/// Whether a body is an object-stream container.
pub fn is_object_stream(dict: &Dict) -> bool {
    dict.get_token("Type") == Some(&Token::name("ObjStm"))
}
