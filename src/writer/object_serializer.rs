//! PDF object serialization.
//!
//! Turns flat token sequences back into PDF syntax. Strings recovered by the
//! reader keep their original escapes and are written back verbatim, so a
//! literal string with balanced but unescaped parentheses survives a copy
//! byte for byte. Reals read from a file are written with their original
//! digits, and names are re-escaped from their decoded bytes.

use crate::error::{Error, Result};
use crate::object::{Dict, Token};
use crate::writer::sink::format_real;
use std::io::Write;

/// Serializes tokens and indirect objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a new serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize a token sequence to bytes.
    pub fn serialize(&self, tokens: &[Token]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_tokens(&mut buf, tokens)?;
        Ok(buf)
    }

    /// Serialize a token sequence to a string (lossy for binary strings).
    pub fn serialize_to_string(&self, tokens: &[Token]) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.serialize(tokens)?).into_owned())
    }

    /// Write an indirect object:
    /// `id 0 obj\n<body>\n[stream\n<data>\nendstream\n]endobj\n`.
    ///
    /// For stream objects `/Length` is set to the payload length.
    pub fn write_indirect<W: Write>(&self, w: &mut W, id: u32, body: &Dict, stream: Option<&[u8]>) -> Result<()> {
        writeln!(w, "{} 0 obj", id)?;
        match stream {
            Some(data) => {
                let mut dict = body.clone();
                dict.insert("Length", Token::int(data.len() as i64));
                self.write_tokens(w, dict.tokens())?;
                w.write_all(b"\nstream\n")?;
                w.write_all(data)?;
                w.write_all(b"\nendstream\n")?;
            },
            None => {
                self.write_tokens(w, body.tokens())?;
                w.write_all(b"\n")?;
            },
        }
        w.write_all(b"endobj\n")?;
        Ok(())
    }

    /// Write tokens separated by single spaces (none inside array brackets).
    pub fn write_tokens<W: Write>(&self, w: &mut W, tokens: &[Token]) -> Result<()> {
        let mut previous: Option<&Token> = None;
        for token in tokens {
            let tight = matches!(previous, None | Some(Token::ArrayOpen)) || matches!(token, Token::ArrayClose);
            if !tight {
                w.write_all(b" ")?;
            }
            self.write_token(w, token)?;
            previous = Some(token);
        }
        Ok(())
    }

    fn write_token<W: Write>(&self, w: &mut W, token: &Token) -> Result<()> {
        match token {
            Token::Integer(i) => write!(w, "{}", i)?,
            Token::Real(r) => w.write_all(format_real(*r).as_bytes())?,
            Token::SourceReal { text, .. } => w.write_all(text.as_bytes())?,
            Token::Name(n) => self.write_name(w, n.as_bytes())?,
            Token::RawName(bytes) => self.write_name(w, bytes)?,
            Token::LiteralString(raw) => {
                w.write_all(b"(")?;
                w.write_all(raw)?;
                w.write_all(b")")?;
            },
            Token::HexString(raw) => {
                w.write_all(b"<")?;
                w.write_all(raw)?;
                w.write_all(b">")?;
            },
            Token::Ref(r) => write!(w, "{} {} R", r.id, r.gen)?,
            Token::LocalRef(index) => return Err(Error::UnresolvedReference(*index)),
            Token::Bool(b) => w.write_all(if *b { &b"true"[..] } else { &b"false"[..] })?,
            Token::Null => w.write_all(b"null")?,
            Token::Keyword(k) => w.write_all(k.as_bytes())?,
            Token::DictOpen => w.write_all(b"<<")?,
            Token::DictClose => w.write_all(b">>")?,
            Token::ArrayOpen => w.write_all(b"[")?,
            Token::ArrayClose => w.write_all(b"]")?,
        }
        Ok(())
    }

    fn write_name<W: Write>(&self, w: &mut W, name: &[u8]) -> std::io::Result<()> {
        w.write_all(b"/")?;
        for &byte in name {
            match byte {
                // Regular characters other than the number sign
                b'!'..=b'~'
                    if !matches!(
                        byte,
                        b'#' | b'%' | b'(' | b')' | b'/' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
                    ) =>
                {
                    w.write_all(&[byte])?;
                },
                _ => write!(w, "#{:02X}", byte)?,
            }
        }
        Ok(())
    }
}
