//! PDF object model.
//!
//! Object bodies are kept as a flat, ordered sequence of [`Token`]s rather than
//! a nested tree. A dictionary is simply `DictOpen key value ... DictClose`, and
//! lookups scan for the value that follows a key at the outermost nesting level.
//! This is enough for everything the reader and writer need (type checks,
//! reference extraction, editing a handful of keys) and lets recovered objects
//! be re-emitted without altering their values: strings keep their escapes,
//! reals their spelling and names their bytes.

use std::ops::Range;

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// A single lexical unit of an object body.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// Real (or out of range integer) read from a file, with its source spelling
    SourceReal {
        /// Parsed value
        value: f64,
        /// Digits as they appeared in the file
        text: String,
    },
    /// Name without the leading `/`, `#xx` escapes decoded
    Name(String),
    /// Name whose decoded bytes are not UTF-8
    RawName(Vec<u8>),
    /// Literal string contents between the outer parentheses, escapes left intact
    LiteralString(Vec<u8>),
    /// Hexadecimal string digits between `<` and `>`
    HexString(Vec<u8>),
    /// Indirect reference (`12 0 R`)
    Ref(ObjectRef),
    /// Reference into the writer's resource pool, rebased during finalization
    LocalRef(u32),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// Any other bare word (`obj`, `{`, operators inside PostScript functions, ...)
    Keyword(String),
    /// `<<`
    DictOpen,
    /// `>>`
    DictClose,
    /// `[`
    ArrayOpen,
    /// `]`
    ArrayClose,
}

impl Token {
    /// Create a name token.
    pub fn name(name: &str) -> Self {
        Token::Name(name.to_string())
    }

    /// Create an integer token.
    pub fn int(value: i64) -> Self {
        Token::Integer(value)
    }

    /// Create a real token.
    pub fn real(value: f64) -> Self {
        Token::Real(value)
    }

    /// Create a reference token to generation 0 of `id`.
    pub fn reference(id: u32) -> Self {
        Token::Ref(ObjectRef::new(id, 0))
    }

    /// Create a text string token.
    ///
    /// ASCII text becomes an escaped literal string; anything else is encoded
    /// as UTF-16BE with a byte order mark, in hexadecimal form.
    pub fn text(value: &str) -> Self {
        if value.is_ascii() {
            Token::LiteralString(escape_literal(value.as_bytes()))
        } else {
            let mut hex = Vec::with_capacity(4 + value.len() * 4);
            hex.extend_from_slice(b"FEFF");
            for unit in value.encode_utf16() {
                hex.extend_from_slice(format!("{:04X}", unit).as_bytes());
            }
            Token::HexString(hex)
        }
    }

    /// Create a literal string token from arbitrary bytes.
    pub fn bytes(value: &[u8]) -> Self {
        Token::LiteralString(escape_literal(value))
    }

    /// Get the type name of this token.
    pub fn type_name(&self) -> &'static str {
        match self {
            Token::Integer(_) => "Integer",
            Token::Real(_) | Token::SourceReal { .. } => "Real",
            Token::Name(_) | Token::RawName(_) => "Name",
            Token::LiteralString(_) | Token::HexString(_) => "String",
            Token::Ref(_) | Token::LocalRef(_) => "Reference",
            Token::Bool(_) => "Boolean",
            Token::Null => "Null",
            Token::Keyword(_) => "Keyword",
            Token::DictOpen | Token::DictClose => "Dictionary",
            Token::ArrayOpen | Token::ArrayClose => "Array",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Token::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an integer or real token.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Token::Integer(i) => Some(*i as f64),
            Token::Real(r) => Some(*r),
            Token::SourceReal { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Token::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Token::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Decoded bytes of a literal or hex string.
    pub fn decoded_string(&self) -> Option<Vec<u8>> {
        match self {
            Token::LiteralString(raw) => Some(crate::lexer::decode_literal_string_escapes(raw)),
            Token::HexString(raw) => Some(crate::lexer::decode_hex(raw)),
            _ => None,
        }
    }
}

/// Escape bytes for use inside a literal string.
fn escape_literal(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    for &byte in data {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            },
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out
}

/// Conversion into a run of tokens forming one value.
pub trait IntoTokens {
    /// Consume `self` and return its tokens.
    fn into_tokens(self) -> Vec<Token>;
}

impl IntoTokens for Token {
    fn into_tokens(self) -> Vec<Token> {
        vec![self]
    }
}

impl IntoTokens for Vec<Token> {
    fn into_tokens(self) -> Vec<Token> {
        self
    }
}

impl IntoTokens for Dict {
    fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}

/// Build an array value from its elements.
pub fn array(items: impl IntoIterator<Item = Token>) -> Vec<Token> {
    let mut tokens = vec![Token::ArrayOpen];
    tokens.extend(items);
    tokens.push(Token::ArrayClose);
    tokens
}

/// Build a rectangle array `[llx lly urx ury]`.
pub fn rect(llx: f64, lly: f64, urx: f64, ury: f64) -> Vec<Token> {
    array([Token::Real(llx), Token::Real(lly), Token::Real(urx), Token::Real(ury)])
}

/// Index one past the value starting at `start`.
///
/// Composite values extend to their matching close token; a missing close
/// token extends the value to the end of the slice.
pub fn value_end(tokens: &[Token], start: usize) -> usize {
    match tokens.get(start) {
        Some(Token::DictOpen) | Some(Token::ArrayOpen) => {
            let mut depth = 0usize;
            for (i, tok) in tokens.iter().enumerate().skip(start) {
                match tok {
                    Token::DictOpen | Token::ArrayOpen => depth += 1,
                    Token::DictClose | Token::ArrayClose => {
                        depth -= 1;
                        if depth == 0 {
                            return i + 1;
                        }
                    },
                    _ => {},
                }
            }
            tokens.len()
        },
        Some(_) => start + 1,
        None => start,
    }
}

/// An object body, usually a dictionary.
///
/// Bodies that are not dictionaries (a bare integer used as an indirect
/// `/Length`, an array of page references) are stored the same way; the
/// dictionary accessors simply find nothing in them.
#[derive(Debug, Clone, PartialEq)]
pub struct Dict {
    tokens: Vec<Token>,
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl Dict {
    /// Create an empty dictionary (`<< >>`).
    pub fn new() -> Self {
        Self {
            tokens: vec![Token::DictOpen, Token::DictClose],
        }
    }

    /// Create an empty dictionary with `/Type /<type_name>`.
    pub fn typed(type_name: &str) -> Self {
        let mut dict = Self::new();
        dict.insert("Type", Token::name(type_name));
        dict
    }

    /// Wrap an arbitrary token sequence.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// A body consisting of the single `null` token.
    pub fn null() -> Self {
        Self {
            tokens: vec![Token::Null],
        }
    }

    /// The raw token sequence.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Consume and return the raw token sequence.
    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// Whether the body is a dictionary.
    pub fn is_dict(&self) -> bool {
        matches!(self.tokens.first(), Some(Token::DictOpen))
    }

    /// Whether the body is the `null` placeholder.
    pub fn is_null(&self) -> bool {
        matches!(self.tokens.as_slice(), [Token::Null])
    }

    /// Integer value of a body made of a single integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self.tokens.as_slice() {
            [Token::Integer(i)] => Some(*i),
            _ => None,
        }
    }

    /// Spans of `(key index, value range)` at the outermost level.
    fn entry_spans(&self) -> Vec<(usize, Range<usize>)> {
        let mut spans = Vec::new();
        if !self.is_dict() {
            return spans;
        }
        let close = value_end(&self.tokens, 0).saturating_sub(1);
        let mut i = 1;
        while i < close {
            if !matches!(self.tokens[i], Token::Name(_)) {
                i += 1;
                continue;
            }
            let value_start = i + 1;
            if value_start >= close {
                break;
            }
            let end = value_end(&self.tokens, value_start).min(close);
            spans.push((i, value_start..end));
            i = end;
        }
        spans
    }

    /// Keys at the outermost level, in order.
    pub fn keys(&self) -> Vec<&str> {
        self.entry_spans()
            .into_iter()
            .filter_map(|(k, _)| self.tokens[k].as_name())
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entry_spans().len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, key: &str) -> Option<(usize, Range<usize>)> {
        self.entry_spans()
            .into_iter()
            .find(|(k, _)| self.tokens[*k].as_name() == Some(key))
    }

    /// Tokens of the value following `key`.
    pub fn get(&self, key: &str) -> Option<&[Token]> {
        self.find(key).map(|(_, range)| &self.tokens[range])
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Single-token value following `key`.
    pub fn get_token(&self, key: &str) -> Option<&Token> {
        match self.get(key)? {
            [tok] => Some(tok),
            _ => None,
        }
    }

    /// Integer value of `key`.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_token(key)?.as_integer()
    }

    /// Name value of `key`.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get_token(key)?.as_name()
    }

    /// Reference value of `key`.
    pub fn get_ref(&self, key: &str) -> Option<ObjectRef> {
        self.get_token(key)?.as_reference()
    }

    /// Nested dictionary value of `key`, copied out.
    pub fn get_dict(&self, key: &str) -> Option<Dict> {
        let value = self.get(key)?;
        match value.first() {
            Some(Token::DictOpen) => Some(Dict::from_tokens(value.to_vec())),
            _ => None,
        }
    }

    /// Elements of an array value of `key`, without the brackets.
    pub fn get_array(&self, key: &str) -> Option<&[Token]> {
        let value = self.get(key)?;
        match value {
            [Token::ArrayOpen, inner @ .., Token::ArrayClose] => Some(inner),
            _ => None,
        }
    }

    /// References held by `key`, whether a single reference or an array of them.
    pub fn get_refs(&self, key: &str) -> Vec<ObjectRef> {
        match self.get(key) {
            Some(value) => value.iter().filter_map(Token::as_reference).collect(),
            None => Vec::new(),
        }
    }

    /// Whether `/Type` equals `type_name`.
    pub fn is_type(&self, type_name: &str) -> bool {
        self.get_name("Type") == Some(type_name)
    }

    /// Insert or replace `key`.
    pub fn insert(&mut self, key: &str, value: impl IntoTokens) {
        let value = value.into_tokens();
        if let Some((_, range)) = self.find(key) {
            self.tokens.splice(range, value);
            return;
        }
        if !self.is_dict() {
            self.tokens = vec![Token::DictOpen, Token::DictClose];
        }
        let close = value_end(&self.tokens, 0).saturating_sub(1);
        let mut entry = Vec::with_capacity(value.len() + 1);
        entry.push(Token::name(key));
        entry.extend(value);
        self.tokens.splice(close..close, entry);
    }

    /// Builder-style [`Dict::insert`].
    pub fn with(mut self, key: &str, value: impl IntoTokens) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove `key`, returning its value tokens.
    pub fn remove(&mut self, key: &str) -> Option<Vec<Token>> {
        let (k, range) = self.find(key)?;
        let removed: Vec<Token> = self.tokens.drain(k..range.end).skip(1).collect();
        Some(removed)
    }

    /// All references anywhere in the body.
    pub fn references(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.tokens.iter().filter_map(Token::as_reference)
    }

    /// Rewrite every reference token in place.
    pub fn map_refs(&mut self, mut f: impl FnMut(ObjectRef) -> Token) {
        for tok in &mut self.tokens {
            if let Token::Ref(r) = tok {
                *tok = f(*r);
            }
        }
    }

    /// Turn pool-local references into real ones numbered from `base`.
    pub fn rebase_local_refs(&mut self, base: u32) {
        for tok in &mut self.tokens {
            if let Token::LocalRef(index) = tok {
                *tok = Token::reference(base + *index);
            }
        }
    }
}
