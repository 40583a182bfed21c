//! PDF lexer (tokenizer).
//!
//! A single forward pass over a byte buffer that classifies bytes into:
//! - literal string spans `( ... )`, nesting aware and honouring backslash
//!   escapes so an escaped parenthesis never closes the string early
//! - hex strings `< ... >`
//! - names, numbers and keywords, split on whitespace and the delimiters
//!   `/ < > [ ] { } ( ) %`
//! - the doubled delimiters `<<` and `>>`, emitted as single tokens
//!
//! Three keywords end a run of object tokens: `endobj`, `stream` (a
//! length-delimited payload follows) and `startxref`.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use crate::error::{Error, Result};
use crate::object::{ObjectRef, Token};
use nom::{
    branch::alt,
    bytes::complete::{take_till, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, opt, recognize, value},
    sequence::{pair, preceded, tuple},
    IResult,
};

/// Keyword that ends a run of object tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `endobj`
    EndObj,
    /// `stream`; the payload starts after one optional newline
    Stream,
    /// `startxref`
    StartXref,
}

/// A token or a terminator.
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    /// Ordinary token
    Token(Token),
    /// Terminator keyword
    Terminator(Terminator),
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

/// Parse a comment (% to end of line).
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;
    loop {
        let ws = remaining.iter().take_while(|&&c| is_whitespace(c)).count();
        remaining = &remaining[ws..];
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }
        if ws == 0 {
            return remaining;
        }
    }
}

/// Recognize a real: 3.14, -2.5, .5, 0., -.002
fn real_number(input: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(tuple((digit1, char('.'), digit0))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)
}

/// Recognize an integer: 42, -123, +17
fn integer_number(input: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(pair(opt(one_of("+-")), digit1))(input)
}

/// Parse an integer or real number occupying the whole of `input`.
///
/// Reals keep their source spelling so they can be written back unchanged.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token> {
    let spelled = |text: &str, kind| {
        text.parse::<f64>()
            .map(|value| Token::SourceReal {
                value,
                text: text.to_string(),
            })
            .map_err(|_| nom::Err::Error(nom::error::Error::new(input, kind)))
    };

    if let Ok((rest, text)) = all_consuming(real_number)(input) {
        let text = std::str::from_utf8(text).unwrap_or("0");
        return Ok((rest, spelled(text, nom::error::ErrorKind::Float)?));
    }

    let (rest, text) = all_consuming(integer_number)(input)?;
    let text = std::str::from_utf8(text).unwrap_or("0");
    match text.parse::<i64>() {
        Ok(num) => Ok((rest, Token::Integer(num))),
        // Out of range integers degrade to reals, as viewers do
        Err(_) => Ok((rest, spelled(text, nom::error::ErrorKind::Digit)?)),
    }
}

/// Decode #XX escape sequences in PDF names.
///
/// ```
/// # use pdf_forge::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), b"A B#C");
/// assert_eq!(decode_name_escapes(b"A#"), b"A#");
/// assert_eq!(decode_name_escapes(b"#82l"), b"\x82l");
/// ```
pub fn decode_name_escapes(name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len());
    let mut i = 0;
    while i < name.len() {
        if name[i] == b'#' && i + 2 < name.len() {
            let byte = std::str::from_utf8(&name[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = byte {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(name[i]);
        i += 1;
    }
    out
}

/// Name token for decoded name bytes.
fn name_token(decoded: Vec<u8>) -> Token {
    match String::from_utf8(decoded) {
        Ok(name) => Token::Name(name),
        Err(e) => Token::RawName(e.into_bytes()),
    }
}

/// Decode escape sequences in PDF literal strings.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` and line continuations.
///
/// ```
/// # use pdf_forge::lexer::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"Section \\247 71"), b"Section \xa7 71");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }
        match raw[i + 1] {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(8),
            b'f' => result.push(12),
            b'(' | b')' | b'\\' => result.push(raw[i + 1]),
            b'\n' => {},
            b'\r' => {
                if raw.get(i + 2) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut octal = 0u32;
                let mut len = 0;
                while len < 3 {
                    match raw.get(i + 1 + len) {
                        Some(d @ b'0'..=b'7') => {
                            octal = octal * 8 + (d - b'0') as u32;
                            len += 1;
                        },
                        _ => break,
                    }
                }
                result.push((octal & 0xFF) as u8);
                i += 1 + len;
                continue;
            },
            // Unknown escape: the backslash is ignored
            other => result.push(other),
        }
        i += 2;
    }

    result
}

/// Decode the digits of a hex string. Whitespace is ignored and an odd
/// trailing digit is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Replace every `<int> <int> R` triple with a single reference token.
pub fn fold_references(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for tok in tokens {
        if matches!(&tok, Token::Keyword(k) if k == "R") && out.len() >= 2 {
            let n = out.len();
            if let (Token::Integer(id), Token::Integer(gen)) = (&out[n - 2], &out[n - 1]) {
                if *id >= 0 && *id <= u32::MAX as i64 && *gen >= 0 && *gen <= u16::MAX as i64 {
                    let r = ObjectRef::new(*id as u32, *gen as u16);
                    out.truncate(n - 2);
                    out.push(Token::Ref(r));
                    continue;
                }
            }
        }
        out.push(tok);
    }
    out
}

/// Forward-only tokenizer over a PDF buffer.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a lexer positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether only whitespace and comments remain.
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.data.len()
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let remaining = skip_ws(rest);
        self.pos += rest.len() - remaining.len();
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::ParseError {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    /// Read the next token or terminator, or `None` at end of input.
    pub fn next_lexeme(&mut self) -> Result<Option<Lexeme>> {
        self.skip_whitespace();
        let rest = self.rest();
        let Some(&first) = rest.first() else {
            return Ok(None);
        };

        let token = match first {
            b'(' => self.literal_string()?,
            b')' => return Err(self.error("unbalanced ')'")),
            b'<' if rest.get(1) == Some(&b'<') => {
                self.pos += 2;
                Token::DictOpen
            },
            b'<' => self.hex_string()?,
            b'>' if rest.get(1) == Some(&b'>') => {
                self.pos += 2;
                Token::DictClose
            },
            b'>' => return Err(self.error("unexpected '>'")),
            b'[' => {
                self.pos += 1;
                Token::ArrayOpen
            },
            b']' => {
                self.pos += 1;
                Token::ArrayClose
            },
            b'{' | b'}' => {
                self.pos += 1;
                Token::Keyword((first as char).to_string())
            },
            b'/' => {
                let len = rest[1..].iter().take_while(|&&c| is_regular(c)).count();
                let raw = &rest[1..1 + len];
                self.pos += 1 + len;
                name_token(decode_name_escapes(raw))
            },
            _ => {
                let (remaining, word) = take_while1::<_, _, nom::error::Error<&[u8]>>(is_regular)(rest)
                    .map_err(|_| self.error("unexpected byte"))?;
                self.pos += rest.len() - remaining.len();
                match word {
                    b"endobj" => return Ok(Some(Lexeme::Terminator(Terminator::EndObj))),
                    b"stream" => return Ok(Some(Lexeme::Terminator(Terminator::Stream))),
                    b"startxref" => return Ok(Some(Lexeme::Terminator(Terminator::StartXref))),
                    b"true" => Token::Bool(true),
                    b"false" => Token::Bool(false),
                    b"null" => Token::Null,
                    _ => match parse_number(word) {
                        Ok((_, num)) => num,
                        Err(_) => Token::Keyword(String::from_utf8_lossy(word).into_owned()),
                    },
                }
            },
        };
        Ok(Some(Lexeme::Token(token)))
    }

    /// Read the next token, failing on terminators and end of input.
    pub fn next_token(&mut self) -> Result<Token> {
        match self.next_lexeme()? {
            Some(Lexeme::Token(tok)) => Ok(tok),
            Some(Lexeme::Terminator(t)) => Err(self.error(format!("unexpected {:?}", t))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    /// Read a non-negative integer token.
    pub fn next_unsigned(&mut self) -> Result<u64> {
        match self.next_token()? {
            Token::Integer(i) if i >= 0 => Ok(i as u64),
            other => Err(self.error(format!("expected unsigned integer, found {}", other.type_name()))),
        }
    }

    /// Consume the keyword `word` or fail.
    pub fn expect_keyword(&mut self, word: &str) -> Result<()> {
        match self.next_token()? {
            Token::Keyword(k) if k == word => Ok(()),
            other => Err(self.error(format!("expected '{}', found {:?}", word, other))),
        }
    }

    /// Collect tokens until a terminator (or end of input), folding references.
    pub fn read_body(&mut self) -> Result<(Vec<Token>, Option<Terminator>)> {
        let mut tokens = Vec::new();
        loop {
            match self.next_lexeme()? {
                Some(Lexeme::Token(tok)) => tokens.push(tok),
                Some(Lexeme::Terminator(t)) => return Ok((fold_references(tokens), Some(t))),
                None => return Ok((fold_references(tokens), None)),
            }
        }
    }

    /// Collect the tokens of exactly one value (a dictionary, array or scalar).
    pub fn read_value(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            let tok = self.next_token()?;
            match tok {
                Token::DictOpen | Token::ArrayOpen => depth += 1,
                Token::DictClose | Token::ArrayClose => depth = depth.saturating_sub(1),
                _ => {},
            }
            tokens.push(tok);
            if depth == 0 {
                return Ok(fold_references(tokens));
            }
        }
    }

    /// Skip the single end-of-line that follows the `stream` keyword.
    pub fn skip_stream_eol(&mut self) {
        let rest = self.rest();
        if rest.starts_with(b"\r\n") {
            self.pos += 2;
        } else if rest.starts_with(b"\n") || rest.starts_with(b"\r") {
            self.pos += 1;
        }
    }

    /// Take `length` payload bytes following the `stream` keyword.
    pub fn read_stream_payload(&mut self, length: usize) -> Result<&'a [u8]> {
        self.skip_stream_eol();
        let available = self.data.len() - self.pos;
        if length > available {
            return Err(Error::TruncatedStream {
                offset: self.pos,
                declared: length,
                available,
            });
        }
        let payload = &self.data[self.pos..self.pos + length];
        self.pos += length;
        Ok(payload)
    }

    /// Take payload bytes up to the next `endstream`, for streams whose
    /// length cannot be determined.
    pub fn read_stream_until_end(&mut self) -> Result<&'a [u8]> {
        self.skip_stream_eol();
        let rest = self.rest();
        let end = rest
            .windows(9)
            .position(|w| w == b"endstream")
            .ok_or_else(|| self.error("stream without endstream"))?;
        let mut payload = &rest[..end];
        if payload.ends_with(b"\r\n") {
            payload = &payload[..payload.len() - 2];
        } else if payload.ends_with(b"\n") || payload.ends_with(b"\r") {
            payload = &payload[..payload.len() - 1];
        }
        self.pos += end;
        Ok(payload)
    }

    fn literal_string(&mut self) -> Result<Token> {
        let start = self.pos + 1;
        let mut pos = start;
        let mut depth = 1usize;
        while pos < self.data.len() {
            match self.data[pos] {
                b'\\' => pos += 2,
                b'(' => {
                    depth += 1;
                    pos += 1;
                },
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        let raw = self.data[start..pos].to_vec();
                        self.pos = pos + 1;
                        return Ok(Token::LiteralString(raw));
                    }
                    pos += 1;
                },
                _ => pos += 1,
            }
        }
        Err(self.error("unterminated literal string"))
    }

    fn hex_string(&mut self) -> Result<Token> {
        let start = self.pos + 1;
        let rest = &self.data[start..];
        let end = rest
            .iter()
            .position(|&c| c == b'>')
            .ok_or_else(|| self.error("unterminated hex string"))?;
        let raw = &rest[..end];
        if !raw.iter().all(|&c| c.is_ascii_hexdigit() || is_whitespace(c)) {
            return Err(self.error("invalid hex string"));
        }
        self.pos = start + end + 1;
        Ok(Token::HexString(raw.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(input: &[u8]) -> Vec<Lexeme> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(lex) = lexer.next_lexeme().unwrap() {
            out.push(lex);
        }
        out
    }

    fn tok(t: Token) -> Lexeme {
        Lexeme::Token(t)
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_numbers() {
        let lexemes = all_tokens(b"42 -123 +17 3.14 -.002 5. 0");
        assert_eq!(
            lexemes,
            vec![
                tok(Token::Integer(42)),
                tok(Token::Integer(-123)),
                tok(Token::Integer(17)),
                tok(spelled(3.14, "3.14")),
                tok(spelled(-0.002, "-.002")),
                tok(spelled(5.0, "5.")),
                tok(Token::Integer(0)),
            ]
        );
    }

    fn spelled(value: f64, text: &str) -> Token {
        Token::SourceReal {
            value,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_reals_keep_their_spelling() {
        assert_eq!(all_tokens(b"0.00048828125"), vec![tok(spelled(0.00048828125, "0.00048828125"))]);
        assert_eq!(
            all_tokens(b"99999999999999999999"),
            vec![tok(spelled(1e20, "99999999999999999999"))]
        );
    }

    #[test]
    fn test_doubled_delimiters() {
        let lexemes = all_tokens(b"<</Type/Catalog>>");
        assert_eq!(
            lexemes,
            vec![
                tok(Token::DictOpen),
                tok(Token::name("Type")),
                tok(Token::name("Catalog")),
                tok(Token::DictClose),
            ]
        );
    }

    #[test]
    fn test_literal_string_nested_and_escaped() {
        let lexemes = all_tokens(b"(a (b) \\) c) /N");
        assert_eq!(
            lexemes,
            vec![tok(Token::LiteralString(b"a (b) \\) c".to_vec())), tok(Token::name("N"))]
        );
    }

    #[test]
    fn test_literal_string_with_structural_characters() {
        // Delimiters inside a string must not split it
        let lexemes = all_tokens(b"(<< /Fake [ endobj >>)");
        assert_eq!(lexemes, vec![tok(Token::LiteralString(b"<< /Fake [ endobj >>".to_vec()))]);
    }

    #[test]
    fn test_unterminated_literal_string() {
        let mut lexer = Lexer::new(b"(open");
        assert!(matches!(lexer.next_lexeme(), Err(Error::ParseError { .. })));
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(all_tokens(b"<48 65>"), vec![tok(Token::HexString(b"48 65".to_vec()))]);
        assert_eq!(decode_hex(b"48 65 6C6C 6F"), b"Hello");
        assert_eq!(decode_hex(b"901FA"), vec![0x90, 0x1F, 0xA0]);
    }

    #[test]
    fn test_names() {
        assert_eq!(all_tokens(b"/A#20B"), vec![tok(Token::name("A B"))]);
        assert_eq!(all_tokens(b"/A;B_c-d"), vec![tok(Token::name("A;B_c-d"))]);
        assert_eq!(all_tokens(b"/#82l#83S"), vec![tok(Token::RawName(vec![0x82, b'l', 0x83, b'S']))]);
        assert_eq!(all_tokens(b"/#C3#A9"), vec![tok(Token::name("\u{e9}"))]);
        assert_eq!(decode_name_escapes(b"A#ZZ"), b"A#ZZ");
        assert_eq!(decode_name_escapes(b"A#2"), b"A#2");
    }

    #[test]
    fn test_terminators() {
        let lexemes = all_tokens(b"endobj stream startxref endstream");
        assert_eq!(
            lexemes,
            vec![
                Lexeme::Terminator(Terminator::EndObj),
                Lexeme::Terminator(Terminator::Stream),
                Lexeme::Terminator(Terminator::StartXref),
                tok(Token::Keyword("endstream".to_string())),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        let lexemes = all_tokens(b"% header\n1 % trailing\n2");
        assert_eq!(lexemes, vec![tok(Token::Integer(1)), tok(Token::Integer(2))]);
    }

    #[test]
    fn test_read_body_folds_references() {
        let mut lexer = Lexer::new(b"<< /Pages 2 0 R /Kids [3 0 R 4 0 R] /Count 2 >> endobj");
        let (tokens, term) = lexer.read_body().unwrap();
        assert_eq!(term, Some(Terminator::EndObj));
        assert_eq!(tokens[2], Token::reference(2));
        assert_eq!(tokens[5], Token::reference(3));
        assert_eq!(tokens[6], Token::reference(4));
        assert_eq!(tokens[9], Token::Integer(2));
    }

    #[test]
    fn test_read_value() {
        let mut lexer = Lexer::new(b"<< /A [1 2] >> 99");
        let value = lexer.read_value().unwrap();
        assert_eq!(value.len(), 6);
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(99));
    }

    #[test]
    fn test_stream_payload_skips_one_newline() {
        let data = b"stream\r\n\nabc\nendstream";
        let mut lexer = Lexer::new(data);
        assert_eq!(lexer.next_lexeme().unwrap(), Some(Lexeme::Terminator(Terminator::Stream)));
        // Only the first CRLF is skipped; the second newline is payload
        assert_eq!(lexer.read_stream_payload(4).unwrap(), b"\nabc");
    }

    #[test]
    fn test_stream_payload_truncated() {
        let mut lexer = Lexer::new(b"stream\nabc");
        lexer.next_lexeme().unwrap();
        assert!(matches!(
            lexer.read_stream_payload(50),
            Err(Error::TruncatedStream {
                declared: 50,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_stream_until_endstream() {
        let mut lexer = Lexer::new(b"stream\nBT ET\nendstream");
        lexer.next_lexeme().unwrap();
        assert_eq!(lexer.read_stream_until_end().unwrap(), b"BT ET");
    }

    #[test]
    fn test_literal_escapes() {
        assert_eq!(decode_literal_string_escapes(b"a\\nb"), b"a\nb");
        assert_eq!(decode_literal_string_escapes(b"\\(x\\)"), b"(x)");
        assert_eq!(decode_literal_string_escapes(b"\\101\\60"), b"A0");
        assert_eq!(decode_literal_string_escapes(b"line\\\ncont"), b"linecont");
    }
}
