use std::fmt::Display;

use logos::{Lexer, Logos, Skip};

use crate::err::LexError;

#[derive(Debug, Clone)]
pub struct TokBuffer(Box<[Tok]>);

impl TokBuffer {
    pub fn read_file(path: &str) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::read_string(&s)
    }

    pub fn read_string(src: &str) -> anyhow::Result<Self> {
        let mut lex = LexTok::lexer(src);
        let mut buf = Vec::with_capacity(32);
        while let Some(t) = lex.next() {
            let col = lex.span().start.saturating_sub(lex.extras.line_start);
            let info = LineInfo {
                line: lex.extras.line + 1,
                col: col + 1,
            };
            let t = t.map_err(|e| e.at(info))?;
            let tok = Tok::from_tok(t, lex.slice(), info).map_err(|e| e.at(info))?;
            buf.push(tok);
        }
        buf.push(Tok::eof());
        log::trace!("lexed {} tokens", buf.len());
        Ok(Self(buf.into_boxed_slice()))
    }

    #[inline]
    pub fn slice(&self) -> &[Tok] {
        self.0.as_ref()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    pub line: usize,
    pub col: usize,
}

impl Display for LineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let line = self.line;
        let col = self.col;
        write!(f, "(L:{line},C:{col})")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tok {
    pub ty: TokType,
    pub lexeme: String,
    pub info: LineInfo,
}

impl Tok {
    pub const EOF_STR: &'static str = "__EOF__";

    pub fn eof() -> Self {
        Self {
            ty: TokType::Eof,
            lexeme: Self::EOF_STR.into(),
            info: LineInfo {
                line: usize::MAX,
                col: usize::MAX,
            },
        }
    }

    fn from_tok(tok: LexTok, lexeme: &str, info: LineInfo) -> Result<Self, LexError> {
        let ty = match tok {
            // skipped by newline_cb, never yielded
            LexTok::NewLine => return Err(LexError::IllegalCharacter),
            LexTok::OpenParen => TokType::OpenParen,
            LexTok::CloseParen => TokType::CloseParen,
            LexTok::BracketOpen => TokType::BracketOpen,
            LexTok::BracketClose => TokType::BracketClose,
            LexTok::BraceOpen => TokType::BraceOpen,
            LexTok::BraceClose => TokType::BraceClose,
            LexTok::Quote => TokType::Quote,
            LexTok::Str => TokType::Str(unescape(&lexeme[1..lexeme.len() - 1])?),
            LexTok::Atom => classify_atom(lexeme)?,
        };
        Ok(Self {
            ty,
            lexeme: lexeme.to_owned(),
            info,
        })
    }

    #[inline]
    pub const fn is_eof(&self) -> bool {
        matches!(self.ty, TokType::Eof)
    }
}

impl Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lexeme = &self.lexeme;
        let info = self.info;
        write!(f, "Token [ {lexeme}, Lineno => {info} ]")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokType {
    OpenParen,
    CloseParen,
    BracketOpen,
    BracketClose,
    BraceOpen,
    BraceClose,
    Quote,
    Dot,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Symbol(String),
    Eof,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct LexState {
    pub line: usize,
    pub line_start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Logos)]
#[logos(skip r"([ \t\r\f]+|;[^\n]*)")]
#[logos(extras = LexState)]
#[logos(error = LexError)]
pub enum LexTok {
    #[regex(r"\n", newline_cb)]
    NewLine,

    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,

    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,

    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,

    #[token("'")]
    Quote,

    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,

    /// Numbers, characters, booleans, the dot and symbols. Sorted out by [classify_atom].
    #[regex(r#"[^ \t\r\n\f()\[\]{}'";]+"#)]
    Atom,
}

fn newline_cb(lex: &mut Lexer<LexTok>) -> Skip {
    lex.extras.line += 1;
    lex.extras.line_start = lex.span().end;

    Skip
}

fn classify_atom(atom: &str) -> Result<TokType, LexError> {
    match atom {
        "." => return Ok(TokType::Dot),
        "true" => return Ok(TokType::Bool(true)),
        "false" => return Ok(TokType::Bool(false)),
        _ => {}
    }

    if let Some(name) = atom.strip_prefix('#') {
        return char_literal(name).map(TokType::Char);
    }

    if looks_numeric(atom) {
        return number_literal(atom);
    }

    Ok(TokType::Symbol(atom.to_owned()))
}

/// A numeric literal starts with a digit, or a sign / '.' directly followed by one.
/// Keeps `-`, `+`, `inf` and `nan` as symbols.
fn looks_numeric(atom: &str) -> bool {
    let body = atom
        .strip_prefix('-')
        .or_else(|| atom.strip_prefix('+'))
        .unwrap_or(atom);
    let body = body.strip_prefix('.').unwrap_or(body);
    body.starts_with(|c: char| c.is_ascii_digit())
}

fn number_literal(atom: &str) -> Result<TokType, LexError> {
    let (neg, digits) = match atom.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, atom.strip_prefix('+').unwrap_or(atom)),
    };

    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let n = i64::from_str_radix(hex, 16)?;
        return Ok(TokType::Int(if neg { n.wrapping_neg() } else { n }));
    }

    if digits.contains(['.', 'e', 'E']) {
        let n: f64 = atom.parse()?;
        Ok(TokType::Float(n))
    } else {
        let n: i64 = atom.parse()?;
        Ok(TokType::Int(n))
    }
}

fn char_literal(name: &str) -> Result<char, LexError> {
    let c = match name {
        "newline" => '\n',
        "space" => ' ',
        "tab" => '\t',
        "return" => '\r',
        "nul" => '\0',
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => return Err(LexError::InvalidChar(format!("#{name}"))),
            }
        }
    };
    Ok(c)
}

fn unescape(body: &str) -> Result<String, LexError> {
    let mut s = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            s.push(c);
            continue;
        }
        let esc = match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some(other) => return Err(LexError::InvalidEscape(other)),
            None => return Err(LexError::InvalidEscape(' ')),
        };
        s.push(esc);
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(src: &str) -> anyhow::Result<Vec<TokType>> {
        let buf = TokBuffer::read_string(src)?;
        Ok(buf.slice().iter().map(|t| t.ty.clone()).collect())
    }

    #[test]
    fn lexes_atoms() -> anyhow::Result<()> {
        let toks = types("(+ -5 2.5 0x1f #a #space \"hi\\n\" true sym? . -)")?;
        assert_eq!(
            toks,
            vec![
                TokType::OpenParen,
                TokType::Symbol("+".into()),
                TokType::Int(-5),
                TokType::Float(2.5),
                TokType::Int(31),
                TokType::Char('a'),
                TokType::Char(' '),
                TokType::Str("hi\n".into()),
                TokType::Bool(true),
                TokType::Symbol("sym?".into()),
                TokType::Dot,
                TokType::Symbol("-".into()),
                TokType::CloseParen,
                TokType::Eof,
            ]
        );
        Ok(())
    }

    #[test]
    fn tracks_lines_and_skips_comments() -> anyhow::Result<()> {
        let buf = TokBuffer::read_string("; header\n  (a\n b)")?;
        let toks = buf.slice();
        assert_eq!(toks[0].info, LineInfo { line: 2, col: 3 });
        assert_eq!(toks[2].info, LineInfo { line: 3, col: 2 });
        Ok(())
    }

    #[test]
    fn bad_number_is_an_error() {
        assert!(TokBuffer::read_string("12abc").is_err());
        assert!(TokBuffer::read_string("#ab").is_err());
        assert!(TokBuffer::read_string("\"open").is_err());
    }
}
