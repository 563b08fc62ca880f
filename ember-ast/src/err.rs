use std::num::ParseIntError;

use crate::lex::{LineInfo, Tok};

#[derive(thiserror::Error, Debug, Default, Clone, PartialEq)]
pub enum LexError {
    #[default]
    #[error("Illegal Character encountered")]
    IllegalCharacter,
    #[error("Error Parsing Invalid Number: {0}")]
    InvalidNumber(String),
    #[error("Invalid character literal: {0}")]
    InvalidChar(String),
    #[error("Invalid escape sequence in string literal: \\{0}")]
    InvalidEscape(char),
    #[error("LEX_ERR => {err} at {info}")]
    At { err: Box<LexError>, info: LineInfo },
}

impl LexError {
    pub fn at(self, info: LineInfo) -> Self {
        Self::At {
            err: Box::new(self),
            info,
        }
    }
}

impl From<std::num::ParseFloatError> for LexError {
    fn from(err: std::num::ParseFloatError) -> Self {
        LexError::InvalidNumber(err.to_string())
    }
}

impl From<ParseIntError> for LexError {
    fn from(err: ParseIntError) -> Self {
        use std::num::IntErrorKind::*;
        match err.kind() {
            PosOverflow | NegOverflow => LexError::InvalidNumber("overflow error".to_owned()),
            _ => LexError::InvalidNumber(err.to_string()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum ParseError {
    #[error("PARSE_ERR => Unexpected Token!! {0}")]
    UnexpectedToken(Tok),

    #[error("PARSE_ERR => Unmatched closing delimiter {0}")]
    UnmatchedClose(Tok),

    #[error("PARSE_ERR => Unterminated {kind} opened at {info}")]
    Unterminated { kind: &'static str, info: LineInfo },

    #[error("PARSE_ERR => '.' must be followed by exactly one form before ')'. At {0}")]
    MisplacedDot(LineInfo),

    #[error("End of File")]
    Eof,
}
