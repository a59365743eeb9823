//! Tokenizer for `if` statements

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::ParseError;

use super::ast::{BoolOp, CmpOp};

/// A lexical token with its byte offset in the statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Uppercase-leading identifier, e.g. `IDF_TARGET`
    CapWord(String),
    Int(i64),
    Str(String),
    Cmp(CmpOp),
    Bool(BoolOp),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapWord(w) => write!(f, "{}", w),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Cmp(op) => write!(f, "{}", op),
            Self::Bool(op) => write!(f, "{}", op),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::LBracket => write!(f, "["),
            Self::RBracket => write!(f, "]"),
            Self::Comma => write!(f, ","),
        }
    }
}

struct Lexer<'a> {
    stmt: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

/// Split a statement into tokens
pub fn tokenize(stmt: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        stmt,
        chars: stmt.char_indices().peekable(),
    };

    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    fn error(&self, offset: usize, message: impl std::fmt::Display) -> ParseError {
        ParseError::new(self.stmt, format!("{} at offset {}", message, offset))
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_whitespace();

        let Some(&(offset, c)) = self.chars.peek() else {
            return Ok(None);
        };

        let kind = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ',' => self.single(TokenKind::Comma),
            '"' => self.scan_string(offset)?,
            '=' | '!' | '<' | '>' => self.scan_operator(offset)?,
            '-' | '0'..='9' => self.scan_integer(offset)?,
            'A'..='Z' => self.scan_cap_word(offset)?,
            'a'..='z' => self.scan_keyword(offset)?,
            other => return Err(self.error(offset, format!("unexpected character '{}'", other))),
        };

        Ok(Some(Token { kind, offset }))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.chars.next();
        kind
    }

    fn scan_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        word
    }

    /// `[A-Z][A-Z0-9_]*`
    fn scan_cap_word(&mut self, offset: usize) -> Result<TokenKind, ParseError> {
        let word = self.scan_word();
        if word.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(self.error(offset, format!("invalid attribute name '{}'", word)));
        }
        Ok(TokenKind::CapWord(word))
    }

    fn scan_keyword(&mut self, offset: usize) -> Result<TokenKind, ParseError> {
        let word = self.scan_word();
        match word.as_str() {
            "and" => Ok(TokenKind::Bool(BoolOp::And)),
            "or" => Ok(TokenKind::Bool(BoolOp::Or)),
            "in" => Ok(TokenKind::Cmp(CmpOp::In)),
            "not" => {
                self.skip_whitespace();
                let next_offset = self.chars.peek().map(|(o, _)| *o).unwrap_or(self.stmt.len());
                if self.scan_word() == "in" {
                    Ok(TokenKind::Cmp(CmpOp::NotIn))
                } else {
                    Err(self.error(next_offset, "expected 'in' after 'not'"))
                }
            }
            _ => Err(self.error(offset, format!("unknown keyword '{}'", word))),
        }
    }

    fn scan_operator(&mut self, offset: usize) -> Result<TokenKind, ParseError> {
        let Some((_, first)) = self.chars.next() else {
            return Err(self.error(offset, "unexpected end of statement"));
        };
        let followed_by_eq = matches!(self.chars.peek(), Some((_, '=')));
        if followed_by_eq {
            self.chars.next();
        }

        let op = match (first, followed_by_eq) {
            ('=', true) => CmpOp::Eq,
            ('!', true) => CmpOp::Ne,
            ('<', true) => CmpOp::Le,
            ('<', false) => CmpOp::Lt,
            ('>', true) => CmpOp::Ge,
            ('>', false) => CmpOp::Gt,
            _ => return Err(self.error(offset, format!("invalid operator '{}'", first))),
        };
        Ok(TokenKind::Cmp(op))
    }

    fn scan_integer(&mut self, offset: usize) -> Result<TokenKind, ParseError> {
        let mut literal = String::new();
        if let Some(&(_, '-')) = self.chars.peek() {
            literal.push('-');
            self.chars.next();
        }
        literal.push_str(&self.scan_word());

        let (negative, digits) = match literal.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, literal.as_str()),
        };

        let parsed = if let Some(hex) = digits.strip_prefix("0x") {
            i64::from_str_radix(hex, 16)
        } else {
            digits.parse::<i64>()
        };

        match parsed {
            Ok(value) if negative => Ok(TokenKind::Int(-value)),
            Ok(value) => Ok(TokenKind::Int(value)),
            Err(_) => Err(self.error(offset, format!("invalid integer literal '{}'", literal))),
        }
    }

    fn scan_string(&mut self, offset: usize) -> Result<TokenKind, ParseError> {
        // opening quote
        self.chars.next();

        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(TokenKind::Str(value)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c)) => value.push(c),
                    None => break,
                },
                Some((_, c)) => value.push(c),
                None => break,
            }
        }

        Err(self.error(offset, "unterminated string"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(stmt: &str) -> Vec<TokenKind> {
        tokenize(stmt).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds(r#"IDF_TARGET == "esp32""#),
            vec![
                TokenKind::CapWord("IDF_TARGET".to_string()),
                TokenKind::Cmp(CmpOp::Eq),
                TokenKind::Str("esp32".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_not_in_and_list() {
        assert_eq!(
            kinds(r#"IDF_TARGET not in ["esp32", 0x10]"#),
            vec![
                TokenKind::CapWord("IDF_TARGET".to_string()),
                TokenKind::Cmp(CmpOp::NotIn),
                TokenKind::LBracket,
                TokenKind::Str("esp32".to_string()),
                TokenKind::Comma,
                TokenKind::Int(16),
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators_without_spaces() {
        assert_eq!(
            kinds("SOC_X>=-2"),
            vec![
                TokenKind::CapWord("SOC_X".to_string()),
                TokenKind::Cmp(CmpOp::Ge),
                TokenKind::Int(-2),
            ]
        );
    }

    #[test]
    fn test_attribute_names_are_uppercase() {
        assert!(tokenize("IDF_Target == 1").is_err());
        assert!(tokenize("SOC_UART_NUM2 == 1").is_ok());
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize(r#"IDF_TARGET == "esp32"#).unwrap_err();
        assert!(err.message.contains("unterminated string"));
        assert_eq!(err.stmt, r#"IDF_TARGET == "esp32"#);
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(tokenize("IDF_TARGET = 1").is_err());
        assert!(tokenize("idf_target == 1").is_err());
        assert!(tokenize("A not B").is_err());
        assert!(tokenize("A == 0xZZ").is_err());
        assert!(tokenize("A == 1 & B == 2").is_err());
    }
}
