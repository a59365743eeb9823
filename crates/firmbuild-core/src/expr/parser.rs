//! Recursive-descent parser for `if` statements
//!
//! ```text
//! expr       := group ( (and|or) group )?
//! group      := '(' expr ')' | bool_stmt
//! bool_stmt  := operand CMP operand
//! operand    := CAP_WORD | INTEGER | STRING | LIST
//! LIST       := '[' (INTEGER|STRING) (',' (INTEGER|STRING))* ']'
//! ```
//!
//! A single level holds at most one combinator: `A and B or C` is rejected
//! and must be written as `(A and B) or C`.

use crate::error::ParseError;

use super::ast::Expr;
use super::lexer::{tokenize, Token, TokenKind};

/// Parse a statement into an expression tree
pub fn parse(stmt: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(stmt)?;
    if tokens.is_empty() {
        return Err(ParseError::new(stmt, "empty statement"));
    }

    let mut parser = Parser {
        stmt,
        tokens,
        pos: 0,
    };

    let expr = parser.parse_expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error_at(token, format!("unexpected '{}'", token.kind)));
    }
    Ok(expr)
}

struct Parser<'a> {
    stmt: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: impl std::fmt::Display) -> ParseError {
        ParseError::new(self.stmt, format!("{} at offset {}", message, token.offset))
    }

    fn error_eof(&self, expected: &str) -> ParseError {
        ParseError::new(self.stmt, format!("expected {}, found end of statement", expected))
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_group()?;

        let op = match self.peek() {
            Some(Token {
                kind: TokenKind::Bool(op),
                ..
            }) => *op,
            _ => return Ok(left),
        };
        self.advance();

        let right = self.parse_group()?;

        if let Some(token) = self.peek() {
            if matches!(token.kind, TokenKind::Bool(_)) {
                return Err(self.error_at(
                    token,
                    "more than one 'and'/'or' without parentheses",
                ));
            }
        }

        Ok(Expr::BoolCombine {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_group(&mut self) -> Result<Expr, ParseError> {
        if let Some(Token {
            kind: TokenKind::LParen,
            ..
        }) = self.peek()
        {
            self.advance();
            let inner = self.parse_expr()?;
            return match self.advance() {
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => Ok(inner),
                Some(token) => Err(self.error_at(&token, format!("expected ')', found '{}'", token.kind))),
                None => Err(self.error_eof("')'")),
            };
        }

        self.parse_bool_stmt()
    }

    fn parse_bool_stmt(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;

        let op = match self.advance() {
            Some(Token {
                kind: TokenKind::Cmp(op),
                ..
            }) => op,
            Some(token) => {
                return Err(self.error_at(
                    &token,
                    format!("expected comparison operator, found '{}'", token.kind),
                ))
            }
            None => return Err(self.error_eof("comparison operator")),
        };

        let right = self.parse_operand()?;

        Ok(Expr::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::CapWord(name),
                ..
            }) => Ok(Expr::ChipAttr(name)),
            Some(Token {
                kind: TokenKind::LBracket,
                ..
            }) => self.parse_list(),
            Some(token) => self.literal(token),
            None => Err(self.error_eof("operand")),
        }
    }

    fn literal(&self, token: Token) -> Result<Expr, ParseError> {
        match token.kind {
            TokenKind::Int(i) => Ok(Expr::Int(i)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            other => Err(ParseError::new(
                self.stmt,
                format!("expected operand, found '{}' at offset {}", other, token.offset),
            )),
        }
    }

    fn parse_list(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            let Some(token) = self.advance() else {
                return Err(self.error_eof("list item"));
            };
            items.push(self.literal(token)?);

            match self.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(Token {
                    kind: TokenKind::RBracket,
                    ..
                }) => return Ok(Expr::List(items)),
                Some(token) => {
                    return Err(self.error_at(&token, format!("expected ',' or ']', found '{}'", token.kind)))
                }
                None => return Err(self.error_eof("']'")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::{BoolOp, CmpOp};

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse(r#"IDF_TARGET == "esp32""#).unwrap();
        assert_eq!(
            expr,
            Expr::Comparison {
                left: Box::new(Expr::ChipAttr("IDF_TARGET".to_string())),
                op: CmpOp::Eq,
                right: Box::new(Expr::Str("esp32".to_string())),
            }
        );
    }

    #[test]
    fn test_parse_single_combinator() {
        let expr = parse(r#"IDF_TARGET == "esp32" or IDF_TARGET == "esp32c3""#).unwrap();
        assert!(matches!(expr, Expr::BoolCombine { op: BoolOp::Or, .. }));
    }

    #[test]
    fn test_chained_combinators_rejected() {
        assert!(parse("A == 1 and B == 2 and C == 3").is_err());
        assert!(parse("A == 1 and B == 2 or C == 3").is_err());
        assert!(parse("A == 1 or B == 2 or C == 3 or D == 4").is_err());
    }

    #[test]
    fn test_parenthesised_chains_accepted() {
        assert!(parse("(A == 1 and B == 2) and C == 3").is_ok());
        assert!(parse("A == 1 or (B == 2 and C == 3)").is_ok());
        assert!(parse("((A == 1 and B == 2) or C == 3) and D == 4").is_ok());
        assert!(parse("(A == 1)").is_ok());
    }

    #[test]
    fn test_parse_list_operand() {
        let expr = parse(r#"IDF_TARGET in ["esp32", "esp32s2"]"#).unwrap();
        match expr {
            Expr::Comparison { right, op, .. } => {
                assert_eq!(op, CmpOp::In);
                assert_eq!(
                    *right,
                    Expr::List(vec![
                        Expr::Str("esp32".to_string()),
                        Expr::Str("esp32s2".to_string())
                    ])
                );
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("IDF_TARGET").is_err());
        assert!(parse("IDF_TARGET ==").is_err());
        assert!(parse(r#"IDF_TARGET == "esp32" extra"#).is_err());
        assert!(parse("(A == 1").is_err());
        assert!(parse("A in [1, 2").is_err());
        assert!(parse("A in [B, 2]").is_err());
        assert!(parse("A == 1 and").is_err());
    }

    #[test]
    fn test_error_echoes_statement() {
        let err = parse("A == 1 and B == 2 and C == 3").unwrap_err();
        assert_eq!(err.stmt, "A == 1 and B == 2 and C == 3");
        assert!(err.to_string().contains("A == 1 and B == 2 and C == 3"));
    }
}
