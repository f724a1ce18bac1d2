//! Recursive-descent parser for the version-filter expression language.
//!
//! Grammar (roughly):
//!
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := unary_expr ("and" unary_expr)*
//! unary_expr := "not" unary_expr | primary_expr
//! primary_expr := "(" expr ")" | comparison
//! comparison := field compare_op literal
//! field      := ident | "labels" "[" string "]"
//! ```

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Lexer, SpannedToken, Token};
use crate::span::{Span, Spanned};

pub struct Parser<'source> {
    lexer: Lexer<'source>,
    source: &'source str,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            lexer: Lexer::new(source),
            source,
        }
    }

    pub fn parse_expr(&mut self) -> Result<FilterExpr, ParseError> {
        let expr = self.parse_or()?;
        if let Some(tok) = self.lexer.peek() {
            return Err(ParseError::new(
                format!("unexpected trailing token {:?}", tok.token),
                tok.span,
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<FilterExpr, ParseError> {
        let mut exprs = vec![self.parse_and()?];
        while let Some(tok) = self.lexer.peek() {
            if tok.token != Token::Or {
                break;
            }
            self.next_token()?;
            exprs.push(self.parse_and()?);
        }
        Ok(FilterExpr::or(exprs))
    }

    fn parse_and(&mut self) -> Result<FilterExpr, ParseError> {
        let mut exprs = vec![self.parse_unary()?];
        while let Some(tok) = self.lexer.peek() {
            if tok.token != Token::And {
                break;
            }
            self.next_token()?;
            exprs.push(self.parse_unary()?);
        }
        Ok(FilterExpr::and(exprs))
    }

    fn parse_unary(&mut self) -> Result<FilterExpr, ParseError> {
        if let Some(tok) = self.lexer.peek() {
            if tok.token == Token::Not {
                self.next_token()?;
                return Ok(FilterExpr::Not(Box::new(self.parse_unary()?)));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<FilterExpr, ParseError> {
        if let Some(tok) = self.lexer.peek() {
            if tok.token == Token::LParen {
                self.next_token()?;
                let expr = self.parse_or()?;
                self.expect_token(Token::RParen)?;
                return Ok(expr);
            }
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<FilterExpr, ParseError> {
        let field = self.parse_field()?;

        let op_tok = self.next_token()?;
        let op = match op_tok.token {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            _ => {
                return Err(ParseError::new(
                    format!("expected a comparison operator, found {:?}", op_tok.token),
                    op_tok.span,
                ))
            }
        };

        let value = self.parse_literal()?;

        Ok(FilterExpr::Compare { field, op, value })
    }

    fn parse_field(&mut self) -> Result<Spanned<Field>, ParseError> {
        let tok = self.next_token()?;
        let name = match tok.token {
            Token::Ident(name) => name,
            _ => {
                return Err(ParseError::new(
                    format!("expected a field name, found {:?}", tok.token),
                    tok.span,
                ))
            }
        };

        if name == "labels" {
            self.expect_token(Token::LBracket)?;
            let key_tok = self.next_token()?;
            let key = match key_tok.token {
                Token::String(s) => s,
                _ => {
                    return Err(ParseError::new(
                        "expected a quoted label name inside labels[...]",
                        key_tok.span,
                    ))
                }
            };
            let close = self.expect_token(Token::RBracket)?;
            return Ok(Spanned::new(Field::Label(key), tok.span.merge(close.span)));
        }

        match Field::from_ident(&name) {
            Some(field) => Ok(Spanned::new(field, tok.span)),
            None => Err(ParseError::new(
                format!(
                    "unknown field '{name}', expected one of uid, volume, snapshot, status, date, labels[...]"
                ),
                tok.span,
            )),
        }
    }

    fn parse_literal(&mut self) -> Result<Spanned<Literal>, ParseError> {
        let tok = self.next_token()?;
        let literal = match tok.token {
            Token::String(s) => Literal::String(s),
            Token::Int(i) => Literal::Int(i),
            _ => {
                return Err(ParseError::new(
                    format!("expected a string or integer literal, found {:?}", tok.token),
                    tok.span,
                ))
            }
        };
        Ok(Spanned::new(literal, tok.span))
    }

    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {:?}, found {:?}", expected, tok.token),
                tok.span,
            ))
        }
    }

    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        self.lexer.next_token().ok_or_else(|| {
            ParseError::new(
                "unexpected end of input",
                Span::new(self.source.len(), self.source.len()),
            )
        })
    }
}

/// Parse a filter expression from source text.
pub fn parse(source: &str) -> Result<FilterExpr, ParseError> {
    Parser::new(source).parse_expr()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse(r#"status == "valid""#).unwrap();
        assert!(matches!(expr, FilterExpr::Compare { .. }));
    }

    #[test]
    fn test_parse_and() {
        let expr = parse(r#"status == "valid" and volume == "vol1""#).unwrap();
        match expr {
            FilterExpr::And(exprs) => assert_eq!(exprs.len(), 2),
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn test_parse_or_precedence_below_and() {
        // "a and b or c" parses as "(a and b) or c"
        let expr = parse(r#"uid == "V1" and status == "valid" or volume == "v2""#).unwrap();
        match expr {
            FilterExpr::Or(exprs) => {
                assert_eq!(exprs.len(), 2);
                assert!(matches!(exprs[0], FilterExpr::And(_)));
            }
            _ => panic!("expected Or at top level"),
        }
    }

    #[test]
    fn test_parse_not() {
        let expr = parse(r#"not status == "invalid""#).unwrap();
        assert!(matches!(expr, FilterExpr::Not(_)));
    }

    #[test]
    fn test_parse_parens() {
        let expr = parse(r#"(status == "valid" or status == "incomplete") and volume == "v1""#)
            .unwrap();
        match expr {
            FilterExpr::And(exprs) => {
                assert!(matches!(exprs[0], FilterExpr::Or(_)));
            }
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn test_parse_label_accessor() {
        let expr = parse(r#"labels["env"] == "prod""#).unwrap();
        match expr {
            FilterExpr::Compare { field, .. } => {
                assert_eq!(field.value, Field::Label("env".to_string()));
            }
            _ => panic!("expected Compare"),
        }
    }

    #[test]
    fn test_parse_relative_time() {
        let expr = parse(r#"date > "1 month ago""#).unwrap();
        match expr {
            FilterExpr::Compare { field, value, .. } => {
                assert_eq!(field.value, Field::Date);
                assert_eq!(value.value, Literal::String("1 month ago".to_string()));
            }
            _ => panic!("expected Compare"),
        }
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let err = parse(r#"bogus == "x""#).unwrap_err();
        assert!(err.message.contains("unknown field"));
    }

    #[test]
    fn test_trailing_garbage_is_an_error() {
        assert!(parse(r#"status == "valid" status == "valid""#).is_err());
    }
}
