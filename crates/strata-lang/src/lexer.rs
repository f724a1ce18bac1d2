//! Lexer for the version-filter expression language.

use logos::Logos;

/// A lexical token of the filter-expression language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape_string(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape_string(lex.slice()))]
    String(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn unescape_string(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some(other) => result.push(other),
                None => {}
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// A token paired with its byte-offset span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: crate::span::Span,
}

/// Iterator-style lexer with one-token lookahead.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    source: &'source str,
    peeked: Option<Option<SpannedToken>>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            source,
            peeked: None,
        }
    }

    pub fn source(&self) -> &'source str {
        self.source
    }

    fn next_inner(&mut self) -> Option<SpannedToken> {
        loop {
            match self.inner.next()? {
                Ok(token) => {
                    let span = self.inner.span();
                    return Some(SpannedToken {
                        token,
                        span: span.into(),
                    });
                }
                // Skip tokens the lexer couldn't classify rather than
                // silently truncating input; the parser will hit EOF and
                // report a clear "unexpected end of input" instead.
                Err(()) => continue,
            }
        }
    }

    pub fn peek(&mut self) -> Option<&SpannedToken> {
        if self.peeked.is_none() {
            self.peeked = Some(self.next_inner());
        }
        self.peeked.as_ref().unwrap().as_ref()
    }

    pub fn next_token(&mut self) -> Option<SpannedToken> {
        if let Some(peeked) = self.peeked.take() {
            return peeked;
        }
        self.next_inner()
    }

    pub fn span(&self) -> crate::span::Span {
        self.inner.span().into()
    }
}

impl Iterator for Lexer<'_> {
    type Item = SpannedToken;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_comparison() {
        let tokens = tokenize(r#"status == "active""#);
        assert_eq!(
            tokens.iter().map(|t| &t.token).collect::<Vec<_>>(),
            vec![
                &Token::Ident("status".into()),
                &Token::Eq,
                &Token::String("active".into()),
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("a == b != c < d <= e > f >= g");
        let ops: Vec<_> = tokens
            .iter()
            .filter(|t| !matches!(t.token, Token::Ident(_)))
            .map(|t| t.token.clone())
            .collect();
        assert_eq!(
            ops,
            vec![Token::Eq, Token::Ne, Token::Lt, Token::Le, Token::Gt, Token::Ge]
        );
    }

    #[test]
    fn test_negative_int() {
        let tokens = tokenize("age >= -5");
        assert_eq!(tokens[2].token, Token::Int(-5));
    }

    #[test]
    fn test_labels_accessor() {
        let tokens = tokenize(r#"labels["env"] == "prod""#);
        assert_eq!(
            tokens.iter().map(|t| &t.token).collect::<Vec<_>>(),
            vec![
                &Token::Ident("labels".into()),
                &Token::LBracket,
                &Token::String("env".into()),
                &Token::RBracket,
                &Token::Eq,
                &Token::String("prod".into()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""line\nbreak""#);
        assert_eq!(tokens[0].token, Token::String("line\nbreak".into()));
    }

    #[test]
    fn test_logical_operators_and_parens() {
        let tokens = tokenize(r#"(status == "valid" and not protected) or volume == "vol1""#);
        assert!(tokens.iter().any(|t| t.token == Token::And));
        assert!(tokens.iter().any(|t| t.token == Token::Or));
        assert!(tokens.iter().any(|t| t.token == Token::Not));
        assert!(tokens.iter().any(|t| t.token == Token::LParen));
        assert!(tokens.iter().any(|t| t.token == Token::RParen));
    }

    #[test]
    fn test_relative_time_literal() {
        let tokens = tokenize(r#"date < "1 month ago""#);
        assert_eq!(tokens[2].token, Token::String("1 month ago".into()));
    }

    #[test]
    fn test_lexer_peek() {
        let mut lexer = Lexer::new("a == b");
        let peeked = lexer.peek().cloned();
        let next = lexer.next_token();
        assert_eq!(peeked, next);
    }
}
