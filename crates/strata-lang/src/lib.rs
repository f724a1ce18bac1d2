//! Filter-expression language for selecting versions out of the metadata
//! store: a boolean expression over `uid`, `volume`, `snapshot`, `status`,
//! `date`, and `labels["name"]`.
//!
//! ```text
//! status == "valid" and volume == "vm-17"
//! date > "1 month ago" and labels["tier"] == "gold"
//! not (status == "invalid" or status == "incomplete")
//! ```
//!
//! # Usage
//!
//! ```rust
//! use strata_lang::{parse, compile};
//!
//! let expr = parse(r#"status == "valid" and volume == "vm-17""#).unwrap();
//! let compiled = compile(&expr, 1_700_000_000).unwrap();
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use ast::{CompareOp, Field, FilterExpr, FilterStatement, Literal};
pub use compiler::{compile, CompiledFilter, CompiledValue};
pub use error::{CompileError, CompileErrorKind, LangError, ParseError};
pub use span::{Span, Spanned};

/// Parse a filter expression from source text.
pub fn parse(source: &str) -> Result<FilterExpr, ParseError> {
    parser::parse(source)
}

/// Parse and compile a filter expression in one step, resolving relative
/// time against `reference_time`.
pub fn parse_and_compile(source: &str, reference_time: i64) -> Result<CompiledFilter, LangError> {
    let expr = parse(source)?;
    let compiled = compiler::compile(&expr, reference_time)?;
    Ok(compiled)
}

/// Tokenize a source string (for debugging/testing).
pub fn tokenize(source: &str) -> Vec<lexer::SpannedToken> {
    lexer::tokenize(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_compile() {
        let result = parse_and_compile(r#"status == "valid""#, 0).unwrap();
        assert!(matches!(result, CompiledFilter::Compare { .. }));
    }

    #[test]
    fn test_error_with_source_context() {
        let source = r#"status = "valid""#;
        let result = parse(source);
        assert!(result.is_err());
        if let Err(e) = result {
            let formatted = e.format_with_source(source);
            assert!(formatted.contains("line 1"));
            assert!(formatted.contains("error"));
        }
    }

    #[test]
    fn test_complex_expression() {
        let source = r#"
            (status == "valid" or status == "incomplete")
            and volume == "vm-17"
            and labels["tier"] == "gold"
            and not (date < "1 year ago")
        "#;
        let result = parse_and_compile(source, 1_700_000_000).unwrap();
        assert!(matches!(result, CompiledFilter::And(_)));
    }

    #[test]
    fn test_all_comparison_operators() {
        for op in ["==", "!=", "<", "<=", ">", ">="] {
            let source = format!(r#"volume {op} "vm-1""#);
            let result = parse_and_compile(&source, 0);
            assert!(result.is_ok(), "failed to parse operator {op}: {result:?}");
        }
    }
}
