//! Compiler from the filter-expression AST to a typed, store-ready
//! predicate tree. Field names are already validated during parsing; this
//! stage resolves literal types per field and turns relative-time phrases
//! into absolute Unix timestamps, so the metadata store never evaluates
//! anything but plain value comparisons.

use crate::ast::{CompareOp, Field, FilterExpr, Literal};
use crate::error::{CompileError, CompileErrorKind};
use crate::span::Span;
use chrono::{DateTime, Utc};

/// A resolved comparison value.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledValue {
    Str(String),
    Int(i64),
    /// Unix timestamp, seconds. Only ever compared against `Field::Date`.
    Timestamp(i64),
}

/// A filter expression with every field validated and every literal
/// resolved to the type its field expects.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledFilter {
    Compare {
        field: Field,
        op: CompareOp,
        value: CompiledValue,
    },
    Not(Box<CompiledFilter>),
    And(Vec<CompiledFilter>),
    Or(Vec<CompiledFilter>),
}

/// Compile a parsed filter expression against a fixed reference time (used
/// to resolve relative-time phrases like `"1 month ago"`).
pub fn compile(expr: &FilterExpr, reference_time: i64) -> Result<CompiledFilter, CompileError> {
    match expr {
        FilterExpr::Compare { field, op, value } => {
            let compiled_value = compile_value(&field.value, &value.value, value.span, reference_time)?;
            Ok(CompiledFilter::Compare {
                field: field.value.clone(),
                op: *op,
                value: compiled_value,
            })
        }
        FilterExpr::Not(inner) => Ok(CompiledFilter::Not(Box::new(compile(inner, reference_time)?))),
        FilterExpr::And(exprs) => Ok(CompiledFilter::And(
            exprs
                .iter()
                .map(|e| compile(e, reference_time))
                .collect::<Result<_, _>>()?,
        )),
        FilterExpr::Or(exprs) => Ok(CompiledFilter::Or(
            exprs
                .iter()
                .map(|e| compile(e, reference_time))
                .collect::<Result<_, _>>()?,
        )),
    }
}

fn compile_value(
    field: &Field,
    literal: &Literal,
    span: Span,
    reference_time: i64,
) -> Result<CompiledValue, CompileError> {
    match field {
        Field::Date => match literal {
            Literal::Int(ts) => Ok(CompiledValue::Timestamp(*ts)),
            Literal::String(s) => resolve_date_literal(s, reference_time)
                .ok_or_else(|| CompileError::invalid_literal(
                    format!("'{s}' is neither an RFC 3339 date nor a relative-time phrase like '1 month ago'"),
                    span,
                )),
        },
        Field::Uid | Field::Volume | Field::Snapshot | Field::Status | Field::Label(_) => match literal {
            Literal::String(s) => Ok(CompiledValue::Str(s.clone())),
            Literal::Int(_) => Err(CompileError::type_mismatch("string", "int", span)),
        },
    }
}

/// Resolve a date field's string literal: either an RFC 3339 timestamp or a
/// relative-time phrase `"<N> <unit>[s] ago"` using the strictly linear
/// units also used by retention enforcement (hour=3600s, day=86400s,
/// week=604800s, month=2592000s, year=31536000s).
fn resolve_date_literal(s: &str, reference_time: i64) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).timestamp());
    }
    resolve_relative_time(s, reference_time)
}

fn resolve_relative_time(s: &str, reference_time: i64) -> Option<i64> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    if parts.len() != 3 || parts[2] != "ago" {
        return None;
    }
    let count: i64 = parts[0].parse().ok()?;
    let unit_seconds = match parts[1].trim_end_matches('s') {
        "hour" => 3600,
        "day" => 86400,
        "week" => 604_800,
        "month" => 2_592_000,
        "year" => 31_536_000,
        _ => return None,
    };
    Some(reference_time - count * unit_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const REF: i64 = 1_700_000_000;

    #[test]
    fn compiles_simple_string_comparison() {
        let expr = parse(r#"status == "valid""#).unwrap();
        let compiled = compile(&expr, REF).unwrap();
        match compiled {
            CompiledFilter::Compare { field, value, .. } => {
                assert_eq!(field, Field::Status);
                assert_eq!(value, CompiledValue::Str("valid".into()));
            }
            _ => panic!("expected Compare"),
        }
    }

    #[test]
    fn rejects_int_literal_for_string_field() {
        let expr = parse("status == 5").unwrap();
        let err = compile(&expr, REF).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::TypeMismatch);
    }

    #[test]
    fn resolves_relative_time() {
        let expr = parse(r#"date > "1 month ago""#).unwrap();
        let compiled = compile(&expr, REF).unwrap();
        match compiled {
            CompiledFilter::Compare {
                value: CompiledValue::Timestamp(ts),
                ..
            } => assert_eq!(ts, REF - 2_592_000),
            _ => panic!("expected a resolved timestamp"),
        }
    }

    #[test]
    fn resolves_rfc3339_date() {
        let expr = parse(r#"date < "2023-01-01T00:00:00Z""#).unwrap();
        let compiled = compile(&expr, REF).unwrap();
        match compiled {
            CompiledFilter::Compare {
                value: CompiledValue::Timestamp(ts),
                ..
            } => assert_eq!(ts, 1_672_531_200),
            _ => panic!("expected a resolved timestamp"),
        }
    }

    #[test]
    fn rejects_unparseable_date_literal() {
        let expr = parse(r#"date == "whenever""#).unwrap();
        assert!(compile(&expr, REF).is_err());
    }

    #[test]
    fn compiles_nested_and_or_not() {
        let expr = parse(r#"not (status == "invalid" or volume == "v2") and uid == "V1""#).unwrap();
        let compiled = compile(&expr, REF).unwrap();
        assert!(matches!(compiled, CompiledFilter::And(_)));
    }
}
