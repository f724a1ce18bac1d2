//! Evaluates a compiled filter expression against a stored [`Version`].

use crate::model::Version;
use strata_lang::{CompiledFilter, CompiledValue, Field};

pub fn matches(filter: &CompiledFilter, version: &Version) -> bool {
    match filter {
        CompiledFilter::Compare { field, op, value } => compare(version, field, *op, value),
        CompiledFilter::Not(inner) => !matches(inner, version),
        CompiledFilter::And(exprs) => exprs.iter().all(|e| matches(e, version)),
        CompiledFilter::Or(exprs) => exprs.iter().any(|e| matches(e, version)),
    }
}

fn compare(version: &Version, field: &Field, op: strata_lang::CompareOp, value: &CompiledValue) -> bool {
    use std::cmp::Ordering;
    use strata_lang::CompareOp::*;

    let ordering = match (field, value) {
        (Field::Uid, CompiledValue::Str(s)) => Some(version.uid_string().cmp(s)),
        (Field::Volume, CompiledValue::Str(s)) => Some(version.volume.as_str().cmp(s.as_str())),
        (Field::Snapshot, CompiledValue::Str(s)) => Some(version.snapshot.as_str().cmp(s.as_str())),
        (Field::Status, CompiledValue::Str(s)) => Some(version.status.as_str().cmp(s.as_str())),
        (Field::Date, CompiledValue::Timestamp(ts)) => Some(version.date.cmp(ts)),
        (Field::Label(name), CompiledValue::Str(s)) => match version.labels.get(name) {
            Some(Some(label_value)) => Some(label_value.as_str().cmp(s.as_str())),
            // An absent or value-less label only ever satisfies `!=`.
            _ => return op == Ne,
        },
        _ => None,
    };

    let Some(ordering) = ordering else { return false };
    match op {
        Eq => ordering == Ordering::Equal,
        Ne => ordering != Ordering::Equal,
        Lt => ordering == Ordering::Less,
        Le => ordering != Ordering::Greater,
        Gt => ordering == Ordering::Greater,
        Ge => ordering != Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VersionStatus;
    use std::collections::HashMap;
    use strata_lang::parse_and_compile;

    fn version() -> Version {
        let mut labels = HashMap::new();
        labels.insert("tier".to_string(), Some("gold".to_string()));
        Version {
            id: 7,
            volume: "vm-17".into(),
            snapshot: "nightly".into(),
            size: 1024,
            block_size: 4 * 1024 * 1024,
            storage: "default".into(),
            status: VersionStatus::Valid,
            protected: false,
            date: 1_700_000_000,
            labels,
            stats: None,
        }
    }

    #[test]
    fn matches_simple_equality() {
        let filter = parse_and_compile(r#"volume == "vm-17""#, 1_700_000_000).unwrap();
        assert!(matches(&filter, &version()));
    }

    #[test]
    fn matches_label_lookup() {
        let filter = parse_and_compile(r#"labels["tier"] == "gold""#, 1_700_000_000).unwrap();
        assert!(matches(&filter, &version()));
    }

    #[test]
    fn missing_label_only_matches_ne() {
        let filter = parse_and_compile(r#"labels["missing"] == "x""#, 1_700_000_000).unwrap();
        assert!(!matches(&filter, &version()));
        let filter_ne = parse_and_compile(r#"labels["missing"] != "x""#, 1_700_000_000).unwrap();
        assert!(matches(&filter_ne, &version()));
    }

    #[test]
    fn matches_date_comparison() {
        let filter = parse_and_compile(r#"date > "1 year ago""#, 1_700_000_000).unwrap();
        assert!(matches(&filter, &version()));
    }

    #[test]
    fn and_or_not_compose() {
        let filter = parse_and_compile(
            r#"status == "valid" and not volume == "vm-99""#,
            1_700_000_000,
        )
        .unwrap();
        assert!(matches(&filter, &version()));
    }
}
