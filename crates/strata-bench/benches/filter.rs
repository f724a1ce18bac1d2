//! Filter-expression parse/compile/evaluate benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_lang::{compile, parse, parse_and_compile};

const REFERENCE_TIME: i64 = 1_700_000_000;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter/parse");

    group.bench_function("simple_eq", |b| {
        b.iter(|| black_box(parse(r#"status == "valid""#).unwrap()));
    });

    group.bench_function("and_chain", |b| {
        let source = r#"status == "valid" and volume == "vm-17" and snapshot == "nightly""#;
        b.iter(|| black_box(parse(source).unwrap()));
    });

    group.bench_function("nested_complex", |b| {
        let source = r#"
            (status == "valid" or status == "incomplete")
            and volume == "vm-17"
            and labels["tier"] == "gold"
            and not (date < "1 year ago")
        "#;
        b.iter(|| black_box(parse(source).unwrap()));
    });

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter/compile");

    let simple = parse(r#"status == "valid""#).unwrap();
    group.bench_function("simple_eq", |b| {
        b.iter(|| black_box(compile(&simple, REFERENCE_TIME).unwrap()));
    });

    let relative_date = parse(r#"date > "1 month ago" and labels["tier"] == "gold""#).unwrap();
    group.bench_function("relative_date", |b| {
        b.iter(|| black_box(compile(&relative_date, REFERENCE_TIME).unwrap()));
    });

    group.finish();
}

fn bench_parse_and_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter/parse_and_compile");

    for (label, source) in [
        ("eq", r#"status == "valid""#),
        ("and", r#"status == "valid" and volume == "vm-17""#),
        (
            "complex",
            r#"(status == "valid" or status == "incomplete") and volume == "vm-17" and labels["tier"] == "gold" and not (date < "1 year ago")"#,
        ),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| black_box(parse_and_compile(source, REFERENCE_TIME).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_compile, bench_parse_and_compile);
criterion_main!(benches);
