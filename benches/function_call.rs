//! Benchmark for compile-once, call-many jq functions.
//!
//! Run with:
//! ```bash
//! cargo bench --bench function_call
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jqfunc::host::{HostValue, SourceRange};
use jqfunc::{Function, FunctionDefinition};

/// (name, query, params)
const QUERIES: &[(&str, &str, &[&str])] = &[
    ("field", ".name", &[]),
    ("param_index", ".[$field]", &["field"]),
    ("select_map", "[.items[] | select(.n % 2 == 0) | .n * 10]", &[]),
    ("sort_by", ".items | sort_by(-.n) | map(.n) | first", &[]),
];

fn document(items: usize) -> String {
    let items: Vec<String> = (0..items)
        .map(|n| format!(r#"{{"n":{},"tag":"item-{}"}}"#, n, n))
        .collect();
    format!(r#"{{"name":"Alice","items":[{}]}}"#, items.join(","))
}

fn function(query: &str, params: &[&str]) -> Function {
    let def = FunctionDefinition::new(
        "bench",
        params.iter().map(|p| p.to_string()).collect(),
        query,
        SourceRange::default(),
    );
    Function::new(def.compile().unwrap(), "input")
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (name, query, params) in QUERIES {
        group.bench_function(*name, |b| {
            b.iter(|| function(black_box(query), params));
        });
    }
    group.finish();
}

fn bench_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("call");
    for size in [10usize, 100, 1000] {
        let text = document(size);
        group.throughput(Throughput::Bytes(text.len() as u64));

        for (name, query, params) in QUERIES {
            let f = function(query, params);
            let mut args = vec![HostValue::string(text.clone())];
            args.extend(params.iter().map(|_| HostValue::string("name")));

            group.bench_with_input(BenchmarkId::new(*name, size), &args, |b, args| {
                b.iter(|| f.call(black_box(args)).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_typed_subject(c: &mut Criterion) {
    let text = document(100);
    let subject = HostValue::from_json(serde_json::from_str(&text).unwrap());
    let f = function(".items | map(.n) | add", &[]);

    c.bench_function("call/typed_subject_100", |b| {
        b.iter(|| f.call(black_box(std::slice::from_ref(&subject))).unwrap());
    });
}

criterion_group!(benches, bench_compile, bench_call, bench_typed_subject);
criterion_main!(benches);
