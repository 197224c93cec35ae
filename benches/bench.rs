//! Criterion benchmarks for dynamic synonym filters.
//!
//! Covers the two costs that matter at runtime:
//! - Compiling rule text into a table (paid on every reload)
//! - Rewriting token streams with a table (paid on every analysis)

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use dynamic_synonym::analysis::analyzer::{Analyzer, StandardAnalyzer};
use dynamic_synonym::synonym::{OutputMode, SynonymMap, SynonymTableBuilder};

/// Generate solr rules: `num_groups` three-term groups plus a multi-word mapping each.
fn generate_rules(num_groups: usize) -> String {
    let mut rules = String::new();
    for i in 0..num_groups {
        rules.push_str(&format!("term{i}, synonyma{i}, synonymb{i}\n"));
        rules.push_str(&format!("multi word {i} => phrase{i}\n"));
    }
    rules
}

/// Generate text that hits a table of `num_groups` groups every few words.
fn generate_text(words: usize, num_groups: usize) -> String {
    let filler = ["search", "engine", "full", "text", "index", "query"];
    (0..words)
        .map(|i| {
            if i % 4 == 0 {
                format!("term{}", i % num_groups)
            } else {
                filler[i % filler.len()].to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn builder() -> SynonymTableBuilder {
    SynonymTableBuilder::new(Arc::new(StandardAnalyzer::new()))
}

/// Benchmark compiling rule text into a table.
fn bench_table_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_build");

    for size in [100, 1_000, 10_000] {
        let rules = generate_rules(size);
        let builder = builder();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("build_{size}_groups"), |b| {
            b.iter(|| {
                let map = builder.build(black_box(&rules)).unwrap();
                black_box(map)
            })
        });
    }

    group.finish();
}

/// Benchmark rewriting a token stream.
fn bench_table_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_apply");

    let map: SynonymMap = builder().build(&generate_rules(1_000)).unwrap();
    let analyzer = StandardAnalyzer::new();
    let text = generate_text(200, 1_000);

    group.throughput(Throughput::Elements(200));
    for (name, mode) in [("graph", OutputMode::Graph), ("flat", OutputMode::Flat)] {
        group.bench_function(format!("apply_{name}_200_tokens"), |b| {
            b.iter(|| {
                let tokens = analyzer.analyze(black_box(&text)).unwrap().collect();
                black_box(map.apply(tokens, mode))
            })
        });
    }

    group.bench_function("lookup_single", |b| {
        b.iter(|| black_box(map.lookup(black_box(&["term500"]))))
    });

    group.finish();
}

criterion_group!(benches, bench_table_build, bench_table_apply);

criterion_main!(benches);
