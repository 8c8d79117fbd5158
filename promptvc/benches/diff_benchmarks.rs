//! Performance benchmarks for diff computation and patching
//!
//! Run with: cargo bench --bench diff_benchmarks

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use promptvc::diff::{DEFAULT_CONTEXT_LINES, apply_patch, compute_diff};

/// Build a prompt of `lines` instruction lines
fn create_bench_prompt(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("Step {}: follow the instructions for section {} carefully.\n", i, i % 17))
        .collect()
}

/// Rewrite every `stride`th line of a prompt
fn edit_every(prompt: &str, stride: usize) -> String {
    prompt
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i % stride == 0 {
                format!("{} Be concise.\n", line)
            } else {
                format!("{}\n", line)
            }
        })
        .collect()
}

fn bench_compute_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_diff");

    for size in [50, 500, 5_000] {
        let from = create_bench_prompt(size);
        let sparse = edit_every(&from, 50);
        let dense = edit_every(&from, 3);

        group.bench_with_input(BenchmarkId::new("sparse_edits", size), &size, |b, _| {
            b.iter(|| compute_diff(black_box(&from), black_box(&sparse), DEFAULT_CONTEXT_LINES))
        });

        group.bench_with_input(BenchmarkId::new("dense_edits", size), &size, |b, _| {
            b.iter(|| compute_diff(black_box(&from), black_box(&dense), DEFAULT_CONTEXT_LINES))
        });

        group.bench_with_input(BenchmarkId::new("identical", size), &size, |b, _| {
            b.iter(|| compute_diff(black_box(&from), black_box(&from), DEFAULT_CONTEXT_LINES))
        });
    }

    group.finish();
}

fn bench_apply_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_patch");

    for size in [50, 500, 5_000] {
        let from = create_bench_prompt(size);
        let to = edit_every(&from, 10);
        let diff = compute_diff(&from, &to, DEFAULT_CONTEXT_LINES);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| apply_patch(black_box(&from), black_box(&diff.hunks)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_diff, bench_apply_patch);
criterion_main!(benches);
