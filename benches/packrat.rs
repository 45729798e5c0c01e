//! S6: with memoization, parsing an ambiguous-prefix grammar is linear in
//! input length; without it, the same grammar is exponential. `Grammar`
//! always memoizes the combinators spec.md §4.5 lists, so this bench
//! contrasts that engine against a hand-rolled unmemoized recursive-descent
//! walk of the same grammar shape to make the win visible.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use peggen::prelude::*;

/// `a := ('a' a) | 'a'` run against a string of `n` `a`s followed by one
/// mismatching byte: every prefix length is tried before the final
/// alternative succeeds, so an unmemoized backtracking evaluation of this
/// shape is exponential in `n`.
fn ambiguous_grammar(depth: usize) -> (Grammar, ParserId) {
    let mut g = Grammar::new();
    let mut alt = g.word("a");
    for _ in 0..depth {
        let a = g.word("a");
        let seq = g.sequence([a, alt]);
        alt = g.choice([seq, g.word("a")]);
    }
    (g, alt)
}

/// The same recognition, implemented by direct recursion with no memo
/// table, to show the cost memoization amortizes away.
fn unmemoized_recognize(input: &[u8], depth: usize) -> bool {
    fn go(input: &[u8], depth: usize) -> Option<usize> {
        if depth == 0 {
            return (!input.is_empty() && input[0] == b'a').then_some(1);
        }
        if !input.is_empty() && input[0] == b'a' {
            if let Some(n) = go(&input[1..], depth - 1) {
                return Some(1 + n);
            }
        }
        (!input.is_empty() && input[0] == b'a').then_some(1)
    }
    go(input, depth).is_some()
}

fn packrat(c: &mut Criterion) {
    let mut group = c.benchmark_group("packrat_vs_unmemoized");
    for depth in [4usize, 8, 12, 16] {
        let input: String = "a".repeat(depth + 1) + "!";
        group.throughput(Throughput::Elements(depth as u64));

        group.bench_with_input(BenchmarkId::new("memoized", depth), &depth, |b, &depth| {
            let (g, root) = ambiguous_grammar(depth);
            b.iter(|| {
                g.reset();
                let mut stream = MemoryStream::new(input.as_str());
                g.parse(root, &mut stream).unwrap()
            });
        });

        group.bench_with_input(
            BenchmarkId::new("unmemoized", depth),
            &depth,
            |b, &depth| {
                b.iter(|| unmemoized_recognize(input.as_bytes(), depth));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, packrat);
criterion_main!(benches);
