use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use procwatch::system::normalize::normalize_row;
use procwatch::system::process::select_top;
use procwatch::system::state::decode;

const TOTAL_MEMORY: u64 = 16_000_000_000;
const STATES: [&str; 6] = ["Ss", "S", "R+", "Ssl", "I<", "SN"];

fn make_rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let pid = i + 1;
            let ppid = if i == 0 { 0 } else { i / 2 + 1 };
            let cpu = (i % 97) as f32 * 0.7;
            let mem = (i % 13) as f32 * 0.3;
            let state = STATES[i % STATES.len()];
            if i % 5 == 0 {
                format!(
                    "{pid} {ppid} {cpu:.1} {mem:.1} Web Content {state} /Applications/App{i}.app/Contents/MacOS/helper --child {i}"
                )
            } else {
                format!("{pid} {ppid} {cpu:.1} {mem:.1} proc_{i} {state} /usr/bin/proc_{i} --flag")
            }
        })
        .collect()
}

fn bench_normalize_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let rows = make_rows(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let processes: Vec<_> = rows
                    .iter()
                    .filter_map(|row| normalize_row(black_box(row), TOTAL_MEMORY).ok())
                    .collect();
                black_box(processes);
            })
        });
    }

    group.finish();
}

fn bench_normalize_and_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_rank_top20_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let rows = make_rows(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let processes = rows
                    .iter()
                    .filter_map(|row| normalize_row(row, TOTAL_MEMORY).ok())
                    .collect();
                black_box(select_top(processes, 20));
            })
        });
    }

    group.finish();
}

fn bench_decode_states(c: &mut Criterion) {
    c.bench_function("decode_state_codes", |b| {
        b.iter(|| {
            for code in STATES {
                black_box(decode(black_box(code)));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_normalize_rows,
    bench_normalize_and_rank,
    bench_decode_states
);
criterion_main!(benches);
