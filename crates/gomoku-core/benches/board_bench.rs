//! Criterion benchmarks for placement and win detection.
//!
//! Run with:
//! ```bash
//! cargo bench --package gomoku-core --bench board_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gomoku_core::Board;

/// A late-game position with three empty cells and no five anywhere.
fn crowded_board() -> Board {
    let colour = |x: i32, y: i32| ((x - 1 + 2 * (y - 1)) / 2) % 2;
    let cells: Vec<(i32, i32)> = (1..=15).flat_map(|y| (1..=15).map(move |x| (x, y))).collect();
    let mut black: Vec<_> = cells.iter().copied().filter(|&(x, y)| colour(x, y) == 0).collect();
    let mut white: Vec<_> = cells.iter().copied().filter(|&(x, y)| colour(x, y) == 1).collect();
    black.pop();
    white.pop();
    let moves = black.into_iter().zip(white).flat_map(|(b, w)| [b, w]);
    Board::from_moves(moves).expect("pattern never completes five")
}

fn bench_place_and_undo(c: &mut Criterion) {
    c.bench_function("place_stone+undo/empty", |b| {
        let mut board = Board::new();
        b.iter(|| {
            board.place_stone(black_box(8), black_box(8)).expect("empty");
            board.undo().expect("has history");
        })
    });
}

fn bench_place_on_crowded_board(c: &mut Criterion) {
    let base = crowded_board();
    let target = base
        .empty_cells()
        .next()
        .expect("crowded board keeps at least one empty cell");
    c.bench_function("place_stone/crowded", |b| {
        b.iter_batched(
            || base.clone(),
            |mut board| {
                let _ = board.place_stone(black_box(target.x as i32), black_box(target.y as i32));
                board
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_replay(c: &mut Criterion) {
    let moves: Vec<(i32, i32)> = (1..=4).flat_map(|x| [(x, 1), (x, 3)]).collect();
    c.bench_function("from_moves/8", |b| {
        b.iter(|| Board::from_moves(black_box(moves.iter().copied())))
    });
}

criterion_group!(
    benches,
    bench_place_and_undo,
    bench_place_on_crowded_board,
    bench_replay
);
criterion_main!(benches);
