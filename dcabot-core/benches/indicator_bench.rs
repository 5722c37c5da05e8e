//! Criterion benchmarks for the per-cycle hot path.
//!
//! Benchmarks:
//! 1. Indicator snapshot (RSI, MACD, Alligator over a full window)
//! 2. Signal evaluation + state machine step

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use dcabot_core::config::{AlligatorParams, MacdParams, StrategyContext};
use dcabot_core::domain::PriceWindow;
use dcabot_core::position_management::PositionStateMachine;
use dcabot_core::signals::{evaluate, IndicatorRole, IndicatorSuite};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0)
        .collect()
}

fn full_suite() -> IndicatorSuite {
    let role = IndicatorRole {
        for_entry: true,
        for_exit: true,
    };
    IndicatorSuite::new(14)
        .with_macd(MacdParams::default(), role)
        .with_alligator(AlligatorParams::default(), role)
}

fn ctx() -> StrategyContext {
    StrategyContext {
        base_investment: 100.0,
        max_dca_levels: 5,
        take_profit: 0.05,
        trailing_stop: 0.03,
        dca_drop_trigger: 0.05,
        dca_size_multiplier: 1.0,
        rsi_period: 14,
        rsi_threshold: 30.0,
        fee_rate: 0.001,
        quantity_precision: 6,
    }
}

// ── 1. Indicator snapshot ────────────────────────────────────────────

fn bench_snapshot(c: &mut Criterion) {
    let suite = full_suite();
    let mut group = c.benchmark_group("snapshot");
    for size in [suite.required_bars(), 100, 500] {
        let window = PriceWindow::from_closes(size, &make_closes(size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &window, |b, w| {
            b.iter(|| suite.snapshot(black_box(w)))
        });
    }
    group.finish();
}

// ── 2. Decision step ─────────────────────────────────────────────────

fn bench_decision(c: &mut Criterion) {
    let suite = full_suite();
    let ctx = ctx();
    let closes = make_closes(suite.required_bars());
    let window = PriceWindow::from_closes(closes.len(), &closes).unwrap();
    let snapshot = suite.snapshot(&window);

    c.bench_function("evaluate_and_step", |b| {
        b.iter(|| {
            let signals = evaluate(black_box(&snapshot), 30.0, &suite);
            let sm = PositionStateMachine::new();
            sm.evaluate(black_box(95.0), signals, &ctx)
        })
    });
}

criterion_group!(benches, bench_snapshot, bench_decision);
criterion_main!(benches);
