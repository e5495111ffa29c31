use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowlang_core::emitter::GenerateOptions;
use flowlang_core::{analyzer, compile, parse};

const BRANCHING_SRC: &str = r#"
/**
 * @input amount number
 * @output onSuccess
 * @output onFailure
 * @output balance number
 */
pub fn charge_card(amount: f64) {}

/**
 * @input amount number
 * @output onSuccess
 * @output onFailure
 */
pub fn send_receipt(amount: f64) {}

/**
 * @input reason string
 * @output onSuccess
 * @output onFailure
 */
pub fn log_failure(reason: String) {}

/**
 * @node a ChargeCard
 * @node b SendReceipt
 * @node c LogFailure
 * @connect Start.execute -> a.execute
 * @connect a.onSuccess -> b.execute
 * @connect a.onFailure -> c.execute
 * @connect a.balance -> b.amount
 * @connect b.onSuccess -> Exit.onSuccess
 * @connect c.onSuccess -> Exit.onFailure
 */
pub fn checkout() {}
"#;

fn parse_benchmark(c: &mut Criterion) {
    c.bench_function("parse branching workflow", |b| {
        b.iter(|| parse(black_box(BRANCHING_SRC)));
    });
}

fn analyze_benchmark(c: &mut Criterion) {
    let parsed = parse(BRANCHING_SRC);
    let wf = &parsed.workflows[0];
    c.bench_function("analyze branching workflow", |b| {
        b.iter(|| analyzer::analyze(black_box(wf)).unwrap());
    });
}

fn compile_benchmark(c: &mut Criterion) {
    let options = GenerateOptions::default();
    c.bench_function("compile branching workflow", |b| {
        b.iter(|| compile(black_box(BRANCHING_SRC), black_box(&options)));
    });
}

criterion_group!(benches, parse_benchmark, analyze_benchmark, compile_benchmark);
criterion_main!(benches);
