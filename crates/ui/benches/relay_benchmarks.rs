//! Relay benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};

use ui::protocol::{classify, ConsoleType, LogEntry, StackTrace, WireMessage};
use ui::surface::Endpoint;
use ui::LogHistory;

/// Endpoint that only counts deliveries.
#[derive(Default)]
struct CountingEndpoint {
    delivered: AtomicUsize,
}

impl Endpoint for CountingEndpoint {
    fn post_message(&self, message: WireMessage) {
        black_box(message);
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }
}

fn console_event(n: usize) -> String {
    format!(
        r#"{{"method":"Runtime.consoleAPICalled","params":{{"type":"log","args":[{{"type":"number","value":{}}}],"timestamp":0}}}}"#,
        n
    )
}

/// Benchmark message classification.
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    let console = WireMessage::text(console_event(1));
    let response = WireMessage::text(r#"{"id":12,"result":{"result":{"type":"undefined"}}}"#);
    let garbage = WireMessage::text("definitely not json");

    group.bench_function("console_api_called", |b| b.iter(|| classify(black_box(&console))));
    group.bench_function("protocol_response", |b| b.iter(|| classify(black_box(&response))));
    group.bench_function("not_json", |b| b.iter(|| classify(black_box(&garbage))));

    group.finish();
}

/// Benchmark history replay.
fn bench_history_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_replay");

    for size in [100usize, 1_000, 10_000] {
        let mut history = LogHistory::new();
        for n in 0..size {
            history.append(LogEntry::from_raw(console_event(n)));
        }
        let endpoint = CountingEndpoint::default();

        group.bench_with_input(BenchmarkId::from_parameter(size), &history, |b, history| {
            b.iter(|| history.replay(&endpoint))
        });
    }

    group.finish();
}

/// Benchmark building log entries from captures.
fn bench_capture(c: &mut Criterion) {
    let args = vec![
        serde_json::json!("request failed"),
        serde_json::json!({"status": 500, "url": "/api"}),
        serde_json::json!({"name": "TypeError", "message": "x is undefined", "stack": "TypeError: x is undefined"}),
    ];
    let stack = StackTrace::from_value(&serde_json::json!({
        "callFrames": [{"functionName": "load", "lineNumber": 10, "columnNumber": 4, "url": "app.js"}]
    }));

    c.bench_function("log_entry_from_capture", |b| {
        b.iter(|| LogEntry::from_capture(ConsoleType::Error, black_box(&args), &stack, 0.0))
    });
}

criterion_group!(benches, bench_classify, bench_history_replay, bench_capture);
criterion_main!(benches);
