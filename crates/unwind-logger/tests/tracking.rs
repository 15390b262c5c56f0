//! Handle lifecycle, recycling and concurrent use

use std::collections::HashMap;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use proven_unwind_logger::{
    CaptureSink, Context, Level, LogSink, UnwindLogger, UnwindLoggerConfig,
};
use serde_json::Value;

/// Sink that takes a while per line and announces the first write
struct SlowSink {
    inner: CaptureSink,
    delay: Duration,
    started: Mutex<Option<mpsc::Sender<()>>>,
}

impl LogSink for SlowSink {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        if let Some(started) = self.started.lock().take() {
            let _ = started.send(());
        }
        thread::sleep(self.delay);
        self.inner.write_line(line)
    }
}

fn parsed(capture: &CaptureSink) -> Vec<Value> {
    capture
        .lines()
        .iter()
        .map(|line| serde_json::from_str(line).expect("line is not JSON"))
        .collect()
}

fn logger_with_capacity(capacity: usize, full_defer: bool) -> (UnwindLogger, CaptureSink) {
    let capture = CaptureSink::new();
    let config = UnwindLoggerConfig::builder()
        .immediate_level(Level::WARN)
        .deferred_level(Level::INFO)
        .full_defer(full_defer)
        .initial_capacity(capacity)
        .build();

    (UnwindLogger::from_config(config, capture.clone()), capture)
}

#[test]
fn test_recycled_handles_do_not_share_records() {
    let (logger, capture) = logger_with_capacity(2, false);

    for op in 0..10 {
        let ctx = logger.start_tracking(&Context::background());
        logger.with_context(&ctx).with_field("op", op).info("step one");
        logger.with_context(&ctx).with_field("op", op).info("step two");

        if op % 2 == 1 {
            logger.end_tracking_with_error(&ctx, "odd operations fail");
        } else {
            logger.end_tracking(&ctx);
        }
    }

    let lines = parsed(&capture);
    assert_eq!(lines.len(), 10);

    for (i, chunk) in lines.chunks(2).enumerate() {
        let expected = i * 2 + 1;
        assert_eq!(chunk[0]["op"], expected);
        assert_eq!(chunk[0]["msg"], "step one");
        assert_eq!(chunk[1]["op"], expected);
        assert_eq!(chunk[1]["msg"], "step two");
    }

    assert_eq!(logger.pool_size(), 2);
    assert_eq!(logger.active_operations(), 0);
}

#[test]
fn test_overlapping_operations_beyond_initial_capacity() {
    let (logger, capture) = logger_with_capacity(2, false);

    let contexts: Vec<Context> = (0..6)
        .map(|_| logger.start_tracking(&Context::background()))
        .collect();
    assert_eq!(logger.pool_size(), 6);
    assert_eq!(logger.active_operations(), 6);

    for (op, ctx) in contexts.iter().enumerate() {
        logger.with_context(ctx).with_field("op", op).info("work");
    }

    for (op, ctx) in contexts.iter().enumerate().rev() {
        capture.clear();
        logger.end_tracking_with_error(ctx, "failed");

        let lines = parsed(&capture);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["op"], op);
    }

    assert_eq!(logger.active_operations(), 0);
}

#[test]
fn test_stale_context_cannot_reach_reissued_handle() {
    let (logger, capture) = logger_with_capacity(1, false);

    let old = logger.start_tracking(&Context::background());
    logger.end_tracking(&old);

    let new = logger.start_tracking(&Context::background());
    assert_eq!(logger.pool_size(), 1);

    // A slow producer still holding the old context
    logger.with_context(&old).info("late record");
    // A repeated end on the old context
    logger.end_tracking_with_error(&old, "late failure");

    assert_eq!(logger.active_operations(), 1);
    assert!(capture.is_empty());

    logger.with_context(&new).info("current record");
    logger.end_tracking_with_error(&new, "failed");

    let lines = parsed(&capture);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["msg"], "current record");
    assert_eq!(logger.diagnostics().stale_handles, 2);
}

#[test]
fn test_ending_unissued_handle_leaves_others_alone() {
    let (logger, capture) = logger_with_capacity(4, false);
    let foreign = UnwindLogger::new().with_sink(CaptureSink::new());

    let ctx = logger.start_tracking(&Context::background());
    logger.with_context(&ctx).info("still buffered");

    logger.end_tracking(&Context::background());
    logger.end_tracking_with_error(&foreign.start_tracking(&Context::background()), "x");

    assert_eq!(logger.active_operations(), 1);
    assert!(capture.is_empty());

    logger.end_tracking_with_error(&ctx, "failed");
    assert_eq!(parsed(&capture).len(), 1);
}

#[test]
fn test_concurrent_operations_stay_isolated() {
    let (logger, capture) = logger_with_capacity(4, true);
    let logger = Arc::new(logger);

    thread::scope(|s| {
        for worker in 0..8_usize {
            let logger = Arc::clone(&logger);
            s.spawn(move || {
                for i in 0..50_usize {
                    let op = worker * 1000 + i;
                    let ctx = logger.start_tracking(&Context::background());

                    logger.with_context(&ctx).with_field("op", op).debug("debug");
                    logger.with_context(&ctx).with_field("op", op).info("info");
                    logger.with_context(&ctx).with_field("op", op).warn("warn");

                    if op % 2 == 0 {
                        logger.end_tracking_with_error(&ctx, "even operations fail");
                    } else {
                        logger.end_tracking(&ctx);
                    }
                }
            });
        }
    });

    let mut per_op: HashMap<u64, Vec<String>> = HashMap::new();
    for line in parsed(&capture) {
        let op = line["op"].as_u64().unwrap();
        per_op
            .entry(op)
            .or_default()
            .push(line["msg"].as_str().unwrap().to_string());
    }

    assert_eq!(per_op.len(), 400);
    for (op, msgs) in per_op {
        if op % 2 == 0 {
            assert_eq!(msgs, ["info", "warn"], "op {op}");
        } else {
            assert_eq!(msgs, ["warn"], "op {op}");
        }
    }

    assert_eq!(logger.active_operations(), 0);
    assert!(logger.pool_size() <= 8);
}

#[test]
fn test_fan_out_producers_share_one_handle() {
    let (logger, capture) = logger_with_capacity(1, false);
    let ctx = logger.start_tracking(&Context::background());

    thread::scope(|s| {
        for producer in 0..8_u64 {
            let logger = &logger;
            let ctx = &ctx;
            s.spawn(move || {
                for seq in 0..100_u64 {
                    logger
                        .with_context(ctx)
                        .with_field("producer", producer)
                        .with_field("seq", seq)
                        .info("fan-out");
                }
            });
        }
    });

    logger.end_tracking_with_error(&ctx, "failed");

    let lines = parsed(&capture);
    assert_eq!(lines.len(), 800);

    let mut last_seq: HashMap<u64, u64> = HashMap::new();
    for line in lines {
        let producer = line["producer"].as_u64().unwrap();
        let seq = line["seq"].as_u64().unwrap();
        if let Some(prev) = last_seq.insert(producer, seq) {
            assert!(seq > prev, "producer {producer} out of order");
        }
    }
    assert!(last_seq.values().all(|&seq| seq == 99));
}

#[test]
fn test_producers_are_not_held_up_by_a_slow_flush() {
    let capture = CaptureSink::new();
    let (started_tx, started_rx) = mpsc::channel();
    let sink = SlowSink {
        inner: capture.clone(),
        delay: Duration::from_millis(25),
        started: Mutex::new(Some(started_tx)),
    };
    let logger = UnwindLogger::from_config(UnwindLoggerConfig::default(), sink);

    let ctx = logger.start_tracking(&Context::background());
    for seq in 0..20 {
        logger.with_context(&ctx).with_field("seq", seq).info("buffered");
    }

    thread::scope(|s| {
        let flush = s.spawn(|| logger.end_tracking_with_error(&ctx, "failed"));

        started_rx.recv().unwrap();
        let began = Instant::now();
        logger.with_context(&ctx).info("arrives during the flush");
        let waited = began.elapsed();

        flush.join().unwrap();

        // The whole flush takes about 500ms
        assert!(waited < Duration::from_millis(200), "append waited {waited:?}");
    });

    let lines = parsed(&capture);
    assert_eq!(lines.len(), 20);
    assert!(lines.iter().all(|line| line["msg"] == "buffered"));
    assert_eq!(logger.diagnostics().stale_handles, 1);
    assert_eq!(logger.active_operations(), 0);
}

#[test]
fn test_guard_fail_unwinds() {
    let (logger, capture) = logger_with_capacity(1, false);

    let guard = logger.track(&Context::background());
    guard.entry().info("context for the failure");
    logger.with_context(guard.context()).debug("too fine to keep");
    guard.fail("upstream timeout");

    let lines = parsed(&capture);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["msg"], "context for the failure");
    assert_eq!(logger.active_operations(), 0);
}

#[test]
fn test_guard_finish_with_result() {
    let (logger, capture) = logger_with_capacity(1, false);

    let guard = logger.track(&Context::background());
    guard.entry().info("fine");
    guard.finish(&Ok::<(), String>(()));
    assert!(capture.is_empty());

    let guard = logger.track(&Context::background());
    guard.entry().info("broken");
    guard.finish(&Err::<(), _>("nope"));
    assert_eq!(parsed(&capture)[0]["msg"], "broken");
}

#[test]
fn test_dropped_guard_ends_as_success() {
    let (logger, capture) = logger_with_capacity(1, false);

    {
        let guard = logger.track(&Context::background());
        guard.entry().info("routine");
    }

    assert!(capture.is_empty());
    assert_eq!(logger.active_operations(), 0);
}

#[test]
fn test_guard_unwinds_on_panic() {
    let (logger, capture) = logger_with_capacity(1, false);

    let result = catch_unwind(AssertUnwindSafe(|| {
        let guard = logger.track(&Context::background());
        guard.entry().info("right before the panic");
        panic!("operation blew up");
    }));

    assert!(result.is_err());
    assert_eq!(parsed(&capture)[0]["msg"], "right before the panic");
    assert_eq!(logger.active_operations(), 0);
}
