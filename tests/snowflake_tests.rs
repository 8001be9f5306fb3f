//! Identifier generator tests
//!
//! Exercises the generator with the system clock across threads and with
//! scripted clocks for sequence exhaustion and configuration handling.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use sqlforge::id::{
    decompose, Snowflake, SnowflakeConfig, SnowflakeError, SystemClock, DEFAULT_EPOCH,
    MAX_SEQUENCE, MAX_WORKER_ID,
};

#[test]
fn test_ids_strictly_increase() {
    let generator = Snowflake::with_clock(42, DEFAULT_EPOCH, SystemClock).unwrap();
    let mut last = generator.next_id().unwrap();
    for _ in 0..10_000 {
        let id = generator.next_id().unwrap();
        assert!(id > last, "{} not after {}", id, last);
        last = id;
    }
    let parts = decompose(last, DEFAULT_EPOCH);
    assert_eq!(parts.worker_id, 42);
    assert!(parts.sequence <= MAX_SEQUENCE);
}

#[test]
fn test_unique_across_threads() {
    let generator = Arc::new(Snowflake::with_clock(7, DEFAULT_EPOCH, SystemClock).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let generator = Arc::clone(&generator);
            thread::spawn(move || {
                let ids: Vec<i64> = (0..2_000).map(|_| generator.next_id().unwrap()).collect();
                assert!(ids.windows(2).all(|w| w[0] < w[1]));
                ids
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "duplicate id {}", id);
        }
    }
    assert_eq!(seen.len(), 16_000);
}

#[test]
fn test_sequence_exhaustion_waits_for_next_millisecond() {
    let base = DEFAULT_EPOCH + 5_000;
    let reads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reads);
    // One read at construction, one per call; the clock ticks once the
    // sequence of the first millisecond is used up
    let clock = move || {
        if counter.fetch_add(1, Ordering::SeqCst) > MAX_SEQUENCE as usize + 1 {
            base + 1
        } else {
            base
        }
    };
    let generator = Snowflake::with_clock(3, DEFAULT_EPOCH, clock).unwrap();

    let ids: Vec<i64> = (0..=MAX_SEQUENCE)
        .map(|_| generator.next_id().unwrap())
        .collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let first = decompose(ids[0], DEFAULT_EPOCH);
    assert_eq!(first.timestamp, base);
    assert_eq!(first.sequence, 1);

    let before_wrap = decompose(ids[ids.len() - 2], DEFAULT_EPOCH);
    assert_eq!(before_wrap.timestamp, base);
    assert_eq!(before_wrap.sequence, MAX_SEQUENCE);

    let wrapped = decompose(ids[ids.len() - 1], DEFAULT_EPOCH);
    assert_eq!(wrapped.timestamp, base + 1);
    assert_eq!(wrapped.sequence, 0);
    assert_eq!(wrapped.worker_id, 3);
}

#[test]
fn test_config_worker_id() {
    let config = SnowflakeConfig {
        epoch_millis: DEFAULT_EPOCH,
        worker_id: Some(MAX_WORKER_ID),
    };
    let generator = Snowflake::from_config(&config).unwrap();
    assert_eq!(generator.worker_id(), MAX_WORKER_ID);
    assert_eq!(generator.epoch(), DEFAULT_EPOCH);
    let id = generator.next_id().unwrap();
    assert_eq!(decompose(id, DEFAULT_EPOCH).worker_id, MAX_WORKER_ID);

    let invalid = SnowflakeConfig {
        worker_id: Some(MAX_WORKER_ID + 1),
        ..SnowflakeConfig::default()
    };
    assert!(matches!(
        Snowflake::from_config(&invalid),
        Err(SnowflakeError::InvalidWorkerId(1024))
    ));
}

#[test]
fn test_global_generator() {
    let global = Snowflake::global();
    assert!(global.worker_id() <= MAX_WORKER_ID);
    let a = global.next_id().unwrap();
    let b = Snowflake::global().next_id().unwrap();
    assert!(a > 0);
    assert!(b > a);
}
