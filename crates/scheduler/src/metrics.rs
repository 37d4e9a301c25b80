use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    scheduled: AtomicU64,
    superseded: AtomicU64,
    executed: AtomicU64,
    cancelled: AtomicU64,
    inline: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_scheduled() {
    increment(&COUNTERS.scheduled);
}

pub fn record_superseded() {
    increment(&COUNTERS.superseded);
}

pub fn record_executed() {
    increment(&COUNTERS.executed);
}

pub fn record_cancelled() {
    increment(&COUNTERS.cancelled);
}

pub fn record_inline() {
    increment(&COUNTERS.inline);
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SchedulerMetricsSnapshot {
    pub scheduled: u64,
    pub superseded: u64,
    pub executed: u64,
    pub cancelled: u64,
    pub inline: u64,
}

pub fn snapshot() -> SchedulerMetricsSnapshot {
    SchedulerMetricsSnapshot {
        scheduled: COUNTERS.scheduled.load(Ordering::Relaxed),
        superseded: COUNTERS.superseded.load(Ordering::Relaxed),
        executed: COUNTERS.executed.load(Ordering::Relaxed),
        cancelled: COUNTERS.cancelled.load(Ordering::Relaxed),
        inline: COUNTERS.inline.load(Ordering::Relaxed),
    }
}
