#[cfg(feature = "metrics")]
mod imp {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    // Connection flow (cumulative counts)
    static ACCEPTED: AtomicU64 = AtomicU64::new(0);
    static ENQUEUED: AtomicU64 = AtomicU64::new(0);
    static REJECTED: AtomicU64 = AtomicU64::new(0);
    static DEQUEUED: AtomicU64 = AtomicU64::new(0);
    static SERVED: AtomicU64 = AtomicU64::new(0);
    static HANDLER_ERRORS: AtomicU64 = AtomicU64::new(0);
    static HANDLER_PANICS: AtomicU64 = AtomicU64::new(0);
    // Backpressure: how often a push found the queue full / a pop found it empty
    static PUSH_FULL_WAITS: AtomicU64 = AtomicU64::new(0);
    static POP_EMPTY_WAITS: AtomicU64 = AtomicU64::new(0);
    // Gauges
    static QUEUE_DEPTH: AtomicUsize = AtomicUsize::new(0);
    static QUEUE_MAX_DEPTH: AtomicUsize = AtomicUsize::new(0);

    #[derive(Clone, Copy)]
    pub struct MetricsSnapshot {
        pub accepted: u64,
        pub enqueued: u64,
        pub rejected: u64,
        pub dequeued: u64,
        pub served: u64,
        pub handler_errors: u64,
        pub handler_panics: u64,
        pub push_full_waits: u64,
        pub pop_empty_waits: u64,
        pub queue_depth: usize,
        pub queue_max_depth: usize,
    }

    pub fn inc_accepted() {
        ACCEPTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_enqueued() {
        ENQUEUED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected() {
        REJECTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dequeued() {
        DEQUEUED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_served() {
        SERVED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_handler_errors() {
        HANDLER_ERRORS.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_handler_panics() {
        HANDLER_PANICS.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_push_full_waits() {
        PUSH_FULL_WAITS.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pop_empty_waits() {
        POP_EMPTY_WAITS.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_depth(value: usize) {
        QUEUE_DEPTH.store(value, Ordering::Relaxed);
        update_max(&QUEUE_MAX_DEPTH, value);
    }

    fn update_max(target: &AtomicUsize, value: usize) {
        let mut prev = target.load(Ordering::Relaxed);
        while value > prev {
            match target.compare_exchange_weak(prev, value, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(next) => prev = next,
            }
        }
    }

    pub fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: ACCEPTED.load(Ordering::Relaxed),
            enqueued: ENQUEUED.load(Ordering::Relaxed),
            rejected: REJECTED.load(Ordering::Relaxed),
            dequeued: DEQUEUED.load(Ordering::Relaxed),
            served: SERVED.load(Ordering::Relaxed),
            handler_errors: HANDLER_ERRORS.load(Ordering::Relaxed),
            handler_panics: HANDLER_PANICS.load(Ordering::Relaxed),
            push_full_waits: PUSH_FULL_WAITS.load(Ordering::Relaxed),
            pop_empty_waits: POP_EMPTY_WAITS.load(Ordering::Relaxed),
            queue_depth: QUEUE_DEPTH.load(Ordering::Relaxed),
            queue_max_depth: QUEUE_MAX_DEPTH.load(Ordering::Relaxed),
        }
    }

    pub fn spawn_reporter() {
        const INTERVAL_SECS: u64 = 10;
        std::thread::spawn(|| {
            let mut last_snap = snapshot();
            loop {
                std::thread::sleep(Duration::from_secs(INTERVAL_SECS));
                let snap = snapshot();
                let accepted_d = snap.accepted.saturating_sub(last_snap.accepted);
                let served_d = snap.served.saturating_sub(last_snap.served);
                let rejected_d = snap.rejected.saturating_sub(last_snap.rejected);
                let errors_d = snap.handler_errors.saturating_sub(last_snap.handler_errors);
                let panics_d = snap.handler_panics.saturating_sub(last_snap.handler_panics);
                let full_d = snap.push_full_waits.saturating_sub(last_snap.push_full_waits);
                let empty_d = snap.pop_empty_waits.saturating_sub(last_snap.pop_empty_waits);
                println!(
                    "metrics delta {}s: accepted={} served={} rejected={} handler_errors={} handler_panics={} | waits: push_full={} pop_empty={} | gauges: queue_depth={} queue_max_depth={}",
                    INTERVAL_SECS,
                    accepted_d,
                    served_d,
                    rejected_d,
                    errors_d,
                    panics_d,
                    full_d,
                    empty_d,
                    snap.queue_depth,
                    snap.queue_max_depth,
                );
                last_snap = snap;
            }
        });
    }
}

#[cfg(not(feature = "metrics"))]
#[allow(dead_code)]
mod imp {
    #[derive(Clone, Copy)]
    pub struct MetricsSnapshot {
        pub accepted: u64,
        pub enqueued: u64,
        pub rejected: u64,
        pub dequeued: u64,
        pub served: u64,
        pub handler_errors: u64,
        pub handler_panics: u64,
        pub push_full_waits: u64,
        pub pop_empty_waits: u64,
        pub queue_depth: usize,
        pub queue_max_depth: usize,
    }

    pub fn inc_accepted() {}
    pub fn inc_enqueued() {}
    pub fn inc_rejected() {}
    pub fn inc_dequeued() {}
    pub fn inc_served() {}
    pub fn inc_handler_errors() {}
    pub fn inc_handler_panics() {}
    pub fn inc_push_full_waits() {}
    pub fn inc_pop_empty_waits() {}
    pub fn update_queue_depth(_: usize) {}
    pub fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: 0,
            enqueued: 0,
            rejected: 0,
            dequeued: 0,
            served: 0,
            handler_errors: 0,
            handler_panics: 0,
            push_full_waits: 0,
            pop_empty_waits: 0,
            queue_depth: 0,
            queue_max_depth: 0,
        }
    }
    pub fn spawn_reporter() {}
}

pub use imp::*;
