//! Handoff queue throughput: one producer / one consumer across the
//! capacities the server actually runs with, plus a multi-producer
//! multi-consumer run. Override the item count with QUEUE_BENCH_ITEMS.

use std::env;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use qserve::queue::HandoffQueue;

const DEFAULT_ITEMS: usize = 1_000_000;

fn main() {
    let items: usize = env::var("QUEUE_BENCH_ITEMS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_ITEMS);

    eprintln!("queue bench: {} items per run", items);
    for &capacity in &[1usize, 5, 64, 1024] {
        run_spsc(items, capacity);
    }
    run_mpmc(items / 4, 5, 4, 3);
}

fn run_spsc(items: usize, capacity: usize) {
    let queue = Arc::new(HandoffQueue::new(capacity));

    let producer_queue = Arc::clone(&queue);
    let producer = thread::spawn(move || {
        for i in 0..items as u64 {
            producer_queue.push(black_box(i)).expect("push failed");
        }
    });

    let start = Instant::now();
    let mut received = 0usize;
    while received < items {
        black_box(queue.pop().expect("pop returned None without shutdown"));
        received += 1;
    }
    let elapsed = start.elapsed();

    producer.join().expect("producer panicked");
    eprintln!(
        "  spsc capacity={:<5} {:>10.0} handoffs/s",
        capacity,
        items as f64 / elapsed.as_secs_f64()
    );
}

fn run_mpmc(items_per_producer: usize, capacity: usize, producers: usize, consumers: usize) {
    let queue = Arc::new(HandoffQueue::new(capacity));
    let start = Instant::now();

    let consumer_handles: Vec<_> = (0..consumers)
        .map(|_| {
            let q = Arc::clone(&queue);
            thread::spawn(move || {
                let mut count = 0usize;
                while let Some(item) = q.pop() {
                    black_box(item);
                    count += 1;
                }
                count
            })
        })
        .collect();

    let producer_handles: Vec<_> = (0..producers)
        .map(|p| {
            let q = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..items_per_producer as u64 {
                    q.push(p as u64 * 1_000_000_000 + i).expect("push failed");
                }
            })
        })
        .collect();

    for p in producer_handles {
        p.join().expect("producer panicked");
    }
    queue.shutdown();

    let mut total = 0usize;
    for c in consumer_handles {
        total += c.join().expect("consumer panicked");
    }
    let elapsed = start.elapsed();

    assert_eq!(total, items_per_producer * producers);
    eprintln!(
        "  mpmc {}p/{}c capacity={:<5} {:>10.0} handoffs/s",
        producers,
        consumers,
        capacity,
        total as f64 / elapsed.as_secs_f64()
    );
}
