//! Unit tests for the bounded sample queue, including its overwrite behaviour

use datalogger::{CompositeRecord, SampleQueue};

fn record(timestamp_us: u64) -> CompositeRecord {
    CompositeRecord {
        timestamp_us,
        pressure: timestamp_us as f32,
        ..CompositeRecord::default()
    }
}

#[test]
fn test_new_queue_is_empty() {
    let mut queue: SampleQueue<CompositeRecord, 8> = SampleQueue::new();
    assert!(queue.is_empty());
    assert_eq!(queue.len(), 0);

    let (producer, mut consumer) = queue.split();
    assert!(producer.is_empty());
    assert!(consumer.is_empty());
    assert_eq!(consumer.pop(), None);
}

#[test]
fn test_fifo_order_up_to_capacity() {
    let mut queue: SampleQueue<CompositeRecord, 8> = SampleQueue::new();
    let capacity = queue.capacity();
    let (mut producer, mut consumer) = queue.split();

    for t in 0..capacity as u64 {
        producer.push(record(t));
    }
    assert_eq!(consumer.len(), capacity);

    for t in 0..capacity as u64 {
        assert_eq!(consumer.pop(), Some(record(t)));
    }
    assert_eq!(consumer.pop(), None);
}

#[test]
fn test_fifo_order_across_wraparound() {
    let mut queue: SampleQueue<u32, 4> = SampleQueue::new();
    let (mut producer, mut consumer) = queue.split();

    let mut expected = 0;
    for next in 0..20 {
        producer.push(next);
        if next % 2 == 1 {
            assert_eq!(consumer.pop(), Some(expected));
            assert_eq!(consumer.pop(), Some(expected + 1));
            expected += 2;
        }
    }
    assert!(consumer.is_empty());
}

#[test]
fn test_filling_every_slot_looks_empty() {
    // N pushes bring the write index back onto the read index
    let mut queue: SampleQueue<u32, 4> = SampleQueue::new();
    let (mut producer, mut consumer) = queue.split();

    for value in 0..4 {
        producer.push(value);
    }

    assert!(consumer.is_empty());
    assert_eq!(consumer.pop(), None);
}

#[test]
fn test_overflow_makes_oldest_records_unreadable() {
    let mut queue: SampleQueue<CompositeRecord, 4> = SampleQueue::new();
    let capacity = queue.capacity();
    let (mut producer, mut consumer) = queue.split();

    // capacity + 2 = N + 1 pushes without popping
    for t in 0..=(capacity as u64 + 1) {
        producer.push(record(t));
    }

    // Only the newest record survives; r0..r3 are lost
    assert_eq!(consumer.len(), 1);
    assert_eq!(consumer.pop(), Some(record(capacity as u64 + 1)));
    assert_eq!(consumer.pop(), None);
}

#[test]
fn test_overflow_by_one_past_capacity_loses_everything_before_it() {
    let mut queue: SampleQueue<u32, 8> = SampleQueue::new();
    let capacity = queue.capacity() as u32;
    let (mut producer, mut consumer) = queue.split();

    for value in 0..=capacity {
        producer.push(value);
    }

    // capacity + 1 pushes: the first record is never returned
    let drained: Vec<u32> = core::iter::from_fn(|| consumer.pop()).collect();
    assert!(!drained.contains(&0));
}

#[test]
fn test_concurrent_producer_and_consumer_preserve_order() {
    let mut queue: SampleQueue<u32, 64> = SampleQueue::new();
    let (mut producer, mut consumer) = queue.split();
    let total = 10_000u32;

    std::thread::scope(|scope| {
        scope.spawn(move || {
            for value in 0..total {
                // Stay below capacity so nothing is overwritten
                while producer.len() >= producer.capacity() - 1 {
                    std::thread::yield_now();
                }
                producer.push(value);
            }
        });

        let mut expected = 0;
        while expected < total {
            if let Some(value) = consumer.pop() {
                assert_eq!(value, expected);
                expected += 1;
            } else {
                std::thread::yield_now();
            }
        }
    });
}
