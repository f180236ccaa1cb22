//! Simple SPSC Example
//!
//! Demonstrates the SpscQueue API: the queue stays on the consumer thread and
//! its Writer moves to the producer thread.

use ringq::{QueueConfig, SpscQueue};
use std::thread;

const CAPACITY: usize = 64 * 1024 - 1;
const MESSAGE_COUNT: u64 = 1_000_000;
const BATCH_SIZE: usize = 1024;

fn main() -> ringq::Result<()> {
    println!("\n=== Simple SPSC Example ===\n");

    // Heap-backed storage
    let config = QueueConfig::new(CAPACITY)?;
    let mut queue = SpscQueue::<u64>::from_config(&config)?;

    // Or use memory-mapped storage:
    // let mut queue = SpscQueue::<u64, _>::mapped(&config.with_mlock(true))?;

    let mut writer = queue
        .writer()
        .ok_or_else(|| ringq::QueueError::config("writer already taken"))?;

    // Producer thread
    let producer = thread::spawn(move || {
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        let mut sent = 0u64;

        while sent < MESSAGE_COUNT {
            let len = (MESSAGE_COUNT - sent).min(BATCH_SIZE as u64);
            batch.clear();
            batch.extend(sent + 1..=sent + len);

            let mut done = 0;
            while done < batch.len() {
                done += writer.add_at_most(&batch[done..]);
            }
            sent += len;
        }

        println!("Producer: sent {} messages", sent);
    });

    // Consumer (this thread)
    let start = std::time::Instant::now();
    let mut out = vec![0u64; BATCH_SIZE];
    let mut received = 0u64;
    let mut sum = 0u64;

    while received < MESSAGE_COUNT {
        let n = queue.dequeue_range_at_most(&mut out);
        sum += out[..n].iter().sum::<u64>();
        received += n as u64;
    }
    println!("Consumer: received {} messages, sum = {}", received, sum);

    producer.join().expect("producer panicked");
    let duration = start.elapsed();

    // Verify
    let expected = (MESSAGE_COUNT * (MESSAGE_COUNT + 1)) / 2;
    assert_eq!(sum, expected, "Sum mismatch!");

    let throughput = MESSAGE_COUNT as f64 / duration.as_secs_f64() / 1_000_000.0;
    println!("\nThroughput: {:.2}M msgs/sec", throughput);
    println!("Verified: sum = {} (expected {})", sum, expected);
    Ok(())
}
