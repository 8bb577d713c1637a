// Producer and consumer threads sharing one lease ring.
//
// cargo run --example pipeline -- <num_messages> [producer_delay_ms]
use dmxp_leasering::{RingBuffer, RingError};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn digest(i: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("message_{}", i).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_messages> [producer_delay_ms]", args[0]);
        std::process::exit(1);
    }

    let num_messages: usize = args[1].parse().expect("Invalid number of messages");
    let delay_ms: u64 = args
        .get(2)
        .map(|s| s.parse().expect("Invalid delay"))
        .unwrap_or(0);

    let ring = Arc::new(
        RingBuffer::builder()
            .with_capacity(16)
            .with_payload_size(128)
            .build()?,
    );
    println!(
        "Pipeline: ring of {} cells x {} bytes",
        ring.capacity(),
        ring.payload_size()
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let producer = {
        let ring = Arc::clone(&ring);
        let running = Arc::clone(&running);
        thread::spawn(move || -> Result<(usize, usize), RingError> {
            let mut sent = 0;
            let mut discarded = 0;
            for i in 0..num_messages {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                // Format: "message_number:hash"
                let message = format!("{}:{}", i, digest(i));
                match ring.get_write_cell(Duration::from_millis(100)) {
                    Ok(mut cell) => {
                        cell.set_index(i as u32);
                        cell.write(message.as_bytes())?;
                        cell.stamp();
                        cell.commit()?;
                        sent += 1;
                    }
                    Err(RingError::Full) => discarded += 1,
                    Err(e) => return Err(e),
                }
                if delay_ms > 0 {
                    thread::sleep(Duration::from_millis(delay_ms));
                }
            }
            Ok((sent, discarded))
        })
    };

    let start = Instant::now();
    let mut received = 0;
    let mut corrupted = 0;
    let mut latency_ns = 0u64;
    loop {
        match ring.get_read_cell(Duration::from_millis(100)) {
            Ok(cell) => {
                let text = String::from_utf8_lossy(cell.data());
                let expected = format!("{}:{}", cell.index(), digest(cell.index() as usize));
                if text != expected {
                    corrupted += 1;
                }
                latency_ns += monotonic_age(cell.timestamp_ns());
                cell.release()?;
                received += 1;
                if received % 100 == 0 {
                    println!("Received {} messages", received);
                }
            }
            Err(RingError::Empty) => {
                if producer.is_finished() && ring.is_empty() {
                    break;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    let (sent, discarded) = producer
        .join()
        .expect("producer thread panicked")
        .map_err(std::io::Error::from)?;

    println!("\n=== Pipeline Summary ===");
    println!("Sent:      {}", sent);
    println!("Discarded: {}", discarded);
    println!("Received:  {}", received);
    println!("Corrupted: {}", corrupted);
    println!("Elapsed:   {:.2?}", start.elapsed());
    if received > 0 {
        println!(
            "Mean cell age at read: {:.2?}",
            Duration::from_nanos(latency_ns / received as u64)
        );
    }
    Ok(())
}

fn monotonic_age(stamped_ns: u64) -> u64 {
    dmxp_leasering::Core::clock::monotonic_now_ns().saturating_sub(stamped_ns)
}
