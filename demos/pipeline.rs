//! # Chained processing pipeline
//!
//! Demonstrates deriving tasks from outcomes:
//! - success/failure chains with pass-through semantics
//! - then_task for a second asynchronous stage
//! - retry on a flaky producer
//!
//! ## Run
//! ```sh
//! cargo run --example pipeline
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskchain::Task;

/// Fetch stage: fails twice before producing a payload.
fn fetch() -> Task<(), String, String> {
    let attempts = Arc::new(AtomicUsize::new(0));
    Task::new(move |emitter, _cfg| {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if attempt < 2 {
                println!("🌐 Fetch: attempt {attempt} failed");
                emitter.reject(format!("attempt {attempt}: connection reset"));
            } else {
                println!("🌐 Fetch: attempt {attempt} succeeded");
                emitter.fulfill("hello,world,again".to_string());
            }
        });
    })
}

/// Parse stage: splits the payload asynchronously.
fn parse(payload: String) -> Task<(), Vec<String>, String> {
    Task::new(move |emitter, _cfg| {
        let payload = payload.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let fields: Vec<String> = payload.split(',').map(str::to_string).collect();
            if fields.is_empty() {
                emitter.reject("empty payload".to_string());
            } else {
                emitter.fulfill(fields);
            }
        });
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = fetch()
        .retry(3)
        .success_task(parse)
        .success(|fields| fields.len())
        .failure(|info| {
            println!("🚑 Recovery: {info}");
            0
        });

    let count = pipeline.await?;
    println!("✅ Pipeline: {count} fields");
    Ok(())
}
