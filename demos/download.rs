//! # Simulated download with pause and resume
//!
//! Demonstrates the producer side of a task:
//! - Progress reporting through the emitter
//! - Cooperative pause/resume via Configuration hooks
//! - Streaming progress to a consumer
//! - Awaiting the final outcome
//!
//! ## Run
//! ```sh
//! cargo run --example download
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Notify;

use taskchain::{Task, TaskState};

/// Builds a download task producing one chunk per tick, honoring pause and
/// cancel between chunks.
fn download(chunks: usize) -> Task<u8, Vec<u8>, String> {
    Task::new(move |emitter, cfg| {
        let gate = Arc::new(Notify::new());

        let waker = Arc::clone(&gate);
        cfg.on_resume(move || waker.notify_one());
        let waker = Arc::clone(&gate);
        cfg.on_cancel(move || waker.notify_one());

        tokio::spawn(async move {
            let mut body = Vec::new();
            for chunk in 0..chunks {
                loop {
                    match emitter.state() {
                        TaskState::Running => break,
                        TaskState::Paused => {
                            println!("⏸️  Producer: holding before chunk {chunk}");
                            gate.notified().await;
                        }
                        _ => {
                            println!("🛑 Producer: stopping, task is {}", emitter.state());
                            return;
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
                body.extend_from_slice(&[chunk as u8; 4]);
                emitter.progress((100 * (chunk + 1) / chunks) as u8);
            }
            emitter.fulfill(body);
        });
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let task = download(5);

    // Stream progress in the background.
    let mut progress = task.progress_stream();
    let reporter = tokio::spawn(async move {
        while let Some(pct) = progress.next().await {
            println!("📦 Download: {pct}%");
        }
        println!("📦 Download: progress stream ended");
    });

    // Let a couple of chunks land, then pause briefly.
    tokio::time::sleep(Duration::from_millis(250)).await;
    task.pause();
    println!("⏸️  Main: paused at {:?}%", task.progress());
    tokio::time::sleep(Duration::from_millis(300)).await;
    task.resume();
    println!("▶️  Main: resumed");

    let body = task.clone().await?;
    println!("✅ Main: downloaded {} bytes", body.len());
    reporter.await?;
    Ok(())
}
