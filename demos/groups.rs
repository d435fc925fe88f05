//! # Group combinators
//!
//! Demonstrates joining and racing tasks:
//! - Task::all with counter progress
//! - Task::any racing mirrors, losers cancelled
//! - Cancellation fan-out through the group handle
//!
//! ## Run
//! ```sh
//! cargo run --example groups
//! ```

use std::time::Duration;

use taskchain::{Task, TaskState};

/// A worker that fulfills with its name after `delay`.
fn worker(name: &'static str, delay: Duration) -> Task<(), &'static str, String> {
    Task::new(move |emitter, _cfg| {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if emitter.state() == TaskState::Running {
                println!("🔧 Worker {name}: done");
                emitter.fulfill(name);
            } else {
                println!("🔧 Worker {name}: skipped, task is {}", emitter.state());
            }
        });
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Join: all three must fulfill; progress counts settlements.
    let join = Task::all(vec![
        worker("alpha", Duration::from_millis(40)),
        worker("beta", Duration::from_millis(80)),
        worker("gamma", Duration::from_millis(120)),
    ]);
    join.on_progress(|_, p| println!("📊 Join: {p} done ({:.0}%)", p.fraction() * 100.0));
    let names = join.await?;
    println!("✅ Join: {names:?}");

    // Race: fastest mirror wins, the rest are cancelled.
    let race = Task::any(vec![
        worker("mirror-eu", Duration::from_millis(90)),
        worker("mirror-us", Duration::from_millis(30)),
        worker("mirror-ap", Duration::from_millis(60)),
    ]);
    let winner = race.await?;
    println!("🏁 Race: {winner} won");

    // Give cancelled losers a beat to observe their state.
    tokio::time::sleep(Duration::from_millis(150)).await;
    Ok(())
}
