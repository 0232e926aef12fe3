//! Relay session against a real native host.
//!
//! Demonstrates:
//! - Building a relay with a preference store
//! - Opening a page session and capturing a problem
//! - Receiving host replies broadcast to the session
//! - Idle shutdown after the last session leaves
//!
//! Usage:
//!   cargo build --example echo_host
//!   cargo run --example relay_session -- --host target/debug/examples/echo_host
//!   cargo run --example relay_session -- --host target/debug/examples/echo_host --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::Args;
use cpterm_bridge::{Message, MemoryPreferenceStore, NewProblem, Relay, Result};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_HOST: &str = "target/debug/examples/echo_host";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Relay Session ===\n");

    let host = args.host.unwrap_or_else(|| PathBuf::from(DEFAULT_HOST));
    let prefs = Arc::new(MemoryPreferenceStore::with_values([("editor", "nvim")]));

    let relay = Relay::builder()
        .native_host(&host)
        .preferences(prefs.clone())
        .idle_shutdown(Duration::from_secs(2))
        .build()?;
    let _watcher = relay.spawn_preference_watcher();
    println!("[Setup] Relay ready for {}\n", host.display());

    // ========================================================================
    // Capture
    // ========================================================================

    let mut port = relay.connect();
    println!("[Session] {} connected", port.id());

    let problem = NewProblem::new(
        "Given an array of integers nums and an integer target, return indices of the two numbers.",
        "class Solution:\n    def twoSum(self, nums, target):\n        pass",
        "Python3",
        "https://leetcode.com/problems/two-sum/description/",
        "two-sum",
    );
    port.send(problem.into())?;

    for _ in 0..2 {
        match tokio::time::timeout(Duration::from_secs(5), port.recv()).await {
            Ok(Some(message)) => print_message(&message),
            Ok(None) => break,
            Err(_) => {
                println!("[Session] No reply within 5s");
                break;
            }
        }
    }

    prefs.set("theme", "dark");
    if let Ok(Some(message)) = tokio::time::timeout(Duration::from_secs(5), port.recv()).await {
        print_message(&message);
    }

    // ========================================================================
    // Idle Shutdown
    // ========================================================================

    drop(port);
    println!("\n[Session] Disconnected, waiting for idle shutdown...");
    tokio::time::sleep(Duration::from_secs(3)).await;
    println!("[Relay] Connected: {}", relay.is_connected());

    println!("\n=== Done ===");
    Ok(())
}

fn print_message(message: &Message) {
    match message {
        Message::SetCode { code } => println!("[Host] setCode:\n{code}"),
        Message::LogEntry { message, .. } => println!("[Host] log: {message}"),
        other => println!("[Host] {}", other.type_name()),
    }
}
