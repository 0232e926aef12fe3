//! Minimal native host.
//!
//! Speaks the frame protocol on stdio:
//! - Announces the bridge version
//! - Answers a captured problem with `setCode`
//! - Acknowledges preferences and test results with log entries
//! - Exits on `command(quit)` or when stdin closes
//!
//! Usage:
//!   cargo build --example echo_host
//!   cargo run --example relay_session -- --host target/debug/examples/echo_host

mod common;

// ============================================================================
// Imports
// ============================================================================

use anyhow::{Context, Result};
use common::Args;
use cpterm_bridge::protocol::{CommandKind, Message, read_frame, write_frame};
use cpterm_bridge::relay::HOST_PROTOCOL_VERSION;
use tokio::io::{stdin, stdout};
use tracing::info;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    common::init_logging(args.debug);

    let mut input = stdin();
    let mut output = stdout();

    write_frame(&mut output, &Message::version(HOST_PROTOCOL_VERSION))
        .await
        .context("announcing version")?;

    while let Some(message) = read_frame(&mut input).await.context("reading frame")? {
        info!(kind = message.type_name(), "Received");

        let reply = match message {
            Message::NewProblem(problem) => Some(Message::set_code(format!(
                "// {} ({})\n{}",
                problem.name, problem.language, problem.code
            ))),
            Message::SetPrefs { prefs } => Some(Message::log_info(format!(
                "{} preferences applied",
                prefs.len()
            ))),
            Message::TestResults(results) => Some(match results.cases() {
                Some(cases) => Message::log_info(format!("{} test cases received", cases.len())),
                None => Message::log_error(format!(
                    "Harvest failed: {}",
                    results.error().unwrap_or_default()
                )),
            }),
            Message::Command {
                command: CommandKind::Quit,
            } => break,
            _ => None,
        };

        if let Some(reply) = reply {
            write_frame(&mut output, &reply)
                .await
                .context("writing reply")?;
        }
    }

    info!("Host exiting");
    Ok(())
}
