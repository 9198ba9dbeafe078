//! CLI for `vdd-engine`.
//!
//! Standalone binary — replays a recorded traffic fixture through the
//! orchestrator and prints the resulting Virtual Discovery Documents. It
//! is the in-repo stand-in for the host application that would otherwise
//! deliver live `CapturedRequest`/`CapturedResponse` pairs (§6).
//!
//! # Subcommands
//!
//! ```text
//! vdd-engine run --fixture traffic.json
//! vdd-engine run --fixture traffic.json --config vdd-engine.yaml
//! vdd-engine inspect --fixture traffic.json --interface example.com/api/v1
//! ```

#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use vdd_core::{CapturedRequest, CapturedResponse};
use vdd_engine::{EngineConfig, MemoryKvStore, Orchestrator, ReqwestFetchRelay};

/// Reverse-engineers RPC schemas from recorded HTTP(S) traffic.
#[derive(Parser)]
#[command(name = "vdd-engine", version, about)]
enum Cli {
    /// Replay a fixture through the orchestrator and print every VDD.
    Run(RunArgs),

    /// Replay a fixture and print just one service's VDD.
    Inspect(InspectArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Path to a JSON fixture: an array of `{"request": ...}` /
    /// `{"response": ...}` events, in capture order.
    #[arg(short, long)]
    fixture: PathBuf,

    /// Path to an `EngineConfig` YAML file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct InspectArgs {
    /// Path to a JSON fixture, as in `run`.
    #[arg(short, long)]
    fixture: PathBuf,

    /// Path to an `EngineConfig` YAML file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The interface name (`host/path/prefix`) to print, e.g.
    /// `example.com/api/v1`.
    #[arg(short, long)]
    interface: String,
}

/// One event in a replay fixture.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum FixtureEvent {
    Request(CapturedRequest),
    Response(CapturedResponse),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli {
        Cli::Run(args) => run_replay(&args).await,
        Cli::Inspect(args) => run_inspect(&args).await,
    }
}

async fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_fixture(path: &PathBuf) -> anyhow::Result<Vec<FixtureEvent>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read fixture: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse fixture: {}", path.display()))
}

async fn replay(
    orchestrator: &mut Orchestrator<ReqwestFetchRelay, MemoryKvStore>,
    events: Vec<FixtureEvent>,
) {
    for event in events {
        match event {
            FixtureEvent::Request(request) => {
                info!(request_id = %request.request_id, url = %request.url, "replaying request");
                orchestrator.process_request(&request).await;
            }
            FixtureEvent::Response(response) => {
                info!(request_id = %response.request_id, status = response.status, "replaying response");
                orchestrator.process_response(&response).await;
            }
        }
    }
}

async fn run_replay(args: &RunArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref()).await?;
    let events = load_fixture(&args.fixture)?;

    let mut orchestrator = Orchestrator::new(config, ReqwestFetchRelay::new(), MemoryKvStore::new());
    replay(&mut orchestrator, events).await;

    let output = serde_json::to_string_pretty(orchestrator.vdds())
        .context("Failed to serialize VDDs")?;
    println!("{output}");
    Ok(())
}

async fn run_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref()).await?;
    let events = load_fixture(&args.fixture)?;

    let mut orchestrator = Orchestrator::new(config, ReqwestFetchRelay::new(), MemoryKvStore::new());
    replay(&mut orchestrator, events).await;

    let vdd = orchestrator
        .vdd(&args.interface)
        .with_context(|| format!("No VDD observed for interface: {}", args.interface))?;
    let output = serde_json::to_string_pretty(vdd).context("Failed to serialize VDD")?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_event_deserializes_request_and_response() {
        let json = r#"[
            {"type": "request", "tab_id": 1, "request_id": "r1", "url": "https://example.com/api/v1/users", "method": "GET", "initiator_origin": null, "request_headers": {}, "raw_body": null, "content_type": null},
            {"type": "response", "request_id": "r1", "status": 200, "response_headers": {}, "body": null, "content_type": null}
        ]"#;
        let events: Vec<FixtureEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], FixtureEvent::Request(_)));
        assert!(matches!(events[1], FixtureEvent::Response(_)));
    }
}
