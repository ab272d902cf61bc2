mod replay;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

use liveroom_core::{logging, Config, FakeEngine, RoomId};
use liveroom_state::StateRegistry;

#[derive(Parser, Debug)]
#[command(name = "liveroom-replay")]
#[command(about = "Replay a native event log through the room state layer", long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "LIVEROOM_CONFIG")]
    config: Option<String>,

    /// Event log, one `{"key": ..., "payload": ...}` object per line
    #[arg(long)]
    events: String,

    /// Room to enter before replaying; may be repeated
    #[arg(long = "room")]
    rooms: Vec<String>,

    /// Only deliver events for rooms passed with --room
    #[arg(long)]
    strict_rooms: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!(events = %args.events, "liveroom-replay starting");

    // 3. Build the registry over an engine that accepts every command
    let registry = StateRegistry::new(Arc::new(FakeEngine::new()), config);
    for room in &args.rooms {
        registry.enter_room(&RoomId::from(room.as_str()));
    }

    // 4. Replay
    let file = tokio::fs::File::open(&args.events)
        .await
        .with_context(|| format!("failed to open event log {}", args.events))?;
    let report = replay::replay(&registry, BufReader::new(file), !args.strict_rooms).await?;
    info!(
        dispatched = report.dispatched,
        delivered = report.delivered,
        skipped = report.skipped,
        "Replay finished"
    );

    // 5. Print final snapshots
    let mut rooms = Map::new();
    for room_id in registry.rooms() {
        rooms.insert(room_id.to_string(), registry.room_snapshot(&room_id));
    }
    let mut output = Map::new();
    output.insert("global".to_string(), registry.global_snapshot());
    output.insert("rooms".to_string(), Value::Object(rooms));
    println!("{}", serde_json::to_string_pretty(&Value::Object(output))?);

    registry.shutdown();
    Ok(())
}
