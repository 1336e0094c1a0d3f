// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context};
use serde_json::json;
use std::env;
use tracing_subscriber::EnvFilter;

use dpu_queue::config::consts::DEFAULT_LOG_FILTER;
use dpu_queue::config::{load_and_validate_config, load_config, RuntimeBuilder};
use dpu_queue::{RankId, Symbol};

const DEFAULT_PAYLOAD: &str = "hello";

/// Initialize the fmt subscriber. `RUST_LOG` wins over the config filter.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// The payload for one rank, suffixed with its index and fitted to the symbol.
fn rank_payload(payload: &str, rank: RankId, symbol: &Symbol) -> Vec<u8> {
    let size = symbol.size() as usize;
    let alignment = symbol.memory_kind().alignment() as usize;

    let mut bytes = format!("{}-{}", payload, rank.index()).into_bytes();
    bytes.truncate(size);
    let padded = (bytes.len() + alignment - 1) / alignment * alignment;
    bytes.resize(padded.min(size), 0);
    bytes
}

async fn run(path: &str, payload: &str) -> anyhow::Result<()> {
    let filter = load_config(path)
        .map(|config| config.logging.filter().to_string())
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&filter);

    let config = load_and_validate_config(path).with_context(|| format!("failed to load {}", path))?;
    let name = config
        .program
        .symbols
        .first()
        .map(|symbol| symbol.name.clone())
        .ok_or_else(|| anyhow!("{} defines no program symbols", path))?;

    let set = RuntimeBuilder::from_config(&config)?;
    let symbol = set.resolver().resolve_name(&name)?;

    let buffers: Vec<Vec<u8>> = set
        .rank_ids()
        .into_iter()
        .map(|rank| rank_payload(payload, rank, &symbol))
        .collect();
    let outputs: Vec<Vec<u8>> = buffers.iter().map(|buffer| vec![0; buffer.len()]).collect();

    set.scatter_in(&symbol, buffers)?;
    set.exec()?;
    let gathered = set.gather_out(&symbol, outputs)?;
    set.sync().await?;
    let gathered = gathered.buffers().await?;

    let ranks: Vec<_> = set
        .rank_states()
        .into_iter()
        .zip(&gathered)
        .map(|((rank, state), buffer)| {
            let text = String::from_utf8_lossy(buffer);
            json!({
                "rank": rank.index(),
                "state": state.as_str(),
                "buffer": text.trim_end_matches('\0'),
            })
        })
        .collect();

    let report = json!({
        "config": path,
        "driver": set.driver().name(),
        "symbol": symbol.to_string(),
        "ranks": ranks,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.yaml|config.toml> [payload]", args[0]);
        eprintln!("Example: {} configs/loopback-demo.yaml \"hello world\"", args[0]);
        std::process::exit(1);
    }

    let payload = args.get(2).map(String::as_str).unwrap_or(DEFAULT_PAYLOAD);
    if let Err(e) = run(&args[1], payload).await {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}
