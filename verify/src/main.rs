// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ledger_kernel::{verify_chain, ChainProof, ChainVerifier, SealedEvent};
use serde::Deserialize;

/// Verifies a ledger hash chain, from an export file or a running node.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON array or newline-delimited JSON of sealed events
    #[arg(long, conflicts_with = "node", required_unless_present = "node")]
    file: Option<PathBuf>,

    /// Base URL of a ledger node, e.g. http://127.0.0.1:3000
    #[arg(long)]
    node: Option<String>,

    /// First sequence number to fetch from the node
    #[arg(long, default_value_t = 1)]
    from: u64,

    /// Last sequence number to fetch; defaults to the node's head
    #[arg(long, requires = "node")]
    to: Option<u64>,

    /// Bearer token for the node's event routes
    #[arg(long, requires = "node")]
    token: Option<String>,
}

#[derive(Deserialize)]
struct Health {
    last_sequence_number: Option<u64>,
}

fn parse_entries(raw: &str) -> Result<Vec<SealedEvent>> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Failed to parse JSON array of sealed events");
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Failed to parse line {}", i + 1))
        })
        .collect()
}

fn verify_entries(entries: &[SealedEvent]) -> Result<ChainProof> {
    verify_chain(entries).map_err(|violation| anyhow::anyhow!("Chain broken: {}", violation))
}

fn verify_node(base: &str, from: u64, to: Option<u64>, token: Option<&str>) -> Result<ChainProof> {
    let base = base.trim_end_matches('/');
    let client = reqwest::blocking::Client::new();

    let to = match to {
        Some(to) => to,
        None => {
            let health: Health = client
                .get(format!("{}/v1/health", base))
                .send()
                .context("Failed to reach node")?
                .json()
                .context("Failed to parse health response")?;
            health
                .last_sequence_number
                .context("Node could not report its head; pass --to")?
        }
    };
    if to < from {
        bail!("Nothing to verify between {} and {}", from, to);
    }

    let mut verifier = ChainVerifier::new();
    for n in from..=to {
        let mut req = client.get(format!("{}/v1/events/{}", base, n));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().with_context(|| format!("Failed to fetch entry {}", n))?;
        if !resp.status().is_success() {
            bail!("Node answered {} for entry {}", resp.status(), n);
        }
        let entry: SealedEvent = resp
            .json()
            .with_context(|| format!("Failed to parse entry {}", n))?;
        if let Err(violation) = verifier.push(&entry) {
            bail!("Chain broken: {}", violation);
        }
    }

    verifier
        .finish()
        .map_err(|violation| anyhow::anyhow!("Chain broken: {}", violation))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let proof = match (&args.file, &args.node) {
        (Some(path), _) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let entries = parse_entries(&raw)?;
            verify_entries(&entries)?
        }
        (None, Some(node)) => verify_node(node, args.from, args.to, args.token.as_deref())?,
        (None, None) => bail!("Pass --file or --node"),
    };

    println!("{}", serde_json::to_string_pretty(&proof)?);
    Ok(())
}
