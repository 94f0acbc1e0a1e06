//! CLI command definitions

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use corelib::csn::Csn;
use corelib::node::ServerId;
use replication::{select_replication_server, RsSelection};
use serde::Serialize;
use streaming::Decision;
use tracing::info;

use crate::config::Scenario;

/// Replication server selection tooling
#[derive(Parser, Debug)]
#[command(name = "rs-select", author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the selection for a scenario file
    Evaluate {
        /// Scenario JSON file
        scenario: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// CSN encoding helpers
    Csn {
        #[command(subcommand)]
        action: CsnAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CsnAction {
    /// Print the fields of a hex-encoded CSN
    Decode { hex: String },

    /// Print the hex form of a CSN
    Encode {
        timestamp: u64,
        seq_num: u32,
        origin: u16,
    },
}

#[derive(Serialize)]
struct EvaluationRow {
    rs_id: ServerId,
    evaluation: replication::Evaluation,
    reason: &'static str,
}

#[derive(Serialize)]
struct Report {
    local_ds: ServerId,
    attached_rs: Option<ServerId>,
    decision: String,
    selected: Option<ServerId>,
    evaluations: Vec<EvaluationRow>,
}

impl Report {
    fn new(scenario: &Scenario, selection: &RsSelection) -> Self {
        let decision = Decision::from_selection(scenario.attached_rs, selection);
        Self {
            local_ds: scenario.config.server_id,
            attached_rs: scenario.attached_rs,
            decision: decision.to_string(),
            selected: selection.selected(),
            evaluations: selection
                .evaluations()
                .iter()
                .map(|(rs_id, evaluation)| EvaluationRow {
                    rs_id,
                    evaluation,
                    reason: evaluation.message(),
                })
                .collect(),
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "local DS: {}", self.local_ds);
        match self.attached_rs {
            Some(rs_id) => {
                let _ = writeln!(out, "attached: {}", rs_id);
            }
            None => out.push_str("attached: none\n"),
        }
        let _ = writeln!(out, "decision: {}", self.decision);
        for row in &self.evaluations {
            let _ = writeln!(out, "  {:>5}  {}", row.rs_id, row.reason);
        }
        out
    }
}

/// Run the selection described by `scenario`.
pub fn evaluate(scenario: &Scenario, json: bool) -> Result<String> {
    let topology = scenario.topology();
    let selection = select_replication_server(&topology, &scenario.my_state, &scenario.config)
        .context("Selection refused")?;
    info!(selected = ?selection.selected(), "evaluated scenario");

    let report = Report::new(scenario, &selection);
    if json {
        serde_json::to_string_pretty(&report).context("Failed to encode report")
    } else {
        Ok(report.render())
    }
}

fn csn(action: &CsnAction) -> Result<String> {
    match action {
        CsnAction::Decode { hex } => {
            let csn = Csn::from_hex(hex).with_context(|| format!("Cannot decode {hex:?}"))?;
            Ok(format!(
                "timestamp={} seq_num={} origin={}",
                csn.timestamp(),
                csn.seq_num(),
                csn.origin()
            ))
        }
        CsnAction::Encode {
            timestamp,
            seq_num,
            origin,
        } => Ok(Csn::new(*timestamp, *seq_num, ServerId(*origin)).to_hex()),
    }
}

impl Command {
    /// Execute the command and return what should be printed.
    pub fn run(&self) -> Result<String> {
        match self {
            Command::Evaluate { scenario, json } => evaluate(&Scenario::load(scenario)?, *json),
            Command::Csn { action } => csn(action),
        }
    }
}
