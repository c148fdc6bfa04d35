//! Voltlab - circuit analysis from the command line.
//!
//! Reads a JSON netlist (the same shape the schematic editor produces) and
//! prints analysis results as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! voltlab circuit.json                     # DC operating point
//! voltlab circuit.json --transient -n 100  # 100 transient samples
//! voltlab circuit.json --logic             # logic gate evaluation
//! ```

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Deserialize;
use voltlab_core::{
    logic,
    netlist::{Component, Wire},
    solver::{analyze_dc, TransientOptions, TransientSolver},
};

#[derive(Deserialize)]
struct Netlist {
    components: Vec<Component>,
    wires: Vec<Wire>,
}

/// Circuit analysis engine for schematic netlists
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON netlist file
    #[arg(value_name = "NETLIST_FILE")]
    netlist_file: PathBuf,

    /// Run transient analysis instead of DC
    #[arg(long)]
    transient: bool,

    /// Number of transient steps to run
    #[arg(short = 'n', long, default_value_t = 100)]
    steps: usize,

    /// Override the transient time step, in seconds
    #[arg(long)]
    dt: Option<f64>,

    /// Evaluate logic gates instead of analog analysis
    #[arg(long)]
    logic: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match analyze(&args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn analyze(args: &Args) -> Result<String, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(&args.netlist_file)?;
    let netlist: Netlist = serde_json::from_str(&text)?;

    let output = if args.logic {
        let result = logic::simulate(&netlist.components, None);
        serde_json::to_string_pretty(&result)?
    } else if args.transient {
        let options = TransientOptions {
            dt_override: args.dt,
            ..Default::default()
        };
        let mut solver =
            TransientSolver::initialize(&netlist.components, &netlist.wires, options)?;
        let samples = solver.step_batch(args.steps)?;
        serde_json::to_string_pretty(&samples)?
    } else {
        let result = analyze_dc(&netlist.components, &netlist.wires)?;
        serde_json::to_string_pretty(&result)?
    };

    Ok(output)
}
