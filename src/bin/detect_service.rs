//! detect_service - single-shot object detection over stdio.
//!
//! Reads one JSON command from stdin, writes one JSON response to stdout,
//! and always exits 0; every fault is captured into the
//! `{success:false, error}` envelope instead of an exit code.

use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::Result;
use clap::Parser;
use serde_json::{json, Value};

use lookout::detect::{load_with_fallback, DefaultModelProvider};
use lookout::{DetectService, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "detect_service", about = "Single-shot object detection over stdio")]
struct Args {
    /// Configuration file path (JSON). Falls back to LOOKOUT_CONFIG.
    #[arg(long)]
    config: Option<String>,

    /// Model source override (file path or stub://).
    #[arg(long)]
    model: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let response = run().unwrap_or_else(|err| {
        json!({"success": false, "error": format!("Service error: {err:#}")})
    });
    println!("{response}");
}

fn run() -> Result<Value> {
    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => ServiceConfig::load_from(Some(path))?,
        None => ServiceConfig::load()?,
    };
    if let Some(model) = args.model {
        config.model.source = model;
    }

    // Eager, blocking model load; a double failure degrades the service
    // instead of terminating it.
    let model = load_with_fallback(&DefaultModelProvider, &config.model);
    let mut service =
        DetectService::new(model).with_default_confidence(config.default_confidence);

    let mut input = Vec::new();
    std::io::stdin().read_to_end(&mut input)?;

    // Even a panic inside the command cycle becomes the error envelope.
    let response = catch_unwind(AssertUnwindSafe(|| service.handle(&input)))
        .unwrap_or_else(|_| json!({"success": false, "error": "Service error: internal panic"}));
    Ok(response)
}
