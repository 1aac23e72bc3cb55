//! rrb_service - HTTP detection service
//!
//! This daemon:
//! 1. Loads `ServiceConfig` (RRB_CONFIG file plus RRB_* environment overrides)
//! 2. Serves the detection API
//! 3. Builds the inference engine on the first request that needs it

use anyhow::Result;
use clap::Parser;
use std::sync::{mpsc, Arc};

use rrb_detect::{ApiServer, InferenceEngine, ServiceConfig, SharedEngine};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listen address (overrides RRB_API_ADDR and the config file).
    #[arg(long)]
    addr: Option<String>,
    /// Serve the deterministic stub backends instead of the trained models.
    #[arg(long)]
    stub: bool,
    /// Build the engine at startup instead of on first use.
    #[arg(long)]
    preload: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = ServiceConfig::load()?;
    if let Some(addr) = args.addr {
        config.api_addr = addr;
    }
    if config.expose_error_details {
        log::warn!("error details are exposed in responses; do not run this in production");
    }

    let engine = if args.stub {
        let detector = config.detector.clone();
        log::warn!("serving stub backends; results are synthetic");
        SharedEngine::new(move || InferenceEngine::stub(detector.clone()))
    } else {
        SharedEngine::from_config(config.clone())
    };
    let engine = Arc::new(engine);
    if args.preload {
        engine.get()?;
    }

    let upload_dir = config.upload_dir.clone();
    let api_handle = ApiServer::new(config, engine).spawn()?;
    log::info!(
        "rrb_service running on {} (uploads in {})",
        api_handle.addr,
        upload_dir.display()
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("rrb_service waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}
