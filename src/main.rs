// MCAST-RECV — Orchestrator
// Parse arguments, arm the interrupt handler, bring the session up, then
// block in the receive loop until something stops it.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcast_recv::cli::Args;
use mcast_recv::session::{self, Config, Session, StopReason};
use mcast_recv::shutdown;

fn main() {
    // Usage errors (missing/malformed endpoint) exit here, before any
    // socket exists; -h prints help and exits 0.
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Before any socket operation, so an interrupt during setup still
    // produces a (zero-valued) report.
    if let Err(err) = shutdown::install() {
        eprintln!("mcast_recv: failed to install SIGINT handler: {err}");
        process::exit(1);
    }

    let config = Config::from(&args);
    let mut session = match Session::establish(&config) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("mcast_recv: {err:#}");
            process::exit(1);
        }
    };

    println!("Receiving Data...\n");

    let reason = session.run(shutdown::flag());
    if reason == StopReason::Interrupted {
        session::report(session.counters());
    }
    // Zero-byte and fatal receive outcomes end the program quietly with a
    // success status, exactly as a clean interrupt does.
}
