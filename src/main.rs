//! copypatrol-backend: binario del operador.
//!
//! Una invocación ejecuta exactamente una acción (store-changes,
//! check-changes, reports o db) y termina; la concurrencia entre acciones se
//! consigue con procesos separados.

mod actions;
mod cli;

use clap::Parser;
use log::error;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let parsed = cli::Cli::parse();
    if let Err(run_error) = actions::run(parsed.action) {
        error!("{run_error}");
        std::process::exit(1);
    }
}
