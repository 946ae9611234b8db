//! Rutas - cooperating HTTP agents that relay route queries to the ASI1 chat API.

use clap::Parser;
use std::process::ExitCode;

use rutas::cli::Commands;
use rutas::logging;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; the guard must stay alive for the process lifetime.
    let _guard = match logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Parse command line arguments
    let args = Commands::parse();

    // Run the command
    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
